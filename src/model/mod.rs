//! Types that represent the core data model, such as `Transaction` and `Amount`.
mod amount;
mod row_col;
mod transaction;

pub use amount::Amount;
pub use row_col::RowCol;
pub use transaction::{decode, Schema, Timestamp, Transaction};

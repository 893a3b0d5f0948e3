//! budget-reporter: copies a budget report template in Google Sheets and fills it with the last
//! month of transactions scraped from Mint by the `mintapi` tool.

mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
mod fetch;
pub mod model;
mod provision;
mod report;
mod secrets;
mod utils;

pub use config::Config;
pub use error::{Error, ErrorType, Result};
pub use report::ReportSummary;

//! Sorts transactions into the expense and income sides of the report.
//!
//! The report sheet has two column groups of four columns each: date, amount, merchant and
//! category. Expenses start at column B, income at column G. Both sides fill downwards from the
//! fifth row, each side keeping its own row counter. Transfers, and anything older than one month,
//! are left out.

use crate::error::Res;
use crate::model::{Amount, RowCol, Transaction};
use crate::provision::{Worksheet, DATE_FORMAT};
use anyhow::Context;
use chrono::{DateTime, Months, NaiveDateTime, TimeDelta, TimeZone, Utc};
use serde::Serialize;
use tracing::trace;

/// The zero-based row that both sides start writing at.
pub const FIRST_ROW: usize = 4;

/// The zero-based first column of the expense group.
pub const EXPENSE_COLUMN: usize = 1;

/// The zero-based first column of the income group.
pub const INCOME_COLUMN: usize = 6;

/// Which side of the report a transaction lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    Expense,
    Income,
}

impl Group {
    pub fn base_column(self) -> usize {
        match self {
            Group::Expense => EXPENSE_COLUMN,
            Group::Income => INCOME_COLUMN,
        }
    }
}

/// What happened to a single transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Dated before the cutoff.
    Stale,
    /// A transfer between accounts.
    Transfer,
    /// Written at `row` of `group`, showing `amount`.
    Written {
        group: Group,
        row: usize,
        amount: Amount,
    },
}

/// Counts of what a report contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ReportSummary {
    pub expense_rows: usize,
    pub income_rows: usize,
    pub skipped_transfers: usize,
    pub skipped_stale: usize,
}

/// Assigns rows to transactions and buffers their cells into a `Worksheet`.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    cutoff: DateTime<Utc>,
    expense_row: usize,
    income_row: usize,
    summary: ReportSummary,
}

impl ReportBuilder {
    /// Creates a builder that leaves out transactions from before one calendar month prior to
    /// `now`. If the day does not exist in that month, the last day of the month is used.
    pub fn new<Tz: TimeZone>(now: DateTime<Tz>) -> Res<Self> {
        let wall_clock = now
            .naive_local()
            .checked_sub_months(Months::new(1))
            .context("Unable to compute the date one month ago")?;
        let cutoff = resolve_local(&now.timezone(), wall_clock)
            .with_context(|| format!("Unable to place {wall_clock} in the local time zone"))?;
        Ok(Self::with_cutoff(cutoff.with_timezone(&Utc)))
    }

    pub fn with_cutoff(cutoff: DateTime<Utc>) -> Self {
        Self {
            cutoff,
            expense_row: FIRST_ROW,
            income_row: FIRST_ROW,
            summary: ReportSummary::default(),
        }
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    /// The row the next expense will be written to.
    #[cfg(test)]
    pub fn expense_row(&self) -> usize {
        self.expense_row
    }

    /// The row the next income will be written to.
    #[cfg(test)]
    pub fn income_row(&self) -> usize {
        self.income_row
    }

    pub fn summary(&self) -> ReportSummary {
        self.summary
    }

    /// Decides where `txn` goes without writing anything.
    ///
    /// A negative amount is money coming in, so it goes to the income side even when the
    /// aggregator flagged it as spending, and it is shown as a positive number.
    pub fn classify(&self, txn: &Transaction) -> Placement {
        if txn.date().utc() < self.cutoff {
            return Placement::Stale;
        }
        if txn.is_transfer() {
            return Placement::Transfer;
        }

        let (group, amount) = if txn.amount().is_negative() {
            (Group::Income, txn.amount().abs())
        } else if txn.is_spending() {
            (Group::Expense, txn.amount())
        } else {
            (Group::Income, txn.amount())
        };

        let row = match group {
            Group::Expense => self.expense_row,
            Group::Income => self.income_row,
        };
        Placement::Written { group, row, amount }
    }

    /// Classifies `txn` and, unless it is skipped, buffers its four cells into `sheet` and moves
    /// its side down a row.
    pub(crate) fn add(&mut self, txn: &Transaction, sheet: &mut Worksheet) -> Placement {
        let placement = self.classify(txn);
        match placement {
            Placement::Stale => {
                trace!("Skipping {} dated before the cutoff", txn.merchant());
                self.summary.skipped_stale += 1;
            }
            Placement::Transfer => {
                trace!("Skipping transfer {}", txn.merchant());
                self.summary.skipped_transfers += 1;
            }
            Placement::Written { group, row, amount } => {
                let start = RowCol::new(row, group.base_column());
                let date = txn.date().local().format(DATE_FORMAT).to_string();
                sheet.update(start, date);
                sheet.update(start.offset_col(1), dollars_formula(amount));
                sheet.update(start.offset_col(2), text_formula(txn.merchant()));
                sheet.update(start.offset_col(3), txn.category());
                match group {
                    Group::Expense => {
                        self.expense_row += 1;
                        self.summary.expense_rows += 1;
                    }
                    Group::Income => {
                        self.income_row += 1;
                        self.summary.income_rows += 1;
                    }
                }
            }
        }
        placement
    }

    /// Adds every transaction, in order, and returns the summary.
    pub(crate) fn build<'a, I>(mut self, transactions: I, sheet: &mut Worksheet) -> ReportSummary
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        for txn in transactions {
            self.add(txn, sheet);
        }
        self.summary()
    }
}

/// Maps a wall-clock time to an instant in `tz`. An ambiguous time takes the earlier instant. A
/// time skipped by a daylight saving change is moved forward an hour at a time until it exists.
fn resolve_local<Tz: TimeZone>(tz: &Tz, mut wall_clock: NaiveDateTime) -> Option<DateTime<Tz>> {
    for _ in 0..24 {
        if let Some(instant) = tz.from_local_datetime(&wall_clock).earliest() {
            return Some(instant);
        }
        wall_clock = wall_clock.checked_add_signed(TimeDelta::hours(1))?;
    }
    None
}

/// A formula that shows `amount` as currency, e.g. `=TO_DOLLARS(50.00)`.
fn dollars_formula(amount: Amount) -> String {
    format!("=TO_DOLLARS({amount})")
}

/// A formula that shows `text` as literal text, so the spreadsheet does not turn a merchant name
/// into a number, date or link.
fn text_formula(text: &str) -> String {
    format!("=T(\"{}\")", text.replace('"', "\"\""))
}

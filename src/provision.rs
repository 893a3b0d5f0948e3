//! Creates the spreadsheet that a run writes into, and buffers the writes to it.

use crate::api::{CellUpdate, Drive, Sheets};
use crate::error::Res;
use crate::model::RowCol;
use anyhow::Context;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// The format of dates in report names and in the date column, e.g. `10/17/2026`.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// The tab position of the transactions sheet in the template.
pub const TRANSACTIONS_SHEET_INDEX: usize = 1;

const REPORT_SUFFIX: &str = "Budget Report";

/// The name of the report created on `today`, e.g. `10/17/2026 Budget Report`.
pub fn report_name(today: NaiveDate) -> String {
    format!("{} {REPORT_SUFFIX}", today.format(DATE_FORMAT))
}

/// Copies the template spreadsheet into a new report named for `today` and returns a handle to
/// its transactions sheet.
pub(crate) async fn provision<A>(api: &mut A, template_id: &str, today: NaiveDate) -> Res<Worksheet>
where
    A: Drive + Sheets + ?Sized,
{
    let name = report_name(today);
    let spreadsheet_id = api
        .copy_file(template_id, &name)
        .await
        .with_context(|| format!("Unable to copy the template {template_id}"))?;
    debug!("Copied template {template_id} to {spreadsheet_id}");

    let spreadsheet = api
        .fetch_spreadsheet(&spreadsheet_id)
        .await
        .context("Unable to fetch the new report")?;
    info!("{}", spreadsheet.title);

    let sheet_title = spreadsheet
        .sheet_by_index(TRANSACTIONS_SHEET_INDEX)?
        .to_string();

    Ok(Worksheet::new(spreadsheet.id, sheet_title))
}

/// A sheet in a spreadsheet. Updates are held in memory until `synchronize` sends them all in a
/// single request. Writing the same cell twice keeps the last value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Worksheet {
    spreadsheet_id: String,
    title: String,
    pending: BTreeMap<RowCol, String>,
}

impl Worksheet {
    pub(crate) fn new(spreadsheet_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            title: title.into(),
            pending: BTreeMap::new(),
        }
    }

    pub(crate) fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub(crate) fn title(&self) -> &str {
        &self.title
    }

    /// Buffers a value for `cell`.
    pub(crate) fn update(&mut self, cell: RowCol, value: impl Into<String>) {
        self.pending.insert(cell, value.into());
    }

    /// The buffered values, in row-major order.
    pub(crate) fn pending(&self) -> Vec<CellUpdate> {
        self.pending
            .iter()
            .map(|(cell, value)| CellUpdate::new(*cell, value.clone()))
            .collect()
    }

    /// Sends all buffered values in one request. The buffer is only cleared if the request
    /// succeeds.
    pub(crate) async fn synchronize<S>(&mut self, sheets: &mut S) -> Res<()>
    where
        S: Sheets + ?Sized,
    {
        let updates = self.pending();
        debug!("Synchronizing {} cells to '{}'", updates.len(), self.title);
        sheets
            .update_cells(&self.spreadsheet_id, &self.title, &updates)
            .await?;
        self.pending.clear();
        Ok(())
    }
}

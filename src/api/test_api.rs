//! Implements the `Drive` and `Sheets` traits using in-memory data for testing purposes.

use crate::api::{CellUpdate, Drive, Sheets, Spreadsheet};
use crate::error::Res;
use crate::model::RowCol;
use anyhow::{bail, Context};
use std::collections::{BTreeMap, HashMap};

/// An in-memory stand-in for Google Drive and Google Sheets. Copying a file copies its sheet
/// titles. Every `update_cells` call is recorded so tests can check how many commits happened.
#[derive(Debug, Default)]
pub(crate) struct TestApi {
    /// Spreadsheets by ID.
    pub(crate) files: HashMap<String, Spreadsheet>,
    /// Cell values by (spreadsheet ID, sheet title).
    pub(crate) cells: HashMap<(String, String), BTreeMap<RowCol, String>>,
    /// The number of `update_cells` calls.
    pub(crate) commits: usize,
    /// When set, `update_cells` fails.
    pub(crate) fail_updates: bool,
    next_id: usize,
}

impl TestApi {
    /// Creates a `TestApi` holding one template spreadsheet with the given sheets.
    pub(crate) fn with_template(template_id: &str, sheets: &[&str]) -> Self {
        let mut api = Self::default();
        api.files.insert(
            template_id.to_string(),
            Spreadsheet {
                id: template_id.to_string(),
                title: "Budget Report Template".to_string(),
                sheets: sheets.iter().map(|s| s.to_string()).collect(),
            },
        );
        api
    }

    /// The values written to a sheet.
    pub(crate) fn sheet_cells(
        &self,
        spreadsheet_id: &str,
        sheet_title: &str,
    ) -> BTreeMap<RowCol, String> {
        self.cells
            .get(&(spreadsheet_id.to_string(), sheet_title.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Drive for TestApi {
    async fn copy_file(&mut self, file_id: &str, name: &str) -> Res<String> {
        let template = self
            .files
            .get(file_id)
            .with_context(|| format!("File '{file_id}' not found"))?
            .clone();
        self.next_id += 1;
        let id = format!("copy-{}", self.next_id);
        self.files.insert(
            id.clone(),
            Spreadsheet {
                id: id.clone(),
                title: name.to_string(),
                sheets: template.sheets,
            },
        );
        Ok(id)
    }
}

#[async_trait::async_trait]
impl Sheets for TestApi {
    async fn fetch_spreadsheet(&mut self, spreadsheet_id: &str) -> Res<Spreadsheet> {
        self.files
            .get(spreadsheet_id)
            .cloned()
            .with_context(|| format!("Spreadsheet '{spreadsheet_id}' not found"))
    }

    async fn update_cells(
        &mut self,
        spreadsheet_id: &str,
        sheet_title: &str,
        cells: &[CellUpdate],
    ) -> Res<()> {
        if self.fail_updates {
            bail!("The test API was told to fail updates");
        }
        let spreadsheet = self
            .files
            .get(spreadsheet_id)
            .with_context(|| format!("Spreadsheet '{spreadsheet_id}' not found"))?;
        if !spreadsheet.sheets.iter().any(|s| s == sheet_title) {
            bail!("Sheet '{sheet_title}' not found in '{spreadsheet_id}'");
        }
        self.commits += 1;
        let sheet = self
            .cells
            .entry((spreadsheet_id.to_string(), sheet_title.to_string()))
            .or_default();
        for update in cells {
            sheet.insert(update.cell, update.value.clone());
        }
        Ok(())
    }
}

//! The Google APIs that the report is written with. `Drive` copies the template document and
//! `Sheets` reads spreadsheet metadata and writes cell values. Both are traits so that the report
//! can be produced against an in-memory fake in tests.

mod files;
mod google;
mod oauth;
#[cfg(test)]
mod test_api;

use crate::error::Res;
use crate::model::RowCol;
use anyhow::Context;

pub(crate) use files::SecretFile;
pub(crate) use google::GoogleApi;
pub(crate) use oauth::TokenProvider;
#[cfg(test)]
pub(crate) use test_api::TestApi;

/// OAuth scopes required to copy the template (Drive) and write the copy (Sheets).
pub(crate) const OAUTH_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/spreadsheets",
];

/// Document storage.
#[async_trait::async_trait]
pub(crate) trait Drive: Send {
    /// Copies the file `file_id`, names the copy `name`, and returns the ID of the copy.
    async fn copy_file(&mut self, file_id: &str, name: &str) -> Res<String>;
}

/// Spreadsheet manipulation.
#[async_trait::async_trait]
pub(crate) trait Sheets: Send {
    /// Fetches the title and the sheet names of a spreadsheet.
    async fn fetch_spreadsheet(&mut self, spreadsheet_id: &str) -> Res<Spreadsheet>;

    /// Writes all `cells` of the sheet named `sheet_title` in one request.
    async fn update_cells(
        &mut self,
        spreadsheet_id: &str,
        sheet_title: &str,
        cells: &[CellUpdate],
    ) -> Res<()>;
}

/// The parts of a spreadsheet's metadata that we use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Spreadsheet {
    pub(crate) id: String,
    pub(crate) title: String,
    /// Sheet titles, in tab order.
    pub(crate) sheets: Vec<String>,
}

impl Spreadsheet {
    /// Returns the title of the sheet at the zero-based tab position `index`.
    pub(crate) fn sheet_by_index(&self, index: usize) -> Res<&str> {
        self.sheets
            .get(index)
            .map(String::as_str)
            .with_context(|| {
                format!(
                    "Spreadsheet '{}' has {} sheet(s), there is no sheet at index {index}",
                    self.title,
                    self.sheets.len()
                )
            })
    }
}

/// A value to be written to a single cell. Values are entered as if typed by a user, so a leading
/// `=` makes a formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CellUpdate {
    pub(crate) cell: RowCol,
    pub(crate) value: String,
}

impl CellUpdate {
    pub(crate) fn new(cell: RowCol, value: impl Into<String>) -> Self {
        Self {
            cell,
            value: value.into(),
        }
    }

    /// The A1 range of this cell within `sheet_title`, e.g. `'Transactions'!B5`.
    pub(crate) fn range(&self, sheet_title: &str) -> String {
        format!(
            "'{}'!{}",
            sheet_title.replace('\'', "''"),
            self.cell.to_a1()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_by_index() {
        let spreadsheet = Spreadsheet {
            id: "abc".to_string(),
            title: "Report".to_string(),
            sheets: vec!["Summary".to_string(), "Transactions".to_string()],
        };
        assert_eq!("Transactions", spreadsheet.sheet_by_index(1).unwrap());
        let err = spreadsheet.sheet_by_index(2).unwrap_err();
        assert!(err.to_string().contains("no sheet at index 2"));
    }

    #[test]
    fn test_cell_update_range() {
        let update = CellUpdate::new(RowCol::new(4, 6), "x");
        assert_eq!("'Transactions'!G5", update.range("Transactions"));
        assert_eq!("'Bob''s'!G5", update.range("Bob's"));
    }
}

//! Tabular store adapters.
//!
//! The bot keeps all of its state in a flat spreadsheet. Adapters implement
//! [`TabularStore`] over A1 ranges; [`SheetsStore`] talks to the Google Sheets
//! values API and [`MemoryStore`] keeps a grid in process for tests and local
//! runs.

pub mod memory;
pub mod sheets;

pub use memory::MemoryStore;
pub use sheets::SheetsStore;

use crate::error::Result;
use crate::layout::Column;
use async_trait::async_trait;

/// Rows of cell values as returned by a store read.
pub type Rows = Vec<Vec<String>>;

/// Rectangular (optionally open-ended) range of cells on one sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRange {
    pub sheet: String,
    pub start_col: Column,
    pub start_row: u32,
    pub end_col: Column,
    /// `None` means "to the last row with data".
    pub end_row: Option<u32>,
}

impl CellRange {
    /// A single cell.
    #[must_use]
    pub fn cell(sheet: &str, col: Column, row: u32) -> Self {
        Self::rect(sheet, col, row, col, row)
    }

    /// A closed rectangle.
    #[must_use]
    pub fn rect(sheet: &str, start_col: Column, start_row: u32, end_col: Column, end_row: u32) -> Self {
        Self {
            sheet: sheet.to_owned(),
            start_col,
            start_row,
            end_col,
            end_row: Some(end_row),
        }
    }

    /// Columns `start_col..=end_col` from `start_row` down to the last row.
    #[must_use]
    pub fn open(sheet: &str, start_col: Column, end_col: Column, start_row: u32) -> Self {
        Self {
            sheet: sheet.to_owned(),
            start_col,
            start_row,
            end_col,
            end_row: None,
        }
    }

    /// Number of columns spanned.
    #[must_use]
    pub fn width(&self) -> usize {
        (self.end_col.index() - self.start_col.index() + 1) as usize
    }

    fn quoted_sheet(&self) -> String {
        let plain = self
            .sheet
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if plain {
            self.sheet.clone()
        } else {
            format!("'{}'", self.sheet.replace('\'', "''"))
        }
    }
}

impl std::fmt::Display for CellRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sheet = self.quoted_sheet();
        match self.end_row {
            Some(end) if end == self.start_row && self.start_col == self.end_col => {
                write!(f, "{sheet}!{}{}", self.start_col, self.start_row)
            }
            Some(end) => write!(
                f,
                "{sheet}!{}{}:{}{end}",
                self.start_col, self.start_row, self.end_col
            ),
            None => write!(
                f,
                "{sheet}!{}{}:{}",
                self.start_col, self.start_row, self.end_col
            ),
        }
    }
}

/// Minimal contract of the backing spreadsheet.
///
/// Reads return rows in sheet order starting at the range's first row; trailing
/// empty rows and trailing empty cells may be omitted, as the Sheets API does.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Read the values of a range. An empty range yields an empty vec.
    async fn read(&self, range: &CellRange) -> Result<Rows>;

    /// Overwrite the cells of a range starting at its top-left corner.
    async fn write(&self, range: &CellRange, rows: Rows) -> Result<()>;

    /// Add rows after the last row with data inside the range's columns.
    async fn append(&self, range: &CellRange, rows: Rows) -> Result<()>;
}

/// First cell of the first row, or `""`.
#[must_use]
pub fn first_cell(rows: &Rows) -> String {
    rows.first()
        .and_then(|row| row.first())
        .cloned()
        .unwrap_or_default()
}

//! Column layout and block arithmetic for the tabular store.
//!
//! Every user owns a fixed-size block of rows. The block's first row (the
//! header row) carries the chat id and display name, plus one comment cell and
//! one timestamp cell per period. The goal texts for a period run down the
//! period's goal column across all rows of the block.
//!
//! Column letters differ between deployments, so they come from
//! [`LayoutConfig`](crate::config::LayoutConfig) and are resolved once into a
//! [`ColumnLayout`] at startup.

use crate::config::LayoutConfig;
use crate::error::{BotError, Result};
use crate::period::Period;
use crate::store::CellRange;

/// Zero-based spreadsheet column (`A` = 0, `Z` = 25, `AA` = 26).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Column(u32);

impl Column {
    /// Parse a column from its letters (case-insensitive).
    pub fn parse(letters: &str) -> Result<Self> {
        let letters = letters.trim();
        if letters.is_empty() || letters.len() > 3 {
            return Err(BotError::Config(format!("invalid column `{letters}`")));
        }
        let mut index: u32 = 0;
        for ch in letters.chars() {
            if !ch.is_ascii_alphabetic() {
                return Err(BotError::Config(format!("invalid column `{letters}`")));
            }
            let digit = u32::from(ch.to_ascii_uppercase() as u8 - b'A') + 1;
            index = index * 26 + digit;
        }
        Ok(Self(index - 1))
    }

    /// Zero-based index.
    #[must_use]
    pub fn index(self) -> u32 {
        self.0
    }

    /// Column letters (`A`, `L`, `AB`).
    #[must_use]
    pub fn letters(self) -> String {
        let mut n = self.0 + 1;
        let mut out = Vec::new();
        while n > 0 {
            let rem = (n - 1) % 26;
            out.push(char::from(b'A' + rem as u8));
            n = (n - 1) / 26;
        }
        out.iter().rev().collect()
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.letters())
    }
}

/// Cells a single period occupies inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodColumns {
    /// Goal texts, one per block row.
    pub goal: Column,
    /// Latest comment, on the header row.
    pub comment: Column,
    /// Last-updated timestamp, on the header row.
    pub updated: Column,
}

/// Validated layout of the user sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    sheet: String,
    id: Column,
    name: Column,
    first_row: u32,
    block_size: u32,
    daily: PeriodColumns,
    weekly: PeriodColumns,
    monthly: PeriodColumns,
}

impl ColumnLayout {
    /// Resolve column letters from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Config`] for unparsable letters, a zero block size,
    /// a first row of zero, or header cells that collide.
    pub fn from_config(sheet: &str, config: &LayoutConfig) -> Result<Self> {
        if config.block_size == 0 {
            return Err(BotError::Config("layout.block_size must be > 0".to_owned()));
        }
        if config.first_row == 0 {
            return Err(BotError::Config("layout.first_row must be >= 1".to_owned()));
        }
        if sheet.trim().is_empty() {
            return Err(BotError::Config("sheet name is empty".to_owned()));
        }

        let resolve = |cols: &crate::config::PeriodColumnsConfig| -> Result<PeriodColumns> {
            Ok(PeriodColumns {
                goal: Column::parse(&cols.goal)?,
                comment: Column::parse(&cols.comment)?,
                updated: Column::parse(&cols.updated)?,
            })
        };

        let layout = Self {
            sheet: sheet.trim().to_owned(),
            id: Column::parse(&config.id_column)?,
            name: Column::parse(&config.name_column)?,
            first_row: config.first_row,
            block_size: config.block_size,
            daily: resolve(&config.daily)?,
            weekly: resolve(&config.weekly)?,
            monthly: resolve(&config.monthly)?,
        };
        layout.check_header_collisions()?;
        Ok(layout)
    }

    fn check_header_collisions(&self) -> Result<()> {
        let mut header = vec![("id", self.id), ("name", self.name)];
        for period in Period::ALL {
            let cols = self.columns(period);
            header.push((period.key(), cols.comment));
            header.push((period.key(), cols.updated));
            // Goal columns share the header row with the first goal.
            header.push((period.key(), cols.goal));
        }
        for (i, (owner, col)) in header.iter().enumerate() {
            if let Some((other, _)) = header[i + 1..].iter().find(|(_, c)| c == col) {
                return Err(BotError::Config(format!(
                    "column {col} is assigned to both {owner} and {other}"
                )));
            }
        }
        Ok(())
    }

    /// Sheet (tab) name.
    #[must_use]
    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// Rows per block.
    #[must_use]
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// First row of the first block.
    #[must_use]
    pub fn first_row(&self) -> u32 {
        self.first_row
    }

    /// Columns of one period.
    #[must_use]
    pub fn columns(&self, period: Period) -> PeriodColumns {
        match period {
            Period::Daily => self.daily,
            Period::Weekly => self.weekly,
            Period::Monthly => self.monthly,
        }
    }

    /// Header row of block `k` (`first_row + block_size * k`).
    #[must_use]
    pub fn block_start(&self, k: u32) -> u32 {
        self.first_row + self.block_size * k
    }

    /// Block index of a header row, or `None` when `row` is not a block start.
    #[must_use]
    pub fn block_index(&self, row: u32) -> Option<u32> {
        let offset = row.checked_sub(self.first_row)?;
        (offset % self.block_size == 0).then_some(offset / self.block_size)
    }

    /// Open-ended range covering the id and name columns of every block.
    #[must_use]
    pub fn directory_range(&self) -> CellRange {
        let (lo, hi) = if self.id <= self.name {
            (self.id, self.name)
        } else {
            (self.name, self.id)
        };
        CellRange::open(&self.sheet, lo, hi, self.first_row)
    }

    /// Position of the id and name columns inside a [`Self::directory_range`] row.
    #[must_use]
    pub fn directory_offsets(&self) -> (usize, usize) {
        let lo = self.id.min(self.name).index();
        (
            (self.id.index() - lo) as usize,
            (self.name.index() - lo) as usize,
        )
    }

    /// Header row cells for a newly allocated block, as a single row spanning
    /// the id and name columns.
    #[must_use]
    pub fn header_write(&self, block_start: u32, chat_id: &str, display_name: &str) -> (CellRange, Vec<Vec<String>>) {
        let (lo, hi) = if self.id <= self.name {
            (self.id, self.name)
        } else {
            (self.name, self.id)
        };
        let width = (hi.index() - lo.index() + 1) as usize;
        let mut row = vec![String::new(); width];
        let (id_at, name_at) = self.directory_offsets();
        row[id_at] = chat_id.to_owned();
        row[name_at] = display_name.to_owned();
        (
            CellRange::rect(&self.sheet, lo, block_start, hi, block_start),
            vec![row],
        )
    }

    /// The id cell of a block's header row.
    #[must_use]
    pub fn id_cell(&self, block_start: u32) -> CellRange {
        CellRange::cell(&self.sheet, self.id, block_start)
    }

    /// The goal column of a period across all rows of a block.
    #[must_use]
    pub fn goal_range(&self, block_start: u32, period: Period) -> CellRange {
        let col = self.columns(period).goal;
        CellRange::rect(
            &self.sheet,
            col,
            block_start,
            col,
            block_start + self.block_size - 1,
        )
    }

    /// The comment cell of a period.
    #[must_use]
    pub fn comment_cell(&self, block_start: u32, period: Period) -> CellRange {
        CellRange::cell(&self.sheet, self.columns(period).comment, block_start)
    }

    /// The last-updated cell of a period.
    #[must_use]
    pub fn updated_cell(&self, block_start: u32, period: Period) -> CellRange {
        CellRange::cell(&self.sheet, self.columns(period).updated, block_start)
    }
}

//! In-process tabular store.
//!
//! Mirrors the observable behaviour of the Sheets values API closely enough for
//! the directory and goal logic: reads trim trailing empty rows and cells,
//! writes of empty strings clear cells, appends land after the last row with
//! data. Every call yields to the scheduler once so concurrent callers
//! interleave the way they would against a remote store.

use super::{CellRange, Rows, TabularStore};
use crate::error::{BotError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

type Grid = BTreeMap<(u32, u32), String>;

/// Spreadsheet kept in memory.
#[derive(Debug)]
pub struct MemoryStore {
    sheets: Mutex<HashMap<String, Grid>>,
    unavailable: AtomicBool,
    /// Remaining successful writes before failures start; `usize::MAX` = never.
    writes_before_failure: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sheets: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            writes_before_failure: AtomicUsize::new(usize::MAX),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent call fail with [`BotError::StoreUnavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Let `n` more writes succeed, then fail every write after them.
    pub fn fail_writes_after(&self, n: usize) {
        self.writes_before_failure.store(n, Ordering::SeqCst);
    }

    /// Number of read calls served.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of successful write and append calls.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Set one cell directly (zero-based column index, one-based row).
    pub fn put(&self, sheet: &str, col: u32, row: u32, value: &str) {
        if let Ok(mut sheets) = self.sheets.lock() {
            let grid = sheets.entry(sheet.to_owned()).or_default();
            if value.is_empty() {
                grid.remove(&(row, col));
            } else {
                grid.insert((row, col), value.to_owned());
            }
        }
    }

    /// Read one cell directly.
    #[must_use]
    pub fn get(&self, sheet: &str, col: u32, row: u32) -> Option<String> {
        self.sheets
            .lock()
            .ok()?
            .get(sheet)?
            .get(&(row, col))
            .cloned()
    }

    /// Clear every cell of a row (used to simulate an administrator deleting a user).
    pub fn clear_row(&self, sheet: &str, row: u32) {
        if let Ok(mut sheets) = self.sheets.lock()
            && let Some(grid) = sheets.get_mut(sheet)
        {
            grid.retain(|(r, _), _| *r != row);
        }
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BotError::StoreUnavailable("memory store offline".to_owned()));
        }
        Ok(())
    }

    fn consume_write_budget(&self) -> Result<()> {
        let outcome = self
            .writes_before_failure
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                usize::MAX => Some(usize::MAX),
                0 => None,
                n => Some(n - 1),
            });
        match outcome {
            Ok(_) => Ok(()),
            Err(_) => Err(BotError::StoreUnavailable(
                "memory store rejected write".to_owned(),
            )),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Grid>>> {
        self.sheets
            .lock()
            .map_err(|_| BotError::StoreUnavailable("memory store lock poisoned".to_owned()))
    }

    fn last_data_row(grid: &Grid, range: &CellRange) -> Option<u32> {
        let (lo, hi) = (range.start_col.index(), range.end_col.index());
        grid.keys()
            .filter(|(row, col)| *row >= range.start_row && (lo..=hi).contains(col))
            .map(|(row, _)| *row)
            .max()
    }

    fn put_rows(grid: &mut Grid, range: &CellRange, first_row: u32, rows: Rows) {
        let lo = range.start_col.index();
        for (dy, row) in rows.into_iter().enumerate() {
            for (dx, value) in row.into_iter().enumerate() {
                let key = (first_row + dy as u32, lo + dx as u32);
                if value.is_empty() {
                    grid.remove(&key);
                } else {
                    grid.insert(key, value);
                }
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn read(&self, range: &CellRange) -> Result<Rows> {
        tokio::task::yield_now().await;
        self.check_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);

        let sheets = self.lock()?;
        let Some(grid) = sheets.get(&range.sheet) else {
            return Ok(Vec::new());
        };
        let last = match range.end_row {
            Some(end) => Self::last_data_row(grid, range).map(|row| row.min(end)),
            None => Self::last_data_row(grid, range),
        };
        let Some(last) = last else {
            return Ok(Vec::new());
        };

        let (lo, hi) = (range.start_col.index(), range.end_col.index());
        let mut rows = Vec::new();
        for row in range.start_row..=last {
            let mut values: Vec<String> = (lo..=hi)
                .map(|col| grid.get(&(row, col)).cloned().unwrap_or_default())
                .collect();
            while values.last().is_some_and(String::is_empty) {
                values.pop();
            }
            rows.push(values);
        }
        Ok(rows)
    }

    async fn write(&self, range: &CellRange, rows: Rows) -> Result<()> {
        tokio::task::yield_now().await;
        self.check_available()?;
        self.consume_write_budget()?;

        let mut sheets = self.lock()?;
        let grid = sheets.entry(range.sheet.clone()).or_default();
        Self::put_rows(grid, range, range.start_row, rows);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn append(&self, range: &CellRange, rows: Rows) -> Result<()> {
        tokio::task::yield_now().await;
        self.check_available()?;
        self.consume_write_budget()?;

        let mut sheets = self.lock()?;
        let grid = sheets.entry(range.sheet.clone()).or_default();
        let first_row = Self::last_data_row(grid, range)
            .map(|row| row + 1)
            .unwrap_or(range.start_row);
        Self::put_rows(grid, range, first_row, rows);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

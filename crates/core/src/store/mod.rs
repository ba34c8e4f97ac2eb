//! Tabular store capability and A1-style addressing.
//!
//! The roster core never talks to a spreadsheet API directly. It reads and
//! writes through [`TabularStore`], addressing cells with [`CellRef`] and
//! [`CellRange`], which render to the conventional `Sheet!A1:Z1` notation.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod memory;

pub use memory::InMemoryTabularStore;

/// Rows of cell values as returned by a range read. Rows and cells may be
/// ragged; trailing empty cells and rows are usually omitted by the store.
pub type Grid = Vec<Vec<Value>>;

const SPREADSHEET_URL_PREFIX: &str = "https://docs.google.com/spreadsheets/d/";

/// Identifies one sheet (tab) inside one spreadsheet.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RosterSource {
    spreadsheet_id: String,
    sheet_name: String,
}

impl RosterSource {
    pub fn new(spreadsheet_id: impl Into<String>, sheet_name: impl Into<String>) -> Self {
        Self { spreadsheet_id: spreadsheet_id.into(), sheet_name: sheet_name.into() }
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn spreadsheet_url(&self) -> String {
        format!("{SPREADSHEET_URL_PREFIX}{}", self.spreadsheet_id)
    }

    /// Full A1 notation for `range` on this source's sheet.
    pub fn a1(&self, range: &CellRange) -> String {
        format!("{}!{range}", quote_sheet_name(&self.sheet_name))
    }
}

impl fmt::Display for RosterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.spreadsheet_id, self.sheet_name)
    }
}

/// A single cell: 0-based column index, 1-based row number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub column: u32,
    pub row: u32,
}

impl CellRef {
    pub fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.column), self.row)
    }
}

/// A rectangular range. `None` bounds are open: a range without columns spans
/// whole rows, a range without an end row runs to the last populated row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub first_column: Option<u32>,
    pub last_column: Option<u32>,
    pub first_row: u32,
    pub last_row: Option<u32>,
}

impl CellRange {
    /// Whole rows `first..=last`, rendered as `1:1`.
    pub fn rows(first: u32, last: u32) -> Self {
        Self { first_column: None, last_column: None, first_row: first, last_row: Some(last) }
    }

    /// Columns `first..=last` from `first_row` down to the last populated row,
    /// rendered as `A3:O`.
    pub fn columns_from(first: u32, last: u32, first_row: u32) -> Self {
        Self {
            first_column: Some(first),
            last_column: Some(last),
            first_row,
            last_row: None,
        }
    }

    pub fn cell(cell: CellRef) -> Self {
        Self {
            first_column: Some(cell.column),
            last_column: Some(cell.column),
            first_row: cell.row,
            last_row: Some(cell.row),
        }
    }

    pub fn contains_row(&self, row: u32) -> bool {
        row >= self.first_row && self.last_row.map_or(true, |last| row <= last)
    }

    pub fn contains_column(&self, column: u32) -> bool {
        self.first_column.map_or(true, |first| column >= first)
            && self.last_column.map_or(true, |last| column <= last)
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.first_column, self.last_column, self.last_row) {
            (Some(first), Some(last), Some(last_row))
                if first == last && self.first_row == last_row =>
            {
                write!(f, "{}", CellRef::new(first, self.first_row))
            }
            (Some(first), Some(last), Some(last_row)) => write!(
                f,
                "{}{}:{}{}",
                column_letters(first),
                self.first_row,
                column_letters(last),
                last_row
            ),
            (Some(first), Some(last), None) => {
                write!(f, "{}{}:{}", column_letters(first), self.first_row, column_letters(last))
            }
            (None, None, Some(last_row)) => write!(f, "{}:{}", self.first_row, last_row),
            (first, last, last_row) => {
                let first = first.map(column_letters).unwrap_or_default();
                let last = last.map(column_letters).unwrap_or_default();
                let last_row = last_row.map(|row| row.to_string()).unwrap_or_default();
                write!(f, "{first}{}:{last}{last_row}", self.first_row)
            }
        }
    }
}

/// Spreadsheet column letters for a 0-based column index: `0 -> A`,
/// `25 -> Z`, `26 -> AA`.
pub fn column_letters(index: u32) -> String {
    let mut letters = Vec::new();
    let mut remaining = u64::from(index) + 1;
    while remaining > 0 {
        let offset = ((remaining - 1) % 26) as u8;
        letters.push(char::from(b'A' + offset));
        remaining = (remaining - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn quote_sheet_name(name: &str) -> String {
    let plain = !name.is_empty() && name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if plain {
        name.to_owned()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(String),
    #[error("store rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("store response could not be decoded: {0}")]
    Decode(String),
    #[error("invalid range `{0}`")]
    InvalidRange(String),
}

/// Read/write access to a spreadsheet-like backing store.
#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn read_range(&self, source: &RosterSource, range: &CellRange)
        -> Result<Grid, StoreError>;

    async fn write_cell(
        &self,
        source: &RosterSource,
        cell: CellRef,
        value: &str,
    ) -> Result<(), StoreError>;

    async fn clear_cell(&self, source: &RosterSource, cell: CellRef) -> Result<(), StoreError>;
}

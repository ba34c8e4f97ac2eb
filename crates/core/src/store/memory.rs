use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;

use super::{CellRange, CellRef, Grid, RosterSource, StoreError, TabularStore};

/// Process-local [`TabularStore`] that mimics the trimming behaviour of a
/// spreadsheet values API: trailing empty cells and trailing empty rows are
/// omitted from reads.
#[derive(Default)]
pub struct InMemoryTabularStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    sheets: HashMap<RosterSource, Vec<Vec<String>>>,
    reads: usize,
    writes: usize,
    fail_reads: bool,
    fail_writes: bool,
}

impl InMemoryTabularStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the sheet behind `source` with `rows` (row 1 first).
    pub async fn seed<R, C>(&self, source: &RosterSource, rows: R)
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let rows = rows.into_iter().map(|row| row.into_iter().map(Into::into).collect()).collect();
        self.state.write().await.sheets.insert(source.clone(), rows);
    }

    pub async fn cell(&self, source: &RosterSource, cell: CellRef) -> Option<String> {
        let state = self.state.read().await;
        let rows = state.sheets.get(source)?;
        let row = rows.get(cell.row.checked_sub(1)? as usize)?;
        row.get(cell.column as usize).filter(|value| !value.is_empty()).cloned()
    }

    pub async fn read_count(&self) -> usize {
        self.state.read().await.reads
    }

    pub async fn write_count(&self) -> usize {
        self.state.read().await.writes
    }

    pub async fn fail_reads(&self, fail: bool) {
        self.state.write().await.fail_reads = fail;
    }

    pub async fn fail_writes(&self, fail: bool) {
        self.state.write().await.fail_writes = fail;
    }
}

#[async_trait::async_trait]
impl TabularStore for InMemoryTabularStore {
    async fn read_range(
        &self,
        source: &RosterSource,
        range: &CellRange,
    ) -> Result<Grid, StoreError> {
        let mut state = self.state.write().await;
        state.reads += 1;
        if state.fail_reads {
            return Err(StoreError::Request("in-memory store read failure".to_owned()));
        }

        let rows = state.sheets.get(source).ok_or_else(|| unknown_sheet(source, range))?;
        let last_row = range.last_row.unwrap_or(rows.len() as u32);

        let mut grid = Grid::new();
        for row_number in range.first_row.max(1)..=last_row {
            let cells = rows.get(row_number as usize - 1).map(Vec::as_slice).unwrap_or_default();
            let mut row: Vec<Value> = cells
                .iter()
                .enumerate()
                .filter(|(column, _)| range.contains_column(*column as u32))
                .map(|(_, value)| Value::String(value.clone()))
                .collect();
            while matches!(row.last(), Some(Value::String(value)) if value.is_empty()) {
                row.pop();
            }
            grid.push(row);
        }
        while matches!(grid.last(), Some(row) if row.is_empty()) {
            grid.pop();
        }

        Ok(grid)
    }

    async fn write_cell(
        &self,
        source: &RosterSource,
        cell: CellRef,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.writes += 1;
        if state.fail_writes {
            return Err(StoreError::Rejected {
                status: 403,
                message: "in-memory store write failure".to_owned(),
            });
        }

        let rows = state
            .sheets
            .get_mut(source)
            .ok_or_else(|| unknown_sheet(source, &CellRange::cell(cell)))?;
        let row_index = cell.row.checked_sub(1).ok_or_else(|| {
            StoreError::InvalidRange(source.a1(&CellRange::cell(cell)))
        })? as usize;
        if rows.len() <= row_index {
            rows.resize_with(row_index + 1, Vec::new);
        }
        let row = &mut rows[row_index];
        let column = cell.column as usize;
        if row.len() <= column {
            row.resize(column + 1, String::new());
        }
        row[column] = value.to_owned();
        Ok(())
    }

    async fn clear_cell(&self, source: &RosterSource, cell: CellRef) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.writes += 1;
        if state.fail_writes {
            return Err(StoreError::Rejected {
                status: 403,
                message: "in-memory store write failure".to_owned(),
            });
        }

        let rows = state
            .sheets
            .get_mut(source)
            .ok_or_else(|| unknown_sheet(source, &CellRange::cell(cell)))?;
        let slot = cell
            .row
            .checked_sub(1)
            .and_then(|row| rows.get_mut(row as usize))
            .and_then(|row| row.get_mut(cell.column as usize));
        if let Some(value) = slot {
            value.clear();
        }
        Ok(())
    }
}

fn unknown_sheet(source: &RosterSource, range: &CellRange) -> StoreError {
    StoreError::Rejected {
        status: 400,
        message: format!("Unable to parse range: {}", source.a1(range)),
    }
}

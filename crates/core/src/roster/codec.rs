//! Pure conversions between sheet grids and roster records.
//!
//! Nothing in here performs I/O; callers hand in the rows a
//! [`TabularStore`](crate::store::TabularStore) returned.

use std::fmt::Write as _;

use serde_json::Value;
use thiserror::Error;

use super::{PartyBlock, Roster, SlotRecord, PARTY_WIDTH};

pub use crate::store::column_letters;

/// Rendered column widths for number, role, weapon, notes, player.
pub const COLUMN_WIDTHS: [usize; 5] = [3, 6, 15, 20, 10];
pub const COLUMN_TITLES: [&str; 5] = ["No", "Role", "Weapon", "Notes", "Player"];
const RULE_WIDTH: usize = 55;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("party `{0}` not found in roster header")]
    NotFound(String),
}

/// Inclusive 0-based column range occupied by the party at `party_index`.
pub fn party_columns(party_index: u32) -> (u32, u32) {
    let first = party_index * PARTY_WIDTH;
    (first, first + PARTY_WIDTH - 1)
}

/// Text content of a cell. Anything that is not a string decodes as empty.
pub fn cell_text(value: &Value) -> String {
    value.as_str().map(str::to_owned).unwrap_or_default()
}

fn cell_at(row: &[Value], column: usize) -> String {
    row.get(column).map(cell_text).unwrap_or_default()
}

/// Party names found at stride positions of the header row, paired with their
/// stride index. Empty stride cells are skipped.
pub fn discover_parties(header: &[Value]) -> Vec<(u32, String)> {
    header
        .iter()
        .step_by(PARTY_WIDTH as usize)
        .enumerate()
        .filter_map(|(index, cell)| {
            let name = cell_text(cell);
            (!name.is_empty()).then_some((index as u32, name))
        })
        .collect()
}

/// Decodes a header row and the data rows below the sub-header (row 3 first)
/// into a [`Roster`]. Data rows span the whole sheet width.
pub fn decode(header: &[Value], rows: &[Vec<Value>]) -> Roster {
    let parties = discover_parties(header);
    let mut roster = Roster {
        party_names: parties.iter().map(|(_, name)| name.clone()).collect(),
        blocks: Vec::with_capacity(parties.len()),
    };

    for (index, name) in parties {
        let (first_column, _) = party_columns(index);
        roster.blocks.push(PartyBlock {
            index,
            name,
            slots: decode_slots(rows, first_column as usize),
        });
    }

    roster
}

/// Decodes rows that were already narrowed to one block's five columns.
pub fn decode_block(index: u32, name: impl Into<String>, rows: &[Vec<Value>]) -> PartyBlock {
    PartyBlock { index, name: name.into(), slots: decode_slots(rows, 0) }
}

fn decode_slots(rows: &[Vec<Value>], first_column: usize) -> Vec<SlotRecord> {
    let mut slots = Vec::with_capacity(rows.len());
    let mut populated = 0;
    let mut previous_role = String::new();

    for row in rows {
        let [number, role, weapon, notes, player]: [String; 5] =
            std::array::from_fn(|offset| cell_at(row, first_column + offset));

        if [&number, &role, &weapon, &notes, &player].iter().any(|field| !field.is_empty()) {
            populated = slots.len() + 1;
        }

        let role = if role.is_empty() {
            previous_role.clone()
        } else {
            previous_role.clone_from(&role);
            role
        };

        slots.push(SlotRecord { number, role, weapon, notes, player });
    }

    slots.truncate(populated);
    slots
}

/// Stride index of `target` in the header row. Exact, case-sensitive match
/// against stride cells only.
pub fn locate(header: &[Value], target: &str) -> Result<u32, CodecError> {
    discover_parties(header)
        .into_iter()
        .find_map(|(index, name)| (name == target).then_some(index))
        .ok_or_else(|| CodecError::NotFound(target.to_owned()))
}

/// Renders a block as a fixed-width table. Over-long values are cut to their
/// column width.
pub fn encode(block: &PartyBlock) -> String {
    let mut table = String::new();
    push_row(&mut table, COLUMN_TITLES);
    table.push_str(&"-".repeat(RULE_WIDTH));
    table.push('\n');

    for slot in &block.slots {
        push_row(
            &mut table,
            [
                slot.number.as_str(),
                slot.role.as_str(),
                slot.weapon.as_str(),
                slot.notes.as_str(),
                slot.player.as_str(),
            ],
        );
    }

    table
}

fn push_row(table: &mut String, fields: [&str; 5]) {
    for (position, (field, width)) in fields.iter().zip(COLUMN_WIDTHS).enumerate() {
        if position > 0 {
            table.push(' ');
        }
        let _ = write!(table, "{:<width$}", truncate(field, width));
    }
    table.push('\n');
}

fn truncate(value: &str, width: usize) -> &str {
    match value.char_indices().nth(width) {
        Some((cut, _)) => &value[..cut],
        None => value,
    }
}

//! Party roster model.
//!
//! A roster sheet is laid out as side-by-side party blocks, each five columns
//! wide:
//!
//! ```text
//! row 1:  Alpha |      |        |       |        | Bravo | ...
//! row 2:  No    | Role | Weapon | Notes | Player | No    | ...
//! row 3+: slot rows
//! ```
//!
//! - **Codec** (`codec`) - header/data rows to [`PartyBlock`]s, and blocks to text tables
//! - **Claim** (`claim`) - write a player into an empty slot exactly once
//! - **Reader** (`reader`) - fetch and decode a whole roster from a [`TabularStore`]
//!
//! [`TabularStore`]: crate::store::TabularStore

use serde::{Deserialize, Serialize};

pub mod claim;
pub mod codec;
pub mod reader;

/// Columns per party block: number, role, weapon, notes, player.
pub const PARTY_WIDTH: u32 = 5;

/// Row 1 holds party names, row 2 the column sub-header; slots start at row 3.
pub const HEADER_ROWS: u32 = 2;

/// Offset of the player column inside a block.
pub const PLAYER_COLUMN_OFFSET: u32 = PARTY_WIDTH - 1;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub number: String,
    pub role: String,
    pub weapon: String,
    pub notes: String,
    pub player: String,
}

impl SlotRecord {
    pub fn is_claimed(&self) -> bool {
        !self.player.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyBlock {
    /// Stride position in the header row; fixes the block's columns.
    pub index: u32,
    pub name: String,
    pub slots: Vec<SlotRecord>,
}

impl PartyBlock {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self { index, name: name.into(), slots: Vec::new() }
    }

    pub fn open_slots(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_claimed()).count()
    }
}

/// A decoded roster sheet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub party_names: Vec<String>,
    pub blocks: Vec<PartyBlock>,
}

impl Roster {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::{codec, HEADER_ROWS, PARTY_WIDTH, PLAYER_COLUMN_OFFSET};
use crate::store::{CellRange, CellRef, RosterSource, StoreError, TabularStore};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClaimReceipt {
    pub party_index: u32,
    pub party_name: String,
    pub slot_number: u32,
    pub claimant: String,
    pub cell: CellRef,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClaimError {
    #[error("party `{0}` not found in roster header")]
    PartyNotFound(String),
    #[error("slot {slot_number} in party `{party_name}` is already claimed by {occupant}")]
    AlreadyClaimed { party_name: String, slot_number: u32, occupant: String },
    #[error("slot number {0} is not a roster row (slots start at 1)")]
    InvalidSlot(u32),
    #[error("claimant name must not be blank")]
    InvalidClaimant,
    #[error("roster read failed: {0}")]
    ReadFailed(#[source] StoreError),
    #[error("roster write failed: {0}")]
    WriteFailed(#[source] StoreError),
}

/// Player cell for `slot_number` of the party at stride `party_index`, or
/// `None` when the address does not fit a sheet row or column.
pub fn player_cell(party_index: u32, slot_number: u32) -> Option<CellRef> {
    let column = party_index.checked_mul(PARTY_WIDTH)?.checked_add(PLAYER_COLUMN_OFFSET)?;
    let row = slot_number.checked_add(HEADER_ROWS)?;
    Some(CellRef::new(column, row))
}

/// Commits slot claims against a [`TabularStore`].
///
/// Conflict detection is a re-read of the player cell immediately before the
/// write. There is no lock or version token in between, so two claims racing
/// on the same empty slot can both pass the read; the write that lands last
/// wins.
#[derive(Clone)]
pub struct ClaimEngine {
    store: Arc<dyn TabularStore>,
}

impl ClaimEngine {
    pub fn new(store: Arc<dyn TabularStore>) -> Self {
        Self { store }
    }

    pub async fn claim(
        &self,
        source: &RosterSource,
        party_name: &str,
        slot_number: u32,
        claimant: &str,
    ) -> Result<ClaimReceipt, ClaimError> {
        if slot_number == 0 || slot_number.checked_add(HEADER_ROWS).is_none() {
            return Err(ClaimError::InvalidSlot(slot_number));
        }
        let claimant = claimant.trim();
        if claimant.is_empty() {
            return Err(ClaimError::InvalidClaimant);
        }

        let header = self
            .store
            .read_range(source, &CellRange::rows(1, 1))
            .await
            .map_err(ClaimError::ReadFailed)?;
        let header = header.into_iter().next().unwrap_or_default();
        let party_index = codec::locate(&header, party_name)
            .map_err(|_| ClaimError::PartyNotFound(party_name.to_owned()))?;

        // Slot rows past the end of the block are written as-is; the block
        // simply grows.
        let cell =
            player_cell(party_index, slot_number).ok_or(ClaimError::InvalidSlot(slot_number))?;
        let current = self
            .store
            .read_range(source, &CellRange::cell(cell))
            .await
            .map_err(ClaimError::ReadFailed)?;
        let occupant = current
            .first()
            .and_then(|row| row.first())
            .map(codec::cell_text)
            .unwrap_or_default();

        if !occupant.is_empty() {
            warn!(
                event_name = "roster.claim.conflict",
                source = %source,
                party = party_name,
                slot_number,
                cell = %cell,
                "slot already claimed"
            );
            return Err(ClaimError::AlreadyClaimed {
                party_name: party_name.to_owned(),
                slot_number,
                occupant,
            });
        }

        self.store.write_cell(source, cell, claimant).await.map_err(ClaimError::WriteFailed)?;

        info!(
            event_name = "roster.claim.committed",
            source = %source,
            party = party_name,
            party_index,
            slot_number,
            cell = %cell,
            "slot claimed"
        );

        Ok(ClaimReceipt {
            party_index,
            party_name: party_name.to_owned(),
            slot_number,
            claimant: claimant.to_owned(),
            cell,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{player_cell, ClaimEngine, ClaimError};
    use crate::store::{CellRef, InMemoryTabularStore, RosterSource, TabularStore};

    fn source() -> RosterSource {
        RosterSource::new("sheet-1", "Mooncrat")
    }

    async fn seeded_store() -> Arc<InMemoryTabularStore> {
        let store = Arc::new(InMemoryTabularStore::new());
        store
            .seed(
                &source(),
                vec![
                    vec!["Alpha", "", "", "", "", "Bravo", "", "", "", ""],
                    vec!["No", "Role", "Weapon", "Notes", "Player", "No", "Role", "Weapon"],
                    vec!["1", "Tank", "Sword", "", "", "1", "Scout", "Bow", "", ""],
                    vec!["2", "", "Axe", "", "Carol", "2", "", "Bow", "", ""],
                ],
            )
            .await;
        store
    }

    #[test]
    fn player_cell_uses_last_block_column_and_header_offset() {
        assert_eq!(player_cell(0, 1), Some(CellRef::new(4, 3)));
        assert_eq!(player_cell(2, 1).map(|cell| cell.to_string()), Some("O3".to_owned()));
        assert_eq!(player_cell(0, u32::MAX), None);
    }

    #[tokio::test]
    async fn claim_writes_empty_slot_then_reports_conflict() {
        let store = seeded_store().await;
        let engine = ClaimEngine::new(store.clone());

        let receipt = engine.claim(&source(), "Bravo", 1, "Bob").await.expect("first claim");

        assert_eq!(receipt.party_index, 1);
        assert_eq!(receipt.slot_number, 1);
        assert_eq!(receipt.cell, CellRef::new(9, 3));
        assert_eq!(store.cell(&source(), CellRef::new(9, 3)).await.as_deref(), Some("Bob"));

        let second = engine.claim(&source(), "Bravo", 1, "Eve").await;
        assert_eq!(
            second,
            Err(ClaimError::AlreadyClaimed {
                party_name: "Bravo".to_owned(),
                slot_number: 1,
                occupant: "Bob".to_owned(),
            })
        );
        assert_eq!(store.cell(&source(), CellRef::new(9, 3)).await.as_deref(), Some("Bob"));
    }

    #[tokio::test]
    async fn slot_becomes_claimable_again_after_external_clear() {
        let store = seeded_store().await;
        let engine = ClaimEngine::new(store.clone());

        assert!(matches!(
            engine.claim(&source(), "Alpha", 2, "Dan").await,
            Err(ClaimError::AlreadyClaimed { .. })
        ));

        store.clear_cell(&source(), CellRef::new(4, 4)).await.expect("clear");
        let receipt = engine.claim(&source(), "Alpha", 2, "Dan").await.expect("claim after clear");
        assert_eq!(receipt.party_index, 0);
    }

    #[tokio::test]
    async fn unknown_party_fails_without_writing() {
        let store = seeded_store().await;
        let engine = ClaimEngine::new(store.clone());

        let result = engine.claim(&source(), "alpha", 1, "Bob").await;

        assert_eq!(result, Err(ClaimError::PartyNotFound("alpha".to_owned())));
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn out_of_range_slot_extends_block() {
        let store = seeded_store().await;
        let engine = ClaimEngine::new(store.clone());

        let receipt = engine.claim(&source(), "Alpha", 9, "Zed").await.expect("claim");

        assert_eq!(receipt.cell, CellRef::new(4, 11));
        assert_eq!(store.cell(&source(), CellRef::new(4, 11)).await.as_deref(), Some("Zed"));
    }

    #[tokio::test]
    async fn zero_slot_and_blank_claimant_are_rejected_before_io() {
        let store = seeded_store().await;
        let engine = ClaimEngine::new(store.clone());

        let zero = engine.claim(&source(), "Alpha", 0, "Bob").await;
        assert_eq!(zero, Err(ClaimError::InvalidSlot(0)));
        let blank = engine.claim(&source(), "Alpha", 1, "  ").await;
        assert_eq!(blank, Err(ClaimError::InvalidClaimant));
        assert_eq!(store.read_count().await, 0);
    }

    #[tokio::test]
    async fn slot_numbers_past_the_last_sheet_row_are_rejected_before_io() {
        let store = seeded_store().await;
        let engine = ClaimEngine::new(store.clone());

        for slot in [u32::MAX, u32::MAX - 1] {
            let result = engine.claim(&source(), "Alpha", slot, "Bob").await;
            assert_eq!(result, Err(ClaimError::InvalidSlot(slot)));
        }
        assert_eq!(store.read_count().await, 0);
        assert_eq!(store.write_count().await, 0);
        assert_eq!(store.cell(&source(), CellRef::new(4, 1)).await, None);
    }

    #[tokio::test]
    async fn rejected_write_surfaces_as_write_failed() {
        let store = seeded_store().await;
        store.fail_writes(true).await;
        let engine = ClaimEngine::new(store.clone());

        let result = engine.claim(&source(), "Alpha", 1, "Bob").await;

        assert!(matches!(result, Err(ClaimError::WriteFailed(_))));
    }

    #[tokio::test]
    async fn failed_read_surfaces_as_read_failed() {
        let store = seeded_store().await;
        store.fail_reads(true).await;
        let engine = ClaimEngine::new(store.clone());

        let result = engine.claim(&source(), "Alpha", 1, "Bob").await;

        assert!(matches!(result, Err(ClaimError::ReadFailed(_))));
        assert_eq!(store.write_count().await, 0);
    }
}

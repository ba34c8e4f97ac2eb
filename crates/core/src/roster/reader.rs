use tracing::debug;

use super::{codec, Roster, HEADER_ROWS};
use crate::store::{CellRange, RosterSource, StoreError, TabularStore};

/// Reads the header row and every party's slot rows, then decodes them.
/// A sheet without a header row is an empty roster.
pub async fn read_roster(
    store: &dyn TabularStore,
    source: &RosterSource,
) -> Result<Roster, StoreError> {
    let header = store.read_range(source, &CellRange::rows(1, 1)).await?;
    let header = header.into_iter().next().unwrap_or_default();

    let Some(last_index) = codec::discover_parties(&header).last().map(|(index, _)| *index) else {
        debug!(source = %source, "roster header has no parties");
        return Ok(Roster::default());
    };

    let (_, last_column) = codec::party_columns(last_index);
    let rows =
        store.read_range(source, &CellRange::columns_from(0, last_column, HEADER_ROWS + 1)).await?;

    let roster = codec::decode(&header, &rows);
    debug!(
        source = %source,
        parties = roster.blocks.len(),
        rows = rows.len(),
        "roster decoded"
    );
    Ok(roster)
}

#[cfg(test)]
mod tests {
    use super::read_roster;
    use crate::store::{InMemoryTabularStore, RosterSource};

    #[tokio::test]
    async fn reads_every_block_from_one_wide_range() {
        let store = InMemoryTabularStore::new();
        let source = RosterSource::new("sheet-1", "Mooncrat");
        store
            .seed(
                &source,
                vec![
                    vec!["Alpha", "", "", "", "", "Bravo"],
                    vec!["No", "Role", "Weapon", "Notes", "Player", "No"],
                    vec!["1", "Tank", "Sword", "", "P1", "1", "Scout"],
                    vec!["", "", "", "", "", "2", "", "Bow"],
                ],
            )
            .await;

        let roster = read_roster(&store, &source).await.expect("roster");

        assert_eq!(roster.party_names, vec!["Alpha", "Bravo"]);
        assert_eq!(roster.blocks[0].slots.len(), 1);
        assert_eq!(roster.blocks[1].slots.len(), 2);
        assert_eq!(roster.blocks[1].slots[1].role, "Scout");
        assert_eq!(store.read_count().await, 2);
    }

    #[tokio::test]
    async fn sheet_without_header_is_an_empty_roster() {
        let store = InMemoryTabularStore::new();
        let source = RosterSource::new("sheet-1", "Blank");
        store.seed(&source, Vec::<Vec<&str>>::new()).await;

        let roster = read_roster(&store, &source).await.expect("roster");

        assert!(roster.is_empty());
        assert_eq!(store.read_count().await, 1);
    }
}

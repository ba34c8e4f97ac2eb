use std::sync::Arc;

use rollcall_core::config::{AppConfig, LoadOptions};
use rollcall_core::roster::codec;
use rollcall_core::{read_roster, InMemoryTabularStore, Roster, RosterSource, TabularStore};
use rollcall_sheets::SheetsClient;
use serde_json::json;

use super::CommandResult;

const COMMAND: &str = "preview";
const DEMO_SPREADSHEET_ID: &str = "demo";
const DEMO_TAB: &str = "Mooncrat";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreviewOptions {
    pub sheet: Option<String>,
    pub tab: Option<String>,
    pub demo: bool,
}

pub fn run(options: PreviewOptions) -> CommandResult {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                1,
            );
        }
    };

    runtime.block_on(preview(options))
}

async fn preview(options: PreviewOptions) -> CommandResult {
    if options.demo {
        let source = RosterSource::new(DEMO_SPREADSHEET_ID, DEMO_TAB);
        let store = demo_store(&source).await;
        return read_and_render(store.as_ref(), &source).await;
    }

    let Some(sheet) = options.sheet else {
        return CommandResult::failure(COMMAND, "usage", "pass --sheet <id> or --demo", 2);
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2);
        }
    };
    let client = match SheetsClient::from_config(&config.sheets) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure(COMMAND, "sheets_client", error.to_string(), 3);
        }
    };

    let tab = options.tab.unwrap_or(config.sheets.default_tab);
    read_and_render(&client, &RosterSource::new(sheet, tab)).await
}

async fn read_and_render(store: &dyn TabularStore, source: &RosterSource) -> CommandResult {
    match read_roster(store, source).await {
        Ok(roster) => render(source, &roster),
        Err(error) => CommandResult::failure(
            COMMAND,
            "sheets_read",
            format!("failed to read roster from {source}: {error}"),
            4,
        ),
    }
}

fn render(source: &RosterSource, roster: &Roster) -> CommandResult {
    if roster.blocks.is_empty() {
        return CommandResult::success(
            COMMAND,
            format!("{source} has no parties in its header row"),
        );
    }

    let tables: Vec<String> = roster
        .blocks
        .iter()
        .map(|block| format!("Party Name : {}\n{}", block.name, codec::encode(block)))
        .collect();
    let parties: Vec<_> = roster
        .blocks
        .iter()
        .map(|block| {
            json!({
                "index": block.index,
                "name": block.name,
                "slots": block.slots.len(),
                "claimed": block.slots.len() - block.open_slots(),
                "open": block.open_slots(),
            })
        })
        .collect();

    CommandResult::success_with_details(
        COMMAND,
        tables.join("\n\n"),
        Some(json!({
            "source": source.to_string(),
            "url": source.spreadsheet_url(),
            "parties": parties,
        })),
    )
}

async fn demo_store(source: &RosterSource) -> Arc<InMemoryTabularStore> {
    let store = InMemoryTabularStore::new();
    store
        .seed(
            source,
            vec![
                vec!["Vanguard", "", "", "", "", "Rearguard"],
                vec![
                    "No", "Role", "Weapon", "Notes", "Player", "No", "Role", "Weapon", "Notes",
                    "Player",
                ],
                vec![
                    "1",
                    "Tank",
                    "Sword and Shield",
                    "",
                    "Aria",
                    "1",
                    "Healer",
                    "Life Staff",
                    "",
                    "",
                ],
                vec!["2", "", "Great Axe", "", "", "2", "", "Void Gauntlet", "", "Bram"],
                vec!["3", "DPS", "Bow", "flank left", "", "3", "DPS", "Musket", "", ""],
            ],
        )
        .await;
    Arc::new(store)
}

use std::sync::Arc;

use rollcall_core::config::{AppConfig, ConfigError, LoadOptions};
use rollcall_core::{TabularStore, ThreadTracker};
use rollcall_sheets::{SheetsClient, SheetsClientError};
use rollcall_slack::events::EventDispatcher;
use rollcall_slack::socket::{NoopSocketTransport, ReconnectPolicy, SocketModeRunner};
use rollcall_slack::{BotSettings, ChatError, ChatTransport, RosterBot, SlackWebClient};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub tracker: Arc<ThreadTracker>,
    pub slack_runner: SocketModeRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("sheets client setup failed: {0}")]
    Sheets(#[source] SheetsClientError),
    #[error("slack client setup failed: {0}")]
    Slack(#[source] ChatError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        thread_id = "unknown",
        "starting application bootstrap"
    );

    let sheets = SheetsClient::from_config(&config.sheets).map_err(BootstrapError::Sheets)?;
    let store: Arc<dyn TabularStore> = Arc::new(sheets);
    info!(
        event_name = "system.bootstrap.sheets_ready",
        correlation_id = "bootstrap",
        api_base_url = %config.sheets.api_base_url,
        default_tab = %config.sheets.default_tab,
        "sheets client configured"
    );

    let chat: Arc<dyn ChatTransport> =
        Arc::new(SlackWebClient::from_config(&config.slack).map_err(BootstrapError::Slack)?);
    let tracker = Arc::new(ThreadTracker::new(store.clone()));
    let bot = Arc::new(RosterBot::new(
        store,
        tracker.clone(),
        chat.clone(),
        BotSettings::from_config(&config),
    ));

    let slack_runner = SocketModeRunner::new(
        Arc::new(NoopSocketTransport),
        EventDispatcher::for_service(bot),
        ReconnectPolicy::default(),
    )
    .with_responder(chat);
    info!(
        event_name = "system.bootstrap.slack_ready",
        correlation_id = "bootstrap",
        api_base_url = %config.slack.api_base_url,
        "slack dispatcher configured"
    );

    Ok(Application { config, tracker, slack_runner })
}

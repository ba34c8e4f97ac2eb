use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rollcall_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let entries: [(&str, String, &str); 14] = [
        ("sheets.api_base_url", config.sheets.api_base_url.clone(), "ROLLCALL_SHEETS_API_BASE_URL"),
        (
            "sheets.access_token",
            redact_secret(config.sheets.access_token.expose_secret()),
            "ROLLCALL_SHEETS_ACCESS_TOKEN",
        ),
        ("sheets.default_tab", config.sheets.default_tab.clone(), "ROLLCALL_SHEETS_DEFAULT_TAB"),
        (
            "sheets.timeout_secs",
            config.sheets.timeout_secs.to_string(),
            "ROLLCALL_SHEETS_TIMEOUT_SECS",
        ),
        (
            "slack.app_token",
            redact_token(config.slack.app_token.expose_secret()),
            "ROLLCALL_SLACK_APP_TOKEN",
        ),
        (
            "slack.bot_token",
            redact_token(config.slack.bot_token.expose_secret()),
            "ROLLCALL_SLACK_BOT_TOKEN",
        ),
        ("slack.api_base_url", config.slack.api_base_url.clone(), "ROLLCALL_SLACK_API_BASE_URL"),
        ("roster.thread_title", config.roster.thread_title.clone(), "ROLLCALL_ROSTER_THREAD_TITLE"),
        (
            "roster.announcement_mention",
            config.roster.announcement_mention.clone().unwrap_or_else(|| "<unset>".to_string()),
            "ROLLCALL_ROSTER_ANNOUNCEMENT_MENTION",
        ),
        ("server.bind_address", config.server.bind_address.clone(), "ROLLCALL_SERVER_BIND_ADDRESS"),
        (
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            "ROLLCALL_SERVER_HEALTH_CHECK_PORT",
        ),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            "ROLLCALL_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        ("logging.level", config.logging.level.clone(), "ROLLCALL_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "ROLLCALL_LOGGING_FORMAT"),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in &entries {
        let source =
            field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, value, source));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["rollcall.toml", "config/rollcall.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let env_keys = [Some(env_key), legacy_env_alias(env_key)];
    if let Some(env_key) = env_keys.into_iter().flatten().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

/// Short env names still honoured for logging settings.
fn legacy_env_alias(env_key: &str) -> Option<&'static str> {
    match env_key {
        "ROLLCALL_LOGGING_LEVEL" => Some("ROLLCALL_LOG_LEVEL"),
        "ROLLCALL_LOGGING_FORMAT" => Some("ROLLCALL_LOG_FORMAT"),
        _ => None,
    }
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &str) -> String {
    if secret.trim().is_empty() {
        "<unset>".to_string()
    } else {
        "<redacted>".to_string()
    }
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

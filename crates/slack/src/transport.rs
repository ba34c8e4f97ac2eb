use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use rollcall_core::config::SlackConfig;
use rollcall_core::MessageHandle;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::blocks::{self, MessageTemplate};

const DEFAULT_RETRY_AFTER_SECS: u64 = 30;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Root of a conversation thread, addressed by the parent message timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ThreadHandle {
    pub channel_id: String,
    pub thread_ts: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("slack request failed: {0}")]
    Request(String),
    #[error("slack api `{method}` returned error `{error}`")]
    Api { method: String, error: String },
    #[error("slack rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },
    #[error("slack response for `{method}` is missing `{field}`")]
    MissingField { method: String, field: &'static str },
}

impl From<reqwest::Error> for ChatError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error.to_string())
    }
}

/// Outbound chat capability used by the roster bot.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Posts `message` to `channel_id`, as a thread reply when `thread_ts` is set.
    async fn post_message(
        &self,
        channel_id: &str,
        thread_ts: Option<&str>,
        message: &MessageTemplate,
    ) -> Result<MessageHandle, ChatError>;

    async fn edit_message(
        &self,
        handle: &MessageHandle,
        message: &MessageTemplate,
    ) -> Result<(), ChatError>;

    /// Opens a thread under `parent` by posting `title` as its first reply.
    async fn start_thread(
        &self,
        parent: &MessageHandle,
        title: &str,
    ) -> Result<ThreadHandle, ChatError>;

    async fn display_name(&self, user_id: &str) -> Result<String, ChatError>;
}

/// [`ChatTransport`] over the Slack Web API.
#[derive(Clone)]
pub struct SlackWebClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: SecretString,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    user: Option<UserInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct UserInfo {
    #[serde(default)]
    name: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    profile: UserProfile,
}

#[derive(Debug, Default, Deserialize)]
struct UserProfile {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    real_name: Option<String>,
}

impl UserInfo {
    fn preferred_name(&self) -> Option<&str> {
        [
            self.profile.display_name.as_deref(),
            self.profile.real_name.as_deref(),
            self.real_name.as_deref(),
            Some(self.name.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|name| !name.is_empty())
    }
}

impl SlackWebClient {
    pub fn new(base_url: impl Into<String>, bot_token: SecretString) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { http, base_url, bot_token })
    }

    pub fn from_config(config: &SlackConfig) -> Result<Self, ChatError> {
        Self::new(config.api_base_url.clone(), config.bot_token.clone())
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn api_call(&self, method: &str, payload: &Value) -> Result<ApiResponse, ChatError> {
        let response = self
            .http
            .post(self.method_url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .json(payload)
            .send()
            .await?;
        Self::read_response(method, response).await
    }

    async fn api_get(
        &self,
        method: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse, ChatError> {
        let url = Url::parse_with_params(&self.method_url(method), query)
            .map_err(|error| ChatError::Request(error.to_string()))?;
        let response =
            self.http.get(url).bearer_auth(self.bot_token.expose_secret()).send().await?;
        Self::read_response(method, response).await
    }

    async fn read_response(
        method: &str,
        response: reqwest::Response,
    ) -> Result<ApiResponse, ChatError> {
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("Retry-After")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            warn!(
                event_name = "egress.slack.rate_limited",
                method,
                retry_after_secs,
                "slack api rate limited"
            );
            return Err(ChatError::RateLimited { retry_after_secs });
        }

        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Api { method: method.to_owned(), error: status.to_string() });
        }

        let body: ApiResponse = response.json().await?;
        if !body.ok {
            let error = body.error.unwrap_or_else(|| "unknown_error".to_owned());
            warn!(event_name = "egress.slack.api_error", method, error = %error, "slack api error");
            return Err(ChatError::Api { method: method.to_owned(), error });
        }

        debug!(event_name = "egress.slack.api_ok", method, "slack api call succeeded");
        Ok(body)
    }

    fn message_payload(channel_id: &str, message: &MessageTemplate) -> Value {
        json!({
            "channel": channel_id,
            "text": message.fallback_text,
            "blocks": message.blocks,
        })
    }

    fn handle_from(
        method: &str,
        channel_id: &str,
        response: ApiResponse,
    ) -> Result<MessageHandle, ChatError> {
        let message_id =
            response.ts.ok_or(ChatError::MissingField { method: method.to_owned(), field: "ts" })?;
        Ok(MessageHandle {
            channel_id: response.channel.unwrap_or_else(|| channel_id.to_owned()),
            message_id,
        })
    }
}

#[async_trait]
impl ChatTransport for SlackWebClient {
    async fn post_message(
        &self,
        channel_id: &str,
        thread_ts: Option<&str>,
        message: &MessageTemplate,
    ) -> Result<MessageHandle, ChatError> {
        let mut payload = Self::message_payload(channel_id, message);
        if let Some(thread_ts) = thread_ts {
            payload["thread_ts"] = Value::String(thread_ts.to_owned());
        }

        let response = self.api_call("chat.postMessage", &payload).await?;
        Self::handle_from("chat.postMessage", channel_id, response)
    }

    async fn edit_message(
        &self,
        handle: &MessageHandle,
        message: &MessageTemplate,
    ) -> Result<(), ChatError> {
        let mut payload = Self::message_payload(&handle.channel_id, message);
        payload["ts"] = Value::String(handle.message_id.clone());

        self.api_call("chat.update", &payload).await.map(|_| ())
    }

    async fn start_thread(
        &self,
        parent: &MessageHandle,
        title: &str,
    ) -> Result<ThreadHandle, ChatError> {
        let title_message = blocks::thread_title_message(title);
        self.post_message(&parent.channel_id, Some(&parent.message_id), &title_message).await?;
        Ok(ThreadHandle {
            channel_id: parent.channel_id.clone(),
            thread_ts: parent.message_id.clone(),
        })
    }

    async fn display_name(&self, user_id: &str) -> Result<String, ChatError> {
        let response = self.api_get("users.info", &[("user", user_id)]).await?;
        let user = response
            .user
            .ok_or(ChatError::MissingField { method: "users.info".into(), field: "user" })?;
        Ok(user.preferred_name().unwrap_or(user_id).to_owned())
    }
}

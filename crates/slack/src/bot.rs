//! The roster bot: turns parsed commands into sheet reads, claims and chat posts.
//!
//! A muster reads the roster, posts the announcement, opens a thread under it
//! with one message per party and binds that thread. A join inside a bound
//! thread claims the slot, re-projects the party and edits its message.

use std::sync::Arc;

use async_trait::async_trait;
use rollcall_core::config::AppConfig;
use rollcall_core::roster::codec;
use rollcall_core::{
    read_roster, BoundParty, ClaimEngine, RosterError, RosterSource, TabularStore, ThreadId,
    ThreadTracker, TrackerError,
};
use tracing::{info, warn};

use crate::blocks::{self, Announcement, MessageTemplate};
use crate::commands::{
    failure_message, parse_failure_message, parse_thread_join, CommandEnvelope, JoinRequest,
    MusterRequest, RosterCommandService,
};
use crate::events::{EventContext, EventHandlerError, MessageEvent, MessageService};
use crate::transport::ChatTransport;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotSettings {
    pub thread_title: String,
    pub default_tab: String,
    pub announcement_mention: Option<String>,
    /// Messages authored by this user are never answered.
    pub bot_user_id: Option<String>,
}

impl BotSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            thread_title: config.roster.thread_title.clone(),
            default_tab: config.sheets.default_tab.clone(),
            announcement_mention: config.roster.announcement_mention.clone(),
            bot_user_id: None,
        }
    }
}

pub struct RosterBot {
    store: Arc<dyn TabularStore>,
    claims: ClaimEngine,
    tracker: Arc<ThreadTracker>,
    chat: Arc<dyn ChatTransport>,
    settings: BotSettings,
}

impl RosterBot {
    pub fn new(
        store: Arc<dyn TabularStore>,
        tracker: Arc<ThreadTracker>,
        chat: Arc<dyn ChatTransport>,
        settings: BotSettings,
    ) -> Self {
        Self { claims: ClaimEngine::new(store.clone()), store, tracker, chat, settings }
    }

    pub fn tracker(&self) -> &Arc<ThreadTracker> {
        &self.tracker
    }

    fn chat_failure(error: impl std::fmt::Display) -> RosterError {
        RosterError::Configuration(format!("chat delivery failed: {error}"))
    }

    /// Name written into the sheet for `user_id`. Falls back to the raw id
    /// when the profile lookup fails.
    async fn claimant_name(&self, user_id: &str) -> String {
        match self.chat.display_name(user_id).await {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => user_id.to_owned(),
            Err(error) => {
                warn!(
                    event_name = "roster.claimant.lookup_failed",
                    user_id,
                    error = %error,
                    "display name lookup failed; using user id"
                );
                user_id.to_owned()
            }
        }
    }

    async fn join_thread(
        &self,
        thread_id: ThreadId,
        request: JoinRequest,
        user_id: &str,
        correlation_id: &str,
    ) -> Result<MessageTemplate, RosterError> {
        let source = self.tracker.resolve(&thread_id).await?;
        let claimant = self.claimant_name(user_id).await;

        let receipt =
            self.claims.claim(&source, &request.party_name, request.slot_number, &claimant).await?;

        match self.tracker.project(&thread_id, receipt.party_index).await {
            Ok(projection) if projection.changed => {
                let message =
                    blocks::party_roster_message(&projection.party_name, &projection.rendered);
                if let Err(error) = self.chat.edit_message(&projection.message, &message).await {
                    warn!(
                        event_name = "roster.projection.edit_failed",
                        correlation_id,
                        thread_id = %thread_id,
                        party_index = receipt.party_index,
                        error = %error,
                        "claim committed but roster message was not updated"
                    );
                }
            }
            Ok(_) => {}
            Err(error) => {
                warn!(
                    event_name = "roster.projection.failed",
                    correlation_id,
                    thread_id = %thread_id,
                    party_index = receipt.party_index,
                    error = %error,
                    "claim committed but projection failed"
                );
            }
        }

        Ok(blocks::join_confirmation_message(
            &receipt.claimant,
            &receipt.party_name,
            receipt.slot_number,
        ))
    }

    fn is_own_message(&self, event: &MessageEvent) -> bool {
        event.bot_id.is_some()
            || self.settings.bot_user_id.as_deref().is_some_and(|id| id == event.user_id)
    }
}

#[async_trait]
impl RosterCommandService for RosterBot {
    async fn muster(
        &self,
        request: MusterRequest,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, RosterError> {
        let tab = request.tab.as_deref().unwrap_or(&self.settings.default_tab);
        let source = RosterSource::new(request.spreadsheet_id.as_str(), tab);
        let roster = read_roster(self.store.as_ref(), &source).await?;

        let sheet_url = source.spreadsheet_url();
        let announcement = blocks::announcement_message(&Announcement {
            title: &request.title,
            time: &request.time,
            objective: &request.objective,
            sheet_url: &sheet_url,
            mention: self.settings.announcement_mention.as_deref(),
        });
        let parent = self
            .chat
            .post_message(&envelope.channel_id, None, &announcement)
            .await
            .map_err(Self::chat_failure)?;
        let thread = self
            .chat
            .start_thread(&parent, &self.settings.thread_title)
            .await
            .map_err(Self::chat_failure)?;

        let mut parties = Vec::with_capacity(roster.blocks.len());
        for block in &roster.blocks {
            let rendered = codec::encode(block);
            let message = blocks::party_roster_message(&block.name, &rendered);
            let handle = self
                .chat
                .post_message(&thread.channel_id, Some(&thread.thread_ts), &message)
                .await
                .map_err(|error| {
                    warn!(
                        event_name = "roster.muster.party_post_failed",
                        correlation_id = %envelope.request_id,
                        party = %block.name,
                        error = %error,
                        "party roster message was not posted; thread left unbound"
                    );
                    Self::chat_failure(error)
                })?;
            let mut party = BoundParty::new(block.index, block.name.clone(), handle);
            party.last_rendered = Some(rendered);
            parties.push(party);
        }

        let thread_id = ThreadId(thread.thread_ts.clone());
        self.tracker.bind(thread_id.clone(), source.clone(), parties).await?;

        info!(
            event_name = "roster.muster.posted",
            correlation_id = %envelope.request_id,
            thread_id = %thread_id,
            source = %source,
            parties = roster.blocks.len(),
            "roster announcement posted"
        );
        Ok(blocks::muster_posted_message())
    }

    async fn join(
        &self,
        request: JoinRequest,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, RosterError> {
        let thread_id = envelope
            .thread_ts
            .clone()
            .map(ThreadId)
            .ok_or_else(|| TrackerError::UnknownThread(ThreadId(envelope.channel_id.clone())))?;

        self.join_thread(thread_id, request, &envelope.user_id, &envelope.request_id).await
    }
}

#[async_trait]
impl MessageService for RosterBot {
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError> {
        if self.is_own_message(event) {
            return Ok(None);
        }

        if let Some(thread_ts) = &event.thread_ts {
            match parse_thread_join(&event.text) {
                Some(Ok(request)) => {
                    let thread_id = ThreadId(thread_ts.clone());
                    let reply = self
                        .join_thread(thread_id, request, &event.user_id, &ctx.correlation_id)
                        .await
                        .unwrap_or_else(|error| failure_message(error, &ctx.correlation_id));
                    return Ok(Some(reply));
                }
                Some(Err(error)) => {
                    return Ok(Some(parse_failure_message(&error, &ctx.correlation_id)));
                }
                None => {}
            }
        }

        if event.text.contains("hello") {
            return Ok(Some(blocks::hello_message()));
        }
        if event.text.contains("!bye") {
            return Ok(Some(blocks::bye_message()));
        }
        Ok(None)
    }
}

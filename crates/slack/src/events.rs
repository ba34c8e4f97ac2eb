use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::{
    blocks::MessageTemplate,
    commands::{
        normalize_command, parse_failure_message, parse_slash_command, CommandParseError,
        CommandRouter, RosterCommandService, SlashCommandPayload,
    },
    transport::ChatError,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    Message(MessageEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::Message(_) => SlackEventType::Message,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    /// Channel and optional thread a response to this event should land in.
    /// Messages posted inside a thread are answered in that thread.
    pub fn reply_target(&self) -> Option<(&str, Option<&str>)> {
        match self {
            Self::SlashCommand(payload) => {
                Some((payload.channel_id.as_str(), payload.thread_ts.as_deref()))
            }
            Self::Message(event) => Some((event.channel_id.as_str(), event.thread_ts.as_deref())),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    Message,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub ts: String,
    /// Parent timestamp when the message is a thread reply.
    pub thread_ts: Option<String>,
    pub user_id: String,
    /// Set for messages posted by any bot, including this one.
    pub bot_id: Option<String>,
    pub text: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeDecodeError {
    #[error("socket payload is missing `{0}`")]
    MissingField(&'static str),
}

impl SlackEnvelope {
    /// Decodes one Socket Mode frame. Control frames such as `hello` and
    /// `disconnect` carry no envelope id and decode to `Ok(None)`.
    pub fn from_socket_payload(frame: &Value) -> Result<Option<Self>, EnvelopeDecodeError> {
        let Some(envelope_id) = frame.get("envelope_id").and_then(Value::as_str) else {
            return Ok(None);
        };
        let frame_type = str_field(frame, "type").unwrap_or_default();
        let payload = frame.get("payload").unwrap_or(&Value::Null);

        let event = match frame_type.as_str() {
            "slash_commands" => SlackEvent::SlashCommand(SlashCommandPayload {
                command: required(payload, "command")?,
                text: str_field(payload, "text").unwrap_or_default(),
                channel_id: required(payload, "channel_id")?,
                user_id: required(payload, "user_id")?,
                thread_ts: str_field(payload, "thread_ts"),
                trigger_id: str_field(payload, "trigger_id").unwrap_or_default(),
                request_id: envelope_id.to_owned(),
            }),
            "events_api" => decode_event(payload.get("event").unwrap_or(&Value::Null))?,
            other => SlackEvent::Unsupported { event_type: other.to_owned() },
        };

        Ok(Some(Self { envelope_id: envelope_id.to_owned(), event }))
    }
}

fn decode_event(event: &Value) -> Result<SlackEvent, EnvelopeDecodeError> {
    let event_type = str_field(event, "type").unwrap_or_default();
    // Edits, deletions and joins arrive as message subtypes; only plain posts count.
    let subtype = str_field(event, "subtype");
    if event_type != "message" || subtype.as_deref().is_some_and(|kind| kind != "bot_message") {
        let event_type = match subtype {
            Some(subtype) => format!("{event_type}.{subtype}"),
            None => event_type,
        };
        return Ok(SlackEvent::Unsupported { event_type });
    }

    Ok(SlackEvent::Message(MessageEvent {
        channel_id: required(event, "channel")?,
        ts: required(event, "ts")?,
        thread_ts: str_field(event, "thread_ts"),
        user_id: str_field(event, "user").unwrap_or_default(),
        bot_id: str_field(event, "bot_id"),
        text: str_field(event, "text").unwrap_or_default(),
    }))
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn required(value: &Value, key: &'static str) -> Result<String, EnvelopeDecodeError> {
    str_field(value, key).ok_or(EnvelopeDecodeError::MissingField(key))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(MessageTemplate),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error("message handler failure: {0}")]
    Message(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher with slash command and message handlers both backed by `service`.
    pub fn for_service<S>(service: Arc<S>) -> Self
    where
        S: RosterCommandService + MessageService + 'static,
    {
        let mut dispatcher = Self::new();
        dispatcher.register(SlashCommandHandler::new(service.clone()));
        dispatcher.register(MessageHandler::new(service));
        dispatcher
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub struct SlashCommandHandler<S: ?Sized> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: RosterCommandService + ?Sized,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: RosterCommandService + ?Sized + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let command = match parse_slash_command(payload) {
            Ok(command) => command,
            Err(error @ CommandParseError::UnsupportedCommand(_)) => return Err(error.into()),
            Err(error) => {
                return Ok(HandlerResult::Responded(parse_failure_message(
                    &error,
                    &payload.request_id,
                )))
            }
        };

        let message = self.router.route(command, &normalize_command(payload)).await;
        Ok(HandlerResult::Responded(message))
    }
}

#[async_trait]
pub trait MessageService: Send + Sync {
    /// Returns the reply to post, or `None` when the message needs no answer.
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<MessageTemplate>, EventHandlerError>;
}

pub struct MessageHandler<S: ?Sized> {
    service: Arc<S>,
}

impl<S> MessageHandler<S>
where
    S: MessageService + ?Sized,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MessageHandler<S>
where
    S: MessageService + ?Sized + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = self.service.handle_message(event, ctx).await?;
        Ok(match message {
            Some(message) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use rollcall_core::RosterError;
    use serde_json::json;

    use super::{
        EnvelopeDecodeError, EventContext, EventDispatcher, EventHandlerError, HandlerResult,
        MessageEvent, MessageService, SlackEnvelope, SlackEvent,
    };
    use crate::blocks::{self, MessageTemplate};
    use crate::commands::{
        CommandEnvelope, CommandParseError, JoinRequest, MusterRequest, RosterCommandService,
        SlashCommandPayload,
    };

    struct EchoService;

    #[async_trait]
    impl RosterCommandService for EchoService {
        async fn muster(
            &self,
            request: MusterRequest,
            _envelope: &CommandEnvelope,
        ) -> Result<MessageTemplate, RosterError> {
            Ok(MessageTemplate::text(format!("muster {}", request.title)))
        }

        async fn join(
            &self,
            request: JoinRequest,
            envelope: &CommandEnvelope,
        ) -> Result<MessageTemplate, RosterError> {
            Ok(MessageTemplate::text(format!(
                "join {} {} in {:?}",
                request.slot_number, request.party_name, envelope.thread_ts
            )))
        }
    }

    #[async_trait]
    impl MessageService for EchoService {
        async fn handle_message(
            &self,
            event: &MessageEvent,
            _ctx: &EventContext,
        ) -> Result<Option<MessageTemplate>, EventHandlerError> {
            Ok(event.text.contains("hello").then(blocks::hello_message))
        }
    }

    fn slash(command: &str, text: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: "env-1".to_owned(),
            event: SlackEvent::SlashCommand(SlashCommandPayload {
                command: command.to_owned(),
                text: text.to_owned(),
                channel_id: "C1".to_owned(),
                user_id: "U1".to_owned(),
                thread_ts: Some("1700000000.000100".to_owned()),
                trigger_id: "trigger-1".to_owned(),
                request_id: "req-1".to_owned(),
            }),
        }
    }

    fn message(text: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: "env-2".to_owned(),
            event: SlackEvent::Message(MessageEvent {
                channel_id: "C1".to_owned(),
                ts: "1700000000.000500".to_owned(),
                thread_ts: None,
                user_id: "U2".to_owned(),
                bot_id: None,
                text: text.to_owned(),
            }),
        }
    }

    fn dispatcher() -> EventDispatcher {
        EventDispatcher::for_service(Arc::new(EchoService))
    }

    #[tokio::test]
    async fn dispatcher_routes_slash_commands_with_thread_context() {
        let result = dispatcher()
            .dispatch(&slash("/join", "2 Alpha"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(
            result,
            HandlerResult::Responded(MessageTemplate::text(
                "join 2 Alpha in Some(\"1700000000.000100\")"
            ))
        );
    }

    #[tokio::test]
    async fn malformed_arguments_respond_with_usage_card() {
        let result = dispatcher()
            .dispatch(&slash("/join", "first Alpha"), &EventContext::default())
            .await
            .expect("dispatch");

        let HandlerResult::Responded(message) = result else {
            panic!("expected a response");
        };
        assert!(message.fallback_text.contains("slot `first` is not a positive number"));
        assert!(message.fallback_text.contains("join <slot> <party>"));
    }

    #[tokio::test]
    async fn slash_join_outside_a_thread_is_answered_with_thread_instructions() {
        let mut envelope = slash("/join", "2 Alpha");
        if let SlackEvent::SlashCommand(payload) = &mut envelope.event {
            payload.thread_ts = None;
        }

        let result =
            dispatcher().dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        let HandlerResult::Responded(message) = result else {
            panic!("expected a response");
        };
        assert!(message.fallback_text.contains("slots are claimed inside a roster thread"));
    }

    #[tokio::test]
    async fn unsupported_commands_fail_dispatch() {
        let error = dispatcher()
            .dispatch(&slash("/quote", "new"), &EventContext::default())
            .await
            .expect_err("unsupported");

        assert_eq!(
            error.to_string(),
            CommandParseError::UnsupportedCommand("/quote".to_owned()).to_string()
        );
    }

    #[tokio::test]
    async fn messages_without_reply_are_processed() {
        let dispatcher = dispatcher();

        let quiet =
            dispatcher.dispatch(&message("gm"), &EventContext::default()).await.expect("dispatch");
        let greeted = dispatcher
            .dispatch(&message("well hello there"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(quiet, HandlerResult::Processed);
        assert_eq!(greeted, HandlerResult::Responded(blocks::hello_message()));
    }

    #[tokio::test]
    async fn dispatcher_returns_ignored_when_no_handler_registered() {
        let result = EventDispatcher::new()
            .dispatch(&message("hello"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[test]
    fn service_dispatcher_registers_both_handlers() {
        assert_eq!(dispatcher().handler_count(), 2);
    }

    #[test]
    fn decodes_socket_mode_slash_command_frame() {
        let frame = json!({
            "envelope_id": "env-7",
            "type": "slash_commands",
            "payload": {
                "command": "/muster",
                "text": "title=Raid time=now objective=win sheet=abc",
                "channel_id": "C7",
                "user_id": "U7",
                "trigger_id": "trig-7"
            }
        });

        let envelope = SlackEnvelope::from_socket_payload(&frame).expect("decode").expect("some");

        assert_eq!(envelope.envelope_id, "env-7");
        let SlackEvent::SlashCommand(payload) = envelope.event else {
            panic!("expected slash command");
        };
        assert_eq!(payload.command, "/muster");
        assert_eq!(payload.request_id, "env-7");
        assert_eq!(payload.thread_ts, None);
    }

    #[test]
    fn decodes_thread_reply_and_skips_edits() {
        let reply = json!({
            "envelope_id": "env-8",
            "type": "events_api",
            "payload": {"event": {
                "type": "message",
                "channel": "C1",
                "user": "U3",
                "text": "join 1 Alpha",
                "ts": "1700000000.000900",
                "thread_ts": "1700000000.000100"
            }}
        });
        let edit = json!({
            "envelope_id": "env-9",
            "type": "events_api",
            "payload": {"event": {"type": "message", "subtype": "message_changed", "channel": "C1"}}
        });

        let reply = SlackEnvelope::from_socket_payload(&reply).expect("decode").expect("some");
        let edit = SlackEnvelope::from_socket_payload(&edit).expect("decode").expect("some");

        assert_eq!(reply.event.reply_target(), Some(("C1", Some("1700000000.000100"))));
        assert_eq!(
            edit.event,
            SlackEvent::Unsupported { event_type: "message.message_changed".to_owned() }
        );
    }

    #[test]
    fn control_frames_and_incomplete_payloads() {
        assert_eq!(SlackEnvelope::from_socket_payload(&json!({"type": "hello"})), Ok(None));
        assert_eq!(
            SlackEnvelope::from_socket_payload(&json!({
                "envelope_id": "env-10",
                "type": "slash_commands",
                "payload": {"command": "/ping", "user_id": "U1"}
            })),
            Err(EnvelopeDecodeError::MissingField("channel_id"))
        );
    }
}

use std::sync::Arc;

use async_trait::async_trait;
use rollcall_core::RosterError;
use thiserror::Error;
use tracing::warn;

use crate::blocks::{self, MessageTemplate};

/// Slash commands this app registers. `/rollcall` takes the verb as its
/// first argument; the others are shortcuts for one verb.
pub const SUPPORTED_COMMANDS: [&str; 4] = ["/rollcall", "/muster", "/join", "/ping"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    /// Present when the command was issued from inside a thread.
    pub thread_ts: Option<String>,
    pub trigger_id: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub channel_id: String,
    pub user_id: String,
    pub thread_ts: Option<String>,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MusterRequest {
    pub title: String,
    pub time: String,
    pub objective: String,
    pub spreadsheet_id: String,
    pub tab: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinRequest {
    pub slot_number: u32,
    pub party_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RosterCommand {
    Muster(MusterRequest),
    Join(JoinRequest),
    Ping,
    Help,
    Unknown { verb: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
    #[error("missing required argument `{0}`")]
    MissingArgument(&'static str),
    #[error("unknown argument `{0}`")]
    UnknownArgument(String),
    #[error("argument `{0}` must look like key=value")]
    MalformedArgument(String),
    #[error("unterminated quote in arguments")]
    UnterminatedQuote,
    #[error("slot `{0}` is not a positive number")]
    InvalidSlot(String),
    #[error("slots are claimed inside a roster thread")]
    OutsideThread,
}

impl CommandParseError {
    pub fn usage_hint(&self) -> &'static str {
        match self {
            Self::InvalidSlot(_) => "Usage: `join <slot> <party>`, for example `join 3 Alpha`.",
            Self::OutsideThread => {
                "Reply `join <slot> <party>` in the thread under the roster announcement."
            }
            Self::MissingArgument("party") | Self::MissingArgument("slot") => {
                "Usage: `join <slot> <party>`, for example `join 3 Alpha`."
            }
            _ => "Usage: `/muster title=\"…\" time=\"…\" objective=\"…\" sheet=<spreadsheet id>`.",
        }
    }
}

pub fn normalize_command(payload: &SlashCommandPayload) -> CommandEnvelope {
    CommandEnvelope {
        channel_id: payload.channel_id.clone(),
        user_id: payload.user_id.clone(),
        thread_ts: payload.thread_ts.clone(),
        request_id: payload.request_id.clone(),
    }
}

pub fn parse_slash_command(
    payload: &SlashCommandPayload,
) -> Result<RosterCommand, CommandParseError> {
    let text = payload.text.trim();
    let command = match payload.command.as_str() {
        "/rollcall" => {
            let (verb, args) = split_verb(text);
            parse_verb(&verb, args)
        }
        "/muster" => parse_verb("muster", text),
        "/join" => parse_verb("join", text),
        "/ping" => Ok(RosterCommand::Ping),
        other => Err(CommandParseError::UnsupportedCommand(other.to_owned())),
    }?;

    // Slack sends slash commands without thread context, so a claim issued
    // that way has no thread to resolve.
    if matches!(command, RosterCommand::Join(_)) && payload.thread_ts.is_none() {
        return Err(CommandParseError::OutsideThread);
    }
    Ok(command)
}

fn split_verb(text: &str) -> (String, &str) {
    match text.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb.to_ascii_lowercase(), rest.trim()),
        None => (text.to_ascii_lowercase(), ""),
    }
}

fn parse_verb(verb: &str, args: &str) -> Result<RosterCommand, CommandParseError> {
    match verb {
        "muster" => parse_muster_args(args).map(RosterCommand::Muster),
        "join" => parse_join_args(args).map(RosterCommand::Join),
        "ping" => Ok(RosterCommand::Ping),
        "" | "help" => Ok(RosterCommand::Help),
        other => Ok(RosterCommand::Unknown { verb: other.to_owned() }),
    }
}

/// Recognizes `join <slot> <party>` typed as a plain thread reply.
pub fn parse_thread_join(text: &str) -> Option<Result<JoinRequest, CommandParseError>> {
    let (verb, args) = split_verb(text.trim());
    (verb == "join").then(|| parse_join_args(args))
}

pub fn parse_join_args(args: &str) -> Result<JoinRequest, CommandParseError> {
    let args = args.trim();
    if args.is_empty() {
        return Err(CommandParseError::MissingArgument("slot"));
    }
    let (slot, party) = args.split_once(char::is_whitespace).unwrap_or((args, ""));

    let slot_number = slot
        .parse::<u32>()
        .ok()
        .filter(|slot| *slot > 0)
        .ok_or_else(|| CommandParseError::InvalidSlot(slot.to_owned()))?;

    let party_name = strip_quotes(party.trim());
    if party_name.is_empty() {
        return Err(CommandParseError::MissingArgument("party"));
    }

    Ok(JoinRequest { slot_number, party_name: party_name.to_owned() })
}

fn strip_quotes(value: &str) -> &str {
    let mut chars = value.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open), Some(close)) if is_quote(open) && is_quote(close) => chars.as_str(),
        _ => value,
    }
}

fn is_quote(ch: char) -> bool {
    matches!(ch, '"' | '“' | '”')
}

pub fn parse_muster_args(args: &str) -> Result<MusterRequest, CommandParseError> {
    let mut title = None;
    let mut time = None;
    let mut objective = None;
    let mut spreadsheet_id = None;
    let mut tab = None;

    for token in tokenize(args)? {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| CommandParseError::MalformedArgument(token.clone()))?;
        let value = value.trim().to_owned();
        match key.trim().to_ascii_lowercase().as_str() {
            "title" => title = Some(value),
            "time" => time = Some(value),
            "objective" => objective = Some(value),
            "sheet" | "spreadsheet" | "spreadsheetid" => {
                spreadsheet_id = Some(spreadsheet_id_from(&value).to_owned())
            }
            "tab" => tab = Some(value),
            other => return Err(CommandParseError::UnknownArgument(other.to_owned())),
        }
    }

    let required = |value: Option<String>, name: &'static str| {
        value.filter(|value| !value.is_empty()).ok_or(CommandParseError::MissingArgument(name))
    };

    Ok(MusterRequest {
        title: required(title, "title")?,
        time: required(time, "time")?,
        objective: required(objective, "objective")?,
        spreadsheet_id: required(spreadsheet_id, "sheet")?,
        tab: tab.filter(|tab| !tab.is_empty()),
    })
}

/// Accepts either a bare spreadsheet id or a full sheet URL.
fn spreadsheet_id_from(value: &str) -> &str {
    value
        .split_once("/spreadsheets/d/")
        .map(|(_, rest)| rest.split(['/', '?', '#']).next().unwrap_or(rest))
        .unwrap_or(value)
}

/// Splits on whitespace outside quotes. Quotes may be straight or curly,
/// since chat clients often substitute the latter.
fn tokenize(input: &str) -> Result<Vec<String>, CommandParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut started = false;

    for ch in input.chars() {
        if is_quote(ch) {
            quoted = !quoted;
            started = true;
        } else if ch.is_whitespace() && !quoted {
            if started {
                tokens.push(std::mem::take(&mut current));
                started = false;
            }
        } else {
            current.push(ch);
            started = true;
        }
    }

    if quoted {
        return Err(CommandParseError::UnterminatedQuote);
    }
    if started {
        tokens.push(current);
    }
    Ok(tokens)
}

#[async_trait]
pub trait RosterCommandService: Send + Sync {
    async fn muster(
        &self,
        request: MusterRequest,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, RosterError>;

    async fn join(
        &self,
        request: JoinRequest,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, RosterError>;
}

pub struct CommandRouter<S: ?Sized> {
    service: Arc<S>,
}

impl<S> CommandRouter<S>
where
    S: RosterCommandService + ?Sized,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }

    /// Runs `command` and always produces a reply; failures become error cards
    /// tagged with the envelope's request id.
    pub async fn route(
        &self,
        command: RosterCommand,
        envelope: &CommandEnvelope,
    ) -> MessageTemplate {
        let result = match command {
            RosterCommand::Muster(request) => self.service.muster(request, envelope).await,
            RosterCommand::Join(request) => self.service.join(request, envelope).await,
            RosterCommand::Ping => Ok(blocks::pong_message()),
            RosterCommand::Help | RosterCommand::Unknown { .. } => Ok(blocks::help_message()),
        };

        result.unwrap_or_else(|error| failure_message(error, &envelope.request_id))
    }
}

pub fn failure_message(error: RosterError, correlation_id: &str) -> MessageTemplate {
    warn!(
        event_name = "roster.command.failed",
        correlation_id,
        error = %error,
        "roster command failed"
    );
    let interface = error.into_interface(correlation_id);
    blocks::error_message(interface.user_message(), interface.detail(), correlation_id)
}

pub fn parse_failure_message(error: &CommandParseError, correlation_id: &str) -> MessageTemplate {
    blocks::error_message(&format!("{error}."), error.usage_hint(), correlation_id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use rollcall_core::{ClaimError, RosterError};

    use super::{
        parse_join_args, parse_muster_args, parse_slash_command, parse_thread_join,
        CommandEnvelope, CommandParseError, CommandRouter, JoinRequest, MusterRequest,
        RosterCommand, RosterCommandService, SlashCommandPayload,
    };
    use crate::blocks::{self, MessageTemplate};

    fn payload(command: &str, text: &str) -> SlashCommandPayload {
        SlashCommandPayload {
            command: command.to_owned(),
            text: text.to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            thread_ts: None,
            trigger_id: "trigger-1".to_owned(),
            request_id: "req-1".to_owned(),
        }
    }

    fn envelope() -> CommandEnvelope {
        CommandEnvelope {
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            thread_ts: Some("1700000000.000100".to_owned()),
            request_id: "req-9".to_owned(),
        }
    }

    #[test]
    fn muster_parses_quoted_values_and_optional_tab() {
        let request = parse_muster_args(
            r#"title="Siege of Aden" time="20:00 UTC" objective="Hold the gate" sheet=abc123 tab=Week2"#,
        )
        .expect("parse");

        assert_eq!(
            request,
            MusterRequest {
                title: "Siege of Aden".to_owned(),
                time: "20:00 UTC".to_owned(),
                objective: "Hold the gate".to_owned(),
                spreadsheet_id: "abc123".to_owned(),
                tab: Some("Week2".to_owned()),
            }
        );
    }

    #[test]
    fn muster_accepts_curly_quotes_and_sheet_urls() {
        let request = parse_muster_args(
            "title=“Night Raid” time=“21:00” objective=“Scout” sheet=https://docs.google.com/spreadsheets/d/1AbC_d/edit#gid=0",
        )
        .expect("parse");

        assert_eq!(request.title, "Night Raid");
        assert_eq!(request.spreadsheet_id, "1AbC_d");
        assert_eq!(request.tab, None);
    }

    #[test]
    fn muster_reports_missing_and_unknown_arguments() {
        assert_eq!(
            parse_muster_args(r#"title=A time=B sheet=x"#),
            Err(CommandParseError::MissingArgument("objective"))
        );
        assert_eq!(
            parse_muster_args(r#"title=A time=B objective=C sheet=x colour=red"#),
            Err(CommandParseError::UnknownArgument("colour".to_owned()))
        );
        assert_eq!(
            parse_muster_args(r#"title="A time=B"#),
            Err(CommandParseError::UnterminatedQuote)
        );
        assert_eq!(
            parse_muster_args("title=A stray"),
            Err(CommandParseError::MalformedArgument("stray".to_owned()))
        );
    }

    #[test]
    fn join_parses_slot_and_multi_word_party() {
        assert_eq!(
            parse_join_args("3 Night Owls"),
            Ok(JoinRequest { slot_number: 3, party_name: "Night Owls".to_owned() })
        );
        assert_eq!(
            parse_join_args("2 \"Alpha\""),
            Ok(JoinRequest { slot_number: 2, party_name: "Alpha".to_owned() })
        );
    }

    #[test]
    fn join_rejects_non_numeric_zero_and_missing_party() {
        assert_eq!(
            parse_join_args("three Alpha"),
            Err(CommandParseError::InvalidSlot("three".into()))
        );
        assert_eq!(parse_join_args("0 Alpha"), Err(CommandParseError::InvalidSlot("0".into())));
        assert_eq!(parse_join_args("4"), Err(CommandParseError::MissingArgument("party")));
        assert_eq!(parse_join_args(""), Err(CommandParseError::MissingArgument("slot")));
    }

    #[test]
    fn thread_join_only_matches_join_verb() {
        assert!(parse_thread_join("JOIN 1 Alpha").is_some());
        assert!(parse_thread_join("joined the party").is_none());
        assert!(parse_thread_join("hello everyone").is_none());
    }

    #[test]
    fn slash_commands_map_to_verbs() {
        assert_eq!(parse_slash_command(&payload("/ping", "")), Ok(RosterCommand::Ping));
        assert_eq!(parse_slash_command(&payload("/rollcall", "")), Ok(RosterCommand::Help));
        assert_eq!(parse_slash_command(&payload("/rollcall", "HELP")), Ok(RosterCommand::Help));
        assert_eq!(
            parse_slash_command(&payload("/rollcall", "dance now")),
            Ok(RosterCommand::Unknown { verb: "dance".to_owned() })
        );
        let threaded = SlashCommandPayload {
            thread_ts: Some("1700000000.000100".to_owned()),
            ..payload("/join", "1 Alpha")
        };
        assert!(matches!(
            parse_slash_command(&threaded),
            Ok(RosterCommand::Join(JoinRequest { slot_number: 1, .. }))
        ));
        assert_eq!(
            parse_slash_command(&payload("/quote", "new")),
            Err(CommandParseError::UnsupportedCommand("/quote".to_owned()))
        );
    }

    #[test]
    fn join_without_thread_context_points_at_thread_replies() {
        for (command, text) in [("/join", "1 Alpha"), ("/rollcall", "join 1 Alpha")] {
            let error = parse_slash_command(&payload(command, text)).expect_err("outside thread");
            assert_eq!(error, CommandParseError::OutsideThread);
            assert!(error.usage_hint().contains("join <slot> <party>"));
        }
    }

    struct ScriptedService;

    #[async_trait]
    impl RosterCommandService for ScriptedService {
        async fn muster(
            &self,
            _request: MusterRequest,
            _envelope: &CommandEnvelope,
        ) -> Result<MessageTemplate, RosterError> {
            Ok(blocks::muster_posted_message())
        }

        async fn join(
            &self,
            request: JoinRequest,
            _envelope: &CommandEnvelope,
        ) -> Result<MessageTemplate, RosterError> {
            Err(ClaimError::PartyNotFound(request.party_name).into())
        }
    }

    #[tokio::test]
    async fn router_renders_service_failures_as_error_cards() {
        let router = CommandRouter::new(Arc::new(ScriptedService));

        let message = router
            .route(
                RosterCommand::Join(JoinRequest { slot_number: 1, party_name: "Delta".into() }),
                &envelope(),
            )
            .await;

        assert!(message.fallback_text.contains("Party 'Delta' was not found in the roster."));
        assert!(serde_json::to_string(&message.blocks).expect("json").contains("req-9"));
    }

    #[tokio::test]
    async fn router_answers_ping_and_unknown_verbs_locally() {
        let router = CommandRouter::new(Arc::new(ScriptedService));

        assert_eq!(router.route(RosterCommand::Ping, &envelope()).await.fallback_text, "Pong!");
        assert_eq!(
            router.route(RosterCommand::Unknown { verb: "x".into() }, &envelope()).await,
            blocks::help_message()
        );
        assert_eq!(
            router
                .route(
                    RosterCommand::Muster(MusterRequest {
                        title: "t".into(),
                        time: "t".into(),
                        objective: "o".into(),
                        spreadsheet_id: "s".into(),
                        tab: None,
                    }),
                    &envelope(),
                )
                .await
                .fallback_text,
            "Roster announcement posted."
        );
    }
}

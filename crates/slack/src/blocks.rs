use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    PlainText { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "button")]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { action_id: action_id.into(), text: TextObject::plain(label), style: None, url: None }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { block_id: String, text: TextObject },
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<TextObject> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// Text-only message without blocks.
    pub fn text(text: impl Into<String>) -> Self {
        Self { fallback_text: text.into(), blocks: Vec::new() }
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn header(mut self, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = TextObject::plain(text);
        self.blocks.push(Block::Header { block_id: block_id.into(), text });
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

pub const MUSTER_INSTRUCTIONS: &str = "1. Fill the party.\n2. Gear up with your best equipment.\n3. Be ready at the designated time.\n4. Follow your party leader's commands.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Announcement<'a> {
    pub title: &'a str,
    pub time: &'a str,
    pub objective: &'a str,
    pub sheet_url: &'a str,
    pub mention: Option<&'a str>,
}

pub fn announcement_message(announcement: &Announcement<'_>) -> MessageTemplate {
    let Announcement { title, time, objective, sheet_url, mention } = announcement;

    let mut builder = MessageBuilder::new(format!("⚔️ {title} ⚔️ ({time})"))
        .header("roster.announcement.title.v1", format!("⚔️ {title} ⚔️"))
        .section("roster.announcement.summary.v1", |section| {
            section.mrkdwn(format!(
                "Prepare yourselves for the upcoming war! 🛡️\n\n*Time:* {time}\n*Objective:* {objective}"
            ));
        })
        .section("roster.announcement.instructions.v1", |section| {
            section.mrkdwn(format!(
                "*Instructions*\n{MUSTER_INSTRUCTIONS}\n\nClaim a slot by replying in the thread with `join <slot> <party>`."
            ));
        });

    if let Some(mention) = mention {
        builder = builder.section("roster.announcement.mention.v1", |section| {
            section.mrkdwn(format!("Glory, honor and rewards await! {mention}"));
        });
    }

    builder
        .actions("roster.announcement.actions.v1", |actions| {
            actions.button(
                ButtonElement::new("roster.sheet.open.v1", "Open roster sheet")
                    .style(ButtonStyle::Primary)
                    .url(*sheet_url),
            );
        })
        .build()
}

pub fn thread_title_message(title: &str) -> MessageTemplate {
    MessageBuilder::new(title.to_owned())
        .section("roster.thread.title.v1", |section| {
            section.mrkdwn(format!("*{title}*"));
        })
        .build()
}

/// One party's table, fenced so the fixed-width columns line up.
pub fn party_roster_message(party_name: &str, rendered: &str) -> MessageTemplate {
    MessageBuilder::new(format!("Party Name : {party_name}"))
        .section("roster.party.table.v1", |section| {
            section.mrkdwn(format!("*Party Name : {party_name}*\n```{rendered}```"));
        })
        .build()
}

pub fn join_confirmation_message(
    player: &str,
    party_name: &str,
    slot_number: u32,
) -> MessageTemplate {
    MessageTemplate::text(format!("{player} joined party '{party_name}' with number {slot_number}"))
}

pub fn muster_posted_message() -> MessageTemplate {
    MessageTemplate::text("Roster announcement posted.")
}

pub fn pong_message() -> MessageTemplate {
    MessageTemplate::text("Pong!")
}

pub fn hello_message() -> MessageTemplate {
    MessageTemplate::text("Hello World😃")
}

pub fn bye_message() -> MessageTemplate {
    MessageTemplate::text("Good Bye👋")
}

pub fn error_message(summary: &str, detail: &str, correlation_id: &str) -> MessageTemplate {
    let text = if detail.is_empty() { summary.to_owned() } else { format!("{summary} {detail}") };
    MessageBuilder::new(text.clone())
        .section("roster.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: {text}"));
        })
        .context("roster.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}

pub fn help_message() -> MessageTemplate {
    MessageBuilder::new("Rollcall command help")
        .section("roster.help.summary.v1", |section| {
            section.mrkdwn(
                "*Available commands*\n• `/muster title=\"…\" time=\"…\" objective=\"…\" sheet=<spreadsheet id> [tab=<name>]`\n• `join <slot> <party>` as a reply in a roster thread\n• `/ping`\n• `/rollcall help`",
            );
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::{
        announcement_message, error_message, help_message, join_confirmation_message,
        party_roster_message, Announcement, Block, ButtonStyle, MessageBuilder, TextObject,
    };

    fn announcement(mention: Option<&'static str>) -> Announcement<'static> {
        Announcement {
            title: "Siege of Aden",
            time: "20:00 UTC",
            objective: "Hold the east gate",
            sheet_url: "https://docs.google.com/spreadsheets/d/sheet-1",
            mention,
        }
    }

    #[test]
    fn message_builder_creates_typed_block_structure() {
        let message = MessageBuilder::new("fallback")
            .header("roster.title.v1", "Title")
            .section("roster.summary.v1", |section| {
                section.mrkdwn("*Summary*");
            })
            .build();

        assert_eq!(message.blocks.len(), 2);
        assert!(matches!(
            &message.blocks[1],
            Block::Section {
                block_id,
                text: TextObject::Mrkdwn { .. }
            } if block_id == "roster.summary.v1"
        ));
    }

    #[test]
    fn blocks_serialize_with_slack_type_tags() {
        let message = announcement_message(&announcement(None));
        let json = serde_json::to_value(&message.blocks).expect("serialize");

        assert_eq!(json[0]["type"], "header");
        assert_eq!(json[0]["text"]["type"], "plain_text");
        assert_eq!(json[1]["text"]["type"], "mrkdwn");
        let button = &json[3]["elements"][0];
        assert_eq!(button["type"], "button");
        assert_eq!(button["url"], "https://docs.google.com/spreadsheets/d/sheet-1");
        assert_eq!(button["style"], "primary");
    }

    #[test]
    fn announcement_carries_time_objective_and_link() {
        let message = announcement_message(&announcement(Some("<!here>")));

        let summary = message.blocks.iter().find_map(|block| match block {
            Block::Section { block_id, text: TextObject::Mrkdwn { text } }
                if block_id == "roster.announcement.summary.v1" =>
            {
                Some(text.clone())
            }
            _ => None,
        });
        let summary = summary.expect("summary section");
        assert!(summary.contains("*Time:* 20:00 UTC"));
        assert!(summary.contains("*Objective:* Hold the east gate"));
        assert!(message.blocks.iter().any(|block| matches!(
            block,
            Block::Section { block_id, .. } if block_id == "roster.announcement.mention.v1"
        )));

        let elements = message.blocks.iter().find_map(|block| match block {
            Block::Actions { elements, .. } => Some(elements),
            _ => None,
        });
        let elements = elements.expect("actions block");
        assert_eq!(elements[0].style, Some(ButtonStyle::Primary));
    }

    #[test]
    fn announcement_without_mention_skips_mention_section() {
        let message = announcement_message(&announcement(None));
        assert_eq!(message.blocks.len(), 4);
    }

    #[test]
    fn party_message_fences_rendered_table() {
        let message = party_roster_message("Alpha", "No  Role\n");

        assert_eq!(message.fallback_text, "Party Name : Alpha");
        assert!(matches!(
            &message.blocks[0],
            Block::Section { text: TextObject::Mrkdwn { text }, .. }
                if text == "*Party Name : Alpha*\n```No  Role\n```"
        ));
    }

    #[test]
    fn join_confirmation_matches_thread_wording() {
        let message = join_confirmation_message("Bob", "Bravo", 3);
        assert_eq!(message.fallback_text, "Bob joined party 'Bravo' with number 3");
        assert!(message.blocks.is_empty());
    }

    #[test]
    fn error_template_contains_correlation_id() {
        let message =
            error_message("Cannot process request.", "Party 'X' was not found.", "req-123");
        let elements = if let Block::Context { elements, .. } = &message.blocks[1] {
            Some(elements)
        } else {
            None
        };
        let elements = elements.expect("context block");
        assert!(matches!(
            elements.first(),
            Some(TextObject::PlainText { text }) if text.contains("req-123")
        ));
        assert!(message.fallback_text.ends_with("Party 'X' was not found."));
    }

    #[test]
    fn help_lists_every_command() {
        let message = help_message();
        let Block::Section { text: TextObject::Mrkdwn { text }, .. } = &message.blocks[0] else {
            panic!("expected markdown section");
        };
        for command in ["/muster", "join <slot> <party>", "/ping", "/rollcall help"] {
            assert!(text.contains(command), "help should mention {command}");
        }
    }
}

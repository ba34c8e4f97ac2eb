//! Slack interface for rollcall.
//!
//! - **Socket Mode** (`socket`) - envelope loop with reconnection and reply posting
//! - **Commands** (`commands`) - `/muster`, `/join`, `/ping` and `/rollcall <verb>`
//! - **Events** (`events`) - dispatch of slash commands and channel/thread messages
//! - **Block Kit** (`blocks`) - announcement, party table and error message builders
//! - **Transport** (`transport`) - outbound Web API calls (`chat.postMessage`,
//!   `chat.update`, `users.info`)
//! - **Bot** (`bot`) - the command service tying the roster core to chat
//!
//! # Architecture
//!
//! ```text
//! Slack Events → EventDispatcher → RosterBot → ClaimEngine / ThreadTracker → Sheets
//!                    ↓                  ↓
//!              reply to thread ← ChatTransport (party message edits)
//! ```

pub mod blocks;
pub mod bot;
pub mod commands;
pub mod events;
pub mod socket;
pub mod transport;

pub use bot::{BotSettings, RosterBot};
pub use transport::{ChatError, ChatTransport, SlackWebClient, ThreadHandle};

//! engagement-bot: chat bot that tracks a cohort's content submissions
//!
//! Participants register through a chat conversation, submit short and long
//! videos, earn points under a submission policy, and an administrator reads
//! commitment reports and broadcasts announcements.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐   InboundEvent   ┌──────────────┐
//! │ TelegramTrans- │ ───────────────▶ │  Dispatcher  │  one queue per participant
//! │ port (polling) │                  └──────┬───────┘
//! └───────▲────────┘                         ▼
//!         │ replies              ┌──────────────────────┐
//!         └──────────────────────│  ConversationEngine  │
//!                                └───┬─────────┬────────┘
//!                                    ▼         ▼
//!                          ┌──────────┐  ┌──────────────────┐
//!                          │  Ledger  │  │ SubmissionPolicy │
//!                          │ (SQLite) │  └──────────────────┘
//!                          └────┬─────┘
//!                               ▼
//!                         report / broadcast
//! ```

pub mod broadcast;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod policy;
pub mod report;
pub mod transport;

pub use broadcast::{broadcast, BroadcastOutcome};
pub use config::Config;
pub use conversation::{ConversationEngine, ConversationState, EngineSettings};
pub use dispatch::Dispatcher;
pub use error::{ConfigError, EngineError, LedgerError, TransportError};
pub use ledger::{Ledger, PopulationSnapshot};
pub use policy::{PolicyConfig, SubmissionPolicy};
pub use transport::{ChatTransport, InboundEvent, RecordingTransport, TelegramTransport};

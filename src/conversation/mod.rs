//! Conversation state machine
//!
//! - `state` - typed per-participant state and the session map
//! - `menu` - keyboards and the labels their buttons send
//! - `messages` - reply texts, captions and report rendering
//! - `machine` - the engine that routes events
//! - `admin` - administrator flows on the same engine

mod admin;
pub mod machine;
pub mod menu;
pub mod messages;
pub mod state;

pub use machine::{ConversationEngine, EngineSettings};
pub use state::{ConversationState, RegistrationStep, SessionStore};

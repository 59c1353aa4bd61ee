//! Per-participant conversation state and the session map that holds it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::ledger::UserId;

/// Registration prompt currently awaiting an answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStep {
    Name,
    Age { name: String },
    Channel { name: String, age: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    Registering(RegistrationStep),
    AwaitingShortSubmission,
    AwaitingLongSubmission,
    AwaitingStatsChoice,
    ReportingIssue,
    AskingQuestion,
    AdminMenu,
    AdminAwaitingBroadcast,
    AdminCommitmentMenu,
}

impl ConversationState {
    pub fn is_registering(&self) -> bool {
        matches!(self, ConversationState::Registering(_))
    }

    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            ConversationState::AdminMenu
                | ConversationState::AdminAwaitingBroadcast
                | ConversationState::AdminCommitmentMenu
        )
    }

    /// Short name for log fields
    pub fn label(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::Registering(RegistrationStep::Name) => "registering_name",
            ConversationState::Registering(RegistrationStep::Age { .. }) => "registering_age",
            ConversationState::Registering(RegistrationStep::Channel { .. }) => {
                "registering_channel"
            }
            ConversationState::AwaitingShortSubmission => "awaiting_short",
            ConversationState::AwaitingLongSubmission => "awaiting_long",
            ConversationState::AwaitingStatsChoice => "awaiting_stats_choice",
            ConversationState::ReportingIssue => "reporting_issue",
            ConversationState::AskingQuestion => "asking_question",
            ConversationState::AdminMenu => "admin_menu",
            ConversationState::AdminAwaitingBroadcast => "admin_awaiting_broadcast",
            ConversationState::AdminCommitmentMenu => "admin_commitment_menu",
        }
    }
}

/// Handle to one participant's state; holding the lock serializes their events
pub type SessionSlot = Arc<Mutex<ConversationState>>;

/// In-memory session map keyed by participant identity.
///
/// Entries are created on first contact and never expire; a restart forgets
/// every in-flight conversation.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<UserId, SessionSlot>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `user_id`, created in `Idle` on first use
    pub fn slot(&self, user_id: UserId) -> SessionSlot {
        self.sessions
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(ConversationState::Idle)))
            .clone()
    }

    /// Snapshot of the current state (`Idle` for unseen identities)
    pub async fn current(&self, user_id: UserId) -> ConversationState {
        let slot = match self.sessions.get(&user_id) {
            Some(entry) => entry.value().clone(),
            None => return ConversationState::Idle,
        };
        let state = slot.lock().await;
        state.clone()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

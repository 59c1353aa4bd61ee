//! Conversation engine.
//!
//! Routes one inbound event through the per-participant state machine and
//! performs its side effects: ledger writes, policy checks and replies.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::menu::{
    self, AdminAction, CommitmentChoice, MainAction, StatsChoice, CALLBACK_ALREADY_WORKING,
    CALLBACK_START_AGREEMENT,
};
use super::messages::{self, CaptionCounts};
use super::state::{ConversationState, RegistrationStep, SessionStore};
use crate::error::{EngineError, LedgerError};
use crate::ledger::{
    ActivityTotals, DateRange, Ledger, NewParticipant, Participant, RegisterOutcome,
    SubmissionKind, UserId,
};
use crate::policy::{Decision, SubmissionAttempt, SubmissionPolicy};
use crate::report::week_start;
use crate::transport::{ChatId, ChatTransport, EventKind, InboundEvent, Keyboard, MediaRef};

/// Days covered by the "last 30 days" stats view
const RECENT_STATS_DAYS: i64 = 30;

/// Deployment-specific engine settings
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// The only identity allowed into the admin flows
    pub admin_id: UserId,
    /// Distribution group for forwarded media and relayed messages
    pub group_id: ChatId,
    pub broadcast_delay: Duration,
    /// Entries in the full report's leaderboard
    pub leaderboard_size: usize,
}

impl EngineSettings {
    pub fn new(admin_id: UserId, group_id: ChatId) -> Self {
        Self {
            admin_id,
            group_id,
            broadcast_delay: Duration::from_millis(50),
            leaderboard_size: 5,
        }
    }

    pub fn with_broadcast_delay(mut self, delay: Duration) -> Self {
        self.broadcast_delay = delay;
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum Relay {
    Issue,
    Question,
}

/// Per-participant state machine over a ledger and a chat transport.
///
/// Events for one identity are serialized by that identity's session lock;
/// different identities proceed concurrently.
pub struct ConversationEngine {
    pub(super) ledger: Arc<Ledger>,
    pub(super) transport: Arc<dyn ChatTransport>,
    pub(super) policy: SubmissionPolicy,
    pub(super) settings: EngineSettings,
    sessions: SessionStore,
}

impl ConversationEngine {
    pub fn new(
        ledger: Arc<Ledger>,
        transport: Arc<dyn ChatTransport>,
        policy: SubmissionPolicy,
        settings: EngineSettings,
    ) -> Self {
        Self {
            ledger,
            transport,
            policy,
            settings,
            sessions: SessionStore::new(),
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Current conversation state of `user_id`
    pub async fn state(&self, user_id: UserId) -> ConversationState {
        self.sessions.current(user_id).await
    }

    /// Handle one inbound event to completion.
    ///
    /// `NotFound` from the ledger is answered with a registration hint and
    /// resets the conversation; any other ledger failure is returned to the
    /// caller with the state left as it was.
    pub async fn handle(&self, event: InboundEvent) -> Result<(), EngineError> {
        let slot = self.sessions.slot(event.user_id);
        let mut state = slot.lock().await;
        let before = state.label();

        let result = match self.route(&event, &mut state).await {
            Err(EngineError::Ledger(LedgerError::NotFound(user_id))) => {
                debug!(user_id, "Unknown participant, asking to register");
                *state = ConversationState::Idle;
                self.reply(event.chat_id, messages::NOT_REGISTERED, None).await;
                Ok(())
            }
            other => other,
        };

        debug!(
            user_id = event.user_id,
            from = before,
            to = state.label(),
            "Event handled"
        );
        result
    }

    /// Generic failure notice for an event whose handling errored
    pub async fn notify_failure(&self, chat_id: ChatId) -> Result<(), EngineError> {
        self.transport
            .send_text(chat_id, messages::TRY_AGAIN, None)
            .await?;
        Ok(())
    }

    async fn route(
        &self,
        event: &InboundEvent,
        state: &mut ConversationState,
    ) -> Result<(), EngineError> {
        match &event.kind {
            EventKind::Command { name, .. } if name == "start" => return self.start(event, state).await,
            EventKind::Command { name, .. } if name == "admin" => {
                return self.open_admin(event, state).await
            }
            EventKind::Command { name, .. } if name == "report" => {
                return self.full_report(event).await
            }
            EventKind::Button { callback_id, data } => {
                return self.button(event, callback_id, data).await
            }
            _ => {}
        }

        if let ConversationState::Registering(step) = state {
            return match &event.kind {
                EventKind::Text(text) => {
                    let step = step.clone();
                    self.registration(event, step, text, state).await
                }
                _ => Ok(()),
            };
        }

        if let EventKind::Text(text) = &event.kind {
            if let Some(action) = MainAction::parse(text) {
                return self.main_action(event, action, state).await;
            }
        }

        let current = state.clone();
        match (&current, &event.kind) {
            (ConversationState::AwaitingShortSubmission, EventKind::Media(media)) => {
                self.short_submission(event, media).await
            }
            (ConversationState::AwaitingLongSubmission, EventKind::Media(media)) => {
                self.long_submission(event, media, state).await
            }
            (ConversationState::AwaitingStatsChoice, EventKind::Text(text)) => {
                match StatsChoice::parse(text) {
                    Some(choice) => self.stats(event, choice, state).await,
                    None => Ok(()),
                }
            }
            (ConversationState::ReportingIssue, EventKind::Text(text)) => {
                self.relay(event, Relay::Issue, text, state).await
            }
            (ConversationState::AskingQuestion, EventKind::Text(text)) => {
                self.relay(event, Relay::Question, text, state).await
            }
            (ConversationState::AdminMenu, EventKind::Text(text)) => match AdminAction::parse(text) {
                Some(action) => self.admin_action(event, action, state).await,
                None => Ok(()),
            },
            (ConversationState::AdminAwaitingBroadcast, EventKind::Text(text)) => {
                self.run_broadcast(event, text, state).await
            }
            (ConversationState::AdminCommitmentMenu, EventKind::Text(text)) => {
                match CommitmentChoice::parse(text) {
                    Some(choice) => self.commitment(event, choice, state).await,
                    None => Ok(()),
                }
            }
            (ConversationState::Idle, _) => self.unrecognized(event).await,
            _ => {
                debug!(user_id = event.user_id, state = current.label(), "Ignoring input mid-flow");
                Ok(())
            }
        }
    }

    /// Deliver a reply; a failure is logged and otherwise ignored
    pub(super) async fn reply(&self, chat_id: ChatId, text: &str, keyboard: Option<&Keyboard>) {
        if let Err(e) = self.transport.send_text(chat_id, text, keyboard).await {
            warn!(chat_id, error = %e, "Failed to deliver reply");
        }
    }

    async fn answer(&self, callback_id: &str, text: Option<&str>) {
        if let Err(e) = self.transport.answer_button(callback_id, text).await {
            warn!(callback_id, error = %e, "Failed to answer button");
        }
    }

    fn require(&self, user_id: UserId) -> Result<Participant, LedgerError> {
        self.ledger.find(user_id)?.ok_or(LedgerError::NotFound(user_id))
    }

    async fn start(
        &self,
        event: &InboundEvent,
        state: &mut ConversationState,
    ) -> Result<(), EngineError> {
        if self.ledger.find(event.user_id)?.is_some() {
            *state = ConversationState::Idle;
            self.reply(event.chat_id, messages::WELCOME_BACK, Some(&menu::main_menu()))
                .await;
        } else {
            *state = ConversationState::Registering(RegistrationStep::Name);
            self.reply(event.chat_id, messages::WELCOME_NEW, None).await;
        }
        Ok(())
    }

    async fn registration(
        &self,
        event: &InboundEvent,
        step: RegistrationStep,
        text: &str,
        state: &mut ConversationState,
    ) -> Result<(), EngineError> {
        match step {
            RegistrationStep::Name => {
                let name = text.trim();
                if name.is_empty() {
                    return Ok(());
                }
                *state = ConversationState::Registering(RegistrationStep::Age {
                    name: name.to_string(),
                });
                self.reply(event.chat_id, messages::ASK_AGE, None).await;
            }
            RegistrationStep::Age { name } => match parse_age(text) {
                Some(age) => {
                    *state = ConversationState::Registering(RegistrationStep::Channel { name, age });
                    self.reply(event.chat_id, messages::ASK_CHANNEL, None).await;
                }
                None => {
                    debug!(user_id = event.user_id, "Rejected age input");
                    self.reply(event.chat_id, messages::INVALID_AGE, None).await;
                }
            },
            RegistrationStep::Channel { name, age } => {
                let input = NewParticipant {
                    user_id: event.user_id,
                    name,
                    age: Some(age),
                    channel: text.trim().to_string(),
                };
                let outcome = self.ledger.register(&input, event.at)?;
                *state = ConversationState::Idle;
                let text = match outcome {
                    RegisterOutcome::Created => messages::REGISTRATION_SUCCESS,
                    RegisterOutcome::AlreadyExists => messages::ALREADY_REGISTERED,
                };
                self.reply(event.chat_id, text, Some(&menu::main_menu())).await;
            }
        }
        Ok(())
    }

    async fn main_action(
        &self,
        event: &InboundEvent,
        action: MainAction,
        state: &mut ConversationState,
    ) -> Result<(), EngineError> {
        let participant = self.require(event.user_id)?;
        let chat_id = event.chat_id;

        match action {
            MainAction::ShortSubmission => {
                *state = ConversationState::AwaitingShortSubmission;
                self.reply(chat_id, messages::SHORT_REQUEST, None).await;
            }
            MainAction::LongSubmission => {
                match self.policy.cooldown_rejection(&participant, event.at) {
                    Some(rejection) => {
                        *state = ConversationState::Idle;
                        self.reply(chat_id, &messages::rejection(&rejection), None).await;
                    }
                    None => {
                        *state = ConversationState::AwaitingLongSubmission;
                        let text = messages::long_request(self.policy.config().long_cooldown_days);
                        self.reply(chat_id, &text, None).await;
                    }
                }
            }
            MainAction::MyStats => {
                *state = ConversationState::AwaitingStatsChoice;
                self.reply(chat_id, messages::CHOOSE_STATS_PERIOD, Some(&menu::stats_menu()))
                    .await;
            }
            MainAction::ReportIssue => {
                *state = ConversationState::ReportingIssue;
                self.reply(chat_id, messages::REPORT_ISSUE_PROMPT, None).await;
            }
            MainAction::AskQuestion => {
                *state = ConversationState::AskingQuestion;
                self.reply(chat_id, messages::ASK_QUESTION_PROMPT, None).await;
            }
            MainAction::AboutWork => {
                self.reply(chat_id, messages::ABOUT_WORK, Some(&menu::about_work_buttons()))
                    .await;
            }
            MainAction::Rewards => {
                self.reply(chat_id, messages::REWARDS, None).await;
            }
        }
        Ok(())
    }

    async fn short_submission(
        &self,
        event: &InboundEvent,
        media: &MediaRef,
    ) -> Result<(), EngineError> {
        let participant = self.require(event.user_id)?;
        let award = match self.policy.evaluate(&participant, SubmissionAttempt::Short, event.at) {
            Decision::Accept(award) => award,
            Decision::Reject(rejection) => {
                self.reply(event.chat_id, &messages::rejection(&rejection), None).await;
                return Ok(());
            }
        };

        self.ledger.apply_award(event.user_id, &award, event.at)?;
        let counts = self.caption_counts(event.user_id, event.at.date())?;
        self.forward_submission(event, &participant, award.kind, media, &counts)
            .await;

        let tier = self.policy.quota_tier(counts.today.short_count);
        self.reply(event.chat_id, &messages::quota(tier), None).await;
        Ok(())
    }

    async fn long_submission(
        &self,
        event: &InboundEvent,
        media: &MediaRef,
        state: &mut ConversationState,
    ) -> Result<(), EngineError> {
        let participant = self.require(event.user_id)?;
        let attempt = SubmissionAttempt::Long {
            duration_secs: media.duration_secs,
        };

        match self.policy.evaluate(&participant, attempt, event.at) {
            Decision::Reject(rejection) => {
                *state = ConversationState::Idle;
                self.reply(
                    event.chat_id,
                    &messages::rejection(&rejection),
                    Some(&menu::main_menu()),
                )
                .await;
            }
            Decision::Accept(award) => {
                self.ledger.apply_award(event.user_id, &award, event.at)?;
                *state = ConversationState::Idle;
                let counts = self.caption_counts(event.user_id, event.at.date())?;
                self.forward_submission(event, &participant, award.kind, media, &counts)
                    .await;
            }
        }
        Ok(())
    }

    fn caption_counts(&self, user_id: UserId, day: NaiveDate) -> Result<CaptionCounts, LedgerError> {
        Ok(CaptionCounts {
            today: self.ledger.activity_between(user_id, DateRange::day(day))?,
            week: self
                .ledger
                .activity_between(user_id, DateRange::new(week_start(day), day))?,
        })
    }

    /// Forward accepted media to the group and acknowledge to the sender
    async fn forward_submission(
        &self,
        event: &InboundEvent,
        participant: &Participant,
        kind: SubmissionKind,
        media: &MediaRef,
        counts: &CaptionCounts,
    ) {
        let caption = messages::submission_caption(kind, participant, event.at.date(), counts);
        match self
            .transport
            .send_media(self.settings.group_id, media, &caption)
            .await
        {
            Ok(()) => {
                let ack = match kind {
                    SubmissionKind::Short => messages::SHORT_RECEIVED,
                    SubmissionKind::Long => messages::LONG_RECEIVED,
                };
                self.reply(event.chat_id, ack, Some(&menu::main_menu())).await;
            }
            Err(e) => {
                warn!(user_id = event.user_id, kind = kind.as_str(), error = %e, "Failed to forward submission");
                self.reply(event.chat_id, &messages::forward_failed("video", &e), None)
                    .await;
            }
        }
    }

    async fn stats(
        &self,
        event: &InboundEvent,
        choice: StatsChoice,
        state: &mut ConversationState,
    ) -> Result<(), EngineError> {
        let text = match choice {
            StatsChoice::Today => {
                let totals = self
                    .ledger
                    .activity_between(event.user_id, DateRange::day(event.at.date()))?;
                messages::stats_today(&totals)
            }
            StatsChoice::Last30Days => {
                let recent =
                    self.ledger
                        .recent_submissions(event.user_id, RECENT_STATS_DAYS, event.at)?;
                let mut totals = ActivityTotals::default();
                for submission in &recent {
                    totals.add(submission.kind, submission.points_earned);
                }
                messages::stats_last_30_days(&totals)
            }
            StatsChoice::Back => messages::WELCOME_BACK.to_string(),
        };

        *state = ConversationState::Idle;
        self.reply(event.chat_id, &text, Some(&menu::main_menu())).await;
        Ok(())
    }

    async fn relay(
        &self,
        event: &InboundEvent,
        relay: Relay,
        text: &str,
        state: &mut ConversationState,
    ) -> Result<(), EngineError> {
        let participant = self.require(event.user_id)?;
        let today = event.at.date();
        let (body, what, confirmation) = match relay {
            Relay::Issue => (
                messages::issue_to_group(&participant, today, text),
                "problem",
                messages::ISSUE_RECEIVED,
            ),
            Relay::Question => (
                messages::question_to_group(&participant, today, text),
                "question",
                messages::QUESTION_RECEIVED,
            ),
        };

        let delivered = self
            .transport
            .send_text(self.settings.group_id, &body, None)
            .await;
        self.ledger.touch_last_activity(event.user_id, event.at)?;
        *state = ConversationState::Idle;

        match delivered {
            Ok(()) => {
                info!(user_id = event.user_id, kind = what, "Relayed to group");
                self.reply(event.chat_id, confirmation, Some(&menu::main_menu()))
                    .await;
            }
            Err(e) => {
                warn!(user_id = event.user_id, kind = what, error = %e, "Failed to relay to group");
                self.reply(
                    event.chat_id,
                    &messages::forward_failed(what, &e),
                    Some(&menu::main_menu()),
                )
                .await;
            }
        }
        Ok(())
    }

    async fn button(
        &self,
        event: &InboundEvent,
        callback_id: &str,
        data: &str,
    ) -> Result<(), EngineError> {
        match data {
            CALLBACK_START_AGREEMENT => match self.ledger.find(event.user_id)? {
                Some(participant) => {
                    let notice = messages::agreement_to_group(&participant, event.at.date());
                    match self
                        .transport
                        .send_text(self.settings.group_id, &notice, None)
                        .await
                    {
                        Ok(()) => {
                            info!(user_id = event.user_id, "Agreement forwarded to group");
                            self.answer(callback_id, Some(messages::AGREEMENT_ACK)).await;
                        }
                        Err(e) => {
                            warn!(user_id = event.user_id, error = %e, "Failed to forward agreement");
                            let text = messages::forward_failed("agreement", &e);
                            self.answer(callback_id, Some(text.as_str())).await;
                        }
                    }
                }
                None => {
                    self.reply(event.chat_id, messages::NOT_REGISTERED, None).await;
                    self.answer(callback_id, None).await;
                }
            },
            CALLBACK_ALREADY_WORKING => {
                self.reply(event.chat_id, messages::ALREADY_WORKING, Some(&menu::main_menu()))
                    .await;
                self.answer(callback_id, Some(messages::ALREADY_WORKING_ACK)).await;
            }
            other => {
                debug!(user_id = event.user_id, data = other, "Unknown button");
                self.answer(callback_id, None).await;
            }
        }
        Ok(())
    }

    async fn unrecognized(&self, event: &InboundEvent) -> Result<(), EngineError> {
        if self.ledger.find(event.user_id)?.is_some() {
            self.reply(event.chat_id, messages::WELCOME_BACK, Some(&menu::main_menu()))
                .await;
        } else {
            self.reply(event.chat_id, messages::NOT_REGISTERED, None).await;
        }
        Ok(())
    }
}

/// Age in `1..=120`, or `None` for anything else
fn parse_age(text: &str) -> Option<u8> {
    let age: u32 = text.trim().parse().ok()?;
    if (1..=120).contains(&age) {
        u8::try_from(age).ok()
    } else {
        None
    }
}

//! Administrator flows: full report, broadcast and commitment reports.

use tracing::{info, warn};

use super::machine::ConversationEngine;
use super::menu::{self, AdminAction, CommitmentChoice};
use super::messages::{self, MESSAGE_LIMIT};
use super::state::ConversationState;
use crate::broadcast::broadcast;
use crate::error::EngineError;
use crate::ledger::UserId;
use crate::report::{period_report, population_report};
use crate::transport::{ChatId, InboundEvent, Keyboard};

impl ConversationEngine {
    pub fn is_admin(&self, user_id: UserId) -> bool {
        user_id == self.settings.admin_id
    }

    /// Explicit refusal for non-admin callers; `true` when the caller may proceed
    async fn authorize(&self, event: &InboundEvent) -> bool {
        if self.is_admin(event.user_id) {
            return true;
        }
        warn!(user_id = event.user_id, "Admin command from non-admin");
        self.reply(event.chat_id, messages::ADMIN_ONLY, None).await;
        false
    }

    pub(super) async fn open_admin(
        &self,
        event: &InboundEvent,
        state: &mut ConversationState,
    ) -> Result<(), EngineError> {
        if !self.authorize(event).await {
            return Ok(());
        }
        *state = ConversationState::AdminMenu;
        self.reply(event.chat_id, messages::ADMIN_WELCOME, Some(&menu::admin_menu()))
            .await;
        Ok(())
    }

    /// Population report in transport-sized chunks; the state is not touched
    pub(super) async fn full_report(&self, event: &InboundEvent) -> Result<(), EngineError> {
        if !self.authorize(event).await {
            return Ok(());
        }
        let report = population_report(&self.ledger, self.settings.leaderboard_size)?;
        info!(participants = report.total_participants, "Full report requested");
        self.send_chunked(event.chat_id, &messages::population_report(&report), None)
            .await;
        Ok(())
    }

    pub(super) async fn admin_action(
        &self,
        event: &InboundEvent,
        action: AdminAction,
        state: &mut ConversationState,
    ) -> Result<(), EngineError> {
        match action {
            AdminAction::FullReport => return self.full_report(event).await,
            AdminAction::Broadcast => {
                *state = ConversationState::AdminAwaitingBroadcast;
                self.reply(event.chat_id, messages::BROADCAST_PROMPT, None).await;
            }
            AdminAction::CommitmentReport => {
                *state = ConversationState::AdminCommitmentMenu;
                self.reply(
                    event.chat_id,
                    messages::CHOOSE_COMMITMENT_PERIOD,
                    Some(&menu::commitment_menu()),
                )
                .await;
            }
            AdminAction::Exit => {
                *state = ConversationState::Idle;
                self.reply(event.chat_id, messages::WELCOME_BACK, Some(&menu::main_menu()))
                    .await;
            }
        }
        Ok(())
    }

    pub(super) async fn run_broadcast(
        &self,
        event: &InboundEvent,
        content: &str,
        state: &mut ConversationState,
    ) -> Result<(), EngineError> {
        let recipients = self.ledger.all_participants()?;
        let outcome = broadcast(
            self.transport.as_ref(),
            &recipients,
            self.settings.admin_id,
            content,
            self.settings.broadcast_delay,
        )
        .await;

        *state = ConversationState::AdminMenu;
        self.reply(
            event.chat_id,
            &messages::broadcast_summary(&outcome),
            Some(&menu::admin_menu()),
        )
        .await;
        Ok(())
    }

    pub(super) async fn commitment(
        &self,
        event: &InboundEvent,
        choice: CommitmentChoice,
        state: &mut ConversationState,
    ) -> Result<(), EngineError> {
        match choice {
            CommitmentChoice::Period(period) => {
                let report = period_report(
                    &self.ledger,
                    period,
                    event.at.date(),
                    self.policy.config().daily_short_target,
                )?;
                *state = ConversationState::AdminMenu;
                let text = messages::commitment_report(period.label(), &report);
                self.send_chunked(event.chat_id, &text, Some(&menu::admin_menu()))
                    .await;
            }
            CommitmentChoice::Back => {
                *state = ConversationState::AdminMenu;
                self.reply(event.chat_id, messages::ADMIN_WELCOME, Some(&menu::admin_menu()))
                    .await;
            }
        }
        Ok(())
    }

    /// Send `text` split at the message limit; `keyboard` goes on the last part
    async fn send_chunked(&self, chat_id: ChatId, text: &str, keyboard: Option<&Keyboard>) {
        let chunks = messages::chunk(text, MESSAGE_LIMIT);
        let last = chunks.len().saturating_sub(1);
        for (index, chunk) in chunks.iter().enumerate() {
            let keyboard = if index == last { keyboard } else { None };
            self.reply(chat_id, chunk, keyboard).await;
        }
    }
}

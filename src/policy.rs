//! Submission policy
//!
//! Decides whether a submission is accepted and what it earns. Pure: the
//! caller supplies the participant snapshot and the current time.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ledger::{Award, Participant, SubmissionKind};

/// Tunable policy values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Points for an accepted short-form submission
    #[serde(default = "default_short_points")]
    pub short_points: u32,

    /// Points for an accepted long-form submission
    #[serde(default = "default_long_points")]
    pub long_points: u32,

    /// Minimum duration reported by the transport for long-form media
    #[serde(default = "default_long_min_duration")]
    pub long_min_duration_secs: u32,

    /// Whole days required between long-form submissions
    #[serde(default = "default_long_cooldown_days")]
    pub long_cooldown_days: i64,

    /// Short-form submissions expected per day
    #[serde(default = "default_daily_short_target")]
    pub daily_short_target: u32,
}

fn default_short_points() -> u32 { 1 }
fn default_long_points() -> u32 { 10 }
fn default_long_min_duration() -> u32 { 300 }
fn default_long_cooldown_days() -> i64 { 3 }
fn default_daily_short_target() -> u32 { 3 }

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            short_points: default_short_points(),
            long_points: default_long_points(),
            long_min_duration_secs: default_long_min_duration(),
            long_cooldown_days: default_long_cooldown_days(),
            daily_short_target: default_daily_short_target(),
        }
    }
}

/// What the participant tried to submit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionAttempt {
    Short,
    Long { duration_secs: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    TooShort { min_secs: u32, actual_secs: u32 },
    OnCooldown { remaining_days: i64, since: NaiveDateTime },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accept(Award),
    Reject(Rejection),
}

/// Reply tone for the daily short-form quota. Never a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaTier {
    UnderTarget { count: u32, target: u32 },
    TargetMet,
    OverTarget { count: u32 },
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionPolicy {
    config: PolicyConfig,
}

impl SubmissionPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn evaluate(
        &self,
        participant: &Participant,
        attempt: SubmissionAttempt,
        now: NaiveDateTime,
    ) -> Decision {
        match attempt {
            // No duration floor for short-form media.
            SubmissionAttempt::Short => Decision::Accept(Award {
                kind: SubmissionKind::Short,
                points: self.config.short_points,
                touches_long: false,
            }),
            SubmissionAttempt::Long { duration_secs } => {
                if duration_secs < self.config.long_min_duration_secs {
                    debug!(user_id = participant.user_id, duration_secs, "Long submission too short");
                    return Decision::Reject(Rejection::TooShort {
                        min_secs: self.config.long_min_duration_secs,
                        actual_secs: duration_secs,
                    });
                }

                if let Some(rejection) = self.cooldown_rejection(participant, now) {
                    debug!(user_id = participant.user_id, ?rejection, "Long submission on cooldown");
                    return Decision::Reject(rejection);
                }

                Decision::Accept(Award {
                    kind: SubmissionKind::Long,
                    points: self.config.long_points,
                    touches_long: true,
                })
            }
        }
    }

    /// `OnCooldown` if a long-form submission made at `now` would be too early
    pub fn cooldown_rejection(&self, participant: &Participant, now: NaiveDateTime) -> Option<Rejection> {
        let since = participant.last_long_submission_at?;
        let elapsed_days = (now - since).num_days().max(0);
        if elapsed_days < self.config.long_cooldown_days {
            Some(Rejection::OnCooldown {
                remaining_days: self.config.long_cooldown_days - elapsed_days,
                since,
            })
        } else {
            None
        }
    }

    pub fn quota_tier(&self, count_today: u32) -> QuotaTier {
        let target = self.config.daily_short_target;
        if count_today < target {
            QuotaTier::UnderTarget { count: count_today, target }
        } else if count_today == target {
            QuotaTier::TargetMet
        } else {
            QuotaTier::OverTarget { count: count_today }
        }
    }
}

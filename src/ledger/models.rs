//! Ledger row types

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Stable participant identity as issued by the chat transport
pub type UserId = i64;

/// Timestamp text format used in every table
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn format_ts(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_ts(raw: &str) -> Result<NaiveDateTime, rusqlite::Error> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Registered participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub name: String,
    pub age: Option<u8>,
    pub channel: String,
    pub points: i64,
    pub last_long_submission_at: Option<NaiveDateTime>,
    pub last_activity_at: Option<NaiveDateTime>,
    pub registered_at: NaiveDateTime,
}

impl Participant {
    pub(crate) fn from_row(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        let last_long: Option<String> = row.get("last_long_submission_at")?;
        let last_activity: Option<String> = row.get("last_activity_at")?;
        let registered: String = row.get("registered_at")?;

        Ok(Self {
            user_id: row.get("user_id")?,
            name: row.get("name")?,
            age: row.get("age")?,
            channel: row.get("channel")?,
            points: row.get("points")?,
            last_long_submission_at: last_long.as_deref().map(parse_ts).transpose()?,
            last_activity_at: last_activity.as_deref().map(parse_ts).transpose()?,
            registered_at: parse_ts(&registered)?,
        })
    }
}

/// Declared fields collected by the registration flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParticipant {
    pub user_id: UserId,
    pub name: String,
    pub age: Option<u8>,
    pub channel: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    AlreadyExists,
}

/// Submission form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionKind {
    Short,
    Long,
}

impl SubmissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionKind::Short => "short",
            SubmissionKind::Long => "long",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "short" => Some(SubmissionKind::Short),
            "long" => Some(SubmissionKind::Long),
            _ => None,
        }
    }
}

/// One accepted submission; rows are never updated or deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub user_id: UserId,
    pub kind: SubmissionKind,
    pub points_earned: u32,
    pub sent_at: NaiveDateTime,
}

impl Submission {
    pub(crate) fn from_row(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        let kind: String = row.get("kind")?;
        let sent_at: String = row.get("sent_at")?;

        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            kind: SubmissionKind::parse(&kind).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!("unknown submission kind '{}'", kind).into(),
                )
            })?,
            points_earned: row.get("points_earned")?,
            sent_at: parse_ts(&sent_at)?,
        })
    }
}

/// Points awarded for an accepted submission, as decided by the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Award {
    pub kind: SubmissionKind,
    pub points: u32,
    /// Whether the award restarts the long-form cooldown
    pub touches_long: bool,
}

/// Inclusive calendar-day range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn day(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    /// Number of calendar days covered, at least one
    pub fn days(&self) -> u32 {
        let span = (self.end - self.start).num_days() + 1;
        span.max(1) as u32
    }

    /// Half-open timestamp bounds `[lower, upper)` in storage format
    pub(crate) fn bounds(&self) -> (String, String) {
        let lower = format!("{} 00:00:00", self.start.format("%Y-%m-%d"));
        let upper = match self.end.succ_opt() {
            Some(next) => format!("{} 00:00:00", next.format("%Y-%m-%d")),
            None => "9999-12-31 23:59:59".to_string(),
        };
        (lower, upper)
    }
}

/// Per-participant totals over some window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTotals {
    pub short_count: u32,
    pub long_count: u32,
    pub points: i64,
}

impl ActivityTotals {
    pub fn has_activity(&self) -> bool {
        self.short_count > 0 || self.long_count > 0
    }

    pub fn add(&mut self, kind: SubmissionKind, points: u32) {
        match kind {
            SubmissionKind::Short => self.short_count += 1,
            SubmissionKind::Long => self.long_count += 1,
        }
        self.points += points as i64;
    }
}

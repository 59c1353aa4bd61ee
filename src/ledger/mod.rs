//! Ledger store: participants and their submission log
//!
//! ## Tables
//!
//! - `participants` - declared fields, point counter, cooldown/activity timestamps
//! - `submissions` - append-only log of accepted submissions
//!
//! Every compound mutation runs inside one SQLite transaction while the
//! connection mutex is held, so a reader can never see a point counter that
//! disagrees with the submission log.

pub mod models;
pub mod participants;
pub mod schema;
pub mod submissions;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{Duration, NaiveDateTime};
use rusqlite::{Connection, Transaction};
use tracing::{debug, info};

use crate::error::LedgerError;

pub use models::{
    ActivityTotals, Award, DateRange, NewParticipant, Participant, RegisterOutcome, Submission,
    SubmissionKind, UserId,
};

/// Consistent read of the whole population
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationSnapshot {
    /// Registration order
    pub participants: Vec<Participant>,
    /// Only participants with at least one submission appear
    pub lifetime: HashMap<UserId, ActivityTotals>,
    pub total_short: u64,
    pub total_long: u64,
    pub leaders: Vec<Participant>,
}

/// SQLite-backed ledger
pub struct Ledger {
    conn: Mutex<Connection>,
}

impl Ledger {
    /// Open or create the ledger database at `db_path`
    pub fn open(db_path: &Path) -> Result<Self, LedgerError> {
        info!("Opening ledger database at {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    LedgerError::Internal(format!("Failed to create {:?}: {}", parent, e))
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        let ledger = Self {
            conn: Mutex::new(conn),
        };
        ledger.with_conn(|conn| schema::init_schema(conn))?;
        Ok(ledger)
    }

    /// Open an in-memory ledger (for testing)
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        debug!("Opening in-memory ledger");

        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let ledger = Self {
            conn: Mutex::new(conn),
        };
        ledger.with_conn(|conn| schema::init_schema(conn))?;
        Ok(ledger)
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&Connection) -> Result<T, LedgerError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LedgerError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run `f` in a transaction; any error rolls the whole unit back
    fn with_tx<F, T>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&Transaction) -> Result<T, LedgerError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| LedgerError::Internal(format!("Lock poisoned: {}", e)))?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn register(
        &self,
        input: &NewParticipant,
        at: NaiveDateTime,
    ) -> Result<RegisterOutcome, LedgerError> {
        let outcome = self.with_conn(|conn| participants::register(conn, input, at))?;
        if outcome == RegisterOutcome::Created {
            info!(user_id = input.user_id, name = %input.name, "Participant registered");
        }
        Ok(outcome)
    }

    pub fn find(&self, user_id: UserId) -> Result<Option<Participant>, LedgerError> {
        self.with_conn(|conn| participants::find(conn, user_id))
    }

    /// Append a submission and credit its points in one transaction
    pub fn record_submission(
        &self,
        user_id: UserId,
        kind: SubmissionKind,
        points: u32,
        at: NaiveDateTime,
    ) -> Result<Submission, LedgerError> {
        self.with_tx(|tx| {
            participants::require(tx, user_id)?;
            let submission = submissions::append(tx, user_id, kind, points, at)?;
            participants::add_points(tx, user_id, points)?;
            Ok(submission)
        })
    }

    /// Apply an accepted award: submission row, points, activity and, for
    /// long-form awards, the cooldown anchor. All or nothing.
    pub fn apply_award(
        &self,
        user_id: UserId,
        award: &Award,
        at: NaiveDateTime,
    ) -> Result<Submission, LedgerError> {
        let submission = self.with_tx(|tx| {
            participants::require(tx, user_id)?;
            let submission = submissions::append(tx, user_id, award.kind, award.points, at)?;
            participants::add_points(tx, user_id, award.points)?;
            participants::touch_last_activity(tx, user_id, submission.sent_at)?;
            if award.touches_long {
                participants::touch_last_long_submission(tx, user_id, submission.sent_at)?;
            }
            Ok(submission)
        })?;

        info!(
            user_id,
            kind = award.kind.as_str(),
            points = award.points,
            "Submission recorded"
        );
        Ok(submission)
    }

    pub fn touch_last_activity(&self, user_id: UserId, at: NaiveDateTime) -> Result<(), LedgerError> {
        self.with_conn(|conn| participants::touch_last_activity(conn, user_id, at))
    }

    pub fn touch_last_long_submission(
        &self,
        user_id: UserId,
        at: NaiveDateTime,
    ) -> Result<(), LedgerError> {
        self.with_conn(|conn| participants::touch_last_long_submission(conn, user_id, at))
    }

    /// Submissions of `kind` within an inclusive calendar-day range
    pub fn count_submissions(
        &self,
        user_id: UserId,
        kind: SubmissionKind,
        range: DateRange,
    ) -> Result<u32, LedgerError> {
        self.with_conn(|conn| {
            participants::require(conn, user_id)?;
            submissions::count_in_range(conn, user_id, kind, range)
        })
    }

    pub fn activity_between(
        &self,
        user_id: UserId,
        range: DateRange,
    ) -> Result<ActivityTotals, LedgerError> {
        self.with_conn(|conn| {
            participants::require(conn, user_id)?;
            submissions::totals_in_range(conn, user_id, range)
        })
    }

    pub fn lifetime_activity(&self, user_id: UserId) -> Result<ActivityTotals, LedgerError> {
        self.with_conn(|conn| {
            participants::require(conn, user_id)?;
            submissions::lifetime_totals(conn, user_id)
        })
    }

    pub fn submissions_since(
        &self,
        user_id: UserId,
        since: NaiveDateTime,
    ) -> Result<Vec<Submission>, LedgerError> {
        self.with_conn(|conn| {
            participants::require(conn, user_id)?;
            submissions::since(conn, user_id, since)
        })
    }

    /// Submissions in the trailing `days`-day window ending at `now`
    pub fn recent_submissions(
        &self,
        user_id: UserId,
        days: i64,
        now: NaiveDateTime,
    ) -> Result<Vec<Submission>, LedgerError> {
        self.submissions_since(user_id, now - Duration::days(days))
    }

    pub fn latest_submission(&self, user_id: UserId) -> Result<Option<Submission>, LedgerError> {
        self.with_conn(|conn| {
            participants::require(conn, user_id)?;
            submissions::latest(conn, user_id)
        })
    }

    /// Count across all participants; `None` counts every kind
    pub fn global_count(&self, kind: Option<SubmissionKind>) -> Result<u64, LedgerError> {
        self.with_conn(|conn| submissions::global_count(conn, kind))
    }

    pub fn top_participants(&self, limit: usize) -> Result<Vec<Participant>, LedgerError> {
        self.with_conn(|conn| participants::top(conn, limit))
    }

    /// All participants in registration order
    pub fn all_participants(&self) -> Result<Vec<Participant>, LedgerError> {
        self.with_conn(participants::all)
    }

    /// Per-participant totals for one range, read under a single lock
    pub fn interval_activity(
        &self,
        range: DateRange,
    ) -> Result<HashMap<UserId, ActivityTotals>, LedgerError> {
        self.with_conn(|conn| submissions::totals_by_participant(conn, range))
    }

    /// Participants, lifetime totals, global counts and leaders read under one
    /// lock, so every row's point counter agrees with its submission totals.
    pub fn population_snapshot(&self, leader_count: usize) -> Result<PopulationSnapshot, LedgerError> {
        self.with_conn(|conn| {
            Ok(PopulationSnapshot {
                participants: participants::all(conn)?,
                lifetime: submissions::lifetime_by_participant(conn)?,
                total_short: submissions::global_count(conn, Some(SubmissionKind::Short))?,
                total_long: submissions::global_count(conn, Some(SubmissionKind::Long))?,
                leaders: participants::top(conn, leader_count)?,
            })
        })
    }

    /// `(points counter, sum of points_earned)` for one participant
    pub fn points_audit(&self, user_id: UserId) -> Result<(i64, i64), LedgerError> {
        self.with_conn(|conn| {
            let participant =
                participants::find(conn, user_id)?.ok_or(LedgerError::NotFound(user_id))?;
            let sum = submissions::points_sum(conn, user_id)?;
            Ok((participant.points, sum))
        })
    }
}

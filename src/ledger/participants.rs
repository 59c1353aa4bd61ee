//! Participant queries and mutations

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::models::{format_ts, NewParticipant, Participant, RegisterOutcome, UserId};
use crate::error::LedgerError;

const PARTICIPANT_COLUMNS: &str = "user_id, name, age, channel, points, \
     last_long_submission_at, last_activity_at, registered_at";

/// Insert a participant unless the identity is already known.
///
/// Declared fields of an existing participant are never touched.
pub fn register(
    conn: &Connection,
    input: &NewParticipant,
    at: NaiveDateTime,
) -> Result<RegisterOutcome, LedgerError> {
    let inserted = conn.execute(
        "INSERT INTO participants (user_id, name, age, channel, registered_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id) DO NOTHING",
        params![input.user_id, input.name, input.age, input.channel, format_ts(at)],
    )?;

    if inserted == 0 {
        debug!(user_id = input.user_id, "Registration skipped, participant exists");
        Ok(RegisterOutcome::AlreadyExists)
    } else {
        Ok(RegisterOutcome::Created)
    }
}

pub fn find(conn: &Connection, user_id: UserId) -> Result<Option<Participant>, LedgerError> {
    let sql = format!("SELECT {} FROM participants WHERE user_id = ?", PARTICIPANT_COLUMNS);
    let participant = conn
        .query_row(&sql, params![user_id], |row| Participant::from_row(row))
        .optional()?;
    Ok(participant)
}

pub fn exists(conn: &Connection, user_id: UserId) -> Result<bool, LedgerError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM participants WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Fail with `NotFound` unless the participant exists
pub fn require(conn: &Connection, user_id: UserId) -> Result<(), LedgerError> {
    if exists(conn, user_id)? {
        Ok(())
    } else {
        Err(LedgerError::NotFound(user_id))
    }
}

pub fn add_points(conn: &Connection, user_id: UserId, points: u32) -> Result<(), LedgerError> {
    let updated = conn.execute(
        "UPDATE participants SET points = points + ?1 WHERE user_id = ?2",
        params![points, user_id],
    )?;
    if updated == 0 {
        return Err(LedgerError::NotFound(user_id));
    }
    Ok(())
}

pub fn touch_last_activity(
    conn: &Connection,
    user_id: UserId,
    at: NaiveDateTime,
) -> Result<(), LedgerError> {
    let updated = conn.execute(
        "UPDATE participants SET last_activity_at = ?1 WHERE user_id = ?2",
        params![format_ts(at), user_id],
    )?;
    if updated == 0 {
        return Err(LedgerError::NotFound(user_id));
    }
    Ok(())
}

pub fn touch_last_long_submission(
    conn: &Connection,
    user_id: UserId,
    at: NaiveDateTime,
) -> Result<(), LedgerError> {
    let updated = conn.execute(
        "UPDATE participants SET last_long_submission_at = ?1 WHERE user_id = ?2",
        params![format_ts(at), user_id],
    )?;
    if updated == 0 {
        return Err(LedgerError::NotFound(user_id));
    }
    Ok(())
}

/// Every participant in registration order
pub fn all(conn: &Connection) -> Result<Vec<Participant>, LedgerError> {
    let sql = format!("SELECT {} FROM participants ORDER BY seq ASC", PARTICIPANT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Participant::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Highest point totals first; equal totals keep registration order
pub fn top(conn: &Connection, limit: usize) -> Result<Vec<Participant>, LedgerError> {
    let sql = format!(
        "SELECT {} FROM participants ORDER BY points DESC, seq ASC LIMIT ?",
        PARTICIPANT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![limit as i64], |row| Participant::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

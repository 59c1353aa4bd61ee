//! Submission log: appends and range queries

use std::collections::HashMap;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Params, Statement};
use tracing::debug;

use super::models::{
    format_ts, parse_ts, ActivityTotals, DateRange, Submission, SubmissionKind, UserId,
};
use crate::error::LedgerError;

const SUBMISSION_COLUMNS: &str = "id, user_id, kind, points_earned, sent_at";

/// Append one submission row.
///
/// `sent_at` never moves backwards for a participant: an earlier `at` is clamped
/// to the latest stored timestamp. Does not touch the points counter.
pub fn append(
    conn: &Connection,
    user_id: UserId,
    kind: SubmissionKind,
    points: u32,
    at: NaiveDateTime,
) -> Result<Submission, LedgerError> {
    let latest: Option<String> = conn
        .query_row(
            "SELECT MAX(sent_at) FROM submissions WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?
        .flatten();

    let mut sent_at = at;
    if let Some(raw) = latest {
        let latest = parse_ts(&raw)?;
        if latest > at {
            debug!(user_id, %at, %latest, "Clamping submission timestamp");
            sent_at = latest;
        }
    }

    conn.execute(
        "INSERT INTO submissions (user_id, kind, points_earned, sent_at) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, kind.as_str(), points, format_ts(sent_at)],
    )?;

    Ok(Submission {
        id: conn.last_insert_rowid(),
        user_id,
        kind,
        points_earned: points,
        sent_at,
    })
}

pub fn count_in_range(
    conn: &Connection,
    user_id: UserId,
    kind: SubmissionKind,
    range: DateRange,
) -> Result<u32, LedgerError> {
    let (lower, upper) = range.bounds();
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM submissions
         WHERE user_id = ?1 AND kind = ?2 AND sent_at >= ?3 AND sent_at < ?4",
        params![user_id, kind.as_str(), lower, upper],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn totals_in_range(
    conn: &Connection,
    user_id: UserId,
    range: DateRange,
) -> Result<ActivityTotals, LedgerError> {
    let (lower, upper) = range.bounds();
    let mut stmt = conn.prepare(
        "SELECT kind, COUNT(*), COALESCE(SUM(points_earned), 0) FROM submissions
         WHERE user_id = ?1 AND sent_at >= ?2 AND sent_at < ?3
         GROUP BY kind",
    )?;
    let rows = stmt.query_map(params![user_id, lower, upper], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, u32>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;

    let mut totals = ActivityTotals::default();
    for row in rows {
        let (kind, count, points) = row?;
        apply_group(&mut totals, &kind, count, points);
    }
    Ok(totals)
}

pub fn lifetime_totals(conn: &Connection, user_id: UserId) -> Result<ActivityTotals, LedgerError> {
    let mut stmt = conn.prepare(
        "SELECT kind, COUNT(*), COALESCE(SUM(points_earned), 0) FROM submissions
         WHERE user_id = ? GROUP BY kind",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, u32>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;

    let mut totals = ActivityTotals::default();
    for row in rows {
        let (kind, count, points) = row?;
        apply_group(&mut totals, &kind, count, points);
    }
    Ok(totals)
}

/// Totals for every participant that has at least one submission in range
pub fn totals_by_participant(
    conn: &Connection,
    range: DateRange,
) -> Result<HashMap<UserId, ActivityTotals>, LedgerError> {
    let (lower, upper) = range.bounds();
    let mut stmt = conn.prepare(
        "SELECT user_id, kind, COUNT(*), COALESCE(SUM(points_earned), 0) FROM submissions
         WHERE sent_at >= ?1 AND sent_at < ?2
         GROUP BY user_id, kind",
    )?;
    grouped_totals(&mut stmt, params![lower, upper])
}

/// All-time totals for every participant with at least one submission
pub fn lifetime_by_participant(
    conn: &Connection,
) -> Result<HashMap<UserId, ActivityTotals>, LedgerError> {
    let mut stmt = conn.prepare(
        "SELECT user_id, kind, COUNT(*), COALESCE(SUM(points_earned), 0) FROM submissions
         GROUP BY user_id, kind",
    )?;
    grouped_totals(&mut stmt, params![])
}

fn grouped_totals<P: Params>(
    stmt: &mut Statement<'_>,
    params: P,
) -> Result<HashMap<UserId, ActivityTotals>, LedgerError> {
    let rows = stmt.query_map(params, |row| {
        Ok((
            row.get::<_, UserId>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, u32>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;

    let mut by_user: HashMap<UserId, ActivityTotals> = HashMap::new();
    for row in rows {
        let (user_id, kind, count, points) = row?;
        apply_group(by_user.entry(user_id).or_default(), &kind, count, points);
    }
    Ok(by_user)
}

fn apply_group(totals: &mut ActivityTotals, kind: &str, count: u32, points: i64) {
    match SubmissionKind::parse(kind) {
        Some(SubmissionKind::Short) => totals.short_count += count,
        Some(SubmissionKind::Long) => totals.long_count += count,
        None => return,
    }
    totals.points += points;
}

pub fn since(
    conn: &Connection,
    user_id: UserId,
    since: NaiveDateTime,
) -> Result<Vec<Submission>, LedgerError> {
    let sql = format!(
        "SELECT {} FROM submissions WHERE user_id = ?1 AND sent_at >= ?2 ORDER BY id ASC",
        SUBMISSION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id, format_ts(since)], |row| Submission::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn latest(conn: &Connection, user_id: UserId) -> Result<Option<Submission>, LedgerError> {
    let sql = format!(
        "SELECT {} FROM submissions WHERE user_id = ? ORDER BY id DESC LIMIT 1",
        SUBMISSION_COLUMNS
    );
    let submission = conn
        .query_row(&sql, params![user_id], |row| Submission::from_row(row))
        .optional()?;
    Ok(submission)
}

pub fn global_count(conn: &Connection, kind: Option<SubmissionKind>) -> Result<u64, LedgerError> {
    let count: i64 = match kind {
        Some(kind) => conn.query_row(
            "SELECT COUNT(*) FROM submissions WHERE kind = ?",
            params![kind.as_str()],
            |row| row.get(0),
        )?,
        None => conn.query_row("SELECT COUNT(*) FROM submissions", [], |row| row.get(0))?,
    };
    Ok(count as u64)
}

pub fn points_sum(conn: &Connection, user_id: UserId) -> Result<i64, LedgerError> {
    let sum: i64 = conn.query_row(
        "SELECT COALESCE(SUM(points_earned), 0) FROM submissions WHERE user_id = ?",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(sum)
}

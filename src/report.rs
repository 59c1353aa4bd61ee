//! Commitment and population reports
//!
//! Stateless aggregation over the ledger. Rendering and chunking for the
//! transport live with the conversation messages, not here.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LedgerError;
use crate::ledger::{ActivityTotals, DateRange, Ledger, Participant};

/// Reporting period anchored on a reference day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Daily,
    /// Monday of the current week through the reference day. The target
    /// scales with calendar days elapsed, weekend days included.
    Weekly,
    /// First of the month through the reference day
    Monthly,
}

impl Period {
    pub fn label(&self) -> &'static str {
        match self {
            Period::Daily => "Daily",
            Period::Weekly => "Weekly",
            Period::Monthly => "Monthly",
        }
    }

    pub fn range(&self, today: NaiveDate) -> DateRange {
        match self {
            Period::Daily => DateRange::day(today),
            Period::Weekly => DateRange::new(week_start(today), today),
            Period::Monthly => DateRange::new(today - Duration::days(today.day0() as i64), today),
        }
    }

    /// Days of the period elapsed up to and including `today`
    pub fn elapsed_days(&self, today: NaiveDate) -> u32 {
        match self {
            Period::Daily => 1,
            Period::Weekly => today.weekday().num_days_from_monday() + 1,
            Period::Monthly => today.day(),
        }
    }
}

/// Monday of the week containing `day`
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.weekday().num_days_from_monday() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Commitment {
    MetTarget,
    MissedTarget,
    NoActivity,
}

impl Commitment {
    pub fn classify(activity: &ActivityTotals, required_short: u32) -> Self {
        if !activity.has_activity() {
            Commitment::NoActivity
        } else if activity.short_count >= required_short {
            Commitment::MetTarget
        } else {
            Commitment::MissedTarget
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentRow {
    pub participant: Participant,
    pub activity: ActivityTotals,
    pub commitment: Commitment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentReport {
    pub range: DateRange,
    pub required_short: u32,
    pub rows: Vec<CommitmentRow>,
}

impl CommitmentReport {
    pub fn count(&self, commitment: Commitment) -> usize {
        self.rows.iter().filter(|row| row.commitment == commitment).count()
    }
}

/// Commitment report for `range`, requiring `required_short` short submissions.
///
/// Rows are sorted by interval points, highest first; ties keep registration order.
pub fn commitment_report(
    ledger: &Ledger,
    range: DateRange,
    required_short: u32,
) -> Result<CommitmentReport, LedgerError> {
    let participants = ledger.all_participants()?;
    let activity = ledger.interval_activity(range)?;

    let mut rows: Vec<CommitmentRow> = participants
        .into_iter()
        .map(|participant| {
            let totals = activity.get(&participant.user_id).copied().unwrap_or_default();
            CommitmentRow {
                commitment: Commitment::classify(&totals, required_short),
                activity: totals,
                participant,
            }
        })
        .collect();

    // sort_by is stable
    rows.sort_by(|a, b| b.activity.points.cmp(&a.activity.points));

    debug!(
        start = %range.start,
        end = %range.end,
        participants = rows.len(),
        required_short,
        "Commitment report built"
    );

    Ok(CommitmentReport {
        range,
        required_short,
        rows,
    })
}

/// Commitment report for a named period ending on `today`
pub fn period_report(
    ledger: &Ledger,
    period: Period,
    today: NaiveDate,
    daily_target: u32,
) -> Result<CommitmentReport, LedgerError> {
    let required = daily_target * period.elapsed_days(today);
    commitment_report(ledger, period.range(today), required)
}

/// Commitment report for an arbitrary range, scaled by its length in days
pub fn range_report(
    ledger: &Ledger,
    range: DateRange,
    daily_target: u32,
) -> Result<CommitmentReport, LedgerError> {
    commitment_report(ledger, range, daily_target * range.days())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationRow {
    pub participant: Participant,
    pub lifetime: ActivityTotals,
}

/// All-time overview of every participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationReport {
    pub total_participants: usize,
    pub total_short: u64,
    pub total_long: u64,
    pub leaders: Vec<Participant>,
    pub rows: Vec<PopulationRow>,
}

/// Built from one ledger snapshot; rows are sorted by points, ties keep
/// registration order.
pub fn population_report(ledger: &Ledger, leader_count: usize) -> Result<PopulationReport, LedgerError> {
    let snapshot = ledger.population_snapshot(leader_count)?;

    let mut rows: Vec<PopulationRow> = snapshot
        .participants
        .into_iter()
        .map(|participant| PopulationRow {
            lifetime: snapshot.lifetime.get(&participant.user_id).copied().unwrap_or_default(),
            participant,
        })
        .collect();
    rows.sort_by(|a, b| b.participant.points.cmp(&a.participant.points));

    Ok(PopulationReport {
        total_participants: rows.len(),
        total_short: snapshot.total_short,
        total_long: snapshot.total_long,
        leaders: snapshot.leaders,
        rows,
    })
}

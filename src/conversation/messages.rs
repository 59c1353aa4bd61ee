//! Outbound message texts.
//!
//! Static replies are constants; anything carrying data is a builder taking
//! explicit arguments. Texts are sent without a parse mode, so participant
//! supplied names and channels need no escaping.

use chrono::{NaiveDate, NaiveDateTime};

use crate::broadcast::BroadcastOutcome;
use crate::ledger::{ActivityTotals, Participant, SubmissionKind};
use crate::policy::{QuotaTier, Rejection};
use crate::report::{Commitment, CommitmentReport, PopulationReport};

/// Longest text the transport accepts in one message
pub const MESSAGE_LIMIT: usize = 4096;

pub const WELCOME_NEW: &str =
    "👋 Welcome! Let's get you registered.\n\nWhat is your name?";
pub const WELCOME_BACK: &str = "👋 Welcome back! Pick an option from the menu below.";
pub const ASK_AGE: &str = "How old are you? Please send a number.";
pub const INVALID_AGE: &str = "⚠️ Please send your age as a number between 1 and 120.";
pub const ASK_CHANNEL: &str = "What is the name of your channel?";
pub const REGISTRATION_SUCCESS: &str = "✅ You're registered! Use the menu below to get started.";
pub const ALREADY_REGISTERED: &str = "ℹ️ You're already registered. Use the menu below.";
pub const NOT_REGISTERED: &str = "⚠️ You're not registered yet. Send /start to register.";
pub const ADMIN_ONLY: &str = "⛔ This command is for the administrator only.";
pub const TRY_AGAIN: &str = "⚠️ Something went wrong on our side. Please try again in a moment.";

pub const SHORT_REQUEST: &str =
    "🎞️ Send your 1-minute video now. You can keep sending videos one after another.";
pub const SHORT_RECEIVED: &str = "✅ Short video received and forwarded to the group.";
pub const LONG_RECEIVED: &str = "✅ Long video received and forwarded to the group.";

pub const CHOOSE_STATS_PERIOD: &str = "📊 Which period would you like to see?";
pub const REPORT_ISSUE_PROMPT: &str = "💢 Describe the problem you're facing in one message.";
pub const ASK_QUESTION_PROMPT: &str = "❓ Send your question in one message.";
pub const ISSUE_RECEIVED: &str = "✅ Your problem was sent to the team. We'll get back to you soon.";
pub const QUESTION_RECEIVED: &str = "✅ Your question was sent to the team. We'll answer soon.";

pub const ABOUT_WORK: &str = "📋 About the work\n\n\
    • Every day, publish three 1-minute videos on your channel and send each one here.\n\
    • Every three days, publish one compilation of at least five minutes and send it here.\n\
    • Every accepted short video earns 1 point and every long compilation earns 10 points.\n\
    • Committed members are featured in our reports and qualify for rewards.\n\n\
    Ready to start?";
pub const REWARDS: &str = "🎁 Rewards for committed members\n\n\
    Members who hit their daily target consistently climb the leaderboard. \
    The top of the leaderboard receives rewards and gifts every month. Keep going!";
pub const ALREADY_WORKING: &str =
    "💪 Great to have you with us! Keep up the daily videos and watch your points grow.";
pub const AGREEMENT_ACK: &str = "The group has been notified of your agreement! 🎉";
pub const ALREADY_WORKING_ACK: &str = "Keep it up!";

pub const ADMIN_WELCOME: &str = "🛠️ Admin panel. Choose an action.";
pub const BROADCAST_PROMPT: &str =
    "📣 Send the message to broadcast to every participant.";
pub const CHOOSE_COMMITMENT_PERIOD: &str = "📈 Which commitment report do you need?";
pub const NO_PARTICIPANTS: &str = "No participants registered yet.";

const DATE_FORMAT: &str = "%Y-%m-%d";

fn age_text(participant: &Participant) -> String {
    participant
        .age
        .map(|age| age.to_string())
        .unwrap_or_else(|| "not set".to_string())
}

pub fn long_request(cooldown_days: i64) -> String {
    format!(
        "🎬 Send your long compilation now (at least 5 minutes). \
         You can send one every {} days.",
        cooldown_days
    )
}

pub fn rejection(rejection: &Rejection) -> String {
    match rejection {
        Rejection::TooShort { min_secs, actual_secs } => format!(
            "⚠️ This video is too short for a compilation: {} seconds, the minimum is {} seconds.",
            actual_secs, min_secs
        ),
        Rejection::OnCooldown { remaining_days, since } => format!(
            "⏳ You can send your next long compilation in {} day(s). \
             Your last one was sent on {}.",
            remaining_days,
            since.format(DATE_FORMAT)
        ),
    }
}

pub fn quota(tier: QuotaTier) -> String {
    match tier {
        QuotaTier::UnderTarget { count, target } => format!(
            "👍 That's {} of {} short videos today. Keep going!",
            count, target
        ),
        QuotaTier::TargetMet => {
            "🎉 You've hit today's target of short videos. Great work!".to_string()
        }
        QuotaTier::OverTarget { count } => format!(
            "🔥 {} short videos today, more than the target. Amazing!",
            count
        ),
    }
}

pub fn forward_failed(what: &str, error: &dyn std::fmt::Display) -> String {
    format!("⚠️ Could not send your {} to the group: {}", what, error)
}

/// Counts shown on a forwarded submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptionCounts {
    pub today: ActivityTotals,
    /// Monday of this week through today
    pub week: ActivityTotals,
}

pub fn submission_caption(
    kind: SubmissionKind,
    participant: &Participant,
    date: NaiveDate,
    counts: &CaptionCounts,
) -> String {
    let title = match kind {
        SubmissionKind::Short => "🎞️ Short video (1 minute)",
        SubmissionKind::Long => "🎬 Long video (5 minutes or more)",
    };
    format!(
        "{}\n\n\
         Name: {}\n\
         Channel: {}\n\
         Date: {}\n\
         Short videos today: {}\n\
         Short videos this week: {}\n\
         Long videos today: {}\n\
         Long videos this week: {}",
        title,
        participant.name,
        participant.channel,
        date.format(DATE_FORMAT),
        counts.today.short_count,
        counts.week.short_count,
        counts.today.long_count,
        counts.week.long_count,
    )
}

pub fn stats_today(totals: &ActivityTotals) -> String {
    format!(
        "📊 Today\n\nShort videos: {}\nLong videos: {}\nPoints earned: {}",
        totals.short_count, totals.long_count, totals.points
    )
}

pub fn stats_last_30_days(totals: &ActivityTotals) -> String {
    format!(
        "📊 Last 30 days\n\nShort videos: {}\nLong videos: {}\nPoints earned: {}",
        totals.short_count, totals.long_count, totals.points
    )
}

/// Issue or question relayed to the group
pub fn relay_to_group(
    heading: &str,
    participant: &Participant,
    date: NaiveDate,
    body: &str,
) -> String {
    format!(
        "{}\n\nName: {}\nChannel: {}\nDate: {}\n\n{}",
        heading,
        participant.name,
        participant.channel,
        date.format(DATE_FORMAT),
        body
    )
}

pub fn issue_to_group(participant: &Participant, date: NaiveDate, issue: &str) -> String {
    relay_to_group("💢 Problem reported by a participant", participant, date, issue)
}

pub fn question_to_group(participant: &Participant, date: NaiveDate, question: &str) -> String {
    relay_to_group("❓ Question from a participant", participant, date, question)
}

pub fn agreement_to_group(participant: &Participant, date: NaiveDate) -> String {
    format!(
        "🤝 New agreement to the terms\n\nName: {}\nAge: {}\nChannel: {}\nDate: {}",
        participant.name,
        age_text(participant),
        participant.channel,
        date.format(DATE_FORMAT)
    )
}

pub fn broadcast_summary(outcome: &BroadcastOutcome) -> String {
    format!(
        "📣 Broadcast finished.\nDelivered: {}\nFailed: {}",
        outcome.sent, outcome.failed
    )
}

fn last_long_text(at: Option<NaiveDateTime>) -> String {
    at.map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "none".to_string())
}

pub fn population_report(report: &PopulationReport) -> String {
    let mut out = format!(
        "📑 Full activity report\n\n\
         Participants: {}\n\
         Short videos (all time): {}\n\
         Long videos (all time): {}\n",
        report.total_participants, report.total_short, report.total_long
    );

    if report.rows.is_empty() {
        out.push('\n');
        out.push_str(NO_PARTICIPANTS);
        return out;
    }

    out.push_str("\n🏆 Top participants\n");
    for (rank, leader) in report.leaders.iter().enumerate() {
        out.push_str(&format!("{}. {} ({} points)\n", rank + 1, leader.name, leader.points));
    }

    out.push_str("\nAll participants\n");
    for (index, row) in report.rows.iter().enumerate() {
        let participant = &row.participant;
        out.push_str(&format!(
            "{}. {}\n   Age: {}\n   Channel: {}\n   Points: {}\n   \
             Short videos: {}\n   Long videos: {}\n   Last long video: {}\n   ---\n",
            index + 1,
            participant.name,
            age_text(participant),
            participant.channel,
            participant.points,
            row.lifetime.short_count,
            row.lifetime.long_count,
            last_long_text(participant.last_long_submission_at),
        ));
    }
    out
}

fn commitment_label(commitment: Commitment) -> &'static str {
    match commitment {
        Commitment::MetTarget => "✅ met target",
        Commitment::MissedTarget => "⚠️ below target",
        Commitment::NoActivity => "❌ no activity",
    }
}

pub fn commitment_report(title: &str, report: &CommitmentReport) -> String {
    let mut out = format!(
        "📈 {} commitment report\n{} to {}\nRequired short videos: {}\n\
         Met: {} | Below: {} | Inactive: {}\n",
        title,
        report.range.start.format(DATE_FORMAT),
        report.range.end.format(DATE_FORMAT),
        report.required_short,
        report.count(Commitment::MetTarget),
        report.count(Commitment::MissedTarget),
        report.count(Commitment::NoActivity),
    );

    if report.rows.is_empty() {
        out.push('\n');
        out.push_str(NO_PARTICIPANTS);
        return out;
    }

    out.push('\n');
    for (index, row) in report.rows.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} ({})\n   Short: {} | Long: {} | Points: {}\n   {}\n",
            index + 1,
            row.participant.name,
            row.participant.channel,
            row.activity.short_count,
            row.activity.long_count,
            row.activity.points,
            commitment_label(row.commitment),
        ));
    }
    out
}

/// Split `text` into messages of at most `limit` characters.
///
/// Breaks on line boundaries where possible; a single line longer than the
/// limit is cut at character boundaries.
pub fn chunk(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                let piece: String = piece.iter().collect();
                if piece.chars().count() == limit {
                    chunks.push(piece);
                } else {
                    current_len = piece.chars().count();
                    current = piece;
                }
            }
            continue;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

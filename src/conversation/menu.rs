//! Reply keyboards, inline buttons and the labels they send back.

use crate::report::Period;
use crate::transport::Keyboard;

/// Callback data of the about-work agreement button
pub const CALLBACK_START_AGREEMENT: &str = "start_work_agreement";
/// Callback data of the already-working button
pub const CALLBACK_ALREADY_WORKING: &str = "already_working";

/// Main-menu buttons. Presses arrive as plain text equal to the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainAction {
    ShortSubmission,
    LongSubmission,
    MyStats,
    ReportIssue,
    AskQuestion,
    AboutWork,
    Rewards,
}

impl MainAction {
    pub const ALL: [MainAction; 7] = [
        MainAction::ShortSubmission,
        MainAction::LongSubmission,
        MainAction::MyStats,
        MainAction::ReportIssue,
        MainAction::AskQuestion,
        MainAction::AboutWork,
        MainAction::Rewards,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MainAction::ShortSubmission => "🎞️ 1-minute videos",
            MainAction::LongSubmission => "🎬 10-minute compilation",
            MainAction::MyStats => "📊 My stats",
            MainAction::ReportIssue => "💢 Problem",
            MainAction::AskQuestion => "❓ Question",
            MainAction::AboutWork => "📋 About the work",
            MainAction::Rewards => "🎁 Rewards for committed members",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL.into_iter().find(|action| action.label() == text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsChoice {
    Today,
    Last30Days,
    Back,
}

impl StatsChoice {
    pub const ALL: [StatsChoice; 3] = [StatsChoice::Today, StatsChoice::Last30Days, StatsChoice::Back];

    pub fn label(&self) -> &'static str {
        match self {
            StatsChoice::Today => "Today",
            StatsChoice::Last30Days => "Last 30 days",
            StatsChoice::Back => "Back to main menu",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL.into_iter().find(|choice| choice.label() == text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    FullReport,
    Broadcast,
    CommitmentReport,
    Exit,
}

impl AdminAction {
    pub const ALL: [AdminAction; 4] = [
        AdminAction::FullReport,
        AdminAction::Broadcast,
        AdminAction::CommitmentReport,
        AdminAction::Exit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AdminAction::FullReport => "📑 Full report",
            AdminAction::Broadcast => "📣 Broadcast",
            AdminAction::CommitmentReport => "📈 Commitment report",
            AdminAction::Exit => "🚪 Exit admin",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL.into_iter().find(|action| action.label() == text)
    }
}

/// Commitment period picker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitmentChoice {
    Period(Period),
    Back,
}

impl CommitmentChoice {
    pub const ALL: [CommitmentChoice; 4] = [
        CommitmentChoice::Period(Period::Daily),
        CommitmentChoice::Period(Period::Weekly),
        CommitmentChoice::Period(Period::Monthly),
        CommitmentChoice::Back,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CommitmentChoice::Period(period) => period.label(),
            CommitmentChoice::Back => "⬅️ Back",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL.into_iter().find(|choice| choice.label() == text)
    }
}

fn reply_rows(labels: &[&'static str], per_row: usize) -> Keyboard {
    Keyboard::Reply(
        labels
            .chunks(per_row)
            .map(|row| row.iter().map(|label| label.to_string()).collect())
            .collect(),
    )
}

pub fn main_menu() -> Keyboard {
    let labels: Vec<&'static str> = MainAction::ALL.iter().map(MainAction::label).collect();
    reply_rows(&labels, 2)
}

pub fn stats_menu() -> Keyboard {
    let labels: Vec<&'static str> = StatsChoice::ALL.iter().map(StatsChoice::label).collect();
    reply_rows(&labels, 2)
}

pub fn admin_menu() -> Keyboard {
    let labels: Vec<&'static str> = AdminAction::ALL.iter().map(AdminAction::label).collect();
    reply_rows(&labels, 2)
}

pub fn commitment_menu() -> Keyboard {
    let labels: Vec<&'static str> = CommitmentChoice::ALL.iter().map(CommitmentChoice::label).collect();
    reply_rows(&labels, 3)
}

/// Inline buttons under the about-work text
pub fn about_work_buttons() -> Keyboard {
    Keyboard::Inline(vec![
        vec![(
            "🔘 I agree to the terms and want to start now".to_string(),
            CALLBACK_START_AGREEMENT.to_string(),
        )],
        vec![(
            "🔘 I'm already working with you and committed".to_string(),
            CALLBACK_ALREADY_WORKING.to_string(),
        )],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_parse_back() {
        for action in MainAction::ALL {
            assert_eq!(MainAction::parse(action.label()), Some(action));
        }
        assert_eq!(StatsChoice::parse(" Today "), Some(StatsChoice::Today));
        assert_eq!(
            CommitmentChoice::parse("Weekly"),
            Some(CommitmentChoice::Period(Period::Weekly))
        );
        assert_eq!(AdminAction::parse("hello"), None);
    }

    #[test]
    fn test_main_menu_layout() {
        match main_menu() {
            Keyboard::Reply(rows) => {
                assert_eq!(rows.len(), 4);
                assert_eq!(rows[3], vec![MainAction::Rewards.label().to_string()]);
            }
            other => panic!("unexpected keyboard {:?}", other),
        }
    }
}

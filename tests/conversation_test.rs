//! Conversation flow integration tests

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};

use engagement_bot::conversation::menu::{self, AdminAction, CommitmentChoice, MainAction, StatsChoice};
use engagement_bot::conversation::messages;
use engagement_bot::conversation::{ConversationState, RegistrationStep};
use engagement_bot::ledger::NewParticipant;
use engagement_bot::report::Period;
use engagement_bot::transport::{EventKind, Keyboard, MediaRef, SentMessage};
use engagement_bot::{
    ConversationEngine, EngineSettings, InboundEvent, Ledger, RecordingTransport,
    SubmissionPolicy,
};

const ADMIN: i64 = 1;
const GROUP: i64 = -100500;

struct Harness {
    engine: ConversationEngine,
    transport: Arc<RecordingTransport>,
    ledger: Arc<Ledger>,
}

fn harness_with(transport: RecordingTransport) -> Harness {
    let ledger = Arc::new(Ledger::open_in_memory().unwrap());
    let transport = Arc::new(transport);
    let engine = ConversationEngine::new(
        ledger.clone(),
        transport.clone(),
        SubmissionPolicy::default(),
        EngineSettings::new(ADMIN, GROUP).with_broadcast_delay(Duration::ZERO),
    );
    Harness {
        engine,
        transport,
        ledger,
    }
}

fn harness() -> Harness {
    harness_with(RecordingTransport::new())
}

/// 2026-10-`day` at `hour`:`minute`; 2026-10-14 is a Wednesday
fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

impl Harness {
    async fn text(&self, user_id: i64, when: NaiveDateTime, text: &str) {
        self.engine
            .handle(InboundEvent::from_text(user_id, user_id, when, text))
            .await
            .unwrap();
    }

    async fn video(&self, user_id: i64, when: NaiveDateTime, duration_secs: u32) {
        let event = InboundEvent {
            user_id,
            chat_id: user_id,
            at: when,
            kind: EventKind::Media(MediaRef {
                file_id: format!("video-{}-{}", user_id, when),
                duration_secs,
            }),
        };
        self.engine.handle(event).await.unwrap();
    }

    async fn press(&self, user_id: i64, when: NaiveDateTime, data: &str) {
        let event = InboundEvent {
            user_id,
            chat_id: user_id,
            at: when,
            kind: EventKind::Button {
                callback_id: format!("cb-{}", user_id),
                data: data.to_string(),
            },
        };
        self.engine.handle(event).await.unwrap();
    }

    async fn register(&self, user_id: i64, name: &str) {
        let when = at(14, 8, 0);
        self.text(user_id, when, "/start").await;
        self.text(user_id, when, name).await;
        self.text(user_id, when, "22").await;
        self.text(user_id, when, &format!("@{}", name.to_lowercase())).await;
        self.transport.clear();
    }

    async fn state(&self, user_id: i64) -> ConversationState {
        self.engine.state(user_id).await
    }

    fn last_text(&self, chat_id: i64) -> String {
        self.transport
            .texts_to(chat_id)
            .last()
            .cloned()
            .unwrap_or_default()
    }

    fn last_keyboard(&self, chat_id: i64) -> Option<Keyboard> {
        self.transport
            .sent_to(chat_id)
            .into_iter()
            .rev()
            .find_map(|msg| match msg {
                SentMessage::Text { keyboard, .. } => Some(keyboard),
                _ => None,
            })
            .flatten()
    }
}

#[tokio::test]
async fn test_registration_flow() {
    let h = harness();
    let when = at(14, 9, 0);

    h.text(10, when, "/start").await;
    assert_eq!(h.last_text(10), messages::WELCOME_NEW);
    assert_eq!(h.state(10).await, ConversationState::Registering(RegistrationStep::Name));

    h.text(10, when, "Layla").await;
    assert_eq!(h.last_text(10), messages::ASK_AGE);

    for bad in ["abc", "0", "121", "-3"] {
        h.text(10, when, bad).await;
        assert_eq!(h.last_text(10), messages::INVALID_AGE);
        assert_eq!(
            h.state(10).await,
            ConversationState::Registering(RegistrationStep::Age { name: "Layla".to_string() })
        );
    }

    h.text(10, when, "19").await;
    assert_eq!(h.last_text(10), messages::ASK_CHANNEL);

    h.text(10, when, "@layla_clips").await;
    assert_eq!(h.last_text(10), messages::REGISTRATION_SUCCESS);
    assert_eq!(h.last_keyboard(10), Some(menu::main_menu()));
    assert_eq!(h.state(10).await, ConversationState::Idle);

    let participant = h.ledger.find(10).unwrap().unwrap();
    assert_eq!(participant.name, "Layla");
    assert_eq!(participant.age, Some(19));
    assert_eq!(participant.channel, "@layla_clips");
    assert_eq!(participant.points, 0);

    h.text(10, at(15, 9, 0), "/start").await;
    assert_eq!(h.last_text(10), messages::WELCOME_BACK);
    assert_eq!(h.state(10).await, ConversationState::Idle);
}

#[tokio::test]
async fn test_registration_race_keeps_original_fields() {
    let h = harness();
    let when = at(14, 9, 0);

    h.text(10, when, "/start").await;
    h.text(10, when, "Second").await;
    h.text(10, when, "30").await;

    h.ledger
        .register(
            &NewParticipant {
                user_id: 10,
                name: "First".to_string(),
                age: Some(20),
                channel: "@first".to_string(),
            },
            when,
        )
        .unwrap();

    h.text(10, when, "@second").await;
    assert_eq!(h.last_text(10), messages::ALREADY_REGISTERED);
    assert_eq!(h.state(10).await, ConversationState::Idle);

    let participant = h.ledger.find(10).unwrap().unwrap();
    assert_eq!(participant.name, "First");
    assert_eq!(participant.channel, "@first");
}

#[tokio::test]
async fn test_short_submissions_tiered_replies() {
    let h = harness();
    h.register(10, "Omar").await;

    h.text(10, at(14, 10, 0), MainAction::ShortSubmission.label()).await;
    assert_eq!(h.state(10).await, ConversationState::AwaitingShortSubmission);
    assert_eq!(h.last_text(10), messages::SHORT_REQUEST);

    for (i, expected) in ["1 of 3", "2 of 3", "hit today's target", "4 short videos today"]
        .iter()
        .enumerate()
    {
        h.video(10, at(14, 11 + i as u32, 0), 45).await;
        assert!(
            h.last_text(10).contains(expected),
            "reply {} was {:?}",
            i + 1,
            h.last_text(10)
        );
        assert_eq!(h.state(10).await, ConversationState::AwaitingShortSubmission);
    }

    let forwarded = h.transport.sent_to(GROUP);
    assert_eq!(forwarded.len(), 4);
    match &forwarded[3] {
        SentMessage::Media { caption, .. } => {
            assert!(caption.contains("Name: Omar"));
            assert!(caption.contains("Short videos today: 4"));
            assert!(caption.contains("Short videos this week: 4"));
        }
        other => panic!("expected media, got {:?}", other),
    }

    assert_eq!(h.transport.texts_to(10).iter().filter(|t| *t == messages::SHORT_RECEIVED).count(), 4);

    let (points, sum) = h.ledger.points_audit(10).unwrap();
    assert_eq!(points, 4);
    assert_eq!(points, sum);
}

#[tokio::test]
async fn test_long_submission_duration_and_cooldown() {
    let h = harness();
    h.register(10, "Huda").await;

    h.text(10, at(14, 10, 0), MainAction::LongSubmission.label()).await;
    assert_eq!(h.state(10).await, ConversationState::AwaitingLongSubmission);

    h.video(10, at(14, 10, 5), 299).await;
    assert!(h.last_text(10).contains("too short"));
    assert_eq!(h.state(10).await, ConversationState::Idle);
    assert_eq!(h.ledger.find(10).unwrap().unwrap().points, 0);

    h.text(10, at(14, 10, 10), MainAction::LongSubmission.label()).await;
    h.video(10, at(14, 10, 15), 300).await;
    assert_eq!(h.last_text(10), messages::LONG_RECEIVED);
    assert_eq!(h.state(10).await, ConversationState::Idle);

    let participant = h.ledger.find(10).unwrap().unwrap();
    assert_eq!(participant.points, 10);
    assert_eq!(participant.last_long_submission_at, Some(at(14, 10, 15)));

    h.text(10, at(16, 10, 15), MainAction::LongSubmission.label()).await;
    let reply = h.last_text(10);
    assert!(reply.contains("in 1 day(s)"), "{}", reply);
    assert!(reply.contains("2026-10-14"));
    assert_eq!(h.state(10).await, ConversationState::Idle);

    h.text(10, at(17, 10, 15), MainAction::LongSubmission.label()).await;
    assert_eq!(h.state(10).await, ConversationState::AwaitingLongSubmission);
}

#[tokio::test]
async fn test_stray_input_mid_flow_is_ignored() {
    let h = harness();
    h.register(10, "Sami").await;

    h.text(10, at(14, 10, 0), MainAction::ShortSubmission.label()).await;
    let calls = h.transport.call_count();
    h.text(10, at(14, 10, 1), "is anyone there?").await;
    assert_eq!(h.transport.call_count(), calls);
    assert_eq!(h.state(10).await, ConversationState::AwaitingShortSubmission);

    h.text(20, at(14, 10, 0), "/start").await;
    let calls = h.transport.call_count();
    h.video(20, at(14, 10, 1), 30).await;
    assert_eq!(h.transport.call_count(), calls);
    assert_eq!(h.state(20).await, ConversationState::Registering(RegistrationStep::Name));
}

#[tokio::test]
async fn test_main_menu_navigates_out_of_pending_prompt() {
    let h = harness();
    h.register(10, "Rana").await;

    h.text(10, at(14, 10, 0), MainAction::ReportIssue.label()).await;
    assert_eq!(h.state(10).await, ConversationState::ReportingIssue);

    h.text(10, at(14, 10, 1), MainAction::MyStats.label()).await;
    assert_eq!(h.state(10).await, ConversationState::AwaitingStatsChoice);
    assert_eq!(h.last_keyboard(10), Some(menu::stats_menu()));
}

#[tokio::test]
async fn test_idle_unrecognized_input() {
    let h = harness();

    h.text(30, at(14, 9, 0), "hello").await;
    assert_eq!(h.last_text(30), messages::NOT_REGISTERED);
    assert_eq!(h.last_keyboard(30), None);

    h.register(10, "Yara").await;
    h.text(10, at(14, 9, 0), "hello").await;
    assert_eq!(h.last_text(10), messages::WELCOME_BACK);
    assert_eq!(h.last_keyboard(10), Some(menu::main_menu()));
}

#[tokio::test]
async fn test_unregistered_menu_press() {
    let h = harness();

    h.text(30, at(14, 9, 0), MainAction::ShortSubmission.label()).await;
    assert_eq!(h.last_text(30), messages::NOT_REGISTERED);
    assert_eq!(h.state(30).await, ConversationState::Idle);
    assert!(h.transport.sent_to(GROUP).is_empty());
}

#[tokio::test]
async fn test_personal_stats() {
    let h = harness();
    h.register(10, "Adam").await;

    h.text(10, at(14, 10, 0), MainAction::ShortSubmission.label()).await;
    h.video(10, at(14, 10, 1), 50).await;
    h.video(10, at(14, 10, 2), 50).await;
    h.text(10, at(14, 11, 0), MainAction::LongSubmission.label()).await;
    h.video(10, at(14, 11, 1), 600).await;

    h.text(10, at(14, 12, 0), MainAction::MyStats.label()).await;
    h.text(10, at(14, 12, 1), StatsChoice::Today.label()).await;
    let today = h.last_text(10);
    assert!(today.contains("Short videos: 2"));
    assert!(today.contains("Long videos: 1"));
    assert!(today.contains("Points earned: 12"));
    assert_eq!(h.state(10).await, ConversationState::Idle);

    h.text(10, at(20, 12, 0), MainAction::MyStats.label()).await;
    h.text(10, at(20, 12, 1), StatsChoice::Today.label()).await;
    assert!(h.last_text(10).contains("Points earned: 0"));

    h.text(10, at(20, 12, 2), MainAction::MyStats.label()).await;
    h.text(10, at(20, 12, 3), StatsChoice::Last30Days.label()).await;
    assert!(h.last_text(10).contains("Points earned: 12"));

    h.text(10, at(20, 12, 4), MainAction::MyStats.label()).await;
    h.text(10, at(20, 12, 5), StatsChoice::Back.label()).await;
    assert_eq!(h.last_text(10), messages::WELCOME_BACK);
    assert_eq!(h.state(10).await, ConversationState::Idle);
}

#[tokio::test]
async fn test_issue_and_question_relay() {
    let h = harness();
    h.register(10, "Mona").await;

    h.text(10, at(14, 13, 0), MainAction::ReportIssue.label()).await;
    h.text(10, at(14, 13, 1), "Upload keeps failing").await;
    assert_eq!(h.last_text(10), messages::ISSUE_RECEIVED);
    assert_eq!(h.state(10).await, ConversationState::Idle);

    let relayed = h.last_text(GROUP);
    assert!(relayed.contains("Problem reported"));
    assert!(relayed.contains("Name: Mona"));
    assert!(relayed.contains("Upload keeps failing"));
    assert_eq!(
        h.ledger.find(10).unwrap().unwrap().last_activity_at,
        Some(at(14, 13, 1))
    );

    h.text(10, at(14, 14, 0), MainAction::AskQuestion.label()).await;
    h.text(10, at(14, 14, 1), "When are rewards announced?").await;
    assert_eq!(h.last_text(10), messages::QUESTION_RECEIVED);
    assert!(h.last_text(GROUP).contains("When are rewards announced?"));
}

#[tokio::test]
async fn test_group_delivery_failure_is_reported_softly() {
    let h = harness_with(RecordingTransport::new().failing_chat(GROUP));
    h.register(10, "Tarek").await;

    h.text(10, at(14, 10, 0), MainAction::ShortSubmission.label()).await;
    h.video(10, at(14, 10, 1), 40).await;

    let texts = h.transport.texts_to(10);
    assert!(texts.iter().any(|t| t.starts_with("⚠️ Could not send your video")));
    assert!(texts.last().unwrap().contains("1 of 3"));
    assert_eq!(h.ledger.find(10).unwrap().unwrap().points, 1);
}

#[tokio::test]
async fn test_about_work_buttons() {
    let h = harness();
    h.register(10, "Dina").await;

    h.text(10, at(14, 9, 0), MainAction::AboutWork.label()).await;
    assert_eq!(h.last_text(10), messages::ABOUT_WORK);
    assert_eq!(h.last_keyboard(10), Some(menu::about_work_buttons()));
    assert_eq!(h.state(10).await, ConversationState::Idle);

    h.press(10, at(14, 9, 1), menu::CALLBACK_START_AGREEMENT).await;
    let notice = h.last_text(GROUP);
    assert!(notice.contains("New agreement"));
    assert!(notice.contains("Age: 22"));
    assert!(h.transport.sent().contains(&SentMessage::ButtonAnswer {
        callback_id: "cb-10".to_string(),
        text: Some(messages::AGREEMENT_ACK.to_string()),
    }));

    h.press(10, at(14, 9, 2), menu::CALLBACK_ALREADY_WORKING).await;
    assert_eq!(h.last_text(10), messages::ALREADY_WORKING);
    assert_eq!(h.state(10).await, ConversationState::Idle);

    h.press(30, at(14, 9, 3), menu::CALLBACK_START_AGREEMENT).await;
    assert_eq!(h.last_text(30), messages::NOT_REGISTERED);
}

#[tokio::test]
async fn test_admin_commands_rejected_for_others() {
    let h = harness();
    h.register(10, "Nadia").await;

    h.text(10, at(14, 9, 0), "/admin").await;
    assert_eq!(h.last_text(10), messages::ADMIN_ONLY);
    assert_eq!(h.state(10).await, ConversationState::Idle);

    h.text(10, at(14, 9, 1), "/report").await;
    assert_eq!(h.last_text(10), messages::ADMIN_ONLY);
}

#[tokio::test]
async fn test_admin_full_report() {
    let h = harness();
    h.register(10, "Nadia").await;
    h.register(20, "Fares").await;
    h.text(20, at(14, 10, 0), MainAction::LongSubmission.label()).await;
    h.video(20, at(14, 10, 1), 700).await;

    h.text(ADMIN, at(14, 12, 0), "/report").await;
    let report = h.transport.texts_to(ADMIN).concat();
    assert!(report.contains("Participants: 2"));
    assert!(report.contains("Long videos (all time): 1"));
    assert!(report.contains("1. Fares (10 points)"));
    assert!(report.contains("Last long video: 2026-10-14 10:01"));
    assert!(report.contains("Last long video: none"));
    assert_eq!(h.state(ADMIN).await, ConversationState::Idle);
}

#[tokio::test]
async fn test_admin_broadcast_flow() {
    let h = harness_with(RecordingTransport::new().failing_chat(30));
    h.register(10, "Nadia").await;
    h.register(20, "Fares").await;
    h.register(30, "Ziad").await;

    h.text(ADMIN, at(14, 9, 0), "/admin").await;
    assert_eq!(h.state(ADMIN).await, ConversationState::AdminMenu);
    assert_eq!(h.last_keyboard(ADMIN), Some(menu::admin_menu()));

    h.text(ADMIN, at(14, 9, 1), AdminAction::Broadcast.label()).await;
    assert_eq!(h.state(ADMIN).await, ConversationState::AdminAwaitingBroadcast);

    h.text(ADMIN, at(14, 9, 2), "Meeting tonight at 8").await;
    assert_eq!(h.transport.texts_to(10), vec!["Meeting tonight at 8".to_string()]);
    assert_eq!(h.transport.texts_to(20), vec!["Meeting tonight at 8".to_string()]);
    let summary = h.last_text(ADMIN);
    assert!(summary.contains("Delivered: 2"));
    assert!(summary.contains("Failed: 1"));
    assert_eq!(h.state(ADMIN).await, ConversationState::AdminMenu);

    h.text(ADMIN, at(14, 9, 3), AdminAction::Exit.label()).await;
    assert_eq!(h.state(ADMIN).await, ConversationState::Idle);
}

#[tokio::test]
async fn test_admin_commitment_report() {
    let h = harness();
    h.register(10, "Nadia").await;
    h.register(20, "Fares").await;
    h.register(30, "Ziad").await;

    h.text(10, at(14, 10, 0), MainAction::ShortSubmission.label()).await;
    for minute in 1..=3 {
        h.video(10, at(14, 10, minute), 50).await;
    }
    h.text(20, at(14, 10, 0), MainAction::ShortSubmission.label()).await;
    h.video(20, at(14, 10, 1), 50).await;

    h.text(ADMIN, at(14, 18, 0), "/admin").await;
    h.text(ADMIN, at(14, 18, 1), AdminAction::CommitmentReport.label()).await;
    assert_eq!(h.state(ADMIN).await, ConversationState::AdminCommitmentMenu);

    h.text(ADMIN, at(14, 18, 2), CommitmentChoice::Period(Period::Daily).label()).await;
    let report = h.last_text(ADMIN);
    assert!(report.contains("Daily commitment report"));
    assert!(report.contains("Required short videos: 3"));
    assert!(report.contains("Met: 1 | Below: 1 | Inactive: 1"));
    assert!(report.find("Nadia").unwrap() < report.find("Fares").unwrap());
    assert_eq!(h.state(ADMIN).await, ConversationState::AdminMenu);

    h.text(ADMIN, at(14, 18, 3), AdminAction::CommitmentReport.label()).await;
    h.text(ADMIN, at(14, 18, 4), CommitmentChoice::Period(Period::Weekly).label()).await;
    let report = h.last_text(ADMIN);
    assert!(report.contains("Required short videos: 9"));
    assert!(report.contains("Met: 0 | Below: 2 | Inactive: 1"));

    h.text(ADMIN, at(14, 18, 5), AdminAction::CommitmentReport.label()).await;
    h.text(ADMIN, at(14, 18, 6), CommitmentChoice::Back.label()).await;
    assert_eq!(h.state(ADMIN).await, ConversationState::AdminMenu);
}

#[tokio::test]
async fn test_concurrent_submissions_keep_points_consistent() {
    let h = Arc::new(harness());
    for user_id in [10, 20, 30] {
        h.register(user_id, &format!("user{}", user_id)).await;
        h.text(user_id, at(14, 9, 0), MainAction::ShortSubmission.label()).await;
    }

    let mut tasks = Vec::new();
    for user_id in [10, 20, 30] {
        for minute in 0..10 {
            let h = h.clone();
            tasks.push(tokio::spawn(async move {
                h.video(user_id, at(14, 10, minute), 30).await;
            }));
        }
    }
    for task in tasks {
        task.await.unwrap();
    }

    for user_id in [10, 20, 30] {
        let (points, sum) = h.ledger.points_audit(user_id).unwrap();
        assert_eq!(points, 10);
        assert_eq!(points, sum);
    }
    assert_eq!(h.transport.sent_to(GROUP).len(), 30);
}

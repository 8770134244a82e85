//! Log re-projection against roster changes

mod helpers;

use helpers::*;
use mms_common::db::Collection;
use mms_core::models::MentorMeetingLog;
use mms_core::Error;
use serde_json::json;

fn log_key() -> String {
    MentorMeetingLog::key_for(&id(MENTOR), &year(), &july_dec())
}

#[tokio::test]
async fn test_sync_recomputes_roster_and_keeps_attendance() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentee(&mms, "MUJ10001", Some(MENTOR), 3, "A").await;
    seed_mentee(&mms, "MUJ10002", Some(MENTOR), 3, "A").await;
    schedule(&mms, "m-1", 1, "A").await;
    mms.record_attendance(&id(MENTOR), year(), july_dec(), "m-1", &[id("MUJ10001"), id("MUJ10002")])
        .await
        .unwrap();

    // MUJ10002 moves to section B, MUJ10005 joins section A
    seed_mentee(&mms, "MUJ10002", Some(MENTOR), 3, "B").await;
    seed_mentee(&mms, "MUJ10005", Some(MENTOR), 3, "A").await;

    let report = mms.sync_log(&log_key()).await.unwrap();
    assert_eq!(report.updated, 1);
    assert!(report.failed.is_empty());

    let meetings = mms
        .meetings_for_semester(&id(MENTOR), year(), july_dec(), sem(3))
        .await
        .unwrap();
    assert_eq!(meetings[0].meeting.mentee_ids, vec![id("MUJ10001"), id("MUJ10005")]);
    assert_eq!(meetings[0].present_mentees, vec![id("MUJ10001"), id("MUJ10002")]);
    assert!(meetings[0].is_report_filled);

    // The tree copy follows the log
    let listed = mms
        .get_mentors_with_meetings(year(), july_dec(), Some(sem(3)), Some(section("A")))
        .await
        .unwrap();
    assert_eq!(listed[0].meetings[0].mentee_ids, vec![id("MUJ10001"), id("MUJ10005")]);
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentee(&mms, "MUJ10001", Some(MENTOR), 3, "A").await;
    schedule(&mms, "m-1", 1, "A").await;
    schedule(&mms, "m-2", 2, "A").await;
    seed_mentee(&mms, "MUJ10002", Some(MENTOR), 3, "A").await;

    let first = mms.sync_log(&log_key()).await.unwrap();
    assert_eq!(first.updated, 2);

    let second = mms.sync_log(&log_key()).await.unwrap();
    assert_eq!(second.updated, 0);
    assert_eq!(second.unchanged, 2);

    let key = log_key();
    let (a, b) = tokio::join!(mms.sync_log(&key), mms.sync_log(&key));
    assert_eq!(a.unwrap().unchanged, 2);
    assert_eq!(b.unwrap().unchanged, 2);
}

#[tokio::test]
async fn test_one_bad_meeting_does_not_stop_the_rest() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentee(&mms, "MUJ10001", Some(MENTOR), 3, "A").await;

    let meeting = |meeting_id: &str, semester: u8| {
        json!({
            "meeting_id": meeting_id,
            "mentor_id": MENTOR,
            "mentee_ids": [],
            "meeting_date": "2024-08-01",
            "meeting_time": "10:00 AM",
            "meeting_notes": {"TopicOfDiscussion": "Legacy import"},
            "scheduledAT": {"scheduleDate": "2024-07-25", "scheduleTime": "09:00 AM"},
            "status": "scheduled",
            "created_at": "2024-07-25T09:00:00Z",
            "updated_at": "2024-07-25T09:00:00Z",
            "semester": semester,
            "sections": ["A"],
            "present_mentees": [],
            "isReportFilled": false,
            "emailsSentCount": 0
        })
    };
    // A legacy log whose first meeting carries an even semester under JULY-DECEMBER
    mms.store()
        .upsert(
            Collection::MentorMeetingLogs,
            &log_key(),
            &json!({
                "mentorMUJid": MENTOR,
                "academicDetails": {"academicYear": "2024-2025", "academicSession": "JULY-DECEMBER 2024"},
                "meetings": [meeting("bad", 4), meeting("good", 3)]
            }),
        )
        .await
        .unwrap();

    let report = mms.sync_log(&log_key()).await.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].meeting_id, "bad");

    let log: MentorMeetingLog = mms
        .store()
        .find(Collection::MentorMeetingLogs, &log_key())
        .await
        .unwrap()
        .unwrap();
    assert!(log.meetings[0].meeting.mentee_ids.is_empty());
    assert_eq!(log.meetings[1].meeting.mentee_ids, vec![id("MUJ10001")]);
}

#[tokio::test]
async fn test_tree_copy_failure_still_counts_log_update() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    schedule(&mms, "m-1", 1, "A").await;
    seed_mentee(&mms, "MUJ10001", Some(MENTOR), 3, "A").await;
    // The year document no longer decodes, so the tree copy cannot be located
    mms.store()
        .upsert(Collection::AcademicSessions, "2024", &json!({"broken": true}))
        .await
        .unwrap();

    let report = mms.sync_log(&log_key()).await.unwrap();
    assert_eq!(report.updated, 1);
    assert!(report.failed.is_empty());

    let log = mms.logs().get(&log_key()).await.unwrap().unwrap();
    assert_eq!(log.meetings[0].meeting.mentee_ids, vec![id("MUJ10001")]);
}

#[tokio::test]
async fn test_sync_of_missing_log_is_not_found() {
    let (_dir, mms) = setup().await;
    let err = mms.sync_log("MUJ00001:2024-2025:JULY-DECEMBER 2024").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_sync_emits_event() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    schedule(&mms, "m-1", 1, "A").await;
    let mut events = mms.subscribe();

    mms.sync_log(&log_key()).await.unwrap();

    match events.recv().await.unwrap() {
        mms_common::events::MmsEvent::LogSynced {
            mentor_id,
            academic_session,
            ..
        } => {
            assert_eq!(mentor_id, MENTOR);
            assert_eq!(academic_session, "JULY-DECEMBER 2024");
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

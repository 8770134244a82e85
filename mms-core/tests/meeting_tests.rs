//! Scheduling, attendance and reporting through the Mentorship facade

mod helpers;

use helpers::*;
use mms_common::db::Collection;
use chrono::{NaiveDate, TimeZone, Utc};
use mms_core::models::{
    AcademicSessionYear, Meeting, MeetingNotes, MeetingStatus, MeetingTime, MentorMeetingLog, ScheduledAt,
};
use mms_core::services::{compute_eligible_mentees, AttendanceSummary, NewLogMeeting, RosterScope};
use mms_core::Error;
use std::collections::HashSet;
use tokio::task::JoinSet;

#[tokio::test]
async fn test_first_meeting_attendance_is_fifty_percent() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentee(&mms, "MUJ10001", Some(MENTOR), 3, "A").await;
    seed_mentee(&mms, "MUJ10002", Some(MENTOR), 3, "A").await;

    let meeting_id = schedule(&mms, "m-1", 1, "A").await;
    let summary = mms
        .record_attendance(&id(MENTOR), year(), july_dec(), &meeting_id, &[id("MUJ10001")])
        .await
        .unwrap();

    let expected = AttendanceSummary {
        total: 2,
        present: 1,
        percentage: 50,
    };
    assert_eq!(summary, expected);
    assert_eq!(mms.get_attendance(&meeting_id).await.unwrap(), expected);
}

#[tokio::test]
async fn test_meeting_without_mentees_has_zero_percent() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;

    let meeting_id = schedule(&mms, "empty", 2, "B").await;
    let summary = mms.get_attendance(&meeting_id).await.unwrap();

    assert_eq!(summary.total, 0);
    assert_eq!(summary.present, 0);
    assert_eq!(summary.percentage, 0);
}

#[tokio::test]
async fn test_unknown_meeting_attendance_is_not_found() {
    let (_dir, mms) = setup().await;
    let err = mms.get_attendance("missing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_mentee_stats_count_by_status() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentee(&mms, "MUJ10001", Some(MENTOR), 3, "A").await;

    for (meeting_id, day) in [("m-1", 1), ("m-2", 8), ("m-3", 15)] {
        schedule(&mms, meeting_id, day, "A").await;
    }
    for meeting_id in ["m-1", "m-2"] {
        mms.record_attendance(&id(MENTOR), year(), july_dec(), meeting_id, &[id("MUJ10001")])
            .await
            .unwrap();
    }

    let stats = mms.get_mentee_meeting_stats(&id("MUJ10001")).await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.scheduled, 1);

    let stranger = mms.get_mentee_meeting_stats(&id("MUJ19999")).await.unwrap();
    assert_eq!(stranger.total, 0);
}

#[tokio::test]
async fn test_add_meeting_stamps_eligible_set() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentor(&mms, "MUJ00008").await;
    seed_mentee(&mms, "MUJ10001", Some(MENTOR), 3, "A").await;
    seed_mentee(&mms, "MUJ10002", Some(MENTOR), 3, "B").await;
    seed_mentee(&mms, "MUJ10003", Some("MUJ00008"), 3, "A").await;
    seed_mentee(&mms, "MUJ10004", Some(MENTOR), 5, "A").await;
    seed_mentee(&mms, "MUJ10005", None, 3, "A").await;

    schedule(&mms, "m-1", 1, "A").await;

    let meetings = mms
        .meetings_for_semester(&id(MENTOR), year(), july_dec(), sem(3))
        .await
        .unwrap();
    assert_eq!(meetings.len(), 1);

    let expected = compute_eligible_mentees(
        mms.people(),
        &RosterScope {
            mentor: &id(MENTOR),
            academic_year: &year(),
            academic_session: &july_dec(),
            semester: sem(3),
            sections: &[section("A")],
        },
    )
    .await
    .unwrap();
    assert_eq!(expected, vec![id("MUJ10001")]);
    assert_eq!(meetings[0].meeting.mentee_ids, expected);
    assert!(meetings[0].present_mentees.is_empty());
    assert!(!meetings[0].is_report_filled);
}

#[tokio::test]
async fn test_duplicate_meeting_id_conflicts() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    schedule(&mms, "m-1", 1, "A").await;

    let err = mms
        .schedule_meeting(&id(MENTOR), year(), july_dec(), sem(3), section("A"), payload("m-1", 2))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn test_meeting_id_is_unique_across_mentors() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentor(&mms, "MUJ00003").await;
    seed_mentee(&mms, "MUJ10001", Some(MENTOR), 3, "A").await;
    seed_mentee(&mms, "MUJ10002", Some(MENTOR), 3, "A").await;
    schedule(&mms, "m-1", 1, "A").await;
    mms.record_attendance(&id(MENTOR), year(), july_dec(), "m-1", &[id("MUJ10001")])
        .await
        .unwrap();

    let err = mms
        .schedule_meeting(&id("MUJ00003"), year(), july_dec(), sem(3), section("B"), payload("m-1", 2))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let summary = mms.get_attendance("m-1").await.unwrap();
    assert_eq!((summary.total, summary.present, summary.percentage), (2, 1, 50));
    let listed = mms
        .get_mentors_with_meetings(year(), july_dec(), None, None)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_tree_and_log_copies_share_one_roster() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentee(&mms, "MUJ10001", Some(MENTOR), 3, "A").await;
    seed_mentee(&mms, "MUJ10002", Some(MENTOR), 3, "A").await;
    schedule(&mms, "m-1", 1, "A").await;

    let logged = mms
        .meetings_for_semester(&id(MENTOR), year(), july_dec(), sem(3))
        .await
        .unwrap();
    let tree = mms.tree().load_year(2024).await.unwrap().unwrap();
    let tree_meeting = &tree.sessions[0].semesters[0].sections[0].meetings[0];

    assert_eq!(tree_meeting.mentee_ids, vec![id("MUJ10001"), id("MUJ10002")]);
    assert_eq!(tree_meeting.mentee_ids, logged[0].meeting.mentee_ids);
}

#[tokio::test]
async fn test_log_add_meeting_resolves_roster_itself() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentee(&mms, "MUJ10001", Some(MENTOR), 3, "A").await;
    seed_mentee(&mms, "MUJ10002", Some(MENTOR), 3, "C").await;

    let log = mms.logs().find_or_create(&id(MENTOR), year(), july_dec()).await.unwrap();
    let stamp = Utc.with_ymd_and_hms(2024, 7, 25, 9, 0, 0).unwrap();
    let meeting = Meeting {
        meeting_id: "direct".to_string(),
        mentor_id: id(MENTOR),
        // Whatever the caller passes is replaced by the computed roster
        mentee_ids: vec![id("MUJ19999")],
        meeting_date: NaiveDate::from_ymd_opt(2024, 8, 2).unwrap(),
        meeting_time: MeetingTime::parse("11:00 AM").unwrap(),
        meeting_notes: MeetingNotes::default(),
        scheduled_at: ScheduledAt {
            schedule_date: stamp.date_naive(),
            schedule_time: MeetingTime::parse("09:00 AM").unwrap(),
        },
        status: MeetingStatus::Scheduled,
        created_at: stamp,
        updated_at: stamp,
    };

    let entry = mms
        .logs()
        .add_meeting(
            &log,
            NewLogMeeting {
                meeting,
                semester: sem(3),
                sections: vec![section("A"), section("C")],
            },
        )
        .await
        .unwrap();

    assert_eq!(entry.meeting.mentee_ids, vec![id("MUJ10001"), id("MUJ10002")]);
    let stored = mms.logs().get_by_semester(&log.key(), sem(3)).await.unwrap();
    assert_eq!(stored, vec![entry]);
}

#[tokio::test]
async fn test_schedule_rejects_wrong_parity_and_unknown_mentor() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;

    let err = mms
        .schedule_meeting(&id(MENTOR), year(), july_dec(), sem(4), section("A"), payload("m-1", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = mms
        .schedule_meeting(&id("MUJ00099"), year(), july_dec(), sem(3), section("A"), payload("m-1", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_attendance_outside_roster_rejected() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentee(&mms, "MUJ10001", Some(MENTOR), 3, "A").await;
    schedule(&mms, "m-1", 1, "A").await;

    let err = mms
        .record_attendance(&id(MENTOR), year(), july_dec(), "m-1", &[id("MUJ10002")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_emails_sent_accumulate() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    schedule(&mms, "m-1", 1, "A").await;

    for count in [2, 3] {
        mms.record_emails_sent(&id(MENTOR), year(), july_dec(), "m-1", count)
            .await
            .unwrap();
    }

    let meetings = mms
        .meetings_for_semester(&id(MENTOR), year(), july_dec(), sem(3))
        .await
        .unwrap();
    assert_eq!(meetings[0].emails_sent_count, 5);
}

#[tokio::test]
async fn test_mentors_with_meetings_grouped_and_filtered() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentor(&mms, "MUJ00003").await;

    schedule(&mms, "m-2", 8, "A").await;
    schedule(&mms, "m-1", 1, "B").await;
    mms.schedule_meeting(&id("MUJ00003"), year(), july_dec(), sem(5), section("A"), payload("x-1", 3))
        .await
        .unwrap();

    let all = mms
        .get_mentors_with_meetings(year(), july_dec(), None, None)
        .await
        .unwrap();
    let ids: Vec<&str> = all.iter().map(|m| m.mentor_id.as_str()).collect();
    assert_eq!(ids, vec!["MUJ00003", MENTOR]);
    assert_eq!(all[1].meeting_count, 2);
    let meeting_ids: Vec<&str> = all[1].meetings.iter().map(|m| m.meeting_id.as_str()).collect();
    assert_eq!(meeting_ids, vec!["m-1", "m-2"]);

    let section_a = mms
        .get_mentors_with_meetings(year(), july_dec(), Some(sem(3)), Some(section("A")))
        .await
        .unwrap();
    assert_eq!(section_a.len(), 1);
    assert_eq!(section_a[0].meeting_count, 1);
    assert_eq!(section_a[0].meetings[0].meeting_id, "m-2");
}

#[tokio::test]
async fn test_mentor_report_counts_attendance_within_result() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentee(&mms, "MUJ10001", Some(MENTOR), 3, "A").await;
    seed_mentee(&mms, "MUJ10002", Some(MENTOR), 3, "A").await;

    schedule(&mms, "m-b", 8, "A").await;
    schedule(&mms, "m-a", 1, "A").await;
    mms.record_attendance(&id(MENTOR), year(), july_dec(), "m-a", &[id("MUJ10001"), id("MUJ10002")])
        .await
        .unwrap();
    mms.record_attendance(&id(MENTOR), year(), july_dec(), "m-b", &[id("MUJ10001")])
        .await
        .unwrap();

    let report = mms
        .get_mentor_report(&id(MENTOR), year(), july_dec(), sem(3))
        .await
        .unwrap();
    assert_eq!(report.len(), 2);
    assert_eq!(report[0].meeting.meeting.meeting_id, "m-a");
    assert_eq!(report[0].attendance.percentage, 100);
    assert_eq!(report[1].attendance.percentage, 50);

    let first = &report[0].attendees;
    assert_eq!(first[0].mentee_id, id("MUJ10001"));
    assert_eq!(first[0].attended_in_report, 2);
    assert_eq!(first[0].name.as_deref(), Some("Mentee MUJ10001"));
    assert_eq!(first[1].attended_in_report, 1);

    assert_eq!(report[0].meeting.meeting.status, MeetingStatus::Completed);
    assert!(report[0].meeting.is_report_filled);
}

#[tokio::test]
async fn test_concurrent_scheduling_in_one_section_loses_nothing() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;

    let mut join_set = JoinSet::new();
    for i in 0..10u32 {
        let mms = mms.clone();
        join_set.spawn(async move { schedule(&mms, &format!("m-{}", i), i + 1, "A").await });
    }
    let mut scheduled = HashSet::new();
    while let Some(result) = join_set.join_next().await {
        scheduled.insert(result.unwrap());
    }
    assert_eq!(scheduled.len(), 10);

    let tree: AcademicSessionYear = mms
        .store()
        .find(Collection::AcademicSessions, "2024")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tree.sessions.len(), 1);
    assert_eq!(tree.sessions[0].semesters.len(), 1);
    assert_eq!(tree.sessions[0].semesters[0].sections.len(), 1);
    assert_eq!(tree.sessions[0].semesters[0].sections[0].meetings.len(), 10);

    let key = MentorMeetingLog::key_for(&id(MENTOR), &year(), &july_dec());
    let log: MentorMeetingLog = mms
        .store()
        .find(Collection::MentorMeetingLogs, &key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.meetings.len(), 10);
}

#[tokio::test]
async fn test_year_document_round_trip_through_store() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentee(&mms, "MUJ10001", Some(MENTOR), 3, "A").await;
    schedule(&mms, "m-1", 1, "A").await;

    let original: AcademicSessionYear = mms.tree().load_year(2024).await.unwrap().unwrap();
    let serialized = serde_json::to_value(&original).unwrap();

    mms.store()
        .upsert(Collection::AcademicSessions, "2024", &original)
        .await
        .unwrap();
    let reread: AcademicSessionYear = mms.tree().load_year(2024).await.unwrap().unwrap();

    assert_eq!(reread, original);
    assert_eq!(serde_json::to_value(&reread).unwrap(), serialized);
}

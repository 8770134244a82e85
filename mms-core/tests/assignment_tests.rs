//! Relationship assignment, single and bulk

mod helpers;

use helpers::*;
use mms_common::db::Collection;
use mms_core::models::AcademicYear;
use mms_core::services::AssignmentRequest;
use mms_core::Error;

fn request(mentor: &str, mentee: &str, semester: u8, section_letter: &str) -> AssignmentRequest {
    AssignmentRequest {
        mentor_id: id(mentor),
        mentee_id: id(mentee),
        session: year(),
        current_semester: sem(semester),
        section: section(section_letter),
    }
}

#[tokio::test]
async fn test_assign_mentor_is_idempotent() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentee(&mms, "MUJ10001", None, 3, "A").await;

    let first = mms.assign_mentor(&request(MENTOR, "MUJ10001", 3, "A")).await.unwrap();
    let second = mms.assign_mentor(&request(MENTOR, "MUJ10001", 3, "A")).await.unwrap();

    assert_eq!(mms.store().count(Collection::MentorMenteeRelationships).await.unwrap(), 1);
    assert_eq!(first.created_at, second.created_at);
    assert!(second.updated_at >= first.updated_at);
    assert_eq!(second.academic_session, "2024");

    let roster = mms
        .get_section_roster(year(), july_dec(), sem(3), section("A"))
        .await
        .unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].mentor_id, id(MENTOR));
}

#[tokio::test]
async fn test_assign_updates_mentee_record_and_creates_session() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentee(&mms, "MUJ10001", None, 1, "C").await;

    let next_year = AcademicYear::parse("2025-2026").unwrap();
    mms.assign_mentor(&AssignmentRequest {
        mentor_id: id(MENTOR),
        mentee_id: id("MUJ10001"),
        session: next_year,
        current_semester: sem(4),
        section: section("B"),
    })
    .await
    .unwrap();

    let mentee = mms.people().require_mentee(&id("MUJ10001")).await.unwrap();
    assert_eq!(mentee.mentor_mujid, Some(id(MENTOR)));
    assert_eq!(mentee.semester, sem(4));
    assert_eq!(mentee.section, Some(section("B")));
    assert_eq!(mentee.academic_year, next_year);
    assert_eq!(mentee.academic_session.to_string(), "JANUARY-JUNE 2026");

    let tree = mms.tree().load_year(2025).await.unwrap().unwrap();
    assert_eq!(tree.sessions[0].name.to_string(), "JANUARY-JUNE 2026");
    assert_eq!(tree.sessions[0].semesters[0].sections[0].mentees_assigned.len(), 1);
}

#[tokio::test]
async fn test_assign_names_the_missing_side() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentee(&mms, "MUJ10001", None, 3, "A").await;

    match mms.assign_mentor(&request("MUJ00099", "MUJ10001", 3, "A")).await {
        Err(Error::NotFound(what)) => assert!(what.contains("mentor MUJ00099")),
        other => panic!("expected NotFound, got {:?}", other),
    }
    match mms.assign_mentor(&request(MENTOR, "MUJ19999", 3, "A")).await {
        Err(Error::NotFound(what)) => assert!(what.contains("mentee MUJ19999")),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_assign_rejects_section_outside_a_to_e() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentee(&mms, "MUJ10001", None, 3, "A").await;

    let err = mms.assign_mentor(&request(MENTOR, "MUJ10001", 3, "F")).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_second_mentor_same_semester_conflicts() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentor(&mms, "MUJ00008").await;
    seed_mentee(&mms, "MUJ10001", None, 3, "A").await;

    mms.assign_mentor(&request(MENTOR, "MUJ10001", 3, "A")).await.unwrap();
    let err = mms
        .assign_mentor(&request("MUJ00008", "MUJ10001", 3, "A"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn test_bulk_assign_collects_row_errors() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    for mentee in ["MUJ10001", "MUJ10002", "MUJ10003"] {
        seed_mentee(&mms, mentee, None, 3, "A").await;
    }

    let rows = vec![
        request(MENTOR, "MUJ10001", 3, "A"),
        request("MUJ00099", "MUJ10002", 3, "A"),
        request(MENTOR, "MUJ10002", 3, "B"),
        request(MENTOR, "MUJ19999", 3, "A"),
        request(MENTOR, "MUJ10003", 3, "A"),
    ];
    let report = mms.bulk_assign(&rows).await.unwrap();

    assert_eq!(report.errors.len(), 2);
    assert_eq!(report.persisted.len(), 3);
    assert_eq!(report.errors[0].row, 1);
    assert_eq!(report.errors[0].identifier, "MUJ00099");
    assert_eq!(report.errors[1].row, 3);
    assert_eq!(report.errors[1].identifier, "MUJ19999");
    assert_eq!(mms.store().count(Collection::MentorMenteeRelationships).await.unwrap(), 3);

    let roster = mms.get_semester_roster(year(), july_dec(), sem(3)).await.unwrap();
    let ids: Vec<&str> = roster.iter().map(|a| a.mentee_id.as_str()).collect();
    assert_eq!(ids, vec!["MUJ10001", "MUJ10002", "MUJ10003"]);
}

#[tokio::test]
async fn test_bulk_assign_storage_failure_writes_nothing() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    for mentee in ["MUJ10001", "MUJ10002", "MUJ10003"] {
        seed_mentee(&mms, mentee, None, 3, "A").await;
    }
    sqlx::query(
        "CREATE TRIGGER full_disk BEFORE INSERT ON documents
         WHEN NEW.collection = 'mentor_mentee_relationships' AND NEW.doc_key = 'MUJ00007:MUJ10003'
         BEGIN SELECT RAISE(ABORT, 'database or disk is full'); END",
    )
    .execute(mms.store().pool())
    .await
    .unwrap();

    let err = mms
        .bulk_assign(&[
            request(MENTOR, "MUJ10001", 3, "A"),
            request(MENTOR, "MUJ19999", 3, "A"),
            request(MENTOR, "MUJ10002", 3, "A"),
            request(MENTOR, "MUJ10003", 3, "A"),
        ])
        .await
        .unwrap_err();

    assert!(err.is_storage_failure());
    assert_eq!(mms.store().count(Collection::MentorMenteeRelationships).await.unwrap(), 0);
    for mentee in ["MUJ10001", "MUJ10002", "MUJ10003"] {
        let record = mms.people().get_mentee(&id(mentee)).await.unwrap().unwrap();
        assert_eq!(record.mentor_mujid, None);
    }
}

#[tokio::test]
async fn test_bulk_assign_conflict_within_batch() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentor(&mms, "MUJ00008").await;
    seed_mentee(&mms, "MUJ10001", None, 3, "A").await;

    let report = mms
        .bulk_assign(&[
            request(MENTOR, "MUJ10001", 3, "A"),
            request("MUJ00008", "MUJ10001", 3, "A"),
        ])
        .await
        .unwrap();

    assert_eq!(report.persisted.len(), 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].identifier, "MUJ10001");
}

#[tokio::test]
async fn test_assignment_resyncs_existing_meetings() {
    let (_dir, mms) = setup().await;
    seed_mentor(&mms, MENTOR).await;
    seed_mentee(&mms, "MUJ10001", None, 3, "A").await;
    schedule(&mms, "m-1", 1, "A").await;

    mms.assign_mentor(&request(MENTOR, "MUJ10001", 3, "A")).await.unwrap();

    let meetings = mms
        .meetings_for_semester(&id(MENTOR), year(), july_dec(), sem(3))
        .await
        .unwrap();
    assert_eq!(meetings[0].meeting.mentee_ids, vec![id("MUJ10001")]);
}

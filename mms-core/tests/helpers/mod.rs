//! Shared fixtures for mms-core integration tests
#![allow(dead_code)]

use chrono::NaiveDate;
use mms_common::config::MmsConfig;
use mms_core::models::{
    AcademicYear, MeetingNotes, MeetingTime, Mentee, Mentor, MujId, ParentContacts, SectionLetter, SemesterNumber,
    SessionName,
};
use mms_core::{MeetingPayload, Mentorship};
use tempfile::TempDir;

pub const MENTOR: &str = "MUJ00007";

/// Fresh database in a temp dir; keep the `TempDir` alive for the test
pub async fn setup() -> (TempDir, Mentorship) {
    let temp_dir = TempDir::new().unwrap();
    let mentorship = Mentorship::open(&temp_dir.path().join("mms.db"), &MmsConfig::default())
        .await
        .unwrap();
    (temp_dir, mentorship)
}

pub fn id(raw: &str) -> MujId {
    MujId::parse(raw).unwrap()
}

pub fn year() -> AcademicYear {
    AcademicYear::parse("2024-2025").unwrap()
}

pub fn july_dec() -> SessionName {
    SessionName::parse("JULY-DECEMBER 2024").unwrap()
}

pub fn sem(n: u8) -> SemesterNumber {
    SemesterNumber::new(n).unwrap()
}

pub fn section(letter: &str) -> SectionLetter {
    SectionLetter::parse(letter).unwrap()
}

pub async fn seed_mentor(mentorship: &Mentorship, mentor_id: &str) {
    mentorship
        .people()
        .upsert_mentor(&Mentor {
            muj_id: id(mentor_id),
            name: format!("Mentor {}", mentor_id),
            email: format!("{}@example.edu", mentor_id.to_lowercase()),
            phone: String::new(),
            academic_year: year(),
            academic_session: july_dec(),
            is_active: true,
        })
        .await
        .unwrap();
}

pub fn mentee(mentee_id: &str, mentor: Option<&str>, semester: u8, section_letter: &str) -> Mentee {
    Mentee {
        muj_id: id(mentee_id),
        name: format!("Mentee {}", mentee_id),
        email: format!("{}@example.edu", mentee_id.to_lowercase()),
        phone: "9999999999".to_string(),
        year_of_registration: Some(2023),
        academic_year: year(),
        academic_session: july_dec(),
        semester: sem(semester),
        section: Some(section(section_letter)),
        mentor_mujid: mentor.map(id),
        parents: ParentContacts::default(),
    }
}

pub async fn seed_mentee(mentorship: &Mentorship, mentee_id: &str, mentor: Option<&str>, semester: u8, section_letter: &str) {
    mentorship
        .people()
        .upsert_mentee(&mentee(mentee_id, mentor, semester, section_letter))
        .await
        .unwrap();
}

pub fn payload(meeting_id: &str, day: u32) -> MeetingPayload {
    MeetingPayload {
        meeting_id: Some(meeting_id.to_string()),
        meeting_date: NaiveDate::from_ymd_opt(2024, 8, day).unwrap(),
        meeting_time: MeetingTime::parse("10:30 AM").unwrap(),
        meeting_notes: MeetingNotes {
            topic_of_discussion: "Progress review".to_string(),
            ..Default::default()
        },
        scheduled_at: None,
        term_dates: None,
    }
}

/// Schedule a meeting for MENTOR in JULY-DECEMBER 2024, semester 3
pub async fn schedule(mentorship: &Mentorship, meeting_id: &str, day: u32, section_letter: &str) -> String {
    schedule_for(mentorship, MENTOR, meeting_id, day, section_letter).await
}

pub async fn schedule_for(
    mentorship: &Mentorship,
    mentor: &str,
    meeting_id: &str,
    day: u32,
    section_letter: &str,
) -> String {
    mentorship
        .schedule_meeting(
            &id(mentor),
            year(),
            july_dec(),
            sem(3),
            section(section_letter),
            payload(meeting_id, day),
        )
        .await
        .unwrap()
}

//! Mentor-mentee relationship records, unique per (mentor, mentee)

use super::ids::{AcademicYear, MujId, SectionLetter, SemesterNumber};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedMeeting {
    pub meeting_id: String,
    pub meeting_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentorMenteeRelationship {
    #[serde(rename = "mentor_MUJid")]
    pub mentor_muj_id: MujId,
    #[serde(rename = "mentee_MUJid")]
    pub mentee_muj_id: MujId,
    pub session: AcademicYear,
    pub current_semester: SemesterNumber,
    pub section: SectionLetter,
    /// Key of the `AcademicSessionYear` document this relationship points at
    #[serde(rename = "academicSession")]
    pub academic_session: String,
    #[serde(default)]
    pub completed_meetings: Vec<CompletedMeeting>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MentorMenteeRelationship {
    /// Upsert key: `<mentor>:<mentee>`
    pub fn key_for(mentor: &MujId, mentee: &MujId) -> String {
        format!("{}:{}", mentor, mentee)
    }

    pub fn key(&self) -> String {
        Self::key_for(&self.mentor_muj_id, &self.mentee_muj_id)
    }
}

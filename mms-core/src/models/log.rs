//! Flat per-mentor meeting log
//!
//! One document per (mentor, academic year, academic session). A read-optimized
//! projection of the session tree: `mentee_ids` is recomputed from the roster
//! by the sync engine, `present_mentees` is operator-entered and never
//! recomputed.

use super::ids::{AcademicYear, MujId, SectionLetter, SemesterNumber, SessionName};
use super::tree::Meeting;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicDetails {
    #[serde(rename = "academicYear")]
    pub academic_year: AcademicYear,
    #[serde(rename = "academicSession")]
    pub academic_session: SessionName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentorMeetingLog {
    #[serde(rename = "mentorMUJid")]
    pub mentor_muj_id: MujId,
    #[serde(rename = "academicDetails")]
    pub academic_details: AcademicDetails,
    #[serde(default)]
    pub meetings: Vec<IndividualMeeting>,
}

impl MentorMeetingLog {
    pub fn new(mentor: MujId, academic_year: AcademicYear, academic_session: SessionName) -> Self {
        Self {
            mentor_muj_id: mentor,
            academic_details: AcademicDetails {
                academic_year,
                academic_session,
            },
            meetings: Vec::new(),
        }
    }

    /// Store key: `<mentor>:<academic year>:<session>`
    pub fn key_for(mentor: &MujId, academic_year: &AcademicYear, academic_session: &SessionName) -> String {
        format!("{}:{}:{}", mentor, academic_year, academic_session)
    }

    pub fn key(&self) -> String {
        Self::key_for(
            &self.mentor_muj_id,
            &self.academic_details.academic_year,
            &self.academic_details.academic_session,
        )
    }

    pub fn meeting(&self, meeting_id: &str) -> Option<(usize, &IndividualMeeting)> {
        self.meetings
            .iter()
            .enumerate()
            .find(|(_, m)| m.meeting.meeting_id == meeting_id)
    }

    /// Path of one meeting inside the log document
    pub fn meeting_path(index: usize) -> String {
        format!("$.meetings[{}]", index)
    }
}

/// A meeting as recorded in the mentor's log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndividualMeeting {
    #[serde(flatten)]
    pub meeting: Meeting,
    pub semester: SemesterNumber,
    pub sections: Vec<SectionLetter>,
    #[serde(default)]
    pub present_mentees: Vec<MujId>,
    #[serde(rename = "isReportFilled", default)]
    pub is_report_filled: bool,
    #[serde(rename = "emailsSentCount", default)]
    pub emails_sent_count: u32,
}

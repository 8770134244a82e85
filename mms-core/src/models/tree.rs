//! Academic session tree: year → session → semester → section
//!
//! One `AcademicSessionYear` document per start year. Sessions, semesters and
//! sections are only ever appended, so their indices stay valid while the
//! year document is live. Meetings and mentee assignments can be moved out by
//! archival, so writes addressed to them carry a guard on their natural key.

use super::ids::{MeetingTime, MujId, SectionLetter, SemesterNumber, SessionName};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicSessionYear {
    pub start_year: i32,
    pub end_year: i32,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl AcademicSessionYear {
    pub fn new(start_year: i32) -> Self {
        Self {
            start_year,
            end_year: start_year + 1,
            sessions: Vec::new(),
        }
    }

    /// Store key of the year document
    pub fn key_for(start_year: i32) -> String {
        start_year.to_string()
    }

    pub fn session(&self, name: &SessionName) -> Option<(usize, &Session)> {
        self.sessions.iter().enumerate().find(|(_, s)| s.name == *name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub name: SessionName,
    #[serde(default)]
    pub semesters: Vec<Semester>,
}

impl Session {
    pub fn new(name: SessionName) -> Self {
        Self {
            name,
            semesters: Vec::new(),
        }
    }

    pub fn semester(&self, number: SemesterNumber) -> Option<(usize, &Semester)> {
        self.semesters
            .iter()
            .enumerate()
            .find(|(_, s)| s.semester_number == number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Semester {
    pub semester_number: SemesterNumber,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Semester {
    pub fn section(&self, letter: SectionLetter) -> Option<(usize, &Section)> {
        self.sections.iter().enumerate().find(|(_, s)| s.name == letter)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: SectionLetter,
    #[serde(default)]
    pub mentees_assigned: Vec<MenteeAssignment>,
    #[serde(default)]
    pub meetings: Vec<Meeting>,
}

impl Section {
    pub fn new(name: SectionLetter) -> Self {
        Self {
            name,
            mentees_assigned: Vec::new(),
            meetings: Vec::new(),
        }
    }
}

/// Contact details for one parent or guardian
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParentContacts {
    #[serde(default)]
    pub father: Contact,
    #[serde(default)]
    pub mother: Contact,
    #[serde(default)]
    pub guardian: Contact,
}

/// Snapshot of a mentee's identity at assignment time
///
/// Denormalized copy; later edits to the mentee record do not flow back here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenteeAssignment {
    pub mentee_id: MujId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub mentor_id: MujId,
    #[serde(default)]
    pub parents: ParentContacts,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    #[default]
    Scheduled,
    Completed,
}

/// Free-form meeting notes; unknown keys are preserved
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingNotes {
    #[serde(rename = "TopicOfDiscussion")]
    pub topic_of_discussion: String,
    #[serde(rename = "TypeOfInformation", default, skip_serializing_if = "Option::is_none")]
    pub type_of_information: Option<String>,
    #[serde(rename = "NotesToStudent", default, skip_serializing_if = "Option::is_none")]
    pub notes_to_student: Option<String>,
    #[serde(rename = "IssuesRaisedByMentee", default, skip_serializing_if = "Option::is_none")]
    pub issues_raised: Option<String>,
    #[serde(rename = "OutcomeOfMeeting", default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledAt {
    #[serde(rename = "scheduleDate")]
    pub schedule_date: NaiveDate,
    #[serde(rename = "scheduleTime")]
    pub schedule_time: MeetingTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub meeting_id: String,
    pub mentor_id: MujId,
    #[serde(default)]
    pub mentee_ids: Vec<MujId>,
    pub meeting_date: NaiveDate,
    pub meeting_time: MeetingTime,
    #[serde(default)]
    pub meeting_notes: MeetingNotes,
    #[serde(rename = "scheduledAT")]
    pub scheduled_at: ScheduledAt,
    #[serde(default)]
    pub status: MeetingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// JSON paths into a year document
///
/// Built from indices the caller resolved against a freshly read document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreePath {
    pub session: usize,
    pub semester: Option<usize>,
    pub section: Option<usize>,
}

impl TreePath {
    pub const SESSIONS: &'static str = "$.sessions";

    pub fn session(session: usize) -> Self {
        Self {
            session,
            semester: None,
            section: None,
        }
    }

    pub fn with_semester(self, semester: usize) -> Self {
        Self {
            semester: Some(semester),
            ..self
        }
    }

    pub fn with_section(self, section: usize) -> Self {
        Self {
            section: Some(section),
            ..self
        }
    }

    /// Path of the node itself
    pub fn node(&self) -> String {
        let mut path = format!("$.sessions[{}]", self.session);
        if let Some(semester) = self.semester {
            path.push_str(&format!(".semesters[{}]", semester));
            if let Some(section) = self.section {
                path.push_str(&format!(".sections[{}]", section));
            }
        }
        path
    }

    /// Path of a child array of this node
    pub fn child(&self, array: &str) -> String {
        format!("{}.{}", self.node(), array)
    }
}

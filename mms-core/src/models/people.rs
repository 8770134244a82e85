//! Mentor and mentee records
//!
//! The mentee record is the roster authority: eligibility for a meeting is
//! computed from `mentorMujid`, academic year/session, semester and section.

use super::ids::{AcademicYear, MujId, SectionLetter, SemesterNumber, SessionName};
use super::tree::ParentContacts;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mentor {
    #[serde(rename = "MUJid")]
    pub muj_id: MujId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(rename = "academicYear")]
    pub academic_year: AcademicYear,
    #[serde(rename = "academicSession")]
    pub academic_session: SessionName,
    #[serde(rename = "isActive", default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mentee {
    #[serde(rename = "MUJid")]
    pub muj_id: MujId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(rename = "yearOfRegistration", default, skip_serializing_if = "Option::is_none")]
    pub year_of_registration: Option<i32>,
    #[serde(rename = "academicYear")]
    pub academic_year: AcademicYear,
    #[serde(rename = "academicSession")]
    pub academic_session: SessionName,
    pub semester: SemesterNumber,
    #[serde(default)]
    pub section: Option<SectionLetter>,
    #[serde(rename = "mentorMujid", default)]
    pub mentor_mujid: Option<MujId>,
    #[serde(default)]
    pub parents: ParentContacts,
}

impl Mentee {
    /// Whether this mentee belongs in a meeting of the given scope
    pub fn is_eligible_for(
        &self,
        mentor: &MujId,
        academic_year: &AcademicYear,
        academic_session: &SessionName,
        semester: SemesterNumber,
        sections: &[SectionLetter],
    ) -> bool {
        self.mentor_mujid.as_ref() == Some(mentor)
            && self.academic_year == *academic_year
            && self.academic_session == *academic_session
            && self.semester == semester
            && self.section.is_some_and(|s| sections.contains(&s))
    }
}

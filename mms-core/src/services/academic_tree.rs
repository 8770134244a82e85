//! Academic session tree operations
//!
//! Lazy find-or-create at every level. Each level is an atomic
//! append-if-absent keyed by the node's natural key (start year, session
//! name, semester number, section letter), so concurrent callers converge on
//! one node instead of appending duplicates.

use crate::models::{
    AcademicSessionYear, AcademicYear, Meeting, MenteeAssignment, SectionLetter, Semester, SemesterNumber,
    Session, SessionName, Section, TermDates, TreePath,
};
use mms_common::db::{Collection, DocumentStore, PathGuard};
use mms_common::{Error, Result};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Handle to a session node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRef {
    pub start_year: i32,
    pub name: SessionName,
    pub path: TreePath,
}

impl SessionRef {
    fn guard(&self) -> PathGuard {
        PathGuard::new(format!("{}.name", self.path.node()), self.name.to_string())
    }
}

/// Handle to a semester node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemesterRef {
    pub session: SessionRef,
    pub number: SemesterNumber,
    pub path: TreePath,
}

impl SemesterRef {
    fn guard(&self) -> PathGuard {
        PathGuard::new(
            format!("{}.semester_number", self.path.node()),
            self.number.get(),
        )
    }
}

/// Handle to a section node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRef {
    pub semester: SemesterRef,
    pub letter: SectionLetter,
    pub path: TreePath,
}

impl SectionRef {
    pub fn start_year(&self) -> i32 {
        self.semester.session.start_year
    }

    fn guard(&self) -> PathGuard {
        PathGuard::new(format!("{}.name", self.path.node()), self.letter.to_string())
    }
}

/// Nested calendar document model
#[derive(Debug, Clone)]
pub struct AcademicSessionTree {
    store: DocumentStore,
}

impl AcademicSessionTree {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    pub async fn load_year(&self, start_year: i32) -> Result<Option<AcademicSessionYear>> {
        self.store
            .find(Collection::AcademicSessions, &AcademicSessionYear::key_for(start_year))
            .await
    }

    pub async fn all_years(&self) -> Result<Vec<AcademicSessionYear>> {
        self.store.find_all(Collection::AcademicSessions).await
    }

    async fn reload_year(&self, start_year: i32) -> Result<AcademicSessionYear> {
        self.load_year(start_year).await?.ok_or_else(|| {
            Error::NotFound(format!("academic session year {}", start_year))
        })
    }

    /// Return the year document for `start_year`, creating it on first use
    pub async fn find_or_create_year(&self, start_year: i32) -> Result<AcademicSessionYear> {
        let created = self
            .store
            .insert_if_absent(
                Collection::AcademicSessions,
                &AcademicSessionYear::key_for(start_year),
                &AcademicSessionYear::new(start_year),
            )
            .await?;

        if created {
            info!(start_year, "Created academic session year");
        }
        self.reload_year(start_year).await
    }

    /// Return the named session under `start_year`, creating both on first use
    pub async fn find_or_create_session(
        &self,
        start_year: i32,
        name: SessionName,
    ) -> Result<(SessionRef, Session)> {
        if name.academic_start_year() != start_year {
            return Err(Error::Validation(format!(
                "session {} does not belong to academic year {}-{}",
                name,
                start_year,
                start_year + 1
            )));
        }

        self.find_or_create_year(start_year).await?;

        let inserted = self
            .store
            .push_unique_at_path(
                Collection::AcademicSessions,
                &AcademicSessionYear::key_for(start_year),
                TreePath::SESSIONS,
                "$.name",
                &json!(name.to_string()),
                &Session::new(name),
                None,
            )
            .await?;
        if inserted {
            debug!(start_year, session = %name, "Created session node");
        }

        let year = self.reload_year(start_year).await?;
        let (index, session) = year
            .session(&name)
            .ok_or_else(|| Error::Internal(format!("session {} missing after create", name)))?;

        Ok((
            SessionRef {
                start_year,
                name,
                path: TreePath::session(index),
            },
            session.clone(),
        ))
    }

    /// Return the semester under `session`, creating it on first use
    ///
    /// Odd semesters belong to JULY-DECEMBER sessions, even ones to
    /// JANUARY-JUNE. Dates default to the session's calendar half.
    pub async fn find_or_create_semester(
        &self,
        session: &SessionRef,
        number: SemesterNumber,
        term_dates: Option<TermDates>,
    ) -> Result<(SemesterRef, Semester)> {
        if !session.name.term().accepts(number) {
            return Err(Error::Validation(format!(
                "semester {} cannot be scheduled in session {}",
                number, session.name
            )));
        }

        let dates = term_dates.unwrap_or_else(|| session.name.default_term_dates());
        let semester = Semester {
            semester_number: number,
            start_date: dates.start_date,
            end_date: dates.end_date,
            sections: Vec::new(),
        };

        let inserted = self
            .store
            .push_unique_at_path(
                Collection::AcademicSessions,
                &AcademicSessionYear::key_for(session.start_year),
                &session.path.child("semesters"),
                "$.semester_number",
                &json!(number.get()),
                &semester,
                Some(&session.guard()),
            )
            .await?;
        if inserted {
            debug!(session = %session.name, semester = %number, "Created semester node");
        }

        let year = self.reload_year(session.start_year).await?;
        let (index, semester) = year
            .sessions
            .get(session.path.session)
            .and_then(|s| s.semester(number))
            .ok_or_else(|| Error::Internal(format!("semester {} missing after create", number)))?;

        Ok((
            SemesterRef {
                session: *session,
                number,
                path: session.path.with_semester(index),
            },
            semester.clone(),
        ))
    }

    /// Return the section under `semester`, creating it on first use
    pub async fn find_or_create_section(
        &self,
        semester: &SemesterRef,
        letter: SectionLetter,
    ) -> Result<(SectionRef, Section)> {
        let start_year = semester.session.start_year;
        let inserted = self
            .store
            .push_unique_at_path(
                Collection::AcademicSessions,
                &AcademicSessionYear::key_for(start_year),
                &semester.path.child("sections"),
                "$.name",
                &json!(letter.to_string()),
                &Section::new(letter),
                Some(&semester.guard()),
            )
            .await?;
        if inserted {
            debug!(semester = %semester.number, section = %letter, "Created section node");
        }

        let year = self.reload_year(start_year).await?;
        let semester_index = semester.path.semester.unwrap_or_default();
        let (index, section) = year
            .sessions
            .get(semester.path.session)
            .and_then(|s| s.semesters.get(semester_index))
            .and_then(|s| s.section(letter))
            .ok_or_else(|| Error::Internal(format!("section {} missing after create", letter)))?;

        Ok((
            SectionRef {
                semester: *semester,
                letter,
                path: semester.path.with_section(index),
            },
            section.clone(),
        ))
    }

    /// Walk year → session → semester → section, creating what is missing
    pub async fn resolve_section(
        &self,
        academic_year: AcademicYear,
        session: SessionName,
        semester: SemesterNumber,
        section: SectionLetter,
        term_dates: Option<TermDates>,
    ) -> Result<SectionRef> {
        let (session_ref, _) = self
            .find_or_create_session(academic_year.start(), session)
            .await?;
        let (semester_ref, _) = self
            .find_or_create_semester(&session_ref, semester, term_dates)
            .await?;
        let (section_ref, _) = self.find_or_create_section(&semester_ref, section).await?;
        Ok(section_ref)
    }

    /// Append a meeting to a section; a repeated `meeting_id` is a conflict
    pub async fn add_meeting(&self, section: &SectionRef, meeting: &Meeting) -> Result<()> {
        let appended = self
            .store
            .push_unique_at_path(
                Collection::AcademicSessions,
                &AcademicSessionYear::key_for(section.start_year()),
                &section.path.child("meetings"),
                "$.meeting_id",
                &json!(meeting.meeting_id),
                meeting,
                Some(&section.guard()),
            )
            .await?;

        if !appended {
            return Err(Error::Conflict(format!(
                "meeting {} already exists in section {}",
                meeting.meeting_id, section.letter
            )));
        }
        Ok(())
    }

    /// Append a mentee snapshot; returns `false` when the mentee is already listed
    pub async fn add_mentee_assignment(
        &self,
        section: &SectionRef,
        assignment: &MenteeAssignment,
    ) -> Result<bool> {
        self.store
            .push_unique_at_path(
                Collection::AcademicSessions,
                &AcademicSessionYear::key_for(section.start_year()),
                &section.path.child("mentees_assigned"),
                "$.mentee_id",
                &json!(assignment.mentee_id.to_string()),
                assignment,
                Some(&section.guard()),
            )
            .await
    }

    /// Set fields on the tree copy of a meeting
    ///
    /// `fields` are relative to the meeting node (`"mentee_ids"`, `"status"`).
    /// Returns `false` when no meeting with that id exists under the semester.
    pub async fn update_meeting(
        &self,
        session: SessionName,
        semester: SemesterNumber,
        meeting_id: &str,
        fields: &[(&str, Value)],
    ) -> Result<bool> {
        let start_year = session.academic_start_year();
        let Some(year) = self.load_year(start_year).await? else {
            return Ok(false);
        };

        let Some(meeting_path) = locate_meeting(&year, &session, semester, meeting_id) else {
            return Ok(false);
        };

        let updates: Vec<(String, Value)> = fields
            .iter()
            .map(|(field, value)| (format!("{}.{}", meeting_path, field), value.clone()))
            .collect();
        let guard = PathGuard::new(format!("{}.meeting_id", meeting_path), meeting_id);

        self.store
            .set_at_paths(
                Collection::AcademicSessions,
                &AcademicSessionYear::key_for(start_year),
                &updates,
                Some(&guard),
            )
            .await
    }
}

/// Absolute JSON path of a meeting inside a year document
fn locate_meeting(
    year: &AcademicSessionYear,
    session: &SessionName,
    semester: SemesterNumber,
    meeting_id: &str,
) -> Option<String> {
    let (session_index, session_node) = year.session(session)?;
    let (semester_index, semester_node) = session_node.semester(semester)?;

    semester_node
        .sections
        .iter()
        .enumerate()
        .find_map(|(section_index, section)| {
            section
                .meetings
                .iter()
                .position(|m| m.meeting_id == meeting_id)
                .map(|meeting_index| {
                    format!(
                        "{}[{}]",
                        TreePath::session(session_index)
                            .with_semester(semester_index)
                            .with_section(section_index)
                            .child("meetings"),
                        meeting_index
                    )
                })
        })
}

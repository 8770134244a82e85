//! Archival engine
//!
//! One generic routine: select live records matching an [`ArchiveFilter`]
//! and move each into `historical_data`. A record is a whole document, or a
//! meeting or mentee assignment nested in a tree or log document. Every
//! document is its own transaction, so an interrupted or failing run leaves
//! earlier documents archived and later ones live.

use crate::models::{
    AcademicSessionYear, AcademicYear, MentorMeetingLog, MentorMenteeRelationship, MujId, SectionLetter,
    SemesterNumber, SessionName, SessionTerm, TreePath,
};
use chrono::Datelike;
use mms_common::db::{ArchivedPart, Collection, DocumentStore, PathGuard, StoredDocument};
use mms_common::{time, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Selection criteria; every set field must match
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveFilter {
    pub older_than_years: Option<u32>,
    pub term: Option<SessionTerm>,
    pub semester: Option<SemesterNumber>,
    pub section: Option<SectionLetter>,
    pub mentor_id: Option<MujId>,
    pub mentee_id: Option<MujId>,
}

impl ArchiveFilter {
    pub fn older_than(years: u32) -> Self {
        Self {
            older_than_years: Some(years),
            ..Default::default()
        }
    }

    pub fn by_term(term: SessionTerm) -> Self {
        Self {
            term: Some(term),
            ..Default::default()
        }
    }

    pub fn by_semester(semester: SemesterNumber) -> Self {
        Self {
            semester: Some(semester),
            ..Default::default()
        }
    }

    pub fn by_section(section: SectionLetter) -> Self {
        Self {
            section: Some(section),
            ..Default::default()
        }
    }

    pub fn by_mentor(mentor: MujId) -> Self {
        Self {
            mentor_id: Some(mentor),
            ..Default::default()
        }
    }

    pub fn by_mentee(mentee: MujId) -> Self {
        Self {
            mentee_id: Some(mentee),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A document left live by an archival run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveFailure {
    pub collection: Collection,
    pub document_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    /// Historical records written: one per whole document or nested record
    pub moved_count: usize,
    pub not_moved: Vec<ArchiveFailure>,
    /// The run was cancelled before every match was visited
    pub interrupted: bool,
}

/// Filterable attributes of one record
///
/// An empty list means the record has no such attribute, and a filter on
/// that attribute does not match it.
#[derive(Debug, Default)]
struct Facets {
    start_year: Option<i32>,
    terms: Vec<SessionTerm>,
    semesters: Vec<SemesterNumber>,
    sections: Vec<SectionLetter>,
    mentors: Vec<MujId>,
    mentees: Vec<MujId>,
}

impl Facets {
    fn absorb(&mut self, other: &Facets) {
        for term in &other.terms {
            push_unique(&mut self.terms, *term);
        }
        for semester in &other.semesters {
            push_unique(&mut self.semesters, *semester);
        }
        for section in &other.sections {
            push_unique(&mut self.sections, *section);
        }
        for mentor in &other.mentors {
            push_unique(&mut self.mentors, mentor.clone());
        }
        for mentee in &other.mentees {
            push_unique(&mut self.mentees, mentee.clone());
        }
    }
}

/// A meeting or mentee assignment nested in a tree or log document
struct NestedRecord {
    part: ArchivedPart,
    facets: Facets,
}

/// What one live document contributes to a run
#[derive(Debug)]
enum Selection {
    Nothing,
    Whole,
    /// Matching nested records, highest index first within each array
    Parts(Vec<ArchivedPart>),
}

#[derive(Debug, Clone)]
pub struct ArchivalEngine {
    store: DocumentStore,
}

impl ArchivalEngine {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Move every live record matching `filter` into the historical store
    ///
    /// Tree and log documents hold records of many mentors and mentees; such
    /// a document moves whole only when every record in it matches, and
    /// otherwise only its matching meetings and assignments move. Cancellation
    /// is checked between documents.
    pub async fn archive(&self, filter: &ArchiveFilter, cancel: &CancellationToken) -> Result<ArchiveReport> {
        if filter.is_empty() {
            return Err(Error::Validation(
                "archive filter must set at least one criterion".to_string(),
            ));
        }

        let current_year = time::current_year();
        let mut report = ArchiveReport::default();

        info!(?filter, "Archival run started");

        'collections: for collection in Collection::LIVE {
            let candidates: Vec<(String, Selection)> = self
                .store
                .find_all_raw(collection)
                .await?
                .into_iter()
                .map(|doc| {
                    let selection = select(filter, collection, &doc, current_year);
                    (doc.key, selection)
                })
                .filter(|(_, selection)| !matches!(selection, Selection::Nothing))
                .collect();

            debug!(%collection, candidates = candidates.len(), "Archival candidates selected");

            for (key, selection) in candidates {
                if cancel.is_cancelled() {
                    report.interrupted = true;
                    break 'collections;
                }

                let moved = match selection {
                    Selection::Nothing => continue,
                    Selection::Whole => self
                        .store
                        .move_to_history(collection, &key)
                        .await
                        .map(|historical| usize::from(historical.is_some())),
                    Selection::Parts(parts) => self
                        .store
                        .move_parts_to_history(collection, &key, &parts)
                        .await
                        .map(|historical| historical.len()),
                };

                match moved {
                    Ok(0) => debug!(%collection, document = %key, "Document already gone, skipping"),
                    Ok(count) => {
                        debug!(%collection, document = %key, records = count, "Archived");
                        report.moved_count += count;
                    }
                    Err(e) => {
                        warn!(%collection, document = %key, error = %e, "Failed to archive document");
                        report.not_moved.push(ArchiveFailure {
                            collection,
                            document_id: key,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            moved = report.moved_count,
            not_moved = report.not_moved.len(),
            interrupted = report.interrupted,
            "Archival run finished"
        );
        Ok(report)
    }
}

fn select(filter: &ArchiveFilter, collection: Collection, doc: &StoredDocument, current_year: i32) -> Selection {
    let fallback_year = doc.created_at.year();
    let (facets, nested) = match collection {
        Collection::AcademicSessions => doc
            .decode::<AcademicSessionYear>()
            .map(|year| year_records(&year))
            .unwrap_or_default(),
        Collection::MentorMeetingLogs => doc
            .decode::<MentorMeetingLog>()
            .map(|log| log_records(&log))
            .unwrap_or_default(),
        Collection::MentorMenteeRelationships => (relationship_facets(doc), Vec::new()),
        Collection::Mentors => (person_facets(&doc.body, false), Vec::new()),
        Collection::Mentees => (person_facets(&doc.body, true), Vec::new()),
        Collection::HistoricalData => return Selection::Nothing,
    };

    if nested.is_empty() {
        return if matches(filter, &facets, fallback_year, current_year) {
            Selection::Whole
        } else {
            Selection::Nothing
        };
    }

    let total = nested.len();
    let mut parts: Vec<ArchivedPart> = nested
        .into_iter()
        .filter(|record| matches(filter, &record.facets, fallback_year, current_year))
        .map(|record| record.part)
        .collect();

    if parts.is_empty() {
        Selection::Nothing
    } else if parts.len() == total && matches(filter, &facets, fallback_year, current_year) {
        Selection::Whole
    } else {
        // Records were collected in document order
        parts.reverse();
        Selection::Parts(parts)
    }
}

/// Every set criterion must hold, and a multi-valued attribute matches only
/// when all of its values equal the wanted one
fn matches(filter: &ArchiveFilter, facets: &Facets, fallback_year: i32, current_year: i32) -> bool {
    if let Some(years) = filter.older_than_years {
        let start = facets.start_year.unwrap_or(fallback_year);
        if i64::from(current_year) - i64::from(start) < i64::from(years) {
            return false;
        }
    }

    fn within<T: PartialEq>(wanted: &Option<T>, present: &[T]) -> bool {
        wanted
            .as_ref()
            .map_or(true, |w| !present.is_empty() && present.iter().all(|p| p == w))
    }

    within(&filter.term, &facets.terms)
        && within(&filter.semester, &facets.semesters)
        && within(&filter.section, &facets.sections)
        && within(&filter.mentor_id, &facets.mentors)
        && within(&filter.mentee_id, &facets.mentees)
}

/// Document facets (structure included) plus every meeting and assignment
fn year_records(year: &AcademicSessionYear) -> (Facets, Vec<NestedRecord>) {
    let mut facets = Facets {
        start_year: Some(year.start_year),
        ..Default::default()
    };
    let mut records = Vec::new();

    for (session_index, session) in year.sessions.iter().enumerate() {
        push_unique(&mut facets.terms, session.name.term());
        for (semester_index, semester) in session.semesters.iter().enumerate() {
            push_unique(&mut facets.semesters, semester.semester_number);
            for (section_index, section) in semester.sections.iter().enumerate() {
                push_unique(&mut facets.sections, section.name);
                let node = TreePath::session(session_index)
                    .with_semester(semester_index)
                    .with_section(section_index);
                let scope = |mentors: Vec<MujId>, mentees: Vec<MujId>| Facets {
                    start_year: Some(year.start_year),
                    terms: vec![session.name.term()],
                    semesters: vec![semester.semester_number],
                    sections: vec![section.name],
                    mentors,
                    mentees,
                };

                for (index, assignment) in section.mentees_assigned.iter().enumerate() {
                    let path = format!("{}[{}]", node.child("mentees_assigned"), index);
                    records.push(NestedRecord {
                        part: ArchivedPart {
                            guard: PathGuard::new(format!("{}.mentee_id", path), assignment.mentee_id.as_str()),
                            path,
                        },
                        facets: scope(vec![assignment.mentor_id.clone()], vec![assignment.mentee_id.clone()]),
                    });
                }
                for (index, meeting) in section.meetings.iter().enumerate() {
                    let path = format!("{}[{}]", node.child("meetings"), index);
                    records.push(NestedRecord {
                        part: ArchivedPart {
                            guard: PathGuard::new(format!("{}.meeting_id", path), meeting.meeting_id.as_str()),
                            path,
                        },
                        facets: scope(vec![meeting.mentor_id.clone()], unique(&meeting.mentee_ids)),
                    });
                }
            }
        }
    }

    for record in &records {
        facets.absorb(&record.facets);
    }
    (facets, records)
}

fn log_records(log: &MentorMeetingLog) -> (Facets, Vec<NestedRecord>) {
    let details = log.academic_details;
    let mut facets = Facets {
        start_year: Some(details.academic_year.start()),
        terms: vec![details.academic_session.term()],
        mentors: vec![log.mentor_muj_id.clone()],
        ..Default::default()
    };

    let records: Vec<NestedRecord> = log
        .meetings
        .iter()
        .enumerate()
        .map(|(index, meeting)| {
            let path = MentorMeetingLog::meeting_path(index);
            let mut mentees = unique(&meeting.meeting.mentee_ids);
            for present in &meeting.present_mentees {
                push_unique(&mut mentees, present.clone());
            }
            NestedRecord {
                part: ArchivedPart {
                    guard: PathGuard::new(format!("{}.meeting_id", path), meeting.meeting.meeting_id.as_str()),
                    path,
                },
                facets: Facets {
                    start_year: Some(details.academic_year.start()),
                    terms: vec![details.academic_session.term()],
                    semesters: vec![meeting.semester],
                    sections: unique(&meeting.sections),
                    mentors: vec![log.mentor_muj_id.clone()],
                    mentees,
                },
            }
        })
        .collect();

    for record in &records {
        facets.absorb(&record.facets);
    }
    (facets, records)
}

fn relationship_facets(doc: &StoredDocument) -> Facets {
    doc.decode::<MentorMenteeRelationship>()
        .map(|r| Facets {
            start_year: Some(r.session.start()),
            terms: vec![r.session.session_for(r.current_semester).term()],
            semesters: vec![r.current_semester],
            sections: vec![r.section],
            mentors: vec![r.mentor_muj_id],
            mentees: vec![r.mentee_muj_id],
        })
        .unwrap_or_default()
}

/// Mentor and mentee records are read loosely so a legacy record missing a
/// field still gets the facets it does have
fn person_facets(body: &Value, is_mentee: bool) -> Facets {
    let text = |field: &str| body.get(field).and_then(Value::as_str);
    let id = text("MUJid").and_then(|s| MujId::parse(s).ok());

    let mut facets = Facets {
        start_year: text("academicYear")
            .and_then(|s| s.parse::<AcademicYear>().ok())
            .map(|y| y.start()),
        terms: text("academicSession")
            .and_then(|s| s.parse::<SessionName>().ok())
            .map(|s| vec![s.term()])
            .unwrap_or_default(),
        ..Default::default()
    };

    if is_mentee {
        facets.mentees.extend(id);
        facets.mentors.extend(text("mentorMujid").and_then(|s| MujId::parse(s).ok()));
        facets.semesters.extend(
            body.get("semester")
                .and_then(Value::as_u64)
                .and_then(|n| u8::try_from(n).ok())
                .and_then(|n| SemesterNumber::new(n).ok()),
        );
        facets
            .sections
            .extend(text("section").and_then(|s| SectionLetter::parse(s).ok()));
    } else {
        facets.mentors.extend(id);
    }
    facets
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

fn unique<T: PartialEq + Clone>(items: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        push_unique(&mut out, item.clone());
    }
    out
}

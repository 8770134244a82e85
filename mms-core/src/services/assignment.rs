//! Mentor-mentee relationship assignment
//!
//! A relationship is upserted by `(mentor_MUJid, mentee_MUJid)`; the mentee
//! record is updated in the same transaction so the roster authority and the
//! relationship never disagree. The session tree node is found-or-created
//! before either is written.

use crate::models::{
    AcademicSessionYear, AcademicYear, MenteeAssignment, Mentee, MentorMenteeRelationship, MujId, SectionLetter,
    SemesterNumber, SessionName,
};
use crate::services::academic_tree::{AcademicSessionTree, SectionRef};
use crate::services::people::PeopleDirectory;
use mms_common::db::{Collection, DocumentStore, WriteOp};
use mms_common::{time, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// One mentor assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub mentor_id: MujId,
    pub mentee_id: MujId,
    /// Academic year the relationship belongs to
    pub session: AcademicYear,
    pub current_semester: SemesterNumber,
    pub section: SectionLetter,
}

impl AssignmentRequest {
    pub fn academic_session(&self) -> SessionName {
        self.session.session_for(self.current_semester)
    }
}

/// A rejected bulk row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// Zero-based position in the submitted batch
    pub row: usize,
    /// The identifier that caused the rejection
    pub identifier: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkAssignReport {
    pub persisted: Vec<MentorMenteeRelationship>,
    pub errors: Vec<RowError>,
}

/// A validated row, ready to be written
struct PreparedAssignment {
    relationship: MentorMenteeRelationship,
    mentee: Mentee,
    section: SectionRef,
}

#[derive(Debug, Clone)]
pub struct RelationshipAssignmentService {
    store: DocumentStore,
    people: PeopleDirectory,
    tree: AcademicSessionTree,
}

impl RelationshipAssignmentService {
    pub fn new(store: DocumentStore) -> Self {
        Self {
            people: PeopleDirectory::new(store.clone()),
            tree: AcademicSessionTree::new(store.clone()),
            store,
        }
    }

    pub async fn get(&self, mentor: &MujId, mentee: &MujId) -> Result<Option<MentorMenteeRelationship>> {
        self.store
            .find(
                Collection::MentorMenteeRelationships,
                &MentorMenteeRelationship::key_for(mentor, mentee),
            )
            .await
    }

    pub async fn relationships_for_mentee(&self, mentee: &MujId) -> Result<Vec<MentorMenteeRelationship>> {
        self.store
            .find_where(
                Collection::MentorMenteeRelationships,
                "$.mentee_MUJid",
                &json!(mentee.as_str()),
            )
            .await
    }

    /// Create or refresh one relationship
    ///
    /// Repeating an identical request only bumps `updated_at`.
    pub async fn assign_mentor(&self, request: &AssignmentRequest) -> Result<MentorMenteeRelationship> {
        let prepared = self.prepare(request, &HashMap::new()).await?;
        self.store
            .write_batch(&assignment_writes(&prepared)?)
            .await?;
        self.record_snapshot(&prepared).await;

        info!(
            mentor = %request.mentor_id,
            mentee = %request.mentee_id,
            session = %request.session,
            semester = %request.current_semester,
            "Mentor assigned"
        );
        Ok(prepared.relationship)
    }

    /// Assign many rows; invalid rows are reported, valid rows are written in
    /// one transaction
    ///
    /// Only a storage failure returns `Err`, and then nothing from the batch
    /// was written.
    pub async fn bulk_assign(&self, requests: &[AssignmentRequest]) -> Result<BulkAssignReport> {
        let mut report = BulkAssignReport::default();
        let mut prepared = Vec::new();
        // mentee → (mentor, year, semester) accepted earlier in this batch
        let mut claimed: HashMap<MujId, (MujId, AcademicYear, SemesterNumber)> = HashMap::new();

        for (row, request) in requests.iter().enumerate() {
            match self.prepare(request, &claimed).await {
                Ok(p) => {
                    claimed.insert(
                        request.mentee_id.clone(),
                        (request.mentor_id.clone(), request.session, request.current_semester),
                    );
                    prepared.push(p);
                }
                Err(e) if e.is_storage_failure() => return Err(e),
                Err(e) => {
                    debug!(row, error = %e, "Bulk assignment row rejected");
                    report.errors.push(RowError {
                        row,
                        identifier: offending_identifier(request, &e),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut writes = Vec::with_capacity(prepared.len() * 2);
        for p in &prepared {
            writes.extend(assignment_writes(p)?);
        }
        self.store.write_batch(&writes).await?;

        for p in &prepared {
            self.record_snapshot(p).await;
        }

        info!(
            rows = requests.len(),
            persisted = prepared.len(),
            rejected = report.errors.len(),
            "Bulk assignment finished"
        );
        report.persisted = prepared.into_iter().map(|p| p.relationship).collect();
        Ok(report)
    }

    async fn prepare(
        &self,
        request: &AssignmentRequest,
        claimed: &HashMap<MujId, (MujId, AcademicYear, SemesterNumber)>,
    ) -> Result<PreparedAssignment> {
        if !request.section.is_relationship_section() {
            return Err(Error::Validation(format!(
                "section {} is outside A-E",
                request.section
            )));
        }

        self.people.require_mentor(&request.mentor_id).await?;
        let mentee = self.people.require_mentee(&request.mentee_id).await?;

        if let Some((mentor, year, semester)) = claimed.get(&request.mentee_id) {
            if *mentor != request.mentor_id && *year == request.session && *semester == request.current_semester {
                return Err(conflict(request, mentor));
            }
        }
        let existing = self.relationships_for_mentee(&request.mentee_id).await?;
        if let Some(other) = existing.iter().find(|r| {
            r.mentor_muj_id != request.mentor_id
                && r.session == request.session
                && r.current_semester == request.current_semester
        }) {
            return Err(conflict(request, &other.mentor_muj_id));
        }

        let section = self
            .tree
            .resolve_section(
                request.session,
                request.academic_session(),
                request.current_semester,
                request.section,
                None,
            )
            .await?;

        let now = time::now();
        let previous = existing.into_iter().find(|r| r.mentor_muj_id == request.mentor_id);
        let relationship = MentorMenteeRelationship {
            mentor_muj_id: request.mentor_id.clone(),
            mentee_muj_id: request.mentee_id.clone(),
            session: request.session,
            current_semester: request.current_semester,
            section: request.section,
            academic_session: AcademicSessionYear::key_for(request.session.start()),
            completed_meetings: previous
                .as_ref()
                .map(|r| r.completed_meetings.clone())
                .unwrap_or_default(),
            created_at: previous.as_ref().map_or(now, |r| r.created_at),
            updated_at: now,
        };

        Ok(PreparedAssignment {
            relationship,
            mentee,
            section,
        })
    }

    /// Add the mentee snapshot to the section node
    ///
    /// The relationship is already committed at this point; a failure here is
    /// logged and left for the next assignment of the same mentee.
    async fn record_snapshot(&self, prepared: &PreparedAssignment) {
        let relationship = &prepared.relationship;
        let snapshot = MenteeAssignment {
            mentee_id: prepared.mentee.muj_id.clone(),
            name: prepared.mentee.name.clone(),
            email: prepared.mentee.email.clone(),
            phone: prepared.mentee.phone.clone(),
            mentor_id: relationship.mentor_muj_id.clone(),
            parents: prepared.mentee.parents.clone(),
            assigned_at: relationship.updated_at,
        };

        match self.tree.add_mentee_assignment(&prepared.section, &snapshot).await {
            Ok(true) => debug!(mentee = %snapshot.mentee_id, "Mentee snapshot added to section"),
            Ok(false) => {}
            Err(e) => warn!(
                mentee = %snapshot.mentee_id,
                error = %e,
                "Failed to add mentee snapshot to section"
            ),
        }
    }
}

/// Relationship upsert plus the matching mentee roster fields
fn assignment_writes(prepared: &PreparedAssignment) -> Result<Vec<WriteOp>> {
    let relationship = &prepared.relationship;
    Ok(vec![
        WriteOp::Upsert {
            collection: Collection::MentorMenteeRelationships,
            key: relationship.key(),
            body: serde_json::to_value(relationship)?,
        },
        WriteOp::SetFields {
            collection: Collection::Mentees,
            key: relationship.mentee_muj_id.to_string(),
            fields: vec![
                ("$.mentorMujid".to_string(), json!(relationship.mentor_muj_id)),
                ("$.semester".to_string(), json!(relationship.current_semester)),
                ("$.section".to_string(), json!(relationship.section)),
                ("$.academicYear".to_string(), json!(relationship.session)),
                (
                    "$.academicSession".to_string(),
                    json!(relationship.session.session_for(relationship.current_semester)),
                ),
            ],
        },
    ])
}

fn conflict(request: &AssignmentRequest, other_mentor: &MujId) -> Error {
    Error::Conflict(format!(
        "mentee {} is already assigned to mentor {} for {} semester {}",
        request.mentee_id, other_mentor, request.session, request.current_semester
    ))
}

fn offending_identifier(request: &AssignmentRequest, error: &Error) -> String {
    match error {
        Error::NotFound(what) if what.starts_with("mentor ") => request.mentor_id.to_string(),
        Error::NotFound(_) | Error::Conflict(_) => request.mentee_id.to_string(),
        _ => MentorMenteeRelationship::key_for(&request.mentor_id, &request.mentee_id),
    }
}

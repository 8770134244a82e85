//! Operations exposed to the request layer
//!
//! [`Mentorship`] wires the services over one shared [`DocumentStore`]. Writes
//! that change a roster trigger an explicit resync of the affected mentors'
//! logs before returning; nothing is synchronised by a hidden hook.

use crate::models::{
    AcademicYear, CompletedMeeting, Meeting, MeetingNotes, MeetingStatus, MeetingTime, MentorMeetingLog,
    MentorMenteeRelationship, MenteeAssignment, IndividualMeeting, MujId, ScheduledAt, SectionLetter,
    SemesterNumber, SessionName, TermDates,
};
use crate::services::aggregation::{
    AggregationEngine, AttendanceSummary, MeetingStats, MeetingWithAttendance, MentorMeetings,
};
use crate::services::academic_tree::AcademicSessionTree;
use crate::services::archival::{ArchivalEngine, ArchiveFilter, ArchiveReport};
use crate::services::assignment::{AssignmentRequest, BulkAssignReport, RelationshipAssignmentService};
use crate::services::meeting_log::{MeetingLogService, NewLogMeeting};
use crate::services::people::PeopleDirectory;
use crate::services::roster::{compute_eligible_mentees, RosterScope};
use crate::services::sync_engine::{SyncEngine, SyncReport};
use chrono::NaiveDate;
use mms_common::config::MmsConfig;
use mms_common::db::{init_database, Collection, DocumentStore};
use mms_common::events::{EventBus, MmsEvent};
use mms_common::{time, Error, Result};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::path::Path;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Caller-supplied part of a new meeting
#[derive(Debug, Clone, Deserialize)]
pub struct MeetingPayload {
    /// Generated when absent
    #[serde(default)]
    pub meeting_id: Option<String>,
    pub meeting_date: NaiveDate,
    pub meeting_time: MeetingTime,
    #[serde(default)]
    pub meeting_notes: MeetingNotes,
    /// Defaults to the moment of scheduling
    #[serde(rename = "scheduledAT", default)]
    pub scheduled_at: Option<ScheduledAt>,
    /// Semester dates used if the semester node does not exist yet
    #[serde(default)]
    pub term_dates: Option<TermDates>,
}

/// Entry point for route handlers
#[derive(Debug, Clone)]
pub struct Mentorship {
    store: DocumentStore,
    events: EventBus,
    people: PeopleDirectory,
    tree: AcademicSessionTree,
    logs: MeetingLogService,
    sync: SyncEngine,
    aggregation: AggregationEngine,
    assignment: RelationshipAssignmentService,
    archival: ArchivalEngine,
}

impl Mentorship {
    pub fn new(store: DocumentStore, config: &MmsConfig) -> Self {
        Self {
            events: EventBus::default(),
            people: PeopleDirectory::new(store.clone()),
            tree: AcademicSessionTree::new(store.clone()),
            logs: MeetingLogService::new(store.clone()),
            sync: SyncEngine::new(store.clone(), &config.sync),
            aggregation: AggregationEngine::new(store.clone()),
            assignment: RelationshipAssignmentService::new(store.clone()),
            archival: ArchivalEngine::new(store.clone()),
            store,
        }
    }

    /// Open (or create) the database at `db_path` and build the services
    pub async fn open(db_path: &Path, config: &MmsConfig) -> Result<Self> {
        let pool = init_database(db_path, &config.store).await?;
        let store = DocumentStore::new(pool, config.store.max_lock_wait_ms);
        Ok(Self::new(store, config))
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn people(&self) -> &PeopleDirectory {
        &self.people
    }

    pub fn tree(&self) -> &AcademicSessionTree {
        &self.tree
    }

    pub fn logs(&self) -> &MeetingLogService {
        &self.logs
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MmsEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Meetings
    // ------------------------------------------------------------------

    /// Schedule a meeting for one section; returns the meeting id
    ///
    /// The meeting lands in the session tree first and in the mentor's log
    /// second, both stamped with the same eligible mentee set read once.
    pub async fn schedule_meeting(
        &self,
        mentor_id: &MujId,
        academic_year: AcademicYear,
        academic_session: SessionName,
        semester: SemesterNumber,
        section: SectionLetter,
        payload: MeetingPayload,
    ) -> Result<String> {
        let meeting_id = match payload.meeting_id {
            Some(id) if id.trim().is_empty() => {
                return Err(Error::Validation("meeting_id must not be empty".to_string()));
            }
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };

        self.people.require_mentor(mentor_id).await?;
        let section_ref = self
            .tree
            .resolve_section(academic_year, academic_session, semester, section, payload.term_dates)
            .await?;
        let log = self
            .logs
            .find_or_create(mentor_id, academic_year, academic_session)
            .await?;
        // Meeting ids are looked up without a mentor, so they must be unique across logs
        if self.logs.meeting_id_taken(&meeting_id).await? {
            return Err(Error::Conflict(format!("meeting {} already exists", meeting_id)));
        }

        let sections = vec![section];
        let mentee_ids = compute_eligible_mentees(
            &self.people,
            &RosterScope {
                mentor: mentor_id,
                academic_year: &academic_year,
                academic_session: &academic_session,
                semester,
                sections: &sections,
            },
        )
        .await?;

        let now = time::now();
        let scheduled_at = match payload.scheduled_at {
            Some(at) => at,
            None => ScheduledAt {
                schedule_date: now.date_naive(),
                schedule_time: MeetingTime::parse(&now.format("%I:%M %p").to_string())?,
            },
        };
        let meeting = Meeting {
            meeting_id: meeting_id.clone(),
            mentor_id: mentor_id.clone(),
            mentee_ids,
            meeting_date: payload.meeting_date,
            meeting_time: payload.meeting_time,
            meeting_notes: payload.meeting_notes,
            scheduled_at,
            status: MeetingStatus::Scheduled,
            created_at: now,
            updated_at: now,
        };

        self.tree.add_meeting(&section_ref, &meeting).await?;
        let entry = self
            .logs
            .append_stamped(
                &log,
                NewLogMeeting {
                    meeting,
                    semester,
                    sections,
                },
            )
            .await?;

        info!(
            mentor = %mentor_id,
            meeting_id = %meeting_id,
            session = %academic_session,
            semester = %semester,
            section = %section,
            mentees = entry.meeting.mentee_ids.len(),
            "Meeting scheduled"
        );
        self.events.emit_lossy(MmsEvent::MeetingScheduled {
            mentor_id: mentor_id.to_string(),
            meeting_id: meeting_id.clone(),
            academic_year: academic_year.to_string(),
            academic_session: academic_session.to_string(),
            semester: semester.get(),
            mentee_count: entry.meeting.mentee_ids.len(),
            timestamp: now,
        });
        Ok(meeting_id)
    }

    /// Meetings of one semester from the mentor's log
    pub async fn meetings_for_semester(
        &self,
        mentor_id: &MujId,
        academic_year: AcademicYear,
        academic_session: SessionName,
        semester: SemesterNumber,
    ) -> Result<Vec<IndividualMeeting>> {
        let key = MentorMeetingLog::key_for(mentor_id, &academic_year, &academic_session);
        self.logs.get_by_semester(&key, semester).await
    }

    /// Record attendance and complete the meeting
    ///
    /// The log is authoritative. The tree copy and each present mentee's
    /// relationship are updated afterwards; failures there are logged only.
    pub async fn record_attendance(
        &self,
        mentor_id: &MujId,
        academic_year: AcademicYear,
        academic_session: SessionName,
        meeting_id: &str,
        present: &[MujId],
    ) -> Result<AttendanceSummary> {
        let key = MentorMeetingLog::key_for(mentor_id, &academic_year, &academic_session);
        let entry = self.logs.record_attendance(&key, meeting_id, present).await?;

        match self
            .tree
            .update_meeting(
                academic_session,
                entry.semester,
                meeting_id,
                &[
                    ("status", json!(MeetingStatus::Completed)),
                    ("updated_at", json!(entry.meeting.updated_at)),
                ],
            )
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!(meeting_id, "No tree copy of meeting to complete"),
            Err(e) => warn!(meeting_id, error = %e, "Failed to complete tree copy of meeting"),
        }

        let completed = CompletedMeeting {
            meeting_id: meeting_id.to_string(),
            meeting_date: entry.meeting.meeting_date,
        };
        for mentee in &entry.present_mentees {
            let result = self
                .store
                .push_unique_at_path(
                    Collection::MentorMenteeRelationships,
                    &MentorMenteeRelationship::key_for(mentor_id, mentee),
                    "$.completed_meetings",
                    "$.meeting_id",
                    &json!(meeting_id),
                    &completed,
                    None,
                )
                .await;
            match result {
                Ok(_) => {}
                Err(Error::NotFound(_)) => {
                    debug!(mentor = %mentor_id, mentee = %mentee, "No relationship to record meeting against")
                }
                Err(e) => warn!(mentee = %mentee, error = %e, "Failed to record completed meeting"),
            }
        }

        let summary = AttendanceSummary::of(&entry);
        self.events.emit_lossy(MmsEvent::AttendanceRecorded {
            mentor_id: mentor_id.to_string(),
            meeting_id: meeting_id.to_string(),
            present: summary.present,
            total: summary.total,
            timestamp: time::now(),
        });
        Ok(summary)
    }

    pub async fn record_emails_sent(
        &self,
        mentor_id: &MujId,
        academic_year: AcademicYear,
        academic_session: SessionName,
        meeting_id: &str,
        count: u32,
    ) -> Result<()> {
        let key = MentorMeetingLog::key_for(mentor_id, &academic_year, &academic_session);
        self.logs.record_emails_sent(&key, meeting_id, count).await
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    pub async fn get_mentors_with_meetings(
        &self,
        academic_year: AcademicYear,
        academic_session: SessionName,
        semester: Option<SemesterNumber>,
        section: Option<SectionLetter>,
    ) -> Result<Vec<MentorMeetings>> {
        self.aggregation
            .get_mentors_with_meetings(academic_year, academic_session, semester, section)
            .await
    }

    pub async fn get_mentee_meeting_stats(&self, mentee_id: &MujId) -> Result<MeetingStats> {
        self.aggregation.get_mentee_meeting_stats(mentee_id).await
    }

    pub async fn get_attendance(&self, meeting_id: &str) -> Result<AttendanceSummary> {
        self.aggregation.get_attendance(meeting_id).await
    }

    pub async fn get_mentor_report(
        &self,
        mentor_id: &MujId,
        academic_year: AcademicYear,
        academic_session: SessionName,
        semester: SemesterNumber,
    ) -> Result<Vec<MeetingWithAttendance>> {
        self.aggregation
            .get_mentor_report(mentor_id, academic_year, academic_session, semester)
            .await
    }

    pub async fn get_section_roster(
        &self,
        academic_year: AcademicYear,
        academic_session: SessionName,
        semester: SemesterNumber,
        section: SectionLetter,
    ) -> Result<Vec<MenteeAssignment>> {
        self.aggregation
            .get_section_roster(academic_year, academic_session, semester, section)
            .await
    }

    pub async fn get_semester_roster(
        &self,
        academic_year: AcademicYear,
        academic_session: SessionName,
        semester: SemesterNumber,
    ) -> Result<Vec<MenteeAssignment>> {
        self.aggregation
            .get_semester_roster(academic_year, academic_session, semester)
            .await
    }

    // ------------------------------------------------------------------
    // Assignment
    // ------------------------------------------------------------------

    /// Assign a mentor, then resync the logs of every mentor whose roster changed
    pub async fn assign_mentor(&self, request: &AssignmentRequest) -> Result<MentorMenteeRelationship> {
        let mut affected = self.previous_mentors(std::slice::from_ref(request)).await?;
        let relationship = self.assignment.assign_mentor(request).await?;

        affected.insert(request.mentor_id.clone());
        self.resync_mentors(&affected).await;
        self.events.emit_lossy(MmsEvent::RelationshipAssigned {
            mentor_id: relationship.mentor_muj_id.to_string(),
            mentee_id: relationship.mentee_muj_id.to_string(),
            timestamp: relationship.updated_at,
        });
        Ok(relationship)
    }

    pub async fn bulk_assign(&self, requests: &[AssignmentRequest]) -> Result<BulkAssignReport> {
        let mut affected = self.previous_mentors(requests).await?;
        let report = self.assignment.bulk_assign(requests).await?;

        for relationship in &report.persisted {
            affected.insert(relationship.mentor_muj_id.clone());
            self.events.emit_lossy(MmsEvent::RelationshipAssigned {
                mentor_id: relationship.mentor_muj_id.to_string(),
                mentee_id: relationship.mentee_muj_id.to_string(),
                timestamp: relationship.updated_at,
            });
        }
        self.resync_mentors(&affected).await;
        Ok(report)
    }

    /// Current mentors of the mentees named in `requests`
    async fn previous_mentors(&self, requests: &[AssignmentRequest]) -> Result<BTreeSet<MujId>> {
        let mut mentors = BTreeSet::new();
        for request in requests {
            if let Some(mentee) = self.people.get_mentee(&request.mentee_id).await? {
                mentors.extend(mentee.mentor_mujid);
            }
        }
        Ok(mentors)
    }

    async fn resync_mentors(&self, mentors: &BTreeSet<MujId>) {
        for mentor in mentors {
            if let Err(e) = self.sync_mentor(mentor).await {
                warn!(mentor = %mentor, error = %e, "Resync after assignment failed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Sync and archival
    // ------------------------------------------------------------------

    pub async fn sync_log(&self, key: &str) -> Result<SyncReport> {
        let report = self.sync.sync_log(key).await?;
        self.emit_synced(&report);
        Ok(report)
    }

    pub async fn sync_mentor(&self, mentor_id: &MujId) -> Result<Vec<SyncReport>> {
        let reports = self.sync.sync_mentor(mentor_id).await?;
        for report in &reports {
            self.emit_synced(report);
        }
        Ok(reports)
    }

    fn emit_synced(&self, report: &SyncReport) {
        self.events.emit_lossy(MmsEvent::LogSynced {
            mentor_id: report.mentor_id.to_string(),
            academic_year: report.academic_year.to_string(),
            academic_session: report.academic_session.to_string(),
            updated: report.updated,
            failed: report.failed.len(),
            timestamp: time::now(),
        });
    }

    pub async fn archive(&self, filter: &ArchiveFilter, cancel: &CancellationToken) -> Result<ArchiveReport> {
        let report = self.archival.archive(filter, cancel).await?;
        self.events.emit_lossy(MmsEvent::ArchivalCompleted {
            moved: report.moved_count,
            not_moved: report.not_moved.len(),
            interrupted: report.interrupted,
            timestamp: time::now(),
        });
        Ok(report)
    }
}

//! Log re-projection from the roster
//!
//! `sync_log` recomputes `mentee_ids` for every meeting of a log from the
//! current mentee records. It never touches `present_mentees`. A meeting that
//! cannot be resynced is logged and reported; the remaining meetings of the
//! log are still processed.

use crate::models::{AcademicYear, IndividualMeeting, MentorMeetingLog, MujId, SessionName};
use crate::services::academic_tree::AcademicSessionTree;
use crate::services::meeting_log::MeetingLogService;
use crate::services::people::PeopleDirectory;
use crate::services::roster::{compute_eligible_mentees, RosterScope};
use mms_common::config::SyncConfig;
use mms_common::db::{Collection, DocumentStore, PathGuard};
use mms_common::{time, Error, Result};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One meeting that could not be resynced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub meeting_id: String,
    pub reason: String,
}

/// Outcome of one `sync_log` run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub log_key: String,
    pub mentor_id: MujId,
    pub academic_year: AcademicYear,
    pub academic_session: SessionName,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: Vec<SyncFailure>,
}

#[derive(Debug, Clone)]
pub struct SyncEngine {
    store: DocumentStore,
    people: PeopleDirectory,
    tree: AcademicSessionTree,
    logs: MeetingLogService,
    roster_timeout: Duration,
}

impl SyncEngine {
    pub fn new(store: DocumentStore, config: &SyncConfig) -> Self {
        Self {
            people: PeopleDirectory::new(store.clone()),
            tree: AcademicSessionTree::new(store.clone()),
            logs: MeetingLogService::new(store.clone()),
            roster_timeout: Duration::from_millis(config.roster_lookup_timeout_ms),
            store,
        }
    }

    /// Resync the log stored under `key`
    pub async fn sync_log(&self, key: &str) -> Result<SyncReport> {
        let log = self
            .logs
            .get(key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("meeting log {}", key)))?;
        Ok(self.sync_loaded(&log).await)
    }

    /// Resync every log of `mentor`
    pub async fn sync_mentor(&self, mentor: &MujId) -> Result<Vec<SyncReport>> {
        let logs = self.logs.logs_for_mentor(mentor).await?;
        let mut reports = Vec::with_capacity(logs.len());
        for log in &logs {
            reports.push(self.sync_loaded(log).await);
        }
        Ok(reports)
    }

    async fn sync_loaded(&self, log: &MentorMeetingLog) -> SyncReport {
        let key = log.key();
        let mut report = SyncReport {
            log_key: key.clone(),
            mentor_id: log.mentor_muj_id.clone(),
            academic_year: log.academic_details.academic_year,
            academic_session: log.academic_details.academic_session,
            updated: 0,
            unchanged: 0,
            failed: Vec::new(),
        };

        for (index, meeting) in log.meetings.iter().enumerate() {
            match self.sync_meeting(log, &key, index, meeting).await {
                Ok(true) => report.updated += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    warn!(
                        log = %key,
                        meeting_id = %meeting.meeting.meeting_id,
                        error = %e,
                        "Meeting resync failed, continuing with the rest of the log"
                    );
                    report.failed.push(SyncFailure {
                        meeting_id: meeting.meeting.meeting_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            log = %key,
            updated = report.updated,
            unchanged = report.unchanged,
            failed = report.failed.len(),
            "Meeting log synced"
        );
        report
    }

    /// Returns whether the stored roster changed
    async fn sync_meeting(
        &self,
        log: &MentorMeetingLog,
        key: &str,
        index: usize,
        entry: &IndividualMeeting,
    ) -> Result<bool> {
        let details = log.academic_details;
        let meeting_id = entry.meeting.meeting_id.as_str();

        if !details.academic_session.term().accepts(entry.semester) {
            return Err(Error::Sync(format!(
                "semester {} is outside session {}",
                entry.semester, details.academic_session
            )));
        }

        let scope = RosterScope {
            mentor: &log.mentor_muj_id,
            academic_year: &details.academic_year,
            academic_session: &details.academic_session,
            semester: entry.semester,
            sections: &entry.sections,
        };
        let eligible = tokio::time::timeout(self.roster_timeout, compute_eligible_mentees(&self.people, &scope))
            .await
            .map_err(|_| {
                Error::Sync(format!(
                    "roster lookup timed out after {} ms",
                    self.roster_timeout.as_millis()
                ))
            })??;

        if eligible == entry.meeting.mentee_ids {
            return Ok(false);
        }

        let path = MentorMeetingLog::meeting_path(index);
        let now = time::now();
        let fields = vec![
            (format!("{}.mentee_ids", path), json!(eligible)),
            (format!("{}.updated_at", path), json!(now)),
        ];
        let guard = PathGuard::new(format!("{}.meeting_id", path), meeting_id);
        let applied = self
            .store
            .set_at_paths(Collection::MentorMeetingLogs, key, &fields, Some(&guard))
            .await?;
        if !applied {
            return Err(Error::Sync(format!("meeting {} moved or vanished during sync", meeting_id)));
        }

        // The log is already committed; a stale tree copy is repaired by the next sync
        match self
            .tree
            .update_meeting(
                details.academic_session,
                entry.semester,
                meeting_id,
                &[("mentee_ids", json!(eligible)), ("updated_at", json!(now))],
            )
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!(meeting_id, "No tree copy of meeting to resync"),
            Err(e) => warn!(
                log = %key,
                meeting_id,
                error = %e,
                "Log roster updated but tree copy resync failed"
            ),
        }

        debug!(
            log = %key,
            meeting_id,
            before = entry.meeting.mentee_ids.len(),
            after = eligible.len(),
            "Meeting roster updated"
        );
        Ok(true)
    }
}

//! Per-mentor meeting log
//!
//! Found-or-created per (mentor, academic year, academic session). Meetings
//! are appended with their eligible mentee set already stamped; later roster
//! changes only reach the log through the sync engine.

use crate::models::{
    AcademicYear, IndividualMeeting, Meeting, MeetingStatus, MentorMeetingLog, MujId, SectionLetter,
    SemesterNumber, SessionName,
};
use crate::services::people::PeopleDirectory;
use crate::services::roster::{compute_eligible_mentees, RosterScope};
use mms_common::db::{Collection, DocumentStore, PathGuard};
use mms_common::{time, Error, Result};
use serde_json::json;
use std::collections::HashSet;
use tracing::{debug, info};

/// Meeting to append to a log
#[derive(Debug, Clone)]
pub struct NewLogMeeting {
    pub meeting: Meeting,
    pub semester: SemesterNumber,
    pub sections: Vec<SectionLetter>,
}

#[derive(Debug, Clone)]
pub struct MeetingLogService {
    store: DocumentStore,
    people: PeopleDirectory,
}

impl MeetingLogService {
    pub fn new(store: DocumentStore) -> Self {
        Self {
            people: PeopleDirectory::new(store.clone()),
            store,
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<MentorMeetingLog>> {
        self.store.find(Collection::MentorMeetingLogs, key).await
    }

    async fn require(&self, key: &str) -> Result<MentorMeetingLog> {
        self.get(key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("meeting log {}", key)))
    }

    /// All logs of one mentor, ordered by key
    pub async fn logs_for_mentor(&self, mentor: &MujId) -> Result<Vec<MentorMeetingLog>> {
        self.store
            .find_where(
                Collection::MentorMeetingLogs,
                "$.mentorMUJid",
                &json!(mentor.as_str()),
            )
            .await
    }

    pub async fn all_logs(&self) -> Result<Vec<MentorMeetingLog>> {
        self.store.find_all(Collection::MentorMeetingLogs).await
    }

    /// Whether any mentor's log already holds `meeting_id`
    pub async fn meeting_id_taken(&self, meeting_id: &str) -> Result<bool> {
        self.store
            .exists_in_array(
                Collection::MentorMeetingLogs,
                "$.meetings",
                "$.meeting_id",
                &json!(meeting_id),
            )
            .await
    }

    pub async fn find_or_create(
        &self,
        mentor: &MujId,
        academic_year: AcademicYear,
        academic_session: SessionName,
    ) -> Result<MentorMeetingLog> {
        if academic_session.academic_year() != academic_year {
            return Err(Error::Validation(format!(
                "session {} does not belong to academic year {}",
                academic_session, academic_year
            )));
        }

        let key = MentorMeetingLog::key_for(mentor, &academic_year, &academic_session);
        let log = MentorMeetingLog::new(mentor.clone(), academic_year, academic_session);
        if self
            .store
            .insert_if_absent(Collection::MentorMeetingLogs, &key, &log)
            .await?
        {
            info!(log = %key, "Created mentor meeting log");
        }

        self.require(&key).await
    }

    /// Stamp the eligible mentee set onto `new` and append it to `log`
    ///
    /// A `meeting_id` already present in the log is a conflict.
    pub async fn add_meeting(&self, log: &MentorMeetingLog, mut new: NewLogMeeting) -> Result<IndividualMeeting> {
        let details = log.academic_details;
        let eligible = compute_eligible_mentees(
            &self.people,
            &RosterScope {
                mentor: &log.mentor_muj_id,
                academic_year: &details.academic_year,
                academic_session: &details.academic_session,
                semester: new.semester,
                sections: &new.sections,
            },
        )
        .await?;

        new.meeting.mentee_ids = eligible;
        self.append_stamped(log, new).await
    }

    /// Append a meeting whose `mentee_ids` the caller already resolved
    ///
    /// Lets a caller writing the same meeting elsewhere stamp both copies from
    /// one roster read.
    pub async fn append_stamped(&self, log: &MentorMeetingLog, new: NewLogMeeting) -> Result<IndividualMeeting> {
        let entry = IndividualMeeting {
            meeting: new.meeting,
            semester: new.semester,
            sections: new.sections,
            present_mentees: Vec::new(),
            is_report_filled: false,
            emails_sent_count: 0,
        };

        let key = log.key();
        let appended = self
            .store
            .push_unique_at_path(
                Collection::MentorMeetingLogs,
                &key,
                "$.meetings",
                "$.meeting_id",
                &json!(entry.meeting.meeting_id),
                &entry,
                None,
            )
            .await?;
        if !appended {
            return Err(Error::Conflict(format!(
                "meeting {} already exists in log {}",
                entry.meeting.meeting_id, key
            )));
        }

        debug!(
            log = %key,
            meeting_id = %entry.meeting.meeting_id,
            mentees = entry.meeting.mentee_ids.len(),
            "Meeting appended to log"
        );
        Ok(entry)
    }

    pub async fn get_by_semester(&self, key: &str, semester: SemesterNumber) -> Result<Vec<IndividualMeeting>> {
        let log = self.require(key).await?;
        Ok(log
            .meetings
            .into_iter()
            .filter(|m| m.semester == semester)
            .collect())
    }

    /// Record who attended; marks the meeting completed and its report filled
    ///
    /// Every present mentee must be on the meeting's current roster.
    pub async fn record_attendance(
        &self,
        key: &str,
        meeting_id: &str,
        present: &[MujId],
    ) -> Result<IndividualMeeting> {
        let log = self.require(key).await?;
        let (index, current) = log
            .meeting(meeting_id)
            .ok_or_else(|| Error::NotFound(format!("meeting {} in log {}", meeting_id, key)))?;

        let roster: HashSet<&MujId> = current.meeting.mentee_ids.iter().collect();
        if let Some(stranger) = present.iter().find(|id| !roster.contains(id)) {
            return Err(Error::Validation(format!(
                "{} is not on the roster of meeting {}",
                stranger, meeting_id
            )));
        }

        let mut present_mentees = present.to_vec();
        present_mentees.sort();
        present_mentees.dedup();

        let path = MentorMeetingLog::meeting_path(index);
        let now = time::now();
        let fields = vec![
            (format!("{}.present_mentees", path), json!(present_mentees)),
            (format!("{}.isReportFilled", path), json!(true)),
            (format!("{}.status", path), json!(MeetingStatus::Completed)),
            (format!("{}.updated_at", path), json!(now)),
        ];
        let guard = PathGuard::new(format!("{}.meeting_id", path), meeting_id);

        let applied = self
            .store
            .set_at_paths(Collection::MentorMeetingLogs, key, &fields, Some(&guard))
            .await?;
        if !applied {
            return Err(Error::NotFound(format!("meeting {} in log {}", meeting_id, key)));
        }

        let mut updated = current.clone();
        updated.present_mentees = present_mentees;
        updated.is_report_filled = true;
        updated.meeting.status = MeetingStatus::Completed;
        updated.meeting.updated_at = now;
        Ok(updated)
    }

    /// Add `count` to the meeting's sent-email counter
    pub async fn record_emails_sent(&self, key: &str, meeting_id: &str, count: u32) -> Result<()> {
        let log = self.require(key).await?;
        let (index, _) = log
            .meeting(meeting_id)
            .ok_or_else(|| Error::NotFound(format!("meeting {} in log {}", meeting_id, key)))?;

        let path = MentorMeetingLog::meeting_path(index);
        let guard = PathGuard::new(format!("{}.meeting_id", path), meeting_id);
        let applied = self
            .store
            .increment_at_path(
                Collection::MentorMeetingLogs,
                key,
                &format!("{}.emailsSentCount", path),
                i64::from(count),
                Some(&guard),
            )
            .await?;

        if !applied {
            return Err(Error::NotFound(format!("meeting {} in log {}", meeting_id, key)));
        }
        Ok(())
    }
}

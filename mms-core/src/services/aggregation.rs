//! Read-only reporting over the session tree and the meeting logs
//!
//! Everything here is a flatten-then-group traversal in Rust over documents
//! loaded from the store. Outputs are sorted on explicit keys so repeated
//! calls over the same documents return identical results.

use crate::models::{
    AcademicSessionYear, AcademicYear, IndividualMeeting, Meeting, MeetingStatus, MenteeAssignment,
    MentorMeetingLog, MujId, SectionLetter, Semester, SemesterNumber, SessionName,
};
use crate::services::academic_tree::AcademicSessionTree;
use crate::services::meeting_log::MeetingLogService;
use crate::services::people::PeopleDirectory;
use mms_common::db::DocumentStore;
use mms_common::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Attendance of one meeting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub total: usize,
    pub present: usize,
    pub percentage: u32,
}

impl AttendanceSummary {
    /// `percentage` is `round(100 * present / total)`, and 0 for an empty roster
    pub fn of(meeting: &IndividualMeeting) -> Self {
        let total = meeting.meeting.mentee_ids.len();
        let present = meeting.present_mentees.len();
        let percentage = if total == 0 {
            0
        } else {
            (100.0 * present as f64 / total as f64).round() as u32
        };
        Self {
            total,
            present,
            percentage,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MeetingStats {
    pub total: usize,
    pub completed: usize,
    pub scheduled: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MentorMeetings {
    pub mentor_id: MujId,
    pub meeting_count: usize,
    pub meetings: Vec<Meeting>,
}

/// A present mentee, annotated for a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportAttendee {
    pub mentee_id: MujId,
    pub name: Option<String>,
    pub email: Option<String>,
    /// Meetings of the same report this mentee attended
    pub attended_in_report: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeetingWithAttendance {
    pub meeting: IndividualMeeting,
    pub attendance: AttendanceSummary,
    pub attendees: Vec<ReportAttendee>,
}

#[derive(Debug, Clone)]
pub struct AggregationEngine {
    tree: AcademicSessionTree,
    logs: MeetingLogService,
    people: PeopleDirectory,
}

impl AggregationEngine {
    pub fn new(store: DocumentStore) -> Self {
        Self {
            tree: AcademicSessionTree::new(store.clone()),
            logs: MeetingLogService::new(store.clone()),
            people: PeopleDirectory::new(store),
        }
    }

    /// Attendance of the first logged meeting with this id
    pub async fn get_attendance(&self, meeting_id: &str) -> Result<AttendanceSummary> {
        self.logs
            .all_logs()
            .await?
            .iter()
            .find_map(|log| log.meeting(meeting_id).map(|(_, m)| AttendanceSummary::of(m)))
            .ok_or_else(|| Error::NotFound(format!("meeting {}", meeting_id)))
    }

    /// Count tree meetings whose roster includes `mentee`, by status
    pub async fn get_mentee_meeting_stats(&self, mentee: &MujId) -> Result<MeetingStats> {
        let years = self.tree.all_years().await?;
        let mut stats = MeetingStats::default();

        for meeting in years.iter().flat_map(tree_meetings) {
            if !meeting.mentee_ids.contains(mentee) {
                continue;
            }
            stats.total += 1;
            match meeting.status {
                MeetingStatus::Completed => stats.completed += 1,
                MeetingStatus::Scheduled => stats.scheduled += 1,
            }
        }
        Ok(stats)
    }

    /// Meetings of one mentor in one semester, with attendance
    ///
    /// Ordered by `(meeting_date, meeting_id)`. Each attendee's count is
    /// relative to the returned meetings only.
    pub async fn get_mentor_report(
        &self,
        mentor: &MujId,
        academic_year: AcademicYear,
        academic_session: SessionName,
        semester: SemesterNumber,
    ) -> Result<Vec<MeetingWithAttendance>> {
        let key = MentorMeetingLog::key_for(mentor, &academic_year, &academic_session);
        let Some(log) = self.logs.get(&key).await? else {
            return Ok(Vec::new());
        };

        let mut meetings: Vec<IndividualMeeting> = log
            .meetings
            .into_iter()
            .filter(|m| m.semester == semester)
            .collect();
        meetings.sort_by(|a, b| {
            (a.meeting.meeting_date, &a.meeting.meeting_id).cmp(&(b.meeting.meeting_date, &b.meeting.meeting_id))
        });

        let mut attended: HashMap<&MujId, usize> = HashMap::new();
        for meeting in &meetings {
            for mentee in &meeting.present_mentees {
                *attended.entry(mentee).or_default() += 1;
            }
        }

        let mut identities = HashMap::new();
        for mentee in attended.keys() {
            if let Some(record) = self.people.get_mentee(mentee).await? {
                identities.insert((*mentee).clone(), record);
            }
        }

        let report = meetings
            .iter()
            .map(|meeting| {
                let attendees = meeting
                    .present_mentees
                    .iter()
                    .map(|id| {
                        let record = identities.get(id);
                        ReportAttendee {
                            mentee_id: id.clone(),
                            name: record.map(|r| r.name.clone()),
                            email: record.map(|r| r.email.clone()),
                            attended_in_report: attended.get(id).copied().unwrap_or_default(),
                        }
                    })
                    .collect();
                MeetingWithAttendance {
                    meeting: meeting.clone(),
                    attendance: AttendanceSummary::of(meeting),
                    attendees,
                }
            })
            .collect();
        Ok(report)
    }

    /// Mentors with at least one meeting under the given scope
    ///
    /// Sorted by mentor id; each mentor's meetings are de-duplicated by
    /// `meeting_id` and ordered by `(meeting_date, meeting_id)`.
    pub async fn get_mentors_with_meetings(
        &self,
        academic_year: AcademicYear,
        academic_session: SessionName,
        semester: Option<SemesterNumber>,
        section: Option<SectionLetter>,
    ) -> Result<Vec<MentorMeetings>> {
        check_session(academic_year, academic_session)?;
        let Some(year) = self.tree.load_year(academic_year.start()).await? else {
            return Ok(Vec::new());
        };
        let Some((_, session)) = year.session(&academic_session) else {
            return Ok(Vec::new());
        };

        let mut grouped: BTreeMap<MujId, BTreeMap<String, Meeting>> = BTreeMap::new();
        let meetings = session
            .semesters
            .iter()
            .filter(|s| semester.map_or(true, |n| s.semester_number == n))
            .flat_map(|s| s.sections.iter())
            .filter(|s| section.map_or(true, |l| s.name == l))
            .flat_map(|s| s.meetings.iter());
        for meeting in meetings {
            grouped
                .entry(meeting.mentor_id.clone())
                .or_default()
                .entry(meeting.meeting_id.clone())
                .or_insert_with(|| meeting.clone());
        }

        Ok(grouped
            .into_iter()
            .map(|(mentor_id, by_id)| {
                let mut meetings: Vec<Meeting> = by_id.into_values().collect();
                meetings.sort_by(|a, b| (a.meeting_date, &a.meeting_id).cmp(&(b.meeting_date, &b.meeting_id)));
                MentorMeetings {
                    mentor_id,
                    meeting_count: meetings.len(),
                    meetings,
                }
            })
            .collect())
    }

    /// Mentee snapshots assigned to one section, by MUJid ascending
    pub async fn get_section_roster(
        &self,
        academic_year: AcademicYear,
        academic_session: SessionName,
        semester: SemesterNumber,
        section: SectionLetter,
    ) -> Result<Vec<MenteeAssignment>> {
        self.semester_roster(academic_year, academic_session, semester, Some(section))
            .await
    }

    /// Mentee snapshots across all sections of a semester, by MUJid ascending
    pub async fn get_semester_roster(
        &self,
        academic_year: AcademicYear,
        academic_session: SessionName,
        semester: SemesterNumber,
    ) -> Result<Vec<MenteeAssignment>> {
        self.semester_roster(academic_year, academic_session, semester, None)
            .await
    }

    async fn semester_roster(
        &self,
        academic_year: AcademicYear,
        academic_session: SessionName,
        semester: SemesterNumber,
        section: Option<SectionLetter>,
    ) -> Result<Vec<MenteeAssignment>> {
        check_session(academic_year, academic_session)?;
        let Some(year) = self.tree.load_year(academic_year.start()).await? else {
            return Ok(Vec::new());
        };
        let Some(semester) = semester_node(&year, &academic_session, semester) else {
            return Ok(Vec::new());
        };

        let mut roster: Vec<MenteeAssignment> = semester
            .sections
            .iter()
            .filter(|s| section.map_or(true, |l| s.name == l))
            .flat_map(|s| s.mentees_assigned.iter().cloned())
            .collect();
        roster.sort_by(|a, b| a.mentee_id.cmp(&b.mentee_id));
        roster.dedup_by(|a, b| a.mentee_id == b.mentee_id);
        Ok(roster)
    }
}

fn check_session(academic_year: AcademicYear, academic_session: SessionName) -> Result<()> {
    if academic_session.academic_year() != academic_year {
        return Err(Error::Validation(format!(
            "session {} does not belong to academic year {}",
            academic_session, academic_year
        )));
    }
    Ok(())
}

fn semester_node<'a>(
    year: &'a AcademicSessionYear,
    session: &SessionName,
    number: SemesterNumber,
) -> Option<&'a Semester> {
    let (_, session) = year.session(session)?;
    session.semester(number).map(|(_, s)| s)
}

fn tree_meetings(year: &AcademicSessionYear) -> impl Iterator<Item = &Meeting> {
    year.sessions
        .iter()
        .flat_map(|s| s.semesters.iter())
        .flat_map(|s| s.sections.iter())
        .flat_map(|s| s.meetings.iter())
}

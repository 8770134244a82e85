//! Core services over the document store

pub mod academic_tree;
pub mod aggregation;
pub mod archival;
pub mod assignment;
pub mod meeting_log;
pub mod people;
pub mod roster;
pub mod sync_engine;

pub use academic_tree::{AcademicSessionTree, SectionRef, SemesterRef, SessionRef};
pub use aggregation::{
    AggregationEngine, AttendanceSummary, MeetingStats, MeetingWithAttendance, MentorMeetings, ReportAttendee,
};
pub use archival::{ArchivalEngine, ArchiveFailure, ArchiveFilter, ArchiveReport};
pub use assignment::{AssignmentRequest, BulkAssignReport, RelationshipAssignmentService, RowError};
pub use meeting_log::{MeetingLogService, NewLogMeeting};
pub use people::PeopleDirectory;
pub use roster::{compute_eligible_mentees, RosterScope};
pub use sync_engine::{SyncEngine, SyncFailure, SyncReport};

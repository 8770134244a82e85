//! Document models
//!
//! Field names follow the persisted document layout, hence the serde renames.

pub mod ids;
pub mod log;
pub mod people;
pub mod relationship;
pub mod tree;

pub use ids::{AcademicYear, MeetingTime, MujId, SectionLetter, SemesterNumber, SessionName, SessionTerm, TermDates};
pub use log::{AcademicDetails, IndividualMeeting, MentorMeetingLog};
pub use mms_common::db::HistoricalData;
pub use people::{Mentee, Mentor};
pub use relationship::{CompletedMeeting, MentorMenteeRelationship};
pub use tree::{
    AcademicSessionYear, Contact, Meeting, MeetingNotes, MeetingStatus, MenteeAssignment, ParentContacts,
    ScheduledAt, Section, Semester, Session, TreePath,
};

//! # MMS Core
//!
//! Mentor-mentee tracking over nested academic calendars:
//! - Academic session tree (year → session → semester → section)
//! - Per-mentor meeting logs kept in step with the roster by the sync engine
//! - Attendance and roster reporting
//! - Relationship assignment, single and bulk
//! - Archival of aged or filtered records into the historical store
//!
//! Route handlers talk to [`Mentorship`].

pub mod models;
pub mod ops;
pub mod services;

pub use mms_common::{Error, Result};
pub use ops::{MeetingPayload, Mentorship};

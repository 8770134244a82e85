//! Validated value types
//!
//! Every identifier and calendar key is checked once, at construction (or
//! deserialization), so a malformed value can never reach a stored document.

use chrono::NaiveDate;
use mms_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Uppercase alphanumeric mentor/mentee identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MujId(String);

impl MujId {
    pub fn parse(raw: &str) -> Result<Self> {
        let valid = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if !valid {
            return Err(Error::Validation(format!(
                "MUJid must be uppercase alphanumeric, got {:?}",
                raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MujId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MujId> for String {
    fn from(id: MujId) -> Self {
        id.0
    }
}

impl FromStr for MujId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for MujId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Single uppercase section letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SectionLetter(char);

impl SectionLetter {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_uppercase() => Ok(Self(c)),
            _ => Err(Error::Validation(format!(
                "section must be a single uppercase letter A-Z, got {:?}",
                raw
            ))),
        }
    }

    pub fn as_char(&self) -> char {
        self.0
    }

    /// Relationship records only admit sections A through E
    pub fn is_relationship_section(&self) -> bool {
        ('A'..='E').contains(&self.0)
    }
}

impl TryFrom<String> for SectionLetter {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SectionLetter> for String {
    fn from(letter: SectionLetter) -> Self {
        letter.0.to_string()
    }
}

impl fmt::Display for SectionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Semester number in `[1, 8]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SemesterNumber(u8);

impl SemesterNumber {
    pub fn new(number: u8) -> Result<Self> {
        if !(1..=8).contains(&number) {
            return Err(Error::Validation(format!(
                "semester must be between 1 and 8, got {}",
                number
            )));
        }
        Ok(Self(number))
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    pub fn is_odd(&self) -> bool {
        self.0 % 2 == 1
    }
}

impl TryFrom<u8> for SemesterNumber {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SemesterNumber> for u8 {
    fn from(n: SemesterNumber) -> Self {
        n.0
    }
}

impl fmt::Display for SemesterNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half of an academic year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionTerm {
    #[serde(rename = "JULY-DECEMBER")]
    JulyDecember,
    #[serde(rename = "JANUARY-JUNE")]
    JanuaryJune,
}

impl SessionTerm {
    pub fn label(&self) -> &'static str {
        match self {
            SessionTerm::JulyDecember => "JULY-DECEMBER",
            SessionTerm::JanuaryJune => "JANUARY-JUNE",
        }
    }

    /// Odd semesters run July-December, even ones January-June
    pub fn accepts(&self, semester: SemesterNumber) -> bool {
        match self {
            SessionTerm::JulyDecember => semester.is_odd(),
            SessionTerm::JanuaryJune => !semester.is_odd(),
        }
    }
}

/// Session name such as `"JULY-DECEMBER 2024"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionName {
    term: SessionTerm,
    year: i32,
}

impl SessionName {
    pub fn new(term: SessionTerm, year: i32) -> Self {
        Self { term, year }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || {
            Error::Validation(format!(
                "session must be \"JULY-DECEMBER <year>\" or \"JANUARY-JUNE <year>\", got {:?}",
                raw
            ))
        };

        let (label, year) = raw.split_once(' ').ok_or_else(invalid)?;
        let term = match label {
            "JULY-DECEMBER" => SessionTerm::JulyDecember,
            "JANUARY-JUNE" => SessionTerm::JanuaryJune,
            _ => return Err(invalid()),
        };
        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let year = year.parse().map_err(|_| invalid())?;

        Ok(Self { term, year })
    }

    pub fn term(&self) -> SessionTerm {
        self.term
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Start year of the academic year this session belongs to
    pub fn academic_start_year(&self) -> i32 {
        match self.term {
            SessionTerm::JulyDecember => self.year,
            SessionTerm::JanuaryJune => self.year - 1,
        }
    }

    pub fn academic_year(&self) -> AcademicYear {
        AcademicYear::starting(self.academic_start_year())
    }

    /// Calendar bounds used when a semester is created without explicit dates
    pub fn default_term_dates(&self) -> TermDates {
        let (start, end) = match self.term {
            SessionTerm::JulyDecember => ((7, 1), (12, 31)),
            SessionTerm::JanuaryJune => ((1, 1), (6, 30)),
        };
        TermDates {
            start_date: calendar_date(self.year, start.0, start.1),
            end_date: calendar_date(self.year, end.0, end.1),
        }
    }
}

fn calendar_date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

impl TryFrom<String> for SessionName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SessionName> for String {
    fn from(name: SessionName) -> Self {
        name.to_string()
    }
}

impl FromStr for SessionName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.term.label(), self.year)
    }
}

/// Academic year such as `"2024-2025"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AcademicYear {
    start: i32,
}

impl AcademicYear {
    pub fn starting(start: i32) -> Self {
        Self { start }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || {
            Error::Validation(format!(
                "academic year must be \"YYYY-YYYY\" with consecutive years, got {:?}",
                raw
            ))
        };

        let (start, end) = raw.split_once('-').ok_or_else(invalid)?;
        let start: i32 = start.parse().map_err(|_| invalid())?;
        let end: i32 = end.parse().map_err(|_| invalid())?;
        if end != start + 1 || !(1000..=9998).contains(&start) {
            return Err(invalid());
        }

        Ok(Self { start })
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.start + 1
    }

    /// The session a semester of this academic year falls in
    pub fn session_for(&self, semester: SemesterNumber) -> SessionName {
        if semester.is_odd() {
            SessionName::new(SessionTerm::JulyDecember, self.start)
        } else {
            SessionName::new(SessionTerm::JanuaryJune, self.start + 1)
        }
    }
}

impl TryFrom<String> for AcademicYear {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<AcademicYear> for String {
    fn from(year: AcademicYear) -> Self {
        year.to_string()
    }
}

impl FromStr for AcademicYear {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end())
    }
}

/// 12-hour clock time `hh:mm AM/PM`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MeetingTime(String);

impl MeetingTime {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || {
            Error::Validation(format!("meeting time must match \"hh:mm AM/PM\", got {:?}", raw))
        };

        let (clock, meridiem) = raw.split_once(' ').ok_or_else(invalid)?;
        if meridiem != "AM" && meridiem != "PM" {
            return Err(invalid());
        }
        let (hours, minutes) = clock.split_once(':').ok_or_else(invalid)?;
        if hours.len() != 2 || minutes.len() != 2 {
            return Err(invalid());
        }
        let hours: u8 = hours.parse().map_err(|_| invalid())?;
        let minutes: u8 = minutes.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&hours) || minutes > 59 {
            return Err(invalid());
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MeetingTime {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MeetingTime> for String {
    fn from(time: MeetingTime) -> Self {
        time.0
    }
}

impl fmt::Display for MeetingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Semester start/end dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermDates {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl TermDates {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self> {
        if end_date < start_date {
            return Err(Error::Validation(format!(
                "semester end date {} precedes start date {}",
                end_date, start_date
            )));
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }
}

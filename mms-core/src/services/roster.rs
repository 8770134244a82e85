//! Eligible mentee computation

use crate::models::{AcademicYear, MujId, SectionLetter, SemesterNumber, SessionName};
use crate::services::people::PeopleDirectory;
use mms_common::Result;

/// Scope of one meeting for roster purposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterScope<'a> {
    pub mentor: &'a MujId,
    pub academic_year: &'a AcademicYear,
    pub academic_session: &'a SessionName,
    pub semester: SemesterNumber,
    pub sections: &'a [SectionLetter],
}

/// Mentees whose mentor, academic year, session and semester match the scope
/// and whose section is one of `sections`, in ascending MUJid order
///
/// Pure function of the current mentee records; calling it twice without an
/// intervening roster write yields the same list.
pub async fn compute_eligible_mentees(people: &PeopleDirectory, scope: &RosterScope<'_>) -> Result<Vec<MujId>> {
    let mut eligible: Vec<MujId> = people
        .mentees_for_mentor(scope.mentor)
        .await?
        .into_iter()
        .filter(|m| {
            m.is_eligible_for(
                scope.mentor,
                scope.academic_year,
                scope.academic_session,
                scope.semester,
                scope.sections,
            )
        })
        .map(|m| m.muj_id)
        .collect();

    eligible.sort();
    eligible.dedup();
    Ok(eligible)
}

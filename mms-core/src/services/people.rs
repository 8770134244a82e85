//! Mentor and mentee record access

use crate::models::{Mentee, Mentor, MujId};
use mms_common::db::{Collection, DocumentStore};
use mms_common::{Error, Result};
use serde_json::Value;
use tracing::debug;

/// Read/write access to the roster authority records
#[derive(Debug, Clone)]
pub struct PeopleDirectory {
    store: DocumentStore,
}

impl PeopleDirectory {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    pub async fn upsert_mentor(&self, mentor: &Mentor) -> Result<()> {
        self.store
            .upsert(Collection::Mentors, mentor.muj_id.as_str(), mentor)
            .await?;
        debug!(mentor = %mentor.muj_id, "Mentor record saved");
        Ok(())
    }

    pub async fn upsert_mentee(&self, mentee: &Mentee) -> Result<()> {
        self.store
            .upsert(Collection::Mentees, mentee.muj_id.as_str(), mentee)
            .await?;
        debug!(mentee = %mentee.muj_id, "Mentee record saved");
        Ok(())
    }

    pub async fn get_mentor(&self, id: &MujId) -> Result<Option<Mentor>> {
        self.store.find(Collection::Mentors, id.as_str()).await
    }

    pub async fn get_mentee(&self, id: &MujId) -> Result<Option<Mentee>> {
        self.store.find(Collection::Mentees, id.as_str()).await
    }

    /// Load a mentor or fail with `NotFound`
    pub async fn require_mentor(&self, id: &MujId) -> Result<Mentor> {
        self.get_mentor(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("mentor {}", id)))
    }

    /// Load a mentee or fail with `NotFound`
    pub async fn require_mentee(&self, id: &MujId) -> Result<Mentee> {
        self.get_mentee(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("mentee {}", id)))
    }

    /// Every mentee currently assigned to `mentor`, ordered by MUJid
    pub async fn mentees_for_mentor(&self, mentor: &MujId) -> Result<Vec<Mentee>> {
        self.store
            .find_where(
                Collection::Mentees,
                "$.mentorMujid",
                &Value::String(mentor.to_string()),
            )
            .await
    }
}

//! The todo record and the payload clients send to create or replace one.
//!
//! # Design
//! `Todo` is what storage holds and what the API returns. `TodoInput` is the
//! candidate a client submits: it has no `id` or timestamp fields, so any
//! such keys in a request body are dropped by serde and the repository is
//! always the one assigning them.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TodoError;

/// A stored todo record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    /// Builds a brand-new record from a candidate with a fresh id and
    /// `created_at == updated_at`.
    pub fn create(input: TodoInput) -> Self {
        let stamp = now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: input.title,
            description: input.description,
            created_at: stamp,
            updated_at: stamp,
        }
    }

    /// Replaces the mutable fields in place. `id` and `created_at` are untouched.
    pub fn apply(&mut self, input: TodoInput) {
        self.title = input.title;
        self.description = input.description;
        self.updated_at = next_update_stamp(self.updated_at);
    }
}

/// Request payload for creating or replacing a todo.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TodoInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl TodoInput {
    pub fn validate(&self) -> Result<(), TodoError> {
        if self.title.trim().is_empty() {
            return Err(TodoError::Validation("title is required".to_string()));
        }
        Ok(())
    }
}

/// Current UTC time at millisecond precision, the resolution BSON dates keep.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Timestamp for an update that is strictly later than `previous`, even when
/// two writes land within the same millisecond.
pub fn next_update_stamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    now().max(previous + Duration::milliseconds(1))
}

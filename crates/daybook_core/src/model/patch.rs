//! Partial record payload for local mutations.
//!
//! A `RecordPatch` is both the draft for an optimistic insert and the
//! field-level patch for an update. Absent fields are left untouched;
//! `Some(None)` on a clearable field clears it.

use crate::model::record::{Mood, Priority, TaskStatus};
use chrono::NaiveDate;
use serde::Serialize;

/// Field-level change set. Serializes to the document merge shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Option<Priority>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "date")]
    pub entry_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<Option<Mood>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Option<i64>>,
    /// Stamped by the reconciler; caller-provided values are overwritten.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a draft that only carries a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new().with_name(name)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_priority(mut self, priority: Option<Priority>) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_entry_date(mut self, entry_date: Option<NaiveDate>) -> Self {
        self.entry_date = Some(entry_date);
        self
    }

    pub fn with_mood(mut self, mood: Option<Mood>) -> Self {
        self.mood = Some(mood);
        self
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Returns whether the patch changes no domain field.
    pub fn is_empty(&self) -> bool {
        let Self {
            name,
            description,
            status,
            priority,
            tags,
            due_date,
            entry_date,
            mood,
            progress,
            completed_at,
            updated_at: _,
        } = self;
        name.is_none()
            && description.is_none()
            && status.is_none()
            && priority.is_none()
            && tags.is_none()
            && due_date.is_none()
            && entry_date.is_none()
            && mood.is_none()
            && progress.is_none()
            && completed_at.is_none()
    }
}

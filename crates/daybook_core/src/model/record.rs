//! Record domain model.
//!
//! # Responsibility
//! - Define the canonical record shared by task and journal projections.
//! - Define the closed vocabularies (status, priority, mood).
//!
//! # Invariants
//! - `id`, `owner_id` and `created_at` never change after creation.
//! - `updated_at >= created_at` for every normalized record.
//! - `tags` holds no blank entries and no case-insensitive duplicates.

use crate::clock::utc_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Name given to tasks whose name is missing or blank.
pub const DEFAULT_TASK_NAME: &str = "Untitled Task";
/// Title given to journal entries whose title is missing or blank.
pub const DEFAULT_JOURNAL_TITLE: &str = "Untitled Entry";

/// Stable identifier of one record.
///
/// Remote stores hand out opaque string ids, so this is not tied to UUIDs;
/// locally generated ids are UUIDv4 strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh provisional id for an optimistic insert.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Which collection a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Actionable to-do item.
    Task,
    /// Dated journal entry.
    Journal,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::Task, RecordKind::Journal];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Journal => "journal",
        }
    }

    /// Remote collection name holding records of this kind.
    pub fn collection_name(self) -> &'static str {
        match self {
            Self::Task => "tasks",
            Self::Journal => "journals",
        }
    }

    /// Placeholder used when a record arrives without a usable name.
    pub fn placeholder_name(self) -> &'static str {
        match self {
            Self::Task => DEFAULT_TASK_NAME,
            Self::Journal => DEFAULT_JOURNAL_TITLE,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "task" | "tasks" => Some(Self::Task),
            "journal" | "journals" | "entry" => Some(Self::Journal),
            _ => None,
        }
    }
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created but not started. Also the bucket for unknown statuses.
    #[default]
    NotStarted,
    /// Work is in progress.
    InProgress,
    /// Put aside for now.
    Paused,
    /// Done.
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::NotStarted,
        TaskStatus::InProgress,
        TaskStatus::Paused,
        TaskStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    /// Parses wire values; accepts `in progress` / `In-Progress` spellings.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "not_started" | "todo" => Some(Self::NotStarted),
            "in_progress" => Some(Self::InProgress),
            "paused" => Some(Self::Paused),
            "completed" | "done" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }
}

/// Task priority. Records without one rank below `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }

    /// Sort rank; `None` maps to 0.
    pub fn rank(priority: Option<Self>) -> u8 {
        match priority {
            Some(Self::Urgent) => 4,
            Some(Self::High) => 3,
            Some(Self::Medium) => 2,
            Some(Self::Low) => 1,
            None => 0,
        }
    }
}

/// Journal mood vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Happy,
    Neutral,
    Sad,
    Excited,
    Anxious,
}

impl Mood {
    pub const ALL: [Mood; 5] = [
        Mood::Happy,
        Mood::Neutral,
        Mood::Sad,
        Mood::Excited,
        Mood::Anxious,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Neutral => "neutral",
            Self::Sad => "sad",
            Self::Excited => "excited",
            Self::Anxious => "anxious",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mood| mood.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

/// Canonical task/journal record.
///
/// Serialized field names follow the document shape used by remote stores
/// (`userId`, `createdAt`, `date`, ...), so a serialized record can be fed
/// back through normalization unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    pub kind: RecordKind,
    #[serde(rename = "userId")]
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "userEmail")]
    pub owner_email: Option<String>,
    /// Task name, or journal title.
    pub name: String,
    /// Task description, or journal body.
    pub description: String,
    pub status: TaskStatus,
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
    pub due_date: Option<NaiveDate>,
    /// Journal entry date.
    #[serde(rename = "date")]
    pub entry_date: Option<NaiveDate>,
    pub mood: Option<Mood>,
    /// Percentage in `0..=100`.
    pub progress: u8,
    /// Unix epoch milliseconds of the last transition into `Completed`.
    pub completed_at: Option<i64>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds. Recency key for conflict resolution.
    pub updated_at: i64,
}

impl Record {
    /// Creates an empty record of `kind` stamped at `now_ms`.
    pub fn blank(id: RecordId, kind: RecordKind, owner_id: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id,
            kind,
            owner_id: owner_id.into(),
            owner_email: None,
            name: kind.placeholder_name().to_string(),
            description: String::new(),
            status: TaskStatus::default(),
            priority: None,
            tags: Vec::new(),
            due_date: None,
            entry_date: None,
            mood: None,
            progress: 0,
            completed_at: None,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Returns whether the name is the normalizer placeholder for this kind.
    pub fn has_placeholder_name(&self) -> bool {
        self.name == self.kind.placeholder_name()
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    /// UTC calendar day of `created_at`.
    pub fn created_date(&self) -> NaiveDate {
        utc_date(self.created_at)
    }

    /// Day this record counts toward for streaks and activity windows.
    ///
    /// Journal entries carry an explicit date; everything else falls back to
    /// the creation day.
    pub fn activity_date(&self) -> NaiveDate {
        self.entry_date.unwrap_or_else(|| self.created_date())
    }
}

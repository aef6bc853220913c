//! Filter/sort pipeline producing presentation lists.
//!
//! # Invariants
//! - Never mutates the input; always returns a fresh, owned list.
//! - Sorting is stable: records comparing equal keep collection order.
//! - Records without a due date sort last under `DueDate`.

use crate::model::record::{Mood, Priority, Record, TaskStatus};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Status predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    /// Anything not completed.
    Active,
    Exactly(TaskStatus),
}

impl StatusFilter {
    /// Parses `all`, `active`, or a status wire value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Some(Self::All),
            "active" => Some(Self::Active),
            other => TaskStatus::parse(other).map(Self::Exactly),
        }
    }

    pub fn matches(self, status: TaskStatus) -> bool {
        match self {
            Self::All => true,
            Self::Active => !status.is_completed(),
            Self::Exactly(expected) => status == expected,
        }
    }
}

/// Sort order for view lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Creation time, newest first.
    #[default]
    Newest,
    Oldest,
    /// Case-insensitive name, A-Z.
    NameAsc,
    NameDesc,
    /// Urgent first; unknown priority last.
    PriorityHigh,
    /// Unknown priority first, then low to urgent.
    PriorityLow,
    /// Earliest due date first; no due date last.
    DueDate,
    /// Journal entry date, newest first.
    EntryDateDesc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "newest" => Some(Self::Newest),
            "oldest" => Some(Self::Oldest),
            "name_asc" => Some(Self::NameAsc),
            "name_desc" => Some(Self::NameDesc),
            "priority_high" => Some(Self::PriorityHigh),
            "priority_low" => Some(Self::PriorityLow),
            "due_date" => Some(Self::DueDate),
            "entry_date_desc" | "date" => Some(Self::EntryDateDesc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::NameAsc => "name_asc",
            Self::NameDesc => "name_desc",
            Self::PriorityHigh => "priority_high",
            Self::PriorityLow => "priority_low",
            Self::DueDate => "due_date",
            Self::EntryDateDesc => "entry_date_desc",
        }
    }

    fn compare(self, a: &Record, b: &Record) -> Ordering {
        match self {
            Self::Newest => b.created_at.cmp(&a.created_at),
            Self::Oldest => a.created_at.cmp(&b.created_at),
            Self::NameAsc => compare_names(a, b),
            Self::NameDesc => compare_names(b, a),
            Self::PriorityHigh => Priority::rank(b.priority).cmp(&Priority::rank(a.priority)),
            Self::PriorityLow => Priority::rank(a.priority).cmp(&Priority::rank(b.priority)),
            Self::DueDate => match (a.due_date, b.due_date) {
                (Some(left), Some(right)) => left.cmp(&right),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            Self::EntryDateDesc => b.activity_date().cmp(&a.activity_date()),
        }
    }
}

/// Full view request. `Default` lists everything, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewQuery {
    pub status: StatusFilter,
    pub sort: SortOrder,
    /// Case-insensitive substring over name, description and tags.
    pub search: String,
    pub mood: Option<Mood>,
    /// Exact tag match, case-insensitive.
    pub tag: Option<String>,
}

impl ViewQuery {
    pub fn new(status: StatusFilter, sort: SortOrder, search: impl Into<String>) -> Self {
        Self {
            status,
            sort,
            search: search.into(),
            mood: None,
            tag: None,
        }
    }

    pub fn with_mood(mut self, mood: Mood) -> Self {
        self.mood = Some(mood);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Filters and sorts a copy of `records`.
pub fn view(records: &[Record], query: &ViewQuery) -> Vec<Record> {
    let needle = query.search.trim().to_lowercase();
    let tag = query
        .tag
        .as_deref()
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_lowercase);

    let mut selected: Vec<Record> = records
        .iter()
        .filter(|record| query.status.matches(record.status))
        .filter(|record| query.mood.map_or(true, |mood| record.mood == Some(mood)))
        .filter(|record| {
            tag.as_deref().map_or(true, |wanted| {
                record.tags.iter().any(|candidate| candidate.to_lowercase() == wanted)
            })
        })
        .filter(|record| needle.is_empty() || matches_search(record, &needle))
        .cloned()
        .collect();

    selected.sort_by(|a, b| query.sort.compare(a, b));
    selected
}

/// Distinct tags across `records`, in first-seen order.
pub fn unique_tags(records: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .flat_map(|record| record.tags.iter())
        .filter(|tag| seen.insert(tag.to_lowercase()))
        .cloned()
        .collect()
}

fn matches_search(record: &Record, needle: &str) -> bool {
    record.name.to_lowercase().contains(needle)
        || record.description.to_lowercase().contains(needle)
        || record.tags.iter().any(|tag| tag.to_lowercase().contains(needle))
}

fn compare_names(a: &Record, b: &Record) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}

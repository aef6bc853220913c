//! Record normalization.
//!
//! # Responsibility
//! - Turn any `RawRecord` into a well-formed `Record`.
//! - Apply `RecordPatch` values with the same cleaning rules.
//!
//! # Invariants
//! - Normalization never fails; bad fields fall back to safe defaults and
//!   are reported as `NormalizeWarning`s.
//! - Output satisfies `updated_at >= created_at`.
//! - Names and tags are whitespace-collapsed; tags are deduplicated
//!   case-insensitively, keeping the first spelling.

use crate::model::patch::RecordPatch;
use crate::model::raw::RawRecord;
use crate::model::record::{Mood, Priority, Record, RecordId, RecordKind, TaskStatus};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// One field that could not be taken as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeWarning {
    pub field: &'static str,
    pub reason: &'static str,
}

/// Normalization output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub record: Record,
    pub warnings: Vec<NormalizeWarning>,
}

impl Normalized {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Sanitizes one raw record into canonical shape.
///
/// `kind` comes from the collection the record was read from; a `kind` field
/// inside the document is ignored. `now_ms` is the fallback creation time.
pub fn normalize(raw: &RawRecord, kind: RecordKind, now_ms: i64) -> Normalized {
    let mut warnings = Vec::new();
    let mut warn = |field: &'static str, reason: &'static str| {
        warnings.push(NormalizeWarning { field, reason });
    };

    let id = match raw.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => RecordId::new(id),
        None => {
            warn("id", "missing");
            RecordId::generate()
        }
    };

    let owner_id = match raw.field(&["userId", "ownerId"]) {
        Some(Value::String(owner)) => owner.trim().to_string(),
        Some(_) => {
            warn("userId", "not_a_string");
            String::new()
        }
        None => String::new(),
    };
    let owner_email = match raw.field(&["userEmail", "ownerEmail"]) {
        Some(Value::String(email)) if !email.trim().is_empty() => Some(email.trim().to_string()),
        _ => None,
    };

    let name = match raw.field(&["name", "title"]) {
        Some(Value::String(name)) => {
            let cleaned = clean_name(name, kind);
            if cleaned == kind.placeholder_name() && name.trim().is_empty() {
                warn("name", "blank");
            }
            cleaned
        }
        Some(_) => {
            warn("name", "not_a_string");
            kind.placeholder_name().to_string()
        }
        None => {
            warn("name", "missing");
            kind.placeholder_name().to_string()
        }
    };

    let description = match raw.field(&["description", "content"]) {
        Some(Value::String(text)) => text.clone(),
        Some(_) => {
            warn("description", "not_a_string");
            String::new()
        }
        None => String::new(),
    };

    let status = match raw.field(&["status"]) {
        Some(Value::String(text)) => TaskStatus::parse(text).unwrap_or_else(|| {
            warn("status", "unrecognized");
            TaskStatus::default()
        }),
        Some(_) => {
            warn("status", "not_a_string");
            TaskStatus::default()
        }
        None => TaskStatus::default(),
    };

    let priority = parse_vocabulary(raw.field(&["priority"]), Priority::parse, || {
        warn("priority", "unrecognized")
    });

    let tags = match raw.field(&["tags"]) {
        Some(Value::Array(items)) => {
            if items.iter().any(|item| !item.is_string()) {
                warn("tags", "non_string_entry");
            }
            clean_tags(items.iter().filter_map(Value::as_str))
        }
        Some(_) => {
            warn("tags", "not_a_sequence");
            Vec::new()
        }
        None => Vec::new(),
    };

    let due_date = parse_optional_date(raw.field(&["dueDate", "due_date"]), || {
        warn("dueDate", "invalid_date")
    });
    let entry_date = parse_optional_date(raw.field(&["date", "entryDate"]), || {
        warn("date", "invalid_date")
    });

    let mood = parse_vocabulary(raw.field(&["mood"]), Mood::parse, || {
        warn("mood", "unrecognized")
    });

    let progress = match raw.field(&["progress"]) {
        Some(Value::Number(number)) => number
            .as_f64()
            .filter(|value| value.is_finite())
            .map(clamp_progress)
            .unwrap_or_default(),
        Some(_) => {
            warn("progress", "not_a_number");
            0
        }
        None => 0,
    };

    let completed_at = match raw.field(&["completedAt"]) {
        Some(value) => parse_timestamp(value).or_else(|| {
            warn("completedAt", "invalid_timestamp");
            None
        }),
        None => None,
    };

    let created_at = match raw.field(&["createdAt", "created_at"]).map(parse_timestamp) {
        Some(Some(ms)) => ms,
        Some(None) => {
            warn("createdAt", "invalid_timestamp");
            now_ms
        }
        None => {
            warn("createdAt", "missing");
            now_ms
        }
    };

    let updated_at = match raw.field(&["updatedAt", "updated_at"]).map(parse_timestamp) {
        Some(Some(ms)) if ms >= created_at => ms,
        Some(Some(_)) => {
            warn("updatedAt", "before_created_at");
            created_at
        }
        Some(None) => {
            warn("updatedAt", "invalid_timestamp");
            created_at
        }
        None => created_at,
    };

    Normalized {
        record: Record {
            id,
            kind,
            owner_id,
            owner_email,
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
            created_at,
            updated_at,
        },
        warnings,
    }
}

/// Applies every present patch field to `record` using normalization rules.
///
/// Timestamps other than `completed_at` are left to the caller.
pub(crate) fn apply_patch(record: &mut Record, patch: &RecordPatch) {
    if let Some(name) = patch.name.as_deref() {
        record.name = clean_name(name, record.kind);
    }
    if let Some(description) = patch.description.as_ref() {
        record.description = description.clone();
    }
    if let Some(status) = patch.status {
        record.status = status;
    }
    if let Some(priority) = patch.priority {
        record.priority = priority;
    }
    if let Some(tags) = patch.tags.as_ref() {
        record.tags = clean_tags(tags.iter().map(String::as_str));
    }
    if let Some(due_date) = patch.due_date {
        record.due_date = due_date;
    }
    if let Some(entry_date) = patch.entry_date {
        record.entry_date = entry_date;
    }
    if let Some(mood) = patch.mood {
        record.mood = mood;
    }
    if let Some(progress) = patch.progress {
        record.progress = progress.min(100);
    }
    if let Some(completed_at) = patch.completed_at {
        record.completed_at = completed_at;
    }
}

/// Collapses inner whitespace and trims; blank names become the placeholder.
pub fn clean_name(value: &str, kind: RecordKind) -> String {
    let collapsed = WHITESPACE_RE.replace_all(value.trim(), " ");
    if collapsed.is_empty() {
        kind.placeholder_name().to_string()
    } else {
        collapsed.into_owned()
    }
}

/// Cleans a tag list into an ordered set.
pub fn clean_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut cleaned = Vec::new();
    for tag in tags {
        let collapsed = WHITESPACE_RE.replace_all(tag.trim(), " ");
        if collapsed.is_empty() {
            continue;
        }
        if seen.insert(collapsed.to_lowercase()) {
            cleaned.push(collapsed.into_owned());
        }
    }
    cleaned
}

/// Reads a timestamp in any of the shapes remote documents use.
///
/// Accepts epoch milliseconds, RFC 3339 strings, naive `YYYY-MM-DDTHH:MM:SS`
/// strings (read as UTC), bare `YYYY-MM-DD` dates (midnight UTC) and
/// `{seconds, nanoseconds}` server timestamp objects.
pub fn parse_timestamp(value: &Value) -> Option<i64> {
    let ms = match value {
        Value::Number(number) => match number.as_i64() {
            Some(ms) => ms,
            None => number
                .as_f64()
                .filter(|ms| ms.is_finite() && ms.abs() < i64::MAX as f64)
                .map(|ms| ms.round() as i64)?,
        },
        Value::String(text) => parse_timestamp_text(text.trim())?,
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            seconds.checked_mul(1000)?.checked_add(nanos / 1_000_000)?
        }
        _ => return None,
    };
    DateTime::<Utc>::from_timestamp_millis(ms).map(|_| ms)
}

fn parse_timestamp_text(text: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Reads a calendar date; full timestamps are truncated to their UTC day.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    if let Value::String(text) = value {
        if let Ok(date) = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
            return Some(date);
        }
    }
    parse_timestamp(value).map(crate::clock::utc_date)
}

fn parse_optional_date(value: Option<&Value>, mut on_invalid: impl FnMut()) -> Option<NaiveDate> {
    let value = value?;
    if matches!(value, Value::String(text) if text.trim().is_empty()) {
        return None;
    }
    let parsed = parse_date(value);
    if parsed.is_none() {
        on_invalid();
    }
    parsed
}

fn parse_vocabulary<T>(
    value: Option<&Value>,
    parse: impl Fn(&str) -> Option<T>,
    mut on_invalid: impl FnMut(),
) -> Option<T> {
    match value? {
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => {
            let parsed = parse(text);
            if parsed.is_none() {
                on_invalid();
            }
            parsed
        }
        _ => {
            on_invalid();
            None
        }
    }
}

fn clamp_progress(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

//! Derived statistics over a record collection.
//!
//! # Responsibility
//! - Recompute every aggregate from scratch on each call.
//!
//! # Invariants
//! - `status_counts` covers every status and sums to `total`.
//! - `completion_rate` is in `0..=100` and is 0 for an empty collection.
//! - Calendar bucketing uses UTC days.

pub mod streak;

use crate::clock::{utc_date, DAY_MS};
use crate::config::{DateField, StatsConfig};
use crate::model::record::{Mood, Record, RecordId, TaskStatus};
use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub use streak::{compute_streaks, StreakStats};

const WEEK_MS: i64 = 7 * DAY_MS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: TaskStatus,
    pub count: usize,
}

/// Records created in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthBucket {
    pub year: i32,
    pub month: u32,
    /// Human label, e.g. `October 2026`.
    pub label: String,
    pub count: usize,
    pub record_ids: Vec<RecordId>,
}

/// Records created in one ISO week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekBucket {
    pub iso_year: i32,
    pub week: u32,
    /// e.g. `2026-W42`.
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoodCount {
    pub mood: Mood,
    pub count: usize,
}

/// Completions on one day of the trend window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub completed: usize,
    /// Completions from the start of the window through `date`.
    pub cumulative: usize,
}

/// Records created on one day of the last week, split by status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayStatusBucket {
    pub date: NaiveDate,
    pub completed: usize,
    pub in_progress: usize,
    /// Any other status.
    pub other: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedStats {
    pub total: usize,
    pub completed: usize,
    pub status_counts: Vec<StatusCount>,
    pub completion_rate: u32,
    /// Chronological.
    pub monthly: Vec<MonthBucket>,
    /// Chronological.
    pub weekly: Vec<WeekBucket>,
    pub top_tags: Vec<TagCount>,
    pub mood_distribution: Vec<MoodCount>,
    pub streak: StreakStats,
    /// Rounded to one decimal.
    pub average_per_week: f64,
    pub entries_this_month: usize,
    /// Activity within the last 7 days, today included.
    pub entries_this_week: usize,
    pub last_activity: Option<NaiveDate>,
    pub completion_trend: Vec<TrendPoint>,
    /// Seven days ending today, oldest first, bucketed by `created_at`.
    pub last_7_days: Vec<DayStatusBucket>,
}

impl DerivedStats {
    pub fn status_count(&self, status: TaskStatus) -> usize {
        self.status_counts
            .iter()
            .find(|entry| entry.status == status)
            .map_or(0, |entry| entry.count)
    }

    pub fn mood_count(&self, mood: Mood) -> usize {
        self.mood_distribution
            .iter()
            .find(|entry| entry.mood == mood)
            .map_or(0, |entry| entry.count)
    }
}

/// Computes all aggregates for `records` as of `now_ms`.
pub fn compute_stats(records: &[Record], now_ms: i64, config: &StatsConfig) -> DerivedStats {
    let today = utc_date(now_ms);
    let total = records.len();

    let status_counts: Vec<StatusCount> = TaskStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            count: records.iter().filter(|record| record.status == status).count(),
        })
        .collect();
    let completed = records.iter().filter(|record| record.is_completed()).count();

    let mood_distribution = Mood::ALL
        .into_iter()
        .map(|mood| MoodCount {
            mood,
            count: records.iter().filter(|record| record.mood == Some(mood)).count(),
        })
        .collect();

    let week_start = days_before(today, 6);
    let entries_this_week = records
        .iter()
        .filter(|record| {
            let day = record.activity_date();
            day >= week_start && day <= today
        })
        .count();
    let entries_this_month = records
        .iter()
        .filter(|record| {
            let day = record.activity_date();
            day.year() == today.year() && day.month() == today.month()
        })
        .count();

    DerivedStats {
        total,
        completed,
        status_counts,
        completion_rate: completion_rate(completed, total),
        monthly: monthly_buckets(records, config.month_field),
        weekly: weekly_buckets(records),
        top_tags: top_tags(records, config.top_tags_limit),
        mood_distribution,
        streak: compute_streaks(
            records.iter().map(Record::activity_date),
            today,
            config.streak_anchor,
        ),
        average_per_week: average_per_week(records, now_ms),
        entries_this_month,
        entries_this_week,
        last_activity: records.iter().map(Record::activity_date).max(),
        completion_trend: completion_trend(records, today, config.trend_days),
        last_7_days: last_7_days(records, today),
    }
}

/// `completed / total * 100`, rounded half up; 0 for an empty collection.
pub fn completion_rate(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total) as u64;
    let total = total as u64;
    ((completed * 200 + total) / (total * 2)) as u32
}

fn days_before(day: NaiveDate, count: u64) -> NaiveDate {
    day.checked_sub_days(Days::new(count)).unwrap_or(NaiveDate::MIN)
}

fn monthly_buckets(records: &[Record], field: DateField) -> Vec<MonthBucket> {
    let mut buckets: BTreeMap<(i32, u32), Vec<RecordId>> = BTreeMap::new();
    for record in records {
        let day = match field {
            DateField::CreatedAt => record.created_date(),
            DateField::ActivityDate => record.activity_date(),
        };
        buckets
            .entry((day.year(), day.month()))
            .or_default()
            .push(record.id.clone());
    }

    buckets
        .into_iter()
        .map(|((year, month), record_ids)| MonthBucket {
            year,
            month,
            label: month_label(year, month),
            count: record_ids.len(),
            record_ids,
        })
        .collect()
}

fn month_label(year: i32, month: u32) -> String {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|first| first.format("%B %Y").to_string())
        .unwrap_or_else(|| format!("{month}/{year}"))
}

fn weekly_buckets(records: &[Record]) -> Vec<WeekBucket> {
    let mut buckets: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for record in records {
        let week = record.created_date().iso_week();
        *buckets.entry((week.year(), week.week())).or_default() += 1;
    }

    buckets
        .into_iter()
        .map(|((iso_year, week), count)| WeekBucket {
            iso_year,
            week,
            label: format!("{iso_year}-W{week:02}"),
            count,
        })
        .collect()
}

/// Most used tags, count descending; ties keep first-seen order.
pub fn top_tags(records: &[Record], limit: usize) -> Vec<TagCount> {
    let mut counts: Vec<TagCount> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for tag in records.iter().flat_map(|record| record.tags.iter()) {
        match positions.get(tag.as_str()) {
            Some(position) => counts[*position].count += 1,
            None => {
                positions.insert(tag.as_str(), counts.len());
                counts.push(TagCount {
                    tag: tag.clone(),
                    count: 1,
                });
            }
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    counts
}

/// `total / max(1, ceil(ms since first creation / 1 week))`, one decimal.
fn average_per_week(records: &[Record], now_ms: i64) -> f64 {
    let Some(first) = records.iter().map(|record| record.created_at).min() else {
        return 0.0;
    };
    let elapsed = now_ms.saturating_sub(first).max(0);
    let weeks = (elapsed.saturating_add(WEEK_MS - 1) / WEEK_MS).max(1);
    let average = records.len() as f64 / weeks as f64;
    (average * 10.0).round() / 10.0
}

fn completion_trend(records: &[Record], today: NaiveDate, days: u32) -> Vec<TrendPoint> {
    let start = days_before(today, u64::from(days.max(1)) - 1);
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for record in records.iter().filter(|record| record.is_completed()) {
        if let Some(completed_at) = record.completed_at {
            let day = utc_date(completed_at);
            if day >= start && day <= today {
                *per_day.entry(day).or_default() += 1;
            }
        }
    }

    let mut cumulative = 0;
    start
        .iter_days()
        .take_while(|day| *day <= today)
        .map(|date| {
            let completed = per_day.get(&date).copied().unwrap_or(0);
            cumulative += completed;
            TrendPoint {
                date,
                completed,
                cumulative,
            }
        })
        .collect()
}

fn last_7_days(records: &[Record], today: NaiveDate) -> Vec<DayStatusBucket> {
    let start = days_before(today, 6);
    let mut buckets: Vec<DayStatusBucket> = start
        .iter_days()
        .take_while(|day| *day <= today)
        .map(|date| DayStatusBucket {
            date,
            completed: 0,
            in_progress: 0,
            other: 0,
        })
        .collect();

    for record in records {
        let created = record.created_date();
        let Some(bucket) = buckets.iter_mut().find(|bucket| bucket.date == created) else {
            continue;
        };
        match record.status {
            TaskStatus::Completed => bucket.completed += 1,
            TaskStatus::InProgress => bucket.in_progress += 1,
            _ => bucket.other += 1,
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::{average_per_week, completion_rate, last_7_days, month_label, top_tags};
    use crate::clock::DAY_MS;
    use crate::model::record::{Record, RecordId, RecordKind};

    fn tagged(id: &str, tags: &[&str]) -> Record {
        let mut record = Record::blank(RecordId::from(id), RecordKind::Journal, "u1", 0);
        record.tags = tags.iter().map(|tag| tag.to_string()).collect();
        record
    }

    #[test]
    fn completion_rate_rounds_half_up() {
        assert_eq!(completion_rate(1, 3), 33);
        assert_eq!(completion_rate(2, 3), 67);
        assert_eq!(completion_rate(1, 8), 13);
        assert_eq!(completion_rate(0, 0), 0);
        assert_eq!(completion_rate(5, 5), 100);
    }

    #[test]
    fn top_tags_ties_keep_first_seen_order() {
        let records = vec![
            tagged("a", &["gym", "work"]),
            tagged("b", &["read", "work"]),
            tagged("c", &["gym"]),
            tagged("d", &["read"]),
        ];
        let tags: Vec<(String, usize)> = top_tags(&records, 10)
            .into_iter()
            .map(|entry| (entry.tag, entry.count))
            .collect();
        assert_eq!(
            tags,
            vec![
                ("gym".to_string(), 2),
                ("work".to_string(), 2),
                ("read".to_string(), 2)
            ]
        );
        assert_eq!(top_tags(&records, 1).len(), 1);
    }

    #[test]
    fn average_per_week_uses_at_least_one_week() {
        let mut records = vec![tagged("a", &[]), tagged("b", &[])];
        records[0].created_at = 0;
        records[1].created_at = DAY_MS;
        assert_eq!(average_per_week(&records, 2 * DAY_MS), 2.0);
        assert_eq!(average_per_week(&records, 15 * DAY_MS), 0.7);
        assert_eq!(average_per_week(&[], 15 * DAY_MS), 0.0);
    }

    #[test]
    fn average_per_week_survives_extreme_creation_times() {
        let mut record = tagged("a", &[]);
        record.created_at = i64::MIN;
        assert_eq!(average_per_week(&[record], i64::MAX), 0.0);
    }

    #[test]
    fn last_7_days_splits_creations_by_status() {
        use crate::clock::utc_date;
        use crate::model::record::TaskStatus;

        let today_ms = 30 * DAY_MS;
        let mut done = tagged("a", &[]);
        done.created_at = today_ms;
        done.status = TaskStatus::Completed;
        let mut busy = tagged("b", &[]);
        busy.created_at = today_ms - DAY_MS;
        busy.status = TaskStatus::InProgress;
        let mut paused = tagged("c", &[]);
        paused.created_at = today_ms - 6 * DAY_MS;
        paused.status = TaskStatus::Paused;
        let mut stale = tagged("d", &[]);
        stale.created_at = today_ms - 7 * DAY_MS;

        let buckets = last_7_days(&[done, busy, paused, stale], utc_date(today_ms));
        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0].date, utc_date(today_ms - 6 * DAY_MS));
        assert_eq!(buckets[0].other, 1);
        assert_eq!(buckets[5].in_progress, 1);
        assert_eq!(buckets[6].completed, 1);
        let counted: usize = buckets
            .iter()
            .map(|bucket| bucket.completed + bucket.in_progress + bucket.other)
            .sum();
        assert_eq!(counted, 3);
    }

    #[test]
    fn month_label_is_human_readable() {
        assert_eq!(month_label(2026, 10), "October 2026");
    }
}

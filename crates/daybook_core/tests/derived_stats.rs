use chrono::NaiveDate;
use daybook_core::clock::{day_start_ms, DAY_MS};
use daybook_core::stats::completion_rate;
use daybook_core::{
    compute_stats, DateField, Mood, Record, RecordId, RecordKind, StatsConfig, StreakAnchor,
    TaskStatus,
};
use proptest::prelude::*;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn noon(day: NaiveDate) -> i64 {
    day_start_ms(day) + 12 * 60 * 60 * 1000
}

fn task(id: &str, status: TaskStatus, created: NaiveDate) -> Record {
    let mut record = Record::blank(RecordId::from(id), RecordKind::Task, "u1", noon(created));
    record.name = id.to_string();
    record.status = status;
    record
}

#[test]
fn empty_collection_has_zero_stats() {
    let stats = compute_stats(&[], noon(date(2026, 10, 18)), &StatsConfig::default());
    assert_eq!(stats.total, 0);
    assert_eq!(stats.completion_rate, 0);
    assert_eq!(stats.status_counts.len(), TaskStatus::ALL.len());
    assert!(stats.monthly.is_empty());
    assert_eq!(stats.streak.current, 0);
    assert_eq!(stats.average_per_week, 0.0);
    assert_eq!(stats.last_activity, None);
    assert_eq!(stats.completion_trend.len(), 14);
}

#[test]
fn last_week_chart_buckets_tasks_by_creation_day() {
    let today = date(2026, 10, 18);
    let records = vec![
        task("a", TaskStatus::Completed, today),
        task("b", TaskStatus::NotStarted, today),
        task("c", TaskStatus::InProgress, date(2026, 10, 12)),
        task("d", TaskStatus::Paused, date(2026, 10, 11)),
    ];
    let stats = compute_stats(&records, noon(today), &StatsConfig::default());

    let days: Vec<NaiveDate> = stats.last_7_days.iter().map(|bucket| bucket.date).collect();
    assert_eq!(days.first(), Some(&date(2026, 10, 12)));
    assert_eq!(days.last(), Some(&today));
    assert_eq!(days.len(), 7);

    let first = &stats.last_7_days[0];
    assert_eq!((first.completed, first.in_progress, first.other), (0, 1, 0));
    let last = &stats.last_7_days[6];
    assert_eq!((last.completed, last.in_progress, last.other), (1, 0, 1));
}

#[test]
fn one_unfinished_task_counts_as_total_but_not_completed() {
    let today = date(2026, 10, 18);
    let records = vec![task("Buy milk", TaskStatus::NotStarted, today)];
    let stats = compute_stats(&records, noon(today), &StatsConfig::default());
    assert_eq!(stats.total, 1);
    assert_eq!(stats.completed, 0);
}

#[test]
fn three_statuses_give_a_third_completed() {
    let today = date(2026, 10, 18);
    let records = vec![
        task("a", TaskStatus::NotStarted, today),
        task("b", TaskStatus::InProgress, today),
        task("c", TaskStatus::Completed, today),
    ];
    let stats = compute_stats(&records, noon(today), &StatsConfig::default());

    assert_eq!(stats.status_count(TaskStatus::NotStarted), 1);
    assert_eq!(stats.status_count(TaskStatus::InProgress), 1);
    assert_eq!(stats.status_count(TaskStatus::Completed), 1);
    assert_eq!(stats.status_count(TaskStatus::Paused), 0);
    assert_eq!(stats.completion_rate, 33);
}

#[test]
fn three_consecutive_days_ending_today_is_a_three_day_streak() {
    let today = date(2026, 10, 18);
    let records = vec![
        task("a", TaskStatus::NotStarted, date(2026, 10, 16)),
        task("b", TaskStatus::NotStarted, date(2026, 10, 17)),
        task("c", TaskStatus::NotStarted, today),
    ];
    for anchor in [StreakAnchor::LatestActivity, StreakAnchor::Today] {
        let config = StatsConfig {
            streak_anchor: anchor,
            ..StatsConfig::default()
        };
        let stats = compute_stats(&records, noon(today), &config);
        assert_eq!(stats.streak.current, 3, "anchor {anchor:?}");
        assert_eq!(stats.streak.longest, 3);
    }
}

#[test]
fn streak_ending_before_today_depends_on_anchor() {
    let today = date(2026, 10, 18);
    let records = vec![
        task("a", TaskStatus::NotStarted, date(2026, 10, 14)),
        task("b", TaskStatus::NotStarted, date(2026, 10, 15)),
        task("c", TaskStatus::NotStarted, date(2026, 10, 16)),
    ];

    let latest = compute_stats(&records, noon(today), &StatsConfig::default());
    assert_eq!(latest.streak.current, 3);

    let config = StatsConfig {
        streak_anchor: StreakAnchor::Today,
        ..StatsConfig::default()
    };
    let anchored = compute_stats(&records, noon(today), &config);
    assert_eq!(anchored.streak.current, 0);
    assert_eq!(anchored.streak.longest, 3);
}

#[test]
fn monthly_buckets_are_chronological_with_ids() {
    let records = vec![
        task("oct", TaskStatus::NotStarted, date(2026, 10, 2)),
        task("aug", TaskStatus::NotStarted, date(2026, 8, 30)),
        task("oct2", TaskStatus::NotStarted, date(2026, 10, 9)),
    ];
    let stats = compute_stats(&records, noon(date(2026, 10, 18)), &StatsConfig::default());

    let labels: Vec<&str> = stats.monthly.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["August 2026", "October 2026"]);
    assert_eq!(stats.monthly[1].count, 2);
    assert_eq!(
        stats.monthly[1].record_ids,
        vec![RecordId::from("oct"), RecordId::from("oct2")]
    );
}

#[test]
fn journal_months_can_follow_entry_date() {
    let mut entry = task("j1", TaskStatus::NotStarted, date(2026, 10, 1));
    entry.kind = RecordKind::Journal;
    entry.entry_date = Some(date(2026, 9, 30));

    let by_created = compute_stats(&[entry.clone()], noon(date(2026, 10, 18)), &StatsConfig::default());
    assert_eq!(by_created.monthly[0].month, 10);

    let config = StatsConfig {
        month_field: DateField::ActivityDate,
        ..StatsConfig::default()
    };
    let by_entry = compute_stats(&[entry], noon(date(2026, 10, 18)), &config);
    assert_eq!(by_entry.monthly[0].month, 9);
}

#[test]
fn activity_windows_and_mood_distribution() {
    let today = date(2026, 10, 18);
    let mut records = vec![
        task("a", TaskStatus::NotStarted, today),
        task("b", TaskStatus::NotStarted, date(2026, 10, 12)),
        task("c", TaskStatus::NotStarted, date(2026, 10, 11)),
        task("d", TaskStatus::NotStarted, date(2026, 9, 30)),
    ];
    records[0].mood = Some(Mood::Happy);
    records[1].mood = Some(Mood::Happy);
    records[2].mood = Some(Mood::Sad);

    let stats = compute_stats(&records, noon(today), &StatsConfig::default());
    assert_eq!(stats.entries_this_week, 2);
    assert_eq!(stats.entries_this_month, 3);
    assert_eq!(stats.last_activity, Some(today));
    assert_eq!(stats.mood_count(Mood::Happy), 2);
    assert_eq!(stats.mood_count(Mood::Sad), 1);
    assert_eq!(stats.mood_count(Mood::Anxious), 0);
    assert_eq!(stats.mood_distribution.len(), Mood::ALL.len());
}

#[test]
fn weekly_buckets_use_iso_weeks() {
    let records = vec![
        task("mon", TaskStatus::NotStarted, date(2026, 10, 12)),
        task("sun", TaskStatus::NotStarted, date(2026, 10, 18)),
        task("next", TaskStatus::NotStarted, date(2026, 10, 19)),
    ];
    let stats = compute_stats(&records, noon(date(2026, 10, 19)), &StatsConfig::default());
    let weeks: Vec<(&str, usize)> = stats
        .weekly
        .iter()
        .map(|bucket| (bucket.label.as_str(), bucket.count))
        .collect();
    assert_eq!(weeks, vec![("2026-W42", 2), ("2026-W43", 1)]);
}

#[test]
fn completion_trend_accumulates_inside_window() {
    let today = date(2026, 10, 18);
    let mut done_today = task("a", TaskStatus::Completed, today);
    done_today.completed_at = Some(noon(today));
    let mut done_earlier = task("b", TaskStatus::Completed, date(2026, 10, 10));
    done_earlier.completed_at = Some(noon(date(2026, 10, 16)));
    let mut done_long_ago = task("c", TaskStatus::Completed, date(2026, 1, 1));
    done_long_ago.completed_at = Some(noon(date(2026, 1, 2)));

    let config = StatsConfig {
        trend_days: 3,
        ..StatsConfig::default()
    };
    let stats = compute_stats(&[done_today, done_earlier, done_long_ago], noon(today), &config);
    let trend: Vec<(NaiveDate, usize, usize)> = stats
        .completion_trend
        .iter()
        .map(|point| (point.date, point.completed, point.cumulative))
        .collect();
    assert_eq!(
        trend,
        vec![
            (date(2026, 10, 16), 1, 1),
            (date(2026, 10, 17), 0, 1),
            (date(2026, 10, 18), 1, 2),
        ]
    );
}

#[test]
fn top_tags_respect_limit() {
    let today = date(2026, 10, 18);
    let mut records = vec![
        task("a", TaskStatus::NotStarted, today),
        task("b", TaskStatus::NotStarted, today),
    ];
    records[0].tags = vec!["work".into(), "gym".into()];
    records[1].tags = vec!["work".into()];

    let config = StatsConfig {
        top_tags_limit: 1,
        ..StatsConfig::default()
    };
    let stats = compute_stats(&records, noon(today), &config);
    assert_eq!(stats.top_tags.len(), 1);
    assert_eq!(stats.top_tags[0].tag, "work");
    assert_eq!(stats.top_tags[0].count, 2);
}

#[test]
fn average_per_week_spans_first_creation_to_now() {
    let first = date(2026, 10, 1);
    let records = vec![
        task("a", TaskStatus::NotStarted, first),
        task("b", TaskStatus::NotStarted, first),
        task("c", TaskStatus::NotStarted, first),
    ];
    let now = noon(first) + 14 * DAY_MS;
    let stats = compute_stats(&records, now, &StatsConfig::default());
    assert_eq!(stats.average_per_week, 1.5);
}

fn status_strategy() -> impl Strategy<Value = TaskStatus> {
    prop::sample::select(TaskStatus::ALL.to_vec())
}

proptest! {
    #[test]
    fn prop_status_counts_sum_to_total(
        statuses in prop::collection::vec(status_strategy(), 0..40),
        offsets in prop::collection::vec(0i64..400, 40),
    ) {
        let records: Vec<Record> = statuses
            .iter()
            .zip(offsets.iter())
            .enumerate()
            .map(|(index, (status, offset))| {
                let mut record = Record::blank(
                    RecordId::new(format!("r{index}")),
                    RecordKind::Task,
                    "u1",
                    offset * DAY_MS,
                );
                record.status = *status;
                record
            })
            .collect();
        let stats = compute_stats(&records, 400 * DAY_MS, &StatsConfig::default());

        let summed: usize = stats.status_counts.iter().map(|entry| entry.count).sum();
        prop_assert_eq!(summed, stats.total);
        prop_assert!(stats.completion_rate <= 100);
        let bucketed: usize = stats.monthly.iter().map(|bucket| bucket.count).sum();
        prop_assert_eq!(bucketed, stats.total);
        prop_assert!(stats.streak.current <= stats.streak.longest);
    }

    #[test]
    fn prop_completion_rate_is_bounded(completed in 0usize..500, extra in 0usize..500) {
        let rate = completion_rate(completed, completed + extra);
        prop_assert!(rate <= 100);
        if completed + extra == 0 {
            prop_assert_eq!(rate, 0);
        }
    }
}

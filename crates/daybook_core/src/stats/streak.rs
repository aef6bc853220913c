//! Consecutive-day activity streaks.

use crate::config::StreakAnchor;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreakStats {
    /// Run of consecutive active days ending on the anchor day.
    pub current: u32,
    /// Longest run of consecutive active days anywhere.
    pub longest: u32,
}

/// Computes streaks over the distinct days in `dates`.
///
/// With `StreakAnchor::Today` the current streak is 0 unless `today` itself
/// has activity.
pub fn compute_streaks(
    dates: impl IntoIterator<Item = NaiveDate>,
    today: NaiveDate,
    anchor: StreakAnchor,
) -> StreakStats {
    let days: BTreeSet<NaiveDate> = dates.into_iter().collect();
    let Some(latest) = days.last().copied() else {
        return StreakStats::default();
    };

    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in &days {
        run = match previous.and_then(|prev| prev.succ_opt()) {
            Some(expected) if expected == *day => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*day);
    }

    let start = match anchor {
        StreakAnchor::LatestActivity => Some(latest),
        StreakAnchor::Today => days.contains(&today).then_some(today),
    };
    let mut current = 0;
    let mut cursor = start;
    while let Some(day) = cursor.filter(|day| days.contains(day)) {
        current += 1;
        cursor = day.pred_opt();
    }

    StreakStats { current, longest }
}

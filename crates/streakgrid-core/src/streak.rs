use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::activity::ActivitySample;
use crate::datetime::{add_days, format_calendar_date};

/// Aggregate streak statistics, shown next to the calendar grid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakData {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_active_days: u32,

    #[serde(default)]
    pub last_active_date: Option<String>,

    #[serde(default)]
    pub streak_start_date: Option<String>,
}

impl StreakData {
    /// Only days with a non-zero count are active. A streak is current when
    /// its latest day is `today` or the day before.
    #[tracing::instrument(skip(samples), fields(samples = samples.len()))]
    pub fn from_samples(samples: &[ActivitySample], today: NaiveDate) -> Self {
        let active: BTreeSet<NaiveDate> = samples
            .iter()
            .filter(|sample| sample.count > 0)
            .map(|sample| sample.date)
            .collect();

        let Some(&last_active) = active.last() else {
            return Self::default();
        };

        let runs = consecutive_runs(&active);
        let longest_streak = runs.iter().map(|(_, len)| *len).max().unwrap_or(0);

        let (current_streak, streak_start) = match runs.last() {
            Some(&(start, len)) if last_active >= add_days(today, -1) => (len, Some(start)),
            _ => (0, None),
        };

        let data = Self {
            current_streak,
            longest_streak,
            total_active_days: u32::try_from(active.len()).unwrap_or(u32::MAX),
            last_active_date: Some(format_calendar_date(last_active)),
            streak_start_date: streak_start.map(format_calendar_date),
        };
        debug!(?data, "computed streak");
        data
    }
}

/// `(first day, length)` for each run of consecutive dates, oldest first.
fn consecutive_runs(active: &BTreeSet<NaiveDate>) -> Vec<(NaiveDate, u32)> {
    let mut runs: Vec<(NaiveDate, u32)> = Vec::new();
    let mut previous: Option<NaiveDate> = None;

    for &date in active {
        match (previous, runs.last_mut()) {
            (Some(prev), Some((_, len))) if add_days(prev, 1) == date => *len += 1,
            _ => runs.push((date, 1)),
        }
        previous = Some(date);
    }

    runs
}

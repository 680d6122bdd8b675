//! Reconstruction of a dense, Sunday-aligned activity calendar from sparse
//! `(date, count)` samples.
//!
//! The grid always starts on the Sunday on or before the requested start, so
//! two ranges starting in the same week share column alignment. Every date up
//! to the end of the range gets exactly one [`CalendarDay`], absent dates with
//! a zero count.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, warn};

use crate::activity::{ActivitySample, HeatmapEntry, parse_samples};
use crate::datetime::{Locale, add_days, day_index, format_calendar_date, sunday_on_or_before};
use crate::error::CalendarError;

/// Default look-back when no start date is given.
pub const DEFAULT_RANGE_DAYS: u32 = 365;

/// Upper bound on the number of days a single walk may emit (ten years).
pub const MAX_SPAN_DAYS: i64 = 3_660;

/// Number of intensity tiers, including the empty one.
pub const BUCKETS: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    #[serde(serialize_with = "serialize_date")]
    pub date: NaiveDate,
    pub count: u32,
    pub week_index: u32,
    /// 0 = Sunday.
    pub day_index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthLabel {
    pub label: &'static str,
    pub week_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Calendar {
    pub days: Vec<CalendarDay>,
    pub max_count: u32,
    pub month_labels: Vec<MonthLabel>,
}

impl Calendar {
    /// Number of week columns in the grid.
    pub fn week_count(&self) -> u32 {
        self.days.last().map(|day| day.week_index + 1).unwrap_or(0)
    }

    pub fn cell(&self, week_index: u32, day_index: u8) -> Option<&CalendarDay> {
        let offset = week_index as usize * 7 + usize::from(day_index);
        self.days
            .get(offset)
            .filter(|day| day.week_index == week_index && day.day_index == day_index)
    }

    pub fn day(&self, date: NaiveDate) -> Option<&CalendarDay> {
        let first = self.days.first()?;
        let offset = usize::try_from((date - first.date).num_days()).ok()?;
        self.days.get(offset)
    }

    pub fn total_activities(&self) -> u64 {
        self.days.iter().map(|day| u64::from(day.count)).sum()
    }

    pub fn active_days(&self) -> usize {
        self.days.iter().filter(|day| day.count > 0).count()
    }

    pub fn bucket(&self, day: &CalendarDay) -> u8 {
        intensity_bucket(day.count, self.max_count)
    }
}

/// The inclusive date window a calendar covers, before Sunday alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CalendarRange {
    pub fn resolve(start: Option<NaiveDate>, end: Option<NaiveDate>, today: NaiveDate) -> Self {
        Self::resolve_with_span(start, end, today, DEFAULT_RANGE_DAYS)
    }

    /// `end` falls back to `today`, `start` to `span_days` before `end`.
    /// `span_days` is capped at [`MAX_SPAN_DAYS`].
    pub fn resolve_with_span(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
        span_days: u32,
    ) -> Self {
        let end = end.unwrap_or(today);
        let span = i64::from(span_days).min(MAX_SPAN_DAYS);
        let start = start.unwrap_or_else(|| add_days(end, -span));
        Self { start, end }
    }

    pub fn grid_start(&self) -> NaiveDate {
        sunday_on_or_before(self.start)
    }
}

/// Validates wire entries, then reconstructs the calendar.
///
/// `today` is the caller's current date in its canonical zone; it is only
/// consulted when `end` is omitted.
#[tracing::instrument(skip(entries), fields(entries = entries.len()))]
pub fn reconstruct(
    entries: &[HeatmapEntry],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<Calendar, CalendarError> {
    let samples = parse_samples(entries)?;
    reconstruct_samples(&samples, CalendarRange::resolve(start, end, today))
}

/// Builds the grid over `range`.
///
/// Duplicate dates resolve last-write-wins for the cell count. `max_count`
/// is taken over every sample, including ones outside the window and
/// overwritten duplicates.
#[tracing::instrument(skip(samples), fields(samples = samples.len()))]
pub fn reconstruct_samples(
    samples: &[ActivitySample],
    range: CalendarRange,
) -> Result<Calendar, CalendarError> {
    let max_count = samples
        .iter()
        .map(|sample| sample.count)
        .max()
        .unwrap_or(0)
        .max(1);

    if range.start > range.end {
        warn!(start = %range.start, end = %range.end, "start after end; empty calendar");
        return Ok(Calendar {
            days: Vec::new(),
            max_count,
            month_labels: Vec::new(),
        });
    }

    let first = range.grid_start();
    let span = (range.end - first).num_days() + 1;
    if span > MAX_SPAN_DAYS {
        return Err(CalendarError::Range {
            start: first,
            end: range.end,
            days: span,
            limit: MAX_SPAN_DAYS,
        });
    }

    let mut counts: HashMap<NaiveDate, u32> = HashMap::with_capacity(samples.len());
    for sample in samples {
        if let Some(previous) = counts.insert(sample.date, sample.count) {
            debug!(date = %sample.date, previous, current = sample.count, "duplicate sample date");
        }
    }

    let mut days = Vec::with_capacity(span as usize);
    let mut month_labels = Vec::new();
    let mut labelled_month: Option<(i32, u32)> = None;
    let mut week_index = 0u32;

    for offset in 0..span {
        let date = add_days(first, offset);
        let day_index = day_index(date);

        days.push(CalendarDay {
            date,
            count: counts.get(&date).copied().unwrap_or(0),
            week_index,
            day_index,
        });

        let month = (date.year(), date.month());
        if day_index == 0 && labelled_month != Some(month) {
            labelled_month = Some(month);
            month_labels.push(MonthLabel {
                label: Locale::En.month_short(date.month()),
                week_index,
            });
        }

        if day_index == 6 {
            week_index += 1;
        }
    }

    debug!(
        first = %first,
        end = %range.end,
        days = days.len(),
        weeks = week_index,
        max_count,
        "reconstructed calendar"
    );

    Ok(Calendar {
        days,
        max_count,
        month_labels,
    })
}

/// Maps a count onto one of [`BUCKETS`] tiers relative to `max_count`.
///
/// Zero is always tier 0; otherwise the tiers are the quarters of
/// `count / max_count`, inclusive on their upper bound. Counts above the
/// maximum land in the top tier and a zero maximum is treated as one.
pub fn intensity_bucket(count: u32, max_count: u32) -> u8 {
    if count == 0 {
        return 0;
    }

    let count = u64::from(count);
    let max = u64::from(max_count.max(1));

    if count * 4 <= max {
        1
    } else if count * 2 <= max {
        2
    } else if count * 4 <= max * 3 {
        3
    } else {
        4
    }
}

/// Tooltip line for one cell.
pub fn describe_day(day: &CalendarDay, locale: Locale) -> String {
    format!(
        "{}: {} {}",
        format_calendar_date(day.date),
        day.count,
        locale.activity_noun(u64::from(day.count))
    )
}

/// Re-labels month markers for another locale.
pub fn localize_labels(calendar: &mut Calendar, locale: Locale) {
    for (label, month) in calendar
        .month_labels
        .iter_mut()
        .zip(label_months(&calendar.days))
    {
        label.label = locale.month_short(month);
    }
}

fn label_months(days: &[CalendarDay]) -> Vec<u32> {
    let mut months = Vec::new();
    let mut last: Option<(i32, u32)> = None;
    for day in days.iter().filter(|day| day.day_index == 0) {
        let month = (day.date.year(), day.date.month());
        if last != Some(month) {
            last = Some(month);
            months.push(day.date.month());
        }
    }
    months
}

pub(crate) fn serialize_date<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_calendar_date(*date))
}

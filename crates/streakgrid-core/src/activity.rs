use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::debug;

use crate::datetime::{format_calendar_date, parse_calendar_date};
use crate::error::CalendarError;
use crate::streak::StreakData;

/// One validated `(date, count)` sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivitySample {
    pub date: NaiveDate,
    pub count: u32,
}

impl ActivitySample {
    pub fn new(date: NaiveDate, count: u32) -> Self {
        Self { date, count }
    }
}

/// A sample as the activity service sends it. Counts stay as raw JSON
/// numbers so fractional or negative values reach validation instead of
/// failing inside the deserializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapEntry {
    pub date: String,
    pub count: Number,
}

impl HeatmapEntry {
    pub fn new(date: impl Into<String>, count: u32) -> Self {
        Self {
            date: date.into(),
            count: Number::from(count),
        }
    }

    pub fn validate(&self) -> Result<ActivitySample, CalendarError> {
        let date = parse_calendar_date(&self.date)?;
        let raw = self.count.to_string();

        let count = match self.count.as_u64() {
            Some(value) => u32::try_from(value)
                .map_err(|_| CalendarError::validation("count", raw, "exceeds u32 range"))?,
            None if self.count.as_i64().is_some() => {
                return Err(CalendarError::validation("count", raw, "must be non-negative"));
            }
            None => {
                return Err(CalendarError::validation("count", raw, "must be an integer"));
            }
        };

        Ok(ActivitySample { date, count })
    }
}

impl From<ActivitySample> for HeatmapEntry {
    fn from(sample: ActivitySample) -> Self {
        Self::new(format_calendar_date(sample.date), sample.count)
    }
}

/// Validates every entry, rejecting the whole batch on the first bad one.
#[tracing::instrument(skip_all, fields(entries = entries.len()))]
pub fn parse_samples(entries: &[HeatmapEntry]) -> Result<Vec<ActivitySample>, CalendarError> {
    entries.iter().map(HeatmapEntry::validate).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapResponse {
    #[serde(default)]
    pub user_id: Option<i64>,

    #[serde(default)]
    pub start_date: Option<String>,

    #[serde(default)]
    pub end_date: Option<String>,

    pub data: Vec<HeatmapEntry>,

    #[serde(default)]
    pub total_activities: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarResponse {
    pub heatmap: HeatmapResponse,

    #[serde(default)]
    pub streak: Option<StreakData>,
}

/// Whatever shape of activity document the caller handed us, normalized.
#[derive(Debug, Clone, Default)]
pub struct ActivityPayload {
    pub entries: Vec<HeatmapEntry>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub total_activities: Option<u64>,
    pub streak: Option<StreakData>,
}

impl ActivityPayload {
    /// Accepts a bare entry array, a heatmap response, or a calendar
    /// response (heatmap + streak).
    #[tracing::instrument(skip_all, fields(len = text.len()))]
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let value: Value =
            serde_json::from_str(trimmed).context("activity payload is not valid JSON")?;

        let payload = if value.is_array() {
            let entries: Vec<HeatmapEntry> =
                serde_json::from_value(value).context("failed parsing entry array")?;
            Self {
                entries,
                ..Self::default()
            }
        } else if value.get("heatmap").is_some() {
            let response: CalendarResponse =
                serde_json::from_value(value).context("failed parsing calendar response")?;
            Self::from_heatmap(response.heatmap, response.streak)
        } else if value.get("data").is_some() {
            let response: HeatmapResponse =
                serde_json::from_value(value).context("failed parsing heatmap response")?;
            Self::from_heatmap(response, None)
        } else {
            return Err(anyhow!(
                "unrecognized activity payload; expected an array, \
                 a heatmap response or a calendar response, got {}",
                json_kind(&value)
            ));
        };

        debug!(
            entries = payload.entries.len(),
            has_streak = payload.streak.is_some(),
            "parsed activity payload"
        );
        Ok(payload)
    }

    fn from_heatmap(heatmap: HeatmapResponse, streak: Option<StreakData>) -> Self {
        Self {
            entries: heatmap.data,
            start_date: heatmap.start_date,
            end_date: heatmap.end_date,
            total_activities: heatmap.total_activities,
            streak,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object without `data` or `heatmap`",
    }
}

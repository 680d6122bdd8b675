use chrono::NaiveDate;

/// Failures raised while turning activity samples into a calendar grid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    #[error("invalid activity sample {field} `{value}`: {reason}")]
    Validation {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("calendar span {start}..={end} covers {days} days; limit is {limit}")]
    Range {
        start: NaiveDate,
        end: NaiveDate,
        days: i64,
        limit: i64,
    },
}

impl CalendarError {
    pub fn validation(
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

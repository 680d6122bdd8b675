use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

use crate::error::CalendarError;

const TIMEZONE_CONFIG_FILE: &str =
  "streakgrid-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "STREAKGRID_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "STREAKGRID_TIME_CONFIG";
const DEFAULT_CALENDAR_TIMEZONE: &str =
  "UTC";

pub const ISO_DATE_FORMAT: &str =
  "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// The single zone every calendar date
/// is interpreted in. Resolved once at
/// start-up and handed to whoever needs
/// "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarZone {
  tz: Tz
}

impl Default for CalendarZone {
  fn default() -> Self {
    Self::utc()
  }
}

impl CalendarZone {
  #[must_use]
  pub fn utc() -> Self {
    Self {
      tz: chrono_tz::UTC
    }
  }

  #[must_use]
  pub fn new(tz: Tz) -> Self {
    Self {
      tz
    }
  }

  /// Env var first, then the configured
  /// value, then the TOML time file,
  /// then UTC.
  #[tracing::instrument]
  pub fn resolve(
    configured: Option<&str>
  ) -> Self {
    if let Ok(raw) =
      std::env::var(TIMEZONE_ENV_VAR)
      && let Some(tz) = parse_timezone(
        &raw,
        TIMEZONE_ENV_VAR
      )
    {
      return Self::new(tz);
    }

    if let Some(raw) = configured
      && let Some(tz) = parse_timezone(
        raw,
        "calendar.timezone"
      )
    {
      return Self::new(tz);
    }

    if let Some(path) =
      timezone_config_path()
      && let Some(tz) =
        load_timezone_from_file(&path)
    {
      return Self::new(tz);
    }

    Self::new(
      parse_timezone(
        DEFAULT_CALENDAR_TIMEZONE,
        "default"
      )
      .unwrap_or(chrono_tz::UTC)
    )
  }

  #[must_use]
  pub fn name(&self) -> &'static str {
    self.tz.name()
  }

  #[must_use]
  pub fn today(
    &self,
    now: DateTime<Utc>
  ) -> NaiveDate {
    now.with_timezone(&self.tz)
      .date_naive()
  }
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &Path
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured calendar timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Strict `YYYY-MM-DD`; surrounding
/// whitespace is rejected too.
pub fn parse_calendar_date(
  raw: &str
) -> Result<NaiveDate, CalendarError> {
  if raw.len() != 10 {
    return Err(
      CalendarError::validation(
        "date",
        raw,
        "expected YYYY-MM-DD"
      )
    );
  }

  NaiveDate::parse_from_str(
    raw,
    ISO_DATE_FORMAT
  )
  .map_err(|err| {
    CalendarError::validation(
      "date",
      raw,
      err.to_string()
    )
  })
}

#[must_use]
pub fn format_calendar_date(
  date: NaiveDate
) -> String {
  date
    .format(ISO_DATE_FORMAT)
    .to_string()
}

#[tracing::instrument(skip(today))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();

  match token
    .to_ascii_lowercase()
    .as_str()
  {
    | "today" => return Ok(today),
    | "yesterday" => {
      return Ok(add_days(today, -1));
    }
    | "tomorrow" => {
      return Ok(add_days(today, 1));
    }
    | _ => {}
  }

  let rel_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;

  if let Some(caps) =
    rel_re.captures(token)
  {
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let days = match caps
      .name("unit")
      .map(|m| m.as_str())
    {
      | Some("w") => num.checked_mul(7),
      | _ => Some(num)
    };
    let signed = match caps
      .name("sign")
      .map(|m| m.as_str())
    {
      | Some("-") => days.map(|d| -d),
      | _ => days
    };
    return signed
      .and_then(Duration::try_days)
      .and_then(|delta| {
        today.checked_add_signed(delta)
      })
      .ok_or_else(|| {
        anyhow!(
          "relative date out of \
           range: {input}"
        )
      });
  }

  parse_calendar_date(token)
    .map_err(anyhow::Error::from)
    .with_context(|| {
      "supported formats: \
       today/yesterday/tomorrow, \
       +Nd/-Nd, +Nw/-Nw, YYYY-MM-DD"
    })
}

/// Column position of a date in a
/// Sunday-first week.
#[must_use]
pub fn day_index(
  date: NaiveDate
) -> u8 {
  date
    .weekday()
    .num_days_from_sunday()
    as u8
}

#[must_use]
pub fn sunday_on_or_before(
  date: NaiveDate
) -> NaiveDate {
  add_days(
    date,
    -i64::from(day_index(date))
  )
}

#[must_use]
pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

/// Language of month names, weekday
/// labels and activity nouns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
  #[default]
  En,
  Ru
}

impl std::str::FromStr for Locale {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "en" | "english" => {
        Ok(Self::En)
      }
      | "ru" | "russian" => {
        Ok(Self::Ru)
      }
      | other => {
        Err(anyhow!(
          "unsupported locale: {other}"
        ))
      }
    }
  }
}

const MONTHS_EN: [&str; 12] = [
  "Jan", "Feb", "Mar", "Apr", "May",
  "Jun", "Jul", "Aug", "Sep", "Oct",
  "Nov", "Dec"
];

const MONTHS_RU: [&str; 12] = [
  "Янв", "Фев", "Мар", "Апр", "Май",
  "Июн", "Июл", "Авг", "Сен", "Окт",
  "Ноя", "Дек"
];

const WEEKDAYS_EN: [&str; 7] = [
  "Sun", "Mon", "Tue", "Wed", "Thu",
  "Fri", "Sat"
];

const WEEKDAYS_RU: [&str; 7] = [
  "Вс", "Пн", "Вт", "Ср", "Чт", "Пт",
  "Сб"
];

impl Locale {
  /// `month` is 1-based, as returned
  /// by `Datelike::month`.
  #[must_use]
  pub fn month_short(
    self,
    month: u32
  ) -> &'static str {
    let idx = (month.clamp(1, 12) - 1)
      as usize;
    match self {
      | Self::En => MONTHS_EN[idx],
      | Self::Ru => MONTHS_RU[idx]
    }
  }

  #[must_use]
  pub fn weekday_short(
    self,
    day_index: u8
  ) -> &'static str {
    let idx = usize::from(day_index % 7);
    match self {
      | Self::En => WEEKDAYS_EN[idx],
      | Self::Ru => WEEKDAYS_RU[idx]
    }
  }

  #[must_use]
  pub fn activity_noun(
    self,
    count: u64
  ) -> &'static str {
    match self {
      | Self::En => {
        if count == 1 {
          "activity"
        } else {
          "activities"
        }
      }
      | Self::Ru => {
        let tens = count % 100;
        let ones = count % 10;
        if (11..=14).contains(&tens) {
          "активностей"
        } else if ones == 1 {
          "активность"
        } else if (2..=4).contains(&ones)
        {
          "активности"
        } else {
          "активностей"
        }
      }
    }
  }

  #[must_use]
  pub fn legend(
    self
  ) -> (&'static str, &'static str) {
    match self {
      | Self::En => ("Less", "More"),
      | Self::Ru => ("Меньше", "Больше")
    }
  }
}

use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::config::{Config, KEY_TIMEZONE};
use crate::datetime::{CalendarZone, Locale};
use crate::platform::Platform;

/// Everything a command needs, built once per invocation and passed down.
pub struct AppState {
    pub config: Config,
    pub zone: CalendarZone,
    pub locale: Locale,
    pub range_days: u32,
    pub platform: Box<dyn Platform>,
}

impl AppState {
    #[tracing::instrument(skip_all)]
    pub fn new(config: Config, platform: Box<dyn Platform>) -> anyhow::Result<Self> {
        let zone = CalendarZone::resolve(config.get(KEY_TIMEZONE).as_deref());
        let locale = config.locale()?;
        let range_days = config.range_days()?;

        info!(
            zone = zone.name(),
            ?locale,
            range_days,
            host_init_data = platform.init_data().is_some(),
            "application state ready"
        );

        Ok(Self {
            config,
            zone,
            locale,
            range_days,
            platform,
        })
    }

    pub fn today(&self) -> NaiveDate {
        self.zone.today(Utc::now())
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("zone", &self.zone)
            .field("locale", &self.locale)
            .field("range_days", &self.range_days)
            .finish_non_exhaustive()
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const INIT_DATA_ENV_VAR: &str = "STREAKGRID_INIT_DATA";
const STATE_FILE: &str = "state.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Haptic {
    Light,
    Medium,
    Heavy,
    Success,
    Warning,
    Error,
}

/// Capabilities the hosting environment offers. The calendar logic never
/// touches this; only command handlers do.
pub trait Platform {
    /// Signed launch payload from the host, if it provided one.
    fn init_data(&self) -> Option<String>;

    fn show_alert(&self, message: &str);

    fn vibrate(&self, haptic: Haptic);

    fn persist(&self, key: &str, value: &str) -> anyhow::Result<()>;

    fn restore(&self, key: &str) -> anyhow::Result<Option<String>>;
}

/// In-process host: records everything, persists nothing.
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    init_data: Option<String>,
    alerts: Mutex<Vec<String>>,
    haptics: Mutex<Vec<Haptic>>,
    store: Mutex<BTreeMap<String, String>>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_init_data(init_data: impl Into<String>) -> Self {
        Self {
            init_data: Some(init_data.into()),
            ..Self::default()
        }
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn haptics(&self) -> Vec<Haptic> {
        self.haptics.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Platform for MemoryPlatform {
    fn init_data(&self) -> Option<String> {
        self.init_data.clone()
    }

    fn show_alert(&self, message: &str) {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }

    fn vibrate(&self, haptic: Haptic) {
        self.haptics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(haptic);
    }

    fn persist(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn restore(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }
}

/// Terminal host: alerts go to stderr, haptics are logged, and key/value
/// state lives in `state.json` under the data directory.
#[derive(Debug)]
pub struct FilePlatform {
    state_path: PathBuf,
}

impl FilePlatform {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let state_path = data_dir.join(STATE_FILE);
        if !state_path.exists() {
            fs::write(&state_path, "{}")?;
        }

        info!(state = %state_path.display(), "opened platform state");
        Ok(Self { state_path })
    }

    fn load_state(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let raw = fs::read_to_string(&self.state_path)
            .with_context(|| format!("failed reading {}", self.state_path.display()))?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.state_path.display()))
    }

    fn save_state(&self, state: &BTreeMap<String, String>) -> anyhow::Result<()> {
        debug!(file = %self.state_path.display(), keys = state.len(), "saving state atomically");

        let dir = self.state_path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, state)?;
        writeln!(temp)?;
        temp.flush()?;

        temp.persist(&self.state_path).map_err(|err| {
            anyhow!("failed to persist {}: {}", self.state_path.display(), err)
        })?;
        Ok(())
    }
}

impl Platform for FilePlatform {
    fn init_data(&self) -> Option<String> {
        std::env::var(INIT_DATA_ENV_VAR)
            .ok()
            .filter(|raw| !raw.trim().is_empty())
    }

    fn show_alert(&self, message: &str) {
        eprintln!("{message}");
    }

    fn vibrate(&self, haptic: Haptic) {
        debug!(?haptic, "haptic feedback requested");
    }

    #[tracing::instrument(skip(self, value))]
    fn persist(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut state = self.load_state()?;
        state.insert(key.to_string(), value.to_string());
        self.save_state(&state)
    }

    fn restore(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.load_state()?.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn memory_platform_records_calls() {
        let platform = MemoryPlatform::with_init_data("query_id=1");
        platform.show_alert("hello");
        platform.vibrate(Haptic::Light);
        platform.persist("k", "v").expect("persist");

        assert_eq!(platform.init_data().as_deref(), Some("query_id=1"));
        assert_eq!(platform.alerts(), vec!["hello".to_string()]);
        assert_eq!(platform.haptics(), vec![Haptic::Light]);
        assert_eq!(platform.restore("k").expect("restore").as_deref(), Some("v"));
        assert_eq!(platform.restore("missing").expect("restore"), None);
    }

    #[test]
    fn file_platform_survives_reopen() {
        let dir = tempdir().expect("tempdir");
        {
            let platform = FilePlatform::open(dir.path()).expect("open");
            platform.persist("heatmap.selected", "2024-01-02").expect("persist");
            platform.persist("theme", "dark").expect("persist");
        }

        let reopened = FilePlatform::open(dir.path()).expect("reopen");
        assert_eq!(
            reopened.restore("heatmap.selected").expect("restore").as_deref(),
            Some("2024-01-02")
        );
        assert_eq!(reopened.restore("theme").expect("restore").as_deref(), Some("dark"));
    }
}

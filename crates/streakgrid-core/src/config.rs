use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::calendar::{
  DEFAULT_RANGE_DAYS,
  MAX_SPAN_DAYS
};
use crate::datetime::Locale;

const RC_ENV_VAR: &str = "STREAKGRIDRC";
const RC_FILE_NAME: &str =
  ".streakgridrc";
const DATA_DIR_NAME: &str =
  ".streakgrid";

pub const KEY_TIMEZONE: &str =
  "calendar.timezone";
pub const KEY_LOCALE: &str =
  "calendar.locale";
pub const KEY_RANGE_DAYS: &str =
  "calendar.range_days";
pub const KEY_COLOR: &str = "color";
pub const KEY_DATA_LOCATION: &str =
  "data.location";

/// Flat `key = value` settings, layered
/// as defaults < rc file (and its
/// includes) < command-line overrides.
#[derive(Debug, Clone)]
pub struct Config {
  map:              BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = BTreeMap::new();
    for (key, value) in [
      (KEY_TIMEZONE, "UTC".to_string()),
      (KEY_LOCALE, "en".to_string()),
      (
        KEY_RANGE_DAYS,
        DEFAULT_RANGE_DAYS.to_string()
      ),
      (KEY_COLOR, "on".to_string()),
      (
        KEY_DATA_LOCATION,
        format!("~/{DATA_DIR_NAME}")
      )
    ] {
      map.insert(key.to_string(), value);
    }

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    match resolve_rc_path(rc_override)?
    {
      | Some(path) => {
        info!(rc = %path.display(), "loading rc file");
        cfg.load_file(&path)?;
      }
      | None => {
        debug!(
          "no rc file found; using \
           defaults"
        );
      }
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    self
      .map
      .get(key)
      .map(|raw| {
        parse_bool(raw).ok_or_else(|| {
          anyhow!(
            "{key} must be on/off, \
             got `{raw}`"
          )
        })
      })
      .transpose()
  }

  pub fn get_u32(
    &self,
    key: &str
  ) -> anyhow::Result<Option<u32>> {
    self
      .map
      .get(key)
      .map(|raw| {
        raw.trim().parse::<u32>().with_context(
          || {
            format!(
              "{key} must be a \
               non-negative integer, \
               got `{raw}`"
            )
          }
        )
      })
      .transpose()
  }

  pub fn locale(
    &self
  ) -> anyhow::Result<Locale> {
    self
      .get(KEY_LOCALE)
      .map(|raw| raw.parse::<Locale>())
      .transpose()
      .map(Option::unwrap_or_default)
  }

  /// Look-back window, bounded by the
  /// longest span a calendar may cover.
  pub fn range_days(
    &self
  ) -> anyhow::Result<u32> {
    let days = self
      .get_u32(KEY_RANGE_DAYS)?
      .unwrap_or(DEFAULT_RANGE_DAYS);
    if i64::from(days) > MAX_SPAN_DAYS {
      return Err(anyhow!(
        "{KEY_RANGE_DAYS} must be at \
         most {MAX_SPAN_DAYS}, got \
         {days}"
      ));
    }
    Ok(days)
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    if self.loaded_files.contains(&path)
    {
      return Err(anyhow!(
        "include cycle detected at {}",
        path.display()
      ));
    }

    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let line = raw_line
        .split_once('#')
        .map_or(raw_line, |(before, _)| {
          before
        })
        .trim();

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      if key.is_empty() {
        return Err(anyhow!(
          "empty key at {}:{}",
          path.display(),
          line_num + 1
        ));
      }
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get(KEY_DATA_LOCATION)
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    let home = dirs::home_dir()
      .ok_or_else(|| {
        anyhow!(
          "cannot determine home \
           directory"
        )
      })?;
    home.join(DATA_DIR_NAME)
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping rc file"
    );
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::*;

  #[test]
  fn rc_file_with_include_and_overrides()
  {
    let dir =
      tempdir().expect("tempdir");
    let extra = dir.path().join("extra");
    fs::write(
      &extra,
      "calendar.locale = ru\n"
    )
    .expect("write include");

    let rc = dir.path().join("rc");
    fs::write(
      &rc,
      "# heatmap settings\n\
       calendar.range_days = 90 # \
       quarter\n\
       include extra\n\
       color = off\n"
    )
    .expect("write rc");

    let mut cfg = Config::load(Some(rc.as_path()))
      .expect("load rc");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.range_days().expect("days"),
      90
    );
    assert_eq!(
      cfg.locale().expect("locale"),
      Locale::Ru
    );
    assert_eq!(
      cfg
        .get_bool(KEY_COLOR)
        .expect("color flag"),
      Some(false)
    );

    cfg.apply_overrides(vec![(
      "rc.calendar.timezone".to_string(),
      "Europe/Moscow".to_string()
    )]);
    assert_eq!(
      cfg.get(KEY_TIMEZONE).as_deref(),
      Some("Europe/Moscow")
    );
  }

  #[test]
  fn rejects_lines_without_equals() {
    let dir =
      tempdir().expect("tempdir");
    let rc = dir.path().join("rc");
    fs::write(&rc, "color on\n")
      .expect("write rc");
    let err = Config::load(Some(rc.as_path()))
      .expect_err("malformed line");
    assert!(
      err
        .to_string()
        .contains("invalid config line")
    );
  }

  #[test]
  fn bad_numbers_surface_the_key() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      KEY_RANGE_DAYS.to_string(),
      "-5".to_string()
    )]);
    let err = cfg
      .range_days()
      .expect_err("negative span");
    assert!(
      err
        .to_string()
        .contains(KEY_RANGE_DAYS)
    );
  }

  #[test]
  fn range_days_is_bounded_by_max_span()
  {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      KEY_RANGE_DAYS.to_string(),
      MAX_SPAN_DAYS.to_string()
    )]);
    assert_eq!(
      i64::from(
        cfg.range_days().expect("limit")
      ),
      MAX_SPAN_DAYS
    );

    cfg.apply_overrides(vec![(
      KEY_RANGE_DAYS.to_string(),
      u32::MAX.to_string()
    )]);
    let err = cfg
      .range_days()
      .expect_err("beyond limit");
    assert!(
      err.to_string().contains("at most")
    );
  }

  #[test]
  fn strict_flags() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      KEY_COLOR.to_string(),
      "maybe".to_string()
    )]);
    assert!(
      cfg.get_bool(KEY_COLOR).is_err()
    );
    assert_eq!(
      cfg
        .get_bool("missing.flag")
        .expect("absent"),
      None
    );
  }

  #[test]
  fn include_cycles_are_errors() {
    let dir =
      tempdir().expect("tempdir");
    let rc = dir.path().join("rc");
    fs::write(&rc, "include rc\n")
      .expect("write rc");
    assert!(
      Config::load(Some(rc.as_path())).is_err()
    );
  }
}

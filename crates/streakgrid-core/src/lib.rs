pub mod activity;
pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod platform;
pub mod render;
pub mod sql;
pub mod state;
pub mod streak;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use activity::{
  ActivitySample,
  HeatmapEntry
};
pub use calendar::{
  Calendar,
  CalendarDay,
  CalendarRange,
  MonthLabel,
  intensity_bucket,
  reconstruct,
  reconstruct_samples
};
pub use error::CalendarError;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting streakgrid"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let platform =
    platform::FilePlatform::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open platform state \
         at {}",
        data_dir.display()
      )
    })?;

  let state = state::AppState::new(
    cfg,
    Box::new(platform)
  )?;
  let renderer = render::Renderer::new(
    &state.config,
    state.locale
  )?;
  let inv =
    cli::Invocation::parse(cli.rest)?;

  commands::dispatch(
    &state, &renderer, inv
  )?;

  info!("done");
  Ok(())
}

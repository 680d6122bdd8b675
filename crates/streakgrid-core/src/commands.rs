use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::activity::{ActivityPayload, parse_samples};
use crate::calendar::{
    Calendar, CalendarDay, CalendarRange, describe_day, intensity_bucket, localize_labels,
    reconstruct_samples, serialize_date,
};
use crate::cli::{Invocation, known_command_names};
use crate::datetime::{format_calendar_date, parse_calendar_date, parse_date_expr};
use crate::platform::Haptic;
use crate::render::Renderer;
use crate::sql::{extract_table_names, format_sql};
use crate::state::AppState;
use crate::streak::StreakData;

pub const SELECTED_DAY_KEY: &str = "heatmap.selected";

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "heatmap", no_binary_name = true)]
pub struct HeatmapArgs {
    /// Activity JSON; `-` or omitted reads stdin.
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    #[arg(long)]
    pub start: Option<String>,

    #[arg(long)]
    pub end: Option<String>,

    /// Overrides the current date, mostly for reproducible output.
    #[arg(long)]
    pub today: Option<String>,

    #[arg(long)]
    pub json: bool,

    /// Describe one day as if its cell had been tapped.
    #[arg(long)]
    pub select: Option<String>,
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "streak", no_binary_name = true)]
pub struct StreakArgs {
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    #[arg(long)]
    pub today: Option<String>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "bucket", no_binary_name = true)]
pub struct BucketArgs {
    pub count: u32,
    pub max: u32,
}

/// A reconstructed calendar plus what is shown alongside it.
#[derive(Debug, Clone, Serialize)]
pub struct HeatmapView {
    #[serde(serialize_with = "serialize_date")]
    pub start_date: NaiveDate,
    #[serde(serialize_with = "serialize_date")]
    pub end_date: NaiveDate,
    pub total_activities: u64,
    pub calendar: Calendar,
    pub streak: StreakData,
}

#[instrument(skip(state, renderer, inv))]
pub fn dispatch(state: &AppState, renderer: &Renderer, inv: Invocation) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, "dispatching command");

    match command {
        "heatmap" => cmd_heatmap(state, renderer, &inv.command_args),
        "streak" => cmd_streak(state, renderer, &inv.command_args),
        "bucket" => cmd_bucket(&inv.command_args),
        "tables" => cmd_tables(&inv.command_args),
        "show" => cmd_show(state),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(state, renderer, args))]
fn cmd_heatmap(state: &AppState, renderer: &Renderer, args: &[String]) -> anyhow::Result<()> {
    info!("command heatmap");
    let opts = HeatmapArgs::try_parse_from(args)?;
    let payload = read_payload(opts.input.as_deref())?;
    let view = build_heatmap(state, &payload, &opts)?;

    if opts.json {
        renderer.print_json(&view)?;
    } else {
        renderer.print_calendar(&view.calendar, Some(&view.streak))?;
    }

    if let Some(raw) = &opts.select {
        let today = resolve_today(state, opts.today.as_deref())?;
        let date = parse_date_expr(raw, today)?;
        select_day(state, &view.calendar, date)?;
    }

    Ok(())
}

/// Explicit flags win over the range echoed in the payload, which wins over
/// the configured look-back from today.
#[instrument(skip(state, payload, opts))]
pub fn build_heatmap(
    state: &AppState,
    payload: &ActivityPayload,
    opts: &HeatmapArgs,
) -> anyhow::Result<HeatmapView> {
    let today = resolve_today(state, opts.today.as_deref())?;

    let start = match &opts.start {
        Some(raw) => Some(parse_date_expr(raw, today)?),
        None => payload
            .start_date
            .as_deref()
            .map(parse_calendar_date)
            .transpose()
            .context("payload start_date")?,
    };
    let end = match &opts.end {
        Some(raw) => Some(parse_date_expr(raw, today)?),
        None => payload
            .end_date
            .as_deref()
            .map(parse_calendar_date)
            .transpose()
            .context("payload end_date")?,
    };

    let samples = parse_samples(&payload.entries).context("invalid activity sample")?;
    let range = CalendarRange::resolve_with_span(start, end, today, state.range_days);
    let mut calendar = reconstruct_samples(&samples, range)?;
    localize_labels(&mut calendar, state.locale);

    let total_activities: u64 = samples.iter().map(|s| u64::from(s.count)).sum();
    if let Some(reported) = payload.total_activities
        && reported != total_activities
    {
        warn!(reported, computed = total_activities, "payload total disagrees with samples");
    }

    let streak = payload
        .streak
        .clone()
        .unwrap_or_else(|| StreakData::from_samples(&samples, today));

    Ok(HeatmapView {
        start_date: range.start,
        end_date: range.end,
        total_activities,
        calendar,
        streak,
    })
}

/// Host feedback for a tapped cell: a light haptic and an alert with the
/// day's description, remembered across runs. Dates off the grid only
/// produce a warning haptic.
#[instrument(skip(state, calendar))]
pub fn select_day(
    state: &AppState,
    calendar: &Calendar,
    date: NaiveDate,
) -> anyhow::Result<Option<CalendarDay>> {
    let Some(day) = calendar.day(date).copied() else {
        state.platform.vibrate(Haptic::Warning);
        warn!(%date, "selected date is outside the calendar");
        return Ok(None);
    };

    state.platform.vibrate(Haptic::Light);
    state.platform.show_alert(&describe_day(&day, state.locale));
    state
        .platform
        .persist(SELECTED_DAY_KEY, &format_calendar_date(date))?;
    Ok(Some(day))
}

#[instrument(skip(state, renderer, args))]
fn cmd_streak(state: &AppState, renderer: &Renderer, args: &[String]) -> anyhow::Result<()> {
    info!("command streak");
    let opts = StreakArgs::try_parse_from(args)?;
    let payload = read_payload(opts.input.as_deref())?;

    let streak = match payload.streak {
        Some(streak) => streak,
        None => {
            let today = resolve_today(state, opts.today.as_deref())?;
            let samples = parse_samples(&payload.entries).context("invalid activity sample")?;
            StreakData::from_samples(&samples, today)
        }
    };

    if opts.json {
        renderer.print_json(&streak)
    } else {
        renderer.print_streak(&streak)
    }
}

fn cmd_bucket(args: &[String]) -> anyhow::Result<()> {
    let opts = BucketArgs::try_parse_from(args)?;
    println!("{}", intensity_bucket(opts.count, opts.max));
    Ok(())
}

fn cmd_tables(args: &[String]) -> anyhow::Result<()> {
    if args.is_empty() {
        return Err(anyhow!("usage: streakgrid tables <sql>..."));
    }
    let sql = format_sql(&args.join(" "));
    for name in extract_table_names(&sql) {
        println!("{name}");
    }
    Ok(())
}

fn cmd_show(state: &AppState) -> anyhow::Result<()> {
    for (key, value) in state.config.iter() {
        println!("{key}={value}");
    }
    for file in &state.config.loaded_files {
        println!("# loaded {}", file.display());
    }
    println!("# zone {}", state.zone.name());
    if let Some(restored) = state.platform.restore(SELECTED_DAY_KEY)? {
        println!("# last selected {restored}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!("usage: streakgrid [options] <command> [args]");
    println!("commands: {}", known_command_names().join(", "));
    Ok(())
}

fn resolve_today(state: &AppState, raw: Option<&str>) -> anyhow::Result<NaiveDate> {
    let today = state.today();
    match raw {
        Some(expr) => parse_date_expr(expr, today),
        None => Ok(today),
    }
}

#[instrument]
fn read_payload(input: Option<&Path>) -> anyhow::Result<ActivityPayload> {
    let text = match input {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read activity payload from stdin")?;
            buf
        }
    };
    ActivityPayload::parse(&text)
}

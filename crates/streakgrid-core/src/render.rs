use std::io::{self, IsTerminal, Write};

use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::calendar::{BUCKETS, Calendar};
use crate::config::{Config, KEY_COLOR};
use crate::datetime::Locale;
use crate::streak::StreakData;

const CELL_WIDTH: usize = 2;
const GLYPHS: [&str; BUCKETS as usize] = ["·", "░", "▒", "▓", "█"];
const COLORS: [&str; BUCKETS as usize] = ["90", "38;5;22", "38;5;28", "38;5;34", "38;5;40"];

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    locale: Locale,
}

impl Renderer {
    pub fn new(cfg: &Config, locale: Locale) -> anyhow::Result<Self> {
        let color = cfg.get_bool(KEY_COLOR)?.unwrap_or(true);
        Ok(Self { color, locale })
    }

    pub fn plain(locale: Locale) -> Self {
        Self {
            color: false,
            locale,
        }
    }

    #[tracing::instrument(skip_all, fields(days = calendar.days.len()))]
    pub fn print_calendar(
        &self,
        calendar: &Calendar,
        streak: Option<&StreakData>,
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        let color = self.color && io::stdout().is_terminal();
        self.write_calendar(out, calendar, streak, color)
    }

    pub fn print_streak(&self, streak: &StreakData) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", self.streak_line(streak))?;
        writeln!(out, "active days  {}", streak.total_active_days)?;
        if let Some(last) = &streak.last_active_date {
            writeln!(out, "last active  {last}")?;
        }
        if let Some(start) = &streak.streak_start_date {
            writeln!(out, "streak since {start}")?;
        }
        Ok(())
    }

    pub fn print_json<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, value)?;
        writeln!(out)?;
        Ok(())
    }

    pub fn write_calendar<W: Write>(
        &self,
        mut writer: W,
        calendar: &Calendar,
        streak: Option<&StreakData>,
        color: bool,
    ) -> anyhow::Result<()> {
        let gutter = (0..7u8)
            .map(|idx| UnicodeWidthStr::width(self.locale.weekday_short(idx)))
            .max()
            .unwrap_or(0)
            + 1;

        writeln!(writer, "{}", self.month_row(calendar, gutter))?;

        for day_index in 0..7u8 {
            let label = if day_index % 2 == 1 {
                self.locale.weekday_short(day_index)
            } else {
                ""
            };
            write!(writer, "{}", pad_to(label, gutter))?;

            for week in 0..calendar.week_count() {
                match calendar.cell(week, day_index) {
                    Some(day) => {
                        let bucket = usize::from(calendar.bucket(day));
                        write!(writer, "{} ", paint(GLYPHS[bucket], COLORS[bucket], color))?;
                    }
                    None => write!(writer, "{}", " ".repeat(CELL_WIDTH))?,
                }
            }
            writeln!(writer)?;
        }

        let (less, more) = self.locale.legend();
        let swatches = GLYPHS
            .iter()
            .zip(COLORS)
            .map(|(glyph, code)| paint(glyph, code, color))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(writer, "{}{less} {swatches} {more}", " ".repeat(gutter))?;

        let total = calendar.total_activities();
        writeln!(
            writer,
            "{total} {} over {} active days",
            self.locale.activity_noun(total),
            calendar.active_days()
        )?;

        if let Some(streak) = streak.filter(|s| s.current_streak > 0 || s.longest_streak > 0) {
            writeln!(writer, "{}", self.streak_line(streak))?;
        }

        Ok(())
    }

    fn month_row(&self, calendar: &Calendar, gutter: usize) -> String {
        let mut row = " ".repeat(gutter);
        let mut column = gutter;

        for label in &calendar.month_labels {
            let position = gutter + label.week_index as usize * CELL_WIDTH;
            if position < column {
                continue;
            }
            row.push_str(&" ".repeat(position - column));
            row.push_str(label.label);
            column = position + UnicodeWidthStr::width(label.label) + 1;
            row.push(' ');
        }

        row.trim_end().to_string()
    }

    fn streak_line(&self, streak: &StreakData) -> String {
        match self.locale {
            Locale::En => format!(
                "current streak {} days, longest {} days",
                streak.current_streak, streak.longest_streak
            ),
            Locale::Ru => format!(
                "текущая серия {} дн., лучшая серия {} дн.",
                streak.current_streak, streak.longest_streak
            ),
        }
    }
}

fn pad_to(text: &str, width: usize) -> String {
    let visible = UnicodeWidthStr::width(text);
    format!("{text}{}", " ".repeat(width.saturating_sub(visible)))
}

fn paint(text: &str, code: &str, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    format!("\x1b[{code}m{text}\x1b[0m")
}

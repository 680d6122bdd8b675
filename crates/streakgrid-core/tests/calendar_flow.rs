use chrono::NaiveDate;
use streakgrid_core::activity::ActivityPayload;
use streakgrid_core::commands::{HeatmapArgs, SELECTED_DAY_KEY, build_heatmap, select_day};
use streakgrid_core::config::Config;
use streakgrid_core::datetime::{Locale, add_days};
use streakgrid_core::platform::{FilePlatform, Haptic, MemoryPlatform, Platform};
use streakgrid_core::state::AppState;
use streakgrid_core::{
    ActivitySample, CalendarRange, HeatmapEntry, intensity_bucket, reconstruct, reconstruct_samples,
};
use tempfile::tempdir;

fn d(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
}

fn state_with(overrides: &[(&str, &str)]) -> AppState {
    let mut cfg = Config::default();
    cfg.apply_overrides(
        overrides
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    );
    AppState::new(cfg, Box::new(MemoryPlatform::new())).expect("state")
}

#[test]
fn grid_invariants_hold_across_ranges() {
    let samples: Vec<ActivitySample> = (0..40)
        .map(|i| ActivitySample::new(add_days(d("2023-11-20"), i * 3), (i % 7) as u32))
        .collect();

    let starts = ["2023-12-01", "2023-12-03", "2024-01-01", "2024-02-29", "2024-03-10"];
    let ends = ["2024-01-07", "2024-03-31", "2024-12-31"];

    for start in starts {
        for end in ends {
            let range = CalendarRange {
                start: d(start),
                end: d(end),
            };
            let cal = reconstruct_samples(&samples, range).expect("reconstruct");
            if range.start > range.end {
                assert!(cal.days.is_empty());
                continue;
            }

            let first = cal.days.first().expect("non-empty grid");
            assert_eq!(first.day_index, 0, "{start}..{end} starts on Sunday");
            assert!(first.date <= range.start);
            assert!((range.start - first.date).num_days() < 7);
            assert_eq!(
                cal.days.len() as i64,
                (range.end - first.date).num_days() + 1
            );
            assert!(cal.max_count >= 1);

            for pair in cal.days.windows(2) {
                assert_eq!(pair[1].date, add_days(pair[0].date, 1));
                if pair[1].day_index == 0 {
                    assert_eq!(pair[1].week_index, pair[0].week_index + 1);
                } else {
                    assert_eq!(pair[1].week_index, pair[0].week_index);
                    assert_eq!(pair[1].day_index, pair[0].day_index + 1);
                }
            }

            for (idx, day) in cal.days.iter().enumerate() {
                assert_eq!(day.week_index as usize, idx / 7);
            }
        }
    }
}

#[test]
fn empty_week_is_all_zero() {
    let cal = reconstruct(&[], Some(d("2024-01-01")), Some(d("2024-01-07")), d("2024-06-01"))
        .expect("reconstruct");
    assert!(cal.days.len() >= 7);
    assert!(cal.days.iter().all(|day| day.count == 0));
    assert_eq!(cal.max_count, 1);
}

#[test]
fn bucket_extremes() {
    for max in [1, 2, 7, 100, u32::MAX] {
        assert_eq!(intensity_bucket(0, max), 0);
        assert_eq!(intensity_bucket(max, max), 4);
    }
}

#[test]
fn wire_entries_reconstruct_like_the_heatmap_endpoint() {
    let entries = vec![
        HeatmapEntry::new("2024-01-10", 10),
        HeatmapEntry::new("2024-01-11", 5),
    ];
    let cal = reconstruct(&entries, Some(d("2024-01-01")), Some(d("2024-01-31")), d("2024-02-01"))
        .expect("reconstruct");
    assert_eq!(cal.max_count, 10);
    let ten = cal.day(d("2024-01-10")).expect("in grid");
    let five = cal.day(d("2024-01-11")).expect("in grid");
    assert_eq!(cal.bucket(ten), 4);
    assert_eq!(cal.bucket(five), 2);
}

#[test]
fn heatmap_view_prefers_flags_then_payload_range() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("calendar.json");
    std::fs::write(
        &path,
        r#"{"heatmap":{"user_id":1,"start_date":"2024-01-01","end_date":"2024-02-29",
            "data":[{"date":"2024-01-15","count":2},{"date":"2024-02-15","count":4}],
            "total_activities":6}}"#,
    )
    .expect("write payload");
    let payload =
        ActivityPayload::parse(&std::fs::read_to_string(&path).expect("read")).expect("parse");

    let state = state_with(&[("calendar.locale", "ru")]);
    let opts = HeatmapArgs {
        today: Some("2024-02-16".to_string()),
        ..HeatmapArgs::default()
    };
    let view = build_heatmap(&state, &payload, &opts).expect("view");

    assert_eq!(view.start_date, d("2024-01-01"));
    assert_eq!(view.end_date, d("2024-02-29"));
    assert_eq!(view.total_activities, 6);
    let labels: Vec<_> = view.calendar.month_labels.iter().map(|l| l.label).collect();
    assert_eq!(labels, vec!["Дек", "Янв", "Фев"]);
    // computed from samples since the payload carried no streak block
    assert_eq!(view.streak.current_streak, 1);
    assert_eq!(view.streak.longest_streak, 1);
    assert_eq!(view.streak.total_active_days, 2);

    let narrowed = HeatmapArgs {
        start: Some("2024-02-01".to_string()),
        end: Some("today".to_string()),
        today: Some("2024-02-16".to_string()),
        ..HeatmapArgs::default()
    };
    let view = build_heatmap(&state, &payload, &narrowed).expect("view");
    assert_eq!(view.calendar.days[0].date, d("2024-01-28"));
    assert_eq!(view.calendar.days.last().map(|day| day.date), Some(d("2024-02-16")));
}

#[test]
fn configured_look_back_applies_without_a_range() {
    let state = state_with(&[("calendar.range_days", "30")]);
    let payload = ActivityPayload::parse("[]").expect("parse");
    let opts = HeatmapArgs {
        today: Some("2024-03-31".to_string()),
        ..HeatmapArgs::default()
    };
    let view = build_heatmap(&state, &payload, &opts).expect("view");
    assert_eq!(view.start_date, d("2024-03-01"));
    assert_eq!(view.calendar.max_count, 1);
}

#[test]
fn malformed_payload_sample_is_rejected() {
    let state = state_with(&[]);
    let payload =
        ActivityPayload::parse(r#"[{"date":"2024-01-02","count":-4}]"#).expect("parse json");
    let err = build_heatmap(&state, &payload, &HeatmapArgs::default()).expect_err("negative");
    assert!(format!("{err:#}").contains("non-negative"));
}

#[test]
fn selecting_a_day_talks_to_the_platform() {
    let platform = MemoryPlatform::new();
    let samples = [ActivitySample::new(d("2024-01-02"), 3)];
    let cal = reconstruct_samples(
        &samples,
        CalendarRange {
            start: d("2024-01-01"),
            end: d("2024-01-07"),
        },
    )
    .expect("reconstruct");

    let state = AppState::new(Config::default(), Box::new(platform)).expect("state");
    let day = select_day(&state, &cal, d("2024-01-02"))
        .expect("select")
        .expect("in grid");
    assert_eq!(day.count, 3);
    assert_eq!(
        state.platform.restore(SELECTED_DAY_KEY).expect("restore").as_deref(),
        Some("2024-01-02")
    );

    assert!(select_day(&state, &cal, d("2025-01-01")).expect("select").is_none());
    assert_eq!(state.locale, Locale::En);
}

#[test]
fn memory_platform_sees_alert_and_haptics() {
    let platform = MemoryPlatform::new();
    let cal = reconstruct_samples(
        &[ActivitySample::new(d("2024-01-02"), 1)],
        CalendarRange {
            start: d("2024-01-01"),
            end: d("2024-01-07"),
        },
    )
    .expect("reconstruct");
    let day = cal.day(d("2024-01-02")).expect("in grid");

    platform.vibrate(Haptic::Light);
    platform.show_alert(&streakgrid_core::calendar::describe_day(day, Locale::Ru));
    assert_eq!(platform.alerts(), vec!["2024-01-02: 1 активность".to_string()]);
    assert_eq!(platform.haptics(), vec![Haptic::Light]);
}

#[test]
fn rc_file_drives_state_and_file_platform_round_trips() {
    let dir = tempdir().expect("tempdir");
    let rc = dir.path().join("streakgridrc");
    std::fs::write(
        &rc,
        "calendar.timezone = Europe/Moscow\ncalendar.locale = ru\ncalendar.range_days = 90\n",
    )
    .expect("write rc");

    let cfg = Config::load(Some(rc.as_path())).expect("load config");
    let data_dir = dir.path().join("data");
    let platform = FilePlatform::open(&data_dir).expect("open platform");
    let state = AppState::new(cfg, Box::new(platform)).expect("state");

    assert_eq!(state.zone.name(), "Europe/Moscow");
    assert_eq!(state.locale, Locale::Ru);
    assert_eq!(state.range_days, 90);

    state
        .platform
        .persist(SELECTED_DAY_KEY, "2024-01-02")
        .expect("persist");

    let reopened = FilePlatform::open(&data_dir).expect("reopen platform");
    assert_eq!(
        reopened.restore(SELECTED_DAY_KEY).expect("restore").as_deref(),
        Some("2024-01-02")
    );
    assert_eq!(reopened.restore("missing").expect("restore"), None);
}

use std::io::Write;

use almanac_core::datastore::{EventSource, filter_to_month};
use almanac_core::datetime::{RawValue, ValueKind, normalize};
use almanac_core::{
    CalendarConfig, CalendarOptions, CalendarView, FieldAccessors, bind_events, build_grid,
    merge_event_flags,
};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::json;
use tempfile::Builder;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).single().expect("valid now")
}

fn config(year: i64, month: i64, celebrations: &[&str]) -> CalendarConfig {
    let options = CalendarOptions {
        year: Some(year),
        month: Some(month),
        celebrations: celebrations.iter().map(ToString::to_string).collect(),
        ..CalendarOptions::default()
    };
    CalendarConfig::from_options(&options, chrono_tz::UTC, now())
}

fn in_month_dates(config: &CalendarConfig) -> Vec<String> {
    build_grid(config)
        .cells()
        .iter()
        .filter(|cell| cell.in_month)
        .map(|cell| cell.canonical_date())
        .collect()
}

#[test]
fn january_2025_starts_on_wednesday() {
    let grid = build_grid(&config(2025, 1, &[]));
    assert_eq!(grid.len(), 42);
    assert_eq!(grid.leading_padding(), 3);

    let dates = in_month_dates(&config(2025, 1, &[]));
    assert_eq!(dates.first().map(String::as_str), Some("2025-01-01"));
    assert_eq!(dates.last().map(String::as_str), Some("2025-01-31"));
}

#[test]
fn february_length_depends_on_leap_year() {
    let leap = in_month_dates(&config(2024, 2, &[]));
    assert_eq!(leap.last().map(String::as_str), Some("2024-02-29"));
    assert!(!leap.iter().any(|d| d == "2024-02-30"));

    let common = in_month_dates(&config(2025, 2, &[]));
    assert_eq!(common.last().map(String::as_str), Some("2025-02-28"));
    assert!(!common.iter().any(|d| d == "2025-02-29"));
}

#[test]
fn records_group_by_day_in_time_order() {
    let records = vec![
        json!({"date": "2025-05-15", "time": "2025-05-15 10:00:00", "title": "Event 1"}),
        json!({"date": "2025-05-15", "time": "2025-05-15 14:30:00", "title": "Event 2"}),
        json!({"date": "2025-05-20", "time": "2025-05-20 09:00:00", "title": "Event 3"}),
    ];
    let config = config(2025, 5, &[]);
    let events = bind_events(&records, &config, &FieldAccessors::default());

    let times = |date: &str| -> Vec<String> {
        events.get(date).iter().map(|event| event.time.clone()).collect()
    };
    assert_eq!(events.len(), 2);
    assert_eq!(times("2025-05-15"), ["10:00", "14:30"]);
    assert_eq!(times("2025-05-20"), ["09:00"]);
}

#[test]
fn celebrations_flag_fixed_and_recurring_dates() {
    let december = build_grid(&config(2025, 12, &["01-01", "2025-12-25"]));
    let flagged: Vec<String> = december
        .cells()
        .iter()
        .filter(|cell| cell.is_celebration)
        .map(|cell| cell.canonical_date())
        .collect();
    assert_eq!(flagged, ["2025-12-25"]);

    let january = build_grid(&config(2025, 1, &["01-01", "2025-12-25"]));
    let flagged: Vec<String> = january
        .cells()
        .iter()
        .filter(|cell| cell.is_celebration)
        .map(|cell| cell.canonical_date())
        .collect();
    assert_eq!(flagged, ["2025-01-01"]);
}

#[test]
fn malformed_record_date_does_not_disturb_others() {
    let records = vec![
        json!({"date": "2025-05-15", "time": "10:00", "title": "Kept"}),
        json!({"date": "not-a-date", "time": "10:00", "title": "Dropped"}),
        json!({"date": "2025-05-15", "time": "08:00", "title": "Earlier"}),
    ];
    let config = config(2025, 5, &[]);
    let events = bind_events(&records, &config, &FieldAccessors::default());

    assert_eq!(events.total_events(), 2);
    let titles: Vec<&str> = events
        .get("2025-05-15")
        .iter()
        .map(|event| event.title.as_str())
        .collect();
    assert_eq!(titles, ["Earlier", "Kept"]);
}

#[test]
fn epoch_records_match_string_records() {
    let tz: Tz = "America/New_York".parse().expect("valid timezone");
    let local = tz.with_ymd_and_hms(2025, 5, 15, 23, 45, 0).single().expect("valid instant");

    let epoch_date = normalize(&RawValue::Timestamp(local.timestamp()), ValueKind::Date, tz)
        .expect("epoch date");
    let epoch_time = normalize(&RawValue::Timestamp(local.timestamp()), ValueKind::Time, tz)
        .expect("epoch time");
    let text_date = normalize(&RawValue::from("2025-05-15"), ValueKind::Date, tz).expect("date");
    let text_time = normalize(&RawValue::from("23:45"), ValueKind::Time, tz).expect("time");

    assert_eq!(epoch_date.canonical_date(), text_date.canonical_date());
    assert_eq!(epoch_time.canonical_time(), text_time.canonical_time());
}

#[test]
fn merge_is_idempotent_and_grid_builds_deterministically() {
    let records = vec![json!({"date": "2025-05-15", "time": "10:00", "title": "A"})];
    let config = config(2025, 5, &[]);
    let events = bind_events(&records, &config, &FieldAccessors::default());

    assert_eq!(build_grid(&config), build_grid(&config));
    let once = merge_event_flags(build_grid(&config), &events);
    let twice = merge_event_flags(once.clone(), &events);
    assert_eq!(once, twice);
}

#[test]
fn file_backed_month_render() {
    let mut file = Builder::new().suffix(".json").tempfile().expect("tempfile");
    write!(
        file,
        "{}",
        json!([
            {"date": "2025-04-30", "time": "12:00", "title": "Last month"},
            {"date": "2025-05-02", "time": "18:00", "title": "Dinner"},
            {"date": "2025-05-02", "time": "07:30", "title": "Run"},
            {"date": "2025-06-01", "time": "12:00", "title": "Next month"}
        ])
    )
    .expect("write events");

    let options = CalendarOptions {
        year: Some(2025),
        month: Some(5),
        selected_date: Some("2025-05-02".to_string()),
        first_day_of_week: Some(1),
        ..CalendarOptions::default()
    };
    let config = CalendarConfig::from_options(&options, chrono_tz::UTC, now());
    let accessors = FieldAccessors::default();
    let records = filter_to_month(
        EventSource::open(file.path()).expect("open").load().expect("load"),
        &config,
        &accessors,
    );
    assert_eq!(records.len(), 2);

    let view = CalendarView::assemble(&config, &records, &accessors, &[]);
    assert_eq!(view.title, "May 2025");
    assert_eq!(view.day_names[0], "Mon");
    let titles: Vec<&str> = view
        .selected_events()
        .iter()
        .map(|event| event.title.as_str())
        .collect();
    assert_eq!(titles, ["Run", "Dinner"]);

    let flagged: Vec<String> = view
        .grid
        .cells()
        .iter()
        .filter(|cell| cell.has_events)
        .map(|cell| cell.canonical_date())
        .collect();
    assert_eq!(flagged, ["2025-05-02"]);
}

use chrono::Month;
use serde::Serialize;

use crate::config::CalendarConfig;
use crate::events::{
  EventRecord,
  EventsByDate,
  FieldAccessors,
  NormalizedEvent,
  bind_events,
  merge_event_flags
};
use crate::grid::{
  DAYS_PER_WEEK,
  Grid,
  build_grid,
  shift_month
};

pub const DEFAULT_DAY_NAMES: [&str; 7] = [
  "Sun", "Mon", "Tue", "Wed", "Thu", "Fri",
  "Sat"
];

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize,
)]
pub struct MonthRef {
  pub year:  i32,
  pub month: u32
}

/// Everything a presenter needs for one
/// render of the calendar.
#[derive(Debug, Clone, Serialize)]
#[serde(bound = "", rename_all = "camelCase")]
pub struct CalendarView<'a, R> {
  pub year:          i32,
  pub month:         u32,
  pub title:         String,
  pub day_names:     Vec<String>,
  pub previous:      MonthRef,
  pub next:          MonthRef,
  pub selected_date: String,
  pub today:         String,
  pub grid:          Grid,
  pub events:        EventsByDate<'a, R>
}

impl<'a, R: EventRecord> CalendarView<'a, R> {
  /// Binds `records`, builds the grid and
  /// merges the event flags into it.
  #[tracing::instrument(
    skip_all,
    fields(
      year = config.year(),
      month = config.month()
    )
  )]
  pub fn assemble(
    config: &CalendarConfig,
    records: &'a [R],
    accessors: &FieldAccessors,
    day_names: &[String]
  ) -> Self {
    let events =
      bind_events(records, config, accessors);
    let grid =
      merge_event_flags(build_grid(config), &events);

    let (prev_year, prev_month) =
      shift_month(config.year(), config.month(), -1);
    let (next_year, next_month) =
      shift_month(config.year(), config.month(), 1);

    Self {
      year: config.year(),
      month: config.month(),
      title: format!(
        "{} {}",
        month_name(config.month()),
        config.year()
      ),
      day_names: ordered_day_names(
        day_names,
        config.first_day_of_week()
      ),
      previous: MonthRef {
        year:  prev_year,
        month: prev_month
      },
      next: MonthRef {
        year:  next_year,
        month: next_month
      },
      selected_date: config
        .selected_date()
        .format("%Y-%m-%d")
        .to_string(),
      today: config
        .today()
        .format("%Y-%m-%d")
        .to_string(),
      grid,
      events
    }
  }
}

impl<'a, R> CalendarView<'a, R> {
  #[must_use]
  pub fn selected_events(
    &self
  ) -> &[NormalizedEvent<'a, R>] {
    self.events.get(&self.selected_date)
  }
}

/// English month name; `""` outside 1..=12.
#[must_use]
pub fn month_name(month: u32) -> &'static str {
  u8::try_from(month)
    .ok()
    .and_then(|m| Month::try_from(m).ok())
    .map_or("", |m| m.name())
}

/// Day labels rotated so the first entry is
/// `first_day_of_week`. Anything other than
/// seven labels is replaced by
/// `DEFAULT_DAY_NAMES`.
#[must_use]
pub fn ordered_day_names(
  names: &[String],
  first_day_of_week: u32
) -> Vec<String> {
  let mut names: Vec<String> =
    if names.len() == DAYS_PER_WEEK {
      names.to_vec()
    } else {
      if !names.is_empty() {
        tracing::warn!(
          count = names.len(),
          "day names need seven entries; using defaults"
        );
      }
      DEFAULT_DAY_NAMES
        .iter()
        .map(ToString::to_string)
        .collect()
    };
  names.rotate_left(
    first_day_of_week as usize % DAYS_PER_WEEK
  );
  names
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };
  use serde_json::json;

  use super::{
    CalendarView,
    MonthRef,
    month_name,
    ordered_day_names
  };
  use crate::config::{
    CalendarConfig,
    CalendarOptions
  };
  use crate::events::FieldAccessors;

  fn config(
    year: i64,
    month: i64,
    first_day: i64,
    selected: &str
  ) -> CalendarConfig {
    let options = CalendarOptions {
      year: Some(year),
      month: Some(month),
      first_day_of_week: Some(first_day),
      selected_date: Some(selected.to_string()),
      ..CalendarOptions::default()
    };
    let now = Utc
      .with_ymd_and_hms(2025, 5, 1, 0, 0, 0)
      .single()
      .expect("valid now");
    CalendarConfig::from_options(
      &options,
      chrono_tz::UTC,
      now
    )
  }

  #[test]
  fn day_names_rotate_with_week_start() {
    assert_eq!(
      ordered_day_names(&[], 0),
      ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"]
    );
    assert_eq!(
      ordered_day_names(&[], 1),
      ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
    );

    let custom: Vec<String> =
      ["S", "M", "T", "W", "T", "F", "S"]
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
      ordered_day_names(&custom, 6),
      ["S", "S", "M", "T", "W", "T", "F"]
    );

    let short = vec!["Mo".to_string()];
    assert_eq!(ordered_day_names(&short, 0)[0], "Sun");
  }

  #[test]
  fn month_names_are_english() {
    assert_eq!(month_name(1), "January");
    assert_eq!(month_name(12), "December");
    assert_eq!(month_name(13), "");
  }

  #[test]
  fn neighbours_wrap_across_years() {
    let records: Vec<serde_json::Value> = vec![];
    let january = config(2025, 1, 0, "2025-01-01");
    let view = CalendarView::assemble(
      &january,
      &records,
      &FieldAccessors::default(),
      &[]
    );
    assert_eq!(view.title, "January 2025");
    assert_eq!(
      view.previous,
      MonthRef { year: 2024, month: 12 }
    );
    assert_eq!(
      view.next,
      MonthRef { year: 2025, month: 2 }
    );

    let december = config(2025, 12, 0, "2025-12-01");
    let view = CalendarView::assemble(
      &december,
      &records,
      &FieldAccessors::default(),
      &[]
    );
    assert_eq!(
      view.next,
      MonthRef { year: 2026, month: 1 }
    );
  }

  #[test]
  fn selected_day_events_are_exposed() {
    let records = vec![
      json!({"date": "2025-05-15", "time": "14:30", "title": "Review"}),
      json!({"date": "2025-05-15", "time": "10:00", "title": "Standup"}),
      json!({"date": "2025-05-16", "time": "10:00", "title": "Other"}),
    ];
    let may = config(2025, 5, 1, "2025-05-15");
    let view = CalendarView::assemble(
      &may,
      &records,
      &FieldAccessors::default(),
      &[]
    );
    let titles: Vec<&str> = view
      .selected_events()
      .iter()
      .map(|event| event.title.as_str())
      .collect();
    assert_eq!(titles, ["Standup", "Review"]);
    assert_eq!(view.day_names[0], "Mon");

    let doc = serde_json::to_value(&view)
      .expect("serialize view");
    assert_eq!(doc["selectedDate"], "2025-05-15");
    assert_eq!(doc["grid"]["cells"].as_array().map(Vec::len), Some(42));
    assert_eq!(doc["grid"]["cells"][0]["date"], "");
    assert_eq!(
      doc["events"]["2025-05-15"][0]["title"],
      "Standup"
    );
  }
}

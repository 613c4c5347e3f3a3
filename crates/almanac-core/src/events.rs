use std::collections::{
  BTreeMap,
  HashMap
};

use chrono::{
  DateTime,
  Months,
  NaiveTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  warn
};

use crate::config::CalendarConfig;
use crate::datetime::{
  CanonicalInstant,
  RawValue,
  ValueKind,
  localize,
  normalize,
  normalize_time,
  whole_seconds
};
use crate::grid::Grid;

/// Read access to a host record by field
/// name.
pub trait EventRecord {
  fn field(&self, name: &str) -> RawValue;
}

impl EventRecord for serde_json::Value {
  fn field(&self, name: &str) -> RawValue {
    match self.get(name) {
      | None | Some(serde_json::Value::Null) => {
        RawValue::Missing
      }
      | Some(serde_json::Value::String(text)) => {
        RawValue::Text(text.clone())
      }
      | Some(serde_json::Value::Number(num)) => {
        let secs = num.as_i64().or_else(|| {
          num.as_f64().and_then(whole_seconds)
        });
        match secs {
          | Some(secs) => RawValue::Timestamp(secs),
          | None => RawValue::Text(num.to_string())
        }
      }
      | Some(other) => {
        RawValue::Text(other.to_string())
      }
    }
  }
}

impl EventRecord for HashMap<String, String> {
  fn field(&self, name: &str) -> RawValue {
    self
      .get(name)
      .map_or(RawValue::Missing, |value| {
        RawValue::Text(value.clone())
      })
  }
}

impl EventRecord for BTreeMap<String, String> {
  fn field(&self, name: &str) -> RawValue {
    self
      .get(name)
      .map_or(RawValue::Missing, |value| {
        RawValue::Text(value.clone())
      })
  }
}

/// Names of the date, time and title fields
/// on host records.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(default)]
pub struct FieldAccessors {
  pub date:  String,
  pub time:  String,
  pub title: String
}

impl Default for FieldAccessors {
  fn default() -> Self {
    Self {
      date:  "date".to_string(),
      time:  "time".to_string(),
      title: "title".to_string()
    }
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(bound = "")]
pub struct NormalizedEvent<'a, R> {
  pub time:   String,
  pub title:  String,
  #[serde(skip)]
  pub source: &'a R
}

/// Events grouped by canonical date, each
/// day ascending by time. Records sharing a
/// time keep their input order.
#[derive(Debug, Clone, Serialize)]
#[serde(bound = "", transparent)]
pub struct EventsByDate<'a, R> {
  days: BTreeMap<String, Vec<NormalizedEvent<'a, R>>>
}

impl<'a, R> EventsByDate<'a, R> {
  #[must_use]
  pub fn get(
    &self,
    date: &str
  ) -> &[NormalizedEvent<'a, R>] {
    self
      .days
      .get(date)
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  #[must_use]
  pub fn has_events(&self, date: &str) -> bool {
    !self.get(date).is_empty()
  }

  pub fn dates(
    &self
  ) -> impl Iterator<Item = &str> {
    self.days.keys().map(String::as_str)
  }

  pub fn iter(
    &self
  ) -> impl Iterator<
    Item = (&str, &[NormalizedEvent<'a, R>])
  > {
    self.days.iter().map(|(date, events)| {
      (date.as_str(), events.as_slice())
    })
  }

  /// Number of days with at least one event.
  #[must_use]
  pub fn len(&self) -> usize {
    self.days.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.days.is_empty()
  }

  #[must_use]
  pub fn total_events(&self) -> usize {
    self.days.values().map(Vec::len).sum()
  }
}

/// Normalizes and groups host records.
///
/// A record whose date cannot be read is
/// dropped; one whose time cannot be read is
/// kept at midnight. No range filtering
/// happens here: the host is expected to pass
/// only records inside `MonthBounds`.
#[tracing::instrument(
  skip_all,
  fields(
    records = records.len(),
    timezone = %config.timezone()
  )
)]
pub fn bind_events<'a, R: EventRecord>(
  records: &'a [R],
  config: &CalendarConfig,
  accessors: &FieldAccessors
) -> EventsByDate<'a, R> {
  let timezone = config.timezone();
  let mut days: BTreeMap<
    String,
    Vec<NormalizedEvent<'a, R>>
  > = BTreeMap::new();
  let mut dropped = 0_usize;

  for (index, record) in
    records.iter().enumerate()
  {
    let date_value =
      record.field(&accessors.date);
    let Some(date) = normalize(
      &date_value,
      ValueKind::Date,
      timezone
    ) else {
      debug!(
        index,
        value = ?date_value,
        "dropping record with unreadable date"
      );
      dropped += 1;
      continue;
    };

    let time = normalize_time(
      &record.field(&accessors.time),
      &date,
      timezone
    );
    let title = record
      .field(&accessors.title)
      .into_text();

    days
      .entry(date.canonical_date())
      .or_default()
      .push(NormalizedEvent {
        time: time.canonical_time(),
        title,
        source: record
      });
  }

  for events in days.values_mut() {
    events.sort_by(|a, b| a.time.cmp(&b.time));
  }

  if dropped > 0 {
    warn!(
      dropped,
      "skipped records with unreadable dates"
    );
  }
  debug!(days = days.len(), "grouped events");

  EventsByDate { days }
}

/// Sets `has_events` on every dated cell
/// with at least one event and re-derives
/// `is_selected` from the grid's selected
/// date.
#[must_use]
pub fn merge_event_flags<R>(
  mut grid: Grid,
  events: &EventsByDate<'_, R>
) -> Grid {
  let selected = grid.selected_date();
  for cell in grid.cells_mut() {
    let Some(date) = cell.date else {
      continue;
    };
    cell.has_events =
      events.has_events(&cell.canonical_date());
    cell.is_selected = date == selected;
  }
  grid
}

/// Boundary value in the shape the host's
/// store expects.
#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
#[serde(untagged)]
pub enum QueryBound {
  Timestamp(i64),
  Text(String)
}

/// Half-open range
/// `[start of month, start of next month)`
/// in the configured timezone.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct MonthBounds {
  pub start:         DateTime<Tz>,
  pub end_exclusive: DateTime<Tz>
}

impl MonthBounds {
  #[must_use]
  pub fn for_config(
    config: &CalendarConfig
  ) -> Self {
    let timezone = config.timezone();
    let first = config.first_of_month();
    let next = first
      .checked_add_months(Months::new(1))
      .unwrap_or(first);
    Self {
      start:         local_midnight(
        first, timezone
      ),
      end_exclusive: local_midnight(
        next, timezone
      )
    }
  }

  /// Epoch seconds when dates are stored as
  /// timestamps, `YYYY-MM-DD HH:MM:SS`
  /// otherwise.
  #[must_use]
  pub fn query_bounds(
    &self,
    date_is_timestamp: bool
  ) -> (QueryBound, QueryBound) {
    let bound = |at: &DateTime<Tz>| {
      if date_is_timestamp {
        QueryBound::Timestamp(at.timestamp())
      } else {
        QueryBound::Text(
          at.format("%Y-%m-%d %H:%M:%S")
            .to_string()
        )
      }
    };
    (
      bound(&self.start),
      bound(&self.end_exclusive)
    )
  }

  #[must_use]
  pub fn contains(
    &self,
    instant: &CanonicalInstant
  ) -> bool {
    let at = instant.at();
    at >= self.start && at < self.end_exclusive
  }
}

fn local_midnight(
  date: chrono::NaiveDate,
  timezone: Tz
) -> DateTime<Tz> {
  let midnight = date.and_time(NaiveTime::MIN);
  localize(midnight, &timezone).unwrap_or_else(
    || {
      Utc
        .from_utc_datetime(&midnight)
        .with_timezone(&timezone)
    }
  )
}

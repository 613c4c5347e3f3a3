use std::collections::BTreeSet;
use std::sync::OnceLock;

use chrono::{
  DateTime,
  Datelike,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  warn
};
use url::form_urlencoded;

use crate::datetime::{
  RawValue,
  ValueKind,
  normalize,
  today_in
};
use crate::grid::first_day_of_month;

pub const MIN_YEAR: i32 = 1970;
pub const MAX_YEAR: i32 = 9999;

/// Calendar parameters as supplied by the
/// host, before any correction. Every field
/// may be missing or out of range.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(default)]
pub struct CalendarOptions {
  pub year:              Option<i64>,
  pub month:             Option<i64>,
  pub first_day_of_week: Option<i64>,
  pub selected_date:     Option<String>,
  pub celebrations:      Vec<String>,
  pub date_is_timestamp: bool
}

/// Sanitized, immutable per-render
/// configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarConfig {
  year:              i32,
  month:             u32,
  first_day_of_week: u32,
  timezone:          Tz,
  selected_date:     NaiveDate,
  today:             NaiveDate,
  celebrations:      Celebrations,
  date_is_timestamp: bool
}

impl CalendarConfig {
  /// Builds a configuration from loose host
  /// options. Out-of-range values are
  /// corrected, never rejected: month is
  /// clamped to 1..=12, year to
  /// `MIN_YEAR..=MAX_YEAR`, and a week start
  /// outside 0..=6 becomes Sunday.
  #[tracing::instrument(
    skip(options, timezone, now),
    fields(timezone = %timezone)
  )]
  pub fn from_options(
    options: &CalendarOptions,
    timezone: Tz,
    now: DateTime<Utc>
  ) -> Self {
    let today = today_in(timezone, now);

    let year = sanitize_year(
      options
        .year
        .unwrap_or(i64::from(today.year()))
    );
    let month = sanitize_month(
      options
        .month
        .unwrap_or(i64::from(today.month()))
    );
    let first_day_of_week =
      sanitize_first_day(
        options.first_day_of_week.unwrap_or(0)
      );

    let selected_date = resolve_selected_date(
      options.selected_date.as_deref(),
      year,
      month,
      today,
      timezone
    );

    let config = Self {
      year,
      month,
      first_day_of_week,
      timezone,
      selected_date,
      today,
      celebrations: Celebrations::new(
        &options.celebrations
      ),
      date_is_timestamp: options
        .date_is_timestamp
    };
    debug!(
      year = config.year,
      month = config.month,
      first_day_of_week =
        config.first_day_of_week,
      selected = %config.selected_date,
      today = %config.today,
      "built calendar config"
    );
    config
  }

  #[must_use]
  pub fn year(&self) -> i32 {
    self.year
  }

  #[must_use]
  pub fn month(&self) -> u32 {
    self.month
  }

  #[must_use]
  pub fn first_day_of_week(&self) -> u32 {
    self.first_day_of_week
  }

  #[must_use]
  pub fn timezone(&self) -> Tz {
    self.timezone
  }

  #[must_use]
  pub fn selected_date(&self) -> NaiveDate {
    self.selected_date
  }

  #[must_use]
  pub fn today(&self) -> NaiveDate {
    self.today
  }

  #[must_use]
  pub fn celebrations(
    &self
  ) -> &Celebrations {
    &self.celebrations
  }

  #[must_use]
  pub fn date_is_timestamp(&self) -> bool {
    self.date_is_timestamp
  }

  #[must_use]
  pub fn first_of_month(&self) -> NaiveDate {
    first_day_of_month(self.year, self.month)
  }
}

fn sanitize_year(raw: i64) -> i32 {
  let clamped = raw.clamp(
    i64::from(MIN_YEAR),
    i64::from(MAX_YEAR)
  );
  if clamped != raw {
    warn!(
      raw,
      corrected = clamped,
      "year out of range; clamping"
    );
  }
  i32::try_from(clamped).unwrap_or(MIN_YEAR)
}

fn sanitize_month(raw: i64) -> u32 {
  let clamped = raw.clamp(1, 12);
  if clamped != raw {
    warn!(
      raw,
      corrected = clamped,
      "month out of range; clamping"
    );
  }
  u32::try_from(clamped).unwrap_or(1)
}

fn sanitize_first_day(raw: i64) -> u32 {
  match u32::try_from(raw) {
    | Ok(day) if day <= 6 => day,
    | _ => {
      warn!(
        raw,
        "first day of week out of range; using Sunday"
      );
      0
    }
  }
}

fn resolve_selected_date(
  raw: Option<&str>,
  year: i32,
  month: u32,
  today: NaiveDate,
  timezone: Tz
) -> NaiveDate {
  let Some(raw) = raw else {
    return today;
  };

  match normalize(
    &RawValue::from(raw),
    ValueKind::Date,
    timezone
  ) {
    | Some(instant) => instant.date(),
    | None => {
      let fallback =
        first_day_of_month(year, month);
      warn!(
        selected = %raw,
        fallback = %fallback,
        "unparsable selected date; using first of month"
      );
      fallback
    }
  }
}

fn celebration_re() -> Option<&'static Regex>
{
  static RE: OnceLock<Option<Regex>> =
    OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(r"^(\d{4}-)?\d{2}-\d{2}$").ok()
  })
  .as_ref()
}

/// Highlighted dates, each either a fixed
/// `YYYY-MM-DD` or a yearly `MM-DD`.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct Celebrations {
  entries: BTreeSet<String>
}

impl Celebrations {
  pub fn new<I, S>(entries: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>
  {
    let mut kept = BTreeSet::new();
    for entry in entries {
      let trimmed = entry.as_ref().trim();
      let valid = celebration_re()
        .is_some_and(|re| re.is_match(trimmed));
      if valid {
        kept.insert(trimmed.to_string());
      } else {
        warn!(
          entry = %trimmed,
          "ignoring malformed celebration"
        );
      }
    }
    Self { entries: kept }
  }

  #[must_use]
  pub fn matches(
    &self,
    date: NaiveDate
  ) -> bool {
    self.entries.contains(
      &date.format("%Y-%m-%d").to_string()
    ) || self.entries.contains(
      &date.format("%m-%d").to_string()
    )
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.entries.len()
  }
}

/// Month, year and date parameters carried
/// by an in-page navigation request. They
/// override the configured options.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct NavigationQuery {
  pub month:         Option<String>,
  pub year:          Option<String>,
  pub date:          Option<String>,
  pub selected_date: Option<String>
}

impl NavigationQuery {
  /// Reads `month`, `year`, `date` and
  /// `selectedDate` out of a query string.
  /// Values are percent-decoded; unknown keys
  /// and empty values are ignored.
  #[must_use]
  pub fn parse(query: &str) -> Self {
    let mut nav = Self::default();
    let query =
      query.trim().trim_start_matches('?');

    for (key, value) in
      form_urlencoded::parse(query.as_bytes())
    {
      let value = value.trim();
      if value.is_empty() {
        continue;
      }
      let value = Some(value.to_string());
      match key.trim() {
        | "month" => nav.month = value,
        | "year" => nav.year = value,
        | "date" => nav.date = value,
        | "selectedDate"
        | "selected_date" => {
          nav.selected_date = value;
        }
        | other => {
          debug!(
            key = %other,
            "ignoring navigation parameter"
          );
        }
      }
    }

    nav
  }

  /// Copies the parameters onto `options`.
  /// A `month` or `year` that is not an
  /// integer is skipped, keeping the
  /// configured value, rather than being
  /// coerced to 0 and clamped to 1.
  pub fn apply(
    &self,
    options: &mut CalendarOptions
  ) {
    if let Some(month) =
      parse_int(self.month.as_deref(), "month")
    {
      options.month = Some(month);
    }
    if let Some(year) =
      parse_int(self.year.as_deref(), "year")
    {
      options.year = Some(year);
    }
    if let Some(date) = self
      .date
      .as_ref()
      .or(self.selected_date.as_ref())
    {
      options.selected_date =
        Some(date.clone());
    }
  }
}

fn parse_int(
  raw: Option<&str>,
  field: &str
) -> Option<i64> {
  let raw = raw?;
  match raw.trim().parse::<i64>() {
    | Ok(value) => Some(value),
    | Err(err) => {
      warn!(
        field,
        value = %raw,
        error = %err,
        "ignoring non-numeric navigation value"
      );
      None
    }
  }
}

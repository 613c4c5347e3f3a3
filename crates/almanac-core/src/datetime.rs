use std::sync::OnceLock;

use chrono::{
  DateTime,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

/// Anchor date for values that only carry a
/// clock time. Only hour and minute are read
/// back from instants built on it.
const TIME_ANCHOR: (i32, u32, u32) =
  (2000, 1, 1);

const PERMISSIVE_DATETIME_FORMATS: [&str;
  4] = [
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%d %H:%M:%S",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M"
];

/// A date or time value as read from a host
/// record, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
  Timestamp(i64),
  Text(String),
  Missing
}

impl RawValue {
  /// Epoch seconds carried by the value,
  /// either directly or as numeric text.
  #[must_use]
  pub fn as_timestamp(
    &self
  ) -> Option<i64> {
    match self {
      | RawValue::Timestamp(secs) => {
        Some(*secs)
      }
      | RawValue::Text(text) => {
        let token = text.trim();
        token.parse::<i64>().ok().or_else(|| {
          token
            .parse::<f64>()
            .ok()
            .and_then(whole_seconds)
        })
      }
      | RawValue::Missing => None
    }
  }

  #[must_use]
  pub fn into_text(self) -> String {
    match self {
      | RawValue::Timestamp(secs) => {
        secs.to_string()
      }
      | RawValue::Text(text) => text,
      | RawValue::Missing => {
        String::new()
      }
    }
  }
}

/// Truncates fractional epoch seconds.
/// Non-finite and out-of-range values yield
/// `None`.
#[must_use]
pub fn whole_seconds(secs: f64) -> Option<i64> {
  if !secs.is_finite() {
    return None;
  }
  let whole = secs.trunc();
  if whole < i64::MIN as f64
    || whole >= i64::MAX as f64
  {
    return None;
  }
  Some(whole as i64)
}

impl From<i64> for RawValue {
  fn from(secs: i64) -> Self {
    RawValue::Timestamp(secs)
  }
}

impl From<&str> for RawValue {
  fn from(text: &str) -> Self {
    RawValue::Text(text.to_string())
  }
}

impl From<String> for RawValue {
  fn from(text: String) -> Self {
    RawValue::Text(text)
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum ValueKind {
  Date,
  Time
}

/// An instant bound to the timezone it was
/// normalized in.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct CanonicalInstant {
  at: DateTime<Tz>
}

impl CanonicalInstant {
  #[must_use]
  pub fn new(at: DateTime<Tz>) -> Self {
    Self { at }
  }

  #[must_use]
  pub fn at(&self) -> DateTime<Tz> {
    self.at
  }

  #[must_use]
  pub fn date(&self) -> NaiveDate {
    self.at.date_naive()
  }

  #[must_use]
  pub fn canonical_date(&self) -> String {
    self.at.format("%Y-%m-%d").to_string()
  }

  #[must_use]
  pub fn canonical_time(&self) -> String {
    self.at.format("%H:%M").to_string()
  }

  /// Midnight of this instant's calendar
  /// date in the same timezone.
  #[must_use]
  pub fn start_of_day(&self) -> Self {
    let tz = self.at.timezone();
    let midnight =
      self.date().and_time(NaiveTime::MIN);
    localize(midnight, &tz)
      .map(Self::new)
      .unwrap_or(*self)
  }
}

/// Normalizes a date or time value of
/// unknown shape into an instant in
/// `timezone`.
///
/// Numeric values are Unix epoch seconds;
/// non-positive epochs are rejected. Text is
/// tried against the strict shape for `kind`
/// (`YYYY-MM-DD` or `HH:MM`) first, then
/// against a short ISO 8601 allow-list.
#[must_use]
pub fn normalize(
  value: &RawValue,
  kind: ValueKind,
  timezone: Tz
) -> Option<CanonicalInstant> {
  if let Some(secs) = value.as_timestamp()
  {
    return from_timestamp(secs, timezone);
  }

  let RawValue::Text(text) = value else {
    return None;
  };
  let token = text.trim();
  if token.is_empty() {
    return None;
  }

  let strict = match kind {
    | ValueKind::Date => {
      parse_strict_date(token, timezone)
    }
    | ValueKind::Time => {
      parse_strict_time(token, timezone)
    }
  };

  strict.or_else(|| {
    parse_permissive(token, kind, timezone)
  })
}

/// Normalizes a time value, falling back to
/// midnight of `companion`'s date when the
/// value cannot be read.
#[must_use]
pub fn normalize_time(
  value: &RawValue,
  companion: &CanonicalInstant,
  timezone: Tz
) -> CanonicalInstant {
  if let Some(instant) =
    normalize(value, ValueKind::Time, timezone)
  {
    return instant;
  }

  tracing::warn!(
    value = ?value,
    date = %companion.canonical_date(),
    "unreadable time; using midnight"
  );
  companion.start_of_day()
}

fn from_timestamp(
  secs: i64,
  timezone: Tz
) -> Option<CanonicalInstant> {
  if secs <= 0 {
    tracing::debug!(
      secs,
      "rejecting non-positive epoch"
    );
    return None;
  }

  Utc
    .timestamp_opt(secs, 0)
    .single()
    .map(|utc| {
      CanonicalInstant::new(
        utc.with_timezone(&timezone)
      )
    })
}

fn strict_date_re() -> Option<&'static Regex>
{
  static RE: OnceLock<Option<Regex>> =
    OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}$").ok()
  })
  .as_ref()
}

fn strict_time_re() -> Option<&'static Regex>
{
  static RE: OnceLock<Option<Regex>> =
    OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(r"^\d{2}:\d{2}$").ok()
  })
  .as_ref()
}

fn parse_strict_date(
  token: &str,
  timezone: Tz
) -> Option<CanonicalInstant> {
  if !strict_date_re()?.is_match(token) {
    return None;
  }
  let date = NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .ok()?;
  at_midnight(date, timezone)
}

fn parse_strict_time(
  token: &str,
  timezone: Tz
) -> Option<CanonicalInstant> {
  if !strict_time_re()?.is_match(token) {
    return None;
  }
  let time = NaiveTime::parse_from_str(
    token, "%H:%M"
  )
  .ok()?;
  anchored_time(time, timezone)
}

fn parse_permissive(
  token: &str,
  kind: ValueKind,
  timezone: Tz
) -> Option<CanonicalInstant> {
  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Some(CanonicalInstant::new(
      dt.with_timezone(&timezone)
    ));
  }

  for fmt in PERMISSIVE_DATETIME_FORMATS {
    if let Ok(naive) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return localize(naive, &timezone)
        .map(CanonicalInstant::new);
    }
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return at_midnight(date, timezone);
  }

  if kind == ValueKind::Time {
    for fmt in ["%H:%M:%S", "%H:%M"] {
      if let Ok(time) =
        NaiveTime::parse_from_str(
          token, fmt
        )
      {
        return anchored_time(
          time, timezone
        );
      }
    }
  }

  None
}

fn at_midnight(
  date: NaiveDate,
  timezone: Tz
) -> Option<CanonicalInstant> {
  localize(
    date.and_time(NaiveTime::MIN),
    &timezone
  )
  .map(CanonicalInstant::new)
}

fn anchored_time(
  time: NaiveTime,
  timezone: Tz
) -> Option<CanonicalInstant> {
  let (year, month, day) = TIME_ANCHOR;
  let anchor = NaiveDate::from_ymd_opt(
    year, month, day
  )?;
  localize(anchor.and_time(time), &timezone)
    .map(CanonicalInstant::new)
}

/// Resolves a wall-clock time in `timezone`.
/// Ambiguous times take the earliest
/// instant; times inside a DST gap move
/// forward one hour.
pub fn localize(
  local: NaiveDateTime,
  timezone: &Tz
) -> Option<DateTime<Tz>> {
  match timezone.from_local_datetime(&local)
  {
    | LocalResult::Single(dt) => Some(dt),
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::debug!(
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      Some(first.min(second))
    }
    | LocalResult::None => {
      tracing::debug!(
        local = %local,
        timezone = %timezone,
        "local datetime in DST gap; shifting forward"
      );
      let shifted = local
        .checked_add_signed(
          Duration::hours(1)
        )?;
      timezone
        .from_local_datetime(&shifted)
        .earliest()
    }
  }
}

/// Timezone candidates in precedence order.
/// The system zone and UTC are always tried
/// after these.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Deserialize,
)]
pub struct TimezoneSources {
  pub formatter:   Option<String>,
  pub application: Option<String>
}

/// First valid timezone out of the
/// formatter zone, the application default
/// and the system zone. Invalid or empty
/// candidates are skipped; UTC is the last
/// resort.
#[tracing::instrument(skip_all)]
pub fn resolve_timezone(
  sources: &TimezoneSources
) -> Tz {
  let candidates = [
    (sources.formatter.as_deref(), "formatter"),
    (
      sources.application.as_deref(),
      "application"
    )
  ];

  for (raw, source) in candidates {
    if let Some(raw) = raw
      && let Some(tz) =
        parse_timezone(raw, source)
    {
      return tz;
    }
  }

  system_timezone().unwrap_or_else(|| {
    tracing::warn!(
      "no usable timezone source; using UTC"
    );
    chrono_tz::UTC
  })
}

fn system_timezone() -> Option<Tz> {
  match iana_time_zone::get_timezone() {
    | Ok(name) => {
      parse_timezone(&name, "system")
    }
    | Err(err) => {
      tracing::warn!(
        error = %err,
        "failed to read system timezone"
      );
      None
    }
  }
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::debug!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "resolved calendar timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::warn!(
        source,
        timezone = %trimmed,
        error = %err,
        "invalid timezone id; skipping"
      );
      None
    }
  }
}

#[must_use]
pub fn today_in(
  timezone: Tz,
  now: DateTime<Utc>
) -> NaiveDate {
  now.with_timezone(&timezone).date_naive()
}

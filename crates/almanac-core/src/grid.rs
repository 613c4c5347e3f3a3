use chrono::{
  Datelike,
  Duration,
  NaiveDate
};
use serde::Serialize;

use crate::config::CalendarConfig;

/// Six full weeks.
pub const GRID_CELLS: usize = 42;
pub const DAYS_PER_WEEK: usize = 7;

/// One slot of the month grid. Padding cells
/// have no date and no label.
#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
  #[serde(with = "canonical_date_serde")]
  pub date:           Option<NaiveDate>,
  pub label:          Option<u32>,
  pub in_month:       bool,
  pub is_today:       bool,
  pub is_selected:    bool,
  pub has_events:     bool,
  pub is_weekend:     bool,
  pub is_saturday:    bool,
  pub is_sunday:      bool,
  pub is_celebration: bool,
  /// Column of the cell, 0..=6, counted from
  /// the configured first day of the week.
  pub day_of_week:    u32
}

impl GridCell {
  fn padding(
    position: usize,
    first_day_of_week: u32
  ) -> Self {
    let column = grid_column(position);
    let weekday =
      actual_weekday(column, first_day_of_week);
    Self {
      date: None,
      label: None,
      in_month: false,
      is_today: false,
      is_selected: false,
      has_events: false,
      is_weekend: weekday == 0
        || weekday == 6,
      is_saturday: weekday == 6,
      is_sunday: weekday == 0,
      is_celebration: false,
      day_of_week: column
    }
  }

  #[must_use]
  pub fn is_padding(&self) -> bool {
    self.date.is_none()
  }

  /// `YYYY-MM-DD`, or an empty string for
  /// padding.
  #[must_use]
  pub fn canonical_date(&self) -> String {
    self
      .date
      .map(|date| {
        date.format("%Y-%m-%d").to_string()
      })
      .unwrap_or_default()
  }
}

/// Exactly `GRID_CELLS` cells, read left to
/// right and top to bottom.
#[derive(
  Debug, Clone, PartialEq, Eq, Serialize,
)]
#[serde(rename_all = "camelCase")]
pub struct Grid {
  year:              i32,
  month:             u32,
  first_day_of_week: u32,
  selected_date:     NaiveDate,
  cells:             Vec<GridCell>
}

impl Grid {
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
  pub fn selected_date(&self) -> NaiveDate {
    self.selected_date
  }

  #[must_use]
  pub fn cells(&self) -> &[GridCell] {
    &self.cells
  }

  pub(crate) fn cells_mut(
    &mut self
  ) -> &mut [GridCell] {
    &mut self.cells
  }

  pub fn weeks(
    &self
  ) -> impl Iterator<Item = &[GridCell]> {
    self.cells.chunks(DAYS_PER_WEEK)
  }

  #[must_use]
  pub fn cell_for(
    &self,
    date: NaiveDate
  ) -> Option<&GridCell> {
    self
      .cells
      .iter()
      .find(|cell| cell.date == Some(date))
  }

  /// Number of padding cells before the
  /// first of the month.
  #[must_use]
  pub fn leading_padding(&self) -> usize {
    self
      .cells
      .iter()
      .take_while(|cell| cell.is_padding())
      .count()
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.cells.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.cells.is_empty()
  }
}

/// Lays out the configured month on a
/// 42-cell grid whose first column is the
/// configured first day of the week.
/// `has_events` is left unset.
#[tracing::instrument(
  skip(config),
  fields(
    year = config.year(),
    month = config.month()
  )
)]
#[must_use]
pub fn build_grid(
  config: &CalendarConfig
) -> Grid {
  let first_day = config.first_day_of_week();
  let first = config.first_of_month();
  let month_days =
    days_in_month(config.year(), config.month());
  let start_weekday =
    first.weekday().num_days_from_sunday();
  let padding =
    ((start_weekday + 7 - first_day) % 7)
      as usize;

  let mut cells =
    Vec::with_capacity(GRID_CELLS);
  for position in 0..padding {
    cells.push(GridCell::padding(
      position, first_day
    ));
  }

  for day in 1..=month_days {
    let position = cells.len();
    let date = add_days(
      first,
      i64::from(day) - 1
    );
    let column = grid_column(position);
    let weekday =
      actual_weekday(column, first_day);
    cells.push(GridCell {
      date: Some(date),
      label: Some(day),
      in_month: true,
      is_today: date == config.today(),
      is_selected: date
        == config.selected_date(),
      has_events: false,
      is_weekend: weekday == 0
        || weekday == 6,
      is_saturday: weekday == 6,
      is_sunday: weekday == 0,
      is_celebration: config
        .celebrations()
        .matches(date),
      day_of_week: column
    });
  }

  while cells.len() < GRID_CELLS {
    cells.push(GridCell::padding(
      cells.len(),
      first_day
    ));
  }

  tracing::debug!(
    padding,
    days = month_days,
    "built month grid"
  );

  Grid {
    year: config.year(),
    month: config.month(),
    first_day_of_week: first_day,
    selected_date: config.selected_date(),
    cells
  }
}

fn grid_column(position: usize) -> u32 {
  (position % DAYS_PER_WEEK) as u32
}

/// Weekday of a column, 0 = Sunday.
fn actual_weekday(
  column: u32,
  first_day_of_week: u32
) -> u32 {
  (column + first_day_of_week) % 7
}

#[must_use]
pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(year, month, 1)
    .unwrap_or(NaiveDate::MIN)
}

#[must_use]
pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    shift_month(year, month, 1);
  add_days(
    first_day_of_month(next_year, next_month),
    -1
  )
}

#[must_use]
pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}

/// `(year, month)` moved by `step` months.
#[must_use]
pub fn shift_month(
  year: i32,
  month: u32,
  step: i32
) -> (i32, u32) {
  let index = i64::from(year) * 12
    + i64::from(month)
    - 1
    + i64::from(step);
  let year = index.div_euclid(12);
  let month = index.rem_euclid(12) + 1;
  (
    i32::try_from(year).unwrap_or(i32::MAX),
    month as u32
  )
}

fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(days))
    .unwrap_or(date)
}

pub mod canonical_date_serde {
  use chrono::NaiveDate;
  use serde::Serializer;

  pub fn serialize<S>(
    date: &Option<NaiveDate>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    match date {
      | Some(value) => {
        serializer.serialize_str(
          &value.format("%Y-%m-%d").to_string()
        )
      }
      | None => serializer.serialize_str("")
    }
  }
}

//! Month grid construction.
//!
//! A grid always covers whole Monday-first weeks: the tail of the previous
//! month, every day of the displayed month, and the head of the next month.

use chrono::{
  Datelike,
  NaiveDate,
  TimeDelta
};

use crate::aggregate::{
  DayAggregate,
  aggregate
};
use crate::event::Event;

pub const DAYS_IN_WEEK: usize = 7;

/// Which month a grid cell belongs to.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum CellMonth {
  Previous,
  Current,
  Next
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCell {
  pub date:     NaiveDate,
  pub day:      u32,
  pub month:    CellMonth,
  pub is_today: bool,
  pub events:   DayAggregate
}

impl DayCell {
  fn adjacent(
    date: NaiveDate,
    month: CellMonth,
    visible_limit: usize
  ) -> Self {
    Self {
      date,
      day: date.day(),
      month,
      is_today: false,
      events: DayAggregate::empty(
        date,
        visible_limit
      )
    }
  }

  #[must_use]
  pub fn in_month(&self) -> bool {
    self.month == CellMonth::Current
  }

  #[must_use]
  pub fn visible(&self) -> &[Event] {
    self.events.visible()
  }

  #[must_use]
  pub fn overflow_count(&self) -> usize {
    self.events.overflow_count()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
  first: NaiveDate,
  cells: Vec<DayCell>
}

impl MonthGrid {
  /// Builds the grid for the month that
  /// contains `reference`. Only cells of
  /// that month receive events; `today`
  /// marks at most one of them.
  #[tracing::instrument(
    skip(events),
    fields(event_count = events.len())
  )]
  pub fn build(
    reference: NaiveDate,
    today: NaiveDate,
    events: &[Event],
    visible_limit: usize
  ) -> Self {
    let year = reference.year();
    let month = reference.month();
    let first =
      first_day_of_month(year, month);
    let leading = leading_days(first);
    let days = days_in_month(year, month);

    let mut cells = Vec::with_capacity(
      grid_cell_count(leading, days)
    );

    let prev = shift_months(first, -1);
    let prev_days = days_in_month(
      prev.year(),
      prev.month()
    );
    for i in 0..leading {
      let day = prev_days - leading + i + 1;
      let date = prev
        .with_day(day)
        .unwrap_or(prev);
      cells.push(DayCell::adjacent(
        date,
        CellMonth::Previous,
        visible_limit
      ));
    }

    let shows_today = today.year() == year
      && today.month() == month;
    for day in 1..=days {
      let date =
        first.with_day(day).unwrap_or(first);
      cells.push(DayCell {
        date,
        day,
        month: CellMonth::Current,
        is_today: shows_today
          && today.day() == day,
        events: aggregate(
          events,
          date,
          visible_limit
        )
      });
    }

    let trailing = (DAYS_IN_WEEK
      - cells.len() % DAYS_IN_WEEK)
      % DAYS_IN_WEEK;
    let next = shift_months(first, 1);
    for offset in 0..trailing {
      let date =
        add_days(next, offset as i64);
      cells.push(DayCell::adjacent(
        date,
        CellMonth::Next,
        visible_limit
      ));
    }

    tracing::debug!(
      year,
      month,
      leading,
      days,
      trailing,
      cells = cells.len(),
      "built month grid"
    );

    Self { first, cells }
  }

  #[must_use]
  pub fn first_day(&self) -> NaiveDate {
    self.first
  }

  #[must_use]
  pub fn year(&self) -> i32 {
    self.first.year()
  }

  #[must_use]
  pub fn month(&self) -> u32 {
    self.first.month()
  }

  #[must_use]
  pub fn cells(&self) -> &[DayCell] {
    &self.cells
  }

  /// Week rows, Monday to Sunday.
  pub fn weeks(
    &self
  ) -> std::slice::Chunks<'_, DayCell> {
    self.cells.chunks(DAYS_IN_WEEK)
  }

  #[must_use]
  pub fn week_count(&self) -> usize {
    self.cells.len() / DAYS_IN_WEEK
  }

  #[must_use]
  pub fn leading_count(&self) -> usize {
    self.count_of(CellMonth::Previous)
  }

  #[must_use]
  pub fn trailing_count(&self) -> usize {
    self.count_of(CellMonth::Next)
  }

  #[must_use]
  pub fn in_month_count(&self) -> usize {
    self.count_of(CellMonth::Current)
  }

  /// The in-month cell for `date`, if
  /// the date belongs to this month.
  #[must_use]
  pub fn cell_for(
    &self,
    date: NaiveDate
  ) -> Option<&DayCell> {
    self.cells.iter().find(|cell| {
      cell.in_month() && cell.date == date
    })
  }

  #[must_use]
  pub fn today_cell(
    &self
  ) -> Option<&DayCell> {
    self.cells.iter().find(|cell| {
      cell.is_today
    })
  }

  fn count_of(
    &self,
    month: CellMonth
  ) -> usize {
    self
      .cells
      .iter()
      .filter(|cell| cell.month == month)
      .count()
  }
}

#[must_use]
pub fn grid_cell_count(
  leading: u32,
  days: u32
) -> usize {
  ((leading + days) as usize)
    .div_ceil(DAYS_IN_WEEK)
    * DAYS_IN_WEEK
}

/// Weekday of the 1st as a Monday-first
/// index (Monday = 0, Sunday = 6).
#[must_use]
pub fn leading_days(
  first: NaiveDate
) -> u32 {
  first.weekday().num_days_from_monday()
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
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  add_days(
    first_day_of_month(
      next_year, next_month
    ),
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

/// Moves by whole months, clamping the
/// day to the target month's length.
/// Stays on `date` when the target is
/// outside chrono's range.
#[must_use]
pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  checked_shift_months(
    date,
    i64::from(months)
  )
  .unwrap_or(date)
}

#[must_use]
pub fn checked_shift_months(
  date: NaiveDate,
  months: i64
) -> Option<NaiveDate> {
  let total = i64::from(date.year())
    .checked_mul(12)?
    .checked_add(i64::from(
      date.month0()
    ))?
    .checked_add(months)?;
  let year =
    i32::try_from(total.div_euclid(12))
      .ok()?;
  let month =
    u32::try_from(total.rem_euclid(12))
      .ok()?
      + 1;
  let first =
    NaiveDate::from_ymd_opt(year, month, 1)?;
  let day = date
    .day()
    .min(days_in_month(year, month));
  first.with_day(day)
}

/// `None` when the result falls outside
/// chrono's date range.
#[must_use]
pub fn checked_add_days(
  date: NaiveDate,
  days: i64
) -> Option<NaiveDate> {
  TimeDelta::try_days(days).and_then(
    |delta| date.checked_add_signed(delta)
  )
}

fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  checked_add_days(date, days)
    .unwrap_or(date)
}

//! Month grid construction, event lookup by day and month navigation.
//!
//! All dates here are naive calendar dates, so the grid for a given month is
//! the same whatever the local timezone is.

use crate::model::StudyEvent;
use crate::validate::ValidationError;
use chrono::{Datelike, Days, Local, Months, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// Number of cells in a month view: six weeks of seven days.
pub const GRID_CELLS: usize = 42;
pub const WEEK_LEN: usize = 7;

/// Format of the day keys stored on events.
pub const DAY_FORMAT: &str = "%Y-%m-%d";

pub const WEEKDAY_LABELS: [&str; WEEK_LEN] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub is_current_month: bool,
}

/// Builds the Sunday-first 42-cell grid for the month containing `reference`.
///
/// Leading cells come from the previous month back to the Sunday on or before
/// the 1st; trailing cells run into the next month until the grid is full.
pub fn month_grid(reference: NaiveDate) -> Vec<CalendarCell> {
    let first = first_of_month(reference);
    let offset = first.weekday().num_days_from_sunday() as u64;
    let days = days_in_month(first.year(), first.month()) as u64;

    let mut cells = Vec::with_capacity(GRID_CELLS);
    for back in (1..=offset).rev() {
        if let Some(date) = first.checked_sub_days(Days::new(back)) {
            cells.push(CalendarCell {
                date,
                is_current_month: false,
            });
        }
    }
    for day in 0..days {
        if let Some(date) = first.checked_add_days(Days::new(day)) {
            cells.push(CalendarCell {
                date,
                is_current_month: true,
            });
        }
    }
    let mut forward = days;
    while cells.len() < GRID_CELLS {
        match first.checked_add_days(Days::new(forward)) {
            Some(date) => cells.push(CalendarCell {
                date,
                is_current_month: false,
            }),
            None => break,
        }
        forward += 1;
    }
    cells
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(d) => d,
        None => return 0,
    };
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// The `YYYY-MM-DD` key an event must carry to appear on `date`.
pub fn day_key(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

/// Events whose stored date string is exactly `date` as `YYYY-MM-DD`.
pub fn events_on(events: &[StudyEvent], date: NaiveDate) -> Vec<&StudyEvent> {
    let key = day_key(date);
    events.iter().filter(|e| e.date == key).collect()
}

/// Event count for each cell, index-aligned with `cells`.
pub fn event_counts(events: &[StudyEvent], cells: &[CalendarCell]) -> Vec<usize> {
    cells
        .iter()
        .map(|cell| {
            let key = day_key(cell.date);
            events.iter().filter(|e| e.date == key).count()
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

impl FromStr for Direction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prev" | "previous" => Ok(Direction::Prev),
            "next" => Ok(Direction::Next),
            _ => Err(ValidationError::UnknownDirection(s.to_string())),
        }
    }
}

/// Reference date of the month currently on display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthCursor {
    reference: NaiveDate,
}

impl MonthCursor {
    pub fn new(reference: NaiveDate) -> Self {
        MonthCursor { reference }
    }

    pub fn today() -> Self {
        MonthCursor::new(Local::now().date_naive())
    }

    pub fn reference(&self) -> NaiveDate {
        self.reference
    }

    /// Moves to the 1st of the adjacent month. At the edges of the supported
    /// date range the cursor stays on the current month's 1st.
    pub fn shift(&mut self, direction: Direction) {
        let first = first_of_month(self.reference);
        let target = match direction {
            Direction::Prev => first.checked_sub_months(Months::new(1)),
            Direction::Next => first.checked_add_months(Months::new(1)),
        };
        self.reference = target.unwrap_or(first);
    }

    pub fn grid(&self) -> Vec<CalendarCell> {
        month_grid(self.reference)
    }
}

impl fmt::Display for MonthCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference.format("%B %Y"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(id: &str, date: &str) -> StudyEvent {
        StudyEvent {
            id: id.into(),
            title: "Math review".into(),
            subject: "Math".into(),
            date: date.into(),
            start_time: "14:00".into(),
            end_time: "16:00".into(),
            description: Some("Quadratic and exponential functions".into()),
        }
    }

    #[test]
    fn every_month_has_42_cells_starting_on_sunday() {
        for year in [1999, 2000, 2024, 2025, 2100] {
            for month in 1..=12 {
                let grid = month_grid(ymd(year, month, 15));
                assert_eq!(grid.len(), GRID_CELLS, "{year}-{month}");
                assert_eq!(grid[0].date.weekday(), Weekday::Sun, "{year}-{month}");
                let in_month = grid.iter().filter(|c| c.is_current_month).count() as u32;
                assert_eq!(in_month, days_in_month(year, month), "{year}-{month}");
                for pair in grid.windows(2) {
                    assert_eq!(pair[0].date.succ_opt(), Some(pair[1].date));
                }
            }
        }
    }

    #[test]
    fn february_2025_layout() {
        let grid = month_grid(ymd(2025, 2, 23));
        // Feb 1st 2025 is a Saturday: six leading January days.
        assert_eq!(grid[0].date, ymd(2025, 1, 26));
        assert!(grid[..6].iter().all(|c| !c.is_current_month));
        assert_eq!(grid[6].date, ymd(2025, 2, 1));
        assert_eq!(grid.iter().filter(|c| c.is_current_month).count(), 28);
        assert_eq!(grid[41].date, ymd(2025, 3, 8));
        assert!(!grid[41].is_current_month);
    }

    #[test]
    fn month_starting_on_sunday_has_no_leading_cells() {
        // June 1st 2025 is a Sunday.
        let grid = month_grid(ymd(2025, 6, 30));
        assert_eq!(grid[0].date, ymd(2025, 6, 1));
        assert!(grid[0].is_current_month);
    }

    #[test]
    fn grid_is_independent_of_day_in_month() {
        assert_eq!(month_grid(ymd(2024, 2, 1)), month_grid(ymd(2024, 2, 29)));
    }

    #[test]
    fn lookup_matches_exact_day_string() {
        let events = vec![event("1", "2025-02-23")];
        let found = events_on(&events, ymd(2025, 2, 23));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "1");
        assert!(events_on(&events, ymd(2025, 2, 24)).is_empty());
    }

    #[test]
    fn lookup_does_not_normalize_foreign_formats() {
        let events = vec![event("1", "2025-2-23"), event("2", "23/02/2025")];
        assert!(events_on(&events, ymd(2025, 2, 23)).is_empty());
    }

    #[test]
    fn counts_align_with_cells() {
        let events = vec![
            event("1", "2025-02-23"),
            event("2", "2025-02-23"),
            event("3", "2025-01-26"),
        ];
        let grid = month_grid(ymd(2025, 2, 1));
        let counts = event_counts(&events, &grid);
        assert_eq!(counts.len(), GRID_CELLS);
        assert_eq!(counts[0], 1);
        let idx = grid.iter().position(|c| c.date == ymd(2025, 2, 23)).unwrap();
        assert_eq!(counts[idx], 2);
        assert_eq!(counts.iter().sum::<usize>(), 3);
    }

    #[test]
    fn shift_next_then_prev_returns_to_month() {
        for month in 1..=12 {
            let start = ymd(2025, month, 31.min(days_in_month(2025, month)));
            let mut cursor = MonthCursor::new(start);
            cursor.shift(Direction::Next);
            cursor.shift(Direction::Prev);
            assert_eq!(cursor.reference(), ymd(2025, month, 1));
        }
    }

    #[test]
    fn shift_crosses_year_boundaries() {
        let mut cursor = MonthCursor::new(ymd(2024, 12, 31));
        cursor.shift(Direction::Next);
        assert_eq!(cursor.reference(), ymd(2025, 1, 1));
        cursor.shift(Direction::Prev);
        cursor.shift(Direction::Prev);
        assert_eq!(cursor.reference(), ymd(2024, 11, 1));
    }

    #[test]
    fn direction_parses() {
        assert_eq!("next".parse::<Direction>().ok(), Some(Direction::Next));
        assert_eq!("Prev".parse::<Direction>().ok(), Some(Direction::Prev));
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 2), 28);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2025, 12), 31);
        assert_eq!(days_in_month(2025, 13), 0);
    }
}

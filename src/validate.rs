//! Checks applied to user input before it reaches the planner.

use crate::calendar::DAY_FORMAT;
use crate::config::Config;
use crate::model::{NewEvent, Priority};
use chrono::{NaiveDate, NaiveTime};

pub const TIME_FORMAT: &str = "%H:%M";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("invalid date (use YYYY-MM-DD): {0}")]
    InvalidDate(String),
    #[error("invalid month (use YYYY-MM): {0}")]
    InvalidMonth(String),
    #[error("invalid time (use HH:MM): {0}")]
    InvalidTime(String),
    #[error("end time {end} is before start time {start}")]
    EndBeforeStart { start: String, end: String },
    #[error("unknown priority: {0} (expected high, medium or low)")]
    UnknownPriority(String),
    #[error("unknown direction: {0} (expected prev or next)")]
    UnknownDirection(String),
}

/// Trims `value` and rejects it if nothing is left.
pub fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(trimmed.to_string())
}

pub fn parse_day(input: &str) -> Result<NaiveDate, ValidationError> {
    let raw = input.trim();
    NaiveDate::parse_from_str(raw, DAY_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}

/// Parses `YYYY-MM` into the 1st of that month.
pub fn parse_month(input: &str) -> Result<NaiveDate, ValidationError> {
    let raw = input.trim();
    NaiveDate::parse_from_str(&format!("{raw}-01"), DAY_FORMAT)
        .map_err(|_| ValidationError::InvalidMonth(raw.to_string()))
}

/// Parses `HH:MM` and returns it zero-padded, so stored times sort correctly.
pub fn parse_time(input: &str) -> Result<String, ValidationError> {
    let raw = input.trim();
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .map(|t| t.format(TIME_FORMAT).to_string())
        .map_err(|_| ValidationError::InvalidTime(raw.to_string()))
}

pub fn time_range(start: &str, end: &str) -> Result<(String, String), ValidationError> {
    let start = parse_time(start)?;
    let end = parse_time(end)?;
    if end < start {
        return Err(ValidationError::EndBeforeStart { start, end });
    }
    Ok((start, end))
}

pub fn optional_text(input: Option<&str>) -> Option<String> {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A task ready for `TaskList::add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInput {
    pub title: String,
    pub priority: Priority,
    pub category: String,
}

/// Fills blanks from `config` and checks the task form fields.
pub fn task_input(
    config: &Config,
    title: &str,
    priority: Option<&str>,
    category: Option<&str>,
) -> Result<TaskInput, ValidationError> {
    let title = required("title", title)?;
    let priority = match optional_text(priority) {
        Some(raw) => raw.parse::<Priority>()?,
        None => config.default_priority,
    };
    let category =
        optional_text(category).unwrap_or_else(|| config.default_category().to_string());
    if !config.is_known_category(&category) {
        tracing::warn!(%category, "category is not in the configured list");
    }
    Ok(TaskInput {
        title,
        priority,
        category,
    })
}

/// Checks the event form fields and canonicalizes date and times.
pub fn event_input(
    config: &Config,
    title: &str,
    subject: &str,
    date: &str,
    start: &str,
    end: &str,
    description: Option<&str>,
) -> Result<NewEvent, ValidationError> {
    let title = required("title", title)?;
    let subject = required("subject", subject)?;
    if !config.is_known_subject(&subject) {
        tracing::warn!(%subject, "subject is not in the configured list");
    }
    let date = parse_day(date)?;
    let (start_time, end_time) = time_range(start, end)?;
    Ok(NewEvent {
        title,
        subject,
        date,
        start_time,
        end_time,
        description: optional_text(description),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_titles_are_rejected() {
        assert_eq!(required("title", "   "), Err(ValidationError::Required("title")));
        assert_eq!(required("title", "  Physics  ").as_deref(), Ok("Physics"));
    }

    #[test]
    fn days_and_months() {
        assert_eq!(
            parse_day("2025-02-23"),
            Ok(NaiveDate::from_ymd_opt(2025, 2, 23).unwrap())
        );
        assert!(parse_day("2025-02-30").is_err());
        assert!(parse_day("23/02/2025").is_err());
        assert_eq!(
            parse_month("2025-02"),
            Ok(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap())
        );
        assert!(parse_month("2025-13").is_err());
    }

    #[test]
    fn times_are_normalized_and_ordered() {
        assert_eq!(parse_time("9:05").as_deref(), Ok("09:05"));
        assert!(parse_time("25:00").is_err());
        assert_eq!(
            time_range("14:00", "16:00"),
            Ok(("14:00".to_string(), "16:00".to_string()))
        );
        assert!(matches!(
            time_range("16:00", "9:30"),
            Err(ValidationError::EndBeforeStart { .. })
        ));
    }

    #[test]
    fn task_input_fills_defaults() {
        let config = Config::default();
        let input = task_input(&config, " Solve exercises ", None, Some("  ")).unwrap();
        assert_eq!(input.title, "Solve exercises");
        assert_eq!(input.priority, Priority::Medium);
        assert_eq!(input.category, "Study");

        let input = task_input(&config, "x", Some("LOW"), Some("Reading")).unwrap();
        assert_eq!(input.priority, Priority::Low);
        assert_eq!(input.category, "Reading");

        assert_eq!(
            task_input(&config, "x", Some("soon"), None),
            Err(ValidationError::UnknownPriority("soon".into()))
        );
        assert_eq!(
            task_input(&config, "", None, None),
            Err(ValidationError::Required("title"))
        );
    }

    #[test]
    fn event_input_canonicalizes() {
        let config = Config::default();
        let event = event_input(
            &config,
            "Math review",
            "Math",
            " 2025-02-23 ",
            "9:00",
            "11:30",
            Some(""),
        )
        .unwrap();
        assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 2, 23).unwrap());
        assert_eq!(event.start_time, "09:00");
        assert_eq!(event.description, None);

        assert_eq!(
            event_input(&config, "t", " ", "2025-02-23", "09:00", "10:00", None).unwrap_err(),
            ValidationError::Required("subject")
        );
        assert!(event_input(&config, "t", "Math", "2025-02-23", "10:00", "09:00", None).is_err());
    }

    #[test]
    fn optional_text_drops_blanks() {
        assert_eq!(optional_text(Some("  ")), None);
        assert_eq!(optional_text(Some(" notes ")), Some("notes".to_string()));
        assert_eq!(optional_text(None), None);
    }
}

use crate::calendar::{self, MonthCursor, WEEKDAY_LABELS, WEEK_LEN};
use crate::cli::EventArgs;
use crate::config::Config;
use crate::model::{Planner, StudyEvent, Task};
use crate::storage::{
    init_current_planner, load_planner, locate_planner, save_planner, PlannerLocation,
};
use crate::ui;
use crate::validate::{self, event_input, task_input};
use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use std::env;

const UPCOMING_LIMIT: usize = 20;

pub fn init(name: Option<String>) -> Result<()> {
    let location = init_current_planner(name)?;
    println!("Initialized planner at {}", location.path.display());
    Ok(())
}

pub fn task_add(
    config: &Config,
    title: String,
    priority: Option<String>,
    category: Option<String>,
) -> Result<()> {
    let location = current_location()?;
    print_lines(add_task(&location, config, &title, priority.as_deref(), category.as_deref())?);
    Ok(())
}

pub fn task_list(category: Option<String>, pending_only: bool) -> Result<()> {
    print_lines(list_tasks(&current_location()?, category.as_deref(), pending_only)?);
    Ok(())
}

pub fn task_toggle(task_id: String) -> Result<()> {
    print_lines(toggle_task(&current_location()?, &task_id)?);
    Ok(())
}

pub fn task_delete(task_ids: Vec<String>) -> Result<()> {
    print_lines(delete_tasks(&current_location()?, &task_ids)?);
    Ok(())
}

pub fn task_clear(yes: bool) -> Result<()> {
    print_lines(clear_tasks(&current_location()?, yes)?);
    Ok(())
}

pub fn task_stats(config: &Config) -> Result<()> {
    print_lines(task_summary(&current_location()?, config)?);
    Ok(())
}

pub fn event_add(config: &Config, args: EventArgs) -> Result<()> {
    print_lines(add_event(&current_location()?, config, &args)?);
    Ok(())
}

pub fn event_list(date: Option<String>, upcoming: bool) -> Result<()> {
    print_lines(list_events(&current_location()?, date.as_deref(), upcoming, today())?);
    Ok(())
}

pub fn event_delete(event_id: String) -> Result<()> {
    print_lines(delete_event(&current_location()?, &event_id)?);
    Ok(())
}

pub fn show_calendar(month: Option<String>) -> Result<()> {
    let cursor = match month {
        Some(raw) => MonthCursor::new(validate::parse_month(&raw)?),
        None => MonthCursor::today(),
    };
    let planner = load_planner(&current_location()?)?;
    print_lines(render_month(&cursor, &planner.events, today()));
    Ok(())
}

pub fn tui(config: Config) -> Result<()> {
    let location = current_location()?;
    let planner = load_planner(&location)?;
    ui::run(planner, location, config)
}

fn add_task(
    location: &PlannerLocation,
    config: &Config,
    title: &str,
    priority: Option<&str>,
    category: Option<&str>,
) -> Result<Vec<String>> {
    let input = task_input(config, title, priority, category)?;
    let mut planner = load_planner(location)?;
    let id = planner
        .tasks
        .add(input.title, input.priority, input.category.clone());
    save_planner(location, &planner)?;
    Ok(vec![format!("Added task {} to {}", id, input.category)])
}

fn list_tasks(
    location: &PlannerLocation,
    category: Option<&str>,
    pending_only: bool,
) -> Result<Vec<String>> {
    let planner = load_planner(location)?;
    let mut lines = vec![header(&planner, location)];
    lines.extend(
        planner
            .tasks
            .iter()
            .filter(|task| category.map_or(true, |c| task.category == c))
            .filter(|task| !(pending_only && task.completed))
            .map(task_line),
    );
    if lines.len() == 1 {
        lines.push("  (no tasks)".to_string());
    }
    Ok(lines)
}

fn toggle_task(location: &PlannerLocation, task_id: &str) -> Result<Vec<String>> {
    let mut planner = load_planner(location)?;
    let line = match planner.tasks.toggle(task_id) {
        Some(completed) => {
            save_planner(location, &planner)?;
            let state = if completed { "completed" } else { "pending" };
            format!("Task {} is now {}", task_id, state)
        }
        None => format!("No task {}; nothing changed", task_id),
    };
    Ok(vec![line])
}

fn delete_tasks(location: &PlannerLocation, task_ids: &[String]) -> Result<Vec<String>> {
    let mut planner = load_planner(location)?;
    let removed = planner.tasks.delete_many(task_ids);
    if removed > 0 {
        save_planner(location, &planner)?;
    }
    Ok(vec![format!("Deleted {} of {} task(s)", removed, task_ids.len())])
}

fn clear_tasks(location: &PlannerLocation, yes: bool) -> Result<Vec<String>> {
    let mut planner = load_planner(location)?;
    if !yes && !planner.tasks.is_empty() {
        bail!(
            "refusing to delete {} task(s) without --yes",
            planner.tasks.total()
        );
    }
    let removed = planner.tasks.clear();
    save_planner(location, &planner)?;
    Ok(vec![format!("Deleted {} task(s)", removed)])
}

fn task_summary(location: &PlannerLocation, config: &Config) -> Result<Vec<String>> {
    let planner = load_planner(location)?;
    let mut lines = vec![
        header(&planner, location),
        format!("Total:     {}", planner.tasks.total()),
        format!("Completed: {}", planner.tasks.completed()),
        format!("Pending:   {}", planner.tasks.pending()),
        String::new(),
        "Categories".to_string(),
    ];
    for (category, count) in planner.tasks.category_counts(&config.categories) {
        lines.push(format!("  {:<12} {}", category, count));
    }
    let others: usize = planner
        .tasks
        .count_by_category()
        .iter()
        .filter(|(category, _)| !config.is_known_category(category))
        .map(|(_, n)| n)
        .sum();
    if others > 0 {
        lines.push(format!("  {:<12} {}", "(unlisted)", others));
    }
    Ok(lines)
}

fn add_event(location: &PlannerLocation, config: &Config, args: &EventArgs) -> Result<Vec<String>> {
    let event = event_input(
        config,
        &args.title,
        &args.subject,
        &args.date,
        &args.start,
        &args.end,
        args.description.as_deref(),
    )?;
    let day = calendar::day_key(event.date);
    let mut planner = load_planner(location)?;
    let id = planner.add_event(event);
    save_planner(location, &planner)?;
    Ok(vec![format!("Scheduled event {} on {}", id, day)])
}

fn list_events(
    location: &PlannerLocation,
    date: Option<&str>,
    upcoming: bool,
    today: NaiveDate,
) -> Result<Vec<String>> {
    let planner = load_planner(location)?;
    let events: Vec<&StudyEvent> = match (date, upcoming) {
        (Some(raw), _) => planner.events_on(validate::parse_day(raw)?),
        (None, true) => planner.upcoming_events(today, UPCOMING_LIMIT),
        (None, false) => planner.events.iter().collect(),
    };
    let mut lines = vec![header(&planner, location)];
    if events.is_empty() {
        lines.push("  (no events)".to_string());
    }
    for event in events {
        lines.extend(event_lines(event));
    }
    Ok(lines)
}

fn delete_event(location: &PlannerLocation, event_id: &str) -> Result<Vec<String>> {
    let mut planner = load_planner(location)?;
    let line = if planner.delete_event(event_id) {
        save_planner(location, &planner)?;
        format!("Deleted event {}", event_id)
    } else {
        format!("No event {}; nothing changed", event_id)
    };
    Ok(vec![line])
}

/// Plain-text month grid. Days outside the month are dotted, today is starred
/// and days with events carry a `+n` badge.
pub fn render_month(
    cursor: &MonthCursor,
    events: &[StudyEvent],
    today: NaiveDate,
) -> Vec<String> {
    let cells = cursor.grid();
    let counts = calendar::event_counts(events, &cells);
    let mut lines = Vec::with_capacity(cells.len() / WEEK_LEN + 2);
    lines.push(format!("{:^42}", cursor.to_string()));
    lines.push(
        WEEKDAY_LABELS
            .iter()
            .map(|label| format!("{:^6}", label))
            .collect::<String>(),
    );
    for (week, week_counts) in cells.chunks(WEEK_LEN).zip(counts.chunks(WEEK_LEN)) {
        let line: String = week
            .iter()
            .zip(week_counts)
            .map(|(cell, count)| {
                let day = chrono::Datelike::day(&cell.date);
                let mark = if cell.date == today {
                    '*'
                } else if cell.is_current_month {
                    ' '
                } else {
                    '.'
                };
                let badge = if *count > 0 { format!("+{}", count) } else { String::new() };
                format!("{}{:>2}{:<3}", mark, day, badge)
            })
            .collect();
        lines.push(line.trim_end().to_string());
    }
    lines
}

fn current_location() -> Result<PlannerLocation> {
    let cwd = env::current_dir()?;
    locate_planner(&cwd)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

fn header(planner: &Planner, location: &PlannerLocation) -> String {
    format!("Planner: {} ({})", planner.name, location.scope.label())
}

fn task_line(task: &Task) -> String {
    let check = if task.completed { "x" } else { " " };
    format!(
        "  [{}] {}: {} ({}, {})",
        check, task.id, task.title, task.priority, task.category
    )
}

fn event_lines(event: &StudyEvent) -> Vec<String> {
    let mut lines = vec![format!(
        "  - {}: {} {}-{} {} [{}]",
        event.id, event.date, event.start_time, event.end_time, event.title, event.subject
    )];
    if let Some(description) = &event.description {
        lines.push(format!("    {}", description));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;
    use crate::storage::init_project_planner;
    use tempfile::{tempdir, TempDir};

    fn planner_dir() -> (TempDir, PlannerLocation) {
        let temp = tempdir().unwrap();
        let location = init_project_planner(temp.path(), Some("term".into())).unwrap();
        (temp, location)
    }

    fn seed_task(location: &PlannerLocation, category: &str) -> String {
        let mut planner = load_planner(location).unwrap();
        let id = planner.tasks.add("Read notes", Priority::Low, category);
        save_planner(location, &planner).unwrap();
        id
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_render_has_title_labels_and_six_weeks() {
        let events = vec![StudyEvent {
            id: "1".into(),
            title: "Math review".into(),
            subject: "Math".into(),
            date: "2025-02-23".into(),
            start_time: "14:00".into(),
            end_time: "16:00".into(),
            description: None,
        }];
        let cursor = MonthCursor::new(ymd(2025, 2, 10));
        let lines = render_month(&cursor, &events, ymd(2025, 2, 3));

        assert_eq!(lines.len(), 8);
        assert!(lines[0].contains("February 2025"));
        assert!(lines[1].contains("Su") && lines[1].contains("Sa"));
        // First week: Jan 26-31 then Feb 1.
        assert!(lines[2].starts_with(".26"));
        assert!(lines[3].contains("* 3"));
        assert!(lines[6].contains("23+1"));
    }

    #[test]
    fn clear_refuses_without_yes_and_keeps_tasks() {
        let (_temp, location) = planner_dir();
        seed_task(&location, "Study");

        let err = clear_tasks(&location, false).unwrap_err();
        assert!(err.to_string().contains("refusing to delete 1 task(s) without --yes"));
        assert_eq!(load_planner(&location).unwrap().tasks.total(), 1);

        assert_eq!(clear_tasks(&location, true).unwrap(), vec!["Deleted 1 task(s)"]);
        assert!(load_planner(&location).unwrap().tasks.is_empty());
    }

    #[test]
    fn clearing_an_empty_list_needs_no_confirmation() {
        let (_temp, location) = planner_dir();
        assert_eq!(clear_tasks(&location, false).unwrap(), vec!["Deleted 0 task(s)"]);
    }

    #[test]
    fn unknown_ids_report_nothing_changed() {
        let (_temp, location) = planner_dir();
        let id = seed_task(&location, "Study");

        assert_eq!(
            toggle_task(&location, "nope").unwrap(),
            vec!["No task nope; nothing changed"]
        );
        assert_eq!(
            delete_event(&location, "nope").unwrap(),
            vec!["No event nope; nothing changed"]
        );
        assert_eq!(
            delete_tasks(&location, &["nope".to_string()]).unwrap(),
            vec!["Deleted 0 of 1 task(s)"]
        );
        let planner = load_planner(&location).unwrap();
        assert_eq!(planner.tasks.total(), 1);
        assert_eq!(planner.tasks.get(&id).map(|t| t.completed), Some(false));

        assert_eq!(
            toggle_task(&location, &id).unwrap(),
            vec![format!("Task {} is now completed", id)]
        );
    }

    #[test]
    fn stats_group_unconfigured_categories_as_unlisted() {
        let (_temp, location) = planner_dir();
        seed_task(&location, "Study");
        seed_task(&location, "Music");
        seed_task(&location, "Chess");

        let lines = task_summary(&location, &Config::default()).unwrap();
        assert_eq!(lines[1], "Total:     3");
        assert!(lines.iter().any(|l| l.trim_end() == "  Study        1"));
        assert!(lines.iter().any(|l| l.trim_end() == "  (unlisted)   2"));
    }

    #[test]
    fn stats_omit_unlisted_when_every_category_is_known() {
        let (_temp, location) = planner_dir();
        seed_task(&location, "Review");

        let lines = task_summary(&location, &Config::default()).unwrap();
        assert!(!lines.iter().any(|l| l.contains("(unlisted)")));
    }

    #[test]
    fn task_listing_filters_pending_and_category() {
        let (_temp, location) = planner_dir();
        let done = seed_task(&location, "Study");
        seed_task(&location, "Reading");
        toggle_task(&location, &done).unwrap();

        let pending = list_tasks(&location, None, true).unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending[1].contains("Reading"));

        let none = list_tasks(&location, Some("Practice"), false).unwrap();
        assert_eq!(none[1], "  (no tasks)");
    }
}

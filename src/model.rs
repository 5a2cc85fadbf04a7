use crate::validate::ValidationError;
use chrono::NaiveDate;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type TaskId = String;
pub type EventId = String;

const ID_LEN: usize = 6;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(ValidationError::UnknownPriority(s.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub completed: bool,
    pub priority: Priority,
    pub category: String,
}

/// A study session pinned to one calendar day.
///
/// `date` is kept as the `YYYY-MM-DD` string it was stored with; lookups
/// compare it verbatim against the formatted cell date.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StudyEvent {
    pub id: EventId,
    pub title: String,
    pub subject: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Ordered, in-memory task list. Operations on ids that are not present are
/// no-ops.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new() -> Self {
        TaskList { tasks: Vec::new() }
    }

    pub fn add(
        &mut self,
        title: impl Into<String>,
        priority: Priority,
        category: impl Into<String>,
    ) -> TaskId {
        let id = fresh_id(|candidate| self.get(candidate).is_some());
        let task = Task {
            id: id.clone(),
            title: title.into(),
            completed: false,
            priority,
            category: category.into(),
        };
        tracing::debug!(
            task_id = %id,
            priority = %task.priority,
            category = %task.category,
            "task added"
        );
        self.tasks.push(task);
        id
    }

    /// Flips completion and returns the new state, or `None` for an unknown id.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.completed = !task.completed;
                tracing::debug!(task_id = %id, completed = task.completed, "task toggled");
                Some(task.completed)
            }
            None => {
                tracing::debug!(task_id = %id, "toggle ignored: unknown task");
                None
            }
        }
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        let removed = self.tasks.len() != before;
        if !removed {
            tracing::debug!(task_id = %id, "delete ignored: unknown task");
        }
        removed
    }

    /// Removes every task whose id appears in `ids`; returns how many went.
    pub fn delete_many<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !ids.iter().any(|id| id.as_ref() == t.id));
        let removed = before - self.tasks.len();
        tracing::debug!(requested = ids.len(), removed, "tasks deleted");
        removed
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.tasks.len();
        self.tasks.clear();
        removed
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    pub fn completed(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    pub fn pending(&self) -> usize {
        self.tasks.iter().filter(|t| !t.completed).count()
    }

    pub fn count_by_category(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for task in &self.tasks {
            *counts.entry(task.category.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// One entry per configured category, in the given order, zeros included.
    pub fn category_counts<'a>(&self, categories: &'a [String]) -> Vec<(&'a str, usize)> {
        categories
            .iter()
            .map(|c| {
                let n = self.tasks.iter().filter(|t| &t.category == c).count();
                (c.as_str(), n)
            })
            .collect()
    }
}

/// The persisted document: the task list plus the study events.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Planner {
    pub name: String,
    #[serde(default)]
    pub tasks: TaskList,
    #[serde(default)]
    pub events: Vec<StudyEvent>,
}

/// Fields of a new study event, already validated.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub subject: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub description: Option<String>,
}

impl Planner {
    pub fn new(name: impl Into<String>) -> Self {
        Planner {
            name: name.into(),
            tasks: TaskList::new(),
            events: Vec::new(),
        }
    }

    pub fn add_event(&mut self, event: NewEvent) -> EventId {
        let id = fresh_id(|candidate| self.events.iter().any(|e| e.id == candidate));
        let date = crate::calendar::day_key(event.date);
        tracing::debug!(event_id = %id, %date, subject = %event.subject, "event added");
        self.events.push(StudyEvent {
            id: id.clone(),
            title: event.title,
            subject: event.subject,
            date,
            start_time: event.start_time,
            end_time: event.end_time,
            description: event.description,
        });
        id
    }

    pub fn delete_event(&mut self, id: &str) -> bool {
        let before = self.events.len();
        self.events.retain(|e| e.id != id);
        before != self.events.len()
    }

    pub fn events_on(&self, date: NaiveDate) -> Vec<&StudyEvent> {
        crate::calendar::events_on(&self.events, date)
    }

    /// Events on or after `from`, ordered by day then start time.
    ///
    /// Dates that are not in `YYYY-MM-DD` form are skipped; they would never
    /// show up on the calendar either.
    pub fn upcoming_events(&self, from: NaiveDate, limit: usize) -> Vec<&StudyEvent> {
        let from_key = crate::calendar::day_key(from);
        let mut upcoming: Vec<&StudyEvent> = self
            .events
            .iter()
            .filter(|e| NaiveDate::parse_from_str(&e.date, crate::calendar::DAY_FORMAT).is_ok())
            .filter(|e| e.date >= from_key)
            .collect();
        upcoming.sort_by(|a, b| (&a.date, &a.start_time).cmp(&(&b.date, &b.start_time)));
        upcoming.truncate(limit);
        upcoming
    }
}

fn fresh_id<F>(taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    loop {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ID_LEN)
            .map(char::from)
            .collect();
        if !taken(&id) {
            return id;
        }
    }
}

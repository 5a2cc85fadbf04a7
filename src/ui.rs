use crate::calendar::{self, MonthCursor, WEEKDAY_LABELS, WEEK_LEN};
use crate::config::Config;
use crate::model::{EventId, Planner, Priority, StudyEvent, Task, TaskId};
use crate::storage::{save_planner, PlannerLocation};
use crate::validate::{event_input, task_input};
use anyhow::Result;
use chrono::{Datelike, Days, Local, NaiveDate};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

const FORM_HINT: &str = "(Tab/Shift-Tab move, ←/→ pick, Enter save, Esc cancel)";
const CONFIRM_HINT: &str = "(y to confirm, n/Esc to cancel)";

pub fn run(planner: Planner, location: PlannerLocation, config: Config) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(planner, location, config);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    planner: Planner,
    location: PlannerLocation,
    config: Config,
    last_save: Instant,
    status: String,
    mode: Mode,
    view: ViewMode,
    calendar: CalendarState,
    tasks: TaskState,
}

enum Mode {
    Normal,
    Form(Form),
    Confirm(PendingDelete),
}

enum PendingDelete {
    Task(TaskId),
    Marked(Vec<TaskId>),
    AllTasks,
    Event(EventId),
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum ViewMode {
    Calendar,
    Planner,
}

impl ViewMode {
    fn label(&self) -> &'static str {
        match self {
            ViewMode::Calendar => "Calendar",
            ViewMode::Planner => "Planner",
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum CalendarFocus {
    Grid,
    Events,
}

struct CalendarState {
    cursor: MonthCursor,
    selected: NaiveDate,
    focus: CalendarFocus,
    event_idx: usize,
}

impl CalendarState {
    fn new(today: NaiveDate) -> Self {
        CalendarState {
            cursor: MonthCursor::new(today),
            selected: today,
            focus: CalendarFocus::Grid,
            event_idx: 0,
        }
    }

    /// Moves the selected day, following it into the adjacent month.
    fn move_selection(&mut self, days: i64) {
        let moved = if days >= 0 {
            self.selected.checked_add_days(Days::new(days.unsigned_abs()))
        } else {
            self.selected.checked_sub_days(Days::new(days.unsigned_abs()))
        };
        let Some(date) = moved else {
            return;
        };
        let shown = calendar::first_of_month(self.cursor.reference());
        let target = calendar::first_of_month(date);
        if target > shown {
            self.cursor.shift(calendar::Direction::Next);
        } else if target < shown {
            self.cursor.shift(calendar::Direction::Prev);
        }
        self.selected = date;
        self.event_idx = 0;
    }

    fn shift_month(&mut self, direction: calendar::Direction) {
        self.cursor.shift(direction);
        self.selected = self.cursor.reference();
        self.event_idx = 0;
    }

    fn jump_to(&mut self, date: NaiveDate) {
        self.cursor = MonthCursor::new(date);
        self.selected = date;
        self.event_idx = 0;
    }
}

struct TaskState {
    selected: usize,
    offset: usize,
    marked: Vec<TaskId>,
}

impl TaskState {
    fn toggle_mark(&mut self, id: &str) {
        if let Some(pos) = self.marked.iter().position(|m| m == id) {
            self.marked.remove(pos);
        } else {
            self.marked.push(id.to_string());
        }
    }

    fn is_marked(&self, id: &str) -> bool {
        self.marked.iter().any(|m| m == id)
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum FormKind {
    Task,
    Event,
}

/// A modal form: a column of text inputs and fixed-choice pickers.
struct Form {
    kind: FormKind,
    fields: Vec<Field>,
    active: usize,
}

struct Field {
    label: &'static str,
    input: Input,
}

enum Input {
    Text(FieldValue),
    Choice { options: Vec<String>, idx: usize },
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_boundary(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_boundary(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_boundary(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

impl Input {
    fn text(&self) -> &str {
        match self {
            Input::Text(field) => &field.value,
            Input::Choice { options, idx } => options.get(*idx).map(String::as_str).unwrap_or(""),
        }
    }

    fn cycle(&mut self, forward: bool) {
        if let Input::Choice { options, idx } = self {
            if options.is_empty() {
                return;
            }
            *idx = if forward {
                (*idx + 1) % options.len()
            } else {
                (*idx + options.len() - 1) % options.len()
            };
        }
    }
}

impl Form {
    fn task(config: &Config) -> Self {
        let priorities: Vec<String> = Priority::ALL.iter().map(|p| p.to_string()).collect();
        let priority_idx = Priority::ALL
            .iter()
            .position(|p| *p == config.default_priority)
            .unwrap_or(1);
        let category_idx = config
            .categories
            .iter()
            .position(|c| c == config.default_category())
            .unwrap_or(0);
        Form {
            kind: FormKind::Task,
            fields: vec![
                Field {
                    label: "Title",
                    input: Input::Text(FieldValue::new("")),
                },
                Field {
                    label: "Priority",
                    input: Input::Choice {
                        options: priorities,
                        idx: priority_idx,
                    },
                },
                Field {
                    label: "Category",
                    input: Input::Choice {
                        options: config.categories.clone(),
                        idx: category_idx,
                    },
                },
            ],
            active: 0,
        }
    }

    fn event(config: &Config, date: NaiveDate) -> Self {
        Form {
            kind: FormKind::Event,
            fields: vec![
                Field {
                    label: "Title",
                    input: Input::Text(FieldValue::new("")),
                },
                Field {
                    label: "Subject",
                    input: Input::Choice {
                        options: config.subjects.clone(),
                        idx: 0,
                    },
                },
                Field {
                    label: "Date (YYYY-MM-DD)",
                    input: Input::Text(FieldValue::new(&calendar::day_key(date))),
                },
                Field {
                    label: "Start (HH:MM)",
                    input: Input::Text(FieldValue::new("")),
                },
                Field {
                    label: "End (HH:MM)",
                    input: Input::Text(FieldValue::new("")),
                },
                Field {
                    label: "Description",
                    input: Input::Text(FieldValue::new("")),
                },
            ],
            active: 0,
        }
    }

    fn title(&self) -> &'static str {
        match self.kind {
            FormKind::Task => "New Task",
            FormKind::Event => "New Study Event",
        }
    }

    fn value(&self, idx: usize) -> &str {
        self.fields.get(idx).map(|f| f.input.text()).unwrap_or("")
    }

    fn next_field(&mut self) {
        self.active = (self.active + 1) % self.fields.len();
    }

    fn prev_field(&mut self) {
        self.active = (self.active + self.fields.len() - 1) % self.fields.len();
    }

    fn active_input_mut(&mut self) -> Option<&mut Input> {
        self.fields.get_mut(self.active).map(|f| &mut f.input)
    }
}

impl App {
    fn new(planner: Planner, location: PlannerLocation, config: Config) -> Self {
        let status = format!("Loaded planner from {}", location.path.display());
        App {
            planner,
            location,
            config,
            last_save: Instant::now(),
            status,
            mode: Mode::Normal,
            view: ViewMode::Calendar,
            calendar: CalendarState::new(today()),
            tasks: TaskState {
                selected: 0,
                offset: 0,
                marked: Vec::new(),
            },
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Form(_) => self.handle_form_key(key),
            Mode::Confirm(_) => self.handle_confirm_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('1') => {
                self.set_view(ViewMode::Calendar);
                return Ok(false);
            }
            KeyCode::Char('2') => {
                self.set_view(ViewMode::Planner);
                return Ok(false);
            }
            _ => {}
        }
        match self.view {
            ViewMode::Calendar => self.handle_calendar_key(key),
            ViewMode::Planner => self.handle_planner_key(key),
        }
    }

    fn handle_calendar_key(&mut self, key: KeyEvent) -> Result<bool> {
        if self.calendar.focus == CalendarFocus::Events {
            match key.code {
                KeyCode::Up | KeyCode::Char('k') => {
                    self.calendar.event_idx = self.calendar.event_idx.saturating_sub(1);
                    return Ok(false);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    let count = self.selected_day_events().len();
                    if self.calendar.event_idx + 1 < count {
                        self.calendar.event_idx += 1;
                    }
                    return Ok(false);
                }
                _ => {}
            }
        }
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.calendar.move_selection(-1),
            KeyCode::Right | KeyCode::Char('l') => self.calendar.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.calendar.move_selection(-(WEEK_LEN as i64)),
            KeyCode::Down | KeyCode::Char('j') => self.calendar.move_selection(WEEK_LEN as i64),
            KeyCode::Char('[') | KeyCode::PageUp => {
                self.calendar.shift_month(calendar::Direction::Prev);
                self.status = format!("Showing {}", self.calendar.cursor);
            }
            KeyCode::Char(']') | KeyCode::PageDown => {
                self.calendar.shift_month(calendar::Direction::Next);
                self.status = format!("Showing {}", self.calendar.cursor);
            }
            KeyCode::Char('t') => self.calendar.jump_to(today()),
            KeyCode::Tab | KeyCode::BackTab => {
                self.calendar.focus = match self.calendar.focus {
                    CalendarFocus::Grid => CalendarFocus::Events,
                    CalendarFocus::Events => CalendarFocus::Grid,
                };
            }
            KeyCode::Char('n') => {
                self.mode = Mode::Form(Form::event(&self.config, self.calendar.selected));
                self.status = format!("New event {}", FORM_HINT);
            }
            KeyCode::Char('d') => {
                let target = self
                    .selected_day_events()
                    .get(self.calendar.event_idx)
                    .map(|e| e.id.clone());
                match target {
                    Some(id) => {
                        self.status = format!("Delete event {}? {}", id, CONFIRM_HINT);
                        self.mode = Mode::Confirm(PendingDelete::Event(id));
                    }
                    None => self.status = "No event selected to delete".into(),
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_planner_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.tasks.selected = self.tasks.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.tasks.selected + 1 < self.planner.tasks.total() {
                    self.tasks.selected += 1;
                }
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                if let Some(id) = self.current_task().map(|t| t.id.clone()) {
                    let before = self.planner.clone();
                    if let Some(completed) = self.planner.tasks.toggle(&id) {
                        let state = if completed { "completed" } else { "pending" };
                        let message = format!("Marked {} {}", id, state);
                        if let Err(err) = self.persist(before, message) {
                            self.status = format!("Save failed: {:#}", err);
                        }
                    }
                }
            }
            KeyCode::Char('x') => {
                if let Some(id) = self.current_task().map(|t| t.id.clone()) {
                    self.tasks.toggle_mark(&id);
                    self.status = format!("{} task(s) selected", self.tasks.marked.len());
                }
            }
            KeyCode::Char('n') => {
                self.mode = Mode::Form(Form::task(&self.config));
                self.status = format!("New task {}", FORM_HINT);
            }
            KeyCode::Char('d') => match self.current_task().map(|t| t.id.clone()) {
                Some(id) => {
                    self.status = format!("Delete {}? {}", id, CONFIRM_HINT);
                    self.mode = Mode::Confirm(PendingDelete::Task(id));
                }
                None => self.status = "No task selected to delete".into(),
            },
            KeyCode::Char('D') => {
                if self.tasks.marked.is_empty() {
                    self.status = "No tasks selected (x to select)".into();
                } else {
                    self.status = format!(
                        "Delete {} selected task(s)? {}",
                        self.tasks.marked.len(),
                        CONFIRM_HINT
                    );
                    self.mode = Mode::Confirm(PendingDelete::Marked(self.tasks.marked.clone()));
                }
            }
            KeyCode::Char('C') => {
                if self.planner.tasks.is_empty() {
                    self.status = "No tasks to delete".into();
                } else {
                    self.status = format!("Delete ALL tasks? {}", CONFIRM_HINT);
                    self.mode = Mode::Confirm(PendingDelete::AllTasks);
                }
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Result<bool> {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let close_form = match &mut mode {
            Mode::Form(form) => self.process_form_key(form, key)?,
            Mode::Normal | Mode::Confirm(_) => true,
        };
        self.mode = if close_form { Mode::Normal } else { mode };
        Ok(false)
    }

    fn process_form_key(&mut self, form: &mut Form, key: KeyEvent) -> Result<bool> {
        let mut close_form = false;
        match key.code {
            KeyCode::Esc => {
                close_form = true;
                self.status = "Canceled".into();
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Enter => close_form = self.try_submit(form)?,
            KeyCode::Left => match form.active_input_mut() {
                Some(Input::Text(field)) => field.move_left(),
                Some(choice) => choice.cycle(false),
                None => {}
            },
            KeyCode::Right => match form.active_input_mut() {
                Some(Input::Text(field)) => field.move_right(),
                Some(choice) => choice.cycle(true),
                None => {}
            },
            KeyCode::Backspace => {
                if let Some(Input::Text(field)) = form.active_input_mut() {
                    field.backspace();
                }
            }
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    if let Some(Input::Text(field)) = form.active_input_mut() {
                        field.insert_char(c);
                    }
                }
            }
            _ => {}
        }
        Ok(close_form)
    }

    fn try_submit(&mut self, form: &Form) -> Result<bool> {
        let outcome = match form.kind {
            FormKind::Task => self.create_task_from_form(form),
            FormKind::Event => self.create_event_from_form(form),
        };
        if let Err(err) = outcome {
            self.status = format!("Could not create: {}", err);
            return Ok(false);
        }
        Ok(true)
    }

    fn create_task_from_form(&mut self, form: &Form) -> Result<()> {
        let input = task_input(
            &self.config,
            form.value(0),
            Some(form.value(1)),
            Some(form.value(2)),
        )?;
        let before = self.planner.clone();
        let id = self
            .planner
            .tasks
            .add(input.title, input.priority, input.category);
        self.tasks.selected = self.planner.tasks.total().saturating_sub(1);
        self.persist(before, format!("Created task {}", id))
    }

    fn create_event_from_form(&mut self, form: &Form) -> Result<()> {
        let input = event_input(
            &self.config,
            form.value(0),
            form.value(1),
            form.value(2),
            form.value(3),
            form.value(4),
            Some(form.value(5)),
        )?;
        let date = input.date;
        let before = self.planner.clone();
        let id = self.planner.add_event(input);
        self.calendar.jump_to(date);
        let message = format!("Scheduled event {} on {}", id, calendar::day_key(date));
        self.persist(before, message)
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                if let Mode::Confirm(pending) = std::mem::replace(&mut self.mode, Mode::Normal) {
                    if let Err(err) = self.apply_delete(pending) {
                        self.status = format!("Delete failed: {:#}", err);
                    }
                }
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
                self.mode = Mode::Normal;
            }
            _ => {}
        }
        Ok(false)
    }

    fn apply_delete(&mut self, pending: PendingDelete) -> Result<()> {
        let before = self.planner.clone();
        let marked = self.tasks.marked.clone();
        let message = match pending {
            PendingDelete::Task(id) => {
                self.planner.tasks.delete(&id);
                self.tasks.marked.retain(|m| m != &id);
                format!("Deleted {}", id)
            }
            PendingDelete::Marked(ids) => {
                let removed = self.planner.tasks.delete_many(&ids);
                self.tasks.marked.clear();
                format!("Deleted {} task(s)", removed)
            }
            PendingDelete::AllTasks => {
                let removed = self.planner.tasks.clear();
                self.tasks.marked.clear();
                format!("Deleted all {} task(s)", removed)
            }
            PendingDelete::Event(id) => {
                self.planner.delete_event(&id);
                format!("Deleted event {}", id)
            }
        };
        let result = self.persist(before, message);
        if result.is_err() {
            self.tasks.marked = marked;
        }
        result
    }

    fn set_view(&mut self, view: ViewMode) {
        if self.view != view {
            self.view = view;
            self.status = format!("Switched to {} view", view.label());
        }
        self.ensure_bounds();
    }

    /// Saves the planner. When the save fails the planner goes back to
    /// `before`, so memory never holds changes the file lacks.
    fn persist(&mut self, before: Planner, message: impl Into<String>) -> Result<()> {
        if let Err(err) = save_planner(&self.location, &self.planner) {
            tracing::warn!(
                error = %err,
                path = %self.location.path.display(),
                "save failed; change rolled back"
            );
            self.planner = before;
            self.ensure_bounds();
            return Err(err);
        }
        self.last_save = Instant::now();
        self.status = message.into();
        self.ensure_bounds();
        Ok(())
    }

    fn ensure_bounds(&mut self) {
        let total = self.planner.tasks.total();
        if self.tasks.selected >= total {
            self.tasks.selected = total.saturating_sub(1);
        }
        let planner = &self.planner;
        self.tasks.marked.retain(|id| planner.tasks.get(id).is_some());
        let events = self.selected_day_events().len();
        if self.calendar.event_idx >= events {
            self.calendar.event_idx = events.saturating_sub(1);
        }
    }

    fn current_task(&self) -> Option<&Task> {
        self.planner.tasks.iter().nth(self.tasks.selected)
    }

    fn selected_day_events(&self) -> Vec<&StudyEvent> {
        let mut events = self.planner.events_on(self.calendar.selected);
        events.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        events
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        match self.view {
            ViewMode::Calendar => self.draw_calendar(f, layout[1]),
            ViewMode::Planner => self.draw_planner(f, layout[1]),
        }
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::Form(form) => draw_form(f, form),
            Mode::Confirm(pending) => self.draw_confirm(f, pending),
            Mode::Normal => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let title = Line::from(vec![
            Span::styled(
                "studydesk ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                &self.planner.name,
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(self.location.scope.label(), Style::default().fg(Color::Green)),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", self.location.path.display()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("saved {}", format_elapsed(self.last_save)),
                Style::default().fg(Color::Gray),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("view {}", self.view.label().to_lowercase()),
                Style::default().fg(Color::Magenta),
            ),
        ]);
        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_calendar(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        self.ensure_bounds();
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);
        self.draw_month_grid(f, columns[0]);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(columns[1]);
        self.draw_day_events(f, right[0]);
        self.draw_upcoming(f, right[1]);
    }

    fn draw_month_grid(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let focused = self.calendar.focus == CalendarFocus::Grid;
        let cells = self.calendar.cursor.grid();
        let counts = calendar::event_counts(&self.planner.events, &cells);
        let today = today();

        let mut lines = Vec::new();
        lines.push(Line::from(Span::styled(
            self.calendar.cursor.to_string(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(
            WEEKDAY_LABELS
                .iter()
                .map(|h| Span::styled(format!("{:^7}", h), Style::default().fg(Color::Gray)))
                .collect::<Vec<_>>(),
        ));
        for (week, week_counts) in cells.chunks(WEEK_LEN).zip(counts.chunks(WEEK_LEN)) {
            let mut spans = Vec::new();
            for (cell, count) in week.iter().zip(week_counts) {
                let text = if *count > 0 {
                    format!("{:>2}({})", cell.date.day(), (*count).min(9))
                } else {
                    format!("{:>2}   ", cell.date.day())
                };
                let mut style = Style::default().fg(if !cell.is_current_month {
                    Color::DarkGray
                } else if *count > 0 {
                    Color::LightYellow
                } else {
                    Color::White
                });
                if cell.date == today {
                    style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
                }
                if cell.date == self.calendar.selected {
                    style = style
                        .bg(if focused { Color::Cyan } else { Color::Blue })
                        .fg(Color::Black)
                        .add_modifier(Modifier::BOLD);
                }
                spans.push(Span::styled(format!("{:>6}", text), style));
                spans.push(Span::raw(" "));
            }
            lines.push(Line::from(spans));
            lines.push(Line::from(""));
        }

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(focus_block("Calendar", focused));
        f.render_widget(paragraph, area);
    }

    fn draw_day_events(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let focused = self.calendar.focus == CalendarFocus::Events;
        let events = self.selected_day_events();
        let title = format!("{} ({})", self.calendar.selected.format("%a %d %b %Y"), events.len());
        if events.is_empty() {
            let empty = Paragraph::new("No study events. Press n to add one.")
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .block(focus_block(&title, focused));
            f.render_widget(empty, area);
            return;
        }
        let items: Vec<ListItem> = events.iter().map(|e| event_item(e)).collect();
        let mut state = ListState::default();
        if focused {
            state.select(Some(self.calendar.event_idx));
        }
        let list = List::new(items)
            .block(focus_block(&title, focused))
            .highlight_style(
                Style::default()
                    .bg(Color::LightCyan)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_upcoming(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let limit = area.height.saturating_sub(2) as usize;
        let lines: Vec<Line> = self
            .planner
            .upcoming_events(today(), limit)
            .into_iter()
            .map(|e| {
                Line::from(vec![
                    Span::styled(e.date.clone(), Style::default().fg(Color::LightYellow)),
                    Span::raw(" "),
                    Span::styled(e.start_time.clone(), Style::default().fg(Color::Gray)),
                    Span::raw("  "),
                    Span::raw(truncate_text(&e.title, 40)),
                ])
            })
            .collect();
        let body = if lines.is_empty() {
            vec![Line::from("Nothing scheduled")]
        } else {
            lines
        };
        let paragraph = Paragraph::new(body).block(focus_block("Upcoming", false));
        f.render_widget(paragraph, area);
    }

    fn draw_planner(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        self.ensure_bounds();
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(area);
        self.draw_task_list(f, columns[0]);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(3)])
            .split(columns[1]);
        self.draw_summary(f, right[0]);
        self.draw_categories(f, right[1]);
    }

    fn draw_task_list(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let title = format!("Tasks ({})", self.planner.tasks.total());
        if self.planner.tasks.is_empty() {
            let empty = Paragraph::new("You have no tasks yet. Press n to add one.")
                .alignment(Alignment::Center)
                .block(focus_block(&title, true));
            f.render_widget(empty, area);
            return;
        }
        let width = area.width.saturating_sub(2);
        let items: Vec<ListItem> = self
            .planner
            .tasks
            .iter()
            .map(|t| task_item(t, self.tasks.is_marked(&t.id), width))
            .collect();
        let viewport = area.height.saturating_sub(2) as usize;
        self.tasks.offset = adjust_offset(
            self.tasks.selected,
            self.tasks.offset,
            viewport,
            1,
            items.len(),
        );
        let mut state = ListState::default();
        state.select(Some(self.tasks.selected));
        *state.offset_mut() = self.tasks.offset;
        let list = List::new(items)
            .block(focus_block(&title, true))
            .highlight_style(
                Style::default()
                    .bg(Color::LightCyan)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_summary(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let tasks = &self.planner.tasks;
        let lines = vec![
            summary_line("Total", tasks.total(), Color::White),
            summary_line("Completed", tasks.completed(), Color::LightGreen),
            summary_line("Pending", tasks.pending(), Color::LightYellow),
        ];
        f.render_widget(
            Paragraph::new(lines).block(focus_block("Summary", false)),
            area,
        );
    }

    fn draw_categories(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let lines: Vec<Line> = self
            .planner
            .tasks
            .category_counts(&self.config.categories)
            .into_iter()
            .map(|(category, count)| summary_line(category, count, Color::Gray))
            .collect();
        f.render_widget(
            Paragraph::new(lines).block(focus_block("Categories", false)),
            area,
        );
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, rows[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::LightCyan));
        let mut spans = vec![
            key("1"),
            Span::raw(" calendar  "),
            key("2"),
            Span::raw(" planner  "),
        ];
        match self.view {
            ViewMode::Calendar => spans.extend([
                key("←↑↓→ / h j k l"),
                Span::raw(" day  "),
                key("[ ]"),
                Span::raw(" month  "),
                key("t"),
                Span::raw(" today  "),
                key("Tab"),
                Span::raw(" focus  "),
                key("n"),
                Span::raw(" new event  "),
                key("d"),
                Span::raw(" delete  "),
            ]),
            ViewMode::Planner => spans.extend([
                key("↑↓ / j k"),
                Span::raw(" move  "),
                key("Space"),
                Span::raw(" done  "),
                key("x"),
                Span::raw(" select  "),
                key("n"),
                Span::raw(" new  "),
                key("d"),
                Span::raw(" delete  "),
                key("D"),
                Span::raw(" delete selected  "),
                key("C"),
                Span::raw(" delete all  "),
            ]),
        }
        spans.extend([key("q"), Span::raw(" quit")]);
        Line::from(spans)
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, pending: &PendingDelete) {
        let area = centered_rect(50, 30, f.size());
        let question = match pending {
            PendingDelete::Task(id) => {
                let title = self
                    .planner
                    .tasks
                    .get(id)
                    .map(|t| t.title.clone())
                    .unwrap_or_else(|| id.clone());
                format!("Delete \"{}\"?", title)
            }
            PendingDelete::Marked(ids) => format!("Delete {} selected task(s)?", ids.len()),
            PendingDelete::AllTasks => {
                format!("Delete all {} task(s)?", self.planner.tasks.total())
            }
            PendingDelete::Event(id) => {
                let title = self
                    .planner
                    .events
                    .iter()
                    .find(|e| &e.id == id)
                    .map(|e| e.title.clone())
                    .unwrap_or_else(|| id.clone());
                format!("Delete event \"{}\"?", title)
            }
        };
        let body = vec![
            Line::from(Span::styled(
                question,
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Confirm Delete",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

fn draw_form(f: &mut ratatui::Frame<'_>, form: &Form) {
    let area = centered_rect(60, 50, f.size());
    let mut lines = Vec::new();
    for (idx, field) in form.fields.iter().enumerate() {
        lines.push(field_line(field, idx == form.active));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter to save • Esc to cancel • Tab/Shift-Tab to move • ←/→ to pick options",
        Style::default().fg(Color::Gray),
    )));
    let dialog = Paragraph::new(lines)
        .block(
            Block::default()
                .title(Span::styled(
                    form.title(),
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn focus_block(title: &str, focused: bool) -> Block<'static> {
    Block::default()
        .title(Span::styled(
            title.to_string(),
            Style::default()
                .fg(if focused { Color::Cyan } else { Color::Gray })
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused {
            Color::Cyan
        } else {
            Color::DarkGray
        }))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::High => Color::LightRed,
        Priority::Medium => Color::Rgb(255, 165, 0),
        Priority::Low => Color::LightGreen,
    }
}

/// Keeps `selected` inside the visible window with `scrolloff` rows of margin.
fn adjust_offset(
    selected: usize,
    current_offset: usize,
    viewport: usize,
    scrolloff: usize,
    len: usize,
) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let margin = scrolloff.min(viewport.saturating_sub(1));
    let mut offset = current_offset.min(max_offset);
    if selected < offset.saturating_add(margin) {
        offset = selected.saturating_sub(margin);
    } else {
        let upper = offset
            .saturating_add(viewport.saturating_sub(1))
            .saturating_sub(margin);
        if selected > upper {
            offset = selected.saturating_add(margin + 1).saturating_sub(viewport);
        }
    }
    offset.min(max_offset)
}

fn prev_boundary(cursor: usize, text: &str) -> usize {
    text[..cursor]
        .char_indices()
        .next_back()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_boundary(cursor: usize, text: &str) -> usize {
    text[cursor..]
        .chars()
        .next()
        .map(|c| cursor + c.len_utf8())
        .unwrap_or(text.len())
}

fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

fn task_item(task: &Task, marked: bool, width: u16) -> ListItem<'static> {
    let check = if task.completed { "[x]" } else { "[ ]" };
    let mark = if marked { "● " } else { "  " };
    let mut title_style = Style::default().fg(Color::White);
    if task.completed {
        title_style = title_style
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT);
    }
    let budget = (width as usize).saturating_sub(task.category.chars().count() + 20);
    ListItem::new(Line::from(vec![
        Span::styled(mark, Style::default().fg(Color::LightMagenta)),
        Span::raw(format!("{} ", check)),
        Span::styled(truncate_text(&task.title, budget.max(8)), title_style),
        Span::raw("  "),
        Span::styled(
            format!(" {} ", task.priority),
            Style::default()
                .fg(Color::Black)
                .bg(priority_color(task.priority)),
        ),
        Span::raw(" "),
        Span::styled(
            format!(" {} ", task.category),
            Style::default().fg(Color::Black).bg(Color::Gray),
        ),
    ]))
}

fn event_item(event: &StudyEvent) -> ListItem<'static> {
    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!("{}-{} ", event.start_time, event.end_time),
            Style::default().fg(Color::LightYellow),
        ),
        Span::styled(
            event.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(event.subject.clone(), Style::default().fg(Color::LightMagenta)),
    ])];
    if let Some(description) = &event.description {
        lines.push(Line::from(Span::styled(
            format!("  {}", description),
            Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
        )));
    }
    ListItem::new(lines)
}

fn field_line(field: &Field, active: bool) -> Line<'static> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    let value = match &field.input {
        Input::Text(text) if active => text.with_caret(),
        Input::Text(text) => text.value.clone(),
        Input::Choice { .. } if active => format!("◀ {} ▶", field.input.text()),
        Input::Choice { .. } => field.input.text().to_string(),
    };
    Line::from(vec![
        Span::styled(format!("{}: ", field.label), label_style),
        Span::styled(value, value_style),
    ])
}

fn summary_line(label: &str, count: usize, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{:<12}", label), Style::default().fg(Color::Gray)),
        Span::styled(
            count.to_string(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
    ])
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PlannerScope;
    use tempfile::TempDir;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn selection_follows_into_adjacent_month() {
        let mut state = CalendarState::new(ymd(2025, 1, 30));
        state.move_selection(WEEK_LEN as i64);
        assert_eq!(state.selected, ymd(2025, 2, 6));
        assert_eq!(state.cursor.reference(), ymd(2025, 2, 1));

        state.move_selection(-(WEEK_LEN as i64));
        assert_eq!(state.selected, ymd(2025, 1, 30));
        assert_eq!(state.cursor.reference(), ymd(2025, 1, 1));
    }

    #[test]
    fn month_shift_selects_the_first() {
        let mut state = CalendarState::new(ymd(2025, 3, 17));
        state.shift_month(calendar::Direction::Prev);
        assert_eq!(state.selected, ymd(2025, 2, 1));
    }

    #[test]
    fn field_editing_respects_char_boundaries() {
        let mut field = FieldValue::new("Físic");
        field.insert_char('a');
        assert_eq!(field.value, "Física");
        field.move_left();
        field.move_left();
        field.backspace();
        assert_eq!(field.value, "Físca");
        field.move_right();
        assert_eq!(field.cursor, "Físc".len());
    }

    #[test]
    fn choices_wrap_around() {
        let mut input = Input::Choice {
            options: vec!["a".into(), "b".into()],
            idx: 0,
        };
        input.cycle(false);
        assert_eq!(input.text(), "b");
        input.cycle(true);
        assert_eq!(input.text(), "a");
    }

    #[test]
    fn task_form_starts_on_configured_defaults() {
        let config =
            Config::parse("default_priority = \"low\"\ndefault_category = \"Review\"").unwrap();
        let form = Form::task(&config);
        assert_eq!(form.value(1), "low");
        assert_eq!(form.value(2), "Review");
    }

    #[test]
    fn marks_toggle() {
        let mut state = TaskState {
            selected: 0,
            offset: 0,
            marked: Vec::new(),
        };
        state.toggle_mark("a");
        state.toggle_mark("b");
        state.toggle_mark("a");
        assert!(!state.is_marked("a"));
        assert!(state.is_marked("b"));
    }

    #[test]
    fn offset_keeps_selection_visible() {
        assert_eq!(adjust_offset(0, 0, 5, 1, 20), 0);
        assert_eq!(adjust_offset(10, 0, 5, 1, 20), 7);
        assert_eq!(adjust_offset(19, 7, 5, 1, 20), 15);
        assert_eq!(adjust_offset(3, 0, 0, 1, 20), 0);
    }

    #[test]
    fn long_titles_are_truncated() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdefghij", 5), "abcd…");
    }

    fn app_at(temp: &TempDir, dir: &str) -> App {
        let location = PlannerLocation {
            path: temp.path().join(dir).join("planner.yml"),
            scope: PlannerScope::Project,
        };
        App::new(Planner::new("term"), location, Config::default())
    }

    /// The planner path sits under a regular file, so every save fails.
    fn unwritable_app(temp: &TempDir) -> App {
        std::fs::write(temp.path().join("blocker"), "not a directory").unwrap();
        app_at(temp, "blocker")
    }

    fn press(app: &mut App, c: char) -> bool {
        app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)).unwrap()
    }

    fn titled_task_form(app: &App, title: &str) -> Form {
        let mut form = Form::task(&app.config);
        form.fields[0].input = Input::Text(FieldValue::new(title));
        form
    }

    #[test]
    fn submitted_task_is_saved() {
        let temp = tempfile::tempdir().unwrap();
        let mut app = app_at(&temp, ".studydesk");
        let form = titled_task_form(&app, "Read chapter 5");

        assert!(app.try_submit(&form).unwrap());
        assert_eq!(app.planner.tasks.total(), 1);
        let saved = crate::storage::load_planner(&app.location).unwrap();
        assert_eq!(saved.tasks.total(), 1);
    }

    #[test]
    fn failed_save_keeps_form_open_without_duplicates() {
        let temp = tempfile::tempdir().unwrap();
        let mut app = unwritable_app(&temp);
        let form = titled_task_form(&app, "Read chapter 5");

        assert!(!app.try_submit(&form).unwrap());
        assert!(app.status.starts_with("Could not create"));
        assert!(!app.try_submit(&form).unwrap());
        assert_eq!(app.planner.tasks.total(), 0);
    }

    #[test]
    fn failed_event_save_leaves_no_event_behind() {
        let temp = tempfile::tempdir().unwrap();
        let mut app = unwritable_app(&temp);
        let mut form = Form::event(&app.config, ymd(2025, 2, 23));
        form.fields[0].input = Input::Text(FieldValue::new("Math review"));
        form.fields[3].input = Input::Text(FieldValue::new("14:00"));
        form.fields[4].input = Input::Text(FieldValue::new("16:00"));

        assert!(!app.try_submit(&form).unwrap());
        assert!(app.status.starts_with("Could not create"));
        assert!(app.planner.events.is_empty());
    }

    #[test]
    fn failed_toggle_save_reverts_and_keeps_running() {
        let temp = tempfile::tempdir().unwrap();
        let mut app = unwritable_app(&temp);
        app.planner.tasks.add("Derivative drills", Priority::High, "Exercises");
        app.set_view(ViewMode::Planner);

        assert!(!press(&mut app, ' '));
        assert_eq!(app.planner.tasks.completed(), 0);
        assert!(app.status.starts_with("Save failed"));
    }

    #[test]
    fn failed_delete_save_restores_tasks_and_marks() {
        let temp = tempfile::tempdir().unwrap();
        let mut app = unwritable_app(&temp);
        let id = app.planner.tasks.add("Derivative drills", Priority::High, "Exercises");
        app.tasks.toggle_mark(&id);
        app.mode = Mode::Confirm(PendingDelete::Marked(vec![id.clone()]));

        assert!(!press(&mut app, 'y'));
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(app.planner.tasks.total(), 1);
        assert!(app.tasks.is_marked(&id));
        assert!(app.status.starts_with("Delete failed"));
    }
}

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "studydesk",
    version,
    about = "Study planner: task list and calendar of study sessions"
)]
pub struct Cli {
    /// Path to config.toml (defaults to $STUDYDESK_CONFIG or the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More log output (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Less log output (repeatable)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a project planner in the current directory
    Init {
        /// Optional planner name
        #[arg(long)]
        name: Option<String>,
    },
    /// Manage the task list
    #[command(subcommand)]
    Task(TaskCommand),
    /// Manage study events
    #[command(subcommand)]
    Event(EventCommand),
    /// Print a month grid with event counts
    Calendar {
        /// Month to show, YYYY-MM (defaults to the current month)
        #[arg(long)]
        month: Option<String>,
    },
    /// Launch the interactive TUI
    Tui,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Add a task
    Add {
        /// Task title
        title: String,
        /// high, medium or low (defaults to the configured priority)
        #[arg(long, short = 'p')]
        priority: Option<String>,
        /// Category (defaults to the configured category)
        #[arg(long, short = 'c')]
        category: Option<String>,
    },
    /// List tasks
    List {
        /// Only tasks in this category
        #[arg(long, short = 'c')]
        category: Option<String>,
        /// Only pending tasks
        #[arg(long)]
        pending: bool,
    },
    /// Flip a task between pending and completed
    Toggle {
        /// Task id
        task_id: String,
    },
    /// Delete one or more tasks
    Delete {
        /// Task ids
        #[arg(required = true)]
        task_ids: Vec<String>,
    },
    /// Delete every task
    Clear {
        /// Skip the safety check
        #[arg(long)]
        yes: bool,
    },
    /// Show totals and per-category counts
    Stats,
}

#[derive(Subcommand, Debug)]
pub enum EventCommand {
    /// Schedule a study event
    Add(EventArgs),
    /// List events
    List {
        /// Only events on this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// Only events on or after today
        #[arg(long)]
        upcoming: bool,
    },
    /// Delete an event
    Delete {
        /// Event id
        event_id: String,
    },
}

#[derive(Args, Debug)]
pub struct EventArgs {
    /// Event title
    pub title: String,
    /// Subject studied
    #[arg(long, short = 's')]
    pub subject: String,
    /// Day of the session, YYYY-MM-DD
    #[arg(long, short = 'd')]
    pub date: String,
    /// Start time, HH:MM
    #[arg(long)]
    pub start: String,
    /// End time, HH:MM
    #[arg(long)]
    pub end: String,
    /// Topics to cover
    #[arg(long)]
    pub description: Option<String>,
}

use anyhow::Result;
use clap::Parser;
use studydesk::cli::{self, Command, EventCommand, TaskCommand};
use studydesk::config::Config;
use studydesk::logging::{self, LogTarget};
use studydesk::{commands, storage};

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let command = args.command.unwrap_or(Command::Tui);
    match command {
        Command::Tui => {
            let log_path = storage::log_file_path()?;
            logging::init(args.verbose, args.quiet, LogTarget::File(&log_path))?;
        }
        _ => logging::init(args.verbose, args.quiet, LogTarget::Stderr)?,
    }
    let config = Config::load(args.config.as_deref())?;

    match command {
        Command::Init { name } => commands::init(name),
        Command::Task(task) => match task {
            TaskCommand::Add {
                title,
                priority,
                category,
            } => commands::task_add(&config, title, priority, category),
            TaskCommand::List { category, pending } => commands::task_list(category, pending),
            TaskCommand::Toggle { task_id } => commands::task_toggle(task_id),
            TaskCommand::Delete { task_ids } => commands::task_delete(task_ids),
            TaskCommand::Clear { yes } => commands::task_clear(yes),
            TaskCommand::Stats => commands::task_stats(&config),
        },
        Command::Event(event) => match event {
            EventCommand::Add(args) => commands::event_add(&config, args),
            EventCommand::List { date, upcoming } => commands::event_list(date, upcoming),
            EventCommand::Delete { event_id } => commands::event_delete(event_id),
        },
        Command::Calendar { month } => commands::show_calendar(month),
        Command::Tui => commands::tui(config),
    }
}

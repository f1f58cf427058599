mod analysis;
mod app;
mod config;
mod domain;
mod errors;
mod schedule;
mod storage;
mod timer;
mod ui;

use std::error::Error;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::app::Controller;
use crate::config::{load_settings, resolve_state_dir};
use crate::domain::format_duration;
use crate::timer::{Event, TaskRef, TimerState};
use crate::ui::{history_line, run_dashboard};

const LOG_FILE: &str = "schedule-timer.log";
const LOG_FILTER_ENV: &str = "SCHEDULE_TIMER_LOG";

#[derive(Debug, Parser)]
#[command(name = "schedule-timer", about = "Daily schedule timer with per-category analysis")]
struct Cli {
	#[arg(long)]
	state_dir: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Dashboard,
	Start {
		#[arg(long)]
		category: String,
		#[arg(long)]
		task: String,
	},
	Pause,
	Complete,
	Status,
	Summary,
	Tasks,
	History {
		#[arg(long)]
		category: String,
		#[arg(long)]
		task: String,
	},
	AddException {
		#[arg(long)]
		text: String,
	},
	RemoveException {
		#[arg(long)]
		index: usize,
	},
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();

	let state_dir = resolve_state_dir(cli.state_dir);
	if let Err(err) = init_logging(&state_dir) {
		eprintln!("warning: logging disabled: {err}");
	}

	let settings = load_settings(&state_dir)?;
	let mut controller = Controller::open(&state_dir, settings)?;

	match cli.command.unwrap_or(Command::Dashboard) {
		Command::Dashboard => {
			run_dashboard(&mut controller)?;
		}
		Command::Start { category, task } => {
			controller.start(TaskRef::new(category.clone(), task.clone()), Utc::now())?;
			println!("started {category} / {task}");
		}
		Command::Pause => {
			let record = controller.stop(Event::PausePressed, Utc::now())?;
			println!("paused after {}", format_duration(record.duration()));
		}
		Command::Complete => {
			let record = controller.stop(Event::CompletePressed, Utc::now())?;
			println!("completed after {}", format_duration(record.duration()));
		}
		Command::Status => {
			print_status(&controller);
		}
		Command::Summary => {
			print_summary(&controller);
		}
		Command::Tasks => {
			print_tasks(&controller);
		}
		Command::History { category, task } => {
			print_history(&controller, &category, &task);
		}
		Command::AddException { text } => {
			let before = controller.store().exception_tasks().len();
			controller.dispatch(Event::AddExceptionTask(text), Utc::now())?;
			if controller.store().exception_tasks().len() > before {
				println!("added exception task #{before}");
			} else {
				println!("nothing to add");
			}
		}
		Command::RemoveException { index } => {
			let removed = controller.remove_exception_task(index)?;
			println!("removed exception task: {removed}");
		}
	}

	Ok(())
}

fn init_logging(state_dir: &Path) -> Result<(), Box<dyn Error>> {
	fs::create_dir_all(state_dir)?;
	let file = OpenOptions::new()
		.create(true)
		.append(true)
		.open(state_dir.join(LOG_FILE))?;
	let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(Mutex::new(file))
		.with_ansi(false)
		.try_init()
		.map_err(|err| err as Box<dyn Error>)
}

fn print_status(controller: &Controller) {
	let now = Utc::now();
	match (&controller.state().timer, controller.elapsed(now)) {
		(TimerState::Running(session), Some(elapsed)) => {
			println!(
				"running {} / {} for {} (since {})",
				session.category,
				session.task,
				format_duration(elapsed),
				session.started_at.with_timezone(&Local).format("%H:%M:%S")
			);
		}
		_ => println!("idle"),
	}
}

fn print_summary(controller: &Controller) {
	let now = Utc::now();
	let (day_start, day_end) = controller.today_window(now);
	println!(
		"summary {} -> {}",
		day_start.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
		day_end.with_timezone(&Local).format("%Y-%m-%d %H:%M")
	);

	if controller.log().is_empty() {
		println!("no sessions recorded yet");
		return;
	}

	let bars = controller.analysis(now);
	if bars.iter().all(|bar| bar.ratio == 0.0) {
		println!("no tracked sessions for this day");
		return;
	}

	for bar in bars {
		println!(
			"{}. {} | {} | {:>5.1}% | {}",
			bar.rank,
			format_duration(bar.total),
			bar.category,
			bar.percent(),
			"=".repeat(bar.bar_cells(30))
		);
	}
}

fn print_tasks(controller: &Controller) {
	let store = controller.store();
	for category in store.categories() {
		println!("{category}");
		let tasks = store.tasks(category);
		if tasks.is_empty() {
			println!("  (no tasks)");
		}
		for (index, task) in tasks.iter().enumerate() {
			let status = controller
				.log()
				.last_status(category, task)
				.map(|status| status.label())
				.unwrap_or("none");
			if store.is_exception_category(category) {
				println!("  #{index} {task} [{status}]");
			} else {
				println!("  {task} [{status}]");
			}
		}
	}
}

fn print_history(controller: &Controller, category: &str, task: &str) {
	let records = controller.log().records(category, task);
	if records.is_empty() {
		println!("no records for {category} / {task}");
		return;
	}

	for record in records {
		println!("{}", history_line(record));
	}
}

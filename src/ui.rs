use std::error::Error;
use std::io;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Local, Utc};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};

use crate::analysis::{AnalysisBar, RankColor};
use crate::app::Controller;
use crate::domain::{format_clock, format_duration, RecordStatus, TimeRecord};
use crate::timer::{Event, TaskRef, TimerState};

const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);
const ANALYSIS_LABEL_WIDTH: usize = 14;
const ANALYSIS_SUFFIX_WIDTH: usize = 15;

pub fn run_dashboard(controller: &mut Controller) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, controller);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	controller: &mut Controller,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::default();
	let mut last_tick = Utc::now();

	loop {
		let now = Utc::now();
		if now - last_tick >= Duration::seconds(1) {
			last_tick = now;
			if let Err(err) = controller.dispatch(Event::Tick, now) {
				app.status = format!("error: {err}");
			}
		}

		let view = build_view(controller, now);
		app.clamp_selection(&view);
		terminal.draw(|frame| draw_dashboard(frame, &app, &view))?;

		if event::poll(StdDuration::from_millis(250))? {
			if let CEvent::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}

				let should_quit = match &app.mode {
					InputMode::Prompt(_) => handle_prompt_key(&mut app, key.code, controller),
					InputMode::Normal => handle_normal_key(&mut app, key.code, controller, &view),
				};

				if should_quit {
					break;
				}
			}
		}
	}

	Ok(())
}

fn draw_dashboard(frame: &mut Frame, app: &App, view: &ViewModel) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(3), Constraint::Min(10), Constraint::Length(4)])
		.split(frame.area());

	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
		.split(layout[1]);

	let right = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(7), Constraint::Min(5)])
		.split(body[1]);

	render_header(frame, layout[0], view);
	render_schedule_panel(frame, body[0], app, view);
	render_timer_panel(frame, right[0], &view.timer);
	render_analysis_panel(frame, right[1], view);
	render_footer(frame, layout[2], app, view);
}

fn render_header(frame: &mut Frame, area: Rect, view: &ViewModel) {
	let line = Line::from(vec![
		Span::styled(view.date_label.clone(), Style::default().add_modifier(Modifier::BOLD)),
		Span::raw("  "),
		Span::styled(view.clock_label.clone(), Style::default().fg(Color::LightCyan)),
	]);
	let header = Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Schedule Timer"));
	frame.render_widget(header, area);
}

fn render_schedule_panel(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
	let items = view
		.rows
		.iter()
		.map(|row| ListItem::new(row.line.clone()))
		.collect::<Vec<_>>();

	let mut state = ListState::default();
	if !view.rows.is_empty() {
		state.select(Some(app.row_index.min(view.rows.len() - 1)));
	}

	let mut title = "Schedule".to_string();
	if view.selecting {
		title.push_str(" | pick a task to start");
	}
	if view.edit_mode {
		title.push_str(" | edit mode");
	}

	let list = List::new(if items.is_empty() {
		vec![ListItem::new("(no categories)")]
	} else {
		items
	})
	.block(
		Block::default()
			.borders(Borders::ALL)
			.title(title)
			.border_style(border_style(view.selecting)),
	)
	.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));

	frame.render_stateful_widget(list, area, &mut state);
}

fn render_timer_panel(frame: &mut Frame, area: Rect, timer: &TimerView) {
	let state_style = match timer.phase {
		TimerPhase::Running => Style::default().fg(Color::LightGreen).add_modifier(Modifier::BOLD),
		TimerPhase::Selecting => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
		TimerPhase::Idle => Style::default().fg(Color::Gray),
	};

	let lines = vec![
		Line::from(vec![
			Span::styled(timer.state_label.clone(), state_style),
			Span::raw("  "),
			Span::styled(timer.elapsed.clone(), Style::default().add_modifier(Modifier::BOLD)),
		]),
		Line::from(format!("Category: {}", timer.category)),
		Line::from(format!("Task:     {}", timer.task)),
		Line::from(""),
		Line::from(vec![
			button_span(timer.start_label, timer.phase != TimerPhase::Running),
			Span::raw("  "),
			button_span("[p] Pause", timer.phase == TimerPhase::Running),
			Span::raw("  "),
			button_span("[c] Complete", timer.phase == TimerPhase::Running),
		]),
	];

	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Timer"));
	frame.render_widget(panel, area);
}

fn render_analysis_panel(frame: &mut Frame, area: Rect, view: &ViewModel) {
	let inner_width = area.width.saturating_sub(2) as usize;
	let bar_width = inner_width.saturating_sub(ANALYSIS_LABEL_WIDTH + ANALYSIS_SUFFIX_WIDTH);

	let mut lines = Vec::new();
	if view.analysis.is_empty() {
		lines.push(Line::from("(no categories)"));
	}
	for bar in &view.analysis {
		let cells = bar.bar_cells(bar_width);
		lines.push(Line::from(vec![
			Span::styled(
				format!("{:<width$}", truncate(&bar.category, ANALYSIS_LABEL_WIDTH - 1), width = ANALYSIS_LABEL_WIDTH),
				Style::default().add_modifier(Modifier::BOLD),
			),
			Span::styled("█".repeat(cells), Style::default().fg(rank_color(bar.color))),
			Span::raw(" ".repeat(bar_width - cells)),
			Span::raw(format!(" {} {:>4.0}%", format_duration(bar.total), bar.percent())),
		]));
	}

	lines.push(Line::from(""));
	lines.push(Line::from(format!("Total today: {}", format_duration(view.day_total))));

	let panel = Paragraph::new(lines).block(
		Block::default()
			.borders(Borders::ALL)
			.title(view.analysis_title.clone()),
	);
	frame.render_widget(panel, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
	let footer_lines = match &app.mode {
		InputMode::Normal => vec![
			Line::from(
				"s start/cancel | Enter select/expand task | p pause | c complete | j/k move | q quit",
			),
			Line::from(if view.edit_mode {
				"a add exception task | e leave edit mode | d delete (press twice)"
			} else {
				"a add exception task | e edit mode"
			}),
			Line::from(app.status.clone()),
		],
		InputMode::Prompt(prompt) => vec![
			Line::from(prompt.title.clone()),
			Line::from(format!("> {}", prompt.input)),
			Line::from("Enter submit | Esc cancel"),
		],
	};

	let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn button_span(label: &str, enabled: bool) -> Span<'static> {
	let style = if enabled {
		Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
	} else {
		Style::default().fg(Color::DarkGray)
	};
	Span::styled(label.to_string(), style)
}

fn handle_normal_key(app: &mut App, code: KeyCode, controller: &mut Controller, view: &ViewModel) -> bool {
	let now = Utc::now();
	match code {
		KeyCode::Char('q') => true,
		KeyCode::Esc => {
			if view.selecting {
				dispatch(app, controller, Event::StartPressed, now, "Selection cancelled");
				return false;
			}
			true
		}
		KeyCode::Up | KeyCode::Char('k') => {
			app.move_selection(-1, view);
			false
		}
		KeyCode::Down | KeyCode::Char('j') => {
			app.move_selection(1, view);
			false
		}
		KeyCode::Char('s') => {
			let message = match controller.state().timer {
				TimerState::Idle => "Select a task and press Enter",
				TimerState::Selecting => "Selection cancelled",
				TimerState::Running(_) => "A session is already running",
			};
			dispatch(app, controller, Event::StartPressed, now, message);
			false
		}
		KeyCode::Char('p') => {
			stop(app, controller, Event::PausePressed, now);
			false
		}
		KeyCode::Char('c') => {
			stop(app, controller, Event::CompletePressed, now);
			false
		}
		KeyCode::Char('e') => {
			let message = if view.edit_mode {
				"Edit mode off"
			} else {
				"Edit mode on: press d twice on an exception task to delete it"
			};
			dispatch(app, controller, Event::ToggleEditMode, now, message);
			false
		}
		KeyCode::Char('a') => {
			app.mode = InputMode::Prompt(PromptState::new(format!(
				"New task for {}",
				controller.store().exception_category()
			)));
			false
		}
		KeyCode::Char('d') => {
			if !view.edit_mode {
				app.status = "Press e to enter edit mode first".to_string();
				return false;
			}

			match app.selected_row_kind(view) {
				Some(RowKind::Task {
					exception_index: Some(index),
					delete_armed,
					target,
					..
				}) => {
					let message = if delete_armed {
						format!("deleted: {}", target.task)
					} else {
						format!("press d again to delete {}", target.task)
					};
					dispatch(app, controller, Event::DeletePressed { index }, now, &message);
				}
				_ => app.status = "Only exception tasks can be deleted".to_string(),
			}
			false
		}
		KeyCode::Enter | KeyCode::Char(' ') => {
			match app.selected_row_kind(view) {
				Some(RowKind::Task { target, .. }) => {
					let message = if view.selecting {
						format!("started: {} / {}", target.category, target.task)
					} else {
						String::new()
					};
					dispatch(app, controller, Event::TaskPressed(target), now, &message);
				}
				Some(RowKind::Category) | Some(RowKind::Detail) | None => {}
			}
			false
		}
		_ => false,
	}
}

fn handle_prompt_key(app: &mut App, code: KeyCode, controller: &mut Controller) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Input cancelled".to_string();
		}
		KeyCode::Backspace => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.pop();
			}
		}
		KeyCode::Char(value) => {
			if let InputMode::Prompt(prompt) = &mut app.mode {
				prompt.input.push(value);
			}
		}
		KeyCode::Enter => {
			let prompt = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Prompt(prompt) => prompt,
				InputMode::Normal => return false,
			};

			let message = if prompt.input.trim().is_empty() {
				"Nothing to add".to_string()
			} else {
				format!("added: {}", prompt.input.trim())
			};
			dispatch(app, controller, Event::AddExceptionTask(prompt.input), Utc::now(), &message);
		}
		_ => {}
	}

	false
}

fn dispatch(app: &mut App, controller: &mut Controller, event: Event, now: DateTime<Utc>, message: &str) {
	app.status = match controller.dispatch(event, now) {
		Ok(()) => message.to_string(),
		Err(err) => format!("error: {err}"),
	};
}

fn stop(app: &mut App, controller: &mut Controller, event: Event, now: DateTime<Utc>) {
	if controller.state().timer.session().is_none() {
		dispatch(app, controller, event, now, "No running session");
		return;
	}

	app.status = match controller.stop(event, now) {
		Ok(record) => format!(
			"{} after {}",
			record.status.label(),
			format_duration(record.duration())
		),
		Err(err) => format!("error: {err}"),
	};
}

fn build_view(controller: &Controller, now: DateTime<Utc>) -> ViewModel {
	let state = controller.state();
	let local_now = now.with_timezone(&Local);
	let analysis = controller.analysis(now);
	let day_total = analysis
		.iter()
		.fold(Duration::zero(), |acc, bar| acc + bar.total);

	ViewModel {
		date_label: local_now.format("%Y-%m-%d %A").to_string(),
		clock_label: format_clock(local_now.time()),
		timer: build_timer_view(&state.timer, now),
		rows: build_rows(controller),
		analysis,
		analysis_title: format!("Today (from {:02}:00)", controller.settings().day_start_hour),
		day_total,
		selecting: state.timer == TimerState::Selecting,
		edit_mode: state.edit_mode,
	}
}

fn build_timer_view(timer: &TimerState, now: DateTime<Utc>) -> TimerView {
	match timer {
		TimerState::Idle => TimerView {
			phase: TimerPhase::Idle,
			state_label: timer.label().to_string(),
			elapsed: format_duration(Duration::zero()),
			category: String::new(),
			task: String::new(),
			start_label: "[s] Start",
		},
		TimerState::Selecting => TimerView {
			phase: TimerPhase::Selecting,
			state_label: timer.label().to_string(),
			elapsed: format_duration(Duration::zero()),
			category: String::new(),
			task: String::new(),
			start_label: "[s] Cancel",
		},
		TimerState::Running(session) => TimerView {
			phase: TimerPhase::Running,
			state_label: timer.label().to_string(),
			elapsed: format_duration(session.elapsed(now)),
			category: session.category.clone(),
			task: session.task.clone(),
			start_label: "[s] Start",
		},
	}
}

fn build_rows(controller: &Controller) -> Vec<ScheduleRow> {
	let state = controller.state();
	let store = controller.store();
	let log = controller.log();
	let running = state.timer.session();
	let mut rows = Vec::new();

	for category in store.categories() {
		let tasks = store.tasks(category);
		rows.push(ScheduleRow {
			line: Line::from(Span::styled(
				format!("{category} ({})", tasks.len()),
				Style::default().fg(Color::LightYellow).add_modifier(Modifier::BOLD),
			)),
			kind: RowKind::Category,
		});

		let is_exception = store.is_exception_category(category);
		for (index, task) in tasks.iter().enumerate() {
			let target = TaskRef::new(category.clone(), task.clone());
			let is_running = running.is_some_and(|session| session.is_for(&target));
			let exception_index = is_exception.then_some(index);
			let delete_armed = exception_index.is_some()
				&& state
					.pending_deletion
					.is_some_and(|pending| Some(pending.target) == exception_index);

			let mut spans = vec![
				Span::raw("  "),
				Span::styled("■ ", status_style(log.last_status(category, task))),
				Span::raw(task.clone()),
			];
			if is_running {
				spans.push(Span::styled(
					" RUN",
					Style::default().fg(Color::LightGreen).add_modifier(Modifier::BOLD),
				));
			}
			if state.edit_mode && exception_index.is_some() {
				spans.push(if delete_armed {
					Span::styled(
						" [confirm delete]",
						Style::default().fg(Color::Black).bg(Color::LightRed),
					)
				} else {
					Span::styled(" [del]", Style::default().fg(Color::LightRed))
				});
			}

			let expanded = state.expanded.as_ref() == Some(&target);
			rows.push(ScheduleRow {
				line: Line::from(spans),
				kind: RowKind::Task {
					target: target.clone(),
					exception_index,
					delete_armed,
				},
			});

			if expanded {
				let records = log.records(category, task);
				if records.is_empty() {
					rows.push(ScheduleRow::detail("no records"));
				}
				for record in records {
					rows.push(ScheduleRow::detail(history_line(record)));
				}
			}
		}
	}

	rows
}

pub fn history_line(record: &TimeRecord) -> String {
	let start = record.start.with_timezone(&Local);
	let end = record.end.with_timezone(&Local);
	format!(
		"{} - {} | {} | {}",
		start.format("%-H:%M"),
		end.format("%-H:%M"),
		format_duration(record.duration()),
		record.status.label()
	)
}

fn status_style(status: Option<RecordStatus>) -> Style {
	match status {
		Some(RecordStatus::Completed) => Style::default().fg(Color::LightGreen),
		Some(RecordStatus::Paused) => Style::default().fg(Color::Yellow),
		None => Style::default().fg(Color::DarkGray),
	}
}

fn rank_color(color: RankColor) -> Color {
	match color {
		RankColor::First => Color::Rgb(221, 51, 51),
		RankColor::Second => Color::Rgb(51, 102, 204),
		RankColor::Third => Color::Rgb(255, 204, 0),
		RankColor::Other => Color::Rgb(153, 153, 153),
	}
}

fn border_style(focused: bool) -> Style {
	if focused {
		Style::default()
			.fg(FOCUSED_PANEL_BORDER_COLOR)
			.add_modifier(Modifier::BOLD)
	} else {
		Style::default().fg(INACTIVE_PANEL_BORDER_COLOR)
	}
}

fn truncate(value: &str, max_chars: usize) -> String {
	if value.chars().count() <= max_chars {
		return value.to_string();
	}
	let mut out = value.chars().take(max_chars.saturating_sub(1)).collect::<String>();
	out.push('…');
	out
}

#[derive(Debug, Clone)]
struct PromptState {
	title: String,
	input: String,
}

impl PromptState {
	fn new(title: impl Into<String>) -> Self {
		Self {
			title: title.into(),
			input: String::new(),
		}
	}
}

#[derive(Debug, Clone)]
enum InputMode {
	Normal,
	Prompt(PromptState),
}

#[derive(Debug, Clone)]
struct App {
	row_index: usize,
	mode: InputMode,
	status: String,
}

impl Default for App {
	fn default() -> Self {
		Self {
			row_index: 0,
			mode: InputMode::Normal,
			status: "Ready".to_string(),
		}
	}
}

impl App {
	fn clamp_selection(&mut self, view: &ViewModel) {
		if view.rows.is_empty() {
			self.row_index = 0;
		} else {
			self.row_index = self.row_index.min(view.rows.len() - 1);
		}
	}

	fn move_selection(&mut self, delta: i32, view: &ViewModel) {
		if view.rows.is_empty() {
			self.row_index = 0;
			return;
		}

		if delta > 0 {
			self.row_index = (self.row_index + delta as usize).min(view.rows.len() - 1);
		} else {
			self.row_index = self.row_index.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn selected_row_kind(&self, view: &ViewModel) -> Option<RowKind> {
		view.rows.get(self.row_index).map(|row| row.kind.clone())
	}
}

struct ViewModel {
	date_label: String,
	clock_label: String,
	timer: TimerView,
	rows: Vec<ScheduleRow>,
	analysis: Vec<AnalysisBar>,
	analysis_title: String,
	day_total: Duration,
	selecting: bool,
	edit_mode: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TimerPhase {
	Idle,
	Selecting,
	Running,
}

struct TimerView {
	phase: TimerPhase,
	state_label: String,
	elapsed: String,
	category: String,
	task: String,
	start_label: &'static str,
}

#[derive(Clone)]
struct ScheduleRow {
	line: Line<'static>,
	kind: RowKind,
}

impl ScheduleRow {
	fn detail(text: impl Into<String>) -> Self {
		Self {
			line: Line::from(Span::styled(
				format!("      {}", text.into()),
				Style::default().fg(Color::Gray),
			)),
			kind: RowKind::Detail,
		}
	}
}

#[derive(Debug, Clone)]
enum RowKind {
	Category,
	Task {
		target: TaskRef,
		exception_index: Option<usize>,
		delete_armed: bool,
	},
	Detail,
}

#[cfg(test)]
mod tests {
	use chrono::{TimeZone, Utc};

	use crate::app::Controller;
	use crate::config::Settings;
	use crate::domain::RecordLog;
	use crate::schedule::ScheduleStore;
	use crate::storage::Storage;
	use crate::timer::{Event, TaskRef};

	use super::{RowKind, build_view};

	fn controller() -> Controller {
		let store = ScheduleStore::new(
			vec![("Math".to_string(), vec!["Drills".to_string()])],
			"Exception schedule",
			0,
			vec!["Bank".to_string()],
		);
		let mut dir = std::env::temp_dir();
		dir.push(format!("schedule_timer_ui_{}", std::process::id()));
		Controller::new(store, RecordLog::default(), Storage::new(dir), Settings::default(), None)
	}

	#[test]
	fn rows_follow_category_order_and_mark_exception_tasks() {
		let controller = controller();
		let now = Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap();
		let view = build_view(&controller, now);

		let kinds = view
			.rows
			.iter()
			.map(|row| match &row.kind {
				RowKind::Category => "category".to_string(),
				RowKind::Task {
					target,
					exception_index,
					..
				} => format!("{}:{}:{:?}", target.category, target.task, exception_index),
				RowKind::Detail => "detail".to_string(),
			})
			.collect::<Vec<_>>();
		assert_eq!(
			kinds,
			vec![
				"category",
				"Exception schedule:Bank:Some(0)",
				"category",
				"Math:Drills:None",
			]
		);
		assert!(!view.selecting);
		assert_eq!(view.timer.elapsed, "00:00:00");
	}

	#[test]
	fn expanding_a_task_shows_its_history() {
		let mut controller = controller();
		let now = Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap();
		controller
			.dispatch(Event::TaskPressed(TaskRef::new("Math", "Drills")), now)
			.expect("expand");

		let view = build_view(&controller, now);
		assert!(matches!(view.rows.last().map(|row| &row.kind), Some(RowKind::Detail)));
		assert_eq!(view.rows.len(), 5);
	}
}

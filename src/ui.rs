use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::{NaiveDate, Utc};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};

use crate::domain::{
	bind_sessions_to_week, Clock, CompletionFeedback, DaySlot, DisplayStatus, Planbook, Session,
	SystemClock, WeekNav, WeekWindow,
};
use crate::planbooks::{recent_planbooks, remember_planbook};
use crate::planner::WeekPlanner;
use crate::storage::FileStore;

const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);

pub fn run_planner(store: &mut FileStore) -> Result<(), Box<dyn Error>> {
	let client = store
		.active_clients()
		.first()
		.map(|client| client.id.clone())
		.ok_or("planbook has no clients: add one with `add-client` first")?;

	let mut planner = WeekPlanner::new(client, SystemClock);
	planner.refresh(store)?;

	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, store, &mut planner);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	store: &mut FileStore,
	planner: &mut WeekPlanner<SystemClock>,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::default();

	loop {
		let view = build_view(&app, store.planbook(), planner);
		app.clamp_selection(&view);
		terminal.draw(|frame| draw_planner(frame, &app, &view))?;

		if event::poll(StdDuration::from_millis(250))? {
			if let CEvent::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}

				let should_quit = match &app.mode {
					InputMode::Prompt(_) => handle_prompt_key(&mut app, key.code, store, planner),
					InputMode::Select(_) => handle_select_key(&mut app, key.code, store, planner),
					InputMode::Normal => handle_normal_key(&mut app, key.code, store, planner, &view),
				};

				if should_quit {
					break;
				}
			}
		}
	}

	Ok(())
}

fn draw_planner(frame: &mut Frame, app: &App, view: &ViewModel) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Min(12), Constraint::Length(5)])
		.split(frame.area());

	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage(38),
			Constraint::Percentage(34),
			Constraint::Percentage(28),
		])
		.split(layout[0]);

	render_week_panel(frame, body[0], app, view);
	render_day_panel(frame, body[1], app, view);
	render_summary_panel(frame, body[2], view);
	render_footer(frame, layout[1], app);

	if let InputMode::Select(select) = &app.mode {
		render_select_popup(frame, select);
	}
}

fn render_week_panel(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
	let items = view
		.slots
		.iter()
		.map(|slot| ListItem::new(week_row_line(slot)))
		.collect::<Vec<_>>();

	let mut state = ListState::default();
	state.select(Some(app.week_index.min(6)));

	let title = format!(
		"{} | {} - {}",
		view.client_name,
		view.window.start.format("%d %b"),
		view.window.end.format("%d %b %Y")
	);
	let list = List::new(items)
		.block(
			Block::default()
				.borders(Borders::ALL)
				.title(title)
				.border_style(border_style(app.focus == FocusPane::Week)),
		)
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));

	frame.render_stateful_widget(list, area, &mut state);
}

fn week_row_line(slot: &DaySlot) -> Line<'static> {
	let mut spans = vec![
		Span::styled(
			format!("{} ", slot.date.format("%a %d")),
			Style::default().fg(Color::DarkGray),
		),
		Span::styled(
			format!("{} ", status_glyph(slot.display_status)),
			status_style(slot.display_status),
		),
	];

	match slot.sessions.split_first() {
		Some((primary, rest)) => {
			spans.push(Span::styled(
				primary.short_name(),
				status_style(slot.display_status),
			));
			if !rest.is_empty() {
				spans.push(Span::styled(
					format!(" (+{} more)", rest.len()),
					Style::default().fg(Color::DarkGray),
				));
			}
		}
		None => spans.push(Span::styled(
			"rest".to_string(),
			Style::default().fg(Color::DarkGray),
		)),
	}

	if slot.is_today {
		spans.push(Span::styled(
			" *today*",
			Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
		));
	}

	Line::from(spans)
}

fn render_day_panel(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
	let selected_slot = &view.slots[app.week_index.min(6)];
	let mut items = Vec::new();
	for session in &view.day_rows {
		items.push(ListItem::new(day_row_lines(session)));
	}

	if items.is_empty() {
		items.push(ListItem::new("(rest day: press o to plan a session)"));
	}

	let mut state = ListState::default();
	if !view.day_rows.is_empty() {
		state.select(Some(app.session_index.min(view.day_rows.len() - 1)));
	}

	let title = format!(
		"{} | {}",
		selected_slot.date.format("%A, %d %B %Y"),
		selected_slot.display_status.label()
	);
	let list = List::new(items)
		.block(
			Block::default()
				.borders(Borders::ALL)
				.title(title)
				.border_style(border_style(app.focus == FocusPane::Day)),
		)
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));

	frame.render_stateful_widget(list, area, &mut state);
}

fn day_row_lines(session: &Session) -> Vec<Line<'static>> {
	let mut lines = vec![Line::from(vec![
		Span::styled(
			format!("{} ", status_glyph(session.status.display())),
			status_style(session.status.display()),
		),
		Span::raw(session.short_name()),
		Span::styled(
			format!(" [{}]", session.status.label()),
			Style::default().fg(Color::DarkGray),
		),
	])];

	if let Some(feedback) = &session.feedback {
		lines.push(Line::from(Span::styled(
			format!(
				"   RPE {}/10 | {} | {} exercises | {}% success",
				feedback.intensity, feedback.mood, feedback.completed_exercises, feedback.success_rate
			),
			Style::default().fg(Color::Gray),
		)));
		if let Some(comment) = &feedback.comment {
			lines.push(Line::from(Span::styled(
				format!("   \"{comment}\""),
				Style::default().fg(Color::Gray),
			)));
		}
	}

	if let Some(reply) = &session.coach_reply {
		lines.push(Line::from(Span::styled(
			format!("   coach: {reply}"),
			Style::default().fg(Color::LightCyan),
		)));
	}

	lines
}

fn render_summary_panel(frame: &mut Frame, area: Rect, view: &ViewModel) {
	let summary = &view.summary;
	let mut lines = vec![
		Line::from(vec![
			Span::styled("✓ ", status_style(DisplayStatus::Completed)),
			Span::raw(format!("completed  {}", summary.completed)),
		]),
		Line::from(vec![
			Span::styled("✗ ", status_style(DisplayStatus::Missed)),
			Span::raw(format!("missed     {}", summary.missed)),
		]),
		Line::from(vec![
			Span::styled("▶ ", status_style(DisplayStatus::Current)),
			Span::raw(format!("current    {}", summary.current)),
		]),
		Line::from(vec![
			Span::styled("○ ", status_style(DisplayStatus::Upcoming)),
			Span::raw(format!("upcoming   {}", summary.upcoming)),
		]),
		Line::from(vec![
			Span::styled("· ", status_style(DisplayStatus::Rest)),
			Span::raw(format!("rest days  {}", summary.rest_days)),
		]),
		Line::from(""),
	];

	match summary.adherence {
		Some(percent) => lines.push(Line::from(format!("Adherence: {percent}%"))),
		None => lines.push(Line::from("Adherence: -")),
	}
	match summary.avg_success_rate {
		Some(percent) => lines.push(Line::from(format!("Avg success: {percent}%"))),
		None => lines.push(Line::from("Avg success: -")),
	}

	let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("This Week"));
	frame.render_widget(panel, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
	let footer_lines = match &app.mode {
		InputMode::Normal => vec![
			Line::from("Tab pane | arrows/hjkl navigate | [ / ] prev/next week | t today | r refresh | q quit"),
			Line::from("b begin | c complete | m miss | o plan session | R coach reply | g client | G planbook"),
			Line::from(app.status.clone()),
		],
		InputMode::Prompt(prompt) => vec![
			Line::from(prompt.title.clone()),
			Line::from(format!("> {}", prompt.input)),
			Line::from("Enter submit | Esc cancel"),
		],
		InputMode::Select(select) => vec![
			Line::from(select.title.clone()),
			Line::from(format!(
				"Selected: {}",
				select
					.selected_option()
					.map(|option| option.label.as_str())
					.unwrap_or("(none)")
			)),
			Line::from("j/k or arrows move | Enter choose | Esc cancel"),
		],
	};

	let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn render_select_popup(frame: &mut Frame, select: &SelectState) {
	let area = centered_rect(62, 55, frame.area());
	frame.render_widget(Clear, area);

	let items = if select.options.is_empty() {
		vec![ListItem::new("(no choices)")]
	} else {
		select
			.options
			.iter()
			.map(|option| ListItem::new(option.label.clone()).style(option.style))
			.collect::<Vec<_>>()
	};

	let current = if select.options.is_empty() {
		0
	} else {
		select.selected.saturating_add(1)
	};
	let total = select.options.len();
	let list = List::new(items)
		.block(
			Block::default()
				.borders(Borders::ALL)
				.title(format!("{} ({current}/{total})", select.title)),
		)
		.highlight_symbol(">> ")
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));

	let mut state = ListState::default();
	if !select.options.is_empty() {
		state.select(Some(select.selected.min(select.options.len().saturating_sub(1))));
	}
	frame.render_stateful_widget(list, area, &mut state);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
	let popup_layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([
			Constraint::Percentage((100 - percent_y) / 2),
			Constraint::Percentage(percent_y),
			Constraint::Percentage((100 - percent_y) / 2),
		])
		.split(area);
	Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage((100 - percent_x) / 2),
			Constraint::Percentage(percent_x),
			Constraint::Percentage((100 - percent_x) / 2),
		])
		.split(popup_layout[1])[1]
}

fn handle_normal_key(
	app: &mut App,
	code: KeyCode,
	store: &mut FileStore,
	planner: &mut WeekPlanner<SystemClock>,
	view: &ViewModel,
) -> bool {
	match code {
		KeyCode::Char('q') | KeyCode::Esc => true,
		KeyCode::Tab | KeyCode::BackTab => {
			app.focus = app.focus.other();
			false
		}
		KeyCode::Up | KeyCode::Char('k') => {
			match app.focus {
				FocusPane::Week => app.move_week_selection(-1),
				FocusPane::Day => app.move_session_selection(-1, view),
			}
			false
		}
		KeyCode::Down | KeyCode::Char('j') => {
			match app.focus {
				FocusPane::Week => app.move_week_selection(1),
				FocusPane::Day => app.move_session_selection(1, view),
			}
			false
		}
		KeyCode::Left | KeyCode::Char('h') => {
			app.move_week_selection(-1);
			false
		}
		KeyCode::Right | KeyCode::Char('l') => {
			app.move_week_selection(1);
			false
		}
		KeyCode::Char('[') => {
			planner.navigate(WeekNav::Previous);
			app.status = week_status(planner);
			false
		}
		KeyCode::Char(']') => {
			planner.navigate(WeekNav::Next);
			app.status = week_status(planner);
			false
		}
		KeyCode::Char('t') => {
			planner.go_to_today();
			app.status = week_status(planner);
			false
		}
		KeyCode::Char('r') => {
			app.status = match planner.refresh(store) {
				Ok(()) => "Sessions refreshed".to_string(),
				Err(err) => format!("unable to retrieve sessions: {err}"),
			};
			false
		}
		KeyCode::Char('b') => {
			if let Some(session) = app.selected_session(view) {
				app.status = match planner.begin_session(store, &session.id) {
					Ok(updated) => format!("started: {}", updated.short_name()),
					Err(err) => format!("error: {err}"),
				};
			} else {
				app.status = "No session selected".to_string();
			}
			false
		}
		KeyCode::Char('c') => {
			if let Some(session) = app.selected_session(view) {
				if session.status.is_terminal() {
					app.status = format!("already {}", session.status.label());
				} else {
					app.mode = InputMode::Prompt(PromptState::new(
						format!("Perceived intensity for '{}' (1-10)", session.short_name()),
						PromptKind::FeedbackIntensity {
							session_id: session.id.clone(),
						},
					));
				}
			} else {
				app.status = "No session selected".to_string();
			}
			false
		}
		KeyCode::Char('m') => {
			if let Some(session) = app.selected_session(view) {
				if session.status.is_terminal() {
					app.status = format!("already {}", session.status.label());
				} else {
					app.mode = InputMode::Select(build_miss_confirm_select(&session));
				}
			} else {
				app.status = "No session selected".to_string();
			}
			false
		}
		KeyCode::Char('o') => {
			let date = view.slots[app.week_index.min(6)].date;
			app.mode = InputMode::Prompt(PromptState::new(
				format!("Session name for {}", date.format("%A %d %B")),
				PromptKind::NewSessionName { date },
			));
			false
		}
		KeyCode::Char('R') => {
			if let Some(session) = app.selected_session(view) {
				if session.status == crate::domain::SessionStatus::Completed {
					app.mode = InputMode::Prompt(PromptState::new(
						format!("Coach reply for '{}'", session.short_name()),
						PromptKind::CoachReply {
							session_id: session.id.clone(),
						},
					));
				} else {
					app.status = "Coach replies go on completed sessions".to_string();
				}
			} else {
				app.status = "No session selected".to_string();
			}
			false
		}
		KeyCode::Char('g') => {
			match build_client_select(store, planner.client()) {
				Ok(select) => app.mode = InputMode::Select(select),
				Err(err) => app.status = err,
			}
			false
		}
		KeyCode::Char('G') => {
			match build_planbook_select(store) {
				Ok(select) => app.mode = InputMode::Select(select),
				Err(err) => app.status = err,
			}
			false
		}
		_ => false,
	}
}

fn handle_prompt_key(
	app: &mut App,
	code: KeyCode,
	store: &mut FileStore,
	planner: &mut WeekPlanner<SystemClock>,
) -> bool {
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
				InputMode::Normal | InputMode::Select(_) => return false,
			};

			match submit_prompt(prompt.clone(), store, planner) {
				Ok(PromptOutcome::NextPrompt(next_prompt)) => app.mode = InputMode::Prompt(next_prompt),
				Ok(PromptOutcome::Done(message)) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					app.mode = InputMode::Prompt(prompt);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn handle_select_key(
	app: &mut App,
	code: KeyCode,
	store: &mut FileStore,
	planner: &mut WeekPlanner<SystemClock>,
) -> bool {
	match code {
		KeyCode::Esc => {
			app.mode = InputMode::Normal;
			app.status = "Selection cancelled".to_string();
		}
		KeyCode::Up | KeyCode::Char('k') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(-1);
			}
		}
		KeyCode::Down | KeyCode::Char('j') => {
			if let InputMode::Select(select) = &mut app.mode {
				select.move_selection(1);
			}
		}
		KeyCode::Enter => {
			let select = match std::mem::replace(&mut app.mode, InputMode::Normal) {
				InputMode::Select(select) => select,
				_ => return false,
			};

			match submit_select(select.clone(), store, planner) {
				Ok(message) => {
					app.mode = InputMode::Normal;
					app.status = message;
				}
				Err(err) => {
					app.mode = InputMode::Select(select);
					app.status = format!("error: {err}");
				}
			}
		}
		_ => {}
	}

	false
}

fn submit_prompt(
	prompt: PromptState,
	store: &mut FileStore,
	planner: &mut WeekPlanner<SystemClock>,
) -> Result<PromptOutcome, String> {
	match prompt.kind {
		PromptKind::NewSessionName { date } => {
			let name = required_text(&prompt.input, "session name")?;
			let session = planner
				.create_session(store, &name, date)
				.map_err(|err| err.to_string())?;
			Ok(PromptOutcome::Done(format!(
				"planned: {} on {}",
				session.short_name(),
				date.format("%d %b")
			)))
		}
		PromptKind::FeedbackIntensity { session_id } => {
			let intensity = parse_number::<u8>(&prompt.input, "intensity")?;
			if !(1..=10).contains(&intensity) {
				return Err("intensity must be between 1 and 10".to_string());
			}
			Ok(PromptOutcome::NextPrompt(PromptState::new(
				"Mood (e.g. strong, tired)",
				PromptKind::FeedbackMood {
					session_id,
					intensity,
				},
			)))
		}
		PromptKind::FeedbackMood {
			session_id,
			intensity,
		} => {
			let mood = required_text(&prompt.input, "mood")?;
			Ok(PromptOutcome::NextPrompt(PromptState::new(
				"Comment (optional)",
				PromptKind::FeedbackComment {
					session_id,
					intensity,
					mood,
				},
			)))
		}
		PromptKind::FeedbackComment {
			session_id,
			intensity,
			mood,
		} => {
			let comment = optional_text(&prompt.input);
			Ok(PromptOutcome::NextPrompt(PromptState::new(
				"Completed exercises (count)",
				PromptKind::FeedbackExercises {
					session_id,
					intensity,
					mood,
					comment,
				},
			)))
		}
		PromptKind::FeedbackExercises {
			session_id,
			intensity,
			mood,
			comment,
		} => {
			let completed_exercises = parse_number::<u32>(&prompt.input, "completed exercises")?;
			Ok(PromptOutcome::NextPrompt(PromptState::new(
				"Success rate (0-100)",
				PromptKind::FeedbackSuccessRate {
					session_id,
					intensity,
					mood,
					comment,
					completed_exercises,
				},
			)))
		}
		PromptKind::FeedbackSuccessRate {
			session_id,
			intensity,
			mood,
			comment,
			completed_exercises,
		} => {
			let success_rate = parse_number::<u8>(&prompt.input, "success rate")?;
			let feedback = CompletionFeedback {
				intensity,
				mood,
				comment,
				completed_exercises,
				success_rate,
			};
			let session = planner
				.mark_completed(store, &session_id, feedback)
				.map_err(|err| err.to_string())?;
			Ok(PromptOutcome::Done(format!(
				"completed: {}",
				session.short_name()
			)))
		}
		PromptKind::CoachReply { session_id } => {
			let reply = required_text(&prompt.input, "reply")?;
			let session = store
				.set_coach_reply(&session_id, reply, Utc::now())
				.map_err(|err| err.to_string())?;
			planner.refresh(store).map_err(|err| err.to_string())?;
			Ok(PromptOutcome::Done(format!(
				"replied to: {}",
				session.short_name()
			)))
		}
	}
}

fn submit_select(
	select: SelectState,
	store: &mut FileStore,
	planner: &mut WeekPlanner<SystemClock>,
) -> Result<String, String> {
	let selected_value = select
		.selected_option()
		.map(|option| option.value.clone())
		.ok_or_else(|| "no option selected".to_string())?;

	match select.kind {
		SelectKind::ClientSwitch => {
			let client_id = selected_value.ok_or_else(|| "selected client is missing".to_string())?;
			let client_name = store
				.planbook()
				.client(&client_id)
				.map(|client| client.name.clone())
				.ok_or_else(|| format!("client not found: {client_id}"))?;
			*planner = WeekPlanner::new(client_id, SystemClock);
			planner.refresh(store).map_err(|err| err.to_string())?;
			Ok(format!("viewing week for {client_name}"))
		}
		SelectKind::PlanbookSwitch => {
			let next_path = selected_value
				.map(PathBuf::from)
				.ok_or_else(|| "selected planbook path is missing".to_string())?;
			switch_planbook(store, planner, next_path)
		}
		SelectKind::MissConfirm {
			session_id,
			session_name,
		} => {
			let action = selected_value
				.as_deref()
				.ok_or_else(|| "selected action is missing".to_string())?;
			if action == "miss" {
				planner
					.mark_missed(store, &session_id)
					.map_err(|err| err.to_string())?;
				Ok(format!("missed: {session_name}"))
			} else {
				Ok("Kept as planned".to_string())
			}
		}
	}
}

fn build_client_select(store: &FileStore, current_client: &str) -> Result<SelectState, String> {
	let mut clients = store.active_clients();
	clients.sort_by(|left, right| left.name.cmp(&right.name).then_with(|| left.id.cmp(&right.id)));

	if clients.is_empty() {
		return Err("no active clients in this planbook".to_string());
	}

	let options = clients
		.iter()
		.map(|client| {
			let is_current = client.id == current_client;
			let label = format!(
				"{}{} <{}>",
				if is_current { "* " } else { "" },
				client.name,
				client.email
			);
			let style = if is_current {
				Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
			} else {
				Style::default()
			};
			SelectOption::new(label, Some(client.id.clone()), style)
		})
		.collect::<Vec<_>>();

	let mut select = SelectState::new("Switch client", SelectKind::ClientSwitch, options);
	select.selected = clients
		.iter()
		.position(|client| client.id == current_client)
		.unwrap_or(0);
	Ok(select)
}

fn build_planbook_select(store: &FileStore) -> Result<SelectState, String> {
	let mut paths = recent_planbooks(100).map_err(|err| format!("failed to load recent planbooks: {err}"))?;
	let current_path = store.path().to_path_buf();
	if !paths.iter().any(|path| path == &current_path) {
		paths.insert(0, current_path.clone());
	}

	let current_value = current_path.display().to_string();
	let options = paths
		.into_iter()
		.map(|path| {
			let value = path.display().to_string();
			let is_current = value == current_value;
			let exists = path.exists();
			let mut label = value.clone();
			if is_current {
				label = format!("* {label}");
			}
			if !exists {
				label = format!("[missing] {label}");
			}

			let style = if is_current {
				Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
			} else if exists {
				Style::default()
			} else {
				Style::default().fg(Color::DarkGray)
			};

			SelectOption::new(label, Some(value), style)
		})
		.collect::<Vec<_>>();

	let mut select = SelectState::new("Switch planbook", SelectKind::PlanbookSwitch, options);
	select.selected = select
		.options
		.iter()
		.position(|option| option.value.as_deref() == Some(current_value.as_str()))
		.unwrap_or(0);
	Ok(select)
}

fn build_miss_confirm_select(session: &Session) -> SelectState {
	let title = format!(
		"Mark '{}' ({}) as missed?",
		session.short_name(),
		session.scheduled_date.format("%d %b")
	);
	let options = vec![
		SelectOption::new(
			"Mark missed",
			Some("miss".to_string()),
			Style::default().fg(Color::LightRed).add_modifier(Modifier::BOLD),
		),
		SelectOption::new("Cancel", Some("cancel".to_string()), Style::default()),
	];

	let mut select = SelectState::new(
		title,
		SelectKind::MissConfirm {
			session_id: session.id.clone(),
			session_name: session.short_name(),
		},
		options,
	);
	// Missed is terminal, so default to cancel.
	select.selected = 1;
	select
}

fn switch_planbook(
	store: &mut FileStore,
	planner: &mut WeekPlanner<SystemClock>,
	next_path: PathBuf,
) -> Result<String, String> {
	if next_path == store.path() {
		return Ok(format!("already using planbook: {}", next_path.display()));
	}

	if !next_path.exists() {
		return Err(format!("planbook does not exist: {}", next_path.display()));
	}

	let (next_store, skipped_rows) =
		FileStore::open(next_path.clone()).map_err(|err| err.to_string())?;
	let client = next_store
		.active_clients()
		.first()
		.map(|client| client.id.clone())
		.ok_or_else(|| format!("planbook has no clients: {}", next_path.display()))?;

	*store = next_store;
	*planner = WeekPlanner::new(client, SystemClock);
	planner.refresh(store).map_err(|err| err.to_string())?;

	let mut message = format!("switched planbook: {}", next_path.display());
	if skipped_rows > 0 {
		message.push_str(&format!(" (skipped {skipped_rows} unreadable session rows)"));
	}
	if let Err(err) = remember_planbook(store.path()) {
		message.push_str(&format!(" (warning: failed to store recents: {err})"));
	}
	Ok(message)
}

fn build_view(app: &App, planbook: &Planbook, planner: &WeekPlanner<SystemClock>) -> ViewModel {
	let slots = planner.day_slots();
	let day_rows = slots
		.get(app.week_index.min(6))
		.map(|slot| slot.sessions.clone())
		.unwrap_or_default();
	let summary = build_week_summary(&slots);
	let client_name = planbook
		.client_by_identity(planner.client())
		.map(|client| client.name.clone())
		.unwrap_or_else(|| "Unknown client".to_string());

	ViewModel {
		client_name,
		window: planner.window(),
		slots,
		day_rows,
		summary,
	}
}

fn build_week_summary(slots: &[DaySlot]) -> WeekSummary {
	let mut summary = WeekSummary::default();
	let mut success_total = 0u32;
	let mut success_count = 0u32;

	for slot in slots {
		match slot.display_status {
			DisplayStatus::Completed => summary.completed += 1,
			DisplayStatus::Missed => summary.missed += 1,
			DisplayStatus::Current => summary.current += 1,
			DisplayStatus::Upcoming => summary.upcoming += 1,
			DisplayStatus::Rest => summary.rest_days += 1,
		}

		for session in &slot.sessions {
			if let Some(feedback) = &session.feedback {
				success_total += feedback.success_rate as u32;
				success_count += 1;
			}
		}
	}

	let closed = summary.completed + summary.missed;
	if closed > 0 {
		summary.adherence = Some((summary.completed * 100) / closed);
	}
	if success_count > 0 {
		summary.avg_success_rate = Some(success_total / success_count);
	}

	summary
}

fn week_status(planner: &WeekPlanner<SystemClock>) -> String {
	let window = planner.window();
	format!(
		"Week {} - {}",
		window.start.format("%d %b"),
		window.end.format("%d %b %Y")
	)
}

fn required_text(input: &str, field_name: &str) -> Result<String, String> {
	let value = input.trim();
	if value.is_empty() {
		Err(format!("{field_name} is required"))
	} else {
		Ok(value.to_string())
	}
}

fn optional_text(input: &str) -> Option<String> {
	let value = input.trim();
	if value.is_empty() {
		None
	} else {
		Some(value.to_string())
	}
}

fn parse_number<T: std::str::FromStr>(input: &str, field_name: &str) -> Result<T, String> {
	input
		.trim()
		.parse::<T>()
		.map_err(|_| format!("{field_name} must be a number, got '{}'", input.trim()))
}

fn status_glyph(status: DisplayStatus) -> &'static str {
	match status {
		DisplayStatus::Completed => "✓",
		DisplayStatus::Missed => "✗",
		DisplayStatus::Current => "▶",
		DisplayStatus::Upcoming => "○",
		DisplayStatus::Rest => "·",
	}
}

fn status_style(status: DisplayStatus) -> Style {
	match status {
		DisplayStatus::Completed => Style::default().fg(Color::Green),
		DisplayStatus::Missed => Style::default().fg(Color::Red),
		DisplayStatus::Current => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
		DisplayStatus::Upcoming => Style::default(),
		DisplayStatus::Rest => Style::default().fg(Color::DarkGray),
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

#[derive(Debug, Clone)]
enum PromptOutcome {
	NextPrompt(PromptState),
	Done(String),
}

#[derive(Debug, Clone)]
struct PromptState {
	title: String,
	input: String,
	kind: PromptKind,
}

impl PromptState {
	fn new(title: impl Into<String>, kind: PromptKind) -> Self {
		Self {
			title: title.into(),
			input: String::new(),
			kind,
		}
	}
}

#[derive(Debug, Clone)]
enum PromptKind {
	NewSessionName {
		date: NaiveDate,
	},
	FeedbackIntensity {
		session_id: String,
	},
	FeedbackMood {
		session_id: String,
		intensity: u8,
	},
	FeedbackComment {
		session_id: String,
		intensity: u8,
		mood: String,
	},
	FeedbackExercises {
		session_id: String,
		intensity: u8,
		mood: String,
		comment: Option<String>,
	},
	FeedbackSuccessRate {
		session_id: String,
		intensity: u8,
		mood: String,
		comment: Option<String>,
		completed_exercises: u32,
	},
	CoachReply {
		session_id: String,
	},
}

#[derive(Debug, Clone)]
struct SelectState {
	title: String,
	options: Vec<SelectOption>,
	selected: usize,
	kind: SelectKind,
}

impl SelectState {
	fn new(title: impl Into<String>, kind: SelectKind, options: Vec<SelectOption>) -> Self {
		Self {
			title: title.into(),
			options,
			selected: 0,
			kind,
		}
	}

	fn move_selection(&mut self, delta: i32) {
		if self.options.is_empty() {
			self.selected = 0;
			return;
		}

		if delta > 0 {
			self.selected = (self.selected + delta as usize).min(self.options.len() - 1);
		} else {
			self.selected = self.selected.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn selected_option(&self) -> Option<&SelectOption> {
		self.options.get(self.selected)
	}
}

#[derive(Debug, Clone)]
struct SelectOption {
	label: String,
	value: Option<String>,
	style: Style,
}

impl SelectOption {
	fn new(label: impl Into<String>, value: Option<String>, style: Style) -> Self {
		Self {
			label: label.into(),
			value,
			style,
		}
	}
}

#[derive(Debug, Clone)]
enum SelectKind {
	ClientSwitch,
	PlanbookSwitch,
	MissConfirm {
		session_id: String,
		session_name: String,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusPane {
	Week,
	Day,
}

impl FocusPane {
	fn other(self) -> Self {
		match self {
			FocusPane::Week => FocusPane::Day,
			FocusPane::Day => FocusPane::Week,
		}
	}
}

#[derive(Debug, Clone)]
enum InputMode {
	Normal,
	Prompt(PromptState),
	Select(SelectState),
}

#[derive(Debug, Clone)]
struct App {
	focus: FocusPane,
	week_index: usize,
	session_index: usize,
	mode: InputMode,
	status: String,
}

impl Default for App {
	fn default() -> Self {
		Self {
			focus: FocusPane::Week,
			week_index: 0,
			session_index: 0,
			mode: InputMode::Normal,
			status: "Ready".to_string(),
		}
	}
}

impl App {
	fn clamp_selection(&mut self, view: &ViewModel) {
		self.week_index = self.week_index.min(6);
		if view.day_rows.is_empty() {
			self.session_index = 0;
		} else {
			self.session_index = self.session_index.min(view.day_rows.len() - 1);
		}
	}

	fn move_week_selection(&mut self, delta: i32) {
		if delta > 0 {
			self.week_index = (self.week_index + delta as usize).min(6);
		} else {
			self.week_index = self.week_index.saturating_sub(delta.unsigned_abs() as usize);
		}
		self.session_index = 0;
	}

	fn move_session_selection(&mut self, delta: i32, view: &ViewModel) {
		if view.day_rows.is_empty() {
			self.session_index = 0;
			return;
		}

		if delta > 0 {
			self.session_index = (self.session_index + delta as usize).min(view.day_rows.len() - 1);
		} else {
			self.session_index = self.session_index.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn selected_session(&self, view: &ViewModel) -> Option<Session> {
		view.day_rows.get(self.session_index).cloned()
	}
}

struct ViewModel {
	client_name: String,
	window: WeekWindow,
	slots: Vec<DaySlot>,
	day_rows: Vec<Session>,
	summary: WeekSummary,
}

#[derive(Debug, Clone, Copy, Default)]
struct WeekSummary {
	completed: u32,
	missed: u32,
	current: u32,
	upcoming: u32,
	rest_days: u32,
	adherence: Option<u32>,
	avg_success_rate: Option<u32>,
}

/// Plain-text week view used by the `week` subcommand.
pub fn print_week(planbook: &Planbook, client_identifier: &str, reference: NaiveDate) -> Result<(), String> {
	let client = planbook
		.client_by_identity(client_identifier)
		.ok_or_else(|| format!("client not found: {client_identifier}"))?;
	let sessions = planbook
		.sessions_for_client(client_identifier)
		.unwrap_or_default();

	let window = WeekWindow::containing(reference);
	let today = SystemClock.today();
	let slots = bind_sessions_to_week(&sessions, window, today);

	println!(
		"{} | week {} - {}",
		client.name,
		window.start.format("%Y-%m-%d"),
		window.end.format("%Y-%m-%d")
	);
	for slot in &slots {
		let marker = if slot.is_today { "*" } else { " " };
		let detail = match slot.sessions.split_first() {
			Some((primary, rest)) => {
				let mut detail = primary.short_name();
				if let Some(feedback) = &primary.feedback {
					detail.push_str(&format!(
						" (RPE {}, {}%)",
						feedback.intensity, feedback.success_rate
					));
				}
				if !rest.is_empty() {
					detail.push_str(&format!(" (+{} more)", rest.len()));
				}
				detail
			}
			None => String::new(),
		};
		println!(
			"{marker} {} {:>9}  {}",
			slot.date.format("%a %Y-%m-%d"),
			slot.display_status.label(),
			detail
		);
	}

	Ok(())
}

/// Session listing used by the `sessions` subcommand.
pub fn print_sessions(planbook: &Planbook, client_identifier: &str, limit: usize) -> Result<(), String> {
	let sessions = planbook
		.sessions_for_client(client_identifier)
		.ok_or_else(|| format!("client not found: {client_identifier}"))?;

	if sessions.is_empty() {
		println!("no sessions for this client yet");
		return Ok(());
	}

	for session in sessions.iter().rev().take(limit) {
		let mut line = format!(
			"{} | {} | {:>11} | {}",
			session.id,
			session.scheduled_date.format("%Y-%m-%d"),
			session.status.label(),
			session.short_name()
		);
		if let Some(feedback) = &session.feedback {
			line.push_str(&format!(
				" | RPE {} | {}% success",
				feedback.intensity, feedback.success_rate
			));
		}
		println!("{line}");
	}

	Ok(())
}

mod domain;
mod planbooks;
mod planner;
mod storage;
mod ui;

use std::error::Error;
use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::planbooks::{recent_planbooks, remember_planbook, resolve_planbook_path};
use crate::storage::{FileStore, SessionStore, StatusUpdate};
use crate::ui::{print_sessions, print_week, run_planner};

#[derive(Debug, Parser)]
#[command(name = "cadence-weekplanner", about = "Terminal-first weekly session planner for coaches")]
struct Cli {
	#[arg(long)]
	planbook: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Init,
	Planner,
	AddClient {
		#[arg(long)]
		name: String,
		#[arg(long)]
		email: String,
	},
	AddSession {
		#[arg(long)]
		client: String,
		#[arg(long)]
		name: String,
		#[arg(long)]
		date: String,
	},
	Begin {
		#[arg(long)]
		session: String,
	},
	Complete {
		#[arg(long)]
		session: String,
		#[arg(long)]
		intensity: u8,
		#[arg(long)]
		mood: String,
		#[arg(long)]
		comment: Option<String>,
		#[arg(long, default_value_t = 0)]
		exercises: u32,
		#[arg(long)]
		success_rate: u8,
	},
	Miss {
		#[arg(long)]
		session: String,
	},
	Reply {
		#[arg(long)]
		session: String,
		#[arg(long)]
		message: String,
	},
	Sessions {
		#[arg(long)]
		client: String,
		#[arg(long, default_value_t = 20)]
		limit: usize,
	},
	Week {
		#[arg(long)]
		client: String,
		#[arg(long)]
		date: Option<String>,
	},
	Planbooks {
		#[arg(long, default_value_t = 20)]
		limit: usize,
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

	if let Some(Command::Planbooks { limit }) = &cli.command {
		print_recent_planbooks(*limit)?;
		return Ok(());
	}

	let planbook_path = resolve_planbook_path(cli.planbook)?;
	let (mut store, skipped_rows) = FileStore::open(planbook_path)?;
	if skipped_rows > 0 {
		eprintln!("warning: skipped {skipped_rows} unreadable session rows in the planbook");
	}
	if let Err(err) = remember_planbook(store.path()) {
		eprintln!("warning: failed to store recent planbook: {err}");
	}

	match cli.command.unwrap_or(Command::Planner) {
		Command::Init => {
			store.save()?;
			println!("initialized planbook at {}", store.path().display());
		}
		Command::Planner => {
			run_planner(&mut store)?;
		}
		Command::AddClient { name, email } => {
			let client_id = store.add_client(name, email)?;
			println!("created client {client_id}");
		}
		Command::AddSession { client, name, date } => {
			let date = parse_date(&date)?;
			let session = store.create_session(&client, &name, date)?;
			println!("planned session {}", session.id);
		}
		Command::Begin { session } => {
			let updated = store.update_session_status(
				&session,
				StatusUpdate {
					status: domain::SessionStatus::InProgress,
					feedback: None,
					updated_at: Utc::now(),
				},
			)?;
			println!("started {}", updated.short_name());
		}
		Command::Complete {
			session,
			intensity,
			mood,
			comment,
			exercises,
			success_rate,
		} => {
			let feedback = domain::CompletionFeedback {
				intensity,
				mood,
				comment,
				completed_exercises: exercises,
				success_rate,
			};
			let updated = store.update_session_status(
				&session,
				StatusUpdate {
					status: domain::SessionStatus::Completed,
					feedback: Some(feedback),
					updated_at: Utc::now(),
				},
			)?;
			println!("completed {}", updated.short_name());
		}
		Command::Miss { session } => {
			let updated = store.update_session_status(
				&session,
				StatusUpdate {
					status: domain::SessionStatus::Missed,
					feedback: None,
					updated_at: Utc::now(),
				},
			)?;
			println!("missed {}", updated.short_name());
		}
		Command::Reply { session, message } => {
			let updated = store.set_coach_reply(&session, message, Utc::now())?;
			println!("replied to {}", updated.short_name());
		}
		Command::Sessions { client, limit } => {
			print_sessions(store.planbook(), &client, limit)?;
		}
		Command::Week { client, date } => {
			let reference = match date {
				Some(raw) => parse_date(&raw)?,
				None => chrono::Local::now().date_naive(),
			};
			print_week(store.planbook(), &client, reference)?;
		}
		Command::Planbooks { .. } => {}
	}

	Ok(())
}

fn print_recent_planbooks(limit: usize) -> Result<(), Box<dyn Error>> {
	let rows = recent_planbooks(limit)?;
	if rows.is_empty() {
		println!("no recent planbooks");
		return Ok(());
	}

	for (index, path) in rows.iter().enumerate() {
		println!("{:>2}. {}", index + 1, path.display());
	}

	Ok(())
}

fn parse_date(input: &str) -> Result<NaiveDate, Box<dyn Error>> {
	Ok(NaiveDate::parse_from_str(input, "%Y-%m-%d")?)
}

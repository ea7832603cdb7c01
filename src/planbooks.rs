use std::env;
use std::fs;
use std::io::{Error, ErrorKind, Write};
use std::path::{Path, PathBuf};

const RECENT_PLANBOOKS_FILE: &str = "recent_planbooks.txt";
const MAX_RECENT_PLANBOOKS: usize = 32;

pub fn resolve_planbook_path(cli_path: Option<PathBuf>) -> Result<PathBuf, Error> {
	if let Some(path) = cli_path {
		return Ok(absolutize(path));
	}

	if let Some(path) = env::var_os("CADENCE_PLANBOOK") {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			return Ok(absolutize(path));
		}
	}

	if let Ok(mut recent) = recent_planbooks(MAX_RECENT_PLANBOOKS) {
		if let Some(path) = recent.drain(..).next() {
			return Ok(path);
		}
	}

	Err(Error::new(
		ErrorKind::NotFound,
		"no planbook selected: pass --planbook <path>, set CADENCE_PLANBOOK, or pick one from `planbooks`",
	))
}

pub fn remember_planbook(path: &Path) -> Result<(), std::io::Error> {
	let path = absolutize(path.to_path_buf());
	let mut entries = recent_planbooks(MAX_RECENT_PLANBOOKS)?;
	entries.retain(|entry| entry != &path);
	entries.insert(0, path);
	entries.truncate(MAX_RECENT_PLANBOOKS);

	let state_dir = state_dir();
	fs::create_dir_all(&state_dir)?;
	let mut file = fs::File::create(state_dir.join(RECENT_PLANBOOKS_FILE))?;
	for entry in &entries {
		writeln!(file, "{}", entry.display())?;
	}

	Ok(())
}

pub fn recent_planbooks(limit: usize) -> Result<Vec<PathBuf>, std::io::Error> {
	let path = state_dir().join(RECENT_PLANBOOKS_FILE);
	let raw = match fs::read_to_string(path) {
		Ok(raw) => raw,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
		Err(err) => return Err(err),
	};

	Ok(raw
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty())
		.take(limit)
		.map(PathBuf::from)
		.collect())
}

fn state_dir() -> PathBuf {
	if let Some(path) = env::var_os("CADENCE_STATE_DIR") {
		return PathBuf::from(path);
	}

	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(path).join("cadence_weekplanner");
		}
	}

	if let Some(path) = env::var_os("XDG_STATE_HOME") {
		return PathBuf::from(path).join("cadence_weekplanner");
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path)
			.join(".local")
			.join("state")
			.join("cadence_weekplanner");
	}

	PathBuf::from(".cadence_weekplanner")
}

fn absolutize(path: PathBuf) -> PathBuf {
	let path = if path.is_absolute() {
		path
	} else if let Ok(cwd) = env::current_dir() {
		cwd.join(path)
	} else {
		path
	};

	if path.exists() {
		fs::canonicalize(&path).unwrap_or(path)
	} else {
		path
	}
}

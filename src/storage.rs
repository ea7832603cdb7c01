use std::fmt::{Display, Formatter};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{
    Client, CompletionFeedback, Planbook, PlanbookHeader, Session, SessionStatus, StatusError,
};

const SESSIONS_MARKER: &str = "\n=== SESSIONS ===\n";

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    TomlDecode(toml::de::Error),
    TomlEncode(toml::ser::Error),
    JsonEncode(serde_json::Error),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "io error: {err}"),
            StorageError::TomlDecode(err) => write!(f, "failed to parse TOML header: {err}"),
            StorageError::TomlEncode(err) => write!(f, "failed to encode TOML header: {err}"),
            StorageError::JsonEncode(err) => write!(f, "failed to encode JSONL session: {err}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// A loaded planbook plus the count of session rows that could not be decoded
/// (malformed date, unknown status, truncated JSON). Bad rows are dropped so
/// one corrupt line never takes the whole week view down.
pub struct LoadedPlanbook {
    pub planbook: Planbook,
    pub skipped_rows: usize,
}

pub fn load_planbook(path: &Path) -> Result<LoadedPlanbook, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Ok(LoadedPlanbook {
                planbook: Planbook::new(),
                skipped_rows: 0,
            });
        }
        Err(err) => return Err(StorageError::Io(err)),
    };

    if raw.trim().is_empty() {
        return Ok(LoadedPlanbook {
            planbook: Planbook::new(),
            skipped_rows: 0,
        });
    }

    let (header_blob, sessions_blob) =
        if let Some((header, sessions)) = raw.split_once(SESSIONS_MARKER) {
            (header, sessions)
        } else {
            (raw.as_str(), "")
        };

    let header: PlanbookHeader = toml::from_str(header_blob).map_err(StorageError::TomlDecode)?;
    let mut sessions = Vec::new();
    let mut skipped_rows = 0usize;
    for line in sessions_blob.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Session>(line) {
            Ok(session) => sessions.push(session),
            Err(_) => skipped_rows += 1,
        }
    }

    Ok(LoadedPlanbook {
        planbook: Planbook { header, sessions },
        skipped_rows,
    })
}

pub fn save_planbook(path: &Path, planbook: &Planbook) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(StorageError::Io)?;
        }
    }

    let header = toml::to_string_pretty(&planbook.header).map_err(StorageError::TomlEncode)?;
    let mut file = fs::File::create(path).map_err(StorageError::Io)?;
    file.write_all(header.as_bytes()).map_err(StorageError::Io)?;
    file.write_all(SESSIONS_MARKER.as_bytes())
        .map_err(StorageError::Io)?;

    for session in &planbook.sessions {
        let line = serde_json::to_string(session).map_err(StorageError::JsonEncode)?;
        file.write_all(line.as_bytes()).map_err(StorageError::Io)?;
        file.write_all(b"\n").map_err(StorageError::Io)?;
    }

    Ok(())
}

/// Partial update applied by `SessionStore::update_session_status`. Feedback
/// is required when the target status is completed.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub status: SessionStatus,
    pub feedback: Option<CompletionFeedback>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum StoreError {
    ClientNotFound(String),
    Rejected(String),
    Status(StatusError),
    Storage(StorageError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::ClientNotFound(identifier) => {
                write!(f, "client not found: {identifier}")
            }
            StoreError::Rejected(reason) => write!(f, "{reason}"),
            StoreError::Status(err) => write!(f, "{err}"),
            StoreError::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<StatusError> for StoreError {
    fn from(err: StatusError) -> Self {
        StoreError::Status(err)
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        StoreError::Storage(err)
    }
}

/// The external-store contract the planner talks to. The file store below is
/// the only implementation shipped; a remote backend would plug in here.
pub trait SessionStore {
    /// All sessions for a client, ordered by scheduled date ascending. The
    /// identifier may be a client id or account email.
    fn fetch_sessions(&mut self, client_identifier: &str) -> Result<Vec<Session>, StoreError>;

    /// Persists a status transition and returns the updated session.
    fn update_session_status(
        &mut self,
        session_id: &str,
        update: StatusUpdate,
    ) -> Result<Session, StoreError>;

    fn create_session(
        &mut self,
        client_identifier: &str,
        name: &str,
        scheduled_date: NaiveDate,
    ) -> Result<Session, StoreError>;
}

/// Planbook-file-backed store. Mutations are staged on a copy and the file is
/// rewritten before the in-memory planbook is replaced, so a failed write
/// leaves both the file and the visible state untouched.
pub struct FileStore {
    path: PathBuf,
    planbook: Planbook,
}

impl FileStore {
    pub fn new(path: PathBuf, planbook: Planbook) -> Self {
        Self { path, planbook }
    }

    pub fn open(path: PathBuf) -> Result<(Self, usize), StorageError> {
        let loaded = load_planbook(&path)?;
        Ok((
            Self {
                path,
                planbook: loaded.planbook,
            },
            loaded.skipped_rows,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn planbook(&self) -> &Planbook {
        &self.planbook
    }

    pub fn save(&self) -> Result<(), StorageError> {
        save_planbook(&self.path, &self.planbook)
    }

    pub fn add_client(&mut self, name: String, email: String) -> Result<String, StoreError> {
        let mut staged = self.planbook.clone();
        let id = staged.add_client(name, email).map_err(StoreError::Rejected)?;
        self.commit(staged)?;
        Ok(id)
    }

    pub fn active_clients(&self) -> Vec<&Client> {
        self.planbook
            .header
            .clients
            .iter()
            .filter(|client| !client.archived)
            .collect()
    }

    pub fn set_coach_reply(
        &mut self,
        session_id: &str,
        reply: String,
        now: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let mut staged = self.planbook.clone();
        let session = staged.set_coach_reply(session_id, reply, now)?;
        self.commit(staged)?;
        Ok(session)
    }

    fn commit(&mut self, staged: Planbook) -> Result<(), StorageError> {
        save_planbook(&self.path, &staged)?;
        self.planbook = staged;
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn fetch_sessions(&mut self, client_identifier: &str) -> Result<Vec<Session>, StoreError> {
        self.planbook
            .sessions_for_client(client_identifier)
            .ok_or_else(|| StoreError::ClientNotFound(client_identifier.to_string()))
    }

    fn update_session_status(
        &mut self,
        session_id: &str,
        update: StatusUpdate,
    ) -> Result<Session, StoreError> {
        let mut staged = self.planbook.clone();
        let session = staged.set_session_status(
            session_id,
            update.status,
            update.feedback,
            update.updated_at,
        )?;
        self.commit(staged)?;
        Ok(session)
    }

    fn create_session(
        &mut self,
        client_identifier: &str,
        name: &str,
        scheduled_date: NaiveDate,
    ) -> Result<Session, StoreError> {
        let mut staged = self.planbook.clone();
        let session = staged
            .add_session(client_identifier, name.to_string(), scheduled_date)
            .map_err(StoreError::Rejected)?;
        self.commit(staged)?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use chrono::{NaiveDate, Utc};

    use crate::domain::{Planbook, SessionStatus};

    use super::{
        FileStore, LoadedPlanbook, SessionStore, StatusUpdate, StoreError, load_planbook,
        save_planbook,
    };

    fn temp_file(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("{}_{}", name, std::process::id()));
        path
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("test date must be valid")
    }

    fn seeded_planbook() -> (Planbook, String, String) {
        let mut planbook = Planbook::new();
        let client = planbook
            .add_client("Alice".to_string(), "alice@example.com".to_string())
            .expect("client should be created");
        let session = planbook
            .add_session(&client, "Upper body".to_string(), date(2026, 5, 4))
            .expect("session should be created");
        (planbook, client, session.id)
    }

    #[test]
    fn round_trips_header_and_sessions() {
        let (planbook, _, _) = seeded_planbook();
        let path = temp_file("weekplanner_roundtrip.planbook");

        save_planbook(&path, &planbook).expect("save should succeed");
        let loaded = load_planbook(&path).expect("load should succeed");
        assert_eq!(loaded.skipped_rows, 0);
        assert_eq!(loaded.planbook.header.clients.len(), 1);
        assert_eq!(loaded.planbook.sessions.len(), 1);
        assert_eq!(loaded.planbook.sessions[0].name, "Upper body");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_loads_as_empty_planbook() {
        let path = temp_file("weekplanner_missing.planbook");
        let _ = fs::remove_file(&path);
        let LoadedPlanbook {
            planbook,
            skipped_rows,
        } = load_planbook(&path).expect("missing file should load empty");
        assert!(planbook.header.clients.is_empty());
        assert!(planbook.sessions.is_empty());
        assert_eq!(skipped_rows, 0);
    }

    #[test]
    fn malformed_session_rows_are_skipped_not_fatal() {
        let (planbook, _, _) = seeded_planbook();
        let path = temp_file("weekplanner_badrows.planbook");
        save_planbook(&path, &planbook).expect("save should succeed");

        let mut raw = fs::read_to_string(&path).expect("file should exist");
        raw.push_str("{not valid json\n");
        raw.push_str(
            "{\"id\":\"bad00001\",\"client_id\":\"c\",\"name\":\"Bad date\",\"scheduled_date\":\"2026-13-99\",\"status\":\"scheduled\"}\n",
        );
        raw.push_str(
            "{\"id\":\"bad00002\",\"client_id\":\"c\",\"name\":\"Bad status\",\"scheduled_date\":\"2026-05-05\",\"status\":\"snoozed\"}\n",
        );
        fs::write(&path, raw).expect("rewrite should succeed");

        let loaded = load_planbook(&path).expect("load should tolerate bad rows");
        assert_eq!(loaded.planbook.sessions.len(), 1);
        assert_eq!(loaded.skipped_rows, 3);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn file_store_persists_status_updates() {
        let (planbook, _, session_id) = seeded_planbook();
        let path = temp_file("weekplanner_update.planbook");
        let mut store = FileStore::new(path.clone(), planbook);

        let updated = store
            .update_session_status(
                &session_id,
                StatusUpdate {
                    status: SessionStatus::Missed,
                    feedback: None,
                    updated_at: Utc::now(),
                },
            )
            .expect("update should succeed");
        assert_eq!(updated.status, SessionStatus::Missed);

        let reloaded = load_planbook(&path).expect("load should succeed");
        assert_eq!(reloaded.planbook.sessions[0].status, SessionStatus::Missed);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn file_store_rejects_illegal_transitions_without_writing() {
        let (mut planbook, _, session_id) = seeded_planbook();
        planbook
            .set_session_status(&session_id, SessionStatus::Missed, None, Utc::now())
            .expect("seed transition should succeed");
        let path = temp_file("weekplanner_illegal.planbook");
        let mut store = FileStore::new(path.clone(), planbook);

        let result = store.update_session_status(
            &session_id,
            StatusUpdate {
                status: SessionStatus::InProgress,
                feedback: None,
                updated_at: Utc::now(),
            },
        );
        assert!(matches!(result, Err(StoreError::Status(_))));
        // Nothing was staged, so nothing was written.
        assert!(!path.exists());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn fetch_resolves_client_by_email_and_orders_by_date() {
        let (mut planbook, client, _) = seeded_planbook();
        planbook
            .add_session(&client, "Earlier".to_string(), date(2026, 4, 27))
            .expect("session should be created");
        let mut store = FileStore::new(temp_file("weekplanner_fetch.planbook"), planbook);

        let sessions = store
            .fetch_sessions("alice@example.com")
            .expect("fetch should succeed");
        assert_eq!(sessions.len(), 2);
        assert!(sessions[0].scheduled_date <= sessions[1].scheduled_date);

        let unknown = store.fetch_sessions("nobody@example.com");
        assert!(matches!(unknown, Err(StoreError::ClientNotFound(_))));
    }

    #[test]
    fn create_session_lands_in_store_and_file() {
        let (planbook, client, _) = seeded_planbook();
        let path = temp_file("weekplanner_create.planbook");
        let mut store = FileStore::new(path.clone(), planbook);

        let session = store
            .create_session(&client, "Mobility", date(2026, 5, 7))
            .expect("create should succeed");
        assert_eq!(session.status, SessionStatus::Scheduled);

        let reloaded = load_planbook(&path).expect("load should succeed");
        assert!(reloaded
            .planbook
            .sessions
            .iter()
            .any(|candidate| candidate.id == session.id));
        let _ = fs::remove_file(path);
    }
}

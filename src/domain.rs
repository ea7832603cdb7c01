use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Serialize};

const ID_LEN: usize = 8;

/// Supplies the application's notion of "now". Injected everywhere a current
/// date or timestamp is needed so views and tests never pin a literal date.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Test clock pinned to midnight UTC of a chosen day.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
            .and_hms_opt(0, 0, 0)
            .expect("midnight must be valid")
            .and_utc()
    }

    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub email: String,
    pub archived: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    InProgress,
    Completed,
    Missed,
}

impl SessionStatus {
    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::InProgress => "in progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Missed => "missed",
        }
    }

    /// Completed and missed close out the session for its week.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Missed)
    }

    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        match self {
            SessionStatus::Scheduled => matches!(
                next,
                SessionStatus::InProgress | SessionStatus::Completed | SessionStatus::Missed
            ),
            SessionStatus::InProgress => {
                matches!(next, SessionStatus::Completed | SessionStatus::Missed)
            }
            SessionStatus::Completed | SessionStatus::Missed => false,
        }
    }

    pub fn display(self) -> DisplayStatus {
        match self {
            SessionStatus::Completed => DisplayStatus::Completed,
            SessionStatus::Missed => DisplayStatus::Missed,
            SessionStatus::InProgress => DisplayStatus::Current,
            SessionStatus::Scheduled => DisplayStatus::Upcoming,
        }
    }
}

/// What a day slot shows in the weekly planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    Completed,
    Missed,
    Current,
    Upcoming,
    Rest,
}

impl DisplayStatus {
    pub fn label(self) -> &'static str {
        match self {
            DisplayStatus::Completed => "completed",
            DisplayStatus::Missed => "missed",
            DisplayStatus::Current => "current",
            DisplayStatus::Upcoming => "upcoming",
            DisplayStatus::Rest => "rest",
        }
    }
}

/// Client-reported outcome attached when a session is marked completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionFeedback {
    pub intensity: u8,
    pub mood: String,
    pub comment: Option<String>,
    pub completed_exercises: u32,
    pub success_rate: u8,
}

impl CompletionFeedback {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=10).contains(&self.intensity) {
            return Err(format!(
                "intensity must be between 1 and 10, got {}",
                self.intensity
            ));
        }
        if self.success_rate > 100 {
            return Err(format!(
                "success rate must be between 0 and 100, got {}",
                self.success_rate
            ));
        }
        if self.mood.trim().is_empty() {
            return Err("mood is required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub client_id: String,
    pub name: String,
    pub scheduled_date: NaiveDate,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<CompletionFeedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coach_reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn short_name(&self) -> String {
        self.name
            .lines()
            .next()
            .unwrap_or("(unnamed session)")
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekNav {
    Previous,
    Next,
}

/// A Monday-anchored 7-day range. Derived on demand, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekWindow {
    /// The week holding `reference`: the Monday on or before it through the
    /// following Sunday.
    pub fn containing(reference: NaiveDate) -> Self {
        let start = reference - Duration::days(reference.weekday().num_days_from_monday() as i64);
        Self {
            start,
            end: start + Duration::days(6),
        }
    }

    pub fn for_reference(reference: NaiveDate, nav: Option<WeekNav>) -> Self {
        let reference = match nav {
            Some(WeekNav::Previous) => reference - Duration::days(7),
            Some(WeekNav::Next) => reference + Duration::days(7),
            None => reference,
        };
        Self::containing(reference)
    }

    pub fn previous(self) -> Self {
        Self::containing(self.start - Duration::days(7))
    }

    pub fn next(self) -> Self {
        Self::containing(self.start + Duration::days(7))
    }

    pub fn contains(self, day: NaiveDate) -> bool {
        day >= self.start && day <= self.end
    }

    pub fn days(self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..7).map(move |offset| start + Duration::days(offset))
    }
}

/// One of the seven positions in a rendered week, Monday first.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySlot {
    pub day_index: usize,
    pub date: NaiveDate,
    pub is_today: bool,
    pub sessions: Vec<Session>,
    pub display_status: DisplayStatus,
}

/// Joins a client's sessions against a week window, producing the seven day
/// slots in Monday..Sunday order. A day with no session is a rest day; when
/// several sessions share a day the first one drives the slot's status.
pub fn bind_sessions_to_week(
    sessions: &[Session],
    window: WeekWindow,
    today: NaiveDate,
) -> Vec<DaySlot> {
    window
        .days()
        .enumerate()
        .map(|(day_index, date)| {
            let bound = sessions
                .iter()
                .filter(|session| session.scheduled_date == date)
                .cloned()
                .collect::<Vec<_>>();
            let display_status = bound
                .first()
                .map(|session| session.status.display())
                .unwrap_or(DisplayStatus::Rest);
            DaySlot {
                day_index,
                date,
                is_today: date == today,
                sessions: bound,
                display_status,
            }
        })
        .collect()
}

/// Rejections from the status state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusError {
    SessionNotFound(String),
    IllegalTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
    MissingFeedback,
    InvalidFeedback(String),
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusError::SessionNotFound(id) => write!(f, "session not found: {id}"),
            StatusError::IllegalTransition { from, to } => {
                write!(f, "cannot move a {} session to {}", from.label(), to.label())
            }
            StatusError::MissingFeedback => {
                write!(f, "completing a session requires feedback")
            }
            StatusError::InvalidFeedback(reason) => write!(f, "invalid feedback: {reason}"),
        }
    }
}

impl std::error::Error for StatusError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanbookHeader {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub clients: Vec<Client>,
}

impl PlanbookHeader {
    pub fn new() -> Self {
        Self {
            schema_version: 1,
            created_at: Utc::now(),
            clients: Vec::new(),
        }
    }
}

/// The whole store: coached clients plus every planned session.
#[derive(Debug, Clone)]
pub struct Planbook {
    pub header: PlanbookHeader,
    pub sessions: Vec<Session>,
}

impl Planbook {
    pub fn new() -> Self {
        Self {
            header: PlanbookHeader::new(),
            sessions: Vec::new(),
        }
    }

    pub fn client(&self, id: &str) -> Option<&Client> {
        self.header.clients.iter().find(|client| client.id == id)
    }

    /// Resolves a caller-supplied identity to a client: either the client id
    /// or the account email, the email compared case-insensitively.
    pub fn client_by_identity(&self, identifier: &str) -> Option<&Client> {
        self.header.clients.iter().find(|client| {
            client.id == identifier || client.email.eq_ignore_ascii_case(identifier)
        })
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id == id)
    }

    pub fn add_client(&mut self, name: String, email: String) -> Result<String, String> {
        if self
            .header
            .clients
            .iter()
            .any(|client| client.email.eq_ignore_ascii_case(&email))
        {
            return Err(format!("a client with email {email} already exists"));
        }

        let id = generate_id();
        self.header.clients.push(Client {
            id: id.clone(),
            name,
            email,
            archived: false,
        });
        Ok(id)
    }

    pub fn add_session(
        &mut self,
        client_identifier: &str,
        name: String,
        scheduled_date: NaiveDate,
    ) -> Result<Session, String> {
        let client = self
            .client_by_identity(client_identifier)
            .ok_or_else(|| format!("client not found: {client_identifier}"))?;
        if client.archived {
            return Err(format!("client is archived: {client_identifier}"));
        }

        let session = Session {
            id: generate_id(),
            client_id: client.id.clone(),
            name,
            scheduled_date,
            status: SessionStatus::Scheduled,
            feedback: None,
            coach_reply: None,
            completed_at: None,
            updated_at: None,
        };
        self.sessions.push(session.clone());
        Ok(session)
    }

    /// All sessions for a client, ordered by scheduled date ascending.
    pub fn sessions_for_client(&self, client_identifier: &str) -> Option<Vec<Session>> {
        let client = self.client_by_identity(client_identifier)?;
        let mut sessions = self
            .sessions
            .iter()
            .filter(|session| session.client_id == client.id)
            .cloned()
            .collect::<Vec<_>>();
        sessions.sort_by(|left, right| {
            left.scheduled_date
                .cmp(&right.scheduled_date)
                .then_with(|| left.id.cmp(&right.id))
        });
        Some(sessions)
    }

    /// Applies a status transition. Completion must carry feedback; terminal
    /// statuses reject further transitions.
    pub fn set_session_status(
        &mut self,
        session_id: &str,
        next: SessionStatus,
        feedback: Option<CompletionFeedback>,
        now: DateTime<Utc>,
    ) -> Result<Session, StatusError> {
        let session = self
            .sessions
            .iter_mut()
            .find(|session| session.id == session_id)
            .ok_or_else(|| StatusError::SessionNotFound(session_id.to_string()))?;

        if !session.status.can_transition_to(next) {
            return Err(StatusError::IllegalTransition {
                from: session.status,
                to: next,
            });
        }

        if next == SessionStatus::Completed {
            let feedback = feedback.ok_or(StatusError::MissingFeedback)?;
            feedback.validate().map_err(StatusError::InvalidFeedback)?;
            session.feedback = Some(feedback);
            session.completed_at = Some(now);
        }

        session.status = next;
        session.updated_at = Some(now);
        Ok(session.clone())
    }

    /// Coach response on a completed session's feedback.
    pub fn set_coach_reply(
        &mut self,
        session_id: &str,
        reply: String,
        now: DateTime<Utc>,
    ) -> Result<Session, StatusError> {
        let session = self
            .sessions
            .iter_mut()
            .find(|session| session.id == session_id)
            .ok_or_else(|| StatusError::SessionNotFound(session_id.to_string()))?;

        if session.status != SessionStatus::Completed {
            return Err(StatusError::IllegalTransition {
                from: session.status,
                to: SessionStatus::Completed,
            });
        }

        session.coach_reply = Some(reply);
        session.updated_at = Some(now);
        Ok(session.clone())
    }
}

pub fn generate_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

use chrono::{Duration, NaiveDate};

use crate::domain::{
    Clock, CompletionFeedback, DaySlot, Session, SessionStatus, WeekNav, WeekWindow,
    bind_sessions_to_week,
};
use crate::storage::{SessionStore, StatusUpdate, StoreError};

/// Handle for one in-flight fetch. Only the most recently issued ticket may
/// apply its result; anything older is discarded as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Stale,
}

/// The week view for one signed-in client: the navigated week window, the
/// cached session list, and the mutation flow that writes through the store
/// before touching the cache.
pub struct WeekPlanner<C: Clock> {
    client: String,
    clock: C,
    reference_date: NaiveDate,
    window: WeekWindow,
    sessions: Vec<Session>,
    issued_seq: u64,
}

impl<C: Clock> WeekPlanner<C> {
    pub fn new(client: impl Into<String>, clock: C) -> Self {
        let reference_date = clock.today();
        Self {
            client: client.into(),
            clock,
            reference_date,
            window: WeekWindow::containing(reference_date),
            sessions: Vec::new(),
            issued_seq: 0,
        }
    }

    pub fn client(&self) -> &str {
        &self.client
    }

    pub fn window(&self) -> WeekWindow {
        self.window
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.issued_seq += 1;
        FetchTicket {
            seq: self.issued_seq,
        }
    }

    /// Applies a fetch result. Stale tickets are dropped without touching the
    /// cache, including their errors. A current-ticket failure clears the
    /// cache so the view falls back to an all-rest week.
    pub fn apply_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Session>, StoreError>,
    ) -> Result<FetchOutcome, StoreError> {
        if ticket.seq != self.issued_seq {
            return Ok(FetchOutcome::Stale);
        }

        match result {
            Ok(sessions) => {
                self.sessions = sessions;
                Ok(FetchOutcome::Applied)
            }
            Err(err) => {
                self.sessions.clear();
                Err(err)
            }
        }
    }

    pub fn refresh(&mut self, store: &mut impl SessionStore) -> Result<(), StoreError> {
        let ticket = self.begin_fetch();
        let result = store.fetch_sessions(&self.client);
        self.apply_fetch(ticket, result).map(|_| ())
    }

    pub fn navigate(&mut self, nav: WeekNav) {
        self.reference_date = match nav {
            WeekNav::Previous => self.reference_date - Duration::days(7),
            WeekNav::Next => self.reference_date + Duration::days(7),
        };
        self.window = WeekWindow::containing(self.reference_date);
    }

    pub fn go_to_today(&mut self) {
        self.reference_date = self.clock.today();
        self.window = WeekWindow::containing(self.reference_date);
    }

    pub fn day_slots(&self) -> Vec<DaySlot> {
        bind_sessions_to_week(&self.sessions, self.window, self.clock.today())
    }

    pub fn mark_completed(
        &mut self,
        store: &mut impl SessionStore,
        session_id: &str,
        feedback: CompletionFeedback,
    ) -> Result<Session, StoreError> {
        self.mutate_status(store, session_id, SessionStatus::Completed, Some(feedback))
    }

    pub fn mark_missed(
        &mut self,
        store: &mut impl SessionStore,
        session_id: &str,
    ) -> Result<Session, StoreError> {
        self.mutate_status(store, session_id, SessionStatus::Missed, None)
    }

    pub fn begin_session(
        &mut self,
        store: &mut impl SessionStore,
        session_id: &str,
    ) -> Result<Session, StoreError> {
        self.mutate_status(store, session_id, SessionStatus::InProgress, None)
    }

    pub fn create_session(
        &mut self,
        store: &mut impl SessionStore,
        name: &str,
        scheduled_date: NaiveDate,
    ) -> Result<Session, StoreError> {
        let session = store.create_session(&self.client, name, scheduled_date)?;
        self.sessions.push(session.clone());
        self.sessions.sort_by(|left, right| {
            left.scheduled_date
                .cmp(&right.scheduled_date)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(session)
    }

    /// Writes through the store first; the cached copy is patched only after
    /// the store confirms, so a rejected write leaves the view unchanged.
    fn mutate_status(
        &mut self,
        store: &mut impl SessionStore,
        session_id: &str,
        status: SessionStatus,
        feedback: Option<CompletionFeedback>,
    ) -> Result<Session, StoreError> {
        let updated = store.update_session_status(
            session_id,
            StatusUpdate {
                status,
                feedback,
                updated_at: self.clock.now(),
            },
        )?;

        if let Some(cached) = self
            .sessions
            .iter_mut()
            .find(|session| session.id == updated.id)
        {
            *cached = updated.clone();
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::{
        Clock, CompletionFeedback, DisplayStatus, FixedClock, Planbook, Session, SessionStatus,
        WeekNav,
    };
    use crate::storage::{FileStore, SessionStore, StatusUpdate, StoreError};

    use super::{FetchOutcome, WeekPlanner};

    const CLIENT_EMAIL: &str = "alice@example.com";

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("test date must be valid")
    }

    // Monday, so the window under test starts on the clock's today.
    fn monday() -> NaiveDate {
        date(2026, 5, 4)
    }

    fn feedback() -> CompletionFeedback {
        CompletionFeedback {
            intensity: 6,
            mood: "strong".to_string(),
            comment: Some("felt easy".to_string()),
            completed_exercises: 8,
            success_rate: 90,
        }
    }

    fn store_with_sessions(days: &[(i64, SessionStatus)]) -> FileStore {
        let mut planbook = Planbook::new();
        let client = planbook
            .add_client("Alice".to_string(), CLIENT_EMAIL.to_string())
            .expect("client should be created");
        for (offset, status) in days {
            let session = planbook
                .add_session(
                    &client,
                    format!("Session +{offset}"),
                    monday() + chrono::Duration::days(*offset),
                )
                .expect("session should be created");
            if *status != SessionStatus::Scheduled {
                let feedback = (*status == SessionStatus::Completed).then(feedback);
                planbook
                    .set_session_status(&session.id, *status, feedback, FixedClock(monday()).now())
                    .expect("seed transition should succeed");
            }
        }

        let mut path = std::env::temp_dir();
        path.push(format!(
            "weekplanner_planner_{}_{}",
            std::process::id(),
            crate::domain::generate_id()
        ));
        FileStore::new(path, planbook)
    }

    /// Store that fails every call, for exercising the error paths.
    struct UnreachableStore;

    impl SessionStore for UnreachableStore {
        fn fetch_sessions(&mut self, identifier: &str) -> Result<Vec<Session>, StoreError> {
            Err(StoreError::ClientNotFound(identifier.to_string()))
        }

        fn update_session_status(
            &mut self,
            _session_id: &str,
            _update: StatusUpdate,
        ) -> Result<Session, StoreError> {
            Err(StoreError::Rejected("store unreachable".to_string()))
        }

        fn create_session(
            &mut self,
            _client: &str,
            _name: &str,
            _date: NaiveDate,
        ) -> Result<Session, StoreError> {
            Err(StoreError::Rejected("store unreachable".to_string()))
        }
    }

    #[test]
    fn refresh_fills_the_week_from_the_store() {
        let mut store = store_with_sessions(&[(0, SessionStatus::Scheduled)]);
        let mut planner = WeekPlanner::new(CLIENT_EMAIL, FixedClock(monday()));

        planner.refresh(&mut store).expect("refresh should succeed");
        let slots = planner.day_slots();
        assert_eq!(slots[0].display_status, DisplayStatus::Upcoming);
        assert!(slots[0].is_today);
        assert!(slots[1..].iter().all(|slot| slot.sessions.is_empty()));
    }

    #[test]
    fn stale_fetch_results_are_discarded() {
        let mut store = store_with_sessions(&[(0, SessionStatus::Scheduled)]);
        let mut planner = WeekPlanner::new(CLIENT_EMAIL, FixedClock(monday()));

        let stale_ticket = planner.begin_fetch();
        let fresh_ticket = planner.begin_fetch();

        let fresh = store
            .fetch_sessions(CLIENT_EMAIL)
            .expect("fetch should succeed");
        assert_eq!(
            planner
                .apply_fetch(fresh_ticket, Ok(fresh))
                .expect("apply should succeed"),
            FetchOutcome::Applied
        );

        // The slow first response arrives afterwards with different content.
        let outcome = planner
            .apply_fetch(stale_ticket, Ok(Vec::new()))
            .expect("stale apply should not error");
        assert_eq!(outcome, FetchOutcome::Stale);
        assert_eq!(planner.sessions().len(), 1);

        // A stale error must not clear the cache either.
        let outcome = planner
            .apply_fetch(stale_ticket, Err(StoreError::Rejected("late".to_string())))
            .expect("stale error should be swallowed");
        assert_eq!(outcome, FetchOutcome::Stale);
        assert_eq!(planner.sessions().len(), 1);
    }

    #[test]
    fn fetch_failure_falls_back_to_an_all_rest_week() {
        let mut good = store_with_sessions(&[(0, SessionStatus::Scheduled)]);
        let mut planner = WeekPlanner::new(CLIENT_EMAIL, FixedClock(monday()));
        planner.refresh(&mut good).expect("refresh should succeed");
        assert_eq!(planner.sessions().len(), 1);

        let mut bad = UnreachableStore;
        assert!(planner.refresh(&mut bad).is_err());
        assert!(planner.sessions().is_empty());
        assert!(planner
            .day_slots()
            .iter()
            .all(|slot| slot.display_status == DisplayStatus::Rest));
    }

    #[test]
    fn completed_mutation_shows_up_in_the_next_bind() {
        let mut store = store_with_sessions(&[(2, SessionStatus::Scheduled)]);
        let mut planner = WeekPlanner::new(CLIENT_EMAIL, FixedClock(monday()));
        planner.refresh(&mut store).expect("refresh should succeed");

        let session_id = planner.sessions()[0].id.clone();
        planner
            .mark_completed(&mut store, &session_id, feedback())
            .expect("completion should succeed");

        let slots = planner.day_slots();
        assert_eq!(slots[2].display_status, DisplayStatus::Completed);
        assert_eq!(slots[2].sessions[0].status, SessionStatus::Completed);
    }

    #[test]
    fn failed_mutation_leaves_the_cache_untouched() {
        let mut store = store_with_sessions(&[(1, SessionStatus::Scheduled)]);
        let mut planner = WeekPlanner::new(CLIENT_EMAIL, FixedClock(monday()));
        planner.refresh(&mut store).expect("refresh should succeed");
        let session_id = planner.sessions()[0].id.clone();

        let mut bad = UnreachableStore;
        assert!(planner.mark_missed(&mut bad, &session_id).is_err());
        assert_eq!(planner.sessions()[0].status, SessionStatus::Scheduled);
        assert_eq!(planner.day_slots()[1].display_status, DisplayStatus::Upcoming);
    }

    #[test]
    fn terminal_sessions_reject_further_mutation() {
        let mut store = store_with_sessions(&[(0, SessionStatus::Missed)]);
        let mut planner = WeekPlanner::new(CLIENT_EMAIL, FixedClock(monday()));
        planner.refresh(&mut store).expect("refresh should succeed");
        let session_id = planner.sessions()[0].id.clone();

        let result = planner.begin_session(&mut store, &session_id);
        assert!(matches!(result, Err(StoreError::Status(_))));
        assert_eq!(planner.sessions()[0].status, SessionStatus::Missed);
    }

    #[test]
    fn navigation_moves_whole_weeks_and_returns_home() {
        let mut store = store_with_sessions(&[(0, SessionStatus::Scheduled)]);
        let mut planner = WeekPlanner::new(CLIENT_EMAIL, FixedClock(date(2026, 5, 6)));
        planner.refresh(&mut store).expect("refresh should succeed");
        let home = planner.window();

        planner.navigate(WeekNav::Previous);
        assert_eq!(planner.window().start, home.start - chrono::Duration::days(7));
        assert!(planner.day_slots().iter().all(|slot| slot.sessions.is_empty()));

        planner.navigate(WeekNav::Next);
        assert_eq!(planner.window(), home);

        planner.navigate(WeekNav::Next);
        planner.go_to_today();
        assert_eq!(planner.window(), home);
    }

    #[test]
    fn created_sessions_join_the_cache_in_date_order() {
        let mut store = store_with_sessions(&[(4, SessionStatus::Scheduled)]);
        let mut planner = WeekPlanner::new(CLIENT_EMAIL, FixedClock(monday()));
        planner.refresh(&mut store).expect("refresh should succeed");

        planner
            .create_session(&mut store, "Recovery spin", monday() + chrono::Duration::days(1))
            .expect("create should succeed");

        assert_eq!(planner.sessions().len(), 2);
        assert!(planner.sessions()[0].scheduled_date <= planner.sessions()[1].scheduled_date);
        assert_eq!(
            planner.day_slots()[1].display_status,
            DisplayStatus::Upcoming
        );
    }
}

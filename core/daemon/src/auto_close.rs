//! End-of-day sweep that force-closes sessions left open past the cutoff.
//!
//! The sweep owns an injected store and clock so it can be ticked by hand in
//! tests. In the daemon it runs on its own thread; stopping it is best-effort
//! and an in-flight sweep is simply abandoned.

use chrono::{DateTime, FixedOffset, NaiveTime};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::db::Db;
use crate::error::Result;
use crate::model::WorkSession;

const SLEEP_SLICE: Duration = Duration::from_millis(250);

/// The slice of the store the sweep needs.
pub trait OpenSessionStore: Send + Sync {
    fn open_sessions(&self) -> Result<Vec<WorkSession>>;

    /// Closes the session at `at` if it is still open; returns whether it was.
    fn force_close(&self, session_id: i64, at: &DateTime<FixedOffset>) -> Result<bool>;
}

impl OpenSessionStore for Db {
    fn open_sessions(&self) -> Result<Vec<WorkSession>> {
        Ok(self.list_open_sessions()?)
    }

    fn force_close(&self, session_id: i64, at: &DateTime<FixedOffset>) -> Result<bool> {
        Ok(self.close_if_open(session_id, at)?)
    }
}

impl<T: OpenSessionStore + ?Sized> OpenSessionStore for Arc<T> {
    fn open_sessions(&self) -> Result<Vec<WorkSession>> {
        (**self).open_sessions()
    }

    fn force_close(&self, session_id: i64, at: &DateTime<FixedOffset>) -> Result<bool> {
        (**self).force_close(session_id, at)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub last_sweep_at: Option<DateTime<FixedOffset>>,
    pub last_closed_count: usize,
}

pub struct AutoCloser<S, C> {
    store: S,
    clock: C,
    cutoff: NaiveTime,
    stats: Arc<Mutex<SweepStats>>,
}

impl<S, C> AutoCloser<S, C>
where
    S: OpenSessionStore + 'static,
    C: Clock + 'static,
{
    pub fn new(store: S, clock: C, cutoff: NaiveTime) -> Self {
        Self {
            store,
            clock,
            cutoff,
            stats: Arc::new(Mutex::new(SweepStats::default())),
        }
    }

    /// Shared view of the last sweep, for health reporting.
    pub fn stats(&self) -> Arc<Mutex<SweepStats>> {
        Arc::clone(&self.stats)
    }

    /// One check: before the cutoff nothing happens; at or past it every open
    /// session is closed at the current time. Returns how many were closed.
    pub fn tick(&self) -> Result<usize> {
        let now = self.clock.now();
        if now.time() < self.cutoff {
            return Ok(0);
        }

        let mut closed = 0;
        for session in self.store.open_sessions()? {
            match self.store.force_close(session.id, &now) {
                Ok(true) => closed += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(session_id = session.id, error = %err, "Failed to auto-close session");
                }
            }
        }

        if closed > 0 {
            info!(closed, at = %now.to_rfc3339(), "Auto-closed open sessions");
        }
        if let Ok(mut stats) = self.stats.lock() {
            stats.last_sweep_at = Some(now);
            stats.last_closed_count = closed;
        }
        Ok(closed)
    }

    pub fn spawn(self, interval: Duration) -> AutoCloseHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                if let Err(err) = self.tick() {
                    warn!(error = %err, "Auto-close sweep failed");
                }
                sleep_unless_stopped(interval, &flag);
            }
        });
        AutoCloseHandle {
            stop,
            thread: Some(thread),
        }
    }
}

fn sleep_unless_stopped(interval: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + interval;
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

pub struct AutoCloseHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl AutoCloseHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn join(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::parse_timestamp;

    /// In-memory store: sessions with `ended_at == None` are open.
    #[derive(Default)]
    struct MemoryStore {
        sessions: Mutex<Vec<WorkSession>>,
    }

    impl MemoryStore {
        fn with(sessions: Vec<WorkSession>) -> Self {
            Self {
                sessions: Mutex::new(sessions),
            }
        }

        fn snapshot(&self) -> Vec<WorkSession> {
            self.sessions.lock().unwrap().clone()
        }
    }

    impl OpenSessionStore for MemoryStore {
        fn open_sessions(&self) -> Result<Vec<WorkSession>> {
            Ok(self
                .sessions
                .lock()
                .unwrap()
                .iter()
                .filter(|session| session.is_open())
                .cloned()
                .collect())
        }

        fn force_close(&self, session_id: i64, at: &DateTime<FixedOffset>) -> Result<bool> {
            let mut sessions = self.sessions.lock().unwrap();
            match sessions
                .iter_mut()
                .find(|session| session.id == session_id && session.is_open())
            {
                Some(session) => {
                    session.ended_at = Some(*at);
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    fn session(id: i64, worker_id: i64, ended_at: Option<&str>) -> WorkSession {
        WorkSession {
            id,
            worker_id: Some(worker_id),
            project_id: None,
            task_id: None,
            started_at: parse_timestamp("2025-03-03T09:00:00-05:00").unwrap(),
            ended_at: ended_at.map(|value| parse_timestamp(value).unwrap()),
            note: None,
            comment: None,
        }
    }

    fn cutoff() -> NaiveTime {
        NaiveTime::from_hms_opt(18, 35, 0).unwrap()
    }

    fn mixed_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with(vec![
            session(1, 1, None),
            session(2, 2, None),
            session(3, 3, None),
            session(4, 4, Some("2025-03-03T12:00:00-05:00")),
            session(5, 5, Some("2025-03-03T13:00:00-05:00")),
        ]))
    }

    #[test]
    fn does_nothing_before_cutoff() {
        let store = mixed_store();
        let clock = Arc::new(FixedClock::at("2025-03-03T18:34:59-05:00"));
        let closer = AutoCloser::new(Arc::clone(&store), Arc::clone(&clock), cutoff());

        assert_eq!(closer.tick().unwrap(), 0);
        assert_eq!(store.open_sessions().unwrap().len(), 3);
        assert_eq!(closer.stats().lock().unwrap().last_sweep_at, None);
    }

    #[test]
    fn closes_only_open_sessions_at_cutoff() {
        let store = mixed_store();
        let clock = Arc::new(FixedClock::at("2025-03-03T18:35:00-05:00"));
        let closer = AutoCloser::new(Arc::clone(&store), Arc::clone(&clock), cutoff());

        assert_eq!(closer.tick().unwrap(), 3);
        let sessions = store.snapshot();
        for session in &sessions[..3] {
            assert_eq!(session.ended_at, Some(clock.now()));
        }
        assert_eq!(
            sessions[3].ended_at,
            Some(parse_timestamp("2025-03-03T12:00:00-05:00").unwrap())
        );
        assert_eq!(
            sessions[4].ended_at,
            Some(parse_timestamp("2025-03-03T13:00:00-05:00").unwrap())
        );

        let stats = closer.stats().lock().unwrap().clone();
        assert_eq!(stats.last_closed_count, 3);
        assert_eq!(stats.last_sweep_at, Some(clock.now()));
    }

    #[test]
    fn later_ticks_are_no_ops_until_new_sessions_open() {
        let store = mixed_store();
        let clock = Arc::new(FixedClock::at("2025-03-03T18:40:00-05:00"));
        let closer = AutoCloser::new(Arc::clone(&store), Arc::clone(&clock), cutoff());

        assert_eq!(closer.tick().unwrap(), 3);
        clock.advance(chrono::Duration::minutes(1));
        assert_eq!(closer.tick().unwrap(), 0);
    }

    #[test]
    fn sweeps_the_sqlite_store() {
        use crate::model::{NewSession, NewWorker};

        let dir = tempfile::tempdir().expect("temp dir");
        let db = Arc::new(Db::new(dir.path().join("worklog.db")).expect("db init"));
        let worker = db
            .insert_worker(&NewWorker {
                username: "ana".to_string(),
                first_name: None,
                last_name: None,
                area: None,
            })
            .expect("worker");
        db.open_session(
            &NewSession {
                worker_id: worker.id,
                project_id: None,
                task_id: None,
                started_at: parse_timestamp("2025-03-03T09:00:00-05:00").unwrap(),
                note: None,
                comment: None,
            },
            None,
        )
        .expect("open");

        let clock = FixedClock::at("2025-03-03T19:00:00-05:00");
        let closer = AutoCloser::new(Arc::clone(&db), clock, cutoff());
        assert_eq!(closer.tick().unwrap(), 1);
        assert!(db.list_open_sessions().unwrap().is_empty());
    }

    #[test]
    fn spawned_sweep_runs_and_stops() {
        let store = mixed_store();
        let clock = Arc::new(FixedClock::at("2025-03-03T18:35:00-05:00"));
        let closer = AutoCloser::new(Arc::clone(&store), clock, cutoff());
        let stats = closer.stats();

        let handle = closer.spawn(Duration::from_secs(60));
        let deadline = Instant::now() + Duration::from_secs(5);
        while stats.lock().unwrap().last_sweep_at.is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        handle.join();

        assert!(store.open_sessions().unwrap().is_empty());
    }
}

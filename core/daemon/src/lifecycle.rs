//! Session lifecycle: start, resume, end.
//!
//! Every path that opens a session goes through `Db::open_session`, which
//! closes the worker's open session and inserts the new one in one transaction.

use tracing::info;

use crate::clock::Clock;
use crate::db::Db;
use crate::error::{Result, WorklogError};
use crate::model::{NewSession, Task, WorkSession, Worker};

const NOTE_MIN_CHARS: usize = 25;
const NOTE_MAX_CHARS: usize = 500;
const NOTE_PAD: char = '.';

/// Closes the worker's open session (if any) and opens a new one on `task_id`.
/// The task moves to `in_progress`.
pub fn start_from_task(
    db: &Db,
    clock: &dyn Clock,
    worker_id: i64,
    task_id: i64,
) -> Result<WorkSession> {
    require_worker(db, worker_id)?;
    let task = db
        .get_task(task_id)?
        .ok_or_else(|| WorklogError::not_found("task", task_id))?;

    let new = NewSession {
        worker_id,
        project_id: task.project_id,
        task_id: Some(task.id),
        started_at: clock.now(),
        note: Some(initial_note(&task)),
        comment: None,
    };
    let opened = db.open_session(&new, Some(task.id))?;

    info!(
        worker_id,
        task_id,
        session_id = opened.session.id,
        closed = ?opened.closed,
        "Started session from task"
    );
    Ok(opened.session)
}

/// Opens a fresh session carrying the project, task and comment of `session_id`.
/// Task status is left alone.
pub fn resume(db: &Db, clock: &dyn Clock, worker_id: i64, session_id: i64) -> Result<WorkSession> {
    require_worker(db, worker_id)?;
    let existing = db
        .get_session(session_id)?
        .ok_or_else(|| WorklogError::not_found("session", session_id))?;

    let new = NewSession {
        worker_id,
        project_id: existing.project_id,
        task_id: existing.task_id,
        started_at: clock.now(),
        note: None,
        comment: existing.comment.clone(),
    };
    let opened = db.open_session(&new, None)?;

    info!(
        worker_id,
        resumed_from = session_id,
        session_id = opened.session.id,
        closed = ?opened.closed,
        "Resumed session"
    );
    Ok(opened.session)
}

/// Stores the comment and closes the session. Ending a session that is already
/// closed only replaces the comment.
pub fn end(db: &Db, clock: &dyn Clock, session_id: i64, comment: &str) -> Result<WorkSession> {
    let session = db
        .close_session(session_id, &clock.now(), comment)?
        .ok_or_else(|| WorklogError::not_found("session", session_id))?;

    info!(
        session_id,
        worker_id = ?session.worker_id,
        ended_at = ?session.ended_at,
        "Ended session"
    );
    Ok(session)
}

pub fn toggle_worker_active(db: &Db, worker_id: i64) -> Result<Worker> {
    let worker = require_worker(db, worker_id)?;
    let is_active = !worker.is_active;
    db.set_worker_active(worker_id, is_active)?;
    info!(worker_id, is_active, "Toggled worker");
    Ok(Worker { is_active, ..worker })
}

/// Task description, else title, right-padded with dots to 25 characters and
/// cut at 500.
pub fn initial_note(task: &Task) -> String {
    let source = task
        .description
        .as_deref()
        .filter(|description| !description.trim().is_empty())
        .or(task.title.as_deref())
        .unwrap_or("");

    let mut note: String = source.chars().take(NOTE_MAX_CHARS).collect();
    let len = note.chars().count();
    if len < NOTE_MIN_CHARS {
        note.extend(std::iter::repeat(NOTE_PAD).take(NOTE_MIN_CHARS - len));
    }
    note
}

fn require_worker(db: &Db, worker_id: i64) -> Result<Worker> {
    db.get_worker(worker_id)?
        .ok_or_else(|| WorklogError::not_found("worker", worker_id))
}

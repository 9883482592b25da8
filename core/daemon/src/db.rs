//! SQLite persistence for worklogd.
//!
//! The daemon is the only writer. Every operation opens its own connection;
//! the single-open-session invariant is held by a partial unique index plus an
//! IMMEDIATE transaction around close-then-create.

use chrono::{DateTime, FixedOffset, NaiveDate};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row, TransactionBehavior};
use std::collections::HashSet;
use std::path::PathBuf;
use worklog_daemon_protocol::DATE_FORMAT;

use crate::error::{Result, WorklogError};
use crate::model::{
    format_timestamp, parse_timestamp, NewSession, NewTask, NewWorker, Project, SessionDetail,
    Task, TaskPriority, TaskStatus, WorkSession, Worker,
};

pub struct Db {
    path: PathBuf,
}

/// Result of opening a session: the sessions that were closed to make room, and the new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedSession {
    pub closed: Vec<i64>,
    pub session: WorkSession,
}

const SESSION_COLUMNS: &str =
    "s.id, s.worker_id, s.project_id, s.task_id, s.started_at, s.ended_at, s.note, s.comment";

const DETAIL_SELECT: &str = "SELECT s.id, s.worker_id, s.project_id, s.task_id, s.started_at, \
            s.ended_at, s.note, s.comment, \
            w.username, p.id, p.name, p.state, p.color, p.is_private, t.title \
     FROM sessions s \
     LEFT JOIN workers w ON w.id = s.worker_id \
     LEFT JOIN projects p ON p.id = s.project_id \
     LEFT JOIN tasks t ON t.id = s.task_id";

impl Db {
    pub fn new(path: PathBuf) -> std::result::Result<Self, String> {
        let db = Self { path };
        db.init_schema()?;
        Ok(db)
    }

    pub fn insert_worker(&self, worker: &NewWorker) -> Result<Worker> {
        self.with_connection(|conn| {
            let inserted = conn.execute(
                "INSERT INTO workers (username, first_name, last_name, is_active, area) \
                 VALUES (?1, ?2, ?3, 1, ?4)",
                params![
                    worker.username,
                    worker.first_name,
                    worker.last_name,
                    worker.area
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(err) if is_constraint(&err) => {
                    return Err(WorklogError::validation(
                        "username",
                        format!("{} is already taken", worker.username),
                    ))
                }
                Err(err) => return Err(format!("Failed to insert worker: {}", err).into()),
            }
            let id = conn.last_insert_rowid();
            fetch_worker(conn, id)?
                .ok_or_else(|| WorklogError::not_found("worker", id))
        })
    }

    pub fn get_worker(&self, worker_id: i64) -> std::result::Result<Option<Worker>, String> {
        self.with_connection(|conn| fetch_worker(conn, worker_id))
    }

    /// First worker (lowest id) whose username contains `fragment`, ignoring case.
    pub fn find_worker_by_username(
        &self,
        fragment: &str,
    ) -> std::result::Result<Option<Worker>, String> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT id, username, first_name, last_name, is_active, area FROM workers \
                 WHERE instr(lower(username), lower(?1)) > 0 \
                 ORDER BY id ASC LIMIT 1",
                params![fragment],
                map_worker,
            )
            .optional()
            .map_err(|err| format!("Failed to search workers: {}", err))
        })
    }

    pub fn list_workers(&self, active_only: bool) -> std::result::Result<Vec<Worker>, String> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, username, first_name, last_name, is_active, area FROM workers \
                     WHERE (?1 = 0 OR is_active = 1) ORDER BY username ASC",
                )
                .map_err(|err| format!("Failed to prepare workers query: {}", err))?;
            let rows = stmt
                .query_map(params![active_only], map_worker)
                .map_err(|err| format!("Failed to read worker rows: {}", err))?;

            let mut workers = Vec::new();
            for row in rows {
                workers.push(row.map_err(|err| format!("Failed to decode worker row: {}", err))?);
            }
            Ok(workers)
        })
    }

    pub fn set_worker_active(
        &self,
        worker_id: i64,
        is_active: bool,
    ) -> std::result::Result<bool, String> {
        self.with_connection(|conn| {
            let changed = conn
                .execute(
                    "UPDATE workers SET is_active = ?2 WHERE id = ?1",
                    params![worker_id, is_active],
                )
                .map_err(|err| format!("Failed to update worker: {}", err))?;
            Ok(changed > 0)
        })
    }

    pub fn insert_project(&self, project: &Project) -> Result<Project> {
        self.with_connection(|conn| {
            let inserted = conn.execute(
                "INSERT INTO projects (id, name, state, color, is_private) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    project.id,
                    project.name,
                    project.state,
                    project.color,
                    project.is_private
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(err) if is_constraint(&err) => {
                    return Err(WorklogError::validation(
                        "id",
                        format!("project {} already exists", project.id),
                    ))
                }
                Err(err) => return Err(format!("Failed to insert project: {}", err).into()),
            }
            fetch_project(conn, project.id)?
                .ok_or_else(|| WorklogError::not_found("project", project.id))
        })
    }

    pub fn get_project(&self, project_id: i64) -> std::result::Result<Option<Project>, String> {
        self.with_connection(|conn| fetch_project(conn, project_id))
    }

    pub fn insert_task(&self, task: &NewTask) -> std::result::Result<Task, String> {
        self.with_connection(|conn| {
            let created_at = format_timestamp(&task.created_at);
            conn.execute(
                "INSERT INTO tasks \
                    (project_id, worker_id, title, description, status, priority, due_at, \
                     planned_seconds, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    task.project_id,
                    task.worker_id,
                    task.title,
                    task.description,
                    TaskStatus::Todo.as_str(),
                    task.priority.as_str(),
                    task.due_at.map(|due| due.format(DATE_FORMAT).to_string()),
                    task.planned_seconds,
                    created_at
                ],
            )
            .map_err(|err| format!("Failed to insert task: {}", err))?;
            let id = conn.last_insert_rowid();
            fetch_task(conn, id)?.ok_or_else(|| format!("Inserted task {} vanished", id))
        })
    }

    pub fn get_task(&self, task_id: i64) -> std::result::Result<Option<Task>, String> {
        self.with_connection(|conn| fetch_task(conn, task_id))
    }

    pub fn get_session(&self, session_id: i64) -> std::result::Result<Option<WorkSession>, String> {
        self.with_connection(|conn| fetch_session(conn, session_id))
    }

    /// Closes every open session of the worker and opens `new`, atomically.
    ///
    /// When `start_task` is given that task moves to `in_progress` in the same
    /// transaction.
    pub fn open_session(&self, new: &NewSession, start_task: Option<i64>) -> Result<OpenedSession> {
        self.with_connection(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|err| format!("Failed to begin session transaction: {}", err))?;
            let now = format_timestamp(&new.started_at);

            let closed = {
                let mut stmt = tx
                    .prepare(
                        "SELECT id FROM sessions WHERE worker_id = ?1 AND ended_at IS NULL \
                         ORDER BY id ASC",
                    )
                    .map_err(|err| format!("Failed to prepare open session query: {}", err))?;
                let rows = stmt
                    .query_map(params![new.worker_id], |row| row.get::<_, i64>(0))
                    .map_err(|err| format!("Failed to read open sessions: {}", err))?;
                let mut ids = Vec::new();
                for row in rows {
                    ids.push(row.map_err(|err| format!("Failed to decode session id: {}", err))?);
                }
                ids
            };

            tx.execute(
                "UPDATE sessions SET ended_at = ?2 WHERE worker_id = ?1 AND ended_at IS NULL",
                params![new.worker_id, now],
            )
            .map_err(|err| format!("Failed to close open sessions: {}", err))?;

            let inserted = tx.execute(
                "INSERT INTO sessions (worker_id, project_id, task_id, started_at, note, comment) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    new.worker_id,
                    new.project_id,
                    new.task_id,
                    now,
                    new.note,
                    new.comment
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(err) if is_constraint(&err) => {
                    return Err(WorklogError::ConcurrencyViolation {
                        worker_id: new.worker_id,
                    })
                }
                Err(err) => return Err(format!("Failed to insert session: {}", err).into()),
            }
            let id = tx.last_insert_rowid();

            if let Some(task_id) = start_task {
                tx.execute(
                    "UPDATE tasks SET status = ?2, updated_at = ?3 WHERE id = ?1",
                    params![task_id, TaskStatus::InProgress.as_str(), now],
                )
                .map_err(|err| format!("Failed to update task status: {}", err))?;
            }

            let session = fetch_session(&tx, id)?
                .ok_or_else(|| format!("Inserted session {} vanished", id))?;
            tx.commit()
                .map_err(|err| format!("Failed to commit session transaction: {}", err))?;

            Ok(OpenedSession { closed, session })
        })
    }

    /// Stores the closing comment. An already-closed session keeps its original end time.
    pub fn close_session(
        &self,
        session_id: i64,
        ended_at: &DateTime<FixedOffset>,
        comment: &str,
    ) -> std::result::Result<Option<WorkSession>, String> {
        self.with_connection(|conn| {
            let changed = conn
                .execute(
                    "UPDATE sessions SET comment = ?2, ended_at = COALESCE(ended_at, ?3) \
                     WHERE id = ?1",
                    params![session_id, comment, format_timestamp(ended_at)],
                )
                .map_err(|err| format!("Failed to close session: {}", err))?;
            if changed == 0 {
                return Ok(None);
            }
            fetch_session(conn, session_id)
        })
    }

    /// Sets `ended_at` only if the session is still open. Returns whether it was.
    pub fn close_if_open(
        &self,
        session_id: i64,
        ended_at: &DateTime<FixedOffset>,
    ) -> std::result::Result<bool, String> {
        self.with_connection(|conn| {
            let changed = conn
                .execute(
                    "UPDATE sessions SET ended_at = ?2 WHERE id = ?1 AND ended_at IS NULL",
                    params![session_id, format_timestamp(ended_at)],
                )
                .map_err(|err| format!("Failed to force-close session: {}", err))?;
            Ok(changed > 0)
        })
    }

    pub fn list_open_sessions(&self) -> std::result::Result<Vec<WorkSession>, String> {
        self.query_sessions("s.ended_at IS NULL", params![])
    }

    pub fn sessions_started_on(
        &self,
        worker_id: i64,
        day: NaiveDate,
    ) -> std::result::Result<Vec<WorkSession>, String> {
        let day = day.format(DATE_FORMAT).to_string();
        self.query_sessions(
            "s.worker_id = ?1 AND substr(s.started_at, 1, 10) = ?2",
            params![worker_id, day],
        )
    }

    pub fn open_session_worker_ids(&self) -> std::result::Result<HashSet<i64>, String> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT DISTINCT worker_id FROM sessions \
                     WHERE ended_at IS NULL AND worker_id IS NOT NULL",
                )
                .map_err(|err| format!("Failed to prepare open worker query: {}", err))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, i64>(0))
                .map_err(|err| format!("Failed to read open worker rows: {}", err))?;
            let mut ids = HashSet::new();
            for row in rows {
                ids.insert(row.map_err(|err| format!("Failed to decode worker id: {}", err))?);
            }
            Ok(ids)
        })
    }

    /// Sessions whose start date lies in the inclusive range, newest first.
    /// `None` means every session.
    pub fn session_details_started_between(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> std::result::Result<Vec<SessionDetail>, String> {
        match range {
            Some((start, end)) => {
                let start = start.format(DATE_FORMAT).to_string();
                let end = end.format(DATE_FORMAT).to_string();
                self.query_details(
                    "WHERE substr(s.started_at, 1, 10) BETWEEN ?1 AND ?2",
                    params![start, end],
                    "ORDER BY s.id DESC",
                )
            }
            None => self.query_details("", params![], "ORDER BY s.id DESC"),
        }
    }

    pub fn worker_session_details_between(
        &self,
        worker_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> std::result::Result<Vec<SessionDetail>, String> {
        let start = start.format(DATE_FORMAT).to_string();
        let end = end.format(DATE_FORMAT).to_string();
        self.query_details(
            "WHERE s.worker_id = ?1 AND substr(s.started_at, 1, 10) BETWEEN ?2 AND ?3",
            params![worker_id, start, end],
            "ORDER BY s.id ASC",
        )
    }

    pub fn task_session_details(
        &self,
        task_id: i64,
    ) -> std::result::Result<Vec<SessionDetail>, String> {
        self.query_details("WHERE s.task_id = ?1", params![task_id], "ORDER BY s.id ASC")
    }

    pub fn project_sessions(&self, project_id: i64) -> std::result::Result<Vec<WorkSession>, String> {
        self.query_sessions("s.project_id = ?1", params![project_id])
    }

    /// The highest-id session of every active worker, ordered by username.
    pub fn latest_session_details_for_active_workers(
        &self,
    ) -> std::result::Result<Vec<SessionDetail>, String> {
        self.query_details(
            "WHERE s.id IN (SELECT MAX(id) FROM sessions WHERE worker_id IS NOT NULL \
                            GROUP BY worker_id) \
               AND w.is_active = 1",
            params![],
            "ORDER BY w.username ASC",
        )
    }

    fn query_sessions(
        &self,
        filter: &str,
        args: &[&dyn ToSql],
    ) -> std::result::Result<Vec<WorkSession>, String> {
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT {} FROM sessions s WHERE {} ORDER BY s.id ASC",
                SESSION_COLUMNS, filter
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|err| format!("Failed to prepare sessions query: {}", err))?;
            let rows = stmt
                .query_map(args, map_session)
                .map_err(|err| format!("Failed to read session rows: {}", err))?;

            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row.map_err(|err| format!("Failed to decode session row: {}", err))?);
            }
            Ok(sessions)
        })
    }

    fn query_details(
        &self,
        filter: &str,
        args: &[&dyn ToSql],
        order: &str,
    ) -> std::result::Result<Vec<SessionDetail>, String> {
        self.with_connection(|conn| {
            let sql = format!("{} {} {}", DETAIL_SELECT, filter, order);
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|err| format!("Failed to prepare session detail query: {}", err))?;
            let rows = stmt
                .query_map(args, map_detail)
                .map_err(|err| format!("Failed to read session detail rows: {}", err))?;

            let mut details = Vec::new();
            for row in rows {
                details.push(
                    row.map_err(|err| format!("Failed to decode session detail row: {}", err))?,
                );
            }
            Ok(details)
        })
    }

    fn init_schema(&self) -> std::result::Result<(), String> {
        self.with_connection(|conn| {
            conn.execute_batch(
                "BEGIN;
                 CREATE TABLE IF NOT EXISTS workers (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    first_name TEXT,
                    last_name TEXT,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    area TEXT
                 );
                 CREATE TABLE IF NOT EXISTS projects (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    state TEXT NOT NULL DEFAULT 'Activo',
                    color TEXT,
                    is_private INTEGER NOT NULL DEFAULT 0
                 );
                 CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id INTEGER REFERENCES projects(id),
                    worker_id INTEGER REFERENCES workers(id),
                    title TEXT,
                    description TEXT,
                    status TEXT NOT NULL DEFAULT 'todo',
                    priority TEXT NOT NULL DEFAULT 'low',
                    due_at TEXT,
                    planned_seconds INTEGER,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    worker_id INTEGER REFERENCES workers(id),
                    project_id INTEGER REFERENCES projects(id),
                    task_id INTEGER REFERENCES tasks(id),
                    started_at TEXT NOT NULL,
                    ended_at TEXT,
                    note TEXT,
                    comment TEXT
                 );
                 CREATE UNIQUE INDEX IF NOT EXISTS sessions_one_open_per_worker
                    ON sessions(worker_id) WHERE ended_at IS NULL;
                 CREATE INDEX IF NOT EXISTS sessions_by_worker
                    ON sessions(worker_id, started_at);
                 CREATE INDEX IF NOT EXISTS sessions_by_task ON sessions(task_id);
                 CREATE INDEX IF NOT EXISTS sessions_by_project ON sessions(project_id);
                 COMMIT;",
            )
            .map_err(|err| format!("Failed to initialize schema: {}", err))?;
            Ok(())
        })
    }

    fn with_connection<T, E>(
        &self,
        op: impl FnOnce(&mut Connection) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E>
    where
        E: From<String>,
    {
        let mut conn = self.open()?;
        op(&mut conn)
    }

    fn open(&self) -> std::result::Result<Connection, String> {
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent)
                .map_err(|err| format!("Failed to create daemon data dir: {}", err))?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let conn = Connection::open_with_flags(&self.path, flags)
            .map_err(|err| format!("Failed to open sqlite db: {}", err))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|err| format!("Failed to enable WAL: {}", err))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|err| format!("Failed to set synchronous: {}", err))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|err| format!("Failed to set busy_timeout: {}", err))?;

        Ok(conn)
    }
}

fn fetch_worker(conn: &Connection, worker_id: i64) -> std::result::Result<Option<Worker>, String> {
    conn.query_row(
        "SELECT id, username, first_name, last_name, is_active, area FROM workers WHERE id = ?1",
        params![worker_id],
        map_worker,
    )
    .optional()
    .map_err(|err| format!("Failed to query worker: {}", err))
}

fn fetch_project(
    conn: &Connection,
    project_id: i64,
) -> std::result::Result<Option<Project>, String> {
    conn.query_row(
        "SELECT id, name, state, color, is_private FROM projects WHERE id = ?1",
        params![project_id],
        |row| {
            Ok(Project {
                id: row.get(0)?,
                name: row.get(1)?,
                state: row.get(2)?,
                color: row.get(3)?,
                is_private: row.get(4)?,
            })
        },
    )
    .optional()
    .map_err(|err| format!("Failed to query project: {}", err))
}

fn fetch_task(conn: &Connection, task_id: i64) -> std::result::Result<Option<Task>, String> {
    conn.query_row(
        "SELECT id, project_id, worker_id, title, description, status, priority, due_at, \
                planned_seconds, created_at, updated_at \
         FROM tasks WHERE id = ?1",
        params![task_id],
        |row| {
            let status_raw: String = row.get(5)?;
            let status = TaskStatus::from_str(&status_raw)
                .ok_or_else(|| invalid_column(5, format!("Unknown task status: {}", status_raw)))?;
            let priority_raw: String = row.get(6)?;
            let priority = TaskPriority::from_str(&priority_raw).ok_or_else(|| {
                invalid_column(6, format!("Unknown task priority: {}", priority_raw))
            })?;
            let due_at = match row.get::<_, Option<String>>(7)? {
                Some(raw) => Some(
                    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
                        .map_err(|_| invalid_column(7, format!("Bad due date: {}", raw)))?,
                ),
                None => None,
            };

            Ok(Task {
                id: row.get(0)?,
                project_id: row.get(1)?,
                worker_id: row.get(2)?,
                title: row.get(3)?,
                description: row.get(4)?,
                status,
                priority,
                due_at,
                planned_seconds: row.get(8)?,
                created_at: timestamp_column(row, 9)?,
                updated_at: timestamp_column(row, 10)?,
            })
        },
    )
    .optional()
    .map_err(|err| format!("Failed to query task: {}", err))
}

fn fetch_session(
    conn: &Connection,
    session_id: i64,
) -> std::result::Result<Option<WorkSession>, String> {
    let sql = format!("SELECT {} FROM sessions s WHERE s.id = ?1", SESSION_COLUMNS);
    conn.query_row(&sql, params![session_id], map_session)
        .optional()
        .map_err(|err| format!("Failed to query session: {}", err))
}

fn map_worker(row: &Row<'_>) -> rusqlite::Result<Worker> {
    Ok(Worker {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        is_active: row.get(4)?,
        area: row.get(5)?,
    })
}

fn map_session(row: &Row<'_>) -> rusqlite::Result<WorkSession> {
    let ended_at = match row.get::<_, Option<String>>(5)? {
        Some(raw) => Some(
            parse_timestamp(&raw)
                .ok_or_else(|| invalid_column(5, format!("Bad timestamp: {}", raw)))?,
        ),
        None => None,
    };

    Ok(WorkSession {
        id: row.get(0)?,
        worker_id: row.get(1)?,
        project_id: row.get(2)?,
        task_id: row.get(3)?,
        started_at: timestamp_column(row, 4)?,
        ended_at,
        note: row.get(6)?,
        comment: row.get(7)?,
    })
}

fn map_detail(row: &Row<'_>) -> rusqlite::Result<SessionDetail> {
    let session = map_session(row)?;
    let project = match row.get::<_, Option<i64>>(9)? {
        Some(id) => Some(Project {
            id,
            name: row.get(10)?,
            state: row.get(11)?,
            color: row.get(12)?,
            is_private: row.get(13)?,
        }),
        None => None,
    };

    Ok(SessionDetail {
        session,
        username: row.get(8)?,
        project,
        task_title: row.get(14)?,
    })
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<FixedOffset>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| invalid_column(idx, format!("Bad timestamp: {}", raw)))
}

fn invalid_column(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn is_constraint(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> DateTime<FixedOffset> {
        parse_timestamp(value).expect("timestamp")
    }

    fn test_db() -> (tempfile::TempDir, Db) {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let db = Db::new(temp_dir.path().join("worklog.db")).expect("db init");
        (temp_dir, db)
    }

    fn worker(db: &Db, username: &str) -> Worker {
        db.insert_worker(&NewWorker {
            username: username.to_string(),
            first_name: None,
            last_name: None,
            area: None,
        })
        .expect("insert worker")
    }

    fn new_session(worker_id: i64, started_at: &str) -> NewSession {
        NewSession {
            worker_id,
            project_id: None,
            task_id: None,
            started_at: ts(started_at),
            note: None,
            comment: None,
        }
    }

    #[test]
    fn schema_includes_domain_tables() {
        let (_dir, db) = test_db();
        let tables = db
            .with_connection(|conn| {
                let mut stmt = conn
                    .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
                    .map_err(|err| format!("Failed to query sqlite_master: {}", err))?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, String>(0))
                    .map_err(|err| format!("Failed to read sqlite_master rows: {}", err))?;
                let mut names = Vec::new();
                for row in rows {
                    names.push(row.map_err(|err| format!("Failed to decode table name: {}", err))?);
                }
                Ok::<_, String>(names)
            })
            .expect("tables");

        for table in ["workers", "projects", "tasks", "sessions"] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn duplicate_username_is_validation_error() {
        let (_dir, db) = test_db();
        worker(&db, "jperez");
        let err = db
            .insert_worker(&NewWorker {
                username: "jperez".to_string(),
                first_name: None,
                last_name: None,
                area: None,
            })
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn open_session_closes_previous_one_atomically() {
        let (_dir, db) = test_db();
        let ana = worker(&db, "ana");

        let first = db
            .open_session(&new_session(ana.id, "2025-03-03T08:30:00-05:00"), None)
            .expect("first session");
        assert!(first.closed.is_empty());

        let second = db
            .open_session(&new_session(ana.id, "2025-03-03T09:15:00-05:00"), None)
            .expect("second session");
        assert_eq!(second.closed, vec![first.session.id]);

        let closed = db.get_session(first.session.id).unwrap().unwrap();
        assert_eq!(closed.ended_at, Some(ts("2025-03-03T09:15:00-05:00")));
        assert_eq!(db.list_open_sessions().unwrap().len(), 1);
    }

    #[test]
    fn unique_index_rejects_second_open_session() {
        let (_dir, db) = test_db();
        let ana = worker(&db, "ana");
        db.open_session(&new_session(ana.id, "2025-03-03T08:30:00-05:00"), None)
            .expect("open");

        let result = db.with_connection(|conn| {
            conn.execute(
                "INSERT INTO sessions (worker_id, started_at) VALUES (?1, ?2)",
                params![ana.id, "2025-03-03T08:31:00-05:00"],
            )
            .map_err(|err| format!("{}", err))
        });
        assert!(result.is_err());
    }

    #[test]
    fn close_session_keeps_first_end_time() {
        let (_dir, db) = test_db();
        let ana = worker(&db, "ana");
        let opened = db
            .open_session(&new_session(ana.id, "2025-03-03T08:30:00-05:00"), None)
            .expect("open");

        let first_end = ts("2025-03-03T10:00:00-05:00");
        db.close_session(opened.session.id, &first_end, "planos")
            .expect("close")
            .expect("row");
        let again = db
            .close_session(opened.session.id, &ts("2025-03-03T12:00:00-05:00"), "planos v2")
            .expect("close again")
            .expect("row");

        assert_eq!(again.ended_at, Some(first_end));
        assert_eq!(again.comment.as_deref(), Some("planos v2"));
        assert!(db
            .close_session(999, &first_end, "nope")
            .expect("close missing")
            .is_none());
    }

    #[test]
    fn close_if_open_skips_closed_sessions() {
        let (_dir, db) = test_db();
        let ana = worker(&db, "ana");
        let opened = db
            .open_session(&new_session(ana.id, "2025-03-03T08:30:00-05:00"), None)
            .expect("open");
        let at = ts("2025-03-03T18:35:00-05:00");

        assert!(db.close_if_open(opened.session.id, &at).unwrap());
        assert!(!db.close_if_open(opened.session.id, &at).unwrap());
    }

    #[test]
    fn finds_worker_by_case_insensitive_fragment() {
        let (_dir, db) = test_db();
        worker(&db, "mlopez");
        worker(&db, "jlopez");

        let found = db.find_worker_by_username("LOPEZ").unwrap().unwrap();
        assert_eq!(found.username, "mlopez");
        assert!(db.find_worker_by_username("garcia").unwrap().is_none());
    }

    #[test]
    fn sessions_started_on_uses_local_date() {
        let (_dir, db) = test_db();
        let ana = worker(&db, "ana");
        let opened = db
            .open_session(&new_session(ana.id, "2025-03-03T23:30:00-05:00"), None)
            .expect("open");
        db.close_if_open(opened.session.id, &ts("2025-03-03T23:50:00-05:00"))
            .unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        assert_eq!(db.sessions_started_on(ana.id, day).unwrap().len(), 1);
        let next = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        assert!(db.sessions_started_on(ana.id, next).unwrap().is_empty());
    }

    #[test]
    fn latest_session_per_active_worker() {
        let (_dir, db) = test_db();
        let ana = worker(&db, "ana");
        let beto = worker(&db, "beto");
        db.open_session(&new_session(ana.id, "2025-03-03T08:30:00-05:00"), None)
            .unwrap();
        let latest = db
            .open_session(&new_session(ana.id, "2025-03-03T09:30:00-05:00"), None)
            .unwrap();
        db.open_session(&new_session(beto.id, "2025-03-03T08:00:00-05:00"), None)
            .unwrap();
        db.set_worker_active(beto.id, false).unwrap();

        let details = db.latest_session_details_for_active_workers().unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].session.id, latest.session.id);
        assert_eq!(details[0].username.as_deref(), Some("ana"));
    }
}

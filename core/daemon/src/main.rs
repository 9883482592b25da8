//! worklogd entrypoint.
//!
//! A single-writer service that owns the work-session store: a unix socket
//! listener speaking newline-delimited JSON, strict request validation, a
//! SQLite-backed record store, and the end-of-day auto-close sweep.

use fs_err as fs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use worklog_daemon_protocol::{
    parse_params, CreateProjectParams, CreateTaskParams, CreateWorkerParams, DailyTotalParams,
    DateRangeParams, DetailedReportParams, EndSessionParams, ErrorInfo, Method, PeriodReportParams,
    ProjectHoursParams, Request, Response, ResumeSessionParams, StartFromTaskParams,
    TaskSummaryParams, Validate, WorkerIdParams, MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};

mod aggregate;
mod auto_close;
mod clock;
mod config;
mod dashboard;
mod db;
mod error;
mod lifecycle;
mod model;
mod records;
mod report;
mod state;

use auto_close::AutoCloser;
use clock::{Clock, SystemClock};
use config::DaemonConfig;
use db::Db;
use state::SharedState;

const SOCKET_ENV: &str = "WORKLOG_SOCKET";
const SOCKET_NAME: &str = "daemon.sock";
const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;

fn main() {
    init_logging();

    let config = match config::load_config(None) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load config; using defaults");
            DaemonConfig::default()
        }
    };

    let socket_path = match daemon_socket_path() {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "Failed to resolve daemon socket path");
            std::process::exit(1);
        }
    };

    if let Err(err) = prepare_socket_dir(&socket_path) {
        error!(error = %err, "Failed to prepare daemon socket directory");
        std::process::exit(1);
    }

    if let Err(err) = remove_existing_socket(&socket_path) {
        error!(error = %err, path = %socket_path.display(), "Failed to remove existing socket");
        std::process::exit(1);
    }

    let listener = match UnixListener::bind(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, path = %socket_path.display(), "Failed to bind daemon socket");
            std::process::exit(1);
        }
    };

    info!(path = %socket_path.display(), "worklogd started");

    let db_path = match config.db_path.clone() {
        Some(path) => Ok(path),
        None => daemon_db_path(),
    };
    let db_path = match db_path {
        Ok(path) => path,
        Err(err) => {
            error!(error = %err, "Failed to resolve daemon database path");
            std::process::exit(1);
        }
    };

    let db = match Db::new(db_path) {
        Ok(db) => Arc::new(db),
        Err(err) => {
            error!(error = %err, "Failed to initialize daemon database");
            std::process::exit(1);
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.utc_offset));
    let auto_closer = AutoCloser::new(
        Arc::clone(&db),
        Arc::clone(&clock),
        config.auto_close.cutoff,
    );
    let sweep_stats = auto_closer.stats();
    let auto_close = if config.auto_close.enabled {
        info!(
            cutoff = %config.auto_close.cutoff.format("%H:%M"),
            poll_interval_secs = config.auto_close.poll_interval_secs,
            "Auto-close sweep enabled"
        );
        Some(auto_closer.spawn(Duration::from_secs(config.auto_close.poll_interval_secs)))
    } else {
        info!("Auto-close sweep disabled");
        None
    };

    let shared_state = Arc::new(SharedState::new(db, clock, config, sweep_stats));

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let state = Arc::clone(&shared_state);
                thread::spawn(|| handle_connection(stream, state));
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept daemon connection");
            }
        }
    }

    if let Some(handle) = auto_close {
        handle.stop();
    }
}

fn init_logging() {
    let debug_enabled = env::var("WORKLOG_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn daemon_socket_path() -> Result<PathBuf, String> {
    if let Ok(path) = env::var(SOCKET_ENV) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(".worklog").join(SOCKET_NAME))
}

fn daemon_db_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(".worklog").join("daemon").join("worklog.db"))
}

fn prepare_socket_dir(socket_path: &Path) -> Result<(), String> {
    let parent = socket_path
        .parent()
        .ok_or_else(|| "Socket path has no parent".to_string())?;
    fs::create_dir_all(parent).map_err(|err| format!("Failed to create socket directory: {}", err))
}

fn remove_existing_socket(socket_path: &Path) -> Result<(), String> {
    if socket_path.exists() {
        fs::remove_file(socket_path)
            .map_err(|err| format!("Failed to remove existing socket: {}", err))?;
    }
    Ok(())
}

fn handle_connection(mut stream: UnixStream, state: Arc<SharedState>) {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let response = Response::error_with_info(None, err);
            let _ = write_response(&mut stream, response);
            return;
        }
    };

    tracing::debug!(method = ?request.method, id = ?request.id, "Daemon request received");
    let response = handle_request(request, &state);
    let _ = write_response(&mut stream, response);
}

fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ErrorInfo::new(
                        "request_too_large",
                        "request exceeded maximum size",
                    ));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return Err(ErrorInfo::new("read_timeout", "request timed out"));
            }
            Err(err) => {
                return Err(ErrorInfo::new(
                    "read_error",
                    format!("failed to read request: {}", err),
                ));
            }
        }
    }

    let request_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => {
            if buffer[index + 1..].iter().any(|b| !b.is_ascii_whitespace()) {
                warn!("Extra bytes detected after newline; ignoring trailing data");
            }
            &buffer[..index]
        }
        None => buffer.as_slice(),
    };

    if request_bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    serde_json::from_slice(request_bytes).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })
}

fn handle_request(request: Request, state: &SharedState) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            "protocol_mismatch",
            "unsupported protocol version",
        );
    }

    let id = request.id;
    let params = request.params;
    match request.method {
        Method::GetHealth => respond(id, Ok::<_, ErrorInfo>(state.health())),
        Method::StartFromTask => with_params(id, params, |p: StartFromTaskParams| {
            state.start_from_task(p.worker_id, p.task_id)
        }),
        Method::ResumeSession => with_params(id, params, |p: ResumeSessionParams| {
            state.resume_session(p.worker_id, p.session_id)
        }),
        Method::EndSession => with_params(id, params, |p: EndSessionParams| {
            state.end_session(p.session_id, &p.comment)
        }),
        Method::ToggleWorkerActive => with_params(id, params, |p: WorkerIdParams| {
            state.toggle_worker_active(p.worker_id)
        }),
        Method::CreateWorker => {
            with_params(id, params, |p: CreateWorkerParams| state.create_worker(&p))
        }
        Method::CreateProject => {
            with_params(id, params, |p: CreateProjectParams| state.create_project(&p))
        }
        Method::CreateTask => with_params(id, params, |p: CreateTaskParams| state.create_task(&p)),
        Method::GetDailyTotal => {
            with_params(id, params, |p: DailyTotalParams| -> Result<_, ErrorInfo> {
                let day = p.day()?;
                Ok(state.daily_total(p.worker_id, day)?)
            })
        }
        Method::GetProjectDateMatrix => {
            with_params(id, params, |p: DateRangeParams| -> Result<_, ErrorInfo> {
                let (start, end) = p.range()?;
                Ok(state.project_date_matrix(start, end, p.filter())?)
            })
        }
        Method::GetPeriodReport => {
            with_params(id, params, |p: PeriodReportParams| -> Result<_, ErrorInfo> {
                let (start, end) = p.range()?;
                Ok(state.period_report(start, end, &p.worker)?)
            })
        }
        Method::GetDetailedReport => {
            // The detailed report accepts a missing params object as "everything".
            let params = params.or_else(|| Some(serde_json::json!({})));
            with_params(id, params, |p: DetailedReportParams| -> Result<_, ErrorInfo> {
                let range = p.range()?;
                Ok(state.detailed_report(range, p.filter())?)
            })
        }
        Method::GetTaskSummary => {
            with_params(id, params, |p: TaskSummaryParams| state.task_summary(p.task_id))
        }
        Method::GetProjectHours => with_params(id, params, |p: ProjectHoursParams| {
            state.project_hours(p.project_id)
        }),
        Method::GetDashboard => respond(id, state.dashboard()),
        Method::GetIdleWorkers => respond(id, state.idle_workers()),
    }
}

/// Parses and validates params, runs `op`, and wraps the outcome.
fn with_params<P, T, E>(
    id: Option<String>,
    params: Option<serde_json::Value>,
    op: impl FnOnce(P) -> Result<T, E>,
) -> Response
where
    P: DeserializeOwned + Validate,
    T: Serialize,
    E: Into<ErrorInfo>,
{
    let parsed = match parse_params::<P>(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(id, err),
    };
    respond(id, op(parsed))
}

fn respond<T, E>(id: Option<String>, result: Result<T, E>) -> Response
where
    T: Serialize,
    E: Into<ErrorInfo>,
{
    match result {
        Ok(data) => match serde_json::to_value(data) {
            Ok(value) => Response::ok(id, value),
            Err(err) => Response::error(
                id,
                "serialization_error",
                format!("Failed to serialize response: {}", err),
            ),
        },
        Err(err) => {
            let info: ErrorInfo = err.into();
            warn!(code = %info.code, message = %info.message, "Request failed");
            Response::error_with_info(id, info)
        }
    }
}

fn write_response(stream: &mut UnixStream, response: Response) -> Result<(), String> {
    let payload = serde_json::to_vec(&response)
        .map_err(|err| format!("Failed to serialize response: {}", err))?;
    stream
        .write_all(&payload)
        .map_err(|err| format!("Failed to write response: {}", err))?;
    stream
        .write_all(b"\n")
        .map_err(|err| format!("Failed to write response newline: {}", err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auto_close::SweepStats;
    use crate::clock::FixedClock;
    use serde_json::json;
    use std::sync::Mutex;

    fn state() -> (tempfile::TempDir, SharedState) {
        let dir = tempfile::tempdir().expect("temp dir");
        let db = Arc::new(Db::new(dir.path().join("worklog.db")).expect("db init"));
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::at("2025-03-03T08:30:00-05:00"));
        let state = SharedState::new(
            db,
            clock,
            DaemonConfig::default(),
            Arc::new(Mutex::new(SweepStats::default())),
        );
        (dir, state)
    }

    fn call(state: &SharedState, method: Method, params: Option<serde_json::Value>) -> Response {
        handle_request(Request::new(method, params), state)
    }

    #[test]
    fn rejects_protocol_mismatch() {
        let (_dir, state) = state();
        let mut request = Request::new(Method::GetHealth, None);
        request.protocol_version = 99;
        let response = handle_request(request, &state);
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().code, "protocol_mismatch");
    }

    #[test]
    fn lifecycle_errors_carry_domain_codes() {
        let (_dir, state) = state();
        let response = call(
            &state,
            Method::EndSession,
            Some(json!({"session_id": 5, "comment": "x"})),
        );
        assert_eq!(response.error.unwrap().code, "not_found");

        let response = call(&state, Method::StartFromTask, Some(json!({"worker_id": 1})));
        assert_eq!(response.error.unwrap().code, "invalid_params");
    }

    #[test]
    fn detailed_report_accepts_missing_params() {
        let (_dir, state) = state();
        let response = call(&state, Method::GetDetailedReport, None);
        assert!(response.ok);
        let data = response.data.unwrap();
        assert_eq!(data["rows"], json!([]));
        assert_eq!(data["total_decimal_hours"], json!(0.0));
    }

    #[test]
    fn create_then_start_round_trip() {
        let (_dir, state) = state();
        let worker = call(&state, Method::CreateWorker, Some(json!({"username": "ana"})));
        let worker_id = worker.data.unwrap()["id"].as_i64().unwrap();
        let task = call(&state, Method::CreateTask, Some(json!({"title": "Planos"})));
        let task_id = task.data.unwrap()["id"].as_i64().unwrap();

        let started = call(
            &state,
            Method::StartFromTask,
            Some(json!({"worker_id": worker_id, "task_id": task_id})),
        );
        assert!(started.ok);
        let session = started.data.unwrap();
        assert_eq!(session["ended_at"], serde_json::Value::Null);

        let total = call(
            &state,
            Method::GetDailyTotal,
            Some(json!({"worker_id": worker_id, "date": "2025-03-03"})),
        );
        assert_eq!(total.data.unwrap()["total"], json!("0:00"));
    }
}

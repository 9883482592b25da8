use chrono::Utc;
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use worklog_daemon_protocol::{Method, Request, Response, PROTOCOL_VERSION};

struct DaemonGuard {
    child: Child,
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn spawn_daemon(home: &Path, socket: &Path, config: &Path) -> Child {
    Command::new(env!("CARGO_BIN_EXE_worklogd"))
        .env("HOME", home)
        .env("WORKLOG_SOCKET", socket)
        .env("WORKLOG_CONFIG", config)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to spawn worklogd")
}

fn write_config(home: &Path) -> PathBuf {
    let path = home.join("config.toml");
    std::fs::write(
        &path,
        "[auto_close]\nenabled = false\n\n[time]\nutc_offset = \"+00:00\"\n",
    )
    .expect("write config");
    path
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if path.exists() {
            return;
        }
        sleep(Duration::from_millis(25));
    }
    panic!("Timed out waiting for daemon socket at {}", path.display());
}

fn send_request(socket: &Path, request: Request) -> Response {
    let mut stream = UnixStream::connect(socket).expect("Failed to connect to daemon socket");
    serde_json::to_writer(&mut stream, &request).expect("Failed to serialize request");
    stream.write_all(b"\n").expect("Failed to write request");
    stream.flush().ok();
    read_response(&mut stream)
}

fn read_response(stream: &mut UnixStream) -> Response {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).expect("Failed to read response");
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if chunk[..n].contains(&b'\n') {
            break;
        }
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let response_bytes = match newline_index {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    serde_json::from_slice(response_bytes).expect("Failed to parse response JSON")
}

fn call(socket: &Path, method: Method, id: &str, params: Option<Value>) -> Response {
    send_request(
        socket,
        Request {
            protocol_version: PROTOCOL_VERSION,
            method,
            id: Some(id.to_string()),
            params,
        },
    )
}

fn data_i64(response: &Response, key: &str) -> i64 {
    response
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .and_then(|value| value.as_i64())
        .unwrap_or_else(|| panic!("missing {} in {:?}", key, response.data))
}

fn data_str<'a>(response: &'a Response, key: &str) -> Option<&'a str> {
    response
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .and_then(|value| value.as_str())
}

#[test]
fn daemon_ipc_session_round_trip_smoke() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    let socket = home.path().join("worklog.sock");
    let config = write_config(home.path());
    let child = spawn_daemon(home.path(), &socket, &config);
    let _guard = DaemonGuard { child };

    wait_for_socket(&socket, Duration::from_secs(5));

    let health = call(&socket, Method::GetHealth, "health-check", None);
    assert!(health.ok, "health response was not ok");
    assert_eq!(health.id.as_deref(), Some("health-check"));
    assert_eq!(data_str(&health, "status"), Some("ok"));
    let auto_close_enabled = health
        .data
        .as_ref()
        .and_then(|data| data.pointer("/auto_close/enabled"))
        .and_then(|value| value.as_bool());
    assert_eq!(auto_close_enabled, Some(false));

    let worker = call(
        &socket,
        Method::CreateWorker,
        "worker",
        Some(json!({ "username": "ana", "area": "diseño" })),
    );
    assert!(worker.ok, "create_worker failed: {:?}", worker.error);
    let worker_id = data_i64(&worker, "id");

    let project = call(
        &socket,
        Method::CreateProject,
        "project",
        Some(json!({ "id": 1042, "name": "Torre Norte", "color": "#336699" })),
    );
    assert!(project.ok, "create_project failed: {:?}", project.error);

    let task = call(
        &socket,
        Method::CreateTask,
        "task",
        Some(json!({
            "title": "Planos",
            "project_id": 1042,
            "worker_id": worker_id,
            "duration": "02:00"
        })),
    );
    assert!(task.ok, "create_task failed: {:?}", task.error);
    let task_id = data_i64(&task, "id");

    let started = call(
        &socket,
        Method::StartFromTask,
        "start",
        Some(json!({ "worker_id": worker_id, "task_id": task_id })),
    );
    assert!(started.ok, "start_from_task failed: {:?}", started.error);
    let session_id = data_i64(&started, "id");
    assert_eq!(data_str(&started, "ended_at"), None);

    let dashboard = call(&socket, Method::GetDashboard, "dashboard", None);
    assert!(dashboard.ok, "dashboard failed: {:?}", dashboard.error);
    let entries = dashboard
        .data
        .as_ref()
        .and_then(|data| data.as_array())
        .expect("dashboard payload is array");
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].get("in_activity").and_then(|value| value.as_bool()),
        Some(true)
    );

    let ended = call(
        &socket,
        Method::EndSession,
        "end",
        Some(json!({ "session_id": session_id, "comment": "listo" })),
    );
    assert!(ended.ok, "end_session failed: {:?}", ended.error);
    assert!(data_str(&ended, "ended_at").is_some());
    assert_eq!(data_str(&ended, "comment"), Some("listo"));

    let idle = call(&socket, Method::GetIdleWorkers, "idle", None);
    assert!(idle.ok, "idle workers failed: {:?}", idle.error);
    assert_eq!(
        data_str(&idle, "message"),
        Some("The following workers have not logged activity: ana")
    );

    let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
    let total = call(
        &socket,
        Method::GetDailyTotal,
        "daily-total",
        Some(json!({ "worker_id": worker_id, "date": today })),
    );
    assert!(total.ok, "daily total failed: {:?}", total.error);
    let total_value = data_str(&total, "total").expect("total");
    assert!(total_value.contains(':'), "unexpected total {}", total_value);

    let missing = call(
        &socket,
        Method::StartFromTask,
        "missing",
        Some(json!({ "worker_id": worker_id, "task_id": 9999 })),
    );
    assert!(!missing.ok);
    assert_eq!(
        missing.error.as_ref().map(|error| error.code.as_str()),
        Some("not_found")
    );
}

#[test]
fn daemon_rejects_malformed_requests() {
    let home = TempDir::new().expect("Failed to create temp HOME");
    let socket = home.path().join("worklog.sock");
    let config = write_config(home.path());
    let child = spawn_daemon(home.path(), &socket, &config);
    let _guard = DaemonGuard { child };

    wait_for_socket(&socket, Duration::from_secs(5));

    let mut stream = UnixStream::connect(&socket).expect("connect");
    stream.write_all(b"{not json}\n").expect("write");
    stream.flush().ok();
    let response = read_response(&mut stream);
    assert!(!response.ok);
    assert_eq!(
        response.error.as_ref().map(|error| error.code.as_str()),
        Some("invalid_json")
    );

    let bad_params = call(
        &socket,
        Method::CreateTask,
        "bad-duration",
        Some(json!({ "title": "Planos", "duration": "ninety" })),
    );
    assert!(!bad_params.ok);
    assert_eq!(
        bad_params.error.as_ref().map(|error| error.code.as_str()),
        Some("validation_error")
    );
}

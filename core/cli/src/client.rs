//! Socket client for the worklog daemon.
//!
//! One request per connection, newline-terminated JSON both ways. The daemon
//! is the only writer; the CLI never touches the database.

use serde_json::Value;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use worklog_daemon_protocol::{Method, Request, Response, MAX_REQUEST_BYTES};

pub const SOCKET_ENV: &str = "WORKLOG_SOCKET";
const SOCKET_DIR: &str = ".worklog";
const SOCKET_NAME: &str = "daemon.sock";
const READ_TIMEOUT_MS: u64 = 10_000;
const WRITE_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Home directory not found")]
    NoHome,

    #[error("Failed to connect to daemon socket {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Transport(String),

    #[error("{code}: {message}")]
    Daemon { code: String, message: String },
}

pub fn socket_path() -> Result<PathBuf, ClientError> {
    if let Ok(path) = env::var(SOCKET_ENV) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or(ClientError::NoHome)?;
    Ok(home.join(SOCKET_DIR).join(SOCKET_NAME))
}

pub struct DaemonClient {
    socket: PathBuf,
}

impl DaemonClient {
    pub fn new(socket: PathBuf) -> Self {
        Self { socket }
    }

    /// Sends one request and returns the `data` payload of a successful response.
    pub fn call(&self, method: Method, params: Option<Value>) -> Result<Value, ClientError> {
        let request = Request::new(method, params);
        tracing::debug!(?method, socket = %self.socket.display(), "Sending daemon request");

        let response = self.send_request(&request)?;
        if response.ok {
            return Ok(response.data.unwrap_or(Value::Null));
        }
        Err(match response.error {
            Some(error) => ClientError::Daemon {
                code: error.code,
                message: error.message,
            },
            None => ClientError::Transport("Unknown daemon error".to_string()),
        })
    }

    fn send_request(&self, request: &Request) -> Result<Response, ClientError> {
        let mut stream =
            UnixStream::connect(&self.socket).map_err(|source| ClientError::Connect {
                path: self.socket.clone(),
                source,
            })?;
        let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
        let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

        serde_json::to_writer(&mut stream, request)
            .map_err(|err| ClientError::Transport(format!("Failed to write request: {}", err)))?;
        stream
            .write_all(b"\n")
            .map_err(|err| ClientError::Transport(format!("Failed to flush request: {}", err)))?;
        stream.flush().ok();

        read_response(&mut stream)
    }
}

fn read_response(stream: &mut UnixStream) -> Result<Response, ClientError> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if chunk[..n].contains(&b'\n') {
                    break;
                }
                // Reports can outgrow a request; only guard against runaway peers.
                if buffer.len() > MAX_REQUEST_BYTES * 64 {
                    return Err(ClientError::Transport(
                        "Response exceeded maximum size".to_string(),
                    ));
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return Err(ClientError::Transport(
                    "Timed out waiting for daemon response".to_string(),
                ));
            }
            Err(err) => {
                return Err(ClientError::Transport(format!(
                    "Failed to read response: {}",
                    err
                )))
            }
        }
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let response_bytes = match newline_index {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if response_bytes.is_empty() {
        return Err(ClientError::Transport(
            "Daemon response was empty".to_string(),
        ));
    }

    serde_json::from_slice(response_bytes)
        .map_err(|err| ClientError::Transport(format!("Failed to parse response JSON: {}", err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;
    use std::thread::{self, JoinHandle};

    fn read_request(stream: &mut UnixStream) -> Request {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..n]);
            if buffer.contains(&b'\n') {
                break;
            }
        }
        let end = buffer.iter().position(|b| *b == b'\n').unwrap_or(buffer.len());
        serde_json::from_slice(&buffer[..end]).unwrap()
    }

    /// Answers a single connection with `reply` and hands back the request it saw.
    fn serve_once(listener: UnixListener, reply: Vec<u8>) -> JoinHandle<Request> {
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            stream.write_all(&reply).unwrap();
            request
        })
    }

    fn encode(response: &Response) -> Vec<u8> {
        let mut payload = serde_json::to_vec(response).unwrap();
        payload.push(b'\n');
        payload
    }

    #[test]
    fn call_returns_data_payload() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("daemon.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let server = serve_once(
            listener,
            encode(&Response::ok(None, serde_json::json!({"status": "ok"}))),
        );

        let client = DaemonClient::new(socket);
        let data = client
            .call(
                Method::GetDailyTotal,
                Some(serde_json::json!({"worker_id": 1, "date": "2025-03-03"})),
            )
            .unwrap();
        assert_eq!(data["status"], "ok");

        let request = server.join().unwrap();
        assert_eq!(request.method, Method::GetDailyTotal);
        assert_eq!(request.params.unwrap()["worker_id"], 1);
    }

    #[test]
    fn daemon_errors_keep_their_code() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("daemon.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let server = serve_once(
            listener,
            encode(&Response::error(None, "not_found", "task 9 not found")),
        );

        let err = DaemonClient::new(socket)
            .call(Method::GetTaskSummary, Some(serde_json::json!({"task_id": 9})))
            .unwrap_err();
        server.join().unwrap();

        match err {
            ClientError::Daemon { code, message } => {
                assert_eq!(code, "not_found");
                assert_eq!(message, "task 9 not found");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn empty_reply_is_a_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("daemon.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let server = serve_once(listener, Vec::new());

        let err = DaemonClient::new(socket)
            .call(Method::GetHealth, None)
            .unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, ClientError::Transport(_)), "{:?}", err);
    }

    #[test]
    fn missing_socket_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("absent.sock");
        let err = DaemonClient::new(socket.clone())
            .call(Method::GetHealth, None)
            .unwrap_err();
        match err {
            ClientError::Connect { path, .. } => assert_eq!(path, socket),
            other => panic!("unexpected error {:?}", other),
        }
    }
}

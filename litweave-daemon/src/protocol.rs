use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use litweave_core::{JobRequest, SocketEndpoint};
use litweave_session::RunReport;

use crate::error::{io_err, DaemonError};
use crate::table::Checkout;

/// JSON newline-delimited request. One request per connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum DaemonRequest {
    /// Weave and/or tangle one document; the job fields sit beside `cmd`.
    Run(JobRequest),
    Status,
    Ping,
    Stop,
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// `data` of a successful `run` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// How the daemon obtained the session that served the job.
    pub session: Checkout,
    pub report: RunReport,
}

/// Send one JSON request to the daemon and return its one response.
pub fn send_request(
    endpoint: &SocketEndpoint,
    request: &DaemonRequest,
) -> Result<DaemonResponse, DaemonError> {
    let label = PathBuf::from(endpoint.to_string());
    let not_running = |err: std::io::Error| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::DaemonNotRunning {
                endpoint: endpoint.to_string(),
            }
        } else {
            io_err(&label, err)
        }
    };

    match endpoint {
        SocketEndpoint::Unix { path } => {
            if !path.exists() {
                return Err(DaemonError::DaemonNotRunning {
                    endpoint: endpoint.to_string(),
                });
            }
            let stream = UnixStream::connect(path).map_err(not_running)?;
            exchange(stream, &label, request)
        }
        SocketEndpoint::Tcp { host, port } => {
            let stream = TcpStream::connect((host.as_str(), *port)).map_err(not_running)?;
            exchange(stream, &label, request)
        }
    }
}

fn exchange<S: Read + Write>(
    mut stream: S,
    label: &Path,
    request: &DaemonRequest,
) -> Result<DaemonResponse, DaemonError> {
    let payload = serde_json::to_string(request)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(label, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(label, e))?;
    stream.flush().map_err(|e| io_err(label, e))?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| io_err(label, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(
            "daemon closed connection before responding".to_string(),
        ));
    }

    let response: DaemonResponse = serde_json::from_str(line.trim_end())?;
    Ok(response)
}

pub fn request_run(endpoint: &SocketEndpoint, job: JobRequest) -> Result<RunOutcome, DaemonError> {
    let response = send_request(endpoint, &DaemonRequest::Run(job))?;
    let data = response_into_data(response)?;
    Ok(serde_json::from_value(data)?)
}

/// `status`, retried briefly so a daemon that is still binding can answer.
pub fn request_status(endpoint: &SocketEndpoint) -> Result<Value, DaemonError> {
    let mut last_not_running: Option<DaemonError> = None;
    for attempt in 0..5 {
        match send_request(endpoint, &DaemonRequest::Status) {
            Ok(response) => return response_into_data(response),
            Err(err @ DaemonError::DaemonNotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt < 4 {
                    sleep(Duration::from_millis(100));
                    continue;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or_else(|| {
        DaemonError::Protocol("daemon status retry loop exited unexpectedly".to_string())
    }))
}

pub fn request_ping(endpoint: &SocketEndpoint) -> Result<Value, DaemonError> {
    let response = send_request(endpoint, &DaemonRequest::Ping)?;
    response_into_data(response)
}

pub fn request_stop(endpoint: &SocketEndpoint) -> Result<(), DaemonError> {
    let response = send_request(endpoint, &DaemonRequest::Stop)?;
    response_into_data(response).map(|_| ())
}

fn response_into_data(response: DaemonResponse) -> Result<Value, DaemonError> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(DaemonError::Remote(
            response
                .error
                .unwrap_or_else(|| "unknown daemon error".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_request_flattens_the_job_beside_cmd() {
        let mut job = JobRequest::new("doc.lit");
        job.weave_output = Some(PathBuf::from("doc.rst"));
        job.rebuild = true;
        let value = serde_json::to_value(DaemonRequest::Run(job.clone())).unwrap();
        assert_eq!(value["cmd"], "run");
        assert_eq!(value["input"], "doc.lit");
        assert_eq!(value["woutput"], "doc.rst");
        assert_eq!(value["rebuild"], true);

        let back: DaemonRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back, DaemonRequest::Run(job));
    }

    #[test]
    fn minimal_run_request_uses_defaults() {
        let request: DaemonRequest =
            serde_json::from_value(json!({"cmd": "run", "input": "a.lit"})).unwrap();
        assert_eq!(request, DaemonRequest::Run(JobRequest::new("a.lit")));
    }

    #[test]
    fn bare_commands_parse() {
        for (text, expected) in [
            ("status", DaemonRequest::Status),
            ("ping", DaemonRequest::Ping),
            ("stop", DaemonRequest::Stop),
        ] {
            let request: DaemonRequest = serde_json::from_value(json!({ "cmd": text })).unwrap();
            assert_eq!(request, expected);
        }
        assert!(serde_json::from_value::<DaemonRequest>(json!({"cmd": "sync"})).is_err());
    }

    #[test]
    fn error_response_becomes_remote_error() {
        let err = response_into_data(DaemonResponse::error("boom")).unwrap_err();
        assert!(matches!(err, DaemonError::Remote(ref m) if m == "boom"));
        assert_eq!(
            response_into_data(DaemonResponse::ok(json!({"a": 1}))).unwrap(),
            json!({"a": 1})
        );
    }

    #[test]
    fn missing_socket_means_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = SocketEndpoint::unix(dir.path().join("absent.sock"));
        let err = send_request(&endpoint, &DaemonRequest::Ping).unwrap_err();
        assert!(matches!(err, DaemonError::DaemonNotRunning { .. }));
    }
}

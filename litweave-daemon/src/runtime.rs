use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};
use tokio::sync::broadcast;

use litweave_core::{Config, JobRequest, PluginRegistry, SocketEndpoint};

use crate::error::{io_err, DaemonError};
use crate::protocol::{DaemonRequest, DaemonResponse, RunOutcome};
use crate::table::SessionTable;

/// Everything the daemon needs besides its plugin registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSettings {
    pub endpoint: SocketEndpoint,
    /// Upper bound on one job; `None` lets jobs run as long as they need.
    pub timeout: Option<Duration>,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl DaemonSettings {
    pub fn from_config_at(config: &Config, home: &Path) -> Self {
        Self {
            endpoint: config.endpoint_at(home),
            timeout: config.timeout_secs.map(Duration::from_secs),
            log_level: config.log_level.clone(),
        }
    }
}

struct DaemonState {
    table: SessionTable,
    registry: Arc<PluginRegistry>,
    timeout: Option<Duration>,
    endpoint: SocketEndpoint,
    started_at: DateTime<Utc>,
    shutdown: broadcast::Sender<()>,
}

impl DaemonState {
    fn new(
        registry: Arc<PluginRegistry>,
        timeout: Option<Duration>,
        endpoint: SocketEndpoint,
    ) -> Self {
        let (shutdown, _) = broadcast::channel::<()>(16);
        Self {
            table: SessionTable::new(),
            registry,
            timeout,
            endpoint,
            started_at: Utc::now(),
            shutdown,
        }
    }
}

enum Listener {
    Unix { listener: UnixListener, path: PathBuf },
    Tcp(TcpListener),
}

enum Accepted {
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl Listener {
    async fn accept(&self) -> std::io::Result<Accepted> {
        match self {
            Listener::Unix { listener, .. } => {
                listener.accept().await.map(|(s, _)| Accepted::Unix(s))
            }
            Listener::Tcp(listener) => listener.accept().await.map(|(s, _)| Accepted::Tcp(s)),
        }
    }
}

/// A bound daemon that has not started accepting yet.
pub struct Daemon {
    listener: Listener,
    state: Arc<DaemonState>,
}

impl Daemon {
    /// Bind the endpoint. A stale unix socket is replaced; one that still
    /// answers is an error.
    pub async fn bind(
        settings: &DaemonSettings,
        registry: Arc<PluginRegistry>,
    ) -> Result<Self, DaemonError> {
        let (listener, endpoint) = match &settings.endpoint {
            SocketEndpoint::Unix { path } => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    if !parent.exists() {
                        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
                    }
                }
                prepare_socket_for_bind(path)?;
                let listener = UnixListener::bind(path).map_err(|e| io_err(path, e))?;
                set_socket_permissions(path)?;
                (
                    Listener::Unix {
                        listener,
                        path: path.clone(),
                    },
                    settings.endpoint.clone(),
                )
            }
            SocketEndpoint::Tcp { host, port } => {
                let label = settings.endpoint.to_string();
                let listener = TcpListener::bind((host.as_str(), *port))
                    .await
                    .map_err(|e| io_err(&label, e))?;
                let bound = listener.local_addr().map_err(|e| io_err(&label, e))?;
                (
                    Listener::Tcp(listener),
                    SocketEndpoint::tcp(host.clone(), bound.port()),
                )
            }
        };

        Ok(Self {
            listener,
            state: Arc::new(DaemonState::new(registry, settings.timeout, endpoint)),
        })
    }

    /// The endpoint clients should connect to; for `tcp://host:0` this
    /// carries the port actually bound.
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.state.endpoint
    }

    /// Sending on this stops `serve`.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.state.shutdown.clone()
    }

    /// Accept clients until a `stop` request or the shutdown handle fires.
    pub async fn serve(self) -> Result<(), DaemonError> {
        let mut shutdown_rx = self.state.shutdown.subscribe();
        tracing::info!(endpoint = %self.state.endpoint, "daemon listening");

        let served = loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break Ok(()),
                accepted = self.listener.accept() => match accepted {
                    Ok(Accepted::Unix(stream)) => spawn_client(stream, Arc::clone(&self.state)),
                    Ok(Accepted::Tcp(stream)) => spawn_client(stream, Arc::clone(&self.state)),
                    Err(err) => break Err(io_err(self.state.endpoint.to_string(), err)),
                },
            }
        };

        if let Listener::Unix { path, .. } = &self.listener {
            if path.exists() {
                let _ = fs::remove_file(path);
            }
        }
        tracing::info!("daemon stopped");
        served
    }
}

/// Start the daemon with the built-in plugins and block the current thread
/// until it exits.
pub fn start_blocking(settings: DaemonSettings) -> Result<(), DaemonError> {
    init_tracing(&settings.log_level);
    let registry = Arc::new(litweave_renderer::builtin_registry()?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(settings, registry))
}

/// Run the daemon until `stop` or ctrl-c.
pub async fn run(settings: DaemonSettings, registry: Arc<PluginRegistry>) -> Result<(), DaemonError> {
    let daemon = Daemon::bind(&settings, registry).await?;
    let shutdown = daemon.shutdown_handle();

    let signal_handle = {
        let shutdown = shutdown.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let served = daemon.serve().await;
    let _ = shutdown.send(());
    handle_join("signal_handler", signal_handle.await)?;
    served
}

fn spawn_client<S>(stream: S, state: Arc<DaemonState>)
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = handle_client(stream, state).await {
            tracing::error!(error = %err, "socket client error");
        }
    });
}

/// One request line in, one response line out.
async fn handle_client<S>(stream: S, state: Arc<DaemonState>) -> Result<(), DaemonError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();

    let line = loop {
        match lines
            .next_line()
            .await
            .map_err(|e| io_err("daemon socket read", e))?
        {
            Some(line) if line.trim().is_empty() => continue,
            Some(line) => break line,
            None => return Ok(()),
        }
    };

    let response = match serde_json::from_str::<DaemonRequest>(line.trim()) {
        Ok(request) => dispatch(request, &state).await,
        Err(err) => DaemonResponse::error(format!("invalid request JSON: {err}")),
    };
    write_response(&mut writer, &response).await
}

async fn dispatch(request: DaemonRequest, state: &DaemonState) -> DaemonResponse {
    match request {
        DaemonRequest::Run(job) => match run_job(state, job).await {
            Ok(outcome) => match serde_json::to_value(outcome) {
                Ok(data) => DaemonResponse::ok(data),
                Err(err) => DaemonResponse::error(err.to_string()),
            },
            Err(err) => DaemonResponse::error(err.to_string()),
        },
        DaemonRequest::Status => match build_status_payload(state).await {
            Ok(payload) => DaemonResponse::ok(payload),
            Err(err) => DaemonResponse::error(err.to_string()),
        },
        DaemonRequest::Ping => DaemonResponse::ok(json!({
            "pong": true,
            "version": env!("CARGO_PKG_VERSION"),
        })),
        DaemonRequest::Stop => {
            let _ = state.shutdown.send(());
            DaemonResponse::ok(json!({ "stopping": true }))
        }
    }
}

/// Serve `job` from its project's session on a blocking worker.
///
/// The project gate is taken before the session is checked out and moves
/// into the worker, so the next run for the project starts only after this
/// one has returned, even when the request gave up on it. A failed,
/// panicked or timed-out job discards its session so the next request for
/// the project starts clean.
async fn run_job(state: &DaemonState, job: JobRequest) -> Result<RunOutcome, DaemonError> {
    let key = job.project_key();
    let permit = state.table.gate(&key).await.lock_owned().await;
    let (session, checkout) = state.table.checkout(&job, &state.registry).await?;
    tracing::info!(
        project = %key,
        session = ?checkout,
        operation = ?job.operation,
        "running job"
    );

    let guard = Arc::clone(&session).lock_owned().await;
    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let mut session = guard;
        session.run(&job)
    });

    let joined = match state.timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                state.table.evict(&key, &session).await;
                tracing::warn!(
                    project = %key,
                    "job timed out, session discarded; project stays locked until its worker returns"
                );
                return Err(DaemonError::Timeout {
                    millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                });
            }
        },
        None => task.await,
    };

    match joined {
        Ok(Ok(report)) => {
            tracing::info!(
                project = %key,
                reprocessed = report.reprocessed,
                skipped = report.skipped,
                duration_ms = report.duration_ms,
                "job finished"
            );
            Ok(RunOutcome {
                session: checkout,
                report,
            })
        }
        Ok(Err(err)) => {
            state.table.evict(&key, &session).await;
            tracing::error!(project = %key, error = %err, "job failed, session discarded");
            Err(err.into())
        }
        Err(err) => {
            state.table.evict(&key, &session).await;
            Err(DaemonError::Protocol(format!("job task join failure: {err}")))
        }
    }
}

async fn build_status_payload(state: &DaemonState) -> Result<Value, DaemonError> {
    let sessions = serde_json::to_value(state.table.statuses().await)?;
    let plugins: Vec<Value> = state
        .registry
        .descriptors()
        .into_iter()
        .map(|d| json!({ "name": d.name, "kind": d.kind }))
        .collect();
    let uptime = (Utc::now() - state.started_at).num_seconds().max(0);
    Ok(json!({
        "running": true,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoint": state.endpoint.to_string(),
        "started_at": state.started_at.to_rfc3339(),
        "uptime_secs": uptime,
        "sessions": sessions,
        "plugins": plugins,
    }))
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_response<W>(writer: &mut W, response: &DaemonResponse) -> Result<(), DaemonError>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

//! Bridge child process: spawn, newline-delimited JSON over stdio, and
//! request/result correlation.
//!
//! A reader task owns stdout for the life of the child.  It forwards QR and
//! status lines to the session's event sink, resolves the one-shot startup
//! signal on `ready`/`error`, and completes pending requests by id.  When
//! stdout closes every waiter is released with [`DriverError::Exited`] and
//! the event sink is dropped, which ends the session's event stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::sync::oneshot;

use wg_domain::config::DriverConfig;
use wg_sessions::driver::PROFILE_IN_USE_MARKER;
use wg_sessions::{DriverError, DriverEvent, EventSink};

use crate::protocol::{BridgeCommand, BridgeEvent};

/// Environment variable carrying the session name into the child.
pub const SESSION_ENV: &str = "WG_SESSION";

/// Maximum number of non-protocol lines to skip before declaring the
/// bridge broken.
const MAX_SKIP_LINES: usize = 1000;

type Reply = oneshot::Sender<Result<(), DriverError>>;

/// Resolves once the child reports `ready` or fails before it.
pub type Startup = oneshot::Receiver<Result<(), DriverError>>;

struct Shared {
    session: String,
    pending: Mutex<HashMap<u64, Reply>>,
    alive: AtomicBool,
}

/// One spawned bridge process hosting one session.
///
/// The child is killed when this value is dropped.
pub struct BridgeProcess {
    shared: Arc<Shared>,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    child: tokio::sync::Mutex<Child>,
    next_id: AtomicU64,
    request_timeout: Duration,
    shutdown_grace: Duration,
}

fn broken_pipe(stream: &str) -> DriverError {
    DriverError::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("failed to capture child {stream}"),
    ))
}

impl BridgeProcess {
    /// Spawn the configured command for `session` and start its reader.
    pub fn spawn(
        config: &DriverConfig,
        session: &str,
        events: EventSink,
    ) -> Result<(Self, Startup), DriverError> {
        let mut cmd = tokio::process::Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        cmd.env(SESSION_ENV, session);

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take().ok_or_else(|| broken_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| broken_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| broken_pipe("stderr"))?;

        tracing::debug!(session = %session, pid = ?child.id(), command = %config.command, "bridge process spawned");

        let shared = Arc::new(Shared {
            session: session.to_owned(),
            pending: Mutex::new(HashMap::new()),
            alive: AtomicBool::new(true),
        });

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(read_stdout(
            Arc::clone(&shared),
            BufReader::new(stdout),
            events,
            ready_tx,
        ));
        tokio::spawn(forward_stderr(session.to_owned(), BufReader::new(stderr)));

        let process = Self {
            shared,
            stdin: tokio::sync::Mutex::new(Some(stdin)),
            child: tokio::sync::Mutex::new(child),
            next_id: AtomicU64::new(1),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            shutdown_grace: Duration::from_millis(config.shutdown_grace_ms),
        };
        Ok((process, ready_rx))
    }

    pub fn session(&self) -> &str {
        &self.shared.session
    }

    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::SeqCst)
    }

    /// Write one command line to stdin.
    pub async fn write(&self, command: &BridgeCommand) -> Result<(), DriverError> {
        if !self.is_alive() {
            return Err(DriverError::Exited);
        }
        let json = serde_json::to_string(command)
            .map_err(|e| DriverError::Failed(format!("failed to encode bridge command: {e}")))?;

        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(DriverError::Exited)?;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Send a command carrying a fresh id and wait for its `result` line.
    pub async fn request(
        &self,
        build: impl FnOnce(u64) -> BridgeCommand + Send,
    ) -> Result<(), DriverError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().insert(id, tx);

        if let Err(e) = self.write(&build(id)).await {
            self.shared.pending.lock().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(DriverError::Exited),
            Err(_) => {
                self.shared.pending.lock().remove(&id);
                tracing::warn!(session = %self.shared.session, id, "bridge request timed out");
                Err(DriverError::Timeout)
            }
        }
    }

    /// Close stdin, give the child `shutdown_grace` to exit, then kill it.
    pub async fn shutdown(&self) {
        self.shared.alive.store(false, Ordering::SeqCst);
        if let Some(mut stdin) = self.stdin.lock().await.take() {
            if let Err(e) = stdin.shutdown().await {
                tracing::debug!(session = %self.shared.session, error = %e, "error closing bridge stdin");
            }
        }

        let mut child = self.child.lock().await;
        match tokio::time::timeout(self.shutdown_grace, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(session = %self.shared.session, ?status, "bridge process exited");
            }
            Ok(Err(e)) => {
                tracing::warn!(session = %self.shared.session, error = %e, "error waiting for bridge process");
            }
            Err(_) => {
                tracing::warn!(session = %self.shared.session, "bridge process did not exit in time, killing");
                if let Err(e) = child.kill().await {
                    tracing::warn!(session = %self.shared.session, error = %e, "failed to kill bridge process");
                }
            }
        }
    }
}

/// Map a creation error line onto a driver error.
fn classify(message: String) -> DriverError {
    if message.contains(PROFILE_IN_USE_MARKER) {
        DriverError::ProfileInUse(message)
    } else {
        DriverError::Failed(message)
    }
}

async fn read_stdout(
    shared: Arc<Shared>,
    mut stdout: BufReader<ChildStdout>,
    events: EventSink,
    ready: oneshot::Sender<Result<(), DriverError>>,
) {
    let mut ready = Some(ready);
    let mut skipped = 0usize;
    let mut line = String::new();

    let closed = loop {
        line.clear();
        match stdout.read_line(&mut line).await {
            Ok(0) => break DriverError::Exited,
            Ok(_) => {}
            Err(e) => break DriverError::Io(e),
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event = match serde_json::from_str::<BridgeEvent>(trimmed) {
            Ok(event) => event,
            Err(e) => {
                skipped += 1;
                if skipped >= MAX_SKIP_LINES {
                    break DriverError::Failed(
                        "bridge produced too many non-protocol lines on stdout".into(),
                    );
                }
                tracing::debug!(session = %shared.session, line = %trimmed, error = %e, "skipping non-protocol line from bridge stdout");
                continue;
            }
        };

        match event {
            BridgeEvent::Qr { base64, ascii } => {
                let _ = events.send(DriverEvent::Qr { base64, ascii });
            }
            BridgeEvent::Status { status } => {
                let _ = events.send(DriverEvent::Status(status));
            }
            BridgeEvent::Ready => match ready.take() {
                Some(tx) => {
                    let _ = tx.send(Ok(()));
                }
                None => tracing::debug!(session = %shared.session, "ignoring repeated ready"),
            },
            BridgeEvent::Error { message } => match ready.take() {
                Some(tx) => {
                    let _ = tx.send(Err(classify(message)));
                }
                None => tracing::warn!(session = %shared.session, %message, "bridge reported an error after ready"),
            },
            BridgeEvent::Result { id, ok, error } => {
                let waiter = shared.pending.lock().remove(&id);
                match waiter {
                    Some(tx) => {
                        let outcome = if ok {
                            Ok(())
                        } else {
                            Err(DriverError::Failed(
                                error.unwrap_or_else(|| "bridge reported a failure".into()),
                            ))
                        };
                        let _ = tx.send(outcome);
                    }
                    None => tracing::debug!(session = %shared.session, id, "result for unknown or expired request"),
                }
            }
        }
    };

    shared.alive.store(false, Ordering::SeqCst);
    match ready.take() {
        Some(tx) => {
            let _ = tx.send(Err(closed));
        }
        None => tracing::debug!(session = %shared.session, reason = %closed, "bridge stdout closed"),
    }
    // Dropping the senders releases every waiter with `Exited`.
    shared.pending.lock().clear();
}

async fn forward_stderr(session: String, stderr: BufReader<ChildStderr>) {
    let mut lines = stderr.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(session = %session, line = %line, "bridge stderr");
    }
}

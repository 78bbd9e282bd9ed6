//! In-memory scripted driver for tests.
//!
//! Each call to `create` for a session name consumes the next [`Script`]
//! queued for that name.  A script lists the events emitted before the
//! driver resolves, how it resolves, and events emitted afterwards from a
//! background task.  The event stream stays open until the handle logs out
//! or is dropped, or until a [`Script::close`] step ends it early, the way
//! a crashed browser would.
//!
//! Built for this crate's tests and behind the `testing` feature.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::driver::{CreateRequest, Driver, DriverError, DriverEvent, DriverHandle, EventSink};

#[derive(Debug, Clone)]
enum Step {
    Emit(DriverEvent),
    Sleep(Duration),
    Wait(Arc<Notify>),
    Close,
}

#[derive(Debug, Clone)]
enum Finish {
    Ready,
    Fail(String),
    ProfileInUse(String),
    Hang,
}

/// Behaviour of one driver `create` call.
#[derive(Debug, Clone)]
pub struct Script {
    before: Vec<Step>,
    finish: Finish,
    after: Vec<Step>,
    send_error: Option<String>,
    logout_error: Option<String>,
}

impl Default for Script {
    fn default() -> Self {
        Self::new()
    }
}

impl Script {
    /// An empty script that never resolves until a finish is chosen.
    pub fn new() -> Self {
        Self {
            before: Vec::new(),
            finish: Finish::Hang,
            after: Vec::new(),
            send_error: None,
            logout_error: None,
        }
    }

    fn push(mut self, step: Step) -> Self {
        match self.finish {
            Finish::Ready => self.after.push(step),
            _ => self.before.push(step),
        }
        self
    }

    pub fn qr(self, base64: &str) -> Self {
        self.push(Step::Emit(DriverEvent::Qr {
            base64: base64.to_owned(),
            ascii: format!("[ascii:{base64}]"),
        }))
    }

    pub fn status(self, native: &str) -> Self {
        self.push(Step::Emit(DriverEvent::Status(native.to_owned())))
    }

    pub fn sleep(self, duration: Duration) -> Self {
        self.push(Step::Sleep(duration))
    }

    /// Pause until `gate` is notified.
    pub fn wait(self, gate: Arc<Notify>) -> Self {
        self.push(Step::Wait(gate))
    }

    /// End the event stream.
    pub fn close(self) -> Self {
        self.push(Step::Close)
    }

    /// Resolve with a handle.  Steps added afterwards run in the background.
    pub fn ready(mut self) -> Self {
        self.finish = Finish::Ready;
        self
    }

    pub fn fail(mut self, message: &str) -> Self {
        self.finish = Finish::Fail(message.to_owned());
        self
    }

    pub fn profile_in_use(mut self, message: &str) -> Self {
        self.finish = Finish::ProfileInUse(message.to_owned());
        self
    }

    /// Never resolve.
    pub fn hang(mut self) -> Self {
        self.finish = Finish::Hang;
        self
    }

    pub fn send_error(mut self, message: &str) -> Self {
        self.send_error = Some(message.to_owned());
        self
    }

    pub fn logout_error(mut self, message: &str) -> Self {
        self.logout_error = Some(message.to_owned());
        self
    }
}

/// A text message a scripted handle accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub session: String,
    pub to: String,
    pub text: String,
}

#[derive(Default)]
struct Journal {
    creates: Vec<CreateRequest>,
    sent: Vec<SentMessage>,
    logouts: Vec<String>,
}

/// Driver whose behaviour is fully scripted per session name.
#[derive(Default)]
pub struct ScriptedDriver {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    journal: Arc<Mutex<Journal>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script for the next `create` of `session_name`.
    pub fn script(&self, session_name: &str, script: Script) -> &Self {
        self.scripts
            .lock()
            .entry(session_name.to_owned())
            .or_default()
            .push_back(script);
        self
    }

    /// Session names passed to `create`, in call order.
    pub fn create_calls(&self) -> Vec<String> {
        self.journal
            .lock()
            .creates
            .iter()
            .map(|r| r.session_name.clone())
            .collect()
    }

    pub fn create_requests(&self) -> Vec<CreateRequest> {
        self.journal.lock().creates.clone()
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.journal.lock().sent.clone()
    }

    /// Session names successfully logged out.
    pub fn logouts(&self) -> Vec<String> {
        self.journal.lock().logouts.clone()
    }
}

async fn run_steps(steps: Vec<Step>, events: &mut Option<EventSink>) {
    for step in steps {
        match step {
            Step::Emit(event) => {
                if let Some(sink) = events {
                    let _ = sink.send(event);
                }
            }
            Step::Sleep(duration) => tokio::time::sleep(duration).await,
            Step::Wait(gate) => gate.notified().await,
            Step::Close => {
                events.take();
            }
        }
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn create(
        &self,
        request: CreateRequest,
        events: EventSink,
    ) -> Result<Arc<dyn DriverHandle>, DriverError> {
        let session = request.session_name.clone();
        self.journal.lock().creates.push(request);

        let script = self
            .scripts
            .lock()
            .get_mut(&session)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| DriverError::Failed(format!("no script queued for {session}")))?;

        let mut events = Some(events);
        run_steps(script.before, &mut events).await;

        match script.finish {
            Finish::Ready => {
                let after = script.after;
                let closed = CancellationToken::new();
                let released = closed.clone();
                tokio::spawn(async move {
                    run_steps(after, &mut events).await;
                    if events.is_some() {
                        released.cancelled().await;
                    }
                });
                Ok(Arc::new(ScriptedHandle {
                    session,
                    send_error: script.send_error,
                    logout_error: script.logout_error,
                    journal: Arc::clone(&self.journal),
                    closed,
                }))
            }
            Finish::Fail(message) => Err(DriverError::Failed(message)),
            Finish::ProfileInUse(message) => Err(DriverError::ProfileInUse(message)),
            Finish::Hang => std::future::pending().await,
        }
    }
}

struct ScriptedHandle {
    session: String,
    send_error: Option<String>,
    logout_error: Option<String>,
    journal: Arc<Mutex<Journal>>,
    /// Cancelled to end the event stream.
    closed: CancellationToken,
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

#[async_trait]
impl DriverHandle for ScriptedHandle {
    async fn send_text(&self, to: &str, text: &str) -> Result<(), DriverError> {
        if let Some(message) = &self.send_error {
            return Err(DriverError::Failed(message.clone()));
        }
        self.journal.lock().sent.push(SentMessage {
            session: self.session.clone(),
            to: to.to_owned(),
            text: text.to_owned(),
        });
        Ok(())
    }

    async fn logout(&self) -> Result<(), DriverError> {
        if let Some(message) = &self.logout_error {
            return Err(DriverError::Failed(message.clone()));
        }
        self.journal.lock().logouts.push(self.session.clone());
        self.closed.cancel();
        Ok(())
    }
}

//! Event pump: one task per creation or recovery attempt.
//!
//! The pump owns the driver's `create` future and the receiving end of the
//! event stream.  Events are polled ahead of the completion so that every
//! QR or status the driver queued before resolving is applied first, in
//! emission order.  The first definitive outcome settles a single-use latch
//! that the caller awaits; everything after that still updates the registry.
//! When the stream ends under an attached handle the handle is detached and
//! the session reads `DISCONNECTED`.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use wg_domain::trace::TraceEvent;

use crate::driver::{CreateRequest, Driver, DriverError, DriverEvent, DriverHandle};
use crate::registry::{PumpTicket, SessionRegistry};
use crate::status::SessionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PumpMode {
    /// User-facing creation: QR codes are stored and the first one settles.
    Pairing,
    /// Reconciliation: a QR code before the handle proves the session is not
    /// authenticated and ends the attempt without being stored.
    Recovery,
}

/// First definitive outcome of a pump.
pub(crate) enum Settled {
    Qr(String),
    Ready(Arc<dyn DriverHandle>),
}

pub(crate) type Settlement = Result<Settled, DriverError>;

/// Single-assignment latch; later outcomes are still processed but never
/// re-resolve the caller.
struct Latch(Option<oneshot::Sender<Settlement>>);

impl Latch {
    fn settle(&mut self, outcome: Settlement) -> bool {
        match self.0.take() {
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    fn is_open(&self) -> bool {
        self.0.is_some()
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Start a pump for `request` and return the receiver of its first outcome.
///
/// A dropped receiver never stops the pump; only the ticket's cancellation
/// token or the end of the driver's event stream do.
pub(crate) fn spawn(
    driver: Arc<dyn Driver>,
    registry: Arc<SessionRegistry>,
    request: CreateRequest,
    ticket: PumpTicket,
    mode: PumpMode,
) -> oneshot::Receiver<Settlement> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(run(driver, registry, request, ticket, mode, Latch(Some(tx))));
    rx
}

async fn run(
    driver: Arc<dyn Driver>,
    registry: Arc<SessionRegistry>,
    request: CreateRequest,
    ticket: PumpTicket,
    mode: PumpMode,
    mut latch: Latch,
) {
    let session = request.session_name.clone();
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let mut create = driver.create(request, events_tx);

    let mut created = false;
    let mut attached = false;
    let mut events_open = true;

    tracing::debug!(session = %session, pump = ticket.id, ?mode, "event pump started");

    loop {
        if created && !events_open {
            break;
        }
        tokio::select! {
            biased;

            _ = ticket.token.cancelled() => {
                tracing::debug!(session = %session, pump = ticket.id, "event pump cancelled");
                break;
            }

            event = events.recv(), if events_open => match event {
                Some(event) => {
                    if let Flow::Stop = on_event(&registry, &session, &ticket, mode, &mut latch, event) {
                        break;
                    }
                }
                None => events_open = false,
            },

            result = &mut create, if !created => {
                created = true;
                // Events emitted during the poll that resolved `create`
                // precede the resolution.
                let mut stop = false;
                while let Ok(event) = events.try_recv() {
                    if let Flow::Stop = on_event(&registry, &session, &ticket, mode, &mut latch, event) {
                        stop = true;
                        break;
                    }
                }
                if stop {
                    break;
                }
                match result {
                    Ok(handle) => {
                        if !registry.attach(&session, &ticket, Arc::clone(&handle)) {
                            tracing::warn!(
                                session = %session,
                                pump = ticket.id,
                                "driver became ready after the session was superseded or removed; releasing it"
                            );
                            break;
                        }
                        attached = true;
                        TraceEvent::HandleAttached {
                            session_name: session.clone(),
                            recovered: mode == PumpMode::Recovery,
                        }
                        .emit();
                        latch.settle(Ok(Settled::Ready(handle)));
                    }
                    Err(e) => {
                        if latch.is_open() {
                            if mode == PumpMode::Pairing {
                                registry.abandon(&session, &ticket);
                            }
                            latch.settle(Err(e));
                        } else {
                            tracing::warn!(
                                session = %session,
                                error = %e,
                                "driver rejected the session after it had already settled"
                            );
                        }
                        break;
                    }
                }
            }
        }
    }

    drop(create);
    // The driver closed its stream under an attached handle: the browser is
    // gone, so the handle is dead.
    if attached && !events_open && registry.detach(&session, &ticket) {
        tracing::warn!(session = %session, pump = ticket.id, "driver event stream ended; handle detached");
        TraceEvent::StatusChanged {
            session_name: session.clone(),
            native: "streamClosed".into(),
            status: SessionStatus::Disconnected.to_string(),
        }
        .emit();
    }
    registry.finish_pump(&session, &ticket);
    tracing::debug!(session = %session, pump = ticket.id, "event pump stopped");
}

fn on_event(
    registry: &SessionRegistry,
    session: &str,
    ticket: &PumpTicket,
    mode: PumpMode,
    latch: &mut Latch,
    event: DriverEvent,
) -> Flow {
    match event {
        DriverEvent::Qr { base64, ascii } => {
            if mode == PumpMode::Recovery && latch.is_open() {
                tracing::info!(session = %session, "recovery saw a QR code; session is not authenticated");
                latch.settle(Ok(Settled::Qr(base64)));
                return Flow::Stop;
            }
            let Some(attempt) = registry.record_qr(session, ticket, base64.clone()) else {
                return Flow::Stop;
            };
            tracing::debug!(session = %session, attempt, ascii_len = ascii.len(), "QR code stored");
            TraceEvent::QrEmitted {
                session_name: session.to_owned(),
                attempt,
            }
            .emit();
            latch.settle(Ok(Settled::Qr(base64)));
            Flow::Continue
        }
        DriverEvent::Status(native) => {
            let status = SessionStatus::from_native(&native);
            if !registry.apply_status(session, ticket, status) {
                return Flow::Stop;
            }
            TraceEvent::StatusChanged {
                session_name: session.to_owned(),
                native,
                status: status.to_string(),
            }
            .emit();
            Flow::Continue
        }
    }
}

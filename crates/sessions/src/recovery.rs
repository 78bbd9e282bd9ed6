//! Reattaching to driver-side sessions this process has no handle for.
//!
//! The registry is process memory, but authenticated browser profiles live
//! on disk and may outlive a restart or be held by another process.  A
//! recovery re-runs the driver's create for the same name and waits a
//! bounded time for one of three signals: a QR code (not authenticated),
//! a ready handle (reattached), or a profile-in-use rejection (running
//! elsewhere).

use std::sync::Arc;

use tokio::time::Instant;

use wg_domain::trace::TraceEvent;

use crate::driver::DriverHandle;
use crate::error::{Result, SessionError};
use crate::manager::{SessionManager, NOT_FOUND};
use crate::pump::{self, PumpMode, Settled};
use crate::status::SessionStatus;

impl SessionManager {
    /// Obtain a live handle for `session_name`, reattaching if needed.
    ///
    /// Uses the same launch options as creation, so a profile stored in the
    /// driver's default location is picked up automatically.
    pub async fn recover_session(&self, session_name: &str) -> Result<Arc<dyn DriverHandle>> {
        if let Some(handle) = self.registry.handle(session_name) {
            return Ok(handle);
        }

        let Some(ticket) = self.registry.begin_recovery(session_name) else {
            // A pairing or another recovery owns the slot right now.
            let status = self.registry.status(session_name);
            if status == Some(SessionStatus::Connected) {
                return Err(SessionError::AttachPending(session_name.to_owned()));
            }
            return Err(SessionError::NotConnected {
                session: session_name.to_owned(),
                status: status.map_or(NOT_FOUND, |s| s.as_str()).to_owned(),
            });
        };

        let timeout = self.settings.recovery_timeout;
        let timeout_ms = timeout.as_millis() as u64;
        TraceEvent::RecoveryAttempted {
            session_name: session_name.to_owned(),
            timeout_ms,
        }
        .emit();

        let started = Instant::now();
        let token = ticket.token.clone();
        let settled = pump::spawn(
            Arc::clone(&self.driver),
            Arc::clone(&self.registry),
            self.create_request(session_name),
            ticket,
            PumpMode::Recovery,
        );

        let session = session_name.to_owned();
        let result = match tokio::time::timeout(timeout, settled).await {
            Ok(Ok(Ok(Settled::Ready(handle)))) => Ok(handle),
            Ok(Ok(Ok(Settled::Qr(_)))) => Err(SessionError::MustRepair(session)),
            Ok(Ok(Err(e))) if e.is_profile_in_use() => Err(SessionError::Desynchronized(session)),
            Ok(Ok(Err(e))) => Err(SessionError::RecoveryFailed {
                session,
                message: e.to_string(),
            }),
            Ok(Err(_)) => Err(SessionError::RecoveryFailed {
                session,
                message: "recovery was cancelled before the driver settled".into(),
            }),
            Err(_) => {
                token.cancel();
                Err(SessionError::RecoveryTimeout {
                    session,
                    timeout_ms,
                })
            }
        };

        let outcome = match &result {
            Ok(_) => "attached",
            Err(e) => e.code(),
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::info!(session = %session_name, duration_ms, "session recovered"),
            Err(e) => tracing::warn!(session = %session_name, duration_ms, error = %e, "session recovery failed"),
        }
        TraceEvent::RecoverySettled {
            session_name: session_name.to_owned(),
            outcome: outcome.to_owned(),
            duration_ms,
        }
        .emit();

        result
    }
}

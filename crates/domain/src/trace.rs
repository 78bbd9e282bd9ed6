use serde::Serialize;

/// Structured lifecycle events emitted by the session manager.
///
/// Each event is logged as a single JSON payload under the `wg_event`
/// message so log pipelines can filter on it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreateRequested {
        session_name: String,
        company_id: String,
    },
    QrEmitted {
        session_name: String,
        /// Number of QR codes emitted for this pairing so far.
        attempt: u32,
    },
    StatusChanged {
        session_name: String,
        native: String,
        status: String,
    },
    HandleAttached {
        session_name: String,
        recovered: bool,
    },
    RecoveryAttempted {
        session_name: String,
        timeout_ms: u64,
    },
    RecoverySettled {
        session_name: String,
        outcome: String,
        duration_ms: u64,
    },
    MessageSent {
        session_name: String,
        to: String,
        chars: usize,
    },
    SessionDisconnected {
        session_name: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "wg_event");
    }
}

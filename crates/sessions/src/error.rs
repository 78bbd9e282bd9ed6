/// Failures surfaced by the session manager.
///
/// Nothing here is retried automatically; every variant carries enough
/// context for an operator to decide what to do next.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session {0} already exists and is connected; disconnect it first")]
    AlreadyConnected(String),

    #[error("failed to create session {session}: {message}")]
    Creation { session: String, message: String },

    #[error("QR code not available for session {0}")]
    QrUnavailable(String),

    #[error("session {0} is not authenticated; scan a new QR code to pair it again")]
    MustRepair(String),

    #[error(
        "session {0} is running but not attached to this process; \
         disconnect and reconnect WhatsApp to resynchronize"
    )]
    Desynchronized(String),

    #[error("timed out after {timeout_ms}ms recovering session {session}; it may not exist or be disconnected")]
    RecoveryTimeout { session: String, timeout_ms: u64 },

    #[error("session {session} not found or not connected: {message}")]
    RecoveryFailed { session: String, message: String },

    #[error(
        "session {0} reports connected but its driver handle is still being attached; retry shortly"
    )]
    AttachPending(String),

    #[error("session {session} is not connected (current status: {status}); connect WhatsApp before sending messages")]
    NotConnected { session: String, status: String },

    #[error("invalid phone number ({digits} digits): {expected}")]
    InvalidPhoneNumber { digits: usize, expected: String },

    #[error("failed to send message: {0}")]
    SendFailure(String),

    #[error("failed to disconnect session {session}: {message}")]
    LogoutFailure { session: String, message: String },
}

impl SessionError {
    /// Stable machine-readable code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyConnected(_) => "already_connected",
            Self::Creation { .. } => "creation_failure",
            Self::QrUnavailable(_) => "qr_unavailable",
            Self::MustRepair(_) => "must_repair",
            Self::Desynchronized(_) => "desynchronized",
            Self::RecoveryTimeout { .. } => "recovery_timeout",
            Self::RecoveryFailed { .. } => "recovery_failed",
            Self::AttachPending(_) => "attach_pending",
            Self::NotConnected { .. } => "not_connected",
            Self::InvalidPhoneNumber { .. } => "invalid_phone_number",
            Self::SendFailure(_) => "send_failure",
            Self::LogoutFailure { .. } => "logout_failure",
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

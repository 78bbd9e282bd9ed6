//! Boundary toward the browser-automation driver.
//!
//! The driver is opaque: it knows how to boot a browser profile for a
//! session, emit QR codes and native status strings while doing so, and
//! hand back a handle that can send text and log out.  Events flow through
//! an [`EventSink`] owned by the session manager; the create future itself
//! only resolves once the session is authenticated.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use wg_domain::config::LaunchConfig;

/// Text the underlying driver uses when the browser profile is locked by
/// another live process.
pub const PROFILE_IN_USE_MARKER: &str = "browser is already running";

/// Asynchronous notification from a driver while it boots or runs a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// A fresh pairing QR code (base64 image plus terminal rendering).
    Qr { base64: String, ascii: String },
    /// A native status string such as `isLogged` or `qrReadFail`.
    Status(String),
}

/// Multi-shot channel the driver pushes [`DriverEvent`]s into.
pub type EventSink = mpsc::UnboundedSender<DriverEvent>;

/// Browser launch options passed through to the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub headless: bool,
    pub args: Vec<String>,
    pub user_data_dir: Option<PathBuf>,
}

impl From<&LaunchConfig> for LaunchOptions {
    fn from(cfg: &LaunchConfig) -> Self {
        Self {
            headless: cfg.headless,
            args: cfg.args.clone(),
            user_data_dir: cfg.user_data_dir.clone(),
        }
    }
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self::from(&LaunchConfig::default())
    }
}

/// Everything a driver needs to boot one session.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub session_name: String,
    /// Driver-side auto-close when pairing sees no activity.
    pub inactivity_timeout: Duration,
    pub launch: LaunchOptions,
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("browser profile already in use: {0}")]
    ProfileInUse(String),

    #[error("{0}")]
    Failed(String),

    #[error("driver process has exited")]
    Exited,

    #[error("timeout waiting for driver")]
    Timeout,

    #[error("driver I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    /// Whether this failure means the session's browser profile is held by
    /// another live process.
    pub fn is_profile_in_use(&self) -> bool {
        match self {
            Self::ProfileInUse(_) => true,
            Self::Failed(message) => message.contains(PROFILE_IN_USE_MARKER),
            _ => false,
        }
    }
}

/// A live, authenticated driver session.
#[async_trait]
pub trait DriverHandle: Send + Sync {
    /// Send a text message to a wire address (`<digits>@c.us`).
    async fn send_text(&self, to: &str, text: &str) -> Result<(), DriverError>;

    /// Log the account out and release the browser.
    async fn logout(&self) -> Result<(), DriverError>;
}

/// Factory for driver sessions.
///
/// `create` resolves only once the session is authenticated, which may be
/// immediately (saved credentials) or after a QR code was scanned.  QR codes
/// and native status strings are pushed to `events` in emission order.
/// Dropping the returned future before it resolves abandons the attempt and
/// must release the browser.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn create(
        &self,
        request: CreateRequest,
        events: EventSink,
    ) -> Result<Arc<dyn DriverHandle>, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_in_use_detects_native_message() {
        let err = DriverError::Failed(
            "The browser is already running for /tokens/company_1. Use a different userDataDir".into(),
        );
        assert!(err.is_profile_in_use());
        assert!(DriverError::ProfileInUse("locked".into()).is_profile_in_use());
        assert!(!DriverError::Failed("net::ERR_CONNECTION_RESET".into()).is_profile_in_use());
        assert!(!DriverError::Exited.is_profile_in_use());
    }

    #[test]
    fn launch_options_follow_config() {
        let opts = LaunchOptions::default();
        assert!(opts.headless);
        assert_eq!(opts.args.len(), 7);
        assert!(opts.user_data_dir.is_none());
    }
}

//! Connection status model and the mapping from the driver's native
//! status vocabulary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connection state of a session as seen by this process.
///
/// Lives only in memory; a restart forgets every status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Connecting,
    Opening,
    QrReady,
    Connected,
    Disconnected,
    Close,
}

impl SessionStatus {
    /// Map a native driver status string onto the session model.
    ///
    /// Unknown strings map to `Disconnected`.
    pub fn from_native(native: &str) -> Self {
        match native {
            "isLogged" | "inChat" => Self::Connected,
            "qrReadSuccess" | "qrReadFail" => Self::QrReady,
            "notLogged" | "phoneNotConnected" => Self::Disconnected,
            _ => Self::Disconnected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "CONNECTING",
            Self::Opening => "OPENING",
            Self::QrReady => "QR_READY",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
            Self::Close => "CLOSE",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

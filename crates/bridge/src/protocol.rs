//! Wire messages between the gateway and a bridge child process.
//!
//! Each message is a single line of JSON (newline-delimited), tagged by
//! `type`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use wg_sessions::LaunchOptions;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Gateway → child
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Browser launch options in the shape the automation client expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PuppeteerOptions {
    pub headless: bool,
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data_dir: Option<PathBuf>,
}

impl From<&LaunchOptions> for PuppeteerOptions {
    fn from(opts: &LaunchOptions) -> Self {
        Self {
            headless: opts.headless,
            args: opts.args.clone(),
            user_data_dir: opts.user_data_dir.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BridgeCommand {
    /// First line written after spawn: boot the session.
    Create {
        session: String,
        /// Auto-close after this many ms without pairing activity.
        #[serde(rename = "autoClose")]
        auto_close: u64,
        #[serde(rename = "puppeteerOptions")]
        puppeteer_options: PuppeteerOptions,
    },
    SendText {
        id: u64,
        to: String,
        text: String,
    },
    Logout {
        id: u64,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Child → gateway
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BridgeEvent {
    Qr {
        base64: String,
        #[serde(default)]
        ascii: String,
    },
    Status {
        status: String,
    },
    /// The session is authenticated; `create` resolves.
    Ready,
    /// Creation failed before `ready`.
    Error {
        message: String,
    },
    /// Outcome of a `sendText` or `logout` command.
    Result {
        id: u64,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

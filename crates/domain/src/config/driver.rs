//! Driver bridge process configuration.
//!
//! The gateway never speaks the WhatsApp web protocol itself.  Each session
//! is hosted by a bridge child process (for example a small Node script
//! wrapping a browser-automation client) that the `wg-bridge` crate spawns
//! and talks to over stdin/stdout.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// The command to spawn per session (e.g. `"node"`).
    #[serde(default = "d_command")]
    pub command: String,

    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the spawned process.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// How long a `sendText`/`logout` request may wait for its result.
    #[serde(default = "d_30000")]
    pub request_timeout_ms: u64,

    /// Grace period after closing stdin before the process is killed.
    #[serde(default = "d_5000")]
    pub shutdown_grace_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            command: d_command(),
            args: Vec::new(),
            env: HashMap::new(),
            request_timeout_ms: d_30000(),
            shutdown_grace_ms: d_5000(),
        }
    }
}

fn d_command() -> String {
    "wppconnect-bridge".into()
}
fn d_30000() -> u64 {
    30_000
}
fn d_5000() -> u64 {
    5_000
}

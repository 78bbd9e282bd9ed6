use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// WhatsApp session lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session lifecycle settings: naming, pairing and recovery timeouts,
/// phone normalization and the browser launch profile handed to the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Prefix for session names derived from a company id
    /// (`company_<companyId>`).
    #[serde(default = "d_session_prefix")]
    pub session_prefix: String,

    /// Driver-enforced auto-close when a pairing sees no activity.
    #[serde(default = "d_60000")]
    pub inactivity_timeout_ms: u64,

    /// Upper bound on a recovery attempt before it fails as a timeout.
    #[serde(default = "d_10000")]
    pub recovery_timeout_ms: u64,

    /// Country code prepended to local 10/11-digit numbers.
    #[serde(default = "d_country_code")]
    pub country_code: String,

    /// Minimum length of a normalized number (country + area + subscriber).
    #[serde(default = "d_min_phone_digits")]
    pub min_phone_digits: usize,

    #[serde(default)]
    pub launch: LaunchConfig,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            session_prefix: d_session_prefix(),
            inactivity_timeout_ms: d_60000(),
            recovery_timeout_ms: d_10000(),
            country_code: d_country_code(),
            min_phone_digits: d_min_phone_digits(),
            launch: LaunchConfig::default(),
        }
    }
}

/// Headless browser launch profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    #[serde(default = "d_true")]
    pub headless: bool,
    #[serde(default = "d_launch_args")]
    pub args: Vec<String>,
    /// Browser profile directory.  `None` lets the driver use its default
    /// location, which is also where recovery looks for saved credentials.
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            args: d_launch_args(),
            user_data_dir: None,
        }
    }
}

fn d_session_prefix() -> String {
    "company_".into()
}
fn d_60000() -> u64 {
    60_000
}
fn d_10000() -> u64 {
    10_000
}
fn d_country_code() -> String {
    "55".into()
}
fn d_min_phone_digits() -> usize {
    12
}
fn d_true() -> bool {
    true
}
fn d_launch_args() -> Vec<String> {
    [
        "--no-sandbox",
        "--disable-setuid-sandbox",
        "--disable-dev-shm-usage",
        "--disable-accelerated-2d-canvas",
        "--no-first-run",
        "--no-zygote",
        "--disable-gpu",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

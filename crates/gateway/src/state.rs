use std::sync::Arc;

use wg_domain::config::Config;
use wg_sessions::SessionManager;

use crate::runtime::session_lock::SessionLockMap;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    // ── Sessions ──────────────────────────────────────────────────────
    pub sessions: Arc<SessionManager>,
    /// Serializes session creation per session name.
    pub session_locks: Arc<SessionLockMap>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        sessions: Arc<SessionManager>,
        api_token_hash: Option<Vec<u8>>,
    ) -> Self {
        Self {
            config,
            sessions,
            session_locks: Arc::new(SessionLockMap::new()),
            api_token_hash,
        }
    }
}

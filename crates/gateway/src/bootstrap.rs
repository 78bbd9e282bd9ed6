//! AppState construction extracted from `main.rs`.

use std::sync::Arc;

use wg_bridge::StdioDriver;
use wg_domain::config::{Config, ConfigSeverity};
use wg_sessions::{Driver, ManagerSettings, SessionManager};

use crate::api::auth::hash_token;
use crate::state::AppState;

/// Validate config, wire the bridge driver into a session manager and
/// return a ready [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Driver bridge ────────────────────────────────────────────────
    let driver: Arc<dyn Driver> = Arc::new(StdioDriver::new(config.driver.clone()));
    tracing::info!(
        command = %config.driver.command,
        args = ?config.driver.args,
        "driver bridge configured"
    );

    // ── API token (read once, hash for constant-time comparison) ────
    let api_token_hash = {
        let env_var = &config.server.api_token_env;
        match std::env::var(env_var).ok().filter(|t| !t.is_empty()) {
            Some(token) => {
                tracing::info!(env_var = %env_var, "API bearer-token auth enabled");
                Some(hash_token(&token))
            }
            None => {
                tracing::warn!("API bearer-token auth DISABLED; set the {env_var} env var");
                None
            }
        }
    };

    Ok(app_state_with_driver(config, driver, api_token_hash))
}

/// Build state around an arbitrary driver.
pub fn app_state_with_driver(
    config: Arc<Config>,
    driver: Arc<dyn Driver>,
    api_token_hash: Option<Vec<u8>>,
) -> AppState {
    let settings = ManagerSettings::from(&config.whatsapp);
    tracing::info!(
        session_prefix = %settings.session_prefix,
        recovery_timeout_ms = config.whatsapp.recovery_timeout_ms,
        inactivity_timeout_ms = config.whatsapp.inactivity_timeout_ms,
        "session manager ready"
    );
    let sessions = Arc::new(SessionManager::new(driver, settings));
    AppState::new(config, sessions, api_token_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_is_refused() {
        let mut config = Config::default();
        config.driver.command.clear();
        let err = build_app_state(Arc::new(config)).err().unwrap();
        assert!(err.to_string().contains("config validation failed"));
    }

    #[test]
    fn state_uses_whatsapp_settings() {
        let mut config = Config::default();
        config.whatsapp.session_prefix = "tenant_".into();
        let driver = Arc::new(wg_sessions::testing::ScriptedDriver::new());
        let state = app_state_with_driver(Arc::new(config), driver, None);
        assert_eq!(state.sessions.session_name_for("42"), "tenant_42");
        assert!(state.api_token_hash.is_none());
    }
}

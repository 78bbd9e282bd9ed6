//! Session lifecycle manager.
//!
//! Orchestrates creation, QR retrieval, status projection, message sending
//! and disconnection against the [`SessionRegistry`] and an opaque
//! [`Driver`].  Recovery lives in its own module.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use wg_domain::config::WhatsAppConfig;
use wg_domain::trace::TraceEvent;

use crate::driver::{CreateRequest, Driver, LaunchOptions};
use crate::error::{Result, SessionError};
use crate::phone::{self, PhonePolicy};
use crate::pump::{self, PumpMode, Settled};
use crate::registry::{SessionRegistry, SessionSummary};
use crate::status::SessionStatus;

/// Status string reported for sessions the registry does not know.
pub const NOT_FOUND: &str = "NOT_FOUND";

// ━━━ Settings ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Prefix for names derived from a company id.
    pub session_prefix: String,
    /// Driver-side auto-close when pairing sees no activity.
    pub inactivity_timeout: Duration,
    /// Upper bound on one recovery attempt.
    pub recovery_timeout: Duration,
    pub launch: LaunchOptions,
    pub phone: PhonePolicy,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self::from(&WhatsAppConfig::default())
    }
}

impl From<&WhatsAppConfig> for ManagerSettings {
    fn from(cfg: &WhatsAppConfig) -> Self {
        Self {
            session_prefix: cfg.session_prefix.clone(),
            inactivity_timeout: Duration::from_millis(cfg.inactivity_timeout_ms),
            recovery_timeout: Duration::from_millis(cfg.recovery_timeout_ms),
            launch: LaunchOptions::from(&cfg.launch),
            phone: PhonePolicy::from(cfg),
        }
    }
}

// ━━━ Results ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How a creation settled: exactly one of the two always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The driver emitted a QR code that must be scanned to pair.
    Paired { qr_code: String },
    /// Saved credentials authenticated the session without a QR code.
    AlreadyAuthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub session_name: String,
    pub outcome: CreateOutcome,
}

impl CreatedSession {
    pub fn qr_code(&self) -> Option<&str> {
        match &self.outcome {
            CreateOutcome::Paired { qr_code } => Some(qr_code),
            CreateOutcome::AlreadyAuthenticated => None,
        }
    }
}

/// Receipt for a message the driver accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub session_name: String,
    /// Wire address the message went to.
    pub to: String,
}

// ━━━ Manager ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionManager {
    pub(crate) driver: Arc<dyn Driver>,
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) settings: ManagerSettings,
}

impl SessionManager {
    pub fn new(driver: Arc<dyn Driver>, settings: ManagerSettings) -> Self {
        Self {
            driver,
            registry: Arc::new(SessionRegistry::new()),
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Deterministic session name for a company.
    pub fn session_name_for(&self, company_id: &str) -> String {
        format!("{}{company_id}", self.settings.session_prefix)
    }

    pub(crate) fn create_request(&self, session_name: &str) -> CreateRequest {
        CreateRequest {
            session_name: session_name.to_owned(),
            inactivity_timeout: self.settings.inactivity_timeout,
            launch: self.settings.launch.clone(),
        }
    }

    /// Start (or restart) pairing for a session.
    ///
    /// Returns as soon as the driver either emits its first QR code or
    /// resolves without one.  The session keeps converging in the
    /// background after a QR return: the handle lands in the registry once
    /// the code is scanned.
    pub async fn create_session(
        &self,
        company_id: &str,
        session_name: Option<&str>,
    ) -> Result<CreatedSession> {
        let session_name = match session_name.filter(|s| !s.is_empty()) {
            Some(name) => name.to_owned(),
            None => self.session_name_for(company_id),
        };

        if self.registry.status(&session_name) == Some(SessionStatus::Connected) {
            return Err(SessionError::AlreadyConnected(session_name));
        }

        TraceEvent::SessionCreateRequested {
            session_name: session_name.clone(),
            company_id: company_id.to_owned(),
        }
        .emit();

        let ticket = self.registry.begin_pairing(&session_name, company_id);
        let settled = pump::spawn(
            Arc::clone(&self.driver),
            Arc::clone(&self.registry),
            self.create_request(&session_name),
            ticket,
            PumpMode::Pairing,
        );

        let outcome = match settled.await {
            Ok(Ok(Settled::Qr(qr_code))) => CreateOutcome::Paired { qr_code },
            Ok(Ok(Settled::Ready(_))) => CreateOutcome::AlreadyAuthenticated,
            Ok(Err(e)) => {
                tracing::warn!(session = %session_name, error = %e, "driver rejected session creation");
                return Err(SessionError::Creation {
                    session: session_name,
                    message: e.to_string(),
                });
            }
            Err(_) => {
                return Err(SessionError::Creation {
                    session: session_name,
                    message: "superseded or cancelled before the driver settled".into(),
                })
            }
        };

        tracing::info!(
            session = %session_name,
            paired = matches!(outcome, CreateOutcome::Paired { .. }),
            "session creation settled"
        );
        Ok(CreatedSession {
            session_name,
            outcome,
        })
    }

    /// Last stored QR code, if any.
    ///
    /// A stored code is returned even after the session connected.  A
    /// connected session without one yields `None`; anything else fails.
    pub fn qr_code(&self, session_name: &str) -> Result<Option<String>> {
        if let Some(qr) = self.registry.qr_code(session_name) {
            return Ok(Some(qr));
        }
        if self.registry.status(session_name) == Some(SessionStatus::Connected) {
            return Ok(None);
        }
        Err(SessionError::QrUnavailable(session_name.to_owned()))
    }

    pub fn session_status(&self, session_name: &str) -> Option<SessionStatus> {
        self.registry.status(session_name)
    }

    pub fn is_session_connected(&self, session_name: &str) -> bool {
        self.session_status(session_name)
            .is_some_and(|s| s.is_connected())
    }

    /// Names of sessions holding a live driver handle.
    pub fn list_sessions(&self) -> Vec<String> {
        self.registry.names_with_handle()
    }

    pub fn list_sessions_with_status(&self) -> Vec<SessionSummary> {
        self.registry.list()
    }

    /// Send a text message, recovering the driver handle first if this
    /// process has none.
    pub async fn send_message(
        &self,
        session_name: &str,
        phone_number: &str,
        message: &str,
    ) -> Result<Delivery> {
        let handle = match self.registry.handle(session_name) {
            Some(handle) => handle,
            None => self.recover_session(session_name).await?,
        };

        let status = self.registry.status(session_name);
        if status != Some(SessionStatus::Connected) {
            return Err(SessionError::NotConnected {
                session: session_name.to_owned(),
                status: status.map_or(NOT_FOUND, |s| s.as_str()).to_owned(),
            });
        }

        let number = self.settings.phone.normalize(phone_number)?;
        let to = phone::wire_address(&number);

        handle
            .send_text(&to, message)
            .await
            .map_err(|e| SessionError::SendFailure(e.to_string()))?;

        TraceEvent::MessageSent {
            session_name: session_name.to_owned(),
            to: to.clone(),
            chars: message.chars().count(),
        }
        .emit();

        Ok(Delivery {
            session_name: session_name.to_owned(),
            to,
        })
    }

    /// Log a session out and forget it.
    ///
    /// No-op without a handle.  State is removed only after the driver
    /// confirms the logout; a failed logout leaves everything untouched.
    pub async fn disconnect_session(&self, session_name: &str) -> Result<()> {
        let Some(handle) = self.registry.handle(session_name) else {
            tracing::debug!(session = %session_name, "disconnect requested without a live handle");
            return Ok(());
        };

        handle
            .logout()
            .await
            .map_err(|e| SessionError::LogoutFailure {
                session: session_name.to_owned(),
                message: e.to_string(),
            })?;

        self.registry.remove(session_name);
        TraceEvent::SessionDisconnected {
            session_name: session_name.to_owned(),
        }
        .emit();
        Ok(())
    }

    /// Stop every event pump.  Sessions are not logged out, so saved
    /// credentials stay available to a later recovery.
    pub fn shutdown(&self) {
        tracing::info!(sessions = self.registry.len(), "session manager shutting down");
        self.registry.cancel_all_pumps();
    }
}

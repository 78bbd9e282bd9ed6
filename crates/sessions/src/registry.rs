//! In-memory registry of WhatsApp sessions.
//!
//! One slot per session name holds the driver handle, the last mapped
//! status and the last QR code.  Slots are written only by the pumps that
//! own them: the pending pump of an in-flight creation or recovery, and the
//! live pump whose handle is attached.  A write from any other pump is
//! refused, so a superseded or disconnected session cannot be resurrected
//! by late driver events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::driver::DriverHandle;
use crate::status::SessionStatus;

/// Identifies the event pump that owns a slot.
#[derive(Debug, Clone)]
pub(crate) struct PumpTicket {
    pub id: u64,
    pub token: CancellationToken,
}

struct SessionSlot {
    handle: Option<Arc<dyn DriverHandle>>,
    status: Option<SessionStatus>,
    qr_code: Option<String>,
    company_id: Option<String>,
    /// Creation or recovery still waiting on the driver.
    pending: Option<PumpTicket>,
    /// Pump streaming events for the attached handle.
    live: Option<PumpTicket>,
    qr_count: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionSlot {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            handle: None,
            status: None,
            qr_code: None,
            company_id: None,
            pending: None,
            live: None,
            qr_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn is_pending(&self, ticket: &PumpTicket) -> bool {
        self.pending.as_ref().is_some_and(|p| p.id == ticket.id)
    }

    fn is_live(&self, ticket: &PumpTicket) -> bool {
        self.live.as_ref().is_some_and(|p| p.id == ticket.id)
    }

    fn owned_by(&self, ticket: &PumpTicket) -> bool {
        self.is_pending(ticket) || self.is_live(ticket)
    }

    /// Visible to listings once it has a handle or a status.
    fn is_listed(&self) -> bool {
        self.handle.is_some() || self.status.is_some()
    }

    fn is_empty(&self) -> bool {
        !self.is_listed()
            && self.qr_code.is_none()
            && self.pending.is_none()
            && self.live.is_none()
    }
}

/// Summary row returned by list endpoints.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_name: String,
    pub status: Option<SessionStatus>,
    pub has_driver_handle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Thread-safe registry of every session this process knows about.
pub struct SessionRegistry {
    slots: RwLock<HashMap<String, SessionSlot>>,
    next_pump_id: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            next_pump_id: AtomicU64::new(1),
        }
    }

    pub fn status(&self, session_name: &str) -> Option<SessionStatus> {
        self.slots.read().get(session_name).and_then(|s| s.status)
    }

    pub fn qr_code(&self, session_name: &str) -> Option<String> {
        self.slots
            .read()
            .get(session_name)
            .and_then(|s| s.qr_code.clone())
    }

    /// Borrow the live handle for the duration of one driver call.
    pub fn handle(&self, session_name: &str) -> Option<Arc<dyn DriverHandle>> {
        self.slots
            .read()
            .get(session_name)
            .and_then(|s| s.handle.clone())
    }

    /// Names of sessions holding a live handle, sorted.
    pub fn names_with_handle(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .slots
            .read()
            .iter()
            .filter(|(_, s)| s.handle.is_some())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Every session with a handle or a status (the two may briefly
    /// disagree while a creation is settling), sorted by name.
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut rows: Vec<SessionSummary> = self
            .slots
            .read()
            .iter()
            .filter(|(_, s)| s.is_listed())
            .map(|(name, s)| SessionSummary {
                session_name: name.clone(),
                status: s.status,
                has_driver_handle: s.handle.is_some(),
                company_id: s.company_id.clone(),
                created_at: s.created_at,
                updated_at: s.updated_at,
            })
            .collect();
        rows.sort_by(|a, b| a.session_name.cmp(&b.session_name));
        rows
    }

    /// Number of listed sessions.
    pub fn len(&self) -> usize {
        self.slots.read().values().filter(|s| s.is_listed()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove a session entirely and stop its event pump.
    pub fn remove(&self, session_name: &str) -> bool {
        let removed = self.slots.write().remove(session_name);
        match removed {
            Some(slot) => {
                for pump in slot.pending.iter().chain(slot.live.iter()) {
                    pump.token.cancel();
                }
                tracing::info!(session = %session_name, "session removed from registry");
                true
            }
            None => false,
        }
    }

    /// Stop every event pump without touching session state.
    pub fn cancel_all_pumps(&self) {
        let mut slots = self.slots.write();
        let mut cancelled = 0usize;
        for slot in slots.values_mut() {
            for pump in [slot.pending.take(), slot.live.take()].into_iter().flatten() {
                pump.token.cancel();
                cancelled += 1;
            }
        }
        slots.retain(|_, s| !s.is_empty());
        if cancelled > 0 {
            tracing::info!(cancelled, "stopped session event pumps");
        }
    }

    // ── Pump-owned writes ───────────────────────────────────────────

    fn mint_ticket(&self) -> PumpTicket {
        PumpTicket {
            id: self.next_pump_id.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        }
    }

    /// Claim a slot for a new pairing.  An in-flight creation for this
    /// session is cancelled; the newest creation owns the slot.  The live
    /// pump of an attached handle keeps streaming until a new handle
    /// replaces it.
    pub(crate) fn begin_pairing(&self, session_name: &str, company_id: &str) -> PumpTicket {
        let ticket = self.mint_ticket();
        let mut slots = self.slots.write();
        let slot = slots
            .entry(session_name.to_owned())
            .or_insert_with(SessionSlot::new);
        if let Some(previous) = slot.pending.replace(ticket.clone()) {
            previous.token.cancel();
            tracing::warn!(
                session = %session_name,
                superseded_pump = previous.id,
                "new creation supersedes an in-flight one"
            );
        }
        slot.company_id = Some(company_id.to_owned());
        slot.qr_count = 0;
        slot.updated_at = Utc::now();
        ticket
    }

    /// Claim a slot for recovery.  Returns `None` when another pump is
    /// still pairing or recovering this session.
    pub(crate) fn begin_recovery(&self, session_name: &str) -> Option<PumpTicket> {
        let mut slots = self.slots.write();
        let slot = slots
            .entry(session_name.to_owned())
            .or_insert_with(SessionSlot::new);
        let busy = |p: &Option<PumpTicket>| p.as_ref().is_some_and(|p| !p.token.is_cancelled());
        if busy(&slot.pending) || busy(&slot.live) {
            return None;
        }
        let ticket = self.mint_ticket();
        slot.pending = Some(ticket.clone());
        slot.updated_at = Utc::now();
        Some(ticket)
    }

    /// Store a QR code and mark the session `QR_READY`.  Returns how many
    /// codes this pairing has emitted, or `None` if the ticket lost the slot.
    pub(crate) fn record_qr(
        &self,
        session_name: &str,
        ticket: &PumpTicket,
        base64: String,
    ) -> Option<u32> {
        let mut slots = self.slots.write();
        let slot = slots.get_mut(session_name).filter(|s| s.owned_by(ticket))?;
        slot.qr_code = Some(base64);
        slot.status = Some(SessionStatus::QrReady);
        slot.qr_count += 1;
        slot.updated_at = Utc::now();
        Some(slot.qr_count)
    }

    /// Returns `false` if the ticket lost the slot.
    pub(crate) fn apply_status(
        &self,
        session_name: &str,
        ticket: &PumpTicket,
        status: SessionStatus,
    ) -> bool {
        let mut slots = self.slots.write();
        match slots.get_mut(session_name).filter(|s| s.owned_by(ticket)) {
            Some(slot) => {
                slot.status = Some(status);
                slot.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Store the authenticated handle, mark the session `CONNECTED` and
    /// promote the pending pump to live.  A previous handle is dropped and
    /// its live pump cancelled (last writer wins).
    pub(crate) fn attach(
        &self,
        session_name: &str,
        ticket: &PumpTicket,
        handle: Arc<dyn DriverHandle>,
    ) -> bool {
        let mut slots = self.slots.write();
        let Some(slot) = slots.get_mut(session_name).filter(|s| s.is_pending(ticket)) else {
            return false;
        };
        if slot.handle.replace(handle).is_some() {
            tracing::warn!(session = %session_name, "replaced an existing driver handle");
        }
        if let Some(previous) = slot.live.replace(ticket.clone()) {
            previous.token.cancel();
        }
        slot.pending = None;
        slot.status = Some(SessionStatus::Connected);
        slot.updated_at = Utc::now();
        true
    }

    /// Drop the handle whose event stream ended and mark the session
    /// `DISCONNECTED`.  Returns `false` unless `ticket` is the live pump.
    pub(crate) fn detach(&self, session_name: &str, ticket: &PumpTicket) -> bool {
        let mut slots = self.slots.write();
        let Some(slot) = slots.get_mut(session_name).filter(|s| s.is_live(ticket)) else {
            return false;
        };
        slot.handle = None;
        slot.live = None;
        slot.status = Some(SessionStatus::Disconnected);
        slot.updated_at = Utc::now();
        true
    }

    /// Drop everything a failed creation wrote.  A slot still holding a
    /// handle from an earlier pairing only loses the pending claim.
    pub(crate) fn abandon(&self, session_name: &str, ticket: &PumpTicket) {
        let mut slots = self.slots.write();
        let Some(slot) = slots.get_mut(session_name).filter(|s| s.is_pending(ticket)) else {
            return;
        };
        if slot.handle.is_none() {
            slots.remove(session_name);
        } else {
            slot.pending = None;
        }
    }

    /// Release the slot when its pump exits.  Slots left with nothing in
    /// them are dropped, so a failed creation leaves no entry behind.
    pub(crate) fn finish_pump(&self, session_name: &str, ticket: &PumpTicket) {
        let mut slots = self.slots.write();
        let Some(slot) = slots.get_mut(session_name) else {
            return;
        };
        if slot.is_pending(ticket) {
            slot.pending = None;
        }
        if slot.is_live(ticket) {
            slot.live = None;
        }
        if slot.is_empty() {
            slots.remove(session_name);
        }
    }
}

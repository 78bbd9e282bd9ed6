//! Per-session creation lock.
//!
//! Two creation requests for the same session name would otherwise both
//! pass the "already connected" check and race two driver processes for one
//! registry slot.  Requests queue behind each other instead; a third one
//! arriving while another is already waiting is turned away.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

struct Slot {
    semaphore: Arc<Semaphore>,
    waiting: usize,
}

/// Counts a queued caller; released even when the waiting request is
/// dropped.
struct Queued<'a> {
    locks: &'a Mutex<HashMap<String, Slot>>,
    session_name: &'a str,
}

impl Drop for Queued<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.locks.lock().get_mut(self.session_name) {
            slot.waiting = slot.waiting.saturating_sub(1);
        }
    }
}

/// Manages per-session creation locks.
///
/// Each session name maps to a `Semaphore(1)`.  Holding the permit grants
/// exclusive access to creation for that name; it releases on drop.
pub struct SessionLockMap {
    locks: Mutex<HashMap<String, Slot>>,
}

impl Default for SessionLockMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLockMap {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the creation lock for `session_name`.
    ///
    /// Waits while another creation holds it.  Fails with [`SessionBusy`]
    /// when one caller is already queued behind the holder.
    pub async fn acquire(&self, session_name: &str) -> Result<OwnedSemaphorePermit, SessionBusy> {
        let semaphore = {
            let mut locks = self.locks.lock();
            let slot = locks.entry(session_name.to_owned()).or_insert_with(|| Slot {
                semaphore: Arc::new(Semaphore::new(1)),
                waiting: 0,
            });
            if let Ok(permit) = slot.semaphore.clone().try_acquire_owned() {
                return Ok(permit);
            }
            if slot.waiting >= 1 {
                return Err(SessionBusy);
            }
            slot.waiting += 1;
            slot.semaphore.clone()
        };

        let _queued = Queued {
            locks: &self.locks,
            session_name,
        };
        semaphore.acquire_owned().await.map_err(|_| SessionBusy)
    }

    #[cfg(test)]
    pub(crate) fn session_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Drop locks nobody holds or waits for.
    pub fn prune_idle(&self) {
        let mut locks = self.locks.lock();
        locks.retain(|_, slot| slot.waiting > 0 || slot.semaphore.available_permits() == 0);
    }
}

/// Returned when a creation is in flight and another is already queued.
#[derive(Debug)]
pub struct SessionBusy;

impl std::fmt::Display for SessionBusy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a creation for this session is already in progress")
    }
}

impl std::error::Error for SessionBusy {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequential_access() {
        let map = SessionLockMap::new();

        let permit1 = map.acquire("s1").await.unwrap();
        drop(permit1);

        let permit2 = map.acquire("s1").await.unwrap();
        drop(permit2);
    }

    #[tokio::test]
    async fn different_sessions_concurrent() {
        let map = SessionLockMap::new();

        let p1 = map.acquire("s1").await.unwrap();
        let p2 = map.acquire("s2").await.unwrap();
        assert_eq!(map.session_count(), 2);

        drop(p1);
        drop(p2);
        map.prune_idle();
        assert_eq!(map.session_count(), 0);
    }

    #[tokio::test]
    async fn same_session_waits() {
        let map = Arc::new(SessionLockMap::new());
        let map2 = map.clone();

        let p1 = map.acquire("s1").await.unwrap();

        let handle = tokio::spawn(async move {
            let _p2 = map2.acquire("s1").await.unwrap();
            42
        });

        // Give the waiter a moment to queue.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        drop(p1);
        assert_eq!(handle.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn second_waiter_is_turned_away() {
        let map = Arc::new(SessionLockMap::new());
        let map2 = map.clone();

        let p1 = map.acquire("s1").await.unwrap();
        let waiter = tokio::spawn(async move { map2.acquire("s1").await.is_ok() });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(map.acquire("s1").await.is_err());

        drop(p1);
        assert!(waiter.await.unwrap());
    }
}

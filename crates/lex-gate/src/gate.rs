use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::Availability;

/// Single source of truth for "may the mirror be read right now".
///
/// The flag answers cheaply; the lock makes the answer hold for as long as
/// the reader needs it. Tokio's `RwLock` is write-preferring, so once a cycle
/// queues for the write side no new permit is handed out.
#[derive(Debug)]
pub struct AvailabilityGate {
    state: AtomicU8,
    lock: RwLock<()>,
}

impl Default for AvailabilityGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AvailabilityGate {
    /// Boots AWAKE.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(Availability::AWAKE),
            lock: RwLock::new(()),
        }
    }

    pub fn state(&self) -> Availability {
        Availability::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_awake(&self) -> bool {
        self.state() == Availability::Awake
    }

    /// Non-blocking entry for a reader. `None` means SLEEPING (or a cycle is
    /// about to start) and the caller must defer.
    pub fn try_enter(&self) -> Option<ServingPermit<'_>> {
        if !self.is_awake() {
            return None;
        }
        let guard = self.lock.try_read().ok()?;
        // The flag may have flipped between the first load and the lock.
        if !self.is_awake() {
            return None;
        }
        Some(ServingPermit { _read: guard })
    }

    /// Announce SLEEPING, then wait for in-flight readers to finish.
    ///
    /// The returned guard restores AWAKE when dropped. If this future is
    /// itself dropped while waiting, AWAKE is restored as well.
    pub async fn begin_cycle(&self) -> CycleGuard<'_> {
        self.state.store(Availability::SLEEPING, Ordering::Release);
        let wake = WakeOnDrop { gate: self };
        let write = self.lock.write().await;
        debug!("availability gate: SLEEPING");
        CycleGuard {
            _write: write,
            _wake: wake,
        }
    }
}

/// Proof that the mirror is not being rewritten. Hold it across the read.
#[derive(Debug)]
pub struct ServingPermit<'a> {
    _read: RwLockReadGuard<'a, ()>,
}

/// Exclusive access for one reconciliation cycle.
///
/// Field order is drop order: the write lock is released before the flag
/// goes back to AWAKE, so a reader that sees AWAKE can always get a permit.
#[derive(Debug)]
pub struct CycleGuard<'a> {
    _write: RwLockWriteGuard<'a, ()>,
    _wake: WakeOnDrop<'a>,
}

#[derive(Debug)]
struct WakeOnDrop<'a> {
    gate: &'a AvailabilityGate,
}

impl Drop for WakeOnDrop<'_> {
    fn drop(&mut self) {
        self.gate
            .state
            .store(Availability::AWAKE, Ordering::Release);
        debug!("availability gate: AWAKE");
    }
}

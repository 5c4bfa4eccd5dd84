// ABOUTME: Per-resource concurrency limiter for background agent invocations.
// ABOUTME: Admits up to a resolved limit per key and hands freed slots to waiters in FIFO order.

use std::collections::{HashMap, VecDeque};
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::resource::{ConcurrencyConfig, ConcurrencyLimit, ResourceKey};
use crate::error::Cancelled;

/// Admission bookkeeping for a single bounded key.
#[derive(Default)]
struct KeyState {
    /// Admissions currently outstanding.
    active: usize,
    /// Pending admissions, oldest first.
    waiters: VecDeque<oneshot::Sender<()>>,
}

enum Admission {
    Granted,
    Queued(oneshot::Receiver<()>),
}

/// Bounds simultaneous admissions per resource key.
///
/// Each key (typically `"provider/model"`) gets a limit resolved from the
/// [`ConcurrencyConfig`]. Once a key is saturated, further `acquire` calls
/// queue and are resumed strictly in arrival order as slots are released.
///
/// # Hand-off Semantics
///
/// - **Slot transfer:** `release()` on a key with waiters passes the slot
///   directly to the oldest waiter. The active count does not change, so a
///   newly arriving `acquire()` can never overtake a queued one.
/// - **Unbounded keys:** a limit of `0` admits everything and never creates
///   per-key state. `release()` on such a key is a no-op.
/// - **Clamped release:** an unpaired `release()` never drives the active
///   count below zero. It is logged at `warn` and otherwise ignored.
/// - **Abandoned waiters:** a waiter that is cancelled or dropped is skipped.
///   If the slot had already been handed to it, the slot moves on to the next
///   waiter.
pub struct ConcurrencyLimiter {
    config: ConcurrencyConfig,
    keys: Mutex<HashMap<ResourceKey, KeyState>>,
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(ConcurrencyConfig::default())
    }
}

impl ConcurrencyLimiter {
    /// Create a limiter with the given overrides.
    pub fn new(config: ConcurrencyConfig) -> Self {
        Self {
            config,
            keys: Mutex::new(HashMap::new()),
        }
    }

    /// The configuration this limiter resolves limits from.
    pub fn config(&self) -> &ConcurrencyConfig {
        &self.config
    }

    /// Resolve the admission limit for a key.
    pub fn resolve_limit(&self, key: &ResourceKey) -> ConcurrencyLimit {
        self.config.resolve(key)
    }

    /// Wait until a slot for `key` is available.
    ///
    /// Returns immediately for unbounded keys or when the key is below its
    /// limit. Otherwise suspends until a matching [`release`](Self::release)
    /// hands this caller a slot. Every call that returns must be paired with
    /// exactly one `release`.
    pub async fn acquire(&self, key: &ResourceKey) {
        // Only fails if the waiter's sender is dropped unsent, which cannot
        // happen while `self` is borrowed.
        let _ = self
            .acquire_with_cancel(key, std::future::pending::<()>())
            .await;
    }

    /// Wait for a slot with cancellation support.
    ///
    /// Returns `Ok(())` once admitted.
    /// Returns `Err(Cancelled)` if `cancel` completes while still queued.
    ///
    /// Cancellation only affects a queued caller; a key with free capacity
    /// admits immediately. A cancelled caller holds no slot and must not
    /// call `release`.
    ///
    /// # Arguments
    ///
    /// * `key` - The resource to acquire a slot for.
    /// * `cancel` - A future that, when completed, abandons the wait.
    pub async fn acquire_with_cancel<F>(
        &self,
        key: &ResourceKey,
        cancel: F,
    ) -> Result<(), Cancelled>
    where
        F: Future<Output = ()>,
    {
        let receiver = match self.try_admit(key) {
            Admission::Granted => return Ok(()),
            Admission::Queued(receiver) => receiver,
        };

        let mut waiter = Waiter {
            limiter: self,
            key,
            receiver,
            admitted: false,
        };

        tokio::pin!(cancel);

        let handed_off = tokio::select! {
            biased;
            () = &mut cancel => false,
            result = &mut waiter.receiver => result.is_ok(),
        };

        if handed_off {
            waiter.admitted = true;
            Ok(())
        } else {
            debug!(target: "undertow::coordinator", %key, "queued acquire abandoned");
            Err(Cancelled)
        }
    }

    /// Admit immediately if possible, otherwise enqueue a waiter.
    fn try_admit(&self, key: &ResourceKey) -> Admission {
        let limit = match self.resolve_limit(key) {
            ConcurrencyLimit::Unbounded => return Admission::Granted,
            ConcurrencyLimit::Bounded(limit) => limit,
        };

        let mut keys = self.keys.lock();
        let state = keys.entry(key.clone()).or_default();

        if state.active < limit {
            state.active += 1;
            return Admission::Granted;
        }

        let (sender, receiver) = oneshot::channel();
        state.waiters.push_back(sender);
        debug!(
            target: "undertow::coordinator",
            %key,
            limit,
            queued = state.waiters.len(),
            "key saturated, queueing acquire"
        );
        Admission::Queued(receiver)
    }

    /// Release a slot for `key`.
    ///
    /// If callers are queued, the oldest live waiter is resumed and inherits
    /// the slot. Otherwise the active count is decremented, floored at zero.
    pub fn release(&self, key: &ResourceKey) {
        if self.resolve_limit(key).is_unbounded() {
            return;
        }

        let mut keys = self.keys.lock();
        let Some(state) = keys.get_mut(key) else {
            warn!(target: "undertow::coordinator", %key, "release without a matching acquire");
            return;
        };

        // Hand-off and decrement happen under one lock so no new acquire can
        // slip in between.
        while let Some(waiter) = state.waiters.pop_front() {
            if waiter.send(()).is_ok() {
                debug!(
                    target: "undertow::coordinator",
                    %key,
                    active = state.active,
                    queued = state.waiters.len(),
                    "slot handed to next waiter"
                );
                return;
            }
        }

        if state.active == 0 {
            warn!(target: "undertow::coordinator", %key, "release without a matching acquire");
            return;
        }
        state.active -= 1;
    }

    /// Number of admissions currently outstanding for `key`.
    ///
    /// Always zero for unbounded keys.
    pub fn active_count(&self, key: &ResourceKey) -> usize {
        self.keys.lock().get(key).map_or(0, |state| state.active)
    }

    /// Number of callers currently waiting on `key`.
    pub fn queued_count(&self, key: &ResourceKey) -> usize {
        self.keys.lock().get(key).map_or(0, |state| {
            state
                .waiters
                .iter()
                .filter(|waiter| !waiter.is_closed())
                .count()
        })
    }

    /// Number of keys that have per-key state.
    pub fn tracked_keys(&self) -> usize {
        self.keys.lock().len()
    }
}

/// A queued acquire. Passes on a slot it was handed but never claimed.
struct Waiter<'a> {
    limiter: &'a ConcurrencyLimiter,
    key: &'a ResourceKey,
    receiver: oneshot::Receiver<()>,
    admitted: bool,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if self.admitted {
            return;
        }

        // After close, release() can no longer hand us a slot; anything it
        // already sent is still readable.
        self.receiver.close();
        if self.receiver.try_recv().is_ok() {
            self.limiter.release(self.key);
        }
    }
}

//! Reuse pool for request context slots.
//!
//! Slots go back into the free list only through [`ContextPool::release`],
//! which redeems a [`ClaimTicket`]. The version guard's compare-and-reset is
//! the only gate: a stale or superseded ticket cannot push a slot that some
//! newer claim still owns, and two finalizers racing on the same ticket value
//! have exactly one winner.

use std::sync::Arc;

use parking_lot::Mutex;

use super::slot::{Recycle, Slot};
use super::version::ClaimTicket;

/// Bounded free list of context slots.
#[derive(Debug)]
pub struct ContextPool {
    free: Mutex<Vec<Arc<Slot>>>,
    capacity: usize,
}

impl ContextPool {
    /// Creates an empty pool that keeps at most `capacity` idle slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Pre-allocates up to `count` idle slots (never beyond capacity).
    pub fn prewarm(&self, count: usize) {
        let mut free = self.free.lock();
        let target = count.min(self.capacity);
        while free.len() < target {
            free.push(Arc::new(Slot::new()));
        }
    }

    /// Takes an idle slot, or allocates one if the pool is empty.
    ///
    /// The slot comes back blank and unclaimed. Handles from its previous
    /// generation cannot touch it.
    pub(crate) fn acquire(&self) -> Arc<Slot> {
        let pooled = self.free.lock().pop();
        match pooled {
            Some(slot) => {
                metrics::counter!("hearth_context_pool_hits_total").increment(1);
                slot
            }
            None => {
                metrics::counter!("hearth_context_pool_misses_total").increment(1);
                Arc::new(Slot::new())
            }
        }
    }

    /// Returns the ticket's slot to the pool if the ticket is still current.
    ///
    /// On success the slot is marked unclaimed, wiped, moved to its next
    /// generation and pushed back (or dropped if the pool is full), and `true`
    /// is returned. On failure nothing happens: a newer claim owns the slot,
    /// or it was already recycled.
    pub fn release(&self, ticket: ClaimTicket) -> bool {
        let (slot, version) = ticket.into_parts();
        let chain = match slot.recycle(version) {
            Recycle::Stale => {
                metrics::counter!("hearth_context_pool_rejected_total").increment(1);
                tracing::trace!(version, current = slot.version.load(), "stale release ignored");
                return false;
            }
            Recycle::Recycled { chain } => chain,
        };

        if let Some(chain) = chain {
            // Armed but never fired: the work it belonged to is over.
            let discarded = chain.cancel();
            tracing::debug!(version, discarded, "released slot with an unfired cleanup chain");
        }

        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(slot);
        }
        true
    }

    /// Number of idle slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.free.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

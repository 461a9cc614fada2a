//! Pooled storage behind a `Request` handle.

use std::sync::Arc;

use hearth_core::Message;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::chain::{CleanupChain, FireReport};
use super::source::Source;
use super::version::VersionGuard;

/// Mutable per-request fields, guarded by the slot mutex.
#[derive(Debug, Default)]
pub(crate) struct SlotState {
    /// Bumped every time the slot is recycled. A `Request` handle remembers
    /// the generation it was created in and goes stale when it moves on.
    pub(crate) generation: u64,
    pub(crate) source: Source,
    pub(crate) uid: Option<i64>,
    pub(crate) message: Message,
    pub(crate) cancellation: CancellationToken,
    pub(crate) chain: Option<Arc<CleanupChain>>,
}

/// One reusable context slot. Handed out by the pool, shared by every
/// `Request` handle and `ClaimTicket` that refers to it.
#[derive(Debug, Default)]
pub(crate) struct Slot {
    pub(crate) version: VersionGuard,
    pub(crate) state: Mutex<SlotState>,
}

/// Outcome of [`Slot::recycle`].
#[derive(Debug)]
pub(crate) enum Recycle {
    /// The version was not the current claim; nothing changed.
    Stale,
    /// The slot is unclaimed and blank. Carries the chain that was still
    /// attached, if any.
    Recycled { chain: Option<Arc<CleanupChain>> },
}

impl Slot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Marks the slot unclaimed if `version` is the current claim, then
    /// clears every field and moves it to the next generation.
    ///
    /// Both steps happen under the state lock, so a handle that checks its
    /// binding under the same lock sees either the old request or a stale
    /// generation, never a mix.
    pub(crate) fn recycle(&self, version: u64) -> Recycle {
        let mut state = self.state.lock();
        if !self.version.compare_and_reset_to_unclaimed(version) {
            return Recycle::Stale;
        }
        let chain = state.chain.take();
        let generation = state.generation.wrapping_add(1);
        *state = SlotState {
            generation,
            ..SlotState::default()
        };
        Recycle::Recycled { chain }
    }

    /// Fires the cleanup chain if `version` is still the current claim.
    ///
    /// The version check happens under the slot lock, so it is serialized
    /// with `defer`/`cancel`. The chain stays attached while it fires, which
    /// lets a callback cancel the rest of it through the request; it is
    /// detached afterwards so later `defer` calls arm a new chain.
    pub(crate) fn fire_if_current(&self, version: u64) -> Option<FireReport> {
        let chain = {
            let state = self.state.lock();
            if !self.version.is_current(version) {
                return None;
            }
            Arc::clone(state.chain.as_ref()?)
        };

        let report = chain.fire();

        let mut state = self.state.lock();
        if state
            .chain
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &chain))
        {
            state.chain = None;
        }
        Some(report)
    }
}

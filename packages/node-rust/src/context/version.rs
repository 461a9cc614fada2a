//! Version guard and claim tickets.
//!
//! Every pooled context slot carries a [`VersionGuard`]. Each time the slot is
//! claimed for a new unit of work (by its owner, or by `Request::task`) the
//! guard mints a fresh version and hands it out inside a [`ClaimTicket`].
//! Cleanup and recycle actions redeem a ticket, and only act if the ticket's
//! version is still the current one.
//!
//! The guard is a single `AtomicU64`: the low 63 bits are the version, the top
//! bit marks the slot as unclaimed. Recycling sets the bit instead of zeroing
//! the counter, so version numbers never repeat for the life of a slot and a
//! ticket from a previous lifetime can never match again.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::slot::Slot;

const UNCLAIMED: u64 = 1 << 63;
const VERSION_MASK: u64 = !UNCLAIMED;

/// Monotonic version counter with compare-and-reset semantics.
pub struct VersionGuard {
    state: AtomicU64,
}

impl VersionGuard {
    /// A fresh guard at version 0, unclaimed.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU64::new(UNCLAIMED),
        }
    }

    /// Mints the next version and marks the guard claimed.
    ///
    /// Any ticket holding an older version is superseded from this point on.
    pub fn increment(&self) -> u64 {
        let bump = |state: u64| Some(((state & VERSION_MASK) + 1) & VERSION_MASK);
        let prev = match self.state.fetch_update(Ordering::AcqRel, Ordering::Acquire, bump) {
            Ok(prev) | Err(prev) => prev,
        };
        ((prev & VERSION_MASK) + 1) & VERSION_MASK
    }

    /// Current version number, whether claimed or not.
    #[must_use]
    pub fn load(&self) -> u64 {
        self.state.load(Ordering::Acquire) & VERSION_MASK
    }

    #[must_use]
    pub fn is_unclaimed(&self) -> bool {
        self.state.load(Ordering::Acquire) & UNCLAIMED != 0
    }

    /// `true` if the guard is claimed and its version equals `version`.
    #[must_use]
    pub fn is_current(&self, version: u64) -> bool {
        self.state.load(Ordering::Acquire) == version
    }

    /// Atomically marks the guard unclaimed iff it is claimed at `expected`.
    ///
    /// Exactly one of any number of concurrent callers passing the same
    /// `expected` can succeed.
    pub fn compare_and_reset_to_unclaimed(&self, expected: u64) -> bool {
        if expected & UNCLAIMED != 0 {
            return false;
        }
        self.state
            .compare_exchange(
                expected,
                expected | UNCLAIMED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Default for VersionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VersionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionGuard")
            .field("version", &self.load())
            .field("unclaimed", &self.is_unclaimed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ClaimTicket
// ---------------------------------------------------------------------------

/// Proof of a claim on a context slot at one specific version.
///
/// Tickets are not `Clone`: redeeming one (`ContextPool::release`,
/// `Request::finish`) consumes it, so a ticket can act at most once. A ticket
/// whose version has been superseded redeems as a no-op.
#[must_use = "a claim ticket is redeemed with `Request::finish` or `ContextPool::release`"]
pub struct ClaimTicket {
    slot: Arc<Slot>,
    version: u64,
}

impl ClaimTicket {
    /// Claims `slot` at a freshly minted version.
    pub(crate) fn mint(slot: &Arc<Slot>) -> Self {
        let version = slot.version.increment();
        Self {
            slot: Arc::clone(slot),
            version,
        }
    }

    /// The version this ticket was minted at.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// `true` while no newer claim and no recycle has happened.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.slot.version.is_current(self.version)
    }

    pub(crate) fn slot(&self) -> &Arc<Slot> {
        &self.slot
    }

    pub(crate) fn into_parts(self) -> (Arc<Slot>, u64) {
        (self.slot, self.version)
    }

    /// Builds a ticket for an arbitrary version, bypassing the guard.
    #[cfg(test)]
    pub(crate) fn forge(slot: &Arc<Slot>, version: u64) -> Self {
        Self {
            slot: Arc::clone(slot),
            version,
        }
    }
}

impl fmt::Debug for ClaimTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimTicket")
            .field("version", &self.version)
            .field("current", &self.is_current())
            .finish()
    }
}

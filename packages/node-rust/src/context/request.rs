//! The per-message request context.
//!
//! A [`Request`] is a handle onto a pooled slot plus a back-link to the
//! owning [`Node`]. The transport layer acquires one per inbound message,
//! fills in its routing identity, claims it, runs the handler, and finishes
//! the claim. Handler code reads the identity, decodes the payload, defers
//! cleanup, continues on a worker with [`Request::task`], hands the request on
//! with [`Request::next`], or replies.

use std::fmt;
use std::sync::Arc;

use hearth_core::codec::decode_into;
use hearth_core::{Message, Payload};
use parking_lot::MutexGuard;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::chain::{Callback, CleanupChain};
use super::error::ContextError;
use super::slot::{Slot, SlotState};
use super::source::Source;
use super::task::finalize;
use super::version::ClaimTicket;
use crate::cluster::Proxy;
use crate::node::Node;

/// Identity needed to route a call, copied out of the slot so no lock is held
/// across an `.await`.
pub(super) struct Routing {
    pub(super) source: Source,
    pub(super) uid: Option<i64>,
    pub(super) cancellation: CancellationToken,
}

/// Handle to a request context.
///
/// Not `Clone`: the only ways to get a second handle onto the same slot are
/// through [`Request::task`] (the continuation receives one) or the scheduler
/// receiving one from [`Request::next`]. Use [`Request::clone_detached`] for
/// an independent copy.
///
/// A handle is bound to the slot generation it was created in, and handles
/// given out by `task` and `next` are also bound to the claim they were
/// issued under. Once the slot is recycled, or that claim is superseded, the
/// handle is stale: reads return empty values, mutations and `defer` do
/// nothing, and fallible operations return [`ContextError::Stale`].
pub struct Request {
    node: Arc<Node>,
    slot: Arc<Slot>,
    generation: u64,
    claim: Option<u64>,
}

impl Request {
    pub(crate) fn new(node: Arc<Node>, slot: Arc<Slot>) -> Self {
        let generation = slot.state.lock().generation;
        Self {
            node,
            slot,
            generation,
            claim: None,
        }
    }

    /// Another handle with the same binding.
    pub(crate) fn share(&self) -> Request {
        Request {
            node: Arc::clone(&self.node),
            slot: Arc::clone(&self.slot),
            generation: self.generation,
            claim: self.claim,
        }
    }

    /// Another handle bound to claim `version`.
    pub(super) fn bound_to(&self, version: u64) -> Request {
        Request {
            claim: Some(version),
            ..self.share()
        }
    }

    pub(super) fn slot(&self) -> &Arc<Slot> {
        &self.slot
    }

    fn owns(&self, state: &SlotState) -> bool {
        state.generation == self.generation
            && self.claim.map_or(true, |v| self.slot.version.is_current(v))
    }

    /// Locks the slot, or returns `None` if this handle is stale.
    pub(super) fn state(&self) -> Option<MutexGuard<'_, SlotState>> {
        let state = self.slot.state.lock();
        self.owns(&state).then_some(state)
    }

    fn read<R>(&self, f: impl FnOnce(&SlotState) -> R) -> Option<R> {
        self.state().map(|state| f(&state))
    }

    /// `true` once the context was recycled or the claim this handle was
    /// issued under was superseded.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.state().is_none()
    }

    // -----------------------------------------------------------------------
    // Population and identity
    // -----------------------------------------------------------------------

    /// Fills in routing identity and the inbound message. A `uid` of
    /// `Some(0)` is treated as unbound.
    pub fn populate(&self, source: Source, uid: Option<i64>, message: Message) {
        let Some(mut state) = self.state() else {
            tracing::trace!(route = message.route, "populate on stale request ignored");
            return;
        };
        state.source = source;
        state.uid = uid.filter(|uid| *uid != 0);
        state.message = message;
    }

    /// Records the user this request acts for, e.g. after a login handler
    /// authenticated the connection. 0 clears it.
    pub fn set_uid(&self, uid: i64) {
        match self.state() {
            Some(mut state) => state.uid = (uid != 0).then_some(uid),
            None => tracing::trace!(uid, "set_uid on stale request ignored"),
        }
    }

    #[must_use]
    pub fn source(&self) -> Source {
        self.read(|s| s.source.clone()).unwrap_or_default()
    }

    /// Source gateway id, for gateway-originated requests.
    #[must_use]
    pub fn gid(&self) -> Option<String> {
        self.read(|s| s.source.gid().map(str::to_string)).flatten()
    }

    /// Source node id, for requests delivered by a node.
    #[must_use]
    pub fn nid(&self) -> Option<String> {
        self.read(|s| s.source.nid().map(str::to_string)).flatten()
    }

    /// Source actor id, for requests sent by a local actor.
    #[must_use]
    pub fn pid(&self) -> Option<String> {
        self.read(|s| s.source.pid().map(str::to_string)).flatten()
    }

    /// Gateway connection id, for gateway-originated requests.
    #[must_use]
    pub fn cid(&self) -> Option<i64> {
        self.read(|s| s.source.cid()).flatten()
    }

    /// Bound user id, if any.
    #[must_use]
    pub fn uid(&self) -> Option<i64> {
        self.read(|s| s.uid).flatten()
    }

    #[must_use]
    pub fn seq(&self) -> i32 {
        self.read(|s| s.message.seq).unwrap_or_default()
    }

    #[must_use]
    pub fn route(&self) -> i32 {
        self.read(|s| s.message.route).unwrap_or_default()
    }

    /// A copy of the inbound message.
    #[must_use]
    pub fn message(&self) -> Message {
        self.read(|s| s.message.clone()).unwrap_or_default()
    }

    /// The cancellation scope threaded through every proxy call. A stale
    /// handle gets a scope that is already canceled.
    #[must_use]
    pub fn cancellation(&self) -> CancellationToken {
        self.read(|s| s.cancellation.clone()).unwrap_or_else(|| {
            let token = CancellationToken::new();
            token.cancel();
            token
        })
    }

    /// Current version of the underlying slot.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.slot.version.load()
    }

    #[must_use]
    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    #[must_use]
    pub fn proxy(&self) -> &Arc<dyn Proxy> {
        self.node.proxy()
    }

    pub(super) fn routing(&self) -> Result<Routing, ContextError> {
        self.read(|s| Routing {
            source: s.source.clone(),
            uid: s.uid,
            cancellation: s.cancellation.clone(),
        })
        .ok_or(ContextError::Stale)
    }

    // -----------------------------------------------------------------------
    // Payload
    // -----------------------------------------------------------------------

    /// Decodes the inbound payload into `target`.
    ///
    /// A typed payload is deep-copied into `target` without touching the
    /// codec. An empty byte payload succeeds and leaves `target` unchanged.
    /// Gateway payloads are decrypted first when the node has an encryptor.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::Decode` if decryption or decoding fails, and
    /// `ContextError::Stale` if the handle outlived its claim.
    pub fn parse<T: DeserializeOwned>(&self, target: &mut T) -> Result<(), ContextError> {
        let (data, from_gateway) = self
            .read(|s| (s.message.data.clone(), s.source.is_gateway()))
            .ok_or(ContextError::Stale)?;
        if data.is_empty() {
            return Ok(());
        }

        let bytes = match data {
            Payload::Value(value) => {
                *target = rmpv::ext::from_value(value)
                    .map_err(|e| ContextError::Decode(e.to_string()))?;
                return Ok(());
            }
            Payload::Bytes(bytes) => bytes,
        };

        let codec = self.node.codec();
        match self.node.encryptor() {
            Some(encryptor) if from_gateway => {
                let plain = encryptor.decrypt(&bytes)?;
                decode_into(codec, &plain, target)?;
            }
            _ => decode_into(codec, &bytes, target)?,
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Cleanup chain
    // -----------------------------------------------------------------------

    /// Registers `f` to run when the current claim finishes, before anything
    /// deferred earlier.
    ///
    /// Like a scoped `defer`, but cancelable: [`Request::cancel`] drops every
    /// pending callback, and [`Request::task`] cancels them automatically.
    /// On a stale handle `f` is dropped without running.
    pub fn defer<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.register(Box::new(f), true);
    }

    /// Registers `f` to run after everything deferred with [`Request::defer`]
    /// and after earlier tail registrations.
    pub fn defer_tail<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.register(Box::new(f), false);
    }

    /// Adds `f` to the attached chain, arming a new one if there is none or
    /// the attached one already finished.
    fn register(&self, f: Callback, head: bool) {
        let Some(mut state) = self.state() else {
            tracing::trace!(claim = ?self.claim, "defer on stale request dropped");
            return;
        };
        let f = match &state.chain {
            Some(chain) => match chain.register(f, head) {
                Ok(()) => return,
                Err(f) => f,
            },
            None => f,
        };
        let chain = Arc::new(CleanupChain::new());
        if chain.register(f, head).is_ok() {
            state.chain = Some(chain);
        }
    }

    /// Drops every pending deferred callback. No-op if nothing was deferred
    /// or the handle is stale.
    pub fn cancel(&self) {
        let chain = self.state().and_then(|mut state| state.chain.take());
        if let Some(chain) = chain {
            let discarded = chain.cancel();
            if discarded > 0 {
                tracing::trace!(discarded, version = self.version(), "deferred cleanup canceled");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Claims
    // -----------------------------------------------------------------------

    /// Claims the context for the caller, superseding every earlier claim.
    ///
    /// The transport layer claims a freshly populated request before running
    /// its handler and redeems the ticket with [`Request::finish`] afterwards.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::Stale` if the handle outlived its claim.
    pub fn claim(&self) -> Result<ClaimTicket, ContextError> {
        let _state = self.state().ok_or(ContextError::Stale)?;
        Ok(ClaimTicket::mint(&self.slot))
    }

    /// Ends the owner's claim: fires deferred cleanup and recycles the
    /// context, each only if `ticket` is still current. If the handler moved
    /// the work on with [`Request::task`], both are left to the task.
    ///
    /// Returns whether the context went back to the pool. A ticket minted for
    /// another context is refused.
    pub fn finish(self, ticket: ClaimTicket) -> bool {
        if !Arc::ptr_eq(ticket.slot(), &self.slot) {
            tracing::warn!(
                node_id = %self.node.id(),
                version = ticket.version(),
                "finish called with a ticket for another context"
            );
            return false;
        }
        let (route, seq) = (self.route(), self.seq());
        finalize(&self.node, ticket, route, seq)
    }

    // -----------------------------------------------------------------------
    // Derivation and hand-off
    // -----------------------------------------------------------------------

    /// An independent copy for another execution path.
    ///
    /// Carries the same node, source, user and message, but has its own slot,
    /// a fresh cancellation scope, and no deferred cleanup, so neither copy
    /// can cancel or fire the other's callbacks.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::Stale` if the handle outlived its claim.
    pub fn clone_detached(&self) -> Result<Request, ContextError> {
        let (source, uid, message) = self
            .read(|s| (s.source.clone(), s.uid, s.message.clone()))
            .ok_or(ContextError::Stale)?;
        let copy = self.node.acquire();
        copy.populate(source, uid, message);
        Ok(copy)
    }

    /// Hands the request to the scheduler for further routing, e.g. into the
    /// mailbox of the actor the user is bound to.
    ///
    /// The scheduler's handle is bound to the claim current at the time of
    /// the call, so it goes stale as soon as newer work claims the context.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::Stale` if the handle outlived its claim, and
    /// otherwise whatever the scheduler reports, unchanged.
    pub async fn next(&self) -> Result<(), ContextError> {
        let handle = {
            let _state = self.state().ok_or(ContextError::Stale)?;
            match self.claim {
                Some(_) => self.share(),
                None if self.slot.version.is_unclaimed() => self.share(),
                None => self.bound_to(self.slot.version.load()),
            }
        };
        self.node.scheduler().dispatch(handle).await?;
        Ok(())
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.slot.state.lock();
        let mut out = f.debug_struct("Request");
        out.field("node", &self.node.id());
        if self.owns(&state) {
            out.field("source", &state.source)
                .field("uid", &state.uid)
                .field("seq", &state.message.seq)
                .field("route", &state.message.route);
        } else {
            out.field("stale", &true);
        }
        out.field("version", &self.slot.version).finish_non_exhaustive()
    }
}

//! Moving work off the owner onto a worker.
//!
//! `Request::task` claims the context under a fresh ticket, cancels cleanup
//! deferred under the previous claim, and submits a job that runs the
//! continuation and then finalizes the ticket: fire the cleanup chain, then
//! release the slot to the pool, each only if the ticket is still current.
//! Finalization runs even if the continuation panics.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::Semaphore;

use super::request::Request;
use super::version::ClaimTicket;
use crate::fault::{panic_message, FaultKind};
use crate::node::Node;

/// A unit of work handed to a [`TaskSubmitter`].
pub type Job = BoxFuture<'static, ()>;

// ---------------------------------------------------------------------------
// TaskSubmitter
// ---------------------------------------------------------------------------

/// Work-submission capability. Submission never blocks and returns no handle.
pub trait TaskSubmitter: Send + Sync + fmt::Debug {
    fn submit(&self, job: Job);
}

/// Runs jobs as tasks on a tokio runtime, optionally capped by a semaphore.
#[derive(Debug, Clone)]
pub struct TokioSubmitter {
    handle: Handle,
    limit: Option<Arc<Semaphore>>,
}

impl TokioSubmitter {
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            limit: None,
        }
    }

    /// Submitter bound to the runtime the caller is running on.
    ///
    /// # Errors
    ///
    /// Returns `TryCurrentError` when called outside a tokio runtime.
    pub fn try_current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }

    /// Caps the number of jobs running at once. Excess jobs wait for a permit.
    /// A limit of 0 removes the cap.
    #[must_use]
    pub fn with_limit(mut self, max_concurrent: usize) -> Self {
        self.limit = (max_concurrent > 0).then(|| Arc::new(Semaphore::new(max_concurrent)));
        self
    }
}

impl TaskSubmitter for TokioSubmitter {
    fn submit(&self, job: Job) {
        match &self.limit {
            None => drop(self.handle.spawn(job)),
            Some(limit) => {
                let limit = Arc::clone(limit);
                drop(self.handle.spawn(async move {
                    match limit.acquire_owned().await {
                        Ok(_permit) => job.await,
                        Err(_) => tracing::warn!("task limiter closed, job dropped"),
                    }
                }));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Finalization
// ---------------------------------------------------------------------------

/// Fires the chain, then releases the slot, both gated on `ticket` being
/// current. Returns whether the slot went back to the pool.
pub(crate) fn finalize(node: &Node, ticket: ClaimTicket, route: i32, seq: i32) -> bool {
    let version = ticket.version();
    if let Some(report) = ticket.slot().fire_if_current(version) {
        for message in report.panics {
            node.report_fault(FaultKind::CleanupPanic, route, seq, version, message);
        }
    }
    let released = node.pool().release(ticket);
    tracing::trace!(route, seq, version, released, "claim finalized");
    released
}

impl Request {
    /// Continues this request on a worker.
    ///
    /// Claims the context under a new ticket (superseding the owner's claim
    /// and any earlier task), cancels cleanup deferred before this call, and
    /// submits `continuation`. Once the continuation completes, or panics,
    /// the cleanup chain fires and the context is released, but only if no
    /// newer claim has been made in the meantime. Panics are reported to the
    /// node's fault sink.
    ///
    /// The continuation's handle is bound to the new claim. Calling `task` on
    /// a stale handle submits nothing.
    pub fn task<F, Fut>(&self, continuation: F)
    where
        F: FnOnce(Request) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (ticket, superseded, route, seq) = {
            let Some(mut state) = self.state() else {
                tracing::debug!("task on stale request dropped");
                return;
            };
            let ticket = ClaimTicket::mint(self.slot());
            (ticket, state.chain.take(), state.message.route, state.message.seq)
        };
        if let Some(chain) = superseded {
            let discarded = chain.cancel();
            if discarded > 0 {
                tracing::trace!(discarded, route, seq, "cleanup of superseded claim canceled");
            }
        }

        let version = ticket.version();
        let request = self.bound_to(version);
        let node = Arc::clone(self.node());

        let job = async move {
            let outcome = AssertUnwindSafe(async move { continuation(request).await })
                .catch_unwind()
                .await;
            if let Err(payload) = outcome {
                metrics::counter!("hearth_task_panics_total").increment(1);
                node.report_fault(
                    FaultKind::TaskPanic,
                    route,
                    seq,
                    version,
                    panic_message(payload.as_ref()),
                );
            }
            finalize(&node, ticket, route, seq);
        };

        metrics::counter!("hearth_tasks_submitted_total").increment(1);
        tracing::debug!(route, seq, version, "task submitted");
        self.node().submitter().submit(Box::pin(job));
    }
}

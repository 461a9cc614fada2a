//! Cancelable cleanup chain.
//!
//! Handlers register zero-argument callbacks that run when the unit of work
//! they belong to finishes, the way a scoped `defer` would, except that the
//! whole chain can be canceled before it fires. Head registrations form a
//! stack (last registered runs first); tail registrations form a queue that
//! runs, in registration order, after every head entry.
//!
//! State machine: `Empty -> Armed -> Firing -> Fired`, with `Canceled`
//! reachable from every non-terminal state. `Fired` and `Canceled` are
//! terminal; firing or canceling again is a no-op.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use parking_lot::Mutex;

use crate::fault::panic_message;

pub(crate) type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Lifecycle of a [`CleanupChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// Nothing registered yet.
    Empty,
    /// At least one callback is waiting.
    Armed,
    /// `fire()` is running callbacks.
    Firing,
    /// Every callback ran (or the chain was fired while empty).
    Fired,
    /// Pending callbacks were discarded.
    Canceled,
}

impl ChainState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, ChainState::Fired | ChainState::Canceled)
    }
}

/// Result of a single [`CleanupChain::fire`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FireReport {
    /// Callbacks that were invoked, including ones that panicked.
    pub invoked: usize,
    /// Panic messages of callbacks that panicked. Siblings still ran.
    pub panics: Vec<String>,
}

struct Inner {
    state: ChainState,
    head: Vec<Callback>,
    tail: VecDeque<Callback>,
}

impl Inner {
    fn pending(&self) -> usize {
        self.head.len() + self.tail.len()
    }
}

/// Ordered, cancelable list of cleanup callbacks.
///
/// The lock is never held while a callback runs, so a callback may register
/// more callbacks (they join the current pass) or cancel the chain (the
/// remaining callbacks are skipped).
pub struct CleanupChain {
    inner: Mutex<Inner>,
}

impl CleanupChain {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ChainState::Empty,
                head: Vec::new(),
                tail: VecDeque::new(),
            }),
        }
    }

    /// Registers a callback that runs before everything registered earlier.
    ///
    /// Returns `false` if the chain is already terminal and the callback was
    /// dropped without running.
    pub fn add_head<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.register(Box::new(f), true).is_ok()
    }

    /// Registers a callback that runs after all head entries and after every
    /// tail entry registered earlier.
    ///
    /// Returns `false` if the chain is already terminal.
    pub fn add_tail<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.register(Box::new(f), false).is_ok()
    }

    /// Hands `f` back if the chain is terminal.
    pub(crate) fn register(&self, f: Callback, head: bool) -> Result<(), Callback> {
        let mut inner = self.inner.lock();
        match inner.state {
            ChainState::Fired | ChainState::Canceled => return Err(f),
            ChainState::Empty => inner.state = ChainState::Armed,
            ChainState::Armed | ChainState::Firing => {}
        }
        if head {
            inner.head.push(f);
        } else {
            inner.tail.push_back(f);
        }
        Ok(())
    }

    /// Runs every pending callback once: head entries newest-first, then tail
    /// entries oldest-first.
    ///
    /// A panicking callback is caught and recorded; the rest still run.
    /// Firing a chain that already fired or was canceled does nothing.
    pub fn fire(&self) -> FireReport {
        let mut report = FireReport::default();
        {
            let mut inner = self.inner.lock();
            match inner.state {
                ChainState::Empty | ChainState::Armed => inner.state = ChainState::Firing,
                ChainState::Firing | ChainState::Fired | ChainState::Canceled => return report,
            }
        }

        loop {
            let next = {
                let mut inner = self.inner.lock();
                if inner.state != ChainState::Firing {
                    break;
                }
                match inner.head.pop() {
                    Some(f) => Some(f),
                    None => inner.tail.pop_front(),
                }
            };
            let Some(f) = next else {
                break;
            };

            report.invoked += 1;
            if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
                let message = panic_message(payload.as_ref());
                tracing::warn!(panic = %message, "cleanup callback panicked");
                report.panics.push(message);
            }
        }

        let mut inner = self.inner.lock();
        if inner.state == ChainState::Firing {
            inner.state = ChainState::Fired;
        }
        report
    }

    /// Discards every callback that has not run yet.
    ///
    /// Returns how many callbacks were discarded. Safe to call before, during,
    /// or after firing; after the chain is terminal it returns 0.
    pub fn cancel(&self) -> usize {
        let (head, tail) = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return 0;
            }
            inner.state = ChainState::Canceled;
            (
                std::mem::take(&mut inner.head),
                std::mem::take(&mut inner.tail),
            )
        };
        // Dropped outside the lock: captured values may have their own drop logic.
        head.len() + tail.len()
    }

    #[must_use]
    pub fn state(&self) -> ChainState {
        self.inner.lock().state
    }

    /// Number of callbacks still waiting to run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().pending()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CleanupChain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CleanupChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CleanupChain")
            .field("state", &inner.state)
            .field("pending", &inner.pending())
            .finish()
    }
}

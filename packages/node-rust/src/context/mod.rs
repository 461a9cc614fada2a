//! Per-message request contexts.
//!
//! Holds the [`Request`] handle and everything that keeps a pooled context
//! safe to reuse: the cleanup chain, the version guard with its claim tickets,
//! the context pool, and the task dispatcher.

mod binding;
pub mod chain;
pub mod error;
pub mod pool;
pub mod reply;
pub mod request;
pub(crate) mod slot;
pub mod source;
pub mod task;
pub mod version;

pub use chain::{ChainState, CleanupChain, FireReport};
pub use error::ContextError;
pub use pool::ContextPool;
pub use reply::{route_reply, ReplyRoute};
pub use request::Request;
pub use source::Source;
pub use task::{Job, TaskSubmitter, TokioSubmitter};
pub use version::{ClaimTicket, VersionGuard};

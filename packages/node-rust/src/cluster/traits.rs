//! Cluster collaborator traits.
//!
//! Defines the contracts a request context consumes: the local actor
//! `Scheduler` (and the `Actor` handles it returns) and the cluster `Proxy`
//! that reaches gateways and other nodes. These are trait-only definitions;
//! the node is wired with concrete implementations at construction.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use hearth_core::{
    DeliverArgs, DisconnectArgs, GetIpArgs, Message, Processor, ProcessorContext, PushArgs,
};
use tokio_util::sync::CancellationToken;

use crate::context::Request;

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Builds the behavior hosted by a newly spawned actor.
pub type Creator = Box<dyn FnOnce(ProcessorContext) -> Box<dyn Processor> + Send>;

/// Options for spawning an actor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorOptions {
    /// Actor kind, e.g. `"room"`.
    pub kind: String,
    /// Actor id, unique within its kind.
    pub id: String,
    /// Opaque creation arguments passed through to the scheduler.
    pub args: Vec<rmpv::Value>,
}

impl ActorOptions {
    #[must_use]
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<rmpv::Value>) -> Self {
        self.args = args;
        self
    }
}

/// Handle to a live actor owned by the scheduler.
#[async_trait]
pub trait Actor: Send + Sync + fmt::Debug {
    /// Opaque process id, as recorded in `Source::Actor`.
    fn pid(&self) -> &str;

    fn kind(&self) -> &str;

    fn id(&self) -> &str;

    /// Enqueues `message` in the actor's mailbox on behalf of user `uid`
    /// (0 when unbound).
    async fn deliver(&self, uid: i64, message: Message) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Local actor lifecycle and message dispatch.
#[async_trait]
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Routes a request onward, typically into the mailbox of the actor the
    /// user is bound to for the request's route.
    async fn dispatch(&self, request: Request) -> anyhow::Result<()>;

    /// Binds user `uid` to the actor `kind/id`.
    async fn bind_actor(&self, uid: i64, kind: &str, id: &str) -> anyhow::Result<()>;

    /// Removes user `uid`'s binding for actors of `kind`.
    async fn unbind_actor(&self, uid: i64, kind: &str);

    /// Creates and starts a new actor.
    async fn spawn(&self, creator: Creator, options: ActorOptions)
        -> anyhow::Result<Arc<dyn Actor>>;

    /// Destroys actor `kind/id`. Returns `false` if no such actor exists.
    async fn kill(&self, kind: &str, id: &str) -> bool;

    /// Looks up an actor by kind and id.
    fn load(&self, kind: &str, id: &str) -> Option<Arc<dyn Actor>>;

    /// Looks up an actor by its opaque process id.
    fn load_by_pid(&self, pid: &str) -> Option<Arc<dyn Actor>>;
}

// ---------------------------------------------------------------------------
// Proxy
// ---------------------------------------------------------------------------

/// Cross-node and cross-gateway RPC.
///
/// Every call carries the request's cancellation token. The proxy may honor
/// it; the request context never inspects it.
#[async_trait]
pub trait Proxy: Send + Sync + fmt::Debug {
    /// Binds user `uid` to connection `cid` on gateway `gid`.
    async fn bind_gate(
        &self,
        cx: &CancellationToken,
        gid: &str,
        cid: i64,
        uid: i64,
    ) -> anyhow::Result<()>;

    /// Removes user `uid`'s gateway binding.
    async fn unbind_gate(&self, cx: &CancellationToken, uid: i64) -> anyhow::Result<()>;

    /// Binds user `uid` to this node.
    async fn bind_node(&self, cx: &CancellationToken, uid: i64) -> anyhow::Result<()>;

    /// Removes user `uid`'s node binding.
    async fn unbind_node(&self, cx: &CancellationToken, uid: i64) -> anyhow::Result<()>;

    /// Remote address of a gateway session.
    async fn get_ip(&self, cx: &CancellationToken, args: GetIpArgs) -> anyhow::Result<String>;

    /// Delivers a message to a node.
    async fn deliver(&self, cx: &CancellationToken, args: DeliverArgs) -> anyhow::Result<()>;

    /// Pushes a message to a gateway session.
    async fn push(&self, cx: &CancellationToken, args: PushArgs) -> anyhow::Result<()>;

    /// Closes a gateway session.
    async fn disconnect(&self, cx: &CancellationToken, args: DisconnectArgs)
        -> anyhow::Result<()>;
}

//! The owning node: configuration plus every collaborator a request context
//! reaches through its back-link.

use std::sync::Arc;

use hearth_core::{Codec, Encryptor, Message};

use crate::cluster::{Proxy, Scheduler};
use crate::config::NodeConfig;
use crate::context::{ContextPool, Request, Source, TaskSubmitter, TokioSubmitter};
use crate::fault::{Fault, FaultKind, FaultSink, TracingFaultSink};

/// Errors from assembling a [`Node`].
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("node id must not be empty")]
    MissingNodeId,
    #[error("no scheduler configured")]
    MissingScheduler,
    #[error("no proxy configured")]
    MissingProxy,
    #[error("no task submitter configured and no tokio runtime is running")]
    NoRuntime,
}

/// A cluster node as seen by its request contexts.
///
/// Owns the context pool and the task submitter; both are passed in (or
/// derived from configuration) at build time rather than reached through
/// process-wide state.
#[derive(Debug)]
pub struct Node {
    config: NodeConfig,
    scheduler: Arc<dyn Scheduler>,
    proxy: Arc<dyn Proxy>,
    codec: Arc<dyn Codec>,
    encryptor: Option<Arc<dyn Encryptor>>,
    pool: ContextPool,
    submitter: Arc<dyn TaskSubmitter>,
    faults: Arc<dyn FaultSink>,
}

impl Node {
    #[must_use]
    pub fn builder(config: NodeConfig) -> NodeBuilder {
        NodeBuilder {
            config,
            scheduler: None,
            proxy: None,
            codec: None,
            encryptor: None,
            submitter: None,
            faults: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.config.node_id
    }

    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    #[must_use]
    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    #[must_use]
    pub fn proxy(&self) -> &Arc<dyn Proxy> {
        &self.proxy
    }

    #[must_use]
    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    #[must_use]
    pub fn encryptor(&self) -> Option<&dyn Encryptor> {
        self.encryptor.as_deref()
    }

    #[must_use]
    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    #[must_use]
    pub fn submitter(&self) -> &Arc<dyn TaskSubmitter> {
        &self.submitter
    }

    /// Takes a blank, unclaimed context from the pool.
    #[must_use]
    pub fn acquire(self: &Arc<Self>) -> Request {
        Request::new(Arc::clone(self), self.pool.acquire())
    }

    /// Takes a context from the pool and fills in its routing identity.
    #[must_use]
    pub fn request(self: &Arc<Self>, source: Source, uid: Option<i64>, message: Message) -> Request {
        let request = self.acquire();
        request.populate(source, uid, message);
        request
    }

    pub(crate) fn report_fault(
        &self,
        kind: FaultKind,
        route: i32,
        seq: i32,
        version: u64,
        message: String,
    ) {
        self.faults.report(Fault {
            kind,
            node_id: self.config.node_id.clone(),
            route,
            seq,
            version,
            message,
        });
    }
}

// ---------------------------------------------------------------------------
// NodeBuilder
// ---------------------------------------------------------------------------

/// Assembles a [`Node`]. Scheduler and proxy are required; everything else
/// has a default.
pub struct NodeBuilder {
    config: NodeConfig,
    scheduler: Option<Arc<dyn Scheduler>>,
    proxy: Option<Arc<dyn Proxy>>,
    codec: Option<Arc<dyn Codec>>,
    encryptor: Option<Arc<dyn Encryptor>>,
    submitter: Option<Arc<dyn TaskSubmitter>>,
    faults: Option<Arc<dyn FaultSink>>,
}

impl NodeBuilder {
    #[must_use]
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    #[must_use]
    pub fn proxy(mut self, proxy: Arc<dyn Proxy>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Overrides the codec selected by `NodeConfig::codec`.
    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Decrypt gateway payloads with `encryptor` before decoding.
    #[must_use]
    pub fn encryptor(mut self, encryptor: Arc<dyn Encryptor>) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    /// Runs task continuations through `submitter`. Defaults to a
    /// [`TokioSubmitter`] on the current runtime.
    #[must_use]
    pub fn submitter(mut self, submitter: Arc<dyn TaskSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    /// Reports isolated faults to `sink`. Defaults to [`TracingFaultSink`].
    #[must_use]
    pub fn fault_sink(mut self, sink: Arc<dyn FaultSink>) -> Self {
        self.faults = Some(sink);
        self
    }

    /// Validates the configuration and builds the node.
    ///
    /// # Errors
    ///
    /// Returns `NodeError` if the node id is empty, the scheduler or proxy is
    /// missing, or no submitter was given and there is no current tokio
    /// runtime to default to.
    pub fn build(self) -> Result<Arc<Node>, NodeError> {
        if self.config.node_id.is_empty() {
            return Err(NodeError::MissingNodeId);
        }
        let scheduler = self.scheduler.ok_or(NodeError::MissingScheduler)?;
        let proxy = self.proxy.ok_or(NodeError::MissingProxy)?;
        let submitter = match self.submitter {
            Some(submitter) => submitter,
            None => {
                let tokio = TokioSubmitter::try_current().map_err(|_| NodeError::NoRuntime)?;
                Arc::new(tokio.with_limit(self.config.max_concurrent_tasks))
            }
        };
        let codec = self.codec.unwrap_or_else(|| self.config.codec.build());
        let faults = self
            .faults
            .unwrap_or_else(|| Arc::new(TracingFaultSink) as Arc<dyn FaultSink>);

        let pool = ContextPool::new(self.config.pool_capacity);
        pool.prewarm(self.config.pool_prewarm);

        tracing::info!(
            node_id = %self.config.node_id,
            codec = codec.name(),
            encrypted = self.encryptor.is_some(),
            pool_capacity = self.config.pool_capacity,
            "node ready"
        );

        Ok(Arc::new(Node {
            config: self.config,
            scheduler,
            proxy,
            codec,
            encryptor: self.encryptor,
            pool,
            submitter,
            faults,
        }))
    }
}

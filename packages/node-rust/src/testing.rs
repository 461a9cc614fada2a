//! In-memory collaborators shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use hearth_core::{
    CryptoError, DeliverArgs, DisconnectArgs, Encryptor, GetIpArgs, Message, Processor,
    ProcessorContext, PushArgs,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::cluster::{Actor, ActorOptions, Creator, Proxy, Scheduler};
use crate::config::NodeConfig;
use crate::context::{Job, Request, TaskSubmitter, TokioSubmitter};
use crate::fault::{Fault, FaultSink};
use crate::node::{Node, NodeBuilder};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A node wired to mocks, with handles to each mock for assertions.
pub struct Harness {
    pub node: Arc<Node>,
    pub proxy: Arc<MockProxy>,
    pub scheduler: Arc<MockScheduler>,
    /// Receives task jobs unless the builder was given another submitter.
    pub submitter: Arc<ManualSubmitter>,
    pub faults: Arc<RecordingFaultSink>,
}

impl Harness {
    pub fn new(node_id: &str) -> Self {
        Self::build(node_id, |builder| builder)
    }

    /// Runs task jobs on the current tokio runtime instead of queueing them.
    pub fn with_tokio(node_id: &str) -> Self {
        Self::build(node_id, |builder| {
            builder.submitter(Arc::new(TokioSubmitter::try_current().unwrap()))
        })
    }

    pub fn build(node_id: &str, configure: impl FnOnce(NodeBuilder) -> NodeBuilder) -> Self {
        let proxy = Arc::new(MockProxy::default());
        let scheduler = Arc::new(MockScheduler::default());
        let submitter = Arc::new(ManualSubmitter::default());
        let faults = Arc::new(RecordingFaultSink::default());

        let builder = Node::builder(NodeConfig::with_node_id(node_id))
            .proxy(Arc::clone(&proxy) as Arc<dyn Proxy>)
            .scheduler(Arc::clone(&scheduler) as Arc<dyn Scheduler>)
            .submitter(Arc::clone(&submitter) as Arc<dyn TaskSubmitter>)
            .fault_sink(Arc::clone(&faults) as Arc<dyn FaultSink>);
        let node = configure(builder).build().unwrap();

        Self {
            node,
            proxy,
            scheduler,
            submitter,
            faults,
        }
    }
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// Shared, ordered record of events.
#[derive(Debug, Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: &str) {
        self.0.lock().push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

// ---------------------------------------------------------------------------
// ManualSubmitter
// ---------------------------------------------------------------------------

/// Queues jobs until the test runs them.
#[derive(Default)]
pub struct ManualSubmitter {
    queue: Mutex<VecDeque<Job>>,
}

impl std::fmt::Debug for ManualSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualSubmitter")
            .field("pending", &self.pending())
            .finish()
    }
}

impl ManualSubmitter {
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn take_next(&self) -> Option<Job> {
        self.queue.lock().pop_front()
    }

    /// Runs the oldest queued job to completion.
    pub async fn run_next(&self) {
        let job = self.take_next().unwrap();
        job.await;
    }

    /// Runs queued jobs, including ones queued while running, until none are left.
    pub async fn run_all(&self) {
        while let Some(job) = self.take_next() {
            job.await;
        }
    }
}

impl TaskSubmitter for ManualSubmitter {
    fn submit(&self, job: Job) {
        self.queue.lock().push_back(job);
    }
}

// ---------------------------------------------------------------------------
// RecordingFaultSink
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingFaultSink {
    faults: Mutex<Vec<Fault>>,
}

impl RecordingFaultSink {
    pub fn faults(&self) -> Vec<Fault> {
        self.faults.lock().clone()
    }
}

impl FaultSink for RecordingFaultSink {
    fn report(&self, fault: Fault) {
        self.faults.lock().push(fault);
    }
}

// ---------------------------------------------------------------------------
// ReverseEncryptor
// ---------------------------------------------------------------------------

/// Byte-reversing cipher. Refuses to decrypt [`Self::POISON`].
#[derive(Debug)]
pub struct ReverseEncryptor;

impl ReverseEncryptor {
    pub const POISON: &'static [u8] = b"\xde\xad";
}

impl Encryptor for ReverseEncryptor {
    fn name(&self) -> &'static str {
        "reverse"
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data == Self::POISON {
            return Err(CryptoError::Decrypt("bad mac".to_string()));
        }
        Ok(data.iter().rev().copied().collect())
    }
}

// ---------------------------------------------------------------------------
// MockProxy
// ---------------------------------------------------------------------------

/// Binding calls seen by [`MockProxy`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Gate { gid: String, cid: i64, uid: i64 },
    UnbindGate { uid: i64 },
    Node { uid: i64 },
    UnbindNode { uid: i64 },
}

#[derive(Debug, Default)]
pub struct MockProxy {
    pushes: Mutex<Vec<PushArgs>>,
    delivers: Mutex<Vec<DeliverArgs>>,
    disconnects: Mutex<Vec<DisconnectArgs>>,
    bindings: Mutex<Vec<Binding>>,
    failure: Mutex<Option<String>>,
}

impl MockProxy {
    /// Makes every later call fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    pub fn pushes(&self) -> Vec<PushArgs> {
        self.pushes.lock().clone()
    }

    pub fn delivers(&self) -> Vec<DeliverArgs> {
        self.delivers.lock().clone()
    }

    pub fn disconnects(&self) -> Vec<DisconnectArgs> {
        self.disconnects.lock().clone()
    }

    pub fn bindings(&self) -> Vec<Binding> {
        self.bindings.lock().clone()
    }

    fn check(&self) -> anyhow::Result<()> {
        match self.failure.lock().as_deref() {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Proxy for MockProxy {
    async fn bind_gate(
        &self,
        _cx: &CancellationToken,
        gid: &str,
        cid: i64,
        uid: i64,
    ) -> anyhow::Result<()> {
        self.check()?;
        self.bindings.lock().push(Binding::Gate {
            gid: gid.to_string(),
            cid,
            uid,
        });
        Ok(())
    }

    async fn unbind_gate(&self, _cx: &CancellationToken, uid: i64) -> anyhow::Result<()> {
        self.check()?;
        self.bindings.lock().push(Binding::UnbindGate { uid });
        Ok(())
    }

    async fn bind_node(&self, _cx: &CancellationToken, uid: i64) -> anyhow::Result<()> {
        self.check()?;
        self.bindings.lock().push(Binding::Node { uid });
        Ok(())
    }

    async fn unbind_node(&self, _cx: &CancellationToken, uid: i64) -> anyhow::Result<()> {
        self.check()?;
        self.bindings.lock().push(Binding::UnbindNode { uid });
        Ok(())
    }

    async fn get_ip(&self, _cx: &CancellationToken, _args: GetIpArgs) -> anyhow::Result<String> {
        self.check()?;
        Ok("10.0.0.1".to_string())
    }

    async fn deliver(&self, _cx: &CancellationToken, args: DeliverArgs) -> anyhow::Result<()> {
        self.check()?;
        self.delivers.lock().push(args);
        Ok(())
    }

    async fn push(&self, _cx: &CancellationToken, args: PushArgs) -> anyhow::Result<()> {
        self.check()?;
        self.pushes.lock().push(args);
        Ok(())
    }

    async fn disconnect(
        &self,
        _cx: &CancellationToken,
        args: DisconnectArgs,
    ) -> anyhow::Result<()> {
        self.check()?;
        self.disconnects.lock().push(args);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockActor
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MockActor {
    kind: String,
    id: String,
    pid: String,
    delivered: Mutex<Vec<(i64, Message)>>,
}

impl MockActor {
    pub fn new(kind: &str, id: &str) -> Self {
        Self {
            kind: kind.to_string(),
            id: id.to_string(),
            pid: format!("{kind}/{id}"),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn delivered(&self) -> Vec<(i64, Message)> {
        self.delivered.lock().clone()
    }
}

#[async_trait]
impl Actor for MockActor {
    fn pid(&self) -> &str {
        &self.pid
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn id(&self) -> &str {
        &self.id
    }

    async fn deliver(&self, uid: i64, message: Message) -> anyhow::Result<()> {
        self.delivered.lock().push((uid, message));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockScheduler
// ---------------------------------------------------------------------------

/// Actor binding calls: `(uid, kind, Some(id))` for bind, `None` for unbind.
pub type ActorBinding = (i64, String, Option<String>);

#[derive(Default)]
pub struct MockScheduler {
    actors: Mutex<HashMap<String, Arc<dyn Actor>>>,
    processors: Mutex<HashMap<String, Box<dyn Processor>>>,
    dispatched: Mutex<Vec<(i32, i32)>>,
    handed: Mutex<Vec<Request>>,
    bindings: Mutex<Vec<ActorBinding>>,
    dispatch_failure: Mutex<Option<String>>,
}

impl std::fmt::Debug for MockScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockScheduler")
            .field("actors", &self.actors.lock().len())
            .finish_non_exhaustive()
    }
}

impl MockScheduler {
    pub fn insert(&self, actor: Arc<MockActor>) {
        let pid = actor.pid().to_string();
        self.actors.lock().insert(pid, actor);
    }

    /// `(route, seq)` of every dispatched request.
    pub fn dispatched(&self) -> Vec<(i32, i32)> {
        self.dispatched.lock().clone()
    }

    /// Takes the handles the scheduler received, oldest first.
    pub fn take_handed(&self) -> Vec<Request> {
        std::mem::take(&mut *self.handed.lock())
    }

    pub fn bindings(&self) -> Vec<ActorBinding> {
        self.bindings.lock().clone()
    }

    pub fn fail_dispatch(&self, message: &str) {
        *self.dispatch_failure.lock() = Some(message.to_string());
    }
}

#[async_trait]
impl Scheduler for MockScheduler {
    async fn dispatch(&self, request: Request) -> anyhow::Result<()> {
        if let Some(message) = self.dispatch_failure.lock().as_deref() {
            return Err(anyhow::anyhow!("{message}"));
        }
        self.dispatched.lock().push((request.route(), request.seq()));
        self.handed.lock().push(request);
        Ok(())
    }

    async fn bind_actor(&self, uid: i64, kind: &str, id: &str) -> anyhow::Result<()> {
        self.bindings
            .lock()
            .push((uid, kind.to_string(), Some(id.to_string())));
        Ok(())
    }

    async fn unbind_actor(&self, uid: i64, kind: &str) {
        self.bindings.lock().push((uid, kind.to_string(), None));
    }

    async fn spawn(
        &self,
        creator: Creator,
        options: ActorOptions,
    ) -> anyhow::Result<Arc<dyn Actor>> {
        let cx = ProcessorContext {
            kind: options.kind.clone(),
            id: options.id.clone(),
        };
        let pid = cx.pid();
        if self.actors.lock().contains_key(&pid) {
            anyhow::bail!("actor {pid} already exists");
        }

        let mut processor = creator(cx);
        processor.init().await?;
        processor.start().await?;

        let actor: Arc<dyn Actor> = Arc::new(MockActor::new(&options.kind, &options.id));
        self.actors.lock().insert(pid.clone(), Arc::clone(&actor));
        self.processors.lock().insert(pid, processor);
        Ok(actor)
    }

    async fn kill(&self, kind: &str, id: &str) -> bool {
        let pid = format!("{kind}/{id}");
        let removed = self.actors.lock().remove(&pid).is_some();
        let processor = self.processors.lock().remove(&pid);
        if let Some(mut processor) = processor {
            processor.destroy().await;
        }
        removed
    }

    fn load(&self, kind: &str, id: &str) -> Option<Arc<dyn Actor>> {
        self.actors.lock().get(&format!("{kind}/{id}")).cloned()
    }

    fn load_by_pid(&self, pid: &str) -> Option<Arc<dyn Actor>> {
        self.actors.lock().get(pid).cloned()
    }
}

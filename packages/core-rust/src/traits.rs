use async_trait::async_trait;

/// Identity handed to a [`Processor`] when its actor is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorContext {
    /// Actor kind, e.g. `"room"`.
    pub kind: String,
    /// Actor id, unique within its kind.
    pub id: String,
}

impl ProcessorContext {
    /// Opaque process id in the form `kind/id`.
    #[must_use]
    pub fn pid(&self) -> String {
        format!("{}/{}", self.kind, self.id)
    }
}

/// Behavior hosted by an actor.
/// The scheduler drives the lifecycle: `init` once, `start` once, then messages,
/// then `destroy` when the actor is killed.
#[async_trait]
pub trait Processor: Send + 'static {
    /// One-time initialization before the actor is visible to lookups.
    async fn init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after registration, before the first message.
    async fn start(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Release resources. Called once when the actor is killed.
    async fn destroy(&mut self) {}
}

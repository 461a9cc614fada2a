//! User bindings and actor lifecycle, reached through the request.
//!
//! Binding calls act for an explicit user id when given one and otherwise
//! for the user bound to the request. Without either there is nobody to bind.

use std::sync::Arc;

use super::error::ContextError;
use super::request::{Request, Routing};
use super::source::Source;
use crate::cluster::{Actor, ActorOptions, Creator};

impl Request {
    fn resolve_uid(routing: &Routing, explicit: Option<i64>) -> Result<i64, ContextError> {
        explicit
            .filter(|uid| *uid != 0)
            .or(routing.uid)
            .ok_or(ContextError::IllegalOperation("no user id bound to request"))
    }

    /// Binds a user to the gateway connection the request came from.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::IllegalOperation` for non-gateway requests or
    /// when no user id is available, or the proxy's error unchanged.
    pub async fn bind_gate(&self, uid: Option<i64>) -> Result<(), ContextError> {
        let routing = self.routing()?;
        let uid = Self::resolve_uid(&routing, uid)?;
        let Source::Gateway { gid, cid } = &routing.source else {
            return Err(ContextError::IllegalOperation("bind_gate requires a gateway source"));
        };
        self.proxy()
            .bind_gate(&routing.cancellation, gid, *cid, uid)
            .await?;
        tracing::debug!(gid = %gid, cid, uid, "user bound to gateway");
        Ok(())
    }

    /// Removes a user's gateway binding.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::IllegalOperation` when no user id is available,
    /// or the proxy's error unchanged.
    pub async fn unbind_gate(&self, uid: Option<i64>) -> Result<(), ContextError> {
        let routing = self.routing()?;
        let uid = Self::resolve_uid(&routing, uid)?;
        self.proxy().unbind_gate(&routing.cancellation, uid).await?;
        Ok(())
    }

    /// Binds a user to this node.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::IllegalOperation` when no user id is available,
    /// or the proxy's error unchanged.
    pub async fn bind_node(&self, uid: Option<i64>) -> Result<(), ContextError> {
        let routing = self.routing()?;
        let uid = Self::resolve_uid(&routing, uid)?;
        self.proxy().bind_node(&routing.cancellation, uid).await?;
        tracing::debug!(node_id = %self.node().id(), uid, "user bound to node");
        Ok(())
    }

    /// Removes a user's node binding.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::IllegalOperation` when no user id is available,
    /// or the proxy's error unchanged.
    pub async fn unbind_node(&self, uid: Option<i64>) -> Result<(), ContextError> {
        let routing = self.routing()?;
        let uid = Self::resolve_uid(&routing, uid)?;
        self.proxy().unbind_node(&routing.cancellation, uid).await?;
        Ok(())
    }

    /// Binds the request's user to actor `kind/id`.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::IllegalOperation` when the request has no user,
    /// or the scheduler's error unchanged.
    pub async fn bind_actor(&self, kind: &str, id: &str) -> Result<(), ContextError> {
        let uid = Self::resolve_uid(&self.routing()?, None)?;
        self.node().scheduler().bind_actor(uid, kind, id).await?;
        Ok(())
    }

    /// Removes the request user's binding for actors of `kind`.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::IllegalOperation` when the request has no user.
    pub async fn unbind_actor(&self, kind: &str) -> Result<(), ContextError> {
        let uid = Self::resolve_uid(&self.routing()?, None)?;
        self.node().scheduler().unbind_actor(uid, kind).await;
        Ok(())
    }

    /// Spawns a new actor on this node.
    ///
    /// # Errors
    ///
    /// Returns the scheduler's error unchanged.
    pub async fn spawn(
        &self,
        creator: Creator,
        options: ActorOptions,
    ) -> Result<Arc<dyn Actor>, ContextError> {
        Ok(self.node().scheduler().spawn(creator, options).await?)
    }

    /// Destroys actor `kind/id`. Returns `false` if it does not exist.
    pub async fn kill(&self, kind: &str, id: &str) -> bool {
        self.node().scheduler().kill(kind, id).await
    }

    /// Looks up actor `kind/id` on this node.
    #[must_use]
    pub fn actor(&self, kind: &str, id: &str) -> Option<Arc<dyn Actor>> {
        self.node().scheduler().load(kind, id)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use hearth_core::{Message, Processor, ProcessorContext};

    use super::*;
    use crate::testing::{Binding, Harness};

    struct Room;

    #[async_trait]
    impl Processor for Room {}

    #[tokio::test]
    async fn bind_gate_uses_explicit_uid_then_bound_uid() {
        let h = Harness::new("node-1");
        let request = h.node.request(Source::gateway("g1", 42), Some(1001), Message::default());

        request.bind_gate(Some(2002)).await.unwrap();
        request.bind_gate(None).await.unwrap();

        assert_eq!(
            h.proxy.bindings(),
            vec![
                Binding::Gate {
                    gid: "g1".to_string(),
                    cid: 42,
                    uid: 2002
                },
                Binding::Gate {
                    gid: "g1".to_string(),
                    cid: 42,
                    uid: 1001
                },
            ]
        );
    }

    #[tokio::test]
    async fn binding_without_uid_is_illegal() {
        let h = Harness::new("node-1");
        let request = h.node.request(Source::gateway("g1", 42), None, Message::default());

        for result in [
            request.bind_gate(None).await,
            request.unbind_gate(None).await,
            request.bind_node(None).await,
            request.unbind_node(Some(0)).await,
            request.bind_actor("room", "1").await,
            request.unbind_actor("room").await,
        ] {
            assert!(matches!(result, Err(ContextError::IllegalOperation(_))));
        }
        assert!(h.proxy.bindings().is_empty());
        assert!(h.scheduler.bindings().is_empty());
    }

    #[tokio::test]
    async fn bind_gate_requires_gateway_source() {
        let h = Harness::new("node-1");
        let request = h.node.request(Source::node("node-2"), Some(1001), Message::default());
        let err = request.bind_gate(None).await.unwrap_err();
        assert!(matches!(err, ContextError::IllegalOperation(_)));
    }

    #[tokio::test]
    async fn stale_handle_binds_nobody() {
        let h = Harness::new("node-1");
        let request = h.node.request(Source::gateway("g1", 42), Some(1001), Message::default());
        let kept = request.share();
        let ticket = request.claim().unwrap();
        assert!(request.finish(ticket));

        // Even an explicit uid is refused once the context was recycled.
        for result in [
            kept.bind_gate(Some(7)).await,
            kept.unbind_gate(Some(7)).await,
            kept.bind_node(Some(7)).await,
            kept.unbind_node(Some(7)).await,
            kept.bind_actor("room", "1").await,
            kept.unbind_actor("room").await,
        ] {
            assert!(matches!(result, Err(ContextError::Stale)));
        }
        assert!(h.proxy.bindings().is_empty());
        assert!(h.scheduler.bindings().is_empty());
    }

    #[tokio::test]
    async fn node_bindings_pass_through() {
        let h = Harness::new("node-1");
        let request = h.node.request(Source::node("node-2"), Some(7), Message::default());

        request.bind_node(None).await.unwrap();
        request.unbind_node(Some(8)).await.unwrap();
        request.unbind_gate(None).await.unwrap();

        assert_eq!(
            h.proxy.bindings(),
            vec![
                Binding::Node { uid: 7 },
                Binding::UnbindNode { uid: 8 },
                Binding::UnbindGate { uid: 7 },
            ]
        );
    }

    #[tokio::test]
    async fn actor_binding_uses_request_uid() {
        let h = Harness::new("node-1");
        let request = h.node.request(Source::gateway("g1", 1), Some(55), Message::default());

        request.bind_actor("room", "9").await.unwrap();
        request.unbind_actor("room").await.unwrap();

        assert_eq!(
            h.scheduler.bindings(),
            vec![
                (55, "room".to_string(), Some("9".to_string())),
                (55, "room".to_string(), None),
            ]
        );
    }

    #[tokio::test]
    async fn spawn_load_and_kill_round_through_scheduler() {
        let h = Harness::new("node-1");
        let request = h.node.request(Source::Local, None, Message::default());

        let creator: Creator = Box::new(|_cx: ProcessorContext| Box::new(Room) as Box<dyn Processor>);
        let actor = request
            .spawn(creator, ActorOptions::new("room", "9"))
            .await
            .unwrap();
        assert_eq!(actor.pid(), "room/9");

        let found = request.actor("room", "9").unwrap();
        assert_eq!(found.pid(), "room/9");

        assert!(request.kill("room", "9").await);
        assert!(!request.kill("room", "9").await);
        assert!(request.actor("room", "9").is_none());
    }

    #[tokio::test]
    async fn spawn_error_passes_through() {
        let h = Harness::new("node-1");
        let request = h.node.request(Source::Local, None, Message::default());
        let creator: Creator = Box::new(|_cx: ProcessorContext| Box::new(Room) as Box<dyn Processor>);

        request
            .spawn(creator, ActorOptions::new("room", "1"))
            .await
            .unwrap();
        let again: Creator = Box::new(|_cx: ProcessorContext| Box::new(Room) as Box<dyn Processor>);
        let err = request
            .spawn(again, ActorOptions::new("room", "1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "actor room/1 already exists");
    }
}

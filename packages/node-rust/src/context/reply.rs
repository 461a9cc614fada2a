//! Replying to whoever sent the request.
//!
//! Where a reply goes depends only on the recorded source: gateway sessions
//! get a push, other nodes get a deliver, local actors get a mailbox message.

use hearth_core::{
    DeliverArgs, DisconnectArgs, GetIpArgs, Message, Payload, PushArgs, SessionKind,
};
use serde::Serialize;

use super::error::ContextError;
use super::request::Request;
use super::source::Source;

/// Where a reply for a given source must be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyRoute {
    /// Push to connection `cid` on gateway `gid`.
    Gateway { gid: String, cid: i64 },
    /// Deliver to another node.
    Node { nid: String },
    /// The request came from this node; nothing to send.
    SelfNode,
    /// Deliver into the mailbox of local actor `pid`.
    Actor { pid: String },
    /// No reply channel.
    Unroutable,
}

/// Resolves the reply route for `source` as seen from node `self_id`.
#[must_use]
pub fn route_reply(source: &Source, self_id: &str) -> ReplyRoute {
    match source {
        Source::Gateway { gid, cid } => ReplyRoute::Gateway {
            gid: gid.clone(),
            cid: *cid,
        },
        Source::Node { nid } if nid == self_id => ReplyRoute::SelfNode,
        Source::Node { nid } => ReplyRoute::Node { nid: nid.clone() },
        Source::Actor { pid } => ReplyRoute::Actor { pid: pid.clone() },
        Source::Local => ReplyRoute::Unroutable,
    }
}

impl Request {
    /// Sends `message` back to the request's source.
    ///
    /// A reply to an actor that no longer exists is dropped and reported as
    /// success. A reply from this node to itself is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::IllegalOperation` when the request has no
    /// source, `ContextError::Stale` when the handle outlived its claim, or
    /// the proxy's or actor's error unchanged.
    pub async fn reply(&self, message: Message) -> Result<(), ContextError> {
        let routing = self.routing()?;
        let uid = routing.uid.unwrap_or_default();
        match route_reply(&routing.source, self.node().id()) {
            ReplyRoute::Gateway { gid, cid } => {
                let args = PushArgs {
                    gid,
                    kind: SessionKind::Conn,
                    target: cid,
                    message,
                };
                self.proxy().push(&routing.cancellation, args).await?;
            }
            ReplyRoute::Node { nid } => {
                let args = DeliverArgs { nid, uid, message };
                self.proxy().deliver(&routing.cancellation, args).await?;
            }
            ReplyRoute::SelfNode => {}
            ReplyRoute::Actor { pid } => match self.node().scheduler().load_by_pid(&pid) {
                Some(actor) => actor.deliver(uid, message).await?,
                None => tracing::debug!(pid = %pid, route = message.route, "reply target actor gone"),
            },
            ReplyRoute::Unroutable => {
                return Err(ContextError::IllegalOperation("request has no reply channel"));
            }
        }
        Ok(())
    }

    /// Replies with `payload`, echoing the inbound `seq` and `route`.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::Encode` if `payload` cannot be serialized, and
    /// otherwise the same errors as [`Request::reply`].
    pub async fn response<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), ContextError> {
        let data = Payload::from_serialize(payload)?;
        let message = Message::new(self.seq(), self.route(), data);
        self.reply(message).await
    }

    /// Closes the gateway session the request came from.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::IllegalOperation` for non-gateway requests, or
    /// the proxy's error unchanged.
    pub async fn disconnect(&self, force: bool) -> Result<(), ContextError> {
        let routing = self.routing()?;
        let Source::Gateway { gid, cid } = routing.source else {
            return Err(ContextError::IllegalOperation("disconnect requires a gateway source"));
        };
        let args = DisconnectArgs {
            gid,
            kind: SessionKind::Conn,
            target: cid,
            force,
        };
        self.proxy().disconnect(&routing.cancellation, args).await?;
        Ok(())
    }

    /// Remote address of the gateway session the request came from.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::IllegalOperation` for non-gateway requests, or
    /// the proxy's error unchanged.
    pub async fn get_ip(&self) -> Result<String, ContextError> {
        let routing = self.routing()?;
        let Source::Gateway { gid, cid } = routing.source else {
            return Err(ContextError::IllegalOperation("get_ip requires a gateway source"));
        };
        let args = GetIpArgs {
            gid,
            kind: SessionKind::Conn,
            target: cid,
        };
        Ok(self.proxy().get_ip(&routing.cancellation, args).await?)
    }

    /// Delivers `args` through the proxy as given.
    ///
    /// # Errors
    ///
    /// Returns `ContextError::Stale` when the handle outlived its claim, or
    /// the proxy's error unchanged.
    pub async fn deliver(&self, args: DeliverArgs) -> Result<(), ContextError> {
        let routing = self.routing()?;
        self.proxy().deliver(&routing.cancellation, args).await?;
        Ok(())
    }
}

//! Argument structs for cluster proxy calls.
//!
//! The proxy is the collaborator that talks to gateways and other nodes. These
//! structs are the typed arguments a request context hands it; how the proxy
//! puts them on the wire is its own business. All structs use
//! `#[serde(rename_all = "camelCase")]` so they encode the same way as every
//! other cluster payload.

use serde::{Deserialize, Serialize};

use super::base::Message;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a gateway-side target is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionKind {
    /// Target is a gateway connection id.
    Conn,
    /// Target is a bound user id.
    User,
}

// ---------------------------------------------------------------------------
// Proxy arguments
// ---------------------------------------------------------------------------

/// Push a message to a session held by a gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushArgs {
    /// Gateway that owns the session.
    pub gid: String,
    pub kind: SessionKind,
    /// Connection id or user id, depending on `kind`.
    pub target: i64,
    pub message: Message,
}

/// Deliver a message to a node for handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverArgs {
    /// Destination node. Empty lets the proxy resolve it from `uid`'s binding.
    pub nid: String,
    /// User the message is delivered on behalf of; 0 when unbound.
    pub uid: i64,
    pub message: Message,
}

/// Close a session held by a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectArgs {
    pub gid: String,
    pub kind: SessionKind,
    pub target: i64,
    /// Close immediately instead of flushing pending writes.
    pub force: bool,
}

/// Look up the remote address of a gateway session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetIpArgs {
    pub gid: String,
    pub kind: SessionKind,
    pub target: i64,
}

//! Where a request came from.

use std::fmt;

/// Origin of a request, which is also the channel a reply goes back through.
///
/// A context has exactly one source. There is no in-place role switch; derive
/// a detached copy with `Request::clone_detached` instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Source {
    /// Forwarded by a gateway on behalf of client connection `cid`.
    Gateway { gid: String, cid: i64 },
    /// Delivered by another node (or this one) in the cluster.
    Node { nid: String },
    /// Sent by a local actor, identified by its opaque process id.
    Actor { pid: String },
    /// Originated locally; there is nobody to reply to.
    #[default]
    Local,
}

impl Source {
    #[must_use]
    pub fn gateway(gid: impl Into<String>, cid: i64) -> Self {
        Source::Gateway {
            gid: gid.into(),
            cid,
        }
    }

    #[must_use]
    pub fn node(nid: impl Into<String>) -> Self {
        Source::Node { nid: nid.into() }
    }

    #[must_use]
    pub fn actor(pid: impl Into<String>) -> Self {
        Source::Actor { pid: pid.into() }
    }

    #[must_use]
    pub fn gid(&self) -> Option<&str> {
        match self {
            Source::Gateway { gid, .. } => Some(gid),
            _ => None,
        }
    }

    #[must_use]
    pub fn cid(&self) -> Option<i64> {
        match self {
            Source::Gateway { cid, .. } => Some(*cid),
            _ => None,
        }
    }

    #[must_use]
    pub fn nid(&self) -> Option<&str> {
        match self {
            Source::Node { nid } => Some(nid),
            _ => None,
        }
    }

    #[must_use]
    pub fn pid(&self) -> Option<&str> {
        match self {
            Source::Actor { pid } => Some(pid),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_gateway(&self) -> bool {
        matches!(self, Source::Gateway { .. })
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Gateway { gid, cid } => write!(f, "gateway:{gid}/{cid}"),
            Source::Node { nid } => write!(f, "node:{nid}"),
            Source::Actor { pid } => write!(f, "actor:{pid}"),
            Source::Local => f.write_str("local"),
        }
    }
}

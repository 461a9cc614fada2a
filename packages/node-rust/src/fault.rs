//! Fault observation for work that has no caller to return an error to.
//!
//! `Request::task` is fire-and-forget, so a panicking continuation (or a
//! panicking cleanup callback run during its finalization) cannot propagate
//! anywhere. Such faults are handed to the node's [`FaultSink`] instead.

use std::any::Any;
use std::fmt;

/// What failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// A continuation submitted through `Request::task` panicked.
    TaskPanic,
    /// A deferred cleanup callback panicked while the chain was firing.
    CleanupPanic,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::TaskPanic => f.write_str("task panic"),
            FaultKind::CleanupPanic => f.write_str("cleanup panic"),
        }
    }
}

/// A single isolated failure, with enough routing identity to find the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    /// Node the fault happened on.
    pub node_id: String,
    /// Route of the message being handled.
    pub route: i32,
    /// Sequence number of the message being handled.
    pub seq: i32,
    /// Claim ticket version the work ran under.
    pub version: u64,
    /// Panic payload rendered as text.
    pub message: String,
}

/// Receives faults that were isolated from the code path that caused them.
pub trait FaultSink: Send + Sync + fmt::Debug {
    fn report(&self, fault: Fault);
}

/// Default sink: logs every fault at `error` level and counts it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFaultSink;

impl FaultSink for TracingFaultSink {
    fn report(&self, fault: Fault) {
        metrics::counter!("hearth_faults_total", "kind" => fault.kind.to_string()).increment(1);
        tracing::error!(
            node_id = %fault.node_id,
            route = fault.route,
            seq = fault.seq,
            version = fault.version,
            kind = %fault.kind,
            "{}",
            fault.message
        );
    }
}

/// Renders a panic payload caught by `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_handles_str_and_string() {
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload = std::panic::catch_unwind(|| panic!("code {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "code 7");

        let payload = std::panic::catch_unwind(|| std::panic::panic_any(42_u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn tracing_sink_accepts_faults() {
        TracingFaultSink.report(Fault {
            kind: FaultKind::TaskPanic,
            node_id: "node-1".to_string(),
            route: 1,
            seq: 2,
            version: 3,
            message: "boom".to_string(),
        });
    }
}

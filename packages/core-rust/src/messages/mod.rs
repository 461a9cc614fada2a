//! Message envelope and cluster proxy argument types.

pub mod base;
pub mod cluster;

pub use base::{Message, Payload};
pub use cluster::{DeliverArgs, DisconnectArgs, GetIpArgs, PushArgs, SessionKind};

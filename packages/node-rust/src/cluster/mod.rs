//! Cluster collaborators consumed by the request context.

pub mod traits;

pub use traits::{Actor, ActorOptions, Creator, Proxy, Scheduler};

use hearth_core::CodecKind;

/// Node-level configuration for request handling.
///
/// Controls context pooling, the default payload codec, and how many task
/// continuations may run at once.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Unique identifier for this node. Replies addressed to it are not sent
    /// over the wire.
    pub node_id: String,
    /// Maximum number of idle context slots kept for reuse.
    pub pool_capacity: usize,
    /// Idle slots allocated up front when the node is built.
    pub pool_prewarm: usize,
    /// Codec used to decode payloads when no codec is set on the builder.
    pub codec: CodecKind,
    /// Maximum continuations running at once on the default submitter.
    /// 0 means unbounded.
    pub max_concurrent_tasks: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            pool_capacity: 4096,
            pool_prewarm: 0,
            codec: CodecKind::MsgPack,
            max_concurrent_tasks: 0,
        }
    }
}

impl NodeConfig {
    /// Default configuration with the given node id.
    #[must_use]
    pub fn with_node_id(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            ..Self::default()
        }
    }
}

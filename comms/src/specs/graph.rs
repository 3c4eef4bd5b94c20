use serde::{Deserialize, Serialize};

/// A graph node identifier.
pub type NodeId = i64;

/// A query sent by a graph client to one graph server partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphRequest {
    /// Owned node ids of `node_type`, keeping every `worker_count`-th starting at `worker_index`.
    Nodes {
        node_type: String,
        worker_index: usize,
        worker_count: usize,
    },
    /// Owned edges of `edge_type`, strided the same way as `Nodes`.
    Edges {
        edge_type: String,
        worker_index: usize,
        worker_count: usize,
    },
    /// `count` uniformly sampled out-neighbors per id, flattened in request order.
    Neighbors {
        edge_type: String,
        ids: Vec<NodeId>,
        count: usize,
    },
    /// Float attributes of each id, flattened in request order.
    Features { node_type: String, ids: Vec<NodeId> },
    /// The edge types this partition knows about.
    Topology,
}

/// The answer of a graph server to a `GraphRequest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphReply {
    Nodes(Vec<NodeId>),
    Edges(Vec<(NodeId, NodeId)>),
    Neighbors(Vec<NodeId>),
    Features { dim: usize, values: Vec<f32> },
    Topology(Vec<EdgeTopology>),
}

/// The endpoint types of an edge type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeTopology {
    pub edge_type: String,
    pub src_type: String,
    pub dst_type: String,
}

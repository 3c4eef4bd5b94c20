use std::collections::HashMap;

use comms::specs::graph::{EdgeTopology, GraphReply, GraphRequest, NodeId};
use log::info;
use rand::Rng;

use crate::{
    GraphErr, Result,
    table::{self, TableSource},
};

/// The partition a node id belongs to.
pub fn owner(id: NodeId, partitions: usize) -> usize {
    id.rem_euclid(partitions as NodeId) as usize
}

#[derive(Debug, Default)]
struct NodeTable {
    ids: Vec<NodeId>,
    index: HashMap<NodeId, usize>,
    dim: usize,
    features: Vec<f32>,
}

impl NodeTable {
    fn insert(&mut self, id: NodeId, features: &[f32]) {
        if self.index.contains_key(&id) {
            return;
        }

        self.index.insert(id, self.ids.len());
        self.ids.push(id);
        self.features.extend_from_slice(features);
    }

    fn features_of(&self, id: NodeId) -> Option<&[f32]> {
        let row = *self.index.get(&id)?;
        Some(&self.features[row * self.dim..(row + 1) * self.dim])
    }
}

#[derive(Debug)]
struct EdgeTable {
    topology: EdgeTopology,
    edges: Vec<(NodeId, NodeId)>,
    adjacency: HashMap<NodeId, Vec<NodeId>>,
}

impl EdgeTable {
    fn insert(&mut self, src: NodeId, dst: NodeId) {
        self.edges.push((src, dst));
        self.adjacency.entry(src).or_default().push(dst);
    }
}

/// One partition of the graph, held in memory by a graph server.
#[derive(Debug)]
pub struct GraphStore {
    partition: usize,
    partitions: usize,
    nodes: HashMap<String, NodeTable>,
    edges: HashMap<String, EdgeTable>,
}

impl GraphStore {
    /// Loads partition `partition` out of `partitions` from `source`.
    ///
    /// A node belongs to the partition `owner(id, partitions)`, an edge to the
    /// partition of its source node.
    ///
    /// # Returns
    /// The loaded store or the first table error.
    pub fn load(source: &TableSource, partition: usize, partitions: usize) -> Result<Self> {
        if partition >= partitions {
            return Err(GraphErr::ServerIndex {
                index: partition,
                servers: partitions,
            });
        }

        let mut store = Self {
            partition,
            partitions,
            nodes: HashMap::new(),
            edges: HashMap::new(),
        };

        for node_source in &source.nodes {
            let table = store
                .nodes
                .entry(node_source.node_type.clone())
                .or_insert_with(|| NodeTable {
                    dim: node_source.decoder.feature_dim(),
                    ..Default::default()
                });

            table::read_nodes(node_source, |id, attrs| {
                if owner(id, partitions) == partition {
                    table.insert(id, &attrs.features);
                }
            })?;
        }

        for edge_source in &source.edges {
            let edge_type = edge_source.topology.edge_type.clone();
            let table = store.edges.entry(edge_type).or_insert_with(|| EdgeTable {
                topology: edge_source.topology.clone(),
                edges: Vec::new(),
                adjacency: HashMap::new(),
            });

            table::read_edges(edge_source, |row| {
                if owner(row.src, partitions) == partition {
                    table.insert(row.src, row.dst);
                }
                if !edge_source.directed && owner(row.dst, partitions) == partition {
                    table.insert(row.dst, row.src);
                }
            })?;
        }

        info!(
            partition = partition,
            partitions = partitions,
            node_types = store.nodes.len(),
            edge_types = store.edges.len();
            "graph partition loaded"
        );

        Ok(store)
    }

    pub fn partition(&self) -> usize {
        self.partition
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }

    fn node_table(&self, node_type: &str) -> Result<&NodeTable> {
        self.nodes
            .get(node_type)
            .ok_or_else(|| GraphErr::UnknownNodeType(node_type.to_string()))
    }

    fn edge_table(&self, edge_type: &str) -> Result<&EdgeTable> {
        self.edges
            .get(edge_type)
            .ok_or_else(|| GraphErr::UnknownEdgeType(edge_type.to_string()))
    }

    /// Answers a single request against this partition.
    ///
    /// # Arguments
    /// * `req` - The request sent by a graph client.
    ///
    /// # Returns
    /// The reply or an error naming the unknown type.
    pub fn handle(&self, req: GraphRequest) -> Result<GraphReply> {
        let reply = match req {
            GraphRequest::Nodes {
                node_type,
                worker_index,
                worker_count,
            } => {
                let table = self.node_table(&node_type)?;
                GraphReply::Nodes(stride(&table.ids, worker_index, worker_count))
            }
            GraphRequest::Edges {
                edge_type,
                worker_index,
                worker_count,
            } => {
                let table = self.edge_table(&edge_type)?;
                GraphReply::Edges(stride(&table.edges, worker_index, worker_count))
            }
            GraphRequest::Neighbors {
                edge_type,
                ids,
                count,
            } => {
                let table = self.edge_table(&edge_type)?;
                GraphReply::Neighbors(sample_neighbors(&table.adjacency, &ids, count))
            }
            GraphRequest::Features { node_type, ids } => {
                let table = self.node_table(&node_type)?;
                let mut values = vec![0.; ids.len() * table.dim];

                for (id, out) in ids.iter().zip(values.chunks_mut(table.dim.max(1))) {
                    if let Some(features) = table.features_of(*id) {
                        out.copy_from_slice(features);
                    }
                }

                GraphReply::Features {
                    dim: table.dim,
                    values,
                }
            }
            GraphRequest::Topology => {
                let mut topology: Vec<_> =
                    self.edges.values().map(|t| t.topology.clone()).collect();
                topology.sort_by(|a, b| a.edge_type.cmp(&b.edge_type));
                GraphReply::Topology(topology)
            }
        };

        Ok(reply)
    }
}

fn stride<T: Clone>(items: &[T], index: usize, count: usize) -> Vec<T> {
    items
        .iter()
        .skip(index)
        .step_by(count.max(1))
        .cloned()
        .collect()
}

/// Samples `count` neighbors per id uniformly with replacement.
///
/// Nodes without out-edges are padded with their own id.
fn sample_neighbors(
    adjacency: &HashMap<NodeId, Vec<NodeId>>,
    ids: &[NodeId],
    count: usize,
) -> Vec<NodeId> {
    let mut rng = rand::rng();
    let mut out = Vec::with_capacity(ids.len() * count);

    for id in ids {
        match adjacency.get(id) {
            Some(neighbors) if !neighbors.is_empty() => {
                out.extend((0..count).map(|_| neighbors[rng.random_range(0..neighbors.len())]));
            }
            _ => out.extend(std::iter::repeat_n(*id, count)),
        }
    }

    out
}

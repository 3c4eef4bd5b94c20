use comms::specs::graph::NodeId;
use graph::ClientGraph;
use ndarray::Array2;
use sage::{SageErr, SampleTree, UnsupervisedBatch};

use crate::Result;

/// The node and edge types the model is trained on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub node_type: String,
    pub edge_type: String,
}

/// Samples the neighborhood of `roots` hop by hop and fetches the features of every level.
///
/// # Arguments
/// * `graph` - The graph client.
/// * `schema` - The node type whose features are fetched and the edge type that is followed.
/// * `roots` - The ids at level `0`.
/// * `fanouts` - The amount of neighbors sampled per node at each hop.
///
/// # Returns
/// The tree of feature matrices.
pub async fn sample_tree(
    graph: &mut ClientGraph,
    schema: &Schema,
    roots: Vec<NodeId>,
    fanouts: &[usize],
) -> Result<SampleTree> {
    let mut levels = vec![roots];
    for &fanout in fanouts {
        let last = levels.last().map(Vec::as_slice).unwrap_or_default();
        let next = graph
            .sample_neighbors(&schema.edge_type, last, fanout)
            .await?;
        levels.push(next);
    }

    let ids = levels.concat();
    let (dim, values) = graph.features(&schema.node_type, &ids).await?;

    let mut features = Vec::with_capacity(levels.len());
    let mut offset = 0;
    for level in &levels {
        let rows = level.len();
        let chunk = values
            .get(offset * dim..(offset + rows) * dim)
            .unwrap_or_default()
            .to_vec();
        features.push(Array2::from_shape_vec((rows, dim), chunk).map_err(SageErr::from)?);
        offset += rows;
    }

    Ok(SampleTree::new(features))
}

/// Builds the batch of a chunk of positive edges with `neg_num` negatives per source.
///
/// # Arguments
/// * `graph` - The graph client.
/// * `schema` - The node and edge types.
/// * `edges` - The positive `(src, dst)` pairs.
/// * `neg_num` - The amount of negatives per source.
/// * `fanouts` - The amount of neighbors sampled per node at each hop.
pub async fn edge_batch(
    graph: &mut ClientGraph,
    schema: &Schema,
    edges: &[(NodeId, NodeId)],
    neg_num: usize,
    fanouts: &[usize],
) -> Result<UnsupervisedBatch> {
    let batch_size = edges.len();
    let negatives = graph
        .sample_negatives(&schema.node_type, batch_size * neg_num)
        .await?;

    let mut roots = Vec::with_capacity(UnsupervisedBatch::roots_for(batch_size, neg_num));
    roots.extend(edges.iter().map(|&(src, _)| src));
    roots.extend(edges.iter().map(|&(_, dst)| dst));
    roots.extend(negatives);

    let tree = sample_tree(graph, schema, roots, fanouts).await?;
    Ok(UnsupervisedBatch {
        tree,
        batch_size,
        neg_num,
    })
}

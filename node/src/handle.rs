//! Decoding of the command line handle and the types it names.

use graph::{ClusterHandle, HandleErr};
use trainer::Schema;

/// Decodes the base64 JSON handle given on the command line.
pub fn decode_handle(encoded: &str) -> Result<ClusterHandle, HandleErr> {
    ClusterHandle::decode(encoded)
}

/// The node type, the text before the first `:` of the first node schema entry.
pub fn node_type(handle: &ClusterHandle) -> Result<String, HandleErr> {
    let entry = handle
        .node_schema
        .first()
        .ok_or_else(|| HandleErr::Schema("node_schema is empty".to_string()))?;

    let node_type = entry.split(':').next().unwrap_or_default();
    Ok(node_type.to_string())
}

/// The edge type, the second `:` delimited field of the first edge schema entry.
pub fn edge_type(handle: &ClusterHandle) -> Result<String, HandleErr> {
    let entry = handle
        .edge_schema
        .first()
        .ok_or_else(|| HandleErr::Schema("edge_schema is empty".to_string()))?;

    entry
        .split(':')
        .nth(1)
        .map(str::to_string)
        .ok_or_else(|| HandleErr::Schema(format!("edge schema entry '{entry}' has no edge type")))
}

/// The node and edge types the model trains on.
pub fn schema(handle: &ClusterHandle) -> Result<Schema, HandleErr> {
    Ok(Schema {
        node_type: node_type(handle)?,
        edge_type: edge_type(handle)?,
    })
}

use std::path::Path;

use graph::{AttrType, Decoder, Graph, TableSource};
use log::info;
use trainer::Role;

use crate::{Plan, Result};

/// The node table every node type is loaded from.
pub const NODE_TABLE: &str = "node_table";
/// The training edges.
pub const EDGE_TABLE: &str = "edge_table_train";
/// The second name the node table is registered under.
pub const TRAIN_NODE_TYPE: &str = "train";

/// The tables of the dataset under `config.dataset_folder`.
///
/// The node table is registered twice, once as the node type and once as `TRAIN_NODE_TYPE`.
/// Edges are directed and weighted.
pub fn table_source(dataset_folder: &str, node_type: &str, edge_type: &str) -> TableSource {
    let folder = Path::new(dataset_folder);
    let node_decoder = || Decoder::new(vec![AttrType::Float, AttrType::Float, AttrType::String]);

    TableSource::new()
        .node(folder.join(NODE_TABLE), node_type, node_decoder())
        .edge(
            folder.join(EDGE_TABLE),
            (node_type, node_type, edge_type),
            Decoder::weighted(),
            true,
        )
        .node(folder.join(NODE_TABLE), TRAIN_NODE_TYPE, node_decoder())
}

/// Serves this process' partition as a parameter server or attaches to the servers as a worker.
///
/// # Arguments
/// * `plan` - The launch plan, its handle must already be rewritten.
///
/// # Returns
/// The graph handle matching the role.
pub async fn acquire_graph(plan: &Plan) -> Result<Graph> {
    let config = &plan.config;
    let graph = match plan.role {
        Role::Ps => {
            let source = table_source(&config.dataset_folder, &config.node_type, &config.edge_type);
            graph::init_graph_from_handle(&plan.handle, plan.task_index, &source).await?
        }
        Role::Worker => {
            graph::get_graph_from_handle(&plan.handle, plan.task_index, config.client_count).await?
        }
    };

    info!(role = plan.role.job_name(), task_index = plan.task_index; "graph acquired");
    Ok(graph)
}

//! The `dist_graphsage` launcher: turns a cluster handle and a process index into a running
//! worker or parameter server.

mod acquire;
pub mod config;
mod error;
pub mod handle;
pub mod roles;
mod train;

use graph::ClusterHandle;
use log::{info, warn};
use trainer::{Role, Schema};

pub use acquire::{EDGE_TABLE, NODE_TABLE, TRAIN_NODE_TYPE, acquire_graph, table_source};
pub use config::{CONFIG_ENV, Config, ConfigErr};
pub use error::{LaunchErr, Result};
pub use train::{build_trainer, embedding_prefix, train};

/// Everything a process needs to know before it touches the network.
#[derive(Debug, Clone)]
pub struct Plan {
    /// The configuration with every cluster field derived.
    pub config: Config,
    /// The handle with its servers pointing at the parameter servers.
    pub handle: ClusterHandle,
    pub schema: Schema,
    pub role: Role,
    pub task_index: usize,
}

impl Plan {
    /// Decodes the handle and derives the role of process `index`.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters.
    /// * `encoded` - The base64 JSON handle.
    /// * `index` - This process' index in the host list.
    ///
    /// # Returns
    /// The plan, or the first decoding failure.
    pub fn new(mut config: Config, encoded: &str, index: usize) -> Result<Self> {
        let mut handle = handle::decode_handle(encoded)?;
        let schema = handle::schema(&handle)?;
        info!(
            node_type = schema.node_type.as_str(), edge_type = schema.edge_type.as_str();
            "handle decoded"
        );

        let hosts = roles::split_hosts(&handle.server);
        info!(workers = hosts.worker.len(), ps = hosts.ps.len(); "hosts split");
        if roles::slot_mismatch(&hosts) {
            warn!(
                workers = hosts.worker.len(), slots = roles::WORKER_SLOTS;
                "the worker half of the hosts doesn't match the fixed worker slots"
            );
        }
        if handle.client_count != hosts.worker.len() {
            warn!(
                client_count = handle.client_count, workers = hosts.worker.len();
                "client count of the handle differs from the worker hosts, graph shares follow the client count"
            );
        }
        if config.hops_num != config.neighs_num.len() {
            warn!(
                hops_num = config.hops_num, fanouts = config.neighs_num.len();
                "hops_num is ignored, the amount of hops follows neighs_num"
            );
        }

        let (role, task_index) = roles::assign_role(index);
        info!(role = role.job_name(), task_index = task_index; "role assigned");

        config.node_type = schema.node_type.clone();
        config.edge_type = schema.edge_type.clone();
        config.train_node_type = schema.node_type.clone();
        config.client_count = handle.client_count;
        config.worker_hosts = hosts.worker.clone();
        config.ps_hosts = hosts.ps.clone();
        config.job_name = role.job_name().to_string();
        config.task_index = task_index;

        roles::rewrite_handle(&mut handle, &hosts);

        Ok(Self {
            config,
            handle,
            schema,
            role,
            task_index,
        })
    }
}

/// Runs a process end to end: acquires the graph, then trains or joins.
pub async fn launch(config: Config, encoded: &str, index: usize) -> Result<()> {
    let plan = Plan::new(config, encoded, index)?;
    let graph = acquire_graph(&plan).await?;
    train(&plan, graph).await
}

use graph::Graph;
use log::info;
use parameter_server::{OptimizerSpec, ServerSpec};
use sage::GraphSage;
use trainer::{ClusterSpec, DistTrainer, Role, save_embeddings};

use crate::{LaunchErr, Plan, Result, config::Config};

/// The path prefix of a worker's embedding files, `<emb_save_dir><task_index>`.
pub fn embedding_prefix(config: &Config, task_index: usize) -> String {
    format!("{}{task_index}", config.emb_save_dir)
}

/// Builds the distributed trainer of this process.
pub fn build_trainer(plan: &Plan) -> Result<DistTrainer<GraphSage>> {
    let config = &plan.config;
    let sage_config = config.sage_config()?;
    let optimizer = OptimizerSpec::from_name(&config.learning_algo, config.learning_rate)?;
    let cluster = ClusterSpec::new(config.ps_hosts.clone(), config.worker_hosts.clone());

    let trainer = DistTrainer::new(
        move || GraphSage::new(sage_config),
        cluster,
        plan.role,
        plan.task_index,
        config.epoch,
        ServerSpec::new(optimizer, config.weight_decay),
    )
    .batch_size(config.batch_size)
    .worker_count(config.client_count);

    Ok(trainer)
}

/// Trains and saves the embeddings as a worker, or serves until every worker is done as a
/// parameter server.
///
/// # Arguments
/// * `plan` - The launch plan.
/// * `graph` - The graph handle `acquire_graph` returned for the plan.
pub async fn train(plan: &Plan, graph: Graph) -> Result<()> {
    let mut trainer = build_trainer(plan)?;

    match (plan.role, graph) {
        (Role::Worker, Graph::Client(mut client)) => {
            trainer.train(&mut client, &plan.schema).await?;
            let (ids, emb) = trainer.get_node_embedding(&mut client, &plan.schema).await?;

            let prefix = embedding_prefix(&plan.config, plan.task_index);
            save_embeddings(&prefix, &ids, &emb)?;
            info!(
                rows = emb.nrows(), cols = emb.ncols(), prefix = prefix.as_str();
                "embeddings saved"
            );

            client.close().await?;
        }
        (Role::Ps, Graph::Server(mut server)) => {
            trainer.join(&mut server).await?;
            info!(task_index = plan.task_index; "parameter server done");
        }
        (role, _) => return Err(LaunchErr::GraphRole(role)),
    }

    Ok(())
}

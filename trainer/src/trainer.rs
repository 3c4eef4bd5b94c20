use std::time::Duration;

use comms::specs::graph::NodeId;
use graph::{CONNECT_RETRY, ClientGraph, Incoming, ServerGraph};
use log::{debug, info};
use ndarray::{Array2, Axis, concatenate};
use parameter_server::{ServerBuilder, ServerSpec, partition};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use sage::Model;

use crate::{
    ClusterSpec, Middleware, Result, Role, Schema, TrainErr,
    sampler::{edge_batch, sample_tree},
};

/// Training steps between two info level loss reports.
pub const LOG_EVERY: usize = 100;

/// The seed every parameter server derives its initial slice from.
pub const INIT_SEED: u64 = 0x5A6E;

/// Drives between-graph asynchronous training of a `Model`.
///
/// Workers pull the parameters from every parameter server, compute a gradient on a batch of
/// their edge share and push each server its slice. Parameter servers apply gradients as they
/// arrive and serve until every worker is done.
pub struct DistTrainer<M: Model> {
    model: M,
    cluster: ClusterSpec,
    role: Role,
    task_index: usize,
    epoch: usize,
    server_spec: ServerSpec,
    batch_size: usize,
    seed: u64,
    retry: Duration,
    worker_count: usize,
    params: Option<Vec<f32>>,
}

impl<M: Model> DistTrainer<M> {
    /// Creates a new `DistTrainer`.
    ///
    /// # Arguments
    /// * `model_fn` - Builds the model.
    /// * `cluster` - The hosts of every job.
    /// * `role` - This process' job.
    /// * `task_index` - This process' index inside its job.
    /// * `epoch` - The amount of passes over the worker's edge share.
    /// * `server_spec` - The optimizer the parameter servers apply.
    pub fn new<F>(
        model_fn: F,
        cluster: ClusterSpec,
        role: Role,
        task_index: usize,
        epoch: usize,
        server_spec: ServerSpec,
    ) -> Self
    where
        F: FnOnce() -> M,
    {
        let worker_count = cluster.worker.len();
        Self {
            model: model_fn(),
            cluster,
            role,
            task_index,
            epoch,
            server_spec,
            batch_size: 1,
            seed: INIT_SEED,
            retry: CONNECT_RETRY,
            worker_count,
            params: None,
        }
    }

    /// Sets the amount of edges per training step and nodes per embedding step.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Sets the seed of the initial parameters, every process of a job must use the same one.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets how long workers keep retrying refused parameter server connections.
    pub fn connect_retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    /// Sets how many workers a parameter server waits for, the worker hosts by default.
    pub fn worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// The parameters a worker ended its training with.
    pub fn params(&self) -> Option<&[f32]> {
        self.params.as_deref()
    }

    fn expect_role(&self, expected: Role) -> Result<()> {
        if self.role != expected {
            return Err(TrainErr::WrongRole {
                expected,
                got: self.role,
            });
        }

        Ok(())
    }

    fn ps_ranges(&self) -> Result<Vec<std::ops::Range<usize>>> {
        if self.cluster.ps.is_empty() {
            return Err(TrainErr::NoParameterServers);
        }

        Ok(partition(self.model.param_count(), self.cluster.ps.len()))
    }

    /// Trains on this worker's share of the edges until every epoch is done.
    ///
    /// # Arguments
    /// * `graph` - The graph client.
    /// * `schema` - The node and edge types to train on.
    pub async fn train(&mut self, graph: &mut ClientGraph, schema: &Schema) -> Result<()> {
        self.expect_role(Role::Worker)?;
        let ranges = self.ps_ranges()?;

        let mut middleware =
            Middleware::connect(&self.cluster.ps, &ranges, self.task_index, self.retry).await?;
        let mut params = vec![0.; middleware.len()];
        middleware.pull_params(&mut params).await?;

        let mut edges = graph.edges(&schema.edge_type).await?;
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(self.task_index as u64 + 1));
        let fanouts = self.model.fanouts().to_vec();
        let neg_num = self.model.neg_num();

        info!(
            task_index = self.task_index, edges = edges.len(), params = params.len();
            "training started"
        );

        let mut step = 0;
        for epoch in 0..self.epoch {
            edges.shuffle(&mut rng);
            let mut epoch_loss = 0.;
            let mut batches = 0;

            for chunk in edges.chunks(self.batch_size) {
                let batch = edge_batch(graph, schema, chunk, neg_num, &fanouts).await?;
                let (loss, grad) = self.model.loss_and_grad(&params, batch, &mut rng)?;

                middleware.push_grads(&grad).await?;
                middleware.pull_params(&mut params).await?;

                step += 1;
                batches += 1;
                epoch_loss += loss;

                if step % LOG_EVERY == 0 {
                    info!(epoch = epoch, step = step, loss = loss; "training");
                } else {
                    debug!(epoch = epoch, step = step, loss = loss; "training");
                }
            }

            let mean_loss = if batches > 0 { epoch_loss / batches as f32 } else { 0. };
            info!(epoch = epoch, steps = batches, mean_loss = mean_loss; "epoch done");
        }

        middleware.disconnect().await?;
        self.params = Some(params);
        Ok(())
    }

    /// Embeds this worker's share of the nodes with the trained parameters.
    ///
    /// # Arguments
    /// * `graph` - The graph client.
    /// * `schema` - The node type to embed and the edge type to sample neighborhoods along.
    ///
    /// # Returns
    /// The node ids and their embeddings, one row per id.
    pub async fn get_node_embedding(
        &self,
        graph: &mut ClientGraph,
        schema: &Schema,
    ) -> Result<(Vec<NodeId>, Array2<f32>)> {
        self.expect_role(Role::Worker)?;
        let params = self.params.as_deref().ok_or(TrainErr::NotTrained)?;

        let ids = graph.nodes(&schema.node_type).await?;
        let fanouts = self.model.fanouts().to_vec();
        let mut parts = Vec::with_capacity(ids.len().div_ceil(self.batch_size));

        for chunk in ids.chunks(self.batch_size) {
            let tree = sample_tree(graph, schema, chunk.to_vec(), &fanouts).await?;
            parts.push(self.model.embed(params, &tree)?);
        }

        let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
        let emb = if views.is_empty() {
            Array2::zeros((0, 0))
        } else {
            concatenate(Axis(0), &views).map_err(sage::SageErr::from)?
        };

        debug!(nodes = ids.len(); "embedded node share");
        Ok((ids, emb))
    }

    /// Serves this parameter server's slice until every worker has finished.
    ///
    /// Waits for one parameter session and one closed graph session per worker, then for every
    /// parameter session to end.
    ///
    /// # Arguments
    /// * `graph` - The graph partition this process serves, its listener carries the parameter sessions.
    pub async fn join(&mut self, graph: &mut ServerGraph) -> Result<()> {
        self.expect_role(Role::Ps)?;
        let ranges = self.ps_ranges()?;
        let range = ranges
            .get(self.task_index)
            .cloned()
            .ok_or(TrainErr::TaskIndex {
                index: self.task_index,
                tasks: ranges.len(),
            })?;

        let full = self.model.init_params(self.seed)?;
        let slice = full[range.clone()].to_vec();
        let mut server = ServerBuilder::new().build(self.server_spec, slice);

        let workers = self.worker_count;
        info!(
            task_index = self.task_index, params = range.len(), workers = workers;
            "parameter server joined"
        );

        let (mut sessions, mut closed) = (0, 0);
        while sessions < workers || closed < workers {
            match graph.next_incoming().await {
                Some(Incoming::Params { worker_id, rx, tx }) => {
                    debug!(worker_id = worker_id; "worker opened its parameter session");
                    server.spawn(rx, tx);
                    sessions += 1;
                }
                Some(Incoming::GraphClosed { peer }) => {
                    debug!("graph session with {peer} closed");
                    closed += 1;
                }
                None => return Err(TrainErr::ListenerClosed),
            }
        }

        let params = server.run().await?;
        info!(task_index = self.task_index, params = params.len(); "all workers finished");
        Ok(())
    }
}

use std::num::NonZeroUsize;

use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};

use super::{ParameterServer, Server, ServerSpec};
use crate::{
    optimization::{
        Adagrad, Adam, GradientDescent, GradientDescentWithMomentum, Optimizer, OptimizerSpec,
        WeightDecay,
    },
    storage::{ParameterHandle, ParameterStore},
    synchronization::NonBlockingSync,
};

/// Builds `Server`s given a specification.
#[derive(Debug, Default)]
pub struct ServerBuilder;

impl ServerBuilder {
    /// Creates a new `ServerBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a new `Server` following a spec.
    ///
    /// # Arguments
    /// * `spec` - The specification of the parameter server.
    /// * `params` - The initial parameters the server holds.
    ///
    /// # Returns
    /// A new server, ready to spawn worker sessions.
    pub fn build<R, W>(&self, spec: ServerSpec, params: Vec<f32>) -> Box<dyn Server<R, W>>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        debug!(params = params.len(), shard_size = spec.shard_size; "building parameter server");
        self.resolve_optimizer(spec, params)
    }

    /// Resolves the `Optimizer` for this server.
    fn resolve_optimizer<R, W>(&self, spec: ServerSpec, params: Vec<f32>) -> Box<dyn Server<R, W>>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        match spec.optimizer {
            OptimizerSpec::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => {
                let factory = move |len| Adam::new(len, learning_rate, beta1, beta2, epsilon);
                self.resolve_weight_decay(spec, params, factory)
            }
            OptimizerSpec::GradientDescent { learning_rate } => {
                let factory = move |_| GradientDescent::new(learning_rate);
                self.resolve_weight_decay(spec, params, factory)
            }
            OptimizerSpec::GradientDescentWithMomentum {
                learning_rate,
                momentum,
            } => {
                let factory =
                    move |len| GradientDescentWithMomentum::new(len, learning_rate, momentum);
                self.resolve_weight_decay(spec, params, factory)
            }
            OptimizerSpec::Adagrad {
                learning_rate,
                initial_accumulator,
                epsilon,
            } => {
                let factory =
                    move |len| Adagrad::new(len, learning_rate, initial_accumulator, epsilon);
                self.resolve_weight_decay(spec, params, factory)
            }
        }
    }

    /// Wraps the optimizers in a `WeightDecay` when the spec asks for a penalty.
    fn resolve_weight_decay<R, W, O, OF>(
        &self,
        spec: ServerSpec,
        params: Vec<f32>,
        mut optimizer_factory: OF,
    ) -> Box<dyn Server<R, W>>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
        O: Optimizer + Send + 'static,
        OF: FnMut(usize) -> O,
    {
        let decay = spec.weight_decay;

        if decay > 0. {
            let factory = move |len| WeightDecay::new(optimizer_factory(len), decay);
            self.terminate_build(spec, params, factory)
        } else {
            self.terminate_build(spec, params, optimizer_factory)
        }
    }

    /// Terminates the entire build and finally instanciates all the entities.
    fn terminate_build<R, W, O, OF>(
        &self,
        spec: ServerSpec,
        params: Vec<f32>,
        optimizer_factory: OF,
    ) -> Box<dyn Server<R, W>>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
        O: Optimizer + Send + 'static,
        OF: FnMut(usize) -> O,
    {
        let shard_size = NonZeroUsize::new(spec.shard_size).unwrap_or(NonZeroUsize::MIN);
        let store = ParameterStore::new(shard_size, params, optimizer_factory);
        let handle = ParameterHandle::new(store);
        Box::new(ParameterServer::new(handle, NonBlockingSync::new()))
    }
}

use std::ops::Deref;

use tokio::task;

use super::{ParameterStore, Result};
use crate::optimization::Optimizer;

/// The actual interface to interact with a `ParameterStore`.
///
/// It bridges the async runtime with the blocking CPU-bound implementation of the `ParameterStore`,
/// so it must be used from a multi-threaded runtime.
pub struct ParameterHandle<O: Optimizer>(ParameterStore<O>);

impl<O: Optimizer> Clone for ParameterHandle<O> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<O: Optimizer> Deref for ParameterHandle<O> {
    type Target = ParameterStore<O>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<O: Optimizer> ParameterHandle<O> {
    /// Creates a new `ParameterHandle`.
    ///
    /// # Arguments
    /// * `store` - The underlying parameter store.
    pub fn new(store: ParameterStore<O>) -> Self {
        Self(store)
    }
}

impl<O: Optimizer + Send> ParameterHandle<O> {
    /// Async call to the synchronous implementation of `ParameterStore::accumulate`.
    pub async fn accumulate(&self, grad: &[f32]) -> Result<()> {
        task::block_in_place(|| self.0.accumulate(grad))
    }

    /// Async call to the synchronous implementation of `ParameterStore::update_params`.
    pub async fn update_params(&self) -> Result<()> {
        task::block_in_place(|| self.0.update_params())
    }

    /// Async call to the synchronous implementation of `ParameterStore::pull_params`.
    pub async fn pull_params(&self, out: &mut [f32]) -> Result<()> {
        task::block_in_place(|| self.0.pull_params(out))
    }
}

use super::Synchronizer;
use crate::{
    optimization::Optimizer,
    storage::{ParameterHandle, Result},
};

/// Applies every incoming gradient as soon as it arrives, workers never wait for each other.
#[derive(Clone, Default)]
pub struct NonBlockingSync;

impl NonBlockingSync {
    /// Creates a new `NonBlockingSync` synchronizer.
    pub fn new() -> Self {
        Self
    }
}

impl Synchronizer for NonBlockingSync {
    async fn step<O>(
        &self,
        handle: &ParameterHandle<O>,
        grad: &[f32],
        params: &mut [f32],
    ) -> Result<()>
    where
        O: Optimizer + Send,
    {
        handle.accumulate(grad).await?;
        handle.update_params().await?;
        handle.pull_params(params).await
    }
}

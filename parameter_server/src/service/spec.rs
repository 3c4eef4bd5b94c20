use crate::optimization::OptimizerSpec;

/// The default maximum amount of parameters per shard.
pub const SHARD_SIZE: usize = 4096;

/// The configuration of one parameter server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServerSpec {
    pub shard_size: usize,
    pub optimizer: OptimizerSpec,
    /// The L2 penalty coefficient, `0` disables it.
    pub weight_decay: f32,
}

impl ServerSpec {
    /// Creates a new `ServerSpec` with the default shard size.
    pub fn new(optimizer: OptimizerSpec, weight_decay: f32) -> Self {
        Self {
            shard_size: SHARD_SIZE,
            optimizer,
            weight_decay,
        }
    }
}

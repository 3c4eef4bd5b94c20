mod optimization;
mod partition;
mod service;
mod storage;
mod synchronization;
mod test;

pub use optimization::{
    Adagrad, Adam, GradientDescent, GradientDescentWithMomentum, Optimizer, OptimizerSpec, SpecErr,
    WeightDecay,
};
pub use partition::partition;
pub use service::{ParameterServer, SHARD_SIZE, Server, ServerBuilder, ServerSpec};
pub use storage::{ParameterHandle, ParameterStore, SizeMismatchErr};
pub use synchronization::{NonBlockingSync, Synchronizer};

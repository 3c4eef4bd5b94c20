mod cluster;
mod error;
mod middleware;
pub mod npy;
mod sampler;
mod trainer;

pub use cluster::{ClusterSpec, Role};
pub use error::{Result, TrainErr};
pub use middleware::Middleware;
pub use npy::{save_embeddings, save_npy};
pub use sampler::{Schema, edge_batch, sample_tree};
pub use trainer::{DistTrainer, INIT_SEED, LOG_EVERY};

mod config;
mod error;
mod loss;
mod model;
mod tree;

use ndarray::Array2;
use rand::Rng;

pub use config::{AggType, SageConfig};
pub use error::{Result, SageErr};
pub use loss::{UnsupervisedBatch, unsupervised_loss};
pub use model::GraphSage;
pub use tree::SampleTree;

/// A model whose parameters live in one flat vector, trained on edges with negative samples.
pub trait Model {
    /// The length of the flat parameter vector.
    fn param_count(&self) -> usize;

    /// Generates the initial parameters, the same `seed` always yields the same vector.
    fn init_params(&self, seed: u64) -> Result<Vec<f32>>;

    /// The amount of neighbors sampled at each hop of a `SampleTree`.
    fn fanouts(&self) -> &[usize];

    /// The amount of negatives sampled per positive edge.
    fn neg_num(&self) -> usize;

    /// Computes the loss of a batch and its gradient with respect to `params`.
    ///
    /// # Arguments
    /// * `params` - The current parameters.
    /// * `batch` - The sampled neighborhoods of the edges and their negatives.
    /// * `rng` - The randomness source for dropout.
    ///
    /// # Returns
    /// The loss and a gradient of `param_count` elements.
    fn loss_and_grad<R: Rng>(
        &self,
        params: &[f32],
        batch: UnsupervisedBatch,
        rng: &mut R,
    ) -> Result<(f32, Vec<f32>)>;

    /// Computes the embedding of every root of `tree`.
    fn embed(&self, params: &[f32], tree: &SampleTree) -> Result<Array2<f32>>;
}

use super::Optimizer;
use crate::storage::{Result, check_len};

/// Adds an L2 penalty to every gradient before handing it to the inner optimizer.
#[derive(Debug)]
pub struct WeightDecay<O: Optimizer> {
    inner: O,
    decay: f32,
    buf: Vec<f32>,
}

impl<O: Optimizer> WeightDecay<O> {
    /// Creates a new `WeightDecay` wrapper.
    ///
    /// # Arguments
    /// * `inner` - The optimizer that applies the penalized gradient.
    /// * `decay` - The coefficient of the L2 penalty.
    pub fn new(inner: O, decay: f32) -> Self {
        Self {
            inner,
            decay,
            buf: Vec::new(),
        }
    }
}

impl<O: Optimizer> Optimizer for WeightDecay<O> {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_len(params.len(), grad.len())?;

        let decay = self.decay;
        self.buf.clear();
        self.buf
            .extend(grad.iter().zip(params.iter()).map(|(g, p)| g + decay * p));

        self.inner.update_params(&self.buf, params)
    }
}

use super::Optimizer;
use crate::storage::{Result, check_len};

#[derive(Debug)]
pub struct Adagrad {
    learning_rate: f32,
    epsilon: f32,
    accumulator: Box<[f32]>,
}

impl Adagrad {
    /// Creates a new `Adagrad` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `initial_accumulator` - The starting value of every squared gradient sum.
    /// * `epsilon` - Added to the denominator for numerical stability.
    pub fn new(len: usize, learning_rate: f32, initial_accumulator: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            epsilon,
            accumulator: vec![initial_accumulator; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for Adagrad {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_len(params.len(), grad.len())?;
        check_len(self.accumulator.len(), params.len())?;

        let lr = self.learning_rate;
        let eps = self.epsilon;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.accumulator.iter_mut())
            .for_each(|((p, g), acc)| {
                *acc += g * g;
                *p -= lr * g / (acc.sqrt() + eps);
            });

        Ok(())
    }
}

use parking_lot::{Mutex, RwLock};

use crate::{
    optimization::Optimizer,
    storage::{Result, check_len},
};

/// A slice of the parameters with its own optimizer state and two gradient buffers.
#[derive(Debug)]
pub struct ParameterShard<O: Optimizer> {
    nparams: usize,
    grads: [Mutex<Box<[f32]>>; 2],
    params: RwLock<Box<[f32]>>,
    optimizer: Mutex<O>,
}

impl<O: Optimizer> ParameterShard<O> {
    /// Creates a new `ParameterShard`.
    ///
    /// # Arguments
    /// * `params` - The initial state of the parameters.
    /// * `optimizer` - The optimization algorithm.
    pub fn new(params: Vec<f32>, optimizer: O) -> Self {
        let nparams = params.len();

        Self {
            nparams,
            grads: [
                Mutex::new(vec![0.; nparams].into_boxed_slice()),
                Mutex::new(vec![0.; nparams].into_boxed_slice()),
            ],
            params: RwLock::new(params.into_boxed_slice()),
            optimizer: Mutex::new(optimizer),
        }
    }

    /// Accumulates `grad` into the active gradient.
    ///
    /// # Arguments
    /// * `active_idx` - The index of the active gradient, must be `0` or `1`.
    /// * `grad` - The gradient to accumulate to the active gradient.
    ///
    /// # Returns
    /// A `SizeMismatchErr` if `grad` isn't the same size as this shard.
    pub fn accumulate(&self, active_idx: usize, grad: &[f32]) -> Result<()> {
        check_len(self.nparams, grad.len())?;

        let mut active_grad = self.grads[active_idx].lock();
        active_grad
            .iter_mut()
            .zip(grad)
            .for_each(|(acc, g)| *acc += g);

        Ok(())
    }

    /// Updates the parameters using the frozen gradient via the optimizer and clears it.
    ///
    /// # Arguments
    /// * `frozen_idx` - The index of the frozen gradient, must be `0` or `1`.
    pub fn update_params(&self, frozen_idx: usize) -> Result<()> {
        let mut params = self.params.write();
        let mut grad = self.grads[frozen_idx].lock();
        self.optimizer.lock().update_params(&grad, &mut params)?;
        grad.fill(0.);
        Ok(())
    }

    /// Copies the shard's parameters into `out`.
    ///
    /// # Returns
    /// A `SizeMismatchErr` if `out` isn't the same size as this shard.
    pub fn pull_params(&self, out: &mut [f32]) -> Result<()> {
        check_len(self.nparams, out.len())?;
        out.copy_from_slice(&self.params.read());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SizeMismatchErr;

    struct AddOptimizer;

    impl Optimizer for AddOptimizer {
        fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
            params.iter_mut().zip(grad).for_each(|(p, g)| *p += g);
            Ok(())
        }
    }

    #[test]
    fn accumulates_into_the_active_buffer_only() {
        let shard = ParameterShard::new(vec![0.; 3], AddOptimizer);

        shard.accumulate(0, &[1.0, 2.0, 3.0]).unwrap();
        shard.accumulate(0, &[1.0, 1.0, 1.0]).unwrap();

        assert_eq!(**shard.grads[0].lock(), [2., 3., 4.]);
        assert_eq!(**shard.grads[1].lock(), [0., 0., 0.]);

        shard.update_params(0).unwrap();

        let mut out = [0.; 3];
        shard.pull_params(&mut out).unwrap();
        assert_eq!(out, [2., 3., 4.]);
        assert_eq!(**shard.grads[0].lock(), [0., 0., 0.]);
    }

    #[test]
    fn double_buffering() {
        let shard = ParameterShard::new(vec![0.], AddOptimizer);

        shard.accumulate(0, &[10.]).unwrap();
        shard.accumulate(1, &[5.]).unwrap();
        shard.update_params(0).unwrap();

        let mut out = [0.];
        shard.pull_params(&mut out).unwrap();
        assert_eq!(out, [10.]);

        shard.update_params(1).unwrap();
        shard.pull_params(&mut out).unwrap();
        assert_eq!(out, [15.]);
    }

    #[test]
    fn rejects_wrong_lengths() {
        let shard = ParameterShard::new(vec![0.; 2], AddOptimizer);

        assert_eq!(
            shard.accumulate(0, &[1.]),
            Err(SizeMismatchErr {
                expected: 2,
                got: 1
            })
        );
        assert!(shard.pull_params(&mut [0.; 3]).is_err());
    }
}

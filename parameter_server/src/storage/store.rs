use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
};

use rayon::prelude::*;

use super::ParameterShard;
use crate::{
    optimization::Optimizer,
    storage::{Result, check_len},
};

/// Partitions a slice of the model's parameters in shards and leverages
/// parallelization to read and write them as fast as possible.
///
/// These methods are private to the crate, they become available
/// through the async interface of a `ParameterHandle`.
#[derive(Debug)]
pub struct ParameterStore<O: Optimizer> {
    nparams: usize,
    active_idx: Arc<AtomicU8>,
    updating: Arc<AtomicBool>,
    shards: Arc<[ParameterShard<O>]>,
    shard_size: NonZeroUsize,
}

impl<O: Optimizer> Clone for ParameterStore<O> {
    fn clone(&self) -> Self {
        Self {
            nparams: self.nparams,
            active_idx: Arc::clone(&self.active_idx),
            updating: Arc::clone(&self.updating),
            shards: Arc::clone(&self.shards),
            shard_size: self.shard_size,
        }
    }
}

impl<O: Optimizer> ParameterStore<O> {
    /// Creates a new `ParameterStore`.
    ///
    /// # Arguments
    /// * `shard_size` - The maximum amount of parameters per shard.
    /// * `params` - The initial parameters.
    /// * `optimizer_factory` - An `Optimizer` factory closure, called once per shard with its length.
    ///
    /// # Returns
    /// A new `ParameterStore` instance.
    pub fn new<OF>(shard_size: NonZeroUsize, params: Vec<f32>, mut optimizer_factory: OF) -> Self
    where
        OF: FnMut(usize) -> O,
    {
        let nparams = params.len();
        let shards: Vec<_> = params
            .chunks(shard_size.get())
            .map(|chunk| ParameterShard::new(chunk.to_vec(), optimizer_factory(chunk.len())))
            .collect();

        Self {
            nparams,
            active_idx: Arc::new(AtomicU8::new(0)),
            updating: Arc::new(AtomicBool::new(false)),
            shards: Arc::from(shards),
            shard_size,
        }
    }

    /// Returns the size of the storage.
    ///
    /// # Returns
    /// The amount of parameters in the storage.
    pub fn len(&self) -> usize {
        self.nparams
    }

    pub fn is_empty(&self) -> bool {
        self.nparams == 0
    }
}

impl<O: Optimizer + Send> ParameterStore<O> {
    /// Accumulates a new gradient into the active gradient buffer.
    ///
    /// # Arguments
    /// * `grad` - A flat slice containing a gradient for the whole storage.
    ///
    /// # Returns
    /// A `SizeMismatchErr` if `grad` doesn't cover exactly the stored parameters.
    pub(crate) fn accumulate(&self, grad: &[f32]) -> Result<()> {
        check_len(self.nparams, grad.len())?;
        let active_idx = self.active_idx.load(Ordering::Acquire) as usize;

        self.shards
            .par_iter()
            .zip(grad.par_chunks(self.shard_size.get()))
            .try_for_each(|(shard, grad_slice)| shard.accumulate(active_idx, grad_slice))
    }

    /// Swaps the active gradient buffer and applies the frozen gradient to the parameters.
    ///
    /// If another update is already running this is a no-op, the gradient accumulated meanwhile
    /// is applied on the next call.
    pub(crate) fn update_params(&self) -> Result<()> {
        let success = self
            .updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok();

        if !success {
            return Ok(());
        }

        let frozen_idx = self.active_idx.fetch_xor(1, Ordering::AcqRel) as usize;
        let res = self
            .shards
            .par_iter()
            .try_for_each(|shard| shard.update_params(frozen_idx));

        self.updating.store(false, Ordering::Release);
        res
    }

    /// Gathers all the sharded parameters into a local buffer.
    ///
    /// # Arguments
    /// * `out` - A mutable slice where the parameters will be copied.
    ///
    /// # Returns
    /// A `SizeMismatchErr` if `out` isn't the size of the storage.
    pub(crate) fn pull_params(&self, out: &mut [f32]) -> Result<()> {
        check_len(self.nparams, out.len())?;

        self.shards
            .par_iter()
            .zip(out.par_chunks_mut(self.shard_size.get()))
            .try_for_each(|(shard, out_slice)| shard.pull_params(out_slice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AddOptimizer;

    impl Optimizer for AddOptimizer {
        fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
            params.iter_mut().zip(grad).for_each(|(p, g)| *p += g);
            Ok(())
        }
    }

    fn create_test_store(params: usize, shard_size: usize) -> ParameterStore<AddOptimizer> {
        let shard_size = NonZeroUsize::new(shard_size).unwrap();
        ParameterStore::new(shard_size, vec![0.; params], |_| AddOptimizer)
    }

    #[test]
    fn test_handle_ragged_shards() {
        const PARAMS: usize = 15;
        const SHARD_SIZE: usize = 8;

        let store = create_test_store(PARAMS, SHARD_SIZE);
        assert_eq!(store.shards.len(), 2);

        store.accumulate(&[1.0; PARAMS]).unwrap();
        store.update_params().unwrap();

        let mut out = [0.0; PARAMS];
        store.pull_params(&mut out).unwrap();
        assert_eq!(out, [1.0; PARAMS]);
    }

    #[test]
    fn test_handle_buffer_swap() {
        const PARAMS: usize = 10;
        const SHARD_SIZE: usize = 1;

        let store = create_test_store(PARAMS, SHARD_SIZE);
        store.accumulate(&[1.0; PARAMS]).unwrap();

        store.update_params().unwrap();
        assert_eq!(store.active_idx.load(Ordering::Acquire), 1);
        store.accumulate(&[5.0; PARAMS]).unwrap();

        let mut params = [0.0; PARAMS];
        store.pull_params(&mut params).unwrap();
        assert_eq!(params, [1.0; PARAMS]);

        store.update_params().unwrap();
        store.pull_params(&mut params).unwrap();
        assert_eq!(params, [6.0; PARAMS]);
    }

    #[test]
    fn test_update_locking_mechanism() {
        const PARAMS: usize = 10;
        const SHARD_SIZE: usize = 1;

        let store = create_test_store(PARAMS, SHARD_SIZE);
        store.updating.store(true, Ordering::SeqCst);

        let active_idx = store.active_idx.load(Ordering::Acquire);
        store.update_params().unwrap();
        assert_eq!(store.active_idx.load(Ordering::Acquire), active_idx);

        store.updating.store(false, Ordering::Release);
        store.update_params().unwrap();
        assert_ne!(store.active_idx.load(Ordering::SeqCst), active_idx);
    }

    #[test]
    fn keeps_the_initial_params() {
        let store = ParameterStore::new(NonZeroUsize::new(2).unwrap(), vec![1., 2., 3.], |_| {
            AddOptimizer
        });

        let mut out = [0.; 3];
        store.pull_params(&mut out).unwrap();
        assert_eq!(out, [1., 2., 3.]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn rejects_gradients_of_another_size() {
        let store = create_test_store(4, 2);
        assert!(store.accumulate(&[1.; 3]).is_err());
        assert!(store.pull_params(&mut [0.; 5]).is_err());
    }
}

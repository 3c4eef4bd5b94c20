use log::debug;
use ndarray::{
    Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis, Zip, concatenate,
    linalg::general_mat_mul, s,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Uniform};

use crate::{
    Model,
    config::{AggType, SageConfig},
    error::{Result, SageErr},
    loss::{UnsupervisedBatch, unsupervised_loss},
    tree::SampleTree,
};

/// The position of one layer inside the flat parameter vector.
#[derive(Debug, Clone, Copy)]
struct Layer {
    input: usize,
    output: usize,
    offset: usize,
}

impl Layer {
    fn size(&self) -> usize {
        (self.input + 1) * self.output
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(&self, params: &'a [f32]) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        let raw = &params[self.offset..self.offset + self.size()];
        let (w_raw, b_raw) = raw.split_at(self.input * self.output);
        let weights = ArrayView2::from_shape((self.input, self.output), w_raw)?;
        let biases = ArrayView1::from_shape(self.output, b_raw)?;
        Ok((weights, biases))
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        let raw = &mut grad[self.offset..self.offset + self.size()];
        let (dw_raw, db_raw) = raw.split_at_mut(self.input * self.output);
        let dw = ArrayViewMut2::from_shape((self.input, self.output), dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.output, db_raw)?;
        Ok((dw, db))
    }
}

/// What the backward pass needs from one layer applied to one level.
struct Step {
    agg: Array2<f32>,
    pre: Array2<f32>,
}

/// The intermediate values of a forward pass.
struct Trace {
    rows: Vec<usize>,
    steps: Vec<Vec<Step>>,
}

/// A GraphSage encoder trained without supervision.
///
/// Layer `k` turns the representations of levels `0..=hops-k` of a sample tree into the ones
/// of levels `0..hops-k`, so after `hops` layers only the roots remain.
#[derive(Debug, Clone)]
pub struct GraphSage {
    config: SageConfig,
    layers: Vec<Layer>,
    size: usize,
}

impl GraphSage {
    /// Creates a new `GraphSage` model.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters of the model.
    pub fn new(config: SageConfig) -> Self {
        let dims = config.dims();
        let mut offset = 0;

        let layers = dims
            .windows(2)
            .map(|pair| {
                let layer = Layer {
                    input: config.agg_type.input_dim(pair[0]),
                    output: pair[1],
                    offset,
                };
                offset += layer.size();
                layer
            })
            .collect();

        Self {
            config,
            layers,
            size: offset,
        }
    }

    pub fn config(&self) -> &SageConfig {
        &self.config
    }

    fn check_params(&self, params: &[f32]) -> Result<()> {
        if params.len() != self.size {
            return Err(SageErr::ParamsLength {
                expected: self.size,
                got: params.len(),
            });
        }

        Ok(())
    }

    fn forward(
        &self,
        params: &[f32],
        mut h: Vec<Array2<f32>>,
        mut trace: Option<&mut Trace>,
    ) -> Result<Array2<f32>> {
        let hops = self.layers.len();

        for (k, layer) in self.layers.iter().enumerate() {
            let (w, b) = layer.view_params(params)?;
            let last = k + 1 == hops;

            let mut next = Vec::with_capacity(hops - k);
            let mut steps = Vec::with_capacity(hops - k);

            for l in 0..hops - k {
                let fanout = self.config.neighs_num[l];
                let agg = aggregate(self.config.agg_type, &h[l], &h[l + 1], fanout)?;
                let pre = agg.dot(&w) + &b;

                next.push(if last { pre.clone() } else { pre.mapv(relu) });
                if trace.is_some() {
                    steps.push(Step { agg, pre });
                }
            }

            if let Some(trace) = trace.as_deref_mut() {
                trace.steps.push(steps);
            }

            h = next;
        }

        h.into_iter().next().ok_or(SageErr::TreeDepth {
            expected: hops + 1,
            got: 0,
        })
    }

    fn backward(
        &self,
        params: &[f32],
        trace: Trace,
        d_out: Array2<f32>,
        grad: &mut [f32],
    ) -> Result<()> {
        let dims = self.config.dims();
        let hops = self.layers.len();
        let mut upstream = vec![d_out];

        for (k, steps) in trace.steps.into_iter().enumerate().rev() {
            let layer = self.layers[k];
            let (w, _) = layer.view_params(params)?;
            let (mut dw, mut db) = layer.view_grad(grad)?;

            let mut downstream: Vec<Array2<f32>> = if k > 0 {
                (0..=hops - k)
                    .map(|l| Array2::zeros((trace.rows[l], dims[k])))
                    .collect()
            } else {
                Vec::new()
            };

            for (l, (step, mut dz)) in steps.into_iter().zip(upstream).enumerate() {
                if k + 1 < hops {
                    Zip::from(&mut dz)
                        .and(&step.pre)
                        .for_each(|d, &z| if z <= 0. { *d = 0. });
                }

                general_mat_mul(1., &step.agg.t(), &dz, 1., &mut dw);
                db += &dz.sum_axis(Axis(0));

                if k > 0 {
                    let d_agg = dz.dot(&w.t());
                    let (own, rest) = downstream.split_at_mut(l + 1);
                    scatter(
                        self.config.agg_type,
                        d_agg.view(),
                        self.config.neighs_num[l],
                        &mut own[l],
                        &mut rest[0],
                    )?;
                }
            }

            upstream = downstream;
        }

        Ok(())
    }
}

fn relu(x: f32) -> f32 {
    x.max(0.)
}

/// Combines every row of `own` with its `fanout` consecutive rows of `neigh`.
fn aggregate(
    agg_type: AggType,
    own: &Array2<f32>,
    neigh: &Array2<f32>,
    fanout: usize,
) -> Result<Array2<f32>> {
    let (n, d) = own.dim();
    let summed = if fanout == 0 {
        Array2::zeros((n, d))
    } else {
        neigh
            .view()
            .into_shape_with_order((n, fanout, d))?
            .sum_axis(Axis(1))
    };

    let agg = match agg_type {
        AggType::Gcn => (own + &summed) / (fanout + 1) as f32,
        AggType::Mean => {
            let mean = summed / fanout.max(1) as f32;
            concatenate(Axis(1), &[own.view(), mean.view()])?
        }
        AggType::Sum => concatenate(Axis(1), &[own.view(), summed.view()])?,
    };

    Ok(agg)
}

/// Sends the gradient of an aggregation back to the rows it was built from.
fn scatter(
    agg_type: AggType,
    d_agg: ArrayView2<f32>,
    fanout: usize,
    own: &mut Array2<f32>,
    neigh: &mut Array2<f32>,
) -> Result<()> {
    let (n, d) = own.dim();

    let (d_own, d_neigh) = match agg_type {
        AggType::Gcn => {
            let shared = &d_agg / (fanout + 1) as f32;
            (shared.clone(), shared)
        }
        AggType::Mean => (
            d_agg.slice(s![.., ..d]).to_owned(),
            &d_agg.slice(s![.., d..]) / fanout.max(1) as f32,
        ),
        AggType::Sum => (
            d_agg.slice(s![.., ..d]).to_owned(),
            d_agg.slice(s![.., d..]).to_owned(),
        ),
    };

    *own += &d_own;
    if fanout > 0 {
        let mut grouped = neigh.view_mut().into_shape_with_order((n, fanout, d))?;
        grouped += &d_neigh.insert_axis(Axis(1));
    }

    Ok(())
}

impl Model for GraphSage {
    fn param_count(&self) -> usize {
        self.size
    }

    fn init_params(&self, seed: u64) -> Result<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut params = Vec::with_capacity(self.size);

        for layer in &self.layers {
            let range = (6. / (layer.input + layer.output) as f32).sqrt();
            let xavier = Uniform::new(-range, range)?;
            params.extend((0..layer.input * layer.output).map(|_| xavier.sample(&mut rng)));
            params.extend(std::iter::repeat_n(0., layer.output));
        }

        Ok(params)
    }

    fn fanouts(&self) -> &[usize] {
        &self.config.neighs_num
    }

    fn neg_num(&self) -> usize {
        self.config.neg_num
    }

    fn loss_and_grad<R: Rng>(
        &self,
        params: &[f32],
        batch: UnsupervisedBatch,
        rng: &mut R,
    ) -> Result<(f32, Vec<f32>)> {
        self.check_params(params)?;
        batch
            .tree
            .validate(&self.config.neighs_num, self.config.features_num)?;
        batch.check_roots()?;

        let UnsupervisedBatch {
            mut tree,
            batch_size,
            neg_num,
        } = batch;
        tree.dropout(self.config.in_drop_rate, rng);

        let levels = tree.into_levels();
        let mut trace = Trace {
            rows: levels.iter().map(|level| level.nrows()).collect(),
            steps: Vec::with_capacity(self.layers.len()),
        };

        let emb = self.forward(params, levels, Some(&mut trace))?;
        let (loss, d_emb) = unsupervised_loss(emb.view(), batch_size, neg_num);

        let mut grad = vec![0.; self.size];
        self.backward(params, trace, d_emb, &mut grad)?;

        debug!(loss = loss, batch_size = batch_size; "computed batch gradient");
        Ok((loss, grad))
    }

    fn embed(&self, params: &[f32], tree: &SampleTree) -> Result<Array2<f32>> {
        self.check_params(params)?;
        tree.validate(&self.config.neighs_num, self.config.features_num)?;
        self.forward(params, tree.levels().to_vec(), None)
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;

    fn config(agg_type: AggType, neighs_num: Vec<usize>) -> SageConfig {
        SageConfig {
            features_num: 3,
            hidden_dim: 4,
            class_num: 5,
            neighs_num,
            agg_type,
            in_drop_rate: 0.,
            neg_num: 2,
        }
    }

    fn random_tree(rng: &mut StdRng, roots: usize, fanouts: &[usize], features: usize) -> SampleTree {
        let mut rows = roots;
        let mut levels = Vec::new();
        for l in 0..=fanouts.len() {
            levels.push(Array2::from_shape_fn((rows, features), |_| {
                rng.random_range(0.5..1.5)
            }));
            if let Some(fanout) = fanouts.get(l) {
                rows *= fanout;
            }
        }

        SampleTree::new(levels)
    }

    fn batch(model: &GraphSage, rng: &mut StdRng, batch_size: usize) -> UnsupervisedBatch {
        let config = model.config();
        let roots = UnsupervisedBatch::roots_for(batch_size, config.neg_num);
        UnsupervisedBatch {
            tree: random_tree(rng, roots, &config.neighs_num, config.features_num),
            batch_size,
            neg_num: config.neg_num,
        }
    }

    /// Compares every partial derivative against a central finite difference.
    fn check_gradient(model: &GraphSage, params: &[f32], batch: &UnsupervisedBatch) {
        let mut rng = StdRng::seed_from_u64(0);
        let (_, grad) = model
            .loss_and_grad(params, batch.clone(), &mut rng)
            .unwrap();

        let eps = 1e-2;
        for i in 0..params.len() {
            let mut plus = params.to_vec();
            plus[i] += eps;
            let mut minus = params.to_vec();
            minus[i] -= eps;

            let (lp, _) = model.loss_and_grad(&plus, batch.clone(), &mut rng).unwrap();
            let (lm, _) = model.loss_and_grad(&minus, batch.clone(), &mut rng).unwrap();
            let numeric = (lp - lm) / (2. * eps);

            let tolerance = 2e-2 * grad[i].abs().max(1.);
            assert!(
                (numeric - grad[i]).abs() < tolerance,
                "parameter {i}: numeric {numeric}, analytic {}",
                grad[i]
            );
        }
    }

    #[test]
    fn param_count_matches_layout() {
        let gcn = GraphSage::new(SageConfig {
            features_num: 2,
            hidden_dim: 256,
            class_num: 32,
            neighs_num: vec![10, 20],
            agg_type: AggType::Gcn,
            in_drop_rate: 0.5,
            neg_num: 10,
        });
        assert_eq!(gcn.param_count(), 3 * 256 + 257 * 32);

        let mean = GraphSage::new(SageConfig {
            agg_type: AggType::Mean,
            ..gcn.config().clone()
        });
        assert_eq!(mean.param_count(), 5 * 256 + 513 * 32);
    }

    #[test]
    fn init_params_is_seeded_xavier_with_zero_biases() {
        let model = GraphSage::new(config(AggType::Gcn, vec![2]));
        let params = model.init_params(42).unwrap();

        assert_eq!(params.len(), model.param_count());
        assert_eq!(params, model.init_params(42).unwrap());
        assert_ne!(params, model.init_params(43).unwrap());

        let range = (6f32 / 8.).sqrt();
        let (weights, biases) = params.split_at(3 * 5);
        assert!(weights.iter().all(|w| w.abs() <= range));
        assert!(biases.iter().all(|&b| b == 0.));
    }

    #[test]
    fn embed_yields_one_row_per_root() {
        let model = GraphSage::new(config(AggType::Mean, vec![3, 2]));
        let params = model.init_params(1).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let tree = random_tree(&mut rng, 7, &[3, 2], 3);

        let emb = model.embed(&params, &tree).unwrap();
        assert_eq!(emb.dim(), (7, 5));
        assert!(emb.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn rejects_wrong_params_and_trees() {
        let model = GraphSage::new(config(AggType::Gcn, vec![2]));
        let mut rng = StdRng::seed_from_u64(1);
        let tree = random_tree(&mut rng, 2, &[2], 3);

        assert!(matches!(
            model.embed(&[0.; 3], &tree),
            Err(SageErr::ParamsLength { .. })
        ));

        let params = model.init_params(1).unwrap();
        let shallow = random_tree(&mut rng, 2, &[], 3);
        assert!(matches!(
            model.embed(&params, &shallow),
            Err(SageErr::TreeDepth { .. })
        ));

        let uneven = UnsupervisedBatch {
            tree,
            batch_size: 1,
            neg_num: 2,
        };
        assert!(matches!(
            model.loss_and_grad(&params, uneven, &mut rng),
            Err(SageErr::BatchRoots { .. })
        ));
    }

    #[test]
    fn one_hop_gradients_match_finite_differences() {
        for agg_type in [AggType::Gcn, AggType::Mean, AggType::Sum] {
            let model = GraphSage::new(config(agg_type, vec![3]));
            let params = model.init_params(3).unwrap();
            let mut rng = StdRng::seed_from_u64(3);
            let batch = batch(&model, &mut rng, 2);

            check_gradient(&model, &params, &batch);
        }
    }

    #[test]
    fn two_hop_gradients_match_finite_differences() {
        let model = GraphSage::new(config(AggType::Gcn, vec![2, 2]));
        let mut params = model.init_params(5).unwrap();

        // Keep the hidden layer away from the ReLU kink.
        let first = model.layers[0];
        let w_size = first.input * first.output;
        params[..w_size].iter_mut().for_each(|w| *w = w.abs());
        params[w_size..first.size()].fill(0.5);

        let mut rng = StdRng::seed_from_u64(5);
        let batch = batch(&model, &mut rng, 2);

        check_gradient(&model, &params, &batch);
    }

    #[test]
    fn dropout_changes_the_loss() {
        let model = GraphSage::new(SageConfig {
            in_drop_rate: 0.5,
            ..config(AggType::Gcn, vec![2])
        });
        let params = model.init_params(9).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let batch = batch(&model, &mut rng, 3);

        let (a, _) = model.loss_and_grad(&params, batch.clone(), &mut rng).unwrap();
        let (b, _) = model.loss_and_grad(&params, batch, &mut rng).unwrap();
        assert_ne!(a, b);
    }
}

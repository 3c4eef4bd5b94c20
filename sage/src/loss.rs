use ndarray::{Array2, ArrayView2};

use crate::{
    error::{Result, SageErr},
    tree::SampleTree,
};

/// A batch of positive edges with their negative samples.
///
/// The roots of `tree` are the `batch_size` sources, then the `batch_size` destinations and
/// finally `neg_num` negatives per source, grouped by source.
#[derive(Debug, Clone)]
pub struct UnsupervisedBatch {
    pub tree: SampleTree,
    pub batch_size: usize,
    pub neg_num: usize,
}

impl UnsupervisedBatch {
    /// The amount of roots a batch of `batch_size` edges with `neg_num` negatives each has.
    pub fn roots_for(batch_size: usize, neg_num: usize) -> usize {
        batch_size * (2 + neg_num)
    }

    pub(crate) fn check_roots(&self) -> Result<()> {
        let roots = self.tree.roots();
        if roots != Self::roots_for(self.batch_size, self.neg_num) {
            return Err(SageErr::BatchRoots {
                batch_size: self.batch_size,
                neg_num: self.neg_num,
                got: roots,
            });
        }

        Ok(())
    }
}

fn sigmoid(x: f32) -> f32 {
    if x >= 0. {
        1. / (1. + (-x).exp())
    } else {
        let e = x.exp();
        e / (1. + e)
    }
}

/// `ln(1 + e^x)`, which is `-ln σ(-x)`.
fn softplus(x: f32) -> f32 {
    x.max(0.) + (-x.abs()).exp().ln_1p()
}

/// Computes the negative sampling loss of a batch of embeddings and its gradient.
///
/// Every source `s` with destination `d` and negatives `n_k` contributes
/// `-ln σ(s·d) - Σ_k ln σ(-s·n_k)`, the loss is the mean over sources.
///
/// # Arguments
/// * `emb` - The embeddings laid out as the roots of an `UnsupervisedBatch`.
/// * `batch_size` - The amount of positive edges.
/// * `neg_num` - The amount of negatives per source.
///
/// # Returns
/// The loss and its gradient with respect to `emb`.
pub fn unsupervised_loss(
    emb: ArrayView2<f32>,
    batch_size: usize,
    neg_num: usize,
) -> (f32, Array2<f32>) {
    let mut grad = Array2::zeros(emb.raw_dim());
    if batch_size == 0 {
        return (0., grad);
    }

    let scale = 1. / batch_size as f32;
    let mut loss = 0.;

    for i in 0..batch_size {
        let src = emb.row(i);
        let dst_row = batch_size + i;
        let dst = emb.row(dst_row);

        let pos = src.dot(&dst);
        loss += softplus(-pos);
        let g = (sigmoid(pos) - 1.) * scale;
        grad.row_mut(i).scaled_add(g, &dst);
        grad.row_mut(dst_row).scaled_add(g, &src);

        for k in 0..neg_num {
            let neg_row = 2 * batch_size + i * neg_num + k;
            let neg = emb.row(neg_row);

            let x = src.dot(&neg);
            loss += softplus(x);
            let g = sigmoid(x) * scale;
            grad.row_mut(i).scaled_add(g, &neg);
            grad.row_mut(neg_row).scaled_add(g, &src);
        }
    }

    (loss * scale, grad)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn zero_embeddings_cost_ln2_per_term() {
        let emb = Array2::zeros((2 * (2 + 3), 4));
        let (loss, grad) = unsupervised_loss(emb.view(), 2, 3);

        assert!((loss - 4. * std::f32::consts::LN_2).abs() < 1e-5);
        assert!(grad.iter().all(|&g| g == 0.));
    }

    #[test]
    fn aligned_pairs_cost_less_than_opposed_ones() {
        let aligned = array![[2., 0.], [2., 0.], [-2., 0.]];
        let opposed = array![[2., 0.], [-2., 0.], [2., 0.]];

        let (low, _) = unsupervised_loss(aligned.view(), 1, 1);
        let (high, _) = unsupervised_loss(opposed.view(), 1, 1);
        assert!(low < high);
    }

    #[test]
    fn gradient_pulls_positives_together() {
        let emb = array![[1., 0.], [0., 1.], [0., 0.]];
        let (_, grad) = unsupervised_loss(emb.view(), 1, 1);

        // Descending moves the source towards the destination and vice versa.
        assert!(grad[[0, 1]] < 0.);
        assert!(grad[[1, 0]] < 0.);
    }

    #[test]
    fn softplus_is_stable() {
        assert!((softplus(0.) - std::f32::consts::LN_2).abs() < 1e-6);
        assert!((softplus(100.) - 100.).abs() < 1e-3);
        assert!(softplus(-100.) >= 0.);
        assert!(softplus(-100.) < 1e-30);
    }
}

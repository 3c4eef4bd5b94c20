use ndarray::Array2;
use rand::Rng;

use crate::error::{Result, SageErr};

/// The features of a batch of roots and of their sampled neighborhoods.
///
/// Level `0` holds the roots, level `l + 1` holds `fanouts[l]` consecutive rows per row of
/// level `l`, the neighbors sampled for it.
#[derive(Debug, Clone)]
pub struct SampleTree {
    levels: Vec<Array2<f32>>,
}

impl SampleTree {
    /// Creates a new `SampleTree`.
    ///
    /// # Arguments
    /// * `levels` - The feature matrix of every level, roots first.
    pub fn new(levels: Vec<Array2<f32>>) -> Self {
        Self { levels }
    }

    /// The amount of roots of this tree.
    pub fn roots(&self) -> usize {
        self.levels.first().map(|level| level.nrows()).unwrap_or(0)
    }

    pub fn levels(&self) -> &[Array2<f32>] {
        &self.levels
    }

    pub fn into_levels(self) -> Vec<Array2<f32>> {
        self.levels
    }

    /// Checks that this tree has the shape a model with the given fanouts expects.
    ///
    /// # Arguments
    /// * `fanouts` - The amount of neighbors sampled at each hop.
    /// * `features_num` - The width of every feature row.
    ///
    /// # Returns
    /// An error describing the first mismatch found.
    pub fn validate(&self, fanouts: &[usize], features_num: usize) -> Result<()> {
        if self.levels.len() != fanouts.len() + 1 {
            return Err(SageErr::TreeDepth {
                expected: fanouts.len() + 1,
                got: self.levels.len(),
            });
        }

        let mut rows = self.roots();
        for (level, features) in self.levels.iter().enumerate() {
            if features.nrows() != rows {
                return Err(SageErr::LevelRows {
                    level,
                    expected: rows,
                    got: features.nrows(),
                });
            }

            if features.ncols() != features_num {
                return Err(SageErr::FeatureDim {
                    expected: features_num,
                    got: features.ncols(),
                });
            }

            if let Some(fanout) = fanouts.get(level) {
                rows *= fanout;
            }
        }

        Ok(())
    }

    /// Zeroes every feature with probability `rate` and scales the survivors by `1 / (1 - rate)`.
    pub fn dropout<R: Rng>(&mut self, rate: f32, rng: &mut R) {
        if rate <= 0. {
            return;
        }

        if rate >= 1. {
            self.levels.iter_mut().for_each(|level| level.fill(0.));
            return;
        }

        let scale = 1. / (1. - rate);
        for level in &mut self.levels {
            level.mapv_inplace(|x| if rng.random::<f32>() < rate { 0. } else { x * scale });
        }
    }
}

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SageErr;

/// How a node combines its own representation with the ones of its sampled neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggType {
    /// Mean over the node and its neighbors.
    Gcn,
    /// The node concatenated with the mean of its neighbors.
    Mean,
    /// The node concatenated with the sum of its neighbors.
    Sum,
}

impl AggType {
    /// The input width of a layer using this aggregator over `d_in` wide representations.
    pub fn input_dim(self, d_in: usize) -> usize {
        match self {
            AggType::Gcn => d_in,
            AggType::Mean | AggType::Sum => 2 * d_in,
        }
    }
}

impl FromStr for AggType {
    type Err = SageErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gcn" => Ok(AggType::Gcn),
            "mean" => Ok(AggType::Mean),
            "sum" => Ok(AggType::Sum),
            _ => Err(SageErr::UnknownAggregator(s.to_string())),
        }
    }
}

/// The hyperparameters of a GraphSage model.
#[derive(Debug, Clone, PartialEq)]
pub struct SageConfig {
    pub features_num: usize,
    pub hidden_dim: usize,
    pub class_num: usize,
    /// The fanout of each hop, its length is the amount of layers.
    pub neighs_num: Vec<usize>,
    pub agg_type: AggType,
    pub in_drop_rate: f32,
    pub neg_num: usize,
}

impl SageConfig {
    /// The representation width before and after every layer.
    ///
    /// # Returns
    /// `hops + 1` dimensions, the first one being `features_num` and the last one `class_num`.
    pub fn dims(&self) -> Vec<usize> {
        let hops = self.neighs_num.len();
        let mut dims = Vec::with_capacity(hops + 1);
        dims.push(self.features_num);
        dims.extend(std::iter::repeat_n(self.hidden_dim, hops.saturating_sub(1)));
        if hops > 0 {
            dims.push(self.class_num);
        }

        dims
    }

    /// The amount of layers of the model.
    pub fn hops(&self) -> usize {
        self.neighs_num.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(neighs_num: Vec<usize>) -> SageConfig {
        SageConfig {
            features_num: 2,
            hidden_dim: 256,
            class_num: 32,
            neighs_num,
            agg_type: AggType::Gcn,
            in_drop_rate: 0.5,
            neg_num: 10,
        }
    }

    #[test]
    fn dims_follow_hops() {
        assert_eq!(config(vec![10, 20]).dims(), vec![2, 256, 32]);
        assert_eq!(config(vec![5]).dims(), vec![2, 32]);
        assert_eq!(config(vec![3, 3, 3]).dims(), vec![2, 256, 256, 32]);
    }

    #[test]
    fn aggregator_names() {
        assert_eq!("gcn".parse::<AggType>().unwrap(), AggType::Gcn);
        assert_eq!("Mean".parse::<AggType>().unwrap(), AggType::Mean);
        assert_eq!("sum".parse::<AggType>().unwrap(), AggType::Sum);
        assert!(matches!(
            "max".parse::<AggType>(),
            Err(SageErr::UnknownAggregator(_))
        ));
    }

    #[test]
    fn concat_aggregators_double_the_input() {
        assert_eq!(AggType::Gcn.input_dim(8), 8);
        assert_eq!(AggType::Mean.input_dim(8), 16);
        assert_eq!(AggType::Sum.input_dim(8), 16);
    }
}

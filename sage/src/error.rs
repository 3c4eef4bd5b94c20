use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;
use rand_distr::uniform::Error as UniformError;

/// The result type used in the entire sage crate.
pub type Result<T> = std::result::Result<T, SageErr>;

/// The model's error type.
#[derive(Debug)]
pub enum SageErr {
    Shape(ShapeError),
    Init(UniformError),
    ParamsLength {
        expected: usize,
        got: usize,
    },
    TreeDepth {
        expected: usize,
        got: usize,
    },
    LevelRows {
        level: usize,
        expected: usize,
        got: usize,
    },
    FeatureDim {
        expected: usize,
        got: usize,
    },
    BatchRoots {
        batch_size: usize,
        neg_num: usize,
        got: usize,
    },
    UnknownAggregator(String),
}

impl Display for SageErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SageErr::Shape(e) => write!(f, "shape error: {e}"),
            SageErr::Init(e) => write!(f, "failed to initialize the parameters: {e}"),
            SageErr::ParamsLength { expected, got } => {
                write!(f, "expected {expected} parameters, got {got}")
            }
            SageErr::TreeDepth { expected, got } => {
                write!(f, "the sample tree should have {expected} levels, it has {got}")
            }
            SageErr::LevelRows {
                level,
                expected,
                got,
            } => write!(
                f,
                "level {level} of the sample tree should have {expected} rows, it has {got}"
            ),
            SageErr::FeatureDim { expected, got } => {
                write!(f, "expected {expected} features per node, got {got}")
            }
            SageErr::BatchRoots {
                batch_size,
                neg_num,
                got,
            } => write!(
                f,
                "a batch of {batch_size} edges with {neg_num} negatives each can't have {got} roots"
            ),
            SageErr::UnknownAggregator(name) => write!(f, "unknown aggregator type `{name}`"),
        }
    }
}

impl Error for SageErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SageErr::Shape(e) => Some(e),
            SageErr::Init(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for SageErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<UniformError> for SageErr {
    fn from(value: UniformError) -> Self {
        Self::Init(value)
    }
}

use std::{
    error::Error,
    fmt::{self, Display},
};

/// Error returned when an optimizer is requested by a name this crate doesn't implement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecErr(pub String);

impl Display for SpecErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown learning algorithm `{}`, expected one of adam, sgd, momentum or adagrad",
            self.0
        )
    }
}

impl Error for SpecErr {}

/// The optimization algorithm and its hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimizerSpec {
    Adam {
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    },
    GradientDescent {
        learning_rate: f32,
    },
    GradientDescentWithMomentum {
        learning_rate: f32,
        momentum: f32,
    },
    Adagrad {
        learning_rate: f32,
        initial_accumulator: f32,
        epsilon: f32,
    },
}

impl OptimizerSpec {
    /// Resolves a learning algorithm by name with its usual default hyperparameters.
    ///
    /// # Arguments
    /// * `name` - One of `adam`, `sgd` (or `gradient_descent`), `momentum` or `adagrad`.
    /// * `learning_rate` - The learning rate to use.
    ///
    /// # Returns
    /// The spec or a `SpecErr` if the name is unknown.
    pub fn from_name(name: &str, learning_rate: f32) -> Result<Self, SpecErr> {
        let spec = match name.trim().to_ascii_lowercase().as_str() {
            "adam" => OptimizerSpec::Adam {
                learning_rate,
                beta1: 0.9,
                beta2: 0.999,
                epsilon: 1e-8,
            },
            "sgd" | "gradient_descent" => OptimizerSpec::GradientDescent { learning_rate },
            "momentum" => OptimizerSpec::GradientDescentWithMomentum {
                learning_rate,
                momentum: 0.9,
            },
            "adagrad" => OptimizerSpec::Adagrad {
                learning_rate,
                initial_accumulator: 0.1,
                epsilon: 1e-7,
            },
            _ => return Err(SpecErr(name.to_string())),
        };

        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_names() {
        assert!(matches!(
            OptimizerSpec::from_name("adam", 0.005),
            Ok(OptimizerSpec::Adam { learning_rate, .. }) if learning_rate == 0.005
        ));
        assert!(matches!(
            OptimizerSpec::from_name("SGD", 0.1),
            Ok(OptimizerSpec::GradientDescent { .. })
        ));
        assert!(matches!(
            OptimizerSpec::from_name("gradient_descent", 0.1),
            Ok(OptimizerSpec::GradientDescent { .. })
        ));
        assert!(matches!(
            OptimizerSpec::from_name("momentum", 0.1),
            Ok(OptimizerSpec::GradientDescentWithMomentum { momentum, .. }) if momentum == 0.9
        ));
        assert!(matches!(
            OptimizerSpec::from_name("adagrad", 0.1),
            Ok(OptimizerSpec::Adagrad { .. })
        ));
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(
            OptimizerSpec::from_name("rmsprop", 0.1),
            Err(SpecErr("rmsprop".to_string()))
        );
    }
}

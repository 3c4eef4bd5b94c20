use std::{error::Error, fmt, io};

use graph::{GraphErr, HandleErr};
use parameter_server::SpecErr;
use sage::SageErr;
use trainer::{Role, TrainErr};

use crate::config::ConfigErr;

/// The launcher's result type.
pub type Result<T> = std::result::Result<T, LaunchErr>;

/// Every failure that ends a launch.
#[derive(Debug)]
pub enum LaunchErr {
    Io(io::Error),
    Config(ConfigErr),
    Handle(HandleErr),
    Graph(GraphErr),
    Model(SageErr),
    Optimizer(SpecErr),
    Train(TrainErr),
    /// The acquired graph handle doesn't fit the process role.
    GraphRole(Role),
}

impl fmt::Display for LaunchErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchErr::Io(e) => write!(f, "io error: {e}"),
            LaunchErr::Config(e) => write!(f, "config error: {e}"),
            LaunchErr::Handle(e) => write!(f, "{e}"),
            LaunchErr::Graph(e) => write!(f, "graph error: {e}"),
            LaunchErr::Model(e) => write!(f, "model error: {e}"),
            LaunchErr::Optimizer(e) => write!(f, "{e}"),
            LaunchErr::Train(e) => write!(f, "training error: {e}"),
            LaunchErr::GraphRole(role) => {
                write!(f, "the acquired graph doesn't match the {role} role")
            }
        }
    }
}

impl Error for LaunchErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LaunchErr::Io(e) => Some(e),
            LaunchErr::Config(e) => Some(e),
            LaunchErr::Handle(e) => Some(e),
            LaunchErr::Graph(e) => Some(e),
            LaunchErr::Model(e) => Some(e),
            LaunchErr::Optimizer(e) => Some(e),
            LaunchErr::Train(e) => Some(e),
            LaunchErr::GraphRole(_) => None,
        }
    }
}

macro_rules! impl_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for LaunchErr {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from!(
    Io(io::Error),
    Config(ConfigErr),
    Handle(HandleErr),
    Graph(GraphErr),
    Model(SageErr),
    Optimizer(SpecErr),
    Train(TrainErr),
);

/// Boundary conversion for binaries / I/O APIs.
impl From<LaunchErr> for io::Error {
    fn from(value: LaunchErr) -> Self {
        match value {
            LaunchErr::Io(e) => e,
            LaunchErr::Graph(e) => e.into(),
            LaunchErr::Train(e) => e.into(),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

use std::{error::Error, fmt, io};

use graph::GraphErr;
use sage::SageErr;

use crate::Role;

/// The trainer's result type.
pub type Result<T> = std::result::Result<T, TrainErr>;

/// Distributed training failures.
#[derive(Debug)]
pub enum TrainErr {
    Io(io::Error),
    Graph(GraphErr),
    Model(SageErr),
    UnexpectedMessage {
        server: usize,
        got: &'static str,
    },
    ParamsLength {
        server: usize,
        expected: usize,
        got: usize,
    },
    Remote {
        server: usize,
        detail: String,
    },
    NoParameterServers,
    TaskIndex {
        index: usize,
        tasks: usize,
    },
    WrongRole {
        expected: Role,
        got: Role,
    },
    NotTrained,
    ListenerClosed,
}

impl fmt::Display for TrainErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainErr::Io(e) => write!(f, "io error: {e}"),
            TrainErr::Graph(e) => write!(f, "graph error: {e}"),
            TrainErr::Model(e) => write!(f, "model error: {e}"),
            TrainErr::UnexpectedMessage { server, got } => {
                write!(f, "unexpected message from parameter server {server}: got {got}")
            }
            TrainErr::ParamsLength {
                server,
                expected,
                got,
            } => write!(
                f,
                "parameter server {server} sent {got} parameters, expected {expected}"
            ),
            TrainErr::Remote { server, detail } => {
                write!(f, "parameter server {server} failed: {detail}")
            }
            TrainErr::NoParameterServers => f.write_str("the cluster has no parameter servers"),
            TrainErr::TaskIndex { index, tasks } => {
                write!(f, "task index {index} is out of range for {tasks} tasks")
            }
            TrainErr::WrongRole { expected, got } => {
                write!(f, "this operation needs the {expected} role, the trainer is a {got}")
            }
            TrainErr::NotTrained => f.write_str("embeddings were requested before training"),
            TrainErr::ListenerClosed => {
                f.write_str("the listener stopped before every worker finished")
            }
        }
    }
}

impl Error for TrainErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainErr::Io(e) => Some(e),
            TrainErr::Graph(e) => Some(e),
            TrainErr::Model(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TrainErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<GraphErr> for TrainErr {
    fn from(value: GraphErr) -> Self {
        Self::Graph(value)
    }
}

impl From<SageErr> for TrainErr {
    fn from(value: SageErr) -> Self {
        Self::Model(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<TrainErr> for io::Error {
    fn from(value: TrainErr) -> Self {
        match value {
            TrainErr::Io(e) => e,
            TrainErr::Graph(e) => e.into(),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

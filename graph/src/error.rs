use std::{error::Error, fmt, io, path::PathBuf};

/// The graph module's result type.
pub type Result<T> = std::result::Result<T, GraphErr>;

/// Graph engine failures, on either side of the connection.
#[derive(Debug)]
pub enum GraphErr {
    Io(io::Error),
    Table {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    UnknownNodeType(String),
    UnknownEdgeType(String),
    ServerIndex {
        index: usize,
        servers: usize,
    },
    NoServers,
    Remote(String),
    UnexpectedReply {
        expected: &'static str,
        got: &'static str,
    },
}

impl GraphErr {
    pub(crate) fn table(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::Table {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for GraphErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphErr::Io(e) => write!(f, "io error: {e}"),
            GraphErr::Table { path, line, reason } => {
                write!(f, "{}:{line}: {reason}", path.display())
            }
            GraphErr::UnknownNodeType(t) => write!(f, "unknown node type '{t}'"),
            GraphErr::UnknownEdgeType(t) => write!(f, "unknown edge type '{t}'"),
            GraphErr::ServerIndex { index, servers } => {
                write!(f, "server index {index} out of range for {servers} servers")
            }
            GraphErr::NoServers => f.write_str("the handle doesn't list any graph server"),
            GraphErr::Remote(e) => write!(f, "graph server error: {e}"),
            GraphErr::UnexpectedReply { expected, got } => {
                write!(f, "unexpected graph reply: expected {expected}, got {got}")
            }
        }
    }
}

impl Error for GraphErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GraphErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for GraphErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<GraphErr> for io::Error {
    fn from(value: GraphErr) -> Self {
        match value {
            GraphErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

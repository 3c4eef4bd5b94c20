use serde::{Deserialize, Serialize};

/// The kind of traffic a freshly opened connection is going to carry.
///
/// Every parameter server host listens on a single address, the first control
/// message of a connection selects which service handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Graph,
    Params { worker_id: usize },
}

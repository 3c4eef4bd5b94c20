//! The encoded cluster descriptor shared by every process of a job.

use std::{error::Error, fmt, string::FromUtf8Error};

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Failures while turning a command line handle into a `ClusterHandle`.
#[derive(Debug)]
pub enum HandleErr {
    Base64(base64::DecodeError),
    Utf8(FromUtf8Error),
    Json(serde_json::Error),
    /// A schema entry the node or edge type is read from is missing or malformed.
    Schema(String),
}

impl fmt::Display for HandleErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleErr::Base64(e) => write!(f, "handle is not valid base64: {e}"),
            HandleErr::Utf8(e) => write!(f, "handle is not valid utf-8: {e}"),
            HandleErr::Json(e) => write!(f, "handle is not a valid cluster description: {e}"),
            HandleErr::Schema(e) => write!(f, "handle schema: {e}"),
        }
    }
}

impl Error for HandleErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HandleErr::Base64(e) => Some(e),
            HandleErr::Utf8(e) => Some(e),
            HandleErr::Json(e) => Some(e),
            HandleErr::Schema(_) => None,
        }
    }
}

/// The cluster topology of a distributed graph.
///
/// Unknown keys are kept as they are so that a rewritten handle can be forwarded
/// without losing information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterHandle {
    /// `"type:attrs"` descriptors of the node tables.
    pub node_schema: Vec<String>,
    /// `"src:edge:dst"` descriptors of the edge tables.
    pub edge_schema: Vec<String>,
    /// Comma joined `host:port` list of the graph servers.
    pub server: String,
    pub client_count: usize,
    /// Comma joined `host:port` list of the graph clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClusterHandle {
    /// Decodes a base64 encoded JSON handle.
    ///
    /// # Arguments
    /// * `encoded` - The handle as given on the command line.
    ///
    /// # Returns
    /// The decoded handle or the first decoding stage that failed.
    pub fn decode(encoded: &str) -> Result<Self, HandleErr> {
        let bytes = STANDARD.decode(encoded.trim()).map_err(HandleErr::Base64)?;
        let text = String::from_utf8(bytes).map_err(HandleErr::Utf8)?;
        serde_json::from_str(&text).map_err(HandleErr::Json)
    }

    /// Encodes the handle back into its base64 JSON form.
    pub fn encode(&self) -> Result<String, HandleErr> {
        let text = serde_json::to_string(self).map_err(HandleErr::Json)?;
        Ok(STANDARD.encode(text))
    }

    /// The graph server addresses, in partition order.
    pub fn servers(&self) -> Vec<&str> {
        self.server
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

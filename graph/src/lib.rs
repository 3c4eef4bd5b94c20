//! An in-memory, partitioned graph engine served over TCP.
//!
//! Parameter server processes hold one partition each and answer sampling
//! queries, workers attach as clients and route queries to the owning partition.

mod client;
pub mod decoder;
mod error;
pub mod handle;
mod server;
mod store;
mod table;

use std::time::Duration;

use log::info;

pub use client::{ClientGraph, connect_with_retry};
pub use decoder::{AttrType, Decoder};
pub use error::{GraphErr, Result};
pub use handle::{ClusterHandle, HandleErr};
pub use server::{Incoming, ServerGraph, serve};
pub use store::{GraphStore, owner};
pub use table::TableSource;

/// How long clients keep retrying refused connections while servers come up.
pub const CONNECT_RETRY: Duration = Duration::from_secs(60);

/// A graph handle, either serving a partition or attached to the servers.
pub enum Graph {
    Server(ServerGraph),
    Client(ClientGraph),
}

/// Loads partition `server_index` and starts serving it at the matching address of `handle.server`.
///
/// # Arguments
/// * `handle` - The cluster handle, its `server` field lists the partition hosts.
/// * `server_index` - This server's partition.
/// * `source` - The tables to load the partition from.
///
/// # Returns
/// A `Graph::Server` handle.
pub async fn init_graph_from_handle(
    handle: &ClusterHandle,
    server_index: usize,
    source: &TableSource,
) -> Result<Graph> {
    let servers = handle.servers();
    let addr = *servers.get(server_index).ok_or(GraphErr::ServerIndex {
        index: server_index,
        servers: servers.len(),
    })?;

    let source = source.clone();
    let partitions = servers.len();
    let store = tokio::task::spawn_blocking(move || {
        GraphStore::load(&source, server_index, partitions)
    })
    .await
    .map_err(std::io::Error::other)??;

    let server = ServerGraph::bind(addr, store).await?;
    info!(server_index = server_index; "graph initialized from handle");
    Ok(Graph::Server(server))
}

/// Attaches to every server listed in `handle.server`.
///
/// # Arguments
/// * `handle` - The cluster handle.
/// * `worker_index` - This client's index.
/// * `worker_count` - The total amount of clients.
///
/// # Returns
/// A `Graph::Client` handle.
pub async fn get_graph_from_handle(
    handle: &ClusterHandle,
    worker_index: usize,
    worker_count: usize,
) -> Result<Graph> {
    let servers = handle.servers();
    let client = ClientGraph::connect(&servers, worker_index, worker_count, CONNECT_RETRY).await?;
    Ok(Graph::Client(client))
}

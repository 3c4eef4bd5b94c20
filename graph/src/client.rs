use std::time::Duration;

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg},
    specs::{
        graph::{EdgeTopology, GraphReply, GraphRequest, NodeId},
        session::Channel,
    },
};
use futures::future;
use log::{debug, info, warn};
use rand::Rng;
use tokio::{
    io,
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    time::{self, Instant},
};

use crate::{GraphErr, Result, store::owner};

const RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Connects to `addr`, retrying refused connections until `deadline` has passed.
///
/// # Arguments
/// * `addr` - The `host:port` to connect to.
/// * `retry` - How long to keep retrying.
///
/// # Returns
/// The connected stream or the last connection error.
pub async fn connect_with_retry(addr: &str, retry: Duration) -> io::Result<TcpStream> {
    let deadline = Instant::now() + retry;

    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) if Instant::now() < deadline => {
                warn!("failed to connect to {addr}: {e}, retrying...");
                time::sleep(RETRY_INTERVAL).await;
            }
            Err(e) => return Err(e),
        }
    }
}

struct ServerConn {
    addr: String,
    rx: OnoReceiver<OwnedReadHalf>,
    tx: OnoSender<OwnedWriteHalf>,
}

impl ServerConn {
    async fn open(addr: &str, retry: Duration) -> Result<Self> {
        let stream = connect_with_retry(addr, retry).await?;
        let (rx, tx) = stream.into_split();
        let (rx, mut tx) = comms::channel(rx, tx);
        tx.send(&Msg::Control(Command::Hello(Channel::Graph))).await?;

        Ok(Self {
            addr: addr.to_string(),
            rx,
            tx,
        })
    }

    async fn call(&mut self, req: GraphRequest) -> Result<GraphReply> {
        self.tx.send(&Msg::Control(Command::Graph(req))).await?;

        match self.rx.recv().await? {
            Msg::Control(Command::GraphReply(reply)) => Ok(reply),
            Msg::Err(e) => Err(GraphErr::Remote(format!("{}: {e}", self.addr))),
            msg => Err(GraphErr::UnexpectedReply {
                expected: "graph reply",
                got: msg.kind(),
            }),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.tx.send(&Msg::Control(Command::Disconnect)).await?;
        while !matches!(self.rx.recv().await?, Msg::Control(Command::Disconnect)) {}
        Ok(())
    }
}

fn unexpected<T>(expected: &'static str, got: &GraphReply) -> Result<T> {
    let got = match got {
        GraphReply::Nodes(_) => "nodes",
        GraphReply::Edges(_) => "edges",
        GraphReply::Neighbors(_) => "neighbors",
        GraphReply::Features { .. } => "features",
        GraphReply::Topology(_) => "topology",
    };

    Err(GraphErr::UnexpectedReply { expected, got })
}

/// The worker side graph handle, talks to every graph server partition.
pub struct ClientGraph {
    servers: Vec<ServerConn>,
    worker_index: usize,
    worker_count: usize,
    all_nodes: Option<(String, Vec<NodeId>)>,
}

impl ClientGraph {
    /// Connects to every server in `addrs`.
    ///
    /// # Arguments
    /// * `addrs` - The graph servers in partition order.
    /// * `worker_index` - This client's index among the clients.
    /// * `worker_count` - The amount of clients sharing the graph.
    /// * `retry` - How long to keep retrying each connection.
    pub async fn connect(
        addrs: &[&str],
        worker_index: usize,
        worker_count: usize,
        retry: Duration,
    ) -> Result<Self> {
        if addrs.is_empty() {
            return Err(GraphErr::NoServers);
        }

        let futs = addrs.iter().map(|addr| ServerConn::open(addr, retry));
        let servers = future::try_join_all(futs).await?;

        info!(
            worker_index = worker_index,
            worker_count = worker_count,
            servers = servers.len();
            "attached to graph servers"
        );

        Ok(Self {
            servers,
            worker_index,
            worker_count,
            all_nodes: None,
        })
    }

    pub fn worker_index(&self) -> usize {
        self.worker_index
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Sends `req` to every server and returns the replies in partition order.
    async fn broadcast(&mut self, req: GraphRequest) -> Result<Vec<GraphReply>> {
        let futs = self.servers.iter_mut().map(|conn| conn.call(req.clone()));
        future::try_join_all(futs).await
    }

    /// Sends a per partition slice of `ids` to each owner and scatters the
    /// `width`-sized answers back into request order.
    async fn routed<T, F, G>(
        &mut self,
        ids: &[NodeId],
        request: F,
        extract: G,
    ) -> Result<(usize, Vec<T>)>
    where
        T: Clone + Default,
        F: Fn(Vec<NodeId>) -> GraphRequest,
        G: Fn(GraphReply) -> Result<(usize, Vec<T>)>,
    {
        let partitions = self.servers.len();
        let mut positions = vec![Vec::new(); partitions];
        for (pos, id) in ids.iter().enumerate() {
            positions[owner(*id, partitions)].push(pos);
        }

        let futs = self
            .servers
            .iter_mut()
            .zip(&positions)
            .map(|(conn, positions)| {
                let part: Vec<NodeId> = positions.iter().map(|p| ids[*p]).collect();
                let req = (!part.is_empty()).then(|| request(part));

                async move {
                    match req {
                        Some(req) => conn.call(req).await.map(Some),
                        None => Ok(None),
                    }
                }
            });
        let replies = future::try_join_all(futs).await?;

        let mut width = 0;
        let mut out = Vec::new();

        for (reply, positions) in replies.into_iter().zip(&positions) {
            let Some(reply) = reply else {
                continue;
            };

            let (w, values) = extract(reply)?;
            if out.is_empty() {
                width = w;
                out = vec![T::default(); ids.len() * w];
            }

            for (chunk, pos) in values.chunks(w.max(1)).zip(positions) {
                out[pos * w..(pos + 1) * w].clone_from_slice(chunk);
            }
        }

        Ok((width, out))
    }

    /// The ids of `node_type` assigned to this client.
    pub async fn nodes(&mut self, node_type: &str) -> Result<Vec<NodeId>> {
        let req = GraphRequest::Nodes {
            node_type: node_type.to_string(),
            worker_index: self.worker_index,
            worker_count: self.worker_count,
        };

        let mut ids = Vec::new();
        for reply in self.broadcast(req).await? {
            match reply {
                GraphReply::Nodes(part) => ids.extend(part),
                other => return unexpected("nodes", &other),
            }
        }

        debug!(node_type = node_type, nodes = ids.len(); "fetched node share");
        Ok(ids)
    }

    /// The edges of `edge_type` assigned to this client.
    pub async fn edges(&mut self, edge_type: &str) -> Result<Vec<(NodeId, NodeId)>> {
        let req = GraphRequest::Edges {
            edge_type: edge_type.to_string(),
            worker_index: self.worker_index,
            worker_count: self.worker_count,
        };

        let mut edges = Vec::new();
        for reply in self.broadcast(req).await? {
            match reply {
                GraphReply::Edges(part) => edges.extend(part),
                other => return unexpected("edges", &other),
            }
        }

        debug!(edge_type = edge_type, edges = edges.len(); "fetched edge share");
        Ok(edges)
    }

    /// Samples `count` out-neighbors of each id, flattened in request order.
    pub async fn sample_neighbors(
        &mut self,
        edge_type: &str,
        ids: &[NodeId],
        count: usize,
    ) -> Result<Vec<NodeId>> {
        let request = |ids: Vec<NodeId>| GraphRequest::Neighbors {
            edge_type: edge_type.to_string(),
            ids,
            count,
        };
        let extract = |reply: GraphReply| match reply {
            GraphReply::Neighbors(values) => Ok((count, values)),
            other => unexpected("neighbors", &other),
        };

        let (_, neighbors) = self.routed(ids, request, extract).await?;
        Ok(neighbors)
    }

    /// The float features of each id, flattened in request order.
    ///
    /// # Returns
    /// The feature dimension and the flattened values.
    pub async fn features(&mut self, node_type: &str, ids: &[NodeId]) -> Result<(usize, Vec<f32>)> {
        let request = |ids: Vec<NodeId>| GraphRequest::Features {
            node_type: node_type.to_string(),
            ids,
        };
        let extract = |reply: GraphReply| match reply {
            GraphReply::Features { dim, values } => Ok((dim, values)),
            other => unexpected("features", &other),
        };

        self.routed(ids, request, extract).await
    }

    /// Samples `count` node ids of `node_type` uniformly over the whole graph.
    ///
    /// The global id list is fetched once and cached.
    pub async fn sample_negatives(&mut self, node_type: &str, count: usize) -> Result<Vec<NodeId>> {
        let cached = matches!(&self.all_nodes, Some((t, _)) if t == node_type);

        if !cached {
            let req = GraphRequest::Nodes {
                node_type: node_type.to_string(),
                worker_index: 0,
                worker_count: 1,
            };

            let mut ids = Vec::new();
            for reply in self.broadcast(req).await? {
                match reply {
                    GraphReply::Nodes(part) => ids.extend(part),
                    other => return unexpected("nodes", &other),
                }
            }

            self.all_nodes = Some((node_type.to_string(), ids));
        }

        let ids = match &self.all_nodes {
            Some((_, ids)) if !ids.is_empty() => ids,
            _ => return Err(GraphErr::UnknownNodeType(node_type.to_string())),
        };

        let mut rng = rand::rng();
        Ok((0..count)
            .map(|_| ids[rng.random_range(0..ids.len())])
            .collect())
    }

    /// The union of every partition's edge types.
    pub async fn topology(&mut self) -> Result<Vec<EdgeTopology>> {
        let mut topology = Vec::new();

        for reply in self.broadcast(GraphRequest::Topology).await? {
            match reply {
                GraphReply::Topology(part) => {
                    for t in part {
                        if !topology.contains(&t) {
                            topology.push(t);
                        }
                    }
                }
                other => return unexpected("topology", &other),
            }
        }

        Ok(topology)
    }

    /// Ends the session with every server.
    pub async fn close(mut self) -> Result<()> {
        let futs = self.servers.iter_mut().map(ServerConn::close);
        future::try_join_all(futs).await?;
        Ok(())
    }
}

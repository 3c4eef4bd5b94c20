use std::{borrow::Cow, io, net::SocketAddr, sync::Arc};

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg},
    specs::session::Channel,
};
use log::{debug, info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{
        TcpListener,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc,
    task::JoinHandle,
};

use crate::{GraphStore, Result};

/// A connection that asked for something other than graph traffic.
pub enum Incoming {
    /// A worker opened a parameter session, the caller owns the channel from now on.
    Params {
        worker_id: usize,
        rx: OnoReceiver<OwnedReadHalf>,
        tx: OnoSender<OwnedWriteHalf>,
    },
    /// A graph session finished, either by `Disconnect` or by error.
    GraphClosed { peer: SocketAddr },
}

/// The server side graph handle of a parameter server process.
///
/// Owns the partition and the listener shared by graph and parameter sessions.
pub struct ServerGraph {
    store: Arc<GraphStore>,
    local_addr: SocketAddr,
    incoming: mpsc::UnboundedReceiver<Incoming>,
    acceptor: JoinHandle<()>,
}

impl ServerGraph {
    /// Binds `addr` and starts serving `store` in the background.
    ///
    /// # Arguments
    /// * `addr` - The `host:port` to listen on.
    /// * `store` - The loaded partition.
    ///
    /// # Returns
    /// The running server or the bind error.
    pub async fn bind(addr: &str, store: GraphStore) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(partition = store.partition(); "graph server listening at {local_addr}");

        let store = Arc::new(store);
        let (events_tx, incoming) = mpsc::unbounded_channel();
        let acceptor = tokio::spawn(accept_loop(listener, Arc::clone(&store), events_tx));

        Ok(Self {
            store,
            local_addr,
            incoming,
            acceptor,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Waits for the next non graph connection or graph session end.
    ///
    /// # Returns
    /// `None` once the accept loop is gone.
    pub async fn next_incoming(&mut self) -> Option<Incoming> {
        self.incoming.recv().await
    }
}

impl Drop for ServerGraph {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    store: Arc<GraphStore>,
    events: mpsc::UnboundedSender<Incoming>,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("accept error: {e}");
                continue;
            }
        };

        debug!("connection accepted from {peer}");
        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::channel(rx, tx);
        let store = Arc::clone(&store);
        let events = events.clone();

        tokio::spawn(async move {
            if let Err(e) = dispatch(rx, tx, peer, store, &events).await {
                warn!("session with {peer} ended with error: {e}");
            }
        });
    }
}

/// Hands an event to the `ServerGraph`, logging it when nobody is listening anymore.
///
/// # Returns
/// Whether the event was delivered.
fn report(events: &mpsc::UnboundedSender<Incoming>, event: Incoming) -> bool {
    match events.send(event) {
        Ok(()) => true,
        Err(mpsc::error::SendError(Incoming::Params { worker_id, .. })) => {
            warn!(worker_id = worker_id; "parameter session dropped, the graph server is gone");
            false
        }
        Err(mpsc::error::SendError(Incoming::GraphClosed { peer })) => {
            warn!("graph session end of {peer} not reported, the graph server is gone");
            false
        }
    }
}

async fn dispatch(
    mut rx: OnoReceiver<OwnedReadHalf>,
    tx: OnoSender<OwnedWriteHalf>,
    peer: SocketAddr,
    store: Arc<GraphStore>,
    events: &mpsc::UnboundedSender<Incoming>,
) -> io::Result<()> {
    let channel = match rx.recv().await? {
        Msg::Control(Command::Hello(channel)) => channel,
        msg => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected hello, got {}", msg.kind()),
            ));
        }
    };

    match channel {
        Channel::Params { worker_id } => {
            debug!(worker_id = worker_id; "parameter session opened");
            report(events, Incoming::Params { worker_id, rx, tx });
            Ok(())
        }
        Channel::Graph => {
            debug!("graph session opened by {peer}");
            let res = serve(rx, tx, &store).await;
            report(events, Incoming::GraphClosed { peer });
            res
        }
    }
}

/// Answers graph requests on one connection until the client disconnects.
///
/// # Arguments
/// * `rx` - The receiving end of the communication.
/// * `tx` - The sending end of the communication.
/// * `store` - The partition to answer from.
pub async fn serve<R, W>(
    mut rx: OnoReceiver<R>,
    mut tx: OnoSender<W>,
    store: &GraphStore,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let reply = match rx.recv().await? {
            Msg::Control(Command::Graph(req)) => store.handle(req),
            Msg::Control(Command::Disconnect) => break,
            msg => {
                let text = format!("expected a graph request, got {}", msg.kind());
                tx.send(&Msg::Err(Cow::Borrowed(&text))).await?;
                continue;
            }
        };

        match reply {
            Ok(reply) => tx.send(&Msg::Control(Command::GraphReply(reply))).await?,
            Err(e) => tx.send(&Msg::Err(Cow::Owned(e.to_string()))).await?,
        }
    }

    tx.send(&Msg::Control(Command::Disconnect)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_delivered_while_the_server_listens() {
        let (events, mut incoming) = mpsc::unbounded_channel();
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        assert!(report(&events, Incoming::GraphClosed { peer }));
        assert!(matches!(
            incoming.try_recv(),
            Ok(Incoming::GraphClosed { peer: got }) if got == peer
        ));

        drop(incoming);
        assert!(!report(&events, Incoming::GraphClosed { peer }));
    }
}

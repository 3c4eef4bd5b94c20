use std::{mem, ops::Range, time::Duration};

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
    specs::session::Channel,
};
use futures::future;
use log::debug;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::tcp::{OwnedReadHalf, OwnedWriteHalf},
};

use crate::{Result, TrainErr};

/// One parameter server as seen from a worker.
struct ServerConn<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    rx: OnoReceiver<R>,
    tx: OnoSender<W>,
    rx_buf: Vec<f32>,
    range: Range<usize>,
}

/// The communication manager between the worker process and the many servers.
///
/// Server `i` holds the slice `range_i` of the flat parameter vector, the ranges are contiguous
/// and in server order.
pub struct Middleware<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    servers: Vec<ServerConn<R, W>>,
    nparams: usize,
}

impl<R, W> Middleware<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new() -> Self {
        Self {
            servers: Vec::new(),
            nparams: 0,
        }
    }

    /// Adds a new server communicator to the middleware.
    ///
    /// # Arguments
    /// * `rx` - The worker's receiving end of the communication.
    /// * `tx` - The worker's sending end of the communication.
    /// * `len` - The amount of parameters this server holds.
    pub fn spawn(&mut self, rx: OnoReceiver<R>, tx: OnoSender<W>, len: usize) {
        let range = self.nparams..self.nparams + len;
        self.nparams += len;
        self.servers.push(ServerConn {
            rx,
            tx,
            rx_buf: Vec::new(),
            range,
        });
    }

    /// The amount of parameters held by all the servers together.
    pub fn len(&self) -> usize {
        self.nparams
    }

    pub fn is_empty(&self) -> bool {
        self.nparams == 0
    }

    /// Receives the next parameter slice of every server into `out`.
    ///
    /// # Arguments
    /// * `out` - The flat parameter vector, its length must be `self.len()`.
    pub async fn pull_params(&mut self, out: &mut [f32]) -> Result<()> {
        if out.len() != self.nparams {
            return Err(TrainErr::ParamsLength {
                server: 0,
                expected: self.nparams,
                got: out.len(),
            });
        }

        let mut rest = out;
        let mut slices = Vec::with_capacity(self.servers.len());
        for server in &self.servers {
            let (head, tail) = mem::take(&mut rest).split_at_mut(server.range.len());
            slices.push(head);
            rest = tail;
        }

        let futs = self
            .servers
            .iter_mut()
            .zip(slices)
            .enumerate()
            .map(|(i, (server, out))| async move {
                match server.rx.recv_into(&mut server.rx_buf).await? {
                    Msg::Data(Payload::Params(params)) if params.len() == out.len() => {
                        out.copy_from_slice(params);
                        Ok::<_, TrainErr>(())
                    }
                    Msg::Data(Payload::Params(params)) => Err(TrainErr::ParamsLength {
                        server: i,
                        expected: out.len(),
                        got: params.len(),
                    }),
                    Msg::Err(detail) => Err(TrainErr::Remote {
                        server: i,
                        detail: detail.into_owned(),
                    }),
                    other => Err(TrainErr::UnexpectedMessage {
                        server: i,
                        got: other.kind(),
                    }),
                }
            });

        future::try_join_all(futs).await?;
        Ok(())
    }

    /// Pushes each server its slice of `grad`.
    ///
    /// # Arguments
    /// * `grad` - The gradient of the whole flat parameter vector.
    pub async fn push_grads(&mut self, grad: &[f32]) -> Result<()> {
        if grad.len() != self.nparams {
            return Err(TrainErr::ParamsLength {
                server: 0,
                expected: self.nparams,
                got: grad.len(),
            });
        }

        let futs = self.servers.iter_mut().map(|server| async move {
            let msg = Msg::Data(Payload::Grad(&grad[server.range.clone()]));
            server.tx.send(&msg).await
        });

        future::try_join_all(futs).await?;
        Ok(())
    }

    /// Disconnects this worker from all the servers.
    pub async fn disconnect(&mut self) -> Result<()> {
        let msg = Msg::Control(Command::Disconnect);

        let futs = self.servers.iter_mut().map(|server| {
            let msg = &msg;
            async move {
                server.tx.send(msg).await?;

                while !matches!(
                    server.rx.recv_into(&mut server.rx_buf).await?,
                    Msg::Control(Command::Disconnect)
                ) {}

                Ok::<_, std::io::Error>(())
            }
        });

        future::try_join_all(futs).await?;
        Ok(())
    }
}

impl<R, W> Default for Middleware<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware<OwnedReadHalf, OwnedWriteHalf> {
    /// Opens a parameter session with every server.
    ///
    /// # Arguments
    /// * `addrs` - The parameter server hosts, in task order.
    /// * `ranges` - The slice of the parameters each server holds.
    /// * `worker_id` - This worker's task index.
    /// * `retry` - How long to keep retrying refused connections.
    pub async fn connect(
        addrs: &[String],
        ranges: &[Range<usize>],
        worker_id: usize,
        retry: Duration,
    ) -> Result<Self> {
        let mut middleware = Self::new();

        for (addr, range) in addrs.iter().zip(ranges) {
            let stream = graph::connect_with_retry(addr, retry).await?;
            let (rx, tx) = stream.into_split();
            let (rx, mut tx) = comms::channel(rx, tx);

            tx.send(&Msg::Control(Command::Hello(Channel::Params { worker_id })))
                .await?;
            debug!(worker_id = worker_id, params = range.len(); "parameter session opened with {addr}");
            middleware.spawn(rx, tx, range.len());
        }

        Ok(middleware)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{self, DuplexStream, ReadHalf, WriteHalf};

    use super::*;

    type Channel = (
        OnoReceiver<ReadHalf<DuplexStream>>,
        OnoSender<WriteHalf<DuplexStream>>,
    );

    fn channel_pair() -> (Channel, Channel) {
        let (stream1, stream2) = io::duplex(4096);
        let (rx1, tx1) = io::split(stream1);
        let (rx2, tx2) = io::split(stream2);
        (comms::channel(rx1, tx1), comms::channel(rx2, tx2))
    }

    /// Serves `params`, then answers one gradient with `params - grad` and a disconnect.
    async fn mock_server(
        (mut rx, mut tx): Channel,
        mut params: Vec<f32>,
    ) -> std::io::Result<Vec<f32>> {
        let mut rx_buf: Vec<f32> = Vec::new();
        tx.send(&Msg::Data(Payload::Params(&params))).await?;

        match rx.recv_into(&mut rx_buf).await? {
            Msg::Data(Payload::Grad(grad)) => {
                params.iter_mut().zip(grad).for_each(|(p, g)| *p -= g);
            }
            msg => panic!("expected a gradient, got {}", msg.kind()),
        }
        tx.send(&Msg::Data(Payload::Params(&params))).await?;

        let msg: Msg = rx.recv().await?;
        assert!(matches!(msg, Msg::Control(Command::Disconnect)));
        tx.send(&Msg::Control(Command::Disconnect)).await?;

        Ok(params)
    }

    #[tokio::test]
    async fn splits_params_and_grads_by_server() {
        let ((wk1_rx, wk1_tx), server1) = channel_pair();
        let ((wk2_rx, wk2_tx), server2) = channel_pair();

        let s1 = tokio::spawn(mock_server(server1, vec![1., 2.]));
        let s2 = tokio::spawn(mock_server(server2, vec![3., 4., 5.]));

        let mut middleware = Middleware::new();
        middleware.spawn(wk1_rx, wk1_tx, 2);
        middleware.spawn(wk2_rx, wk2_tx, 3);
        assert_eq!(middleware.len(), 5);

        let mut params = vec![0.; 5];
        middleware.pull_params(&mut params).await.unwrap();
        assert_eq!(params, [1., 2., 3., 4., 5.]);

        middleware.push_grads(&[1., 1., 2., 2., 2.]).await.unwrap();
        middleware.pull_params(&mut params).await.unwrap();
        assert_eq!(params, [0., 1., 1., 2., 3.]);

        middleware.disconnect().await.unwrap();
        assert_eq!(s1.await.unwrap().unwrap(), [0., 1.]);
        assert_eq!(s2.await.unwrap().unwrap(), [1., 2., 3.]);
    }

    #[tokio::test]
    async fn rejects_slices_of_the_wrong_length() {
        let ((wk_rx, wk_tx), (_, mut sv_tx)) = channel_pair();

        let mut middleware = Middleware::new();
        middleware.spawn(wk_rx, wk_tx, 2);

        sv_tx
            .send(&Msg::Data(Payload::Params(&[1., 2., 3.])))
            .await
            .unwrap();

        let mut params = vec![0.; 2];
        let err = middleware.pull_params(&mut params).await.unwrap_err();
        assert!(matches!(
            err,
            TrainErr::ParamsLength {
                server: 0,
                expected: 2,
                got: 3
            }
        ));
    }
}

use std::io;

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
};
use log::{debug, info};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    task::JoinSet,
};

use crate::{
    optimization::Optimizer,
    service::Server,
    storage::ParameterHandle,
    synchronization::Synchronizer,
};

/// The central server structure, it handles task management and io between workers.
pub struct ParameterServer<O: Optimizer, S: Synchronizer> {
    tasks: JoinSet<io::Result<()>>,
    handle: ParameterHandle<O>,
    synchronizer: S,
    sessions: usize,
}

impl<O: Optimizer, S: Synchronizer> ParameterServer<O, S> {
    /// Creates a new `ParameterServer`.
    ///
    /// # Arguments
    /// * `handle` - The handle to the parameters this server holds.
    /// * `synchronizer` - The strategy applying the incoming gradients.
    pub fn new(handle: ParameterHandle<O>, synchronizer: S) -> Self {
        Self {
            tasks: JoinSet::new(),
            handle,
            synchronizer,
            sessions: 0,
        }
    }

    /// Creates an error for when an unexpected message kind is received.
    ///
    /// # Arguments
    /// * `msg` - The received message.
    ///
    /// # Returns
    /// An error.
    fn unexpected_message_kind<U>(msg: Msg) -> io::Result<U> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received an unexpected message kind, got: {}", msg.kind()),
        ))
    }
}

impl<O, S> ParameterServer<O, S>
where
    O: Optimizer + Send + 'static,
    S: Synchronizer + Send + Sync + 'static,
{
    /// Binds a new worker to this server and spawns its own session task.
    ///
    /// The session sends the current parameters, then answers every gradient with the updated
    /// parameters until the worker disconnects.
    ///
    /// # Arguments
    /// * `rx` - The receiving end of the communication.
    /// * `tx` - The sending end of the communication.
    pub fn spawn<R, W>(&mut self, mut rx: OnoReceiver<R>, mut tx: OnoSender<W>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let handle = self.handle.clone();
        let synchronizer = self.synchronizer.clone();
        let session = self.sessions;
        self.sessions += 1;

        let task = async move {
            let mut buf = vec![0.; handle.len()];
            let mut rx_buf: Vec<f32> = Vec::new();
            let mut steps = 0usize;

            handle.pull_params(&mut buf).await?;
            tx.send(&Msg::Data(Payload::Params(&buf))).await?;

            loop {
                match rx.recv_into(&mut rx_buf).await? {
                    Msg::Data(Payload::Grad(grad)) => {
                        synchronizer.step(&handle, grad, &mut buf).await?;
                        tx.send(&Msg::Data(Payload::Params(&buf))).await?;
                        steps += 1;
                    }
                    Msg::Control(Command::Disconnect) => {
                        tx.send(&Msg::Control(Command::Disconnect)).await?;
                        break;
                    }
                    msg => return Self::unexpected_message_kind(msg),
                }
            }

            debug!(session = session, steps = steps; "parameter session finished");
            Ok(())
        };

        info!(session = session; "parameter session started");
        self.tasks.spawn(task);
    }

    /// Waits for every spawned session to finish.
    ///
    /// # Returns
    /// The final parameters or the first error any session failed with.
    pub async fn run(&mut self) -> io::Result<Vec<f32>> {
        while let Some(res) = self.tasks.join_next().await {
            res??;
        }

        let mut params = vec![0.; self.handle.len()];
        self.handle.pull_params(&mut params).await?;
        Ok(params)
    }
}

#[async_trait::async_trait]
impl<R, W, O, S> Server<R, W> for ParameterServer<O, S>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    O: Optimizer + Send + 'static,
    S: Synchronizer + Send + Sync + 'static,
{
    fn len(&self) -> usize {
        self.handle.len()
    }

    /// Indirection call to `Self::run`.
    async fn run(&mut self) -> io::Result<Vec<f32>> {
        self.run().await
    }

    /// Indirection call to `Self::spawn`.
    fn spawn(&mut self, rx: OnoReceiver<R>, tx: OnoSender<W>) {
        self.spawn(rx, tx)
    }
}

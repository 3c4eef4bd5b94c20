#![cfg(test)]

use std::num::NonZeroUsize;

use comms::{
    OnoReceiver, OnoSender,
    msg::{Command, Msg, Payload},
};
use tokio::io::{self, AsyncRead, AsyncWrite, DuplexStream, ReadHalf, WriteHalf};

use crate::{
    optimization::{GradientDescent, OptimizerSpec},
    service::{ParameterServer, ServerBuilder, ServerSpec},
    storage::{ParameterHandle, ParameterStore},
    synchronization::NonBlockingSync,
};

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

/// Pulls every parameter towards `1` by sending `p - 1` as the gradient.
async fn mock_lineal_worker<R, W>(
    mut rx: OnoReceiver<R>,
    mut tx: OnoSender<W>,
    steps: usize,
) -> io::Result<Vec<f32>>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut rx_buf: Vec<f32> = Vec::new();
    let mut params = match rx.recv_into(&mut rx_buf).await? {
        Msg::Data(Payload::Params(params)) => params.to_vec(),
        msg => panic!("expected the initial params, got {}", msg.kind()),
    };

    for _ in 0..steps {
        let grad: Vec<f32> = params.iter().map(|p| p - 1.).collect();
        tx.send(&Msg::Data(Payload::Grad(&grad))).await?;

        match rx.recv_into(&mut rx_buf).await? {
            Msg::Data(Payload::Params(updated)) => params.copy_from_slice(updated),
            msg => panic!("expected params, got {}", msg.kind()),
        }
    }

    tx.send(&Msg::Control(Command::Disconnect)).await?;
    let msg: Msg = rx.recv().await?;
    assert!(matches!(msg, Msg::Control(Command::Disconnect)));

    Ok(params)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lineal_convergence() -> io::Result<()> {
    let ((wk_rx, wk_tx), (sv_rx, sv_tx)) = channel_pair();

    let store = ParameterStore::new(NonZeroUsize::new(1).unwrap(), vec![0.5, -3.], |_| {
        GradientDescent::new(0.1)
    });
    let mut server = ParameterServer::new(ParameterHandle::new(store), NonBlockingSync::new());
    server.spawn(sv_rx, sv_tx);

    let (worker_params, server_params) =
        tokio::try_join!(mock_lineal_worker(wk_rx, wk_tx, 200), server.run())?;

    assert_eq!(worker_params, server_params);
    assert!(server_params.iter().all(|p| (p - 1.).abs() < 1e-3));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_built_server_serves_many_workers() -> io::Result<()> {
    let ((wk1_rx, wk1_tx), (sv1_rx, sv1_tx)) = channel_pair();
    let ((wk2_rx, wk2_tx), (sv2_rx, sv2_tx)) = channel_pair();

    let optimizer = OptimizerSpec::from_name("sgd", 0.05).unwrap();
    let spec = ServerSpec {
        shard_size: 2,
        ..ServerSpec::new(optimizer, 0.)
    };

    let mut server = ServerBuilder::new().build(spec, vec![0.; 5]);
    assert_eq!(server.len(), 5);
    server.spawn(sv1_rx, sv1_tx);
    server.spawn(sv2_rx, sv2_tx);

    let (_, _, params) = tokio::try_join!(
        mock_lineal_worker(wk1_rx, wk1_tx, 150),
        mock_lineal_worker(wk2_rx, wk2_tx, 150),
        server.run()
    )?;

    assert!(params.iter().all(|p| (p - 1.).abs() < 1e-2));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unexpected_message_fails_the_session() {
    let ((mut wk_rx, mut wk_tx), (sv_rx, sv_tx)) = channel_pair();

    let optimizer = OptimizerSpec::from_name("adam", 0.01).unwrap();
    let mut server = ServerBuilder::new().build(ServerSpec::new(optimizer, 5e-4), vec![0.; 3]);
    server.spawn(sv_rx, sv_tx);

    let mut rx_buf: Vec<f32> = Vec::new();
    let msg: Msg = wk_rx.recv_into(&mut rx_buf).await.unwrap();
    assert!(matches!(msg, Msg::Data(Payload::Params(p)) if p == [0.; 3]));

    wk_tx
        .send(&Msg::Data(Payload::Params(&[1., 2., 3.])))
        .await
        .unwrap();

    let err = server.run().await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wrong_gradient_size_fails_the_session() {
    let ((mut wk_rx, mut wk_tx), (sv_rx, sv_tx)) = channel_pair();

    let optimizer = OptimizerSpec::from_name("momentum", 0.01).unwrap();
    let mut server = ServerBuilder::new().build(ServerSpec::new(optimizer, 0.), vec![0.; 4]);
    server.spawn(sv_rx, sv_tx);

    let _: Msg = wk_rx.recv().await.unwrap();
    wk_tx.send(&Msg::Data(Payload::Grad(&[1.]))).await.unwrap();

    assert!(server.run().await.is_err());
}

use comms::{
    msg::{Command, Msg, Payload},
    specs::{graph::GraphReply, session::Channel},
};
use tokio::io;

#[tokio::test]
async fn send_recv_control_and_data() -> io::Result<()> {
    const SIZE: usize = 128;

    let (one, two) = io::duplex(SIZE);
    let (_, tx) = io::split(one);
    let (rx, _) = io::split(two);
    let (_, mut tx) = comms::channel(io::empty(), tx);
    let (mut rx, _) = comms::channel(rx, io::sink());

    let sender = async move {
        tx.send(&Msg::Control(Command::Hello(Channel::Params { worker_id: 1 })))
            .await?;
        tx.send(&Msg::Data(Payload::Grad(&[1.0, 2.0, 3.0]))).await?;
        tx.send(&Msg::Control(Command::GraphReply(GraphReply::Nodes(vec![7, 9]))))
            .await?;
        Ok::<_, io::Error>(())
    };

    let receiver = async move {
        let msg: Msg = rx.recv().await?;
        assert!(matches!(
            msg,
            Msg::Control(Command::Hello(Channel::Params { worker_id: 1 }))
        ));

        let msg: Msg = rx.recv().await?;
        let Msg::Data(Payload::Grad(grad)) = msg else {
            panic!("expected a gradient, got {}", msg.kind());
        };
        assert_eq!(grad, &[1.0, 2.0, 3.0]);

        let mut buf: Vec<u64> = Vec::new();
        let msg: Msg = rx.recv_into(&mut buf).await?;
        let Msg::Control(Command::GraphReply(GraphReply::Nodes(ids))) = msg else {
            panic!("expected nodes, got {}", msg.kind());
        };
        assert_eq!(ids, vec![7, 9]);
        Ok::<_, io::Error>(())
    };

    tokio::try_join!(sender, receiver)?;
    Ok(())
}

#[tokio::test]
async fn closed_stream_is_an_error() {
    let (one, two) = io::duplex(16);
    drop(one);

    let (rx, _) = io::split(two);
    let (mut rx, _) = comms::channel(rx, io::sink());
    let res: io::Result<Msg> = rx.recv().await;
    assert_eq!(res.unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
}

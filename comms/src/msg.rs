use std::{borrow::Cow, io};

use crate::{
    Deserialize, Serialize,
    protocol::{self, HEADER_SIZE, Header},
    specs::{
        graph::{GraphReply, GraphRequest},
        session::Channel,
    },
};

/// The payload data for the `Data` variant of the `Msg` enum.
#[derive(Debug)]
pub enum Payload<'a> {
    Grad(&'a [f32]),
    Params(&'a [f32]),
}

/// The command for the `Control` variant of the `Msg` enum.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Hello(Channel),
    Graph(GraphRequest),
    GraphReply(GraphReply),
    Disconnect,
}

/// The application layer message for the entire system.
#[derive(Debug)]
pub enum Msg<'a> {
    Control(Command),
    Data(Payload<'a>),
    Err(Cow<'a, str>),
}

impl Msg<'_> {
    /// A short name of the message kind, used in logs and protocol errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Control(Command::Hello(_)) => "control/hello",
            Msg::Control(Command::Graph(_)) => "control/graph",
            Msg::Control(Command::GraphReply(_)) => "control/graph_reply",
            Msg::Control(Command::Disconnect) => "control/disconnect",
            Msg::Data(Payload::Grad(_)) => "data/grad",
            Msg::Data(Payload::Params(_)) => "data/params",
            Msg::Err(_) => "err",
        }
    }

    fn buf_is_too_small<T>(size: usize) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("The given buffer is too small {size}, must at least be {HEADER_SIZE} bytes"),
        ))
    }

    fn invalid_kind<T>(kind: Header) -> io::Result<T> {
        Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Received an invalid kind header {kind}"),
        ))
    }
}

impl<'a> Serialize<'a> for Msg<'a> {
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>> {
        match self {
            Msg::Err(e) => {
                buf.extend_from_slice(&protocol::ERR.to_be_bytes());
                Ok(Some(e.as_bytes()))
            }
            Msg::Control(cmd) => {
                buf.extend_from_slice(&protocol::CONTROL.to_be_bytes());
                serde_json::to_writer(buf, cmd)?;
                Ok(None)
            }
            Msg::Data(payload) => {
                let (kind, nums) = match payload {
                    Payload::Grad(grad) => (protocol::GRAD, *grad),
                    Payload::Params(params) => (protocol::PARAMS, *params),
                };

                buf.extend_from_slice(&kind.to_be_bytes());
                Ok(Some(bytemuck::cast_slice(nums)))
            }
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a mut [u8]) -> io::Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Self::buf_is_too_small(buf.len());
        }

        let (kind_buf, rest) = buf.split_at_mut(HEADER_SIZE);
        let mut header = [0; HEADER_SIZE];
        header.copy_from_slice(kind_buf);

        match Header::from_be_bytes(header) {
            protocol::ERR => {
                let text = str::from_utf8(rest)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

                Ok(Self::Err(Cow::Borrowed(text)))
            }
            protocol::CONTROL => {
                let cmd = serde_json::from_slice(rest)?;
                Ok(Self::Control(cmd))
            }
            kind @ (protocol::GRAD | protocol::PARAMS) => {
                let rest: &'a [u8] = rest;
                let nums: &'a [f32] = bytemuck::try_cast_slice(rest).map_err(|err| {
                    io::Error::new(io::ErrorKind::InvalidData, format!("{err:?}"))
                })?;

                let payload = match kind {
                    protocol::GRAD => Payload::Grad(nums),
                    _ => Payload::Params(nums),
                };

                Ok(Self::Data(payload))
            }
            kind => Self::invalid_kind(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::graph::GraphRequest;

    fn frame_words(msg: &Msg) -> (Vec<u32>, usize) {
        let mut buf = Vec::new();
        let tail = msg.serialize(&mut buf).unwrap().map(<[u8]>::to_vec);
        buf.extend(tail.unwrap_or_default());

        let mut words = vec![0u32; buf.len().div_ceil(4)];
        bytemuck::cast_slice_mut::<u32, u8>(&mut words)[..buf.len()].copy_from_slice(&buf);
        (words, buf.len())
    }

    #[test]
    fn control_command_survives_json_encoding() {
        let req = GraphRequest::Neighbors {
            edge_type: "knows".into(),
            ids: vec![1, 2, 3],
            count: 4,
        };
        let msg = Msg::Control(Command::Graph(req.clone()));

        let mut buf = Vec::new();
        assert!(msg.serialize(&mut buf).unwrap().is_none());

        let Msg::Control(Command::Graph(got)) = Msg::deserialize(&mut buf).unwrap() else {
            panic!("expected a graph request");
        };
        assert_eq!(got, req);
    }

    #[test]
    fn params_payload_is_viewed_in_place() {
        let params = [0.5, -1.0, 2.25];
        let msg = Msg::Data(Payload::Params(&params));
        let (mut words, len) = frame_words(&msg);

        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut words);
        let Msg::Data(Payload::Params(got)) = Msg::deserialize(&mut bytes[..len]).unwrap() else {
            panic!("expected params");
        };
        assert_eq!(got, params);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let mut buf = [0u8; 2];
        assert!(Msg::deserialize(&mut buf).is_err());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut buf = 9u32.to_be_bytes().to_vec();
        let err = Msg::deserialize(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}

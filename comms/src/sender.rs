//! The writing half of a framed connection.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{LEN_TYPE_SIZE, LenType, Serialize};

/// Writes length prefixed frames to a graph or parameter session.
pub struct OnoSender<W>
where
    W: AsyncWrite + Unpin,
{
    tx: W,
    frame: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> OnoSender<W> {
    /// Creates a new `OnoSender` over `tx`.
    pub(super) fn new(tx: W) -> Self {
        Self {
            tx,
            frame: Vec::new(),
        }
    }

    /// Writes `msg` as one frame and flushes it.
    ///
    /// The kind and control payload are staged behind a placeholder length, large `f32`
    /// payloads are written straight from the caller's slice after the staged part.
    ///
    /// # Arguments
    /// * `msg` - A serializable object.
    ///
    /// # Returns
    /// An `io::Error` if the stream is closed or `msg` fails to serialize.
    pub async fn send<'a, T: Serialize<'a>>(&mut self, msg: &'a T) -> io::Result<()> {
        self.frame.clear();
        self.frame.extend_from_slice(&[0; LEN_TYPE_SIZE]);

        let tail = msg.serialize(&mut self.frame)?;
        let body_len = self.frame.len() - LEN_TYPE_SIZE + tail.map_or(0, <[u8]>::len);
        self.frame[..LEN_TYPE_SIZE].copy_from_slice(&(body_len as LenType).to_be_bytes());

        self.tx.write_all(&self.frame).await?;
        if let Some(tail) = tail {
            self.tx.write_all(tail).await?;
        }

        self.tx.flush().await
    }
}

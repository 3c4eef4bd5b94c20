use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{Align4, Deserialize, LEN_TYPE_SIZE, LenType};

/// Frames bigger than this are rejected before allocating.
const MAX_FRAME_LEN: usize = 1 << 30;

/// The receiving end handle of the communication.
pub struct OnoReceiver<R: AsyncRead + Unpin> {
    rx: R,
    buf: Vec<u32>,
}

impl<R: AsyncRead + Unpin> OnoReceiver<R> {
    /// Creates a new `OnoReceiver` instance.
    ///
    /// # Arguments
    /// * `rx` - The underlying reader.
    pub(super) fn new(rx: R) -> Self {
        Self {
            rx,
            buf: Vec::new(),
        }
    }

    /// Waits to receive a new message using the receiver's own buffer.
    ///
    /// The returned `T` borrows the receiver until it is dropped.
    ///
    /// # Returns
    /// A result object that returns `T` on success or `io::Error` on failure.
    pub async fn recv<'a, T: Deserialize<'a>>(&'a mut self) -> io::Result<T> {
        let Self { rx, buf } = self;
        let frame = read_frame(rx, buf).await?;
        T::deserialize(frame)
    }

    /// Waits to receive a new message from the inner receiver.
    ///
    /// # Arguments
    /// * `buf` - The buffer to use for deserialization, the returned
    ///   `T`'s lifetimes will be tied to this buffer.
    ///
    /// # Returns
    /// A result object that returns `T` on success or `io::Error` on failure.
    pub async fn recv_into<'buf, T, B>(&mut self, buf: &'buf mut Vec<B>) -> io::Result<T>
    where
        T: Deserialize<'buf>,
        B: Align4,
    {
        let frame = read_frame(&mut self.rx, buf).await?;
        T::deserialize(frame)
    }
}

async fn read_frame<'buf, R, B>(rx: &mut R, buf: &'buf mut Vec<B>) -> io::Result<&'buf mut [u8]>
where
    R: AsyncRead + Unpin,
    B: Align4,
{
    let mut size_buf = [0; LEN_TYPE_SIZE];
    rx.read_exact(&mut size_buf).await?;
    let len = LenType::from_be_bytes(size_buf) as usize;

    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds the {MAX_FRAME_LEN} bytes limit"),
        ));
    }

    let needed = len.div_ceil(size_of::<B>());
    buf.clear();
    buf.resize(needed, B::zeroed());

    let view: &mut [u8] = bytemuck::cast_slice_mut(buf.as_mut_slice());
    let frame = &mut view[..len];
    rx.read_exact(frame).await?;
    Ok(frame)
}

use std::io;

/// Writes a value into the framing buffer.
pub trait Serialize<'a> {
    /// Serializes `self` into `buf`.
    ///
    /// # Arguments
    /// * `buf` - The buffer holding the frame written so far.
    ///
    /// # Returns
    /// An optional trailing slice that is written after `buf` without being copied.
    fn serialize(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>>;
}

use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The specific result type for size mismatch checks inside the storage module.
pub type Result<T> = std::result::Result<T, SizeMismatchErr>;

/// Error returned whenever a gradient, a parameter slice or an external buffer
/// doesn't have the length of the storage it's meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeMismatchErr {
    pub expected: usize,
    pub got: usize,
}

impl Display for SizeMismatchErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size mismatch: expected a buffer of {} parameters, got {}",
            self.expected, self.got
        )
    }
}

impl Error for SizeMismatchErr {}

impl From<SizeMismatchErr> for io::Error {
    fn from(value: SizeMismatchErr) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, value)
    }
}

/// Checks that `got` matches `expected`.
pub(crate) fn check_len(expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(SizeMismatchErr { expected, got });
    }

    Ok(())
}

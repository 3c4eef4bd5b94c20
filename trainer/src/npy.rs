//! A minimal writer of NumPy `.npy` version 1.0 files.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use ndarray::Array2;

const MAGIC: &[u8] = b"\x93NUMPY";

/// An element type with a little-endian NumPy descriptor.
pub trait NpyElement: Copy {
    /// The `descr` field of the header.
    const DESCR: &'static str;

    fn write_le(self, out: &mut impl Write) -> io::Result<()>;
}

impl NpyElement for f32 {
    const DESCR: &'static str = "<f4";

    fn write_le(self, out: &mut impl Write) -> io::Result<()> {
        out.write_all(&self.to_le_bytes())
    }
}

impl NpyElement for i64 {
    const DESCR: &'static str = "<i8";

    fn write_le(self, out: &mut impl Write) -> io::Result<()> {
        out.write_all(&self.to_le_bytes())
    }
}

/// Builds the magic string, version and padded header of an array.
///
/// The header is padded with spaces and a trailing newline so the data starts at a multiple of 64 bytes.
fn header(descr: &str, shape: &[usize]) -> Vec<u8> {
    let dims = match shape {
        [n] => format!("({n},)"),
        _ => {
            let dims: Vec<String> = shape.iter().map(ToString::to_string).collect();
            format!("({})", dims.join(", "))
        }
    };

    let mut dict = format!("{{'descr': '{descr}', 'fortran_order': False, 'shape': {dims}, }}");
    let unpadded = MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = unpadded.div_ceil(64) * 64 - unpadded;
    dict.extend(std::iter::repeat_n(' ', padding));
    dict.push('\n');

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + dict.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out
}

/// Writes `data` as a C-ordered array of `shape` to `path`.
///
/// # Arguments
/// * `path` - The destination file, overwritten if it exists.
/// * `shape` - The dimensions of the array, their product must be `data.len()`.
/// * `data` - The elements in row-major order.
pub fn save_npy<T: NpyElement>(path: impl AsRef<Path>, shape: &[usize], data: &[T]) -> io::Result<()> {
    let expected: usize = shape.iter().product();
    if expected != data.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("shape {shape:?} needs {expected} elements, got {}", data.len()),
        ));
    }

    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(&header(T::DESCR, shape))?;
    for &x in data {
        x.write_le(&mut out)?;
    }

    out.flush()
}

/// Writes the embeddings to `<prefix>.npy` and their node ids to `<prefix>_ids.npy`.
///
/// # Arguments
/// * `prefix` - The path of both files without the `.npy` extension.
/// * `ids` - The node id of every row.
/// * `emb` - The `(ids.len(), dim)` embedding matrix.
pub fn save_embeddings(prefix: &str, ids: &[i64], emb: &Array2<f32>) -> io::Result<()> {
    let (rows, cols) = emb.dim();
    let values: Vec<f32> = emb.iter().copied().collect();

    save_npy(format!("{prefix}.npy"), &[rows, cols], &values)?;
    save_npy(format!("{prefix}_ids.npy"), &[ids.len()], ids)
}

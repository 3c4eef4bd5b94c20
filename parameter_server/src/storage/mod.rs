mod error;
mod handle;
mod shard;
mod store;

pub(crate) use error::check_len;
pub use error::{Result, SizeMismatchErr};
pub use handle::ParameterHandle;
use shard::ParameterShard;
pub use store::ParameterStore;

mod non_blocking;
mod synchronizer;

pub use non_blocking::NonBlockingSync;
pub use synchronizer::Synchronizer;

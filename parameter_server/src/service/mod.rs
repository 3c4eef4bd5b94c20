mod builder;
mod pserver;
mod server;
mod spec;

pub use builder::ServerBuilder;
pub use pserver::ParameterServer;
pub use server::Server;
pub use spec::{SHARD_SIZE, ServerSpec};

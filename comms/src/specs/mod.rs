pub mod graph;
pub mod session;

//! Network layer: listener and per-connection session tasks.

mod connection;
mod gateway;

pub use connection::Connection;
pub use gateway::Gateway;

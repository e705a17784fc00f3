//! Line-protocol gateway server
//!
//! A thin TCP front-end over the hub: clients publish, subscribe and
//! unsubscribe with one text command per line.

pub mod config;
pub mod connection;
pub mod listener;
pub mod protocol;

pub use config::ServerConfig;
pub use connection::Connection;
pub use listener::HubServer;
pub use protocol::{ProtocolError, Reply, Request};

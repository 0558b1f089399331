//! Production switcher connectivity
//!
//! - [`pool`] - one reconnecting connection per show
//! - [`connection`] - command issuance on a live connection
//! - [`client`] - connector/client traits implemented per protocol
//! - [`http`] - HTTP bridge implementation
//! - [`memory`] - recording implementation for dry runs and tests

pub mod client;
pub mod command;
pub mod connection;
pub mod error;
pub mod http;
pub mod memory;
pub mod pool;

pub use client::{ClientEvent, ClientSession, SwitcherClient, SwitcherConnector};
pub use command::SwitcherCommand;
pub use connection::SwitcherConnection;
pub use error::{SwitcherError, SwitcherResult};
pub use http::{HttpSwitcherConfig, HttpSwitcherConnector};
pub use memory::MemoryConnector;
pub use pool::{ConnectionInfo, ConnectionState, PoolConfig, PoolEvent, SwitcherConnectionPool};

//! sinkpool core - Core abstractions shared by the pool and its sinks
//!
//! This crate defines:
//!
//! - `SinkConnection` - Trait for a connection to an external sink
//! - `ConnectionFactory` - Trait the pool uses to open new connections
//! - `ConnectionId` / `ConnectionState` - Identity and lifecycle of pooled connections
//! - `SinkError` - The error type shared across the workspace

mod connection;
mod error;

pub use connection::*;
pub use error::*;

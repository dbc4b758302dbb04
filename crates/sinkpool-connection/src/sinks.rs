//! Concrete sink connections
//!
//! Currently a single TCP socket sink that writes newline-delimited records,
//! the shape of output a socket server such as `nc -lk` or
//! `sinkpool listen` expects.

mod tcp;


pub use tcp::{TcpSinkConfig, TcpSinkConnection, TcpSinkFactory};

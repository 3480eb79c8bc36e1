//! RedBoxDb Client Library
//!
//! An async client for the RedBoxDb vector-similarity server and its
//! little-endian binary protocol over TCP.
//!
//! - `connection` - Connection state machine (handshake, commands, close)
//! - `protocol` - Frame encoding, response decoding and exact-length reads
//! - `models` - Endpoint, session, command and state types
//! - `config` - Client configuration from file and environment
//! - `bench` - Benchmark and validation routines used by `redbox-bench`
//!
//! # Usage
//!
//! ```ignore
//! use redbox_client::{Connection, Endpoint};
//!
//! let mut conn = Connection::open(Endpoint::new("127.0.0.1", 8080), "alpha", 3).await?;
//! let id = conn.insert_auto(&[0.0, 1.0, 0.0]).await?;
//! let top = conn.search_n(&[0.0, 0.9, 0.1], 5).await?;
//! conn.select_database("beta", 3).await?;
//! conn.close().await;
//! ```

pub mod bench;
pub mod config;
pub mod connection;
pub mod error;
pub mod models;
pub mod protocol;
pub mod vector;

pub use config::ClientConfig;
pub use connection::Connection;
pub use error::{ClientError, Result};
pub use models::{Command, ConnectionState, Endpoint, Session};

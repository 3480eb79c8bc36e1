//! Data models for the RedBoxDb client.
//!
//! These types describe what a connection is bound to (`Endpoint`, `Session`),
//! which commands the server understands (`Command`), and where a connection
//! is in its lifecycle (`ConnectionState`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Network address of a RedBoxDb server.
///
/// Immutable for the lifetime of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("127.0.0.1", 8080)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The database and vector dimension currently bound to a connection.
///
/// Replaced only by a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub database: String,
    pub dimension: u32,
}

impl Session {
    pub fn new(database: impl Into<String>, dimension: u32) -> Self {
        Self {
            database: database.into(),
            dimension,
        }
    }
}

/// Protocol command codes.
///
/// The discriminant is the byte sent as the first octet of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    Insert = 1,
    Search = 2,
    Delete = 3,
    /// Handshake: binds the connection to a database and dimension.
    SelectDb = 4,
    Update = 5,
    InsertAuto = 6,
    SearchN = 7,
}

impl Command {
    /// Wire code for this command.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Short lowercase name, used in log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Insert => "insert",
            Command::Search => "search",
            Command::Delete => "delete",
            Command::SelectDb => "select_db",
            Command::Update => "update",
            Command::InsertAuto => "insert_auto",
            Command::SearchN => "search_n",
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Command::Insert),
            2 => Ok(Command::Search),
            3 => Ok(Command::Delete),
            4 => Ok(Command::SelectDb),
            5 => Ok(Command::Update),
            6 => Ok(Command::InsertAuto),
            7 => Ok(Command::SearchN),
            other => Err(other),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Handshaking,
    Ready,
    /// A request has been sent and its response is not fully consumed.
    InFlight,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Handshaking => "Handshaking",
            ConnectionState::Ready => "Ready",
            ConnectionState::InFlight => "InFlight",
            ConnectionState::Closed => "Closed",
        }
    }

    /// Check if the state is terminal (no further I/O allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_codes_match_wire_values() {
        let all = [
            (Command::Insert, 1),
            (Command::Search, 2),
            (Command::Delete, 3),
            (Command::SelectDb, 4),
            (Command::Update, 5),
            (Command::InsertAuto, 6),
            (Command::SearchN, 7),
        ];
        for (cmd, code) in all {
            assert_eq!(cmd.code(), code);
            assert_eq!(Command::try_from(code), Ok(cmd));
        }
    }

    #[test]
    fn test_command_try_from_unknown() {
        assert_eq!(Command::try_from(0), Err(0));
        assert_eq!(Command::try_from(8), Err(8));
    }

    #[test]
    fn test_endpoint_display() {
        assert_eq!(Endpoint::new("10.0.0.2", 9000).to_string(), "10.0.0.2:9000");
        assert_eq!(Endpoint::default().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_connection_state_terminal() {
        assert!(ConnectionState::Closed.is_terminal());
        assert!(!ConnectionState::Ready.is_terminal());
        assert!(!ConnectionState::InFlight.is_terminal());
    }

    #[test]
    fn test_connection_state_serde() {
        let json = serde_json::to_string(&ConnectionState::InFlight).unwrap();
        assert_eq!(json, "\"in_flight\"");
    }
}

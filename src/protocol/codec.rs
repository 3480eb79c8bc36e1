//! Frame encoding and response decoding for the RedBoxDb wire protocol.
//!
//! Pure functions only: nothing here touches a socket.
//!
//! # Wire Format
//!
//! ```text
//! [ 1 byte command ][ 4 byte u32 LE argument ][ command-specific payload ]
//! ```
//!
//! Vectors are packed as contiguous little-endian `f32` values.

use crate::error::{ClientError, Result};
use crate::models::Command;

/// Size of the fixed frame header (command byte + u32 argument).
pub const HEADER_LEN: usize = 5;

/// Acknowledgement byte sent for Insert and the handshake.
pub const ACK_LEN: usize = 1;

/// Response to Search: one `i32` id.
pub const SEARCH_REPLY_LEN: usize = 4;

/// Response to InsertAuto: one `u64` id.
pub const ASSIGNED_ID_LEN: usize = 8;

/// Leading result-count field of a SearchN response.
pub const COUNT_LEN: usize = 4;

/// Width of each id in a SearchN body.
pub const ID_LEN: usize = 4;

/// Byte the server sends for a successful Delete or Update.
const SUCCESS_BYTE: u8 = b'1';

/// An outbound request, borrowing any vector it carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Request<'a> {
    Insert { id: u32, vector: &'a [f32] },
    Search { vector: &'a [f32] },
    Delete { id: u32 },
    SelectDb { name: &'a str, dimension: u32 },
    Update { id: u32, vector: &'a [f32] },
    InsertAuto { vector: &'a [f32] },
    SearchN { vector: &'a [f32], n: u32 },
}

impl Request<'_> {
    pub fn command(&self) -> Command {
        match self {
            Request::Insert { .. } => Command::Insert,
            Request::Search { .. } => Command::Search,
            Request::Delete { .. } => Command::Delete,
            Request::SelectDb { .. } => Command::SelectDb,
            Request::Update { .. } => Command::Update,
            Request::InsertAuto { .. } => Command::InsertAuto,
            Request::SearchN { .. } => Command::SearchN,
        }
    }

    /// The vector payload, if this request carries one.
    pub fn vector(&self) -> Option<&[f32]> {
        match *self {
            Request::Insert { vector, .. }
            | Request::Search { vector }
            | Request::Update { vector, .. }
            | Request::InsertAuto { vector }
            | Request::SearchN { vector, .. } => Some(vector),
            Request::Delete { .. } | Request::SelectDb { .. } => None,
        }
    }

    /// Encode this request as one complete frame.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidArgument` if a database name is too long
    /// for the u32 length field.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match *self {
            Request::SelectDb { name, dimension } => encode_select_db(name, dimension),
            Request::Delete { id } => Ok(encode_header(Command::Delete, id)),
            Request::Insert { id, vector } => Ok(encode_vector_frame(Command::Insert, id, vector)),
            Request::Search { vector } => Ok(encode_vector_frame(Command::Search, 0, vector)),
            Request::Update { id, vector } => Ok(encode_vector_frame(Command::Update, id, vector)),
            Request::InsertAuto { vector } => {
                Ok(encode_vector_frame(Command::InsertAuto, 0, vector))
            }
            Request::SearchN { vector, n } => Ok(encode_vector_frame(Command::SearchN, n, vector)),
        }
    }
}

/// Encode a bare header frame.
pub fn encode_header(command: Command, argument: u32) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN);
    push_header(&mut frame, command, argument);
    frame
}

fn push_header(frame: &mut Vec<u8>, command: Command, argument: u32) {
    frame.push(command.code());
    frame.extend_from_slice(&argument.to_le_bytes());
}

/// Encode a header followed by a packed `f32` payload.
pub fn encode_vector_frame(command: Command, argument: u32, vector: &[f32]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + vector.len() * 4);
    push_header(&mut frame, command, argument);
    for value in vector {
        frame.extend_from_slice(&value.to_le_bytes());
    }
    frame
}

/// Encode the handshake: header carrying the name length, the UTF-8 name,
/// then the dimension as u32.
pub fn encode_select_db(name: &str, dimension: u32) -> Result<Vec<u8>> {
    let name_bytes = name.as_bytes();
    let name_len = u32::try_from(name_bytes.len()).map_err(|_| {
        ClientError::InvalidArgument(format!(
            "database name is {} bytes, exceeds u32 length field",
            name_bytes.len()
        ))
    })?;

    let mut frame = Vec::with_capacity(HEADER_LEN + name_bytes.len() + 4);
    push_header(&mut frame, Command::SelectDb, name_len);
    frame.extend_from_slice(name_bytes);
    frame.extend_from_slice(&dimension.to_le_bytes());
    Ok(frame)
}

/// Decode a Delete/Update status byte.
pub fn decode_flag(byte: u8) -> bool {
    byte == SUCCESS_BYTE
}

/// Decode a Search reply.
pub fn decode_search(bytes: [u8; SEARCH_REPLY_LEN]) -> i32 {
    i32::from_le_bytes(bytes)
}

/// Decode an InsertAuto reply.
pub fn decode_assigned_id(bytes: [u8; ASSIGNED_ID_LEN]) -> u64 {
    u64::from_le_bytes(bytes)
}

/// Decode the SearchN count field and check it against the requested N.
///
/// # Errors
///
/// Returns `ClientError::ProtocolViolation` if the server claims more
/// results than were asked for.
pub fn decode_result_count(bytes: [u8; COUNT_LEN], requested: u32) -> Result<u32> {
    let count = u32::from_le_bytes(bytes);
    if count > requested {
        return Err(ClientError::ProtocolViolation(format!(
            "search_n returned {} results, requested at most {}",
            count, requested
        )));
    }
    Ok(count)
}

/// Decode a SearchN body of packed `i32` ids.
pub fn decode_ids(body: &[u8]) -> Result<Vec<i32>> {
    if body.len() % ID_LEN != 0 {
        return Err(ClientError::ProtocolViolation(format!(
            "id list of {} bytes is not a multiple of {}",
            body.len(),
            ID_LEN
        )));
    }
    Ok(body
        .chunks_exact(ID_LEN)
        .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Body length in bytes for a SearchN response with `count` ids.
pub fn ids_body_len(count: u32) -> usize {
    count as usize * ID_LEN
}

//! RedBoxDb binary wire protocol.
//!
//! # Protocol
//!
//! Every request is a single frame: a fixed 5-byte header followed by an
//! optional payload. All integers and floats are little-endian.
//!
//! ```text
//! Offset  Field    Type   Size   Description
//! 0       CMD      u8     1      Command code
//! 1       ARG      u32    4      Command-specific (id, name length, N)
//! 5       PAYLOAD  bytes  *      Packed f32 vector, or name + u32 dimension
//! ```
//!
//! | Command    | Code | Argument     | Response                          |
//! |------------|------|--------------|-----------------------------------|
//! | Insert     | 1    | vector id    | 1 ack byte                        |
//! | Search     | 2    | 0            | i32 nearest id                    |
//! | Delete     | 3    | vector id    | `'1'` / `'0'`                     |
//! | SelectDb   | 4    | name length  | 1 ack byte                        |
//! | Update     | 5    | vector id    | `'1'` / `'0'`                     |
//! | InsertAuto | 6    | 0            | u64 assigned id                   |
//! | SearchN    | 7    | N            | u32 count, then count × i32 ids   |
//!
//! The channel is half-duplex: a new frame may only be written once the
//! previous response has been read in full.

mod codec;
#[cfg(test)]
pub(crate) mod mock;
mod reader;

pub use codec::{
    decode_assigned_id, decode_flag, decode_ids, decode_result_count, decode_search,
    encode_header, encode_select_db, encode_vector_frame, ids_body_len, Request, ACK_LEN,
    ASSIGNED_ID_LEN, COUNT_LEN, HEADER_LEN, ID_LEN, SEARCH_REPLY_LEN,
};
pub use reader::{read_array, read_exact};

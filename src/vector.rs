//! Vector length validation.

use crate::error::{ClientError, Result};

/// Check that `vector` has exactly `dimension` components.
///
/// Runs before a frame is encoded so a malformed vector never reaches the
/// socket.
pub fn validate(vector: &[f32], dimension: u32) -> Result<()> {
    let expected = dimension as usize;
    if vector.len() != expected {
        return Err(ClientError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

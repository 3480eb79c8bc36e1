//! Exact-length reads over a byte stream.
//!
//! Stream sockets may hand back a response in several pieces. These helpers
//! keep reading until the requested number of bytes has arrived, and treat a
//! zero-byte read before that point as the peer closing the connection.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{is_disconnect, ClientError, Result};

/// Upper bound on how far the buffer grows ahead of received data.
pub(crate) const READ_CHUNK: usize = 64 * 1024;

/// Read exactly `len` bytes from `reader`.
///
/// `len` usually comes from a count the server sent, so the buffer grows
/// one chunk at a time as bytes arrive instead of being sized up front.
///
/// # Errors
///
/// Returns `ClientError::PeerClosed` if the stream ends or is reset before
/// `len` bytes were received, and `ClientError::Io` for any other read failure.
pub async fn read_exact<R>(reader: &mut R, len: usize) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(len.min(READ_CHUNK));
    while buf.len() < len {
        let start = buf.len();
        buf.resize(len.min(start + READ_CHUNK), 0);
        fill(reader, &mut buf[start..]).await.map_err(|e| match e {
            ClientError::PeerClosed { received, .. } => ClientError::PeerClosed {
                expected: len,
                received: start + received,
            },
            other => other,
        })?;
    }
    Ok(buf)
}

/// Read exactly `N` bytes into a fixed-size array.
pub async fn read_array<R, const N: usize>(reader: &mut R) -> Result<[u8; N]>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = [0u8; N];
    fill(reader, &mut buf).await?;
    Ok(buf)
}

async fn fill<R>(reader: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = match reader.read(&mut buf[filled..]).await {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) if is_disconnect(e.kind()) => 0,
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            return Err(ClientError::PeerClosed {
                expected: buf.len(),
                received: filled,
            });
        }
        filled += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mock::MockTransport;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_read_exact_single_chunk() {
        let mut transport = MockTransport::new(vec![1, 2, 3, 4, 5]);
        let bytes = read_exact(&mut transport, 4).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4]);

        // Remaining byte is still available for the next read
        let rest: [u8; 1] = read_array(&mut transport).await.unwrap();
        assert_eq!(rest, [5]);
    }

    #[tokio::test]
    async fn test_read_exact_one_byte_chunks() {
        let payload: Vec<u8> = (0..32).collect();
        let mut chunked = MockTransport::new(payload.clone()).with_chunk_size(1);
        let mut whole = MockTransport::new(payload.clone());

        let a = read_exact(&mut chunked, payload.len()).await.unwrap();
        let b = read_exact(&mut whole, payload.len()).await.unwrap();
        assert_eq!(a, b);
        assert!(chunked.reads() >= payload.len());
    }

    #[tokio::test]
    async fn test_read_exact_zero_length() {
        let mut transport = MockTransport::new(Vec::new());
        assert!(read_exact(&mut transport, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_peer_closed_mid_frame() {
        let mut transport = MockTransport::new(vec![9, 9, 9]).with_chunk_size(2);
        match read_exact(&mut transport, 8).await {
            Err(ClientError::PeerClosed { expected, received }) => {
                assert_eq!(expected, 8);
                assert_eq!(received, 3);
            }
            other => panic!("Expected PeerClosed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_exact_spans_chunks() {
        let payload: Vec<u8> = (0..READ_CHUNK + 10).map(|i| i as u8).collect();
        let mut transport = MockTransport::new(payload.clone()).with_chunk_size(4096);
        let bytes = read_exact(&mut transport, payload.len()).await.unwrap();
        assert_eq!(bytes, payload);
    }

    #[tokio::test]
    async fn test_oversized_length_fails_without_full_allocation() {
        // A bogus count from the wire must not reserve the whole length up front
        let mut transport = MockTransport::new(vec![7; 3]);
        match read_exact(&mut transport, u32::MAX as usize * 4).await {
            Err(ClientError::PeerClosed { expected, received }) => {
                assert_eq!(expected, u32::MAX as usize * 4);
                assert_eq!(received, 3);
            }
            other => panic!("Expected PeerClosed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_reset_is_peer_closed() {
        let mut transport = MockTransport::new(vec![1, 2])
            .failing_with(std::io::ErrorKind::ConnectionReset);
        match read_exact(&mut transport, 4).await {
            Err(ClientError::PeerClosed { expected, received }) => {
                assert_eq!(expected, 4);
                assert_eq!(received, 2);
            }
            other => panic!("Expected PeerClosed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_other_read_errors_stay_io() {
        let mut transport =
            MockTransport::new(Vec::new()).failing_with(std::io::ErrorKind::PermissionDenied);
        let result = read_array::<_, 4>(&mut transport).await;
        assert!(matches!(result, Err(ClientError::Io(_))));
    }

    #[tokio::test]
    async fn test_peer_closed_on_duplex_drop() {
        let (mut client, mut server) = tokio::io::duplex(64);
        server.write_all(&[1, 2]).await.unwrap();
        drop(server);

        let result = read_array::<_, 4>(&mut client).await;
        assert!(matches!(
            result,
            Err(ClientError::PeerClosed {
                expected: 4,
                received: 2
            })
        ));
    }
}

//! In-memory transport for unit tests.
//!
//! Serves a scripted byte sequence in chunks of a fixed size and records
//! everything written to it. The write log is shared so tests can inspect it
//! after the transport has been moved into a `Connection`.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

pub(crate) struct MockTransport {
    input: Vec<u8>,
    pos: usize,
    chunk_size: usize,
    reads: usize,
    fail_with: Option<std::io::ErrorKind>,
    written: Arc<Mutex<Vec<u8>>>,
}

impl MockTransport {
    pub(crate) fn new(input: Vec<u8>) -> Self {
        Self {
            input,
            pos: 0,
            chunk_size: usize::MAX,
            reads: 0,
            fail_with: None,
            written: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Fail reads with `kind` once the scripted input is exhausted.
    pub(crate) fn failing_with(mut self, kind: std::io::ErrorKind) -> Self {
        self.fail_with = Some(kind);
        self
    }

    /// Handle to everything written to this transport.
    pub(crate) fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.written)
    }

    /// Number of non-empty reads served so far.
    pub(crate) fn reads(&self) -> usize {
        self.reads
    }
}

impl AsyncRead for MockTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let remaining = self.input.len() - self.pos;
        if remaining == 0 {
            if let Some(kind) = self.fail_with {
                return Poll::Ready(Err(std::io::Error::new(kind, "scripted failure")));
            }
        }
        let n = remaining.min(self.chunk_size).min(buf.remaining());
        if n > 0 {
            let start = self.pos;
            buf.put_slice(&self.input[start..start + n]);
            self.pos += n;
            self.reads += 1;
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.written
            .lock()
            .expect("mock write log poisoned")
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

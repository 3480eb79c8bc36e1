//! Connection state machine for a RedBoxDb server.
//!
//! A `Connection` owns one transport and drives the half-duplex
//! request/response exchange: every command writes exactly one frame and then
//! reads exactly the response it is owed before returning.
//!
//! # Connection Lifecycle
//!
//! ```text
//! Disconnected -> Connecting -> Handshaking -> Ready <-> InFlight
//!                                                |
//!                                              Closed
//! ```
//!
//! Any failure after bytes have been exchanged (peer closed, timeout,
//! protocol violation, I/O error) closes the connection. Errors raised before
//! the write (dimension mismatch, invalid argument) leave it `Ready`.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::error::Elapsed;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, DEFAULT_TIMEOUT_SECS};
use crate::error::{ClientError, Result};
use crate::models::{Command, ConnectionState, Endpoint, Session};
use crate::protocol::{
    decode_assigned_id, decode_flag, decode_ids, decode_result_count, decode_search,
    encode_select_db, ids_body_len, read_array, read_exact, Request, ACK_LEN, ASSIGNED_ID_LEN,
    COUNT_LEN, SEARCH_REPLY_LEN,
};
use crate::vector;

/// A single client connection bound to one database at a time.
///
/// Methods take `&mut self`, so a connection can never have two requests
/// outstanding. Open several connections for concurrent throughput.
///
/// # Example
///
/// ```ignore
/// use redbox_client::{Connection, Endpoint};
///
/// let mut conn = Connection::open(Endpoint::default(), "alpha", 3).await?;
/// conn.insert(10, &[1.0, 0.0, 0.0]).await?;
/// let nearest = conn.search(&[0.9, 0.1, 0.0]).await?;
/// conn.close().await;
/// ```
pub struct Connection<S = TcpStream> {
    /// Transport; `None` once closed.
    stream: Option<S>,
    endpoint: Endpoint,
    session: Session,
    state: ConnectionState,
    /// Bound on each complete request/response exchange.
    timeout: Duration,
}

impl Connection<TcpStream> {
    /// Connect to `endpoint` and select `database` with the given dimension.
    ///
    /// # Errors
    ///
    /// - `ClientError::ConnectFailed` if the TCP connect fails
    /// - `ClientError::HandshakeRejected` if the server closes instead of acknowledging
    /// - `ClientError::Timeout` if either step exceeds the default timeout
    pub async fn open(endpoint: Endpoint, database: &str, dimension: u32) -> Result<Self> {
        Self::open_with_timeout(
            endpoint,
            database,
            dimension,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
        .await
    }

    /// Open a connection using host, database, dimension and timeout from `config`.
    pub async fn open_with_config(config: &ClientConfig) -> Result<Self> {
        Self::open_with_timeout(
            config.endpoint(),
            &config.database,
            config.dimension,
            config.timeout(),
        )
        .await
    }

    /// Open with automatic retry and exponential backoff.
    ///
    /// Retries only failures where retrying is safe (connect failures and
    /// timeouts), with delays of 100ms, 200ms, 400ms, etc. Returns the last
    /// error once `max_attempts` is exhausted.
    pub async fn open_with_retry(
        endpoint: Endpoint,
        database: &str,
        dimension: u32,
        max_attempts: u32,
    ) -> Result<Self> {
        let attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match Self::open(endpoint.clone(), database, dimension).await {
                Ok(conn) => return Ok(conn),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = Duration::from_millis(100 * (1 << (attempt - 1).min(16)));
                    warn!(
                        endpoint = %endpoint,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "connect attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn open_with_timeout(
        endpoint: Endpoint,
        database: &str,
        dimension: u32,
        limit: Duration,
    ) -> Result<Self> {
        let mut conn = Self {
            stream: None,
            endpoint,
            session: Session::new(database, dimension),
            state: ConnectionState::Disconnected,
            timeout: limit,
        };

        conn.state = ConnectionState::Connecting;
        let addr = conn.endpoint.to_string();
        debug!(endpoint = %addr, "connecting");

        let stream = match timeout(limit, TcpStream::connect(addr.as_str())).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                conn.state = ConnectionState::Closed;
                return Err(ClientError::ConnectFailed {
                    endpoint: addr,
                    source,
                });
            }
            Err(_) => {
                conn.state = ConnectionState::Closed;
                return Err(ClientError::Timeout(limit));
            }
        };

        // Frames are small; don't let Nagle hold them back
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "failed to set TCP_NODELAY");
        }

        conn.stream = Some(stream);
        conn.handshake(database, dimension).await?;
        Ok(conn)
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Perform the handshake over an already-established transport.
    ///
    /// Used for non-TCP transports and in tests. The connection uses the
    /// default timeout; adjust it afterwards with [`Connection::set_timeout`].
    pub async fn with_transport(
        stream: S,
        endpoint: Endpoint,
        database: &str,
        dimension: u32,
    ) -> Result<Self> {
        let mut conn = Self {
            stream: Some(stream),
            endpoint,
            session: Session::new(database, dimension),
            state: ConnectionState::Connecting,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };
        conn.handshake(database, dimension).await?;
        Ok(conn)
    }

    /// Switch this connection to another database.
    ///
    /// Re-sends the handshake over the existing socket. The active session is
    /// replaced only if the server acknowledges.
    pub async fn select_database(&mut self, name: &str, dimension: u32) -> Result<()> {
        self.check_ready()?;
        self.handshake(name, dimension).await
    }

    /// Insert `vector` under a caller-chosen `id`.
    pub async fn insert(&mut self, id: u32, vector: &[f32]) -> Result<()> {
        let limit = self.timeout;
        let (frame, stream) = self.begin(&Request::Insert { id, vector })?;
        let outcome = timeout(limit, async {
            send(stream, &frame).await?;
            // Ack content is not interpreted
            read_array::<_, ACK_LEN>(stream).await?;
            Ok::<_, ClientError>(())
        })
        .await;
        self.complete(Command::Insert, outcome)
    }

    /// Insert `vector` and return the id the server assigned.
    pub async fn insert_auto(&mut self, vector: &[f32]) -> Result<u64> {
        let limit = self.timeout;
        let (frame, stream) = self.begin(&Request::InsertAuto { vector })?;
        let outcome = timeout(limit, async {
            send(stream, &frame).await?;
            let bytes = read_array::<_, ASSIGNED_ID_LEN>(stream).await?;
            Ok::<_, ClientError>(decode_assigned_id(bytes))
        })
        .await;
        self.complete(Command::InsertAuto, outcome)
    }

    /// Overwrite the vector stored under `id`.
    ///
    /// Returns `false` if the id does not exist (or was deleted); nothing is
    /// inserted in that case.
    pub async fn update(&mut self, id: u32, vector: &[f32]) -> Result<bool> {
        let limit = self.timeout;
        let (frame, stream) = self.begin(&Request::Update { id, vector })?;
        let outcome = timeout(limit, async {
            send(stream, &frame).await?;
            let [status] = read_array::<_, 1>(stream).await?;
            Ok::<_, ClientError>(decode_flag(status))
        })
        .await;
        self.complete(Command::Update, outcome)
    }

    /// Soft-delete `id`. Returns `false` if no such record exists.
    pub async fn delete(&mut self, id: u32) -> Result<bool> {
        let limit = self.timeout;
        let (frame, stream) = self.begin(&Request::Delete { id })?;
        let outcome = timeout(limit, async {
            send(stream, &frame).await?;
            let [status] = read_array::<_, 1>(stream).await?;
            Ok::<_, ClientError>(decode_flag(status))
        })
        .await;
        self.complete(Command::Delete, outcome)
    }

    /// Return the id of the nearest stored vector.
    ///
    /// The value is passed through as sent by the server; what it answers for
    /// an empty database is server-defined.
    pub async fn search(&mut self, vector: &[f32]) -> Result<i32> {
        let limit = self.timeout;
        let (frame, stream) = self.begin(&Request::Search { vector })?;
        let outcome = timeout(limit, async {
            send(stream, &frame).await?;
            let bytes = read_array::<_, SEARCH_REPLY_LEN>(stream).await?;
            Ok::<_, ClientError>(decode_search(bytes))
        })
        .await;
        self.complete(Command::Search, outcome)
    }

    /// Return up to `n` nearest ids, closest first.
    ///
    /// May return fewer than `n` ids. A server answering with more than `n`
    /// is treated as a protocol violation and the connection is closed.
    pub async fn search_n(&mut self, vector: &[f32], n: u32) -> Result<Vec<i32>> {
        let limit = self.timeout;
        let (frame, stream) = self.begin(&Request::SearchN { vector, n })?;
        let outcome = timeout(limit, async {
            send(stream, &frame).await?;
            let count = decode_result_count(read_array::<_, COUNT_LEN>(stream).await?, n)?;
            if count == 0 {
                return Ok(Vec::new());
            }
            let body = read_exact(stream, ids_body_len(count)).await?;
            decode_ids(&body)
        })
        .await;
        self.complete(Command::SearchN, outcome)
    }

    /// Close the connection. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(error = %e, "shutdown failed");
            }
            info!(endpoint = %self.endpoint, "connection closed");
        }
        self.state = ConnectionState::Closed;
    }

    async fn handshake(&mut self, name: &str, dimension: u32) -> Result<()> {
        let frame = encode_select_db(name, dimension)?;
        let limit = self.timeout;
        let stream = self.stream.as_mut().ok_or(ClientError::ConnectionClosed)?;
        self.state = ConnectionState::Handshaking;
        debug!(database = name, dimension, "sending handshake");

        let outcome = timeout(limit, async {
            send(stream, &frame).await?;
            read_array::<_, ACK_LEN>(stream).await.map_err(|e| match e {
                ClientError::PeerClosed { received: 0, .. } => ClientError::HandshakeRejected {
                    database: name.to_string(),
                },
                other => other,
            })
        })
        .await;
        self.complete(Command::SelectDb, outcome)?;

        self.session = Session::new(name, dimension);
        info!(
            endpoint = %self.endpoint,
            database = name,
            dimension,
            "database selected"
        );
        Ok(())
    }

    /// Validate and encode `request`, then mark the connection in flight.
    ///
    /// Nothing is written here; errors returned from this point leave the
    /// connection untouched except when it was already desynchronized.
    fn begin(&mut self, request: &Request<'_>) -> Result<(Vec<u8>, &mut S)> {
        self.check_ready()?;
        if let Some(vector) = request.vector() {
            vector::validate(vector, self.session.dimension)?;
        }
        let frame = request.encode()?;
        let stream = self.stream.as_mut().ok_or(ClientError::ConnectionClosed)?;

        debug!(
            command = %request.command(),
            bytes = frame.len(),
            "sending frame"
        );
        self.state = ConnectionState::InFlight;
        Ok((frame, stream))
    }

    fn check_ready(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Ready => Ok(()),
            ConnectionState::InFlight | ConnectionState::Handshaking => {
                warn!(
                    endpoint = %self.endpoint,
                    state = %self.state,
                    "previous request was abandoned mid-flight; closing connection"
                );
                self.discard();
                Err(ClientError::Desynchronized)
            }
            ConnectionState::Disconnected
            | ConnectionState::Connecting
            | ConnectionState::Closed => Err(ClientError::ConnectionClosed),
        }
    }

    /// Settle an exchange: back to `Ready` on success, closed on any failure.
    fn complete<T>(
        &mut self,
        command: Command,
        outcome: std::result::Result<Result<T>, Elapsed>,
    ) -> Result<T> {
        let result = outcome.unwrap_or(Err(ClientError::Timeout(self.timeout)));
        match result {
            Ok(value) => {
                self.state = ConnectionState::Ready;
                debug!(command = %command, "response received");
                Ok(value)
            }
            Err(e) => {
                warn!(
                    endpoint = %self.endpoint,
                    command = %command,
                    error = %e,
                    "request failed; closing connection"
                );
                self.discard();
                Err(e)
            }
        }
    }

    /// Drop the transport without a graceful shutdown.
    fn discard(&mut self) {
        self.stream = None;
        self.state = ConnectionState::Closed;
    }
}

impl<S> Connection<S> {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// The active database and dimension.
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn dimension(&self) -> u32 {
        self.session.dimension
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Set the per-request timeout.
    ///
    /// Default is 30 seconds.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

/// Write one complete frame.
async fn send<W>(writer: &mut W, frame: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

//! A single connection to the backend.

use std::io::ErrorKind;
use std::net::Shutdown;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::BytesMut;
use socket2::SockRef;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use super::pool::Address;
use super::protocol::{error_lines, BANNER_PREFIX, VERSION_REQUEST};
use super::{DisconnectReason, Error, Metric};

static ENDPOINT_ID: AtomicU64 = AtomicU64::new(0);

/// Buffer and timeout settings for new endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointOptions {
    /// Write buffer size.
    pub buffer_size: usize,
    /// How long reads wait for the backend.
    pub read_timeout: Duration,
}

impl EndpointOptions {
    pub fn new(config: &tsdbpool_config::Config) -> Self {
        Self {
            buffer_size: config.general.client_buffer_size,
            read_timeout: config
                .tcp
                .read_timeout()
                .unwrap_or(config.general.healthcheck_timeout_duration()),
        }
    }
}

impl Default for EndpointOptions {
    fn default() -> Self {
        Self {
            buffer_size: 8192,
            read_timeout: Duration::from_secs(5),
        }
    }
}

/// Connection to a backend, owned by exactly one user at a time.
pub struct Endpoint {
    stream: Option<BufWriter<TcpStream>>,
    addr: Address,
    id: u64,
    created_at: Instant,
    last_healthcheck: Option<Instant>,
    read_timeout: Duration,
    disconnect_reason: Option<DisconnectReason>,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Endpoint {
    /// Wrap a connected stream.
    pub fn new(stream: TcpStream, addr: Address, options: &EndpointOptions) -> Self {
        Self {
            stream: Some(BufWriter::with_capacity(options.buffer_size, stream)),
            addr,
            id: ENDPOINT_ID.fetch_add(1, Ordering::Relaxed),
            created_at: Instant::now(),
            last_healthcheck: None,
            read_timeout: options.read_timeout,
            disconnect_reason: None,
        }
    }

    /// Unique connection identifier.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Backend address.
    #[inline]
    pub fn addr(&self) -> &Address {
        &self.addr
    }

    #[inline]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// How old this connection is.
    #[inline]
    pub fn age(&self, instant: Instant) -> Duration {
        instant.saturating_duration_since(self.created_at)
    }

    /// How long has it been since the last healthcheck.
    #[inline]
    pub fn healthcheck_age(&self, instant: Instant) -> Duration {
        if let Some(last_healthcheck) = self.last_healthcheck {
            instant.saturating_duration_since(last_healthcheck)
        } else {
            Duration::MAX
        }
    }

    /// Connection was closed. Once closed, it stays closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    fn stream(&mut self) -> Result<&mut BufWriter<TcpStream>, Error> {
        self.stream.as_mut().ok_or(Error::Closed)
    }

    /// Buffer bytes for sending. Call [`Endpoint::flush`] to send them.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.stream()?.write_all(bytes).await?;
        Ok(())
    }

    /// Buffer one `put` line.
    pub async fn put(&mut self, metric: &Metric) -> Result<(), Error> {
        self.write(metric.put_message().as_bytes()).await
    }

    /// Send everything buffered so far.
    pub async fn flush(&mut self) -> Result<(), Error> {
        self.stream()?.flush().await?;
        Ok(())
    }

    /// Wait for input and return all of it that arrived together.
    /// Returns `None` if the backend closed the connection.
    pub async fn read_available(&mut self) -> Result<Option<String>, Error> {
        let read_timeout = self.read_timeout;
        let stream = self.stream()?;
        let mut buf = BytesMut::with_capacity(1024);

        let read = timeout(read_timeout, stream.read_buf(&mut buf))
            .await
            .map_err(|_| Error::ReadTimeout)??;

        if read == 0 {
            return Ok(None);
        }

        // Take whatever else is already here, without waiting.
        loop {
            match timeout(Duration::ZERO, stream.read_buf(&mut buf)).await {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(_)) => continue,
                Ok(Err(err)) => return Err(err.into()),
            }
        }

        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    /// Ask the backend for its version banner.
    pub async fn version(&mut self) -> Result<String, Error> {
        self.write(VERSION_REQUEST).await?;
        self.flush().await?;

        self.read_available().await?.ok_or(Error::Closed)
    }

    /// Send `version` and check the reply. Any line that isn't part of the
    /// banner is an error the backend has been holding for us.
    ///
    /// Banner lines can arrive in separate segments, so a `Built on` line
    /// left over from the last probe may come first, or be all we read.
    pub async fn healthcheck(&mut self) -> Result<(), Error> {
        debug!("running healthcheck \"version\" [{}]", self.addr);

        // Leftovers from earlier replies.
        self.check_unsolicited()?;

        let mut reply = self.version().await?;

        loop {
            let errors = error_lines(&reply);

            if !errors.is_empty() {
                return Err(Error::Backend(errors));
            }

            if reply.lines().any(|line| line.starts_with(BANNER_PREFIX)) {
                break;
            }

            // Only `Built on` so far, the banner is on its way.
            match self.read_available().await? {
                Some(more) => reply.push_str(&more),
                None => return Err(Error::Closed),
            }
        }

        self.last_healthcheck = Some(Instant::now());

        Ok(())
    }

    /// The backend answered the probe with its banner.
    pub async fn is_alive(&mut self) -> bool {
        self.healthcheck().await.is_ok()
    }

    /// Check the socket without sending anything: the backend only talks
    /// to us when it has errors to report, so any bytes waiting to be read
    /// (or a closed socket) mean the connection shouldn't be reused.
    pub fn check_unsolicited(&mut self) -> Result<(), Error> {
        let stream = self.stream()?.get_ref();
        let mut buf = [0u8; 1024];
        let mut unsolicited = Vec::new();

        loop {
            match stream.try_read(&mut buf) {
                Ok(0) => return Err(Error::Closed),
                Ok(n) => unsolicited.extend_from_slice(&buf[..n]),
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) => return Err(err.into()),
            }
        }

        let errors = error_lines(&String::from_utf8_lossy(&unsolicited));
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Backend(errors))
        }
    }

    /// Record why the connection is about to be closed.
    pub fn disconnect_reason(&mut self, reason: DisconnectReason) {
        if self.disconnect_reason.is_none() {
            self.disconnect_reason = Some(reason);
        }
    }

    /// Close the connection. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            info!(
                "closing connection [{}, reason: {}]",
                self.addr,
                self.disconnect_reason.unwrap_or_default()
            );

            if !stream.buffer().is_empty() {
                warn!(
                    "discarding {} unflushed bytes [{}]",
                    stream.buffer().len(),
                    self.addr
                );
            }

            let stream = stream.into_inner();
            if let Err(err) = SockRef::from(&stream).shutdown(Shutdown::Both) {
                if err.kind() == ErrorKind::NotConnected {
                    debug!("connection already closed by peer [{}]", self.addr);
                } else {
                    error!("error closing connection: {} [{}]", err, self.addr);
                }
            }
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.close();
    }
}

use std::{net::SocketAddr, time::Duration};

use quanta::Clock;
use thiserror::Error;

use crate::{
    client::Metrics,
    connection::{socket::SocketConnection, Connection as _, ConnectionError, RemoteAddr},
};

const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_MAX_PAYLOAD_LEN: usize = 8192;
const SMALLEST_VALID_PAYLOAD: &[u8] = b"a:0|c\n";

/// Errors that could occur while building a statsd client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Failed to parse the remote address.
    #[error("invalid remote address: {reason}")]
    InvalidRemoteAddress {
        /// Details about the parsing failure.
        reason: String,
    },

    /// The maximum payload length is too small to fit any metric, or too large to be sent.
    #[error("invalid maximum payload length: {len}")]
    InvalidPayloadLength {
        /// The configured maximum payload length.
        len: usize,
    },

    /// The write timeout is zero.
    #[error("write timeout must be non-zero")]
    InvalidWriteTimeout,

    /// Failed to connect to the remote address.
    #[error("failed to connect to statsd server: {0}")]
    Connect(#[from] ConnectionError),
}

/// Builder for a statsd client.
pub struct StatsdBuilder {
    remote_addr: RemoteAddr,
    namespace: Option<String>,
    write_timeout: Duration,
    max_payload_len: usize,
    clock: Clock,
}

impl StatsdBuilder {
    /// Set the remote address to send metrics to.
    ///
    /// For UDP, the address simply needs to be in the format of `<host>:<port>`. For Unix domain sockets, an address in
    /// the format of `<scheme>://<path>`. The scheme can be either `unix` or `unixgram`, for a stream (`SOCK_STREAM`)
    /// or datagram (`SOCK_DGRAM`) socket, respectively.
    ///
    /// Defaults to sending to `127.0.0.1:8125` over UDP.
    ///
    /// # Errors
    ///
    /// If the given address is not able to be parsed as a valid address, an error will be returned indicating the
    /// reason.
    pub fn with_remote_address<A>(mut self, addr: A) -> Result<Self, BuildError>
    where
        A: AsRef<str>,
    {
        self.remote_addr = RemoteAddr::try_from(addr.as_ref())
            .map_err(|reason| BuildError::InvalidRemoteAddress { reason })?;
        Ok(self)
    }

    /// Set the namespace to prefix metric names with.
    ///
    /// The namespace is joined to each metric name with a `.`, so a namespace of `app` and a metric named `requests`
    /// produce the label `app.requests`. It can still be changed on the client after it has been built.
    ///
    /// Defaults to no namespace.
    #[must_use]
    pub fn with_namespace<N>(mut self, namespace: N) -> Self
    where
        N: Into<String>,
    {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the write timeout for sending metrics.
    ///
    /// When the write timeout is reached, the write operation will be aborted and the line being sent at the time
    /// will be dropped without retrying. The timeout must be non-zero, otherwise building the connection fails.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the maximum payload length for sending metrics.
    ///
    /// Any metric line that would exceed this length once framed for the transport is dropped instead of sent. This
    /// should generally be set to the same value (or lower) as the receive buffer size of the statsd server.
    ///
    /// Defaults to 8192 bytes.
    #[must_use]
    pub fn with_maximum_payload_length(mut self, max_payload_len: usize) -> Self {
        self.max_payload_len = max_payload_len;
        self
    }

    /// Set the clock used for automatic timing.
    ///
    /// Defaults to [`Clock::new`].
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the socket connection, without connecting it.
    ///
    /// # Errors
    ///
    /// If the write timeout is zero, or the maximum payload length is invalid, an error will be returned.
    pub fn build_connection(&self) -> Result<SocketConnection, BuildError> {
        if self.write_timeout.is_zero() {
            return Err(BuildError::InvalidWriteTimeout);
        }

        let len = self.max_payload_len;
        if len < SMALLEST_VALID_PAYLOAD.len() || u32::try_from(len).is_err() {
            return Err(BuildError::InvalidPayloadLength { len });
        }

        Ok(SocketConnection::new(self.remote_addr.clone(), self.write_timeout, len))
    }

    /// Builds the client, connecting it to the remote address.
    ///
    /// # Errors
    ///
    /// If the write timeout or the maximum payload length is invalid, or the connection cannot be established, an error will be returned.
    pub fn build(self) -> Result<Metrics<SocketConnection>, BuildError> {
        let mut connection = self.build_connection()?;
        connection.connect()?;

        Ok(Metrics::with_clock(connection, self.namespace, self.clock))
    }
}

impl Default for StatsdBuilder {
    fn default() -> Self {
        StatsdBuilder {
            remote_addr: RemoteAddr::Udp(vec![SocketAddr::from(([127, 0, 0, 1], 8125))]),
            namespace: None,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            clock: Clock::new(),
        }
    }
}

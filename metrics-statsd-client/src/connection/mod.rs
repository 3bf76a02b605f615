//! Transports that metric lines are written to.

use std::{
    io,
    net::{SocketAddr, ToSocketAddrs as _},
};

#[cfg(target_os = "linux")]
use std::path::PathBuf;

use thiserror::Error;

pub mod socket;

/// Errors that could occur while establishing a connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The underlying socket could not be created, bound, or connected.
    #[error("failed to connect to the remote address: {0}")]
    Io(#[from] io::Error),
}

/// A transport that formatted metric lines are handed to.
///
/// Writes are fire-and-forget: implementations decide how (and whether) a line reaches its destination, and never
/// report failures back to the caller. Any error handling, such as logging or counting dropped lines, happens inside
/// the implementation.
pub trait Connection {
    /// Establishes the underlying transport.
    ///
    /// Calling this on an already-connected transport may be a no-op.
    ///
    /// # Errors
    ///
    /// If the transport cannot be established, an error is returned.
    fn connect(&mut self) -> Result<(), ConnectionError>;

    /// Tears down the underlying transport.
    fn disconnect(&mut self);

    /// Transmits a single formatted metric line, on a best-effort basis.
    fn write(&mut self, line: &str);
}

impl<C> Connection for &mut C
where
    C: Connection + ?Sized,
{
    fn connect(&mut self) -> Result<(), ConnectionError> {
        (**self).connect()
    }

    fn disconnect(&mut self) {
        (**self).disconnect();
    }

    fn write(&mut self, line: &str) {
        (**self).write(line);
    }
}

impl<C> Connection for Box<C>
where
    C: Connection + ?Sized,
{
    fn connect(&mut self) -> Result<(), ConnectionError> {
        (**self).connect()
    }

    fn disconnect(&mut self) {
        (**self).disconnect();
    }

    fn write(&mut self, line: &str) {
        (**self).write(line);
    }
}

/// Address of a statsd server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteAddr {
    /// One or more UDP socket addresses. The first one that can be connected to is used.
    Udp(Vec<SocketAddr>),

    /// A Unix domain socket in datagram (`SOCK_DGRAM`) mode.
    #[cfg(target_os = "linux")]
    Unixgram(PathBuf),

    /// A Unix domain socket in stream (`SOCK_STREAM`) mode.
    #[cfg(target_os = "linux")]
    Unix(PathBuf),
}

impl RemoteAddr {
    /// Returns the transport ID for the remote address.
    ///
    /// This is a simple acronym related to the transport that will be used for the remote address, such as `udp` for
    /// UDP, and so on.
    pub const fn transport_id(&self) -> &'static str {
        match self {
            RemoteAddr::Udp(_) => "udp",
            #[cfg(target_os = "linux")]
            RemoteAddr::Unix(_) => "uds-stream",
            #[cfg(target_os = "linux")]
            RemoteAddr::Unixgram(_) => "uds",
        }
    }

    /// Returns `true` if each line must be terminated with a newline so the server can split the byte stream apart.
    pub const fn requires_line_delimiter(&self) -> bool {
        match self {
            RemoteAddr::Udp(_) => false,
            #[cfg(target_os = "linux")]
            RemoteAddr::Unixgram(_) => false,
            #[cfg(target_os = "linux")]
            RemoteAddr::Unix(_) => true,
        }
    }
}

impl<'a> TryFrom<&'a str> for RemoteAddr {
    type Error = String;

    fn try_from(addr: &'a str) -> Result<Self, Self::Error> {
        #[cfg(target_os = "linux")]
        if let Some((scheme, path)) = addr.split_once("://") {
            return match scheme {
                "unix" => Ok(RemoteAddr::Unix(PathBuf::from(path))),
                "unixgram" => Ok(RemoteAddr::Unixgram(PathBuf::from(path))),
                _ => Err(format!("invalid scheme '{scheme}' (expected 'unix' or 'unixgram')")),
            };
        }

        match addr.to_socket_addrs() {
            Ok(addrs) => {
                let addrs = addrs.collect::<Vec<_>>();
                if addrs.is_empty() {
                    Err(format!("'{addr}' did not resolve to any socket addresses"))
                } else {
                    Ok(RemoteAddr::Udp(addrs))
                }
            }
            Err(e) => Err(e.to_string()),
        }
    }
}

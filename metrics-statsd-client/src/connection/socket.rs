//! Socket transport for UDP and Unix domain sockets.

use std::{
    io::{self, Write as _},
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket},
    time::Duration,
};

#[cfg(target_os = "linux")]
use std::os::unix::net::{UnixDatagram, UnixStream};

use tracing::{debug, error, trace};

use super::{Connection, ConnectionError, RemoteAddr};

enum Client {
    Udp(UdpSocket),

    #[cfg(target_os = "linux")]
    Unixgram(UnixDatagram),

    #[cfg(target_os = "linux")]
    Unix(UnixStream),
}

impl Client {
    fn connect(remote_addr: &RemoteAddr, write_timeout: Duration) -> io::Result<Self> {
        match remote_addr {
            RemoteAddr::Udp(addrs) => {
                // Bind on the same address family as the server, otherwise connecting will fail outright.
                let local_addr: SocketAddr = match addrs.first() {
                    Some(SocketAddr::V6(_)) => (Ipv6Addr::UNSPECIFIED, 0).into(),
                    _ => (Ipv4Addr::UNSPECIFIED, 0).into(),
                };

                UdpSocket::bind(local_addr).and_then(|socket| {
                    socket.connect(&addrs[..])?;
                    socket.set_write_timeout(Some(write_timeout))?;
                    Ok(Client::Udp(socket))
                })
            }

            #[cfg(target_os = "linux")]
            RemoteAddr::Unixgram(path) => UnixDatagram::unbound().and_then(|socket| {
                socket.connect(path)?;
                socket.set_write_timeout(Some(write_timeout))?;
                Ok(Client::Unixgram(socket))
            }),

            #[cfg(target_os = "linux")]
            RemoteAddr::Unix(path) => UnixStream::connect(path).and_then(|socket| {
                socket.set_write_timeout(Some(write_timeout))?;
                Ok(Client::Unix(socket))
            }),
        }
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Client::Udp(socket) => socket.send(buf).map(drop),

            #[cfg(target_os = "linux")]
            Client::Unixgram(socket) => socket.send(buf).map(drop),

            #[cfg(target_os = "linux")]
            Client::Unix(socket) => socket.write_all(buf),
        }
    }
}

enum ClientState {
    // Intermediate state during send attempts.
    Inconsistent,

    // Not connected, either because we never were or because the caller asked us to disconnect.
    Disconnected,

    // The last send failed, so the socket was discarded. The next write makes a single attempt to reconnect.
    Broken,

    // Connected and ready to send lines.
    Ready(Client),
}

/// A connection to a statsd server over UDP, or over a Unix domain socket on Linux.
///
/// Each line is sent as it is written: one datagram per line for datagram transports, and newline-delimited for
/// stream transports. Nothing is buffered, batched, or retried. A line that cannot be sent is logged and dropped.
///
/// If a send fails, the socket is discarded and the next write makes one attempt to reconnect before sending. Writes
/// made while disconnected, either before [`connect`][Connection::connect] or after
/// [`disconnect`][Connection::disconnect], are dropped.
pub struct SocketConnection {
    remote_addr: RemoteAddr,
    write_timeout: Duration,
    max_payload_len: usize,
    state: ClientState,
    frame_buf: Vec<u8>,
    lines_sent: u64,
    lines_dropped: u64,
}

impl SocketConnection {
    /// Creates a new, unconnected `SocketConnection`.
    ///
    /// Lines whose framed length exceeds `max_payload_len` are dropped rather than sent.
    pub fn new(remote_addr: RemoteAddr, write_timeout: Duration, max_payload_len: usize) -> Self {
        SocketConnection {
            remote_addr,
            write_timeout,
            max_payload_len,
            state: ClientState::Disconnected,
            frame_buf: Vec::new(),
            lines_sent: 0,
            lines_dropped: 0,
        }
    }

    /// Returns the remote address this connection sends to.
    pub fn remote_addr(&self) -> &RemoteAddr {
        &self.remote_addr
    }

    /// Returns `true` if the connection currently holds a usable socket.
    pub fn is_connected(&self) -> bool {
        matches!(self.state, ClientState::Ready(_))
    }

    /// Returns the number of lines handed to the socket successfully.
    pub fn lines_sent(&self) -> u64 {
        self.lines_sent
    }

    /// Returns the number of lines that were dropped, whether for being oversized, for being written while
    /// disconnected, or because sending them failed.
    pub fn lines_dropped(&self) -> u64 {
        self.lines_dropped
    }

    fn frame(&mut self, line: &str) {
        self.frame_buf.clear();
        self.frame_buf.extend_from_slice(line.as_bytes());
        if self.remote_addr.requires_line_delimiter() {
            self.frame_buf.push(b'\n');
        }
    }

    /// Sends the current frame.
    ///
    /// Returns `Ok(false)` if the connection is disconnected and the frame was not sent.
    fn try_send(&mut self) -> io::Result<bool> {
        loop {
            let old_state = std::mem::replace(&mut self.state, ClientState::Inconsistent);
            match old_state {
                ClientState::Inconsistent => unreachable!("transitioned _from_ inconsistent state"),
                ClientState::Disconnected => {
                    self.state = ClientState::Disconnected;
                    return Ok(false);
                }
                ClientState::Broken => match Client::connect(&self.remote_addr, self.write_timeout) {
                    Ok(client) => {
                        debug!(transport = self.remote_addr.transport_id(), "Reconnected to statsd server.");
                        self.state = ClientState::Ready(client);
                    }
                    Err(e) => {
                        self.state = ClientState::Broken;
                        return Err(e);
                    }
                },
                ClientState::Ready(mut client) => {
                    let result = client.send(&self.frame_buf);
                    if result.is_ok() {
                        self.state = ClientState::Ready(client);
                    } else {
                        self.state = ClientState::Broken;
                    }

                    return result.map(|()| true);
                }
            }
        }
    }
}

impl Connection for SocketConnection {
    fn connect(&mut self) -> Result<(), ConnectionError> {
        if self.is_connected() {
            return Ok(());
        }

        let client = Client::connect(&self.remote_addr, self.write_timeout)?;
        self.state = ClientState::Ready(client);

        debug!(transport = self.remote_addr.transport_id(), "Connected to statsd server.");
        Ok(())
    }

    fn disconnect(&mut self) {
        if !matches!(self.state, ClientState::Disconnected) {
            debug!(transport = self.remote_addr.transport_id(), "Disconnected from statsd server.");
        }

        self.state = ClientState::Disconnected;
    }

    fn write(&mut self, line: &str) {
        self.frame(line);

        let payload_len = self.frame_buf.len();
        if payload_len > self.max_payload_len {
            debug!(payload_len, max_payload_len = self.max_payload_len, "Dropping oversized metric line.");
            self.lines_dropped += 1;
            return;
        }

        match self.try_send() {
            Ok(true) => self.lines_sent += 1,
            Ok(false) => {
                trace!(line, "Dropping metric line written while disconnected.");
                self.lines_dropped += 1;
            }
            Err(e) => {
                error!(error = %e, transport = self.remote_addr.transport_id(), "Failed to send metric line.");
                self.lines_dropped += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{net::UdpSocket, time::Duration};

    use super::SocketConnection;
    use crate::connection::{Connection, RemoteAddr};

    fn server() -> (UdpSocket, RemoteAddr) {
        let server = UdpSocket::bind("127.0.0.1:0").expect("failed to bind test server");
        server.set_read_timeout(Some(Duration::from_secs(5))).expect("failed to set read timeout");
        let remote_addr = RemoteAddr::Udp(vec![server.local_addr().expect("no local address")]);
        (server, remote_addr)
    }

    fn recv(server: &UdpSocket) -> String {
        let mut buf = [0; 1024];
        let (n, _) = server.recv_from(&mut buf).expect("failed to receive datagram");
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    #[test]
    fn drops_until_connected() {
        let (server, remote_addr) = server();
        let mut connection = SocketConnection::new(remote_addr, Duration::from_secs(1), 8192);
        assert!(!connection.is_connected());

        connection.write("early:1|c");
        assert_eq!(connection.lines_dropped(), 1);
        assert_eq!(connection.lines_sent(), 0);

        connection.connect().expect("failed to connect");
        assert!(connection.is_connected());
        connection.write("late:1|c");
        assert_eq!(connection.lines_sent(), 1);
        assert_eq!(recv(&server), "late:1|c");
    }

    #[test]
    fn connect_is_idempotent() {
        let (server, remote_addr) = server();
        let mut connection = SocketConnection::new(remote_addr, Duration::from_secs(1), 8192);

        connection.connect().expect("failed to connect");
        connection.connect().expect("failed to reconnect");
        connection.write("gauge:1|g");
        assert_eq!(recv(&server), "gauge:1|g");
    }

    #[test]
    fn disconnect_drops_writes() {
        let (_server, remote_addr) = server();
        let mut connection = SocketConnection::new(remote_addr, Duration::from_secs(1), 8192);

        connection.connect().expect("failed to connect");
        connection.disconnect();
        assert!(!connection.is_connected());

        connection.write("gauge:1|g");
        assert_eq!(connection.lines_sent(), 0);
        assert_eq!(connection.lines_dropped(), 1);
    }

    #[test]
    fn oversized_lines_are_dropped() {
        let (server, remote_addr) = server();
        let mut connection = SocketConnection::new(remote_addr, Duration::from_secs(1), 16);
        connection.connect().expect("failed to connect");

        connection.write("a_rather_long_metric_name:1|c");
        connection.write("short:1|c");

        assert_eq!(connection.lines_dropped(), 1);
        assert_eq!(connection.lines_sent(), 1);
        assert_eq!(recv(&server), "short:1|c");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn unix_stream_lines_are_newline_delimited() {
        use std::{
            io::{BufRead as _, BufReader},
            os::unix::net::UnixListener,
        };

        let path = std::env::temp_dir().join(format!("metrics-statsd-client-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).expect("failed to bind test listener");

        let mut connection = SocketConnection::new(RemoteAddr::Unix(path.clone()), Duration::from_secs(1), 8192);
        connection.connect().expect("failed to connect");
        connection.write("first:1|c");
        connection.write("second:2|g");

        let (stream, _) = listener.accept().expect("failed to accept");
        let mut reader = BufReader::new(stream);
        let mut line = String::new();

        reader.read_line(&mut line).expect("failed to read line");
        assert_eq!(line, "first:1|c\n");

        line.clear();
        reader.read_line(&mut line).expect("failed to read line");
        assert_eq!(line, "second:2|g\n");

        assert_eq!(connection.lines_sent(), 2);
        let _ = std::fs::remove_file(&path);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn unix_datagram_lines_are_not_delimited() {
        use std::os::unix::net::UnixDatagram;

        let path = std::env::temp_dir().join(format!("metrics-statsd-client-{}.dgram", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let server = UnixDatagram::bind(&path).expect("failed to bind test server");
        server.set_read_timeout(Some(Duration::from_secs(5))).expect("failed to set read timeout");

        let mut connection = SocketConnection::new(RemoteAddr::Unixgram(path.clone()), Duration::from_secs(1), 8192);
        connection.connect().expect("failed to connect");
        connection.write("meter:3|m");

        let mut buf = [0; 1024];
        let n = server.recv(&mut buf).expect("failed to receive datagram");
        assert_eq!(&buf[..n], b"meter:3|m");

        let _ = std::fs::remove_file(&path);
    }
}

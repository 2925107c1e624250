/*!
Byte transport beneath the transaction engine.

The engine only needs to write bytes, read whatever bytes are available and
adjust the read timeout. [`TcpTransport`] provides this over a TCP socket;
tests substitute an in-memory instrument.
*/

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};

/// Minimal half-duplex byte channel to one instrument
pub trait Transport {
    /// Write every byte of `data`
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read available bytes into `buf`.
    ///
    /// A read that exceeds the timeout fails with `WouldBlock` or `TimedOut`;
    /// `Ok(0)` means the peer closed the connection.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Change the read timeout
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Current read timeout
    fn timeout(&self) -> Duration;
}

/// Whether an I/O error is a read timeout rather than a socket failure
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Socket buffer size requested for bulk waveform transfers
const SOCKET_BUFFER_BYTES: usize = 1024 * 1024;

/// TCP connection to an instrument's raw SCPI socket
pub struct TcpTransport {
    stream: TcpStream,
    timeout: Duration,
}

impl TcpTransport {
    /// Connect to `address:port` and apply the read timeout
    pub fn connect(
        address: &str,
        port: u16,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> io::Result<Self> {
        let socket_addr: SocketAddr = (address, port).to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no address found for {address}:{port}"),
            )
        })?;

        debug!("Connecting to AWG at {}", socket_addr);
        let stream = TcpStream::connect_timeout(&socket_addr, connect_timeout)?;

        let sock_ref = socket2::SockRef::from(&stream);
        sock_ref.set_nodelay(true)?;
        sock_ref.set_keepalive(true)?;
        sock_ref.set_send_buffer_size(SOCKET_BUFFER_BYTES)?;
        sock_ref.set_recv_buffer_size(SOCKET_BUFFER_BYTES)?;

        stream.set_read_timeout(Some(timeout))?;
        info!("🔌 Connected to AWG at {}", socket_addr);

        Ok(Self { stream, timeout })
    }

    /// Address of the connected instrument
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data)?;
        self.stream.flush()
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_timeout_classification() {
        assert!(is_timeout(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(is_timeout(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(!is_timeout(&io::Error::from(io::ErrorKind::ConnectionReset)));
    }

    #[test]
    fn test_tcp_echo_and_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let mut stream = stream;
            stream.write_all(b"ok\n").unwrap();
            // Hold the connection open so the client's next read times out
            let mut rest = String::new();
            let _ = reader.read_line(&mut rest);
            line
        });

        let mut transport = TcpTransport::connect(
            "127.0.0.1",
            port,
            Duration::from_secs(2),
            Duration::from_millis(200),
        )
        .unwrap();

        transport.send(b"*IDN?\n").unwrap();
        let mut buf = [0u8; 16];
        let mut received = Vec::new();
        while !received.ends_with(b"\n") {
            let n = transport.recv(&mut buf).unwrap();
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, b"ok\n");

        let err = transport.recv(&mut buf).unwrap_err();
        assert!(is_timeout(&err));

        transport.set_timeout(Duration::from_millis(300)).unwrap();
        assert_eq!(transport.timeout(), Duration::from_millis(300));

        drop(transport);
        assert_eq!(server.join().unwrap(), "*IDN?\n");
    }
}

/*!
Command/response transaction engine.

Every byte exchanged with the instrument goes through a [`Session`]. The
channel is a strict ping-pong: a command is written, and if it expects a
reply the session reads until the reply is complete. A reply is complete once
it ends in a newline and holds at least the expected number of `;`-separated
fields; anything shorter is treated as still arriving.
*/

use crate::command::Command;
use crate::config::BulkReadConfig;
use crate::error::{AwgError, Result};
use crate::transport::{is_timeout, Transport};
use awg_codec::{parse_header, BlockError};
use bytes::BytesMut;
use std::io;
use std::str::FromStr;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Bytes requested per read while assembling a text reply
const READ_CHUNK_BYTES: usize = 4096;

/// Bytes requested per read while assembling a binary block
const BLOCK_CHUNK_BYTES: usize = 10000;

/// Default number of sends before a query fails
pub const DEFAULT_RETRY_DEPTH: usize = 3;

/// Reply completeness check used to decide whether to keep reading
fn is_complete(buffer: &[u8], expected_fields: usize) -> bool {
    buffer.last() == Some(&b'\n') && buffer.split(|&b| b == b';').count() >= expected_fields
}

fn connection_closed() -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "instrument closed the connection",
    )
}

/// Exclusive owner of the connection to one instrument
pub struct Session<T> {
    transport: T,
    retry_depth: usize,
    bulk_read: BulkReadConfig,
    buffer: BytesMut,
}

impl<T: Transport> Session<T> {
    /// Create a session over an open transport
    pub fn new(transport: T, retry_depth: usize) -> Self {
        Self {
            transport,
            retry_depth: retry_depth.max(1),
            bulk_read: BulkReadConfig::default(),
            buffer: BytesMut::with_capacity(READ_CHUNK_BYTES),
        }
    }

    /// Override the binary block read-back policy
    pub fn with_bulk_read(mut self, bulk_read: BulkReadConfig) -> Self {
        self.bulk_read = bulk_read;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn retry_depth(&self) -> usize {
        self.retry_depth
    }

    pub fn timeout(&self) -> Duration {
        self.transport.timeout()
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.transport.set_timeout(timeout)?;
        Ok(())
    }

    /// Send a command and, if it expects one, wait for its reply.
    ///
    /// A read timeout resends the whole command. After `retry_depth` sends
    /// without a complete reply the call fails with
    /// [`AwgError::CommunicationTimeout`]. Replies are returned with the
    /// terminator and surrounding whitespace stripped.
    pub fn send(&mut self, command: &Command) -> Result<Option<String>> {
        let wire = command.to_wire();

        for attempt in 1..=self.retry_depth {
            trace!("→ {}", command);
            self.transport.send(&wire)?;

            if !command.expects_response() {
                return Ok(None);
            }

            match self.read_reply(command.expected_fields()) {
                Ok(()) => {
                    let text = std::str::from_utf8(&self.buffer).map_err(|_| {
                        AwgError::malformed(
                            command.preview(),
                            String::from_utf8_lossy(&self.buffer),
                            "reply is not valid UTF-8",
                        )
                    })?;
                    let reply = text.trim().to_string();
                    trace!("← {}", reply);
                    return Ok(Some(reply));
                }
                Err(err) if is_timeout(&err) => {
                    warn!(
                        "Timeout. Trying to send {:?} again (attempt {} of {})",
                        command.preview(),
                        attempt,
                        self.retry_depth
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AwgError::CommunicationTimeout {
            command: command.preview(),
            attempts: self.retry_depth,
        })
    }

    /// Read until the buffered reply is complete
    fn read_reply(&mut self, expected_fields: usize) -> io::Result<()> {
        self.buffer.clear();
        let mut chunk = [0u8; READ_CHUNK_BYTES];

        loop {
            let n = self.transport.recv(&mut chunk)?;
            if n == 0 {
                return Err(connection_closed());
            }
            self.buffer.extend_from_slice(&chunk[..n]);

            if is_complete(&self.buffer, expected_fields) {
                return Ok(());
            }
        }
    }

    /// Send a command that has no reply
    pub fn write(&mut self, text: impl Into<String>) -> Result<()> {
        self.send(&Command::write(text))?;
        Ok(())
    }

    /// Send a single-field query
    pub fn query(&mut self, text: impl Into<String>) -> Result<String> {
        let command = Command::query(text);
        self.expect_reply(&command)
    }

    /// Send a compound query and split its reply into exactly `fields` fields
    pub fn query_fields(&mut self, text: impl Into<String>, fields: usize) -> Result<Vec<String>> {
        let command = Command::query_fields(text, fields);
        let reply = self.expect_reply(&command)?;
        let values: Vec<String> = reply.split(';').map(|f| f.trim().to_string()).collect();

        if values.len() != fields {
            return Err(AwgError::malformed(
                command.preview(),
                reply,
                format!("expected {} fields, got {}", fields, values.len()),
            ));
        }
        Ok(values)
    }

    /// Send a single-field query and parse the reply
    pub fn query_parsed<V: FromStr>(&mut self, text: impl Into<String>) -> Result<V> {
        let command = Command::query(text);
        let reply = self.expect_reply(&command)?;
        reply.parse::<V>().map_err(|_| {
            AwgError::malformed(
                command.preview(),
                reply.clone(),
                format!("cannot parse as {}", std::any::type_name::<V>()),
            )
        })
    }

    fn expect_reply(&mut self, command: &Command) -> Result<String> {
        self.send(command)?.ok_or_else(|| {
            AwgError::malformed(command.preview(), "", "query produced no reply")
        })
    }

    /// Send a query answered by a `#<d><length>` binary block and return its payload.
    ///
    /// The block is followed by a newline terminator, which is read and
    /// discarded along with any whitespace before it. Each failed read is
    /// followed by a backoff pause; once the configured number of reads has
    /// failed the read-back is abandoned with a connection error, unless the
    /// whole payload already arrived and only the terminator is missing.
    pub fn query_block(&mut self, text: impl Into<String>) -> Result<Vec<u8>> {
        let command = Command::write(text);
        debug!("Requesting binary block: {}", command);
        self.transport.send(&command.to_wire())?;

        self.buffer.clear();
        let mut chunk = vec![0u8; BLOCK_CHUNK_BYTES];
        let mut failures = 0;

        loop {
            let header = match parse_header(&self.buffer) {
                Ok(header) => Some(header),
                Err(BlockError::Incomplete { .. }) => None,
                Err(err) => return Err(err.into()),
            };
            // An unread terminator would complete the next query early
            if let Some(header) = header {
                if let Some(trailer) = self.buffer.get(header.total_len()..) {
                    if trailer.contains(&b'\n') {
                        return Ok(header.payload(&self.buffer)?.to_vec());
                    }
                }
            }

            match self.transport.recv(&mut chunk) {
                Ok(0) => return Err(connection_closed().into()),
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(err) => {
                    failures += 1;
                    warn!(
                        "Block read failed ({} of {}): {}",
                        failures, self.bulk_read.attempts, err
                    );
                    if failures >= self.bulk_read.attempts {
                        if let Some(header) = header {
                            if self.buffer.len() >= header.total_len() {
                                warn!("Binary block arrived without a terminator");
                                return Ok(header.payload(&self.buffer)?.to_vec());
                            }
                        }
                        return Err(AwgError::Connection(err));
                    }
                    thread::sleep(self.bulk_read.backoff());
                }
            }
        }
    }
}

//! In-memory transports for exercising the driver without hardware.

use crate::transport::Transport;
use awg_codec::{frame_block, parse_header};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::Duration;

/// One scripted outcome of a `recv` call
#[derive(Debug, Clone)]
pub enum Reply {
    Data(Vec<u8>),
    Timeout,
    Fail(io::ErrorKind),
    Closed,
}

type Responder = Box<dyn FnMut(&[u8]) -> Vec<Reply>>;

/// Transport whose replies are produced by a closure per written command.
///
/// Reads with nothing scripted time out.
pub struct FakeInstrument {
    pub writes: Vec<Vec<u8>>,
    pending: VecDeque<Reply>,
    responder: Responder,
    timeout: Duration,
}

impl FakeInstrument {
    pub fn new(responder: impl FnMut(&[u8]) -> Vec<Reply> + 'static) -> Self {
        Self {
            writes: Vec::new(),
            pending: VecDeque::new(),
            responder: Box::new(responder),
            timeout: Duration::from_millis(500),
        }
    }

    /// An instrument that never answers
    pub fn silent() -> Self {
        Self::new(|_| Vec::new())
    }

    /// Written commands as text without their terminators
    pub fn commands(&self) -> Vec<String> {
        self.writes
            .iter()
            .map(|w| String::from_utf8_lossy(w).trim_end_matches('\n').to_string())
            .collect()
    }
}

impl Transport for FakeInstrument {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.writes.push(data.to_vec());
        let replies = (self.responder)(data);
        self.pending.extend(replies);
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.pending.pop_front() {
            Some(Reply::Data(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.pending.push_front(Reply::Data(bytes.split_off(n)));
                }
                Ok(n)
            }
            Some(Reply::Timeout) | None => Err(io::Error::from(io::ErrorKind::TimedOut)),
            Some(Reply::Fail(kind)) => Err(io::Error::from(kind)),
            Some(Reply::Closed) => Ok(0),
        }
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// One `WLIST:WAVEFORM:DATA` write seen by [`SimulatedAwg`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockWrite {
    pub name: String,
    pub offset: usize,
    pub count: usize,
    pub payload_len: usize,
    pub status_queried: bool,
}

/// Small model of the instrument's waveform list and error queue
pub struct SimulatedAwg {
    pub waveforms: Vec<String>,
    pub data: HashMap<String, Vec<u8>>,
    pub error_queue: VecDeque<String>,
    pub block_writes: Vec<BlockWrite>,
    pub commands: Vec<String>,
    pub timeouts_set: Vec<Duration>,
    /// Number of upcoming block writes answered with a nonzero status
    pub reject_blocks: usize,
    pending: VecDeque<u8>,
    timeout: Duration,
}

impl SimulatedAwg {
    pub fn new() -> Self {
        Self {
            waveforms: Vec::new(),
            data: HashMap::new(),
            error_queue: VecDeque::new(),
            block_writes: Vec::new(),
            commands: Vec::new(),
            timeouts_set: Vec::new(),
            reject_blocks: 0,
            pending: VecDeque::new(),
            timeout: Duration::from_millis(500),
        }
    }

    pub fn with_waveform(mut self, name: &str, bytes: Vec<u8>) -> Self {
        self.waveforms.push(name.to_string());
        self.data.insert(name.to_string(), bytes);
        self
    }

    fn reply(&mut self, text: &str) {
        self.pending.extend(text.as_bytes());
        self.pending.push_back(b'\n');
    }

    fn handle_block_write(&mut self, body: &[u8]) {
        let prefix = b"WLIST:WAVEFORM:DATA \"";
        let rest = &body[prefix.len()..];
        let name_end = rest.iter().position(|&b| b == b'"').unwrap();
        let name = String::from_utf8_lossy(&rest[..name_end]).to_string();

        // ",<offset>,<count>,#..."
        let rest = &rest[name_end + 2..];
        let hash = rest.iter().position(|&b| b == b'#').unwrap();
        let numbers = String::from_utf8_lossy(&rest[..hash]).to_string();
        let mut fields = numbers.trim_end_matches(',').split(',');
        let offset: usize = fields.next().unwrap().parse().unwrap();
        let count: usize = fields.next().unwrap().parse().unwrap();

        let block = &rest[hash..];
        let header = parse_header(block).unwrap();
        let payload = header.payload(block).unwrap().to_vec();
        let status_queried = &block[header.total_len()..] == b";*ESR?";

        self.block_writes.push(BlockWrite {
            name: name.clone(),
            offset,
            count,
            payload_len: payload.len(),
            status_queried,
        });

        if status_queried && self.reject_blocks > 0 {
            self.reject_blocks -= 1;
            self.reply("16");
            return;
        }

        let stored = self.data.entry(name).or_default();
        let start = offset * 2;
        if stored.len() < start + payload.len() {
            stored.resize(start + payload.len(), 0);
        }
        stored[start..start + payload.len()].copy_from_slice(&payload);

        if status_queried {
            self.reply("0");
        }
    }

    fn answer(&mut self, part: &str) -> Option<String> {
        let upper = part.trim().to_ascii_uppercase();
        let argument =
            |prefix: &str| part.trim()[prefix.len()..].trim().trim_matches('"').to_string();

        if upper == "*ESR?" {
            return Some(self.error_queue.len().min(1).to_string());
        }
        if upper == "SYSTEM:ERR?" {
            return Some(
                self.error_queue
                    .pop_front()
                    .unwrap_or_else(|| "0,\"No error\"".to_string()),
            );
        }
        if upper == "WLIST:SIZE?" {
            return Some(self.waveforms.len().to_string());
        }
        for prefix in ["WLIST:NAME? ", "NAME? "] {
            if upper.starts_with(prefix) {
                let index: usize = argument(prefix).parse().unwrap();
                return Some(format!("\"{}\"", self.waveforms[index]));
            }
        }
        if upper.starts_with("WLIST:WAVEFORM:NEW ") {
            let args = argument("WLIST:WAVEFORM:NEW ");
            let name = args.split(',').next().unwrap().trim_matches('"').to_string();
            self.waveforms.push(name.clone());
            self.data.insert(name, Vec::new());
            return None;
        }
        if upper.starts_with("WLIST:WAVEFORM:DELETE ") {
            let name = argument("WLIST:WAVEFORM:DELETE ");
            self.waveforms.retain(|w| *w != name);
            self.data.remove(&name);
            return None;
        }
        if upper.starts_with("WLIST:WAVEFORM:TYPE? ") {
            return Some("INT".to_string());
        }
        None
    }
}

impl Transport for SimulatedAwg {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        let body = data.strip_suffix(b"\n").unwrap_or(data);

        if body.starts_with(b"WLIST:WAVEFORM:DATA \"") {
            self.commands.push("WLIST:WAVEFORM:DATA".to_string());
            self.handle_block_write(body);
            return Ok(());
        }

        let text = String::from_utf8_lossy(body).to_string();
        self.commands.push(text.clone());

        if let Some(name) = text.strip_prefix("WLIST:WAVEFORM:DATA? ") {
            let bytes = self.data.get(name.trim_matches('"')).cloned().unwrap_or_default();
            let framed = frame_block(&bytes).unwrap();
            self.pending.extend(framed);
            self.pending.push_back(b'\n');
            return Ok(());
        }

        let answers: Vec<String> = text.split(';').filter_map(|part| self.answer(part)).collect();
        if !answers.is_empty() {
            let joined = answers.join(";");
            self.reply(&joined);
        }
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        }
        let n = self.pending.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeouts_set.push(timeout);
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/*!
SCPI command values with their transaction hints.
*/

use std::fmt;

/// Length of the command text quoted in logs and timeout errors
pub const PREVIEW_CHARS: usize = 100;

/// One instruction (or `;`-joined group of instructions) for the instrument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    bytes: Vec<u8>,
    expect_response: bool,
    expected_fields: usize,
}

impl Command {
    /// A command with no reply
    pub fn write(text: impl Into<String>) -> Self {
        Self::from_bytes(text.into().into_bytes(), false, 1)
    }

    /// A query answered by a single field
    pub fn query(text: impl Into<String>) -> Self {
        Self::from_bytes(text.into().into_bytes(), true, 1)
    }

    /// A compound query answered by `fields` `;`-separated fields
    pub fn query_fields(text: impl Into<String>, fields: usize) -> Self {
        Self::from_bytes(text.into().into_bytes(), true, fields)
    }

    /// A command whose body may embed binary blocks
    pub fn from_bytes(bytes: Vec<u8>, expect_response: bool, expected_fields: usize) -> Self {
        Self {
            bytes,
            expect_response,
            expected_fields: expected_fields.max(1),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn expects_response(&self) -> bool {
        self.expect_response
    }

    pub fn expected_fields(&self) -> usize {
        self.expected_fields
    }

    /// Command bytes followed by the line terminator
    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(self.bytes.len() + 1);
        wire.extend_from_slice(&self.bytes);
        wire.push(b'\n');
        wire
    }

    /// Leading text of the command for diagnostics
    pub fn preview(&self) -> String {
        String::from_utf8_lossy(&self.bytes)
            .trim()
            .chars()
            .take(PREVIEW_CHARS)
            .collect()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.preview())
    }
}

/// Quote a waveform name the way the instrument expects it
pub fn quoted(name: &str) -> String {
    format!("\"{}\"", name.trim_matches('"'))
}

/// Strip surrounding quotes and whitespace from a returned name
pub fn unquoted(field: &str) -> String {
    field.trim().trim_matches('"').to_string()
}

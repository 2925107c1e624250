/*!
Binary block framing.

Raw bytes travel inside SCPI text as `#<d><length><payload>`, where `<d>` is a
single ASCII digit giving the width of the decimal `<length>` field.
*/

use crate::error::BlockError;

/// Parsed block prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Number of decimal digits in the length field
    pub digit_count: usize,
    /// Byte length of the payload following the header
    pub payload_len: usize,
    /// Bytes occupied by the header itself (`2 + digit_count`)
    pub header_len: usize,
}

impl BlockHeader {
    /// Header plus payload length
    pub fn total_len(&self) -> usize {
        self.header_len + self.payload_len
    }

    /// Payload slice of a buffer that starts with this header
    pub fn payload<'a>(&self, buffer: &'a [u8]) -> Result<&'a [u8], BlockError> {
        buffer
            .get(self.header_len..self.total_len())
            .ok_or(BlockError::Incomplete {
                needed: self.total_len(),
                available: buffer.len(),
            })
    }
}

/// Build the `#<d><length>` prefix for a payload of `payload_len` bytes
pub fn build_header(payload_len: usize) -> Result<String, BlockError> {
    let length = payload_len.to_string();
    if length.len() > 9 {
        return Err(BlockError::PayloadTooLarge(payload_len));
    }
    Ok(format!("#{}{}", length.len(), length))
}

/// Prefix `payload` with its block header
pub fn frame_block(payload: &[u8]) -> Result<Vec<u8>, BlockError> {
    let header = build_header(payload.len())?;
    let mut framed = Vec::with_capacity(header.len() + payload.len());
    framed.extend_from_slice(header.as_bytes());
    framed.extend_from_slice(payload);
    Ok(framed)
}

/// Parse a block header from the start of `buffer`.
///
/// Returns [`BlockError::Incomplete`] while fewer than `2 + digit_count`
/// bytes are available, so callers reading from a stream can keep reading.
pub fn parse_header(buffer: &[u8]) -> Result<BlockHeader, BlockError> {
    if buffer.len() < 2 {
        return Err(BlockError::Incomplete {
            needed: 2,
            available: buffer.len(),
        });
    }
    if buffer[0] != b'#' {
        return Err(BlockError::MissingHash(buffer[0]));
    }

    let digit = buffer[1] as char;
    let digit_count = match digit.to_digit(10) {
        Some(n @ 1..=9) => n as usize,
        _ => return Err(BlockError::InvalidDigitCount(digit)),
    };

    let header_len = 2 + digit_count;
    let field = buffer.get(2..header_len).ok_or(BlockError::Incomplete {
        needed: header_len,
        available: buffer.len(),
    })?;

    // `usize::from_str` would also take a sign
    if !field.iter().all(u8::is_ascii_digit) {
        return Err(BlockError::InvalidLength(
            String::from_utf8_lossy(field).into_owned(),
        ));
    }
    let payload_len = field
        .iter()
        .fold(0usize, |len, &b| len * 10 + usize::from(b - b'0'));

    Ok(BlockHeader {
        digit_count,
        payload_len,
        header_len,
    })
}

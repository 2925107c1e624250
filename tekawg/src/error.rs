/*!
Error types for the AWG driver.
*/

use awg_codec::{BlockError, CodecError};
use thiserror::Error;

/// Common result type used throughout the driver
pub type Result<T> = std::result::Result<T, AwgError>;

/// Errors raised by driver operations
#[derive(Error, Debug)]
pub enum AwgError {
    /// Every attempt of a command expecting a reply timed out
    #[error("Failed to receive a response to {command:?} after {attempts} attempts")]
    CommunicationTimeout { command: String, attempts: usize },

    /// Reply could not be interpreted
    #[error("Malformed response to {command:?}: {reason} (got {response:?})")]
    MalformedResponse {
        command: String,
        response: String,
        reason: String,
    },

    /// Sample conversion errors
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Binary block framing errors
    #[error("Block error: {0}")]
    Block(#[from] BlockError),

    /// Socket-level failures; the connection should be considered lost
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// A waveform block was rejected more times than the attempt cap allows
    #[error("Upload of {name:?} failed at sample offset {offset} after {attempts} attempts (error status {status:?})")]
    UploadFailed {
        name: String,
        offset: usize,
        attempts: usize,
        status: String,
    },

    /// Caller supplied arguments the device cannot accept
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl AwgError {
    /// Create a new malformed response error
    pub fn malformed(
        command: impl Into<String>,
        response: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedResponse {
            command: command.into(),
            response: response.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Check if this error is a retry-exhausted timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::CommunicationTimeout { .. })
    }
}

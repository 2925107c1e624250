/*!
Error types for the waveform codec and block framer.
*/

use thiserror::Error;

/// Common result type used throughout the codec
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while converting or packing waveform samples
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Bit depth outside the supported set for the requested operation
    #[error("Unsupported bit depth {bits}; supported bit depths are {supported:?}")]
    UnsupportedBitDepth { bits: u8, supported: &'static [u8] },

    /// Supplied sample patterns disagree in length
    #[error("Supplied patterns of unequal length: amplitude = {amplitude:?}, marker1 = {marker1:?}, marker2 = {marker2:?}")]
    UnequalLengths {
        amplitude: Option<usize>,
        marker1: Option<usize>,
        marker2: Option<usize>,
    },

    /// No amplitude or marker pattern was supplied to merge
    #[error("Must supply at least one sequence pattern to create a merged sample array")]
    NoInputSupplied,

    /// Amplitude outside the bipolar range [-1.0, 1.0]
    #[error("Amplitude {0} is outside the bipolar range [-1.0, 1.0]")]
    AmplitudeOutOfRange(f64),

    /// Byte buffer does not hold a whole number of records
    #[error("{len} bytes is not a multiple of the {record_size}-byte record size")]
    TruncatedRecord { len: usize, record_size: usize },

    /// Unrecognized waveform element type tag
    #[error("Unknown waveform element format: {0:?}")]
    UnknownElementFormat(String),
}

/// Errors raised while building or parsing a binary block header
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("Block header must start with '#', found {0:#04x}")]
    MissingHash(u8),

    #[error("Invalid block digit count {0:?}")]
    InvalidDigitCount(char),

    #[error("Invalid block length field {0:?}")]
    InvalidLength(String),

    #[error("Incomplete block: need {needed} bytes, have {available}")]
    Incomplete { needed: usize, available: usize },

    #[error("Payload of {0} bytes needs more than 9 length digits")]
    PayloadTooLarge(usize),
}

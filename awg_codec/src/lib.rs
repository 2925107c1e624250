/*!
# AWG Waveform Codec

This crate contains the pure data-format layer used by the `tekawg` driver:
conversion between bipolar floating-point amplitudes and the packed 16-bit
sample words stored by Tektronix AWG5000-series generators, and the
length-prefixed binary block framing used to embed raw bytes inside SCPI
commands and replies.

## Core Types

- [`BitDepth`] - Supported amplitude resolutions and their affine profiles
- [`ElementFormat`] - Device waveform element type (`INT` / `REAL`)
- [`DecodedWaveform`] - Samples recovered from device bytes
- [`BlockHeader`] - Parsed `#<digits><length>` block prefix

## Modules

- [`codec`] - Amplitude/marker packing and byte serialization
- [`block`] - Binary block header construction and parsing
- [`error`] - Common error types
*/

pub mod block;
pub mod codec;
pub mod error;

// Re-export commonly used types
pub use block::{build_header, frame_block, parse_header, BlockHeader};
pub use codec::{
    amplitude_to_code, amplitudes_to_codes, code_to_amplitude, codes_to_amplitudes, marker_levels,
    merge_samples, pack_to_bytes, parse_waveform_bytes, split_samples, BitDepth, DecodedWaveform,
    ElementFormat, RealSample, Sample, SplitSamples,
};
pub use error::{BlockError, CodecError, Result};

/// Packed sample word layout
pub mod protocol {
    /// Mask selecting the amplitude code (bits 0-13)
    pub const AMPLITUDE_MASK: u16 = 0x3FFF;

    /// Marker 1 flag (bit 14)
    pub const MARKER1_MASK: u16 = 0x4000;

    /// Marker 2 flag (bit 15)
    pub const MARKER2_MASK: u16 = 0x8000;

    /// Size of one packed `INT` sample in bytes
    pub const INT_SAMPLE_BYTES: usize = 2;

    /// Size of one `REAL` record: little-endian f32 followed by a marker byte
    pub const REAL_SAMPLE_BYTES: usize = 5;

    /// Bit depth used when decoding `INT` waveforms read back from the device
    pub const INT_READBACK_BIT_DEPTH: u8 = 14;
}

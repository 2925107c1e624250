/*!
Amplitude and marker packing for AWG sample words.

The generator stores `INT` waveforms as little-endian 16-bit words: the low
14 bits carry the amplitude code and bits 14/15 carry the two digital markers.
Amplitudes are bipolar floats on `[-1.0, 1.0]`, mapped onto unsigned codes by
a per-bit-depth `(multiplier, offset)` profile.
*/

use crate::error::{CodecError, Result};
use crate::protocol::{
    AMPLITUDE_MASK, INT_READBACK_BIT_DEPTH, INT_SAMPLE_BYTES, MARKER1_MASK, MARKER2_MASK,
    REAL_SAMPLE_BYTES,
};
use bytes::Buf;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Amplitude resolution supported by the generator family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitDepth {
    Bits8,
    Bits12,
    Bits14,
    Bits16,
}

impl BitDepth {
    /// Every bit depth with a conversion profile
    pub const SUPPORTED: &'static [u8] = &[8, 12, 14, 16];

    /// Bit depths whose codes leave room for the two marker bits
    pub const MARKER_CAPABLE: &'static [u8] = &[8, 14];

    /// Look up a bit depth from its width in bits
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            8 => Ok(Self::Bits8),
            12 => Ok(Self::Bits12),
            14 => Ok(Self::Bits14),
            16 => Ok(Self::Bits16),
            _ => Err(CodecError::UnsupportedBitDepth {
                bits,
                supported: Self::SUPPORTED,
            }),
        }
    }

    /// Look up a bit depth that can be merged with markers
    pub fn marker_capable(bits: u8) -> Result<Self> {
        match bits {
            8 => Ok(Self::Bits8),
            14 => Ok(Self::Bits14),
            _ => Err(CodecError::UnsupportedBitDepth {
                bits,
                supported: Self::MARKER_CAPABLE,
            }),
        }
    }

    /// Width in bits
    pub fn bits(self) -> u8 {
        match self {
            Self::Bits8 => 8,
            Self::Bits12 => 12,
            Self::Bits14 => 14,
            Self::Bits16 => 16,
        }
    }

    /// Code that `1.0` maps to
    pub fn max_code(self) -> u16 {
        match self {
            Self::Bits8 => 127,
            Self::Bits12 => 2047,
            Self::Bits14 => 8191,
            Self::Bits16 => 32767,
        }
    }

    /// `(multiplier, offset)` of the affine map `code = value * multiplier + offset`.
    ///
    /// `[-1.0, 1.0]` spans `[0, max_code]`, so a 14-bit full-scale sample
    /// leaves bit 13 clear.
    pub fn profile(self) -> (f64, f64) {
        let half = f64::from(self.max_code()) / 2.0;
        (half, half)
    }

    /// Convert one bipolar amplitude to its unsigned code
    pub fn encode(self, value: f64) -> Result<u16> {
        if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
            return Err(CodecError::AmplitudeOutOfRange(value));
        }
        let (multiplier, offset) = self.profile();
        Ok((value * multiplier + offset).round() as u16)
    }

    /// Convert one unsigned code back to its bipolar amplitude
    pub fn decode(self, code: u16) -> f64 {
        let (multiplier, offset) = self.profile();
        (f64::from(code) - offset) / multiplier
    }
}

impl TryFrom<u8> for BitDepth {
    type Error = CodecError;

    fn try_from(bits: u8) -> Result<Self> {
        Self::from_bits(bits)
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Convert a bipolar amplitude to an unsigned code at the given bit depth
pub fn amplitude_to_code(value: f64, bits: u8) -> Result<u16> {
    BitDepth::from_bits(bits)?.encode(value)
}

/// Convert a sequence of bipolar amplitudes, preserving order and length
pub fn amplitudes_to_codes(values: &[f64], bits: u8) -> Result<Vec<u16>> {
    let depth = BitDepth::from_bits(bits)?;
    values.iter().map(|&value| depth.encode(value)).collect()
}

/// Convert an unsigned code back to a bipolar amplitude
pub fn code_to_amplitude(code: u16, bits: u8) -> Result<f64> {
    Ok(BitDepth::from_bits(bits)?.decode(code))
}

/// Convert a sequence of unsigned codes back to bipolar amplitudes
pub fn codes_to_amplitudes(codes: &[u16], bits: u8) -> Result<Vec<f64>> {
    let depth = BitDepth::from_bits(bits)?;
    Ok(codes.iter().map(|&code| depth.decode(code)).collect())
}

/// Coerce numeric marker levels to flags (nonzero -> set)
pub fn marker_levels<T: Zero>(levels: &[T]) -> Vec<bool> {
    levels.iter().map(|level| !level.is_zero()).collect()
}

/// Merge amplitude and marker patterns into packed sample words.
///
/// Omitted patterns are filled with zeros of the common length. Amplitude
/// codes occupy bits 0-13, marker 1 bit 14 and marker 2 bit 15.
pub fn merge_samples(
    amplitude: Option<&[f64]>,
    marker1: Option<&[bool]>,
    marker2: Option<&[bool]>,
    bits: u8,
) -> Result<Vec<u16>> {
    let depth = BitDepth::marker_capable(bits)?;

    let len = match (amplitude, marker1, marker2) {
        (Some(a), _, _) => a.len(),
        (None, Some(m), _) | (None, None, Some(m)) => m.len(),
        (None, None, None) => return Err(CodecError::NoInputSupplied),
    };

    let mismatched = |pattern: Option<usize>| pattern.is_some_and(|n| n != len);
    let lengths = (
        amplitude.map(<[f64]>::len),
        marker1.map(<[bool]>::len),
        marker2.map(<[bool]>::len),
    );
    if mismatched(lengths.0) || mismatched(lengths.1) || mismatched(lengths.2) {
        return Err(CodecError::UnequalLengths {
            amplitude: lengths.0,
            marker1: lengths.1,
            marker2: lengths.2,
        });
    }

    let mut words = Vec::with_capacity(len);
    for i in 0..len {
        let code = match amplitude {
            Some(a) => depth.encode(a[i])?,
            None => depth.encode(0.0)?,
        };
        let mut word = code & AMPLITUDE_MASK;
        if marker1.is_some_and(|m| m[i]) {
            word |= MARKER1_MASK;
        }
        if marker2.is_some_and(|m| m[i]) {
            word |= MARKER2_MASK;
        }
        words.push(word);
    }

    Ok(words)
}

/// Amplitude codes and marker flags recovered from packed words
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitSamples {
    pub codes: Vec<u16>,
    pub marker1: Vec<bool>,
    pub marker2: Vec<bool>,
}

/// Split packed words back into amplitude codes and marker flags
pub fn split_samples(words: &[u16]) -> SplitSamples {
    SplitSamples {
        codes: words.iter().map(|w| w & AMPLITUDE_MASK).collect(),
        marker1: words.iter().map(|w| w & MARKER1_MASK != 0).collect(),
        marker2: words.iter().map(|w| w & MARKER2_MASK != 0).collect(),
    }
}

/// Serialize packed words as little-endian bytes regardless of host order
pub fn pack_to_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// Waveform element type as reported by `WLIST:WAVEFORM:TYPE?`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementFormat {
    Int,
    Real,
}

impl ElementFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "INT",
            Self::Real => "REAL",
        }
    }
}

impl FromStr for ElementFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_matches('"').to_ascii_uppercase().as_str() {
            "INT" => Ok(Self::Int),
            "REAL" => Ok(Self::Real),
            other => Err(CodecError::UnknownElementFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ElementFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One time-step of output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub amplitude: f64,
    pub marker1: bool,
    pub marker2: bool,
}

/// One record of a device `REAL` waveform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealSample {
    pub value: f32,
    /// Raw marker byte (bit 6 = marker 1, bit 7 = marker 2 on the device)
    pub markers: u8,
}

/// Samples decoded from waveform bytes read back from the device
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedWaveform {
    Int {
        amplitudes: Vec<f64>,
        marker1: Vec<bool>,
        marker2: Vec<bool>,
    },
    Real(Vec<RealSample>),
}

impl DecodedWaveform {
    /// Number of samples
    pub fn len(&self) -> usize {
        match self {
            Self::Int { amplitudes, .. } => amplitudes.len(),
            Self::Real(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> ElementFormat {
        match self {
            Self::Int { .. } => ElementFormat::Int,
            Self::Real(_) => ElementFormat::Real,
        }
    }

    /// `INT` waveforms as per-step samples; `None` for `REAL` waveforms
    pub fn samples(&self) -> Option<Vec<Sample>> {
        match self {
            Self::Int {
                amplitudes,
                marker1,
                marker2,
            } => Some(
                amplitudes
                    .iter()
                    .zip(marker1)
                    .zip(marker2)
                    .map(|((&amplitude, &marker1), &marker2)| Sample {
                        amplitude,
                        marker1,
                        marker2,
                    })
                    .collect(),
            ),
            Self::Real(_) => None,
        }
    }
}

/// Decode raw waveform bytes in the given element format
pub fn parse_waveform_bytes(bytes: &[u8], format: ElementFormat) -> Result<DecodedWaveform> {
    match format {
        ElementFormat::Int => {
            if bytes.len() % INT_SAMPLE_BYTES != 0 {
                return Err(CodecError::TruncatedRecord {
                    len: bytes.len(),
                    record_size: INT_SAMPLE_BYTES,
                });
            }
            let words: Vec<u16> = bytes
                .chunks_exact(INT_SAMPLE_BYTES)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            let split = split_samples(&words);
            Ok(DecodedWaveform::Int {
                amplitudes: codes_to_amplitudes(&split.codes, INT_READBACK_BIT_DEPTH)?,
                marker1: split.marker1,
                marker2: split.marker2,
            })
        }
        ElementFormat::Real => {
            if bytes.len() % REAL_SAMPLE_BYTES != 0 {
                return Err(CodecError::TruncatedRecord {
                    len: bytes.len(),
                    record_size: REAL_SAMPLE_BYTES,
                });
            }
            let mut buf = bytes;
            let mut records = Vec::with_capacity(bytes.len() / REAL_SAMPLE_BYTES);
            while buf.has_remaining() {
                let value = buf.get_f32_le();
                let markers = buf.get_u8();
                records.push(RealSample { value, markers });
            }
            Ok(DecodedWaveform::Real(records))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMPLITUDES: [f64; 9] = [-1.0, -0.75, -0.5, -0.1234, 0.0, 0.3333, 0.5, 0.999, 1.0];

    #[test]
    fn test_amplitude_roundtrip_within_one_step() {
        for &bits in BitDepth::SUPPORTED {
            let (multiplier, _) = BitDepth::from_bits(bits).unwrap().profile();
            for &value in &AMPLITUDES {
                let code = amplitude_to_code(value, bits).unwrap();
                let back = code_to_amplitude(code, bits).unwrap();
                assert!(
                    (back - value).abs() <= 1.0 / multiplier,
                    "{bits}-bit: {value} -> {code} -> {back}"
                );
            }
        }
    }

    #[test]
    fn test_profile_endpoints() {
        assert_eq!(amplitude_to_code(-1.0, 14).unwrap(), 0);
        assert_eq!(amplitude_to_code(0.0, 14).unwrap(), 4096);
        assert_eq!(amplitude_to_code(1.0, 14).unwrap(), 8191);
        assert_eq!(amplitude_to_code(1.0, 8).unwrap(), 127);
        assert_eq!(amplitude_to_code(1.0, 12).unwrap(), 2047);
        assert_eq!(amplitude_to_code(1.0, 16).unwrap(), 32767);
        assert_eq!(code_to_amplitude(8191, 14).unwrap(), 1.0);
        assert_eq!(code_to_amplitude(0, 14).unwrap(), -1.0);
    }

    #[test]
    fn test_sequence_conversion_preserves_shape() {
        let codes = amplitudes_to_codes(&AMPLITUDES, 12).unwrap();
        assert_eq!(codes.len(), AMPLITUDES.len());
        assert_eq!(codes[0], 0);
        assert_eq!(codes[4], 1024);
        assert_eq!(codes[8], 2047);
        assert_eq!(codes_to_amplitudes(&codes, 12).unwrap().len(), AMPLITUDES.len());
        assert!(amplitudes_to_codes(&[], 12).unwrap().is_empty());
    }

    #[test]
    fn test_unsupported_bit_depth() {
        assert!(matches!(
            amplitude_to_code(0.5, 10),
            Err(CodecError::UnsupportedBitDepth { bits: 10, .. })
        ));
        assert!(matches!(
            code_to_amplitude(5, 7),
            Err(CodecError::UnsupportedBitDepth { bits: 7, .. })
        ));
    }

    #[test]
    fn test_out_of_range_amplitude() {
        assert!(matches!(
            amplitude_to_code(1.5, 14),
            Err(CodecError::AmplitudeOutOfRange(_))
        ));
        assert!(amplitude_to_code(f64::NAN, 14).is_err());
    }

    #[test]
    fn test_merge_then_split() {
        let amplitude = [-1.0, -0.25, 0.0, 0.6, 1.0];
        let marker1 = [true, false, true, false, true];
        let marker2 = [false, false, true, true, true];

        let words = merge_samples(
            Some(&amplitude[..]),
            Some(&marker1[..]),
            Some(&marker2[..]),
            14,
        )
        .unwrap();
        let split = split_samples(&words);

        assert_eq!(split.codes, amplitudes_to_codes(&amplitude, 14).unwrap());
        assert_eq!(split.marker1, marker1);
        assert_eq!(split.marker2, marker2);
    }

    #[test]
    fn test_merge_full_scale_with_marker1() {
        let words = merge_samples(Some(&[1.0][..]), Some(&[true][..]), None, 14).unwrap();
        assert_eq!(words, vec![8191 + 16384]);
        assert_eq!(words, vec![24575]);
    }

    #[test]
    fn test_decode_full_scale_with_marker1() {
        let split = split_samples(&[24575]);
        assert_eq!(split.codes, vec![8191]);
        assert_eq!(split.marker1, vec![true]);
        assert_eq!(split.marker2, vec![false]);

        let decoded = parse_waveform_bytes(&pack_to_bytes(&[24575]), ElementFormat::Int).unwrap();
        assert_eq!(
            decoded.samples().unwrap(),
            vec![Sample {
                amplitude: 1.0,
                marker1: true,
                marker2: false
            }]
        );
    }

    #[test]
    fn test_merge_fills_missing_patterns() {
        let words = merge_samples(None, Some(&[true, false, true][..]), None, 8).unwrap();
        assert_eq!(words, vec![64 | MARKER1_MASK, 64, 64 | MARKER1_MASK]);

        let words = merge_samples(None, None, Some(&[true, false][..]), 14).unwrap();
        assert_eq!(words, vec![4096 | MARKER2_MASK, 4096]);
    }

    #[test]
    fn test_merge_errors() {
        assert_eq!(
            merge_samples(None, None, None, 14),
            Err(CodecError::NoInputSupplied)
        );
        assert!(matches!(
            merge_samples(Some(&[0.0, 0.5][..]), Some(&[true][..]), None, 14),
            Err(CodecError::UnequalLengths { .. })
        ));
        assert!(matches!(
            merge_samples(Some(&[0.0][..]), None, None, 16),
            Err(CodecError::UnsupportedBitDepth { bits: 16, .. })
        ));
    }

    #[test]
    fn test_marker_levels_coercion() {
        assert_eq!(marker_levels(&[0, 3, -1, 0]), vec![false, true, true, false]);
        assert_eq!(marker_levels(&[0.0, 0.5]), vec![false, true]);
    }

    #[test]
    fn test_pack_is_little_endian() {
        assert_eq!(pack_to_bytes(&[0x1234, 0xBEEF]), vec![0x34, 0x12, 0xEF, 0xBE]);
    }

    #[test]
    fn test_parse_real_records() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0.5f32.to_le_bytes());
        bytes.push(0x40);
        bytes.extend_from_slice(&(-1.0f32).to_le_bytes());
        bytes.push(0x00);

        let decoded = parse_waveform_bytes(&bytes, ElementFormat::Real).unwrap();
        assert_eq!(
            decoded,
            DecodedWaveform::Real(vec![
                RealSample { value: 0.5, markers: 0x40 },
                RealSample { value: -1.0, markers: 0x00 },
            ])
        );
        assert!(decoded.samples().is_none());
    }

    #[test]
    fn test_parse_truncated_records() {
        assert!(matches!(
            parse_waveform_bytes(&[0x00, 0x01, 0x02], ElementFormat::Int),
            Err(CodecError::TruncatedRecord { len: 3, record_size: 2 })
        ));
        assert!(parse_waveform_bytes(&[0; 7], ElementFormat::Real).is_err());
    }

    #[test]
    fn test_element_format_parsing() {
        assert_eq!("INT".parse::<ElementFormat>().unwrap(), ElementFormat::Int);
        assert_eq!("\"REAL\"\n".parse::<ElementFormat>().unwrap(), ElementFormat::Real);
        assert!("FLOAT".parse::<ElementFormat>().is_err());
    }
}

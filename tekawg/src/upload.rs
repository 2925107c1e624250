/*!
Chunked waveform upload and read-back.

An upload reserves the waveform name, then streams the packed sample bytes
in fixed-size blocks. Each block is written together with an error-status
query in one transaction and is resent until the device reports a zero
status.
*/

use crate::awg::TekAwg;
use crate::command::{quoted, Command};
use crate::config::TailValidation;
use crate::error::{AwgError, Result};
use crate::status::{drain_errors, DeviceError, ERROR_STATUS_QUERY};
use crate::transport::Transport;
use awg_codec::protocol::INT_SAMPLE_BYTES;
use awg_codec::{
    build_header, pack_to_bytes, parse_waveform_bytes, DecodedWaveform, ElementFormat,
};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Bytes of payload quoted in debug logs
const PAYLOAD_PREVIEW_BYTES: usize = 16;

/// Position of one block within a waveform, in samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub offset: usize,
    pub count: usize,
    /// Final block shorter than the packet size
    pub tail: bool,
}

/// Split `total_samples` into full blocks of `packet_size` plus an optional tail
pub fn plan_blocks(total_samples: usize, packet_size: usize) -> Vec<BlockSpan> {
    let packet_size = packet_size.max(1);
    let full = total_samples / packet_size;
    let mut spans: Vec<BlockSpan> = (0..full)
        .map(|i| BlockSpan {
            offset: i * packet_size,
            count: packet_size,
            tail: false,
        })
        .collect();

    let remainder = total_samples - full * packet_size;
    if remainder > 0 {
        spans.push(BlockSpan {
            offset: full * packet_size,
            count: remainder,
            tail: true,
        });
    }
    spans
}

/// Outcome of one transmitted block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockRecord {
    pub offset: usize,
    pub count: usize,
    pub attempts: usize,
    /// Whether the device confirmed the block with a zero error status
    pub acknowledged: bool,
}

/// Summary of a completed upload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReport {
    pub name: String,
    pub samples: usize,
    pub blocks: Vec<BlockRecord>,
    /// Errors already queued before the upload started
    pub errors_before: Vec<DeviceError>,
    /// Errors queued by the time the upload finished
    pub errors_after: Vec<DeviceError>,
}

/// Build a `WLIST:WAVEFORM:DATA` write for one block
fn block_command(
    name: &str,
    span: BlockSpan,
    payload: &[u8],
    acknowledge: bool,
) -> Result<Command> {
    let header = build_header(payload.len())?;
    let prefix = format!(
        "WLIST:WAVEFORM:DATA {},{},{},{}",
        quoted(name),
        span.offset,
        span.count,
        header
    );

    let mut bytes =
        Vec::with_capacity(prefix.len() + payload.len() + ERROR_STATUS_QUERY.len() + 1);
    bytes.extend_from_slice(prefix.as_bytes());
    bytes.extend_from_slice(payload);
    if acknowledge {
        bytes.push(b';');
        bytes.extend_from_slice(ERROR_STATUS_QUERY.as_bytes());
    }
    Ok(Command::from_bytes(bytes, acknowledge, 1))
}

impl<T: Transport> TekAwg<T> {
    /// Pack sample words and upload them as a new `INT` waveform
    pub fn new_waveform(&mut self, name: &str, words: &[u16]) -> Result<UploadReport> {
        self.upload_packed(name, &pack_to_bytes(words))
    }

    /// Upload already-packed little-endian sample bytes as a new `INT` waveform.
    ///
    /// An existing waveform of the same name is deleted first. Device errors
    /// queued before and after the transfer are reported, not raised.
    pub fn upload_packed(&mut self, name: &str, packed: &[u8]) -> Result<UploadReport> {
        if packed.len() % INT_SAMPLE_BYTES != 0 {
            return Err(AwgError::invalid_argument(format!(
                "packed waveform has odd length {} bytes",
                packed.len()
            )));
        }

        let timeout = self.config.upload.response_timeout();
        self.with_timeout(timeout, |awg| awg.transfer(name, packed))
    }

    fn transfer(&mut self, name: &str, packed: &[u8]) -> Result<UploadReport> {
        let samples = packed.len() / INT_SAMPLE_BYTES;
        let preview = &packed[..packed.len().min(PAYLOAD_PREVIEW_BYTES)];
        debug!(
            "Uploading {:?}: {} samples, leading bytes {}",
            name,
            samples,
            hex::encode(preview)
        );

        let errors_before = drain_errors(&mut self.session)?;
        if !errors_before.is_empty() {
            warn!(
                "{} device errors pending before upload of {:?}",
                errors_before.len(),
                name
            );
        }

        if self.waveform_exists(name)? {
            self.delete_waveform(name)?;
        }
        self.session.write(format!(
            "WLIST:WAVEFORM:NEW {},{},{}",
            quoted(name),
            samples,
            ElementFormat::Int
        ))?;

        let spans = plan_blocks(samples, self.config.upload.packet_size);
        let mut blocks = Vec::with_capacity(spans.len());
        for span in spans {
            let start = span.offset * INT_SAMPLE_BYTES;
            let payload = &packed[start..start + span.count * INT_SAMPLE_BYTES];

            let unacknowledged_tail =
                span.tail && self.config.upload.tail_validation == TailValidation::Legacy;
            let record = if unacknowledged_tail {
                self.session.send(&block_command(name, span, payload, false)?)?;
                BlockRecord {
                    offset: span.offset,
                    count: span.count,
                    attempts: 1,
                    acknowledged: false,
                }
            } else {
                self.send_acknowledged(name, span, payload)?
            };
            blocks.push(record);
        }

        let errors_after = drain_errors(&mut self.session)?;
        if !errors_after.is_empty() {
            warn!(
                "{} device errors reported after upload of {:?}",
                errors_after.len(),
                name
            );
        }

        info!(
            "✅ Uploaded waveform {:?} ({} samples, {} blocks)",
            name,
            samples,
            blocks.len()
        );
        Ok(UploadReport {
            name: name.to_string(),
            samples,
            blocks,
            errors_before,
            errors_after,
        })
    }

    /// Resend one block until the error status reads `0` or the attempt cap is hit
    fn send_acknowledged(
        &mut self,
        name: &str,
        span: BlockSpan,
        payload: &[u8],
    ) -> Result<BlockRecord> {
        let command = block_command(name, span, payload, true)?;
        let cap = self.config.upload.max_block_attempts;
        let mut attempts = 0;

        loop {
            attempts += 1;
            let status = self.session.send(&command)?.unwrap_or_default();
            if status == "0" {
                debug!(
                    "Block at offset {} acknowledged after {} attempt(s)",
                    span.offset, attempts
                );
                return Ok(BlockRecord {
                    offset: span.offset,
                    count: span.count,
                    attempts,
                    acknowledged: true,
                });
            }

            warn!(
                "Block at offset {} rejected with status {:?} (attempt {})",
                span.offset, status, attempts
            );
            if cap.is_some_and(|cap| attempts >= cap) {
                return Err(AwgError::UploadFailed {
                    name: name.to_string(),
                    offset: span.offset,
                    attempts,
                    status,
                });
            }
        }
    }

    /// Delete a waveform from the instrument's waveform list
    pub fn delete_waveform(&mut self, name: &str) -> Result<()> {
        info!("Deleting waveform {:?}", name);
        self.session.write(format!("WLIST:WAVEFORM:DELETE {}", quoted(name)))
    }

    /// Element type of a stored waveform
    pub fn waveform_type(&mut self, name: &str) -> Result<ElementFormat> {
        let command = format!("WLIST:WAVEFORM:TYPE? {}", quoted(name));
        let reply = self.session.query(command.clone())?;
        reply
            .parse::<ElementFormat>()
            .map_err(|e| AwgError::malformed(command, reply.clone(), e.to_string()))
    }

    /// Raw bytes of a stored waveform, block header removed
    pub fn waveform_bytes(&mut self, name: &str) -> Result<Vec<u8>> {
        self.session
            .query_block(format!("WLIST:WAVEFORM:DATA? {}", quoted(name)))
    }

    /// Read a stored waveform back and decode it according to its element type
    pub fn waveform_data(&mut self, name: &str) -> Result<DecodedWaveform> {
        let format = self.waveform_type(name)?;
        let bytes = self.waveform_bytes(name)?;
        Ok(parse_waveform_bytes(&bytes, format)?)
    }

    /// Run `f` with a temporarily different response timeout.
    ///
    /// The previous timeout is restored whether or not `f` succeeds; an error
    /// from `f` takes precedence over one from the restore.
    pub(crate) fn with_timeout<R>(
        &mut self,
        timeout: Duration,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        let previous = self.session.timeout();
        self.session.set_timeout(timeout)?;
        let result = f(self);
        let restored = self.session.set_timeout(previous);

        let value = result?;
        restored?;
        Ok(value)
    }
}

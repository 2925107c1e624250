/*!
# Tektronix AWG5000 Driver

Configure and load waveform data into an AWG5000-series arbitrary waveform
generator over its raw TCP SCPI socket.

## Core Types

- [`TekAwg`] - Driver handle owning the connection
- [`Session`] - Command/response transaction engine
- [`Command`] - Command bytes with their reply expectations
- [`Transport`] - Byte channel seam ([`TcpTransport`] in production)
- [`DriverConfig`] - TOML-backed driver settings

## Modules

- [`engine`] - Reply reassembly, timeout retry and binary block read-back
- [`upload`] - Chunked, acknowledged waveform upload
- [`status`] - Device error queue draining
- [`settings`] / [`sequence`] - Thin one-transaction accessors

## Usage

```no_run
use awg_codec::merge_samples;
use tekawg::TekAwg;

let mut awg = TekAwg::connect("192.168.1.50", 4001)?;
let ramp: Vec<f64> = (0..1000).map(|i| i as f64 / 500.0 - 1.0).collect();
let words = merge_samples(Some(&ramp[..]), None, None, 14)?;
let report = awg.new_waveform("ramp", &words)?;
println!("uploaded {} blocks", report.blocks.len());
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

pub mod awg;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod sequence;
pub mod settings;
pub mod status;
pub mod transport;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use awg::TekAwg;
pub use command::Command;
pub use config::{DriverConfig, TailValidation};
pub use engine::Session;
pub use error::{AwgError, Result};
pub use sequence::{Jump, JumpTarget};
pub use settings::{RunMode, RunState, ALL_CHANNELS};
pub use status::{drain_errors, DeviceError};
pub use transport::{TcpTransport, Transport};
pub use upload::{plan_blocks, BlockRecord, BlockSpan, UploadReport};

/// Version information for the driver library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

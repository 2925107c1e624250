/*!
Instrument settings accessors.

Each accessor is a single transaction through the session.
*/

use crate::awg::TekAwg;
use crate::command::{quoted, unquoted};
use crate::error::{AwgError, Result};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every output channel of a four-channel AWG5000
pub const ALL_CHANNELS: [u8; 4] = [1, 2, 3, 4];

/// Sequencer run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    Continuous,
    Triggered,
    Gated,
    Sequence,
}

impl RunMode {
    pub fn as_scpi(self) -> &'static str {
        match self {
            Self::Continuous => "CONT",
            Self::Triggered => "TRIG",
            Self::Gated => "GAT",
            Self::Sequence => "SEQ",
        }
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cont" | "continuous" => Ok(Self::Continuous),
            "trig" | "triggered" => Ok(Self::Triggered),
            "gat" | "gated" => Ok(Self::Gated),
            "seq" | "sequence" => Ok(Self::Sequence),
            other => Err(format!("unknown run mode {other:?}")),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_scpi())
    }
}

/// Output state reported by `AWGCONTROL:RSTATE?`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Stopped,
    WaitingForTrigger,
    Running,
}

fn check_channels(channels: &[u8]) -> Result<()> {
    if channels.is_empty() {
        return Err(AwgError::invalid_argument("no channels given"));
    }
    if let Some(bad) = channels.iter().find(|&&c| !ALL_CHANNELS.contains(&c)) {
        return Err(AwgError::invalid_argument(format!("no such channel {bad}")));
    }
    Ok(())
}

impl<T: Transport> TekAwg<T> {
    /// Per-channel compound query, one field per channel
    fn channel_query(
        &mut self,
        channels: &[u8],
        query: impl Fn(u8) -> String,
    ) -> Result<Vec<String>> {
        check_channels(channels)?;
        let parts: Vec<String> = channels.iter().map(|&c| query(c)).collect();
        self.session.query_fields(parts.join(";"), channels.len())
    }

    fn channel_values<V: FromStr>(
        &mut self,
        channels: &[u8],
        query: impl Fn(u8) -> String,
    ) -> Result<Vec<V>> {
        let command = query(channels.first().copied().unwrap_or(1));
        self.channel_query(channels, query)?
            .into_iter()
            .map(|field| {
                field.parse::<V>().map_err(|_| {
                    let reason = format!("cannot parse as {}", std::any::type_name::<V>());
                    AwgError::malformed(&command, &field, reason)
                })
            })
            .collect()
    }

    /// Hardware identification string (`*IDN?`)
    pub fn identity(&mut self) -> Result<String> {
        self.session.query("*IDN?")
    }

    /// Current sample rate in samples per second
    pub fn sample_rate(&mut self) -> Result<f64> {
        self.session.query_parsed("FREQ?")
    }

    pub fn set_sample_rate(&mut self, rate: f64) -> Result<()> {
        self.session.write(format!("FREQ {rate}"))
    }

    pub fn run_mode(&mut self) -> Result<RunMode> {
        let reply = self.session.query("AWGCONTROL:RMODE?")?;
        reply
            .parse()
            .map_err(|e: String| AwgError::malformed("AWGCONTROL:RMODE?", reply.clone(), e))
    }

    pub fn set_run_mode(&mut self, mode: RunMode) -> Result<()> {
        self.session.write(format!("AWGCONTROL:RMODE {mode}"))
    }

    pub fn run_state(&mut self) -> Result<RunState> {
        let reply = self.session.query("AWGCONTROL:RSTATE?")?;
        match reply.as_str() {
            "0" => Ok(RunState::Stopped),
            "1" => Ok(RunState::WaitingForTrigger),
            "2" => Ok(RunState::Running),
            _ => Err(AwgError::malformed("AWGCONTROL:RSTATE?", reply, "not a valid run state")),
        }
    }

    /// Start output
    pub fn run(&mut self) -> Result<()> {
        self.session.write("AWGCONTROL:RUN")
    }

    /// Stop output
    pub fn stop(&mut self) -> Result<()> {
        self.session.write("AWGCONTROL:STOP")
    }

    /// Amplitude in volts of each channel
    pub fn amplitudes(&mut self, channels: &[u8]) -> Result<Vec<f64>> {
        self.channel_values(channels, |c| format!(":SOURCE{c}:VOLTAGE?"))
    }

    /// Offset in volts of each channel
    pub fn offsets(&mut self, channels: &[u8]) -> Result<Vec<f64>> {
        self.channel_values(channels, |c| format!(":SOURCE{c}:VOLTAGE:OFFSET?"))
    }

    /// Whether each channel's output is enabled
    pub fn output_states(&mut self, channels: &[u8]) -> Result<Vec<bool>> {
        let states: Vec<u8> = self.channel_values(channels, |c| format!(":OUTPUT{c}?"))?;
        Ok(states.into_iter().map(|s| s != 0).collect())
    }

    /// Enable or disable outputs, one state per channel
    pub fn set_output_states(&mut self, states: &[bool], channels: &[u8]) -> Result<()> {
        check_channels(channels)?;
        if states.len() != channels.len() {
            return Err(AwgError::invalid_argument(format!(
                "{} states given for {} channels",
                states.len(),
                channels.len()
            )));
        }
        let parts: Vec<String> = channels
            .iter()
            .zip(states)
            .map(|(c, &on)| format!(":OUTPUT{}:STATE {}", c, u8::from(on)))
            .collect();
        self.session.write(parts.join(";"))
    }

    /// Waveform assigned to each channel
    pub fn channel_waveforms(&mut self, channels: &[u8]) -> Result<Vec<String>> {
        Ok(self
            .channel_query(channels, |c| format!(":SOURCE{c}:WAV?"))?
            .iter()
            .map(|n| unquoted(n))
            .collect())
    }

    /// Assign one waveform to every listed channel
    pub fn set_channel_waveform(&mut self, name: &str, channels: &[u8]) -> Result<()> {
        check_channels(channels)?;
        let parts: Vec<String> = channels
            .iter()
            .map(|c| format!(":SOURCE{}:WAV {}", c, quoted(name)))
            .collect();
        self.session.write(parts.join(";"))
    }
}

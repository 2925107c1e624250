/*!
Sequencer table accessors.
*/

use crate::awg::TekAwg;
use crate::command::{quoted, unquoted};
use crate::error::{AwgError, Result};
use crate::settings::ALL_CHANNELS;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Writing a whole sequence table can keep the instrument busy for seconds
const SEQUENCE_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Where an element jumps after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpTarget {
    Index,
    Next,
    Off,
}

impl JumpTarget {
    pub fn as_scpi(self) -> &'static str {
        match self {
            Self::Index => "IND",
            Self::Next => "NEXT",
            Self::Off => "OFF",
        }
    }
}

impl FromStr for JumpTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IND" | "INDEX" => Ok(Self::Index),
            "NEXT" => Ok(Self::Next),
            "OFF" => Ok(Self::Off),
            other => Err(format!("unknown jump target {other:?}")),
        }
    }
}

/// Jump destination of a sequence element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jump {
    /// Jump to this 1-based element index
    To(usize),
    Next,
    Off,
}

impl<T: Transport> TekAwg<T> {
    pub fn sequence_length(&mut self) -> Result<usize> {
        self.session.query_parsed("SEQ:LENGTH?")
    }

    pub fn set_sequence_length(&mut self, length: usize) -> Result<()> {
        self.session.write(format!("SEQ:LENGTH {length}"))
    }

    /// Waveform names of one 1-based sequence element, one per channel
    pub fn sequence_element(&mut self, index: usize, channels: &[u8]) -> Result<Vec<String>> {
        let parts: Vec<String> = channels
            .iter()
            .map(|c| format!(":SEQUENCE:ELEM{index}:WAV{c}?"))
            .collect();
        Ok(self
            .session
            .query_fields(parts.join(";"), channels.len())?
            .iter()
            .map(|n| unquoted(n))
            .collect())
    }

    pub fn set_sequence_element(
        &mut self,
        index: usize,
        name: &str,
        channels: &[u8],
    ) -> Result<()> {
        let parts: Vec<String> = channels
            .iter()
            .map(|c| format!(":SEQUENCE:ELEM{index}:WAV{c} {}", quoted(name)))
            .collect();
        self.session.write(parts.join(";"))
    }

    pub fn sequence_loop_count(&mut self, index: usize) -> Result<u32> {
        self.session
            .query_parsed(format!("SEQUENCE:ELEMENT{index}:LOOP:COUNT?"))
    }

    pub fn set_sequence_loop_count(&mut self, index: usize, count: u32) -> Result<()> {
        self.session
            .write(format!("SEQUENCE:ELEMENT{index}:LOOP:COUNT {count}"))
    }

    pub fn jump_target_type(&mut self, index: usize) -> Result<JumpTarget> {
        let command = format!("SEQUENCE:ELEMENT{index}:JTARGET:TYPE?");
        let reply = self.session.query(command.clone())?;
        reply
            .parse()
            .map_err(|e: String| AwgError::malformed(command, reply.clone(), e))
    }

    pub fn set_jump_target_type(&mut self, index: usize, target: JumpTarget) -> Result<()> {
        self.session.write(format!(
            "SEQUENCE:ELEMENT{index}:JTARGET:TYPE {}",
            target.as_scpi()
        ))
    }

    /// Jump destination, resolving the index only for `IND` targets
    pub fn jump(&mut self, index: usize) -> Result<Jump> {
        match self.jump_target_type(index)? {
            JumpTarget::Index => {
                let to = self
                    .session
                    .query_parsed(format!("SEQUENCE:ELEMENT{index}:JTARGET:INDEX?"))?;
                Ok(Jump::To(to))
            }
            JumpTarget::Next => Ok(Jump::Next),
            JumpTarget::Off => Ok(Jump::Off),
        }
    }

    /// Make element `index` jump to element `target`
    pub fn set_jump_index(&mut self, index: usize, target: usize) -> Result<()> {
        self.set_jump_target_type(index, JumpTarget::Index)?;
        self.session
            .write(format!("SEQUENCE:ELEMENT{index}:JTARGET:INDEX {target}"))
    }

    /// Waveform names of every sequence element, four channels each
    pub fn sequence_list(&mut self) -> Result<Vec<Vec<String>>> {
        let length = self.sequence_length()?;
        (1..=length)
            .map(|index| self.sequence_element(index, &ALL_CHANNELS))
            .collect()
    }

    /// Replace the sequence table; every element advances to the next one
    pub fn set_sequence_list(&mut self, elements: &[[&str; 4]]) -> Result<()> {
        if elements.is_empty() {
            return Err(AwgError::invalid_argument("sequence list is empty"));
        }
        self.set_sequence_length(elements.len())?;

        let mut parts = Vec::with_capacity(elements.len() * 5);
        for (i, names) in elements.iter().enumerate() {
            let index = i + 1;
            for (channel, name) in ALL_CHANNELS.iter().zip(names) {
                parts.push(format!(":SEQ:ELEM{index}:WAV{channel} {}", quoted(name)));
            }
            parts.push(format!(":SEQ:ELEM{index}:JTAR:TYPE NEXT"));
        }

        let command = parts.join(";");
        self.with_timeout(SEQUENCE_WRITE_TIMEOUT, |awg| awg.session.write(command))
    }
}

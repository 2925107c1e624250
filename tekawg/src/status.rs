/*!
Device error queue draining.

Device-reported errors are advisory: they are collected and handed back to
the caller rather than raised.
*/

use crate::engine::Session;
use crate::error::Result;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Error-status register query
pub const ERROR_STATUS_QUERY: &str = "*ESR?";

/// Next error-message query
pub const ERROR_MESSAGE_QUERY: &str = "SYSTEM:ERR?";

/// One entry of the instrument's error queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceError {
    /// Numeric SCPI error code, when the reply carried one
    pub code: Option<i32>,
    pub message: String,
}

impl DeviceError {
    /// Parse a `SYSTEM:ERR?` reply such as `-222,"Data out of range"`
    pub fn parse(reply: &str) -> Self {
        let reply = reply.trim();
        if let Some((code, message)) = reply.split_once(',') {
            if let Ok(code) = code.trim().parse::<i32>() {
                return Self {
                    code: Some(code),
                    message: message.trim().trim_matches('"').to_string(),
                };
            }
        }
        Self {
            code: None,
            message: reply.to_string(),
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{}: {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Query the error-status register
pub fn error_status<T: Transport>(session: &mut Session<T>) -> Result<u32> {
    session.query_parsed(ERROR_STATUS_QUERY)
}

/// Read error messages until the error-status register reports zero.
///
/// There is no iteration cap: the loop follows the device's own queue depth,
/// and an unresponsive device still ends it through the session's timeout.
pub fn drain_errors<T: Transport>(session: &mut Session<T>) -> Result<Vec<DeviceError>> {
    let mut errors = Vec::new();

    while error_status(session)? != 0 {
        let reply = session.query(ERROR_MESSAGE_QUERY)?;
        let error = DeviceError::parse(&reply);
        warn!("AWG reported error: {}", error);
        errors.push(error);
    }

    debug!("Error queue drained ({} entries)", errors.len());
    Ok(errors)
}

/*!
Driver handle for one AWG5000-series instrument.
*/

use crate::command::{quoted, unquoted};
use crate::config::DriverConfig;
use crate::engine::Session;
use crate::error::{AwgError, Result};
use crate::status::{drain_errors, DeviceError};
use crate::transport::{TcpTransport, Transport};
use awg_codec::ElementFormat;
use tracing::info;

/// Connected AWG driver.
///
/// Owns its connection exclusively; callers sharing one instrument must
/// serialize access through a single owner, since replies carry no request
/// identifiers.
pub struct TekAwg<T: Transport = TcpTransport> {
    pub(crate) session: Session<T>,
    pub(crate) config: DriverConfig,
}

impl TekAwg<TcpTransport> {
    /// Connect with default settings
    pub fn connect(address: &str, port: u16) -> Result<Self> {
        let mut config = DriverConfig::new();
        config.connection.address = address.to_string();
        config.connection.port = port;
        Self::connect_with_config(config)
    }

    /// Connect using the address and policies in `config`
    pub fn connect_with_config(config: DriverConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| AwgError::invalid_argument(e.to_string()))?;

        let transport = TcpTransport::connect(
            &config.connection.address,
            config.connection.port,
            config.connection.connect_timeout(),
            config.connection.response_timeout(),
        )?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> TekAwg<T> {
    /// Wrap an already-open transport
    pub fn with_transport(transport: T, config: DriverConfig) -> Self {
        let session = Session::new(transport, config.connection.retry_depth)
            .with_bulk_read(config.bulk_read.clone());
        info!(
            "AWG driver ready (retry depth {}, packet size {} samples)",
            session.retry_depth(),
            config.upload.packet_size
        );
        Self { session, config }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Transaction engine for commands without a dedicated accessor
    pub fn session(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    pub fn transport(&self) -> &T {
        self.session.transport()
    }

    /// Close the driver and hand back the transport
    pub fn into_transport(self) -> T {
        self.session.into_transport()
    }

    /// Drain and return the device error queue
    pub fn error_queue(&mut self) -> Result<Vec<DeviceError>> {
        drain_errors(&mut self.session)
    }

    /// Names of all waveforms in the instrument's waveform list
    pub fn waveform_list(&mut self) -> Result<Vec<String>> {
        let count: usize = self.session.query_parsed("WLIST:SIZE?")?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let parts: Vec<String> = (0..count).map(|i| format!("NAME? {i}")).collect();
        let names = self
            .session
            .query_fields(format!("WLIST:{}", parts.join(";")), count)?;
        Ok(names.iter().map(|n| unquoted(n)).collect())
    }

    /// Whether a waveform with this name exists on the instrument
    pub fn waveform_exists(&mut self, name: &str) -> Result<bool> {
        let name = unquoted(name);
        Ok(self.waveform_list()?.iter().any(|n| *n == name))
    }

    /// One compound `WLIST:WAVEFORM:<query> "<name>"` per waveform
    fn waveform_attribute(&mut self, query: &str, names: &[&str]) -> Result<Vec<String>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let parts: Vec<String> = names
            .iter()
            .map(|name| format!("{} {}", query, quoted(name)))
            .collect();
        self.session
            .query_fields(format!("WLIST:WAVEFORM:{}", parts.join(";")), names.len())
    }

    /// Sample counts of the named waveforms
    pub fn waveform_lengths(&mut self, names: &[&str]) -> Result<Vec<usize>> {
        let command = format!("WLIST:WAVEFORM:LENGTH? ({} waveforms)", names.len());
        self.waveform_attribute("LENGTH?", names)?
            .into_iter()
            .map(|field| {
                field
                    .parse::<usize>()
                    .map_err(|_| AwgError::malformed(&command, &field, "invalid waveform length"))
            })
            .collect()
    }

    /// Element types of the named waveforms
    pub fn waveform_types(&mut self, names: &[&str]) -> Result<Vec<ElementFormat>> {
        let command = format!("WLIST:WAVEFORM:TYPE? ({} waveforms)", names.len());
        self.waveform_attribute("TYPE?", names)?
            .into_iter()
            .map(|field| {
                field
                    .parse::<ElementFormat>()
                    .map_err(|e| AwgError::malformed(&command, &field, e.to_string()))
            })
            .collect()
    }

    /// Creation or last-edit timestamps of the named waveforms
    pub fn waveform_timestamps(&mut self, names: &[&str]) -> Result<Vec<String>> {
        Ok(self
            .waveform_attribute("TSTAMP?", names)?
            .iter()
            .map(|t| unquoted(t))
            .collect())
    }
}

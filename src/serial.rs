//! Serial connection parameters and the seam used to open a port.
//!
//! The ingestion loop only needs a blocking byte reader whose reads give up
//! after the configured timeout. [`Connector`] produces one from a
//! [`ConnectionConfig`]; [`SerialPortConnector`] is the real implementation
//! backed by the `serialport` crate.

use std::fmt;
use std::io::Read;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConnectionError;

/// Baud rates offered by the UI.
pub const BAUD_RATES: [u32; 8] = [9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl Parity {
    pub const ALL: [Parity; 3] = [Parity::None, Parity::Even, Parity::Odd];
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parity::None => write!(f, "None"),
            Parity::Even => write!(f, "Even"),
            Parity::Odd => write!(f, "Odd"),
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(p: Parity) -> Self {
        match p {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        }
    }
}

/// Character size; serialized as the plain number 5-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl DataBits {
    pub const ALL: [DataBits; 4] = [DataBits::Five, DataBits::Six, DataBits::Seven, DataBits::Eight];
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(format!("data bits must be 5-8, got {other}")),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl fmt::Display for DataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl StopBits {
    pub const ALL: [StopBits; 3] = [StopBits::One, StopBits::OnePointFive, StopBits::Two];
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopBits::One => write!(f, "1"),
            StopBits::OnePointFive => write!(f, "1.5"),
            StopBits::Two => write!(f, "2"),
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    /// `serialport` has no 1.5 setting; UARTs that support it only do so at
    /// five data bits, where it is usually treated as two.
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::OnePointFive | StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Parameters for one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Device path or name, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    pub baud_rate: u32,
    pub parity: Parity,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 115_200,
            parity: Parity::None,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
        }
    }
}

impl ConnectionConfig {
    pub fn new<S: Into<String>>(port: S, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Check the parameters before touching any device.
    pub fn validate(&self) -> Result<(), ConnectionError> {
        if self.port.trim().is_empty() {
            return Err(ConnectionError::InvalidConfig("no serial port selected".into()));
        }
        if self.baud_rate == 0 {
            return Err(ConnectionError::InvalidConfig("baud rate must be positive".into()));
        }
        Ok(())
    }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        };
        write!(
            f,
            "{} @ {} {}{}{}",
            self.port, self.baud_rate, self.data_bits, parity, self.stop_bits
        )
    }
}

/// Blocking reader over an open connection. Dropping it closes the port.
///
/// Reads must return `ErrorKind::TimedOut` (or `WouldBlock`) when nothing
/// arrives within the read timeout, and `Ok(0)` or a connection-level error
/// once the link is gone for good.
pub type SerialLink = Box<dyn Read + Send>;

/// Opens links and lists ports.
pub trait Connector: Send + Sync {
    fn open(
        &self,
        config: &ConnectionConfig,
        read_timeout: Duration,
    ) -> Result<SerialLink, ConnectionError>;

    fn available_ports(&self) -> Result<Vec<String>, ConnectionError>;
}

/// [`Connector`] for real serial devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortConnector;

impl Connector for SerialPortConnector {
    fn open(
        &self,
        config: &ConnectionConfig,
        read_timeout: Duration,
    ) -> Result<SerialLink, ConnectionError> {
        config.validate()?;
        if config.stop_bits == StopBits::OnePointFive {
            tracing::warn!(port = %config.port, "1.5 stop bits unsupported, opening with 2");
        }
        let port = serialport::new(config.port.as_str(), config.baud_rate)
            .timeout(read_timeout)
            .data_bits(config.data_bits.into())
            .parity(config.parity.into())
            .stop_bits(config.stop_bits.into())
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|source| ConnectionError::Open {
                port: config.port.clone(),
                source,
            })?;
        Ok(Box::new(port))
    }

    fn available_ports(&self) -> Result<Vec<String>, ConnectionError> {
        let mut names: Vec<String> = serialport::available_ports()
            .map_err(ConnectionError::Enumerate)?
            .into_iter()
            .map(|p| p.port_name)
            .collect();
        names.sort();
        Ok(names)
    }
}

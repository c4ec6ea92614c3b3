//! Driver configuration file.
//!
//! ```ini
//! [serial]
//! device_name=/dev/ttyACM0
//! baud_rate=115200
//! flow_control=none
//! parity=none
//! stop_bits=1
//! ```

use std::{path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::connection::{FlowControl, Parity, PortSettings, StopBits};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Could not parse configuration: {0}")]
    Parse(#[from] serde_ini::de::Error),

    #[error("The device name provided was invalid")]
    EmptyDeviceName,

    #[error("The baud_rate provided was invalid")]
    InvalidBaudRate,

    #[error("The flow_control parameter must be one of: none, software, or hardware.")]
    InvalidFlowControl,

    #[error("The parity parameter must be one of: none, odd, or even.")]
    InvalidParity,

    #[error("The stop_bits parameter must be one of: 1, 1.5, or 2.")]
    InvalidStopBits,

    #[error("1.5 stop bits are not supported by the serial driver")]
    UnsupportedStopBits,
}

impl FromStr for FlowControl {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "hardware" => Ok(Self::Hardware),
            "software" => Ok(Self::Software),
            _ => Err(ConfigError::InvalidFlowControl),
        }
    }
}

impl FromStr for Parity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "odd" => Ok(Self::Odd),
            "even" => Ok(Self::Even),
            _ => Err(ConfigError::InvalidParity),
        }
    }
}

impl FromStr for StopBits {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "1.0" => Ok(Self::One),
            "1.5" => Ok(Self::OnePointFive),
            "2" | "2.0" => Ok(Self::Two),
            _ => Err(ConfigError::InvalidStopBits),
        }
    }
}

/// The `[serial]` section as written in the file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SerialSection {
    pub device_name: String,
    pub baud_rate: u32,
    pub flow_control: String,
    pub parity: String,
    pub stop_bits: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DriverIniConfig {
    pub serial: SerialSection,
}

/// Validated configuration, ready to open a session with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    pub device_name: String,
    pub settings: PortSettings,
}

impl TryFrom<SerialSection> for DriverConfig {
    type Error = ConfigError;

    fn try_from(section: SerialSection) -> Result<Self, Self::Error> {
        if section.device_name.trim().is_empty() {
            return Err(ConfigError::EmptyDeviceName);
        }
        if section.baud_rate == 0 {
            return Err(ConfigError::InvalidBaudRate);
        }

        Ok(Self {
            device_name: section.device_name,
            settings: PortSettings {
                baud_rate: section.baud_rate,
                flow_control: section.flow_control.trim().parse()?,
                parity: section.parity.trim().parse()?,
                stop_bits: section.stop_bits.trim().parse()?,
            },
        })
    }
}

impl DriverConfig {
    /// Parses and validates an INI document.
    pub fn from_ini(text: &str) -> Result<Self, ConfigError> {
        let ini: DriverIniConfig = serde_ini::from_str(text)?;
        ini.serial.try_into()
    }

    /// Reads and validates an INI file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_ini(&std::fs::read_to_string(path)?)
    }
}

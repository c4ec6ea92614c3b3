//! The byte channel a link session runs over.

use std::{future::Future, io, sync::Arc};

use crate::session::LinkError;

#[cfg(test)]
pub(crate) mod mock;
#[cfg(feature = "serial")]
pub mod serial;

/// Default baud rate of the gimbal controller's USB CDC port.
pub const DEFAULT_BAUD_RATE: u32 = 115200;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum FlowControl {
    #[default]
    None,
    Hardware,
    Software,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

/// Line settings applied every time the port is (re)opened.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PortSettings {
    pub baud_rate: u32,
    pub flow_control: FlowControl,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            flow_control: FlowControl::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
        }
    }
}

/// A serial-like byte channel that can be closed and reopened in place.
///
/// Methods take `&self` because the receive task and the send path use the channel at the
/// same time. Implementations must keep concurrent `send` calls from interleaving and must
/// make a pending `receive` fail promptly once `close` is called.
pub trait Transport: Send + Sync + 'static {
    /// Opens `device` with `settings`.
    fn open(
        &self,
        device: &str,
        settings: &PortSettings,
    ) -> impl Future<Output = Result<(), LinkError>> + Send;

    /// Closes the channel. Pending reads fail.
    fn close(&self) -> impl Future<Output = io::Result<()>> + Send;

    fn is_open(&self) -> bool;

    /// Fills `buf` completely, waiting as long as it takes.
    fn receive(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Writes all of `bytes` in one call.
    fn send(&self, bytes: &[u8]) -> impl Future<Output = io::Result<()>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn open(
        &self,
        device: &str,
        settings: &PortSettings,
    ) -> impl Future<Output = Result<(), LinkError>> + Send {
        T::open(self, device, settings)
    }

    fn close(&self) -> impl Future<Output = io::Result<()>> + Send {
        T::close(self)
    }

    fn is_open(&self) -> bool {
        T::is_open(self)
    }

    fn receive(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<()>> + Send {
        T::receive(self, buf)
    }

    fn send(&self, bytes: &[u8]) -> impl Future<Output = io::Result<()>> + Send {
        T::send(self, bytes)
    }
}

pub(crate) fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "serial port is closed")
}

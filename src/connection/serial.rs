//! [`Transport`] over an OS serial port, backed by `tokio-serial`.

use std::{
    io,
    sync::atomic::{AtomicBool, Ordering},
};

use log::{debug, trace};
use serialport::{SerialPortInfo, SerialPortType};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf},
    select,
    sync::{Mutex, Notify},
};
use tokio_serial::SerialStream;

use super::{not_connected, FlowControl, Parity, PortSettings, StopBits, Transport};
use crate::{config::ConfigError, session::LinkError};

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(value: FlowControl) -> Self {
        match value {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
            FlowControl::Software => tokio_serial::FlowControl::Software,
        }
    }
}

impl From<Parity> for tokio_serial::Parity {
    fn from(value: Parity) -> Self {
        match value {
            Parity::None => tokio_serial::Parity::None,
            Parity::Odd => tokio_serial::Parity::Odd,
            Parity::Even => tokio_serial::Parity::Even,
        }
    }
}

impl TryFrom<StopBits> for tokio_serial::StopBits {
    type Error = ConfigError;

    fn try_from(value: StopBits) -> Result<Self, Self::Error> {
        match value {
            StopBits::One => Ok(tokio_serial::StopBits::One),
            StopBits::Two => Ok(tokio_serial::StopBits::Two),
            StopBits::OnePointFive => Err(ConfigError::UnsupportedStopBits),
        }
    }
}

/// Lists the serial ports on this machine, USB ports first.
pub fn available_ports() -> Result<Vec<SerialPortInfo>, LinkError> {
    let mut ports = serialport::available_ports().map_err(io::Error::from)?;
    ports.sort_by_key(|port| !matches!(port.port_type, SerialPortType::UsbPort(_)));
    Ok(ports)
}

/// An OS serial port that can be reopened in place.
///
/// The stream is split so that a blocked read never holds up a write. Each half has its
/// own lock; writes are serialized by the write lock.
#[derive(Debug, Default)]
pub struct SerialTransport {
    reader: Mutex<Option<ReadHalf<SerialStream>>>,
    writer: Mutex<Option<WriteHalf<SerialStream>>>,
    open: AtomicBool,
    closed: Notify,
}

impl SerialTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn attach(&self, stream: SerialStream) {
        let (reader, writer) = tokio::io::split(stream);
        *self.reader.lock().await = Some(reader);
        *self.writer.lock().await = Some(writer);
        self.open.store(true, Ordering::Release);
    }
}

impl Transport for SerialTransport {
    async fn open(&self, device: &str, settings: &PortSettings) -> Result<(), LinkError> {
        let builder = tokio_serial::new(device, settings.baud_rate)
            .flow_control(settings.flow_control.into())
            .parity(settings.parity.into())
            .stop_bits(settings.stop_bits.try_into()?)
            .data_bits(tokio_serial::DataBits::Eight);

        let stream = SerialStream::open(&builder).map_err(|e| LinkError::PortOpen {
            port: device.to_string(),
            source: e.into(),
        })?;
        debug!("Opened serial port {device} at {} baud", settings.baud_rate);
        self.attach(stream).await;

        Ok(())
    }

    async fn close(&self) -> io::Result<()> {
        self.open.store(false, Ordering::Release);
        // Kick a blocked reader off the read lock before taking it.
        self.closed.notify_waiters();

        let reader = self.reader.lock().await.take();
        let writer = self.writer.lock().await.take();
        drop(reader);

        if let Some(mut writer) = writer {
            writer.shutdown().await?;
        }
        debug!("Closed serial port");

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn receive(&self, buf: &mut [u8]) -> io::Result<()> {
        let closed = self.closed.notified();
        // `close` may have signalled before `closed` existed.
        if !self.is_open() {
            return Err(not_connected());
        }

        let mut reader = self.reader.lock().await;
        let reader = reader.as_mut().ok_or_else(not_connected)?;

        let result = select! {
            result = reader.read_exact(buf) => result.map(|_| ()),
            _ = closed => Err(not_connected()),
        };
        result?;

        trace!("received bytes: {:x?}", buf);
        Ok(())
    }

    async fn send(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or_else(not_connected)?;

        trace!("sent bytes: {:x?}", bytes);
        writer.write_all(bytes).await?;
        writer.flush().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn one_and_a_half_stop_bits_are_rejected() {
        assert!(matches!(
            tokio_serial::StopBits::try_from(StopBits::OnePointFive),
            Err(ConfigError::UnsupportedStopBits)
        ));
        assert_eq!(
            tokio_serial::StopBits::try_from(StopBits::Two).unwrap(),
            tokio_serial::StopBits::Two
        );
    }

    #[tokio::test]
    async fn closed_transport_refuses_io() {
        let transport = SerialTransport::new();
        assert!(!transport.is_open());

        let err = transport.send(&[0x5A]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);

        let mut buf = [0u8; 1];
        let err = transport.receive(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn receive_after_close_signal_fails_fast() {
        let (port, _peer) = SerialStream::pair().unwrap();
        let transport = SerialTransport::new();
        transport.attach(port).await;
        assert!(transport.is_open());

        // `close` has flagged the port and woken readers but not yet taken the halves.
        transport.open.store(false, Ordering::Release);
        transport.closed.notify_waiters();

        let mut buf = [0u8; 1];
        let result =
            tokio::time::timeout(Duration::from_secs(1), transport.receive(&mut buf)).await;
        let err = result.expect("receive blocked on a closing port").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);

        transport.close().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn close_wakes_blocked_reader() {
        let (port, _peer) = SerialStream::pair().unwrap();
        let transport = std::sync::Arc::new(SerialTransport::new());
        transport.attach(port).await;

        let reader = {
            let transport = std::sync::Arc::clone(&transport);
            tokio::spawn(async move {
                let mut buf = [0u8; 1];
                transport.receive(&mut buf).await
            })
        };
        tokio::task::yield_now().await;

        tokio::time::timeout(Duration::from_secs(1), transport.close())
            .await
            .expect("close waited on the reader")
            .unwrap();
        let err = reader.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn missing_device_fails_to_open() {
        let transport = SerialTransport::new();
        let result = transport
            .open("/dev/does-not-exist-rm-serial", &PortSettings::default())
            .await;

        assert!(matches!(result, Err(LinkError::PortOpen { .. })));
        assert!(!transport.is_open());
    }
}

//! Link session: owns the transport, runs the receive task and serves the send path.
//!
//! ```text
//! Closed -> Opening -> Open -> Reopening -> Open
//!                         ^        |
//!                         +--------+ (retry every second)
//! ```
//!
//! Startup failures are returned from [`LinkSession::open`] and are fatal. Every later I/O
//! failure on either path goes through the reconnection policy and never ends the session.

use std::{
    io,
    sync::{
        atomic::{AtomicI32, AtomicU64, AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};

use log::{error, info, warn};
use thiserror::Error;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::sleep,
};
use tokio_stream::{Stream, StreamExt};

use crate::{
    config::ConfigError,
    connection::{PortSettings, Transport},
    packets::{FrameError, SendPacket},
    telemetry::{enemy_color, ColorAuthority, ColorError, TargetCommand, TelemetrySink},
};

mod receive;
mod reconnect;

pub use reconnect::REOPEN_INTERVAL;

/// Present color before anyone has told us which side we are on.
const UNKNOWN_COLOR: i32 = -1;

/// How long to wait between polls of a color authority that is not ready yet.
pub const AUTHORITY_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Invalid port configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Error creating serial port: {port} - {source}")]
    PortOpen {
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("IO Error: {0}")]
    IoError(#[from] io::Error),

    #[error("Error while sending data: {0}")]
    SendFailed(#[source] io::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Color(#[from] ColorError),

    #[error("Link session is shutting down")]
    Shutdown,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum LinkState {
    Closed,
    Opening,
    Open,
    Reopening,
}

impl LinkState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Opening,
            2 => Self::Open,
            3 => Self::Reopening,
            _ => Self::Closed,
        }
    }
}

/// State shared by the receive task and the send path.
pub(crate) struct Shared<T> {
    transport: T,
    device: String,
    settings: PortSettings,
    sink: Arc<dyn TelemetrySink>,
    authority: Arc<dyn ColorAuthority>,
    state: AtomicU8,
    present_color: AtomicI32,
    /// Bumped on every successful (re)open.
    generation: AtomicU64,
    reconnect_lock: Mutex<()>,
    /// Held for the duration of one frame write.
    send_lock: Mutex<()>,
    shutdown: watch::Receiver<bool>,
}

impl<T: Transport> Shared<T> {
    fn state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: LinkState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn present_color(&self) -> Option<u8> {
        u8::try_from(self.present_color.load(Ordering::Acquire)).ok()
    }

    fn set_present_color(&self, color: u8) {
        self.present_color.store(i32::from(color), Ordering::Release);
    }

    fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Asks the color authority to retarget the detector for `robot_color`.
    ///
    /// One attempt per call. A failure leaves the present color untouched. Returns early
    /// once shutdown is signalled, whatever the authority is doing.
    async fn request_color_change(&self, robot_color: u8) {
        let mut shutdown = self.shutdown.clone();
        if self.is_shutting_down() {
            return;
        }

        if !self.authority.is_ready() {
            error!("remote parameter server is not ready");
            tokio::select! {
                biased;
                _ = shutdown.changed() => {}
                _ = sleep(AUTHORITY_POLL_INTERVAL) => {}
            }
            return;
        }

        let result = tokio::select! {
            biased;
            _ = shutdown.changed() => return,
            result = self.authority.set_detect_color(enemy_color(robot_color)) => result,
        };
        match result {
            Ok(true) => {
                self.set_present_color(robot_color);
                info!("Successfully set color: {robot_color}");
            }
            Ok(false) => error!("Failed to set color"),
            Err(e) => error!("Failed to set color: {e}"),
        }
    }

    async fn send(&self, command: &TargetCommand) -> Result<(), LinkError> {
        let frame = SendPacket::from_command(command, self.present_color()).to_frame()?;

        let generation = self.generation();
        let sent = {
            let _guard = self.send_lock.lock().await;
            self.transport.send(&frame).await
        };
        if let Err(e) = sent {
            error!("Error while sending data: {e}");
            if let Err(reconnect_err) = self.reconnect(generation).await {
                warn!("Giving up on the link: {reconnect_err}");
            }
            return Err(LinkError::SendFailed(e));
        }

        self.sink.publish_latency(command.stamp.elapsed());
        Ok(())
    }
}

/// An open link to the gimbal controller.
///
/// Dropping the session signals the receive task to stop; call [`LinkSession::shutdown`]
/// to also wait for it and close the port.
pub struct LinkSession<T: Transport> {
    shared: Arc<Shared<T>>,
    receiver: Option<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl<T: Transport> LinkSession<T> {
    /// Opens `device` and starts the receive task.
    ///
    /// Must be called from within a tokio runtime. No retry happens here: an error means
    /// the driver cannot start.
    pub async fn open(
        transport: T,
        device: impl Into<String>,
        settings: PortSettings,
        sink: Arc<dyn TelemetrySink>,
        authority: Arc<dyn ColorAuthority>,
    ) -> Result<Self, LinkError> {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            transport,
            device: device.into(),
            settings,
            sink,
            authority,
            state: AtomicU8::new(LinkState::Closed as u8),
            present_color: AtomicI32::new(UNKNOWN_COLOR),
            generation: AtomicU64::new(0),
            reconnect_lock: Mutex::new(()),
            send_lock: Mutex::new(()),
            shutdown: shutdown_rx,
        });

        shared.set_state(LinkState::Opening);
        if !shared.transport.is_open() {
            if let Err(e) = shared.transport.open(&shared.device, &shared.settings).await {
                error!("Failed to open {}: {e}", shared.device);
                shared.set_state(LinkState::Closed);
                return Err(e);
            }
        }
        shared.generation.fetch_add(1, Ordering::AcqRel);
        shared.set_state(LinkState::Open);
        info!("Opened serial port {}", shared.device);

        let receiver = tokio::spawn(receive::receive_loop(Arc::clone(&shared)));

        Ok(Self {
            shared,
            receiver: Some(receiver),
            shutdown,
        })
    }

    pub fn state(&self) -> LinkState {
        self.shared.state()
    }

    pub fn device(&self) -> &str {
        &self.shared.device
    }

    /// The side the robot is believed to play, `None` until known.
    pub fn present_color(&self) -> Option<u8> {
        self.shared.present_color()
    }

    /// Records a color confirmed by the color authority.
    pub fn set_present_color(&self, color: u8) {
        self.shared.set_present_color(color);
    }

    /// Waits for the color authority and adopts the robot color matching its detect color.
    ///
    /// Polls every [`AUTHORITY_POLL_INTERVAL`] until the authority is ready.
    pub async fn sync_present_color(&self) -> Result<u8, LinkError> {
        let mut shutdown = self.shared.shutdown.clone();

        info!("Try to get remote param");
        while !self.shared.authority.is_ready() {
            if self.shared.is_shutting_down() {
                return Err(LinkError::Shutdown);
            }
            tokio::select! {
                _ = sleep(AUTHORITY_POLL_INTERVAL) => {}
                _ = shutdown.changed() => return Err(LinkError::Shutdown),
            }
        }

        match self.shared.authority.detect_color().await {
            Ok(detect_color) => {
                let robot_color = enemy_color(detect_color);
                self.shared.set_present_color(robot_color);
                info!("Present color: {robot_color}.");
                Ok(robot_color)
            }
            Err(e) => {
                error!("Failed to get remote param: {e}");
                Err(e.into())
            }
        }
    }

    /// Encodes `command` and writes it as one frame.
    ///
    /// On an I/O error the link is reopened before this returns
    /// [`LinkError::SendFailed`]. The command is not resent.
    pub async fn send(&self, command: &TargetCommand) -> Result<(), LinkError> {
        self.shared.send(command).await
    }

    /// Sends every command from `commands` until the stream ends or the session shuts down.
    ///
    /// Failed sends are logged and skipped.
    pub async fn forward_commands<S>(&self, commands: S)
    where
        S: Stream<Item = TargetCommand>,
    {
        tokio::pin!(commands);
        while let Some(command) = commands.next().await {
            match self.send(&command).await {
                Ok(()) => {}
                Err(LinkError::SendFailed(_)) if !self.shared.is_shutting_down() => {}
                Err(e) => {
                    warn!("Stopping command forwarding: {e}");
                    break;
                }
            }
            if self.shared.is_shutting_down() {
                break;
            }
        }
    }

    /// Stops the receive task, waits for it, then closes the port.
    pub async fn shutdown(&mut self) -> Result<(), LinkError> {
        _ = self.shutdown.send(true);

        if let Some(receiver) = self.receiver.take() {
            if let Err(e) = receiver.await {
                error!("Receive task ended abnormally: {e}");
            }
        }

        // Wait out any reconnection still running on the send path.
        let _guard = self.shared.reconnect_lock.lock().await;
        if self.shared.transport.is_open() {
            self.shared.transport.close().await?;
        }
        self.shared.set_state(LinkState::Closed);
        info!("Closed serial port {}", self.shared.device);

        Ok(())
    }
}

impl<T: Transport> Drop for LinkSession<T> {
    fn drop(&mut self) {
        _ = self.shutdown.send(true);
    }
}

//! Types exchanged with the rest of the host process.
//!
//! Decoded gimbal state goes out through a [`TelemetrySink`], tracker commands come in as
//! [`TargetCommand`]s and color changes are negotiated with a [`ColorAuthority`].

use std::{
    sync::atomic::{AtomicU8, Ordering},
    time::{Duration, Instant, SystemTime},
};

use futures::{
    future::{self, BoxFuture},
    FutureExt,
};
use log::warn;
use thiserror::Error;
use tokio::sync::mpsc;

/// Joint names of the published gimbal state, in position order.
pub const JOINT_NAMES: [&str; 2] = ["pitch_joint", "yaw_joint"];

/// One decoded controller frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GimbalState {
    /// Wall-clock time the frame was accepted.
    pub stamp: SystemTime,
    /// Radians.
    pub pitch: f32,
    /// Radians.
    pub yaw: f32,
    /// Color the controller reports the robot is playing.
    pub robot_color: u8,
}

impl GimbalState {
    /// Joint positions matching [`JOINT_NAMES`].
    pub fn positions(&self) -> [f64; 2] {
        [f64::from(self.pitch), f64::from(self.yaw)]
    }
}

/// Everything a session publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum Telemetry {
    Gimbal(GimbalState),
    /// Time between a command being produced and its frame being written.
    Latency(Duration),
}

/// Receives telemetry from a link session.
///
/// Called from the receive task and the send path, so implementations must not block.
pub trait TelemetrySink: Send + Sync + 'static {
    fn publish_gimbal(&self, state: GimbalState);

    fn publish_latency(&self, _latency: Duration) {}
}

impl TelemetrySink for mpsc::UnboundedSender<Telemetry> {
    fn publish_gimbal(&self, state: GimbalState) {
        if self.send(Telemetry::Gimbal(state)).is_err() {
            warn!("Telemetry receiver dropped, discarding gimbal state");
        }
    }

    fn publish_latency(&self, latency: Duration) {
        // Latency is advisory, nobody listening is fine.
        _ = self.send(Telemetry::Latency(latency));
    }
}

/// Tracker output to be forwarded to the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetCommand {
    /// When the tracker produced this command.
    pub stamp: Instant,
    pub target_found: bool,
    /// Meters.
    pub position: [f32; 3],
    /// Meters per second.
    pub velocity: [f32; 3],
}

impl TargetCommand {
    pub fn new(target_found: bool, position: [f32; 3], velocity: [f32; 3]) -> Self {
        Self {
            stamp: Instant::now(),
            target_found,
            position,
            velocity,
        }
    }
}

impl Default for TargetCommand {
    fn default() -> Self {
        Self::new(false, [0.0; 3], [0.0; 3])
    }
}

#[derive(Error, Debug)]
pub enum ColorError {
    #[error("Color authority rejected the request: {0}")]
    Rejected(String),

    #[error("Color authority request failed: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// External owner of the detector's target color.
///
/// The detector aims at the *enemy*, so its detect color is the opposite of the robot color.
pub trait ColorAuthority: Send + Sync + 'static {
    /// Whether requests can currently be served.
    fn is_ready(&self) -> bool;

    /// Reads the detector's current target color.
    fn detect_color(&self) -> BoxFuture<'_, Result<u8, ColorError>>;

    /// Asks the detector to target `color`. Resolves to whether the change was applied.
    fn set_detect_color(&self, color: u8) -> BoxFuture<'_, Result<bool, ColorError>>;
}

/// In-process color authority for running without an external detector.
#[derive(Debug, Default)]
pub struct LocalColorAuthority {
    detect_color: AtomicU8,
}

impl LocalColorAuthority {
    pub fn new(detect_color: u8) -> Self {
        Self {
            detect_color: AtomicU8::new(detect_color),
        }
    }
}

impl ColorAuthority for LocalColorAuthority {
    fn is_ready(&self) -> bool {
        true
    }

    fn detect_color(&self) -> BoxFuture<'_, Result<u8, ColorError>> {
        future::ready(Ok(self.detect_color.load(Ordering::Acquire))).boxed()
    }

    fn set_detect_color(&self, color: u8) -> BoxFuture<'_, Result<bool, ColorError>> {
        if color > 1 {
            return future::ready(Err(ColorError::Rejected(format!(
                "unknown color {color}"
            ))))
            .boxed();
        }
        self.detect_color.store(color, Ordering::Release);
        future::ready(Ok(true)).boxed()
    }
}

/// Detect color the detector should use while the robot plays `robot_color`.
pub fn enemy_color(robot_color: u8) -> u8 {
    if robot_color == 0 {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enemy_is_opposite() {
        assert_eq!(enemy_color(0), 1);
        assert_eq!(enemy_color(1), 0);
    }

    #[tokio::test]
    async fn local_authority_stores_color() {
        let authority = LocalColorAuthority::new(0);
        assert!(authority.is_ready());
        assert_eq!(authority.detect_color().await.unwrap(), 0);

        assert!(authority.set_detect_color(1).await.unwrap());
        assert_eq!(authority.detect_color().await.unwrap(), 1);
        assert!(matches!(
            authority.set_detect_color(7).await,
            Err(ColorError::Rejected(_))
        ));
    }

    #[test]
    fn channel_sink_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Telemetry>();
        let state = GimbalState {
            stamp: SystemTime::UNIX_EPOCH,
            pitch: 0.5,
            yaw: -0.25,
            robot_color: 1,
        };

        tx.publish_gimbal(state);
        tx.publish_latency(Duration::from_millis(3));

        assert_eq!(rx.try_recv().unwrap(), Telemetry::Gimbal(state));
        assert_eq!(
            rx.try_recv().unwrap(),
            Telemetry::Latency(Duration::from_millis(3))
        );
        assert_eq!(state.positions(), [0.5, -0.25]);
    }

    #[test]
    fn closed_channel_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel::<Telemetry>();
        drop(rx);
        tx.publish_latency(Duration::ZERO);
        tx.publish_gimbal(GimbalState {
            stamp: SystemTime::now(),
            pitch: 0.0,
            yaw: 0.0,
            robot_color: 0,
        });
    }
}

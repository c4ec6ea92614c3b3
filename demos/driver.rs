//! Runs the driver against a real port and logs what the controller reports.
//!
//! Usage: `cargo run --example driver -- rm_serial_driver.ini`

use std::{sync::Arc, time::Duration};

use log::{error, info};
use rm_serial_driver::{
    config::DriverConfig,
    connection::serial::{available_ports, SerialTransport},
    telemetry::{LocalColorAuthority, TargetCommand, Telemetry, JOINT_NAMES},
    LinkError, LinkSession,
};
use tokio::sync::mpsc;
use tokio_stream::{wrappers::IntervalStream, StreamExt};

#[tokio::main]
async fn main() -> Result<(), LinkError> {
    simplelog::TermLogger::init(
        log::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Always,
    )
    .unwrap();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "rm_serial_driver.ini".to_string());
    let config = DriverConfig::load(&path)?;

    info!("Start RMSerialDriver!");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = match LinkSession::open(
        SerialTransport::new(),
        config.device_name.clone(),
        config.settings,
        Arc::new(tx),
        Arc::new(LocalColorAuthority::new(1)),
    )
    .await
    {
        Ok(session) => session,
        Err(e) => {
            for port in available_ports().unwrap_or_default() {
                info!("Available port: {}", port.port_name);
            }
            return Err(e);
        }
    };
    session.sync_present_color().await?;

    tokio::spawn(async move {
        while let Some(telemetry) = rx.recv().await {
            match telemetry {
                Telemetry::Gimbal(state) => {
                    let [pitch, yaw] = state.positions();
                    info!(
                        "{}: {pitch:.3} {}: {yaw:.3} (color {})",
                        JOINT_NAMES[0], JOINT_NAMES[1], state.robot_color
                    );
                }
                Telemetry::Latency(latency) => {
                    log::debug!("latency: {:.3} ms", latency.as_secs_f64() * 1000.0)
                }
            }
        }
    });

    // No tracker attached: tell the gimbal there is nothing to aim at.
    let idle = IntervalStream::new(tokio::time::interval(Duration::from_millis(10)))
        .map(|_| TargetCommand::default());

    tokio::select! {
        _ = session.forward_commands(idle) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C: {e}");
            }
        }
    }

    session.shutdown().await
}

use std::{io, sync::Arc, time::SystemTime};

use log::{error, trace, warn};
use tokio::select;

use super::Shared;
use crate::{
    connection::Transport,
    packets::{check_frame, decode_receive, FrameError, ReceivePacket, RECEIVE_HEADER},
    telemetry::GimbalState,
};

/// Reads one frame candidate.
///
/// Returns `Ok(None)` when the bytes read were discarded: a header byte other than
/// [`RECEIVE_HEADER`] (exactly one byte is consumed) or a frame that failed validation.
async fn read_frame<T: Transport>(
    shared: &Shared<T>,
    frame: &mut [u8; ReceivePacket::SIZE],
) -> io::Result<Option<ReceivePacket>> {
    shared.transport.receive(&mut frame[..1]).await?;
    if frame[0] != RECEIVE_HEADER {
        warn!("{}", FrameError::InvalidHeader(frame[0]));
        return Ok(None);
    }

    shared.transport.receive(&mut frame[1..]).await?;
    trace!("received packet: {:x?}", frame);

    let bytes = &frame[..];
    let packet = decode_receive(bytes).and_then(|packet| {
        check_frame(bytes)?;
        Ok(packet)
    });

    match packet {
        Ok(packet) => Ok(Some(packet)),
        Err(e) => {
            error!("Discarding frame: {e}");
            Ok(None)
        }
    }
}

/// Publishes a validated frame and reconciles the present color with it.
async fn handle_packet<T: Transport>(shared: &Shared<T>, packet: ReceivePacket) {
    shared.sink.publish_gimbal(GimbalState {
        stamp: SystemTime::now(),
        pitch: packet.pitch,
        yaw: packet.yaw,
        robot_color: packet.robot_color,
    });

    if shared.present_color() != Some(packet.robot_color) {
        shared.request_color_change(packet.robot_color).await;
    }
}

/// Body of the receive task. Runs until shutdown is signalled.
pub(super) async fn receive_loop<T: Transport>(shared: Arc<Shared<T>>) {
    let mut shutdown = shared.shutdown.clone();
    let mut frame = [0u8; ReceivePacket::SIZE];

    loop {
        if shared.is_shutting_down() {
            break;
        }

        let generation = shared.generation();
        let result = select! {
            biased;
            _ = shutdown.changed() => break,
            result = read_frame(&shared, &mut frame) => result,
        };

        match result {
            Ok(Some(packet)) => handle_packet(&shared, packet).await,
            Ok(None) => {}
            Err(e) => {
                error!("Error while receiving data: {e}");
                if let Err(e) = shared.reconnect(generation).await {
                    warn!("Receive loop stopping: {e}");
                    break;
                }
            }
        }
    }

    trace!("Receive loop exited");
}

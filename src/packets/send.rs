use super::FrameError;
#[cfg(test)]
use crate::decode::{Decode, DecodeError};
use crate::{
    crc,
    encode::{Encode, MessageEncoder},
    telemetry::TargetCommand,
};

/// Aiming command sent to the controller.
///
/// | Offset | Field          | Type       |
/// |--------|----------------|------------|
/// | 0      | `target_found` | `bool`     |
/// | 1      | `target_color` | `bool`     |
/// | 2      | `task_mode`    | `u8`       |
/// | 3      | `x, y, z`      | `f32` × 3  |
/// | 15     | `vx, vy, vz`   | `f32` × 3  |
/// | 27     | `checksum`     | `u16`      |
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SendPacket {
    pub target_found: bool,
    /// `true` when the robot plays color `0`.
    pub target_color: bool,
    /// Reserved by the firmware, always `0` for now.
    pub task_mode: u8,
    /// Target position in meters.
    pub position: [f32; 3],
    /// Target velocity in meters per second.
    pub velocity: [f32; 3],
    pub checksum: u16,
}

impl SendPacket {
    /// Encoded size of the frame, checksum included.
    pub const SIZE: usize = 29;

    /// Builds the packet for a tracker command given the session's present color.
    pub fn from_command(command: &TargetCommand, present_color: Option<u8>) -> Self {
        Self {
            target_found: command.target_found,
            target_color: present_color == Some(0),
            task_mode: 0,
            position: command.position,
            velocity: command.velocity,
            checksum: 0,
        }
    }

    /// Encodes the packet and fills in its checksum, ready to be written to the port.
    pub fn to_frame(&self) -> Result<[u8; Self::SIZE], FrameError> {
        let mut frame = encode_send(self);
        crc::append(&mut frame)?;
        Ok(frame)
    }
}

impl Encode for SendPacket {
    fn size(&self) -> usize {
        Self::SIZE
    }

    fn encode(&self, data: &mut [u8]) {
        let mut enc = MessageEncoder::new(data);
        enc.write(&self.target_found);
        enc.write(&self.target_color);
        enc.write(&self.task_mode);
        enc.write(&self.position);
        enc.write(&self.velocity);
        enc.write(&self.checksum);
    }
}

#[cfg(test)]
impl Decode for SendPacket {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            target_found: bool::decode(data)?,
            target_color: bool::decode(data)?,
            task_mode: u8::decode(data)?,
            position: <[f32; 3]>::decode(data)?,
            velocity: <[f32; 3]>::decode(data)?,
            checksum: u16::decode(data)?,
        })
    }
}

/// Packs `packet` into its wire layout with the checksum field zeroed.
pub fn encode_send(packet: &SendPacket) -> [u8; SendPacket::SIZE] {
    let mut frame = [0u8; SendPacket::SIZE];
    SendPacket {
        checksum: 0,
        ..*packet
    }
    .encode(&mut frame);
    frame
}

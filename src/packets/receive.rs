use super::{FrameError, RECEIVE_HEADER};
use crate::decode::{Decode, DecodeError};
#[cfg(test)]
use crate::encode::{Encode, MessageEncoder};

/// Gimbal state reported by the controller.
///
/// | Offset | Field         | Type  |
/// |--------|---------------|-------|
/// | 0      | `header`      | `u8`  |
/// | 1      | `robot_color` | `u8`  |
/// | 2      | `pitch`       | `f32` |
/// | 6      | `yaw`         | `f32` |
/// | 10     | `checksum`    | `u16` |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceivePacket {
    /// Always [`RECEIVE_HEADER`] in a frame that reached the decoder.
    pub header: u8,
    /// Side the robot plays on: `0` or `1`.
    pub robot_color: u8,
    /// Radians.
    pub pitch: f32,
    /// Radians.
    pub yaw: f32,
    pub checksum: u16,
}

impl ReceivePacket {
    /// Encoded size of the frame, checksum included.
    pub const SIZE: usize = 12;

    pub fn new(robot_color: u8, pitch: f32, yaw: f32) -> Self {
        Self {
            header: RECEIVE_HEADER,
            robot_color,
            pitch,
            yaw,
            checksum: 0,
        }
    }
}

impl Decode for ReceivePacket {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            header: u8::decode(data)?,
            robot_color: u8::decode(data)?,
            pitch: f32::decode(data)?,
            yaw: f32::decode(data)?,
            checksum: u16::decode(data)?,
        })
    }
}

#[cfg(test)]
impl Encode for ReceivePacket {
    fn size(&self) -> usize {
        Self::SIZE
    }

    fn encode(&self, data: &mut [u8]) {
        let mut enc = MessageEncoder::new(data);
        enc.write(&self.header);
        enc.write(&self.robot_color);
        enc.write(&self.pitch);
        enc.write(&self.yaw);
        enc.write(&self.checksum);
    }
}

/// Reinterprets a complete controller frame as a [`ReceivePacket`].
///
/// Only the layout is checked here. The checksum is verified separately with
/// [`check_frame`](super::check_frame) against the same bytes.
pub fn decode_receive(bytes: &[u8]) -> Result<ReceivePacket, FrameError> {
    if bytes.len() != ReceivePacket::SIZE {
        return Err(FrameError::MalformedPacket {
            expected: ReceivePacket::SIZE,
            found: bytes.len(),
        });
    }

    Ok(ReceivePacket::decode(&mut &bytes[..])?)
}

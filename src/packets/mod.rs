//! Fixed-layout frames exchanged with the gimbal controller.
//!
//! Both frame types are packed: fields follow each other with no padding and every
//! multi-byte value is little-endian. The last two bytes of each frame hold the
//! [CRC16](crate::crc) of everything before them.

use thiserror::Error;

use crate::{crc, decode::DecodeError};

pub mod receive;
pub mod send;

pub use receive::{decode_receive, ReceivePacket};
pub use send::{encode_send, SendPacket};

/// First byte of every controller-to-host frame.
pub const RECEIVE_HEADER: u8 = 0x5A;

/// Frame-level failures. These never leave the receive loop; the frame is dropped and logged.
#[derive(Error, Debug, PartialEq)]
pub enum FrameError {
    #[error("Malformed packet: expected {expected} bytes, found {found}.")]
    MalformedPacket { expected: usize, found: usize },

    #[error("CRC16 checksum mismatch. Found {value:x}, expected {expected:x}.")]
    ChecksumMismatch { value: u16, expected: u16 },

    #[error("Invalid header: {0:02X}")]
    InvalidHeader(u8),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    InvalidInput(#[from] crc::InvalidInput),
}

/// Checks that `frame` carries a valid trailing checksum.
pub fn check_frame(frame: &[u8]) -> Result<(), FrameError> {
    if crc::verify(frame)? {
        Ok(())
    } else {
        Err(FrameError::ChecksumMismatch {
            value: crc::stored(frame)?,
            expected: crc::compute(&frame[..frame.len() - crc::CHECKSUM_SIZE]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_reports_both_values() {
        let mut frame = [RECEIVE_HEADER, 0, 0, 0];
        crc::append(&mut frame).unwrap();
        assert_eq!(check_frame(&frame), Ok(()));

        let expected = crc::stored(&frame).unwrap();
        frame[2] ^= 0xFF;

        assert_eq!(
            check_frame(&frame),
            Err(FrameError::ChecksumMismatch {
                value: expected ^ 0x00FF,
                expected,
            })
        );
    }

    #[test]
    fn too_short_for_checksum() {
        assert!(matches!(
            check_frame(&[RECEIVE_HEADER]),
            Err(FrameError::InvalidInput(_))
        ));
    }
}

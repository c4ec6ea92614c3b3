//! CRC16 checksums used by both frame directions.
//!
//! The gimbal firmware uses the reflected CCITT table with an initial value of `0xFFFF`
//! and no final XOR, which is catalogued as CRC-16/MCRF4XX. The checksum always occupies
//! the last two bytes of a frame, low byte first.

use crc::Crc;
use thiserror::Error;

/// CRC16 algorithm shared with the gimbal controller firmware.
pub const RM_CRC16: Crc<u16> = Crc::<u16>::new(&crc::CRC_16_MCRF4XX);

/// Width of the trailing checksum field in bytes.
pub const CHECKSUM_SIZE: usize = size_of::<u16>();

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Checksum input of {len} bytes is shorter than the 2-byte checksum field")]
pub struct InvalidInput {
    pub len: usize,
}

/// Computes the CRC16 of `bytes`.
pub fn compute(bytes: &[u8]) -> u16 {
    RM_CRC16.checksum(bytes)
}

/// Splits a frame into its body and trailing checksum field.
fn split_frame(frame: &[u8]) -> Result<(&[u8], &[u8]), InvalidInput> {
    let body_len = frame
        .len()
        .checked_sub(CHECKSUM_SIZE)
        .ok_or(InvalidInput { len: frame.len() })?;

    Ok(frame.split_at(body_len))
}

/// Reads the checksum stored in the last two bytes of `frame`.
pub fn stored(frame: &[u8]) -> Result<u16, InvalidInput> {
    let (_, field) = split_frame(frame)?;
    Ok(u16::from_le_bytes([field[0], field[1]]))
}

/// Returns `true` if the last two bytes of `frame` hold the checksum of everything before them.
pub fn verify(frame: &[u8]) -> Result<bool, InvalidInput> {
    let (body, _) = split_frame(frame)?;
    Ok(compute(body) == stored(frame)?)
}

/// Writes the checksum of everything but the last two bytes into the last two bytes.
///
/// The buffer must already be sized to include the checksum field.
pub fn append(frame: &mut [u8]) -> Result<(), InvalidInput> {
    let body_len = split_frame(frame)?.0.len();
    let checksum = compute(&frame[..body_len]);
    frame[body_len..].copy_from_slice(&checksum.to_le_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value() {
        assert_eq!(compute(b"123456789"), 0x6F91);
    }

    #[test]
    fn empty_input_is_initial_value() {
        assert_eq!(compute(&[]), 0xFFFF);
    }

    #[test]
    fn append_then_verify() {
        for len in [2usize, 3, 12, 29, 64] {
            let mut frame: Vec<u8> = (0..len as u8).map(|b| b.wrapping_mul(37)).collect();
            append(&mut frame).unwrap();
            assert!(verify(&frame).unwrap(), "length {len}");
        }
    }

    #[test]
    fn append_is_little_endian() {
        let mut frame = [0x5A, 0x01, 0x02, 0x00, 0x00];
        append(&mut frame).unwrap();

        let checksum = compute(&frame[..3]);
        assert_eq!(frame[3], (checksum & 0xFF) as u8);
        assert_eq!(frame[4], (checksum >> 8) as u8);
        assert_eq!(stored(&frame).unwrap(), checksum);
    }

    #[test]
    fn single_bit_flips_are_detected() {
        let mut frame = [0u8; 12];
        frame[0] = 0x5A;
        frame[2..6].copy_from_slice(&1.0f32.to_le_bytes());
        frame[6..10].copy_from_slice(&2.0f32.to_le_bytes());
        append(&mut frame).unwrap();

        for byte in 0..10 {
            for bit in 0..8 {
                let mut corrupted = frame;
                corrupted[byte] ^= 1 << bit;
                assert!(!verify(&corrupted).unwrap(), "byte {byte} bit {bit}");
            }
        }
    }

    #[test]
    fn short_input_is_rejected() {
        assert_eq!(verify(&[0x5A]), Err(InvalidInput { len: 1 }));
        assert_eq!(append(&mut []), Err(InvalidInput { len: 0 }));
    }
}

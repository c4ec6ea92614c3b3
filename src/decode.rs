use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub struct DecodeError {
    kind: DecodeErrorKind,
    type_name: &'static str,
}

impl DecodeError {
    pub fn new<T>(kind: DecodeErrorKind) -> Self {
        Self {
            kind,
            type_name: std::any::type_name::<T>(),
        }
    }

    pub const fn kind(&self) -> DecodeErrorKind {
        self.kind
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to decode {}: {}", self.type_name, self.kind)
    }
}

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeErrorKind {
    #[error("Packet was too short.")]
    UnexpectedEnd,

    #[error(
        "Could not decode {name} with unexpected byte. Found {value:x}, expected one of: {expected:x?}."
    )]
    UnexpectedByte {
        name: &'static str,
        value: u8,
        expected: &'static [u8],
    },
}

/// A type that can be reconstructed (decoded) from a raw sequence of bytes.
///
/// The input slice is advanced by the number of bytes consumed.
pub trait Decode {
    /// Attempts to decode `Self` from the beginning of the provided byte slice.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the input is too short or holds a value
    /// that is not valid for this type.
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError>
    where
        Self: Sized;
}

macro_rules! impl_decode_for_primitive {
    ($($t:ty),*) => {
        $(
            impl Decode for $t {
                fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
                    let (bytes, rest) = data
                        .split_first_chunk::<{ size_of::<$t>() }>()
                        .ok_or_else(|| DecodeError::new::<Self>(DecodeErrorKind::UnexpectedEnd))?;
                    *data = rest;
                    Ok(Self::from_le_bytes(*bytes))
                }
            }
        )*
    };
}

impl_decode_for_primitive!(u8, u16, u32, i8, i16, i32, f32);

impl Decode for bool {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        match u8::decode(data)? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedByte {
                name: "bool",
                value,
                expected: &[0, 1],
            })),
        }
    }
}

impl<const N: usize, T: Decode + Copy + Default> Decode for [T; N] {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let mut arr = [T::default(); N];
        for item in arr.iter_mut() {
            *item = T::decode(data)?;
        }
        Ok(arr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_input() {
        let data = [0x5A, 0x34, 0x12, 0xFF];
        let mut cursor = data.as_slice();

        assert_eq!(u8::decode(&mut cursor).unwrap(), 0x5A);
        assert_eq!(u16::decode(&mut cursor).unwrap(), 0x1234);
        assert_eq!(cursor, &[0xFF]);
    }

    #[test]
    fn floats_are_little_endian() {
        let mut cursor = [0x00, 0x00, 0x80, 0x3F].as_slice();
        assert_eq!(f32::decode(&mut cursor).unwrap(), 1.0);
        assert!(cursor.is_empty());
    }

    #[test]
    fn too_short() {
        let mut cursor = [0x00, 0x00, 0x80].as_slice();
        let err = f32::decode(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::UnexpectedEnd);
        // Nothing is consumed on failure.
        assert_eq!(cursor.len(), 3);
    }

    #[test]
    fn bool_rejects_other_bytes() {
        let mut cursor = [0x02].as_slice();
        assert!(matches!(
            bool::decode(&mut cursor).unwrap_err().kind(),
            DecodeErrorKind::UnexpectedByte { value: 2, .. }
        ));
    }

    #[test]
    fn arrays() {
        let mut cursor = [1, 2, 3].as_slice();
        assert_eq!(<[u8; 3]>::decode(&mut cursor).unwrap(), [1, 2, 3]);
    }
}

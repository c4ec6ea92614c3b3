/// A type that can be encoded into a sequence of bytes.
pub trait Encode {
    /// Returns the number of bytes this value will take when encoded.
    fn size(&self) -> usize;

    /// Encodes this instance into the provided byte slice.
    ///
    /// # Panics
    ///
    /// Panics if `data` is shorter than [`Encode::size`].
    fn encode(&self, data: &mut [u8]);
}

macro_rules! impl_encode_for_primitive {
    ($($t:ty),*) => {
        $(
            impl Encode for $t {
                fn size(&self) -> usize {
                    size_of::<Self>()
                }

                fn encode(&self, data: &mut [u8]) {
                    data[..size_of::<Self>()].copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_encode_for_primitive!(u8, u16, u32, i8, i16, i32, f32);

impl Encode for bool {
    fn size(&self) -> usize {
        1
    }

    fn encode(&self, data: &mut [u8]) {
        data[0] = u8::from(*self);
    }
}

impl<const N: usize, T: Encode> Encode for [T; N] {
    fn size(&self) -> usize {
        self.iter().map(Encode::size).sum()
    }

    fn encode(&self, data: &mut [u8]) {
        let mut offset = 0;
        for item in self {
            item.encode(&mut data[offset..]);
            offset += item.size();
        }
    }
}

/// Writes a sequence of [`Encode`] values back to back into a buffer.
pub struct MessageEncoder<'a> {
    data: &'a mut [u8],
    position: usize,
}

impl<'a> MessageEncoder<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Encodes `value` at the current position and advances past it.
    pub fn write(&mut self, value: &impl Encode) {
        value.encode(&mut self.data[self.position..]);
        self.position += value.size();
    }

    /// Number of bytes written so far.
    pub fn position(&self) -> usize {
        self.position
    }
}

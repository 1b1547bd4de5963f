// src/common/wire.rs

/// A fixed-width value with a little-endian wire representation.
///
/// Shared by the message codec (`Message::get`) and the storage reader so both
/// agree on byte order. `Default` is what a short read yields.
pub trait WireValue: Sized + Default + Copy {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Decodes from exactly `SIZE` bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Encodes into exactly `SIZE` bytes.
    fn write_le(&self, out: &mut [u8]);
}

macro_rules! impl_wire_value {
    ($($ty:ty),*) => {
        $(
            impl WireValue for $ty {
                const SIZE: usize = core::mem::size_of::<$ty>();

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; core::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_le_bytes(raw)
                }

                #[inline]
                fn write_le(&self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_wire_value!(u8, i8, u16, i16, u32, i32);

/// Reads a `T` at `offset`, or `T::default()` if the read would run past `bytes`.
#[inline]
pub fn read_at<T: WireValue>(bytes: &[u8], offset: usize) -> T {
    match offset.checked_add(T::SIZE) {
        Some(end) if end <= bytes.len() => T::read_le(&bytes[offset..end]),
        _ => T::default(),
    }
}

/// Appends the little-endian encoding of `value` to `out`.
#[inline]
pub fn push_le<T: WireValue>(out: &mut alloc::vec::Vec<u8>, value: T) {
    let start = out.len();
    out.resize(start + T::SIZE, 0);
    value.write_le(&mut out[start..]);
}

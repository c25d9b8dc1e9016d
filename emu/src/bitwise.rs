use std::mem::size_of;
use std::ops::RangeInclusive;

/// Helper methods to inspect and manipulate bits of an instruction word.
/// Bit indices run from lsb to msb (right to left).
///
/// Extraction never fails: any 16-bit or 32-bit input is a valid input,
/// the decoders judge whether the extracted combination makes sense.
pub trait Bits: Copy {
    fn get_bit(self, bit_idx: u8) -> bool;

    fn set_bit_on(&mut self, bit_idx: u8);

    fn set_bit_off(&mut self, bit_idx: u8);

    fn set_bit(&mut self, bit_idx: u8, value: bool) {
        if value {
            self.set_bit_on(bit_idx);
        } else {
            self.set_bit_off(bit_idx);
        }
    }

    /// Extracts the bits in `bits_range` (inclusive on both ends),
    /// shifted down to position 0.
    fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self;
}

macro_rules! impl_bits {
    ($($ty:ty),*) => {$(
        impl Bits for $ty {
            fn get_bit(self, bit_idx: u8) -> bool {
                debug_assert!(bit_idx < (size_of::<Self>() * 8) as u8);
                (self >> bit_idx) & 1 != 0
            }

            fn set_bit_on(&mut self, bit_idx: u8) {
                debug_assert!(bit_idx < (size_of::<Self>() * 8) as u8);
                *self |= 1 << bit_idx;
            }

            fn set_bit_off(&mut self, bit_idx: u8) {
                debug_assert!(bit_idx < (size_of::<Self>() * 8) as u8);
                *self &= !(1 << bit_idx);
            }

            fn get_bits(self, bits_range: RangeInclusive<u8>) -> Self {
                let start = *bits_range.start();
                let length = bits_range.len() as u32;
                debug_assert!(
                    u32::from(start) + length <= (size_of::<Self>() * 8) as u32
                );

                // A mask with `length` ones, moved up to `start`. A range
                // covering the whole width would overflow the shift.
                let ones = (1 as $ty)
                    .checked_shl(length)
                    .map_or(<$ty>::MAX, |v| v - 1);
                (self & (ones << start)) >> start
            }
        }
    )*};
}

impl_bits!(u16, u32);

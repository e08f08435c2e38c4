//! # Wire I/O Primitives
//!
//! The minimal capability every codec layer writes and reads through.
//!
//! ## Design Philosophy
//!
//! - Implementors supply only raw byte access; fixed-width integers,
//!   floats, strings and the variable-length encodings are provided methods
//! - All integers are little-endian
//! - Every call returns a `WireResult`, so composite codecs abort on the
//!   first failure with `?`
//! - Primitives that report failure through a "last error" slot instead of
//!   a return value are wrapped by [`Checked`]; callers never see the
//!   difference

mod buffer;
mod checked;

pub use buffer::{PacketReader, PacketWriter};
pub use checked::{Checked, LastErrorReader, LastErrorWriter};

use crate::error::{WireError, WireResult};

/// Largest delta (exclusive) that the Q2PRO 23-bit encoding sends in two bytes.
const I23_DIFF_LIMIT: i32 = 0x4000;

/// Output side of the wire.
pub trait WireWrite {
    /// Appends `data` verbatim.
    fn write_raw(&mut self, data: &[u8]) -> WireResult<()>;

    /// Reserves `size` bytes at the write position and returns them for the
    /// caller to fill.
    fn reserve_raw(&mut self, size: usize) -> WireResult<&mut [u8]>;

    /// Bytes that can still be written.
    fn write_available(&self) -> usize;

    /// Writes a single byte.
    #[inline]
    fn write_u8(&mut self, value: u8) -> WireResult<()> {
        self.write_raw(&[value])
    }

    /// Writes a u16 in little-endian format.
    #[inline]
    fn write_u16(&mut self, value: u16) -> WireResult<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Writes a u32 in little-endian format.
    #[inline]
    fn write_u32(&mut self, value: u32) -> WireResult<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Writes a u64 in little-endian format.
    #[inline]
    fn write_u64(&mut self, value: u64) -> WireResult<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Writes a signed byte.
    #[inline]
    fn write_i8(&mut self, value: i8) -> WireResult<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Writes an i16 in little-endian format.
    #[inline]
    fn write_i16(&mut self, value: i16) -> WireResult<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Writes an i32 in little-endian format.
    #[inline]
    fn write_i32(&mut self, value: i32) -> WireResult<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Writes an IEEE float by its bit pattern.
    #[inline]
    fn write_f32(&mut self, value: f32) -> WireResult<()> {
        self.write_u32(value.to_bits())
    }

    /// Writes a string followed by its NUL terminator.
    fn write_string(&mut self, text: &[u8]) -> WireResult<()> {
        let out = self.reserve_raw(text.len() + 1)?;
        let (body, terminator) = out.split_at_mut(text.len());
        body.copy_from_slice(text);
        terminator[0] = 0;
        Ok(())
    }

    /// Writes a Q2PRO 23-bit coordinate.
    ///
    /// A value close to `prev` goes out as a two byte difference with the low
    /// bit clear; anything else as the full value in three bytes with the low
    /// bit set.
    fn write_q2pro_i23(&mut self, value: i32, prev: i32) -> WireResult<()> {
        let delta = value.wrapping_sub(prev);
        if (-I23_DIFF_LIMIT..I23_DIFF_LIMIT).contains(&delta) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let diff = (delta as u16) << 1;
            self.write_u16(diff)
        } else {
            let bits = value.wrapping_shl(1) | 1;
            self.write_raw(&bits.to_le_bytes()[..3])
        }
    }

    /// Writes an unsigned LEB128 value.
    fn write_var_u64(&mut self, mut value: u64) -> WireResult<()> {
        loop {
            #[allow(clippy::cast_possible_truncation)]
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.write_u8(byte)?;
            if value == 0 {
                return Ok(());
            }
        }
    }
}

/// Input side of the wire. `'a` is the lifetime of the underlying message.
pub trait WireRead<'a> {
    /// Consumes exactly `size` bytes.
    fn read_raw(&mut self, size: usize) -> WireResult<&'a [u8]>;

    /// Consumes a NUL-terminated string and returns it without the
    /// terminator. A string running to the end of input is accepted.
    fn read_string(&mut self) -> WireResult<&'a [u8]>;

    /// Bytes left to read.
    fn read_available(&self) -> usize;

    /// Reads a single byte.
    #[inline]
    fn read_u8(&mut self) -> WireResult<u8> {
        let bytes = self.read_raw(1)?;
        Ok(bytes[0])
    }

    /// Reads a little-endian u16.
    #[inline]
    fn read_u16(&mut self) -> WireResult<u16> {
        let bytes = self.read_raw(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a little-endian u32.
    #[inline]
    fn read_u32(&mut self) -> WireResult<u32> {
        let bytes = self.read_raw(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a little-endian u64.
    #[inline]
    fn read_u64(&mut self) -> WireResult<u64> {
        let bytes = self.read_raw(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    /// Reads a signed byte.
    #[inline]
    fn read_i8(&mut self) -> WireResult<i8> {
        self.read_u8().map(|v| i8::from_le_bytes([v]))
    }

    /// Reads a little-endian i16.
    #[inline]
    fn read_i16(&mut self) -> WireResult<i16> {
        self.read_u16().map(|v| i16::from_le_bytes(v.to_le_bytes()))
    }

    /// Reads a little-endian i32.
    #[inline]
    fn read_i32(&mut self) -> WireResult<i32> {
        self.read_u32().map(|v| i32::from_le_bytes(v.to_le_bytes()))
    }

    /// Reads an IEEE float from its bit pattern.
    #[inline]
    fn read_f32(&mut self) -> WireResult<f32> {
        self.read_u32().map(f32::from_bits)
    }

    /// Reads a Q2PRO 23-bit coordinate.
    ///
    /// Returns the decoded value and whether it was a difference against the
    /// previous value (the caller adds the previous value in that case).
    fn read_q2pro_i23(&mut self) -> WireResult<(i32, bool)> {
        let low = i32::from(self.read_i16()?);
        if low & 1 == 0 {
            return Ok((low >> 1, true));
        }
        let high = i32::from(self.read_i8()?);
        let full = (low & 0xffff) | (high << 16);
        Ok((full >> 1, false))
    }

    /// Reads an unsigned LEB128 value.
    fn read_var_u64(&mut self) -> WireResult<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.read_u8()?;
            if shift >= u64::BITS {
                return Err(WireError::BadData);
            }
            value |= u64::from(byte & 0x7f) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
    }
}

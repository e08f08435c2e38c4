//! # Variable Coordinates
//!
//! A coordinate component is either a 1/8-unit integer or an IEEE float.
//! Protocols that quantize read and write the integer form; the rerelease
//! protocols carry floats. Conversion happens on access.

use super::component_bits;
use super::scale::{clip16, coord_to_int, int_to_coord};
use crate::error::WireResult;
use crate::io::{WireRead, WireWrite};

/// One coordinate component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VarCoord {
    /// 1/8 world units.
    Int(i32),
    /// World units.
    Float(f32),
}

impl Default for VarCoord {
    fn default() -> Self {
        Self::Int(0)
    }
}

/// Clamps so that the multiplication by 8 cannot overflow.
#[inline]
fn scale_unscaled(value: i32) -> i32 {
    value.clamp(i32::MIN / 8, i32::MAX / 8) * 8
}

impl VarCoord {
    /// Stores a float.
    #[inline]
    pub fn set_float(&mut self, value: f32) {
        *self = Self::Float(value);
    }

    /// Stores a 1/8-unit integer.
    #[inline]
    pub fn set_int(&mut self, value: i32) {
        *self = Self::Int(value);
    }

    /// Stores a whole-unit integer.
    #[inline]
    pub fn set_int_unscaled(&mut self, value: i32) {
        *self = Self::Int(scale_unscaled(value));
    }

    /// The value in world units.
    #[inline]
    #[must_use]
    pub fn get_float(self) -> f32 {
        match self {
            Self::Int(i) => int_to_coord(i),
            Self::Float(f) => f,
        }
    }

    /// The value in 1/8 units.
    #[inline]
    #[must_use]
    pub fn get_int(self) -> i32 {
        match self {
            Self::Int(i) => i,
            Self::Float(f) => coord_to_int(f),
        }
    }

    /// The value in whole units, truncated toward zero.
    #[inline]
    #[must_use]
    pub fn get_int_unscaled(self) -> i32 {
        self.get_int() / 8
    }
}

/// A three-component coordinate vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VarCoords(pub [VarCoord; 3]);

impl VarCoords {
    /// Builds a vector of 1/8-unit integers.
    #[must_use]
    pub fn from_ints(values: [i32; 3]) -> Self {
        Self(values.map(VarCoord::Int))
    }

    /// Builds a vector of floats.
    #[must_use]
    pub fn from_floats(values: [f32; 3]) -> Self {
        Self(values.map(VarCoord::Float))
    }

    /// Stores a float in one component.
    #[inline]
    pub fn set_float_comp(&mut self, comp: usize, value: f32) {
        self.0[comp].set_float(value);
    }

    /// Stores a 1/8-unit integer in one component.
    #[inline]
    pub fn set_int_comp(&mut self, comp: usize, value: i32) {
        self.0[comp].set_int(value);
    }

    /// Stores a 1/8-unit short in one component.
    #[inline]
    pub fn set_short_comp(&mut self, comp: usize, value: i16) {
        self.0[comp].set_int(i32::from(value));
    }

    /// Stores a whole-unit integer in one component.
    #[inline]
    pub fn set_int_unscaled_comp(&mut self, comp: usize, value: i32) {
        self.0[comp].set_int_unscaled(value);
    }

    /// Stores a whole-unit short in one component.
    #[inline]
    pub fn set_short_unscaled_comp(&mut self, comp: usize, value: i16) {
        self.0[comp].set_int_unscaled(i32::from(value));
    }

    /// One component in world units.
    #[inline]
    #[must_use]
    pub fn get_float_comp(&self, comp: usize) -> f32 {
        self.0[comp].get_float()
    }

    /// One component in 1/8 units.
    #[inline]
    #[must_use]
    pub fn get_int_comp(&self, comp: usize) -> i32 {
        self.0[comp].get_int()
    }

    /// One component in 1/8 units, truncated to 16 bits as the wire does.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_short_comp(&self, comp: usize) -> i16 {
        self.get_int_comp(comp) as i16
    }

    /// One component in whole units.
    #[inline]
    #[must_use]
    pub fn get_int_unscaled_comp(&self, comp: usize) -> i32 {
        self.0[comp].get_int_unscaled()
    }

    /// One component in whole units, saturated to 16 bits.
    #[inline]
    #[must_use]
    pub fn get_short_unscaled_comp(&self, comp: usize) -> i16 {
        clip16(self.get_int_unscaled_comp(comp))
    }

    /// All components in world units.
    #[must_use]
    pub fn get_float(&self) -> [f32; 3] {
        self.0.map(VarCoord::get_float)
    }

    /// All components in 1/8 units.
    #[must_use]
    pub fn get_int(&self) -> [i32; 3] {
        self.0.map(VarCoord::get_int)
    }

    /// Writes the vector as three 1/8-unit shorts.
    pub fn write_short<W: WireWrite + ?Sized>(&self, out: &mut W) -> WireResult<()> {
        for comp in 0..3 {
            out.write_i16(self.get_short_comp(comp))?;
        }
        Ok(())
    }

    /// Writes the vector as three Q2PRO 23-bit values relative to `prev`.
    pub fn write_q2pro_i23<W: WireWrite + ?Sized>(
        &self,
        out: &mut W,
        prev: &Self,
    ) -> WireResult<()> {
        for comp in 0..3 {
            out.write_q2pro_i23(self.get_int_comp(comp), prev.get_int_comp(comp))?;
        }
        Ok(())
    }

    /// Writes the vector as three floats.
    pub fn write_float<W: WireWrite + ?Sized>(&self, out: &mut W) -> WireResult<()> {
        for comp in 0..3 {
            out.write_f32(self.get_float_comp(comp))?;
        }
        Ok(())
    }

    /// Reads three 1/8-unit shorts.
    pub fn read_short<'a, R: WireRead<'a> + ?Sized>(input: &mut R) -> WireResult<Self> {
        let mut coords = Self::default();
        for comp in 0..3 {
            coords.set_short_comp(comp, input.read_i16()?);
        }
        Ok(coords)
    }

    /// Reads three Q2PRO 23-bit values. Differences are resolved against `prev`.
    pub fn read_q2pro_i23<'a, R: WireRead<'a> + ?Sized>(
        input: &mut R,
        prev: &Self,
    ) -> WireResult<Self> {
        let mut coords = Self::default();
        for comp in 0..3 {
            let (value, is_diff) = input.read_q2pro_i23()?;
            let value = if is_diff {
                prev.get_int_comp(comp).wrapping_add(value)
            } else {
                value
            };
            coords.set_int_comp(comp, value);
        }
        Ok(coords)
    }

    /// Reads three floats.
    pub fn read_float<'a, R: WireRead<'a> + ?Sized>(input: &mut R) -> WireResult<Self> {
        let mut coords = Self::default();
        for comp in 0..3 {
            coords.set_float_comp(comp, input.read_f32()?);
        }
        Ok(coords)
    }
}

/// Coordinates that may travel as a difference against a previous value.
///
/// The writer keeps both the previous and current value so any encoding can
/// pick what it needs; the reader records which components arrived as
/// differences.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaybeDiffCoords {
    /// Sender side.
    Write {
        /// Baseline value.
        prev: VarCoords,
        /// New value.
        current: VarCoords,
    },
    /// Receiver side.
    Read {
        /// Bit per component that was sent as a difference.
        diff_bits: u8,
        /// Bit per component that was present at all.
        delta_bits: u8,
        /// The decoded values.
        values: VarCoords,
    },
}

impl Default for MaybeDiffCoords {
    fn default() -> Self {
        Self::Write {
            prev: VarCoords::default(),
            current: VarCoords::default(),
        }
    }
}

impl MaybeDiffCoords {
    /// Bit per component whose 1/8-unit value changed between `prev` and
    /// `current`. Always 0 for the receiver side.
    #[must_use]
    pub fn write_differs_int(&self) -> u8 {
        match self {
            Self::Write { prev, current } => {
                component_bits(3, |comp| prev.get_int_comp(comp) != current.get_int_comp(comp))
            }
            Self::Read { .. } => 0,
        }
    }

    /// Bit per component whose float value changed between `prev` and
    /// `current`. Always 0 for the receiver side.
    #[must_use]
    pub fn write_differs_float(&self) -> u8 {
        match self {
            Self::Write { prev, current } => component_bits(3, |comp| {
                prev.get_float_comp(comp).to_bits() != current.get_float_comp(comp).to_bits()
            }),
            Self::Read { .. } => 0,
        }
    }

    /// The value to transmit (sender) or that was received (receiver).
    #[must_use]
    pub const fn value(&self) -> &VarCoords {
        match self {
            Self::Write { current, .. } => current,
            Self::Read { values, .. } => values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{PacketReader, PacketWriter};

    #[test]
    fn test_float_passthrough() {
        for f in [0.0f32, -0.0, 1.0e-30, 123.456, -9999.875, f32::MAX] {
            let mut c = VarCoord::default();
            c.set_float(f);
            assert_eq!(c.get_float().to_bits(), f.to_bits());
        }
    }

    #[test]
    fn test_int_unscaled_clamps() {
        let mut c = VarCoord::default();
        for i in [0, 1, -1, 4096, i32::MAX / 8, i32::MIN / 8, i32::MAX, i32::MIN] {
            c.set_int_unscaled(i);
            assert_eq!(c.get_int_unscaled(), i.clamp(i32::MIN / 8, i32::MAX / 8));
        }
    }

    #[test]
    fn test_set_comp_leaves_others() {
        let mut v = VarCoords::from_ints([8, 16, 24]);
        v.set_float_comp(1, 0.5);
        assert_eq!(v.0[0], VarCoord::Int(8));
        assert_eq!(v.0[1], VarCoord::Float(0.5));
        assert_eq!(v.0[2], VarCoord::Int(24));
        assert_eq!(v.get_int(), [8, 4, 24]);
    }

    #[test]
    fn test_short_unscaled_saturates() {
        let mut v = VarCoords::default();
        v.set_int_comp(0, 8 * 40_000);
        v.set_short_unscaled_comp(1, -3);
        assert_eq!(v.get_short_unscaled_comp(0), i16::MAX);
        assert_eq!(v.get_int_comp(1), -24);
    }

    #[test]
    fn test_i23_coords_against_prev() {
        let prev = VarCoords::from_ints([1000, -5000, 0]);
        let current = VarCoords::from_ints([1004, 200_000, 0]);
        let mut writer = PacketWriter::new(32);
        current.write_q2pro_i23(&mut writer, &prev).unwrap();
        assert_eq!(writer.len(), 2 + 3 + 2);

        let mut reader = PacketReader::new(writer.as_slice());
        let decoded = VarCoords::read_q2pro_i23(&mut reader, &prev).unwrap();
        assert_eq!(decoded.get_int(), [1004, 200_000, 0]);
    }

    #[test]
    fn test_maybe_diff_bits() {
        let coords = MaybeDiffCoords::Write {
            prev: VarCoords::from_ints([0, 8, 16]),
            current: VarCoords::from_floats([0.0, 1.0, 3.0]),
        };
        assert_eq!(coords.write_differs_int(), 0b100);
        assert_eq!(coords.write_differs_float(), 0b100);
        assert_eq!(coords.value().get_int(), [0, 8, 24]);
    }
}

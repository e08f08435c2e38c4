//! Colors and fractions: normalized 0..1 values carried as bytes, words or floats.

use super::scale::{byte_to_color, clamped_mul, color_to_byte};

/// One color component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColorComp {
    /// 1/255 units.
    Byte(u8),
    /// Normalized float.
    Float(f32),
}

impl Default for ColorComp {
    fn default() -> Self {
        Self::Byte(0)
    }
}

impl ColorComp {
    /// The component as a normalized float.
    #[must_use]
    pub fn get_float(self) -> f32 {
        match self {
            Self::Byte(b) => byte_to_color(b),
            Self::Float(f) => f,
        }
    }

    /// The component as a byte.
    #[must_use]
    pub fn get_byte(self) -> u8 {
        match self {
            Self::Byte(b) => b,
            Self::Float(f) => color_to_byte(f),
        }
    }
}

/// An RGBA color.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VarColor(pub [ColorComp; 4]);

impl VarColor {
    /// Builds a color from bytes.
    #[must_use]
    pub fn from_bytes(values: [u8; 4]) -> Self {
        Self(values.map(ColorComp::Byte))
    }

    /// Builds a color from floats.
    #[must_use]
    pub fn from_floats(values: [f32; 4]) -> Self {
        Self(values.map(ColorComp::Float))
    }

    /// Stores a float in one component.
    #[inline]
    pub fn set_float_comp(&mut self, comp: usize, value: f32) {
        self.0[comp] = ColorComp::Float(value);
    }

    /// Stores a byte in one component.
    #[inline]
    pub fn set_byte_comp(&mut self, comp: usize, value: u8) {
        self.0[comp] = ColorComp::Byte(value);
    }

    /// One component as a float.
    #[inline]
    #[must_use]
    pub fn get_float_comp(&self, comp: usize) -> f32 {
        self.0[comp].get_float()
    }

    /// One component as a byte.
    #[inline]
    #[must_use]
    pub fn get_byte_comp(&self, comp: usize) -> u8 {
        self.0[comp].get_byte()
    }
}

/// A normalized 0..1 value such as fog density.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VarFraction {
    /// 1/65535 units.
    Word(u16),
    /// 1/255 units.
    Byte(u8),
    /// Normalized float.
    Float(f32),
}

impl Default for VarFraction {
    fn default() -> Self {
        Self::Word(0)
    }
}

impl VarFraction {
    /// The value as a normalized float.
    #[must_use]
    pub fn get_float(self) -> f32 {
        match self {
            Self::Word(w) => f32::from(w) / 65535.0,
            Self::Byte(b) => f32::from(b) / 255.0,
            Self::Float(f) => f,
        }
    }

    /// The value in 1/65535 units.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn get_word(self) -> u16 {
        match self {
            Self::Word(w) => w,
            Self::Byte(b) => u16::from(b) * 0x101,
            Self::Float(f) => clamped_mul(f, 65535.0, 0.0, 65535.0) as u16,
        }
    }

    /// The value in 1/255 units.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn get_byte(self) -> u8 {
        match self {
            Self::Word(w) => (w >> 8) as u8,
            Self::Byte(b) => b,
            Self::Float(f) => clamped_mul(f, 255.0, 0.0, 255.0) as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_conversions() {
        let mut c = VarColor::from_bytes([255, 0, 128, 64]);
        c.set_float_comp(3, 0.5);
        assert_eq!(c.get_byte_comp(0), 255);
        assert_eq!(c.get_byte_comp(3), 127);
        assert!((c.get_float_comp(2) - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(VarColor::from_floats([1.5, -0.5, 0.0, 1.0]).get_byte_comp(0), 255);
    }

    #[test]
    fn test_fraction_conversions() {
        assert_eq!(VarFraction::Byte(0xff).get_word(), 0xffff);
        assert_eq!(VarFraction::Word(0x1234).get_byte(), 0x12);
        assert_eq!(VarFraction::Float(1.0).get_word(), 0xffff);
        assert_eq!(VarFraction::Float(2.0).get_byte(), 0xff);
        assert_eq!(VarFraction::Float(-1.0).get_word(), 0);
        assert!((VarFraction::Word(0xffff).get_float() - 1.0).abs() < f32::EPSILON);
        assert_eq!(VarFraction::default(), VarFraction::Word(0));
    }
}

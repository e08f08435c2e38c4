//! Angles in degrees, stored as 16-bit or 8-bit binary angles or floats.

use super::scale::{angle_to_char, angle_to_short, char_to_angle, short_to_angle};

/// One angle component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VarAngle {
    /// 360/65536 degree units.
    Short(i16),
    /// 360/256 degree units.
    Char(i8),
    /// Degrees.
    Float(f32),
}

impl Default for VarAngle {
    fn default() -> Self {
        Self::Short(0)
    }
}

impl VarAngle {
    /// The angle in degrees.
    #[inline]
    #[must_use]
    pub fn get_float(self) -> f32 {
        match self {
            Self::Short(s) => short_to_angle(s),
            Self::Char(c) => char_to_angle(c),
            Self::Float(f) => f,
        }
    }

    /// The angle as a 16-bit binary angle.
    #[inline]
    #[must_use]
    pub fn get_short(self) -> i16 {
        match self {
            Self::Short(s) => s,
            Self::Char(c) => i16::from(c).wrapping_mul(0x101),
            Self::Float(f) => angle_to_short(f),
        }
    }

    /// The angle as an 8-bit binary angle.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn get_char(self) -> i8 {
        match self {
            Self::Short(s) => (s >> 8) as i8,
            Self::Char(c) => c,
            Self::Float(f) => angle_to_char(f),
        }
    }
}

/// A three-component angle vector (pitch, yaw, roll).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VarAngles(pub [VarAngle; 3]);

impl VarAngles {
    /// Builds a vector of 16-bit binary angles.
    #[must_use]
    pub fn from_shorts(values: [i16; 3]) -> Self {
        Self(values.map(VarAngle::Short))
    }

    /// Builds a vector of degrees.
    #[must_use]
    pub fn from_floats(values: [f32; 3]) -> Self {
        Self(values.map(VarAngle::Float))
    }

    /// Stores degrees in one component.
    #[inline]
    pub fn set_float_comp(&mut self, comp: usize, value: f32) {
        self.0[comp] = VarAngle::Float(value);
    }

    /// Stores a 16-bit binary angle in one component.
    #[inline]
    pub fn set_short_comp(&mut self, comp: usize, value: i16) {
        self.0[comp] = VarAngle::Short(value);
    }

    /// Stores an 8-bit binary angle in one component.
    #[inline]
    pub fn set_char_comp(&mut self, comp: usize, value: i8) {
        self.0[comp] = VarAngle::Char(value);
    }

    /// One component in degrees.
    #[inline]
    #[must_use]
    pub fn get_float_comp(&self, comp: usize) -> f32 {
        self.0[comp].get_float()
    }

    /// One component as a 16-bit binary angle.
    #[inline]
    #[must_use]
    pub fn get_short_comp(&self, comp: usize) -> i16 {
        self.0[comp].get_short()
    }

    /// One component as an 8-bit binary angle.
    #[inline]
    #[must_use]
    pub fn get_char_comp(&self, comp: usize) -> i8 {
        self.0[comp].get_char()
    }

    /// All components in degrees.
    #[must_use]
    pub fn get_float(&self) -> [f32; 3] {
        self.0.map(VarAngle::get_float)
    }
}

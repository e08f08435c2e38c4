//! # Small Offsets and Small Angles
//!
//! View offsets, gun offsets, kick angles and gun angles all live in a
//! narrow range. Older protocols send them as quarter-unit bytes; Q2rePRO
//! sends shorts with a per-field scale. Every stored form converts to every
//! other one.

use super::scale::{char_to_quarter, clip16, clip8, quarter_to_char, scaled_short, short_scaled};

/// Q2rePRO view offset unit: 1/16 world unit.
pub const VIEWOFFSET_SCALE: f32 = 16.0;
/// Q2rePRO gun offset unit: 1/512 world unit.
pub const GUNOFFSET_SCALE: f32 = 512.0;
/// Q2rePRO kick angle unit: 1/1024 degree.
pub const KICK_ANGLE_SCALE: f32 = 1024.0;
/// Q2rePRO gun angle unit: 1/4096 degree.
pub const GUNANGLE_SCALE: f32 = 4096.0;

/// One small offset component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SmallOffset {
    /// World units.
    Float(f32),
    /// Quarter units.
    Char(i8),
    /// Q2rePRO view offset, 1/16 units.
    ReproViewOffset(i16),
    /// Q2rePRO gun offset, 1/512 units.
    ReproGunOffset(i16),
}

impl Default for SmallOffset {
    fn default() -> Self {
        Self::Float(0.0)
    }
}

impl SmallOffset {
    /// The offset in world units.
    #[must_use]
    pub fn get_float(self) -> f32 {
        match self {
            Self::Float(f) => f,
            Self::Char(c) => char_to_quarter(c),
            Self::ReproViewOffset(s) => short_scaled(s, VIEWOFFSET_SCALE),
            Self::ReproGunOffset(s) => short_scaled(s, GUNOFFSET_SCALE),
        }
    }

    /// The offset in quarter units.
    #[must_use]
    pub fn get_char(self) -> i8 {
        match self {
            Self::Float(f) => quarter_to_char(f),
            Self::Char(c) => c,
            Self::ReproViewOffset(s) => clip8(i32::from(s) >> 2),
            Self::ReproGunOffset(s) => clip8(i32::from(s) >> 7),
        }
    }

    /// The offset in Q2rePRO view offset units.
    #[must_use]
    pub fn get_repro_viewoffset(self) -> i16 {
        match self {
            Self::Float(f) => scaled_short(f, VIEWOFFSET_SCALE),
            Self::Char(c) => i16::from(c) << 2,
            Self::ReproViewOffset(s) => s,
            Self::ReproGunOffset(s) => clip16(i32::from(s) >> 5),
        }
    }

    /// The offset in Q2rePRO gun offset units.
    #[must_use]
    pub fn get_repro_gunoffset(self) -> i16 {
        match self {
            Self::Float(f) => scaled_short(f, GUNOFFSET_SCALE),
            Self::Char(c) => i16::from(c) << 7,
            Self::ReproViewOffset(s) => clip16(i32::from(s) << 5),
            Self::ReproGunOffset(s) => s,
        }
    }
}

/// One small angle component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SmallAngle {
    /// Degrees.
    Float(f32),
    /// Quarter degrees.
    Char(i8),
    /// Q2rePRO kick angle, 1/1024 degrees.
    ReproKick(i16),
    /// Q2rePRO gun angle, 1/4096 degrees.
    ReproGun(i16),
}

impl Default for SmallAngle {
    fn default() -> Self {
        Self::Float(0.0)
    }
}

impl SmallAngle {
    /// The angle in degrees.
    #[must_use]
    pub fn get_float(self) -> f32 {
        match self {
            Self::Float(f) => f,
            Self::Char(c) => char_to_quarter(c),
            Self::ReproKick(s) => short_scaled(s, KICK_ANGLE_SCALE),
            Self::ReproGun(s) => short_scaled(s, GUNANGLE_SCALE),
        }
    }

    /// The angle in quarter degrees.
    #[must_use]
    pub fn get_char(self) -> i8 {
        match self {
            Self::Float(f) => quarter_to_char(f),
            Self::Char(c) => c,
            Self::ReproKick(s) => clip8(i32::from(s) >> 8),
            Self::ReproGun(s) => clip8(i32::from(s) >> 10),
        }
    }

    /// The angle in Q2rePRO kick angle units.
    #[must_use]
    pub fn get_repro_kick(self) -> i16 {
        match self {
            Self::Float(f) => scaled_short(f, KICK_ANGLE_SCALE),
            Self::Char(c) => i16::from(c) << 8,
            Self::ReproKick(s) => s,
            Self::ReproGun(s) => s >> 2,
        }
    }

    /// The angle in Q2rePRO gun angle units.
    #[must_use]
    pub fn get_repro_gun(self) -> i16 {
        match self {
            Self::Float(f) => scaled_short(f, GUNANGLE_SCALE),
            Self::Char(c) => clip16(i32::from(c) << 10),
            Self::ReproKick(s) => clip16(i32::from(s) << 2),
            Self::ReproGun(s) => s,
        }
    }
}

macro_rules! small_vector {
    ($(#[$meta:meta])* $name:ident, $comp:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq)]
        pub struct $name(pub [$comp; 3]);

        impl $name {
            /// Builds a vector of floats.
            #[must_use]
            pub fn from_floats(values: [f32; 3]) -> Self {
                Self(values.map($comp::Float))
            }

            /// Builds a vector of quarter-unit bytes.
            #[must_use]
            pub fn from_chars(values: [i8; 3]) -> Self {
                Self(values.map($comp::Char))
            }

            /// Stores a float in one component.
            #[inline]
            pub fn set_float_comp(&mut self, comp: usize, value: f32) {
                self.0[comp] = $comp::Float(value);
            }

            /// Stores a quarter-unit byte in one component.
            #[inline]
            pub fn set_char_comp(&mut self, comp: usize, value: i8) {
                self.0[comp] = $comp::Char(value);
            }

            /// One component as a float.
            #[inline]
            #[must_use]
            pub fn get_float_comp(&self, comp: usize) -> f32 {
                self.0[comp].get_float()
            }

            /// One component in quarter units.
            #[inline]
            #[must_use]
            pub fn get_char_comp(&self, comp: usize) -> i8 {
                self.0[comp].get_char()
            }

            /// All components as floats.
            #[must_use]
            pub fn get_float(&self) -> [f32; 3] {
                self.0.map($comp::get_float)
            }
        }
    };
}

small_vector!(
    /// A three-component small offset vector.
    SmallOffsets,
    SmallOffset
);

small_vector!(
    /// A three-component small angle vector.
    SmallAngles,
    SmallAngle
);

impl SmallOffsets {
    /// Stores a Q2rePRO view offset short in one component.
    #[inline]
    pub fn set_repro_viewoffset_comp(&mut self, comp: usize, value: i16) {
        self.0[comp] = SmallOffset::ReproViewOffset(value);
    }

    /// Stores a Q2rePRO gun offset short in one component.
    #[inline]
    pub fn set_repro_gunoffset_comp(&mut self, comp: usize, value: i16) {
        self.0[comp] = SmallOffset::ReproGunOffset(value);
    }

    /// One component in Q2rePRO view offset units.
    #[inline]
    #[must_use]
    pub fn get_repro_viewoffset_comp(&self, comp: usize) -> i16 {
        self.0[comp].get_repro_viewoffset()
    }

    /// One component in Q2rePRO gun offset units.
    #[inline]
    #[must_use]
    pub fn get_repro_gunoffset_comp(&self, comp: usize) -> i16 {
        self.0[comp].get_repro_gunoffset()
    }
}

impl SmallAngles {
    /// Stores a Q2rePRO kick angle short in one component.
    #[inline]
    pub fn set_repro_kick_comp(&mut self, comp: usize, value: i16) {
        self.0[comp] = SmallAngle::ReproKick(value);
    }

    /// Stores a Q2rePRO gun angle short in one component.
    #[inline]
    pub fn set_repro_gun_comp(&mut self, comp: usize, value: i16) {
        self.0[comp] = SmallAngle::ReproGun(value);
    }

    /// One component in Q2rePRO kick angle units.
    #[inline]
    #[must_use]
    pub fn get_repro_kick_comp(&self, comp: usize) -> i16 {
        self.0[comp].get_repro_kick()
    }

    /// One component in Q2rePRO gun angle units.
    #[inline]
    #[must_use]
    pub fn get_repro_gun_comp(&self, comp: usize) -> i16 {
        self.0[comp].get_repro_gun()
    }
}

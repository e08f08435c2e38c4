//! # Entity and Player Delta Compilers
//!
//! Game state is first *packed* into a protocol-specific integer form, then
//! two packed snapshots are diffed into a delta that the wire writers
//! consume.
//!
//! ```text
//! game values ──pack──▶ PackedEntityState ──┐
//!                                           ├──diff──▶ EntityStateDelta
//!           baseline (or all zero) ─────────┘
//! ```
//!
//! ## Design Philosophy
//!
//! - Packing happens once per frame; diffing happens once per client
//! - A flag is set iff its field differs from the baseline
//! - Grouped fields are re-sent whole so every protocol can encode them
//! - Pure functions: no I/O, no allocation

mod delta;
mod entity;
mod player;
mod state;

pub use delta::{
    EntityDeltaFlags, EntityStateDelta, FogDelta, FogFlags, GlobalFog, HeightFog,
    PlayerDeltaFlags, PlayerStateDelta,
};
pub use entity::make_entity_state_delta;
pub use player::make_player_state_delta;
pub use state::{PackedEntityState, PackedPlayerState, MAX_STATS};

use crate::values::scale::{angle_to_short, coord_to_int, quarter_to_char, scaled_short};
use crate::values::{
    VarCoord, VarCoords, GUNANGLE_SCALE, GUNOFFSET_SCALE, KICK_ANGLE_SCALE, VIEWOFFSET_SCALE,
};
use crate::Vec3;

/// How game values are packed for a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PackingFlavor {
    /// Coordinates as 1/8-unit integers, small vectors as quarter chars.
    #[default]
    Vanilla,
    /// Coordinates as raw IEEE float bits, small vectors as scaled shorts.
    Repro,
}

impl PackingFlavor {
    /// Packs one coordinate component.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn pack_coord(self, value: f32) -> i32 {
        match self {
            Self::Vanilla => coord_to_int(value),
            Self::Repro => value.to_bits() as i32,
        }
    }

    /// Packs a coordinate vector.
    #[must_use]
    pub fn pack_coords(self, values: Vec3) -> [i32; 3] {
        values.map(|v| self.pack_coord(v))
    }

    /// Expands a packed coordinate component back into a variant value.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn unpack_coord(self, packed: i32) -> VarCoord {
        match self {
            Self::Vanilla => VarCoord::Int(packed),
            Self::Repro => VarCoord::Float(f32::from_bits(packed as u32)),
        }
    }

    /// Expands a packed coordinate vector.
    #[must_use]
    pub fn unpack_coords(self, packed: [i32; 3]) -> VarCoords {
        VarCoords(packed.map(|p| self.unpack_coord(p)))
    }

    /// Packs angles. Both flavors use 16-bit angles.
    #[must_use]
    pub fn pack_angles(self, values: Vec3) -> [i16; 3] {
        values.map(angle_to_short)
    }

    /// Packs a view offset.
    #[must_use]
    pub fn pack_viewoffset(self, values: Vec3) -> [i16; 3] {
        self.pack_small(values, VIEWOFFSET_SCALE)
    }

    /// Packs kick angles.
    #[must_use]
    pub fn pack_kick_angles(self, values: Vec3) -> [i16; 3] {
        self.pack_small(values, KICK_ANGLE_SCALE)
    }

    /// Packs a gun offset.
    #[must_use]
    pub fn pack_gunoffset(self, values: Vec3) -> [i16; 3] {
        self.pack_small(values, GUNOFFSET_SCALE)
    }

    /// Packs gun angles.
    #[must_use]
    pub fn pack_gunangles(self, values: Vec3) -> [i16; 3] {
        self.pack_small(values, GUNANGLE_SCALE)
    }

    fn pack_small(self, values: Vec3, repro_scale: f32) -> [i16; 3] {
        values.map(|v| match self {
            Self::Vanilla => i16::from(quarter_to_char(v)),
            Self::Repro => scaled_short(v, repro_scale),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coord_flavors() {
        assert_eq!(PackingFlavor::Vanilla.pack_coord(1.5), 12);
        let bits = PackingFlavor::Repro.pack_coord(1.5);
        assert_eq!(bits, 1.5f32.to_bits() as i32);
        assert_eq!(PackingFlavor::Repro.unpack_coord(bits), VarCoord::Float(1.5));
        assert_eq!(PackingFlavor::Vanilla.unpack_coord(12), VarCoord::Int(12));
    }

    #[test]
    fn test_negative_float_bits_survive() {
        let packed = PackingFlavor::Repro.pack_coords([-0.0, -1.0, 3.25]);
        let coords = PackingFlavor::Repro.unpack_coords(packed);
        assert_eq!(coords.get_float_comp(0).to_bits(), (-0.0f32).to_bits());
        assert_eq!(coords.get_float(), [-0.0, -1.0, 3.25]);
    }

    #[test]
    fn test_small_vectors() {
        assert_eq!(PackingFlavor::Vanilla.pack_viewoffset([0.0, 0.0, 22.0]), [0, 0, 88]);
        assert_eq!(PackingFlavor::Vanilla.pack_viewoffset([0.0, 0.0, 100.0]), [0, 0, 127]);
        assert_eq!(PackingFlavor::Repro.pack_viewoffset([0.0, 0.0, 22.0]), [0, 0, 352]);
        assert_eq!(PackingFlavor::Repro.pack_kick_angles([1.0, -1.0, 0.0]), [1024, -1024, 0]);
        assert_eq!(PackingFlavor::Repro.pack_gunangles([100.0, 0.0, 0.0])[0], i16::MAX);
    }
}

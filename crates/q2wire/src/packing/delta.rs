//! Delta records produced by the compilers and consumed by the wire writers.
//!
//! The flag set says which fields carry data. Readers fill the same records,
//! so a delta can also describe what arrived on the wire.

use super::state::MAX_STATS;
use crate::values::{
    AnglesDelta, ColorDelta, MaybeDiffCoords, SmallAngles, SmallAnglesDelta, SmallOffsets,
    SmallOffsetsDelta, VarAngles, VarCoord, VarCoords, VarFraction,
};

bitflags::bitflags! {
    /// Fields set in an [`EntityStateDelta`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EntityDeltaFlags: u32 {
        /// `modelindex[0]`
        const MODELINDEX       = 0x0000_0001;
        /// `modelindex[1]`
        const MODELINDEX2      = 0x0000_0002;
        /// `modelindex[2]`
        const MODELINDEX3      = 0x0000_0004;
        /// `modelindex[3]`
        const MODELINDEX4      = 0x0000_0008;
        /// `frame`
        const FRAME            = 0x0000_0010;
        /// `skinnum`
        const SKINNUM          = 0x0000_0020;
        /// Low 32 bits of the effects.
        const EFFECTS          = 0x0000_0040;
        /// High 32 bits of the effects.
        const EFFECTS_MORE     = 0x0000_0080;
        /// `renderfx`
        const RENDERFX         = 0x0000_0100;
        /// `old_origin`
        const OLD_ORIGIN       = 0x0000_0200;
        /// `sound`
        const SOUND            = 0x0000_0400;
        /// `loop_attenuation`
        const LOOP_ATTENUATION = 0x0000_0800;
        /// `loop_volume`
        const LOOP_VOLUME      = 0x0000_1000;
        /// `event`
        const EVENT            = 0x0000_2000;
        /// `solid`
        const SOLID            = 0x0000_4000;
        /// `alpha`
        const ALPHA            = 0x0000_8000;
        /// `scale`
        const SCALE            = 0x0001_0000;
    }
}

bitflags::bitflags! {
    /// Fields set in a [`PlayerStateDelta`].
    ///
    /// Origin, velocity, view angles, blends and stats carry their own
    /// per-component bits instead.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PlayerDeltaFlags: u32 {
        /// `pm_type`
        const PM_TYPE         = 0x0000_0001;
        /// `pm_time`
        const PM_TIME         = 0x0000_0002;
        /// `pm_flags`
        const PM_FLAGS        = 0x0000_0004;
        /// `pm_gravity`
        const PM_GRAVITY      = 0x0000_0008;
        /// `pm_delta_angles`
        const PM_DELTA_ANGLES = 0x0000_0010;
        /// `pm_viewheight`
        const PM_VIEWHEIGHT   = 0x0000_0020;
        /// `viewoffset`
        const VIEWOFFSET      = 0x0000_0040;
        /// `kick_angles`
        const KICKANGLES      = 0x0000_0080;
        /// `gunindex`; travels together with `gunskin`.
        const GUNINDEX        = 0x0000_0100;
        /// `gunskin`; travels together with `gunindex`.
        const GUNSKIN         = 0x0000_0200;
        /// `gunframe`; travels together with gun offset, angles and rate.
        const GUNFRAME        = 0x0000_0400;
        /// `fov`
        const FOV             = 0x0000_0800;
        /// `rdflags`
        const RDFLAGS         = 0x0000_1000;
        /// `gunrate`
        const GUNRATE         = 0x0000_2000;
        /// `clientnum`
        const CLIENTNUM       = 0x0000_4000;
    }
}

bitflags::bitflags! {
    /// Fields set in a [`FogDelta`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FogFlags: u32 {
        /// Global density and sky factor.
        const DENSITY_SKYFACTOR    = 0x01;
        /// Global transition time.
        const TIME                 = 0x02;
        /// Height fog falloff.
        const HEIGHTFOG_FALLOFF    = 0x04;
        /// Height fog density.
        const HEIGHTFOG_DENSITY    = 0x08;
        /// Height fog start distance.
        const HEIGHTFOG_START_DIST = 0x10;
        /// Height fog end distance.
        const HEIGHTFOG_END_DIST   = 0x20;
    }
}

/// Changed entity fields.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EntityStateDelta {
    /// Which scalar fields are set.
    pub bits: EntityDeltaFlags,
    /// Model indices 1-4.
    pub modelindex: [u16; 4],
    /// Animation frame.
    pub frame: u16,
    /// Skin number.
    pub skinnum: u32,
    /// Low 32 bits of the effects.
    pub effects: u32,
    /// High 32 bits of the effects.
    pub effects_more: u32,
    /// Render effects.
    pub renderfx: u32,
    /// Origin; components that changed are derived from prev/current.
    pub origin: MaybeDiffCoords,
    /// Changed angle components.
    pub angle: AnglesDelta,
    /// Previous origin.
    pub old_origin: VarCoords,
    /// Looping sound.
    pub sound: u16,
    /// Looping sound volume.
    pub loop_volume: u8,
    /// Looping sound attenuation.
    pub loop_attenuation: u8,
    /// One-shot event.
    pub event: u8,
    /// Packed bounding box.
    pub solid: u32,
    /// Alpha.
    pub alpha: u8,
    /// Scale.
    pub scale: u8,
}

impl EntityStateDelta {
    /// True if nothing at all would be sent for the entity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty() && self.angle.is_empty() && self.origin.write_differs_int() == 0
    }

    /// Full 64-bit effects value.
    #[inline]
    #[must_use]
    pub fn effects64(&self) -> u64 {
        u64::from(self.effects) | (u64::from(self.effects_more) << 32)
    }
}

/// Global fog parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GlobalFog {
    /// Density.
    pub density: VarFraction,
    /// Sky factor.
    pub skyfactor: VarFraction,
    /// Color; alpha is ignored.
    pub color: ColorDelta,
    /// Transition time in milliseconds.
    pub time: u16,
}

/// Height fog parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeightFog {
    /// Falloff.
    pub falloff: VarFraction,
    /// Density.
    pub density: VarFraction,
    /// Start color; alpha is ignored.
    pub start_color: ColorDelta,
    /// Start distance.
    pub start_dist: VarCoord,
    /// End color; alpha is ignored.
    pub end_color: ColorDelta,
    /// End distance.
    pub end_dist: VarCoord,
}

/// Changed fog fields.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FogDelta {
    /// Which scalar fog fields are set. Colors carry their own bits.
    pub flags: FogFlags,
    /// Global fog.
    pub global: GlobalFog,
    /// Height fog.
    pub height: HeightFog,
}

impl FogDelta {
    /// True if no fog field changed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.flags.is_empty()
            && self.global.color.is_empty()
            && self.height.start_color.is_empty()
            && self.height.end_color.is_empty()
    }
}

/// Changed player fields.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayerStateDelta {
    /// Which scalar fields are set.
    pub bits: PlayerDeltaFlags,
    /// Movement type.
    pub pm_type: u8,
    /// Movement origin.
    pub pm_origin: MaybeDiffCoords,
    /// Movement velocity.
    pub pm_velocity: MaybeDiffCoords,
    /// Movement timer.
    pub pm_time: u16,
    /// Movement flags.
    pub pm_flags: u16,
    /// Gravity.
    pub pm_gravity: i16,
    /// Delta angles.
    pub pm_delta_angles: VarAngles,
    /// Rerelease view height.
    pub pm_viewheight: i8,
    /// View offset.
    pub viewoffset: SmallOffsets,
    /// Changed view angle components.
    pub viewangles: AnglesDelta,
    /// Kick angles.
    pub kick_angles: SmallAngles,
    /// Weapon model index.
    pub gunindex: u16,
    /// Weapon skin.
    pub gunskin: u8,
    /// Weapon frame.
    pub gunframe: u16,
    /// Weapon offset; bits mark changed components, values are always full.
    pub gunoffset: SmallOffsetsDelta,
    /// Weapon angles; bits mark changed components, values are always full.
    pub gunangles: SmallAnglesDelta,
    /// Screen blend.
    pub blend: ColorDelta,
    /// Damage blend.
    pub damage_blend: ColorDelta,
    /// Field of view.
    pub fov: u8,
    /// Render flags.
    pub rdflags: u8,
    /// Bit per stat that changed.
    pub statbits: u64,
    /// Stats; only flagged slots are meaningful.
    pub stats: [i16; MAX_STATS],
    /// Weapon animation rate.
    pub gunrate: u8,
    /// Client number.
    pub clientnum: i16,
    /// Player fog.
    pub fog: FogDelta,
}

impl Default for PlayerStateDelta {
    fn default() -> Self {
        Self {
            bits: PlayerDeltaFlags::empty(),
            pm_type: 0,
            pm_origin: MaybeDiffCoords::default(),
            pm_velocity: MaybeDiffCoords::default(),
            pm_time: 0,
            pm_flags: 0,
            pm_gravity: 0,
            pm_delta_angles: VarAngles::default(),
            pm_viewheight: 0,
            viewoffset: SmallOffsets::default(),
            viewangles: AnglesDelta::default(),
            kick_angles: SmallAngles::default(),
            gunindex: 0,
            gunskin: 0,
            gunframe: 0,
            gunoffset: SmallOffsetsDelta::default(),
            gunangles: SmallAnglesDelta::default(),
            blend: ColorDelta::default(),
            damage_blend: ColorDelta::default(),
            fov: 0,
            rdflags: 0,
            statbits: 0,
            stats: [0; MAX_STATS],
            gunrate: 0,
            clientnum: 0,
            fog: FogDelta::default(),
        }
    }
}

impl PlayerStateDelta {
    /// True if the gun frame group (frame, offset, angles, rate) is carried.
    #[must_use]
    pub const fn has_gun_group(&self) -> bool {
        self.bits
            .intersects(PlayerDeltaFlags::GUNFRAME.union(PlayerDeltaFlags::GUNRATE))
            || !self.gunoffset.is_empty()
            || !self.gunangles.is_empty()
    }

    /// Iterates over the changed stats as `(index, value)`.
    pub fn changed_stats(&self) -> impl Iterator<Item = (usize, i16)> + '_ {
        (0..MAX_STATS)
            .filter(move |&i| self.statbits & (1 << i) != 0)
            .map(move |i| (i, self.stats[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_values() {
        assert_eq!(EntityDeltaFlags::OLD_ORIGIN.bits(), 0x200);
        assert_eq!(EntityDeltaFlags::SCALE.bits(), 0x10000);
        assert_eq!(PlayerDeltaFlags::CLIENTNUM.bits(), 0x4000);
        assert_eq!(FogFlags::HEIGHTFOG_END_DIST.bits(), 0x20);
    }

    #[test]
    fn test_effects64() {
        let delta = EntityStateDelta {
            effects: 0x1234,
            effects_more: 0x8000_0000,
            ..EntityStateDelta::default()
        };
        assert_eq!(delta.effects64(), 0x8000_0000_0000_1234);
    }

    #[test]
    fn test_changed_stats() {
        let mut delta = PlayerStateDelta::default();
        delta.statbits = (1 << 3) | (1 << 63);
        delta.stats[3] = 7;
        delta.stats[63] = -1;
        let changed: Vec<_> = delta.changed_stats().collect();
        assert_eq!(changed, vec![(3, 7), (63, -1)]);
    }

    #[test]
    fn test_gun_group() {
        let mut delta = PlayerStateDelta::default();
        assert!(!delta.has_gun_group());
        delta.gunangles.delta_bits = 0b010;
        assert!(delta.has_gun_group());
        assert!(FogDelta::default().is_empty());
    }
}

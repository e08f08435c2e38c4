//! Packed snapshots: the per-frame integer form that deltas are built from.

use bytemuck::Zeroable;

/// Number of stat slots a player carries.
pub const MAX_STATS: usize = 64;

/// Entity state after packing.
///
/// Coordinates hold 1/8-unit integers or raw float bits depending on the
/// [`PackingFlavor`](super::PackingFlavor) that produced them. Only diff
/// states packed with the same flavor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable)]
pub struct PackedEntityState {
    /// Model indices 1-4.
    pub modelindex: [u16; 4],
    /// Animation frame.
    pub frame: u16,
    /// Skin number (laser colors use all 32 bits).
    pub skinnum: u32,
    /// Effects; the upper half only exists for extended games.
    pub effects: u64,
    /// Render effects.
    pub renderfx: u32,
    /// Origin.
    pub origin: [i32; 3],
    /// Angles in 1/65536 turns.
    pub angles: [i16; 3],
    /// Previous origin for lerping and beams.
    pub old_origin: [i32; 3],
    /// Looping sound index.
    pub sound: u16,
    /// Looping sound volume (0 = default).
    pub loop_volume: u8,
    /// Looping sound attenuation (0 = default).
    pub loop_attenuation: u8,
    /// One-shot event.
    pub event: u8,
    /// Packed bounding box.
    pub solid: u32,
    /// Alpha (0 = opaque).
    pub alpha: u8,
    /// Scale (0 = 1.0).
    pub scale: u8,
}

/// Player state after packing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Zeroable)]
pub struct PackedPlayerState {
    /// Movement type.
    pub pm_type: u8,
    /// Movement origin.
    pub pm_origin: [i32; 3],
    /// Movement velocity.
    pub pm_velocity: [i32; 3],
    /// Movement timer.
    pub pm_time: u16,
    /// Movement flags.
    pub pm_flags: u16,
    /// Gravity.
    pub pm_gravity: i16,
    /// Delta angles in 1/65536 turns.
    pub pm_delta_angles: [i16; 3],
    /// Rerelease view height.
    pub pm_viewheight: i8,
    /// View offset.
    pub viewoffset: [i16; 3],
    /// View angles in 1/65536 turns.
    pub viewangles: [i16; 3],
    /// Kick angles.
    pub kick_angles: [i16; 3],
    /// Weapon model index.
    pub gunindex: u16,
    /// Weapon skin.
    pub gunskin: u8,
    /// Weapon frame.
    pub gunframe: u16,
    /// Weapon offset.
    pub gunoffset: [i16; 3],
    /// Weapon angles.
    pub gunangles: [i16; 3],
    /// Weapon animation rate.
    pub gunrate: u8,
    /// Screen blend RGBA.
    pub blend: [u8; 4],
    /// Damage blend RGBA.
    pub damage_blend: [u8; 4],
    /// Field of view.
    pub fov: u8,
    /// Render flags.
    pub rdflags: u8,
    /// HUD stats.
    pub stats: [i16; MAX_STATS],
    /// Global fog color.
    pub fog_color: [u8; 3],
    /// Global fog density in 1/65535 units.
    pub fog_density: u16,
    /// Global fog sky factor in 1/65535 units.
    pub fog_skyfactor: u16,
    /// Height fog start color.
    pub heightfog_start_color: [u8; 3],
    /// Height fog end color.
    pub heightfog_end_color: [u8; 3],
    /// Height fog density in 1/65535 units.
    pub heightfog_density: u16,
    /// Height fog falloff in 1/65535 units.
    pub heightfog_falloff: u16,
    /// Height fog start distance.
    pub heightfog_start_dist: i32,
    /// Height fog end distance.
    pub heightfog_end_dist: i32,
}

impl Default for PackedPlayerState {
    fn default() -> Self {
        Self::zeroed()
    }
}

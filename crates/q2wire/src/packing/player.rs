//! Player state diffing.

use super::delta::{FogDelta, FogFlags, PlayerDeltaFlags, PlayerStateDelta};
use super::state::{PackedPlayerState, MAX_STATS};
use super::PackingFlavor;
use crate::values::scale::clip8;
use crate::values::{
    component_bits, AnglesDelta, ColorDelta, MaybeDiffCoords, SmallAngles, SmallOffsets,
    VarAngles, VarColor, VarCoord, VarFraction,
};

/// Builds the delta that turns `from` into `to`.
///
/// A missing `from` diffs against the all-zero baseline. The fog block is
/// only diffed when `fog_enabled`; otherwise it stays empty.
#[must_use]
pub fn make_player_state_delta(
    flavor: PackingFlavor,
    from: Option<&PackedPlayerState>,
    to: &PackedPlayerState,
    fog_enabled: bool,
) -> PlayerStateDelta {
    let null = PackedPlayerState::default();
    let from = from.unwrap_or(&null);

    let mut delta = PlayerStateDelta {
        pm_origin: MaybeDiffCoords::Write {
            prev: flavor.unpack_coords(from.pm_origin),
            current: flavor.unpack_coords(to.pm_origin),
        },
        pm_velocity: MaybeDiffCoords::Write {
            prev: flavor.unpack_coords(from.pm_velocity),
            current: flavor.unpack_coords(to.pm_velocity),
        },
        viewangles: AnglesDelta {
            delta_bits: component_bits(3, |c| to.viewangles[c] != from.viewangles[c]),
            values: VarAngles::from_shorts(to.viewangles),
        },
        blend: color_delta(&from.blend, &to.blend),
        damage_blend: color_delta(&from.damage_blend, &to.damage_blend),
        ..PlayerStateDelta::default()
    };
    let bits = &mut delta.bits;

    if to.pm_type != from.pm_type {
        *bits |= PlayerDeltaFlags::PM_TYPE;
        delta.pm_type = to.pm_type;
    }
    if to.pm_time != from.pm_time {
        *bits |= PlayerDeltaFlags::PM_TIME;
        delta.pm_time = to.pm_time;
    }
    if to.pm_flags != from.pm_flags {
        *bits |= PlayerDeltaFlags::PM_FLAGS;
        delta.pm_flags = to.pm_flags;
    }
    if to.pm_gravity != from.pm_gravity {
        *bits |= PlayerDeltaFlags::PM_GRAVITY;
        delta.pm_gravity = to.pm_gravity;
    }
    if to.pm_delta_angles != from.pm_delta_angles {
        *bits |= PlayerDeltaFlags::PM_DELTA_ANGLES;
        delta.pm_delta_angles = VarAngles::from_shorts(to.pm_delta_angles);
    }
    if to.pm_viewheight != from.pm_viewheight {
        *bits |= PlayerDeltaFlags::PM_VIEWHEIGHT;
        delta.pm_viewheight = to.pm_viewheight;
    }
    if to.viewoffset != from.viewoffset {
        *bits |= PlayerDeltaFlags::VIEWOFFSET;
        delta.viewoffset = small_offsets(flavor, to.viewoffset, false);
    }
    if to.kick_angles != from.kick_angles {
        *bits |= PlayerDeltaFlags::KICKANGLES;
        delta.kick_angles = small_angles(flavor, to.kick_angles, false);
    }
    if to.fov != from.fov {
        *bits |= PlayerDeltaFlags::FOV;
        delta.fov = to.fov;
    }
    if to.rdflags != from.rdflags {
        *bits |= PlayerDeltaFlags::RDFLAGS;
        delta.rdflags = to.rdflags;
    }

    // Gun frame, offset and angles go out as one unit. Q2rePRO sends the
    // rate on its own; everyone else folds it into the same unit.
    if to.gunframe != from.gunframe {
        *bits |= PlayerDeltaFlags::GUNFRAME;
    }
    let rate_changed = to.gunrate != from.gunrate;
    if rate_changed {
        *bits |= PlayerDeltaFlags::GUNRATE;
    }
    delta.gunoffset.delta_bits = component_bits(3, |c| to.gunoffset[c] != from.gunoffset[c]);
    delta.gunangles.delta_bits = component_bits(3, |c| to.gunangles[c] != from.gunangles[c]);
    let group_flags = match flavor {
        PackingFlavor::Vanilla => PlayerDeltaFlags::GUNFRAME | PlayerDeltaFlags::GUNRATE,
        PackingFlavor::Repro => PlayerDeltaFlags::GUNFRAME,
    };
    if bits.intersects(group_flags) || !delta.gunoffset.is_empty() || !delta.gunangles.is_empty()
    {
        delta.gunframe = to.gunframe;
        delta.gunoffset.values = small_offsets(flavor, to.gunoffset, true);
        delta.gunangles.values = small_angles(flavor, to.gunangles, true);
        if flavor == PackingFlavor::Vanilla {
            delta.gunrate = to.gunrate;
        }
    }
    if flavor == PackingFlavor::Repro && rate_changed {
        delta.gunrate = to.gunrate;
    }

    if to.gunindex != from.gunindex {
        *bits |= PlayerDeltaFlags::GUNINDEX;
    }
    if to.gunskin != from.gunskin {
        *bits |= PlayerDeltaFlags::GUNSKIN;
    }
    if bits.intersects(PlayerDeltaFlags::GUNINDEX | PlayerDeltaFlags::GUNSKIN) {
        delta.gunindex = to.gunindex;
        delta.gunskin = to.gunskin;
    }

    for stat in 0..MAX_STATS {
        if to.stats[stat] != from.stats[stat] {
            delta.statbits |= 1 << stat;
            delta.stats[stat] = to.stats[stat];
        }
    }

    if fog_enabled {
        delta.fog = fog_delta(from, to);
    }

    delta
}

fn color_delta<const N: usize>(from: &[u8; N], to: &[u8; N]) -> ColorDelta {
    let delta_bits = component_bits(N, |c| to[c] != from[c]);
    let mut values = VarColor::default();
    if delta_bits != 0 {
        for (c, &byte) in to.iter().enumerate() {
            values.set_byte_comp(c, byte);
        }
    }
    ColorDelta { delta_bits, values }
}

fn small_offsets(flavor: PackingFlavor, packed: [i16; 3], gun: bool) -> SmallOffsets {
    let mut offsets = SmallOffsets::default();
    for (c, &value) in packed.iter().enumerate() {
        match (flavor, gun) {
            (PackingFlavor::Vanilla, _) => offsets.set_char_comp(c, clip8(i32::from(value))),
            (PackingFlavor::Repro, false) => offsets.set_repro_viewoffset_comp(c, value),
            (PackingFlavor::Repro, true) => offsets.set_repro_gunoffset_comp(c, value),
        }
    }
    offsets
}

fn small_angles(flavor: PackingFlavor, packed: [i16; 3], gun: bool) -> SmallAngles {
    let mut angles = SmallAngles::default();
    for (c, &value) in packed.iter().enumerate() {
        match (flavor, gun) {
            (PackingFlavor::Vanilla, _) => angles.set_char_comp(c, clip8(i32::from(value))),
            (PackingFlavor::Repro, false) => angles.set_repro_kick_comp(c, value),
            (PackingFlavor::Repro, true) => angles.set_repro_gun_comp(c, value),
        }
    }
    angles
}

fn fog_delta(from: &PackedPlayerState, to: &PackedPlayerState) -> FogDelta {
    let mut fog = FogDelta::default();

    fog.global.color = color_delta(&from.fog_color, &to.fog_color);
    if from.fog_density != to.fog_density || from.fog_skyfactor != to.fog_skyfactor {
        fog.flags |= FogFlags::DENSITY_SKYFACTOR;
        fog.global.density = VarFraction::Word(to.fog_density);
        fog.global.skyfactor = VarFraction::Word(to.fog_skyfactor);
    }

    fog.height.start_color = color_delta(&from.heightfog_start_color, &to.heightfog_start_color);
    fog.height.end_color = color_delta(&from.heightfog_end_color, &to.heightfog_end_color);
    if from.heightfog_density != to.heightfog_density {
        fog.flags |= FogFlags::HEIGHTFOG_DENSITY;
        fog.height.density = VarFraction::Word(to.heightfog_density);
    }
    if from.heightfog_falloff != to.heightfog_falloff {
        fog.flags |= FogFlags::HEIGHTFOG_FALLOFF;
        fog.height.falloff = VarFraction::Word(to.heightfog_falloff);
    }
    if from.heightfog_start_dist != to.heightfog_start_dist {
        fog.flags |= FogFlags::HEIGHTFOG_START_DIST;
        fog.height.start_dist = VarCoord::Int(to.heightfog_start_dist);
    }
    if from.heightfog_end_dist != to.heightfog_end_dist {
        fog.flags |= FogFlags::HEIGHTFOG_END_DIST;
        fog.height.end_dist = VarCoord::Int(to.heightfog_end_dist);
    }

    fog
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PackedPlayerState {
        let mut state = PackedPlayerState {
            pm_type: 0,
            pm_origin: [800, -400, 64],
            pm_velocity: [0, 0, -32],
            pm_gravity: 800,
            viewoffset: [0, 0, 88],
            viewangles: [100, 200, 0],
            gunindex: 5,
            gunframe: 12,
            fov: 90,
            fog_density: 0x4000,
            ..PackedPlayerState::default()
        };
        state.stats[1] = 100;
        state
    }

    #[test]
    fn test_self_diff_is_empty() {
        let state = sample();
        for flavor in [PackingFlavor::Vanilla, PackingFlavor::Repro] {
            let delta = make_player_state_delta(flavor, Some(&state), &state, true);
            assert!(delta.bits.is_empty());
            assert_eq!(delta.statbits, 0);
            assert!(delta.viewangles.is_empty());
            assert!(delta.blend.is_empty());
            assert!(delta.fog.is_empty());
            assert!(!delta.has_gun_group());
            assert_eq!(delta.pm_origin.write_differs_int(), 0);
        }
    }

    #[test]
    fn test_gun_group_resent_whole() {
        let from = sample();
        let mut to = from;
        to.gunoffset[1] = 4;
        let delta = make_player_state_delta(PackingFlavor::Vanilla, Some(&from), &to, false);
        assert!(!delta.bits.contains(PlayerDeltaFlags::GUNFRAME));
        assert_eq!(delta.gunoffset.delta_bits, 0b010);
        assert!(delta.has_gun_group());
        // Unchanged members of the group still carry the new state.
        assert_eq!(delta.gunframe, 12);
        assert_eq!(delta.gunoffset.values.get_char_comp(1), 4);
    }

    #[test]
    fn test_gunrate_grouping_by_flavor() {
        let from = sample();
        let to = PackedPlayerState { gunrate: 20, ..from };

        let vanilla = make_player_state_delta(PackingFlavor::Vanilla, Some(&from), &to, false);
        assert_eq!(vanilla.bits, PlayerDeltaFlags::GUNRATE);
        assert_eq!(vanilla.gunframe, 12);
        assert_eq!(vanilla.gunrate, 20);

        let repro = make_player_state_delta(PackingFlavor::Repro, Some(&from), &to, false);
        assert_eq!(repro.bits, PlayerDeltaFlags::GUNRATE);
        assert_eq!(repro.gunframe, 0);
        assert_eq!(repro.gunrate, 20);
    }

    #[test]
    fn test_gunindex_and_skin_travel_together() {
        let from = sample();
        let to = PackedPlayerState { gunskin: 2, ..from };
        let delta = make_player_state_delta(PackingFlavor::Vanilla, Some(&from), &to, false);
        assert_eq!(delta.bits, PlayerDeltaFlags::GUNSKIN);
        assert_eq!(delta.gunindex, 5);
        assert_eq!(delta.gunskin, 2);
    }

    #[test]
    fn test_against_null_baseline() {
        let state = sample();
        let delta = make_player_state_delta(PackingFlavor::Vanilla, None, &state, false);
        assert!(delta.bits.contains(
            PlayerDeltaFlags::PM_GRAVITY
                | PlayerDeltaFlags::VIEWOFFSET
                | PlayerDeltaFlags::GUNINDEX
                | PlayerDeltaFlags::GUNFRAME
                | PlayerDeltaFlags::FOV
        ));
        assert_eq!(delta.statbits, 1 << 1);
        assert_eq!(delta.stats[1], 100);
        assert_eq!(delta.viewangles.delta_bits, 0b011);
        assert_eq!(delta.pm_origin.write_differs_int(), 0b111);
        assert_eq!(delta.pm_velocity.write_differs_int(), 0b100);
        assert_eq!(delta.viewoffset.get_char_comp(2), 88);
        assert!(delta.fog.is_empty());
    }

    #[test]
    fn test_fog_only_when_enabled() {
        let from = sample();
        let mut to = from;
        to.fog_color = [255, 0, 0];
        to.heightfog_end_dist = 4096;
        let off = make_player_state_delta(PackingFlavor::Vanilla, Some(&from), &to, false);
        assert!(off.fog.is_empty());

        let on = make_player_state_delta(PackingFlavor::Vanilla, Some(&from), &to, true);
        assert_eq!(on.fog.global.color.delta_bits, 0b001);
        assert_eq!(on.fog.flags, FogFlags::HEIGHTFOG_END_DIST);
        assert_eq!(on.fog.height.end_dist, VarCoord::Int(4096));
    }

    #[test]
    fn test_repro_small_vectors() {
        let flavor = PackingFlavor::Repro;
        let to = PackedPlayerState {
            viewoffset: flavor.pack_viewoffset([0.0, 0.0, 22.0]),
            kick_angles: flavor.pack_kick_angles([1.0, 0.0, 0.0]),
            ..PackedPlayerState::default()
        };
        let delta = make_player_state_delta(flavor, None, &to, false);
        assert!((delta.viewoffset.get_float_comp(2) - 22.0).abs() < f32::EPSILON);
        assert!((delta.kick_angles.get_float_comp(0) - 1.0).abs() < f32::EPSILON);
        assert_eq!(delta.viewoffset.get_char_comp(2), 88);
    }
}

//! Entity state diffing.

use super::delta::{EntityDeltaFlags, EntityStateDelta};
use super::state::PackedEntityState;
use super::PackingFlavor;
use crate::values::{component_bits, AnglesDelta, MaybeDiffCoords, VarAngles};

/// Builds the delta that turns `from` into `to`.
///
/// A missing `from` diffs against the all-zero baseline. `extended` enables
/// the upper effects word, loop volume/attenuation, alpha and scale; the
/// [`PackingFlavor::Repro`] flavor always diffs them.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn make_entity_state_delta(
    flavor: PackingFlavor,
    from: Option<&PackedEntityState>,
    to: &PackedEntityState,
    write_old_origin: bool,
    extended: bool,
) -> EntityStateDelta {
    let null = PackedEntityState::default();
    let from = from.unwrap_or(&null);
    let extended = extended || flavor == PackingFlavor::Repro;

    let mut delta = EntityStateDelta {
        origin: MaybeDiffCoords::Write {
            prev: flavor.unpack_coords(from.origin),
            current: flavor.unpack_coords(to.origin),
        },
        angle: AnglesDelta {
            delta_bits: component_bits(3, |c| to.angles[c] != from.angles[c]),
            values: VarAngles::from_shorts(to.angles),
        },
        ..EntityStateDelta::default()
    };
    let bits = &mut delta.bits;

    if write_old_origin {
        *bits |= EntityDeltaFlags::OLD_ORIGIN;
        delta.old_origin = flavor.unpack_coords(to.old_origin);
    }

    if to.skinnum != from.skinnum {
        *bits |= EntityDeltaFlags::SKINNUM;
        delta.skinnum = to.skinnum;
    }
    if to.frame != from.frame {
        *bits |= EntityDeltaFlags::FRAME;
        delta.frame = to.frame;
    }

    // The two effects words are flagged independently but always travel together.
    if to.effects as u32 != from.effects as u32 {
        *bits |= EntityDeltaFlags::EFFECTS;
    }
    if extended && (to.effects >> 32) != (from.effects >> 32) {
        *bits |= EntityDeltaFlags::EFFECTS_MORE;
    }
    if bits.intersects(EntityDeltaFlags::EFFECTS | EntityDeltaFlags::EFFECTS_MORE) {
        delta.effects = to.effects as u32;
        delta.effects_more = (to.effects >> 32) as u32;
    }

    if to.renderfx != from.renderfx {
        *bits |= EntityDeltaFlags::RENDERFX;
        delta.renderfx = to.renderfx;
    }
    if to.solid != from.solid {
        *bits |= EntityDeltaFlags::SOLID;
        delta.solid = to.solid;
    }

    // Events only last one frame, so they are compared against zero.
    if to.event != 0 {
        *bits |= EntityDeltaFlags::EVENT;
        delta.event = to.event;
    }

    for (model, flag) in [
        EntityDeltaFlags::MODELINDEX,
        EntityDeltaFlags::MODELINDEX2,
        EntityDeltaFlags::MODELINDEX3,
        EntityDeltaFlags::MODELINDEX4,
    ]
    .into_iter()
    .enumerate()
    {
        if to.modelindex[model] != from.modelindex[model] {
            *bits |= flag;
            delta.modelindex[model] = to.modelindex[model];
        }
    }

    if to.sound != from.sound {
        *bits |= EntityDeltaFlags::SOUND;
        delta.sound = to.sound;
    }

    if extended {
        if to.loop_volume != from.loop_volume {
            *bits |= EntityDeltaFlags::LOOP_VOLUME;
            delta.loop_volume = to.loop_volume;
        }
        if to.loop_attenuation != from.loop_attenuation {
            *bits |= EntityDeltaFlags::LOOP_ATTENUATION;
            delta.loop_attenuation = to.loop_attenuation;
        }
        if to.alpha != from.alpha {
            *bits |= EntityDeltaFlags::ALPHA;
            delta.alpha = to.alpha;
        }
        if to.scale != from.scale {
            *bits |= EntityDeltaFlags::SCALE;
            delta.scale = to.scale;
        }
    }

    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::VarCoord;

    fn sample() -> PackedEntityState {
        PackedEntityState {
            modelindex: [1, 2, 0, 0],
            frame: 7,
            skinnum: 3,
            effects: 0x0000_0001_0000_0040,
            renderfx: 0x10,
            origin: [80, -160, 24],
            angles: [0, 0x4000, 0],
            old_origin: [72, -160, 24],
            sound: 12,
            loop_volume: 200,
            loop_attenuation: 3,
            event: 0,
            solid: 8290,
            alpha: 128,
            scale: 32,
        }
    }

    #[test]
    fn test_self_diff_is_empty() {
        let state = sample();
        for flavor in [PackingFlavor::Vanilla, PackingFlavor::Repro] {
            let delta = make_entity_state_delta(flavor, Some(&state), &state, false, true);
            assert!(delta.bits.is_empty());
            assert!(delta.is_empty());
        }
    }

    #[test]
    fn test_event_always_flagged() {
        let state = PackedEntityState {
            event: 1,
            ..sample()
        };
        let delta = make_entity_state_delta(PackingFlavor::Vanilla, Some(&state), &state, false, false);
        assert_eq!(delta.bits, EntityDeltaFlags::EVENT);
        assert_eq!(delta.event, 1);
    }

    #[test]
    fn test_against_null_baseline() {
        let state = sample();
        let delta = make_entity_state_delta(PackingFlavor::Vanilla, None, &state, true, false);
        let expected = EntityDeltaFlags::MODELINDEX
            | EntityDeltaFlags::MODELINDEX2
            | EntityDeltaFlags::FRAME
            | EntityDeltaFlags::SKINNUM
            | EntityDeltaFlags::EFFECTS
            | EntityDeltaFlags::RENDERFX
            | EntityDeltaFlags::OLD_ORIGIN
            | EntityDeltaFlags::SOUND
            | EntityDeltaFlags::SOLID;
        assert_eq!(delta.bits, expected);
        assert_eq!(delta.angle.delta_bits, 0b010);
        assert_eq!(delta.origin.write_differs_int(), 0b111);
        assert_eq!(delta.old_origin.get_int(), [72, -160, 24]);
        assert_eq!(delta.effects64(), 0x0000_0001_0000_0040);
    }

    #[test]
    fn test_extended_gates() {
        let from = sample();
        let to = PackedEntityState {
            effects: 0x0000_0002_0000_0040,
            loop_volume: 100,
            loop_attenuation: 0,
            alpha: 255,
            scale: 16,
            ..from
        };
        let plain = make_entity_state_delta(PackingFlavor::Vanilla, Some(&from), &to, false, false);
        assert!(plain.bits.is_empty());

        let extended = make_entity_state_delta(PackingFlavor::Vanilla, Some(&from), &to, false, true);
        assert_eq!(
            extended.bits,
            EntityDeltaFlags::EFFECTS_MORE
                | EntityDeltaFlags::LOOP_VOLUME
                | EntityDeltaFlags::LOOP_ATTENUATION
                | EntityDeltaFlags::ALPHA
                | EntityDeltaFlags::SCALE
        );
        // Both words are carried even though only the upper one changed.
        assert_eq!(extended.effects, 0x40);
        assert_eq!(extended.effects_more, 2);
    }

    #[test]
    fn test_repro_carries_float_bits() {
        let flavor = PackingFlavor::Repro;
        let to = PackedEntityState {
            origin: flavor.pack_coords([1.25, -3.0, 0.0]),
            alpha: 10,
            ..PackedEntityState::default()
        };
        let delta = make_entity_state_delta(flavor, None, &to, false, false);
        match delta.origin {
            MaybeDiffCoords::Write { current, .. } => {
                assert_eq!(current.0[0], VarCoord::Float(1.25));
                assert_eq!(current.0[1], VarCoord::Float(-3.0));
            }
            MaybeDiffCoords::Read { .. } => panic!("expected sender coords"),
        }
        assert_eq!(delta.origin.write_differs_float(), 0b011);
        assert!(delta.bits.contains(EntityDeltaFlags::ALPHA));
    }
}

//! # Q2rePRO Records
//!
//! Protocol 1038 serves rerelease games to Q2PRO-derived clients. Its
//! records follow the Q2PRO extended layouts with a few differences:
//! coordinates are IEEE floats, view and kick offsets keep 16 bits of
//! precision, the view height and gun animation rate travel separately,
//! and every extended entity field is always available.

use crate::entity_bits::{
    choose_width_flags, read_entity_bits, write_entity_bits, ANGLE_BITS, MODEL_BITS,
    ORIGIN_BITS, U_ALPHA, U_ANGLE16, U_EFFECTS16, U_EFFECTS8, U_EVENT, U_FRAME16, U_FRAME8,
    U_MODEL16, U_MOREFX16, U_MOREFX8, U_OLDORIGIN, U_RENDERFX16, U_RENDERFX8, U_SCALE,
    U_SKIN16, U_SKIN8, U_SOLID, U_SOUND,
};
use crate::error::{WireError, WireResult};
use crate::frame::{
    decode_frame_number, encode_frame_number, read_areabits, write_areabits, FrameHeader,
};
use crate::io::{WireRead, WireWrite};
use crate::messages::{SVC_FRAME, SVC_SPAWNBASELINE};
use crate::packing::{
    EntityDeltaFlags, EntityStateDelta, PlayerDeltaFlags, PlayerStateDelta, MAX_STATS,
};
use crate::q2pro::{
    check_gun_word, gun_word, read_entity_scalars, read_extended_fields, read_extv2_blends,
    read_loop_sound, read_models, set_gun_word, write_entity_scalars, write_extended_fields,
    write_extv2_blends, write_loop_sound, write_models, EPS_CLIENTNUM, EPS_GUNANGLES,
    EPS_GUNOFFSET, EPS_GUNRATE, EPS_M_ORIGIN2, EPS_M_VELOCITY2, EPS_STATS, EPS_VIEWANGLE2,
    SOUND_INDEX_MASK,
};
use crate::values::{MaybeDiffCoords, VarCoords};
use crate::vanilla::{
    PS_BLEND, PS_FOV, PS_KICKANGLES, PS_M_DELTA_ANGLES, PS_M_FLAGS, PS_M_GRAVITY, PS_M_ORIGIN,
    PS_M_TIME, PS_M_TYPE, PS_M_VELOCITY, PS_RDFLAGS, PS_VIEWANGLES, PS_VIEWOFFSET,
    PS_WEAPONFRAME, PS_WEAPONINDEX,
};

/// Player state: the view height follows the client number.
pub const PS_RR_VIEWHEIGHT: u16 = 1 << 15;

fn entity_header_bits(delta: &EntityStateDelta) -> WireResult<u64> {
    let flags = delta.bits;
    let mut bits = 0u64;

    let origin_changes = delta.origin.write_differs_int();
    for (comp, flag) in ORIGIN_BITS.into_iter().enumerate() {
        if origin_changes & (1 << comp) != 0 {
            bits |= flag;
        }
    }
    for (comp, flag) in ANGLE_BITS.into_iter().enumerate() {
        if delta.angle.has(comp) {
            bits |= flag | U_ANGLE16;
        }
    }

    if flags.contains(EntityDeltaFlags::SKINNUM) {
        bits |= choose_width_flags(delta.skinnum, U_SKIN8, U_SKIN16, true);
    }
    if flags.contains(EntityDeltaFlags::FRAME) {
        bits |= if delta.frame >= 256 { U_FRAME16 } else { U_FRAME8 };
    }
    if flags.contains(EntityDeltaFlags::EFFECTS) {
        bits |= choose_width_flags(delta.effects, U_EFFECTS8, U_EFFECTS16, true);
    }
    if flags.contains(EntityDeltaFlags::EFFECTS_MORE) {
        bits |= choose_width_flags(delta.effects_more, U_MOREFX8, U_MOREFX16, true);
    }
    if flags.contains(EntityDeltaFlags::RENDERFX) {
        bits |= choose_width_flags(delta.renderfx, U_RENDERFX8, U_RENDERFX16, true);
    }
    for (model, (flag, field)) in MODEL_BITS.into_iter().enumerate() {
        if flags.contains(field) {
            bits |= flag;
            if delta.modelindex[model] > 255 {
                bits |= U_MODEL16;
            }
        }
    }
    if flags.contains(EntityDeltaFlags::SOUND) {
        if delta.sound > SOUND_INDEX_MASK {
            return Err(WireError::BadData);
        }
        bits |= U_SOUND;
    }
    for (field, flag) in [
        (EntityDeltaFlags::SOLID, U_SOLID),
        (EntityDeltaFlags::EVENT, U_EVENT),
        (EntityDeltaFlags::OLD_ORIGIN, U_OLDORIGIN),
        (EntityDeltaFlags::ALPHA, U_ALPHA),
        (EntityDeltaFlags::SCALE, U_SCALE),
    ] {
        if flags.contains(field) {
            bits |= flag;
        }
    }
    Ok(bits)
}

/// Writes an entity update (header and body) and returns the header bits.
///
/// # Errors
///
/// [`WireError::BadData`] for a sound index above 16383, or any write
/// error.
pub fn write_entity_delta<W: WireWrite + ?Sized>(
    out: &mut W,
    entnum: u16,
    delta: &EntityStateDelta,
) -> WireResult<u64> {
    let bits = write_entity_bits(out, entity_header_bits(delta)?, entnum)?;

    write_models(out, bits, delta)?;
    write_entity_scalars(out, bits, delta)?;
    let origin = delta.origin.value();
    for (comp, flag) in ORIGIN_BITS.into_iter().enumerate() {
        if bits & flag != 0 {
            out.write_f32(origin.get_float_comp(comp))?;
        }
    }
    for (comp, flag) in ANGLE_BITS.into_iter().enumerate() {
        if bits & flag != 0 {
            out.write_i16(delta.angle.values.get_short_comp(comp))?;
        }
    }
    if bits & U_OLDORIGIN != 0 {
        delta.old_origin.write_float(out)?;
    }
    if bits & U_SOUND != 0 {
        write_loop_sound(out, delta)?;
    }
    if bits & U_EVENT != 0 {
        out.write_u8(delta.event)?;
    }
    if bits & U_SOLID != 0 {
        out.write_u32(delta.solid)?;
    }
    write_extended_fields(out, bits, delta)?;

    tracing::trace!(entnum, bits, "entity delta");
    Ok(bits)
}

/// Reads the body of an entity update whose header was `bits`.
///
/// # Errors
///
/// Any read error.
pub fn read_entity_delta<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
    bits: u64,
) -> WireResult<EntityStateDelta> {
    let mut delta = EntityStateDelta::default();

    read_models(input, bits, true, &mut delta)?;
    read_entity_scalars(input, bits, &mut delta)?;
    let mut origin = VarCoords::default();
    let mut origin_bits = 0u8;
    for (comp, flag) in ORIGIN_BITS.into_iter().enumerate() {
        if bits & flag != 0 {
            origin.set_float_comp(comp, input.read_f32()?);
            origin_bits |= 1 << comp;
        }
    }
    delta.origin = MaybeDiffCoords::Read {
        diff_bits: 0,
        delta_bits: origin_bits,
        values: origin,
    };
    for (comp, flag) in ANGLE_BITS.into_iter().enumerate() {
        if bits & flag != 0 {
            if bits & U_ANGLE16 != 0 {
                delta.angle.values.set_short_comp(comp, input.read_i16()?);
            } else {
                delta.angle.values.set_char_comp(comp, input.read_i8()?);
            }
            delta.angle.delta_bits |= 1 << comp;
        }
    }
    if bits & U_OLDORIGIN != 0 {
        delta.old_origin = VarCoords::read_float(input)?;
        delta.bits |= EntityDeltaFlags::OLD_ORIGIN;
    }
    if bits & U_SOUND != 0 {
        read_loop_sound(input, &mut delta)?;
    }
    if bits & U_EVENT != 0 {
        delta.event = input.read_u8()?;
        delta.bits |= EntityDeltaFlags::EVENT;
    }
    if bits & U_SOLID != 0 {
        delta.solid = input.read_u32()?;
        delta.bits |= EntityDeltaFlags::SOLID;
    }
    read_extended_fields(input, bits, &mut delta)?;
    Ok(delta)
}

/// Writes `svc_spawnbaseline`.
///
/// # Errors
///
/// Same as [`write_entity_delta`].
pub fn write_spawnbaseline<W: WireWrite + ?Sized>(
    out: &mut W,
    entnum: u16,
    delta: &EntityStateDelta,
) -> WireResult<()> {
    entity_header_bits(delta)?;
    out.write_u8(SVC_SPAWNBASELINE)?;
    write_entity_delta(out, entnum, delta).map(|_| ())
}

/// Reads the body of `svc_spawnbaseline` as `(entnum, delta)`.
///
/// # Errors
///
/// Any read error.
pub fn read_spawnbaseline<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
) -> WireResult<(u16, EntityStateDelta)> {
    let (bits, entnum) = read_entity_bits(input)?;
    Ok((entnum, read_entity_delta(input, bits)?))
}

fn playerstate_flags(delta: &PlayerStateDelta) -> WireResult<(u16, u8)> {
    let bits = delta.bits;
    if !delta.fog.is_empty() {
        return Err(WireError::BadData);
    }

    let mut flags = 0u16;
    let mut extraflags = 0u8;

    let origin_changes = delta.pm_origin.write_differs_float();
    if origin_changes & 0b011 != 0 {
        flags |= PS_M_ORIGIN;
    }
    if origin_changes & 0b100 != 0 {
        extraflags |= EPS_M_ORIGIN2;
    }
    let velocity_changes = delta.pm_velocity.write_differs_float();
    if velocity_changes & 0b011 != 0 {
        flags |= PS_M_VELOCITY;
    }
    if velocity_changes & 0b100 != 0 {
        extraflags |= EPS_M_VELOCITY2;
    }
    if delta.viewangles.delta_bits & 0b011 != 0 {
        flags |= PS_VIEWANGLES;
    }
    if delta.viewangles.has(2) {
        extraflags |= EPS_VIEWANGLE2;
    }
    if !delta.blend.is_empty() || !delta.damage_blend.is_empty() {
        flags |= PS_BLEND;
    }
    if bits.intersects(PlayerDeltaFlags::GUNINDEX | PlayerDeltaFlags::GUNSKIN) {
        if !check_gun_word(delta) {
            return Err(WireError::BadData);
        }
        flags |= PS_WEAPONINDEX;
    }
    if !delta.gunoffset.is_empty() {
        extraflags |= EPS_GUNOFFSET;
    }
    if !delta.gunangles.is_empty() {
        extraflags |= EPS_GUNANGLES;
    }
    if delta.statbits != 0 {
        extraflags |= EPS_STATS;
    }

    for (field, flag) in [
        (PlayerDeltaFlags::PM_TYPE, PS_M_TYPE),
        (PlayerDeltaFlags::PM_TIME, PS_M_TIME),
        (PlayerDeltaFlags::PM_FLAGS, PS_M_FLAGS),
        (PlayerDeltaFlags::PM_GRAVITY, PS_M_GRAVITY),
        (PlayerDeltaFlags::PM_DELTA_ANGLES, PS_M_DELTA_ANGLES),
        (PlayerDeltaFlags::PM_VIEWHEIGHT, PS_RR_VIEWHEIGHT),
        (PlayerDeltaFlags::VIEWOFFSET, PS_VIEWOFFSET),
        (PlayerDeltaFlags::KICKANGLES, PS_KICKANGLES),
        (PlayerDeltaFlags::GUNFRAME, PS_WEAPONFRAME),
        (PlayerDeltaFlags::FOV, PS_FOV),
        (PlayerDeltaFlags::RDFLAGS, PS_RDFLAGS),
    ] {
        if bits.contains(field) {
            flags |= flag;
        }
    }
    if bits.contains(PlayerDeltaFlags::GUNRATE) {
        extraflags |= EPS_GUNRATE;
    }
    if bits.contains(PlayerDeltaFlags::CLIENTNUM) {
        extraflags |= EPS_CLIENTNUM;
    }
    Ok((flags, extraflags))
}

fn write_playerstate_body<W: WireWrite + ?Sized>(
    out: &mut W,
    delta: &PlayerStateDelta,
    flags: u16,
    extraflags: u8,
) -> WireResult<()> {
    out.write_u16(flags)?;

    if flags & PS_M_TYPE != 0 {
        out.write_u8(delta.pm_type)?;
    }
    for (coords, flag, extra) in [
        (&delta.pm_origin, PS_M_ORIGIN, EPS_M_ORIGIN2),
        (&delta.pm_velocity, PS_M_VELOCITY, EPS_M_VELOCITY2),
    ] {
        let value = coords.value();
        if flags & flag != 0 {
            out.write_f32(value.get_float_comp(0))?;
            out.write_f32(value.get_float_comp(1))?;
        }
        if extraflags & extra != 0 {
            out.write_f32(value.get_float_comp(2))?;
        }
    }
    if flags & PS_M_TIME != 0 {
        out.write_u16(delta.pm_time)?;
    }
    if flags & PS_M_FLAGS != 0 {
        out.write_u16(delta.pm_flags)?;
    }
    if flags & PS_M_GRAVITY != 0 {
        out.write_i16(delta.pm_gravity)?;
    }
    if flags & PS_M_DELTA_ANGLES != 0 {
        for comp in 0..3 {
            out.write_i16(delta.pm_delta_angles.get_short_comp(comp))?;
        }
    }
    if flags & PS_VIEWOFFSET != 0 {
        for comp in 0..3 {
            out.write_i16(delta.viewoffset.get_repro_viewoffset_comp(comp))?;
        }
    }
    if flags & PS_VIEWANGLES != 0 {
        out.write_i16(delta.viewangles.values.get_short_comp(0))?;
        out.write_i16(delta.viewangles.values.get_short_comp(1))?;
    }
    if extraflags & EPS_VIEWANGLE2 != 0 {
        out.write_i16(delta.viewangles.values.get_short_comp(2))?;
    }
    if flags & PS_KICKANGLES != 0 {
        for comp in 0..3 {
            out.write_i16(delta.kick_angles.get_repro_kick_comp(comp))?;
        }
    }
    if flags & PS_WEAPONINDEX != 0 {
        out.write_u16(gun_word(delta))?;
    }
    if flags & PS_WEAPONFRAME != 0 {
        out.write_u16(delta.gunframe)?;
    }
    if extraflags & EPS_GUNOFFSET != 0 {
        for comp in 0..3 {
            out.write_i16(delta.gunoffset.values.get_repro_gunoffset_comp(comp))?;
        }
    }
    if extraflags & EPS_GUNANGLES != 0 {
        for comp in 0..3 {
            out.write_i16(delta.gunangles.values.get_repro_gun_comp(comp))?;
        }
    }
    if flags & PS_BLEND != 0 {
        write_extv2_blends(out, &delta.blend, &delta.damage_blend)?;
    }
    if flags & PS_FOV != 0 {
        out.write_u8(delta.fov)?;
    }
    if flags & PS_RDFLAGS != 0 {
        out.write_u8(delta.rdflags)?;
    }
    if extraflags & EPS_STATS != 0 {
        out.write_u64(delta.statbits)?;
        for (_, value) in delta.changed_stats() {
            out.write_i16(value)?;
        }
    }
    if extraflags & EPS_GUNRATE != 0 {
        out.write_u8(delta.gunrate)?;
    }
    if flags & PS_RR_VIEWHEIGHT != 0 {
        out.write_i8(delta.pm_viewheight)?;
    }
    if extraflags & EPS_CLIENTNUM != 0 {
        out.write_i16(delta.clientnum)?;
    }
    Ok(())
}

/// Writes a player state and returns the extra flags the frame header
/// must carry.
///
/// # Errors
///
/// [`WireError::BadData`] for player fog or a gun index and skin that do
/// not share a word, or any write error.
pub fn write_playerstate<W: WireWrite + ?Sized>(
    out: &mut W,
    delta: &PlayerStateDelta,
) -> WireResult<u8> {
    let (flags, extraflags) = playerstate_flags(delta)?;
    write_playerstate_body(out, delta, flags, extraflags)?;
    Ok(extraflags)
}

/// Reads a player state. `extraflags` comes from the frame header.
///
/// # Errors
///
/// Any read error.
pub fn read_playerstate<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
    extraflags: u8,
) -> WireResult<PlayerStateDelta> {
    let flags = input.read_u16()?;
    let mut delta = PlayerStateDelta::default();

    if flags & PS_M_TYPE != 0 {
        delta.pm_type = input.read_u8()?;
        delta.bits |= PlayerDeltaFlags::PM_TYPE;
    }
    for (flag, extra) in [
        (PS_M_ORIGIN, EPS_M_ORIGIN2),
        (PS_M_VELOCITY, EPS_M_VELOCITY2),
    ] {
        let mut values = VarCoords::default();
        let mut delta_bits = 0u8;
        if flags & flag != 0 {
            values.set_float_comp(0, input.read_f32()?);
            values.set_float_comp(1, input.read_f32()?);
            delta_bits |= 0b011;
        }
        if extraflags & extra != 0 {
            values.set_float_comp(2, input.read_f32()?);
            delta_bits |= 0b100;
        }
        let coords = MaybeDiffCoords::Read {
            diff_bits: 0,
            delta_bits,
            values,
        };
        if flag == PS_M_ORIGIN {
            delta.pm_origin = coords;
        } else {
            delta.pm_velocity = coords;
        }
    }
    if flags & PS_M_TIME != 0 {
        delta.pm_time = input.read_u16()?;
        delta.bits |= PlayerDeltaFlags::PM_TIME;
    }
    if flags & PS_M_FLAGS != 0 {
        delta.pm_flags = input.read_u16()?;
        delta.bits |= PlayerDeltaFlags::PM_FLAGS;
    }
    if flags & PS_M_GRAVITY != 0 {
        delta.pm_gravity = input.read_i16()?;
        delta.bits |= PlayerDeltaFlags::PM_GRAVITY;
    }
    if flags & PS_M_DELTA_ANGLES != 0 {
        for comp in 0..3 {
            delta.pm_delta_angles.set_short_comp(comp, input.read_i16()?);
        }
        delta.bits |= PlayerDeltaFlags::PM_DELTA_ANGLES;
    }
    if flags & PS_VIEWOFFSET != 0 {
        for comp in 0..3 {
            let value = input.read_i16()?;
            delta.viewoffset.set_repro_viewoffset_comp(comp, value);
        }
        delta.bits |= PlayerDeltaFlags::VIEWOFFSET;
    }
    if flags & PS_VIEWANGLES != 0 {
        for comp in 0..2 {
            delta.viewangles.values.set_short_comp(comp, input.read_i16()?);
        }
        delta.viewangles.delta_bits |= 0b011;
    }
    if extraflags & EPS_VIEWANGLE2 != 0 {
        delta.viewangles.values.set_short_comp(2, input.read_i16()?);
        delta.viewangles.delta_bits |= 0b100;
    }
    if flags & PS_KICKANGLES != 0 {
        for comp in 0..3 {
            let value = input.read_i16()?;
            delta.kick_angles.set_repro_kick_comp(comp, value);
        }
        delta.bits |= PlayerDeltaFlags::KICKANGLES;
    }
    if flags & PS_WEAPONINDEX != 0 {
        set_gun_word(&mut delta, input.read_u16()?);
    }
    if flags & PS_WEAPONFRAME != 0 {
        delta.gunframe = input.read_u16()?;
        delta.bits |= PlayerDeltaFlags::GUNFRAME;
    }
    if extraflags & EPS_GUNOFFSET != 0 {
        for comp in 0..3 {
            let value = input.read_i16()?;
            delta.gunoffset.values.set_repro_gunoffset_comp(comp, value);
        }
        delta.gunoffset.delta_bits = 0b111;
    }
    if extraflags & EPS_GUNANGLES != 0 {
        for comp in 0..3 {
            let value = input.read_i16()?;
            delta.gunangles.values.set_repro_gun_comp(comp, value);
        }
        delta.gunangles.delta_bits = 0b111;
    }
    if flags & PS_BLEND != 0 {
        read_extv2_blends(input, &mut delta.blend, &mut delta.damage_blend)?;
    }
    if flags & PS_FOV != 0 {
        delta.fov = input.read_u8()?;
        delta.bits |= PlayerDeltaFlags::FOV;
    }
    if flags & PS_RDFLAGS != 0 {
        delta.rdflags = input.read_u8()?;
        delta.bits |= PlayerDeltaFlags::RDFLAGS;
    }
    if extraflags & EPS_STATS != 0 {
        delta.statbits = input.read_u64()?;
        for stat in 0..MAX_STATS {
            if delta.statbits & (1 << stat) != 0 {
                delta.stats[stat] = input.read_i16()?;
            }
        }
    }
    if extraflags & EPS_GUNRATE != 0 {
        delta.gunrate = input.read_u8()?;
        delta.bits |= PlayerDeltaFlags::GUNRATE;
    }
    if flags & PS_RR_VIEWHEIGHT != 0 {
        delta.pm_viewheight = input.read_i8()?;
        delta.bits |= PlayerDeltaFlags::PM_VIEWHEIGHT;
    }
    if extraflags & EPS_CLIENTNUM != 0 {
        delta.clientnum = input.read_i16()?;
        delta.bits |= PlayerDeltaFlags::CLIENTNUM;
    }
    Ok(delta)
}

/// Writes `svc_frame` with its player state. Entity updates follow
/// directly.
///
/// # Errors
///
/// [`WireError::BadData`] for an unreachable delta frame, area bits over
/// 255 bytes or a player state [`write_playerstate`] rejects, or any write
/// error.
pub fn write_frame<W: WireWrite + ?Sized>(
    out: &mut W,
    header: &FrameHeader<'_>,
    player: &PlayerStateDelta,
) -> WireResult<()> {
    let (flags, extraflags) = playerstate_flags(player)?;
    let encoded = encode_frame_number(header.serverframe, header.deltaframe)?;
    if header.areabits.len() > usize::from(u8::MAX) {
        return Err(WireError::BadData);
    }

    out.write_u8(SVC_FRAME)?;
    out.write_i32(encoded)?;
    out.write_u8(header.flags)?;
    out.write_u8(extraflags)?;
    write_areabits(out, header.areabits)?;
    write_playerstate_body(out, player, flags, extraflags)?;

    tracing::trace!(
        serverframe = header.serverframe,
        deltaframe = ?header.deltaframe,
        extraflags,
        "frame"
    );
    Ok(())
}

/// Reads the body of `svc_frame`.
///
/// # Errors
///
/// Any read error.
pub fn read_frame<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
) -> WireResult<(FrameHeader<'a>, PlayerStateDelta)> {
    let (serverframe, deltaframe) = decode_frame_number(input.read_i32()?);
    let flags = input.read_u8()?;
    let extraflags = input.read_u8()?;
    let areabits = read_areabits(input)?;
    let player = read_playerstate(input, extraflags)?;

    let header = FrameHeader {
        serverframe,
        deltaframe,
        flags,
        areabits,
    };
    Ok((header, player))
}

//! # Protocol 34 Records
//!
//! Entity updates, baselines and player state as the original protocol
//! lays them out. Fields the protocol has no room for are rejected with
//! [`WireError::BadData`] before anything is written.
//!
//! ## Design Philosophy
//!
//! - Writers consume the delta records the compilers produce
//! - Readers fill the same records, marking what arrived
//! - Field widths are picked per value, never per connection

use crate::entity_bits::{
    choose_width_flags, read_entity_bits, read_sized, write_entity_bits, write_sized,
    ANGLE_BITS, MODEL_BITS, ORIGIN_BITS, U_EFFECTS16, U_EFFECTS8, U_EVENT, U_FRAME16, U_FRAME8,
    U_OLDORIGIN, U_REMOVE, U_RENDERFX16, U_RENDERFX8, U_SKIN16, U_SKIN8, U_SOLID, U_SOUND,
};
use crate::error::{WireError, WireResult};
use crate::frame::{read_areabits, write_areabits, FrameHeader};
use crate::io::{WireRead, WireWrite};
use crate::messages::{SVC_FRAME, SVC_PACKETENTITIES, SVC_PLAYERINFO, SVC_SPAWNBASELINE};
use crate::packing::{EntityDeltaFlags, EntityStateDelta, PlayerDeltaFlags, PlayerStateDelta};
use crate::values::{MaybeDiffCoords, VarCoords};

/// Player state: `pm_type`.
pub const PS_M_TYPE: u16 = 1 << 0;
/// Player state: `pm_origin`.
pub const PS_M_ORIGIN: u16 = 1 << 1;
/// Player state: `pm_velocity`.
pub const PS_M_VELOCITY: u16 = 1 << 2;
/// Player state: `pm_time`.
pub const PS_M_TIME: u16 = 1 << 3;
/// Player state: `pm_flags`.
pub const PS_M_FLAGS: u16 = 1 << 4;
/// Player state: `pm_gravity`.
pub const PS_M_GRAVITY: u16 = 1 << 5;
/// Player state: `pm_delta_angles`.
pub const PS_M_DELTA_ANGLES: u16 = 1 << 6;
/// Player state: `viewoffset`.
pub const PS_VIEWOFFSET: u16 = 1 << 7;
/// Player state: `viewangles`.
pub const PS_VIEWANGLES: u16 = 1 << 8;
/// Player state: `kick_angles`.
pub const PS_KICKANGLES: u16 = 1 << 9;
/// Player state: `blend`.
pub const PS_BLEND: u16 = 1 << 10;
/// Player state: `fov`.
pub const PS_FOV: u16 = 1 << 11;
/// Player state: `gunindex`.
pub const PS_WEAPONINDEX: u16 = 1 << 12;
/// Player state: gun frame, offset and angles.
pub const PS_WEAPONFRAME: u16 = 1 << 13;
/// Player state: `rdflags`.
pub const PS_RDFLAGS: u16 = 1 << 14;

/// Stats the protocol can carry.
pub const VANILLA_MAX_STATS: usize = 32;

/// Entity fields protocol 34 cannot carry.
const UNSUPPORTED_ENTITY_FIELDS: EntityDeltaFlags = EntityDeltaFlags::EFFECTS_MORE
    .union(EntityDeltaFlags::LOOP_VOLUME)
    .union(EntityDeltaFlags::LOOP_ATTENUATION)
    .union(EntityDeltaFlags::ALPHA)
    .union(EntityDeltaFlags::SCALE);

/// Player fields protocol 34 cannot carry.
const UNSUPPORTED_PLAYER_FIELDS: PlayerDeltaFlags = PlayerDeltaFlags::PM_VIEWHEIGHT
    .union(PlayerDeltaFlags::GUNSKIN)
    .union(PlayerDeltaFlags::GUNRATE)
    .union(PlayerDeltaFlags::CLIENTNUM);

/// Header bits for `delta`, before continuation and number bits.
fn entity_header_bits(delta: &EntityStateDelta) -> WireResult<u64> {
    let flags = delta.bits;
    if flags.intersects(UNSUPPORTED_ENTITY_FIELDS) {
        return Err(WireError::BadData);
    }

    let mut bits = 0u64;
    let origin_changes = delta.origin.write_differs_int();
    for (comp, flag) in ORIGIN_BITS.into_iter().enumerate() {
        if origin_changes & (1 << comp) != 0 {
            bits |= flag;
        }
    }
    for (comp, flag) in ANGLE_BITS.into_iter().enumerate() {
        if delta.angle.has(comp) {
            bits |= flag;
        }
    }

    if flags.contains(EntityDeltaFlags::SKINNUM) {
        bits |= choose_width_flags(delta.skinnum, U_SKIN8, U_SKIN16, false);
    }
    if flags.contains(EntityDeltaFlags::FRAME) {
        bits |= if delta.frame >= 256 { U_FRAME16 } else { U_FRAME8 };
    }
    if flags.contains(EntityDeltaFlags::EFFECTS) {
        bits |= choose_width_flags(delta.effects, U_EFFECTS8, U_EFFECTS16, false);
    }
    if flags.contains(EntityDeltaFlags::RENDERFX) {
        bits |= choose_width_flags(delta.renderfx, U_RENDERFX8, U_RENDERFX16, false);
    }
    for (model, (flag, field)) in MODEL_BITS.into_iter().enumerate() {
        if flags.contains(field) {
            if delta.modelindex[model] > 255 {
                return Err(WireError::BadData);
            }
            bits |= flag;
        }
    }
    if flags.contains(EntityDeltaFlags::SOUND) {
        if delta.sound > 255 {
            return Err(WireError::BadData);
        }
        bits |= U_SOUND;
    }
    if flags.contains(EntityDeltaFlags::SOLID) {
        bits |= U_SOLID;
    }
    if flags.contains(EntityDeltaFlags::EVENT) {
        bits |= U_EVENT;
    }
    if flags.contains(EntityDeltaFlags::OLD_ORIGIN) {
        bits |= U_OLDORIGIN;
    }
    Ok(bits)
}

/// Writes an entity update (header and body) and returns the header bits.
///
/// # Errors
///
/// [`WireError::BadData`] if the delta carries fields or values protocol 34
/// has no room for, or any write error.
#[allow(clippy::cast_possible_truncation)]
pub fn write_entity_delta<W: WireWrite + ?Sized>(
    out: &mut W,
    entnum: u16,
    delta: &EntityStateDelta,
) -> WireResult<u64> {
    let bits = write_entity_bits(out, entity_header_bits(delta)?, entnum)?;

    for (model, (flag, _)) in MODEL_BITS.into_iter().enumerate() {
        if bits & flag != 0 {
            out.write_u8(delta.modelindex[model] as u8)?;
        }
    }
    if bits & U_FRAME16 != 0 {
        out.write_u16(delta.frame)?;
    } else if bits & U_FRAME8 != 0 {
        out.write_u8(delta.frame as u8)?;
    }
    write_sized(out, bits, delta.skinnum, U_SKIN8, U_SKIN16)?;
    write_sized(out, bits, delta.effects, U_EFFECTS8, U_EFFECTS16)?;
    write_sized(out, bits, delta.renderfx, U_RENDERFX8, U_RENDERFX16)?;

    let origin = delta.origin.value();
    for (comp, flag) in ORIGIN_BITS.into_iter().enumerate() {
        if bits & flag != 0 {
            out.write_i16(origin.get_short_comp(comp))?;
        }
    }
    for (comp, flag) in ANGLE_BITS.into_iter().enumerate() {
        if bits & flag != 0 {
            out.write_i8(delta.angle.values.get_char_comp(comp))?;
        }
    }
    if bits & U_OLDORIGIN != 0 {
        delta.old_origin.write_short(out)?;
    }
    if bits & U_SOUND != 0 {
        out.write_u8(delta.sound as u8)?;
    }
    if bits & U_EVENT != 0 {
        out.write_u8(delta.event)?;
    }
    if bits & U_SOLID != 0 {
        out.write_u16(delta.solid as u16)?;
    }

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

    for (model, (flag, field)) in MODEL_BITS.into_iter().enumerate() {
        if bits & flag != 0 {
            delta.modelindex[model] = u16::from(input.read_u8()?);
            delta.bits |= field;
        }
    }
    if bits & U_FRAME8 != 0 {
        delta.frame = u16::from(input.read_u8()?);
        delta.bits |= EntityDeltaFlags::FRAME;
    } else if bits & U_FRAME16 != 0 {
        delta.frame = input.read_u16()?;
        delta.bits |= EntityDeltaFlags::FRAME;
    }
    if let Some(skinnum) = read_sized(input, bits, U_SKIN8, U_SKIN16)? {
        delta.skinnum = skinnum;
        delta.bits |= EntityDeltaFlags::SKINNUM;
    }
    if let Some(effects) = read_sized(input, bits, U_EFFECTS8, U_EFFECTS16)? {
        delta.effects = effects;
        delta.bits |= EntityDeltaFlags::EFFECTS;
    }
    if let Some(renderfx) = read_sized(input, bits, U_RENDERFX8, U_RENDERFX16)? {
        delta.renderfx = renderfx;
        delta.bits |= EntityDeltaFlags::RENDERFX;
    }

    let mut origin = VarCoords::default();
    let mut origin_bits = 0u8;
    for (comp, flag) in ORIGIN_BITS.into_iter().enumerate() {
        if bits & flag != 0 {
            origin.set_short_comp(comp, input.read_i16()?);
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
            delta.angle.values.set_char_comp(comp, input.read_i8()?);
            delta.angle.delta_bits |= 1 << comp;
        }
    }

    if bits & U_OLDORIGIN != 0 {
        delta.old_origin = VarCoords::read_short(input)?;
        delta.bits |= EntityDeltaFlags::OLD_ORIGIN;
    }
    if bits & U_SOUND != 0 {
        delta.sound = u16::from(input.read_u8()?);
        delta.bits |= EntityDeltaFlags::SOUND;
    }
    if bits & U_EVENT != 0 {
        delta.event = input.read_u8()?;
        delta.bits |= EntityDeltaFlags::EVENT;
    }
    if bits & U_SOLID != 0 {
        delta.solid = u32::from(input.read_u16()?);
        delta.bits |= EntityDeltaFlags::SOLID;
    }
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

/// Writes the removal of entity `entnum` from a frame.
///
/// # Errors
///
/// Any write error.
pub fn write_remove_entity<W: WireWrite + ?Sized>(out: &mut W, entnum: u16) -> WireResult<()> {
    write_entity_bits(out, U_REMOVE, entnum).map(|_| ())
}

/// Writes the empty header that ends a packet entities list.
///
/// # Errors
///
/// Any write error.
pub fn write_packet_entities_end<W: WireWrite + ?Sized>(out: &mut W) -> WireResult<()> {
    out.write_u8(0)?;
    out.write_u8(0)
}

/// Player state flags for `delta`.
fn playerstate_flags(delta: &PlayerStateDelta) -> WireResult<u16> {
    let bits = delta.bits;
    if bits.intersects(UNSUPPORTED_PLAYER_FIELDS)
        || !delta.damage_blend.is_empty()
        || !delta.fog.is_empty()
        || delta.statbits > u64::from(u32::MAX)
    {
        return Err(WireError::BadData);
    }

    let mut flags = 0u16;
    if bits.contains(PlayerDeltaFlags::PM_TYPE) {
        flags |= PS_M_TYPE;
    }
    if delta.pm_origin.write_differs_int() != 0 {
        flags |= PS_M_ORIGIN;
    }
    if delta.pm_velocity.write_differs_int() != 0 {
        flags |= PS_M_VELOCITY;
    }
    if bits.contains(PlayerDeltaFlags::PM_TIME) {
        if delta.pm_time > 255 {
            return Err(WireError::BadData);
        }
        flags |= PS_M_TIME;
    }
    if bits.contains(PlayerDeltaFlags::PM_FLAGS) {
        if delta.pm_flags > 255 {
            return Err(WireError::BadData);
        }
        flags |= PS_M_FLAGS;
    }
    if bits.contains(PlayerDeltaFlags::PM_GRAVITY) {
        flags |= PS_M_GRAVITY;
    }
    if bits.contains(PlayerDeltaFlags::PM_DELTA_ANGLES) {
        flags |= PS_M_DELTA_ANGLES;
    }
    if bits.contains(PlayerDeltaFlags::VIEWOFFSET) {
        flags |= PS_VIEWOFFSET;
    }
    if !delta.viewangles.is_empty() {
        flags |= PS_VIEWANGLES;
    }
    if bits.contains(PlayerDeltaFlags::KICKANGLES) {
        flags |= PS_KICKANGLES;
    }
    if !delta.blend.is_empty() {
        flags |= PS_BLEND;
    }
    if bits.contains(PlayerDeltaFlags::FOV) {
        flags |= PS_FOV;
    }
    if bits.contains(PlayerDeltaFlags::RDFLAGS) {
        flags |= PS_RDFLAGS;
    }
    if bits.contains(PlayerDeltaFlags::GUNINDEX) {
        if delta.gunindex > 255 {
            return Err(WireError::BadData);
        }
        flags |= PS_WEAPONINDEX;
    }
    if bits.contains(PlayerDeltaFlags::GUNFRAME)
        || !delta.gunoffset.is_empty()
        || !delta.gunangles.is_empty()
    {
        if delta.gunframe > 255 {
            return Err(WireError::BadData);
        }
        flags |= PS_WEAPONFRAME;
    }
    Ok(flags)
}

/// Writes `svc_playerinfo`.
///
/// # Errors
///
/// [`WireError::BadData`] if the delta carries fields protocol 34 has no
/// room for (view height, gun skin or rate, client number, damage blend,
/// fog, stats past 32) or values that overflow their field, or any write
/// error.
#[allow(clippy::cast_possible_truncation)]
pub fn write_playerstate<W: WireWrite + ?Sized>(
    out: &mut W,
    delta: &PlayerStateDelta,
) -> WireResult<()> {
    let flags = playerstate_flags(delta)?;

    out.write_u8(SVC_PLAYERINFO)?;
    out.write_u16(flags)?;

    if flags & PS_M_TYPE != 0 {
        out.write_u8(delta.pm_type)?;
    }
    if flags & PS_M_ORIGIN != 0 {
        delta.pm_origin.value().write_short(out)?;
    }
    if flags & PS_M_VELOCITY != 0 {
        delta.pm_velocity.value().write_short(out)?;
    }
    if flags & PS_M_TIME != 0 {
        out.write_u8(delta.pm_time as u8)?;
    }
    if flags & PS_M_FLAGS != 0 {
        out.write_u8(delta.pm_flags as u8)?;
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
            out.write_i8(delta.viewoffset.get_char_comp(comp))?;
        }
    }
    if flags & PS_VIEWANGLES != 0 {
        for comp in 0..3 {
            out.write_i16(delta.viewangles.values.get_short_comp(comp))?;
        }
    }
    if flags & PS_KICKANGLES != 0 {
        for comp in 0..3 {
            out.write_i8(delta.kick_angles.get_char_comp(comp))?;
        }
    }
    if flags & PS_WEAPONINDEX != 0 {
        out.write_u8(delta.gunindex as u8)?;
    }
    if flags & PS_WEAPONFRAME != 0 {
        out.write_u8(delta.gunframe as u8)?;
        for comp in 0..3 {
            out.write_i8(delta.gunoffset.values.get_char_comp(comp))?;
        }
        for comp in 0..3 {
            out.write_i8(delta.gunangles.values.get_char_comp(comp))?;
        }
    }
    if flags & PS_BLEND != 0 {
        for comp in 0..4 {
            out.write_u8(delta.blend.values.get_byte_comp(comp))?;
        }
    }
    if flags & PS_FOV != 0 {
        out.write_u8(delta.fov)?;
    }
    if flags & PS_RDFLAGS != 0 {
        out.write_u8(delta.rdflags)?;
    }

    out.write_u32(delta.statbits as u32)?;
    for (_, value) in delta.changed_stats() {
        out.write_i16(value)?;
    }
    Ok(())
}

/// Reads the body of `svc_playerinfo`.
///
/// Vectors that arrived are marked as fully present.
///
/// # Errors
///
/// Any read error.
pub fn read_playerstate<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
) -> WireResult<PlayerStateDelta> {
    let flags = input.read_u16()?;
    let mut delta = PlayerStateDelta::default();

    if flags & PS_M_TYPE != 0 {
        delta.pm_type = input.read_u8()?;
        delta.bits |= PlayerDeltaFlags::PM_TYPE;
    }
    if flags & PS_M_ORIGIN != 0 {
        delta.pm_origin = MaybeDiffCoords::Read {
            diff_bits: 0,
            delta_bits: 0b111,
            values: VarCoords::read_short(input)?,
        };
    }
    if flags & PS_M_VELOCITY != 0 {
        delta.pm_velocity = MaybeDiffCoords::Read {
            diff_bits: 0,
            delta_bits: 0b111,
            values: VarCoords::read_short(input)?,
        };
    }
    if flags & PS_M_TIME != 0 {
        delta.pm_time = u16::from(input.read_u8()?);
        delta.bits |= PlayerDeltaFlags::PM_TIME;
    }
    if flags & PS_M_FLAGS != 0 {
        delta.pm_flags = u16::from(input.read_u8()?);
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
            delta.viewoffset.set_char_comp(comp, input.read_i8()?);
        }
        delta.bits |= PlayerDeltaFlags::VIEWOFFSET;
    }
    if flags & PS_VIEWANGLES != 0 {
        for comp in 0..3 {
            delta.viewangles.values.set_short_comp(comp, input.read_i16()?);
        }
        delta.viewangles.delta_bits = 0b111;
    }
    if flags & PS_KICKANGLES != 0 {
        for comp in 0..3 {
            delta.kick_angles.set_char_comp(comp, input.read_i8()?);
        }
        delta.bits |= PlayerDeltaFlags::KICKANGLES;
    }
    if flags & PS_WEAPONINDEX != 0 {
        delta.gunindex = u16::from(input.read_u8()?);
        delta.bits |= PlayerDeltaFlags::GUNINDEX;
    }
    if flags & PS_WEAPONFRAME != 0 {
        delta.gunframe = u16::from(input.read_u8()?);
        delta.bits |= PlayerDeltaFlags::GUNFRAME;
        for comp in 0..3 {
            delta.gunoffset.values.set_char_comp(comp, input.read_i8()?);
        }
        delta.gunoffset.delta_bits = 0b111;
        for comp in 0..3 {
            delta.gunangles.values.set_char_comp(comp, input.read_i8()?);
        }
        delta.gunangles.delta_bits = 0b111;
    }
    if flags & PS_BLEND != 0 {
        for comp in 0..4 {
            delta.blend.values.set_byte_comp(comp, input.read_u8()?);
        }
        delta.blend.delta_bits = 0b1111;
    }
    if flags & PS_FOV != 0 {
        delta.fov = input.read_u8()?;
        delta.bits |= PlayerDeltaFlags::FOV;
    }
    if flags & PS_RDFLAGS != 0 {
        delta.rdflags = input.read_u8()?;
        delta.bits |= PlayerDeltaFlags::RDFLAGS;
    }

    delta.statbits = u64::from(input.read_u32()?);
    for stat in 0..VANILLA_MAX_STATS {
        if delta.statbits & (1 << stat) != 0 {
            delta.stats[stat] = input.read_i16()?;
        }
    }
    Ok(delta)
}

/// Writes `svc_frame` with its player state, up to and including the
/// `svc_packetentities` command that the entity updates follow.
///
/// # Errors
///
/// [`WireError::BadData`] for area bits over 255 bytes or a player state
/// [`write_playerstate`] rejects, or any write error.
pub fn write_frame<W: WireWrite + ?Sized>(
    out: &mut W,
    header: &FrameHeader<'_>,
    player: &PlayerStateDelta,
) -> WireResult<()> {
    playerstate_flags(player)?;
    if header.areabits.len() > usize::from(u8::MAX) {
        return Err(WireError::BadData);
    }

    out.write_u8(SVC_FRAME)?;
    out.write_i32(header.serverframe)?;
    out.write_i32(header.deltaframe.unwrap_or(-1))?;
    out.write_u8(header.flags)?;
    write_areabits(out, header.areabits)?;
    write_playerstate(out, player)?;
    out.write_u8(SVC_PACKETENTITIES)?;

    tracing::trace!(
        serverframe = header.serverframe,
        deltaframe = ?header.deltaframe,
        "frame"
    );
    Ok(())
}

/// Reads the body of `svc_frame` through the `svc_packetentities` command.
///
/// # Errors
///
/// [`WireError::BadCommand`] if the player state or entity list command is
/// missing, or any read error.
pub fn read_frame<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
) -> WireResult<(FrameHeader<'a>, PlayerStateDelta)> {
    let serverframe = input.read_i32()?;
    let deltaframe = input.read_i32()?;
    let flags = input.read_u8()?;
    let areabits = read_areabits(input)?;

    expect_command(input, SVC_PLAYERINFO)?;
    let player = read_playerstate(input)?;
    expect_command(input, SVC_PACKETENTITIES)?;

    let header = FrameHeader {
        serverframe,
        deltaframe: (deltaframe >= 0).then_some(deltaframe),
        flags,
        areabits,
    };
    Ok((header, player))
}

fn expect_command<'a, R: WireRead<'a> + ?Sized>(input: &mut R, command: u8) -> WireResult<()> {
    match input.read_u8()? {
        read if read == command => Ok(()),
        other => Err(WireError::BadCommand(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_bits::{
        entity_bits_size, U_EFFECTS32, U_MOREBITS1, U_NUMBER16, U_RENDERFX32, U_SKIN32,
    };
    use crate::io::{PacketReader, PacketWriter};
    use crate::packing::{
        make_entity_state_delta, make_player_state_delta, PackedEntityState, PackedPlayerState,
        PackingFlavor,
    };

    fn entity() -> PackedEntityState {
        PackedEntityState {
            modelindex: [3, 0, 0, 0],
            frame: 300,
            skinnum: 0x0001_0000,
            effects: 0x40,
            renderfx: 0x1234,
            origin: [800, -1600, 64],
            angles: [0, 0x4000, 0],
            old_origin: [0; 3],
            sound: 7,
            event: 2,
            solid: 8290,
            ..PackedEntityState::default()
        }
    }

    #[test]
    fn test_entity_widths() {
        let delta = make_entity_state_delta(PackingFlavor::Vanilla, None, &entity(), false, false);
        let mut writer = PacketWriter::new(128);
        let bits = write_entity_delta(&mut writer, 300, &delta).unwrap();
        assert_eq!(bits & U_FRAME16, U_FRAME16);
        assert_eq!(bits & U_SKIN32, U_SKIN32);
        assert_eq!(bits & U_EFFECTS32, U_EFFECTS8);
        assert_eq!(bits & U_RENDERFX32, U_RENDERFX16);
        assert_ne!(bits & U_NUMBER16, 0);
        assert_ne!(bits & U_MOREBITS1, 0);

        let body = 1 + 2 + 4 + 1 + 2 + 6 + 1 + 1 + 1 + 2;
        assert_eq!(writer.len(), entity_bits_size(bits) + body);
    }

    #[test]
    fn test_entity_round_trip() {
        let delta = make_entity_state_delta(PackingFlavor::Vanilla, None, &entity(), true, false);
        let mut writer = PacketWriter::new(128);
        write_spawnbaseline(&mut writer, 12, &delta).unwrap();
        assert_eq!(writer.as_slice()[0], SVC_SPAWNBASELINE);

        let mut reader = PacketReader::new(&writer.as_slice()[1..]);
        let (entnum, read) = read_spawnbaseline(&mut reader).unwrap();
        assert_eq!(entnum, 12);
        assert_eq!(read.bits, delta.bits);
        assert_eq!(read.frame, 300);
        assert_eq!(read.skinnum, 0x0001_0000);
        assert_eq!(read.renderfx, 0x1234);
        assert_eq!(read.origin.value().get_int(), [800, -1600, 64]);
        assert_eq!(read.angle.delta_bits, 0b010);
        assert_eq!(read.angle.values.get_char_comp(1), 0x40);
        assert_eq!(read.solid, 8290);
        assert_eq!(reader.read_available(), 0);
    }

    #[test]
    fn test_entity_rejects_extended_fields() {
        let to = PackedEntityState {
            alpha: 10,
            ..entity()
        };
        let delta = make_entity_state_delta(PackingFlavor::Vanilla, None, &to, false, true);
        let mut writer = PacketWriter::new(128);
        assert_eq!(
            write_entity_delta(&mut writer, 1, &delta),
            Err(WireError::BadData)
        );
        assert!(writer.is_empty());

        let to = PackedEntityState {
            modelindex: [300, 0, 0, 0],
            ..entity()
        };
        let delta = make_entity_state_delta(PackingFlavor::Vanilla, None, &to, false, false);
        assert_eq!(
            write_entity_delta(&mut writer, 1, &delta),
            Err(WireError::BadData)
        );
    }

    #[test]
    fn test_remove_and_end() {
        let mut writer = PacketWriter::new(16);
        write_remove_entity(&mut writer, 5).unwrap();
        write_packet_entities_end(&mut writer).unwrap();
        let mut reader = PacketReader::new(writer.as_slice());
        let (bits, entnum) = read_entity_bits(&mut reader).unwrap();
        assert_eq!((bits, entnum), (U_REMOVE, 5));
        assert_eq!(read_entity_bits(&mut reader).unwrap(), (0, 0));
    }

    fn player() -> PackedPlayerState {
        let mut state = PackedPlayerState {
            pm_type: 1,
            pm_origin: [100, 200, -300],
            pm_gravity: 800,
            viewoffset: [0, 0, 88],
            viewangles: [0x100, -0x200, 0],
            gunindex: 4,
            gunframe: 9,
            blend: [255, 0, 0, 64],
            fov: 90,
            ..PackedPlayerState::default()
        };
        state.stats[0] = 100;
        state.stats[31] = -1;
        state
    }

    #[test]
    fn test_playerstate_round_trip() {
        let delta = make_player_state_delta(PackingFlavor::Vanilla, None, &player(), false);
        let mut writer = PacketWriter::new(256);
        write_playerstate(&mut writer, &delta).unwrap();
        assert_eq!(writer.as_slice()[0], SVC_PLAYERINFO);

        let mut reader = PacketReader::new(&writer.as_slice()[1..]);
        let read = read_playerstate(&mut reader).unwrap();
        assert_eq!(reader.read_available(), 0);
        assert_eq!(read.pm_type, 1);
        assert_eq!(read.pm_origin.value().get_int(), [100, 200, -300]);
        assert_eq!(read.pm_gravity, 800);
        assert_eq!(read.viewoffset.get_char_comp(2), 88);
        assert_eq!(read.viewangles.values.get_short_comp(1), -0x200);
        assert_eq!(read.gunindex, 4);
        assert_eq!(read.gunframe, 9);
        assert_eq!(read.blend.values.get_byte_comp(3), 64);
        assert_eq!(read.fov, 90);
        assert_eq!(read.statbits, (1 << 0) | (1 << 31));
        assert_eq!(read.stats[31], -1);
    }

    #[test]
    fn test_playerstate_minimal() {
        let state = player();
        let delta = make_player_state_delta(PackingFlavor::Vanilla, Some(&state), &state, false);
        let mut writer = PacketWriter::new(16);
        write_playerstate(&mut writer, &delta).unwrap();
        // command, flags, statbits
        assert_eq!(writer.as_slice(), &[SVC_PLAYERINFO, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_playerstate_rejects() {
        let from = player();
        let mut to = from;
        to.gunskin = 1;
        let delta = make_player_state_delta(PackingFlavor::Vanilla, Some(&from), &to, false);
        let mut writer = PacketWriter::new(256);
        assert_eq!(write_playerstate(&mut writer, &delta), Err(WireError::BadData));

        let mut to = from;
        to.stats[40] = 1;
        let delta = make_player_state_delta(PackingFlavor::Vanilla, Some(&from), &to, false);
        assert_eq!(write_playerstate(&mut writer, &delta), Err(WireError::BadData));

        let mut to = from;
        to.pm_time = 300;
        let delta = make_player_state_delta(PackingFlavor::Vanilla, Some(&from), &to, false);
        assert_eq!(write_playerstate(&mut writer, &delta), Err(WireError::BadData));
        assert!(writer.is_empty());
    }

    #[test]
    fn test_frame_round_trip() {
        let delta = make_player_state_delta(PackingFlavor::Vanilla, None, &player(), false);
        let header = FrameHeader {
            serverframe: 500,
            deltaframe: None,
            flags: 2,
            areabits: &[0x0f, 0xf0],
        };
        let mut writer = PacketWriter::new(256);
        write_frame(&mut writer, &header, &delta).unwrap();
        assert_eq!(writer.as_slice()[0], SVC_FRAME);
        assert_eq!(&writer.as_slice()[5..9], &(-1i32).to_le_bytes());
        assert_eq!(*writer.as_slice().last().unwrap(), SVC_PACKETENTITIES);

        let mut reader = PacketReader::new(&writer.as_slice()[1..]);
        let (read_header, read_player) = read_frame(&mut reader).unwrap();
        assert_eq!(read_header, header);
        assert_eq!(read_player.fov, 90);
        assert_eq!(reader.read_available(), 0);
    }

    #[test]
    fn test_frame_rejects_before_writing() {
        let mut to = player();
        to.pm_viewheight = 22;
        let delta = make_player_state_delta(PackingFlavor::Vanilla, None, &to, false);
        let mut writer = PacketWriter::new(256);
        assert_eq!(
            write_frame(&mut writer, &FrameHeader::default(), &delta),
            Err(WireError::BadData)
        );
        assert!(writer.is_empty());
    }
}

//! # R1Q2 and Q2PRO Records
//!
//! Entity updates, baselines, player state and frames for protocols 35 and
//! 36. Both grow the protocol 34 layouts:
//!
//! - R1Q2 widens solids to 32 bits and moves the gun offset and angles,
//!   stats and the third coordinate components behind "extra flags" that
//!   ride in spare bits of the frame header
//! - Q2PRO adds short entity angles and the client number, and, for the
//!   extended game APIs, 16-bit models, upper effects, alpha, scale, loop
//!   sound parameters and gun skins
//! - The second extended revision sends coordinates as 23-bit values that
//!   usually shrink to a 15-bit difference, plus damage blend, player fog
//!   and 64 stats
//!
//! What a connection may use is captured once in [`Q2proParams`].

use crate::entity_bits::{
    choose_width_flags, read_entity_bits, read_sized, write_entity_bits, write_sized,
    ANGLE_BITS, MODEL_BITS, ORIGIN_BITS, U_ALPHA, U_ANGLE16, U_EFFECTS16, U_EFFECTS8, U_EVENT,
    U_FRAME16, U_FRAME8, U_MODEL16, U_MOREFX16, U_MOREFX8, U_OLDORIGIN, U_RENDERFX16,
    U_RENDERFX8, U_SCALE, U_SKIN16, U_SKIN8, U_SOLID, U_SOUND,
};
use crate::error::{WireError, WireResult};
use crate::frame::{
    decode_frame_number, encode_frame_number, read_areabits, write_areabits, FrameHeader,
};
use crate::io::{WireRead, WireWrite};
use crate::messages::{SVC_FRAME, SVC_SPAWNBASELINE};
use crate::packing::{
    EntityDeltaFlags, EntityStateDelta, FogDelta, FogFlags, PlayerDeltaFlags, PlayerStateDelta,
};
use crate::protocol::{
    GameApi, Q2PRO_VERSION_CLIENTNUM_SHORT, Q2PRO_VERSION_PLAYERFOG, Q2PRO_VERSION_SHORT_ANGLES,
    R1Q2_VERSION_LONG_SOLID,
};
use crate::values::{ColorDelta, MaybeDiffCoords, VarColor, VarCoord, VarCoords, VarFraction};
use crate::vanilla::{
    PS_BLEND, PS_FOV, PS_KICKANGLES, PS_M_DELTA_ANGLES, PS_M_FLAGS, PS_M_GRAVITY, PS_M_ORIGIN,
    PS_M_TIME, PS_M_TYPE, PS_M_VELOCITY, PS_RDFLAGS, PS_VIEWANGLES, PS_VIEWOFFSET,
    PS_WEAPONFRAME, PS_WEAPONINDEX, VANILLA_MAX_STATS,
};

/// Player state: a third flag byte follows.
pub const PS_MOREBITS: u32 = 1 << 15;
/// Player state: player fog follows the blend.
pub const PS_Q2PRO_PLAYERFOG: u32 = 1 << 16;

/// Extra flags: gun offset.
pub const EPS_GUNOFFSET: u8 = 1 << 0;
/// Extra flags: gun angles.
pub const EPS_GUNANGLES: u8 = 1 << 1;
/// Extra flags: third velocity component.
pub const EPS_M_VELOCITY2: u8 = 1 << 2;
/// Extra flags: third origin component.
pub const EPS_M_ORIGIN2: u8 = 1 << 3;
/// Extra flags: third view angle component.
pub const EPS_VIEWANGLE2: u8 = 1 << 4;
/// Extra flags: stats.
pub const EPS_STATS: u8 = 1 << 5;
/// Extra flags: client number.
pub const EPS_CLIENTNUM: u8 = 1 << 6;
/// Extra flags: gun animation rate (Q2rePRO only).
pub const EPS_GUNRATE: u8 = 1 << 7;

/// Player fog: global color.
pub const FOG_BIT_COLOR: u8 = 1 << 0;
/// Player fog: global density and sky factor.
pub const FOG_BIT_DENSITY: u8 = 1 << 1;
/// Player fog: height fog density.
pub const FOG_BIT_HEIGHT_DENSITY: u8 = 1 << 2;
/// Player fog: height fog falloff.
pub const FOG_BIT_HEIGHT_FALLOFF: u8 = 1 << 3;
/// Player fog: height fog start color.
pub const FOG_BIT_HEIGHT_START_COLOR: u8 = 1 << 4;
/// Player fog: height fog end color.
pub const FOG_BIT_HEIGHT_END_COLOR: u8 = 1 << 5;
/// Player fog: height fog start distance.
pub const FOG_BIT_HEIGHT_START_DIST: u8 = 1 << 6;
/// Player fog: height fog end distance.
pub const FOG_BIT_HEIGHT_END_DIST: u8 = 1 << 7;

/// Looping sound word: a volume byte follows.
pub const SOUND_FLAG_VOLUME: u16 = 1 << 14;
/// Looping sound word: an attenuation byte follows.
pub const SOUND_FLAG_ATTENUATION: u16 = 1 << 15;
/// Looping sound word: the sound index.
pub const SOUND_INDEX_MASK: u16 = SOUND_FLAG_VOLUME - 1;

/// Bits of the gun word that hold the model index; the skin sits above.
pub const GUNINDEX_BITS: u32 = 13;
/// Gun word: the model index.
pub const GUNINDEX_MASK: u16 = (1 << GUNINDEX_BITS) - 1;

/// Stats the second extended revision can carry.
const EXTENDED_MAX_STATS: usize = 64;

/// Entity fields only the extended game APIs carry.
const EXTENDED_ENTITY_FIELDS: EntityDeltaFlags = EntityDeltaFlags::EFFECTS_MORE
    .union(EntityDeltaFlags::LOOP_VOLUME)
    .union(EntityDeltaFlags::LOOP_ATTENUATION)
    .union(EntityDeltaFlags::ALPHA)
    .union(EntityDeltaFlags::SCALE);

/// How the client number travels in the player state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClientnumWidth {
    /// Not at all.
    #[default]
    None,
    /// One unsigned byte.
    Byte,
    /// A signed short.
    Short,
}

/// The layout choices of one R1Q2 or Q2PRO connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Q2proParams {
    /// Extended game API fields may be sent.
    pub extended: bool,
    /// Second extended revision: 23-bit coordinates, 16-bit movement
    /// time and flags, damage blend and 64 stats.
    pub extended_v2: bool,
    /// The client reads 16-bit skin, effects and renderfx unsigned.
    pub unsigned_words: bool,
    /// Entity angles may go out as shorts.
    pub short_angles: bool,
    /// Solids are 32 bits wide.
    pub long_solid: bool,
    /// Player state may carry a third flag byte and player fog.
    pub playerfog: bool,
    /// Client number width.
    pub clientnum: ClientnumWidth,
}

impl Q2proParams {
    /// Layout for an R1Q2 client at protocol revision `version`.
    #[must_use]
    pub const fn r1q2(version: i32) -> Self {
        Self {
            extended: false,
            extended_v2: false,
            unsigned_words: false,
            short_angles: false,
            long_solid: version >= R1Q2_VERSION_LONG_SOLID,
            playerfog: false,
            clientnum: ClientnumWidth::None,
        }
    }

    /// Layout for a Q2PRO client at protocol revision `version`, served by
    /// a `game_api` game.
    #[must_use]
    pub const fn q2pro(game_api: GameApi, version: i32) -> Self {
        Self {
            extended: !matches!(game_api, GameApi::Vanilla),
            extended_v2: matches!(game_api, GameApi::Q2proExtendedV2),
            unsigned_words: true,
            short_angles: version >= Q2PRO_VERSION_SHORT_ANGLES,
            long_solid: true,
            playerfog: version >= Q2PRO_VERSION_PLAYERFOG,
            clientnum: if version >= Q2PRO_VERSION_CLIENTNUM_SHORT {
                ClientnumWidth::Short
            } else {
                ClientnumWidth::Byte
            },
        }
    }
}

/// Header bits for `delta`, before continuation and number bits.
fn entity_header_bits(params: &Q2proParams, delta: &EntityStateDelta) -> WireResult<u64> {
    let flags = delta.bits;
    if !params.extended && flags.intersects(EXTENDED_ENTITY_FIELDS) {
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
    if params.short_angles && !delta.angle.is_empty() {
        bits |= U_ANGLE16;
    }

    let words = params.unsigned_words;
    if flags.contains(EntityDeltaFlags::SKINNUM) {
        bits |= choose_width_flags(delta.skinnum, U_SKIN8, U_SKIN16, words);
    }
    if flags.contains(EntityDeltaFlags::FRAME) {
        bits |= if delta.frame >= 256 { U_FRAME16 } else { U_FRAME8 };
    }
    if flags.contains(EntityDeltaFlags::EFFECTS) {
        bits |= choose_width_flags(delta.effects, U_EFFECTS8, U_EFFECTS16, words);
    }
    if flags.contains(EntityDeltaFlags::EFFECTS_MORE) {
        bits |= choose_width_flags(delta.effects_more, U_MOREFX8, U_MOREFX16, true);
    }
    if flags.contains(EntityDeltaFlags::RENDERFX) {
        bits |= choose_width_flags(delta.renderfx, U_RENDERFX8, U_RENDERFX16, words);
    }
    for (model, (flag, field)) in MODEL_BITS.into_iter().enumerate() {
        if flags.contains(field) {
            bits |= flag;
            if delta.modelindex[model] > 255 {
                if !params.extended {
                    return Err(WireError::BadData);
                }
                bits |= U_MODEL16;
            }
        }
    }
    if flags.contains(EntityDeltaFlags::SOUND) {
        let limit = if params.extended { SOUND_INDEX_MASK } else { 255 };
        if delta.sound > limit {
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
    if flags.contains(EntityDeltaFlags::ALPHA) {
        bits |= U_ALPHA;
    }
    if flags.contains(EntityDeltaFlags::SCALE) {
        bits |= U_SCALE;
    }
    Ok(bits)
}

/// Writes the model indices flagged in `bits`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn write_models<W: WireWrite + ?Sized>(
    out: &mut W,
    bits: u64,
    delta: &EntityStateDelta,
) -> WireResult<()> {
    for (model, (flag, _)) in MODEL_BITS.into_iter().enumerate() {
        if bits & flag != 0 {
            if bits & U_MODEL16 != 0 {
                out.write_u16(delta.modelindex[model])?;
            } else {
                out.write_u8(delta.modelindex[model] as u8)?;
            }
        }
    }
    Ok(())
}

/// Reads the model indices flagged in `bits`. `wide` allows 16-bit models.
pub(crate) fn read_models<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
    bits: u64,
    wide: bool,
    delta: &mut EntityStateDelta,
) -> WireResult<()> {
    for (model, (flag, field)) in MODEL_BITS.into_iter().enumerate() {
        if bits & flag != 0 {
            delta.modelindex[model] = if wide && bits & U_MODEL16 != 0 {
                input.read_u16()?
            } else {
                u16::from(input.read_u8()?)
            };
            delta.bits |= field;
        }
    }
    Ok(())
}

/// Writes frame, skin, effects and renderfx.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn write_entity_scalars<W: WireWrite + ?Sized>(
    out: &mut W,
    bits: u64,
    delta: &EntityStateDelta,
) -> WireResult<()> {
    if bits & U_FRAME16 != 0 {
        out.write_u16(delta.frame)?;
    } else if bits & U_FRAME8 != 0 {
        out.write_u8(delta.frame as u8)?;
    }
    write_sized(out, bits, delta.skinnum, U_SKIN8, U_SKIN16)?;
    write_sized(out, bits, delta.effects, U_EFFECTS8, U_EFFECTS16)?;
    write_sized(out, bits, delta.renderfx, U_RENDERFX8, U_RENDERFX16)
}

/// Reads what [`write_entity_scalars`] wrote.
pub(crate) fn read_entity_scalars<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
    bits: u64,
    delta: &mut EntityStateDelta,
) -> WireResult<()> {
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
    Ok(())
}

/// Writes the looping sound word and the parameters it flags.
pub(crate) fn write_loop_sound<W: WireWrite + ?Sized>(
    out: &mut W,
    delta: &EntityStateDelta,
) -> WireResult<()> {
    let mut word = delta.sound & SOUND_INDEX_MASK;
    if delta.bits.contains(EntityDeltaFlags::LOOP_ATTENUATION) {
        word |= SOUND_FLAG_ATTENUATION;
    }
    if delta.bits.contains(EntityDeltaFlags::LOOP_VOLUME) {
        word |= SOUND_FLAG_VOLUME;
    }
    out.write_u16(word)?;
    if word & SOUND_FLAG_VOLUME != 0 {
        out.write_u8(delta.loop_volume)?;
    }
    if word & SOUND_FLAG_ATTENUATION != 0 {
        out.write_u8(delta.loop_attenuation)?;
    }
    Ok(())
}

/// Reads what [`write_loop_sound`] wrote.
pub(crate) fn read_loop_sound<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
    delta: &mut EntityStateDelta,
) -> WireResult<()> {
    let word = input.read_u16()?;
    delta.sound = word & SOUND_INDEX_MASK;
    delta.bits |= EntityDeltaFlags::SOUND;
    if word & SOUND_FLAG_VOLUME != 0 {
        delta.loop_volume = input.read_u8()?;
        delta.bits |= EntityDeltaFlags::LOOP_VOLUME;
    }
    if word & SOUND_FLAG_ATTENUATION != 0 {
        delta.loop_attenuation = input.read_u8()?;
        delta.bits |= EntityDeltaFlags::LOOP_ATTENUATION;
    }
    Ok(())
}

/// Writes upper effects, alpha and scale.
pub(crate) fn write_extended_fields<W: WireWrite + ?Sized>(
    out: &mut W,
    bits: u64,
    delta: &EntityStateDelta,
) -> WireResult<()> {
    write_sized(out, bits, delta.effects_more, U_MOREFX8, U_MOREFX16)?;
    if bits & U_ALPHA != 0 {
        out.write_u8(delta.alpha)?;
    }
    if bits & U_SCALE != 0 {
        out.write_u8(delta.scale)?;
    }
    Ok(())
}

/// Reads what [`write_extended_fields`] wrote.
pub(crate) fn read_extended_fields<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
    bits: u64,
    delta: &mut EntityStateDelta,
) -> WireResult<()> {
    if let Some(effects_more) = read_sized(input, bits, U_MOREFX8, U_MOREFX16)? {
        delta.effects_more = effects_more;
        delta.bits |= EntityDeltaFlags::EFFECTS_MORE;
    }
    if bits & U_ALPHA != 0 {
        delta.alpha = input.read_u8()?;
        delta.bits |= EntityDeltaFlags::ALPHA;
    }
    if bits & U_SCALE != 0 {
        delta.scale = input.read_u8()?;
        delta.bits |= EntityDeltaFlags::SCALE;
    }
    Ok(())
}

/// Writes one component of a coordinate that may travel as a difference.
///
/// A received delta has no baseline and is re-encoded against zero.
fn write_maybe_diff_comp<W: WireWrite + ?Sized>(
    out: &mut W,
    params: &Q2proParams,
    coords: &MaybeDiffCoords,
    comp: usize,
) -> WireResult<()> {
    let value = coords.value();
    if !params.extended_v2 {
        return out.write_i16(value.get_short_comp(comp));
    }
    let prev = match coords {
        MaybeDiffCoords::Write { prev, .. } => prev.get_int_comp(comp),
        MaybeDiffCoords::Read { .. } => 0,
    };
    out.write_q2pro_i23(value.get_int_comp(comp), prev)
}

/// Receiver-side state of a coordinate being read component by component.
#[derive(Default)]
struct CoordsReader {
    diff_bits: u8,
    delta_bits: u8,
    values: VarCoords,
}

impl CoordsReader {
    fn read_comp<'a, R: WireRead<'a> + ?Sized>(
        &mut self,
        input: &mut R,
        params: &Q2proParams,
        comp: usize,
    ) -> WireResult<()> {
        if params.extended_v2 {
            let (value, is_diff) = input.read_q2pro_i23()?;
            if is_diff {
                self.diff_bits |= 1 << comp;
            }
            self.values.set_int_comp(comp, value);
        } else {
            self.values.set_short_comp(comp, input.read_i16()?);
        }
        self.delta_bits |= 1 << comp;
        Ok(())
    }

    const fn finish(self) -> MaybeDiffCoords {
        MaybeDiffCoords::Read {
            diff_bits: self.diff_bits,
            delta_bits: self.delta_bits,
            values: self.values,
        }
    }
}

/// Writes an entity update (header and body) and returns the header bits.
///
/// # Errors
///
/// [`WireError::BadData`] if the delta carries fields or values the
/// connection has no room for, or any write error.
#[allow(clippy::cast_possible_truncation)]
pub fn write_entity_delta<W: WireWrite + ?Sized>(
    out: &mut W,
    params: &Q2proParams,
    entnum: u16,
    delta: &EntityStateDelta,
) -> WireResult<u64> {
    let bits = write_entity_bits(out, entity_header_bits(params, delta)?, entnum)?;

    write_models(out, bits, delta)?;
    write_entity_scalars(out, bits, delta)?;

    for (comp, flag) in ORIGIN_BITS.into_iter().enumerate() {
        if bits & flag != 0 {
            write_maybe_diff_comp(out, params, &delta.origin, comp)?;
        }
    }
    for (comp, flag) in ANGLE_BITS.into_iter().enumerate() {
        if bits & flag != 0 {
            if bits & U_ANGLE16 != 0 {
                out.write_i16(delta.angle.values.get_short_comp(comp))?;
            } else {
                out.write_i8(delta.angle.values.get_char_comp(comp))?;
            }
        }
    }
    if bits & U_OLDORIGIN != 0 {
        if params.extended_v2 {
            delta.old_origin.write_q2pro_i23(out, &VarCoords::default())?;
        } else {
            delta.old_origin.write_short(out)?;
        }
    }
    if bits & U_SOUND != 0 {
        if params.extended {
            write_loop_sound(out, delta)?;
        } else {
            out.write_u8(delta.sound as u8)?;
        }
    }
    if bits & U_EVENT != 0 {
        out.write_u8(delta.event)?;
    }
    if bits & U_SOLID != 0 {
        if params.long_solid {
            out.write_u32(delta.solid)?;
        } else {
            out.write_u16(delta.solid as u16)?;
        }
    }
    write_extended_fields(out, bits, delta)?;

    tracing::trace!(entnum, bits, "entity delta");
    Ok(bits)
}

/// Reads the body of an entity update whose header was `bits`.
///
/// Origin components sent as 23-bit differences are left unresolved and
/// flagged in the origin's `diff_bits`.
///
/// # Errors
///
/// Any read error.
pub fn read_entity_delta<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
    params: &Q2proParams,
    bits: u64,
) -> WireResult<EntityStateDelta> {
    let mut delta = EntityStateDelta::default();

    read_models(input, bits, params.extended, &mut delta)?;
    read_entity_scalars(input, bits, &mut delta)?;

    let mut origin = CoordsReader::default();
    for (comp, flag) in ORIGIN_BITS.into_iter().enumerate() {
        if bits & flag != 0 {
            origin.read_comp(input, params, comp)?;
        }
    }
    delta.origin = origin.finish();
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
        delta.old_origin = if params.extended_v2 {
            VarCoords::read_q2pro_i23(input, &VarCoords::default())?
        } else {
            VarCoords::read_short(input)?
        };
        delta.bits |= EntityDeltaFlags::OLD_ORIGIN;
    }
    if bits & U_SOUND != 0 {
        if params.extended {
            read_loop_sound(input, &mut delta)?;
        } else {
            delta.sound = u16::from(input.read_u8()?);
            delta.bits |= EntityDeltaFlags::SOUND;
        }
    }
    if bits & U_EVENT != 0 {
        delta.event = input.read_u8()?;
        delta.bits |= EntityDeltaFlags::EVENT;
    }
    if bits & U_SOLID != 0 {
        delta.solid = if params.long_solid {
            input.read_u32()?
        } else {
            u32::from(input.read_u16()?)
        };
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
    params: &Q2proParams,
    entnum: u16,
    delta: &EntityStateDelta,
) -> WireResult<()> {
    // Validate before the command byte goes out
    entity_header_bits(params, delta)?;
    out.write_u8(SVC_SPAWNBASELINE)?;
    write_entity_delta(out, params, entnum, delta).map(|_| ())
}

/// Reads the body of `svc_spawnbaseline` as `(entnum, delta)`.
///
/// # Errors
///
/// Any read error.
pub fn read_spawnbaseline<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
    params: &Q2proParams,
) -> WireResult<(u16, EntityStateDelta)> {
    let (bits, entnum) = read_entity_bits(input)?;
    Ok((entnum, read_entity_delta(input, params, bits)?))
}

/// Player state flags and extra flags for `delta`.
fn playerstate_flags(params: &Q2proParams, delta: &PlayerStateDelta) -> WireResult<(u32, u8)> {
    let bits = delta.bits;
    if bits.intersects(PlayerDeltaFlags::PM_VIEWHEIGHT | PlayerDeltaFlags::GUNRATE) {
        return Err(WireError::BadData);
    }

    let mut flags = 0u32;
    let mut extraflags = 0u8;

    if bits.contains(PlayerDeltaFlags::PM_TYPE) {
        flags |= u32::from(PS_M_TYPE);
    }
    let origin_changes = delta.pm_origin.write_differs_int();
    if origin_changes & 0b011 != 0 {
        flags |= u32::from(PS_M_ORIGIN);
    }
    if origin_changes & 0b100 != 0 {
        extraflags |= EPS_M_ORIGIN2;
    }
    let velocity_changes = delta.pm_velocity.write_differs_int();
    if velocity_changes & 0b011 != 0 {
        flags |= u32::from(PS_M_VELOCITY);
    }
    if velocity_changes & 0b100 != 0 {
        extraflags |= EPS_M_VELOCITY2;
    }
    if bits.contains(PlayerDeltaFlags::PM_TIME) {
        if !params.extended_v2 && delta.pm_time > 255 {
            return Err(WireError::BadData);
        }
        flags |= u32::from(PS_M_TIME);
    }
    if bits.contains(PlayerDeltaFlags::PM_FLAGS) {
        if !params.extended_v2 && delta.pm_flags > 255 {
            return Err(WireError::BadData);
        }
        flags |= u32::from(PS_M_FLAGS);
    }
    if bits.contains(PlayerDeltaFlags::PM_GRAVITY) {
        flags |= u32::from(PS_M_GRAVITY);
    }
    if bits.contains(PlayerDeltaFlags::PM_DELTA_ANGLES) {
        flags |= u32::from(PS_M_DELTA_ANGLES);
    }
    if bits.contains(PlayerDeltaFlags::VIEWOFFSET) {
        flags |= u32::from(PS_VIEWOFFSET);
    }
    if delta.viewangles.delta_bits & 0b011 != 0 {
        flags |= u32::from(PS_VIEWANGLES);
    }
    if delta.viewangles.has(2) {
        extraflags |= EPS_VIEWANGLE2;
    }
    if bits.contains(PlayerDeltaFlags::KICKANGLES) {
        flags |= u32::from(PS_KICKANGLES);
    }
    if !delta.blend.is_empty() {
        flags |= u32::from(PS_BLEND);
    }
    if !delta.damage_blend.is_empty() {
        if !params.extended_v2 {
            return Err(WireError::BadData);
        }
        flags |= u32::from(PS_BLEND);
    }
    if bits.contains(PlayerDeltaFlags::FOV) {
        flags |= u32::from(PS_FOV);
    }
    if bits.contains(PlayerDeltaFlags::RDFLAGS) {
        flags |= u32::from(PS_RDFLAGS);
    }
    if bits.intersects(PlayerDeltaFlags::GUNINDEX | PlayerDeltaFlags::GUNSKIN) {
        let fits = if params.extended {
            check_gun_word(delta)
        } else {
            !bits.contains(PlayerDeltaFlags::GUNSKIN) && delta.gunindex <= 255
        };
        if !fits {
            return Err(WireError::BadData);
        }
        flags |= u32::from(PS_WEAPONINDEX);
    }
    if bits.contains(PlayerDeltaFlags::GUNFRAME) {
        if delta.gunframe > 255 {
            return Err(WireError::BadData);
        }
        flags |= u32::from(PS_WEAPONFRAME);
    }
    if !delta.gunoffset.is_empty() {
        extraflags |= EPS_GUNOFFSET;
    }
    if !delta.gunangles.is_empty() {
        extraflags |= EPS_GUNANGLES;
    }
    if delta.statbits != 0 {
        if !params.extended_v2 && delta.statbits > u64::from(u32::MAX) {
            return Err(WireError::BadData);
        }
        extraflags |= EPS_STATS;
    }
    if bits.contains(PlayerDeltaFlags::CLIENTNUM) {
        let fits = match params.clientnum {
            ClientnumWidth::None => false,
            ClientnumWidth::Byte => (0..=255).contains(&delta.clientnum),
            ClientnumWidth::Short => true,
        };
        if !fits {
            return Err(WireError::BadData);
        }
        extraflags |= EPS_CLIENTNUM;
    }
    if !delta.fog.is_empty() {
        flags |= PS_Q2PRO_PLAYERFOG;
    }

    if flags > 0xffff {
        if !params.playerfog {
            return Err(WireError::BadData);
        }
        flags |= PS_MOREBITS;
    }
    Ok((flags, extraflags))
}

/// True if gun index and skin fit the shared 16-bit word.
pub(crate) const fn check_gun_word(delta: &PlayerStateDelta) -> bool {
    delta.gunindex <= GUNINDEX_MASK && (delta.gunskin as u32) < (1 << (16 - GUNINDEX_BITS))
}

/// Gun index and skin packed into one word.
pub(crate) const fn gun_word(delta: &PlayerStateDelta) -> u16 {
    delta.gunindex | ((delta.gunskin as u16) << GUNINDEX_BITS)
}

/// Splits a gun word into the delta's gun index and skin.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn set_gun_word(delta: &mut PlayerStateDelta, word: u16) {
    delta.gunindex = word & GUNINDEX_MASK;
    delta.gunskin = (word >> GUNINDEX_BITS) as u8;
    delta.bits |= PlayerDeltaFlags::GUNINDEX | PlayerDeltaFlags::GUNSKIN;
}

/// Writes the blend flag byte followed by the changed blend and damage
/// blend components.
pub(crate) fn write_extv2_blends<W: WireWrite + ?Sized>(
    out: &mut W,
    blend: &ColorDelta,
    damage_blend: &ColorDelta,
) -> WireResult<()> {
    let blend_bits = (blend.delta_bits & 0xf) | ((damage_blend.delta_bits & 0xf) << 4);
    out.write_u8(blend_bits)?;
    for color in [blend, damage_blend] {
        for comp in 0..4 {
            if color.has(comp) {
                out.write_u8(color.values.get_byte_comp(comp))?;
            }
        }
    }
    Ok(())
}

/// Reads what [`write_extv2_blends`] wrote.
pub(crate) fn read_extv2_blends<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
    blend: &mut ColorDelta,
    damage_blend: &mut ColorDelta,
) -> WireResult<()> {
    let blend_bits = input.read_u8()?;
    for (color, shift) in [(blend, 0), (damage_blend, 4)] {
        for comp in 0..4 {
            if blend_bits & (1 << (comp + shift)) != 0 {
                color.values.set_byte_comp(comp, input.read_u8()?);
                color.delta_bits |= 1 << comp;
            }
        }
    }
    Ok(())
}

fn write_rgb<W: WireWrite + ?Sized>(out: &mut W, color: &VarColor) -> WireResult<()> {
    for comp in 0..3 {
        out.write_u8(color.get_byte_comp(comp))?;
    }
    Ok(())
}

fn read_rgb<'a, R: WireRead<'a> + ?Sized>(input: &mut R) -> WireResult<ColorDelta> {
    let mut color = ColorDelta {
        delta_bits: 0b111,
        ..ColorDelta::default()
    };
    for comp in 0..3 {
        color.values.set_byte_comp(comp, input.read_u8()?);
    }
    Ok(color)
}

/// Writes the player fog block.
///
/// Colors go out whole when any component changed. Distances are 23-bit
/// values against zero.
///
/// # Errors
///
/// Any write error.
pub fn write_playerfog<W: WireWrite + ?Sized>(out: &mut W, fog: &FogDelta) -> WireResult<()> {
    let flags = fog.flags;
    let mut fog_bits = 0u8;
    if !fog.global.color.is_empty() {
        fog_bits |= FOG_BIT_COLOR;
    }
    if flags.contains(FogFlags::DENSITY_SKYFACTOR) {
        fog_bits |= FOG_BIT_DENSITY;
    }
    if flags.contains(FogFlags::HEIGHTFOG_DENSITY) {
        fog_bits |= FOG_BIT_HEIGHT_DENSITY;
    }
    if flags.contains(FogFlags::HEIGHTFOG_FALLOFF) {
        fog_bits |= FOG_BIT_HEIGHT_FALLOFF;
    }
    if !fog.height.start_color.is_empty() {
        fog_bits |= FOG_BIT_HEIGHT_START_COLOR;
    }
    if !fog.height.end_color.is_empty() {
        fog_bits |= FOG_BIT_HEIGHT_END_COLOR;
    }
    if flags.contains(FogFlags::HEIGHTFOG_START_DIST) {
        fog_bits |= FOG_BIT_HEIGHT_START_DIST;
    }
    if flags.contains(FogFlags::HEIGHTFOG_END_DIST) {
        fog_bits |= FOG_BIT_HEIGHT_END_DIST;
    }

    out.write_u8(fog_bits)?;
    if fog_bits & FOG_BIT_COLOR != 0 {
        write_rgb(out, &fog.global.color.values)?;
    }
    if fog_bits & FOG_BIT_DENSITY != 0 {
        let density = u32::from(fog.global.density.get_word());
        let skyfactor = u32::from(fog.global.skyfactor.get_word());
        out.write_u32(density | (skyfactor << 16))?;
    }
    if fog_bits & FOG_BIT_HEIGHT_DENSITY != 0 {
        out.write_u16(fog.height.density.get_word())?;
    }
    if fog_bits & FOG_BIT_HEIGHT_FALLOFF != 0 {
        out.write_u16(fog.height.falloff.get_word())?;
    }
    if fog_bits & FOG_BIT_HEIGHT_START_COLOR != 0 {
        write_rgb(out, &fog.height.start_color.values)?;
    }
    if fog_bits & FOG_BIT_HEIGHT_END_COLOR != 0 {
        write_rgb(out, &fog.height.end_color.values)?;
    }
    if fog_bits & FOG_BIT_HEIGHT_START_DIST != 0 {
        out.write_q2pro_i23(fog.height.start_dist.get_int(), 0)?;
    }
    if fog_bits & FOG_BIT_HEIGHT_END_DIST != 0 {
        out.write_q2pro_i23(fog.height.end_dist.get_int(), 0)?;
    }
    Ok(())
}

/// Reads the player fog block.
///
/// # Errors
///
/// Any read error.
#[allow(clippy::cast_possible_truncation)]
pub fn read_playerfog<'a, R: WireRead<'a> + ?Sized>(input: &mut R) -> WireResult<FogDelta> {
    let fog_bits = input.read_u8()?;
    let mut fog = FogDelta::default();

    if fog_bits & FOG_BIT_COLOR != 0 {
        fog.global.color = read_rgb(input)?;
    }
    if fog_bits & FOG_BIT_DENSITY != 0 {
        let combined = input.read_u32()?;
        fog.global.density = VarFraction::Word(combined as u16);
        fog.global.skyfactor = VarFraction::Word((combined >> 16) as u16);
        fog.flags |= FogFlags::DENSITY_SKYFACTOR;
    }
    if fog_bits & FOG_BIT_HEIGHT_DENSITY != 0 {
        fog.height.density = VarFraction::Word(input.read_u16()?);
        fog.flags |= FogFlags::HEIGHTFOG_DENSITY;
    }
    if fog_bits & FOG_BIT_HEIGHT_FALLOFF != 0 {
        fog.height.falloff = VarFraction::Word(input.read_u16()?);
        fog.flags |= FogFlags::HEIGHTFOG_FALLOFF;
    }
    if fog_bits & FOG_BIT_HEIGHT_START_COLOR != 0 {
        fog.height.start_color = read_rgb(input)?;
    }
    if fog_bits & FOG_BIT_HEIGHT_END_COLOR != 0 {
        fog.height.end_color = read_rgb(input)?;
    }
    // Against a zero baseline the difference form is the value itself
    if fog_bits & FOG_BIT_HEIGHT_START_DIST != 0 {
        fog.height.start_dist = VarCoord::Int(input.read_q2pro_i23()?.0);
        fog.flags |= FogFlags::HEIGHTFOG_START_DIST;
    }
    if fog_bits & FOG_BIT_HEIGHT_END_DIST != 0 {
        fog.height.end_dist = VarCoord::Int(input.read_q2pro_i23()?.0);
        fog.flags |= FogFlags::HEIGHTFOG_END_DIST;
    }
    Ok(fog)
}

/// Writes the player state body for already validated flags.
#[allow(clippy::cast_possible_truncation)]
fn write_playerstate_body<W: WireWrite + ?Sized>(
    out: &mut W,
    params: &Q2proParams,
    delta: &PlayerStateDelta,
    flags: u32,
    extraflags: u8,
) -> WireResult<()> {
    let has = |flag: u16| flags & u32::from(flag) != 0;

    out.write_u16(flags as u16)?;
    if flags & PS_MOREBITS != 0 {
        out.write_u8((flags >> 16) as u8)?;
    }

    if has(PS_M_TYPE) {
        out.write_u8(delta.pm_type)?;
    }
    if has(PS_M_ORIGIN) {
        write_maybe_diff_comp(out, params, &delta.pm_origin, 0)?;
        write_maybe_diff_comp(out, params, &delta.pm_origin, 1)?;
    }
    if extraflags & EPS_M_ORIGIN2 != 0 {
        write_maybe_diff_comp(out, params, &delta.pm_origin, 2)?;
    }
    if has(PS_M_VELOCITY) {
        write_maybe_diff_comp(out, params, &delta.pm_velocity, 0)?;
        write_maybe_diff_comp(out, params, &delta.pm_velocity, 1)?;
    }
    if extraflags & EPS_M_VELOCITY2 != 0 {
        write_maybe_diff_comp(out, params, &delta.pm_velocity, 2)?;
    }
    for (flag, value) in [(PS_M_TIME, delta.pm_time), (PS_M_FLAGS, delta.pm_flags)] {
        if has(flag) {
            if params.extended_v2 {
                out.write_u16(value)?;
            } else {
                out.write_u8(value as u8)?;
            }
        }
    }
    if has(PS_M_GRAVITY) {
        out.write_i16(delta.pm_gravity)?;
    }
    if has(PS_M_DELTA_ANGLES) {
        for comp in 0..3 {
            out.write_i16(delta.pm_delta_angles.get_short_comp(comp))?;
        }
    }
    if has(PS_VIEWOFFSET) {
        for comp in 0..3 {
            out.write_i8(delta.viewoffset.get_char_comp(comp))?;
        }
    }
    if has(PS_VIEWANGLES) {
        out.write_i16(delta.viewangles.values.get_short_comp(0))?;
        out.write_i16(delta.viewangles.values.get_short_comp(1))?;
    }
    if extraflags & EPS_VIEWANGLE2 != 0 {
        out.write_i16(delta.viewangles.values.get_short_comp(2))?;
    }
    if has(PS_KICKANGLES) {
        for comp in 0..3 {
            out.write_i8(delta.kick_angles.get_char_comp(comp))?;
        }
    }
    if has(PS_WEAPONINDEX) {
        if params.extended {
            out.write_u16(gun_word(delta))?;
        } else {
            out.write_u8(delta.gunindex as u8)?;
        }
    }
    if has(PS_WEAPONFRAME) {
        out.write_u8(delta.gunframe as u8)?;
    }
    if extraflags & EPS_GUNOFFSET != 0 {
        for comp in 0..3 {
            out.write_i8(delta.gunoffset.values.get_char_comp(comp))?;
        }
    }
    if extraflags & EPS_GUNANGLES != 0 {
        for comp in 0..3 {
            out.write_i8(delta.gunangles.values.get_char_comp(comp))?;
        }
    }
    if has(PS_BLEND) {
        if params.extended_v2 {
            write_extv2_blends(out, &delta.blend, &delta.damage_blend)?;
        } else {
            for comp in 0..4 {
                out.write_u8(delta.blend.values.get_byte_comp(comp))?;
            }
        }
    }
    if flags & PS_Q2PRO_PLAYERFOG != 0 {
        write_playerfog(out, &delta.fog)?;
    }
    if has(PS_FOV) {
        out.write_u8(delta.fov)?;
    }
    if has(PS_RDFLAGS) {
        out.write_u8(delta.rdflags)?;
    }

    if extraflags & EPS_STATS != 0 {
        if params.extended_v2 {
            out.write_var_u64(delta.statbits)?;
        } else {
            out.write_u32(delta.statbits as u32)?;
        }
        for (_, value) in delta.changed_stats() {
            out.write_i16(value)?;
        }
    }

    if extraflags & EPS_CLIENTNUM != 0 {
        match params.clientnum {
            ClientnumWidth::Short => out.write_i16(delta.clientnum)?,
            _ => out.write_u8(delta.clientnum as u8)?,
        }
    }
    Ok(())
}

/// Writes a player state and returns the extra flags the frame header
/// must carry.
///
/// # Errors
///
/// [`WireError::BadData`] if the delta carries fields or values the
/// connection has no room for, or any write error.
pub fn write_playerstate<W: WireWrite + ?Sized>(
    out: &mut W,
    params: &Q2proParams,
    delta: &PlayerStateDelta,
) -> WireResult<u8> {
    let (flags, extraflags) = playerstate_flags(params, delta)?;
    write_playerstate_body(out, params, delta, flags, extraflags)?;
    Ok(extraflags)
}

/// Reads a player state. `extraflags` comes from the frame header.
///
/// # Errors
///
/// [`WireError::BadData`] for a client number the connection cannot
/// carry, or any read error.
pub fn read_playerstate<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
    params: &Q2proParams,
    extraflags: u8,
) -> WireResult<PlayerStateDelta> {
    let mut flags = u32::from(input.read_u16()?);
    if params.playerfog && flags & PS_MOREBITS != 0 {
        flags |= u32::from(input.read_u8()?) << 16;
    }
    let has = |flag: u16| flags & u32::from(flag) != 0;
    let mut delta = PlayerStateDelta::default();

    if has(PS_M_TYPE) {
        delta.pm_type = input.read_u8()?;
        delta.bits |= PlayerDeltaFlags::PM_TYPE;
    }
    let mut origin = CoordsReader::default();
    if has(PS_M_ORIGIN) {
        origin.read_comp(input, params, 0)?;
        origin.read_comp(input, params, 1)?;
    }
    if extraflags & EPS_M_ORIGIN2 != 0 {
        origin.read_comp(input, params, 2)?;
    }
    delta.pm_origin = origin.finish();
    let mut velocity = CoordsReader::default();
    if has(PS_M_VELOCITY) {
        velocity.read_comp(input, params, 0)?;
        velocity.read_comp(input, params, 1)?;
    }
    if extraflags & EPS_M_VELOCITY2 != 0 {
        velocity.read_comp(input, params, 2)?;
    }
    delta.pm_velocity = velocity.finish();

    let read_movement = |input: &mut R| -> WireResult<u16> {
        if params.extended_v2 {
            input.read_u16()
        } else {
            input.read_u8().map(u16::from)
        }
    };
    if has(PS_M_TIME) {
        delta.pm_time = read_movement(input)?;
        delta.bits |= PlayerDeltaFlags::PM_TIME;
    }
    if has(PS_M_FLAGS) {
        delta.pm_flags = read_movement(input)?;
        delta.bits |= PlayerDeltaFlags::PM_FLAGS;
    }
    if has(PS_M_GRAVITY) {
        delta.pm_gravity = input.read_i16()?;
        delta.bits |= PlayerDeltaFlags::PM_GRAVITY;
    }
    if has(PS_M_DELTA_ANGLES) {
        for comp in 0..3 {
            delta.pm_delta_angles.set_short_comp(comp, input.read_i16()?);
        }
        delta.bits |= PlayerDeltaFlags::PM_DELTA_ANGLES;
    }
    if has(PS_VIEWOFFSET) {
        for comp in 0..3 {
            delta.viewoffset.set_char_comp(comp, input.read_i8()?);
        }
        delta.bits |= PlayerDeltaFlags::VIEWOFFSET;
    }
    if has(PS_VIEWANGLES) {
        for comp in 0..2 {
            delta.viewangles.values.set_short_comp(comp, input.read_i16()?);
        }
        delta.viewangles.delta_bits |= 0b011;
    }
    if extraflags & EPS_VIEWANGLE2 != 0 {
        delta.viewangles.values.set_short_comp(2, input.read_i16()?);
        delta.viewangles.delta_bits |= 0b100;
    }
    if has(PS_KICKANGLES) {
        for comp in 0..3 {
            delta.kick_angles.set_char_comp(comp, input.read_i8()?);
        }
        delta.bits |= PlayerDeltaFlags::KICKANGLES;
    }
    if has(PS_WEAPONINDEX) {
        if params.extended {
            set_gun_word(&mut delta, input.read_u16()?);
        } else {
            delta.gunindex = u16::from(input.read_u8()?);
            delta.bits |= PlayerDeltaFlags::GUNINDEX;
        }
    }
    if has(PS_WEAPONFRAME) {
        delta.gunframe = u16::from(input.read_u8()?);
        delta.bits |= PlayerDeltaFlags::GUNFRAME;
    }
    if extraflags & EPS_GUNOFFSET != 0 {
        for comp in 0..3 {
            delta.gunoffset.values.set_char_comp(comp, input.read_i8()?);
        }
        delta.gunoffset.delta_bits = 0b111;
    }
    if extraflags & EPS_GUNANGLES != 0 {
        for comp in 0..3 {
            delta.gunangles.values.set_char_comp(comp, input.read_i8()?);
        }
        delta.gunangles.delta_bits = 0b111;
    }
    if has(PS_BLEND) {
        if params.extended_v2 {
            read_extv2_blends(input, &mut delta.blend, &mut delta.damage_blend)?;
        } else {
            for comp in 0..4 {
                delta.blend.values.set_byte_comp(comp, input.read_u8()?);
            }
            delta.blend.delta_bits = 0b1111;
        }
    }
    if params.playerfog && flags & PS_Q2PRO_PLAYERFOG != 0 {
        delta.fog = read_playerfog(input)?;
    }
    if has(PS_FOV) {
        delta.fov = input.read_u8()?;
        delta.bits |= PlayerDeltaFlags::FOV;
    }
    if has(PS_RDFLAGS) {
        delta.rdflags = input.read_u8()?;
        delta.bits |= PlayerDeltaFlags::RDFLAGS;
    }

    if extraflags & EPS_STATS != 0 {
        let count = if params.extended_v2 {
            delta.statbits = input.read_var_u64()?;
            EXTENDED_MAX_STATS
        } else {
            delta.statbits = u64::from(input.read_u32()?);
            VANILLA_MAX_STATS
        };
        for stat in 0..count {
            if delta.statbits & (1 << stat) != 0 {
                delta.stats[stat] = input.read_i16()?;
            }
        }
    }

    if extraflags & EPS_CLIENTNUM != 0 {
        delta.clientnum = match params.clientnum {
            ClientnumWidth::Short => input.read_i16()?,
            ClientnumWidth::Byte => i16::from(input.read_u8()?),
            ClientnumWidth::None => return Err(WireError::BadData),
        };
        delta.bits |= PlayerDeltaFlags::CLIENTNUM;
    }
    Ok(delta)
}

/// Writes `svc_frame` with its player state. Entity updates follow
/// directly.
///
/// The extra flags ride in the top 3 bits of the command byte and the top
/// 4 bits of the frame flags byte.
///
/// # Errors
///
/// [`WireError::BadData`] for frame flags above 15, an unreachable delta
/// frame, area bits over 255 bytes or a player state
/// [`write_playerstate`] rejects, or any write error.
pub fn write_frame<W: WireWrite + ?Sized>(
    out: &mut W,
    params: &Q2proParams,
    header: &FrameHeader<'_>,
    player: &PlayerStateDelta,
) -> WireResult<()> {
    let (flags, extraflags) = playerstate_flags(params, player)?;
    let encoded = encode_frame_number(header.serverframe, header.deltaframe)?;
    if header.flags > 0x0f || header.areabits.len() > usize::from(u8::MAX) {
        return Err(WireError::BadData);
    }

    out.write_u8(SVC_FRAME | ((extraflags & 0x70) << 1))?;
    out.write_i32(encoded)?;
    out.write_u8(header.flags | ((extraflags & 0x0f) << 4))?;
    write_areabits(out, header.areabits)?;
    write_playerstate_body(out, params, player, flags, extraflags)?;

    tracing::trace!(
        serverframe = header.serverframe,
        deltaframe = ?header.deltaframe,
        extraflags,
        "frame"
    );
    Ok(())
}

/// Reads the body of `svc_frame`. `command` is the command byte, whose
/// top bits carry extra flags.
///
/// # Errors
///
/// Any error [`read_playerstate`] reports.
pub fn read_frame<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
    params: &Q2proParams,
    command: u8,
) -> WireResult<(FrameHeader<'a>, PlayerStateDelta)> {
    let (serverframe, deltaframe) = decode_frame_number(input.read_i32()?);
    let flags = input.read_u8()?;
    let extraflags = ((command & 0xe0) >> 1) | ((flags & 0xf0) >> 4);
    let areabits = read_areabits(input)?;
    let player = read_playerstate(input, params, extraflags)?;

    let header = FrameHeader {
        serverframe,
        deltaframe,
        flags: flags & 0x0f,
        areabits,
    };
    Ok((header, player))
}

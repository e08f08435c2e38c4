//! # Sound Messages
//!
//! Conversion between the game's view of a sound (normalized volume and
//! attenuation, seconds, optional entity and position) and the compact
//! wire record, plus the two wire layouts in use.
//!
//! ## Design Philosophy
//!
//! - Fields equal to the protocol default are not sent at all
//! - Encoding clamps, decoding never fails
//! - Reading a record yields the same [`SoundMessage`] that was written

use crate::error::WireResult;
use crate::io::{WireRead, WireWrite};
use crate::messages::SVC_SOUND;
use crate::protocol::MulticastProtocol;
use crate::values::VarCoords;
use crate::Vec3;

bitflags::bitflags! {
    /// Which optional parts of a sound record are present.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SoundFlags: u8 {
        /// Volume byte present.
        const VOLUME = 1 << 0;
        /// Attenuation byte present.
        const ATTENUATION = 1 << 1;
        /// Position present.
        const POS = 1 << 2;
        /// Entity and channel present.
        const ENT = 1 << 3;
        /// Time offset present.
        const OFFSET = 1 << 4;
        /// Sound index is 16 bits.
        const INDEX16 = 1 << 5;
        /// Entity/channel word is 32 bits (rerelease).
        const KEX_LARGE_ENT = 1 << 6;
    }
}

/// Volume byte implied when [`SoundFlags::VOLUME`] is clear.
pub const SOUND_DEFAULT_VOLUME: u8 = 255;
/// Attenuation byte implied when [`SoundFlags::ATTENUATION`] is clear.
pub const SOUND_DEFAULT_ATTENUATION: u8 = 64;

/// Loop attenuation meaning "no attenuation at all".
pub const ATTN_LOOP_NONE: f32 = -1.0;
/// Wire byte for [`ATTN_LOOP_NONE`].
pub const ENCODE_LOOP_NONE: u8 = 192;

/// An entity and one of its sound channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EntityChannel {
    /// Entity number.
    pub entity: u32,
    /// Channel, 0..8.
    pub channel: u8,
}

/// A sound as the game sees it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sound {
    /// Sound configstring index.
    pub index: u16,
    /// Entity the sound is attached to.
    pub entity: Option<EntityChannel>,
    /// Position in world units.
    pub position: Option<Vec3>,
    /// Volume, 0..1.
    pub volume: f32,
    /// Attenuation, 0..4.
    pub attenuation: f32,
    /// Start delay in seconds.
    pub timeofs: f32,
}

/// A sound as it travels on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SoundMessage {
    /// Present fields.
    pub flags: SoundFlags,
    /// Sound configstring index.
    pub index: u16,
    /// Volume in 1/255 units.
    pub volume: u8,
    /// Attenuation in 1/64 units.
    pub attenuation: u8,
    /// Start delay in milliseconds.
    pub timeofs: u8,
    /// Entity number.
    pub entity: u32,
    /// Channel.
    pub channel: u8,
    /// Position.
    pub pos: VarCoords,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_byte(value: f32) -> u8 {
    // Saturating cast, then clamp into the byte range.
    (value as i32).clamp(0, 255) as u8
}

impl Sound {
    /// Builds the wire record, leaving out fields that match the defaults.
    #[must_use]
    pub fn encode(&self) -> SoundMessage {
        let mut msg = SoundMessage {
            index: self.index,
            ..SoundMessage::default()
        };
        if self.index > 255 {
            msg.flags |= SoundFlags::INDEX16;
        }
        if let Some(ent) = self.entity {
            msg.flags |= SoundFlags::ENT;
            msg.entity = ent.entity;
            msg.channel = ent.channel;
        }
        if let Some(pos) = self.position {
            msg.flags |= SoundFlags::POS;
            msg.pos = VarCoords::from_floats(pos);
        }

        let volume = clamp_byte(self.volume * 255.0);
        if volume != SOUND_DEFAULT_VOLUME {
            msg.flags |= SoundFlags::VOLUME;
            msg.volume = volume;
        }
        let attenuation = clamp_byte(self.attenuation * 64.0);
        if attenuation != SOUND_DEFAULT_ATTENUATION {
            msg.flags |= SoundFlags::ATTENUATION;
            msg.attenuation = attenuation;
        }
        let timeofs = clamp_byte(self.timeofs * 1000.0);
        if timeofs != 0 {
            msg.flags |= SoundFlags::OFFSET;
            msg.timeofs = timeofs;
        }
        msg
    }
}

impl SoundMessage {
    /// Expands the wire record, filling in defaults for absent fields.
    #[must_use]
    pub fn decode(&self) -> Sound {
        let flags = self.flags;
        Sound {
            index: self.index,
            entity: flags.contains(SoundFlags::ENT).then_some(EntityChannel {
                entity: self.entity,
                channel: self.channel,
            }),
            position: flags.contains(SoundFlags::POS).then(|| self.pos.get_float()),
            volume: if flags.contains(SoundFlags::VOLUME) {
                f32::from(self.volume) / 255.0
            } else {
                f32::from(SOUND_DEFAULT_VOLUME) / 255.0
            },
            attenuation: if flags.contains(SoundFlags::ATTENUATION) {
                f32::from(self.attenuation) / 64.0
            } else {
                f32::from(SOUND_DEFAULT_ATTENUATION) / 64.0
            },
            timeofs: if flags.contains(SoundFlags::OFFSET) {
                f32::from(self.timeofs) / 1000.0
            } else {
                0.0
            },
        }
    }

    /// Entity and channel packed as `(entity << 3) | channel`.
    #[inline]
    #[must_use]
    pub const fn entchan(&self) -> u32 {
        (self.entity << 3) | (self.channel as u32 & 7)
    }

    #[inline]
    fn set_entchan(&mut self, entchan: u32) {
        self.entity = entchan >> 3;
        #[allow(clippy::cast_possible_truncation)]
        let channel = (entchan & 7) as u8;
        self.channel = channel;
    }

    /// Reads the optional volume, attenuation and offset bytes.
    fn read_levels<'a, R: WireRead<'a> + ?Sized>(&mut self, input: &mut R) -> WireResult<()> {
        self.volume = if self.flags.contains(SoundFlags::VOLUME) {
            input.read_u8()?
        } else {
            SOUND_DEFAULT_VOLUME
        };
        self.attenuation = if self.flags.contains(SoundFlags::ATTENUATION) {
            input.read_u8()?
        } else {
            SOUND_DEFAULT_ATTENUATION
        };
        if self.flags.contains(SoundFlags::OFFSET) {
            self.timeofs = input.read_u8()?;
        }
        Ok(())
    }

    fn write_levels<W: WireWrite + ?Sized>(&self, out: &mut W) -> WireResult<()> {
        if self.flags.contains(SoundFlags::VOLUME) {
            out.write_u8(self.volume)?;
        }
        if self.flags.contains(SoundFlags::ATTENUATION) {
            out.write_u8(self.attenuation)?;
        }
        if self.flags.contains(SoundFlags::OFFSET) {
            out.write_u8(self.timeofs)?;
        }
        Ok(())
    }
}

/// Decodes a loop attenuation byte; [`ENCODE_LOOP_NONE`] maps to
/// [`ATTN_LOOP_NONE`].
#[must_use]
pub fn decode_loop_attenuation(value: u8) -> f32 {
    if value == ENCODE_LOOP_NONE {
        ATTN_LOOP_NONE
    } else {
        f32::from(value) / 64.0
    }
}

/// Encodes a loop attenuation.
///
/// [`ATTN_LOOP_NONE`] becomes [`ENCODE_LOOP_NONE`]; any other value that
/// would collide with it is sent as 0, the static default.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn encode_loop_attenuation(value: f32) -> u8 {
    if value == ATTN_LOOP_NONE {
        return ENCODE_LOOP_NONE;
    }
    match clamp_byte(value * 64.0) {
        ENCODE_LOOP_NONE => 0,
        encoded => encoded,
    }
}

/// Writes `svc_sound` in the layout shared by vanilla, R1Q2, Q2PRO and
/// Q2rePRO. The position uses the multicast format.
///
/// # Errors
///
/// Any write error, or [`crate::WireError::ProtocolNotSupported`] when a
/// position is present and `multicast` is invalid.
#[allow(clippy::cast_possible_truncation)]
pub fn write_sound<W: WireWrite + ?Sized>(
    out: &mut W,
    multicast: MulticastProtocol,
    sound: &SoundMessage,
) -> WireResult<()> {
    out.write_u8(SVC_SOUND)?;
    out.write_u8(sound.flags.bits())?;
    if sound.flags.contains(SoundFlags::INDEX16) {
        out.write_u16(sound.index)?;
    } else {
        out.write_u8(sound.index as u8)?;
    }
    sound.write_levels(out)?;
    if sound.flags.contains(SoundFlags::ENT) {
        out.write_u16(sound.entchan() as u16)?;
    }
    if sound.flags.contains(SoundFlags::POS) {
        multicast.write_pos(out, sound.pos.get_float())?;
    }
    Ok(())
}

/// Reads the body of an `svc_sound` written by [`write_sound`]. The command
/// byte must already be consumed.
///
/// # Errors
///
/// Any read error.
pub fn read_sound<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
    multicast: MulticastProtocol,
) -> WireResult<SoundMessage> {
    let mut sound = SoundMessage {
        flags: SoundFlags::from_bits_retain(input.read_u8()?),
        ..SoundMessage::default()
    };
    sound.index = if sound.flags.contains(SoundFlags::INDEX16) {
        input.read_u16()?
    } else {
        u16::from(input.read_u8()?)
    };
    sound.read_levels(input)?;
    if sound.flags.contains(SoundFlags::ENT) {
        sound.set_entchan(u32::from(input.read_u16()?));
    }
    if sound.flags.contains(SoundFlags::POS) {
        sound.pos = multicast.read_pos(input)?;
    }
    Ok(sound)
}

/// Writes `svc_sound` in the rerelease layout.
///
/// The index is always 16 bits. The entity/channel word grows to 32 bits,
/// with [`SoundFlags::KEX_LARGE_ENT`] set, when it does not fit 16. Demos
/// carry the position as 1/8-unit shorts, live games as floats.
///
/// # Errors
///
/// Any write error.
#[allow(clippy::cast_possible_truncation)]
pub fn write_sound_kex<W: WireWrite + ?Sized>(
    out: &mut W,
    demo: bool,
    sound: &SoundMessage,
) -> WireResult<()> {
    let entchan = sound.entchan();
    let mut flags = sound.flags;
    flags.set(
        SoundFlags::KEX_LARGE_ENT,
        flags.contains(SoundFlags::ENT) && entchan > u32::from(u16::MAX),
    );

    out.write_u8(SVC_SOUND)?;
    out.write_u8(flags.bits())?;
    out.write_u16(sound.index)?;
    sound.write_levels(out)?;
    if flags.contains(SoundFlags::ENT) {
        if flags.contains(SoundFlags::KEX_LARGE_ENT) {
            out.write_u32(entchan)?;
        } else {
            out.write_u16(entchan as u16)?;
        }
    }
    if flags.contains(SoundFlags::POS) {
        if demo {
            for comp in sound.pos.get_int() {
                out.write_u16(comp as u16)?;
            }
        } else {
            sound.pos.write_float(out)?;
        }
    }
    Ok(())
}

/// Reads the body of an `svc_sound` written by [`write_sound_kex`]. The
/// command byte must already be consumed.
///
/// # Errors
///
/// Any read error.
pub fn read_sound_kex<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
    demo: bool,
) -> WireResult<SoundMessage> {
    let mut sound = SoundMessage {
        flags: SoundFlags::from_bits_retain(input.read_u8()?),
        index: input.read_u16()?,
        ..SoundMessage::default()
    };
    sound.read_levels(input)?;
    if sound.flags.contains(SoundFlags::ENT) {
        let entchan = if sound.flags.contains(SoundFlags::KEX_LARGE_ENT) {
            input.read_u32()?
        } else {
            u32::from(input.read_u16()?)
        };
        sound.set_entchan(entchan);
    }
    if sound.flags.contains(SoundFlags::POS) {
        sound.pos = if demo {
            VarCoords::read_short(input)?
        } else {
            VarCoords::read_float(input)?
        };
    }
    Ok(sound)
}

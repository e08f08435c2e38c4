//! # Entity Update Header
//!
//! Every entity update starts with a variable-length change mask followed by
//! the entity number:
//!
//! ```text
//! [bits 0-7] [bits 8-15]? [bits 16-23]? [bits 24-31]? [bits 32-39]? [entnum u8 | u16]
//! ```
//!
//! The top bit of each mask byte (`U_MOREBITS1..4`) says another byte
//! follows. `U_NUMBER16` selects a two byte entity number.

use crate::error::WireResult;
use crate::io::{WireRead, WireWrite};
use crate::packing::EntityDeltaFlags;

/// Origin X changed.
pub const U_ORIGIN1: u64 = 1 << 0;
/// Origin Y changed.
pub const U_ORIGIN2: u64 = 1 << 1;
/// Yaw changed.
pub const U_ANGLE2: u64 = 1 << 2;
/// Roll changed.
pub const U_ANGLE3: u64 = 1 << 3;
/// Frame, 8 bits.
pub const U_FRAME8: u64 = 1 << 4;
/// One-shot event present.
pub const U_EVENT: u64 = 1 << 5;
/// Remove the entity.
pub const U_REMOVE: u64 = 1 << 6;
/// Second mask byte follows.
pub const U_MOREBITS1: u64 = 1 << 7;
/// Entity number is 16 bits.
pub const U_NUMBER16: u64 = 1 << 8;
/// Origin Z changed.
pub const U_ORIGIN3: u64 = 1 << 9;
/// Pitch changed.
pub const U_ANGLE1: u64 = 1 << 10;
/// Model index changed.
pub const U_MODEL: u64 = 1 << 11;
/// Render effects, 8 bits.
pub const U_RENDERFX8: u64 = 1 << 12;
/// Q2PRO: angles are 16 bits.
pub const U_ANGLE16: u64 = 1 << 13;
/// Effects, 8 bits.
pub const U_EFFECTS8: u64 = 1 << 14;
/// Third mask byte follows.
pub const U_MOREBITS2: u64 = 1 << 15;
/// Skin, 8 bits.
pub const U_SKIN8: u64 = 1 << 16;
/// Frame, 16 bits.
pub const U_FRAME16: u64 = 1 << 17;
/// Render effects, 16 bits (with `U_RENDERFX8`: 32 bits).
pub const U_RENDERFX16: u64 = 1 << 18;
/// Effects, 16 bits (with `U_EFFECTS8`: 32 bits).
pub const U_EFFECTS16: u64 = 1 << 19;
/// Second model index changed.
pub const U_MODEL2: u64 = 1 << 20;
/// Third model index changed.
pub const U_MODEL3: u64 = 1 << 21;
/// Fourth model index changed.
pub const U_MODEL4: u64 = 1 << 22;
/// Fourth mask byte follows.
pub const U_MOREBITS3: u64 = 1 << 23;
/// Old origin present.
pub const U_OLDORIGIN: u64 = 1 << 24;
/// Skin, 16 bits (with `U_SKIN8`: 32 bits).
pub const U_SKIN16: u64 = 1 << 25;
/// Looping sound changed.
pub const U_SOUND: u64 = 1 << 26;
/// Solid changed.
pub const U_SOLID: u64 = 1 << 27;
/// Model indices are 16 bits.
pub const U_MODEL16: u64 = 1 << 28;
/// Upper effects, 8 bits.
pub const U_MOREFX8: u64 = 1 << 29;
/// Alpha changed.
pub const U_ALPHA: u64 = 1 << 30;
/// Fifth mask byte follows.
pub const U_MOREBITS4: u64 = 1 << 31;
/// Scale changed.
pub const U_SCALE: u64 = 1 << 32;
/// Upper effects, 16 bits.
pub const U_MOREFX16: u64 = 1 << 33;

/// Skin, 32 bits (laser colors).
pub const U_SKIN32: u64 = U_SKIN8 | U_SKIN16;
/// Effects, 32 bits.
pub const U_EFFECTS32: u64 = U_EFFECTS8 | U_EFFECTS16;
/// Render effects, 32 bits.
pub const U_RENDERFX32: u64 = U_RENDERFX8 | U_RENDERFX16;
/// Upper effects, 32 bits.
pub const U_MOREFX32: u64 = U_MOREFX8 | U_MOREFX16;

/// Picks the narrowest of the 8/16/32-bit flag combinations that holds `value`.
///
/// Unless `u16_safe`, values with bit 15 set go out as 32 bits so old clients
/// that sign-extend 16-bit fields don't misread them.
#[must_use]
pub const fn choose_width_flags(value: u32, flag8: u64, flag16: u64, u16_safe: bool) -> u64 {
    let mask32 = if u16_safe { 0xffff_0000 } else { 0xffff_8000 };
    if value & mask32 != 0 {
        flag8 | flag16
    } else if value & 0xff00 != 0 {
        flag16
    } else {
        flag8
    }
}

/// Origin bits per component.
pub(crate) const ORIGIN_BITS: [u64; 3] = [U_ORIGIN1, U_ORIGIN2, U_ORIGIN3];
/// Angle bits per component.
pub(crate) const ANGLE_BITS: [u64; 3] = [U_ANGLE1, U_ANGLE2, U_ANGLE3];
/// Header bit and delta field of each model slot.
pub(crate) const MODEL_BITS: [(u64, EntityDeltaFlags); 4] = [
    (U_MODEL, EntityDeltaFlags::MODELINDEX),
    (U_MODEL2, EntityDeltaFlags::MODELINDEX2),
    (U_MODEL3, EntityDeltaFlags::MODELINDEX3),
    (U_MODEL4, EntityDeltaFlags::MODELINDEX4),
];

/// Writes a value in the width selected by its 8/16-bit flags.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn write_sized<W: WireWrite + ?Sized>(
    out: &mut W,
    bits: u64,
    value: u32,
    flag8: u64,
    flag16: u64,
) -> WireResult<()> {
    let both = flag8 | flag16;
    if bits & both == both {
        out.write_u32(value)
    } else if bits & flag16 != 0 {
        out.write_u16(value as u16)
    } else if bits & flag8 != 0 {
        out.write_u8(value as u8)
    } else {
        Ok(())
    }
}

/// Reads a value in the width selected by its 8/16-bit flags.
pub(crate) fn read_sized<'a, R: WireRead<'a> + ?Sized>(
    input: &mut R,
    bits: u64,
    flag8: u64,
    flag16: u64,
) -> WireResult<Option<u32>> {
    let both = flag8 | flag16;
    Ok(if bits & both == both {
        Some(input.read_u32()?)
    } else if bits & flag16 != 0 {
        Some(u32::from(input.read_u16()?))
    } else if bits & flag8 != 0 {
        Some(u32::from(input.read_u8()?))
    } else {
        None
    })
}

/// Adds the entity-number width and continuation bits that `bits` needs.
#[must_use]
pub const fn finalize_entity_bits(mut bits: u64, entnum: u16) -> u64 {
    if entnum >= 256 {
        bits |= U_NUMBER16;
    }
    if bits & 0xff_0000_0000 != 0 {
        bits |= U_MOREBITS4 | U_MOREBITS3 | U_MOREBITS2 | U_MOREBITS1;
    } else if bits & 0xff00_0000 != 0 {
        bits |= U_MOREBITS3 | U_MOREBITS2 | U_MOREBITS1;
    } else if bits & 0x00ff_0000 != 0 {
        bits |= U_MOREBITS2 | U_MOREBITS1;
    } else if bits & 0x0000_ff00 != 0 {
        bits |= U_MOREBITS1;
    }
    bits
}

/// Number of bytes a finalized header occupies on the wire.
#[must_use]
pub const fn entity_bits_size(bits: u64) -> usize {
    let mask_bytes = if bits & U_MOREBITS4 != 0 {
        5
    } else if bits & U_MOREBITS3 != 0 {
        4
    } else if bits & U_MOREBITS2 != 0 {
        3
    } else if bits & U_MOREBITS1 != 0 {
        2
    } else {
        1
    };
    mask_bytes + if bits & U_NUMBER16 != 0 { 2 } else { 1 }
}

/// Writes an entity update header and returns the finalized bits.
#[allow(clippy::cast_possible_truncation)]
pub fn write_entity_bits<W: WireWrite + ?Sized>(
    out: &mut W,
    bits: u64,
    entnum: u16,
) -> WireResult<u64> {
    let bits = finalize_entity_bits(bits, entnum);

    out.write_u8(bits as u8)?;
    for (more, shift) in [
        (U_MOREBITS1, 8),
        (U_MOREBITS2, 16),
        (U_MOREBITS3, 24),
        (U_MOREBITS4, 32),
    ] {
        if bits & more != 0 {
            out.write_u8((bits >> shift) as u8)?;
        }
    }

    if bits & U_NUMBER16 != 0 {
        out.write_u16(entnum)?;
    } else {
        out.write_u8(entnum as u8)?;
    }
    Ok(bits)
}

/// Reads an entity update header as `(bits, entnum)`.
pub fn read_entity_bits<'a, R: WireRead<'a> + ?Sized>(input: &mut R) -> WireResult<(u64, u16)> {
    let mut bits = u64::from(input.read_u8()?);
    for (more, shift) in [
        (U_MOREBITS1, 8),
        (U_MOREBITS2, 16),
        (U_MOREBITS3, 24),
        (U_MOREBITS4, 32),
    ] {
        if bits & more != 0 {
            bits |= u64::from(input.read_u8()?) << shift;
        }
    }

    let entnum = if bits & U_NUMBER16 != 0 {
        input.read_u16()?
    } else {
        u16::from(input.read_u8()?)
    };
    Ok((bits, entnum))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{PacketReader, PacketWriter};

    #[test]
    fn test_size_matches_written() {
        // One representative per mask byte count.
        let samples = [U_ORIGIN1, U_MODEL, U_SKIN8, U_SOUND, U_SCALE];
        for (expected_mask_bytes, &bits) in (1..=5).zip(samples.iter()) {
            for entnum in [1u16, 255, 256, 4095] {
                let mut writer = PacketWriter::new(16);
                let finalized = write_entity_bits(&mut writer, bits, entnum).unwrap();
                // U_NUMBER16 sits in the second mask byte.
                let (mask_bytes, number_bytes) = if entnum >= 256 {
                    (expected_mask_bytes.max(2), 2)
                } else {
                    (expected_mask_bytes, 1)
                };
                assert_eq!(writer.len(), mask_bytes + number_bytes);
                assert_eq!(entity_bits_size(finalized), writer.len());
            }
        }
    }

    #[test]
    fn test_entnum_256_forces_second_byte() {
        // U_NUMBER16 lives in the second byte, so it drags in MOREBITS1.
        let bits = finalize_entity_bits(U_ORIGIN1, 256);
        assert_eq!(bits, U_ORIGIN1 | U_NUMBER16 | U_MOREBITS1);
        assert_eq!(entity_bits_size(bits), 4);
    }

    #[test]
    fn test_header_round_trip() {
        let mut writer = PacketWriter::new(16);
        let written = write_entity_bits(&mut writer, U_ALPHA | U_ANGLE2, 300).unwrap();
        let mut reader = PacketReader::new(writer.as_slice());
        let (bits, entnum) = read_entity_bits(&mut reader).unwrap();
        assert_eq!(bits, written);
        assert_eq!(entnum, 300);
        assert_eq!(reader.read_available(), 0);
    }

    #[test]
    fn test_choose_width() {
        assert_eq!(choose_width_flags(5, U_SKIN8, U_SKIN16, false), U_SKIN8);
        assert_eq!(choose_width_flags(0x1234, U_SKIN8, U_SKIN16, false), U_SKIN16);
        assert_eq!(choose_width_flags(0x8000, U_SKIN8, U_SKIN16, false), U_SKIN32);
        assert_eq!(choose_width_flags(0x8000, U_SKIN8, U_SKIN16, true), U_SKIN16);
        assert_eq!(choose_width_flags(0x1_0000, U_SKIN8, U_SKIN16, true), U_SKIN32);
    }

    #[test]
    fn test_truncated_header() {
        let mut reader = PacketReader::new(&[0x80]);
        assert!(read_entity_bits(&mut reader).is_err());
    }
}

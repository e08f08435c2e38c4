//! # Frame Headers
//!
//! Every `svc_frame` starts with the frame numbers, a flags byte and the
//! area visibility bits. Protocol 34 sends both frame numbers in full; the
//! later protocols pack the delta distance into the top 5 bits of a single
//! number.

use crate::error::{WireError, WireResult};
use crate::io::{WireRead, WireWrite};

/// Bits of an encoded frame number that carry the frame itself.
pub const FRAME_NUMBER_MASK: i32 = 0x07FF_FFFF;

/// Delta distance meaning "not delta compressed".
pub const NO_DELTA_OFFSET: u32 = 31;

/// Frame header fields shared by every protocol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameHeader<'a> {
    /// Number of this frame.
    pub serverframe: i32,
    /// Frame this one is delta compressed against, if any.
    pub deltaframe: Option<i32>,
    /// Suppressed packet count, or the Q2PRO frame flags. Only the low 4
    /// bits survive on R1Q2 and Q2PRO.
    pub flags: u8,
    /// Area visibility bits.
    pub areabits: &'a [u8],
}

/// Packs the frame number and its delta distance into one value.
///
/// # Errors
///
/// [`WireError::BadData`] if `deltaframe` is ahead of `serverframe` or 31
/// or more frames behind it.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn encode_frame_number(serverframe: i32, deltaframe: Option<i32>) -> WireResult<i32> {
    let offset = match deltaframe {
        None => NO_DELTA_OFFSET,
        Some(delta) => match u32::try_from(serverframe.wrapping_sub(delta)) {
            Ok(offset) if offset < NO_DELTA_OFFSET => offset,
            _ => {
                tracing::debug!(serverframe, delta, "delta frame out of range");
                return Err(WireError::BadData);
            }
        },
    };
    Ok(((serverframe & FRAME_NUMBER_MASK) as u32 | (offset << 27)) as i32)
}

/// Splits an encoded frame number into `(serverframe, deltaframe)`.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub const fn decode_frame_number(encoded: i32) -> (i32, Option<i32>) {
    let offset = (encoded as u32) >> 27;
    let serverframe = encoded & FRAME_NUMBER_MASK;
    if offset == NO_DELTA_OFFSET {
        (serverframe, None)
    } else {
        (serverframe, Some(serverframe - offset as i32))
    }
}

/// Writes the area bits with their length byte.
///
/// # Errors
///
/// [`WireError::BadData`] for more than 255 bytes, or any write error.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn write_areabits<W: WireWrite + ?Sized>(out: &mut W, areabits: &[u8]) -> WireResult<()> {
    if areabits.len() > usize::from(u8::MAX) {
        return Err(WireError::BadData);
    }
    out.write_u8(areabits.len() as u8)?;
    out.write_raw(areabits)
}

/// Reads the area bits written by [`write_areabits`].
pub(crate) fn read_areabits<'a, R: WireRead<'a> + ?Sized>(input: &mut R) -> WireResult<&'a [u8]> {
    let len = usize::from(input.read_u8()?);
    input.read_raw(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{PacketReader, PacketWriter};

    #[test]
    fn test_frame_number_packing() {
        let encoded = encode_frame_number(1000, Some(998)).unwrap();
        assert_eq!(encoded >> 27, 2);
        assert_eq!(decode_frame_number(encoded), (1000, Some(998)));

        let full = encode_frame_number(1000, None).unwrap();
        assert_eq!(decode_frame_number(full), (1000, None));
        assert!(full < 0);

        // Only 27 bits of the frame survive
        let wrapped = encode_frame_number(FRAME_NUMBER_MASK + 5, None).unwrap();
        assert_eq!(decode_frame_number(wrapped).0, 4);
    }

    #[test]
    fn test_frame_number_rejects_offsets() {
        assert_eq!(encode_frame_number(100, Some(101)), Err(WireError::BadData));
        assert_eq!(encode_frame_number(100, Some(69)), Err(WireError::BadData));
        assert!(encode_frame_number(100, Some(70)).is_ok());
    }

    #[test]
    fn test_areabits() {
        let mut writer = PacketWriter::new(16);
        write_areabits(&mut writer, &[0xff, 0x01]).unwrap();
        assert_eq!(writer.as_slice(), &[2, 0xff, 0x01]);
        let mut reader = PacketReader::new(writer.as_slice());
        assert_eq!(read_areabits(&mut reader).unwrap(), &[0xff, 0x01]);

        let mut writer = PacketWriter::new(512);
        assert_eq!(write_areabits(&mut writer, &[0; 256]), Err(WireError::BadData));
    }
}

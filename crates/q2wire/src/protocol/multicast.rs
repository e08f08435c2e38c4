//! Position encoding shared by every client of a multicast message.
//!
//! Messages sent to several clients at once (sounds, temp entities) are
//! written once, so their positions must use a format every accepted
//! protocol understands.

use super::game_api::GameApi;
use super::version::Protocol;
use crate::error::{WireError, WireResult};
use crate::io::{WireRead, WireWrite};
use crate::values::VarCoords;
use crate::Vec3;

/// Position format for multicast messages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MulticastProtocol {
    /// No common format exists.
    #[default]
    Invalid,
    /// Three 1/8-unit shorts.
    Short,
    /// Three Q2PRO 23-bit values.
    Q2proExtendedCoords,
    /// Three floats.
    Float,
}

impl MulticastProtocol {
    /// Picks the format for `game_api` given the protocols the server accepts.
    ///
    /// Returns [`MulticastProtocol::Invalid`] if `accepted` contains none of
    /// the game API's protocols, or any protocol the game API cannot use.
    #[must_use]
    pub fn select(accepted: &[Protocol], game_api: GameApi) -> Self {
        let any_supported = accepted.iter().any(|&p| game_api.supports(p));
        let any_unsupported = accepted.iter().any(|&p| !game_api.supports(p));
        if !any_supported || any_unsupported {
            tracing::debug!(?game_api, ?accepted, "no common multicast format");
            return Self::Invalid;
        }

        let selected = match game_api {
            GameApi::Vanilla | GameApi::Q2proExtended => Self::Short,
            GameApi::Q2proExtendedV2 => Self::Q2proExtendedCoords,
            GameApi::Rerelease => Self::Float,
        };
        tracing::debug!(?game_api, ?selected, "multicast format selected");
        selected
    }

    /// Writes a position.
    ///
    /// # Errors
    ///
    /// [`WireError::ProtocolNotSupported`] for [`MulticastProtocol::Invalid`],
    /// or any write error.
    pub fn write_pos<W: WireWrite + ?Sized>(self, out: &mut W, pos: Vec3) -> WireResult<()> {
        let coords = VarCoords::from_floats(pos);
        match self {
            Self::Invalid => Err(WireError::ProtocolNotSupported),
            Self::Short => coords.write_short(out),
            Self::Q2proExtendedCoords => coords.write_q2pro_i23(out, &VarCoords::default()),
            Self::Float => coords.write_float(out),
        }
    }

    /// Reads a position written by [`MulticastProtocol::write_pos`].
    ///
    /// # Errors
    ///
    /// [`WireError::ProtocolNotSupported`] for [`MulticastProtocol::Invalid`],
    /// or any read error.
    pub fn read_pos<'a, R: WireRead<'a> + ?Sized>(self, input: &mut R) -> WireResult<VarCoords> {
        match self {
            Self::Invalid => Err(WireError::ProtocolNotSupported),
            Self::Short => VarCoords::read_short(input),
            Self::Q2proExtendedCoords => VarCoords::read_q2pro_i23(input, &VarCoords::default()),
            Self::Float => VarCoords::read_float(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{PacketReader, PacketWriter};

    #[test]
    fn test_select() {
        let vanilla = [Protocol::Vanilla, Protocol::R1q2, Protocol::Q2pro];
        assert_eq!(
            MulticastProtocol::select(&vanilla, GameApi::Vanilla),
            MulticastProtocol::Short
        );
        assert_eq!(
            MulticastProtocol::select(&[Protocol::Q2pro], GameApi::Q2proExtendedV2),
            MulticastProtocol::Q2proExtendedCoords
        );
        assert_eq!(
            MulticastProtocol::select(&[Protocol::Q2repro], GameApi::Rerelease),
            MulticastProtocol::Float
        );
    }

    #[test]
    fn test_select_rejects_mixed_or_empty() {
        assert_eq!(
            MulticastProtocol::select(&[Protocol::Q2pro, Protocol::Vanilla], GameApi::Q2proExtended),
            MulticastProtocol::Invalid
        );
        assert_eq!(
            MulticastProtocol::select(&[], GameApi::Vanilla),
            MulticastProtocol::Invalid
        );
    }

    #[test]
    fn test_pos_sizes() {
        let pos = [100.5, -32.0, 8.125];
        for (proto, size) in [
            (MulticastProtocol::Short, 6),
            (MulticastProtocol::Float, 12),
        ] {
            let mut writer = PacketWriter::new(64);
            proto.write_pos(&mut writer, pos).unwrap();
            assert_eq!(writer.len(), size);
            let mut reader = PacketReader::new(writer.as_slice());
            assert_eq!(proto.read_pos(&mut reader).unwrap().get_float(), pos);
        }
    }

    #[test]
    fn test_pos_q2pro_extended() {
        let pos = [4000.0, -12.5, 0.0];
        let mut writer = PacketWriter::new(64);
        MulticastProtocol::Q2proExtendedCoords
            .write_pos(&mut writer, pos)
            .unwrap();
        // 32000 needs the full form, -100 and 0 fit the short form.
        assert_eq!(writer.len(), 3 + 2 + 2);
        let mut reader = PacketReader::new(writer.as_slice());
        let read = MulticastProtocol::Q2proExtendedCoords
            .read_pos(&mut reader)
            .unwrap();
        assert_eq!(read.get_int(), [32000, -100, 0]);
    }

    #[test]
    fn test_invalid_pos() {
        let mut writer = PacketWriter::new(64);
        assert_eq!(
            MulticastProtocol::Invalid.write_pos(&mut writer, [0.0; 3]),
            Err(WireError::ProtocolNotSupported)
        );
        let mut reader = PacketReader::new(&[]);
        assert_eq!(
            MulticastProtocol::Invalid.read_pos(&mut reader),
            Err(WireError::ProtocolNotSupported)
        );
    }
}

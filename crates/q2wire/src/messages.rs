//! # Server Commands
//!
//! Command bytes and the messages whose layout is the same in every
//! protocol: a command byte followed by at most a byte, a short and a
//! string.

use crate::error::{WireError, WireResult};
use crate::io::{WireRead, WireWrite};

/// Muzzle flash of a player weapon.
pub const SVC_MUZZLEFLASH: u8 = 1;
/// Muzzle flash of a monster weapon.
pub const SVC_MUZZLEFLASH2: u8 = 2;
/// Temporary entity.
pub const SVC_TEMP_ENTITY: u8 = 3;
/// Status bar layout.
pub const SVC_LAYOUT: u8 = 4;
/// Inventory counts.
pub const SVC_INVENTORY: u8 = 5;
/// No operation.
pub const SVC_NOP: u8 = 6;
/// Server is dropping the client.
pub const SVC_DISCONNECT: u8 = 7;
/// Server is changing maps.
pub const SVC_RECONNECT: u8 = 8;
/// Sound.
pub const SVC_SOUND: u8 = 9;
/// Console print.
pub const SVC_PRINT: u8 = 10;
/// Console command text.
pub const SVC_STUFFTEXT: u8 = 11;
/// Connection parameters.
pub const SVC_SERVERDATA: u8 = 12;
/// Configuration string.
pub const SVC_CONFIGSTRING: u8 = 13;
/// Entity baseline.
pub const SVC_SPAWNBASELINE: u8 = 14;
/// Centered screen print.
pub const SVC_CENTERPRINT: u8 = 15;
/// Download chunk.
pub const SVC_DOWNLOAD: u8 = 16;
/// Player state.
pub const SVC_PLAYERINFO: u8 = 17;
/// Entity updates.
pub const SVC_PACKETENTITIES: u8 = 18;
/// Entity updates against an older frame.
pub const SVC_DELTAPACKETENTITIES: u8 = 19;
/// Frame header.
pub const SVC_FRAME: u8 = 20;
/// Compressed packet (R1Q2, Q2PRO).
pub const SVC_ZPACKET: u8 = 21;
/// Compressed packet (Q2rePRO).
pub const SVC_Q2REPRO_ZPACKET: u8 = 34;

/// Print levels.
pub mod print_level {
    /// Pickup messages.
    pub const LOW: u8 = 0;
    /// Death messages.
    pub const MEDIUM: u8 = 1;
    /// Critical messages.
    pub const HIGH: u8 = 2;
    /// Chat.
    pub const CHAT: u8 = 3;
}

/// A message with a protocol independent layout.
///
/// Strings borrow from the message they were read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimpleMessage<'a> {
    /// `svc_nop`.
    Nop,
    /// `svc_disconnect`.
    Disconnect,
    /// `svc_reconnect`.
    Reconnect,
    /// `svc_print`.
    Print {
        /// One of [`print_level`].
        level: u8,
        /// Text.
        text: &'a [u8],
    },
    /// `svc_stufftext`.
    StuffText(&'a [u8]),
    /// `svc_configstring`.
    ConfigString {
        /// Configstring slot.
        index: u16,
        /// Value.
        text: &'a [u8],
    },
    /// `svc_centerprint`.
    CenterPrint(&'a [u8]),
    /// `svc_layout`.
    Layout(&'a [u8]),
}

impl<'a> SimpleMessage<'a> {
    /// Command byte for this message.
    #[must_use]
    pub const fn command(&self) -> u8 {
        match self {
            Self::Nop => SVC_NOP,
            Self::Disconnect => SVC_DISCONNECT,
            Self::Reconnect => SVC_RECONNECT,
            Self::Print { .. } => SVC_PRINT,
            Self::StuffText(_) => SVC_STUFFTEXT,
            Self::ConfigString { .. } => SVC_CONFIGSTRING,
            Self::CenterPrint(_) => SVC_CENTERPRINT,
            Self::Layout(_) => SVC_LAYOUT,
        }
    }

    /// Writes the command byte and body.
    ///
    /// # Errors
    ///
    /// Any write error.
    pub fn write<W: WireWrite + ?Sized>(&self, out: &mut W) -> WireResult<()> {
        out.write_u8(self.command())?;
        match *self {
            Self::Nop | Self::Disconnect | Self::Reconnect => Ok(()),
            Self::Print { level, text } => {
                out.write_u8(level)?;
                out.write_string(text)
            }
            Self::ConfigString { index, text } => {
                out.write_u16(index)?;
                out.write_string(text)
            }
            Self::StuffText(text) | Self::CenterPrint(text) | Self::Layout(text) => {
                out.write_string(text)
            }
        }
    }

    /// Reads the body of the message introduced by `command`.
    ///
    /// # Errors
    ///
    /// [`WireError::BadCommand`] if `command` is not one of these messages,
    /// or any read error.
    pub fn read_body<R: WireRead<'a> + ?Sized>(command: u8, input: &mut R) -> WireResult<Self> {
        Ok(match command {
            SVC_NOP => Self::Nop,
            SVC_DISCONNECT => Self::Disconnect,
            SVC_RECONNECT => Self::Reconnect,
            SVC_PRINT => Self::Print {
                level: input.read_u8()?,
                text: input.read_string()?,
            },
            SVC_STUFFTEXT => Self::StuffText(input.read_string()?),
            SVC_CONFIGSTRING => Self::ConfigString {
                index: input.read_u16()?,
                text: input.read_string()?,
            },
            SVC_CENTERPRINT => Self::CenterPrint(input.read_string()?),
            SVC_LAYOUT => Self::Layout(input.read_string()?),
            other => return Err(WireError::BadCommand(other)),
        })
    }

    /// Reads a command byte and its body.
    ///
    /// # Errors
    ///
    /// Same as [`SimpleMessage::read_body`].
    pub fn read<R: WireRead<'a> + ?Sized>(input: &mut R) -> WireResult<Self> {
        let command = input.read_u8()?;
        Self::read_body(command, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{PacketReader, PacketWriter};

    #[test]
    fn test_layouts() {
        let mut writer = PacketWriter::new(64);
        SimpleMessage::Nop.write(&mut writer).unwrap();
        SimpleMessage::Print {
            level: print_level::HIGH,
            text: b"hi",
        }
        .write(&mut writer)
        .unwrap();
        SimpleMessage::ConfigString {
            index: 0x0123,
            text: b"maps/q2dm1.bsp",
        }
        .write(&mut writer)
        .unwrap();
        let bytes = writer.as_slice();
        assert_eq!(&bytes[..5], &[SVC_NOP, SVC_PRINT, 2, b'h', b'i']);
        assert_eq!(&bytes[6..9], &[SVC_CONFIGSTRING, 0x23, 0x01]);
    }

    #[test]
    fn test_read_sequence() {
        let messages = [
            SimpleMessage::Disconnect,
            SimpleMessage::Reconnect,
            SimpleMessage::StuffText(b"cmd\n"),
            SimpleMessage::CenterPrint(b"Fight!"),
            SimpleMessage::Layout(b"xv 0 yv 0"),
            SimpleMessage::Print {
                level: print_level::CHAT,
                text: b"gg",
            },
        ];
        let mut writer = PacketWriter::new(256);
        for msg in &messages {
            msg.write(&mut writer).unwrap();
        }
        let mut reader = PacketReader::new(writer.as_slice());
        for msg in &messages {
            assert_eq!(&SimpleMessage::read(&mut reader).unwrap(), msg);
        }
        assert_eq!(reader.read_available(), 0);
    }

    #[test]
    fn test_unknown_command() {
        let mut reader = PacketReader::new(&[SVC_FRAME]);
        assert_eq!(
            SimpleMessage::read(&mut reader),
            Err(WireError::BadCommand(SVC_FRAME))
        );
    }

    #[test]
    fn test_truncated() {
        let mut reader = PacketReader::new(&[SVC_CONFIGSTRING, 1]);
        assert_eq!(SimpleMessage::read(&mut reader), Err(WireError::NoMoreInput));
    }
}

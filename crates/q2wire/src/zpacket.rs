//! # Compressed Packets
//!
//! A zpacket wraps part of a server message in a compressed envelope:
//! `[cmd u8][compressed u16][uncompressed u16][payload]`. The compressor
//! itself sits behind [`Deflater`] / [`Inflater`]; [`Lz4Block`] is the
//! bundled backend.
//!
//! ## Design Philosophy
//!
//! - A session borrows its target mutably, so nothing else can write to
//!   it until the session is ended or dropped
//! - The compressor is reset on every exit path, errors included
//! - Too little room for the envelope is not an error: the session
//!   degrades to plain writes

use crate::error::{WireError, WireResult};
use crate::io::{PacketWriter, WireRead, WireWrite};
use crate::messages::SVC_ZPACKET;

/// Size of the zpacket envelope.
pub const ZPACKET_HEADER_SIZE: usize = 5;

/// Room a target needs before a session will compress: the envelope plus
/// enough slack to avoid emitting an empty zpacket.
pub const MIN_COMPRESS_SIZE: usize = ZPACKET_HEADER_SIZE + 16;

/// Compression seam.
pub trait Deflater {
    /// Compresses all of `input` into the compressor's own buffer and
    /// returns the result, which stays valid until the next call.
    ///
    /// # Errors
    ///
    /// [`WireError::MoreDataDeflated`] if the result is longer than
    /// `max_len`, [`WireError::DeflateFailed`] for any other failure.
    fn deflate(&mut self, input: &[u8], max_len: usize) -> WireResult<&[u8]>;

    /// Discards state left by the last compression.
    fn reset(&mut self) {}
}

/// Decompression seam.
pub trait Inflater {
    /// Decompresses `input` into `output` and returns the decompressed
    /// length.
    ///
    /// # Errors
    ///
    /// [`WireError::InflateFailed`] if `input` is corrupt or too large.
    fn inflate(&mut self, input: &[u8], output: &mut [u8]) -> WireResult<usize>;
}

/// LZ4 block compression without a size prefix.
///
/// Compresses into a scratch buffer sized for the worst case and kept
/// between calls, so only the first messages of a connection allocate.
#[derive(Clone, Debug, Default)]
pub struct Lz4Block {
    scratch: Vec<u8>,
}

impl Deflater for Lz4Block {
    fn deflate(&mut self, input: &[u8], max_len: usize) -> WireResult<&[u8]> {
        self.scratch
            .resize(lz4_flex::block::get_maximum_output_size(input.len()), 0);
        let len = lz4_flex::block::compress_into(input, &mut self.scratch).map_err(|err| {
            tracing::debug!(?err, input = input.len(), "lz4 compress");
            WireError::DeflateFailed
        })?;
        if len > max_len {
            return Err(WireError::MoreDataDeflated);
        }
        Ok(&self.scratch[..len])
    }

    fn reset(&mut self) {
        self.scratch.clear();
    }
}

impl Inflater for Lz4Block {
    fn inflate(&mut self, input: &[u8], output: &mut [u8]) -> WireResult<usize> {
        lz4_flex::block::decompress_into(input, output).map_err(|err| {
            tracing::debug!(?err, input = input.len(), "lz4 decompress");
            WireError::InflateFailed
        })
    }
}

/// Fails with [`WireError::NotEnoughPacketSpace`] if `target` cannot hold a
/// zpacket.
///
/// [`ZPacketSession::begin`] does the same check but falls back to plain
/// writes instead of failing.
///
/// # Errors
///
/// [`WireError::NotEnoughPacketSpace`].
pub fn check_zpacket_space<W: WireWrite + ?Sized>(target: &W) -> WireResult<()> {
    if target.write_available() < MIN_COMPRESS_SIZE {
        Err(WireError::NotEnoughPacketSpace)
    } else {
        Ok(())
    }
}

/// Writes the envelope and payload of a compressed message.
#[allow(clippy::cast_possible_truncation)]
fn write_envelope<W: WireWrite + ?Sized>(
    out: &mut W,
    zpacket_cmd: u8,
    compressed: &[u8],
    uncompressed_len: usize,
) -> WireResult<()> {
    tracing::trace!(
        compressed = compressed.len(),
        uncompressed = uncompressed_len,
        "zpacket"
    );
    out.write_u8(zpacket_cmd)?;
    out.write_u16(compressed.len() as u16)?;
    out.write_u16(uncompressed_len as u16)?;
    out.write_raw(compressed)
}

/// A scoped redirection of writes into a compressor.
///
/// While compressing, writes are staged uncompressed in a caller-owned
/// buffer; [`end`](Self::end) compresses them and writes the envelope to
/// the original target. Dropping the session without ending it discards
/// the staged data.
pub struct ZPacketSession<'a, W: WireWrite + ?Sized, D: Deflater + ?Sized> {
    target: &'a mut W,
    deflater: Option<&'a mut D>,
    zpacket_cmd: u8,
    staging: Option<&'a mut PacketWriter>,
    max_deflated: usize,
}

impl<'a, W: WireWrite + ?Sized, D: Deflater + ?Sized> ZPacketSession<'a, W, D> {
    /// Starts a session on `target`.
    ///
    /// Compression starts only if a `deflater` is given and `target` has at
    /// least [`MIN_COMPRESS_SIZE`] bytes left; otherwise writes go straight
    /// through. `staging` is cleared and holds the uncompressed message;
    /// [`crate::MAX_MSGLEN`] is the usual limit for it.
    pub fn begin(
        target: &'a mut W,
        staging: &'a mut PacketWriter,
        deflater: Option<&'a mut D>,
        zpacket_cmd: u8,
    ) -> Self {
        let available = target.write_available();
        let staging = if deflater.is_none() {
            None
        } else if available < MIN_COMPRESS_SIZE {
            tracing::debug!(available, "no room for a zpacket, writing uncompressed");
            None
        } else {
            staging.reset();
            Some(staging)
        };
        Self {
            target,
            deflater,
            zpacket_cmd,
            staging,
            max_deflated: available.saturating_sub(ZPACKET_HEADER_SIZE),
        }
    }

    /// True if writes are being compressed.
    #[inline]
    #[must_use]
    pub const fn is_compressing(&self) -> bool {
        self.staging.is_some()
    }

    /// Finishes the session.
    ///
    /// Writes the envelope and compressed payload to the wrapped target if
    /// compressing; does nothing otherwise.
    ///
    /// # Errors
    ///
    /// Any compressor error, or any write error on the wrapped target.
    pub fn end(mut self) -> WireResult<()> {
        let Some(staging) = self.staging.take() else {
            return Ok(());
        };
        let Some(deflater) = self.deflater.as_deref_mut() else {
            return Ok(());
        };

        let target = &mut *self.target;
        let zpacket_cmd = self.zpacket_cmd;
        let result = deflater
            .deflate(staging.as_slice(), self.max_deflated)
            .and_then(|compressed| write_envelope(target, zpacket_cmd, compressed, staging.len()));
        deflater.reset();
        result
    }
}

impl<W: WireWrite + ?Sized, D: Deflater + ?Sized> Drop for ZPacketSession<'_, W, D> {
    fn drop(&mut self) {
        // Abandoned while compressing
        if self.staging.take().is_some() {
            if let Some(deflater) = self.deflater.as_deref_mut() {
                deflater.reset();
            }
        }
    }
}

impl<W: WireWrite + ?Sized, D: Deflater + ?Sized> WireWrite for ZPacketSession<'_, W, D> {
    fn write_raw(&mut self, data: &[u8]) -> WireResult<()> {
        match self.staging.as_mut() {
            Some(staging) => staging.write_raw(data),
            None => self.target.write_raw(data),
        }
    }

    fn reserve_raw(&mut self, size: usize) -> WireResult<&mut [u8]> {
        match self.staging.as_mut() {
            Some(staging) => staging.reserve_raw(size),
            None => self.target.reserve_raw(size),
        }
    }

    fn write_available(&self) -> usize {
        match self.staging.as_ref() {
            Some(staging) => staging.write_available(),
            None => self.target.write_available(),
        }
    }
}

/// Compresses a complete message into a zpacket on `out`.
///
/// # Errors
///
/// - [`WireError::InvalidArgument`] for an empty or oversized `packet`
/// - [`WireError::AlreadyCompressed`] if `packet` already starts with a
///   zpacket command, or if compressing would not make it smaller than the
///   plain message plus envelope; send it as is
/// - any compressor or write error
pub fn write_zpacket<W: WireWrite + ?Sized, D: Deflater + ?Sized>(
    out: &mut W,
    deflater: &mut D,
    zpacket_cmd: u8,
    packet: &[u8],
) -> WireResult<()> {
    let Some(&first) = packet.first() else {
        return Err(WireError::InvalidArgument);
    };
    if packet.len() > usize::from(u16::MAX) {
        return Err(WireError::InvalidArgument);
    }
    if first == SVC_ZPACKET || first == zpacket_cmd {
        return Err(WireError::AlreadyCompressed);
    }

    let max_len = out.write_available().saturating_sub(ZPACKET_HEADER_SIZE);
    let result = deflater.deflate(packet, max_len).and_then(|compressed| {
        if compressed.len() > packet.len() + ZPACKET_HEADER_SIZE {
            tracing::debug!(
                compressed = compressed.len(),
                uncompressed = packet.len(),
                "message does not compress"
            );
            return Err(WireError::AlreadyCompressed);
        }
        write_envelope(out, zpacket_cmd, compressed, packet.len())
    });
    deflater.reset();
    result
}

/// Reads the body of a zpacket (after its command byte) and decompresses
/// it into `output`. Returns the decompressed length.
///
/// # Errors
///
/// - [`WireError::BufferTooSmall`] if `output` cannot hold the advertised
///   size
/// - [`WireError::InflateFailed`] if the payload does not decompress to
///   exactly that size
/// - any read error
pub fn read_zpacket<'a, R: WireRead<'a> + ?Sized, I: Inflater + ?Sized>(
    input: &mut R,
    inflater: &mut I,
    output: &mut [u8],
) -> WireResult<usize> {
    let compressed_len = usize::from(input.read_u16()?);
    let uncompressed_len = usize::from(input.read_u16()?);
    let payload = input.read_raw(compressed_len)?;

    let Some(target) = output.get_mut(..uncompressed_len) else {
        return Err(WireError::BufferTooSmall);
    };
    let inflated = inflater.inflate(payload, target)?;
    if inflated != uncompressed_len {
        tracing::warn!(inflated, expected = uncompressed_len, "zpacket size mismatch");
        return Err(WireError::InflateFailed);
    }
    Ok(inflated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::PacketReader;
    use crate::messages::{SimpleMessage, SVC_Q2REPRO_ZPACKET};

    #[derive(Default)]
    struct CountingDeflater {
        inner: Lz4Block,
        resets: usize,
        fail: bool,
    }

    impl Deflater for CountingDeflater {
        fn deflate(&mut self, input: &[u8], max_len: usize) -> WireResult<&[u8]> {
            if self.fail {
                return Err(WireError::DeflateFailed);
            }
            self.inner.deflate(input, max_len)
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    fn layout() -> Vec<u8> {
        b"xv 0 yv 0 picn inventory ".repeat(20)
    }

    #[test]
    fn test_session_round_trip() {
        let mut target = PacketWriter::new(1400);
        let mut staging = PacketWriter::new(crate::MAX_MSGLEN);
        staging.write_raw(b"stale").unwrap();
        let mut deflater = CountingDeflater::default();
        let text = layout();

        let mut session =
            ZPacketSession::begin(&mut target, &mut staging, Some(&mut deflater), SVC_ZPACKET);
        assert!(session.is_compressing());
        SimpleMessage::Layout(&text).write(&mut session).unwrap();
        session.end().unwrap();
        assert_eq!(deflater.resets, 1);

        let bytes = target.as_slice();
        assert_eq!(bytes[0], SVC_ZPACKET);
        assert!(bytes.len() < text.len());

        let mut reader = PacketReader::new(&bytes[1..]);
        let mut inflated = [0u8; 2048];
        let len = read_zpacket(&mut reader, &mut Lz4Block::default(), &mut inflated).unwrap();
        assert_eq!(len, text.len() + 2);
        let mut reader = PacketReader::new(&inflated[..len]);
        assert_eq!(
            SimpleMessage::read(&mut reader).unwrap(),
            SimpleMessage::Layout(&text)
        );
    }

    #[test]
    fn test_session_falls_back_without_room() {
        let mut target = PacketWriter::new(MIN_COMPRESS_SIZE - 1);
        let mut staging = PacketWriter::new(crate::MAX_MSGLEN);
        assert_eq!(
            check_zpacket_space(&target),
            Err(WireError::NotEnoughPacketSpace)
        );
        let mut deflater = CountingDeflater::default();

        let mut session =
            ZPacketSession::begin(&mut target, &mut staging, Some(&mut deflater), SVC_ZPACKET);
        assert!(!session.is_compressing());
        SimpleMessage::Nop.write(&mut session).unwrap();
        session.end().unwrap();
        assert_eq!(target.as_slice(), &[crate::messages::SVC_NOP]);
        assert_eq!(deflater.resets, 0);
    }

    #[test]
    fn test_session_without_deflater() {
        let mut target = PacketWriter::new(64);
        let mut staging = PacketWriter::new(crate::MAX_MSGLEN);
        let mut session =
            ZPacketSession::<_, Lz4Block>::begin(&mut target, &mut staging, None, SVC_ZPACKET);
        assert!(!session.is_compressing());
        session.write_u8(7).unwrap();
        session.end().unwrap();
        assert_eq!(target.as_slice(), &[7]);
    }

    #[test]
    fn test_session_resets_on_error_and_drop() {
        let mut target = PacketWriter::new(64);
        let mut staging = PacketWriter::new(crate::MAX_MSGLEN);
        let mut deflater = CountingDeflater {
            fail: true,
            ..CountingDeflater::default()
        };
        let mut session =
            ZPacketSession::begin(&mut target, &mut staging, Some(&mut deflater), SVC_ZPACKET);
        session.write_raw(b"payload").unwrap();
        assert_eq!(session.end(), Err(WireError::DeflateFailed));
        assert_eq!(deflater.resets, 1);
        assert!(target.is_empty());

        let mut session =
            ZPacketSession::begin(&mut target, &mut staging, Some(&mut deflater), SVC_ZPACKET);
        session.write_raw(b"abandoned").unwrap();
        drop(session);
        assert_eq!(deflater.resets, 2);
        assert!(target.is_empty());
    }

    #[test]
    fn test_output_cap() {
        // Room for the envelope plus 16 bytes; incompressible input overflows it.
        let mut target = PacketWriter::new(MIN_COMPRESS_SIZE);
        let mut staging = PacketWriter::new(crate::MAX_MSGLEN);
        let mut deflater = Lz4Block::default();
        let noise: Vec<u8> = (0u32..200).map(|i| (i.wrapping_mul(2_654_435_761) >> 24) as u8).collect();
        let mut session =
            ZPacketSession::begin(&mut target, &mut staging, Some(&mut deflater), SVC_ZPACKET);
        session.write_raw(&noise).unwrap();
        assert_eq!(session.end(), Err(WireError::MoreDataDeflated));
    }

    #[test]
    fn test_scratch_is_reused() {
        let mut deflater = Lz4Block::default();
        let text = layout();
        let first = deflater.deflate(&text, usize::MAX).unwrap().as_ptr();
        deflater.reset();
        let second = deflater.deflate(&text, usize::MAX).unwrap().as_ptr();
        assert_eq!(first, second);
        assert_eq!(
            deflater.deflate(&text, 4).map(<[u8]>::len),
            Err(WireError::MoreDataDeflated)
        );
    }

    #[test]
    fn test_write_zpacket_rules() {
        let mut out = PacketWriter::new(1400);
        let mut deflater = Lz4Block::default();

        assert_eq!(
            write_zpacket(&mut out, &mut deflater, SVC_ZPACKET, &[]),
            Err(WireError::InvalidArgument)
        );
        assert_eq!(
            write_zpacket(&mut out, &mut deflater, SVC_Q2REPRO_ZPACKET, &[SVC_ZPACKET, 0]),
            Err(WireError::AlreadyCompressed)
        );

        let mut packet = vec![crate::messages::SVC_LAYOUT];
        packet.extend_from_slice(&layout());
        packet.push(0);
        write_zpacket(&mut out, &mut deflater, SVC_Q2REPRO_ZPACKET, &packet).unwrap();
        assert_eq!(out.as_slice()[0], SVC_Q2REPRO_ZPACKET);

        let mut reader = PacketReader::new(&out.as_slice()[1..]);
        let mut inflated = vec![0u8; packet.len()];
        assert_eq!(
            read_zpacket(&mut reader, &mut Lz4Block::default(), &mut inflated).unwrap(),
            packet.len()
        );
        assert_eq!(inflated, packet);
    }

    #[test]
    fn test_read_zpacket_buffer_too_small() {
        let mut out = PacketWriter::new(1400);
        let mut packet = vec![crate::messages::SVC_LAYOUT];
        packet.extend_from_slice(&layout());
        write_zpacket(&mut out, &mut Lz4Block::default(), SVC_ZPACKET, &packet).unwrap();

        let mut reader = PacketReader::new(&out.as_slice()[1..]);
        let mut small = [0u8; 16];
        assert_eq!(
            read_zpacket(&mut reader, &mut Lz4Block::default(), &mut small),
            Err(WireError::BufferTooSmall)
        );
    }
}

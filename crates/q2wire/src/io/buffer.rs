//! # Packet Buffers
//!
//! In-memory implementations of the wire traits: a bounded writer and a
//! borrowing reader.

use super::{WireRead, WireWrite};
use crate::error::{WireError, WireResult};

/// Packet writer - appends to a buffer that never grows past `limit` bytes.
///
/// Reuse one writer per connection with [`PacketWriter::reset`] to keep the
/// allocation.
#[derive(Debug, Clone)]
pub struct PacketWriter {
    buffer: Vec<u8>,
    limit: usize,
}

impl PacketWriter {
    /// Creates a writer that accepts at most `limit` bytes.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(limit),
            limit,
        }
    }

    /// Resets the writer for reuse.
    #[inline]
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Drops everything after the first `len` bytes.
    ///
    /// Used to discard a partially written message after an error.
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.buffer.truncate(len);
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no bytes have been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Maximum number of bytes this writer accepts.
    #[inline]
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Returns a slice of the written data.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the writer and returns the written data.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for PacketWriter {
    fn default() -> Self {
        Self::new(crate::MAX_PACKETLEN_WRITABLE)
    }
}

impl WireWrite for PacketWriter {
    #[inline]
    fn write_raw(&mut self, data: &[u8]) -> WireResult<()> {
        if data.len() > self.write_available() {
            return Err(WireError::NotEnoughPacketSpace);
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    fn reserve_raw(&mut self, size: usize) -> WireResult<&mut [u8]> {
        if size > self.write_available() {
            return Err(WireError::NotEnoughPacketSpace);
        }
        let start = self.buffer.len();
        self.buffer.resize(start + size, 0);
        Ok(&mut self.buffer[start..])
    }

    #[inline]
    fn write_available(&self) -> usize {
        self.limit.saturating_sub(self.buffer.len())
    }
}

/// Packet reader - reads from a borrowed message.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PacketReader<'a> {
    /// Creates a new reader over `data`.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Current read offset.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// The unread part of the message.
    #[inline]
    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.position..]
    }
}

impl<'a> WireRead<'a> for PacketReader<'a> {
    #[inline]
    fn read_raw(&mut self, size: usize) -> WireResult<&'a [u8]> {
        if size > self.read_available() {
            return Err(WireError::NoMoreInput);
        }
        let start = self.position;
        self.position += size;
        Ok(&self.data[start..self.position])
    }

    fn read_string(&mut self) -> WireResult<&'a [u8]> {
        let rest = self.rest();
        match rest.iter().position(|&b| b == 0) {
            Some(end) => {
                self.position += end + 1;
                Ok(&rest[..end])
            }
            None => {
                self.position = self.data.len();
                Ok(rest)
            }
        }
    }

    #[inline]
    fn read_available(&self) -> usize {
        self.data.len() - self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_limit() {
        let mut writer = PacketWriter::new(3);
        writer.write_u16(1).unwrap();
        assert_eq!(writer.write_u16(2), Err(WireError::NotEnoughPacketSpace));
        // A failed write leaves nothing behind.
        assert_eq!(writer.len(), 2);
        writer.write_u8(3).unwrap();
        assert_eq!(writer.write_available(), 0);
    }

    #[test]
    fn test_reserve_and_truncate() {
        let mut writer = PacketWriter::new(16);
        writer.write_u8(7).unwrap();
        let mark = writer.len();
        writer.reserve_raw(4).unwrap().copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(writer.as_slice(), &[7, 1, 2, 3, 4]);
        writer.truncate(mark);
        assert_eq!(writer.as_slice(), &[7]);
        writer.reset();
        assert!(writer.is_empty());
    }

    #[test]
    fn test_reader_unterminated_string() {
        let mut reader = PacketReader::new(b"abc");
        assert_eq!(reader.read_string().unwrap(), b"abc");
        assert_eq!(reader.read_available(), 0);
        assert_eq!(reader.read_u8(), Err(WireError::NoMoreInput));
    }
}

//! # Last-Error Adapter
//!
//! Some message buffers (engine-side `sizebuf_t` style) never fail a write or
//! read outright. They always "complete" and remember the first problem in a
//! sticky error slot. [`Checked`] wraps such a buffer so it can be used
//! anywhere a [`WireWrite`]/[`WireRead`] is expected: after every primitive it
//! inspects the slot and turns a recorded error into an `Err`.

use super::{WireRead, WireWrite};
use crate::error::{WireError, WireResult};

/// A writer that records failures instead of returning them.
pub trait LastErrorWriter {
    /// Appends `data`. On failure, records an error and may drop the data.
    fn put_raw(&mut self, data: &[u8]);

    /// Reserves `size` bytes. Only called after `space()` confirmed room.
    fn put_reserve(&mut self, size: usize) -> &mut [u8];

    /// Bytes that can still be written.
    fn space(&self) -> usize;

    /// The first failure since the buffer was created, if any.
    fn last_error(&self) -> Option<WireError>;
}

/// A reader that records failures instead of returning them.
pub trait LastErrorReader<'a> {
    /// Takes `size` bytes. On failure, records an error and returns what it could.
    fn take_raw(&mut self, size: usize) -> &'a [u8];

    /// Takes a NUL-terminated string, without its terminator.
    fn take_string(&mut self) -> &'a [u8];

    /// Bytes left to read.
    fn remaining(&self) -> usize;

    /// The first failure since the buffer was created, if any.
    fn last_error(&self) -> Option<WireError>;
}

/// Adapter turning a last-error buffer into a `Result`-returning one.
#[derive(Debug)]
pub struct Checked<T>(pub T);

impl<T> Checked<T> {
    /// Wraps a last-error buffer.
    #[must_use]
    pub const fn new(inner: T) -> Self {
        Self(inner)
    }

    /// Unwraps the adapter.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: LastErrorWriter> WireWrite for Checked<T> {
    fn write_raw(&mut self, data: &[u8]) -> WireResult<()> {
        self.0.put_raw(data);
        self.0.last_error().map_or(Ok(()), Err)
    }

    fn reserve_raw(&mut self, size: usize) -> WireResult<&mut [u8]> {
        if let Some(err) = self.0.last_error() {
            return Err(err);
        }
        if self.0.space() < size {
            return Err(WireError::NotEnoughPacketSpace);
        }
        let out = self.0.put_reserve(size);
        if out.len() < size {
            return Err(WireError::NotEnoughPacketSpace);
        }
        Ok(out)
    }

    fn write_available(&self) -> usize {
        self.0.space()
    }
}

impl<'a, T: LastErrorReader<'a>> WireRead<'a> for Checked<T> {
    fn read_raw(&mut self, size: usize) -> WireResult<&'a [u8]> {
        let data = self.0.take_raw(size);
        if let Some(err) = self.0.last_error() {
            return Err(err);
        }
        if data.len() < size {
            return Err(WireError::NoMoreInput);
        }
        Ok(data)
    }

    fn read_string(&mut self) -> WireResult<&'a [u8]> {
        let text = self.0.take_string();
        self.0.last_error().map_or(Ok(text), Err)
    }

    fn read_available(&self) -> usize {
        self.0.remaining()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Engine-style buffer: overflow sets a flag and later writes are dropped.
    struct SizeBuf {
        data: Vec<u8>,
        max: usize,
        overflowed: bool,
    }

    impl LastErrorWriter for SizeBuf {
        fn put_raw(&mut self, data: &[u8]) {
            if self.overflowed || self.data.len() + data.len() > self.max {
                self.overflowed = true;
                return;
            }
            self.data.extend_from_slice(data);
        }

        fn put_reserve(&mut self, size: usize) -> &mut [u8] {
            let start = self.data.len();
            self.data.resize(start + size, 0);
            &mut self.data[start..]
        }

        fn space(&self) -> usize {
            self.max - self.data.len()
        }

        fn last_error(&self) -> Option<WireError> {
            self.overflowed.then_some(WireError::NotEnoughPacketSpace)
        }
    }

    struct MsgRead<'a> {
        data: &'a [u8],
        pos: usize,
        bad: bool,
    }

    impl<'a> LastErrorReader<'a> for MsgRead<'a> {
        fn take_raw(&mut self, size: usize) -> &'a [u8] {
            if self.pos + size > self.data.len() {
                self.bad = true;
                return &[];
            }
            let out = &self.data[self.pos..self.pos + size];
            self.pos += size;
            out
        }

        fn take_string(&mut self) -> &'a [u8] {
            let rest = &self.data[self.pos..];
            let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
            self.pos = (self.pos + end + 1).min(self.data.len());
            &rest[..end]
        }

        fn remaining(&self) -> usize {
            self.data.len() - self.pos
        }

        fn last_error(&self) -> Option<WireError> {
            self.bad.then_some(WireError::NoMoreInput)
        }
    }

    #[test]
    fn test_checked_writer_surfaces_overflow() {
        let mut out = Checked::new(SizeBuf {
            data: Vec::new(),
            max: 4,
            overflowed: false,
        });
        out.write_u16(0x0102).unwrap();
        out.write_string(b"a").unwrap();
        assert_eq!(out.write_u16(5), Err(WireError::NotEnoughPacketSpace));
        // The error is sticky, even for writes that would fit.
        assert_eq!(out.write_u8(1), Err(WireError::NotEnoughPacketSpace));
        assert_eq!(out.into_inner().data, vec![2, 1, b'a', 0]);
    }

    #[test]
    fn test_checked_reader_surfaces_underflow() {
        let data = [1u8, 0, b'h', b'i', 0, 9];
        let mut input = Checked::new(MsgRead {
            data: &data,
            pos: 0,
            bad: false,
        });
        assert_eq!(input.read_u16().unwrap(), 1);
        assert_eq!(input.read_string().unwrap(), b"hi");
        assert_eq!(input.read_available(), 1);
        assert_eq!(input.read_u16(), Err(WireError::NoMoreInput));
    }
}

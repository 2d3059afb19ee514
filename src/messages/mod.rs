//! Typed message bodies
//!
//! Every message body is hand-encoded big-endian over a bounds-checked
//! cursor. Message ids live beside the body type that owns them.
//!
//! This module provides:
//! - [`server_info`]: stream preamble (time base, coordinate frame)
//! - [`control`]: frame boundaries, frame count, flush, reset
//! - [`category`]: category names replayed to late joiners
//! - [`camera`]: per-frame camera hints
//! - [`mesh`]: mesh resource lifecycle and element chunk messages

pub mod camera;
pub mod category;
pub mod control;
pub mod mesh;
pub mod server_info;

use crate::error::{Error, Result};
use crate::maths::{Colour, Quaternion, Vector3};

/// Bounds-checked big-endian reader over a message body
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Wrap a message body
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::Truncated {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a u8
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a big-endian u16
    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Read a big-endian u32
    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a big-endian u64
    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    /// Read a big-endian f32
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Read `n` raw bytes
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Read a packed colour
    pub fn read_colour(&mut self) -> Result<Colour> {
        Ok(Colour::from_u32(self.read_u32()?))
    }

    /// Read a 3-float vector
    pub fn read_vector3(&mut self) -> Result<Vector3> {
        Ok(Vector3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    /// Read a 4-float quaternion
    pub fn read_quaternion(&mut self) -> Result<Quaternion> {
        Ok(Quaternion::new(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }
}

/// Append a big-endian u16
#[inline]
pub fn write_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Append a big-endian u32
#[inline]
pub fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Append a big-endian u64
#[inline]
pub fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Append a big-endian f32
#[inline]
pub fn write_f32(out: &mut Vec<u8>, v: f32) {
    write_u32(out, v.to_bits());
}

/// Append a packed colour
#[inline]
pub fn write_colour(out: &mut Vec<u8>, c: Colour) {
    write_u32(out, c.to_u32());
}

/// Append a 3-float vector
#[inline]
pub fn write_vector3(out: &mut Vec<u8>, v: Vector3) {
    write_f32(out, v.x);
    write_f32(out, v.y);
    write_f32(out, v.z);
}

/// Append a 4-float quaternion
#[inline]
pub fn write_quaternion(out: &mut Vec<u8>, q: Quaternion) {
    write_f32(out, q.x);
    write_f32(out, q.y);
    write_f32(out, q.z);
    write_f32(out, q.w);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_roundtrip() {
        let mut buf = Vec::new();
        write_u16(&mut buf, 0xBEEF);
        write_u32(&mut buf, 0xDEAD_BEEF);
        write_u64(&mut buf, 0x0123_4567_89AB_CDEF);
        write_f32(&mut buf, -1.25);
        write_vector3(&mut buf, Vector3::new(1.0, 2.0, 3.0));

        let mut reader = WireReader::new(&buf);
        assert_eq!(reader.read_u16().unwrap(), 0xBEEF);
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.read_u64().unwrap(), 0x0123_4567_89AB_CDEF);
        assert_eq!(reader.read_f32().unwrap(), -1.25);
        assert_eq!(reader.read_vector3().unwrap(), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_reader_truncation() {
        let buf = [0u8; 3];
        let mut reader = WireReader::new(&buf);
        assert!(matches!(
            reader.read_u32(),
            Err(Error::Truncated { needed: 4, available: 3 })
        ));
    }
}

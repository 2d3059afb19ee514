//! Control messages
//!
//! Fixed 16-byte body: `[FLAGS(4)] [VALUE32(4)] [VALUE64(8)]`. Semantics
//! are keyed by the message id.

use super::{write_u32, write_u64, WireReader};
use crate::error::{Error, Result};

/// Fixed control body size
pub const CONTROL_SIZE: usize = 16;

/// End of frame; value32 = frame duration in time units, 0 for default
pub const CONTROL_FRAME: u16 = 1;
/// Total frame count; recordings only, value32 = frames
pub const CONTROL_FRAME_COUNT: u16 = 2;
/// Force viewers to flush the current frame immediately
pub const CONTROL_FORCE_FRAME_FLUSH: u16 = 3;
/// Clear all client-side state
pub const CONTROL_RESET: u16 = 4;

/// Frame flag: do not drop transient shapes at this boundary
pub const CF_PERSIST: u32 = 1 << 0;

/// Generic control message body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlMessage {
    /// Message-id specific flags (`CF_PERSIST` for Frame)
    pub flags: u32,
    /// Message-id specific 32-bit value
    pub value32: u32,
    /// Message-id specific 64-bit value
    pub value64: u64,
}

impl ControlMessage {
    /// Frame boundary carrying `dt` time units
    pub fn frame(dt: u32, persist: bool) -> Self {
        Self {
            flags: if persist { CF_PERSIST } else { 0 },
            value32: dt,
            value64: 0,
        }
    }

    /// Frame count marker for recordings
    pub fn frame_count(frames: u32) -> Self {
        Self {
            flags: 0,
            value32: frames,
            value64: 0,
        }
    }

    /// Append the 16-byte body
    pub fn write(&self, out: &mut Vec<u8>) {
        write_u32(out, self.flags);
        write_u32(out, self.value32);
        write_u64(out, self.value64);
    }

    /// Decode a 16-byte body
    pub fn read(body: &[u8]) -> Result<Self> {
        if body.len() < CONTROL_SIZE {
            return Err(Error::Truncated {
                needed: CONTROL_SIZE,
                available: body.len(),
            });
        }
        let mut reader = WireReader::new(body);
        Ok(Self {
            flags: reader.read_u32()?,
            value32: reader.read_u32()?,
            value64: reader.read_u64()?,
        })
    }
}

//! Server info message
//!
//! The first message of every session or recording: fixed 48-byte body,
//! written uncompressed and without a CRC trailer so the stream preamble is
//! exactly 64 bytes (16-byte header + body).
//!
//! Body layout: `[TIME_UNIT_US(8)] [DEFAULT_FRAME_TIME(4)] [COORD_FRAME(1)]
//! [RESERVED(35)]`

use super::{write_u32, write_u64, WireReader};
use crate::error::{Error, Result};

/// Fixed server info body size
pub const SERVER_INFO_SIZE: usize = 48;

/// Coordinate frame of the streamed scene
///
/// Encodes the right/forward/up axis permutation; `...Neg` variants are the
/// left-handed mirror of the same permutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CoordinateFrame {
    /// X right, Y forward, Z up (right-handed)
    Xyz,
    /// X right, Z forward, Y up (left-handed)
    XzyNeg,
    /// Y right, X forward, Z up (left-handed)
    YxzNeg,
    /// Y right, Z forward, X up (right-handed)
    Yzx,
    /// Z right, X forward, Y up (right-handed)
    Zxy,
    /// Z right, Y forward, X up (left-handed)
    ZyxNeg,
    /// X right, Y forward, Z down (left-handed)
    XyzNeg,
    /// X right, Z forward, Y down (right-handed)
    Xzy,
    /// Y right, X forward, Z down (right-handed)
    Yxz,
    /// Y right, Z forward, X down (left-handed)
    YzxNeg,
    /// Z right, X forward, Y down (left-handed)
    ZxyNeg,
    /// Z right, Y forward, X down (right-handed)
    Zyx,
}

impl CoordinateFrame {
    /// Wire encoding
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Decode the wire value
    pub fn from_u8(v: u8) -> Result<Self> {
        use CoordinateFrame::*;
        const ALL: [CoordinateFrame; 12] = [
            Xyz, XzyNeg, YxzNeg, Yzx, Zxy, ZyxNeg, XyzNeg, Xzy, Yxz, YzxNeg, ZxyNeg, Zyx,
        ];
        ALL.get(v as usize)
            .copied()
            .ok_or_else(|| Error::InvalidMessage(format!("coordinate frame {}", v)))
    }
}

/// Session-level timing and axis conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerInfoMessage {
    /// Microseconds per protocol time unit
    pub time_unit_us: u64,
    /// Default frame duration in time units
    pub default_frame_time: u32,
    /// Axis convention of all streamed geometry
    pub coordinate_frame: CoordinateFrame,
}

impl Default for ServerInfoMessage {
    fn default() -> Self {
        Self {
            time_unit_us: 1000,
            default_frame_time: 33,
            coordinate_frame: CoordinateFrame::Xyz,
        }
    }
}

impl ServerInfoMessage {
    /// Append the 48-byte body
    pub fn write(&self, out: &mut Vec<u8>) {
        write_u64(out, self.time_unit_us);
        write_u32(out, self.default_frame_time);
        out.push(self.coordinate_frame.to_u8());
        out.extend_from_slice(&[0u8; SERVER_INFO_SIZE - 13]);
    }

    /// Decode a 48-byte body
    pub fn read(body: &[u8]) -> Result<Self> {
        if body.len() < SERVER_INFO_SIZE {
            return Err(Error::Truncated {
                needed: SERVER_INFO_SIZE,
                available: body.len(),
            });
        }
        let mut reader = WireReader::new(body);
        let time_unit_us = reader.read_u64()?;
        let default_frame_time = reader.read_u32()?;
        let coordinate_frame = CoordinateFrame::from_u8(reader.read_u8()?)?;
        Ok(Self {
            time_unit_us,
            default_frame_time,
            coordinate_frame,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_is_48_bytes() {
        let mut buf = Vec::new();
        ServerInfoMessage::default().write(&mut buf);
        assert_eq!(buf.len(), SERVER_INFO_SIZE);
    }

    #[test]
    fn test_roundtrip() {
        let info = ServerInfoMessage {
            time_unit_us: 500,
            default_frame_time: 16,
            coordinate_frame: CoordinateFrame::Zxy,
        };
        let mut buf = Vec::new();
        info.write(&mut buf);
        assert_eq!(ServerInfoMessage::read(&buf).unwrap(), info);
    }

    #[test]
    fn test_all_frames_roundtrip() {
        for v in 0..12u8 {
            let frame = CoordinateFrame::from_u8(v).unwrap();
            assert_eq!(frame.to_u8(), v);
        }
        assert!(CoordinateFrame::from_u8(12).is_err());
    }
}

//! Camera hint messages
//!
//! A transient viewpoint suggestion broadcast each frame it changes; never
//! registered, never replayed. Body layout: `[CAMERA_ID(1)] [RESERVED(3)]
//! [POSITION(12)] [DIRECTION(12)] [UP(12)] [NEAR(4)] [FAR(4)] [FOV(4)]`.

use super::{write_f32, write_vector3, WireReader};
use crate::error::{Error, Result};
use crate::maths::Vector3;

/// The only camera message id
pub const CAMERA_SET: u16 = 0;

/// Fixed camera body size
pub const CAMERA_SIZE: usize = 52;

/// Camera viewpoint hint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMessage {
    /// Camera slot; viewers may track several
    pub camera_id: u8,
    /// Eye position
    pub position: Vector3,
    /// View direction (unit)
    pub direction: Vector3,
    /// Up axis (unit)
    pub up: Vector3,
    /// Near clip distance
    pub near_clip: f32,
    /// Far clip distance
    pub far_clip: f32,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
}

impl CameraMessage {
    /// Append the 52-byte body
    pub fn write(&self, out: &mut Vec<u8>) {
        out.push(self.camera_id);
        out.extend_from_slice(&[0u8; 3]);
        write_vector3(out, self.position);
        write_vector3(out, self.direction);
        write_vector3(out, self.up);
        write_f32(out, self.near_clip);
        write_f32(out, self.far_clip);
        write_f32(out, self.fov_degrees);
    }

    /// Decode a 52-byte body
    pub fn read(body: &[u8]) -> Result<Self> {
        if body.len() < CAMERA_SIZE {
            return Err(Error::Truncated {
                needed: CAMERA_SIZE,
                available: body.len(),
            });
        }
        let mut reader = WireReader::new(body);
        let camera_id = reader.read_u8()?;
        reader.read_bytes(3)?;
        Ok(Self {
            camera_id,
            position: reader.read_vector3()?,
            direction: reader.read_vector3()?,
            up: reader.read_vector3()?,
            near_clip: reader.read_f32()?,
            far_clip: reader.read_f32()?,
            fov_degrees: reader.read_f32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let msg = CameraMessage {
            camera_id: 1,
            position: Vector3::new(10.0, -4.0, 2.5),
            direction: Vector3::new(0.0, 1.0, 0.0),
            up: Vector3::new(0.0, 0.0, 1.0),
            near_clip: 0.1,
            far_clip: 500.0,
            fov_degrees: 60.0,
        };
        let mut buf = Vec::new();
        msg.write(&mut buf);
        assert_eq!(buf.len(), CAMERA_SIZE);
        assert_eq!(CameraMessage::read(&buf).unwrap(), msg);
    }
}

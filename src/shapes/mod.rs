//! Shape contract
//!
//! Shape kinds plug in behind the [`Shape`] trait rather than subclassing a
//! base: a shape supplies its routing id, its generic attribute block, an
//! optional create-time addendum, and (for complex shapes) a sequence of
//! Data message payloads. The engine owns the create/update/destroy message
//! framing; concrete geometry stays out of the engine.
//!
//! Message ids shared by every shape routing id:
//!
//! | Message | Id | Body |
//! |---------|----|------|
//! | Create  | 1 | object id, category, flags, reserved, attributes, addendum |
//! | Update  | 2 | object id, reserved, attributes |
//! | Destroy | 3 | object id |
//! | Data    | 4 | object id, shape-specific payload |

pub mod mesh_shape;
pub mod simple;

use crate::error::Result;
use crate::maths::{Colour, Quaternion, Vector3};
use crate::messages::{write_u16, write_u32, WireReader};

/// Create message id
pub const OBJECT_CREATE: u16 = 1;
/// Update message id
pub const OBJECT_UPDATE: u16 = 2;
/// Destroy message id
pub const OBJECT_DESTROY: u16 = 3;
/// Data message id (complex shapes only)
pub const OBJECT_DATA: u16 = 4;

/// Shape flag: render as wireframe
pub const SF_WIREFRAME: u16 = 1 << 0;
/// Shape flag: render transparent
pub const SF_TRANSPARENT: u16 = 1 << 1;
/// First flag bit reserved for shape-specific semantics
pub const SF_SHAPE_SPECIFIC: u16 = 1 << 8;

/// Generic attribute block carried by create and update messages
///
/// Wire layout: packed colour (4), translation (12), rotation quaternion
/// (16), scale (12) - 44 bytes. Rotation and scale semantics vary per shape
/// type (a sphere reads radius from scale, an arrow reads direction from
/// rotation).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShapeAttributes {
    /// Shape colour
    pub colour: Colour,
    /// World translation
    pub translation: Vector3,
    /// Rotation (interpretation varies per shape)
    pub rotation: Quaternion,
    /// Scale (interpretation varies per shape)
    pub scale: Vector3,
}

/// Attribute block wire size
pub const ATTRIBUTES_SIZE: usize = 44;

impl ShapeAttributes {
    /// Append the 44-byte block
    pub fn write(&self, out: &mut Vec<u8>) {
        crate::messages::write_colour(out, self.colour);
        crate::messages::write_vector3(out, self.translation);
        crate::messages::write_quaternion(out, self.rotation);
        crate::messages::write_vector3(out, self.scale);
    }

    /// Decode a 44-byte block
    pub fn read(reader: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            colour: reader.read_colour()?,
            translation: reader.read_vector3()?,
            rotation: reader.read_quaternion()?,
            scale: reader.read_vector3()?,
        })
    }
}

/// The generic create/update/destroy/data contract every shape kind meets
pub trait Shape: Send {
    /// Routing id of this shape kind's handler
    fn routing_id(&self) -> u16;

    /// Object id; 0 marks a transient shape
    fn id(&self) -> u32;

    /// Category this shape belongs to
    fn category(&self) -> u16;

    /// Wireframe/transparent plus shape-specific flag bits
    fn flags(&self) -> u16;

    /// Current attribute block
    fn attributes(&self) -> &ShapeAttributes;

    /// Replace the attribute block (registry updates)
    fn set_attributes(&mut self, attributes: ShapeAttributes);

    /// True when the shape needs Data messages after Create
    fn is_complex(&self) -> bool {
        false
    }

    /// True for broadcast-only shapes that are never registered
    fn is_transient(&self) -> bool {
        self.id() == 0
    }

    /// Append the shape-specific create addendum after the common block
    fn write_create_extra(&self, _out: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }

    /// Number of Data messages that follow Create (complex shapes)
    fn data_message_count(&self) -> usize {
        0
    }

    /// Append the shape-specific part of Data message `index`
    fn write_data_extra(&self, _index: usize, _out: &mut Vec<u8>) -> Result<()> {
        Ok(())
    }

    /// Clone into a boxed trait object for the registry
    fn clone_shape(&self) -> Box<dyn Shape>;
}

/// Encode a Create message payload
pub fn write_create_payload(shape: &dyn Shape, out: &mut Vec<u8>) -> Result<()> {
    write_u32(out, shape.id());
    write_u16(out, shape.category());
    write_u16(out, shape.flags());
    write_u16(out, 0); // reserved
    shape.attributes().write(out);
    shape.write_create_extra(out)
}

/// Encode an Update message payload
pub fn write_update_payload(shape: &dyn Shape, out: &mut Vec<u8>) {
    write_u32(out, shape.id());
    write_u16(out, 0); // reserved
    shape.attributes().write(out);
}

/// Encode a Destroy message payload
pub fn write_destroy_payload(shape: &dyn Shape, out: &mut Vec<u8>) {
    write_u32(out, shape.id());
}

/// Encode Data message payload `index`
pub fn write_data_payload(shape: &dyn Shape, index: usize, out: &mut Vec<u8>) -> Result<()> {
    write_u32(out, shape.id());
    shape.write_data_extra(index, out)
}

/// Decoded common fields of a Create message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeCreateInfo {
    /// Object id (0 = transient)
    pub object_id: u32,
    /// Category id
    pub category: u16,
    /// Flag bits
    pub flags: u16,
    /// Attribute block
    pub attributes: ShapeAttributes,
}

/// Decode a Create payload; returns the common fields and the addendum
pub fn read_create_payload(body: &[u8]) -> Result<(ShapeCreateInfo, &[u8])> {
    let mut reader = WireReader::new(body);
    let object_id = reader.read_u32()?;
    let category = reader.read_u16()?;
    let flags = reader.read_u16()?;
    reader.read_u16()?; // reserved
    let attributes = ShapeAttributes::read(&mut reader)?;
    let info = ShapeCreateInfo {
        object_id,
        category,
        flags,
        attributes,
    };
    let extra_start = body.len() - reader.remaining();
    Ok((info, &body[extra_start..]))
}

/// Decode an Update payload
pub fn read_update_payload(body: &[u8]) -> Result<(u32, ShapeAttributes)> {
    let mut reader = WireReader::new(body);
    let object_id = reader.read_u32()?;
    reader.read_u16()?; // reserved
    Ok((object_id, ShapeAttributes::read(&mut reader)?))
}

/// Decode a Destroy payload
pub fn read_destroy_payload(body: &[u8]) -> Result<u32> {
    let mut reader = WireReader::new(body);
    reader.read_u32()
}

#[cfg(test)]
mod tests {
    use super::simple::SimpleShape;
    use super::*;
    use crate::protocol::routing;

    #[test]
    fn test_create_payload_roundtrip() {
        let shape = SimpleShape::sphere(42, Vector3::new(1.0, 2.0, 3.0), 0.75)
            .with_colour(Colour::WHITE);
        let mut buf = Vec::new();
        write_create_payload(&shape, &mut buf).unwrap();

        let (info, extra) = read_create_payload(&buf).unwrap();
        assert_eq!(info.object_id, 42);
        assert_eq!(info.category, 0);
        assert_eq!(info.attributes.colour, Colour::WHITE);
        assert_eq!(info.attributes.translation, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(info.attributes.scale, Vector3::splat(0.75));
        assert!(extra.is_empty());
    }

    #[test]
    fn test_update_payload_roundtrip() {
        let mut shape = SimpleShape::new(routing::BOX, 7);
        shape.set_attributes(ShapeAttributes {
            colour: Colour::rgb(10, 20, 30),
            translation: Vector3::new(-1.0, 0.5, 9.0),
            rotation: Quaternion::new(0.0, 0.7071, 0.0, 0.7071),
            scale: Vector3::new(2.0, 3.0, 4.0),
        });
        let mut buf = Vec::new();
        write_update_payload(&shape, &mut buf);

        let (id, attributes) = read_update_payload(&buf).unwrap();
        assert_eq!(id, 7);
        assert_eq!(&attributes, shape.attributes());
    }

    #[test]
    fn test_destroy_payload() {
        let shape = SimpleShape::new(routing::SPHERE, 42);
        let mut buf = Vec::new();
        write_destroy_payload(&shape, &mut buf);
        assert_eq!(read_destroy_payload(&buf).unwrap(), 42);
    }
}

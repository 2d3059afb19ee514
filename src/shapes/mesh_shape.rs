//! Mesh set shape
//!
//! A complex shape whose geometry lives in mesh resources. The create
//! addendum declares the part count; one Data message per part binds a
//! resource id to a part slot. Resources referenced here must be finalised
//! before the shape is created.

use super::{Shape, ShapeAttributes};
use crate::error::{Error, Result};
use crate::messages::{write_u16, write_u32, WireReader};
use crate::protocol::{narrow_u16, routing};

/// Shape rendering one or more mesh resources
#[derive(Debug, Clone)]
pub struct MeshShape {
    id: u32,
    category: u16,
    flags: u16,
    attributes: ShapeAttributes,
    parts: Vec<u32>,
}

impl MeshShape {
    /// Create a mesh shape referencing the given resource ids
    pub fn new(id: u32, parts: Vec<u32>) -> Self {
        Self {
            id,
            category: 0,
            flags: 0,
            attributes: ShapeAttributes {
                scale: crate::maths::Vector3::ONE,
                ..Default::default()
            },
            parts,
        }
    }

    /// Resource ids this shape renders
    pub fn parts(&self) -> &[u32] {
        &self.parts
    }

    /// Set the category (builder style)
    pub fn with_category(mut self, category: u16) -> Self {
        self.category = category;
        self
    }

    /// Replace the whole attribute block (builder style)
    pub fn with_attributes(mut self, attributes: ShapeAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

impl Shape for MeshShape {
    fn routing_id(&self) -> u16 {
        routing::MESH_SHAPE
    }

    fn id(&self) -> u32 {
        self.id
    }

    fn category(&self) -> u16 {
        self.category
    }

    fn flags(&self) -> u16 {
        self.flags
    }

    fn attributes(&self) -> &ShapeAttributes {
        &self.attributes
    }

    fn set_attributes(&mut self, attributes: ShapeAttributes) {
        self.attributes = attributes;
    }

    fn is_complex(&self) -> bool {
        true
    }

    fn write_create_extra(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u16(out, narrow_u16(self.parts.len())?);
        Ok(())
    }

    fn data_message_count(&self) -> usize {
        self.parts.len()
    }

    fn write_data_extra(&self, index: usize, out: &mut Vec<u8>) -> Result<()> {
        let resource_id = *self.parts.get(index).ok_or_else(|| {
            Error::InvalidMessage(format!("mesh shape part {} of {}", index, self.parts.len()))
        })?;
        write_u16(out, narrow_u16(index)?);
        write_u32(out, resource_id);
        Ok(())
    }

    fn clone_shape(&self) -> Box<dyn Shape> {
        Box::new(self.clone())
    }
}

/// Decoded Data message of a mesh shape part binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshShapePart {
    /// Object id of the owning shape
    pub object_id: u32,
    /// Part slot index
    pub part_index: u16,
    /// Resource bound to the slot
    pub resource_id: u32,
}

impl MeshShapePart {
    /// Decode a Data payload written by `write_data_payload`
    pub fn read(body: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new(body);
        Ok(Self {
            object_id: reader.read_u32()?,
            part_index: reader.read_u16()?,
            resource_id: reader.read_u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{read_create_payload, write_create_payload, write_data_payload};

    #[test]
    fn test_complex_contract() {
        let shape = MeshShape::new(9, vec![100, 101, 102]);
        assert!(shape.is_complex());
        assert_eq!(shape.data_message_count(), 3);

        let mut buf = Vec::new();
        write_create_payload(&shape, &mut buf).unwrap();
        let (info, extra) = read_create_payload(&buf).unwrap();
        assert_eq!(info.object_id, 9);
        // Addendum carries the part count.
        assert_eq!(extra, &[0, 3]);
    }

    #[test]
    fn test_part_data_messages() {
        let shape = MeshShape::new(9, vec![100, 101]);
        for (index, expected) in [(0usize, 100u32), (1, 101)] {
            let mut buf = Vec::new();
            write_data_payload(&shape, index, &mut buf).unwrap();
            let part = MeshShapePart::read(&buf).unwrap();
            assert_eq!(part.object_id, 9);
            assert_eq!(part.part_index as usize, index);
            assert_eq!(part.resource_id, expected);
        }
    }

    #[test]
    fn test_out_of_range_part_rejected() {
        let shape = MeshShape::new(9, vec![100]);
        let mut buf = Vec::new();
        assert!(write_data_payload(&shape, 5, &mut buf).is_err());
    }
}

//! Mesh resource messages
//!
//! Resource lifecycle on the wire (routing id `MESH`):
//!
//! | Message | Id | Body |
//! |---------|----|------|
//! | Destroy  | 1 | resource id |
//! | Create   | 2 | id, counts, topology, tint, transform |
//! | Vertex   | 3 | element chunk, 12 bytes/element |
//! | Index    | 4 | element chunk, 4 bytes/element |
//! | Colour   | 5 | element chunk, 4 bytes/element |
//! | Normal   | 6 | element chunk, 12 bytes/element |
//! | UV       | 7 | element chunk, 8 bytes/element |
//! | Finalise | 8 | resource id |
//! | Redefine | 9 | id, new counts |
//!
//! Element chunk layout: `[RESOURCE_ID(4)] [INDEX_OFFSET(4)] [RESERVED(2)]
//! [COUNT(2)] [COUNT x ELEMENT_SIZE bytes]`. A chunk never carries a
//! partial element.

use super::{
    write_colour, write_quaternion, write_u16, write_u32, write_vector3, WireReader,
};
use crate::error::{Error, Result};
use crate::maths::{Colour, Quaternion, Vector3};

/// Destroy a resource
pub const MESH_DESTROY: u16 = 1;
/// Reserve a resource id and declare its element counts
pub const MESH_CREATE: u16 = 2;
/// Vertex element chunk
pub const MESH_VERTEX: u16 = 3;
/// Index element chunk
pub const MESH_INDEX: u16 = 4;
/// Per-vertex colour element chunk
pub const MESH_COLOUR: u16 = 5;
/// Normal element chunk
pub const MESH_NORMAL: u16 = 6;
/// Texture coordinate element chunk
pub const MESH_UV: u16 = 7;
/// Mark a resource usable by shape references
pub const MESH_FINALISE: u16 = 8;
/// Reopen a finalised resource for further element messages
pub const MESH_REDEFINE: u16 = 9;

/// Element chunk header size (id, offset, reserved, count)
pub const ELEMENT_HEADER_SIZE: usize = 12;

/// Primitive topology of a mesh resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    /// Point list
    Points,
    /// Line list
    Lines,
    /// Triangle list
    #[default]
    Triangles,
    /// Quad list
    Quads,
}

impl Topology {
    /// Wire encoding
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Decode the wire value
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::Points),
            1 => Ok(Self::Lines),
            2 => Ok(Self::Triangles),
            3 => Ok(Self::Quads),
            _ => Err(Error::InvalidMessage(format!("topology {}", v))),
        }
    }
}

/// Element array kinds a resource streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Vertex positions (3 x f32)
    Vertex,
    /// Vertex indices (u32)
    Index,
    /// Per-vertex colours (packed u32)
    Colour,
    /// Vertex normals (3 x f32)
    Normal,
    /// Texture coordinates (2 x f32)
    Uv,
}

impl ElementKind {
    /// Wire size of one element
    pub fn element_size(self) -> usize {
        match self {
            Self::Vertex | Self::Normal => 12,
            Self::Index | Self::Colour => 4,
            Self::Uv => 8,
        }
    }

    /// Message id carrying chunks of this kind
    pub fn message_id(self) -> u16 {
        match self {
            Self::Vertex => MESH_VERTEX,
            Self::Index => MESH_INDEX,
            Self::Colour => MESH_COLOUR,
            Self::Normal => MESH_NORMAL,
            Self::Uv => MESH_UV,
        }
    }

    /// Inverse of `message_id`
    pub fn from_message_id(id: u16) -> Option<Self> {
        match id {
            MESH_VERTEX => Some(Self::Vertex),
            MESH_INDEX => Some(Self::Index),
            MESH_COLOUR => Some(Self::Colour),
            MESH_NORMAL => Some(Self::Normal),
            MESH_UV => Some(Self::Uv),
            _ => None,
        }
    }
}

/// Mesh create message body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshCreateMessage {
    /// Resource id being reserved
    pub resource_id: u32,
    /// Declared vertex count
    pub vertex_count: u32,
    /// Declared index count
    pub index_count: u32,
    /// Primitive topology
    pub topology: Topology,
    /// Tint applied to the whole resource
    pub tint: Colour,
    /// Local translation
    pub translation: Vector3,
    /// Local rotation
    pub rotation: Quaternion,
    /// Local scale
    pub scale: Vector3,
}

impl MeshCreateMessage {
    /// Append the body
    pub fn write(&self, out: &mut Vec<u8>) {
        write_u32(out, self.resource_id);
        write_u32(out, self.vertex_count);
        write_u32(out, self.index_count);
        out.push(0); // reserved
        out.push(self.topology.to_u8());
        write_colour(out, self.tint);
        write_vector3(out, self.translation);
        write_quaternion(out, self.rotation);
        write_vector3(out, self.scale);
    }

    /// Decode a body
    pub fn read(body: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new(body);
        let resource_id = reader.read_u32()?;
        let vertex_count = reader.read_u32()?;
        let index_count = reader.read_u32()?;
        reader.read_u8()?; // reserved
        let topology = Topology::from_u8(reader.read_u8()?)?;
        Ok(Self {
            resource_id,
            vertex_count,
            index_count,
            topology,
            tint: reader.read_colour()?,
            translation: reader.read_vector3()?,
            rotation: reader.read_quaternion()?,
            scale: reader.read_vector3()?,
        })
    }
}

/// One element chunk of a resource transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementMessage {
    /// Resource receiving the elements
    pub resource_id: u32,
    /// Index of the first element in this chunk
    pub index_offset: u32,
    /// Elements in this chunk
    pub count: u16,
    /// `count * element_size` raw element bytes
    pub data: Vec<u8>,
}

impl ElementMessage {
    /// Append the chunk header for `count` elements; element bytes follow
    pub fn write_header(out: &mut Vec<u8>, resource_id: u32, index_offset: u32, count: u16) {
        write_u32(out, resource_id);
        write_u32(out, index_offset);
        write_u16(out, 0); // reserved
        write_u16(out, count);
    }

    /// Decode a chunk carrying elements of `kind`
    pub fn read(body: &[u8], kind: ElementKind) -> Result<Self> {
        let mut reader = WireReader::new(body);
        let resource_id = reader.read_u32()?;
        let index_offset = reader.read_u32()?;
        reader.read_u16()?; // reserved
        let count = reader.read_u16()?;
        let data = reader
            .read_bytes(count as usize * kind.element_size())?
            .to_vec();
        Ok(Self {
            resource_id,
            index_offset,
            count,
            data,
        })
    }
}

/// Finalise message body: the bare resource id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshFinaliseMessage {
    /// Resource becoming usable
    pub resource_id: u32,
}

impl MeshFinaliseMessage {
    /// Append the body
    pub fn write(&self, out: &mut Vec<u8>) {
        write_u32(out, self.resource_id);
    }

    /// Decode a body
    pub fn read(body: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new(body);
        Ok(Self {
            resource_id: reader.read_u32()?,
        })
    }
}

/// Destroy message body: the bare resource id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshDestroyMessage {
    /// Resource being destroyed
    pub resource_id: u32,
}

impl MeshDestroyMessage {
    /// Append the body
    pub fn write(&self, out: &mut Vec<u8>) {
        write_u32(out, self.resource_id);
    }

    /// Decode a body
    pub fn read(body: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new(body);
        Ok(Self {
            resource_id: reader.read_u32()?,
        })
    }
}

/// Redefine message body: reopen a finalised resource with new counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshRedefineMessage {
    /// Resource being reopened
    pub resource_id: u32,
    /// New vertex count
    pub vertex_count: u32,
    /// New index count
    pub index_count: u32,
}

impl MeshRedefineMessage {
    /// Append the body
    pub fn write(&self, out: &mut Vec<u8>) {
        write_u32(out, self.resource_id);
        write_u32(out, self.vertex_count);
        write_u32(out, self.index_count);
    }

    /// Decode a body
    pub fn read(body: &[u8]) -> Result<Self> {
        let mut reader = WireReader::new(body);
        Ok(Self {
            resource_id: reader.read_u32()?,
            vertex_count: reader.read_u32()?,
            index_count: reader.read_u32()?,
        })
    }
}

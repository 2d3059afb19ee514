//! Mesh resources
//!
//! A resource is a shared mesh/point-cloud data object referenced by
//! shapes and streamed to viewers via chunked element messages. The server
//! holds the source arrays; [`MeshAccumulator`] is the viewer-side inverse,
//! rebuilding a resource from create/element/finalise messages.

use crate::error::{Error, Result};
use crate::maths::{Colour, Quaternion, Vector3};
use crate::messages::mesh::{ElementKind, ElementMessage, MeshCreateMessage, Topology};
use crate::messages::{write_colour, write_f32, write_u32, WireReader};

/// Server-side mesh/point-cloud data
#[derive(Debug, Clone, Default)]
pub struct MeshResource {
    /// Resource id, unique within the shared resource namespace
    pub id: u32,
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
    /// Vertex positions
    pub vertices: Vec<Vector3>,
    /// Vertex indices
    pub indices: Vec<u32>,
    /// Optional per-vertex colours (empty or one per vertex)
    pub colours: Vec<Colour>,
    /// Optional vertex normals (empty or one per vertex)
    pub normals: Vec<Vector3>,
    /// Optional texture coordinates (empty or one per vertex)
    pub uvs: Vec<[f32; 2]>,
}

impl MeshResource {
    /// Create an empty resource
    pub fn new(id: u32, topology: Topology) -> Self {
        Self {
            id,
            topology,
            tint: Colour::WHITE,
            scale: Vector3::ONE,
            ..Default::default()
        }
    }

    /// Set vertices (builder style)
    pub fn with_vertices(mut self, vertices: Vec<Vector3>) -> Self {
        self.vertices = vertices;
        self
    }

    /// Set indices (builder style)
    pub fn with_indices(mut self, indices: Vec<u32>) -> Self {
        self.indices = indices;
        self
    }

    /// Set per-vertex colours (builder style)
    pub fn with_colours(mut self, colours: Vec<Colour>) -> Self {
        self.colours = colours;
        self
    }

    /// Set normals (builder style)
    pub fn with_normals(mut self, normals: Vec<Vector3>) -> Self {
        self.normals = normals;
        self
    }

    /// Set texture coordinates (builder style)
    pub fn with_uvs(mut self, uvs: Vec<[f32; 2]>) -> Self {
        self.uvs = uvs;
        self
    }

    /// Set the base tint (builder style)
    pub fn with_tint(mut self, tint: Colour) -> Self {
        self.tint = tint;
        self
    }

    /// Element count of one array kind
    pub fn element_count(&self, kind: ElementKind) -> usize {
        match kind {
            ElementKind::Vertex => self.vertices.len(),
            ElementKind::Index => self.indices.len(),
            ElementKind::Colour => self.colours.len(),
            ElementKind::Normal => self.normals.len(),
            ElementKind::Uv => self.uvs.len(),
        }
    }

    /// The create message describing this resource
    pub fn create_message(&self) -> Result<MeshCreateMessage> {
        Ok(MeshCreateMessage {
            resource_id: self.id,
            vertex_count: crate::protocol::narrow_u32(self.vertices.len())?,
            index_count: crate::protocol::narrow_u32(self.indices.len())?,
            topology: self.topology,
            tint: self.tint,
            translation: self.translation,
            rotation: self.rotation,
            scale: self.scale,
        })
    }

    /// Append the raw element bytes for `[offset, offset + count)` of one
    /// array kind
    pub fn write_elements(
        &self,
        kind: ElementKind,
        offset: usize,
        count: usize,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let total = self.element_count(kind);
        if offset + count > total {
            return Err(Error::ElementRange {
                offset: offset as u32,
                count: count as u32,
                total: total as u32,
            });
        }
        match kind {
            ElementKind::Vertex => {
                for v in &self.vertices[offset..offset + count] {
                    write_f32(out, v.x);
                    write_f32(out, v.y);
                    write_f32(out, v.z);
                }
            }
            ElementKind::Index => {
                for &i in &self.indices[offset..offset + count] {
                    write_u32(out, i);
                }
            }
            ElementKind::Colour => {
                for &c in &self.colours[offset..offset + count] {
                    write_colour(out, c);
                }
            }
            ElementKind::Normal => {
                for n in &self.normals[offset..offset + count] {
                    write_f32(out, n.x);
                    write_f32(out, n.y);
                    write_f32(out, n.z);
                }
            }
            ElementKind::Uv => {
                for uv in &self.uvs[offset..offset + count] {
                    write_f32(out, uv[0]);
                    write_f32(out, uv[1]);
                }
            }
        }
        Ok(())
    }

    /// Check internal consistency before finalisation
    ///
    /// Optional arrays must be empty or match the vertex count; indices
    /// must reference existing vertices.
    pub fn validate(&self) -> Result<()> {
        let vertex_count = self.vertices.len();
        for (name, len) in [
            ("colours", self.colours.len()),
            ("normals", self.normals.len()),
            ("uvs", self.uvs.len()),
        ] {
            if len != 0 && len != vertex_count {
                return Err(Error::ResourceState {
                    id: self.id,
                    reason: match name {
                        "colours" => "colour count does not match vertex count",
                        "normals" => "normal count does not match vertex count",
                        _ => "uv count does not match vertex count",
                    },
                });
            }
        }
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(Error::ElementRange {
                offset: bad,
                count: 1,
                total: vertex_count as u32,
            });
        }
        Ok(())
    }
}

/// Viewer-side resource assembly from streamed messages
#[derive(Debug)]
pub struct MeshAccumulator {
    resource: MeshResource,
    expected_vertices: usize,
    expected_indices: usize,
    received_vertices: usize,
    received_indices: usize,
    finalised: bool,
}

impl MeshAccumulator {
    /// Start assembly from a decoded create message
    pub fn from_create(msg: &MeshCreateMessage) -> Self {
        let mut resource = MeshResource::new(msg.resource_id, msg.topology);
        resource.tint = msg.tint;
        resource.translation = msg.translation;
        resource.rotation = msg.rotation;
        resource.scale = msg.scale;
        resource.vertices = vec![Vector3::ZERO; msg.vertex_count as usize];
        resource.indices = vec![0; msg.index_count as usize];
        Self {
            resource,
            expected_vertices: msg.vertex_count as usize,
            expected_indices: msg.index_count as usize,
            received_vertices: 0,
            received_indices: 0,
            finalised: false,
        }
    }

    /// Splice one element chunk into the arrays
    pub fn apply(&mut self, kind: ElementKind, msg: &ElementMessage) -> Result<()> {
        let offset = msg.index_offset as usize;
        let count = msg.count as usize;
        let expected = match kind {
            ElementKind::Vertex | ElementKind::Colour | ElementKind::Normal | ElementKind::Uv => {
                self.expected_vertices
            }
            ElementKind::Index => self.expected_indices,
        };
        if offset + count > expected {
            return Err(Error::ElementRange {
                offset: msg.index_offset,
                count: msg.count as u32,
                total: expected as u32,
            });
        }

        // Optional arrays materialize on first chunk.
        let mut reader = WireReader::new(&msg.data);
        match kind {
            ElementKind::Vertex => {
                for slot in &mut self.resource.vertices[offset..offset + count] {
                    *slot = reader.read_vector3()?;
                }
                self.received_vertices += count;
            }
            ElementKind::Index => {
                for slot in &mut self.resource.indices[offset..offset + count] {
                    *slot = reader.read_u32()?;
                }
                self.received_indices += count;
            }
            ElementKind::Colour => {
                self.resource
                    .colours
                    .resize(self.expected_vertices, Colour::WHITE);
                for slot in &mut self.resource.colours[offset..offset + count] {
                    *slot = reader.read_colour()?;
                }
            }
            ElementKind::Normal => {
                self.resource
                    .normals
                    .resize(self.expected_vertices, Vector3::ZERO);
                for slot in &mut self.resource.normals[offset..offset + count] {
                    *slot = reader.read_vector3()?;
                }
            }
            ElementKind::Uv => {
                self.resource.uvs.resize(self.expected_vertices, [0.0; 2]);
                for slot in &mut self.resource.uvs[offset..offset + count] {
                    *slot = [reader.read_f32()?, reader.read_f32()?];
                }
            }
        }
        Ok(())
    }

    /// True once every declared vertex and index has arrived
    pub fn is_complete(&self) -> bool {
        self.received_vertices >= self.expected_vertices
            && self.received_indices >= self.expected_indices
    }

    /// Mark the finalise message received
    pub fn finalise(&mut self) {
        self.finalised = true;
    }

    /// True once finalised by the stream
    pub fn is_finalised(&self) -> bool {
        self.finalised
    }

    /// Extract the assembled resource
    pub fn into_resource(self) -> MeshResource {
        self.resource
    }

    /// Assembled resource view
    pub fn resource(&self) -> &MeshResource {
        &self.resource
    }
}

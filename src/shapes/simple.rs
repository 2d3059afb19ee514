//! Simple shapes
//!
//! The sphere/box/cone family shares one implementation: the routing id
//! tags the kind, and the attribute block carries everything the viewer
//! needs. Constructors document each kind's attribute conventions; beyond
//! that the engine treats them identically.

use super::{Shape, ShapeAttributes, SF_TRANSPARENT, SF_WIREFRAME};
use crate::maths::{Colour, Quaternion, Vector3};
use crate::protocol::routing;

/// A shape fully described by its attribute block
#[derive(Debug, Clone)]
pub struct SimpleShape {
    routing_id: u16,
    id: u32,
    category: u16,
    flags: u16,
    attributes: ShapeAttributes,
}

impl SimpleShape {
    /// Create a shape of the given kind with default attributes
    pub fn new(routing_id: u16, id: u32) -> Self {
        Self {
            routing_id,
            id,
            category: 0,
            flags: 0,
            attributes: ShapeAttributes {
                scale: Vector3::ONE,
                ..Default::default()
            },
        }
    }

    /// Sphere at `centre`; scale carries the radius uniformly
    pub fn sphere(id: u32, centre: Vector3, radius: f32) -> Self {
        let mut shape = Self::new(routing::SPHERE, id);
        shape.attributes.translation = centre;
        shape.attributes.scale = Vector3::splat(radius);
        shape
    }

    /// Axis-aligned box at `centre`; scale carries the full extents
    pub fn box_shape(id: u32, centre: Vector3, extents: Vector3) -> Self {
        let mut shape = Self::new(routing::BOX, id);
        shape.attributes.translation = centre;
        shape.attributes.scale = extents;
        shape
    }

    /// Cone with apex at `apex`; scale.x = base radius, scale.z = height
    pub fn cone(id: u32, apex: Vector3, radius: f32, height: f32) -> Self {
        let mut shape = Self::new(routing::CONE, id);
        shape.attributes.translation = apex;
        shape.attributes.scale = Vector3::new(radius, radius, height);
        shape
    }

    /// Cylinder at `centre`; scale.x = radius, scale.z = length
    pub fn cylinder(id: u32, centre: Vector3, radius: f32, length: f32) -> Self {
        let mut shape = Self::new(routing::CYLINDER, id);
        shape.attributes.translation = centre;
        shape.attributes.scale = Vector3::new(radius, radius, length);
        shape
    }

    /// Capsule at `centre`; scale.x = radius, scale.z = cylinder length
    pub fn capsule(id: u32, centre: Vector3, radius: f32, length: f32) -> Self {
        let mut shape = Self::new(routing::CAPSULE, id);
        shape.attributes.translation = centre;
        shape.attributes.scale = Vector3::new(radius, radius, length);
        shape
    }

    /// Plane patch at `position`; rotation orients the normal, scale.x the
    /// patch size
    pub fn plane(id: u32, position: Vector3, size: f32) -> Self {
        let mut shape = Self::new(routing::PLANE, id);
        shape.attributes.translation = position;
        shape.attributes.scale = Vector3::new(size, size, 1.0);
        shape
    }

    /// Star marker at `position`; scale carries the radius uniformly
    pub fn star(id: u32, position: Vector3, radius: f32) -> Self {
        let mut shape = Self::new(routing::STAR, id);
        shape.attributes.translation = position;
        shape.attributes.scale = Vector3::splat(radius);
        shape
    }

    /// Arrow from `origin`; rotation orients it, scale.z the length,
    /// scale.x the shaft radius
    pub fn arrow(id: u32, origin: Vector3, length: f32, radius: f32) -> Self {
        let mut shape = Self::new(routing::ARROW, id);
        shape.attributes.translation = origin;
        shape.attributes.scale = Vector3::new(radius, radius, length);
        shape
    }

    /// Set the colour (builder style)
    pub fn with_colour(mut self, colour: Colour) -> Self {
        self.attributes.colour = colour;
        self
    }

    /// Set the category (builder style)
    pub fn with_category(mut self, category: u16) -> Self {
        self.category = category;
        self
    }

    /// Set the rotation (builder style)
    pub fn with_rotation(mut self, rotation: Quaternion) -> Self {
        self.attributes.rotation = rotation;
        self
    }

    /// Replace the whole attribute block (builder style)
    pub fn with_attributes(mut self, attributes: ShapeAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Mark wireframe (builder style)
    pub fn wireframe(mut self) -> Self {
        self.flags |= SF_WIREFRAME;
        self
    }

    /// Mark transparent (builder style)
    pub fn transparent(mut self) -> Self {
        self.flags |= SF_TRANSPARENT;
        self
    }

    /// Mutable attribute access for per-frame animation
    pub fn attributes_mut(&mut self) -> &mut ShapeAttributes {
        &mut self.attributes
    }
}

impl Shape for SimpleShape {
    fn routing_id(&self) -> u16 {
        self.routing_id
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

    fn clone_shape(&self) -> Box<dyn Shape> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_conventions() {
        let sphere = SimpleShape::sphere(42, Vector3::new(1.0, 2.0, 3.0), 0.75);
        assert_eq!(sphere.routing_id(), routing::SPHERE);
        assert_eq!(sphere.attributes().scale, Vector3::splat(0.75));
        assert!(!sphere.is_transient());
        assert!(!sphere.is_complex());
    }

    #[test]
    fn test_transient_is_id_zero() {
        assert!(SimpleShape::star(0, Vector3::ZERO, 1.0).is_transient());
    }

    #[test]
    fn test_builder_flags() {
        let shape = SimpleShape::new(routing::BOX, 1).wireframe().transparent();
        assert_eq!(shape.flags(), SF_WIREFRAME | SF_TRANSPARENT);
    }
}

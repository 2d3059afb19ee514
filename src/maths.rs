//! Fixed-layout value types used as attribute payloads
//!
//! These are deliberately minimal: they exist so shape attributes have a
//! known wire layout, not to be a maths library. Hosts with their own
//! vector types convert at the API boundary.

/// 3-component float vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vector3 {
    /// All components zero
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    /// All components one
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);

    /// Create a new vector
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Uniform vector with all components set to `v`
    pub const fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }
}

impl Default for Vector3 {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Quaternion rotation (x, y, z, w)
///
/// Semantics vary per shape type: most shapes treat this as an orientation,
/// some (arrows, planes) derive a direction from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
    /// W (scalar) component
    pub w: f32,
}

impl Quaternion {
    /// No rotation
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Create a new quaternion
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// RGBA colour, packed on the wire as a big-endian u32 (r, g, b, a)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Colour {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Alpha channel (255 = opaque)
    pub a: u8,
}

impl Colour {
    /// Opaque white
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    /// Opaque black
    pub const BLACK: Self = Self::new(0, 0, 0, 255);

    /// Create a new colour
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque colour from RGB channels
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Pack to the wire representation
    pub const fn to_u32(self) -> u32 {
        ((self.r as u32) << 24) | ((self.g as u32) << 16) | ((self.b as u32) << 8) | self.a as u32
    }

    /// Unpack from the wire representation
    pub const fn from_u32(v: u32) -> Self {
        Self::new((v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8)
    }
}

impl Default for Colour {
    fn default() -> Self {
        Self::WHITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colour_pack_roundtrip() {
        let c = Colour::new(0x12, 0x34, 0x56, 0x78);
        assert_eq!(c.to_u32(), 0x1234_5678);
        assert_eq!(Colour::from_u32(c.to_u32()), c);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Vector3::default(), Vector3::ZERO);
        assert_eq!(Quaternion::default(), Quaternion::IDENTITY);
        assert_eq!(Colour::default(), Colour::WHITE);
    }
}

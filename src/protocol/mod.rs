//! Binary packet protocol
//!
//! Packet format: `[MARKER(4)] [VER_MAJOR(2)] [VER_MINOR(2)] [ROUTING(2)]
//! [MESSAGE(2)] [PAYLOAD_SIZE(2)] [PAYLOAD_OFFSET(1)] [FLAGS(1)] [PAYLOAD]
//! [CRC(2)]`
//!
//! All multi-byte fields are big-endian regardless of host endianness. The
//! CRC trailer covers header + payload and is omitted when the `NO_CRC`
//! flag is set.
//!
//! This module provides:
//! - [`packet`]: header/packet encode and decode
//! - [`buffer`]: incremental stream scanner with marker resynchronization
//! - [`collate`]: multi-packet collation with optional gzip compression
//! - [`crc`]: the 16-bit checksum used by the packet trailer

pub mod buffer;
pub mod collate;
pub mod crc;
pub mod packet;

use crate::error::{Error, Result};

/// Packet marker: ASCII "DRST", always the first four bytes of a packet
pub const PACKET_MARKER: u32 = 0x4452_5354;

/// Protocol major version; a mismatch is fatal to the packet
pub const VERSION_MAJOR: u16 = 0;

/// Protocol minor version; a mismatch is tolerated
pub const VERSION_MINOR: u16 = 4;

/// Fixed packet header size in bytes
pub const PACKET_HEADER_SIZE: usize = 16;

/// CRC trailer size in bytes
pub const PACKET_CRC_SIZE: usize = 2;

/// Ceiling of the 16-bit payload size field
pub const MAX_PAYLOAD_SIZE: usize = 0xFFFF;

/// Header flag: no CRC trailer follows the payload
pub const PF_NO_CRC: u8 = 1 << 0;

/// Routing ids identifying the handler that owns a packet
pub mod routing {
    /// Reserved, never sent
    pub const NULL: u16 = 0;
    /// Server info message, first on any stream
    pub const SERVER_INFO: u16 = 1;
    /// Control messages (frame boundaries, reset, ...)
    pub const CONTROL: u16 = 2;
    /// Collated (optionally compressed) packet bundle
    pub const COLLATED_PACKET: u16 = 3;
    /// Mesh resource lifecycle and element messages
    pub const MESH: u16 = 4;
    /// Camera hint messages
    pub const CAMERA: u16 = 5;
    /// Category name messages
    pub const CATEGORY: u16 = 6;

    /// First routing id owned by shape handlers
    pub const SHAPE_ID_START: u16 = 64;

    /// Sphere shape handler
    pub const SPHERE: u16 = SHAPE_ID_START;
    /// Box shape handler
    pub const BOX: u16 = SHAPE_ID_START + 1;
    /// Cone shape handler
    pub const CONE: u16 = SHAPE_ID_START + 2;
    /// Cylinder shape handler
    pub const CYLINDER: u16 = SHAPE_ID_START + 3;
    /// Capsule shape handler
    pub const CAPSULE: u16 = SHAPE_ID_START + 4;
    /// Plane shape handler
    pub const PLANE: u16 = SHAPE_ID_START + 5;
    /// Star shape handler
    pub const STAR: u16 = SHAPE_ID_START + 6;
    /// Arrow shape handler
    pub const ARROW: u16 = SHAPE_ID_START + 7;
    /// Mesh-set shape handler (complex, references mesh resources)
    pub const MESH_SHAPE: u16 = SHAPE_ID_START + 8;
    /// Point cloud shape handler (complex, references a point resource)
    pub const POINT_CLOUD: u16 = SHAPE_ID_START + 9;
}

/// Narrow a usize to u16 at an API boundary, failing loudly on overflow
#[inline]
pub fn narrow_u16(value: usize) -> Result<u16> {
    u16::try_from(value).map_err(|_| Error::NarrowingOverflow {
        value: value as u64,
        bits: 16,
    })
}

/// Narrow a usize to u32 at an API boundary, failing loudly on overflow
#[inline]
pub fn narrow_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::NarrowingOverflow {
        value: value as u64,
        bits: 32,
    })
}

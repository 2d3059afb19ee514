//! Packet header codec
//!
//! Encodes and decodes the fixed 16-byte header plus payload and optional
//! CRC trailer. Decoding reports three distinct outcomes the stream layer
//! cares about: `Err(NotAPacket)` (resynchronize by scanning forward),
//! `Ok(None)` (incomplete, retry after more bytes arrive) and
//! `Err(BadCrc)` (drop the packet, never repair it).

use super::crc::crc16;
use super::{
    narrow_u16, MAX_PAYLOAD_SIZE, PACKET_CRC_SIZE, PACKET_HEADER_SIZE, PACKET_MARKER, PF_NO_CRC,
    VERSION_MAJOR, VERSION_MINOR,
};
use crate::error::{Error, Result};

/// Decoded packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Protocol major version
    pub version_major: u16,
    /// Protocol minor version
    pub version_minor: u16,
    /// Handler that owns this packet
    pub routing_id: u16,
    /// Payload variant within that handler
    pub message_id: u16,
    /// Payload byte count (excludes header and CRC)
    pub payload_size: u16,
    /// Reserved, normally 0
    pub payload_offset: u8,
    /// Header flags (`PF_NO_CRC`)
    pub flags: u8,
}

impl PacketHeader {
    /// Create a header for the current protocol version
    pub fn new(routing_id: u16, message_id: u16) -> Self {
        Self {
            version_major: VERSION_MAJOR,
            version_minor: VERSION_MINOR,
            routing_id,
            message_id,
            payload_size: 0,
            payload_offset: 0,
            flags: 0,
        }
    }

    /// True when a CRC trailer follows the payload
    #[inline]
    pub fn has_crc(&self) -> bool {
        self.flags & PF_NO_CRC == 0
    }

    /// Append the 16-byte header encoding
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&PACKET_MARKER.to_be_bytes());
        out.extend_from_slice(&self.version_major.to_be_bytes());
        out.extend_from_slice(&self.version_minor.to_be_bytes());
        out.extend_from_slice(&self.routing_id.to_be_bytes());
        out.extend_from_slice(&self.message_id.to_be_bytes());
        out.extend_from_slice(&self.payload_size.to_be_bytes());
        out.push(self.payload_offset);
        out.push(self.flags);
    }

    /// Decode a header from the front of `buf`
    ///
    /// Returns `Ok(None)` when fewer than 16 bytes are available but what
    /// is there still matches the marker.
    pub fn read(buf: &[u8]) -> Result<Option<Self>> {
        let marker = PACKET_MARKER.to_be_bytes();
        let check = buf.len().min(marker.len());
        if buf[..check] != marker[..check] {
            return Err(Error::NotAPacket);
        }
        if buf.len() < PACKET_HEADER_SIZE {
            return Ok(None);
        }

        let header = Self {
            version_major: u16::from_be_bytes([buf[4], buf[5]]),
            version_minor: u16::from_be_bytes([buf[6], buf[7]]),
            routing_id: u16::from_be_bytes([buf[8], buf[9]]),
            message_id: u16::from_be_bytes([buf[10], buf[11]]),
            payload_size: u16::from_be_bytes([buf[12], buf[13]]),
            payload_offset: buf[14],
            flags: buf[15],
        };

        // Major mismatch is fatal to the packet; minor drift is tolerated.
        if header.version_major != VERSION_MAJOR {
            return Err(Error::VersionMismatch {
                major: header.version_major,
                minor: header.version_minor,
            });
        }
        Ok(Some(header))
    }
}

/// A decoded packet: header plus owned payload bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Packet header
    pub header: PacketHeader,
    /// Payload bytes (CRC trailer already validated and stripped)
    pub payload: Vec<u8>,
}

impl Packet {
    /// Handler routing id
    #[inline]
    pub fn routing_id(&self) -> u16 {
        self.header.routing_id
    }

    /// Message id within the handler
    #[inline]
    pub fn message_id(&self) -> u16 {
        self.header.message_id
    }
}

/// Encode a packet with a CRC trailer
pub fn encode(routing_id: u16, message_id: u16, payload: &[u8]) -> Result<Vec<u8>> {
    encode_flags(routing_id, message_id, payload, 0)
}

/// Encode a packet without a CRC trailer
pub fn encode_no_crc(routing_id: u16, message_id: u16, payload: &[u8]) -> Result<Vec<u8>> {
    encode_flags(routing_id, message_id, payload, PF_NO_CRC)
}

fn encode_flags(routing_id: u16, message_id: u16, payload: &[u8], flags: u8) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(Error::PayloadTooLarge {
            size: payload.len(),
            limit: MAX_PAYLOAD_SIZE,
        });
    }
    let mut header = PacketHeader::new(routing_id, message_id);
    header.payload_size = narrow_u16(payload.len())?;
    header.flags = flags;

    let mut out = Vec::with_capacity(PACKET_HEADER_SIZE + payload.len() + PACKET_CRC_SIZE);
    header.write(&mut out);
    out.extend_from_slice(payload);
    if header.has_crc() {
        let crc = crc16(&out);
        out.extend_from_slice(&crc.to_be_bytes());
    }
    Ok(out)
}

/// Decode one packet from the front of `buf`
///
/// Returns the packet and the number of bytes consumed, or `Ok(None)` when
/// `buf` holds a valid prefix but not yet the whole packet.
pub fn decode(buf: &[u8]) -> Result<Option<(Packet, usize)>> {
    let Some(header) = PacketHeader::read(buf)? else {
        return Ok(None);
    };

    let crc_size = if header.has_crc() { PACKET_CRC_SIZE } else { 0 };
    let total = PACKET_HEADER_SIZE + header.payload_size as usize + crc_size;
    if buf.len() < total {
        return Ok(None);
    }

    let payload_end = PACKET_HEADER_SIZE + header.payload_size as usize;
    if header.has_crc() {
        let actual = crc16(&buf[..payload_end]);
        let expected = u16::from_be_bytes([buf[payload_end], buf[payload_end + 1]]);
        if actual != expected {
            return Err(Error::BadCrc { expected, actual });
        }
    }

    let packet = Packet {
        header,
        payload: buf[PACKET_HEADER_SIZE..payload_end].to_vec(),
    };
    Ok(Some((packet, total)))
}

//! Packet collation
//!
//! Packs multiple complete, already-encoded packets into one outer packet,
//! optionally gzip-compressed. Collated payload layout:
//!
//! ```text
//! [FLAGS(2)] [RESERVED(2)] [UNCOMPRESSED_BYTES(4)] [packet bytes ...]
//! ```
//!
//! A contained packet is never split across a collation unit, and decoding
//! stops exactly after `uncompressed_bytes` bytes of nested packet data
//! have been produced.
//!
//! Two size regimes exist. The bounded regime obeys the outer header's
//! 16-bit payload ceiling and carries a CRC. The unrestricted regime is for
//! persistent file streams only: `uncompressed_bytes` may exceed what the
//! 16-bit payload field could reflect, so the outer packet carries no CRC
//! and a reader determines completeness purely by consuming
//! `uncompressed_bytes` of nested data.

use super::packet::{self, Packet, PacketHeader};
use super::{narrow_u32, routing, MAX_PAYLOAD_SIZE, PF_NO_CRC};
use crate::error::{Error, Result};
use std::io::{Read, Write};

/// Collated payload header size
pub const COLLATED_HEADER_SIZE: usize = 8;

/// Collation flag: nested packet bytes are gzip-compressed
pub const CF_COMPRESS: u16 = 1 << 0;

/// Most nested bytes a bounded collation unit can hold
pub const MAX_COLLATED_BYTES: usize = MAX_PAYLOAD_SIZE - COLLATED_HEADER_SIZE;

/// Bounded collation encoder
///
/// Accumulates encoded packets and emits one collated outer packet per
/// `finalise`. Compression falls back to stored-uncompressed whenever gzip
/// would expand the payload, so the outer packet always fits.
pub struct CollationCoder {
    compress: bool,
    raw: Vec<u8>,
    packet_count: usize,
}

impl CollationCoder {
    /// Create an encoder; `compress` requests gzip for each unit
    pub fn new(compress: bool) -> Self {
        Self {
            compress,
            raw: Vec::new(),
            packet_count: 0,
        }
    }

    /// Number of packets accumulated in the current unit
    pub fn packet_count(&self) -> usize {
        self.packet_count
    }

    /// Nested bytes accumulated in the current unit
    pub fn collated_bytes(&self) -> usize {
        self.raw.len()
    }

    /// True when no packets are pending
    pub fn is_empty(&self) -> bool {
        self.packet_count == 0
    }

    /// Add one complete encoded packet to the current unit
    ///
    /// Returns `Ok(false)` when the packet does not fit this unit; the
    /// caller finalises and retries. A packet that can never fit any unit
    /// is rejected with `PayloadTooLarge` and must be sent uncollated.
    pub fn add_packet(&mut self, bytes: &[u8]) -> Result<bool> {
        if bytes.len() > MAX_COLLATED_BYTES {
            return Err(Error::PayloadTooLarge {
                size: bytes.len(),
                limit: MAX_COLLATED_BYTES,
            });
        }
        if self.raw.len() + bytes.len() > MAX_COLLATED_BYTES {
            return Ok(false);
        }
        self.raw.extend_from_slice(bytes);
        self.packet_count += 1;
        Ok(true)
    }

    /// Emit the current unit as an encoded outer packet and reset
    ///
    /// Returns `Ok(None)` when no packets are pending.
    pub fn finalise(&mut self) -> Result<Option<Vec<u8>>> {
        if self.is_empty() {
            return Ok(None);
        }
        let payload = build_payload(&self.raw, self.compress)?;
        self.raw.clear();
        self.packet_count = 0;
        let outer = packet::encode(routing::COLLATED_PACKET, 0, &payload)?;
        Ok(Some(outer))
    }
}

/// Encode concatenated packet bytes as an unrestricted (file-only) unit
///
/// The outer header carries `payload_size` 0 and the `NO_CRC` flag; the
/// nested byte count comes solely from the collated header.
pub fn encode_unrestricted(raw_packets: &[u8], compress: bool) -> Result<Vec<u8>> {
    let payload = build_payload_unbounded(raw_packets, compress)?;
    let mut header = PacketHeader::new(routing::COLLATED_PACKET, 0);
    header.flags = PF_NO_CRC;
    let mut out = Vec::with_capacity(super::PACKET_HEADER_SIZE + payload.len());
    header.write(&mut out);
    out.extend_from_slice(&payload);
    Ok(out)
}

fn build_payload(raw: &[u8], compress: bool) -> Result<Vec<u8>> {
    let payload = build_payload_unbounded(raw, compress)?;
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(Error::PayloadTooLarge {
            size: payload.len(),
            limit: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(payload)
}

fn build_payload_unbounded(raw: &[u8], compress: bool) -> Result<Vec<u8>> {
    let uncompressed_bytes = narrow_u32(raw.len())?;
    let mut flags = 0u16;
    let body = if compress {
        let compressed = gzip_compress(raw)?;
        if compressed.len() < raw.len() {
            flags |= CF_COMPRESS;
            compressed
        } else {
            // Incompressible unit: store raw so the size bound still holds.
            raw.to_vec()
        }
    } else {
        raw.to_vec()
    };

    let mut payload = Vec::with_capacity(COLLATED_HEADER_SIZE + body.len());
    payload.extend_from_slice(&flags.to_be_bytes());
    payload.extend_from_slice(&0u16.to_be_bytes());
    payload.extend_from_slice(&uncompressed_bytes.to_be_bytes());
    payload.extend_from_slice(&body);
    Ok(payload)
}

/// Unpack a collated packet into its original ordered packet sequence
pub fn decode_collated(outer: &Packet) -> Result<Vec<Packet>> {
    if outer.payload.len() < COLLATED_HEADER_SIZE {
        return Err(Error::Truncated {
            needed: COLLATED_HEADER_SIZE,
            available: outer.payload.len(),
        });
    }
    let flags = u16::from_be_bytes([outer.payload[0], outer.payload[1]]);
    let uncompressed_bytes = u32::from_be_bytes([
        outer.payload[4],
        outer.payload[5],
        outer.payload[6],
        outer.payload[7],
    ]) as usize;
    let body = &outer.payload[COLLATED_HEADER_SIZE..];

    let nested = if flags & CF_COMPRESS != 0 {
        gzip_decompress(body, uncompressed_bytes)?
    } else {
        if body.len() < uncompressed_bytes {
            return Err(Error::Truncated {
                needed: uncompressed_bytes,
                available: body.len(),
            });
        }
        body[..uncompressed_bytes].to_vec()
    };
    split_nested(&nested)
}

/// Decode nested packet bytes; exactly `nested.len()` bytes must form
/// complete packets
pub fn split_nested(nested: &[u8]) -> Result<Vec<Packet>> {
    let mut packets = Vec::new();
    let mut consumed = 0;
    while consumed < nested.len() {
        match packet::decode(&nested[consumed..])? {
            Some((packet, used)) => {
                consumed += used;
                packets.push(packet);
            }
            None => {
                // A split nested packet means the collation unit itself is
                // malformed, not that more stream data is coming.
                return Err(Error::InvalidMessage(format!(
                    "collated unit truncated mid-packet at byte {}",
                    consumed
                )));
            }
        }
    }
    Ok(packets)
}

fn gzip_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder =
        flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| Error::Compression(e.to_string()))
}

/// Decompress a gzip body, bounding output by the declared byte count
pub(crate) fn gzip_decompress(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut out = Vec::with_capacity(expected);
    let mut chunk = [0u8; 8192];
    loop {
        match decoder.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                out.extend_from_slice(&chunk[..n]);
                if out.len() > expected {
                    return Err(Error::Compression(format!(
                        "collated unit inflated past declared {} bytes",
                        expected
                    )));
                }
            }
            Err(e) => return Err(Error::Compression(e.to_string())),
        }
    }
    if out.len() != expected {
        return Err(Error::Compression(format!(
            "collated unit produced {} bytes, declared {}",
            out.len(),
            expected
        )));
    }
    Ok(out)
}

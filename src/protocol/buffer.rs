//! Incremental packet stream scanner
//!
//! Accumulates whatever byte counts the transport hands over and extracts
//! complete packets, tolerating partial reads and resynchronizing after
//! corruption by scanning forward for the next marker. Never blocks: it is
//! driven entirely by `extend` and `next_packet` calls.

use super::packet::{self, Packet};
use super::PACKET_MARKER;
use crate::error::Result;

/// Compact the buffer once this many consumed bytes accumulate at the front
const COMPACT_THRESHOLD: usize = 4096;

/// Growable byte accumulator yielding complete packets
#[derive(Default)]
pub struct PacketBuffer {
    data: Vec<u8>,
    cursor: usize,
}

impl PacketBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from a transport
    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet consumed
    pub fn len(&self) -> usize {
        self.data.len() - self.cursor
    }

    /// True when no unconsumed bytes remain
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extract the next complete packet
    ///
    /// `Ok(None)` means more bytes are needed. `Err(BadCrc)` and
    /// `Err(VersionMismatch)` report a dropped packet; the buffer has
    /// already advanced so the next call resumes scanning at the following
    /// marker. Either way the stream stays usable.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        self.compact();
        if !self.seek_marker() {
            return Ok(None);
        }

        match packet::decode(&self.data[self.cursor..]) {
            Ok(Some((packet, consumed))) => {
                self.cursor += consumed;
                Ok(Some(packet))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                // Skip one byte only - the rest of this header cannot be
                // trusted, and the next marker scan will resynchronize.
                log::warn!("Dropping packet: {}", e);
                self.cursor += 1;
                Err(e)
            }
        }
    }

    /// Advance the cursor to the next marker, discarding garbage bytes
    ///
    /// Returns false when no marker is in the buffer; at most three bytes
    /// (a possible marker prefix) are retained in that case.
    fn seek_marker(&mut self) -> bool {
        let marker = PACKET_MARKER.to_be_bytes();
        let window = &self.data[self.cursor..];
        match window.windows(marker.len()).position(|w| w == marker) {
            Some(0) => true,
            Some(offset) => {
                log::debug!("Skipped {} bytes before packet marker", offset);
                self.cursor += offset;
                true
            }
            None => {
                let keep = window.len().min(marker.len() - 1);
                let dropped = window.len() - keep;
                if dropped > 0 {
                    log::debug!("Discarded {} unsynchronized bytes", dropped);
                    self.cursor += dropped;
                }
                false
            }
        }
    }

    /// Reclaim consumed front bytes once they pass the threshold
    fn compact(&mut self) {
        if self.cursor >= COMPACT_THRESHOLD {
            self.data.drain(..self.cursor);
            self.cursor = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::protocol::routing;

    fn sample(message_id: u16, payload: &[u8]) -> Vec<u8> {
        packet::encode(routing::CONTROL, message_id, payload).unwrap()
    }

    #[test]
    fn test_single_packet_in_pieces() {
        let bytes = sample(1, &[1, 2, 3]);
        let mut buffer = PacketBuffer::new();
        for &b in &bytes[..bytes.len() - 1] {
            buffer.extend(&[b]);
            assert!(buffer.next_packet().unwrap().is_none());
        }
        buffer.extend(&bytes[bytes.len() - 1..]);
        let packet = buffer.next_packet().unwrap().unwrap();
        assert_eq!(packet.payload, vec![1, 2, 3]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_packets_one_read() {
        let mut stream = Vec::new();
        for i in 0..5u16 {
            stream.extend_from_slice(&sample(i, &[i as u8; 4]));
        }
        let mut buffer = PacketBuffer::new();
        buffer.extend(&stream);
        for i in 0..5u16 {
            let packet = buffer.next_packet().unwrap().unwrap();
            assert_eq!(packet.message_id(), i);
        }
        assert!(buffer.next_packet().unwrap().is_none());
    }

    #[test]
    fn test_resync_after_garbage() {
        let mut buffer = PacketBuffer::new();
        buffer.extend(&[0x00, 0xFF, 0x44, 0x52]); // noise including a marker prefix
        buffer.extend(&sample(9, &[7, 7]));
        let packet = buffer.next_packet().unwrap().unwrap();
        assert_eq!(packet.message_id(), 9);
    }

    #[test]
    fn test_resync_after_bad_crc() {
        let mut corrupt = sample(1, &[0xAA; 8]);
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF;
        let good = sample(2, &[0xBB; 8]);

        let mut buffer = PacketBuffer::new();
        buffer.extend(&corrupt);
        buffer.extend(&good);

        assert!(matches!(buffer.next_packet(), Err(Error::BadCrc { .. })));
        // The stream recovers on the next valid packet.
        let packet = buffer.next_packet().unwrap().unwrap();
        assert_eq!(packet.message_id(), 2);
        assert_eq!(packet.payload, vec![0xBB; 8]);
    }

    #[test]
    fn test_garbage_only_never_yields() {
        let mut buffer = PacketBuffer::new();
        buffer.extend(&[0x55; 1000]);
        assert!(buffer.next_packet().unwrap().is_none());
        // All but a potential marker prefix is discarded.
        assert!(buffer.len() <= 3);
    }

    #[test]
    fn test_compaction_keeps_stream_intact() {
        let mut buffer = PacketBuffer::new();
        let bytes = sample(3, &[1; 100]);
        for _ in 0..100 {
            buffer.extend(&bytes);
        }
        let mut count = 0;
        while let Some(packet) = buffer.next_packet().unwrap() {
            assert_eq!(packet.message_id(), 3);
            count += 1;
        }
        assert_eq!(count, 100);
    }
}

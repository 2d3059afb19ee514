//! Session recording and playback
//!
//! Captures a session to a file as a self-describing packet stream: a
//! bare server-info packet first, a frame-count control packet whose value
//! is patched in on `finish()`, then one unrestricted collated unit per
//! frame. The unrestricted regime (payload size 0, length carried by the
//! collated header) lifts the 64 KiB payload ceiling that applies on live
//! connections; a file read from the start never needs to resynchronise.
//!
//! `SessionReader` walks the same file unit by unit, driving the regular
//! packet and collation decode paths.

use crate::error::{Error, Result};
use crate::messages::control::{ControlMessage, CONTROL_FRAME, CONTROL_FRAME_COUNT};
use crate::messages::server_info::ServerInfoMessage;
use crate::protocol::collate::{encode_unrestricted, split_nested, CF_COMPRESS};
use crate::protocol::packet::{self, Packet, PacketHeader};
use crate::protocol::{routing, PACKET_CRC_SIZE, PACKET_HEADER_SIZE};
use flate2::bufread::GzDecoder;
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Byte offset of the frame-count packet, directly after the server-info
/// preamble (16-byte header + 48-byte body, no CRC)
const FRAME_COUNT_OFFSET: u64 = 64;

/// Summary returned by [`SessionRecorder::finish`]
#[derive(Debug)]
pub struct SessionInfo {
    /// Recorded file path
    pub path: PathBuf,
    /// Frames written
    pub frame_count: u32,
    /// Final file size in bytes
    pub file_size_bytes: u64,
}

/// Records a session to a file stream
pub struct SessionRecorder {
    writer: BufWriter<File>,
    path: PathBuf,
    compress: bool,
    frame: Vec<u8>,
    frame_count: u32,
}

impl SessionRecorder {
    /// Create the file and write the preamble
    ///
    /// The frame-count packet is written with a zero value and patched on
    /// `finish()`; a recording that is never finished still plays back,
    /// just without a frame count.
    pub fn create(path: impl AsRef<Path>, info: &ServerInfoMessage, compress: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);

        let mut body = Vec::new();
        info.write(&mut body);
        let preamble = packet::encode_no_crc(routing::SERVER_INFO, 0, &body)?;
        writer.write_all(&preamble)?;
        writer.write_all(&Self::frame_count_packet(0)?)?;

        Ok(Self {
            writer,
            path,
            compress,
            frame: Vec::new(),
            frame_count: 0,
        })
    }

    fn frame_count_packet(frames: u32) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        ControlMessage::frame_count(frames).write(&mut body);
        packet::encode(routing::CONTROL, CONTROL_FRAME_COUNT, &body)
    }

    /// Append one encoded packet to the current frame
    pub fn record_packet(&mut self, bytes: &[u8]) {
        self.frame.extend_from_slice(bytes);
    }

    /// Close the current frame, writing it as one collated unit
    ///
    /// `dt` is the frame interval in protocol time units; it travels as a
    /// frame control packet at the end of the unit so playback paces
    /// itself the way a live viewer would.
    pub fn end_frame(&mut self, dt: u32) -> Result<()> {
        let mut body = Vec::new();
        ControlMessage::frame(dt, false).write(&mut body);
        let frame_packet = packet::encode(routing::CONTROL, CONTROL_FRAME, &body)?;
        self.frame.extend_from_slice(&frame_packet);

        let unit = encode_unrestricted(&self.frame, self.compress)?;
        self.writer.write_all(&unit)?;
        self.frame.clear();
        self.frame_count += 1;
        Ok(())
    }

    /// Frames written so far
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Patch the frame count and close the file
    pub fn finish(mut self) -> Result<SessionInfo> {
        if !self.frame.is_empty() {
            debug!("discarding {} unframed bytes", self.frame.len());
            self.frame.clear();
        }
        self.writer.flush()?;
        let file_size_bytes = self.writer.stream_position()?;

        // The patched packet is the same size as the placeholder, so this
        // overwrites it exactly.
        self.writer.seek(SeekFrom::Start(FRAME_COUNT_OFFSET))?;
        self.writer
            .write_all(&Self::frame_count_packet(self.frame_count)?)?;
        self.writer.flush()?;

        Ok(SessionInfo {
            path: self.path,
            frame_count: self.frame_count,
            file_size_bytes,
        })
    }
}

/// Reads a recorded session unit by unit
pub struct SessionReader {
    reader: BufReader<File>,
}

impl SessionReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            reader: BufReader::new(File::open(path)?),
        })
    }

    /// Decode the next unit: a bare packet, or every packet of a collated
    /// frame
    ///
    /// Returns `Ok(None)` at a clean end of file.
    pub fn next_unit(&mut self) -> Result<Option<Vec<Packet>>> {
        if self.reader.fill_buf()?.is_empty() {
            return Ok(None);
        }

        let mut head = [0u8; PACKET_HEADER_SIZE];
        self.reader.read_exact(&mut head)?;
        let header = PacketHeader::read(&head)?.ok_or(Error::NotAPacket)?;

        if header.routing_id == routing::COLLATED_PACKET && header.payload_size == 0 {
            return self.read_unrestricted().map(Some);
        }

        // Bounded packet: pull the remainder and run the normal decoder so
        // the CRC check applies.
        let crc_size = if header.has_crc() { PACKET_CRC_SIZE } else { 0 };
        let mut buf = head.to_vec();
        buf.resize(PACKET_HEADER_SIZE + header.payload_size as usize + crc_size, 0);
        self.reader.read_exact(&mut buf[PACKET_HEADER_SIZE..])?;
        match packet::decode(&buf)? {
            Some((packet, _)) => Ok(Some(vec![packet])),
            None => Err(Error::Truncated {
                needed: buf.len(),
                available: buf.len(),
            }),
        }
    }

    fn read_unrestricted(&mut self) -> Result<Vec<Packet>> {
        let mut collated_head = [0u8; 8];
        self.reader.read_exact(&mut collated_head)?;
        let flags = u16::from_be_bytes([collated_head[0], collated_head[1]]);
        let uncompressed =
            u32::from_be_bytes([collated_head[4], collated_head[5], collated_head[6], collated_head[7]])
                as usize;

        let raw = if flags & CF_COMPRESS != 0 {
            // The gzip decoder consumes exactly one member from the
            // underlying reader, leaving the next unit's header in place.
            let mut raw = Vec::with_capacity(uncompressed);
            GzDecoder::new(&mut self.reader).read_to_end(&mut raw)?;
            if raw.len() != uncompressed {
                return Err(Error::Compression(format!(
                    "collated unit inflated to {} bytes, header says {}",
                    raw.len(),
                    uncompressed
                )));
            }
            raw
        } else {
            let mut raw = vec![0u8; uncompressed];
            self.reader.read_exact(&mut raw)?;
            raw
        };
        split_nested(&raw)
    }
}

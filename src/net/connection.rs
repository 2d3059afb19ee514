//! Per-viewer connection state
//!
//! Wraps a transport with the outbound collation coder, the inbound
//! packet scanner, and the chunked resource transfer session that brings
//! a late joiner up to date.

use crate::error::{Error, Result};
use crate::protocol::buffer::PacketBuffer;
use crate::protocol::collate::CollationCoder;
use crate::protocol::packet::Packet;
use crate::transfer::ItemTransfer;
use log::{debug, trace};
use std::collections::VecDeque;

use super::Transport;

pub struct Connection {
    transport: Box<dyn Transport>,
    collator: Option<CollationCoder>,
    transfer: ItemTransfer,
    // Resources waiting their turn on the single transfer session.
    pending_resources: VecDeque<u32>,
    inbound: PacketBuffer,
    peer: Option<String>,
}

impl Connection {
    /// Wrap a transport; `collate` batches small packets, `compress`
    /// additionally gzips each batch
    pub fn new(transport: Box<dyn Transport>, collate: bool, compress: bool) -> Self {
        let peer = transport.peer();
        Self {
            transport,
            collator: collate.then(|| CollationCoder::new(compress)),
            transfer: ItemTransfer::new(),
            pending_resources: VecDeque::new(),
            inbound: PacketBuffer::new(),
            peer,
        }
    }

    pub fn peer(&self) -> Option<&str> {
        self.peer.as_deref()
    }

    pub fn transfer(&mut self) -> &mut ItemTransfer {
        &mut self.transfer
    }

    /// Queue a resource for chunked delivery on this connection
    pub fn queue_resource(&mut self, resource_id: u32) {
        if self.transfer.resource_id() != Some(resource_id)
            && !self.pending_resources.contains(&resource_id)
        {
            self.pending_resources.push_back(resource_id);
        }
    }

    /// Next queued resource, if any
    pub fn pop_pending_resource(&mut self) -> Option<u32> {
        self.pending_resources.pop_front()
    }

    /// Drop a resource from this connection's delivery, queued or in flight
    pub fn cancel_resource(&mut self, resource_id: u32) {
        self.pending_resources.retain(|&id| id != resource_id);
        if self.transfer.resource_id() == Some(resource_id) {
            self.transfer.cancel();
        }
    }

    /// Queue one encoded packet for delivery
    ///
    /// With collation enabled the packet lands in the current batch; a
    /// batch that cannot take it is flushed first, and a packet too large
    /// to ever collate goes straight to the transport.
    pub fn send_packet(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(collator) = self.collator.as_mut() else {
            self.transport.write(bytes)?;
            return Ok(());
        };
        match collator.add_packet(bytes) {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.flush_collator()?;
                let fits = match self.collator.as_mut() {
                    Some(c) => c.add_packet(bytes)?,
                    None => false,
                };
                if !fits {
                    // Does not fit even in an empty batch.
                    self.transport.write(bytes)?;
                }
                Ok(())
            }
            Err(Error::PayloadTooLarge { size, .. }) => {
                trace!("packet of {} bytes bypasses collation", size);
                self.transport.write(bytes)?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Write one encoded packet directly, bypassing collation
    ///
    /// The server-info preamble must reach the viewer as a bare packet,
    /// never wrapped in a collated unit.
    pub fn send_uncollated(&mut self, bytes: &[u8]) -> Result<()> {
        self.flush_collator()?;
        self.transport.write(bytes)?;
        Ok(())
    }

    /// Push the pending batch (if any) and flush the transport
    pub fn flush(&mut self) -> Result<()> {
        self.flush_collator()?;
        self.transport.flush()
    }

    fn flush_collator(&mut self) -> Result<()> {
        if let Some(collator) = self.collator.as_mut() {
            if let Some(bytes) = collator.finalise()? {
                self.transport.write(&bytes)?;
            }
        }
        Ok(())
    }

    /// Drain complete inbound packets
    ///
    /// Reads whatever the transport has pending and scans it; corrupted
    /// stretches resynchronise on the next marker rather than killing the
    /// connection.
    pub fn receive(&mut self) -> Result<Vec<Packet>> {
        let mut chunk = [0u8; 4096];
        loop {
            let n = self.transport.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            self.inbound.extend(&chunk[..n]);
        }

        let mut packets = Vec::new();
        loop {
            match self.inbound.next_packet() {
                Ok(Some(packet)) => packets.push(packet),
                Ok(None) => break,
                Err(Error::NotAPacket)
                | Err(Error::BadCrc { .. })
                | Err(Error::VersionMismatch { .. }) => {
                    debug!("dropping unreadable inbound packet, resynchronising");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(packets)
    }
}

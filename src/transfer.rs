//! Chunked resource transfer
//!
//! Streams a resource's element arrays to one connection through
//! size-capped element messages without ever exceeding the u16 count
//! field, the packet payload ceiling, or the caller's per-call byte
//! budget, and without ever splitting an element. The transfer is a
//! cooperative state machine: the server drives it a budgeted step at a
//! time across many update ticks until it reaches `Complete`, so one large
//! mesh cannot stall frame delivery on the same connection.
//!
//! Sequence per resource: Create, then element chunks for each populated
//! array kind in fixed order (vertex, index, colour, normal, uv), then
//! Finalise.

use crate::error::{Error, Result};
use crate::messages::mesh::{
    ElementKind, ElementMessage, MeshFinaliseMessage, ELEMENT_HEADER_SIZE, MESH_CREATE,
    MESH_FINALISE,
};
use crate::protocol::{
    packet, routing, MAX_PAYLOAD_SIZE, PACKET_CRC_SIZE, PACKET_HEADER_SIZE,
};
use crate::resource::MeshResource;

/// Transfer progress of one resource on one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// No active session
    Idle,
    /// Session opened, nothing emitted yet
    Started,
    /// One or more messages emitted
    InProgress,
    /// Every element and the finalise message delivered
    Complete,
}

/// Element kinds in their fixed streaming order
const KIND_ORDER: [ElementKind; 5] = [
    ElementKind::Vertex,
    ElementKind::Index,
    ElementKind::Colour,
    ElementKind::Normal,
    ElementKind::Uv,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Create,
    Elements(usize),
    Finalise,
    Done,
}

/// Per-resource chunked transfer state machine
#[derive(Debug)]
pub struct ItemTransfer {
    resource_id: u32,
    state: TransferState,
    phase: Phase,
    offset: usize,
    chunk_cap: usize,
}

impl ItemTransfer {
    /// Create an idle transfer
    pub fn new() -> Self {
        Self {
            resource_id: 0,
            state: TransferState::Idle,
            phase: Phase::Done,
            offset: 0,
            chunk_cap: usize::MAX,
        }
    }

    /// Cap elements per chunk below the protocol ceilings (tuning/tests)
    pub fn with_chunk_cap(mut self, cap: usize) -> Self {
        self.chunk_cap = cap.max(1);
        self
    }

    /// Open a session for `resource_id`, starting at element 0
    pub fn begin(&mut self, resource_id: u32) {
        self.resource_id = resource_id;
        self.state = TransferState::Started;
        self.phase = Phase::Create;
        self.offset = 0;
    }

    /// Abandon the session; a later resume restarts from element 0
    pub fn cancel(&mut self) {
        self.state = TransferState::Idle;
        self.phase = Phase::Done;
        self.offset = 0;
    }

    /// Current progress state
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Resource this session delivers, if one is active
    pub fn resource_id(&self) -> Option<u32> {
        match self.state {
            TransferState::Idle => None,
            _ => Some(self.resource_id),
        }
    }

    /// Emit as many whole-element chunk messages as fit `byte_limit`
    ///
    /// Each emitted message is a complete encoded packet handed to `sink`.
    /// Returns the bytes written this call. Never blocks and never splits
    /// an element; repeat across ticks until `state()` is `Complete`.
    pub fn update(
        &mut self,
        resource: &MeshResource,
        byte_limit: usize,
        sink: &mut dyn FnMut(&[u8]) -> Result<()>,
    ) -> Result<usize> {
        if self.state == TransferState::Idle || self.state == TransferState::Complete {
            return Ok(0);
        }
        if resource.id != self.resource_id {
            return Err(Error::UnknownResource(resource.id));
        }

        let mut written = 0usize;
        loop {
            match self.phase {
                Phase::Create => {
                    let msg = resource.create_message()?;
                    let mut body = Vec::new();
                    msg.write(&mut body);
                    let bytes = packet::encode(routing::MESH, MESH_CREATE, &body)?;
                    if written + bytes.len() > byte_limit {
                        break;
                    }
                    sink(&bytes)?;
                    written += bytes.len();
                    self.state = TransferState::InProgress;
                    self.phase = Phase::Elements(0);
                    self.offset = 0;
                }
                Phase::Elements(kind_index) => {
                    let kind = KIND_ORDER[kind_index];
                    let total = resource.element_count(kind);
                    if self.offset >= total {
                        self.offset = 0;
                        self.phase = if kind_index + 1 < KIND_ORDER.len() {
                            Phase::Elements(kind_index + 1)
                        } else {
                            Phase::Finalise
                        };
                        continue;
                    }

                    let count = self.next_chunk_count(kind, total, byte_limit - written);
                    if count == 0 {
                        break;
                    }
                    let mut body = Vec::with_capacity(
                        ELEMENT_HEADER_SIZE + count * kind.element_size(),
                    );
                    ElementMessage::write_header(
                        &mut body,
                        resource.id,
                        self.offset as u32,
                        count as u16,
                    );
                    resource.write_elements(kind, self.offset, count, &mut body)?;
                    let bytes = packet::encode(routing::MESH, kind.message_id(), &body)?;
                    sink(&bytes)?;
                    written += bytes.len();
                    self.offset += count;
                    self.state = TransferState::InProgress;
                }
                Phase::Finalise => {
                    let mut body = Vec::new();
                    MeshFinaliseMessage {
                        resource_id: resource.id,
                    }
                    .write(&mut body);
                    let bytes = packet::encode(routing::MESH, MESH_FINALISE, &body)?;
                    if written + bytes.len() > byte_limit {
                        break;
                    }
                    sink(&bytes)?;
                    written += bytes.len();
                    self.phase = Phase::Done;
                    self.state = TransferState::Complete;
                }
                Phase::Done => break,
            }
        }
        Ok(written)
    }

    /// Largest whole-element count satisfying every ceiling at once
    fn next_chunk_count(&self, kind: ElementKind, total: usize, budget: usize) -> usize {
        let element_size = kind.element_size();
        let overhead = PACKET_HEADER_SIZE + PACKET_CRC_SIZE + ELEMENT_HEADER_SIZE;
        if budget <= overhead + element_size - 1 {
            return 0;
        }
        let by_budget = (budget - overhead) / element_size;
        let by_payload = (MAX_PAYLOAD_SIZE - ELEMENT_HEADER_SIZE) / element_size;
        (total - self.offset)
            .min(by_budget)
            .min(by_payload)
            .min(u16::MAX as usize)
            .min(self.chunk_cap)
    }
}

impl Default for ItemTransfer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maths::Vector3;
    use crate::messages::mesh::Topology;
    use crate::resource::MeshAccumulator;

    fn index_resource(id: u32, count: usize) -> MeshResource {
        // Indices are the smallest element, which maximizes chunk counts.
        MeshResource::new(id, Topology::Points)
            .with_vertices(vec![Vector3::ZERO; count])
            .with_indices((0..count as u32).collect())
    }

    fn collect_chunks(
        transfer: &mut ItemTransfer,
        resource: &MeshResource,
        byte_limit: usize,
    ) -> Vec<Vec<u8>> {
        let mut packets = Vec::new();
        loop {
            let mut emitted = Vec::new();
            let written = transfer
                .update(resource, byte_limit, &mut |bytes| {
                    emitted.push(bytes.to_vec());
                    Ok(())
                })
                .unwrap();
            packets.extend(emitted);
            if transfer.state() == TransferState::Complete {
                break;
            }
            assert!(written > 0, "no progress under byte limit {}", byte_limit);
        }
        packets
    }

    fn decode_index_chunks(packets: &[Vec<u8>]) -> Vec<(u32, u16)> {
        packets
            .iter()
            .filter_map(|bytes| {
                let (p, _) = packet::decode(bytes).unwrap().unwrap();
                if p.message_id() == crate::messages::mesh::MESH_INDEX {
                    let msg = ElementMessage::read(&p.payload, ElementKind::Index).unwrap();
                    Some((msg.index_offset, msg.count))
                } else {
                    None
                }
            })
            .collect()
    }

    #[test]
    fn test_chunk_sequence_is_exact() {
        // 80000 elements with a 15000-element cap: ceil(80000/15000) = 6
        // chunks, the last one short.
        let resource = index_resource(7, 80_000);
        let mut transfer = ItemTransfer::new().with_chunk_cap(15_000);
        transfer.begin(7);
        let packets = collect_chunks(&mut transfer, &resource, usize::MAX);

        let chunks = decode_index_chunks(&packets);
        assert_eq!(chunks.len(), 6);
        for (i, &(offset, count)) in chunks.iter().enumerate() {
            assert_eq!(offset as usize, i * 15_000);
            assert_eq!(count as usize, if i < 5 { 15_000 } else { 5_000 });
        }
    }

    #[test]
    fn test_budget_respected_per_call() {
        let resource = index_resource(3, 50_000);
        let mut transfer = ItemTransfer::new();
        transfer.begin(3);

        let budget = 8 * 1024;
        loop {
            let mut call_bytes = 0usize;
            let written = transfer
                .update(&resource, budget, &mut |bytes| {
                    call_bytes += bytes.len();
                    Ok(())
                })
                .unwrap();
            assert_eq!(written, call_bytes);
            assert!(written <= budget, "wrote {} over budget {}", written, budget);
            if transfer.state() == TransferState::Complete {
                break;
            }
            assert!(written > 0);
        }
    }

    #[test]
    fn test_transfer_reconstructs_resource() {
        let count = 12_000;
        let resource = MeshResource::new(9, Topology::Triangles)
            .with_vertices(
                (0..count)
                    .map(|i| Vector3::new(i as f32, 0.5 * i as f32, -(i as f32)))
                    .collect(),
            )
            .with_indices((0..count as u32).collect());
        let mut transfer = ItemTransfer::new();
        transfer.begin(9);
        let packets = collect_chunks(&mut transfer, &resource, 16 * 1024);

        let mut accumulator: Option<MeshAccumulator> = None;
        for bytes in &packets {
            let (p, _) = packet::decode(bytes).unwrap().unwrap();
            match p.message_id() {
                MESH_CREATE => {
                    let msg =
                        crate::messages::mesh::MeshCreateMessage::read(&p.payload).unwrap();
                    accumulator = Some(MeshAccumulator::from_create(&msg));
                }
                MESH_FINALISE => accumulator.as_mut().unwrap().finalise(),
                id => {
                    let kind = ElementKind::from_message_id(id).unwrap();
                    let msg = ElementMessage::read(&p.payload, kind).unwrap();
                    accumulator.as_mut().unwrap().apply(kind, &msg).unwrap();
                }
            }
        }
        let accumulator = accumulator.unwrap();
        assert!(accumulator.is_complete());
        assert!(accumulator.is_finalised());
        let rebuilt = accumulator.into_resource();
        assert_eq!(rebuilt.vertices, resource.vertices);
        assert_eq!(rebuilt.indices, resource.indices);
    }

    #[test]
    fn test_chunks_never_exceed_payload_ceiling() {
        let resource = MeshResource::new(2, Topology::Points)
            .with_vertices(vec![Vector3::ONE; 20_000])
            .with_indices(Vec::new());
        let mut transfer = ItemTransfer::new();
        transfer.begin(2);
        let packets = collect_chunks(&mut transfer, &resource, usize::MAX);
        for bytes in &packets {
            let (p, _) = packet::decode(bytes).unwrap().unwrap();
            assert!(p.payload.len() <= MAX_PAYLOAD_SIZE);
        }
    }

    #[test]
    fn test_cancel_restarts_from_zero() {
        let resource = index_resource(4, 10_000);
        let mut transfer = ItemTransfer::new();
        transfer.begin(4);
        // Partial delivery, then cancel.
        transfer
            .update(&resource, 2048, &mut |_| Ok(()))
            .unwrap();
        assert_eq!(transfer.state(), TransferState::InProgress);
        transfer.cancel();
        assert_eq!(transfer.state(), TransferState::Idle);
        assert_eq!(transfer.resource_id(), None);

        // Resuming restarts at offset 0, not where it left off.
        transfer.begin(4);
        let packets = collect_chunks(&mut transfer, &resource, usize::MAX);
        let chunks = decode_index_chunks(&packets);
        assert_eq!(chunks.first().map(|c| c.0), Some(0));
    }

    #[test]
    fn test_zero_budget_makes_no_progress() {
        let resource = index_resource(1, 100);
        let mut transfer = ItemTransfer::new();
        transfer.begin(1);
        let written = transfer.update(&resource, 0, &mut |_| Ok(())).unwrap();
        assert_eq!(written, 0);
        assert_eq!(transfer.state(), TransferState::Started);
    }
}

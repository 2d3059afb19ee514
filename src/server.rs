//! Scene server
//!
//! Owns the scene registries (shapes, mesh resources, categories), the
//! listener, and the set of live viewer connections. The embedding
//! application mutates the scene through the server's operations; every
//! mutation is broadcast to current viewers, and a late joiner receives a
//! replay of the current state the moment its connection is committed.
//!
//! All operations run on the caller's thread. Only connection acceptance
//! may happen on a background thread, and accepted sockets are not
//! touched until `commit_connections`.

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::messages::camera::{CameraMessage, CAMERA_SET};
use crate::messages::category::{CategoryNameMessage, CATEGORY_NAME};
use crate::messages::control::{
    ControlMessage, CONTROL_FORCE_FRAME_FLUSH, CONTROL_FRAME, CONTROL_RESET,
};
use crate::messages::mesh::{MeshDestroyMessage, MeshRedefineMessage, MESH_DESTROY, MESH_REDEFINE};
use crate::messages::server_info::ServerInfoMessage;
use crate::net::{Connection, ConnectionMonitor, MonitorMode, TcpTransport};
use crate::protocol::{packet, routing};
use crate::resource::MeshResource;
use crate::shapes::{
    self, Shape, OBJECT_CREATE, OBJECT_DATA, OBJECT_DESTROY, OBJECT_UPDATE,
};
use crate::transfer::TransferState;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;

struct ResourceEntry {
    resource: MeshResource,
    finalised: bool,
}

pub struct Server {
    config: ServerConfig,
    info: ServerInfoMessage,
    monitor: ConnectionMonitor,
    connections: Vec<Connection>,
    shapes: HashMap<(u16, u32), Box<dyn Shape>>,
    resources: HashMap<u32, ResourceEntry>,
    categories: BTreeMap<u16, CategoryNameMessage>,
    frame_count: u32,
}

impl Server {
    /// Bind the listener and start accepting viewers
    pub fn start(config: ServerConfig) -> Result<Self> {
        let mode = if config.network.async_accept {
            MonitorMode::Asynchronous
        } else {
            MonitorMode::Synchronous
        };
        let monitor = ConnectionMonitor::start(&config.network.listen_address, mode)?;
        let info = ServerInfoMessage {
            time_unit_us: config.protocol.time_unit_us,
            default_frame_time: config.protocol.default_frame_time,
            coordinate_frame: config.protocol.coordinate_frame,
        };
        Ok(Self {
            config,
            info,
            monitor,
            connections: Vec::new(),
            shapes: HashMap::new(),
            resources: HashMap::new(),
            categories: BTreeMap::new(),
            frame_count: 0,
        })
    }

    /// Actual listener address (reports the assigned port when bound to 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.monitor.local_addr()
    }

    /// Number of committed viewer connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Frames delivered since start (or the last reset)
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    // ----- scene operations ------------------------------------------------

    /// Introduce a shape to the scene
    ///
    /// Persistent shapes (non-zero id) are registered for late-join replay
    /// and later `update`/`destroy` calls; a shape with id 0 is transient
    /// and only broadcast. Creating over an existing id replaces it.
    pub fn create(&mut self, shape: &dyn Shape) -> Result<()> {
        let packets = Self::creation_packets(shape)?;
        if !shape.is_transient() {
            let key = (shape.routing_id(), shape.id());
            if self.shapes.insert(key, shape.clone_shape()).is_some() {
                debug!("shape {}/{} recreated", key.0, key.1);
            }
        }
        for bytes in &packets {
            self.broadcast(bytes);
        }
        Ok(())
    }

    /// Move or restyle a registered shape
    pub fn update(&mut self, shape: &dyn Shape) -> Result<()> {
        let key = (shape.routing_id(), shape.id());
        let Some(stored) = self.shapes.get_mut(&key) else {
            return Err(Error::UnknownObject {
                routing_id: key.0,
                object_id: key.1,
            });
        };
        stored.set_attributes(*shape.attributes());

        let mut body = Vec::new();
        shapes::write_update_payload(shape, &mut body);
        let bytes = packet::encode(shape.routing_id(), OBJECT_UPDATE, &body)?;
        self.broadcast(&bytes);
        Ok(())
    }

    /// Remove a shape; a no-op (beyond the broadcast) if it was never
    /// registered
    pub fn destroy(&mut self, shape: &dyn Shape) -> Result<()> {
        self.destroy_object(shape.routing_id(), shape.id())
    }

    /// Remove a shape by its registry key
    pub fn destroy_object(&mut self, routing_id: u16, object_id: u32) -> Result<()> {
        self.shapes.remove(&(routing_id, object_id));
        let mut body = Vec::new();
        crate::messages::write_u32(&mut body, object_id);
        let bytes = packet::encode(routing_id, OBJECT_DESTROY, &body)?;
        self.broadcast(&bytes);
        Ok(())
    }

    /// Name a category; replayed to late joiners
    pub fn define_category(&mut self, category: CategoryNameMessage) -> Result<()> {
        let mut body = Vec::new();
        category.write(&mut body)?;
        let bytes = packet::encode(routing::CATEGORY, CATEGORY_NAME, &body)?;
        self.categories.insert(category.category_id, category);
        self.broadcast(&bytes);
        Ok(())
    }

    /// Suggest a viewpoint to viewers
    ///
    /// Cameras are hints, not scene state: broadcast to whoever is
    /// connected right now, never registered, never replayed.
    pub fn set_camera(&mut self, camera: &CameraMessage) -> Result<()> {
        let mut body = Vec::new();
        camera.write(&mut body);
        let bytes = packet::encode(routing::CAMERA, CAMERA_SET, &body)?;
        self.broadcast(&bytes);
        Ok(())
    }

    // ----- resources -------------------------------------------------------

    /// Register a mesh resource; it streams to viewers once finalised
    pub fn create_resource(&mut self, resource: MeshResource) -> Result<()> {
        resource.validate()?;
        let id = resource.id;
        if self.resources.contains_key(&id) {
            return Err(Error::DuplicateResource(id));
        }
        self.resources.insert(
            id,
            ResourceEntry {
                resource,
                finalised: false,
            },
        );
        Ok(())
    }

    /// Mark a resource complete and queue it to every live connection
    pub fn finalise_resource(&mut self, resource_id: u32) -> Result<()> {
        let entry = self
            .resources
            .get_mut(&resource_id)
            .ok_or(Error::UnknownResource(resource_id))?;
        entry.finalised = true;
        for conn in &mut self.connections {
            conn.queue_resource(resource_id);
        }
        Ok(())
    }

    /// Replace a resource's data and re-stream it
    ///
    /// In-flight deliveries of the old data are cancelled; viewers get a
    /// redefine notice followed by a fresh transfer from element 0.
    pub fn redefine_resource(&mut self, resource: MeshResource) -> Result<()> {
        resource.validate()?;
        let id = resource.id;
        if !self.resources.contains_key(&id) {
            return Err(Error::UnknownResource(id));
        }
        let notice = MeshRedefineMessage {
            resource_id: id,
            vertex_count: crate::protocol::narrow_u32(resource.vertices.len())?,
            index_count: crate::protocol::narrow_u32(resource.indices.len())?,
        };
        self.resources.insert(
            id,
            ResourceEntry {
                resource,
                finalised: true,
            },
        );

        let mut body = Vec::new();
        notice.write(&mut body);
        let bytes = packet::encode(routing::MESH, MESH_REDEFINE, &body)?;
        self.broadcast(&bytes);
        for conn in &mut self.connections {
            conn.cancel_resource(id);
            conn.queue_resource(id);
        }
        Ok(())
    }

    /// Drop a resource; cancels any delivery still in flight
    pub fn destroy_resource(&mut self, resource_id: u32) -> Result<()> {
        self.resources.remove(&resource_id);
        for conn in &mut self.connections {
            conn.cancel_resource(resource_id);
        }
        let mut body = Vec::new();
        MeshDestroyMessage { resource_id }.write(&mut body);
        let bytes = packet::encode(routing::MESH, MESH_DESTROY, &body)?;
        self.broadcast(&bytes);
        Ok(())
    }

    // ----- frame loop ------------------------------------------------------

    /// Close out a frame
    ///
    /// Broadcasts the frame control message (`dt` in protocol time units),
    /// drains inbound viewer traffic, and with `flush` pushes every
    /// connection's pending batch onto the wire. A flushed frame also
    /// tells viewers to drop transient shapes.
    pub fn update_frame(&mut self, dt: u32, flush: bool) -> Result<()> {
        if self.monitor.mode() == MonitorMode::Synchronous {
            self.monitor.monitor_connections()?;
        }

        let mut body = Vec::new();
        ControlMessage::frame(dt, !flush).write(&mut body);
        let bytes = packet::encode(routing::CONTROL, CONTROL_FRAME, &body)?;
        self.broadcast(&bytes);
        self.frame_count = self.frame_count.wrapping_add(1);

        self.process_inbound();
        if flush {
            self.flush_all();
        }
        Ok(())
    }

    /// Drive pending resource deliveries, writing at most `byte_limit`
    /// bytes in total
    ///
    /// The budget is shared: connections are served in order and each
    /// depletes what the ones before it left.
    pub fn update_transfers(&mut self, byte_limit: usize) -> Result<()> {
        let resources = &self.resources;
        let mut dead = Vec::new();
        let mut remaining = byte_limit;

        for (index, conn) in self.connections.iter_mut().enumerate() {
            let mut emitted: Vec<Vec<u8>> = Vec::new();

            let step = loop {
                if conn.transfer().state() == TransferState::Idle {
                    match conn.pop_pending_resource() {
                        Some(id) => conn.transfer().begin(id),
                        None => break Ok(()),
                    }
                }
                let Some(id) = conn.transfer().resource_id() else {
                    break Ok(());
                };
                let Some(entry) = resources.get(&id) else {
                    // Destroyed while queued.
                    conn.transfer().cancel();
                    continue;
                };
                let written = match conn.transfer().update(&entry.resource, remaining, &mut |b| {
                    emitted.push(b.to_vec());
                    Ok(())
                }) {
                    Ok(n) => n,
                    Err(e) => break Err(e),
                };
                remaining -= written;
                if conn.transfer().state() == TransferState::Complete {
                    debug!("resource {} delivered to {:?}", id, conn.peer());
                    conn.transfer().cancel();
                    continue;
                }
                // Budget exhausted mid-resource.
                break Ok(());
            };

            let step = step.and_then(|_| {
                for bytes in &emitted {
                    conn.send_packet(bytes)?;
                }
                Ok(())
            });
            if let Err(e) = step {
                warn!("dropping viewer {:?}: {}", conn.peer(), e);
                dead.push(index);
            }
        }

        for index in dead.into_iter().rev() {
            self.connections.remove(index);
        }
        Ok(())
    }

    /// Activate pending connections, replaying the current scene to each
    ///
    /// Replay order: server info (bare, uncollated), categories, then all
    /// registered shapes; finalised resources are queued for budgeted
    /// delivery through `update_transfers`.
    pub fn commit_connections(&mut self) -> Result<usize> {
        let streams = self.monitor.commit_connections();
        let mut committed = 0;
        for stream in streams {
            let transport = match TcpTransport::new(stream) {
                Ok(t) => t,
                Err(e) => {
                    warn!("rejecting viewer, socket setup failed: {}", e);
                    continue;
                }
            };
            let mut conn = Connection::new(
                Box::new(transport),
                self.config.protocol.collate,
                self.config.protocol.compress,
            );
            match self.replay_scene(&mut conn) {
                Ok(()) => {
                    info!("viewer {:?} joined, scene replayed", conn.peer());
                    self.connections.push(conn);
                    committed += 1;
                }
                Err(e) => warn!("dropping viewer {:?} during replay: {}", conn.peer(), e),
            }
        }
        Ok(committed)
    }

    fn replay_scene(&mut self, conn: &mut Connection) -> Result<()> {
        let mut body = Vec::new();
        self.info.write(&mut body);
        let preamble = packet::encode_no_crc(routing::SERVER_INFO, 0, &body)?;
        conn.send_uncollated(&preamble)?;

        for category in self.categories.values() {
            let mut body = Vec::new();
            category.write(&mut body)?;
            conn.send_packet(&packet::encode(routing::CATEGORY, CATEGORY_NAME, &body)?)?;
        }
        for (id, entry) in &self.resources {
            if entry.finalised {
                conn.queue_resource(*id);
            }
        }
        for shape in self.shapes.values() {
            for bytes in Self::creation_packets(shape.as_ref())? {
                conn.send_packet(&bytes)?;
            }
        }
        conn.flush()
    }

    /// Forget the scene and tell viewers to do the same
    ///
    /// Clears shapes and resources; category names survive.
    pub fn reset(&mut self) -> Result<()> {
        self.shapes.clear();
        self.resources.clear();
        for conn in &mut self.connections {
            conn.transfer().cancel();
            while conn.pop_pending_resource().is_some() {}
        }
        self.frame_count = 0;

        let mut body = Vec::new();
        ControlMessage::default().write(&mut body);
        let bytes = packet::encode(routing::CONTROL, CONTROL_RESET, &body)?;
        self.broadcast(&bytes);
        Ok(())
    }

    /// Request shutdown of the accept thread
    pub fn stop(&self) {
        self.monitor.stop();
    }

    /// Flush viewers and wait for the accept thread to finish
    pub fn join(&mut self) {
        self.flush_all();
        self.monitor.join();
        self.connections.clear();
    }

    // ----- internals -------------------------------------------------------

    fn creation_packets(shape: &dyn Shape) -> Result<Vec<Vec<u8>>> {
        let mut packets = Vec::with_capacity(1 + shape.data_message_count());
        let mut body = Vec::new();
        shapes::write_create_payload(shape, &mut body)?;
        packets.push(packet::encode(shape.routing_id(), OBJECT_CREATE, &body)?);
        for index in 0..shape.data_message_count() {
            let mut body = Vec::new();
            shapes::write_data_payload(shape, index, &mut body)?;
            packets.push(packet::encode(shape.routing_id(), OBJECT_DATA, &body)?);
        }
        Ok(packets)
    }

    /// Send one encoded packet to every viewer, reaping the ones whose
    /// transport fails
    fn broadcast(&mut self, bytes: &[u8]) {
        self.connections.retain_mut(|conn| match conn.send_packet(bytes) {
            Ok(()) => true,
            Err(e) => {
                info!("viewer {:?} disconnected: {}", conn.peer(), e);
                false
            }
        });
    }

    fn flush_all(&mut self) {
        self.connections.retain_mut(|conn| match conn.flush() {
            Ok(()) => true,
            Err(e) => {
                info!("viewer {:?} disconnected: {}", conn.peer(), e);
                false
            }
        });
    }

    fn process_inbound(&mut self) {
        let mut force_flush = false;
        self.connections.retain_mut(|conn| match conn.receive() {
            Ok(packets) => {
                for p in packets {
                    if p.routing_id() == routing::CONTROL
                        && p.message_id() == CONTROL_FORCE_FRAME_FLUSH
                    {
                        force_flush = true;
                    } else {
                        debug!(
                            "unhandled inbound packet {}/{} from {:?}",
                            p.routing_id(),
                            p.message_id(),
                            conn.peer()
                        );
                    }
                }
                true
            }
            Err(e) => {
                info!("viewer {:?} disconnected: {}", conn.peer(), e);
                false
            }
        });
        if force_flush {
            self.flush_all();
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maths::{Colour, Vector3};
    use crate::messages::mesh::{Topology, MESH_FINALISE};
    use crate::net::MockTransport;
    use crate::shapes::simple::SimpleShape;

    fn test_server() -> Server {
        let mut config = ServerConfig::default();
        config.network.listen_address = "127.0.0.1:0".to_string();
        config.network.async_accept = false;
        Server::start(config).unwrap()
    }

    #[test]
    fn test_create_registers_persistent_shape() {
        let mut server = test_server();
        let shape = SimpleShape::sphere(7, Vector3::ZERO, 1.0).with_colour(Colour::WHITE);
        server.create(&shape).unwrap();
        assert!(server.shapes.contains_key(&(routing::SPHERE, 7)));
    }

    #[test]
    fn test_transient_shape_not_registered() {
        let mut server = test_server();
        let shape = SimpleShape::sphere(0, Vector3::ZERO, 1.0);
        server.create(&shape).unwrap();
        assert!(server.shapes.is_empty());
    }

    #[test]
    fn test_update_unknown_shape_fails() {
        let mut server = test_server();
        let shape = SimpleShape::box_shape(3, Vector3::ZERO, Vector3::ONE);
        let err = server.update(&shape).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownObject {
                routing_id: routing::BOX,
                object_id: 3
            }
        ));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut server = test_server();
        let shape = SimpleShape::cone(5, Vector3::ZERO, 1.0, 2.0);
        server.create(&shape).unwrap();
        server.destroy(&shape).unwrap();
        assert!(server.shapes.is_empty());
        // Destroying again is a no-op, not an error.
        server.destroy(&shape).unwrap();
    }

    #[test]
    fn test_duplicate_resource_rejected() {
        let mut server = test_server();
        let resource = MeshResource::new(1, Topology::Triangles)
            .with_vertices(vec![Vector3::ZERO; 3])
            .with_indices(vec![0, 1, 2]);
        server.create_resource(resource.clone()).unwrap();
        let err = server.create_resource(resource).unwrap_err();
        assert!(matches!(err, Error::DuplicateResource(1)));
    }

    #[test]
    fn test_finalise_unknown_resource_fails() {
        let mut server = test_server();
        let err = server.finalise_resource(99).unwrap_err();
        assert!(matches!(err, Error::UnknownResource(99)));
    }

    #[test]
    fn test_bad_version_inbound_does_not_drop_viewer() {
        let mut server = test_server();
        let mock = MockTransport::new();
        server
            .connections
            .push(Connection::new(Box::new(mock.clone()), false, false));

        // A viewer speaking a newer major version gets its packet dropped,
        // not its connection.
        let mut stale = packet::encode(routing::CONTROL, 1, &[0u8; 4]).unwrap();
        stale[5] = stale[5].wrapping_add(1);
        mock.inject_read(&stale);

        server.update_frame(33, true).unwrap();
        server.update_frame(33, true).unwrap();
        assert_eq!(server.connection_count(), 1);
    }

    #[test]
    fn test_transfer_budget_shared_across_viewers() {
        let mut server = test_server();
        let resource =
            MeshResource::new(1, Topology::Points).with_vertices(vec![Vector3::ZERO; 6000]);
        server.create_resource(resource).unwrap();

        let mocks = [MockTransport::new(), MockTransport::new()];
        for mock in &mocks {
            server
                .connections
                .push(Connection::new(Box::new(mock.clone()), false, false));
        }
        server.finalise_resource(1).unwrap();

        // One call never writes more than its budget, no matter how many
        // viewers are waiting.
        let budget = 16 * 1024;
        let mut last_total = 0usize;
        for _ in 0..32 {
            server.update_transfers(budget).unwrap();
            let total: usize = mocks.iter().map(|m| m.get_written().len()).sum();
            assert!(
                total - last_total <= budget,
                "one call wrote {} bytes",
                total - last_total
            );
            last_total = total;
        }

        // The budget depletes in order but every viewer is eventually served.
        for mock in &mocks {
            let written = mock.get_written();
            let mut cursor = 0;
            let mut finalised = false;
            while cursor < written.len() {
                let (packet, consumed) = packet::decode(&written[cursor..]).unwrap().unwrap();
                assert_eq!(packet.routing_id(), routing::MESH);
                finalised = packet.message_id() == MESH_FINALISE;
                cursor += consumed;
            }
            assert!(finalised, "viewer did not receive the full resource");
        }
    }

    #[test]
    fn test_reset_clears_scene() {
        let mut server = test_server();
        server
            .create(&SimpleShape::sphere(1, Vector3::ZERO, 1.0))
            .unwrap();
        let resource = MeshResource::new(2, Topology::Points)
            .with_vertices(vec![Vector3::ZERO])
            .with_indices(vec![0]);
        server.create_resource(resource).unwrap();
        server
            .define_category(CategoryNameMessage {
                category_id: 1,
                parent_id: 0,
                default_active: true,
                name: "debug".to_string(),
            })
            .unwrap();

        server.reset().unwrap();
        assert!(server.shapes.is_empty());
        assert!(server.resources.is_empty());
        // Category names survive a reset.
        assert_eq!(server.categories.len(), 1);
    }
}

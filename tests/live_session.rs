//! Live session over loopback TCP
//!
//! Drives a real server and a raw socket viewer through the join, replay,
//! frame and resource-transfer paths.

use drishti::config::ServerConfig;
use drishti::maths::{Colour, Vector3};
use drishti::messages::category::CategoryNameMessage;
use drishti::messages::control::CONTROL_FRAME;
use drishti::messages::mesh::{ElementKind, ElementMessage, MeshCreateMessage, Topology, MESH_CREATE, MESH_FINALISE};
use drishti::messages::server_info::ServerInfoMessage;
use drishti::protocol::buffer::PacketBuffer;
use drishti::protocol::collate::decode_collated;
use drishti::protocol::packet::Packet;
use drishti::protocol::routing;
use drishti::resource::{MeshAccumulator, MeshResource};
use drishti::server::Server;
use drishti::shapes::simple::SimpleShape;
use drishti::shapes::{read_create_payload, OBJECT_CREATE, OBJECT_UPDATE};
use std::io::Read;
use std::net::TcpStream;
use std::time::{Duration, Instant};

fn test_config(collate: bool, compress: bool) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.network.listen_address = "127.0.0.1:0".to_string();
    config.network.async_accept = false;
    config.protocol.collate = collate;
    config.protocol.compress = compress;
    config
}

/// Raw socket viewer: accumulates bytes, unwraps collated units
struct Viewer {
    stream: TcpStream,
    buffer: PacketBuffer,
    packets: Vec<Packet>,
}

impl Viewer {
    fn connect(server: &Server) -> Self {
        let stream = TcpStream::connect(server.local_addr()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        Self {
            stream,
            buffer: PacketBuffer::new(),
            packets: Vec::new(),
        }
    }

    fn poll(&mut self) {
        let mut chunk = [0u8; 8192];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => self.buffer.extend(&chunk[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("viewer read failed: {}", e),
            }
        }
        while let Some(packet) = self.buffer.next_packet().unwrap() {
            if packet.routing_id() == routing::COLLATED_PACKET {
                self.packets.extend(decode_collated(&packet).unwrap());
            } else {
                self.packets.push(packet);
            }
        }
    }

    /// Drive the server loop until `done` passes or two seconds elapse
    fn pump(&mut self, server: &mut Server, done: impl Fn(&[Packet]) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            server.commit_connections().unwrap();
            server.update_transfers(64 * 1024).unwrap();
            server.update_frame(33, true).unwrap();
            self.poll();
            if done(&self.packets) {
                return;
            }
            assert!(Instant::now() < deadline, "timed out waiting for packets");
        }
    }
}

fn ribbon(id: u32, count: u32) -> MeshResource {
    MeshResource::new(id, Topology::Triangles)
        .with_vertices((0..count).map(|i| Vector3::new(i as f32, 0.0, 0.0)).collect())
        .with_indices((0..count).collect())
}

#[test]
fn test_late_join_receives_current_scene() {
    let mut server = Server::start(test_config(true, false)).unwrap();

    // Scene builds up before anyone is connected.
    server
        .define_category(CategoryNameMessage {
            category_id: 2,
            parent_id: 0,
            default_active: true,
            name: "robots".to_string(),
        })
        .unwrap();
    let sphere = SimpleShape::sphere(11, Vector3::new(1.0, 2.0, 3.0), 0.5)
        .with_colour(Colour::rgb(255, 0, 0))
        .with_category(2);
    server.create(&sphere).unwrap();
    // A shape created then destroyed must not be replayed.
    let ghost = SimpleShape::box_shape(12, Vector3::ZERO, Vector3::ONE);
    server.create(&ghost).unwrap();
    server.destroy(&ghost).unwrap();

    let mut viewer = Viewer::connect(&server);
    viewer.pump(&mut server, |packets| {
        packets
            .iter()
            .any(|p| p.routing_id() == routing::SPHERE && p.message_id() == OBJECT_CREATE)
    });

    // First packet on the wire is the bare server info, without a CRC.
    let first = &viewer.packets[0];
    assert_eq!(first.routing_id(), routing::SERVER_INFO);
    assert!(!first.header.has_crc());
    let info = ServerInfoMessage::read(&first.payload).unwrap();
    assert_eq!(info.time_unit_us, 1000);

    let category = viewer
        .packets
        .iter()
        .find(|p| p.routing_id() == routing::CATEGORY)
        .expect("category replayed");
    let category = CategoryNameMessage::read(&category.payload).unwrap();
    assert_eq!(category.name, "robots");

    let create = viewer
        .packets
        .iter()
        .find(|p| p.routing_id() == routing::SPHERE && p.message_id() == OBJECT_CREATE)
        .unwrap();
    let (created, _extra) = read_create_payload(&create.payload).unwrap();
    assert_eq!(created.object_id, 11);
    assert_eq!(created.category, 2);

    // The destroyed box was not replayed as a live shape.
    assert!(!viewer
        .packets
        .iter()
        .any(|p| p.routing_id() == routing::BOX && p.message_id() == OBJECT_CREATE));

    // Frames flowed too.
    assert!(viewer
        .packets
        .iter()
        .any(|p| p.routing_id() == routing::CONTROL && p.message_id() == CONTROL_FRAME));
}

#[test]
fn test_updates_reach_connected_viewer() {
    let mut server = Server::start(test_config(true, false)).unwrap();
    let mut sphere = SimpleShape::sphere(1, Vector3::ZERO, 1.0);
    server.create(&sphere).unwrap();

    let mut viewer = Viewer::connect(&server);
    viewer.pump(&mut server, |packets| {
        packets.iter().any(|p| p.message_id() == OBJECT_CREATE)
    });

    sphere.attributes_mut().translation = Vector3::new(5.0, 0.0, 0.0);
    server.update(&sphere).unwrap();
    viewer.pump(&mut server, |packets| {
        packets
            .iter()
            .any(|p| p.routing_id() == routing::SPHERE && p.message_id() == OBJECT_UPDATE)
    });

    let update = viewer
        .packets
        .iter()
        .find(|p| p.message_id() == OBJECT_UPDATE)
        .unwrap();
    let (id, attributes) = drishti::shapes::read_update_payload(&update.payload).unwrap();
    assert_eq!(id, 1);
    assert_eq!(attributes.translation, Vector3::new(5.0, 0.0, 0.0));
}

#[test]
fn test_resource_transfer_completes_over_socket() {
    // Compressed collation exercises the gzip path end to end.
    let mut server = Server::start(test_config(true, true)).unwrap();
    let resource = ribbon(5, 4000);
    server.create_resource(resource.clone()).unwrap();
    server.finalise_resource(5).unwrap();

    let mut viewer = Viewer::connect(&server);
    viewer.pump(&mut server, |packets| {
        packets
            .iter()
            .any(|p| p.routing_id() == routing::MESH && p.message_id() == MESH_FINALISE)
    });

    let mut accumulator: Option<MeshAccumulator> = None;
    for p in viewer
        .packets
        .iter()
        .filter(|p| p.routing_id() == routing::MESH)
    {
        match p.message_id() {
            MESH_CREATE => {
                let msg = MeshCreateMessage::read(&p.payload).unwrap();
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
    let accumulator = accumulator.expect("mesh create replayed");
    assert!(accumulator.is_complete());
    let rebuilt = accumulator.into_resource();
    assert_eq!(rebuilt.vertices, resource.vertices);
    assert_eq!(rebuilt.indices, resource.indices);
}

#[test]
fn test_disconnected_viewer_is_reaped() {
    let mut server = Server::start(test_config(false, false)).unwrap();
    let mut viewer = Viewer::connect(&server);
    viewer.pump(&mut server, |_| true);

    let deadline = Instant::now() + Duration::from_secs(2);
    while server.connection_count() == 0 {
        server.commit_connections().unwrap();
        server.update_frame(33, true).unwrap();
        assert!(Instant::now() < deadline);
    }
    drop(viewer);

    // Keep broadcasting until the dead socket surfaces as a write error.
    let shape = SimpleShape::sphere(0, Vector3::ZERO, 1.0);
    while server.connection_count() > 0 {
        server.create(&shape).unwrap();
        server.update_frame(33, true).unwrap();
        assert!(Instant::now() < deadline, "viewer never reaped");
    }
}

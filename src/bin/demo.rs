//! Demo host application
//!
//! Serves a small animated scene so a viewer has something to connect to:
//! an orbiting sphere, a pulsing box, and a generated mesh ribbon. Pass a
//! TOML config path to override the defaults.

use drishti::config::ServerConfig;
use drishti::error::Result;
use drishti::maths::{Colour, Vector3};
use drishti::messages::camera::CameraMessage;
use drishti::messages::category::CategoryNameMessage;
use drishti::messages::mesh::Topology;
use drishti::resource::MeshResource;
use drishti::server::Server;
use drishti::shapes::simple::SimpleShape;
use std::env;
use std::thread;
use std::time::Duration;

/// Triangle-strip style ribbon along the X axis
fn ribbon_resource(id: u32, segments: u32) -> MeshResource {
    let mut vertices = Vec::with_capacity((segments as usize + 1) * 2);
    let mut indices = Vec::with_capacity(segments as usize * 6);
    for i in 0..=segments {
        let x = i as f32 * 0.2;
        let y = (x * 1.7).sin() * 0.3;
        vertices.push(Vector3::new(x, y, -0.1));
        vertices.push(Vector3::new(x, y, 0.1));
    }
    for i in 0..segments {
        let base = i * 2;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
    }
    MeshResource::new(id, Topology::Triangles)
        .with_vertices(vertices)
        .with_indices(indices)
        .with_tint(Colour::rgb(64, 200, 120))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match env::args().nth(1) {
        Some(path) => {
            log::info!("Using config: {}", path);
            ServerConfig::from_file(&path)?
        }
        None => ServerConfig::default(),
    };
    let frame_time = config.protocol.default_frame_time;

    let mut server = Server::start(config)?;
    log::info!("scene server ready on {}", server.local_addr());

    server.define_category(CategoryNameMessage {
        category_id: 1,
        parent_id: 0,
        default_active: true,
        name: "demo".to_string(),
    })?;

    server.create_resource(ribbon_resource(1, 40))?;
    server.finalise_resource(1)?;

    let mut sphere = SimpleShape::sphere(1, Vector3::ZERO, 0.5)
        .with_colour(Colour::rgb(230, 90, 40))
        .with_category(1);
    let mut pulse_box = SimpleShape::box_shape(2, Vector3::new(0.0, 0.0, 1.5), Vector3::ONE)
        .with_colour(Colour::rgb(60, 120, 220))
        .with_category(1)
        .wireframe();
    server.create(&sphere)?;
    server.create(&pulse_box)?;

    server.set_camera(&CameraMessage {
        camera_id: 0,
        position: Vector3::new(4.0, -6.0, 3.0),
        direction: Vector3::new(-0.5, 0.75, -0.35),
        up: Vector3::new(0.0, 0.0, 1.0),
        near_clip: 0.1,
        far_clip: 100.0,
        fov_degrees: 60.0,
    })?;

    let mut t = 0.0f32;
    loop {
        server.commit_connections()?;

        t += frame_time as f32 / 1000.0;
        sphere.attributes_mut().translation =
            Vector3::new(2.0 * t.cos(), 2.0 * t.sin(), 0.5);
        pulse_box.attributes_mut().scale = Vector3::splat(1.0 + 0.4 * (3.0 * t).sin());
        server.update(&sphere)?;
        server.update(&pulse_box)?;

        server.update_transfers(256 * 1024)?;
        server.update_frame(frame_time, true)?;
        thread::sleep(Duration::from_millis(u64::from(frame_time)));
    }
}

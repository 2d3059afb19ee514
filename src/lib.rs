//! Drishti - embeddable remote debug visualization server
//!
//! An application links this library, creates a [`Server`], and narrates
//! its internal 3D state (shapes, mesh resources, cameras, categories)
//! while it runs. Remote viewers connect over TCP at any time and receive
//! the current scene followed by the live stream; sessions can also be
//! recorded to a file and played back.
//!
//! ## Features
//!
//! - `null-sink`: make [`DefaultSink`] the no-op [`NullSink`], compiling
//!   the instrumentation calls in a host application down to nothing

pub mod config;
pub mod error;
pub mod maths;
pub mod messages;
pub mod net;
pub mod protocol;
pub mod recorder;
pub mod resource;
pub mod server;
pub mod shapes;
pub mod transfer;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{Error, Result};
pub use maths::{Colour, Quaternion, Vector3};
pub use messages::camera::CameraMessage;
pub use messages::category::CategoryNameMessage;
pub use resource::MeshResource;
pub use server::Server;
pub use shapes::simple::SimpleShape;
pub use shapes::Shape;

/// Scene instrumentation surface
///
/// Host code that should ship with its visualization calls intact writes
/// against this trait instead of [`Server`] directly, then picks the
/// implementation (or [`NullSink`]) at build time.
pub trait SceneSink {
    /// Introduce a shape to the scene
    fn create(&mut self, shape: &dyn Shape) -> Result<()>;

    /// Move or restyle a previously created shape
    fn update(&mut self, shape: &dyn Shape) -> Result<()>;

    /// Remove a shape
    fn destroy(&mut self, shape: &dyn Shape) -> Result<()>;

    /// Suggest a viewpoint to viewers
    fn set_camera(&mut self, camera: &CameraMessage) -> Result<()>;

    /// Name a category
    fn define_category(&mut self, category: CategoryNameMessage) -> Result<()>;

    /// Register a mesh resource
    fn create_resource(&mut self, resource: MeshResource) -> Result<()>;

    /// Mark a resource complete so it streams to viewers
    fn finalise_resource(&mut self, resource_id: u32) -> Result<()>;

    /// Drop a resource
    fn destroy_resource(&mut self, resource_id: u32) -> Result<()>;

    /// Close out a frame
    fn update_frame(&mut self, dt: u32, flush: bool) -> Result<()>;
}

impl SceneSink for Server {
    fn create(&mut self, shape: &dyn Shape) -> Result<()> {
        Server::create(self, shape)
    }

    fn update(&mut self, shape: &dyn Shape) -> Result<()> {
        Server::update(self, shape)
    }

    fn destroy(&mut self, shape: &dyn Shape) -> Result<()> {
        Server::destroy(self, shape)
    }

    fn set_camera(&mut self, camera: &CameraMessage) -> Result<()> {
        Server::set_camera(self, camera)
    }

    fn define_category(&mut self, category: CategoryNameMessage) -> Result<()> {
        Server::define_category(self, category)
    }

    fn create_resource(&mut self, resource: MeshResource) -> Result<()> {
        Server::create_resource(self, resource)
    }

    fn finalise_resource(&mut self, resource_id: u32) -> Result<()> {
        Server::finalise_resource(self, resource_id)
    }

    fn destroy_resource(&mut self, resource_id: u32) -> Result<()> {
        Server::destroy_resource(self, resource_id)
    }

    fn update_frame(&mut self, dt: u32, flush: bool) -> Result<()> {
        Server::update_frame(self, dt, flush)
    }
}

/// No-op sink with the full [`SceneSink`] interface
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NullSink {
    pub fn new() -> Self {
        NullSink
    }
}

impl SceneSink for NullSink {
    fn create(&mut self, _shape: &dyn Shape) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, _shape: &dyn Shape) -> Result<()> {
        Ok(())
    }

    fn destroy(&mut self, _shape: &dyn Shape) -> Result<()> {
        Ok(())
    }

    fn set_camera(&mut self, _camera: &CameraMessage) -> Result<()> {
        Ok(())
    }

    fn define_category(&mut self, _category: CategoryNameMessage) -> Result<()> {
        Ok(())
    }

    fn create_resource(&mut self, _resource: MeshResource) -> Result<()> {
        Ok(())
    }

    fn finalise_resource(&mut self, _resource_id: u32) -> Result<()> {
        Ok(())
    }

    fn destroy_resource(&mut self, _resource_id: u32) -> Result<()> {
        Ok(())
    }

    fn update_frame(&mut self, _dt: u32, _flush: bool) -> Result<()> {
        Ok(())
    }
}

/// Sink type selected by the `null-sink` feature
#[cfg(feature = "null-sink")]
pub type DefaultSink = NullSink;

/// Sink type selected by the `null-sink` feature
#[cfg(not(feature = "null-sink"))]
pub type DefaultSink = Server;

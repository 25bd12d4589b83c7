/// GLT Core Library - Geometry toolkit shared by the viewers
///
/// This library provides the stateless core: vector math, a vertex-welding
/// triangle mesh builder, immediate-mode style vertex batches, procedural
/// solids, TGA/BMP codecs and the camera used to project it all.

pub mod backend;
pub mod batch;
pub mod error;
pub mod image;
pub mod math3d;
pub mod mesh;
pub mod projection;
pub mod shapes;
pub mod transform;

// Re-export commonly used types
pub use backend::{BufferBackend, BufferData, Primitive};
pub use batch::{Batch, BatchBuilder};
pub use error::{GeometryError, ImageError};
pub use image::{Image, PixelFormat};
pub use mesh::{Insertion, MeshBuilder, Triangle, TriangleBatch, Vertex};
pub use projection::{Camera, ProjectionMode, ScreenPoint};
pub use shapes::{
    generate_cube, generate_cylinder, generate_disk, generate_sphere, generate_torus, screen_quad,
};
pub use transform::{RotationState, Transform};

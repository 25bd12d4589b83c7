/// Boundary between CPU-side geometry and whatever owns the GPU buffers
use nalgebra::{Point3, Vector2, Vector3};

/// How consecutive corners are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl Primitive {
    /// Corner triples for `count` corners drawn with this primitive.
    ///
    /// Strips alternate their winding so every triangle keeps the orientation
    /// of the first one. Point and line primitives produce no triangles.
    pub fn triangle_corners(self, count: usize) -> Vec<[usize; 3]> {
        match self {
            Primitive::Triangles => (0..count / 3)
                .map(|t| [t * 3, t * 3 + 1, t * 3 + 2])
                .collect(),
            Primitive::TriangleStrip => (0..count.saturating_sub(2))
                .map(|i| {
                    if i % 2 == 0 {
                        [i, i + 1, i + 2]
                    } else {
                        [i + 1, i, i + 2]
                    }
                })
                .collect(),
            Primitive::TriangleFan => (1..count.saturating_sub(1))
                .map(|i| [0, i, i + 1])
                .collect(),
            Primitive::Points | Primitive::Lines | Primitive::LineLoop | Primitive::LineStrip => {
                Vec::new()
            }
        }
    }
}

/// Borrowed attribute streams for one upload.
///
/// `normals` and `tex_coords` are either empty or as long as `positions`.
/// When `indices` is `None` the positions are drawn in order.
#[derive(Debug, Clone, Copy)]
pub struct BufferData<'a> {
    pub primitive: Primitive,
    pub positions: &'a [Point3<f32>],
    pub normals: &'a [Vector3<f32>],
    pub tex_coords: &'a [Vector2<f32>],
    pub indices: Option<&'a [u16]>,
}

impl BufferData<'_> {
    /// Number of corners a draw call would emit.
    pub fn element_count(&self) -> usize {
        match self.indices {
            Some(indices) => indices.len(),
            None => self.positions.len(),
        }
    }
}

/// Takes ownership of uploaded geometry and hands back an opaque handle.
pub trait BufferBackend {
    type Handle;
    type Error;

    fn upload(&mut self, data: BufferData<'_>) -> Result<Self::Handle, Self::Error>;
}

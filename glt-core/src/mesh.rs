/// Indexed triangle meshes with vertex welding
use nalgebra::{Point3, Vector2, Vector3};
use tracing::debug;

use crate::backend::{BufferBackend, BufferData, Primitive};
use crate::error::GeometryError;
use crate::math3d::{close_enough, normalize_or_keep};

/// Two vertices closer than this on every component are the same vertex.
pub const WELD_EPSILON: f32 = 0.00001;

/// Largest number of distinct vertices a 16-bit index buffer can address.
pub const MAX_INDEXED_VERTICES: usize = u16::MAX as usize + 1;

/// A 3D vertex with position, normal and texture coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
    pub tex_coord: Vector2<f32>,
}

impl Vertex {
    pub fn new(position: Point3<f32>, normal: Vector3<f32>, tex_coord: Vector2<f32>) -> Self {
        Self {
            position,
            normal,
            tex_coord,
        }
    }

    /// Component-wise comparison of all eight attributes against `epsilon`.
    pub fn close_enough(&self, other: &Vertex, epsilon: f32) -> bool {
        self.position
            .coords
            .iter()
            .zip(other.position.coords.iter())
            .chain(self.normal.iter().zip(other.normal.iter()))
            .chain(self.tex_coord.iter().zip(other.tex_coord.iter()))
            .all(|(a, b)| close_enough(*a, *b, epsilon))
    }
}

/// A triangle face defined by three vertices
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
}

impl Triangle {
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    /// Unnormalized face normal following counter-clockwise winding.
    ///
    /// Its length is twice the triangle's area, so degenerate faces give a
    /// (near) zero vector.
    pub fn face_normal(&self) -> Vector3<f32> {
        let v0 = self.vertices[0].position;
        let v1 = self.vertices[1].position;
        let v2 = self.vertices[2].position;

        (v1 - v0).cross(&(v2 - v0))
    }

    pub fn area(&self) -> f32 {
        self.face_normal().norm() * 0.5
    }
}

/// What happened to the corners of one submitted triangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Insertion {
    /// All three corners were stored; `welded` of them reused an existing vertex.
    Stored { welded: u8 },
    /// The staging buffers were full and `dropped` corners were skipped.
    Overflow { dropped: u8 },
}

impl Insertion {
    pub fn is_stored(&self) -> bool {
        matches!(self, Insertion::Stored { .. })
    }
}

/// Accumulates triangles, welding corners that match an earlier vertex.
///
/// Staging storage is sized once by [`MeshBuilder::begin`]: at most three
/// indices per declared triangle, and never more vertices than a `u16` index
/// can reach. Corners that do not fit are skipped rather than reallocating.
/// [`MeshBuilder::end`] consumes the builder and returns the compacted
/// [`TriangleBatch`].
#[derive(Debug, Clone)]
pub struct MeshBuilder {
    vertices: Vec<Vertex>,
    indices: Vec<u16>,
    max_indices: usize,
    max_vertices: usize,
}

impl MeshBuilder {
    pub fn new(max_triangles: usize) -> Result<Self, GeometryError> {
        let mut builder = Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            max_indices: 0,
            max_vertices: 0,
        };
        builder.begin(max_triangles)?;
        Ok(builder)
    }

    /// Start over with room for `max_triangles`, discarding anything staged so far.
    pub fn begin(&mut self, max_triangles: usize) -> Result<(), GeometryError> {
        if max_triangles == 0 {
            return Err(GeometryError::ZeroCapacity);
        }

        self.max_indices = max_triangles.saturating_mul(3);
        self.max_vertices = self.max_indices.min(MAX_INDEXED_VERTICES);
        self.vertices = Vec::with_capacity(self.max_vertices);
        // Indices grow on demand past this; `max_indices` is only a cap
        self.indices = Vec::with_capacity(self.max_indices.min(MAX_INDEXED_VERTICES));

        debug!(
            max_triangles,
            max_vertices = self.max_vertices,
            "mesh builder begun"
        );
        Ok(())
    }

    /// Add one triangle, normalizing its normals and welding duplicate corners.
    pub fn add_triangle(
        &mut self,
        positions: [Point3<f32>; 3],
        normals: [Vector3<f32>; 3],
        tex_coords: [Vector2<f32>; 3],
    ) -> Insertion {
        let mut welded = 0u8;
        let mut dropped = 0u8;

        for corner in 0..3 {
            let vertex = Vertex::new(
                positions[corner],
                normalize_or_keep(normals[corner]),
                tex_coords[corner],
            );

            if self.indices.len() >= self.max_indices {
                dropped += 1;
                continue;
            }

            match self.find(&vertex) {
                Some(index) => {
                    self.indices.push(index);
                    welded += 1;
                }
                None if self.vertices.len() < self.max_vertices => {
                    // max_vertices never exceeds the u16 range
                    self.indices.push(self.vertices.len() as u16);
                    self.vertices.push(vertex);
                }
                None => dropped += 1,
            }
        }

        if dropped == 0 {
            Insertion::Stored { welded }
        } else {
            Insertion::Overflow { dropped }
        }
    }

    fn find(&self, vertex: &Vertex) -> Option<u16> {
        self.vertices
            .iter()
            .position(|existing| existing.close_enough(vertex, WELD_EPSILON))
            .map(|index| index as u16)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Number of indices the staging buffers can hold.
    pub fn capacity(&self) -> usize {
        self.max_indices
    }

    /// Compact the staged arrays into an immutable batch.
    pub fn end(self) -> TriangleBatch {
        let mut positions = Vec::with_capacity(self.vertices.len());
        let mut normals = Vec::with_capacity(self.vertices.len());
        let mut tex_coords = Vec::with_capacity(self.vertices.len());
        for vertex in &self.vertices {
            positions.push(vertex.position);
            normals.push(vertex.normal);
            tex_coords.push(vertex.tex_coord);
        }

        let mut indices = self.indices;
        indices.shrink_to_fit();

        debug!(
            vertices = positions.len(),
            indices = indices.len(),
            "mesh builder finalized"
        );

        TriangleBatch {
            positions,
            normals,
            tex_coords,
            indices,
        }
    }
}

/// Finalized indexed triangle list, ready to hand to a [`BufferBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleBatch {
    positions: Vec<Point3<f32>>,
    normals: Vec<Vector3<f32>>,
    tex_coords: Vec<Vector2<f32>>,
    indices: Vec<u16>,
}

impl TriangleBatch {
    pub fn positions(&self) -> &[Point3<f32>] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vector3<f32>] {
        &self.normals
    }

    pub fn tex_coords(&self) -> &[Vector2<f32>] {
        &self.tex_coords
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Expanded vertex at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`TriangleBatch::vertex_count`]. Every
    /// entry of [`TriangleBatch::indices`] satisfies this.
    pub fn vertex(&self, index: u16) -> Vertex {
        let i = index as usize;
        Vertex::new(self.positions[i], self.normals[i], self.tex_coords[i])
    }

    /// Triangles in submission order, with welded vertices expanded.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.indices.chunks_exact(3).map(move |corners| {
            Triangle::new(
                self.vertex(corners[0]),
                self.vertex(corners[1]),
                self.vertex(corners[2]),
            )
        })
    }

    pub fn buffer_data(&self) -> BufferData<'_> {
        BufferData {
            primitive: Primitive::Triangles,
            positions: &self.positions,
            normals: &self.normals,
            tex_coords: &self.tex_coords,
            indices: Some(&self.indices),
        }
    }

    pub fn upload<B: BufferBackend>(&self, backend: &mut B) -> Result<B::Handle, B::Error> {
        backend.upload(self.buffer_data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corners(offset: f32) -> [Point3<f32>; 3] {
        [
            Point3::new(offset, 0.0, 0.0),
            Point3::new(offset + 1.0, 0.0, 0.0),
            Point3::new(offset, 1.0, 0.0),
        ]
    }

    fn up() -> [Vector3<f32>; 3] {
        [Vector3::z(); 3]
    }

    fn uvs() -> [Vector2<f32>; 3] {
        [
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
        ]
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(MeshBuilder::new(0).unwrap_err(), GeometryError::ZeroCapacity);
    }

    #[test]
    fn test_distinct_triangles_append() {
        let mut builder = MeshBuilder::new(4).unwrap();
        assert_eq!(builder.capacity(), 12);

        let first = builder.add_triangle(corners(0.0), up(), uvs());
        let second = builder.add_triangle(corners(5.0), up(), uvs());
        assert_eq!(first, Insertion::Stored { welded: 0 });
        assert_eq!(second, Insertion::Stored { welded: 0 });
        assert_eq!(builder.vertex_count(), 6);
        assert_eq!(builder.index_count(), 6);
    }

    #[test]
    fn test_shared_corners_weld() {
        let mut builder = MeshBuilder::new(2).unwrap();
        let _ = builder.add_triangle(corners(0.0), up(), uvs());

        // Second triangle shares the 1st and 3rd corners of the first one
        let positions = [
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let tex = [
            Vector2::new(1.0, 0.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(0.0, 1.0),
        ];
        let result = builder.add_triangle(positions, up(), tex);

        assert_eq!(result, Insertion::Stored { welded: 2 });
        assert_eq!(builder.vertex_count(), 4);
        assert_eq!(builder.index_count(), 6);

        let batch = builder.end();
        assert_eq!(batch.indices(), &[0, 1, 2, 1, 3, 2]);
    }

    #[test]
    fn test_weld_within_epsilon_only() {
        let mut builder = MeshBuilder::new(2).unwrap();
        let _ = builder.add_triangle(corners(0.0), up(), uvs());

        let mut near = corners(0.0);
        near[0].x += WELD_EPSILON * 0.5;
        near[1].x += WELD_EPSILON * 2.0;
        let result = builder.add_triangle(near, up(), uvs());

        assert_eq!(result, Insertion::Stored { welded: 2 });
        assert_eq!(builder.vertex_count(), 4);
    }

    #[test]
    fn test_differing_uv_does_not_weld() {
        let mut builder = MeshBuilder::new(2).unwrap();
        let _ = builder.add_triangle(corners(0.0), up(), uvs());
        let shifted = uvs().map(|uv| uv + Vector2::new(0.5, 0.0));
        let _ = builder.add_triangle(corners(0.0), up(), shifted);
        assert_eq!(builder.vertex_count(), 6);
    }

    #[test]
    fn test_normals_are_normalized() {
        let mut builder = MeshBuilder::new(1).unwrap();
        let long = [Vector3::new(0.0, 0.0, 10.0); 3];
        let _ = builder.add_triangle(corners(0.0), long, uvs());
        let batch = builder.end();
        for normal in batch.normals() {
            assert!((normal - Vector3::z()).norm() < 1e-6);
        }
    }

    #[test]
    fn test_zero_normal_stays_finite() {
        let mut builder = MeshBuilder::new(1).unwrap();
        let _ = builder.add_triangle(corners(0.0), [Vector3::zeros(); 3], uvs());
        let batch = builder.end();
        assert!(batch.normals().iter().all(|n| n.iter().all(|c| c.is_finite())));
    }

    #[test]
    fn test_capacity_exceeded_truncates() {
        let mut builder = MeshBuilder::new(1).unwrap();
        let first = builder.add_triangle(corners(0.0), up(), uvs());
        let second = builder.add_triangle(corners(3.0), up(), uvs());

        assert!(first.is_stored());
        assert_eq!(second, Insertion::Overflow { dropped: 3 });
        assert!(builder.vertex_count() <= 3);
        assert_eq!(builder.index_count(), 3);
    }

    #[test]
    fn test_capacity_applies_to_welded_corners() {
        let mut builder = MeshBuilder::new(1).unwrap();
        let _ = builder.add_triangle(corners(0.0), up(), uvs());
        let repeat = builder.add_triangle(corners(0.0), up(), uvs());

        assert_eq!(repeat, Insertion::Overflow { dropped: 3 });
        assert_eq!(builder.index_count(), 3);
    }

    #[test]
    #[should_panic]
    fn test_vertex_past_end_panics() {
        let mut builder = MeshBuilder::new(1).unwrap();
        let _ = builder.add_triangle(corners(0.0), up(), uvs());
        let batch = builder.end();
        let _ = batch.vertex(3);
    }

    #[test]
    fn test_huge_capacity_does_not_preallocate() {
        let mut builder = MeshBuilder::new(usize::MAX / 4).unwrap();
        assert_eq!(builder.capacity(), (usize::MAX / 4) * 3);

        let first = builder.add_triangle(corners(0.0), up(), uvs());
        assert_eq!(first, Insertion::Stored { welded: 0 });
        assert_eq!(builder.index_count(), 3);

        builder.begin(usize::MAX).unwrap();
        assert_eq!(builder.capacity(), usize::MAX);
    }

    #[test]
    fn test_begin_discards_staged_state() {
        let mut builder = MeshBuilder::new(2).unwrap();
        let _ = builder.add_triangle(corners(0.0), up(), uvs());
        builder.begin(5).unwrap();

        assert_eq!(builder.vertex_count(), 0);
        assert_eq!(builder.index_count(), 0);
        assert_eq!(builder.capacity(), 15);
    }

    #[test]
    fn test_end_compacts_and_indexes_in_range() {
        let mut builder = MeshBuilder::new(100).unwrap();
        let _ = builder.add_triangle(corners(0.0), up(), uvs());
        let batch = builder.end();

        assert_eq!(batch.vertex_count(), 3);
        assert_eq!(batch.triangle_count(), 1);
        assert!(batch
            .indices()
            .iter()
            .all(|&i| (i as usize) < batch.vertex_count()));

        let triangle = batch.triangles().next().unwrap();
        assert!((triangle.area() - 0.5).abs() < 1e-6);
        assert!(triangle.face_normal().z > 0.0);
    }
}

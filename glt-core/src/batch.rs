/// Immediate-mode style vertex batches
///
/// A [`BatchBuilder`] is told up front how many vertices it will receive and
/// then fed one attribute at a time, the way `glBegin`/`glEnd` code is written:
/// set the normal, color and texture coordinates of the next vertex, then emit
/// its position. Nothing is deduplicated; see [`crate::mesh::MeshBuilder`] for that.
use nalgebra::{Point3, Vector2, Vector3, Vector4};

use crate::backend::{BufferBackend, BufferData, Primitive};
use crate::mesh::{Triangle, Vertex};

/// Texture units beyond this are clamped away.
pub const MAX_TEXTURE_UNITS: usize = 4;

#[derive(Debug, Clone)]
pub struct BatchBuilder {
    primitive: Primitive,
    capacity: usize,
    cursor: usize,
    vertex_len: usize,
    positions: Option<Vec<Point3<f32>>>,
    normals: Option<Vec<Vector3<f32>>>,
    colors: Option<Vec<Vector4<f32>>>,
    tex_coords: Vec<Option<Vec<Vector2<f32>>>>,
}

fn slot<T: Clone>(array: &mut Option<Vec<T>>, capacity: usize, zero: T) -> &mut Vec<T> {
    array.get_or_insert_with(|| vec![zero; capacity])
}

fn copy_into<T: Clone>(array: &mut Option<Vec<T>>, capacity: usize, zero: T, data: &[T]) -> usize {
    let target = slot(array, capacity, zero);
    let count = data.len().min(capacity);
    target[..count].clone_from_slice(&data[..count]);
    count
}

impl BatchBuilder {
    /// Start a batch of `vertex_count` vertices with up to four texture units.
    pub fn begin(primitive: Primitive, vertex_count: usize, texture_units: usize) -> Self {
        let texture_units = texture_units.min(MAX_TEXTURE_UNITS);
        Self {
            primitive,
            capacity: vertex_count,
            cursor: 0,
            vertex_len: 0,
            positions: None,
            normals: None,
            colors: None,
            tex_coords: vec![None; texture_units],
        }
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn texture_units(&self) -> usize {
        self.tex_coords.len()
    }

    /// Vertices emitted so far.
    pub fn len(&self) -> usize {
        self.vertex_len
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_len == 0
    }

    /// Emit a vertex. Attributes set since the previous vertex belong to it.
    ///
    /// Vertices past the declared count are ignored.
    pub fn vertex(&mut self, x: f32, y: f32, z: f32) {
        let positions = slot(&mut self.positions, self.capacity, Point3::origin());
        if self.cursor >= self.capacity {
            return;
        }
        positions[self.cursor] = Point3::new(x, y, z);
        self.cursor += 1;
        self.vertex_len = self.vertex_len.max(self.cursor);
    }

    pub fn vertex_v(&mut self, position: &Point3<f32>) {
        self.vertex(position.x, position.y, position.z);
    }

    /// Normal of the next vertex. Unlike fixed-function GL it is not sticky:
    /// every vertex needs its own.
    pub fn normal(&mut self, x: f32, y: f32, z: f32) {
        let normals = slot(&mut self.normals, self.capacity, Vector3::zeros());
        if let Some(n) = normals.get_mut(self.cursor) {
            *n = Vector3::new(x, y, z);
        }
    }

    pub fn normal_v(&mut self, normal: &Vector3<f32>) {
        self.normal(normal.x, normal.y, normal.z);
    }

    pub fn color(&mut self, r: f32, g: f32, b: f32, a: f32) {
        let colors = slot(&mut self.colors, self.capacity, Vector4::zeros());
        if let Some(c) = colors.get_mut(self.cursor) {
            *c = Vector4::new(r, g, b, a);
        }
    }

    pub fn color_v(&mut self, color: &Vector4<f32>) {
        self.color(color.x, color.y, color.z, color.w);
    }

    /// Texture coordinate of the next vertex on `unit`. Unknown units are ignored.
    pub fn tex_coord(&mut self, unit: usize, s: f32, t: f32) {
        let capacity = self.capacity;
        let cursor = self.cursor;
        if let Some(array) = self.tex_coords.get_mut(unit) {
            let coords = slot(array, capacity, Vector2::zeros());
            if let Some(c) = coords.get_mut(cursor) {
                *c = Vector2::new(s, t);
            }
        }
    }

    pub fn tex_coord_v(&mut self, unit: usize, coord: &Vector2<f32>) {
        self.tex_coord(unit, coord.x, coord.y);
    }

    /// Replace every position at once. Extra data beyond the declared count is dropped.
    pub fn copy_vertex_data(&mut self, data: &[Point3<f32>]) {
        let count = copy_into(&mut self.positions, self.capacity, Point3::origin(), data);
        self.vertex_len = self.vertex_len.max(count);
    }

    pub fn copy_normal_data(&mut self, data: &[Vector3<f32>]) {
        copy_into(&mut self.normals, self.capacity, Vector3::zeros(), data);
    }

    pub fn copy_color_data(&mut self, data: &[Vector4<f32>]) {
        copy_into(&mut self.colors, self.capacity, Vector4::zeros(), data);
    }

    pub fn copy_tex_coord_data(&mut self, unit: usize, data: &[Vector2<f32>]) {
        let capacity = self.capacity;
        if let Some(array) = self.tex_coords.get_mut(unit) {
            copy_into(array, capacity, Vector2::zeros(), data);
        }
    }

    /// Rewind to the first vertex, keeping the allocated arrays.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.vertex_len = 0;
    }

    pub fn end(self) -> Batch {
        let len = self.vertex_len;
        Batch {
            primitive: self.primitive,
            positions: truncated(self.positions, len).unwrap_or_default(),
            normals: truncated(self.normals, len),
            colors: truncated(self.colors, len),
            tex_coords: self
                .tex_coords
                .into_iter()
                .map(|unit| truncated(unit, len))
                .collect(),
        }
    }
}

fn truncated<T>(array: Option<Vec<T>>, len: usize) -> Option<Vec<T>> {
    array.map(|mut values| {
        values.truncate(len);
        values
    })
}

/// Finalized flat vertex batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    primitive: Primitive,
    positions: Vec<Point3<f32>>,
    normals: Option<Vec<Vector3<f32>>>,
    colors: Option<Vec<Vector4<f32>>>,
    tex_coords: Vec<Option<Vec<Vector2<f32>>>>,
}

impl Batch {
    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Point3<f32>] {
        &self.positions
    }

    pub fn normals(&self) -> Option<&[Vector3<f32>]> {
        self.normals.as_deref()
    }

    pub fn colors(&self) -> Option<&[Vector4<f32>]> {
        self.colors.as_deref()
    }

    pub fn tex_coords(&self, unit: usize) -> Option<&[Vector2<f32>]> {
        self.tex_coords.get(unit).and_then(|coords| coords.as_deref())
    }

    /// Vertex `i` with missing attributes filled with zeros. Texture
    /// coordinates come from unit 0.
    ///
    /// # Panics
    ///
    /// Panics if `i` is not below [`Batch::vertex_count`].
    pub fn vertex(&self, i: usize) -> Vertex {
        let normal = self
            .normals()
            .map(|n| n[i])
            .unwrap_or_else(Vector3::zeros);
        let tex_coord = self
            .tex_coords(0)
            .map(|t| t[i])
            .unwrap_or_else(Vector2::zeros);
        Vertex::new(self.positions[i], normal, tex_coord)
    }

    /// Triangles assembled according to the batch's primitive.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.primitive
            .triangle_corners(self.positions.len())
            .into_iter()
            .map(move |[a, b, c]| Triangle::new(self.vertex(a), self.vertex(b), self.vertex(c)))
    }

    pub fn buffer_data(&self) -> BufferData<'_> {
        BufferData {
            primitive: self.primitive,
            positions: &self.positions,
            normals: self.normals().unwrap_or(&[]),
            tex_coords: self.tex_coords(0).unwrap_or(&[]),
            indices: None,
        }
    }

    pub fn upload<B: BufferBackend>(&self, backend: &mut B) -> Result<B::Handle, B::Error> {
        backend.upload(self.buffer_data())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_attach_to_next_vertex() {
        let mut builder = BatchBuilder::begin(Primitive::Triangles, 3, 1);
        builder.normal(0.0, 0.0, 1.0);
        builder.tex_coord(0, 0.25, 0.75);
        builder.vertex(1.0, 2.0, 3.0);
        builder.normal(0.0, 1.0, 0.0);
        builder.vertex(4.0, 5.0, 6.0);
        builder.vertex(7.0, 8.0, 9.0);

        let batch = builder.end();
        assert_eq!(batch.vertex_count(), 3);
        let normals = batch.normals().unwrap();
        assert_eq!(normals[0], Vector3::z());
        assert_eq!(normals[1], Vector3::y());
        assert_eq!(normals[2], Vector3::zeros());
        assert_eq!(batch.tex_coords(0).unwrap()[0], Vector2::new(0.25, 0.75));
        assert_eq!(batch.positions()[2], Point3::new(7.0, 8.0, 9.0));
    }

    #[test]
    fn test_overflow_is_ignored() {
        let mut builder = BatchBuilder::begin(Primitive::Points, 2, 0);
        for i in 0..5 {
            builder.normal(0.0, 0.0, 1.0);
            builder.vertex(i as f32, 0.0, 0.0);
        }
        let batch = builder.end();
        assert_eq!(batch.vertex_count(), 2);
        assert_eq!(batch.positions()[1], Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_texture_units_clamped() {
        let mut builder = BatchBuilder::begin(Primitive::Triangles, 3, 9);
        assert_eq!(builder.texture_units(), MAX_TEXTURE_UNITS);
        builder.tex_coord(7, 1.0, 1.0);
        builder.vertex(0.0, 0.0, 0.0);
        let batch = builder.end();
        assert!(batch.tex_coords(7).is_none());
        assert!(batch.tex_coords(0).is_none());
    }

    #[test]
    fn test_unwritten_attributes_absent() {
        let mut builder = BatchBuilder::begin(Primitive::Triangles, 3, 1);
        builder.vertex(0.0, 0.0, 0.0);
        let batch = builder.end();
        assert!(batch.normals().is_none());
        assert!(batch.colors().is_none());
        assert!(batch.buffer_data().normals.is_empty());
    }

    #[test]
    fn test_block_copy_and_reset() {
        let mut builder = BatchBuilder::begin(Primitive::TriangleStrip, 4, 1);
        let quad = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(9.0, 9.0, 9.0),
        ];
        builder.copy_vertex_data(&quad);
        builder.copy_color_data(&[Vector4::new(1.0, 0.0, 0.0, 1.0); 4]);
        assert_eq!(builder.len(), 4);

        builder.reset();
        assert!(builder.is_empty());
        builder.vertex(5.0, 5.0, 5.0);
        let batch = builder.end();
        assert_eq!(batch.vertex_count(), 1);
        assert_eq!(batch.colors().unwrap()[0], Vector4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_strip_triangles_keep_orientation() {
        let mut builder = BatchBuilder::begin(Primitive::TriangleStrip, 4, 0);
        builder.vertex(0.0, 0.0, 0.0);
        builder.vertex(1.0, 0.0, 0.0);
        builder.vertex(0.0, 1.0, 0.0);
        builder.vertex(1.0, 1.0, 0.0);
        let batch = builder.end();

        let triangles: Vec<_> = batch.triangles().collect();
        assert_eq!(triangles.len(), 2);
        assert!(triangles.iter().all(|t| t.face_normal().z > 0.0));
    }

    #[test]
    #[should_panic]
    fn test_vertex_past_end_panics() {
        let mut builder = BatchBuilder::begin(Primitive::Points, 1, 0);
        builder.vertex(0.0, 0.0, 0.0);
        let _ = builder.end().vertex(1);
    }
}

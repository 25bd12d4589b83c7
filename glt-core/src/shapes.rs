/// Procedural solids
///
/// Each generator walks a two-parameter grid over the surface. Every grid
/// cell is a patch of four corners with analytic positions, normals and
/// texture coordinates, split along one diagonal into two counter-clockwise
/// triangles and fed through a [`MeshBuilder`]. The cube is the exception and
/// comes out as a flat 36-vertex [`Batch`].
use std::f32::consts::PI;

use nalgebra::{Matrix4, Point3, Vector2, Vector3};
use tracing::{debug, warn};

use crate::backend::Primitive;
use crate::batch::{Batch, BatchBuilder};
use crate::error::GeometryError;
use crate::math3d::{close_enough, normalize_or_keep, orthographic_matrix};
use crate::mesh::{Insertion, MeshBuilder, TriangleBatch, Vertex, WELD_EPSILON};

/// Fewest slices that still enclose a volume.
pub const MIN_SLICES: u32 = 3;

pub const MIN_STACKS: u32 = 1;

fn check_positive(name: &'static str, value: f32) -> Result<(), GeometryError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(GeometryError::invalid(name, value, "must be positive and finite"));
    }
    Ok(())
}

fn check_non_negative(name: &'static str, value: f32) -> Result<(), GeometryError> {
    if !value.is_finite() || value < 0.0 {
        return Err(GeometryError::invalid(name, value, "must be non-negative and finite"));
    }
    Ok(())
}

fn check_tessellation(
    slices_name: &'static str,
    slices: u32,
    stacks_name: &'static str,
    stacks: u32,
) -> Result<(), GeometryError> {
    if slices < MIN_SLICES {
        return Err(GeometryError::invalid(slices_name, slices, "needs at least 3 subdivisions"));
    }
    if stacks < MIN_STACKS {
        return Err(GeometryError::invalid(stacks_name, stacks, "needs at least 1 subdivision"));
    }
    Ok(())
}

/// Streams patches into a builder and keeps count of corners that did not fit.
struct PatchWriter {
    builder: MeshBuilder,
    dropped: usize,
}

impl PatchWriter {
    fn new(slices: u32, stacks: u32) -> Result<Self, GeometryError> {
        let triangles = slices as usize * stacks as usize * 2;
        Ok(Self {
            builder: MeshBuilder::new(triangles)?,
            dropped: 0,
        })
    }

    fn triangle(&mut self, a: &Vertex, b: &Vertex, c: &Vertex) {
        let insertion = self.builder.add_triangle(
            [a.position, b.position, c.position],
            [a.normal, b.normal, c.normal],
            [a.tex_coord, b.tex_coord, c.tex_coord],
        );
        if let Insertion::Overflow { dropped } = insertion {
            self.dropped += dropped as usize;
        }
    }

    /// Corners 0 and 3 are opposite; the shared edge runs from 1 to 2.
    fn patch(&mut self, corners: &[Vertex; 4]) {
        self.triangle(&corners[0], &corners[1], &corners[2]);
        self.triangle(&corners[1], &corners[3], &corners[2]);
    }

    fn finish(self, solid: &'static str) -> TriangleBatch {
        if self.dropped > 0 {
            warn!(solid, dropped = self.dropped, "mesh capacity exceeded, corners skipped");
        }
        let batch = self.builder.end();
        debug!(
            solid,
            vertices = batch.vertex_count(),
            triangles = batch.triangle_count(),
            "solid generated"
        );
        batch
    }
}

/// Sphere centered at the origin with its poles on the z axis.
///
/// Pole bands use the same quad split as every other band (no triangle fan),
/// which keeps texture seams out of the caps at the cost of one degenerate
/// triangle per pole patch.
pub fn generate_sphere(radius: f32, slices: u32, stacks: u32) -> Result<TriangleBatch, GeometryError> {
    check_positive("radius", radius)?;
    check_tessellation("slices", slices, "stacks", stacks)?;

    let drho = PI / stacks as f32;
    let dtheta = 2.0 * PI / slices as f32;

    let corner = |theta: f32, rho: f32, s: f32, t: f32| {
        let (srho, crho) = rho.sin_cos();
        let normal = Vector3::new(-theta.sin() * srho, theta.cos() * srho, crho);
        Vertex::new(Point3::from(normal * radius), normal, Vector2::new(s, t))
    };

    let mut writer = PatchWriter::new(slices, stacks)?;
    for i in 0..stacks {
        let rho = i as f32 * drho;
        let rho_next = rho + drho;
        let t = 1.0 - i as f32 / stacks as f32;
        let t_next = 1.0 - (i + 1) as f32 / stacks as f32;

        for j in 0..slices {
            let theta = j as f32 * dtheta;
            // Close the seam on exactly the starting meridian
            let theta_next = if j + 1 == slices { 0.0 } else { (j + 1) as f32 * dtheta };
            let s = j as f32 / slices as f32;
            let s_next = (j + 1) as f32 / slices as f32;

            writer.patch(&[
                corner(theta, rho, s, t),
                corner(theta, rho_next, s, t_next),
                corner(theta_next, rho, s_next, t),
                corner(theta_next, rho_next, s_next, t_next),
            ]);
        }
    }

    Ok(writer.finish("sphere"))
}

/// Torus lying in the xy plane around the z axis.
pub fn generate_torus(
    major_radius: f32,
    minor_radius: f32,
    num_major: u32,
    num_minor: u32,
) -> Result<TriangleBatch, GeometryError> {
    check_positive("major radius", major_radius)?;
    check_positive("minor radius", minor_radius)?;
    check_tessellation("major subdivisions", num_major, "minor subdivisions", num_minor)?;

    let major_step = 2.0 * PI / num_major as f32;
    let minor_step = 2.0 * PI / num_minor as f32;

    // (x, y) is the unit direction of the tube center, b the angle around the tube
    let corner = |x: f32, y: f32, b: f32, u: f32, v: f32| {
        let (sb, c) = b.sin_cos();
        let r = minor_radius * c + major_radius;
        let z = minor_radius * sb;
        let normal = normalize_or_keep(Vector3::new(x * c, y * c, z / minor_radius));
        Vertex::new(Point3::new(x * r, y * r, z), normal, Vector2::new(u, v))
    };

    let mut writer = PatchWriter::new(num_major, num_minor)?;
    for i in 0..num_major {
        let a0 = i as f32 * major_step;
        let a1 = a0 + major_step;
        let (y0, x0) = a0.sin_cos();
        let (y1, x1) = a1.sin_cos();
        let u0 = i as f32 / num_major as f32;
        let u1 = (i + 1) as f32 / num_major as f32;

        for j in 0..num_minor {
            let b0 = j as f32 * minor_step;
            let b1 = (j + 1) as f32 * minor_step;
            let v0 = j as f32 / num_minor as f32;
            let v1 = (j + 1) as f32 / num_minor as f32;

            writer.patch(&[
                corner(x0, y0, b0, u0, v0),
                corner(x1, y1, b0, u1, v0),
                corner(x0, y0, b1, u0, v1),
                corner(x1, y1, b1, u1, v1),
            ]);
        }
    }

    Ok(writer.finish("torus"))
}

/// Outward normal of a cylinder wall point, or `None` on the axis where the
/// radial direction is undefined.
///
/// This is the true surface normal `(cos, sin, slope)`. It deliberately
/// differs from the older `normalize(r * cos, r * sin, base - top)` form,
/// whose tilt changes with the ring radius and is wrong along cone walls.
fn wall_normal(position: &Point3<f32>, radius: f32, slope: f32) -> Option<Vector3<f32>> {
    if close_enough(radius, 0.0, WELD_EPSILON) {
        return None;
    }
    Some(normalize_or_keep(Vector3::new(
        position.x / radius,
        position.y / radius,
        slope,
    )))
}

/// Open cylinder or cone along +z, from `base_radius` at z = 0 to
/// `top_radius` at z = `length`. One of the radii may be zero.
pub fn generate_cylinder(
    base_radius: f32,
    top_radius: f32,
    length: f32,
    slices: u32,
    stacks: u32,
) -> Result<TriangleBatch, GeometryError> {
    check_non_negative("base radius", base_radius)?;
    check_non_negative("top radius", top_radius)?;
    if base_radius.max(top_radius) <= 0.0 {
        return Err(GeometryError::invalid(
            "base radius",
            base_radius,
            "base and top radius cannot both be zero",
        ));
    }
    check_positive("length", length)?;
    check_tessellation("slices", slices, "stacks", stacks)?;

    let radius_step = (top_radius - base_radius) / stacks as f32;
    let z_step = length / stacks as f32;
    let slice_step = 2.0 * PI / slices as f32;
    // Normal tilt per unit of radial direction: rise over run of the wall
    let slope = (base_radius - top_radius) / length;

    let mut writer = PatchWriter::new(slices, stacks)?;
    for i in 0..stacks {
        let t = i as f32 / stacks as f32;
        let t_next = (i + 1) as f32 / stacks as f32;
        let current_radius = base_radius + radius_step * i as f32;
        let next_radius = base_radius + radius_step * (i + 1) as f32;
        let current_z = z_step * i as f32;
        let next_z = z_step * (i + 1) as f32;

        for j in 0..slices {
            let s = j as f32 / slices as f32;
            let s_next = (j + 1) as f32 / slices as f32;
            let theta = slice_step * j as f32;
            let theta_next = if j + 1 == slices { 0.0 } else { slice_step * (j + 1) as f32 };

            let column = |angle: f32, s: f32| {
                let (sin, cos) = angle.sin_cos();
                let current = Point3::new(cos * current_radius, sin * current_radius, current_z);
                let next = Point3::new(cos * next_radius, sin * next_radius, next_z);

                // At a cone tip borrow the normal of the ring below (or above)
                let (current_normal, next_normal) = match (
                    wall_normal(&current, current_radius, slope),
                    wall_normal(&next, next_radius, slope),
                ) {
                    (Some(c), Some(n)) => (c, n),
                    (Some(c), None) => (c, c),
                    (None, Some(n)) => (n, n),
                    (None, None) => (Vector3::z(), Vector3::z()),
                };

                (
                    Vertex::new(current, current_normal, Vector2::new(s, t)),
                    Vertex::new(next, next_normal, Vector2::new(s, t_next)),
                )
            };

            let (current, next) = column(theta, s);
            let (current_next, next_next) = column(theta_next, s_next);
            writer.patch(&[next, current, next_next, current_next]);
        }
    }

    Ok(writer.finish("cylinder"))
}

/// Flat annulus in the xy plane facing +z. An inner radius of zero gives a
/// full disk.
pub fn generate_disk(
    inner_radius: f32,
    outer_radius: f32,
    slices: u32,
    stacks: u32,
) -> Result<TriangleBatch, GeometryError> {
    check_non_negative("inner radius", inner_radius)?;
    check_positive("outer radius", outer_radius)?;
    if inner_radius >= outer_radius {
        return Err(GeometryError::invalid(
            "inner radius",
            inner_radius,
            "must be smaller than the outer radius",
        ));
    }
    check_tessellation("slices", slices, "stacks", stacks)?;

    let radial_step = (outer_radius - inner_radius) / stacks as f32;
    let slice_step = 2.0 * PI / slices as f32;
    let radial_scale = 1.0 / outer_radius;

    // Texture space maps the outer circle onto the unit square
    let corner = |angle: f32, radius: f32| {
        let (sin, cos) = angle.sin_cos();
        let position = Point3::new(cos * radius, sin * radius, 0.0);
        let tex_coord = Vector2::new(
            (position.x * radial_scale + 1.0) * 0.5,
            (position.y * radial_scale + 1.0) * 0.5,
        );
        Vertex::new(position, Vector3::z(), tex_coord)
    };

    let mut writer = PatchWriter::new(slices, stacks)?;
    for i in 0..stacks {
        let inner = inner_radius + radial_step * i as f32;
        let outer = inner_radius + radial_step * (i + 1) as f32;

        for j in 0..slices {
            let theta = slice_step * j as f32;
            let theta_next = if j + 1 == slices { 0.0 } else { slice_step * (j + 1) as f32 };

            writer.patch(&[
                corner(theta, inner),
                corner(theta, outer),
                corner(theta_next, inner),
                corner(theta_next, outer),
            ]);
        }
    }

    Ok(writer.finish("disk"))
}

/// One cube face: its normal and six (uv, position) corners, both scaled
/// by the half extent.
type Face = ([f32; 3], [([f32; 2], [f32; 3]); 6]);

#[rustfmt::skip]
const CUBE_FACES: [Face; 6] = [
    // Top
    ([0.0, 1.0, 0.0], [
        ([1.0, 1.0], [1.0, 1.0, 1.0]), ([1.0, 0.0], [1.0, 1.0, -1.0]), ([0.0, 0.0], [-1.0, 1.0, -1.0]),
        ([1.0, 1.0], [1.0, 1.0, 1.0]), ([0.0, 0.0], [-1.0, 1.0, -1.0]), ([0.0, 1.0], [-1.0, 1.0, 1.0]),
    ]),
    // Bottom
    ([0.0, -1.0, 0.0], [
        ([0.0, 0.0], [-1.0, -1.0, -1.0]), ([1.0, 0.0], [1.0, -1.0, -1.0]), ([1.0, 1.0], [1.0, -1.0, 1.0]),
        ([0.0, 1.0], [-1.0, -1.0, 1.0]), ([0.0, 0.0], [-1.0, -1.0, -1.0]), ([1.0, 1.0], [1.0, -1.0, 1.0]),
    ]),
    // Left
    ([-1.0, 0.0, 0.0], [
        ([1.0, 1.0], [-1.0, 1.0, 1.0]), ([1.0, 0.0], [-1.0, 1.0, -1.0]), ([0.0, 0.0], [-1.0, -1.0, -1.0]),
        ([1.0, 1.0], [-1.0, 1.0, 1.0]), ([0.0, 0.0], [-1.0, -1.0, -1.0]), ([0.0, 1.0], [-1.0, -1.0, 1.0]),
    ]),
    // Right
    ([1.0, 0.0, 0.0], [
        ([0.0, 0.0], [1.0, -1.0, -1.0]), ([1.0, 0.0], [1.0, 1.0, -1.0]), ([1.0, 1.0], [1.0, 1.0, 1.0]),
        ([1.0, 1.0], [1.0, 1.0, 1.0]), ([0.0, 1.0], [1.0, -1.0, 1.0]), ([0.0, 0.0], [1.0, -1.0, -1.0]),
    ]),
    // Front
    ([0.0, 0.0, 1.0], [
        ([1.0, 0.0], [1.0, -1.0, 1.0]), ([1.0, 1.0], [1.0, 1.0, 1.0]), ([0.0, 1.0], [-1.0, 1.0, 1.0]),
        ([0.0, 1.0], [-1.0, 1.0, 1.0]), ([0.0, 0.0], [-1.0, -1.0, 1.0]), ([1.0, 0.0], [1.0, -1.0, 1.0]),
    ]),
    // Back
    ([0.0, 0.0, -1.0], [
        ([1.0, 0.0], [1.0, -1.0, -1.0]), ([0.0, 0.0], [-1.0, -1.0, -1.0]), ([0.0, 1.0], [-1.0, 1.0, -1.0]),
        ([0.0, 1.0], [-1.0, 1.0, -1.0]), ([1.0, 1.0], [1.0, 1.0, -1.0]), ([1.0, 0.0], [1.0, -1.0, -1.0]),
    ]),
];

/// Axis-aligned cube centered at the origin, as 36 unshared vertices.
///
/// Texture coordinates run from 0 to `half_extent` across each face.
pub fn generate_cube(half_extent: f32) -> Result<Batch, GeometryError> {
    check_positive("half extent", half_extent)?;

    let r = half_extent;
    let mut builder = BatchBuilder::begin(Primitive::Triangles, 36, 1);
    for (normal, corners) in CUBE_FACES.iter() {
        for (uv, position) in corners.iter() {
            builder.normal(normal[0], normal[1], normal[2]);
            builder.tex_coord(0, uv[0] * r, uv[1] * r);
            builder.vertex(position[0] * r, position[1] * r, position[2] * r);
        }
    }

    Ok(builder.end())
}

/// Pixel-space orthographic projection and a full-screen textured quad.
///
/// One unit maps to one pixel with the origin at the bottom-left corner.
pub fn screen_quad(width: u32, height: u32) -> (Matrix4<f32>, Batch) {
    let (w, h) = (width as f32, height as f32);
    let projection = orthographic_matrix(0.0, w, 0.0, h, 0.0, 1.0);

    let mut quad = BatchBuilder::begin(Primitive::TriangleStrip, 4, 1);
    for (s, t) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)] {
        quad.color(0.0, 1.0, 0.0, 1.0);
        quad.tex_coord(0, s, t);
        quad.vertex(s * w, t * h, 0.0);
    }

    (projection, quad.end())
}

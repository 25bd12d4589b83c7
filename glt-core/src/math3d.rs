/// Vector and matrix helpers used by the generators, the camera and the renderer.
///
/// Everything here works on `nalgebra` types. Matrices are the usual
/// column-major OpenGL layout, so `Matrix4::as_slice()` can be handed to a
/// shader uniform unchanged.
use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, Unit, Vector2, Vector3, Vector4};

/// True when `candidate` lies strictly within `epsilon` of `compare`.
#[inline]
pub fn close_enough(candidate: f32, compare: f32, epsilon: f32) -> bool {
    (candidate - compare).abs() < epsilon
}

pub fn distance_squared(u: &Point3<f32>, v: &Point3<f32>) -> f32 {
    (u - v).norm_squared()
}

/// Normalize `v`, leaving a zero-length vector untouched instead of producing NaNs.
pub fn normalize_or_keep(v: Vector3<f32>) -> Vector3<f32> {
    v.try_normalize(0.0).unwrap_or(v)
}

/// Unnormalized normal of a counter-clockwise triangle.
pub fn find_normal(p1: &Point3<f32>, p2: &Point3<f32>, p3: &Point3<f32>) -> Vector3<f32> {
    let v1 = p1 - p2;
    let v2 = p2 - p3;
    v1.cross(&v2)
}

/// Plane coefficients (A, B, C, D) through three clockwise-wound points.
///
/// The (A, B, C) part is unit length, so `plane.xyz().dot(p) + plane.w` is the
/// signed distance of `p` from the plane.
pub fn plane_equation(p1: &Point3<f32>, p2: &Point3<f32>, p3: &Point3<f32>) -> Vector4<f32> {
    let v1 = p3 - p1;
    let v2 = p2 - p1;
    let n = normalize_or_keep(v1.cross(&v2));
    let d = -n.dot(&p3.coords);
    Vector4::new(n.x, n.y, n.z, d)
}

/// Catmull-Rom interpolation between `p1` and `p2` for `t` in [0, 1].
pub fn catmull_rom(
    p0: &Point3<f32>,
    p1: &Point3<f32>,
    p2: &Point3<f32>,
    p3: &Point3<f32>,
    t: f32,
) -> Point3<f32> {
    let t2 = t * t;
    let t3 = t2 * t;
    let (p0, p1, p2, p3) = (p0.coords, p1.coords, p2.coords, p3.coords);

    let out = 0.5
        * ((2.0 * p1)
            + (-p0 + p2) * t
            + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
            + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3);
    Point3::from(out)
}

/// Distance along a unit `ray` from `origin` to the first hit on the sphere.
///
/// Negative when the ray misses, zero when it is tangent.
pub fn ray_sphere_test(
    origin: &Point3<f32>,
    ray: &Vector3<f32>,
    center: &Point3<f32>,
    radius: f32,
) -> f32 {
    let to_center = center - origin;
    let a = to_center.dot(ray);
    let distance2 = to_center.norm_squared();

    let result = radius * radius - distance2 + a * a;
    if result > 0.0 {
        a - result.sqrt()
    } else {
        result
    }
}

/// Tangent vector of a textured triangle, orthogonalized against `normal`.
pub fn tangent_basis(
    triangle: &[Point3<f32>; 3],
    tex_coords: &[Vector2<f32>; 3],
    normal: &Vector3<f32>,
) -> Vector3<f32> {
    let dv2v1 = triangle[1] - triangle[0];
    let dv3v1 = triangle[2] - triangle[0];

    let dc2c1 = tex_coords[1] - tex_coords[0];
    let dc3c1 = tex_coords[2] - tex_coords[0];

    let m = 1.0 / (dc2c1.x * dc3c1.y - dc3c1.x * dc2c1.y);

    let tangent = normalize_or_keep((dv2v1 * dc3c1.y - dv3v1 * dc2c1.y) * m);
    let bitangent = normal.cross(&tangent);
    normalize_or_keep(bitangent.cross(normal))
}

/// Hermite step from 0 to 1 as `x` moves between the two edges.
pub fn smooth_step(edge1: f32, edge2: f32, x: f32) -> f32 {
    let t = ((x - edge1) / (edge2 - edge1)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Matrix that flattens geometry onto `plane` as seen from `light`.
pub fn planar_shadow_matrix(plane: &Vector4<f32>, light: &Point3<f32>) -> Matrix4<f32> {
    let (a, b, c, d) = (plane.x, plane.y, plane.z, plane.w);
    let (dx, dy, dz) = (-light.x, -light.y, -light.z);

    #[rustfmt::skip]
    let columns = [
        b * dy + c * dz, -a * dy,         -a * dz,         0.0,
        -b * dx,         a * dx + c * dz, -b * dz,         0.0,
        -c * dx,         -c * dy,         a * dx + b * dy, 0.0,
        -d * dx,         -d * dy,         -d * dz,         a * dx + b * dy + c * dz,
    ];
    Matrix4::from_column_slice(&columns)
}

/// Point on the ray closest to `point`, with the squared distance between them.
pub fn closest_point_on_ray(
    origin: &Point3<f32>,
    unit_dir: &Vector3<f32>,
    point: &Point3<f32>,
) -> (Point3<f32>, f32) {
    let t = unit_dir.dot(&(point - origin));
    let on_ray = origin + unit_dir * t;
    (on_ray, distance_squared(&on_ray, point))
}

/// Rotation of `angle` radians about the axis (x, y, z). A zero axis yields identity.
pub fn rotation_matrix33(angle: f32, x: f32, y: f32, z: f32) -> Matrix3<f32> {
    let axis = Vector3::new(x, y, z);
    if axis.norm() == 0.0 {
        return Matrix3::identity();
    }
    Rotation3::from_axis_angle(&Unit::new_normalize(axis), angle).into_inner()
}

pub fn rotation_matrix44(angle: f32, x: f32, y: f32, z: f32) -> Matrix4<f32> {
    rotation_matrix33(angle, x, y, z).to_homogeneous()
}

/// Perspective projection in the style of `gluPerspective`; `fov` is in radians.
pub fn perspective_matrix(fov: f32, aspect: f32, z_min: f32, z_max: f32) -> Matrix4<f32> {
    let y_max = z_min * (fov * 0.5).tan();
    let y_min = -y_max;
    let x_min = y_min * aspect;
    let x_max = -x_min;

    let mut m = Matrix4::identity();
    m[(0, 0)] = (2.0 * z_min) / (x_max - x_min);
    m[(1, 1)] = (2.0 * z_min) / (y_max - y_min);
    m[(0, 2)] = (x_max + x_min) / (x_max - x_min);
    m[(1, 2)] = (y_max + y_min) / (y_max - y_min);
    m[(2, 2)] = -((z_max + z_min) / (z_max - z_min));
    m[(3, 2)] = -1.0;
    m[(2, 3)] = -((2.0 * z_max * z_min) / (z_max - z_min));
    m[(3, 3)] = 0.0;
    m
}

pub fn orthographic_matrix(
    x_min: f32,
    x_max: f32,
    y_min: f32,
    y_max: f32,
    z_min: f32,
    z_max: f32,
) -> Matrix4<f32> {
    let mut m = Matrix4::identity();
    m[(0, 0)] = 2.0 / (x_max - x_min);
    m[(1, 1)] = 2.0 / (y_max - y_min);
    m[(2, 2)] = -2.0 / (z_max - z_min);
    m[(0, 3)] = -((x_max + x_min) / (x_max - x_min));
    m[(1, 3)] = -((y_max + y_min) / (y_max - y_min));
    m[(2, 3)] = -((z_max + z_min) / (z_max - z_min));
    m
}

/// Inverse of `m`, or `None` when it is singular.
pub fn invert_matrix44(m: &Matrix4<f32>) -> Option<Matrix4<f32>> {
    m.try_inverse()
}

fn to_clip(model_view: &Matrix4<f32>, projection: &Matrix4<f32>, point: &Point3<f32>) -> Vector4<f32> {
    let mut clip = projection * (model_view * point.to_homogeneous());
    if !close_enough(clip.w, 0.0, 1e-6) {
        let div = 1.0 / clip.w;
        clip.x *= div;
        clip.y *= div;
        clip.z *= div;
    }
    clip
}

/// Window coordinates of `point`, relative to the viewport origin, with the
/// y axis pointing up.
pub fn project_xy(
    model_view: &Matrix4<f32>,
    projection: &Matrix4<f32>,
    viewport: [i32; 4],
    point: &Point3<f32>,
) -> Vector2<f32> {
    let ndc = to_clip(model_view, projection, point);
    Vector2::new(
        (1.0 + ndc.x) * viewport[2] as f32 / 2.0,
        (1.0 + ndc.y) * viewport[3] as f32 / 2.0,
    )
}

/// Like [`project_xy`], keeping the normalized device depth in `z`.
pub fn project_xyz(
    model_view: &Matrix4<f32>,
    projection: &Matrix4<f32>,
    viewport: [i32; 4],
    point: &Point3<f32>,
) -> Vector3<f32> {
    let ndc = to_clip(model_view, projection, point);
    Vector3::new(
        (1.0 + ndc.x) * viewport[2] as f32 / 2.0,
        (1.0 + ndc.y) * viewport[3] as f32 / 2.0,
        ndc.z,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_enough_is_strict() {
        assert!(close_enough(1.0, 1.000_001, 1e-5));
        assert!(!close_enough(1.0, 1.1, 1e-5));
    }

    #[test]
    fn test_normalize_keeps_zero() {
        let zero = normalize_or_keep(Vector3::zeros());
        assert_eq!(zero, Vector3::zeros());
        let unit = normalize_or_keep(Vector3::new(0.0, 3.0, 4.0));
        assert!((unit.norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_find_normal_ccw() {
        let n = find_normal(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
        );
        assert!(n.z > 0.0);
        assert!(n.x.abs() < 1e-6 && n.y.abs() < 1e-6);
    }

    #[test]
    fn test_plane_equation_distance() {
        // z = 2 plane, clockwise when seen from +z
        let plane = plane_equation(
            &Point3::new(0.0, 0.0, 2.0),
            &Point3::new(0.0, 1.0, 2.0),
            &Point3::new(1.0, 0.0, 2.0),
        );
        let p = Point3::new(5.0, -3.0, 7.0);
        let distance = plane.xyz().dot(&p.coords) + plane.w;
        assert!((distance - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_catmull_rom_endpoints() {
        let p0 = Point3::new(-1.0, 0.0, 0.0);
        let p1 = Point3::new(0.0, 1.0, 0.0);
        let p2 = Point3::new(1.0, 1.0, 0.0);
        let p3 = Point3::new(2.0, 0.0, 0.0);
        assert!((catmull_rom(&p0, &p1, &p2, &p3, 0.0) - p1).norm() < 1e-6);
        assert!((catmull_rom(&p0, &p1, &p2, &p3, 1.0) - p2).norm() < 1e-6);
    }

    #[test]
    fn test_ray_sphere_hit_and_miss() {
        let origin = Point3::new(0.0, 0.0, -5.0);
        let center = Point3::origin();
        let hit = ray_sphere_test(&origin, &Vector3::z(), &center, 1.0);
        assert!((hit - 4.0).abs() < 1e-5);

        let miss = ray_sphere_test(&origin, &Vector3::x(), &center, 1.0);
        assert!(miss < 0.0);
    }

    #[test]
    fn test_tangent_follows_u() {
        let triangle = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let uvs = [
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
        ];
        let tangent = tangent_basis(&triangle, &uvs, &Vector3::z());
        assert!((tangent - Vector3::x()).norm() < 1e-5);
    }

    #[test]
    fn test_smooth_step_clamps() {
        assert_eq!(smooth_step(0.0, 1.0, -2.0), 0.0);
        assert_eq!(smooth_step(0.0, 1.0, 3.0), 1.0);
        assert!((smooth_step(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_shadow_matrix_lands_on_plane() {
        // Ground plane y = 0, light overhead
        let plane = Vector4::new(0.0, 1.0, 0.0, 0.0);
        let light = Point3::new(0.0, 10.0, 0.0);
        let shadow = planar_shadow_matrix(&plane, &light);

        let projected = shadow * Vector4::new(1.0, 2.0, 1.0, 1.0);
        assert!((projected.y / projected.w).abs() < 1e-5);
    }

    #[test]
    fn test_closest_point_on_ray() {
        let (point, distance2) = closest_point_on_ray(
            &Point3::origin(),
            &Vector3::x(),
            &Point3::new(3.0, 4.0, 0.0),
        );
        assert!((point - Point3::new(3.0, 0.0, 0.0)).norm() < 1e-6);
        assert!((distance2 - 16.0).abs() < 1e-5);
    }

    #[test]
    fn test_rotation_zero_axis_is_identity() {
        assert_eq!(rotation_matrix44(1.0, 0.0, 0.0, 0.0), Matrix4::identity());
    }

    #[test]
    fn test_rotation_quarter_turn() {
        let m = rotation_matrix33(std::f32::consts::FRAC_PI_2, 0.0, 0.0, 2.0);
        let v = m * Vector3::x();
        assert!((v - Vector3::y()).norm() < 1e-6);
    }

    #[test]
    fn test_perspective_matches_nalgebra() {
        let ours = perspective_matrix(0.8, 1.5, 0.1, 100.0);
        let theirs = Matrix4::new_perspective(1.5, 0.8, 0.1, 100.0);
        assert!((ours - theirs).norm() < 1e-4);
    }

    #[test]
    fn test_orthographic_matches_nalgebra() {
        let ours = orthographic_matrix(-2.0, 2.0, -1.0, 1.0, 0.5, 10.0);
        let theirs = Matrix4::new_orthographic(-2.0, 2.0, -1.0, 1.0, 0.5, 10.0);
        assert!((ours - theirs).norm() < 1e-5);
    }

    #[test]
    fn test_invert_singular() {
        assert!(invert_matrix44(&Matrix4::zeros()).is_none());
        let m = rotation_matrix44(0.3, 1.0, 1.0, 0.0);
        let inv = invert_matrix44(&m).unwrap();
        assert!((inv * m - Matrix4::identity()).norm() < 1e-5);
    }

    #[test]
    fn test_project_center_of_viewport() {
        let model_view = Matrix4::new_translation(&Vector3::new(0.0, 0.0, -5.0));
        let projection = perspective_matrix(1.0, 1.0, 1.0, 10.0);
        let viewport = [0, 0, 200, 100];

        let xy = project_xy(&model_view, &projection, viewport, &Point3::origin());
        assert!((xy - Vector2::new(100.0, 50.0)).norm() < 1e-4);

        let xyz = project_xyz(&model_view, &projection, viewport, &Point3::origin());
        assert!(xyz.z > -1.0 && xyz.z < 1.0);
    }
}

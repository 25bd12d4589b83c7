/// Camera and projection utilities
use nalgebra::{Matrix4, Point3, Vector3};

use crate::math3d::{orthographic_matrix, perspective_matrix, project_xyz};

/// Projection mode for rendering
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionMode {
    Orthographic,
    Perspective,
}

/// A projected point in window space.
///
/// `x` grows to the right and `y` downward from the top-left cell, matching
/// terminal rows. `depth` is the normalized device depth in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
    pub depth: f32,
}

/// Camera configuration for 3D rendering
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub mode: ProjectionMode,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 5.0),
            target: Point3::origin(),
            up: Vector3::y(),
            fov: std::f32::consts::FRAC_PI_4,
            aspect: width as f32 / height.max(1) as f32,
            near: 0.1,
            far: 100.0,
            mode: ProjectionMode::Perspective,
        }
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        match self.mode {
            ProjectionMode::Perspective => perspective_matrix(self.fov, self.aspect, self.near, self.far),
            ProjectionMode::Orthographic => {
                // Frame the target the way the perspective view would at its distance
                let distance = (self.position - self.target).norm();
                let half_height = distance * (self.fov * 0.5).tan();
                let half_width = half_height * self.aspect;
                orthographic_matrix(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    self.near,
                    self.far,
                )
            }
        }
    }

    /// Project an object-space point through `model` onto a `width` x
    /// `height` window.
    ///
    /// Returns `None` for points behind the eye or outside the depth range.
    /// Points beside the window are still returned so callers can clip
    /// partially visible triangles.
    pub fn project_to_screen(
        &self,
        point: &Point3<f32>,
        model_matrix: &Matrix4<f32>,
        width: u32,
        height: u32,
    ) -> Option<ScreenPoint> {
        let model_view = self.view_matrix() * model_matrix;
        let projection = self.projection_matrix();

        let clip = projection * (model_view * point.to_homogeneous());
        if clip.w <= 1e-6 {
            return None;
        }

        let window = project_xyz(&model_view, &projection, [0, 0, width as i32, height as i32], point);
        if !(-1.0..=1.0).contains(&window.z) {
            return None;
        }

        Some(ScreenPoint {
            x: window.x,
            y: height as f32 - window.y,
            depth: window.z,
        })
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

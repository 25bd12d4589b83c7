/// Model matrices for spinning a solid in front of the camera
use std::f32::consts::{PI, TAU};

use nalgebra::{Matrix3, Matrix4, Vector3};

use crate::math3d::{invert_matrix44, rotation_matrix44};

/// Accumulated rotation about the x, y and z axes, in radians
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotationState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}

impl RotationState {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Add deltas (radians), keeping each angle in `[-PI, PI)` so long
    /// sessions do not lose precision.
    pub fn rotate(&mut self, dx: f32, dy: f32, dz: f32) {
        self.x = wrap_angle(self.x + dx);
        self.y = wrap_angle(self.y + dy);
        self.z = wrap_angle(self.z + dz);
    }
}

/// Transform builder for model matrices
pub struct Transform;

impl Transform {
    /// Rotation applied x first, then y, then z.
    pub fn rotation_matrix(rotation: &RotationState) -> Matrix4<f32> {
        let rx = rotation_matrix44(rotation.x, 1.0, 0.0, 0.0);
        let ry = rotation_matrix44(rotation.y, 0.0, 1.0, 0.0);
        let rz = rotation_matrix44(rotation.z, 0.0, 0.0, 1.0);
        rz * ry * rx
    }

    pub fn translation_matrix(x: f32, y: f32, z: f32) -> Matrix4<f32> {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    pub fn scale_matrix(sx: f32, sy: f32, sz: f32) -> Matrix4<f32> {
        Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz))
    }

    /// Scale, then rotate, then move to `offset`.
    pub fn model_matrix(rotation: &RotationState, offset: &Vector3<f32>, scale: f32) -> Matrix4<f32> {
        Self::translation_matrix(offset.x, offset.y, offset.z)
            * Self::rotation_matrix(rotation)
            * Self::scale_matrix(scale, scale, scale)
    }

    /// Matrix carrying object-space normals along with `model`.
    ///
    /// This is the inverse transpose of the upper 3x3 block; a singular model
    /// falls back to the block itself.
    pub fn normal_matrix(model: &Matrix4<f32>) -> Matrix3<f32> {
        let linear = model.fixed_view::<3, 3>(0, 0).into_owned();
        match invert_matrix44(&linear.to_homogeneous()) {
            Some(inverse) => inverse.fixed_view::<3, 3>(0, 0).transpose(),
            None => linear,
        }
    }

    pub fn mvp_matrix(
        model: &Matrix4<f32>,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) -> Matrix4<f32> {
        projection * view * model
    }
}

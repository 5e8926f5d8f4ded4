//! Per-frame transform state: camera pose, model yaw, world (orbit)
//! rotation and the model matrix stack.
//!
//! Valid frame sequence:
//! `begin_frame -> (push_model -> rotations -> draw -> pop_model)* -> finish_frame`.
//! [`TransformState::scoped_model`] pairs the push and pop structurally.

use std::f32::consts::TAU;
use std::ops::{Deref, DerefMut};

use crate::{Camera, CoreError, CoreResult, EulerRot, Mat3, Mat4, Quat, Vec3};

/// Rigid transform with uniform or non-uniform scale (Euler XYZ).
#[derive(Clone, Copy, Debug)]
pub struct Transform {
    pub translation: Vec3,
    /// Euler angles in radians (XYZ order).
    pub rotation_euler: Vec3,
    pub scale: Vec3,
}

impl Transform {
    #[inline]
    pub const fn identity() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation_euler: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }

    #[inline]
    pub fn from_trs(translation: Vec3, rotation_euler: Vec3, scale: Vec3) -> Self {
        Self {
            translation,
            rotation_euler,
            scale,
        }
    }

    /// `p -> scale * (p + offset)`: recentre then resize a mesh.
    #[inline]
    pub fn canonical(scale: f32, offset: Vec3) -> Self {
        Self::from_trs(offset * scale, Vec3::ZERO, Vec3::splat(scale))
    }

    /// Build matrix = T * R * S (column-major Mat4 per glam).
    #[inline]
    pub fn matrix(&self) -> Mat4 {
        let q = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation_euler.x,
            self.rotation_euler.y,
            self.rotation_euler.z,
        );
        Mat4::from_scale_rotation_translation(self.scale, q, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Every matrix a shading pass needs, snapshotted at draw time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameMatrices {
    pub model_view: Mat4,
    pub projection: Mat4,
    pub normal: Mat3,
    pub view: Mat4,
    pub world_rotation: Mat4,
    pub world_rotation_inv: Mat4,
    /// inverse(projection * view), for reconstructing world-space view rays.
    pub pv_inverse: Mat4,
}

#[derive(Clone, Debug)]
pub struct TransformState {
    camera: Camera,
    /// Eye position relative to the target at zero orbit.
    orbit_offset: Vec3,
    yaw_deg: f32,
    world_rotation: f32,
    base_model: Mat4,
    model: Mat4,
    stack: Vec<Mat4>,

    view: Mat4,
    projection: Mat4,
    pv_inverse: Mat4,
    world_rot: Mat4,
    world_rot_inv: Mat4,
}

impl TransformState {
    pub fn new(camera: Camera) -> Self {
        let mut state = Self {
            camera,
            orbit_offset: camera.eye - camera.target,
            yaw_deg: 0.0,
            world_rotation: 0.0,
            base_model: Mat4::IDENTITY,
            model: Mat4::IDENTITY,
            stack: Vec::new(),
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            pv_inverse: Mat4::IDENTITY,
            world_rot: Mat4::IDENTITY,
            world_rot_inv: Mat4::IDENTITY,
        };
        state.begin_frame(camera.aspect);
        state
    }

    /// Recompute projection, view and the derived inverses from the current
    /// eye, and reset the working model matrix.
    pub fn begin_frame(&mut self, aspect: f32) {
        self.camera.aspect = aspect.max(1e-6);
        self.view = self.camera.view();
        self.projection = self.camera.proj();
        self.pv_inverse = (self.projection * self.view).inverse();
        self.refresh_world_rotation();
        self.model = self.base_model;
    }

    /// The stack must be empty once all passes are drawn.
    pub fn finish_frame(&self) -> CoreResult<()> {
        match self.stack.len() {
            0 => Ok(()),
            depth => Err(CoreError::StackImbalance { depth }),
        }
    }

    pub fn push_model(&mut self) {
        self.stack.push(self.model);
    }

    pub fn pop_model(&mut self) -> CoreResult<()> {
        self.model = self.stack.pop().ok_or(CoreError::StackUnderflow)?;
        Ok(())
    }

    /// Push now, pop when the guard goes out of scope.
    pub fn scoped_model(&mut self) -> ModelScope<'_> {
        self.push_model();
        ModelScope { state: self }
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Rotate the working model about the world +Y axis (degrees). The
    /// rotation goes on the outside, after the base model's recentring, so a
    /// recentred mesh spins about its own centre.
    pub fn apply_yaw(&mut self, degrees: f32) {
        self.model = Mat4::from_rotation_y(degrees.to_radians()) * self.model;
    }

    /// Overwrite the working model matrix; the enclosing scope restores it.
    pub fn replace_model(&mut self, m: Mat4) {
        self.model = m;
    }

    /// Accumulate the model yaw used by the mesh pass; kept in [0, 360).
    pub fn add_yaw(&mut self, delta_deg: f32) {
        self.yaw_deg = (self.yaw_deg + delta_deg).rem_euclid(360.0);
    }

    /// Orbit the camera about the Y axis through its target. The angle is
    /// kept in [0, 2π) and the eye is recomputed from its rest offset, so
    /// repeated calls never drift.
    pub fn apply_orbit(&mut self, delta_rad: f32) {
        self.world_rotation = (self.world_rotation + delta_rad).rem_euclid(TAU);
        self.camera.orbit_to(self.orbit_offset, -self.world_rotation);
        self.refresh_world_rotation();
    }

    fn refresh_world_rotation(&mut self) {
        self.world_rot = Mat4::from_axis_angle(Vec3::NEG_Y, self.world_rotation);
        self.world_rot_inv = Mat4::from_axis_angle(Vec3::Y, self.world_rotation);
    }

    /// Matrix every frame's model matrix starts from (e.g. mesh recentring).
    pub fn set_base_model(&mut self, base: Mat4) {
        self.base_model = base;
        if self.stack.is_empty() {
            self.model = base;
        }
    }

    #[inline]
    pub fn model(&self) -> Mat4 {
        self.model
    }

    #[inline]
    pub fn model_view(&self) -> Mat4 {
        self.view * self.model
    }

    /// Inverse-transpose of the upper 3x3 of the model-view matrix. A
    /// singular matrix falls back to the plain upper 3x3.
    pub fn normal_matrix(&self) -> Mat3 {
        let m = Mat3::from_mat4(self.model_view());
        if m.determinant().abs() <= f32::EPSILON {
            log::debug!("singular model-view; normal matrix left uncorrected");
            return m;
        }
        m.inverse().transpose()
    }

    pub fn frame_matrices(&self) -> FrameMatrices {
        FrameMatrices {
            model_view: self.model_view(),
            projection: self.projection,
            normal: self.normal_matrix(),
            view: self.view,
            world_rotation: self.world_rot,
            world_rotation_inv: self.world_rot_inv,
            pv_inverse: self.pv_inverse,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn yaw_degrees(&self) -> f32 {
        self.yaw_deg
    }

    pub fn world_rotation(&self) -> f32 {
        self.world_rotation
    }

    pub fn world_rotation_matrix(&self) -> Mat4 {
        self.world_rot
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn pv_inverse(&self) -> Mat4 {
        self.pv_inverse
    }
}

impl Default for TransformState {
    fn default() -> Self {
        Self::new(Camera::viewer())
    }
}

/// Guard returned by [`TransformState::scoped_model`]; pops on drop.
pub struct ModelScope<'a> {
    state: &'a mut TransformState,
}

impl Deref for ModelScope<'_> {
    type Target = TransformState;

    fn deref(&self) -> &TransformState {
        self.state
    }
}

impl DerefMut for ModelScope<'_> {
    fn deref_mut(&mut self) -> &mut TransformState {
        self.state
    }
}

impl Drop for ModelScope<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.state.pop_model() {
            log::error!("model scope: {err}");
        }
    }
}

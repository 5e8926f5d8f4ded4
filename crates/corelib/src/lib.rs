//! Core types: math re-exports, camera, per-frame transform state, input.

use thiserror::Error;

pub use glam::{EulerRot, Mat3, Mat4, Quat, Vec3, vec3};

pub mod camera;
pub mod input;
pub mod shading;
pub mod transform;

pub use camera::Camera;
pub use input::{InputController, ViewerKey};
pub use shading::ShadingMode;
pub use transform::{FrameMatrices, ModelScope, TransformState};

#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    /// `pop_model` without a matching `push_model`.
    #[error("model matrix stack underflow")]
    StackUnderflow,
    /// The stack still holds matrices when the frame ends.
    #[error("model matrix stack not empty at end of frame (depth {depth})")]
    StackImbalance { depth: usize },
    #[error("unknown shading mode '{0}'")]
    UnknownMode(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_pv_is_finite() {
        let cam = camera::Camera::new_perspective(
            vec3(0.0, 0.0, 4.0),
            vec3(0.0, 0.0, 0.0),
            Vec3::Y,
            60f32.to_radians(),
            0.1,
            100.0,
            16.0 / 9.0,
        );
        let pv = cam.proj_view();
        let a = pv.to_cols_array();
        assert!(a.iter().all(|f| f.is_finite()));
    }

    #[test]
    fn errors_render_readably() {
        assert_eq!(CoreError::StackUnderflow.to_string(), "model matrix stack underflow");
        assert_eq!(
            CoreError::StackImbalance { depth: 2 }.to_string(),
            "model matrix stack not empty at end of frame (depth 2)"
        );
    }
}

//! Per-frame pass dispatch: picks the shading program for the active mode
//! and emits the subject-mesh pass followed by the skybox pass.
//!
//! Every pass carries its own program handle and a complete uniform block;
//! nothing is inherited from a previously bound program.

use asset::MeshData;
use corelib::{CoreError, CoreResult, Mat4, ShadingMode, TransformState};

use crate::uniforms::{LightParams, MaterialParams, ShaderUniforms};

/// Concrete GPU programs. The skybox program is used for the environment
/// cube whatever the mesh mode is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShadingProgram {
    Reflective,
    Refractive,
    Phong,
    Skybox,
}

impl ShadingProgram {
    pub const ALL: [ShadingProgram; 4] = [
        ShadingProgram::Reflective,
        ShadingProgram::Refractive,
        ShadingProgram::Phong,
        ShadingProgram::Skybox,
    ];
}

impl From<ShadingMode> for ShadingProgram {
    fn from(mode: ShadingMode) -> Self {
        match mode {
            ShadingMode::Reflective => ShadingProgram::Reflective,
            ShadingMode::Refractive => ShadingProgram::Refractive,
            ShadingMode::PhongWireframe => ShadingProgram::Phong,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawTarget {
    Mesh,
    Skybox,
}

/// One draw: which program, which geometry, which uniforms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawPass {
    pub program: ShadingProgram,
    pub target: DrawTarget,
    pub uniforms: ShaderUniforms,
}

/// Receiver of draw passes.
pub trait DrawBackend {
    fn draw(&mut self, pass: DrawPass);
}

/// Passes recorded for one frame, in submission order.
#[derive(Clone, Debug, Default)]
pub struct FrameQueue {
    passes: Vec<DrawPass>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn passes(&self) -> &[DrawPass] {
        &self.passes
    }

    pub fn clear(&mut self) {
        self.passes.clear();
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl DrawBackend for FrameQueue {
    fn draw(&mut self, pass: DrawPass) {
        self.passes.push(pass);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub passes: usize,
}

#[derive(Clone, Debug, Default)]
pub struct RenderCoordinator {
    frames: u64,
}

impl RenderCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit the frame's passes. Nothing is drawn while the mesh is still
    /// loading or no mode is selected. A non-empty matrix stack on entry
    /// aborts the frame before anything is drawn.
    #[allow(clippy::too_many_arguments)]
    pub fn render_frame<B: DrawBackend>(
        &mut self,
        backend: &mut B,
        transforms: &mut TransformState,
        mesh: &MeshData,
        skybox: &MeshData,
        mode: Option<ShadingMode>,
        light: &LightParams,
        material: &MaterialParams,
    ) -> CoreResult<FrameStats> {
        self.frames += 1;
        let mut stats = FrameStats::default();

        if !mesh.loaded() {
            log::trace!("frame {}: mesh not ready, skipping", self.frames);
            return Ok(stats);
        }
        let Some(mode) = mode else {
            log::trace!("frame {}: no shading mode selected", self.frames);
            return Ok(stats);
        };

        let depth = transforms.stack_depth();
        if depth != 0 {
            return Err(CoreError::StackImbalance { depth });
        }

        let yaw = transforms.yaw_degrees();
        {
            let mut scope = transforms.scoped_model();
            scope.apply_yaw(yaw);
            backend.draw(DrawPass {
                program: mode.into(),
                target: DrawTarget::Mesh,
                uniforms: ShaderUniforms::new(&scope.frame_matrices(), light, material),
            });
            stats.passes += 1;
        }

        if skybox.loaded() {
            let mut scope = transforms.scoped_model();
            // The environment cube ignores the mesh's base transform and yaw.
            scope.replace_model(Mat4::IDENTITY);
            backend.draw(DrawPass {
                program: ShadingProgram::Skybox,
                target: DrawTarget::Skybox,
                uniforms: ShaderUniforms::new(&scope.frame_matrices(), light, material),
            });
            stats.passes += 1;
        } else {
            log::warn!("skybox geometry not loaded; drawing mesh only");
        }

        transforms.finish_frame()?;
        Ok(stats)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::{Vec3, transform::Transform};

    fn loaded_mesh() -> MeshData {
        let mut mesh = MeshData::new();
        mesh.load_from_text("v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n")
            .unwrap();
        mesh
    }

    fn render(
        queue: &mut FrameQueue,
        state: &mut TransformState,
        mesh: &MeshData,
        mode: Option<ShadingMode>,
    ) -> CoreResult<FrameStats> {
        let skybox = MeshData::cube(100.0).unwrap();
        state.begin_frame(4.0 / 3.0);
        RenderCoordinator::new().render_frame(
            queue,
            state,
            mesh,
            &skybox,
            mode,
            &LightParams::default(),
            &MaterialParams::default(),
        )
    }

    #[test]
    fn unloaded_mesh_draws_nothing() {
        let mut queue = FrameQueue::new();
        let mut state = TransformState::default();
        for mode in ShadingMode::ALL {
            let stats = render(&mut queue, &mut state, &MeshData::new(), Some(mode)).unwrap();
            assert_eq!(stats.passes, 0);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn no_mode_draws_nothing() {
        let mut queue = FrameQueue::new();
        let mut state = TransformState::default();
        let stats = render(&mut queue, &mut state, &loaded_mesh(), None).unwrap();
        assert_eq!(stats, FrameStats::default());
        assert!(queue.is_empty());
    }

    #[test]
    fn each_mode_draws_mesh_then_skybox() {
        let mesh = loaded_mesh();
        let expected = [
            (ShadingMode::Reflective, ShadingProgram::Reflective),
            (ShadingMode::Refractive, ShadingProgram::Refractive),
            (ShadingMode::PhongWireframe, ShadingProgram::Phong),
        ];
        for (mode, program) in expected {
            let mut queue = FrameQueue::new();
            let mut state = TransformState::default();
            let stats = render(&mut queue, &mut state, &mesh, Some(mode)).unwrap();

            assert_eq!(stats.passes, 2);
            let passes = queue.passes();
            assert_eq!(passes.len(), 2);
            assert_eq!((passes[0].program, passes[0].target), (program, DrawTarget::Mesh));
            assert_eq!(
                (passes[1].program, passes[1].target),
                (ShadingProgram::Skybox, DrawTarget::Skybox)
            );
            assert_eq!(state.stack_depth(), 0);
        }
    }

    #[test]
    fn two_passes_at_any_orbit_angle() {
        let mesh = loaded_mesh();
        let mut state = TransformState::default();
        for step in 0..40 {
            state.apply_orbit(0.37 * step as f32);
            let mut queue = FrameQueue::new();
            let stats = render(&mut queue, &mut state, &mesh, Some(ShadingMode::Refractive)).unwrap();
            assert_eq!(stats.passes, 2);
        }
    }

    #[test]
    fn yaw_reaches_mesh_pass_only() {
        let mesh = loaded_mesh();
        let mut state = TransformState::default();
        state.add_yaw(90.0);
        let mut queue = FrameQueue::new();
        render(&mut queue, &mut state, &mesh, Some(ShadingMode::Reflective)).unwrap();

        let view = state.view();
        let yawed = view * Mat4::from_rotation_y(90f32.to_radians());
        let mesh_mv = Mat4::from_cols_array_2d(&queue.passes()[0].uniforms.model_view);
        let sky_mv = Mat4::from_cols_array_2d(&queue.passes()[1].uniforms.model_view);
        assert!(mesh_mv.abs_diff_eq(yawed, 1e-5));
        assert!(sky_mv.abs_diff_eq(view, 1e-5));
        // model matrix restored after the frame
        assert_eq!(state.model(), Mat4::IDENTITY);
    }

    #[test]
    fn yawed_mesh_stays_centred_at_origin() {
        let mut mesh = MeshData::new();
        mesh.load_from_text("v 9 0 -1\nv 11 0 -1\nv 10 0 1\nf 1 2 3\n")
            .unwrap();
        let (scale, offset) = mesh.canonical_transform(2.0).unwrap();
        let mut state = TransformState::default();
        state.set_base_model(Transform::canonical(scale, Vec3::from(offset)).matrix());
        state.add_yaw(90.0);

        let mut queue = FrameQueue::new();
        render(&mut queue, &mut state, &mesh, Some(ShadingMode::Reflective)).unwrap();

        let mesh_mv = Mat4::from_cols_array_2d(&queue.passes()[0].uniforms.model_view);
        let world = state.view().inverse() * mesh_mv;
        let centre = world.transform_point3(Vec3::new(10.0, 0.0, 0.0));
        assert!(centre.abs_diff_eq(Vec3::ZERO, 1e-4), "centre at {centre}");
    }

    #[test]
    fn skybox_ignores_mesh_base_transform() {
        let mesh = loaded_mesh();
        let mut state = TransformState::default();
        state.set_base_model(Mat4::from_scale(Vec3::splat(3.0)));
        let mut queue = FrameQueue::new();
        render(&mut queue, &mut state, &mesh, Some(ShadingMode::PhongWireframe)).unwrap();

        let sky_mv = Mat4::from_cols_array_2d(&queue.passes()[1].uniforms.model_view);
        assert!(sky_mv.abs_diff_eq(state.view(), 1e-5));
    }

    #[test]
    fn unbalanced_stack_aborts_frame() {
        let mesh = loaded_mesh();
        let mut state = TransformState::default();
        let mut queue = FrameQueue::new();
        state.push_model();

        let err = render(&mut queue, &mut state, &mesh, Some(ShadingMode::Reflective)).unwrap_err();
        assert_eq!(err, CoreError::StackImbalance { depth: 1 });
        assert!(queue.is_empty());
    }

    #[test]
    fn every_pass_gets_light_and_material() {
        let mesh = loaded_mesh();
        let mut state = TransformState::default();
        let mut queue = FrameQueue::new();
        render(&mut queue, &mut state, &mesh, Some(ShadingMode::PhongWireframe)).unwrap();
        for pass in queue.passes() {
            assert_eq!(pass.uniforms.light_diffuse, [0.7, 0.7, 0.7, 1.0]);
            assert_eq!(pass.uniforms.params[0], 300.0);
        }
    }

    #[test]
    fn mode_maps_to_program() {
        assert_eq!(ShadingProgram::from(ShadingMode::PhongWireframe), ShadingProgram::Phong);
        assert!(!ShadingMode::ALL.iter().any(|&m| ShadingProgram::from(m) == ShadingProgram::Skybox));
    }
}

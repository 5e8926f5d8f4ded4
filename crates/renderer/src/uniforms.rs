//! Uniform block shared by every shading program, plus the light and
//! material parameter sets that feed it.

use bytemuck::{Pod, Zeroable};
use corelib::{FrameMatrices, Mat3, Vec3};

/// Light as seen in view space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightParams {
    pub position: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl Default for LightParams {
    fn default() -> Self {
        Self {
            position: Vec3::new(5.0, 5.0, 5.0),
            ambient: Vec3::splat(0.1),
            diffuse: Vec3::splat(0.7),
            specular: Vec3::ZERO,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialParams {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
    /// Ratio of refractive indices (outside / inside) for the refractive mode.
    pub refraction_ratio: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        let gold = Vec3::new(205.0, 163.0, 63.0) / 255.0;
        Self {
            ambient: gold,
            diffuse: gold,
            specular: Vec3::ONE,
            shininess: 300.0,
            refraction_ratio: 1.0 / 1.52,
        }
    }
}

/// std140-compatible mirror of `Uniforms` in `scene.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ShaderUniforms {
    pub model_view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub world_rotation: [[f32; 4]; 4],
    pub world_rotation_inv: [[f32; 4]; 4],
    pub pv_inverse: [[f32; 4]; 4],
    /// mat3x3 columns padded to vec4.
    pub normal: [[f32; 4]; 3],
    pub light_position: [f32; 4],
    pub light_ambient: [f32; 4],
    pub light_diffuse: [f32; 4],
    pub light_specular: [f32; 4],
    pub k_ambient: [f32; 4],
    pub k_diffuse: [f32; 4],
    pub k_specular: [f32; 4],
    /// x = shininess, y = refraction ratio.
    pub params: [f32; 4],
}

impl ShaderUniforms {
    pub fn new(m: &FrameMatrices, light: &LightParams, material: &MaterialParams) -> Self {
        Self {
            model_view: m.model_view.to_cols_array_2d(),
            projection: m.projection.to_cols_array_2d(),
            view: m.view.to_cols_array_2d(),
            world_rotation: m.world_rotation.to_cols_array_2d(),
            world_rotation_inv: m.world_rotation_inv.to_cols_array_2d(),
            pv_inverse: m.pv_inverse.to_cols_array_2d(),
            normal: pad_mat3(m.normal),
            light_position: light.position.extend(1.0).to_array(),
            light_ambient: light.ambient.extend(1.0).to_array(),
            light_diffuse: light.diffuse.extend(1.0).to_array(),
            light_specular: light.specular.extend(1.0).to_array(),
            k_ambient: material.ambient.extend(1.0).to_array(),
            k_diffuse: material.diffuse.extend(1.0).to_array(),
            k_specular: material.specular.extend(1.0).to_array(),
            params: [material.shininess, material.refraction_ratio, 0.0, 0.0],
        }
    }
}

fn pad_mat3(m: Mat3) -> [[f32; 4]; 3] {
    [
        m.x_axis.extend(0.0).to_array(),
        m.y_axis.extend(0.0).to_array(),
        m.z_axis.extend(0.0).to_array(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::TransformState;

    #[test]
    fn layout_matches_wgsl_block() {
        // 6 mat4 + padded mat3 + 8 vec4
        assert_eq!(std::mem::size_of::<ShaderUniforms>(), 6 * 64 + 48 + 8 * 16);
        assert_eq!(std::mem::size_of::<ShaderUniforms>() % 16, 0);
    }

    #[test]
    fn uniforms_carry_matrices_and_params() {
        let state = TransformState::default();
        let m = state.frame_matrices();
        let u = ShaderUniforms::new(&m, &LightParams::default(), &MaterialParams::default());

        assert_eq!(u.view, m.view.to_cols_array_2d());
        assert_eq!(u.normal[1][..3], m.normal.y_axis.to_array());
        assert_eq!(u.normal[2][3], 0.0);
        assert_eq!(u.light_position, [5.0, 5.0, 5.0, 1.0]);
        assert_eq!(u.params[0], 300.0);
    }
}

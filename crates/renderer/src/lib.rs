//! Renderer: pass coordination plus the wgpu backend that executes it.
//! wgpu = 26.x, winit = 0.30.x

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{Context, Result};
use asset::{MeshData, texture::CubeMapData};
use bytemuck::{Pod, Zeroable};
use wgpu::{
    BindGroup, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResource, BindingType,
    BlendState, Buffer, BufferBinding, BufferBindingType, BufferUsages, ColorTargetState,
    ColorWrites, CommandEncoderDescriptor, DepthBiasState, DepthStencilState, Device,
    DeviceDescriptor, Extent3d, Features, FragmentState, Instance, InstanceDescriptor, Limits,
    LoadOp, Operations, PipelineLayout, PipelineLayoutDescriptor, PowerPreference, PresentMode,
    Queue, RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline,
    RenderPipelineDescriptor, SamplerBindingType, ShaderModule, ShaderModuleDescriptor,
    ShaderSource, ShaderStages, StoreOp, Surface, SurfaceConfiguration, SurfaceError,
    TextureDescriptor, TextureDimension, TextureFormat, TextureSampleType, TextureUsages,
    TextureView, TextureViewDescriptor, TextureViewDimension, VertexBufferLayout, VertexState,
    VertexStepMode, util::DeviceExt,
};
use winit::{dpi::PhysicalSize, window::Window};

pub mod coordinator;
pub mod uniforms;

pub use coordinator::{
    DrawBackend, DrawPass, DrawTarget, FrameQueue, FrameStats, RenderCoordinator, ShadingProgram,
};
pub use uniforms::{LightParams, MaterialParams, ShaderUniforms};

/// Vertex: position + normal.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
}
impl Vertex {
    pub const LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3],
    };
}

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// Uniform slots available per frame (one per pass).
const MAX_PASSES: usize = 4;

const UNIFORM_SIZE: u64 = std::mem::size_of::<ShaderUniforms>() as u64;

/// Indexed geometry resident on the GPU.
struct GpuMesh {
    vertex_buf: Buffer,
    index_buf: Buffer,
    index_count: u32,
}

pub struct GpuState {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,

    // Device/queue
    device: Device,
    queue: Queue,

    // One pipeline per shading program
    pipelines: HashMap<ShadingProgram, RenderPipeline>,

    // Uniform ring (dynamic offsets) + environment map
    uniform_buf: Buffer,
    uniform_stride: u64,
    scene_bg: BindGroup,

    // Geometry
    meshes: HashMap<DrawTarget, GpuMesh>,

    // Depth
    depth_view: TextureView,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuState {
    /// Create GPU state bound to an Arc<Window>.
    pub async fn new(
        window: Arc<Window>,
        backends: wgpu::Backends,
        env: &CubeMapData,
    ) -> Result<Self> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance
            .create_surface(window.clone())
            .context("create_surface failed")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter")?;
        log::info!("Adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Viewer Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .context("request_device failed")?;

        // Surface format (prefer sRGB)
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        // Configure surface
        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view = create_depth_view(&device, &surface_config);

        // ==== Shaders ====
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Scene WGSL"),
            source: ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });

        // ==== Bind group layout: uniforms + cube map + sampler ====
        let min_binding = NonZeroU64::new(UNIFORM_SIZE).context("empty uniform block")?;
        let scene_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Scene BGL"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::VERTEX_FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: Some(min_binding),
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        // ==== Uniform ring ====
        let align = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let uniform_stride = UNIFORM_SIZE.div_ceil(align) * align;
        let uniform_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene UBO"),
            size: uniform_stride * MAX_PASSES as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // ==== Environment cube map ====
        let env_view = upload_cube_map(&device, &queue, env);
        let env_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Env Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let scene_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene BG"),
            layout: &scene_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::Buffer(BufferBinding {
                        buffer: &uniform_buf,
                        offset: 0,
                        size: Some(min_binding),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::TextureView(&env_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: BindingResource::Sampler(&env_sampler),
                },
            ],
        });

        // ==== Pipelines ====
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Scene PipelineLayout"),
            bind_group_layouts: &[&scene_bgl],
            push_constant_ranges: &[],
        });
        let pipelines = ShadingProgram::ALL
            .into_iter()
            .map(|program| {
                let pipeline =
                    create_pipeline(&device, &pipeline_layout, &shader, surface_format, program);
                (program, pipeline)
            })
            .collect();

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            pipelines,
            uniform_buf,
            uniform_stride,
            scene_bg,
            meshes: HashMap::new(),
            depth_view,
            width,
            height,
        })
    }

    /// Upload (or replace) the geometry drawn for `target`.
    pub fn upload_mesh(&mut self, target: DrawTarget, mesh: &MeshData) {
        if !mesh.loaded() {
            log::warn!("Refusing to upload unloaded mesh for {target:?}");
            return;
        }
        let vertices: Vec<Vertex> = mesh
            .render_vertices()
            .iter()
            .map(|v| Vertex {
                pos: v.position,
                normal: v.normal,
            })
            .collect();
        let vertex_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh VB"),
                contents: bytemuck::cast_slice(&vertices),
                usage: BufferUsages::VERTEX,
            });
        let index_buf = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh IB"),
                contents: bytemuck::cast_slice(mesh.indices()),
                usage: BufferUsages::INDEX,
            });
        log::debug!(
            "Uploaded {:?}: {} vertices, {} indices",
            target,
            vertices.len(),
            mesh.indices().len()
        );
        self.meshes.insert(
            target,
            GpuMesh {
                vertex_buf,
                index_buf,
                index_count: mesh.indices().len() as u32,
            },
        );
    }

    /// Resize: reconfigure surface & recreate depth view.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, &self.surface_config);
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Execute the recorded passes: clear, then one indexed draw per pass,
    /// each with its own pipeline and uniform slot.
    pub fn present(&mut self, frame_queue: &FrameQueue) -> Result<(), SurfaceError> {
        let passes = frame_queue.passes();
        if passes.len() > MAX_PASSES {
            log::warn!("{} passes recorded, only {} drawn", passes.len(), MAX_PASSES);
        }
        let passes = &passes[..passes.len().min(MAX_PASSES)];

        for (slot, pass) in passes.iter().enumerate() {
            self.queue.write_buffer(
                &self.uniform_buf,
                slot as u64 * self.uniform_stride,
                bytemuck::bytes_of(&pass.uniforms),
            );
        }

        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&Default::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("MainPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(wgpu::Color::BLACK),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for (slot, pass) in passes.iter().enumerate() {
                let (Some(pipeline), Some(mesh)) =
                    (self.pipelines.get(&pass.program), self.meshes.get(&pass.target))
                else {
                    log::warn!("No GPU resources for {:?}/{:?}", pass.program, pass.target);
                    continue;
                };
                let offset = (slot as u64 * self.uniform_stride) as u32;
                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(0, &self.scene_bg, &[offset]);
                rpass.set_vertex_buffer(0, mesh.vertex_buf.slice(..));
                rpass.set_index_buffer(mesh.index_buf.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }
}

/// Shader entry points for each program.
fn entry_points(program: ShadingProgram) -> (&'static str, &'static str) {
    match program {
        ShadingProgram::Reflective => ("vs_main", "fs_reflect"),
        ShadingProgram::Refractive => ("vs_main", "fs_refract"),
        ShadingProgram::Phong => ("vs_main", "fs_phong"),
        ShadingProgram::Skybox => ("vs_skybox", "fs_skybox"),
    }
}

fn create_pipeline(
    device: &Device,
    layout: &PipelineLayout,
    shader: &ShaderModule,
    format: TextureFormat,
    program: ShadingProgram,
) -> RenderPipeline {
    let (vs, fs) = entry_points(program);
    let label = format!("{program:?} Pipeline");
    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(&label),
        layout: Some(layout),
        vertex: VertexState {
            module: shader,
            entry_point: Some(vs),
            buffers: &[Vertex::LAYOUT],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: shader,
            entry_point: Some(fs),
            targets: &[Some(ColorTargetState {
                format,
                blend: Some(BlendState::REPLACE),
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        // Loaded meshes have no guaranteed winding and the skybox is seen
        // from inside.
        primitive: wgpu::PrimitiveState {
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Six-layer texture viewed as a cube.
fn upload_cube_map(device: &Device, queue: &Queue, env: &CubeMapData) -> TextureView {
    let size = env.size.max(1);
    let texture = device.create_texture(&TextureDescriptor {
        label: Some("Env Cube"),
        size: Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 6,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TextureFormat::Rgba8UnormSrgb,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (layer, face) in env.faces.iter().enumerate() {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: layer as u32,
                },
                aspect: wgpu::TextureAspect::All,
            },
            &face.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(face.bytes_per_pixel() * face.width),
                rows_per_image: Some(face.height),
            },
            Extent3d {
                width: face.width,
                height: face.height,
                depth_or_array_layers: 1,
            },
        );
    }

    texture.create_view(&TextureViewDescriptor {
        label: Some("Env Cube View"),
        dimension: Some(TextureViewDimension::Cube),
        ..Default::default()
    })
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_two_vec3() {
        assert_eq!(Vertex::LAYOUT.array_stride, 24);
        assert_eq!(Vertex::LAYOUT.attributes.len(), 2);
    }

    #[test]
    fn every_program_has_entry_points() {
        let src = include_str!("shaders/scene.wgsl");
        for program in ShadingProgram::ALL {
            let (vs, fs) = entry_points(program);
            assert!(src.contains(&format!("fn {vs}(")), "{vs} missing");
            assert!(src.contains(&format!("fn {fs}(")), "{fs} missing");
        }
    }
}

use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::camera::OrthographicVoxelCamera;
use crate::config::{ProjectionMode, VoxelizationConfig};
use crate::error::ConfigError;
use crate::scene::{MeshLayouts, MeshRenderer, PointLight};
use crate::volume::VoxelTexture;

/// Where the voxelization schedule currently is within a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoxelizationPhase {
    /// Waiting for the counter or a manual request.
    Idle,
    /// A pass must run this frame.
    Due,
    /// Pass commands are being recorded.
    Voxelizing,
}

/// Decides on which frames the scene is voxelized and when the mip pyramid is
/// rebuilt.
///
/// The counter starts at the sparsity value and a pass is queued at start-up,
/// so the very first frame always voxelizes. With automatic voxelization and
/// sparsity `S`, passes then land on every frame `F` with `F % S == 0`.
#[derive(Clone, Debug)]
pub struct VoxelizationState {
    ticks_since_last_voxelization: u32,
    voxelization_sparsity: u32,
    pub automatically_voxelize: bool,
    pub voxelization_queued: bool,
    pub automatically_regenerate_mipmap: bool,
    pub regenerate_mipmap_queued: bool,
    phase: VoxelizationPhase,
}

impl VoxelizationState {
    pub fn new(config: &VoxelizationConfig) -> Result<Self, ConfigError> {
        if config.voxelization_sparsity == 0 {
            return Err(ConfigError::ZeroSparsity);
        }
        Ok(Self {
            ticks_since_last_voxelization: config.voxelization_sparsity,
            voxelization_sparsity: config.voxelization_sparsity,
            automatically_voxelize: config.automatically_voxelize,
            voxelization_queued: true,
            automatically_regenerate_mipmap: config.automatically_regenerate_mipmap,
            regenerate_mipmap_queued: true,
            phase: VoxelizationPhase::Idle,
        })
    }

    pub fn phase(&self) -> VoxelizationPhase {
        self.phase
    }

    pub fn ticks_since_last_voxelization(&self) -> u32 {
        self.ticks_since_last_voxelization
    }

    pub fn sparsity(&self) -> u32 {
        self.voxelization_sparsity
    }

    pub fn set_sparsity(&mut self, sparsity: u32) {
        if sparsity == 0 {
            log::warn!("Voxelization sparsity must be at least 1, using 1");
        }
        self.voxelization_sparsity = sparsity.max(1);
    }

    pub fn queue_voxelization(&mut self) {
        self.voxelization_queued = true;
    }

    pub fn queue_mipmap_regeneration(&mut self) {
        self.regenerate_mipmap_queued = true;
    }

    /// Called once per frame. Moves `Idle` to `Due` when a manual pass is
    /// queued or the automatic counter has reached the sparsity.
    pub fn advance(&mut self) -> bool {
        if self.phase != VoxelizationPhase::Idle {
            log::warn!("Voxelization schedule advanced while {:?}", self.phase);
            return false;
        }
        let due = self.voxelization_queued || {
            if self.automatically_voxelize {
                self.ticks_since_last_voxelization = self.ticks_since_last_voxelization.saturating_add(1);
                self.ticks_since_last_voxelization >= self.voxelization_sparsity
            } else {
                false
            }
        };
        if due {
            self.phase = VoxelizationPhase::Due;
        }
        due
    }

    pub fn begin(&mut self) {
        debug_assert_eq!(self.phase, VoxelizationPhase::Due);
        self.phase = VoxelizationPhase::Voxelizing;
    }

    /// Completes a pass: the counter restarts and any manual request is consumed.
    pub fn finish(&mut self) {
        debug_assert_eq!(self.phase, VoxelizationPhase::Voxelizing);
        self.ticks_since_last_voxelization = 0;
        self.voxelization_queued = false;
        self.phase = VoxelizationPhase::Idle;
    }

    /// Whether the mip pyramid should be rebuilt this frame. Consumes a queued
    /// regeneration request.
    pub fn take_mipmap_request(&mut self, voxelized: bool) -> bool {
        let regenerate = (voxelized && self.automatically_regenerate_mipmap) || self.regenerate_mipmap_queued;
        self.regenerate_mipmap_queued = false;
        regenerate
    }
}

#[repr(C)]
#[derive(Default, Copy, Clone, Debug, Pod, Zeroable)]
pub struct VoxelizationUniforms {
    view_projections: [[[f32; 4]; 4]; 3],
    volume_min: [f32; 4],
    light_position: [f32; 4],
    light_color: [f32; 4],
    params: [u32; 4],
}

impl VoxelizationUniforms {
    pub fn new(camera: &OrthographicVoxelCamera, light: &PointLight, size: u32, projection: ProjectionMode) -> Self {
        let bounds = camera.bounds();
        let [lx, ly, lz] = light.position;
        let [lr, lg, lb] = light.color;
        Self {
            view_projections: camera.view_projections(),
            volume_min: [bounds.min[0], bounds.min[1], bounds.min[2], bounds.extent],
            light_position: [lx, ly, lz, 1.0],
            light_color: [lr, lg, lb, 1.0],
            params: [size, (projection == ProjectionMode::SingleAxis) as u32, 0, 0],
        }
    }
}

const OBJECT_GROUP_ID: u32 = 0;
const GEOMETRY_GROUP_ID: u32 = 1;
const VOXELIZATION_GROUP_ID: u32 = 2;

const DUMMY_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// Render pipeline that draws every mesh into the voxel accumulation buffer.
///
/// Rasterization runs into a color target of the voxel grid's face size whose
/// writes are masked off; the fragment stage only touches the accumulation
/// buffer.
pub struct VoxelizationPipeline {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    dummy_view: wgpu::TextureView,
    size: u32,
}

impl VoxelizationPipeline {
    pub fn new(device: &wgpu::Device, mesh_layouts: &MeshLayouts, voxel_texture: &VoxelTexture) -> Self {
        let size = voxel_texture.layout().size();
        let conservative = device
            .features()
            .contains(wgpu::Features::CONSERVATIVE_RASTERIZATION);

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Voxelization Uniform Buffer"),
            contents: bytemuck::cast_slice(&[VoxelizationUniforms::default()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Voxelization Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Voxelization Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: voxel_texture.accumulation_buffer().as_entire_binding(),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Voxelization Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(concat!(
                include_str!("object.wgsl"),
                include_str!("voxelization.wgsl")
            ))),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Voxelization Pipeline Layout"),
            bind_group_layouts: &[&mesh_layouts.object, &mesh_layouts.geometry, &bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Voxelization Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_voxelize"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_voxelize"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: DUMMY_TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::empty(),
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                conservative,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let dummy_view = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Voxelization Dummy Target"),
                size: wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DUMMY_TARGET_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        log::info!("Voxelization pipeline ready (conservative rasterization: {conservative})");

        Self {
            pipeline,
            uniform_buffer,
            bind_group,
            dummy_view,
            size,
        }
    }

    pub fn update_uniforms(
        &self,
        queue: &wgpu::Queue,
        camera: &OrthographicVoxelCamera,
        light: &PointLight,
        projection: ProjectionMode,
    ) {
        let uniforms = VoxelizationUniforms::new(camera, light, self.size, projection);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
    }

    pub fn record<'a>(&self, encoder: &mut wgpu::CommandEncoder, renderers: impl IntoIterator<Item = &'a MeshRenderer>) {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Voxelization Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.dummy_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Discard,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(VOXELIZATION_GROUP_ID, &self.bind_group, &[]);
        for renderer in renderers {
            rpass.set_bind_group(OBJECT_GROUP_ID, renderer.object_bind_group(), &[]);
            rpass.set_bind_group(GEOMETRY_GROUP_ID, renderer.geometry_bind_group(), &[]);
            rpass.draw(0..renderer.index_count(), 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(sparsity: u32, automatically_voxelize: bool) -> VoxelizationState {
        VoxelizationState::new(&VoxelizationConfig {
            voxelization_sparsity: sparsity,
            automatically_voxelize,
            ..Default::default()
        })
        .unwrap()
    }

    /// One frame of the orchestrator without GPU work.
    fn frame(state: &mut VoxelizationState) -> bool {
        if !state.advance() {
            return false;
        }
        assert_eq!(state.phase(), VoxelizationPhase::Due);
        state.begin();
        assert_eq!(state.phase(), VoxelizationPhase::Voxelizing);
        state.finish();
        assert_eq!(state.ticks_since_last_voxelization(), 0);
        true
    }

    fn voxelized_frames(state: &mut VoxelizationState, frames: u32) -> Vec<u32> {
        (0..frames).filter(|_| frame(state)).collect::<Vec<_>>()
    }

    #[test]
    fn sparsity_schedules_every_nth_frame() {
        for sparsity in [1, 2, 3, 5] {
            let mut state = state(sparsity, true);
            let expected: Vec<u32> = (0..20).filter(|f| f % sparsity == 0).collect();
            assert_eq!(voxelized_frames(&mut state, 20), expected, "sparsity {sparsity}");
        }
    }

    #[test]
    fn sparsity_one_voxelizes_every_frame() {
        let mut state = state(1, true);
        assert!((0..10).all(|_| frame(&mut state)));
    }

    #[test]
    fn zero_sparsity_is_rejected_then_clamped() {
        let config = VoxelizationConfig {
            voxelization_sparsity: 0,
            ..Default::default()
        };
        assert_eq!(VoxelizationState::new(&config).err(), Some(ConfigError::ZeroSparsity));

        let mut state = state(4, true);
        state.set_sparsity(0);
        assert_eq!(state.sparsity(), 1);
    }

    #[test]
    fn first_frame_voxelizes_without_automatic_mode() {
        let mut state = state(3, false);
        assert_eq!(voxelized_frames(&mut state, 10), vec![0]);
    }

    #[test]
    fn manual_queue_adds_a_pass_and_restarts_the_counter() {
        let mut state = state(4, true);
        assert!(frame(&mut state)); // frame 0
        assert!(!frame(&mut state)); // 1
        state.queue_voxelization();
        assert!(frame(&mut state)); // 2, manual
        assert!(!state.voxelization_queued);
        let rest: Vec<u32> = (3..12).filter(|_| frame(&mut state)).collect();
        assert_eq!(rest, vec![6, 10]);
    }

    #[test]
    fn manual_queue_works_with_automatic_mode_off() {
        let mut state = state(1, false);
        assert!(frame(&mut state));
        assert!(!frame(&mut state));
        state.queue_voxelization();
        assert!(frame(&mut state));
        assert!(!frame(&mut state));
    }

    #[test]
    fn mipmap_follows_voxelization_or_queue() {
        let mut state = state(1, true);
        // queued at start-up
        assert!(state.take_mipmap_request(false));
        assert!(!state.take_mipmap_request(false));
        assert!(state.take_mipmap_request(true));

        state.automatically_regenerate_mipmap = false;
        assert!(!state.take_mipmap_request(true));
        state.queue_mipmap_regeneration();
        assert!(state.take_mipmap_request(false));
        assert!(!state.regenerate_mipmap_queued);
    }

    #[test]
    fn advancing_outside_idle_is_ignored() {
        let mut state = state(1, true);
        assert!(state.advance());
        assert!(!state.advance());
        assert_eq!(state.phase(), VoxelizationPhase::Due);
    }

    #[test]
    fn uniforms_select_single_axis_projection() {
        let camera = OrthographicVoxelCamera::new(Default::default());
        let light = PointLight::default();
        let dominant = VoxelizationUniforms::new(&camera, &light, 64, ProjectionMode::DominantAxis);
        let single = VoxelizationUniforms::new(&camera, &light, 64, ProjectionMode::SingleAxis);
        assert_eq!(dominant.params, [64, 0, 0, 0]);
        assert_eq!(single.params, [64, 1, 0, 0]);
        assert_eq!(single.volume_min, [-1.0, -1.0, -1.0, 2.0]);
    }
}

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::camera::{OrthographicVoxelCamera, PerspectiveCamera};
use crate::cone_tracing::ConeTracingPass;
use crate::config::{DemoConfig, ProjectionMode, RenderingMode, Settings};
use crate::dominant_axis::DominantAxisPass;
use crate::error::InitError;
use crate::scene::{MeshLayouts, PointLight, Scene};
use crate::visualization::VisualizationPass;
use crate::volume::{sampling_bind_group_layout, VolumeBounds, VolumeLayout, VoxelTexture};
use crate::voxelization::{VoxelizationPipeline, VoxelizationState};

const VOXEL_CLEAR_VALUE: [f32; 4] = [0.0; 4];

/// Something that can be set up once against a device and then records one
/// frame per call.
pub trait FramePipeline: Sized {
    fn init(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target_format: wgpu::TextureFormat,
        config: &DemoConfig,
    ) -> Result<Self, InitError>;

    fn render(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        scene: &Scene,
        mode: RenderingMode,
    );
}

/// Per-frame state shared by the shading and visualization shaders.
#[repr(C)]
#[derive(Default, Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct GlobalUniforms {
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    inverse_view_projection: [[f32; 4]; 4],
    camera_position: [f32; 4],
    light_position: [f32; 4],
    light_color: [f32; 4],
    volume_min: [f32; 4],
    settings: [u32; 4],
    volume: [u32; 4],
    visualization: [f32; 4],
}

impl GlobalUniforms {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera: &PerspectiveCamera,
        light: &PointLight,
        bounds: &VolumeBounds,
        layout: &VolumeLayout,
        settings: &Settings,
        visualization_level: u32,
        debug_state: u32,
        viewport: (u32, u32),
    ) -> Self {
        let [lx, ly, lz] = light.position;
        let [lr, lg, lb] = light.color;
        Self {
            view: camera.view().into(),
            projection: camera.projection().into(),
            inverse_view_projection: camera.inverse_view_projection().into(),
            camera_position: [camera.position.x, camera.position.y, camera.position.z, 1.0],
            light_position: [lx, ly, lz, 1.0],
            light_color: [lr, lg, lb, 1.0],
            volume_min: [bounds.min[0], bounds.min[1], bounds.min[2], bounds.extent],
            settings: settings.as_flags(),
            volume: [layout.size(), layout.mip_count(), 1, debug_state],
            visualization: [visualization_level as f32, viewport.0 as f32, viewport.1 as f32, 0.0],
        }
    }
}

/// Owns the voxel volume, every pipeline and the voxelization schedule, and
/// orders each frame: voxelize, rebuild mips, then run the selected consumer.
pub struct Graphics {
    voxel_texture: VoxelTexture,
    voxel_camera: OrthographicVoxelCamera,
    mesh_layouts: MeshLayouts,
    dominant_axis: DominantAxisPass,
    voxelization: VoxelizationPipeline,
    cone_tracing: ConeTracingPass,
    visualization: VisualizationPass,
    globals: wgpu::Buffer,
    sampling_bind_group: wgpu::BindGroup,

    state: VoxelizationState,
    settings: Settings,
    projection_mode: ProjectionMode,
    visualization_level: u32,
    debug_state: u32,
    viewport: (u32, u32),
}

impl Graphics {
    pub fn new(
        device: &wgpu::Device,
        target_format: wgpu::TextureFormat,
        config: &DemoConfig,
    ) -> Result<Self, InitError> {
        config.validate()?;
        let state = VoxelizationState::new(&config.voxelization)?;
        let layout = VolumeLayout::new(config.voxelization.voxel_texture_size)?;
        layout.check_limits(&device.limits())?;

        let voxel_texture = VoxelTexture::new(device, layout);
        let voxel_camera = OrthographicVoxelCamera::new(VolumeBounds::default());
        let mesh_layouts = MeshLayouts::new(device);
        let dominant_axis = DominantAxisPass::new(device, &mesh_layouts);
        let voxelization = VoxelizationPipeline::new(device, &mesh_layouts, &voxel_texture);

        let globals = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Global Uniform Buffer"),
            contents: bytemuck::cast_slice(&[GlobalUniforms::default()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let sampling_layout = sampling_bind_group_layout(device);
        let sampling_bind_group = voxel_texture.create_sampling_bind_group(device, &sampling_layout, &globals);

        let viewport = (config.viewport_width, config.viewport_height);
        let cone_tracing = ConeTracingPass::new(
            device,
            target_format,
            &sampling_layout,
            &mesh_layouts,
            viewport.0,
            viewport.1,
        );
        let visualization = VisualizationPass::new(device, target_format, &sampling_layout);

        Ok(Self {
            voxel_texture,
            voxel_camera,
            mesh_layouts,
            dominant_axis,
            voxelization,
            cone_tracing,
            visualization,
            globals,
            sampling_bind_group,
            state,
            settings: config.settings,
            projection_mode: config.voxelization.projection_mode,
            visualization_level: 0,
            debug_state: 0,
            viewport,
        })
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
        self.cone_tracing.resize(device, self.viewport.0, self.viewport.1);
    }

    pub fn mesh_layouts(&self) -> &MeshLayouts {
        &self.mesh_layouts
    }

    pub fn voxel_texture(&self) -> &VoxelTexture {
        &self.voxel_texture
    }

    pub fn voxelization_state(&self) -> &VoxelizationState {
        &self.state
    }

    pub fn voxelization_state_mut(&mut self) -> &mut VoxelizationState {
        &mut self.state
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn projection_mode(&self) -> ProjectionMode {
        self.projection_mode
    }

    /// Changing the mode queues a voxelization, since the volume's contents
    /// depend on it.
    pub fn set_projection_mode(&mut self, mode: ProjectionMode) {
        if mode != self.projection_mode {
            self.state.queue_voxelization();
        }
        self.projection_mode = mode;
    }

    pub fn visualization_level(&self) -> u32 {
        self.visualization_level
    }

    /// Clamped to the coarsest pyramid level.
    pub fn set_visualization_level(&mut self, level: u32) {
        self.visualization_level = level.min(self.voxel_texture.layout().mip_count() - 1);
    }

    pub fn cycle_debug_state(&mut self) {
        self.debug_state = (self.debug_state + 1) % 2;
    }

    fn update_globals(&self, queue: &wgpu::Queue, scene: &Scene) {
        let uniforms = GlobalUniforms::new(
            &scene.camera,
            &scene.light,
            &self.voxel_camera.bounds(),
            &self.voxel_texture.layout(),
            &self.settings,
            self.visualization_level,
            self.debug_state,
            self.viewport,
        );
        queue.write_buffer(&self.globals, 0, bytemuck::cast_slice(&[uniforms]));
    }

    /// Runs a voxelization pass if the schedule says one is due this frame.
    /// Returns whether the scene was voxelized.
    pub fn voxelize(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        scene: &Scene,
        clear_first: bool,
    ) -> bool {
        if !self.state.advance() {
            return false;
        }
        self.state.begin();

        self.voxelization
            .update_uniforms(queue, &self.voxel_camera, &scene.light, self.projection_mode);
        if clear_first {
            self.voxel_texture.clear(queue, encoder, VOXEL_CLEAR_VALUE);
        }
        if self.projection_mode == ProjectionMode::DominantAxis {
            self.dominant_axis.record(encoder, scene.enabled_renderers());
        }
        self.voxelization.record(encoder, scene.enabled_renderers());
        self.voxel_texture.resolve(encoder);

        self.state.finish();
        log::trace!("Voxelized {} mesh renderers", scene.enabled_renderers().count());
        true
    }

    /// Rebuilds the anisotropic mip pyramid after an automatic voxelization or
    /// when a regeneration was queued. Returns whether mips were generated.
    pub fn generate_mipmaps_if_requested(&mut self, encoder: &mut wgpu::CommandEncoder, voxelized: bool) -> bool {
        if !self.state.take_mipmap_request(voxelized) {
            return false;
        }
        self.voxel_texture.generate_mips(encoder);
        true
    }

    fn render_voxel_visualization(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Voxel Visualization Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.visualization.record(&mut rpass, &self.sampling_bind_group);
    }
}

impl FramePipeline for Graphics {
    fn init(
        device: &wgpu::Device,
        _queue: &wgpu::Queue,
        target_format: wgpu::TextureFormat,
        config: &DemoConfig,
    ) -> Result<Self, InitError> {
        Graphics::new(device, target_format, config)
    }

    fn render(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        scene: &Scene,
        mode: RenderingMode,
    ) {
        self.update_globals(queue, scene);
        let voxelized = self.voxelize(queue, encoder, scene, true);
        self.generate_mipmaps_if_requested(encoder, voxelized);

        match mode {
            RenderingMode::VoxelConeTracing => {
                self.cone_tracing
                    .record(encoder, target, &self.sampling_bind_group, scene.enabled_renderers());
            }
            RenderingMode::VoxelizationVisualization => {
                self.render_voxel_visualization(encoder, target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Point3;

    #[test]
    fn global_uniforms_match_shader_layout() {
        // 3 mat4x4 + 7 vec4
        assert_eq!(std::mem::size_of::<GlobalUniforms>(), 3 * 64 + 7 * 16);
        assert_eq!(std::mem::size_of::<GlobalUniforms>() % 16, 0);
    }

    #[test]
    fn global_uniforms_carry_settings_and_volume() {
        let camera = PerspectiveCamera::new(Point3::new(0.0, 0.0, 3.0), Point3::new(0.0, 0.0, 0.0), 1.0);
        let light = PointLight {
            position: [0.1, 0.2, 0.3],
            color: [1.0, 0.5, 0.25],
        };
        let settings = Settings {
            shadows: false,
            ..Default::default()
        };
        let layout = VolumeLayout::new(64).unwrap();
        let uniforms = GlobalUniforms::new(
            &camera,
            &light,
            &VolumeBounds::default(),
            &layout,
            &settings,
            3,
            0,
            (800, 600),
        );
        assert_eq!(uniforms.settings, [1, 1, 1, 0]);
        assert_eq!(uniforms.volume, [64, 7, 1, 0]);
        assert_eq!(uniforms.light_position, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(uniforms.volume_min, [-1.0, -1.0, -1.0, 2.0]);
        assert_eq!(uniforms.visualization, [3.0, 800.0, 600.0, 0.0]);
        assert_eq!(uniforms.camera_position, [0.0, 0.0, 3.0, 1.0]);
    }
}

use std::borrow::Cow;

/// Full-screen pass that ray marches the voxel volume so its contents can be
/// inspected directly, one pyramid level at a time.
pub struct VisualizationPass {
    pipeline: wgpu::RenderPipeline,
}

impl VisualizationPass {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, sampling_layout: &wgpu::BindGroupLayout) -> Self {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Visualization Pipeline Layout"),
            bind_group_layouts: &[sampling_layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Visualization Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(concat!(
                include_str!("globals.wgsl"),
                include_str!("voxel_sampling.wgsl"),
                include_str!("visualization.wgsl")
            ))),
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Visualization Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_fullscreen"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_visualize"),
                compilation_options: Default::default(),
                targets: &[Some(format.into())],
            }),
            primitive: wgpu::PrimitiveState {
                topology: Default::default(),
                strip_index_format: None,
                front_face: Default::default(),
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: Default::default(),
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self { pipeline }
    }
}

impl<'a> VisualizationPass {
    pub fn record<'pass>(&'a self, rpass: &mut wgpu::RenderPass<'pass>, sampling_bind_group: &'a wgpu::BindGroup)
    where
        'a: 'pass,
    {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, sampling_bind_group, &[]);
        rpass.draw(0..3, 0..1);
    }
}

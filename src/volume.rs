use wgpu::util::DeviceExt;

use crate::error::{ConfigError, InitError, ReadbackError};

/// Largest edge whose accumulation buffer fits the default storage binding limit.
pub const MAX_VOXEL_TEXTURE_SIZE: u32 = 128;
pub const VOXEL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// `r, g, b, a` sums plus a sample count, per voxel.
pub const ACCUMULATION_CHANNELS: u64 = 5;

const WORKGROUP_EDGE: u32 = 4;

/// Edge length of the voxel volume and the shape of its mip pyramid.
///
/// Level 0 is `size³`. Levels `1..mip_count` live in the six directional
/// textures, whose own level `k` corresponds to pyramid level `k + 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VolumeLayout {
    size: u32,
}

impl VolumeLayout {
    pub fn new(size: u32) -> Result<Self, ConfigError> {
        if !size.is_power_of_two() {
            return Err(ConfigError::VoxelSizeNotPowerOfTwo(size));
        }
        if size < 2 {
            return Err(ConfigError::VoxelSizeTooSmall(size));
        }
        if size > MAX_VOXEL_TEXTURE_SIZE {
            return Err(ConfigError::VoxelSizeTooLarge {
                size,
                max: MAX_VOXEL_TEXTURE_SIZE,
            });
        }
        Ok(Self { size })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of pyramid levels including level 0, down to a single voxel.
    pub fn mip_count(&self) -> u32 {
        self.size.trailing_zeros() + 1
    }

    pub fn directional_levels(&self) -> u32 {
        self.mip_count() - 1
    }

    pub fn level_size(&self, level: u32) -> u32 {
        self.size >> level
    }

    pub fn voxel_count(&self) -> u64 {
        let size = self.size as u64;
        size * size * size
    }

    pub fn accumulation_bytes(&self) -> u64 {
        self.voxel_count() * ACCUMULATION_CHANNELS * 4
    }

    /// Checks the accumulation buffer and the 3D textures against what the
    /// device actually grants.
    pub fn check_limits(&self, limits: &wgpu::Limits) -> Result<(), InitError> {
        if self.size > limits.max_texture_dimension_3d {
            return Err(InitError::VolumeTextureTooLarge {
                size: self.size,
                max: limits.max_texture_dimension_3d,
            });
        }
        let bytes = self.accumulation_bytes();
        let limit = limits
            .max_buffer_size
            .min(limits.max_storage_buffer_binding_size as u64);
        if bytes > limit {
            return Err(InitError::AccumulationBufferTooLarge {
                size: self.size,
                bytes,
                limit,
            });
        }
        Ok(())
    }
}

/// Principal travel direction stored by one of the anisotropic mip textures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoxelFace {
    PosX = 0,
    NegX = 1,
    PosY = 2,
    NegY = 3,
    PosZ = 4,
    NegZ = 5,
}

impl VoxelFace {
    pub const ALL: [VoxelFace; 6] = [
        VoxelFace::PosX,
        VoxelFace::NegX,
        VoxelFace::PosY,
        VoxelFace::NegY,
        VoxelFace::PosZ,
        VoxelFace::NegZ,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn axis(self) -> usize {
        self.index() / 2
    }

    pub fn is_positive(self) -> bool {
        self.index() % 2 == 0
    }

    fn label(self) -> &'static str {
        match self {
            VoxelFace::PosX => "+X",
            VoxelFace::NegX => "-X",
            VoxelFace::PosY => "+Y",
            VoxelFace::NegY => "-Y",
            VoxelFace::PosZ => "+Z",
            VoxelFace::NegZ => "-Z",
        }
    }
}

/// World-space cube covered by the voxel volume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeBounds {
    pub min: [f32; 3],
    pub extent: f32,
}

impl Default for VolumeBounds {
    fn default() -> Self {
        Self {
            min: [-1.0, -1.0, -1.0],
            extent: 2.0,
        }
    }
}

impl VolumeBounds {
    pub fn center(&self) -> [f32; 3] {
        let half = self.extent * 0.5;
        [self.min[0] + half, self.min[1] + half, self.min[2] + half]
    }

    pub fn half_extent(&self) -> f32 {
        self.extent * 0.5
    }

    /// Maps a world position into voxel units `[0, size)` on every axis.
    pub fn world_to_voxel(&self, position: [f32; 3], size: u32) -> [f32; 3] {
        let scale = size as f32 / self.extent;
        [
            (position[0] - self.min[0]) * scale,
            (position[1] - self.min[1]) * scale,
            (position[2] - self.min[2]) * scale,
        ]
    }
}

fn dispatch_size(edge: u32) -> u32 {
    edge.div_ceil(WORKGROUP_EDGE)
}

fn single_level_view(texture: &wgpu::Texture, level: u32) -> wgpu::TextureView {
    texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("Voxel Level View"),
        dimension: Some(wgpu::TextureViewDimension::D3),
        base_mip_level: level,
        mip_level_count: Some(1),
        ..Default::default()
    })
}

fn storage_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: VOXEL_FORMAT,
            view_dimension: wgpu::TextureViewDimension::D3,
        },
        count: None,
    }
}

fn sampled_volume_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D3,
            multisampled: false,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

const SAMPLING_GLOBALS_IDX: u32 = 0;
const SAMPLING_SAMPLER_IDX: u32 = 1;
const SAMPLING_BASE_IDX: u32 = 2;
const SAMPLING_FIRST_FACE_IDX: u32 = 3;

/// Layout shared by every pass that reads the voxel pyramid: global uniforms,
/// a trilinear sampler, level 0 and the six directional textures.
pub fn sampling_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let mut entries = vec![
        uniform_entry(SAMPLING_GLOBALS_IDX, wgpu::ShaderStages::VERTEX_FRAGMENT),
        wgpu::BindGroupLayoutEntry {
            binding: SAMPLING_SAMPLER_IDX,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
        sampled_volume_entry(SAMPLING_BASE_IDX, wgpu::ShaderStages::FRAGMENT),
    ];
    for face in VoxelFace::ALL {
        entries.push(sampled_volume_entry(
            SAMPLING_FIRST_FACE_IDX + face.index() as u32,
            wgpu::ShaderStages::FRAGMENT,
        ));
    }
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Voxel Sampling Bind Group Layout"),
        entries: &entries,
    })
}

#[repr(C)]
#[derive(Default, Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ClearUniform {
    color: [f32; 4],
}

#[repr(C)]
#[derive(Default, Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct MipUniform {
    face: u32,
    _pad: [u32; 3],
}

struct MipStep {
    bind_group: wgpu::BindGroup,
    target_size: u32,
}

/// The voxel radiance/opacity volume and its anisotropic mip pyramid.
///
/// Owns the compute pipelines that clear it, resolve voxelization samples into
/// level 0 and filter the coarser levels.
pub struct VoxelTexture {
    layout: VolumeLayout,
    base: wgpu::Texture,
    faces: Vec<wgpu::Texture>,
    base_view: wgpu::TextureView,
    face_views: Vec<wgpu::TextureView>,
    sampler: wgpu::Sampler,
    accumulation: wgpu::Buffer,

    clear_uniform: wgpu::Buffer,
    clear_pipeline: wgpu::ComputePipeline,
    // (bind group, edge length) for level 0 followed by every directional level
    clear_targets: Vec<(wgpu::BindGroup, u32)>,

    resolve_pipeline: wgpu::ComputePipeline,
    resolve_bind_group: wgpu::BindGroup,

    mip_pipeline: wgpu::ComputePipeline,
    // ordered by level, then face
    mip_steps: Vec<MipStep>,
}

impl VoxelTexture {
    pub fn new(device: &wgpu::Device, layout: VolumeLayout) -> Self {
        let size = layout.size();
        let usage = wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC;

        let base = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Voxel Texture Level 0"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: size,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: VOXEL_FORMAT,
            usage,
            view_formats: &[],
        });
        let faces: Vec<wgpu::Texture> = VoxelFace::ALL
            .iter()
            .map(|face| {
                let label = format!("Voxel Texture {}", face.label());
                device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(&label),
                    size: wgpu::Extent3d {
                        width: size / 2,
                        height: size / 2,
                        depth_or_array_layers: size / 2,
                    },
                    mip_level_count: layout.directional_levels(),
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D3,
                    format: VOXEL_FORMAT,
                    usage,
                    view_formats: &[],
                })
            })
            .collect();

        let base_view = base.create_view(&wgpu::TextureViewDescriptor::default());
        let face_views = faces
            .iter()
            .map(|texture| texture.create_view(&wgpu::TextureViewDescriptor::default()))
            .collect();

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Voxel Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let accumulation = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Voxel Accumulation Buffer"),
            size: layout.accumulation_bytes(),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Clear
        let clear_uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Voxel Clear Uniform Buffer"),
            contents: bytemuck::cast_slice(&[ClearUniform::default()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let clear_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Voxel Clear Bind Group Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                storage_texture_entry(1),
            ],
        });
        let clear_pipeline = create_compute_pipeline(
            device,
            "Voxel Clear Pipeline",
            &clear_layout,
            wgpu::include_wgsl!("voxel_clear.wgsl"),
            "clear_volume",
        );
        let mut clear_targets = Vec::new();
        let mut push_clear_target = |view: wgpu::TextureView, edge: u32| {
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Voxel Clear Bind Group"),
                layout: &clear_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: clear_uniform.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                ],
            });
            clear_targets.push((bind_group, edge));
        };
        push_clear_target(single_level_view(&base, 0), size);
        for texture in &faces {
            for level in 0..layout.directional_levels() {
                push_clear_target(single_level_view(texture, level), layout.level_size(level + 1));
            }
        }

        // Resolve
        let resolve_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Voxel Resolve Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_texture_entry(1),
            ],
        });
        let resolve_pipeline = create_compute_pipeline(
            device,
            "Voxel Resolve Pipeline",
            &resolve_layout,
            wgpu::include_wgsl!("voxel_resolve.wgsl"),
            "resolve_volume",
        );
        let base_storage_view = single_level_view(&base, 0);
        let resolve_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Voxel Resolve Bind Group"),
            layout: &resolve_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: accumulation.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&base_storage_view),
                },
            ],
        });

        // Mips
        let mip_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Voxel Mip Bind Group Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                sampled_volume_entry(1, wgpu::ShaderStages::COMPUTE),
                storage_texture_entry(2),
            ],
        });
        let mip_pipeline = create_compute_pipeline(
            device,
            "Voxel Mip Pipeline",
            &mip_layout,
            wgpu::include_wgsl!("voxel_mip.wgsl"),
            "downsample_directional",
        );
        let face_uniforms: Vec<wgpu::Buffer> = VoxelFace::ALL
            .iter()
            .map(|face| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Voxel Mip Face Uniform Buffer"),
                    contents: bytemuck::cast_slice(&[MipUniform {
                        face: face.index() as u32,
                        _pad: [0; 3],
                    }]),
                    usage: wgpu::BufferUsages::UNIFORM,
                })
            })
            .collect();
        let mut mip_steps = Vec::new();
        for level in 0..layout.directional_levels() {
            for face in VoxelFace::ALL {
                let source = if level == 0 {
                    single_level_view(&base, 0)
                } else {
                    single_level_view(&faces[face.index()], level - 1)
                };
                let target = single_level_view(&faces[face.index()], level);
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Voxel Mip Bind Group"),
                    layout: &mip_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: face_uniforms[face.index()].as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(&source),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(&target),
                        },
                    ],
                });
                mip_steps.push(MipStep {
                    bind_group,
                    target_size: layout.level_size(level + 1),
                });
            }
        }

        log::info!(
            "Created {size}^3 voxel texture with {} pyramid levels",
            layout.mip_count()
        );

        Self {
            layout,
            base,
            faces,
            base_view,
            face_views,
            sampler,
            accumulation,
            clear_uniform,
            clear_pipeline,
            clear_targets,
            resolve_pipeline,
            resolve_bind_group,
            mip_pipeline,
            mip_steps,
        }
    }

    pub fn layout(&self) -> VolumeLayout {
        self.layout
    }

    pub fn accumulation_buffer(&self) -> &wgpu::Buffer {
        &self.accumulation
    }

    /// Resets level 0, every directional level and the accumulation buffer.
    pub fn clear(&self, queue: &wgpu::Queue, encoder: &mut wgpu::CommandEncoder, clear_value: [f32; 4]) {
        queue.write_buffer(
            &self.clear_uniform,
            0,
            bytemuck::cast_slice(&[ClearUniform { color: clear_value }]),
        );
        encoder.clear_buffer(&self.accumulation, 0, None);

        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Voxel Clear Pass"),
            timestamp_writes: None,
        });
        cpass.set_pipeline(&self.clear_pipeline);
        for (bind_group, edge) in &self.clear_targets {
            let groups = dispatch_size(*edge);
            cpass.set_bind_group(0, bind_group, &[]);
            cpass.dispatch_workgroups(groups, groups, groups);
        }
    }

    /// Writes the averaged accumulation samples into level 0. Voxels that
    /// received no samples keep their previous value.
    pub fn resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        let groups = dispatch_size(self.layout.size());
        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Voxel Resolve Pass"),
            timestamp_writes: None,
        });
        cpass.set_pipeline(&self.resolve_pipeline);
        cpass.set_bind_group(0, &self.resolve_bind_group, &[]);
        cpass.dispatch_workgroups(groups, groups, groups);
    }

    /// Rebuilds every directional level from level 0, finest first.
    pub fn generate_mips(&self, encoder: &mut wgpu::CommandEncoder) {
        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Voxel Mip Pass"),
            timestamp_writes: None,
        });
        cpass.set_pipeline(&self.mip_pipeline);
        for step in &self.mip_steps {
            let groups = dispatch_size(step.target_size);
            cpass.set_bind_group(0, &step.bind_group, &[]);
            cpass.dispatch_workgroups(groups, groups, groups);
        }
    }

    pub fn create_sampling_bind_group(
        &self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        globals: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: SAMPLING_GLOBALS_IDX,
                resource: globals.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: SAMPLING_SAMPLER_IDX,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
            wgpu::BindGroupEntry {
                binding: SAMPLING_BASE_IDX,
                resource: wgpu::BindingResource::TextureView(&self.base_view),
            },
        ];
        for face in VoxelFace::ALL {
            entries.push(wgpu::BindGroupEntry {
                binding: SAMPLING_FIRST_FACE_IDX + face.index() as u32,
                resource: wgpu::BindingResource::TextureView(&self.face_views[face.index()]),
            });
        }
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Voxel Sampling Bind Group"),
            layout,
            entries: &entries,
        })
    }

    /// Copies one pyramid level back to the CPU as RGBA8 texels in x-fastest order.
    ///
    /// `level` 0 is the isotropic base; `face` is ignored there and required above it.
    pub fn read_level(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        face: VoxelFace,
        level: u32,
    ) -> Result<Vec<[u8; 4]>, ReadbackError> {
        let (texture, mip_level) = if level == 0 {
            (&self.base, 0)
        } else {
            (&self.faces[face.index()], level - 1)
        };
        let edge = self.layout.level_size(level);
        let unpadded_row = edge * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row = unpadded_row.div_ceil(align) * align;

        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Voxel Readback Buffer"),
            size: (padded_row * edge * edge) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Voxel Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(edge),
                },
            },
            wgpu::Extent3d {
                width: edge,
                height: edge,
                depth_or_array_layers: edge,
            },
        );
        queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|err| ReadbackError::BufferMapping(format!("channel closed: {err}")))?
            .map_err(|err| ReadbackError::BufferMapping(format!("{err:?}")))?;

        let data = slice.get_mapped_range();
        let mut texels = Vec::with_capacity((edge * edge * edge) as usize);
        for row in data.chunks(padded_row as usize) {
            for texel in row[..unpadded_row as usize].chunks_exact(4) {
                texels.push([texel[0], texel[1], texel[2], texel[3]]);
            }
        }
        drop(data);
        readback.unmap();
        Ok(texels)
    }
}

fn create_compute_pipeline(
    device: &wgpu::Device,
    label: &str,
    bind_group_layout: &wgpu::BindGroupLayout,
    shader: wgpu::ShaderModuleDescriptor,
    entry_point: &str,
) -> wgpu::ComputePipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });
    let module = device.create_shader_module(shader);
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        module: &module,
        entry_point: Some(entry_point),
        compilation_options: Default::default(),
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_of_64_has_seven_levels() {
        let layout = VolumeLayout::new(64).unwrap();
        assert_eq!(layout.mip_count(), 7);
        assert_eq!(layout.directional_levels(), 6);
        assert_eq!(layout.level_size(0), 64);
        assert_eq!(layout.level_size(1), 32);
        assert_eq!(layout.level_size(6), 1);
        assert_eq!(layout.voxel_count(), 64 * 64 * 64);
    }

    #[test]
    fn layout_rejects_bad_sizes() {
        assert_eq!(VolumeLayout::new(0), Err(ConfigError::VoxelSizeNotPowerOfTwo(0)));
        assert_eq!(VolumeLayout::new(96), Err(ConfigError::VoxelSizeNotPowerOfTwo(96)));
        assert_eq!(VolumeLayout::new(1), Err(ConfigError::VoxelSizeTooSmall(1)));
        assert_eq!(
            VolumeLayout::new(512),
            Err(ConfigError::VoxelSizeTooLarge { size: 512, max: MAX_VOXEL_TEXTURE_SIZE })
        );
    }

    #[test]
    fn largest_volume_fits_default_limits() {
        let limits = wgpu::Limits::default();
        let largest = VolumeLayout::new(MAX_VOXEL_TEXTURE_SIZE).unwrap();
        assert!(largest.accumulation_bytes() <= limits.max_storage_buffer_binding_size as u64);
        assert!(largest.check_limits(&limits).is_ok());
        assert!(largest.check_limits(&wgpu::Limits::downlevel_defaults()).is_ok());
        assert_eq!(
            VolumeLayout::new(MAX_VOXEL_TEXTURE_SIZE * 2),
            Err(ConfigError::VoxelSizeTooLarge {
                size: MAX_VOXEL_TEXTURE_SIZE * 2,
                max: MAX_VOXEL_TEXTURE_SIZE
            })
        );
    }

    #[test]
    fn small_device_limits_are_reported() {
        let layout = VolumeLayout::new(128).unwrap();
        let limits = wgpu::Limits {
            max_storage_buffer_binding_size: 32 << 20,
            ..wgpu::Limits::default()
        };
        match layout.check_limits(&limits) {
            Err(InitError::AccumulationBufferTooLarge { size, bytes, limit }) => {
                assert_eq!(size, 128);
                assert_eq!(bytes, 128 * 128 * 128 * 5 * 4);
                assert_eq!(limit, 32 << 20);
            }
            other => panic!("expected an accumulation size error, got {other:?}"),
        }

        let limits = wgpu::Limits {
            max_texture_dimension_3d: 64,
            ..wgpu::Limits::default()
        };
        assert!(matches!(
            layout.check_limits(&limits),
            Err(InitError::VolumeTextureTooLarge { size: 128, max: 64 })
        ));
        assert!(VolumeLayout::new(64).unwrap().check_limits(&limits).is_ok());
    }

    #[test]
    fn faces_pair_up_per_axis() {
        for face in VoxelFace::ALL {
            assert_eq!(VoxelFace::ALL[face.index()], face);
        }
        assert_eq!(VoxelFace::NegY.axis(), 1);
        assert!(VoxelFace::PosZ.is_positive());
        assert!(!VoxelFace::NegX.is_positive());
    }

    #[test]
    fn world_to_voxel_maps_bounds_onto_grid() {
        let bounds = VolumeBounds::default();
        assert_eq!(bounds.world_to_voxel([-1.0, -1.0, -1.0], 64), [0.0, 0.0, 0.0]);
        assert_eq!(bounds.world_to_voxel([1.0, 0.0, 1.0], 64), [64.0, 32.0, 64.0]);
        assert_eq!(bounds.center(), [0.0, 0.0, 0.0]);
    }
}

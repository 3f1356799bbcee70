use cgmath::Point3;
use voxel_cone_tracing::app::{App, AppCommand};
use voxel_cone_tracing::camera::PerspectiveCamera;
use voxel_cone_tracing::config::{
    DemoConfig, ProjectionMode, RenderingMode, VoxelizationConfig, DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH,
};
use voxel_cone_tracing::graphics::{FramePipeline, Graphics};
use voxel_cone_tracing::reference::{Texel, VoxelGrid};
use voxel_cone_tracing::scene::{MaterialSetting, Mesh, MeshRenderer, PointLight, Scene, Transform, VertexData};
use voxel_cone_tracing::volume::{VolumeLayout, VoxelFace, VoxelTexture};

/// A device on a backend that can write every slice of a 3D storage texture.
/// The GL backend binds 3D storage images non-layered, so it is skipped.
fn gpu() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))?;
    if adapter.get_info().backend == wgpu::Backend::Gl {
        return None;
    }
    pollster::block_on(voxel_cone_tracing::request_device(&adapter)).ok()
}

fn index(edge: u32, voxel: [u32; 3]) -> usize {
    (voxel[0] + edge * (voxel[1] + edge * voxel[2])) as usize
}

fn new_encoder(device: &wgpu::Device) -> wgpu::CommandEncoder {
    device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Test Encoder"),
    })
}

fn read(texture: &VoxelTexture, device: &wgpu::Device, queue: &wgpu::Queue, face: VoxelFace, level: u32) -> Vec<[u8; 4]> {
    texture.read_level(device, queue, face, level).unwrap()
}

fn to_texels(texels: &[[u8; 4]]) -> Vec<Texel> {
    texels.iter().map(|t| t.map(|c| c as f32 / 255.0)).collect()
}

fn test_camera() -> PerspectiveCamera {
    PerspectiveCamera::new(Point3::new(0.0, 0.0, 3.0), Point3::new(0.0, 0.0, 0.0), 1.0)
}

fn triangle_scene(device: &wgpu::Device, graphics: &Graphics, triangle: [[f32; 3]; 3]) -> Scene {
    let normal = {
        let n = voxel_cone_tracing::dominant_axis::face_normal(triangle);
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        [n[0] / len, n[1] / len, n[2] / len, 0.0]
    };
    let mesh = Mesh {
        vertices: triangle
            .iter()
            .map(|p| VertexData {
                position: [p[0], p[1], p[2], 1.0],
                normal,
            })
            .collect(),
        indices: vec![0, 1, 2],
    };
    let renderer = MeshRenderer::new(
        device,
        graphics.mesh_layouts(),
        "Triangle",
        &mesh,
        Transform::default(),
        MaterialSetting::white(),
    );
    Scene::from_parts(vec![renderer], test_camera(), PointLight::default())
}

/// A red and a green wall in neighbouring voxel slices of a 16³ volume
/// (x = 8 and x = 9), both facing a light on +X.
fn walls_scene(device: &wgpu::Device, graphics: &Graphics) -> Scene {
    let plane = Mesh::plane();
    let wall = |name: &str, x: f32, material: MaterialSetting| {
        MeshRenderer::new(
            device,
            graphics.mesh_layouts(),
            name,
            &plane,
            Transform::new([x, 0.0, 0.0], [0.0, 0.0, -90.0], 0.5),
            material,
        )
    };
    let renderers = vec![
        wall("Red wall", 0.0625, MaterialSetting::red()),
        wall("Green wall", 0.1875, MaterialSetting::green()),
    ];
    let light = PointLight {
        position: [0.9, 0.0, 0.0],
        color: [1.0, 1.0, 1.0],
    };
    Scene::from_parts(renderers, test_camera(), light)
}

fn new_graphics(device: &wgpu::Device, projection_mode: ProjectionMode, size: u32) -> Graphics {
    let config = DemoConfig {
        voxelization: VoxelizationConfig {
            voxel_texture_size: size,
            projection_mode,
            ..Default::default()
        },
        ..Default::default()
    };
    Graphics::new(device, wgpu::TextureFormat::Rgba8Unorm, &config).unwrap()
}

fn target_view(device: &wgpu::Device) -> wgpu::TextureView {
    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Target"),
        size: wgpu::Extent3d {
            width: DEFAULT_VIEWPORT_WIDTH,
            height: DEFAULT_VIEWPORT_HEIGHT,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    target.create_view(&wgpu::TextureViewDescriptor::default())
}

#[test]
fn clear_reaches_every_level() {
    let Some((device, queue)) = gpu() else {
        eprintln!("Skipping GPU test: no GPU available");
        return;
    };
    let layout = VolumeLayout::new(16).unwrap();
    let texture = VoxelTexture::new(&device, layout);

    let mut encoder = new_encoder(&device);
    texture.clear(&queue, &mut encoder, [1.0, 0.2, 0.0, 0.6]);
    queue.submit(Some(encoder.finish()));

    assert!(read(&texture, &device, &queue, VoxelFace::PosX, 0).iter().all(|t| *t == [255, 51, 0, 153]));
    for face in VoxelFace::ALL {
        for level in 1..layout.mip_count() {
            let texels = read(&texture, &device, &queue, face, level);
            assert_eq!(texels.len(), layout.level_size(level).pow(3) as usize);
            assert!(texels.iter().all(|t| *t == [255, 51, 0, 153]), "{face:?} level {level}");
        }
    }
}

#[test]
fn mips_are_idempotent_on_unchanged_level_zero() {
    let Some((device, queue)) = gpu() else {
        eprintln!("Skipping GPU test: no GPU available");
        return;
    };
    let layout = VolumeLayout::new(16).unwrap();
    let texture = VoxelTexture::new(&device, layout);

    let mut encoder = new_encoder(&device);
    texture.clear(&queue, &mut encoder, [0.2, 0.2, 0.0, 0.6]);
    texture.generate_mips(&mut encoder);
    queue.submit(Some(encoder.finish()));
    let first: Vec<Vec<[u8; 4]>> = (1..layout.mip_count())
        .map(|level| read(&texture, &device, &queue, VoxelFace::NegY, level))
        .collect();

    let mut encoder = new_encoder(&device);
    texture.generate_mips(&mut encoder);
    queue.submit(Some(encoder.finish()));
    let second: Vec<Vec<[u8; 4]>> = (1..layout.mip_count())
        .map(|level| read(&texture, &device, &queue, VoxelFace::NegY, level))
        .collect();
    assert_eq!(first, second);
}

#[test]
fn directional_mips_match_the_cpu_filter() {
    let Some((device, queue)) = gpu() else {
        eprintln!("Skipping GPU test: no GPU available");
        return;
    };
    let mut graphics = new_graphics(&device, ProjectionMode::DominantAxis, 16);
    let scene = walls_scene(&device, &graphics);

    let mut encoder = new_encoder(&device);
    assert!(graphics.voxelize(&queue, &mut encoder, &scene, true));
    assert!(graphics.generate_mipmaps_if_requested(&mut encoder, true));
    queue.submit(Some(encoder.finish()));

    let texture = graphics.voxel_texture();
    let layout = texture.layout();
    let base = read(texture, &device, &queue, VoxelFace::PosX, 0);
    assert!(base[index(16, [8, 8, 8])][3] > 0);
    assert!(base[index(16, [9, 8, 8])][3] > 0);

    // Each GPU level is checked against one CPU filter step over the GPU's own
    // finer level, so rounding does not accumulate down the pyramid.
    for face in VoxelFace::ALL {
        for level in 1..layout.mip_count() {
            let source = to_texels(&read(texture, &device, &queue, face, level - 1));
            let expected = VoxelGrid::filter_level(face, &source, layout.level_size(level - 1));
            let actual = read(texture, &device, &queue, face, level);
            assert_eq!(actual.len(), expected.len());
            for (i, (gpu, cpu)) in actual.iter().zip(&expected).enumerate() {
                for channel in 0..4 {
                    let diff = (gpu[channel] as f32 - cpu[channel] * 255.0).abs();
                    assert!(diff <= 1.0, "{face:?} level {level} texel {i} channel {channel}: {gpu:?} vs {cpu:?}");
                }
            }
        }
    }

    // Travelling +X meets the red wall first, travelling -X the green one.
    let pos_x = read(texture, &device, &queue, VoxelFace::PosX, 1)[index(8, [4, 4, 4])];
    let neg_x = read(texture, &device, &queue, VoxelFace::NegX, 1)[index(8, [4, 4, 4])];
    assert!(pos_x[0] > pos_x[1], "{pos_x:?}");
    assert!(neg_x[1] > neg_x[0], "{neg_x:?}");
}

#[test]
fn single_triangle_lands_in_base_and_coarse_levels() {
    let Some((device, queue)) = gpu() else {
        eprintln!("Skipping GPU test: no GPU available");
        return;
    };
    let mut graphics = new_graphics(&device, ProjectionMode::DominantAxis, 64);
    let scene = triangle_scene(&device, &graphics, [[-0.5, -0.5, 0.1], [0.5, -0.5, 0.1], [0.0, 0.5, 0.1]]);

    let mut encoder = new_encoder(&device);
    assert!(graphics.voxelize(&queue, &mut encoder, &scene, true));
    assert!(graphics.generate_mipmaps_if_requested(&mut encoder, true));
    queue.submit(Some(encoder.finish()));

    let texture = graphics.voxel_texture();
    let base = read(texture, &device, &queue, VoxelFace::PosZ, 0);
    // z = 0.1 maps to slice floor(1.1 / 2 * 64) = 35
    assert!(base[index(64, [32, 28, 35])][3] > 0);
    assert_eq!(base[index(64, [32, 28, 20])], [0, 0, 0, 0]);

    let coarse = read(texture, &device, &queue, VoxelFace::PosZ, 1);
    assert!(coarse[index(32, [16, 14, 17])][3] > 0);

    assert_eq!(graphics.voxelization_state().ticks_since_last_voxelization(), 0);
    assert!(!graphics.voxelization_state().voxelization_queued);
}

#[test]
fn dominant_axis_catches_triangles_edge_on_to_z() {
    let Some((device, queue)) = gpu() else {
        eprintln!("Skipping GPU test: no GPU available");
        return;
    };
    let mut graphics = new_graphics(&device, ProjectionMode::DominantAxis, 64);
    // Horizontal triangle at y = 0.3, facing +Y.
    let scene = triangle_scene(&device, &graphics, [[-0.5, 0.3, 0.5], [0.5, 0.3, 0.5], [0.0, 0.3, -0.5]]);

    let mut encoder = new_encoder(&device);
    assert!(graphics.voxelize(&queue, &mut encoder, &scene, true));
    queue.submit(Some(encoder.finish()));

    let base = read(graphics.voxel_texture(), &device, &queue, VoxelFace::PosX, 0);
    // y = 0.3 maps to row floor(1.3 / 2 * 64) = 41
    assert!(base[index(64, [32, 41, 32])][3] > 0);
}

#[test]
fn projection_toggle_queues_a_voxelization() {
    let Some((device, queue)) = gpu() else {
        eprintln!("Skipping GPU test: no GPU available");
        return;
    };
    let mut graphics = new_graphics(&device, ProjectionMode::DominantAxis, 64);
    graphics.voxelization_state_mut().automatically_voxelize = false;
    let scene = triangle_scene(&device, &graphics, [[-0.5, 0.3, 0.5], [0.5, 0.3, 0.5], [0.0, 0.3, -0.5]]);
    let mut app = App::new(graphics, scene, RenderingMode::VoxelizationVisualization);
    let view = target_view(&device);

    app.frame(&device, &queue, &view);
    let base = read(app.graphics().voxel_texture(), &device, &queue, VoxelFace::PosX, 0);
    assert!(base[index(64, [32, 41, 32])][3] > 0);
    assert!(!app.graphics().voxelization_state().voxelization_queued);

    assert!(app.apply(AppCommand::ToggleProjectionMode));
    assert_eq!(app.graphics().projection_mode(), ProjectionMode::SingleAxis);
    assert!(app.graphics().voxelization_state().voxelization_queued);

    // Automatic voxelization is off, so only the queued pass can consume the request.
    app.frame(&device, &queue, &view);
    assert!(!app.graphics().voxelization_state().voxelization_queued);
    assert_eq!(app.graphics().voxelization_state().ticks_since_last_voxelization(), 0);
}

#[test]
fn switching_modes_does_not_voxelize() {
    let Some((device, queue)) = gpu() else {
        eprintln!("Skipping GPU test: no GPU available");
        return;
    };
    let mut graphics = new_graphics(&device, ProjectionMode::DominantAxis, 64);
    graphics.voxelization_state_mut().set_sparsity(3);
    let scene = triangle_scene(&device, &graphics, [[-0.5, -0.5, 0.1], [0.5, -0.5, 0.1], [0.0, 0.5, 0.1]]);
    let view = target_view(&device);

    // The first frame runs the queued initial pass.
    let mut encoder = new_encoder(&device);
    graphics.render(&queue, &mut encoder, &view, &scene, RenderingMode::VoxelConeTracing);
    queue.submit(Some(encoder.finish()));
    assert_eq!(graphics.voxelization_state().ticks_since_last_voxelization(), 0);

    let mut encoder = new_encoder(&device);
    graphics.render(&queue, &mut encoder, &view, &scene, RenderingMode::VoxelizationVisualization);
    queue.submit(Some(encoder.finish()));
    assert_eq!(graphics.voxelization_state().ticks_since_last_voxelization(), 1);
    assert!(!graphics.voxelization_state().voxelization_queued);
}

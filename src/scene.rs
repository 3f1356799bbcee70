use bytemuck::{Pod, Zeroable};
use cgmath::{Deg, Matrix, Matrix4, Point3, SquareMatrix, Vector3};
use wgpu::util::DeviceExt;

use crate::camera::PerspectiveCamera;
use crate::config::SceneKind;

#[repr(C)]
#[derive(Default, Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct VertexData {
    pub position: [f32; 4],
    pub normal: [f32; 4],
}

impl VertexData {
    fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Self {
            position: [position[0], position[1], position[2], 1.0],
            normal: [normal[0], normal[1], normal[2], 0.0],
        }
    }

    pub fn buffer_layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<VertexData>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Triangle list with counter-clockwise, outward-facing winding.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<VertexData>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn triangle_count(&self) -> u32 {
        (self.indices.len() / 3) as u32
    }

    /// Triangle `index` as three object-space positions.
    pub fn triangle(&self, index: usize) -> [[f32; 3]; 3] {
        let corner = |k: usize| {
            let p = self.vertices[self.indices[index * 3 + k] as usize].position;
            [p[0], p[1], p[2]]
        };
        [corner(0), corner(1), corner(2)]
    }

    /// 2x2 quad in the XZ plane facing +Y.
    pub fn plane() -> Self {
        let normal = [0.0, 1.0, 0.0];
        Self {
            vertices: vec![
                VertexData::new([-1.0, 0.0, 1.0], normal),
                VertexData::new([1.0, 0.0, 1.0], normal),
                VertexData::new([1.0, 0.0, -1.0], normal),
                VertexData::new([-1.0, 0.0, -1.0], normal),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Cube spanning `[-1, 1]³` with flat-shaded faces.
    pub fn cube() -> Self {
        // (normal, u, v) with u x v = normal
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ];
        let mut mesh = Mesh::default();
        for (n, u, v) in faces {
            let base = mesh.vertices.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let position = [
                    n[0] + su * u[0] + sv * v[0],
                    n[1] + su * u[1] + sv * v[1],
                    n[2] + su * u[2] + sv * v[2],
                ];
                mesh.vertices.push(VertexData::new(position, n));
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    /// Unit UV sphere.
    pub fn sphere(stacks: u32, slices: u32) -> Self {
        let mut mesh = Mesh::default();
        for i in 0..=stacks {
            let theta = std::f32::consts::PI * i as f32 / stacks as f32;
            for j in 0..=slices {
                let phi = 2.0 * std::f32::consts::PI * j as f32 / slices as f32;
                let p = [theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()];
                mesh.vertices.push(VertexData::new(p, p));
            }
        }
        for i in 0..stacks {
            for j in 0..slices {
                let a = i * (slices + 1) + j;
                let b = a + slices + 1;
                mesh.indices.extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
            }
        }
        mesh
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    /// Euler angles in degrees, applied X then Y then Z.
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    pub fn new(position: [f32; 3], rotation: [f32; 3], scale: f32) -> Self {
        Self {
            position: position.into(),
            rotation: rotation.into(),
            scale: Vector3::new(scale, scale, scale),
        }
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from_angle_z(Deg(self.rotation.z))
            * Matrix4::from_angle_y(Deg(self.rotation.y))
            * Matrix4::from_angle_x(Deg(self.rotation.x))
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn normal_matrix(&self) -> Matrix4<f32> {
        self.matrix()
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or_else(Matrix4::identity)
    }
}

/// Surface description consumed by voxelization and cone tracing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialSetting {
    pub diffuse_color: [f32; 3],
    pub specular_color: [f32; 3],
    pub specular_reflectivity: f32,
    pub diffuse_reflectivity: f32,
    pub emissivity: f32,
    pub specular_diffusion: f32,
    pub transparency: f32,
    pub refractive_index: f32,
}

impl Default for MaterialSetting {
    fn default() -> Self {
        Self::with_color([1.0, 1.0, 1.0])
    }
}

impl MaterialSetting {
    pub fn with_color(diffuse_color: [f32; 3]) -> Self {
        Self {
            diffuse_color,
            specular_color: [1.0, 1.0, 1.0],
            specular_reflectivity: 0.0,
            diffuse_reflectivity: 1.0,
            emissivity: 0.0,
            specular_diffusion: 2.0,
            transparency: 0.0,
            refractive_index: 1.4,
        }
    }

    pub fn white() -> Self {
        Self::with_color([0.97, 0.97, 0.97])
    }

    pub fn cyan() -> Self {
        Self::with_color([0.30, 0.95, 0.93])
    }

    pub fn purple() -> Self {
        Self::with_color([0.97, 0.05, 0.93])
    }

    pub fn red() -> Self {
        Self::with_color([1.0, 0.26, 0.27])
    }

    pub fn green() -> Self {
        Self::with_color([0.27, 1.0, 0.26])
    }

    pub fn blue() -> Self {
        Self::with_color([0.35, 0.38, 1.0])
    }

    pub fn emissive() -> Self {
        Self {
            emissivity: 1.0,
            ..Self::with_color([0.85, 0.9, 1.0])
        }
    }

    pub fn is_emissive(&self) -> bool {
        self.emissivity > 0.00001
    }

    /// Premultiplied texel the voxelization fragment stage writes for a surface
    /// receiving `irradiance` from the point light.
    pub fn voxel_texel(&self, irradiance: [f32; 3]) -> [f32; 4] {
        let emissivity = self.emissivity.clamp(0.0, 1.0);
        let coverage = (1.0 - self.transparency).powi(4) * (1.0 - emissivity);
        let channel = |i: usize| {
            let reflected = (self.diffuse_reflectivity * self.diffuse_color[i]
                + self.specular_reflectivity * self.specular_color[i])
                * irradiance[i];
            (coverage * reflected + emissivity * self.diffuse_color[i]).clamp(0.0, 1.0)
        };
        [channel(0), channel(1), channel(2), coverage.clamp(0.0, 1.0)]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            color: [1.0, 1.0, 1.0],
        }
    }
}

#[repr(C)]
#[derive(Default, Copy, Clone, Debug, Pod, Zeroable)]
pub struct ObjectUniforms {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    diffuse_color: [f32; 4],
    specular_color: [f32; 4],
    reflectivity: [f32; 4],
    optics: [f32; 4],
}

impl ObjectUniforms {
    pub fn new(transform: &Transform, material: &MaterialSetting) -> Self {
        let [dr, dg, db] = material.diffuse_color;
        let [sr, sg, sb] = material.specular_color;
        Self {
            model: transform.matrix().into(),
            normal_matrix: transform.normal_matrix().into(),
            diffuse_color: [dr, dg, db, 1.0],
            specular_color: [sr, sg, sb, 1.0],
            reflectivity: [
                material.specular_reflectivity,
                material.diffuse_reflectivity,
                material.emissivity,
                material.specular_diffusion,
            ],
            optics: [material.transparency, material.refractive_index, 0.0, 0.0],
        }
    }
}

const OBJECT_UNIFORM_IDX: u32 = 0;
const VERTEX_STORAGE_IDX: u32 = 0;
const INDEX_STORAGE_IDX: u32 = 1;
const AXIS_STORAGE_IDX: u32 = 2;

fn storage_entry(binding: u32, visibility: wgpu::ShaderStages, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Bind group layouts every mesh renderer creates its bind groups against.
pub struct MeshLayouts {
    /// Per-object transform and material.
    pub object: wgpu::BindGroupLayout,
    /// Read-only vertices, indices and triangle axes for vertex pulling.
    pub geometry: wgpu::BindGroupLayout,
    /// Same buffers with the triangle axes writable, for the dominant-axis pass.
    pub axis_output: wgpu::BindGroupLayout,
}

impl MeshLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let object = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mesh: Object Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: OBJECT_UNIFORM_IDX,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT | wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let geometry = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mesh: Geometry Bind Group Layout"),
            entries: &[
                storage_entry(VERTEX_STORAGE_IDX, wgpu::ShaderStages::VERTEX, true),
                storage_entry(INDEX_STORAGE_IDX, wgpu::ShaderStages::VERTEX, true),
                storage_entry(AXIS_STORAGE_IDX, wgpu::ShaderStages::VERTEX, true),
            ],
        });
        let axis_output = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mesh: Axis Output Bind Group Layout"),
            entries: &[
                storage_entry(VERTEX_STORAGE_IDX, wgpu::ShaderStages::COMPUTE, true),
                storage_entry(INDEX_STORAGE_IDX, wgpu::ShaderStages::COMPUTE, true),
                storage_entry(AXIS_STORAGE_IDX, wgpu::ShaderStages::COMPUTE, false),
            ],
        });
        Self {
            object,
            geometry,
            axis_output,
        }
    }
}

/// A mesh placed in the scene with its material and GPU buffers.
pub struct MeshRenderer {
    pub name: String,
    pub enabled: bool,
    pub transform: Transform,
    pub material: MaterialSetting,
    index_count: u32,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    object_uniform: wgpu::Buffer,
    object_bind_group: wgpu::BindGroup,
    geometry_bind_group: wgpu::BindGroup,
    axis_output_bind_group: wgpu::BindGroup,
}

impl MeshRenderer {
    pub fn new(
        device: &wgpu::Device,
        layouts: &MeshLayouts,
        name: &str,
        mesh: &Mesh,
        transform: Transform,
        material: MaterialSetting,
    ) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::STORAGE,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::STORAGE,
        });
        // Z until the dominant-axis pass has run.
        let axis_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Triangle Axis Buffer"),
            contents: bytemuck::cast_slice(&vec![2u32; mesh.triangle_count() as usize]),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let object_uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Object Uniform Buffer"),
            contents: bytemuck::cast_slice(&[ObjectUniforms::new(&transform, &material)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let object_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mesh: Object Bind Group"),
            layout: &layouts.object,
            entries: &[wgpu::BindGroupEntry {
                binding: OBJECT_UNIFORM_IDX,
                resource: object_uniform.as_entire_binding(),
            }],
        });
        let geometry_entries = [
            wgpu::BindGroupEntry {
                binding: VERTEX_STORAGE_IDX,
                resource: vertex_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: INDEX_STORAGE_IDX,
                resource: index_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: AXIS_STORAGE_IDX,
                resource: axis_buffer.as_entire_binding(),
            },
        ];
        let geometry_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mesh: Geometry Bind Group"),
            layout: &layouts.geometry,
            entries: &geometry_entries,
        });
        let axis_output_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mesh: Axis Output Bind Group"),
            layout: &layouts.axis_output,
            entries: &geometry_entries,
        });

        Self {
            name: name.to_string(),
            enabled: true,
            transform,
            material,
            index_count: mesh.indices.len() as u32,
            vertex_buffer,
            index_buffer,
            object_uniform,
            object_bind_group,
            geometry_bind_group,
            axis_output_bind_group,
        }
    }

    pub fn upload(&self, queue: &wgpu::Queue) {
        queue.write_buffer(
            &self.object_uniform,
            0,
            bytemuck::cast_slice(&[ObjectUniforms::new(&self.transform, &self.material)]),
        );
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }

    pub fn vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &wgpu::Buffer {
        &self.index_buffer
    }

    pub fn object_bind_group(&self) -> &wgpu::BindGroup {
        &self.object_bind_group
    }

    pub fn geometry_bind_group(&self) -> &wgpu::BindGroup {
        &self.geometry_bind_group
    }

    pub fn axis_output_bind_group(&self) -> &wgpu::BindGroup {
        &self.axis_output_bind_group
    }
}

const ORBIT_RADIUS: f32 = 2.6;
const ORBIT_HEIGHT: f32 = 0.15;
const ORBIT_SPEED: f32 = 0.15;
const ORBIT_SWING: f32 = 0.45;

/// Renderer queue plus the camera and the single point light.
pub struct Scene {
    pub renderers: Vec<MeshRenderer>,
    pub camera: PerspectiveCamera,
    pub light: PointLight,
    lamp: Option<usize>,
}

impl Scene {
    pub fn new(device: &wgpu::Device, layouts: &MeshLayouts, kind: SceneKind, aspect: f32) -> Self {
        let plane = Mesh::plane();
        let cube = Mesh::cube();
        let sphere = Mesh::sphere(24, 32);
        let mut renderers = Vec::new();
        let mut add = |name: &str, mesh: &Mesh, transform: Transform, material: MaterialSetting| {
            renderers.push(MeshRenderer::new(device, layouts, name, mesh, transform, material));
            renderers.len() - 1
        };

        // Open-fronted box just inside the voxel volume.
        let wall = 0.99;
        add("Floor", &plane, Transform::new([0.0, -wall, 0.0], [0.0, 0.0, 0.0], wall), MaterialSetting::white());
        add("Ceiling", &plane, Transform::new([0.0, wall, 0.0], [180.0, 0.0, 0.0], wall), MaterialSetting::white());
        add("Back wall", &plane, Transform::new([0.0, 0.0, -wall], [90.0, 0.0, 0.0], wall), MaterialSetting::white());
        add("Left wall", &plane, Transform::new([-wall, 0.0, 0.0], [0.0, 0.0, -90.0], wall), MaterialSetting::red());
        add("Right wall", &plane, Transform::new([wall, 0.0, 0.0], [0.0, 0.0, 90.0], wall), MaterialSetting::green());

        let lamp = match kind {
            SceneKind::Cornell => {
                add("Block", &cube, Transform::new([-0.4, -0.7, -0.35], [0.0, 25.0, 0.0], 0.28), MaterialSetting::white());
                let mut mirror = MaterialSetting::blue();
                mirror.specular_reflectivity = 0.6;
                mirror.diffuse_reflectivity = 0.4;
                mirror.specular_diffusion = 0.5;
                add("Sphere", &sphere, Transform::new([0.4, -0.66, 0.15], [0.0, 0.0, 0.0], 0.32), mirror);
                add("Pillar", &cube, Transform {
                    position: Vector3::new(0.55, -0.4, -0.6),
                    rotation: Vector3::new(0.0, -15.0, 0.0),
                    scale: Vector3::new(0.15, 0.6, 0.15),
                }, MaterialSetting::cyan());
                Some(add("Lamp", &sphere, Transform::new([0.0, 0.5, 0.0], [0.0, 0.0, 0.0], 0.06), MaterialSetting::emissive()))
            }
            SceneKind::Glass => {
                let mut glass = MaterialSetting::white();
                glass.transparency = 0.9;
                glass.refractive_index = 1.5;
                glass.specular_reflectivity = 0.3;
                glass.specular_diffusion = 0.2;
                add("Glass block", &cube, Transform::new([0.0, -0.55, 0.0], [0.0, 35.0, 0.0], 0.35), glass);
                add("Sphere", &sphere, Transform::new([-0.5, -0.75, -0.5], [0.0, 0.0, 0.0], 0.22), MaterialSetting::purple());
                None
            }
        };

        let camera = PerspectiveCamera::new(Point3::new(0.0, ORBIT_HEIGHT, ORBIT_RADIUS), Point3::new(0.0, 0.0, 0.0), aspect);
        let light = PointLight {
            position: [0.0, 0.5, 0.0],
            color: [1.4, 1.35, 1.3],
        };
        log::info!("Built {kind:?} scene with {} mesh renderers", renderers.len());

        Self {
            renderers,
            camera,
            light,
            lamp,
        }
    }

    /// A scene from already built renderers, with no animated lamp mesh.
    pub fn from_parts(renderers: Vec<MeshRenderer>, camera: PerspectiveCamera, light: PointLight) -> Self {
        Self {
            renderers,
            camera,
            light,
            lamp: None,
        }
    }

    /// Moves the light (and its lamp mesh) and swings the camera, then uploads
    /// every renderer's uniforms.
    pub fn update(&mut self, queue: &wgpu::Queue, time: f32) {
        let light_position = [0.45 * (time * 0.7).sin(), 0.5, 0.3 * (time * 0.5).cos()];
        self.light.position = light_position;
        if let Some(lamp) = self.lamp {
            self.renderers[lamp].transform.position = light_position.into();
        }
        self.camera.orbit(ORBIT_SWING * (time * ORBIT_SPEED).sin(), ORBIT_RADIUS, ORBIT_HEIGHT);

        for renderer in &self.renderers {
            renderer.upload(queue);
        }
    }

    pub fn enabled_renderers(&self) -> impl Iterator<Item = &MeshRenderer> {
        self.renderers.iter().filter(|renderer| renderer.enabled)
    }
}

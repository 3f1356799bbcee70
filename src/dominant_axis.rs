use std::borrow::Cow;

use crate::scene::{MeshLayouts, MeshRenderer};

/// Coordinate axis a triangle is projected along during voxelization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: u32) -> Option<Axis> {
        match index {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            2 => Some(Axis::Z),
            _ => None,
        }
    }

    /// `(u, v, depth)` coordinate indices of the projection plane for this axis.
    pub fn plane_axes(self) -> (usize, usize, usize) {
        match self {
            Axis::X => (1, 2, 0),
            Axis::Y => (2, 0, 1),
            Axis::Z => (0, 1, 2),
        }
    }
}

/// Unnormalized face normal of a counter-clockwise triangle.
pub fn face_normal(triangle: [[f32; 3]; 3]) -> [f32; 3] {
    let [a, b, c] = triangle;
    let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    [
        e1[1] * e2[2] - e1[2] * e2[1],
        e1[2] * e2[0] - e1[0] * e2[2],
        e1[0] * e2[1] - e1[1] * e2[0],
    ]
}

/// Axis most aligned with `normal`. Ties resolve X, then Y, then Z, matching
/// `classify_triangles` in `dominant_axis.wgsl`.
pub fn dominant_axis(normal: [f32; 3]) -> Axis {
    let [x, y, z] = normal.map(f32::abs);
    if x >= y && x >= z {
        Axis::X
    } else if y >= z {
        Axis::Y
    } else {
        Axis::Z
    }
}

const WORKGROUP_SIZE: u32 = 64;

const OBJECT_GROUP_ID: u32 = 0;
const AXIS_OUTPUT_GROUP_ID: u32 = 1;

/// Data-parallel pass writing each triangle's dominant axis into its mesh
/// renderer's axis buffer, one invocation per triangle.
pub struct DominantAxisPass {
    pipeline: wgpu::ComputePipeline,
}

impl DominantAxisPass {
    pub fn new(device: &wgpu::Device, mesh_layouts: &MeshLayouts) -> Self {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Dominant Axis Pipeline Layout"),
            bind_group_layouts: &[&mesh_layouts.object, &mesh_layouts.axis_output],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Dominant Axis Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(concat!(
                include_str!("object.wgsl"),
                include_str!("dominant_axis.wgsl")
            ))),
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Dominant Axis Pipeline"),
            layout: Some(&layout),
            module: &shader,
            entry_point: Some("classify_triangles"),
            compilation_options: Default::default(),
            cache: None,
        });
        Self { pipeline }
    }

    pub fn record<'a>(&self, encoder: &mut wgpu::CommandEncoder, renderers: impl IntoIterator<Item = &'a MeshRenderer>) {
        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Dominant Axis Pass"),
            timestamp_writes: None,
        });
        cpass.set_pipeline(&self.pipeline);
        for renderer in renderers {
            let groups = renderer.triangle_count().div_ceil(WORKGROUP_SIZE);
            cpass.set_bind_group(OBJECT_GROUP_ID, renderer.object_bind_group(), &[]);
            cpass.set_bind_group(AXIS_OUTPUT_GROUP_ID, renderer.axis_output_bind_group(), &[]);
            cpass.dispatch_workgroups(groups, 1, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_largest_component() {
        assert_eq!(dominant_axis([0.9, 0.1, -0.2]), Axis::X);
        assert_eq!(dominant_axis([0.1, -0.8, 0.3]), Axis::Y);
        assert_eq!(dominant_axis([0.0, 0.2, -0.95]), Axis::Z);
    }

    #[test]
    fn sign_does_not_matter() {
        assert_eq!(dominant_axis([-1.0, 0.0, 0.0]), dominant_axis([1.0, 0.0, 0.0]));
        assert_eq!(dominant_axis([0.0, 0.0, -3.0]), Axis::Z);
    }

    #[test]
    fn ties_follow_x_y_z_priority() {
        assert_eq!(dominant_axis([1.0, 1.0, 1.0]), Axis::X);
        assert_eq!(dominant_axis([1.0, -1.0, 0.5]), Axis::X);
        assert_eq!(dominant_axis([0.2, 0.7, -0.7]), Axis::Y);
        assert_eq!(dominant_axis([0.0, 0.0, 0.0]), Axis::X);
    }

    #[test]
    fn counter_clockwise_xy_triangle_faces_positive_z() {
        let normal = face_normal([[0.0, 0.0, 0.3], [1.0, 0.0, 0.3], [0.0, 1.0, 0.3]]);
        assert_eq!(normal, [0.0, 0.0, 1.0]);
        assert_eq!(dominant_axis(normal), Axis::Z);
    }

    #[test]
    fn classification_is_scale_invariant() {
        let normal = [0.3, -0.5, 0.45];
        let scaled = normal.map(|c| c * 17.0);
        assert_eq!(dominant_axis(normal), dominant_axis(scaled));
    }

    #[test]
    fn plane_axes_are_permutations() {
        for axis in Axis::ALL {
            let (u, v, w) = axis.plane_axes();
            assert_eq!(w, axis.index());
            let mut seen = [u, v, w];
            seen.sort();
            assert_eq!(seen, [0, 1, 2]);
            assert_eq!(Axis::from_index(axis.index() as u32), Some(axis));
        }
        assert_eq!(Axis::from_index(3), None);
    }
}

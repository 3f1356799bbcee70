use cgmath::{Deg, InnerSpace, Matrix, Matrix4, Point3, SquareMatrix, Vector3, Vector4};

use crate::dominant_axis::Axis;
use crate::volume::VolumeBounds;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

pub struct PerspectiveCamera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fovy: Deg<f32>,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl PerspectiveCamera {
    pub fn new(position: Point3<f32>, target: Point3<f32>, aspect: f32) -> Self {
        Self {
            position,
            target,
            up: Vector3::unit_y(),
            fovy: Deg(60.0),
            aspect,
            znear: 0.05,
            zfar: 50.0,
        }
    }

    pub fn view(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }

    pub fn inverse_view_projection(&self) -> Matrix4<f32> {
        (self.projection() * self.view())
            .invert()
            .unwrap_or_else(Matrix4::identity)
    }

    /// Places the camera on a horizontal circle around its target.
    pub fn orbit(&mut self, angle: f32, radius: f32, height: f32) {
        self.position = Point3::new(
            self.target.x + radius * angle.sin(),
            self.target.y + height,
            self.target.z + radius * angle.cos(),
        );
    }

    pub fn forward(&self) -> Vector3<f32> {
        (self.target - self.position).normalize()
    }
}

/// One orthographic projection per principal axis, each mapping the voxel
/// volume exactly onto clip space: the two plane axes onto `[-1, 1]` and the
/// projection axis onto depth `[0, 1]`.
pub struct OrthographicVoxelCamera {
    bounds: VolumeBounds,
    view_projections: [Matrix4<f32>; 3],
}

impl OrthographicVoxelCamera {
    pub fn new(bounds: VolumeBounds) -> Self {
        Self {
            bounds,
            view_projections: Axis::ALL.map(|axis| Self::axis_projection(&bounds, axis)),
        }
    }

    fn axis_projection(bounds: &VolumeBounds, axis: Axis) -> Matrix4<f32> {
        let (u, v, w) = axis.plane_axes();
        let center = bounds.center();
        let half = bounds.half_extent();

        let row = |component: usize, scale: f32, offset: f32| {
            let mut row = Vector4::new(0.0, 0.0, 0.0, offset);
            row[component] = scale;
            row
        };
        let rows = [
            row(u, 1.0 / half, -center[u] / half),
            row(v, 1.0 / half, -center[v] / half),
            row(w, 1.0 / bounds.extent, -bounds.min[w] / bounds.extent),
            Vector4::new(0.0, 0.0, 0.0, 1.0),
        ];
        Matrix4::from_cols(rows[0], rows[1], rows[2], rows[3]).transpose()
    }

    pub fn bounds(&self) -> VolumeBounds {
        self.bounds
    }

    pub fn view_projection(&self, axis: Axis) -> Matrix4<f32> {
        self.view_projections[axis.index()]
    }

    pub fn view_projections(&self) -> [[[f32; 4]; 4]; 3] {
        self.view_projections.map(Into::into)
    }
}

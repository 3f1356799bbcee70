//! CPU model of the voxel volume passes.
//!
//! Mirrors `voxel_clear.wgsl`, `voxelization.wgsl` (rasterization and atomic
//! accumulation), `voxel_resolve.wgsl`, `voxel_mip.wgsl` and the cone march of
//! `voxel_sampling.wgsl` in plain Rust so the pyramid's behavior can be checked
//! without a GPU. Cone samples use the nearest texel of the nearest level.

use crate::config::ProjectionMode;
use crate::dominant_axis::{dominant_axis, face_normal, Axis};
use crate::volume::{VolumeBounds, VolumeLayout, VoxelFace, ACCUMULATION_CHANNELS};

/// Premultiplied `r, g, b, opacity`.
pub type Texel = [f32; 4];

const EMPTY: Texel = [0.0; 4];

const MAX_CONE_STEPS: u32 = 256;

fn quantize(value: f32) -> u32 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u32
}

fn composite(front: Texel, back: Texel) -> Texel {
    let transmittance = 1.0 - front[3];
    [
        front[0] + transmittance * back[0],
        front[1] + transmittance * back[1],
        front[2] + transmittance * back[2],
        front[3] + transmittance * back[3],
    ]
}

fn axis_offset(axis: usize, along: u32, a: u32, b: u32) -> [u32; 3] {
    match axis {
        0 => [along, a, b],
        1 => [b, along, a],
        _ => [a, b, along],
    }
}

fn edge_function(a: [f32; 2], b: [f32; 2], c: [f32; 2]) -> f32 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

pub struct VoxelGrid {
    layout: VolumeLayout,
    base: Vec<Texel>,
    // [face][directional level]
    faces: Vec<Vec<Vec<Texel>>>,
    accumulation: Vec<[u32; ACCUMULATION_CHANNELS as usize]>,
}

impl VoxelGrid {
    pub fn new(layout: VolumeLayout) -> Self {
        let count = layout.voxel_count() as usize;
        let faces = VoxelFace::ALL
            .iter()
            .map(|_| {
                (1..layout.mip_count())
                    .map(|level| {
                        let edge = layout.level_size(level) as usize;
                        vec![EMPTY; edge * edge * edge]
                    })
                    .collect()
            })
            .collect();
        Self {
            layout,
            base: vec![EMPTY; count],
            faces,
            accumulation: vec![[0; ACCUMULATION_CHANNELS as usize]; count],
        }
    }

    pub fn layout(&self) -> VolumeLayout {
        self.layout
    }

    fn index(edge: u32, voxel: [u32; 3]) -> usize {
        let edge = edge as usize;
        voxel[0] as usize + edge * (voxel[1] as usize + edge * voxel[2] as usize)
    }

    pub fn clear(&mut self, value: Texel) {
        self.base.fill(value);
        for levels in &mut self.faces {
            for level in levels {
                level.fill(value);
            }
        }
        self.accumulation.fill([0; ACCUMULATION_CHANNELS as usize]);
    }

    /// Adds one fragment's premultiplied color to a voxel's running sums.
    pub fn accumulate(&mut self, voxel: [u32; 3], color: Texel) {
        let slot = &mut self.accumulation[Self::index(self.layout.size(), voxel)];
        for channel in 0..4 {
            slot[channel] += quantize(color[channel]);
        }
        slot[4] += 1;
    }

    pub fn resolve(&mut self) {
        for (texel, slot) in self.base.iter_mut().zip(&self.accumulation) {
            let count = slot[4];
            if count == 0 {
                continue;
            }
            let scale = 1.0 / (255.0 * count as f32);
            *texel = [
                (slot[0] as f32 * scale).min(1.0),
                (slot[1] as f32 * scale).min(1.0),
                (slot[2] as f32 * scale).min(1.0),
                (slot[3] as f32 * scale).min(1.0),
            ];
        }
    }

    /// Rasterizes a world-space triangle into the accumulation buffer the way
    /// the voxelization pipeline does: projected along one axis, one sample per
    /// covered pixel center, depth interpolated across the triangle.
    pub fn voxelize_triangle(
        &mut self,
        bounds: &VolumeBounds,
        triangle: [[f32; 3]; 3],
        color: Texel,
        projection: ProjectionMode,
    ) {
        let axis = match projection {
            ProjectionMode::DominantAxis => dominant_axis(face_normal(triangle)),
            ProjectionMode::SingleAxis => Axis::Z,
        };
        let size = self.layout.size();
        let (ui, vi, wi) = axis.plane_axes();
        let projected = triangle.map(|p| {
            let v = bounds.world_to_voxel(p, size);
            [v[ui], v[vi], v[wi]]
        });
        let [p0, p1, p2] = projected;
        let area = edge_function([p0[0], p0[1]], [p1[0], p1[1]], [p2[0], p2[1]]);
        if area.abs() <= f32::EPSILON {
            return;
        }

        let clamp_to_grid = |value: f32| value.clamp(0.0, size as f32 - 1.0) as u32;
        let u_min = clamp_to_grid(p0[0].min(p1[0]).min(p2[0]).floor());
        let u_max = clamp_to_grid(p0[0].max(p1[0]).max(p2[0]).ceil());
        let v_min = clamp_to_grid(p0[1].min(p1[1]).min(p2[1]).floor());
        let v_max = clamp_to_grid(p0[1].max(p1[1]).max(p2[1]).ceil());

        for j in v_min..=v_max {
            for i in u_min..=u_max {
                let center = [i as f32 + 0.5, j as f32 + 0.5];
                let w0 = edge_function([p1[0], p1[1]], [p2[0], p2[1]], center);
                let w1 = edge_function([p2[0], p2[1]], [p0[0], p0[1]], center);
                let w2 = edge_function([p0[0], p0[1]], [p1[0], p1[1]], center);
                let inside = (w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0)
                    || (w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0);
                if !inside {
                    continue;
                }
                let depth = (w0 * p0[2] + w1 * p1[2] + w2 * p2[2]) / area;
                if depth < 0.0 || depth >= size as f32 {
                    continue;
                }
                let mut voxel = [0; 3];
                voxel[ui] = i;
                voxel[vi] = j;
                voxel[wi] = depth as u32;
                self.accumulate(voxel, color);
            }
        }
    }

    /// Rebuilds every directional level from level 0.
    pub fn generate_mips(&mut self) {
        for level in 1..self.layout.mip_count() {
            let source_edge = self.layout.level_size(level - 1);
            for face in VoxelFace::ALL {
                let source = if level == 1 {
                    &self.base
                } else {
                    &self.faces[face.index()][level as usize - 2]
                };
                let target = Self::filter_level(face, source, source_edge);
                self.faces[face.index()][level as usize - 1] = target;
            }
        }
    }

    /// One step of the directional mip filter: halves a `source_edge³` level
    /// for travel direction `face`.
    pub fn filter_level(face: VoxelFace, source: &[Texel], source_edge: u32) -> Vec<Texel> {
        let edge = source_edge / 2;
        let mut target = vec![EMPTY; (edge * edge * edge) as usize];
        let axis = face.axis();
        let (near, far) = if face.is_positive() { (0, 1) } else { (1, 0) };
        for z in 0..edge {
            for y in 0..edge {
                for x in 0..edge {
                    let origin = [x * 2, y * 2, z * 2];
                    let mut sum = EMPTY;
                    for a in 0..2 {
                        for b in 0..2 {
                            let child = |along| {
                                let offset = axis_offset(axis, along, a, b);
                                let voxel = [
                                    origin[0] + offset[0],
                                    origin[1] + offset[1],
                                    origin[2] + offset[2],
                                ];
                                source[Self::index(source_edge, voxel)]
                            };
                            let column = composite(child(near), child(far));
                            for channel in 0..4 {
                                sum[channel] += column[channel];
                            }
                        }
                    }
                    target[Self::index(edge, [x, y, z])] = sum.map(|c| c * 0.25);
                }
            }
        }
        target
    }

    /// Samples the pyramid at a world position, blending the three directional
    /// textures that face `direction` above level 0.
    pub fn sample(&self, bounds: &VolumeBounds, position: [f32; 3], direction: [f32; 3], level: f32) -> Texel {
        let max_level = self.layout.mip_count() - 1;
        let level = level.clamp(0.0, max_level as f32).round() as u32;
        let edge = self.layout.level_size(level);
        let voxel = bounds
            .world_to_voxel(position, edge)
            .map(|c| (c.max(0.0) as u32).min(edge - 1));
        if level == 0 {
            return self.texel(VoxelFace::PosX, 0, voxel);
        }

        let mut sum = EMPTY;
        let mut total = 0.0f32;
        for (axis, d) in direction.iter().enumerate() {
            let weight = d * d;
            let face = VoxelFace::ALL[axis * 2 + (*d < 0.0) as usize];
            let texel = self.texel(face, level, voxel);
            for channel in 0..4 {
                sum[channel] += weight * texel[channel];
            }
            total += weight;
        }
        sum.map(|c| c / total.max(1e-5))
    }

    /// Marches a cone from `origin` the way `trace_cone` in
    /// `voxel_sampling.wgsl` does and returns the composited premultiplied color.
    pub fn trace_cone(
        &self,
        bounds: &VolumeBounds,
        origin: [f32; 3],
        direction: [f32; 3],
        aperture: f32,
        max_distance: f32,
    ) -> Texel {
        let size = bounds.extent / self.layout.size() as f32;
        let mut acc = EMPTY;
        let mut dist = size * 1.5;
        for _ in 0..MAX_CONE_STEPS {
            if acc[3] >= 0.95 || dist >= max_distance {
                break;
            }
            let position = [
                origin[0] + direction[0] * dist,
                origin[1] + direction[1] * dist,
                origin[2] + direction[2] * dist,
            ];
            let uvw = bounds.world_to_voxel(position, 1);
            if uvw.iter().any(|c| !(0.0..=1.0).contains(c)) {
                break;
            }
            let diameter = size.max(2.0 * aperture * dist);
            let texel = self.sample(bounds, position, direction, (diameter / size).log2());
            acc = composite(acc, texel);
            dist += diameter * 0.5;
        }
        acc
    }

    /// Texel of pyramid level `level`; `face` is ignored for level 0.
    pub fn texel(&self, face: VoxelFace, level: u32, voxel: [u32; 3]) -> Texel {
        self.level(face, level)[Self::index(self.layout.level_size(level), voxel)]
    }

    pub fn level(&self, face: VoxelFace, level: u32) -> &[Texel] {
        if level == 0 {
            &self.base
        } else {
            &self.faces[face.index()][level as usize - 1]
        }
    }
}

//! Point lights and the per-frame cluster assignment.
//!
//! The light set lives in one storage buffer: a rest pose seeded host-side,
//! drifted each frame by the move kernel, then bucketed into view-frustum
//! clusters by the clustering kernel. Both buffers are rebuilt on the GPU
//! every frame; the host only ever writes the rest pose and the count.

use crate::shaders::{
    self, CLUSTER_SET_SIZE, CLUSTER_X, CLUSTER_Y, CLUSTER_Z, LIGHT_RADIUS, LIGHT_SET_SIZE,
    MAX_CLUSTER_LIGHTS, MAX_LIGHTS,
};
use glam::{Vec2, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use wgpu::util::DeviceExt;

/// Host copy of the WGSL `Light`.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Light {
    pub position: [f32; 3],
    pub _pad0: f32,
    pub color: [f32; 3],
    pub intensity: f32,
}

const _: [(); shaders::LIGHT_STRIDE] = [(); std::mem::size_of::<Light>()];

pub struct LightsStage {
    count: u32,
    count_buf: wgpu::Buffer,
    pub light_buf: wgpu::Buffer,
    pub cluster_buf: wgpu::Buffer,
    move_pipeline: wgpu::ComputePipeline,
    move_bind: wgpu::BindGroup,
    cluster_pipeline: wgpu::ComputePipeline,
    cluster_bind: wgpu::BindGroup,
}

impl LightsStage {
    pub fn new(
        device: &wgpu::Device,
        camera_buf: &wgpu::Buffer,
        time_buf: &wgpu::Buffer,
        num_lights: u32,
    ) -> Self {
        let count = num_lights.min(MAX_LIGHTS as u32);

        // Rest pose for the full capacity so the count can grow at runtime.
        let mut rng = StdRng::seed_from_u64(0x5ee0);
        let rest: Vec<Light> = (0..MAX_LIGHTS)
            .map(|_| {
                let hue = rng.gen::<f32>();
                Light {
                    position: [
                        rng.gen_range(-400.0..400.0),
                        rng.gen_range(-shaders::FLOOR_DEPTH + 2.0..-2.0),
                        rng.gen_range(-400.0..400.0),
                    ],
                    _pad0: 0.0,
                    color: hue_to_rgb(hue),
                    intensity: rng.gen_range(0.8..2.5),
                }
            })
            .collect();

        let rest_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Rest Pose"),
            contents: bytemuck::cast_slice(&rest),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let count_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Count"),
            contents: bytemuck::bytes_of(&count),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let light_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Light Set"),
            size: LIGHT_SET_SIZE as u64,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let cluster_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cluster Set"),
            size: CLUSTER_SET_SIZE as u64,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let storage = |read_only| wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        };
        let uniform = |size| wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(size),
        };

        let move_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Move Lights Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: uniform(4),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: uniform(4),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: storage(true),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: storage(false),
                    count: None,
                },
            ],
        });
        let cluster_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Clustering Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: uniform(std::mem::size_of::<crate::camera::CameraUniforms>() as u64),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: storage(true),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: storage(false),
                    count: None,
                },
            ],
        });

        let make_pipeline = |label, source: &str, layout: &wgpu::BindGroupLayout| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(shaders::process(source).into()),
            });
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[layout],
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: "main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            })
        };
        let move_pipeline = make_pipeline("Move Lights", shaders::MOVE_LIGHTS_CS, &move_layout);
        let cluster_pipeline = make_pipeline("Clustering", shaders::CLUSTERING_CS, &cluster_layout);

        let move_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Move Lights Bind"),
            layout: &move_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: time_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: count_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: rest_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: light_buf.as_entire_binding(),
                },
            ],
        });
        let cluster_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Clustering Bind"),
            layout: &cluster_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: light_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: cluster_buf.as_entire_binding(),
                },
            ],
        });

        Self {
            count,
            count_buf,
            light_buf,
            cluster_buf,
            move_pipeline,
            move_bind,
            cluster_pipeline,
            cluster_bind,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn set_count(&mut self, queue: &wgpu::Queue, requested: u32) {
        let clamped = requested.min(MAX_LIGHTS as u32);
        if clamped != self.count {
            self.count = clamped;
            queue.write_buffer(&self.count_buf, 0, bytemuck::bytes_of(&clamped));
        }
    }

    /// Records light movement, then the cluster rebuild. Must run before any
    /// pass that reads the light or cluster buffers.
    pub fn record(&self, encoder: &mut wgpu::CommandEncoder) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Lights"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.move_pipeline);
        pass.set_bind_group(0, &self.move_bind, &[]);
        pass.dispatch_workgroups(self.count.div_ceil(64).max(1), 1, 1);

        pass.set_pipeline(&self.cluster_pipeline);
        pass.set_bind_group(0, &self.cluster_bind, &[]);
        pass.dispatch_workgroups(1, 1, CLUSTER_Z as u32);
    }
}

fn hue_to_rgb(hue: f32) -> [f32; 3] {
    let h = hue.rem_euclid(1.0) * 6.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    match h as u32 {
        0 => [1.0, x, 0.0],
        1 => [x, 1.0, 0.0],
        2 => [0.0, 1.0, x],
        3 => [0.0, x, 1.0],
        4 => [x, 0.0, 1.0],
        _ => [1.0, 0.0, x],
    }
}

// Host mirror of the clustering kernel's geometry, for the bucketing tests.

#[derive(Debug, Clone, Copy)]
pub struct ClusterParams {
    pub near: f32,
    pub far: f32,
    /// Reciprocal projection diagonal, as in `CameraUniforms`.
    pub proj_scale: Vec2,
}

/// Exponential slice boundary, matching `slice_depth` in the kernel.
pub fn slice_depth(params: &ClusterParams, s: usize) -> f32 {
    let t = s as f32 / CLUSTER_Z as f32;
    params.near * (params.far / params.near).powf(t)
}

/// Monotonic map from positive view depth to a Z slice, matching
/// `cluster_z_slice` in `common.wgsl`.
pub fn cluster_z_slice(params: &ClusterParams, view_depth: f32) -> usize {
    let d = view_depth.clamp(params.near, params.far);
    let s = (d / params.near).ln() / (params.far / params.near).ln();
    ((s * CLUSTER_Z as f32) as usize).min(CLUSTER_Z - 1)
}

/// All cluster indices whose view-space AABB a sphere overlaps.
pub fn clusters_overlapping(params: &ClusterParams, view_pos: Vec3, radius: f32) -> Vec<usize> {
    let mut hits = Vec::new();
    for iz in 0..CLUSTER_Z {
        let z_min = slice_depth(params, iz);
        let z_max = slice_depth(params, iz + 1);
        for iy in 0..CLUSTER_Y {
            for ix in 0..CLUSTER_X {
                let ndc_min = Vec2::new(
                    ix as f32 / CLUSTER_X as f32 * 2.0 - 1.0,
                    iy as f32 / CLUSTER_Y as f32 * 2.0 - 1.0,
                );
                let ndc_max = Vec2::new(
                    (ix + 1) as f32 / CLUSTER_X as f32 * 2.0 - 1.0,
                    (iy + 1) as f32 / CLUSTER_Y as f32 * 2.0 - 1.0,
                );
                let near_min = ndc_min * params.proj_scale * z_min;
                let near_max = ndc_max * params.proj_scale * z_min;
                let far_min = ndc_min * params.proj_scale * z_max;
                let far_max = ndc_max * params.proj_scale * z_max;
                let aabb_min = near_min.min(far_min).extend(-z_max);
                let aabb_max = near_max.max(far_max).extend(-z_min);

                let closest = view_pos.clamp(
                    Vec3::new(aabb_min.x, aabb_min.y, aabb_min.z),
                    Vec3::new(aabb_max.x, aabb_max.y, aabb_max.z),
                );
                if (view_pos - closest).length_squared() <= radius * radius {
                    hits.push(ix + iy * CLUSTER_X + iz * CLUSTER_X * CLUSTER_Y);
                }
            }
        }
    }
    hits
}

/// Host mirror of the deferred composite's cluster lookup: screen uv
/// (y down from the top) and positive view depth to a linear cluster
/// index. Tile rows count up from the screen bottom, matching the
/// clustering kernel, so the row flips against uv.y.
pub fn composite_cluster_index(params: &ClusterParams, uv: Vec2, view_depth: f32) -> usize {
    let grid = Vec2::new(uv.x, 1.0 - uv.y) * Vec2::new(CLUSTER_X as f32, CLUSTER_Y as f32);
    let ix = grid.x.clamp(0.0, CLUSTER_X as f32 - 1.0) as usize;
    let iy = grid.y.clamp(0.0, CLUSTER_Y as f32 - 1.0) as usize;
    ix + iy * CLUSTER_X + cluster_z_slice(params, view_depth) * CLUSTER_X * CLUSTER_Y
}

/// Buckets lights per cluster with the kernel's capacity clamp.
pub fn bucket_lights(params: &ClusterParams, view_positions: &[Vec3]) -> Vec<Vec<u32>> {
    let mut clusters = vec![Vec::new(); CLUSTER_X * CLUSTER_Y * CLUSTER_Z];
    for (i, &pos) in view_positions.iter().enumerate() {
        for c in clusters_overlapping(params, pos, LIGHT_RADIUS) {
            if clusters[c].len() < MAX_CLUSTER_LIGHTS {
                clusters[c].push(i as u32);
            }
        }
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ClusterParams {
        ClusterParams {
            near: 0.1,
            far: 2000.0,
            proj_scale: Vec2::new(1.2, 0.9),
        }
    }

    #[test]
    fn depth_slicing_is_monotonic_and_in_range() {
        let p = params();
        let mut prev = 0;
        for i in 0..200 {
            let depth = 0.1 + i as f32 * 10.0;
            let slice = cluster_z_slice(&p, depth);
            assert!(slice >= prev);
            assert!(slice < CLUSTER_Z);
            prev = slice;
        }
        assert_eq!(cluster_z_slice(&p, 0.0), 0);
        assert_eq!(cluster_z_slice(&p, 1e9), CLUSTER_Z - 1);
    }

    #[test]
    fn slice_boundaries_bracket_the_frustum() {
        let p = params();
        assert!((slice_depth(&p, 0) - p.near).abs() < 1e-5);
        assert!((slice_depth(&p, CLUSTER_Z) - p.far).abs() < 0.1);
    }

    #[test]
    fn tiny_light_in_cluster_interior_hits_exactly_one() {
        let p = params();
        // Center of a mid-depth cluster.
        let z = -(slice_depth(&p, 8) + slice_depth(&p, 9)) * 0.5;
        let pos = Vec3::new(0.1, 0.1, z);
        let hits = clusters_overlapping(&p, pos, 0.01);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn spanning_light_hits_every_overlapped_cluster() {
        let p = params();
        let z_boundary = slice_depth(&p, 10);
        let pos = Vec3::new(0.0, 0.0, -z_boundary);
        let hits = clusters_overlapping(&p, pos, 5.0);
        // Overlaps both depth slices around the boundary and the four
        // screen tiles meeting at NDC origin, at minimum.
        assert!(hits.len() >= 2);
        let slices: std::collections::HashSet<_> =
            hits.iter().map(|c| c / (CLUSTER_X * CLUSTER_Y)).collect();
        assert!(slices.contains(&9) && slices.contains(&10));
    }

    #[test]
    fn composite_lookup_matches_bucketing() {
        let p = params();
        // A point off the horizontal center, where a row flip between the
        // two mappings would be visible.
        for ndc in [
            Vec2::new(0.3, 0.55),
            Vec2::new(-0.7, -0.4),
            Vec2::new(0.1, 0.9),
        ] {
            let depth = (slice_depth(&p, 8) + slice_depth(&p, 9)) * 0.5;
            let view_pos = Vec3::new(
                ndc.x * p.proj_scale.x * depth,
                ndc.y * p.proj_scale.y * depth,
                -depth,
            );
            let hits = clusters_overlapping(&p, view_pos, 0.01);
            assert_eq!(hits.len(), 1);

            // Screen uv of that same point, as the fullscreen pass emits it.
            let uv = Vec2::new(0.5 * (ndc.x + 1.0), 0.5 * (1.0 - ndc.y));
            assert_eq!(composite_cluster_index(&p, uv, depth), hits[0]);
        }
    }

    #[test]
    fn cluster_capacity_is_clamped() {
        let p = params();
        let z = -(slice_depth(&p, 8) + slice_depth(&p, 9)) * 0.5;
        let pos = Vec3::new(0.1, 0.1, z);
        let cluster = clusters_overlapping(&p, pos, 0.01)[0];
        let lights = vec![pos; MAX_CLUSTER_LIGHTS + 40];
        let buckets = bucket_lights(&p, &lights);
        assert_eq!(buckets[cluster].len(), MAX_CLUSTER_LIGHTS);
    }
}

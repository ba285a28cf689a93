//! Hash-scattered coral instances, one storage buffer per chunk slot.
//!
//! Placement is static until a slot is re-targeted: only dirty slots rerun
//! the placement kernel, and rerunning it for the same cell reproduces the
//! same instances because everything derives from the cell origin and the
//! instance index through the sine hash.

use super::chunks::ChunkGrid;
use crate::scene::obj::ObjMesh;
use crate::shaders::{self, CELL_SIZE, CORAL_SET_SIZE, FLOOR_DEPTH, MAX_CORAL_PER_CHUNK};
use anyhow::Result;
use glam::Vec2;
use wgpu::util::DeviceExt;

/// Host copy of the WGSL `CoralInstance`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CoralInstance {
    /// xyz world position, w uniform scale.
    pub pos_scale: [f32; 4],
    /// x yaw radians, y species id, zw unused.
    pub params: [f32; 4],
}

const _: [(); shaders::CORAL_INSTANCE_STRIDE] = [(); std::mem::size_of::<CoralInstance>()];

struct CoralSlot {
    origin_buf: wgpu::Buffer,
    compute_bind: wgpu::BindGroup,
    render_bind: wgpu::BindGroup,
}

pub struct CoralStage {
    pub vertex_buf: wgpu::Buffer,
    pub index_buf: wgpu::Buffer,
    pub index_count: u32,
    pub render_layout: wgpu::BindGroupLayout,

    pipeline: wgpu::ComputePipeline,
    grid: ChunkGrid,
    slots: Vec<CoralSlot>,
    dirty: Vec<usize>,
    count: u32,
    count_buf: wgpu::Buffer,
}

impl CoralStage {
    pub fn new(
        device: &wgpu::Device,
        mesh: &ObjMesh,
        radius: i32,
        requested_count: u32,
    ) -> Result<Self> {
        let grid = ChunkGrid::new(CELL_SIZE, radius)?;

        let count = if requested_count as usize > MAX_CORAL_PER_CHUNK {
            log::debug!(
                "coral count {requested_count} clamped to {MAX_CORAL_PER_CHUNK} per chunk"
            );
            MAX_CORAL_PER_CHUNK as u32
        } else {
            requested_count
        };

        let vertex_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Coral VB"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Coral IB"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let count_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Coral Count"),
            contents: bytemuck::bytes_of(&count),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform = |size| wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(size),
        };
        let compute_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Coral Placement Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: uniform(8),
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
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(CORAL_SET_SIZE as u64),
                    },
                    count: None,
                },
            ],
        });
        let render_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Coral Instance Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(CORAL_SET_SIZE as u64),
                },
                count: None,
            }],
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Coral Placement"),
            source: wgpu::ShaderSource::Wgsl(shaders::process(shaders::PLACE_CORAL_CS).into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Coral Placement"),
            bind_group_layouts: &[&compute_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Coral Placement"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: "main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        });

        let slots = (0..grid.slot_count())
            .map(|_| {
                let origin_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Coral Chunk Origin"),
                    contents: bytemuck::cast_slice(&[0.0f32, 0.0]),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
                let storage_buf = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Coral Instances"),
                    size: CORAL_SET_SIZE as u64,
                    usage: wgpu::BufferUsages::STORAGE,
                    mapped_at_creation: false,
                });
                let compute_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Coral Placement Bind"),
                    layout: &compute_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: origin_buf.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: count_buf.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: storage_buf.as_entire_binding(),
                        },
                    ],
                });
                let render_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Coral Instance Bind"),
                    layout: &render_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: storage_buf.as_entire_binding(),
                    }],
                });
                CoralSlot {
                    origin_buf,
                    compute_bind,
                    render_bind,
                }
            })
            .collect();

        Ok(Self {
            vertex_buf,
            index_buf,
            index_count: mesh.indices.len() as u32,
            render_layout,
            pipeline,
            grid,
            slots,
            dirty: Vec::new(),
            count,
            count_buf,
        })
    }

    pub fn instance_count(&self) -> u32 {
        self.count
    }

    /// Changes the per-chunk instance count; every slot becomes dirty.
    pub fn set_instance_count(&mut self, queue: &wgpu::Queue, requested: u32) {
        let clamped = requested.min(MAX_CORAL_PER_CHUNK as u32);
        if clamped < requested {
            log::debug!("coral count {requested} clamped to {clamped} per chunk");
        }
        if clamped == self.count {
            return;
        }
        self.count = clamped;
        queue.write_buffer(&self.count_buf, 0, bytemuck::bytes_of(&clamped));
        self.dirty = (0..self.slots.len()).collect();
    }

    /// Follows the camera; re-targeted slots are marked dirty.
    pub fn update(&mut self, queue: &wgpu::Queue, cam_xz: Vec2) {
        for update in self.grid.update_active_cells(cam_xz) {
            queue.write_buffer(
                &self.slots[update.slot].origin_buf,
                0,
                bytemuck::cast_slice(&[update.origin.x, update.origin.y]),
            );
            if !self.dirty.contains(&update.slot) {
                self.dirty.push(update.slot);
            }
        }
    }

    /// Reruns placement for dirty slots only.
    pub fn record_place(&mut self, encoder: &mut wgpu::CommandEncoder) {
        if self.dirty.is_empty() {
            return;
        }
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Coral Placement"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        let groups = self.count.div_ceil(64).max(1);
        for &slot in &self.dirty {
            pass.set_bind_group(0, &self.slots[slot].compute_bind, &[]);
            pass.dispatch_workgroups(groups, 1, 1);
        }
        drop(pass);
        self.dirty.clear();
    }

    pub fn render_binds(&self) -> impl Iterator<Item = &wgpu::BindGroup> {
        self.slots.iter().map(|s| &s.render_bind)
    }
}

// Host mirrors of the placement math in `place_coral.cs.wgsl` and the shared
// helpers in `common.wgsl`. Used by the determinism tests and anything that
// needs instance positions on the CPU.

pub fn hash2(p: Vec2) -> f32 {
    // WGSL fract is x - floor(x), which stays in [0, 1) for negative inputs;
    // Rust's f32::fract does not.
    let v = p.dot(Vec2::new(127.1, 311.7)).sin() * 43758.5453;
    v - v.floor()
}

pub fn value_noise(p: Vec2) -> f32 {
    let i = p.floor();
    let f = p - i;
    let u = f * f * (Vec2::splat(3.0) - 2.0 * f);
    let a = hash2(i);
    let b = hash2(i + Vec2::new(1.0, 0.0));
    let c = hash2(i + Vec2::new(0.0, 1.0));
    let d = hash2(i + Vec2::new(1.0, 1.0));
    let ab = a + (b - a) * u.x;
    let cd = c + (d - c) * u.x;
    ab + (cd - ab) * u.y
}

pub fn dune_height(p: Vec2) -> f32 {
    6.0 * value_noise(p * 0.0045)
        + 2.5 * value_noise(p * 0.013 + Vec2::new(17.0, 31.0))
        + 0.8 * value_noise(p * 0.041 + Vec2::new(5.0, 71.0))
}

/// Reference implementation of the placement kernel for one chunk.
pub fn scatter_instances(origin: Vec2, count: u32) -> Vec<CoralInstance> {
    let count = (count as usize).min(MAX_CORAL_PER_CHUNK);
    (0..count as u32)
        .map(|i| {
            let seed = origin + Vec2::new(i as f32 * 17.13, i as f32 * 9.57);
            let offset = Vec2::new(hash2(seed), hash2(seed + Vec2::new(7.0, 13.0))) * CELL_SIZE;
            let p = origin + offset;
            let y = -FLOOR_DEPTH + dune_height(p);
            let scale = 0.6 + hash2(seed + Vec2::new(29.0, 29.0)) * 1.8;
            let yaw = hash2(seed + Vec2::new(41.0, 7.0)) * std::f32::consts::TAU;
            let species = (hash2(seed + Vec2::new(3.0, 57.0)) * 4.0).floor();
            CoralInstance {
                pos_scale: [p.x, y, p.y, scale],
                params: [yaw, species, 0.0, 0.0],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_is_idempotent() {
        let origin = Vec2::new(1024.0, -512.0);
        let a = scatter_instances(origin, 64);
        let b = scatter_instances(origin, 64);
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_cells_place_differently() {
        let a = scatter_instances(Vec2::new(0.0, 0.0), 32);
        let b = scatter_instances(Vec2::new(CELL_SIZE, 0.0), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn instances_stay_inside_their_cell() {
        let origin = Vec2::new(-2048.0, 3072.0);
        for inst in scatter_instances(origin, 128) {
            let x = inst.pos_scale[0];
            let z = inst.pos_scale[2];
            assert!(x >= origin.x && x <= origin.x + CELL_SIZE);
            assert!(z >= origin.y && z <= origin.y + CELL_SIZE);
        }
    }

    #[test]
    fn count_is_clamped_to_capacity() {
        let placed = scatter_instances(Vec2::ZERO, MAX_CORAL_PER_CHUNK as u32 + 50);
        assert_eq!(placed.len(), MAX_CORAL_PER_CHUNK);
    }

    #[test]
    fn species_ids_cover_the_palette() {
        let placed = scatter_instances(Vec2::new(512.0, 512.0), 128);
        for inst in &placed {
            let species = inst.params[1];
            assert!((0.0..4.0).contains(&species));
            assert_eq!(species, species.floor());
        }
    }
}

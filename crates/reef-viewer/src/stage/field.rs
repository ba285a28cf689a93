//! Compute-generated displacement/normal fields for the ocean chunks.
//!
//! A `FieldPipeline` owns one compute kernel (the surface and floor each
//! inject their own) and the bind group layouts its chunks use. A
//! `FieldChunk` is the per-slot resource set: two storage textures, the cell
//! origin uniform and the bind groups. Generation fully overwrites both
//! textures as a pure function of texel, origin and time.

use crate::shaders::{self, CELL_SIZE, FIELD_RESOLUTION, WORKGROUP_SIZE};
use glam::Vec2;
use wgpu::util::DeviceExt;

pub struct FieldPipeline {
    pipeline: wgpu::ComputePipeline,
    compute_layout: wgpu::BindGroupLayout,
    pub render_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    label: &'static str,
}

pub struct FieldChunk {
    pub origin: Vec2,
    origin_buf: wgpu::Buffer,
    compute_bind: wgpu::BindGroup,
    pub render_bind: wgpu::BindGroup,
}

impl FieldPipeline {
    pub fn new(device: &wgpu::Device, kernel: &str, label: &'static str) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(shaders::process(kernel).into()),
        });

        let storage_tex = |format| wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format,
            view_dimension: wgpu::TextureViewDimension::D2,
        };
        let uniform = |size| wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(size),
        };

        let compute_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Field Compute Layout"),
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
                    ty: storage_tex(wgpu::TextureFormat::R32Float),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: storage_tex(wgpu::TextureFormat::Rgba8Unorm),
                    count: None,
                },
            ],
        });

        // r32float is not filterable; the vertex shader fetches it with
        // textureLoad, only the normal map is sampled.
        let render_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Field Render Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: uniform(8),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&compute_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: "main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Field Normal Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            pipeline,
            compute_layout,
            render_layout,
            sampler,
            label,
        }
    }

    /// Allocates the per-slot GPU resources. `time_buf` is the frame time
    /// uniform shared by every chunk of the stage.
    pub fn create_chunk(&self, device: &wgpu::Device, time_buf: &wgpu::Buffer) -> FieldChunk {
        let tex = |label, format| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width: FIELD_RESOLUTION,
                        height: FIELD_RESOLUTION,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::STORAGE_BINDING
                        | wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };
        let displacement = tex("Field Displacement", wgpu::TextureFormat::R32Float);
        let normals = tex("Field Normals", wgpu::TextureFormat::Rgba8Unorm);

        let origin_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Chunk Origin"),
            contents: bytemuck::cast_slice(&[0.0f32, 0.0]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let compute_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.compute_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: origin_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: time_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&displacement),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&normals),
                },
            ],
        });
        let render_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.render_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: origin_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&displacement),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&normals),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        FieldChunk {
            origin: Vec2::ZERO,
            origin_buf,
            compute_bind,
            render_bind,
        }
    }

    /// Records one full-overwrite generation pass for `chunk`.
    pub fn record_generate(&self, encoder: &mut wgpu::CommandEncoder, chunk: &FieldChunk) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(self.label),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &chunk.compute_bind, &[]);
        let groups = FIELD_RESOLUTION.div_ceil(WORKGROUP_SIZE);
        pass.dispatch_workgroups(groups, groups, 1);
    }
}

impl FieldChunk {
    pub fn set_origin(&mut self, queue: &wgpu::Queue, origin: Vec2) {
        self.origin = origin;
        queue.write_buffer(&self.origin_buf, 0, bytemuck::cast_slice(&[origin.x, origin.y]));
    }
}

/// Host reference of the surface kernel's wave sum. Constants must match
/// `ocean_surface.cs.wgsl` exactly.
pub fn wave_height(p: Vec2, t: f32) -> f32 {
    let mut h = 0.0;
    h += 0.9 * (p.dot(Vec2::new(0.064, 0.021)) + t * 1.10).sin();
    h += 0.5 * (p.dot(Vec2::new(-0.033, 0.078)) + t * 1.70).sin();
    h += 0.27 * (p.dot(Vec2::new(0.116, -0.094)) + t * 2.30).sin();
    h += 0.12 * (p.dot(Vec2::new(-0.087, -0.152)) + t * 3.10).sin();
    h
}

/// World XZ of a field texel, matching `world_of` in the kernels.
pub fn texel_world(origin: Vec2, texel_x: u32, texel_y: u32) -> Vec2 {
    let res = (FIELD_RESOLUTION - 1) as f32;
    origin + Vec2::new(texel_x as f32, texel_y as f32) / res * CELL_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_is_deterministic() {
        let p = texel_world(Vec2::new(512.0, -1024.0), 128, 200);
        assert_eq!(wave_height(p, 0.0), wave_height(p, 0.0));
    }

    #[test]
    fn height_is_bounded_by_amplitude_sum() {
        let bound = 0.9 + 0.5 + 0.27 + 0.12;
        for i in 0..200 {
            let p = Vec2::new(i as f32 * 37.7, i as f32 * -11.3);
            let h = wave_height(p, i as f32 * 0.13);
            assert!(h.abs() <= bound + 1e-5);
        }
    }

    #[test]
    fn small_time_steps_move_the_height_continuously() {
        let p = Vec2::new(100.0, 250.0);
        let mut prev = wave_height(p, 0.0);
        for step in 1..100 {
            let h = wave_height(p, step as f32 * 0.001);
            // Max |dh/dt| is the sum of amplitude * angular frequency.
            assert!((h - prev).abs() < 0.001 * (0.9 * 1.1 + 0.5 * 1.7 + 0.27 * 2.3 + 0.12 * 3.1) * 1.5);
            prev = h;
        }
    }

    #[test]
    fn adjacent_texels_are_continuous() {
        let origin = Vec2::new(-512.0, 512.0);
        for x in 0..(FIELD_RESOLUTION - 1) {
            let a = wave_height(texel_world(origin, x, 40), 1.0);
            let b = wave_height(texel_world(origin, x + 1, 40), 1.0);
            // Texel spacing is ~2 world units; slope is bounded by the
            // amplitude-weighted wave numbers.
            assert!((a - b).abs() < 1.0);
        }
    }

    #[test]
    fn chunk_edges_share_texel_positions() {
        // Last texel of one cell is the first texel of the next: the mesh
        // seams are watertight by construction.
        let left = texel_world(Vec2::new(0.0, 0.0), FIELD_RESOLUTION - 1, 7);
        let right = texel_world(Vec2::new(CELL_SIZE, 0.0), 0, 7);
        assert!((left - right).length() < 1e-4);
    }
}

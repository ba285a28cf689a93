//! Jellyfish overlay: an alpha-blended fullscreen pass drawn after the
//! composite, occlusion-tested against the geometry aux target.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::shaders;
use crate::stage::FrameUniforms;

use super::targets::Targets;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct OverlayParams {
    time: f32,
    num_jellyfish: u32,
    _pad: [u32; 2],
}

pub struct OverlayPipeline {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    bind: wgpu::BindGroup,
    params_buf: wgpu::Buffer,
}

impl OverlayPipeline {
    pub fn new(
        device: &wgpu::Device,
        frame: &FrameUniforms,
        targets: &Targets,
        surface_fmt: wgpu::TextureFormat,
    ) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Overlay Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let params_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Overlay Params"),
            contents: bytemuck::bytes_of(&OverlayParams::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Jellyfish Overlay Shader"),
            source: wgpu::ShaderSource::Wgsl(
                shaders::process(&format!(
                    "{}\n{}",
                    shaders::FULLSCREEN_VS,
                    shaders::JELLYFISH_FS
                ))
                .into(),
            ),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Overlay Pipeline Layout"),
            bind_group_layouts: &[&frame.camera_layout, &layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Overlay Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: "vs_main",
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: "fs_main",
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_fmt,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: Default::default(),
            depth_stencil: None,
            multisample: Default::default(),
            multiview: None,
        });

        let bind = Self::make_bind(device, &layout, &params_buf, targets);
        Self {
            pipeline,
            layout,
            bind,
            params_buf,
        }
    }

    fn make_bind(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        params_buf: &wgpu::Buffer,
        targets: &Targets,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Overlay Bind"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&targets.aux),
                },
            ],
        })
    }

    /// The aux view changes with the targets, so the bind group follows.
    pub fn rebuild_bind(&mut self, device: &wgpu::Device, targets: &Targets) {
        self.bind = Self::make_bind(device, &self.layout, &self.params_buf, targets);
    }

    pub fn write_params(&self, queue: &wgpu::Queue, time: f32, num_jellyfish: u32) {
        let params = OverlayParams {
            time,
            num_jellyfish,
            _pad: [0; 2],
        };
        queue.write_buffer(&self.params_buf, 0, bytemuck::bytes_of(&params));
    }

    pub fn record<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>, camera_bind: &'a wgpu::BindGroup) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, camera_bind, &[]);
        pass.set_bind_group(1, &self.bind, &[]);
        pass.draw(0..3, 0..1);
    }
}

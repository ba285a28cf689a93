//! Forward shading: the composite evaluates every light at every fragment.
//! The baseline the clustered strategy is measured against.

use crate::shaders;
use crate::stage::lights::LightsStage;
use crate::stage::spectral::SpectralUniforms;
use crate::stage::FrameUniforms;

use super::make_composite_pipeline;
use super::targets::Targets;

pub struct ForwardStrategy {
    pub composite: wgpu::RenderPipeline,
    pub shade_bind: wgpu::BindGroup,
}

impl ForwardStrategy {
    pub fn new(
        device: &wgpu::Device,
        frame: &FrameUniforms,
        targets: &Targets,
        spectral: &SpectralUniforms,
        lights: &LightsStage,
        surface_fmt: wgpu::TextureFormat,
    ) -> Self {
        let shade_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Forward Shade Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let shade_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Forward Shade Bind"),
            layout: &shade_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: lights.light_buf.as_entire_binding(),
            }],
        });

        let composite = make_composite_pipeline(
            device,
            "Forward Composite",
            shaders::COMPOSITE_FORWARD_FS,
            &[
                &frame.camera_layout,
                &targets.read_layout,
                &spectral.layout,
                &shade_layout,
            ],
            surface_fmt,
        );

        Self {
            composite,
            shade_bind,
        }
    }
}

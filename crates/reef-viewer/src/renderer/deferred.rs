//! Clustered shading: the composite looks up the cluster a fragment falls
//! into and iterates only the lights that cluster holds.

use crate::shaders;
use crate::stage::lights::LightsStage;
use crate::stage::spectral::SpectralUniforms;
use crate::stage::FrameUniforms;

use super::make_composite_pipeline;
use super::targets::Targets;

pub struct DeferredStrategy {
    pub composite: wgpu::RenderPipeline,
    pub shade_bind: wgpu::BindGroup,
}

impl DeferredStrategy {
    pub fn new(
        device: &wgpu::Device,
        frame: &FrameUniforms,
        targets: &Targets,
        spectral: &SpectralUniforms,
        lights: &LightsStage,
        surface_fmt: wgpu::TextureFormat,
    ) -> Self {
        let storage_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let shade_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Deferred Shade Layout"),
            entries: &[storage_entry(0), storage_entry(1)],
        });
        let shade_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Deferred Shade Bind"),
            layout: &shade_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: lights.light_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights.cluster_buf.as_entire_binding(),
                },
            ],
        });

        let composite = make_composite_pipeline(
            device,
            "Deferred Composite",
            shaders::COMPOSITE_DEFERRED_FS,
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

//! Offscreen render targets for the geometry passes.
//!
//! Both strategies write the same pair: unlit albedo, and an aux target
//! packing the encoded world normal in xyz and the view distance in w.
//! `aux.w == 0` marks background pixels for the composite.

pub struct Targets {
    _albedo_tex: wgpu::Texture,
    _aux_tex: wgpu::Texture,
    _depth_tex: wgpu::Texture,

    pub albedo: wgpu::TextureView,
    pub aux: wgpu::TextureView,
    pub depth: wgpu::TextureView,

    pub albedo_fmt: wgpu::TextureFormat,
    pub aux_fmt: wgpu::TextureFormat,
    pub depth_fmt: wgpu::TextureFormat,

    /// Layout and bind group for sampling albedo + aux in fullscreen passes.
    pub read_layout: wgpu::BindGroupLayout,
    pub read_bind: wgpu::BindGroup,
}

impl Targets {
    pub fn new(device: &wgpu::Device, size: winit::dpi::PhysicalSize<u32>) -> Self {
        let width = size.width.max(1);
        let height = size.height.max(1);
        let tex_size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let albedo_fmt = wgpu::TextureFormat::Rgba16Float;
        let aux_fmt = wgpu::TextureFormat::Rgba16Float;
        let depth_fmt = wgpu::TextureFormat::Depth32Float;

        let create_tex = |label: &str, format, usage| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: tex_size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };

        let albedo_tex = create_tex(
            "Albedo Target",
            albedo_fmt,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let aux_tex = create_tex(
            "Normal/Distance Target",
            aux_fmt,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let depth_tex = create_tex(
            "Depth Target",
            depth_fmt,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        let albedo = albedo_tex.create_view(&wgpu::TextureViewDescriptor::default());
        let aux = aux_tex.create_view(&wgpu::TextureViewDescriptor::default());
        let depth = depth_tex.create_view(&wgpu::TextureViewDescriptor::default());

        let tex_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let read_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Targets Read Layout"),
            entries: &[tex_entry(0), tex_entry(1)],
        });
        let read_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Targets Read Bind"),
            layout: &read_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&albedo),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&aux),
                },
            ],
        });

        Self {
            albedo,
            aux,
            depth,
            _albedo_tex: albedo_tex,
            _aux_tex: aux_tex,
            _depth_tex: depth_tex,
            albedo_fmt,
            aux_fmt,
            depth_fmt,
            read_layout,
            read_bind,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, size: winit::dpi::PhysicalSize<u32>) {
        *self = Self::new(device, size);
    }
}

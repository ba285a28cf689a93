//! Everything that lives in the world: the loaded scene, the two ocean
//! layers, coral, lights and the spectral water tables.

pub mod chunks;
pub mod coral;
pub mod field;
pub mod floor;
pub mod lights;
pub mod spectral;
pub mod surface;

use crate::camera::{Camera, CameraUniforms};
use crate::config::ViewerConfig;
use crate::scene::gltf::{load_gltf, SceneLayouts};
use crate::scene::obj::{load_obj, ObjMesh};
use crate::scene::{Scene, Vertex};
use crate::shaders::FIELD_RESOLUTION;
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Instant;
use wgpu::util::DeviceExt;

/// The camera and time uniform blocks shared by every pipeline. The renderer
/// is the sole writer, once per frame, before any pass is recorded.
pub struct FrameUniforms {
    pub camera_buf: wgpu::Buffer,
    pub time_buf: wgpu::Buffer,
    pub camera_layout: wgpu::BindGroupLayout,
    pub camera_bind: wgpu::BindGroup,
    start: Instant,
}

impl FrameUniforms {
    pub fn new(device: &wgpu::Device) -> Self {
        let camera_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera UBO"),
            size: std::mem::size_of::<CameraUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let time_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Time UBO"),
            size: 4,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<CameraUniforms>() as u64,
                    ),
                },
                count: None,
            }],
        });
        let camera_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buf.as_entire_binding(),
            }],
        });
        Self {
            camera_buf,
            time_buf,
            camera_layout,
            camera_bind,
            start: Instant::now(),
        }
    }

    /// Writes both uniform blocks and returns the frame time in seconds.
    pub fn write(&self, queue: &wgpu::Queue, camera: &Camera) -> f32 {
        let time = self.start.elapsed().as_secs_f32();
        queue.write_buffer(&self.camera_buf, 0, bytemuck::bytes_of(&camera.uniforms()));
        queue.write_buffer(&self.time_buf, 0, bytemuck::bytes_of(&time));
        time
    }
}

/// The N x N sample grid displaced by the field vertex shaders. One mesh is
/// shared by the surface and floor; vertices are `vec2` sample coordinates
/// in [0, 1].
pub struct GridMesh {
    pub vertex_buf: wgpu::Buffer,
    pub index_buf: wgpu::Buffer,
    pub index_count: u32,
}

impl GridMesh {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: 8,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }

    pub fn new(device: &wgpu::Device) -> Self {
        let res = FIELD_RESOLUTION as usize;
        let mut vertices = Vec::with_capacity(res * res);
        for y in 0..res {
            for x in 0..res {
                vertices.push([
                    x as f32 / (res - 1) as f32,
                    y as f32 / (res - 1) as f32,
                ]);
            }
        }
        let mut indices: Vec<u32> = Vec::with_capacity((res - 1) * (res - 1) * 6);
        for y in 0..res - 1 {
            for x in 0..res - 1 {
                let i = (y * res + x) as u32;
                let r = res as u32;
                indices.extend_from_slice(&[i, i + r, i + 1, i + 1, i + r, i + r + 1]);
            }
        }
        let vertex_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Grid Mesh VB"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Grid Mesh IB"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buf,
            index_buf,
            index_count: indices.len() as u32,
        }
    }
}

pub struct Stage {
    pub scene: Scene,
    pub scene_layouts: SceneLayouts,
    pub surface: surface::OceanSurface,
    pub floor: floor::OceanFloor,
    pub coral: coral::CoralStage,
    pub lights: lights::LightsStage,
    pub spectral: spectral::SpectralUniforms,
    pub grid_mesh: GridMesh,
}

impl Stage {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame: &FrameUniforms,
        config: &ViewerConfig,
    ) -> Result<Self> {
        let scene_layouts = SceneLayouts::new(device);
        let scene = match &config.scene_path {
            Some(path) => load_gltf(device, queue, &scene_layouts, Path::new(path))
                .context("loading scene")?,
            None => Scene::empty(),
        };

        let coral_mesh = match &config.coral_path {
            Some(path) => load_obj(Path::new(path)).context("loading coral mesh")?,
            None => cross_quad_mesh(),
        };

        let spectral_data = match &config.spectral_path {
            Some(path) => waterprops::SpectralData::from_path(path)?,
            None => waterprops::SpectralData::builtin()?,
        };

        let surface = surface::OceanSurface::new(device, &frame.time_buf)?;
        let floor = floor::OceanFloor::new(device, &frame.time_buf)?;
        let coral = coral::CoralStage::new(
            device,
            &coral_mesh,
            config.coral_radius,
            config.coral_per_chunk,
        )?;
        let lights = lights::LightsStage::new(
            device,
            &frame.camera_buf,
            &frame.time_buf,
            config.num_lights,
        );
        let spectral =
            spectral::SpectralUniforms::new(device, spectral_data, config.water_type())?;

        Ok(Self {
            scene,
            scene_layouts,
            surface,
            floor,
            coral,
            lights,
            spectral,
            grid_mesh: GridMesh::new(device),
        })
    }

    /// Camera-follow updates. Origin rewrites happen here, strictly before
    /// this frame's encoder is recorded.
    pub fn update(&mut self, queue: &wgpu::Queue, camera: &Camera) {
        let cam_xz = glam::Vec2::new(camera.position.x, camera.position.z);
        self.surface.update(queue, cam_xz);
        self.floor.update(queue, cam_xz);
        self.coral.update(queue, cam_xz);
    }

    /// Records every compute pass for this frame: ocean fields, coral
    /// placement for dirty chunks, light movement and clustering.
    pub fn record_compute(&mut self, encoder: &mut wgpu::CommandEncoder) {
        self.surface.record_generate(encoder);
        self.floor.record_generate(encoder);
        self.coral.record_place(encoder);
        self.lights.record(encoder);
    }
}

/// Fallback coral: two quads crossed at right angles, the classic foliage
/// billboard. Used when no OBJ path is configured.
fn cross_quad_mesh() -> ObjMesh {
    let quad = |verts: [[f32; 3]; 4], normal: [f32; 3]| {
        verts.map(|position| Vertex {
            position,
            normal,
            uv: [
                (position[0] + position[2] + 1.0) * 0.5,
                1.0 - (position[1] * 0.5),
            ],
        })
    };
    let a = quad(
        [
            [-1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 2.0, 0.0],
            [-1.0, 2.0, 0.0],
        ],
        [0.0, 0.0, 1.0],
    );
    let b = quad(
        [
            [0.0, 0.0, -1.0],
            [0.0, 0.0, 1.0],
            [0.0, 2.0, 1.0],
            [0.0, 2.0, -1.0],
        ],
        [1.0, 0.0, 0.0],
    );
    ObjMesh {
        vertices: a.into_iter().chain(b).collect(),
        indices: vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7],
    }
}

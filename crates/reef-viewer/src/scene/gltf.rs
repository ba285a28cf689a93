//! glTF import: textures, materials, meshes and the node hierarchy, uploaded
//! once at startup.

use super::{Graph, Material, Mesh, NodeBind, Primitive, Scene, Vertex};
use anyhow::{bail, Context, Result};
use glam::Mat4;
use std::path::Path;
use wgpu::util::DeviceExt;

/// Bind group layouts shared by the loader and the scene render pipeline.
pub struct SceneLayouts {
    pub node: wgpu::BindGroupLayout,
    pub material: wgpu::BindGroupLayout,
}

impl SceneLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let node = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Node Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(64),
                },
                count: None,
            }],
        });
        let material = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Material Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(16),
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
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        Self { node, material }
    }
}

pub fn load_gltf(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layouts: &SceneLayouts,
    path: &Path,
) -> Result<Scene> {
    let (document, buffers, images) =
        gltf::import(path).with_context(|| format!("importing {}", path.display()))?;

    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Scene Diffuse Sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });

    let white_view = upload_rgba(device, queue, 1, 1, &[255, 255, 255, 255]);
    let mut texture_views = Vec::with_capacity(images.len());
    for (i, image) in images.iter().enumerate() {
        texture_views.push(match rgba_pixels(image) {
            Some(pixels) => upload_rgba(device, queue, image.width, image.height, &pixels),
            None => {
                log::warn!("texture {i}: unsupported format {:?}, using white", image.format);
                upload_rgba(device, queue, 1, 1, &[255, 255, 255, 255])
            }
        });
    }

    // One material record per document material, plus a trailing default for
    // primitives with no material.
    let mut materials = Vec::new();
    for mat in document.materials() {
        let pbr = mat.pbr_metallic_roughness();
        let base_color = pbr.base_color_factor();
        let view = pbr
            .base_color_texture()
            .map(|info| &texture_views[info.texture().source().index()])
            .unwrap_or(&white_view);
        materials.push(make_material(device, layouts, base_color, view, &sampler));
    }
    let default_material = materials.len();
    materials.push(make_material(
        device,
        layouts,
        [1.0; 4],
        &white_view,
        &sampler,
    ));

    // Meshes: interleave attributes, widen u16 indices, sort by material.
    let mut meshes = Vec::new();
    let mut mesh_materials = Vec::new();
    for mesh in document.meshes() {
        let mut primitives = Vec::new();
        for prim in mesh.primitives() {
            let reader = prim.reader(|b| Some(&buffers[b.index()]));
            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .context("primitive without positions")?
                .collect();
            let normals: Vec<[f32; 3]> = match reader.read_normals() {
                Some(iter) => iter.collect(),
                None => vec![[0.0, 1.0, 0.0]; positions.len()],
            };
            let uvs: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
                Some(iter) => iter.into_f32().collect(),
                None => vec![[0.0, 0.0]; positions.len()],
            };
            let indices: Vec<u32> = match reader.read_indices() {
                Some(gltf::mesh::util::ReadIndices::U16(iter)) => {
                    iter.map(u32::from).collect()
                }
                Some(gltf::mesh::util::ReadIndices::U32(iter)) => iter.collect(),
                Some(gltf::mesh::util::ReadIndices::U8(_)) => {
                    bail!("mesh {:?}: unsupported u8 index type", mesh.name())
                }
                None => bail!("mesh {:?}: primitive without indices", mesh.name()),
            };

            let vertices: Vec<Vertex> = positions
                .iter()
                .zip(&normals)
                .zip(&uvs)
                .map(|((&position, &normal), &uv)| Vertex {
                    position,
                    normal,
                    uv,
                })
                .collect();

            let material = prim.material().index().unwrap_or(default_material);
            primitives.push(upload_primitive(device, &vertices, &indices, material));
        }
        primitives.sort_by_key(|p| p.material);
        mesh_materials.push(primitives.iter().map(|p| p.material).collect());
        meshes.push(Mesh { primitives });
    }

    // Nodes, parents first: the default scene's roots seed the walk.
    let mut graph = Graph {
        nodes: Vec::new(),
        mesh_materials,
    };
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .context("glTF file contains no scene")?;
    let mut stack: Vec<(gltf::Node, Option<usize>)> =
        scene.nodes().map(|n| (n, None)).collect();
    stack.reverse();
    while let Some((node, parent)) = stack.pop() {
        let local = Mat4::from_cols_array_2d(&node.transform().matrix());
        let index = graph.add_node(parent, local, node.mesh().map(|m| m.index()));
        let children: Vec<_> = node.children().collect();
        for child in children.into_iter().rev() {
            stack.push((child, Some(index)));
        }
    }
    graph.propagate_transforms();

    let node_binds = graph
        .nodes
        .iter()
        .map(|node| {
            node.mesh
                .map(|_| make_node_bind(device, layouts, node.world))
        })
        .collect();

    log::info!(
        "Loaded {}: {} nodes, {} meshes, {} materials",
        path.display(),
        graph.nodes.len(),
        meshes.len(),
        materials.len()
    );

    Ok(Scene {
        graph,
        meshes,
        materials,
        node_binds,
    })
}

fn rgba_pixels(image: &gltf::image::Data) -> Option<Vec<u8>> {
    use gltf::image::Format;
    match image.format {
        Format::R8G8B8A8 => Some(image.pixels.clone()),
        Format::R8G8B8 => Some(
            image
                .pixels
                .chunks_exact(3)
                .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
                .collect(),
        ),
        _ => None,
    }
}

fn upload_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Scene Diffuse"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        texture.as_image_copy(),
        pixels,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn make_material(
    device: &wgpu::Device,
    layouts: &SceneLayouts,
    base_color: [f32; 4],
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> Material {
    let ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Material Color UBO"),
        contents: bytemuck::cast_slice(&base_color),
        usage: wgpu::BufferUsages::UNIFORM,
    });
    let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Material Bind"),
        layout: &layouts.material,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: ubo.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    Material { base_color, bind }
}

fn make_node_bind(device: &wgpu::Device, layouts: &SceneLayouts, world: Mat4) -> NodeBind {
    let ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Node Model UBO"),
        contents: bytemuck::cast_slice(&world.to_cols_array()),
        usage: wgpu::BufferUsages::UNIFORM,
    });
    let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Node Bind"),
        layout: &layouts.node,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: ubo.as_entire_binding(),
        }],
    });
    NodeBind { ubo, bind }
}

fn upload_primitive(
    device: &wgpu::Device,
    vertices: &[Vertex],
    indices: &[u32],
    material: usize,
) -> Primitive {
    let vertex_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Scene VB"),
        contents: bytemuck::cast_slice(vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Scene IB"),
        contents: bytemuck::cast_slice(indices),
        usage: wgpu::BufferUsages::INDEX,
    });
    Primitive {
        vertex_buf,
        index_buf,
        index_count: indices.len() as u32,
        material,
    }
}

//! Frame graph: compute passes feed a single geometry pass into thin
//! G-buffer targets, a strategy-owned composite resolves lighting and
//! water scattering to the swapchain, and the jellyfish overlay blends
//! on top. One encoder, one submit per frame.

pub mod context;
pub mod deferred;
pub mod forward;
pub mod overlay;
pub mod targets;

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::scene::{Scene, Vertex, Visit};
use crate::shaders;
use crate::stage::{FrameUniforms, GridMesh, Stage};

use context::GraphicsContext;
use deferred::DeferredStrategy;
use forward::ForwardStrategy;
use overlay::OverlayPipeline;
use targets::Targets;

/// Which lighting strategy resolves the geometry targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderMode {
    Forward,
    ClusteredDeferred,
}

impl RenderMode {
    pub const ALL: [RenderMode; 2] = [RenderMode::Forward, RenderMode::ClusteredDeferred];

    pub fn label(self) -> &'static str {
        match self {
            RenderMode::Forward => "Forward",
            RenderMode::ClusteredDeferred => "Clustered Deferred",
        }
    }
}

enum Strategy {
    Forward(ForwardStrategy),
    Deferred(DeferredStrategy),
}

impl Strategy {
    fn composite(&self) -> &wgpu::RenderPipeline {
        match self {
            Strategy::Forward(s) => &s.composite,
            Strategy::Deferred(s) => &s.composite,
        }
    }

    fn shade_bind(&self) -> &wgpu::BindGroup {
        match self {
            Strategy::Forward(s) => &s.shade_bind,
            Strategy::Deferred(s) => &s.shade_bind,
        }
    }
}

/// The four opaque pipelines sharing the geometry pass. All of them write
/// the same target pair, so the strategies never re-rasterize anything.
struct GeometryPipelines {
    scene: wgpu::RenderPipeline,
    coral: wgpu::RenderPipeline,
    floor: wgpu::RenderPipeline,
    surface: wgpu::RenderPipeline,
}

impl GeometryPipelines {
    fn new(device: &wgpu::Device, frame: &FrameUniforms, stage: &Stage, targets: &Targets) -> Self {
        let scene = make_geometry_pipeline(
            device,
            "Scene Geometry",
            shaders::SCENE_VS,
            shaders::SCENE_FS,
            &[Vertex::layout()],
            &[
                &frame.camera_layout,
                &stage.scene_layouts.node,
                &stage.scene_layouts.material,
            ],
            targets,
        );
        let coral = make_geometry_pipeline(
            device,
            "Coral Geometry",
            shaders::CORAL_VS,
            shaders::CORAL_FS,
            &[Vertex::layout()],
            &[&frame.camera_layout, &stage.coral.render_layout],
            targets,
        );
        let floor = make_geometry_pipeline(
            device,
            "Floor Geometry",
            shaders::OCEAN_FLOOR_VS,
            shaders::OCEAN_FLOOR_FS,
            &[GridMesh::layout()],
            &[&frame.camera_layout, &stage.floor.pipeline.render_layout],
            targets,
        );
        let surface = make_geometry_pipeline(
            device,
            "Surface Geometry",
            shaders::OCEAN_SURFACE_VS,
            shaders::OCEAN_SURFACE_FS,
            &[GridMesh::layout()],
            &[&frame.camera_layout, &stage.surface.pipeline.render_layout],
            targets,
        );
        Self {
            scene,
            coral,
            floor,
            surface,
        }
    }
}

fn make_geometry_pipeline(
    device: &wgpu::Device,
    label: &str,
    vs: &str,
    fs: &str,
    buffers: &[wgpu::VertexBufferLayout],
    layouts: &[&wgpu::BindGroupLayout],
    targets: &Targets,
) -> wgpu::RenderPipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(shaders::process(&format!("{vs}\n{fs}")).into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: "vs_main",
            compilation_options: Default::default(),
            buffers,
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: "fs_main",
            compilation_options: Default::default(),
            targets: &[
                Some(wgpu::ColorTargetState {
                    format: targets.albedo_fmt,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                }),
                Some(wgpu::ColorTargetState {
                    format: targets.aux_fmt,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                }),
            ],
        }),
        // The ocean surface is seen from below, so nothing is culled.
        primitive: wgpu::PrimitiveState {
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: targets.depth_fmt,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: Default::default(),
        multiview: None,
    })
}

/// Fullscreen resolve over the geometry targets. Both strategies share the
/// bind interface; only group 3 and the fragment body differ.
pub(crate) fn make_composite_pipeline(
    device: &wgpu::Device,
    label: &str,
    fs: &str,
    layouts: &[&wgpu::BindGroupLayout],
    surface_fmt: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(
            shaders::process_with_scattering(&format!("{}\n{}", shaders::FULLSCREEN_VS, fs)).into(),
        ),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
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
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: Default::default(),
        depth_stencil: None,
        multisample: Default::default(),
        multiview: None,
    })
}

pub struct Renderer {
    pub gfx: GraphicsContext,
    pub frame: FrameUniforms,
    pub targets: Targets,
    geometry: GeometryPipelines,
    mode: RenderMode,
    strategy: Strategy,
    overlay: OverlayPipeline,
    pub egui_renderer: egui_wgpu::Renderer,
    pub num_jellyfish: u32,
    /// Smoothed frame time for the UI readout, in milliseconds.
    pub frame_time_ms: f32,
    last_frame: Instant,
}

impl Renderer {
    pub fn new(
        gfx: GraphicsContext,
        frame: FrameUniforms,
        stage: &Stage,
        mode: RenderMode,
        num_jellyfish: u32,
    ) -> Self {
        let device = &gfx.device;
        let targets = Targets::new(device, gfx.size);
        let geometry = GeometryPipelines::new(device, &frame, stage, &targets);
        let strategy = build_strategy(device, &frame, &targets, stage, mode, gfx.config.format);
        let overlay = OverlayPipeline::new(device, &frame, &targets, gfx.config.format);
        let egui_renderer = egui_wgpu::Renderer::new(device, gfx.config.format, None, 1);
        log::info!("renderer up in {} mode", mode.label());
        Self {
            gfx,
            frame,
            targets,
            geometry,
            mode,
            strategy,
            overlay,
            egui_renderer,
            num_jellyfish,
            frame_time_ms: 0.0,
            last_frame: Instant::now(),
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Swaps the lighting strategy. The old strategy's pipelines and the
    /// intermediate targets are dropped and rebuilt; the next frame issued
    /// is already on the new strategy.
    pub fn set_mode(&mut self, stage: &Stage, mode: RenderMode) {
        if mode == self.mode {
            return;
        }
        log::info!("switching to {} mode", mode.label());
        self.targets = Targets::new(&self.gfx.device, self.gfx.size);
        self.strategy = build_strategy(
            &self.gfx.device,
            &self.frame,
            &self.targets,
            stage,
            mode,
            self.gfx.config.format,
        );
        self.overlay.rebuild_bind(&self.gfx.device, &self.targets);
        self.mode = mode;
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.gfx.resize(new_size);
        self.targets.resize(&self.gfx.device, new_size);
        self.overlay.rebuild_bind(&self.gfx.device, &self.targets);
    }

    /// Records and submits one frame into `swap_view`. The egui layer is a
    /// separate encoder submitted by the caller afterwards.
    pub fn render_frame(&mut self, stage: &mut Stage, camera: &Camera, swap_view: &wgpu::TextureView) {
        let now = Instant::now();
        let dt_ms = now.duration_since(self.last_frame).as_secs_f32() * 1000.0;
        self.last_frame = now;
        self.frame_time_ms += 0.05 * (dt_ms - self.frame_time_ms);

        let time = self.frame.write(&self.gfx.queue, camera);
        self.overlay
            .write_params(&self.gfx.queue, time, self.num_jellyfish);

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        stage.record_compute(&mut encoder);

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Geometry Pass"),
                color_attachments: &[
                    Some(wgpu::RenderPassColorAttachment {
                        view: &self.targets.albedo,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                    Some(wgpu::RenderPassColorAttachment {
                        view: &self.targets.aux,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    }),
                ],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.draw_geometry(&mut pass, stage);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Composite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(self.strategy.composite());
            pass.set_bind_group(0, &self.frame.camera_bind, &[]);
            pass.set_bind_group(1, &self.targets.read_bind, &[]);
            pass.set_bind_group(2, &stage.spectral.bind, &[]);
            pass.set_bind_group(3, self.strategy.shade_bind(), &[]);
            pass.draw(0..3, 0..1);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Overlay Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.overlay.record(&mut pass, &self.frame.camera_bind);
        }

        self.gfx.queue.submit(std::iter::once(encoder.finish()));
    }

    fn draw_geometry<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>, stage: &'a Stage) {
        pass.set_bind_group(0, &self.frame.camera_bind, &[]);

        draw_scene(pass, &self.geometry.scene, &stage.scene);

        pass.set_pipeline(&self.geometry.coral);
        pass.set_vertex_buffer(0, stage.coral.vertex_buf.slice(..));
        pass.set_index_buffer(stage.coral.index_buf.slice(..), wgpu::IndexFormat::Uint32);
        for bind in stage.coral.render_binds() {
            pass.set_bind_group(1, bind, &[]);
            pass.draw_indexed(0..stage.coral.index_count, 0, 0..stage.coral.instance_count());
        }

        let grid = &stage.grid_mesh;
        pass.set_vertex_buffer(0, grid.vertex_buf.slice(..));
        pass.set_index_buffer(grid.index_buf.slice(..), wgpu::IndexFormat::Uint32);

        pass.set_pipeline(&self.geometry.floor);
        for chunk in stage.floor.chunks() {
            pass.set_bind_group(1, &chunk.render_bind, &[]);
            pass.draw_indexed(0..grid.index_count, 0, 0..1);
        }

        pass.set_pipeline(&self.geometry.surface);
        for chunk in stage.surface.chunks() {
            pass.set_bind_group(1, &chunk.render_bind, &[]);
            pass.draw_indexed(0..grid.index_count, 0, 0..1);
        }
    }

    /// The fixed pass order, as data. Exists so the ordering contract is
    /// testable without a device.
    pub fn pass_plan(mode: RenderMode) -> Vec<&'static str> {
        vec![
            "generate-surface",
            "generate-floor",
            "place-coral",
            "move-lights",
            "cluster-lights",
            "geometry",
            match mode {
                RenderMode::Forward => "composite-forward",
                RenderMode::ClusteredDeferred => "composite-deferred",
            },
            "overlay",
        ]
    }
}

fn build_strategy(
    device: &wgpu::Device,
    frame: &FrameUniforms,
    targets: &Targets,
    stage: &Stage,
    mode: RenderMode,
    surface_fmt: wgpu::TextureFormat,
) -> Strategy {
    match mode {
        RenderMode::Forward => Strategy::Forward(ForwardStrategy::new(
            device,
            frame,
            targets,
            &stage.spectral,
            &stage.lights,
            surface_fmt,
        )),
        RenderMode::ClusteredDeferred => Strategy::Deferred(DeferredStrategy::new(
            device,
            frame,
            targets,
            &stage.spectral,
            &stage.lights,
            surface_fmt,
        )),
    }
}

fn draw_scene<'a>(
    pass: &mut wgpu::RenderPass<'a>,
    pipeline: &'a wgpu::RenderPipeline,
    scene: &'a Scene,
) {
    if scene.meshes.is_empty() {
        return;
    }
    pass.set_pipeline(pipeline);
    scene.graph.walk(|visit| match visit {
        Visit::Node(i) => {
            if let Some(bind) = &scene.node_binds[i] {
                pass.set_bind_group(1, &bind.bind, &[]);
            }
        }
        Visit::Material(m) => {
            pass.set_bind_group(2, &scene.materials[m].bind, &[]);
        }
        Visit::Primitive { mesh, primitive } => {
            let prim = &scene.meshes[mesh].primitives[primitive];
            pass.set_vertex_buffer(0, prim.vertex_buf.slice(..));
            pass.set_index_buffer(prim.index_buf.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..prim.index_count, 0, 0..1);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_precedes_geometry_precedes_resolve() {
        for mode in RenderMode::ALL {
            let plan = Renderer::pass_plan(mode);
            let pos = |name| plan.iter().position(|&p| p == name).unwrap();
            assert!(pos("cluster-lights") < pos("geometry"));
            assert!(pos("place-coral") < pos("geometry"));
            assert!(pos("geometry") < plan.len() - 2);
            assert_eq!(*plan.last().unwrap(), "overlay");
        }
    }

    #[test]
    fn composite_label_tracks_mode() {
        assert!(Renderer::pass_plan(RenderMode::Forward).contains(&"composite-forward"));
        assert!(
            Renderer::pass_plan(RenderMode::ClusteredDeferred).contains(&"composite-deferred")
        );
    }

    #[test]
    fn mode_labels_are_distinct() {
        assert_ne!(
            RenderMode::Forward.label(),
            RenderMode::ClusteredDeferred.label()
        );
    }
}

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use glam::Vec3;
use winit::{event::WindowEvent, window::Window};

use crate::camera::{Camera, CameraController};
use crate::config::ViewerConfig;
use crate::renderer::{context::GraphicsContext, Renderer};
use crate::stage::{FrameUniforms, Stage};
use crate::ui::{self, UiState};

pub struct App {
    pub renderer: Renderer,
    pub stage: Stage,
    pub camera: Camera,
    pub camera_controller: CameraController,
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    ui_state: UiState,
    last_frame: Instant,
}

impl App {
    pub async fn new(window: Arc<Window>, config: ViewerConfig) -> Result<Self> {
        let gfx = GraphicsContext::new(window.clone()).await?;
        let size = gfx.size;

        let frame = FrameUniforms::new(&gfx.device);
        let stage = Stage::new(&gfx.device, &gfx.queue, &frame, &config)?;

        // Start mid-water, looking along -Z toward open ocean.
        let camera = Camera::new(
            Vec3::new(0.0, -12.0, 60.0),
            size.width as f32 / size.height.max(1) as f32,
        );
        let camera_controller = CameraController::new();

        let renderer = Renderer::new(
            gfx,
            frame,
            &stage,
            config.render_mode,
            config.num_jellyfish,
        );

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            None,
            None,
        );

        let ui_state = UiState {
            mode: renderer.mode(),
            water_type: stage.spectral.water_type(),
            num_lights: stage.lights.count(),
            num_jellyfish: renderer.num_jellyfish,
        };

        Ok(Self {
            renderer,
            stage,
            camera,
            camera_controller,
            egui_ctx,
            egui_state,
            ui_state,
            last_frame: Instant::now(),
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.renderer.resize(new_size);
            self.camera
                .set_aspect(new_size.width as f32 / new_size.height as f32);
        }
    }

    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        if response.consumed {
            return true;
        }

        self.camera_controller.handle_event(event, &mut self.camera);

        if let WindowEvent::Resized(physical_size) = event {
            self.resize(*physical_size);
        }

        false
    }

    /// Pushes panel edits into the live renderer and stage. Everything here
    /// is cheap except a mode switch, which rebuilds one pipeline.
    fn apply_ui_state(&mut self) {
        let queue = &self.renderer.gfx.queue;
        if self.ui_state.num_lights != self.stage.lights.count() {
            self.stage.lights.set_count(queue, self.ui_state.num_lights);
        }
        if self.ui_state.water_type != self.stage.spectral.water_type() {
            self.stage
                .spectral
                .set_water_type(queue, self.ui_state.water_type);
        }
        self.renderer.num_jellyfish = self.ui_state.num_jellyfish;
        self.renderer.set_mode(&self.stage, self.ui_state.mode);
    }

    pub fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.camera_controller.update(&mut self.camera, dt);
        self.stage.update(&self.renderer.gfx.queue, &self.camera);

        let frame = self.renderer.gfx.surface.get_current_texture()?;
        let swap_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.renderer
            .render_frame(&mut self.stage, &self.camera, &swap_view);

        let egui_input = self.egui_state.take_egui_input(window);
        self.egui_ctx.begin_frame(egui_input);

        ui::draw_panel(
            &self.egui_ctx,
            &mut self.ui_state,
            self.renderer.frame_time_ms,
        );

        let egui_output = self.egui_ctx.end_frame();
        let shapes = self
            .egui_ctx
            .tessellate(egui_output.shapes, self.egui_ctx.pixels_per_point());

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [
                self.renderer.gfx.config.width,
                self.renderer.gfx.config.height,
            ],
            pixels_per_point: self.egui_ctx.pixels_per_point(),
        };

        let mut encoder = self
            .renderer
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("UI Encoder"),
            });

        for (id, delta) in &egui_output.textures_delta.set {
            self.renderer.egui_renderer.update_texture(
                &self.renderer.gfx.device,
                &self.renderer.gfx.queue,
                *id,
                delta,
            );
        }

        self.renderer.egui_renderer.update_buffers(
            &self.renderer.gfx.device,
            &self.renderer.gfx.queue,
            &mut encoder,
            &shapes,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("EGUI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &swap_view,
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

            self.renderer
                .egui_renderer
                .render(&mut render_pass, &shapes, &screen_descriptor);
        }

        for id in &egui_output.textures_delta.free {
            self.renderer.egui_renderer.free_texture(id);
        }

        self.renderer
            .gfx
            .queue
            .submit(std::iter::once(encoder.finish()));
        frame.present();

        self.apply_ui_state();

        Ok(())
    }
}

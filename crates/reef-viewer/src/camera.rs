use glam::{Mat4, Vec3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// GPU-side camera block. Must match `CameraUniforms` in `common.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub position: [f32; 3],
    pub _pad0: f32,
    /// (1 / proj[0][0], 1 / proj[1][1]): NDC to view-space scale at unit depth.
    pub proj_scale: [f32; 2],
    pub near: f32,
    pub far: f32,
}

const _: [(); 224] = [(); std::mem::size_of::<CameraUniforms>()];

/// Free-fly camera. Yaw/pitch drive the look direction; the projection is
/// rebuilt on resize.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    /// Radians, 0 looks down -Z.
    pub yaw: f32,
    /// Radians, clamped short of straight up/down.
    pub pitch: f32,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub proj: Mat4,
}

impl Camera {
    pub fn new(position: Vec3, aspect: f32) -> Self {
        let fov_y = 55f32.to_radians();
        let near = 0.1;
        let far = 2000.0;
        Self {
            position,
            yaw: 0.0,
            pitch: -0.15,
            fov_y,
            aspect,
            near,
            far,
            proj: Mat4::perspective_rh(fov_y, aspect, near, far),
        }
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.proj = Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far);
    }

    pub fn forward(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(-sy * cp, sp, -cy * cp).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj * self.view()
    }

    /// Fills the GPU uniform block for this frame.
    pub fn uniforms(&self) -> CameraUniforms {
        let view = self.view();
        let view_proj = self.proj * view;
        CameraUniforms {
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            position: self.position.into(),
            _pad0: 0.0,
            proj_scale: [
                1.0 / self.proj.col(0).x,
                1.0 / self.proj.col(1).y,
            ],
            near: self.near,
            far: self.far,
        }
    }
}

pub struct CameraController {
    mouse_down: bool,
    last_mouse: Option<(f64, f64)>,
    forward: bool,
    back: bool,
    left: bool,
    right: bool,
    up: bool,
    down: bool,
    pub speed: f32,
}

impl CameraController {
    pub fn new() -> Self {
        Self {
            mouse_down: false,
            last_mouse: None,
            forward: false,
            back: false,
            left: false,
            right: false,
            up: false,
            down: false,
            speed: 12.0,
        }
    }

    /// Handles window events and updates look direction immediately.
    /// Translation is accumulated and applied in [`Self::update`].
    pub fn handle_event(&mut self, event: &WindowEvent, camera: &mut Camera) {
        match event {
            WindowEvent::MouseInput { button, state, .. } => {
                if *button == MouseButton::Left {
                    self.mouse_down = *state == ElementState::Pressed;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.handle_cursor_look((position.x, position.y), camera);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };
                self.speed = (self.speed * 1.1f32.powf(scroll)).clamp(0.5, 200.0);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let pressed = event.state == ElementState::Pressed;
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::KeyW) => self.forward = pressed,
                    PhysicalKey::Code(KeyCode::KeyS) => self.back = pressed,
                    PhysicalKey::Code(KeyCode::KeyA) => self.left = pressed,
                    PhysicalKey::Code(KeyCode::KeyD) => self.right = pressed,
                    PhysicalKey::Code(KeyCode::Space) => self.up = pressed,
                    PhysicalKey::Code(KeyCode::ShiftLeft) => self.down = pressed,
                    _ => {}
                }
            }
            _ => {}
        }
    }

    /// Applies held-key translation for this frame.
    pub fn update(&self, camera: &mut Camera, dt: f32) {
        let mut delta = Vec3::ZERO;
        let fwd = camera.forward();
        let right = camera.right();
        if self.forward {
            delta += fwd;
        }
        if self.back {
            delta -= fwd;
        }
        if self.right {
            delta += right;
        }
        if self.left {
            delta -= right;
        }
        if self.up {
            delta += Vec3::Y;
        }
        if self.down {
            delta -= Vec3::Y;
        }
        if delta != Vec3::ZERO {
            camera.position += delta.normalize() * self.speed * dt;
        }
    }

    fn handle_cursor_look(&mut self, xy: (f64, f64), camera: &mut Camera) {
        if let Some(last) = self.last_mouse {
            if self.mouse_down {
                let dx = (xy.0 - last.0) as f32 * 0.0035;
                let dy = (xy.1 - last.1) as f32 * 0.0035;
                camera.yaw -= dx;
                camera.pitch = (camera.pitch - dy)
                    .clamp(-89f32.to_radians(), 89f32.to_radians());
            }
        }
        self.last_mouse = Some(xy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn forward_matches_yaw_zero() {
        let mut cam = Camera::new(Vec3::ZERO, 1.5);
        cam.pitch = 0.0;
        let f = cam.forward();
        assert!((f - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn proj_scale_inverts_projection_diagonal() {
        let cam = Camera::new(Vec3::new(1.0, -10.0, 3.0), 16.0 / 9.0);
        let u = cam.uniforms();
        assert!((u.proj_scale[0] * cam.proj.col(0).x - 1.0).abs() < 1e-6);
        assert!((u.proj_scale[1] * cam.proj.col(1).y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn inv_view_proj_round_trips_a_point() {
        let cam = Camera::new(Vec3::new(5.0, -20.0, 5.0), 1.0);
        let u = cam.uniforms();
        let vp = Mat4::from_cols_array_2d(&u.view_proj);
        let inv = Mat4::from_cols_array_2d(&u.inv_view_proj);
        let world = Vec4::new(12.0, -30.0, -40.0, 1.0);
        let clip = vp * world;
        let back = inv * clip;
        let back = back / back.w;
        assert!((back.truncate() - world.truncate()).length() < 1e-2);
    }
}

//! Per-frame mouse input and the orbit camera controller driven by it.
//!
//! Window events feed an [`InputState`] owned by the application; once per
//! frame it hands out an immutable [`InputSnapshot`].

use glam::{Vec2, Vec3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

/// Pixels a `PixelDelta` scroll counts as one wheel line.
const PIXELS_PER_LINE: f32 = 20.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputSnapshot {
    pub cursor: Vec2,
    pub left: bool,
    pub right: bool,
    /// Wheel lines scrolled since the previous snapshot.
    pub scroll: f32,
}

#[derive(Debug, Default)]
pub struct InputState {
    cursor: Vec2,
    left: bool,
    right: bool,
    scroll: f32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the event was consumed.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = *state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.left = pressed,
                    MouseButton::Right => self.right = pressed,
                    _ => return false,
                }
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.scroll += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / PIXELS_PER_LINE,
                };
                true
            }
            WindowEvent::Focused(false) => {
                self.left = false;
                self.right = false;
                false
            }
            _ => false,
        }
    }

    /// Captures the current state and resets the accumulated scroll.
    pub fn snapshot(&mut self) -> InputSnapshot {
        InputSnapshot {
            cursor: self.cursor,
            left: self.left,
            right: self.right,
            scroll: std::mem::take(&mut self.scroll),
        }
    }
}

/// Orbit with the left button, pan with the right, dolly with the wheel.
#[derive(Debug, Clone)]
pub struct OrbitController {
    pub orbit_speed: f32,
    pub pan_speed: f32,
    last_cursor: Option<Vec2>,
}

impl Default for OrbitController {
    fn default() -> Self {
        Self {
            orbit_speed: 0.5,
            pan_speed: 0.0008,
            last_cursor: None,
        }
    }
}

impl OrbitController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `camera` according to this frame's input. `viewport_height` scales
    /// cursor motion so a full-height drag is one orbit-speed turn.
    pub fn update(&mut self, camera: &mut super::Camera, input: &InputSnapshot, viewport_height: u32) {
        let delta = self
            .last_cursor
            .map_or(Vec2::ZERO, |last| input.cursor - last);
        self.last_cursor = Some(input.cursor);

        let orbit = if input.left {
            delta / viewport_height.max(1) as f32
        } else {
            Vec2::ZERO
        };
        let pan = if input.right {
            delta * self.pan_speed
        } else {
            Vec2::ZERO
        };

        if orbit != Vec2::ZERO || input.scroll != 0.0 {
            self.orbit(camera, orbit, input.scroll);
        }
        if pan != Vec2::ZERO {
            Self::pan(camera, pan);
        }
    }

    fn orbit(&self, camera: &mut super::Camera, orbit: Vec2, scroll: f32) {
        let from_target = camera.eye - camera.target;
        let radius = from_target.length();
        if radius <= f32::EPSILON {
            return;
        }
        let theta = from_target.x.atan2(from_target.z);
        let phi = (from_target.y / radius).clamp(-1.0, 1.0).acos();
        let factor = std::f32::consts::TAU * self.orbit_speed;

        let radius = radius * 0.95f32.powf(scroll);
        let theta = theta - orbit.x * factor;
        let phi = (phi - orbit.y * factor).clamp(1e-4, std::f32::consts::PI - 1e-4);

        let offset = Vec3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        camera.eye = camera.target + offset;
    }

    fn pan(camera: &mut super::Camera, pan: Vec2) {
        let (left, up) = camera.screen_axes();
        let factor = camera.frustum_height_at_target();
        camera.translate(left * (pan.x * factor) + up * (pan.y * factor));
    }
}

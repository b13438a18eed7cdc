//! Perspective camera aimed at a target point.

use glam::{Mat4, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(3.0, 3.0, -3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_radians: 60f32.to_radians(),
            near: 0.1,
            far: 50.0,
        }
    }
}

impl Camera {
    pub fn position(&self) -> Vec3 {
        self.eye
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Perspective for a viewport in pixels. A zero dimension counts as one.
    pub fn projection(&self, viewport: (u32, u32)) -> Mat4 {
        let aspect = viewport.0.max(1) as f32 / viewport.1.max(1) as f32;
        Mat4::perspective_rh(self.fov_y_radians, aspect, self.near, self.far)
    }

    pub fn view_projection(&self, viewport: (u32, u32)) -> Mat4 {
        self.projection(viewport) * self.view()
    }

    /// World-space height of the view frustum at the target's depth.
    pub fn frustum_height_at_target(&self) -> f32 {
        (self.target - self.eye).length() * (self.fov_y_radians / 2.0).tan() * 2.0
    }

    /// Screen-aligned (left, up) unit vectors in world space.
    pub fn screen_axes(&self) -> (Vec3, Vec3) {
        let forward = (self.target - self.eye).normalize_or_zero();
        let left = self.up.cross(forward).normalize_or_zero();
        (left, forward.cross(left))
    }

    /// Moves eye and target together.
    pub fn translate(&mut self, delta: Vec3) {
        self.eye += delta;
        self.target += delta;
    }
}

//! Free-fly camera used by every sandbox scene.

use bytemuck::{Pod, Zeroable};
use engine_core::Transform;
use glam::{Mat4, Quat, Vec3};

/// Fly camera with configurable FOV and clipping planes.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera transform (position and rotation).
    pub transform: Transform,
    /// Field of view in degrees.
    pub fov_degrees: f32,
    /// Near clipping plane.
    pub near: f32,
    /// Far clipping plane.
    pub far: f32,
    /// Aspect ratio (width / height).
    pub aspect: f32,
    /// Mouse sensitivity for look controls.
    pub sensitivity: f32,
    /// Current pitch (up/down rotation) in radians.
    pitch: f32,
    /// Current yaw (left/right rotation) in radians.
    yaw: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            fov_degrees: 70.0,
            near: 0.1,
            far: 1000.0,
            aspect: 16.0 / 9.0,
            sensitivity: 0.002,
            pitch: 0.0,
            yaw: 0.0,
        }
    }
}

impl Camera {
    /// Create a new camera at the given position.
    pub fn new(position: Vec3) -> Self {
        Self {
            transform: Transform::from_position(position),
            ..Default::default()
        }
    }

    /// Update aspect ratio (call on window resize).
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    /// Process mouse movement for look controls.
    pub fn process_mouse(&mut self, delta_x: f32, delta_y: f32) {
        let yaw = self.yaw - delta_x * self.sensitivity;
        let pitch = self.pitch - delta_y * self.sensitivity;
        self.set_yaw_pitch(yaw, pitch);
    }

    /// Free-fly: move in camera space. `input.x` strafes, `input.y` moves along world up,
    /// `input.z` moves forward.
    pub fn process_fly(&mut self, input: Vec3, speed: f32, dt: f32) {
        let forward = self.transform.forward();
        let right = self.transform.right();

        let mut velocity = Vec3::ZERO;
        velocity += forward * input.z;
        velocity += right * input.x;
        velocity += Vec3::Y * input.y;

        if velocity.length_squared() > 0.0 {
            velocity = velocity.normalize() * speed * dt;
            self.transform.translate(velocity);
        }
    }

    /// Get the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        let eye = self.transform.position;
        let target = eye + self.transform.forward();
        Mat4::look_at_rh(eye, target, Vec3::Y)
    }

    /// Get the projection matrix.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    /// Get the combined view-projection matrix.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Get camera position.
    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.transform.position = position;
    }

    /// Get camera forward direction.
    pub fn forward(&self) -> Vec3 {
        self.transform.forward()
    }

    /// Get current yaw (left/right rotation) in radians.
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Get current pitch (up/down rotation) in radians.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Set yaw and pitch directly (in radians) and rebuild rotation.
    pub fn set_yaw_pitch(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        // Clamp pitch to prevent flipping
        let max_pitch = std::f32::consts::FRAC_PI_2 - 0.01;
        self.pitch = pitch.clamp(-max_pitch, max_pitch);
        self.transform.rotation = Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch);
    }
}

/// Camera uniform data for GPU.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub position: [f32; 4], // w unused, padding
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            view: Mat4::IDENTITY.to_cols_array_2d(),
            proj: Mat4::IDENTITY.to_cols_array_2d(),
            position: [0.0; 4],
        }
    }

    pub fn update(&mut self, camera: &Camera) {
        self.view = camera.view_matrix().to_cols_array_2d();
        self.proj = camera.projection_matrix().to_cols_array_2d();
        self.view_proj = camera.view_projection_matrix().to_cols_array_2d();
        let pos = camera.position();
        self.position = [pos.x, pos.y, pos.z, 1.0];
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_is_clamped_short_of_vertical() {
        let mut camera = Camera::default();
        camera.set_yaw_pitch(0.0, 10.0);
        assert!(camera.pitch() < std::f32::consts::FRAC_PI_2);
        assert!(camera.forward().y > 0.99);
    }

    #[test]
    fn fly_forward_moves_along_view_direction() {
        let mut camera = Camera::new(Vec3::ZERO);
        camera.process_fly(Vec3::new(0.0, 0.0, 1.0), 10.0, 0.5);
        assert!((camera.position() - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-5);
    }
}

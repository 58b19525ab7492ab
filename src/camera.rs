use glam::{Mat4, Vec3};

/// Pitch limit in degrees, short of straight up/down so the view basis stays valid.
const PITCH_LIMIT: f32 = 89.9;

/// A first-person camera described by position, pitch and yaw.
///
/// Angles are in degrees. Positive pitch looks down; zero yaw looks along -Z.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pitch: f32,
    yaw: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 10.0, 25.0),
            pitch: 30.0,
            yaw: 0.0,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = Vec3::new(x, y, z);
        self
    }

    pub fn with_rotation(mut self, pitch: f32, yaw: f32) -> Self {
        self.set_rotation(pitch, yaw);
        self
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn set_rotation(&mut self, pitch: f32, yaw: f32) {
        self.pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.yaw = yaw;
    }

    /// Add to pitch and yaw, scaled by `speed`.
    pub fn rotate(&mut self, pitch_offset: f32, yaw_offset: f32, speed: f32) {
        self.set_rotation(
            self.pitch + pitch_offset * speed,
            self.yaw + yaw_offset * speed,
        );
    }

    pub fn front(&self) -> Vec3 {
        let (pitch, yaw) = (self.pitch.to_radians(), self.yaw.to_radians());
        Vec3::new(
            pitch.cos() * yaw.sin(),
            -pitch.sin(),
            -pitch.cos() * yaw.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.front().cross(Vec3::Y).normalize()
    }

    /// Move along the camera's right, world up and front axes.
    pub fn translate_local(&mut self, offset: Vec3) {
        self.position += offset.x * self.right() + offset.y * Vec3::Y + offset.z * self.front();
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front(), Vec3::Y)
    }
}

/// Perspective projection with a fixed vertical field of view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Projection {
    pub const FOV_Y_DEGREES: f32 = 60.0;
    pub const NEAR: f32 = 0.5;
    pub const FAR: f32 = 1000.0;

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            fov_y_degrees: Self::FOV_Y_DEGREES,
            aspect: width as f32 / height.max(1) as f32,
            near: Self::NEAR,
            far: Self::FAR,
        }
    }

    /// Right-handed projection into wgpu's `[0, 1]` depth range.
    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        )
    }
}

/// Per-frame camera data as laid out in the shaders' `FrameUniforms`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    /// xyz = camera position, w unused.
    pub camera_pos: [f32; 4],
}

impl FrameUniforms {
    pub fn new(camera: &Camera, projection: &Projection) -> Self {
        let view = camera.view_matrix();
        let proj = projection.matrix();
        Self {
            view_proj: (proj * view).to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            camera_pos: camera.position.extend(1.0).to_array(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn zero_rotation_looks_down_negative_z() {
        let camera = Camera::new().with_rotation(0.0, 0.0);
        assert!(approx(camera.front(), Vec3::NEG_Z));
        assert!(approx(camera.right(), Vec3::X));
    }

    #[test]
    fn positive_pitch_looks_down() {
        let camera = Camera::new();
        assert!(camera.front().y < 0.0);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::new();
        camera.rotate(500.0, 0.0, 1.0);
        assert_eq!(camera.pitch(), 89.9);
        camera.rotate(-1000.0, 0.0, 1.0);
        assert_eq!(camera.pitch(), -89.9);
    }

    #[test]
    fn forward_motion_follows_front() {
        let mut camera = Camera::new().at(0.0, 0.0, 0.0).with_rotation(0.0, 90.0);
        camera.translate_local(Vec3::new(0.0, 0.0, 2.0));
        assert!(approx(camera.position, Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn view_maps_target_onto_negative_z() {
        let camera = Camera::new();
        let ahead = camera.position + camera.front() * 3.0;
        let in_view = camera.view_matrix().transform_point3(ahead);
        assert!(approx(in_view, Vec3::new(0.0, 0.0, -3.0)));
    }

    #[test]
    fn projection_uses_window_aspect() {
        let projection = Projection::new(1600, 900);
        assert!((projection.aspect - 16.0 / 9.0).abs() < 1e-6);
        assert_eq!(projection.near, 0.5);
        assert_eq!(projection.far, 1000.0);

        // far plane maps to depth 1
        let clip = projection.matrix() * glam::Vec4::new(0.0, 0.0, -1000.0, 1.0);
        assert!((clip.z / clip.w - 1.0).abs() < 1e-4);
    }
}

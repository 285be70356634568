use glam::{Mat4, Vec3};

/// A perspective camera for 3D scenes.
///
/// Right-handed, looking down -Z by default, with a depth range of 0..1 as
/// wgpu expects.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov: f32, // radians, vertical
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 5.0),
            target: Vec3::new(0.0, 0.0, -5.0),
            up: Vec3::Y,
            fov: 45f32.to_radians(),
            near: 0.1,
            far: 100.0,
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

    pub fn looking_at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.target = Vec3::new(x, y, z);
        self
    }

    pub fn with_fov(mut self, fov_degrees: f32) -> Self {
        self.fov = fov_degrees.to_radians();
        self
    }

    pub fn with_clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
    }

    /// Matrices for the camera uniform at the given aspect ratio.
    pub fn uniform(&self, aspect: f32) -> CameraUniform {
        let view = self.view();
        let projection = self.projection(aspect);
        CameraUniform {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            view_projection: (projection * view).to_cols_array_2d(),
        }
    }
}

/// Camera uniform at group 0, binding 0: three column-major matrices, 192 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
}

pub const CAMERA_UNIFORM_SIZE: u64 = std::mem::size_of::<CameraUniform>() as u64;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn uniform_is_three_matrices() {
        assert_eq!(CAMERA_UNIFORM_SIZE, 192);
    }

    #[test]
    fn view_projection_combines_in_order() {
        let camera = Camera::new().at(0.0, 0.0, 5.0).looking_at(0.0, 0.0, 0.0);
        let uniform = camera.uniform(16.0 / 9.0);
        let expected = camera.projection(16.0 / 9.0) * camera.view();
        assert_eq!(uniform.view_projection, expected.to_cols_array_2d());
    }

    #[test]
    fn target_projects_to_screen_center() {
        let camera = Camera::new().at(0.0, 2.0, 5.0).looking_at(0.0, 0.0, -5.0);
        let vp = camera.projection(1.0) * camera.view();
        let clip = vp * Vec4::new(0.0, 0.0, -5.0, 1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}

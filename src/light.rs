//! The single directional light.

use glam::Vec3;

/// A directional light with a flat ambient term.
///
/// `direction` points from the light into the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub ambient_strength: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.3, -1.0, -0.5).normalize(),
            color: Vec3::ONE,
            intensity: 1.0,
            ambient_strength: 0.2,
        }
    }
}

impl DirectionalLight {
    pub fn new(direction: Vec3) -> Self {
        Self {
            direction: direction.normalize_or(Vec3::NEG_Y),
            ..Self::default()
        }
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    pub fn with_ambient(mut self, strength: f32) -> Self {
        self.ambient_strength = strength;
        self
    }

    pub fn uniform(&self) -> LightUniform {
        LightUniform {
            direction_x: self.direction.x,
            direction_y: self.direction.y,
            direction_z: self.direction.z,
            intensity: self.intensity,
            color_x: self.color.x,
            color_y: self.color.y,
            color_z: self.color.z,
            ambient_strength: self.ambient_strength,
            ambient_xy: [0.0; 2],
        }
    }
}

/// Light uniform at group 1, binding 0.
///
/// Scalar fields keep the WGSL struct free of vec3 padding; the layout is
/// exactly 40 bytes on both sides. `ambient_xy` is reserved and written as zero.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub direction_x: f32,
    pub direction_y: f32,
    pub direction_z: f32,
    pub intensity: f32,
    pub color_x: f32,
    pub color_y: f32,
    pub color_z: f32,
    pub ambient_strength: f32,
    pub ambient_xy: [f32; 2],
}

pub const LIGHT_UNIFORM_SIZE: u64 = std::mem::size_of::<LightUniform>() as u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_is_forty_bytes() {
        assert_eq!(LIGHT_UNIFORM_SIZE, 40);
    }

    #[test]
    fn fields_land_at_shader_offsets() {
        let light = DirectionalLight::new(Vec3::new(0.0, -2.0, 0.0))
            .with_color(Vec3::new(1.0, 0.5, 0.25))
            .with_intensity(3.0)
            .with_ambient(0.1);
        let uniform = light.uniform();
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&uniform));
        assert_eq!(floats, &[0.0, -1.0, 0.0, 3.0, 1.0, 0.5, 0.25, 0.1, 0.0, 0.0]);
    }

    #[test]
    fn zero_direction_points_down() {
        assert_eq!(DirectionalLight::new(Vec3::ZERO).direction, Vec3::NEG_Y);
    }
}

//! Placed copies of a template: material attributes plus a transform.

use crate::util::{compose_model_matrix, normal_matrix, Mat3, Mat4, Vec3};

/// Material and transform of one scene object.
///
/// Fields are private. Setters keep the model matrix in sync with
/// position, rotation and scale, and clamp material values to their ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    color: Vec3,
    emissive_color: Vec3,
    emission_strength: f32,
    smoothness: f32,
    reflectivity: f32,
    position: Vec3,
    /// Euler angles in degrees.
    rotation: Vec3,
    scale: Vec3,
    model: Mat4,
}

impl Default for Instance {
    fn default() -> Self {
        Self::new(Vec3::splat(0.3))
    }
}

impl Instance {
    /// Unit-scale instance at the origin with the given albedo.
    pub fn new(color: Vec3) -> Self {
        Self {
            color,
            emissive_color: Vec3::ZERO,
            emission_strength: 0.0,
            smoothness: 1.0,
            reflectivity: 0.0,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            model: Mat4::IDENTITY,
        }
    }

    /// Builder-style transform setup.
    pub fn with_transform(mut self, position: Vec3, rotation: Vec3, scale: Vec3) -> Self {
        self.position = position;
        self.rotation = rotation;
        self.scale = scale;
        self.update_model();
        self
    }

    /// Builder-style emission setup.
    pub fn with_emission(mut self, color: Vec3, strength: f32) -> Self {
        self.set_emissive_color(color);
        self.set_emission_strength(strength);
        self
    }

    fn update_model(&mut self) {
        self.model = compose_model_matrix(self.position, self.rotation, self.scale);
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
    }

    pub fn emissive_color(&self) -> Vec3 {
        self.emissive_color
    }

    pub fn set_emissive_color(&mut self, color: Vec3) {
        self.emissive_color = color;
    }

    pub fn emission_strength(&self) -> f32 {
        self.emission_strength
    }

    pub fn set_emission_strength(&mut self, strength: f32) {
        self.emission_strength = strength.max(0.0);
    }

    pub fn smoothness(&self) -> f32 {
        self.smoothness
    }

    pub fn set_smoothness(&mut self, smoothness: f32) {
        self.smoothness = smoothness.clamp(0.0, 1.0);
    }

    pub fn reflectivity(&self) -> f32 {
        self.reflectivity
    }

    pub fn set_reflectivity(&mut self, reflectivity: f32) {
        self.reflectivity = reflectivity.clamp(0.0, 1.0);
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.update_model();
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
        self.update_model();
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.update_model();
    }

    /// Set the same scale on all three axes.
    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.set_scale(Vec3::splat(scale));
    }

    /// `T(position) * R(rotation) * S(scale)`.
    pub fn model(&self) -> &Mat4 {
        &self.model
    }

    /// Inverse-transpose of the model's upper 3x3.
    pub fn normal_matrix(&self) -> Mat3 {
        normal_matrix(&self.model)
    }

    /// Emitted radiance: emissive color times strength.
    pub fn emission(&self) -> Vec3 {
        self.emissive_color * self.emission_strength
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_refresh_model() {
        let mut inst = Instance::default();
        assert_eq!(*inst.model(), Mat4::IDENTITY);

        inst.set_position(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(inst.model().w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0));

        inst.set_scale(Vec3::new(2.0, 2.0, 2.0));
        let p = inst.model().transform_point3(Vec3::X);
        assert!((p - Vec3::new(3.0, 2.0, 3.0)).length() < 1e-5);

        inst.set_rotation(Vec3::new(0.0, 0.0, 90.0));
        let p = inst.model().transform_point3(Vec3::X);
        assert!((p - Vec3::new(1.0, 4.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn test_material_clamping() {
        let mut inst = Instance::default();
        inst.set_smoothness(1.5);
        assert_eq!(inst.smoothness(), 1.0);
        inst.set_reflectivity(-0.2);
        assert_eq!(inst.reflectivity(), 0.0);
        inst.set_emission_strength(-3.0);
        assert_eq!(inst.emission_strength(), 0.0);
    }

    #[test]
    fn test_material_edit_keeps_model() {
        let mut inst = Instance::default().with_transform(Vec3::ONE, Vec3::ZERO, Vec3::ONE);
        let before = *inst.model();
        inst.set_color(Vec3::X);
        inst.set_smoothness(0.2);
        assert_eq!(*inst.model(), before);
    }

    #[test]
    fn test_emission() {
        let inst = Instance::default().with_emission(Vec3::new(1.0, 0.5, 0.0), 4.0);
        assert_eq!(inst.emission(), Vec3::new(4.0, 2.0, 0.0));
    }
}

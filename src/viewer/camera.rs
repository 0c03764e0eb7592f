//! Orbit camera using dolly

use dolly::prelude::*;
use glam::{Mat4, Vec3};

use crate::pathtracer::CameraPose;

const OPENGL_TO_WGPU_MATRIX: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
]);

const DEFAULT_DISTANCE: f32 = 10.0;
const MIN_DISTANCE: f32 = 0.2;
const MAX_DISTANCE: f32 = 500.0;

pub fn wgpu_projection(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    // wgpu uses 0..1 depth
    OPENGL_TO_WGPU_MATRIX * Mat4::perspective_rh(fov_y, aspect, near, far)
}

/// Camera orbiting a target point. Starts on +Z looking at the origin.
pub struct OrbitCamera {
    rig: CameraRig,
    /// Vertical FOV in degrees
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl OrbitCamera {
    pub fn new(target: Vec3, distance: f32) -> Self {
        let rig = CameraRig::builder()
            .with(YawPitch::new().yaw_degrees(0.0).pitch_degrees(0.0))
            .with(Smooth::new_rotation(0.0))
            .with(Arm::new(mint::Vector3 { x: 0.0, y: 0.0, z: distance }))
            .with(Smooth::new_position(0.0))
            .with(LookAt::new(mint::Point3 { x: target.x, y: target.y, z: target.z }).tracking_smoothness(0.0))
            .build();

        Self {
            rig,
            fov: 45.0,
            near: 0.1,
            far: 100.0,
        }
    }

    /// Orbit around target (drag)
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        let sensitivity = 0.4;
        self.rig.driver_mut::<YawPitch>().rotate_yaw_pitch(
            -delta_x * sensitivity,
            -delta_y * sensitivity,
        );
    }

    /// Screen-space pan, scaled with distance.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let right: Vec3 = self.rig.final_transform.right();
        let up: Vec3 = self.rig.final_transform.up();
        let sensitivity = 0.002 * self.distance();
        let offset = right * (-delta_x * sensitivity) + up * (delta_y * sensitivity);

        let look_at = self.rig.driver_mut::<LookAt>();
        look_at.target.x += offset.x;
        look_at.target.y += offset.y;
        look_at.target.z += offset.z;
    }

    /// Zoom (scroll)
    pub fn zoom(&mut self, delta: f32) {
        let current = self.distance();
        let factor = 1.0 - delta * 0.002 * current.max(1.0).sqrt();
        self.set_distance(current * factor);
    }

    /// Look at `center` from far enough to see a sphere of `radius`.
    pub fn focus(&mut self, center: Vec3, radius: f32) {
        self.rig.driver_mut::<LookAt>().target = mint::Point3 { x: center.x, y: center.y, z: center.z };
        let half_fov = (self.fov.to_radians() * 0.5).max(0.01);
        self.set_distance(radius / half_fov.sin() * 1.1);
    }

    /// Back to the startup view.
    pub fn reset(&mut self) {
        self.set_angles(0.0, 0.0);
        self.rig.driver_mut::<LookAt>().target = mint::Point3 { x: 0.0, y: 0.0, z: 0.0 };
        self.set_distance(DEFAULT_DISTANCE);
    }

    pub fn distance(&self) -> f32 {
        self.rig.driver::<Arm>().offset.z
    }

    pub fn set_distance(&mut self, dist: f32) {
        self.rig.driver_mut::<Arm>().offset.z = dist.clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    /// Yaw and pitch in degrees.
    pub fn angles(&self) -> (f32, f32) {
        let rot = self.rig.final_transform.rotation;
        let q = glam::Quat::from_xyzw(rot.v.x, rot.v.y, rot.v.z, rot.s);
        let (yaw, pitch, _) = q.to_euler(glam::EulerRot::YXZ);
        (yaw.to_degrees(), pitch.to_degrees())
    }

    pub fn set_angles(&mut self, yaw: f32, pitch: f32) {
        self.rig.driver_mut::<YawPitch>().set_rotation_quat(mint::Quaternion::from(
            glam::Quat::from_euler(glam::EulerRot::YXZ, yaw.to_radians(), pitch.to_radians(), 0.0),
        ));
    }

    /// Advance the rig (call each frame)
    pub fn update(&mut self, dt: f32) {
        self.rig.update(dt);
    }

    pub fn position(&self) -> Vec3 {
        let p = self.rig.final_transform.position;
        Vec3::new(p.x, p.y, p.z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        let t = &self.rig.final_transform;
        let pos = self.position();
        let fwd: Vec3 = t.forward();
        let up: Vec3 = t.up();
        Mat4::look_at_rh(pos, pos + fwd, up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        wgpu_projection(self.fov.to_radians(), aspect, self.near, self.far)
    }

    pub fn view_proj_matrix(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Fingerprint the path tracer compares between frames.
    pub fn pose(&self) -> CameraPose {
        CameraPose::new(self.position(), self.view_matrix())
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(Vec3::ZERO, DEFAULT_DISTANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_on_positive_z() {
        let mut cam = OrbitCamera::default();
        cam.update(1.0 / 60.0);
        assert!(cam.position().distance(Vec3::new(0.0, 0.0, 10.0)) < 1e-3);
    }

    #[test]
    fn test_pose_changes_on_orbit() {
        let mut cam = OrbitCamera::default();
        cam.update(1.0 / 60.0);
        let before = cam.pose();
        cam.orbit(25.0, 0.0);
        cam.update(1.0 / 60.0);
        assert!(cam.pose().differs(&before));
    }

    #[test]
    fn test_distance_clamped() {
        let mut cam = OrbitCamera::default();
        cam.set_distance(-3.0);
        assert_eq!(cam.distance(), MIN_DISTANCE);
        cam.set_distance(1e6);
        assert_eq!(cam.distance(), MAX_DISTANCE);
    }
}

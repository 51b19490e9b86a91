use glam::{Mat4, Vec2, Vec3};

const MAX_PITCH: f32 = 89.0_f32 * std::f32::consts::PI / 180.0;

/// Per-frame controls driving [`Camera::update_free_fly`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraInputs {
    /// Mouse motion in pixels since the previous frame.
    pub look_delta: Vec2,
    /// -1..1 along right, up and forward.
    pub movement: Vec3,
    pub boost: bool,
    pub delta_time: f32,
}

/// First person camera. Yaw zero looks down -Z, positive pitch looks up.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub move_speed: f32,
    pub boost_factor: f32,
    pub look_sensitivity: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            move_speed: 2.0,
            boost_factor: 4.0,
            look_sensitivity: 0.003,
        }
    }

    pub fn with_speed(mut self, move_speed: f32) -> Self {
        self.move_speed = move_speed;
        self
    }

    /// Points the camera at `target`.
    pub fn look_at(mut self, target: Vec3) -> Self {
        let dir = (target - self.position).normalize_or_zero();
        if dir != Vec3::ZERO {
            self.pitch = dir.y.clamp(-1.0, 1.0).asin().clamp(-MAX_PITCH, MAX_PITCH);
            self.yaw = dir.x.atan2(-dir.z);
        }
        self
    }

    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(sin_yaw * cos_pitch, sin_pitch, -cos_yaw * cos_pitch)
    }

    pub fn right(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        Vec3::new(cos_yaw, 0.0, sin_yaw)
    }

    pub fn update_free_fly(&mut self, inputs: &CameraInputs) {
        self.yaw += inputs.look_delta.x * self.look_sensitivity;
        self.pitch = (self.pitch - inputs.look_delta.y * self.look_sensitivity)
            .clamp(-MAX_PITCH, MAX_PITCH);

        let movement = inputs.movement;
        if movement == Vec3::ZERO {
            return;
        }
        let mut speed = self.move_speed * inputs.delta_time;
        if inputs.boost {
            speed *= self.boost_factor;
        }
        let offset = self.right() * movement.x + Vec3::Y * movement.y + self.forward() * movement.z;
        self.position += offset.normalize_or_zero() * speed;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    /// Perspective projection with a 0..1 depth range. `fov_y` is in degrees.
    pub fn projection(aspect: f32, fov_y: f32, near: f32, far: f32) -> Mat4 {
        Mat4::perspective_rh(fov_y.to_radians(), aspect.max(0.01), near, far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn default_orientation_looks_down_negative_z() {
        let camera = Camera::default();
        assert!(approx(camera.forward(), -Vec3::Z));
        assert!(approx(camera.right(), Vec3::X));
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::default();
        camera.update_free_fly(&CameraInputs {
            look_delta: Vec2::new(0.0, -100_000.0),
            ..Default::default()
        });
        assert!((camera.pitch - MAX_PITCH).abs() < 1e-5);
        assert!(camera.forward().y > 0.99);
    }

    #[test]
    fn moves_forward_scaled_by_delta_time() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 2.0)).with_speed(2.0);
        camera.update_free_fly(&CameraInputs {
            movement: Vec3::Z,
            delta_time: 0.5,
            ..Default::default()
        });
        assert!(approx(camera.position, Vec3::new(0.0, 0.0, 1.0)));

        camera.update_free_fly(&CameraInputs {
            movement: Vec3::Z,
            delta_time: 0.5,
            boost: true,
            ..Default::default()
        });
        assert!(approx(camera.position, Vec3::new(0.0, 0.0, -3.0)));
    }

    #[test]
    fn look_at_faces_target() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0)).look_at(Vec3::new(5.0, 0.0, 5.0));
        assert!(approx(camera.forward(), Vec3::X));
        let view = camera.view_matrix();
        let target = view.transform_point3(Vec3::new(6.0, 0.0, 5.0));
        assert!(approx(target, Vec3::new(0.0, 0.0, -6.0)));
    }

    #[test]
    fn projection_maps_near_plane_to_zero_depth() {
        let proj = Camera::projection(1.0, 60.0, 0.1, 100.0);
        let clip = proj * Vec3::new(0.0, 0.0, -0.1).extend(1.0);
        assert!((clip.z / clip.w).abs() < 1e-4);
        let clip = proj * Vec3::new(0.0, 0.0, -100.0).extend(1.0);
        assert!((clip.z / clip.w - 1.0).abs() < 1e-4);
    }
}

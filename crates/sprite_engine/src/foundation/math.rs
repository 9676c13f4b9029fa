//! Math utilities and types
//!
//! Provides the vector, matrix and quaternion types used by the sprite batcher.
//!
//! All matrices follow the column-vector convention: a point is transformed as
//! `M * p`, and composite transforms read right to left
//! (`MVP = Projection * View * Model`).

pub use nalgebra::{
    Vector3, Vector4,
    Matrix4,
    Quaternion,
    Unit,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Quat, Vec3};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }

    /// Build an orientation from per-axis Euler angles given in degrees
    ///
    /// Rotations are composed intrinsically in X, Y, Z order, which is the
    /// quaternion product `Rx * Ry * Rz`. Applied to a vector this rotates
    /// about Z first, then Y, then X in world terms.
    pub fn euler_degrees_to_quat(degrees: &Vec3) -> Quat {
        let rx = Quat::from_axis_angle(&Vec3::x_axis(), deg_to_rad(degrees.x));
        let ry = Quat::from_axis_angle(&Vec3::y_axis(), deg_to_rad(degrees.y));
        let rz = Quat::from_axis_angle(&Vec3::z_axis(), deg_to_rad(degrees.z));
        rx * ry * rz
    }
}

/// Extension trait for Mat4 with additional convenience methods
pub trait Mat4Ext {
    /// Create an orthographic projection matrix
    ///
    /// Maps the box `[left, right] x [bottom, top] x [-near, -far]` in view
    /// space onto the OpenGL clip cube `[-1, 1]^3`.
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Create a right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        let width = right - left;
        let height = top - bottom;
        let depth = far - near;

        let mut result = Mat4::identity();
        result[(0, 0)] = 2.0 / width;
        result[(1, 1)] = 2.0 / height;
        result[(2, 2)] = -2.0 / depth;
        result[(0, 3)] = -(right + left) / width;
        result[(1, 3)] = -(top + bottom) / height;
        result[(2, 3)] = -(far + near) / depth;
        result
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        let forward = (target - eye).normalize();
        let right = forward.cross(&up).normalize();
        let camera_up = right.cross(&forward);

        let translation = Mat4::new(
            1.0, 0.0, 0.0, -eye.x,
            0.0, 1.0, 0.0, -eye.y,
            0.0, 0.0, 1.0, -eye.z,
            0.0, 0.0, 0.0, 1.0,
        );

        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            camera_up.x, camera_up.y, camera_up.z, 0.0,
            -forward.x, -forward.y, -forward.z, 0.0,  // Negative forward for right-handed
            0.0, 0.0, 0.0, 1.0,
        );

        rotation * translation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_orthographic_maps_frustum_corners_to_clip_cube() {
        let projection = Mat4::orthographic(0.0, 800.0, 0.0, 600.0, 0.0, 1.0);

        let bottom_left = projection * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(bottom_left.x, -1.0);
        assert_relative_eq!(bottom_left.y, -1.0);
        assert_relative_eq!(bottom_left.z, -1.0);

        let top_right = projection * Vec4::new(800.0, 600.0, -1.0, 1.0);
        assert_relative_eq!(top_right.x, 1.0);
        assert_relative_eq!(top_right.y, 1.0);
        assert_relative_eq!(top_right.z, 1.0);
    }

    #[test]
    fn test_look_at_down_negative_z_is_translation_only() {
        let eye = Vec3::new(10.0, 20.0, 0.0);
        let view = Mat4::look_at(eye, eye + Vec3::new(0.0, 0.0, -1.0), Vec3::y());

        let moved = view * Vec4::new(10.0, 20.0, -5.0, 1.0);
        assert_relative_eq!(moved.x, 0.0);
        assert_relative_eq!(moved.y, 0.0);
        assert_relative_eq!(moved.z, -5.0);
    }

    #[test]
    fn test_euler_composition_order() {
        let q = utils::euler_degrees_to_quat(&Vec3::new(90.0, 0.0, 90.0));
        // Rz first maps +X to +Y, then Rx maps +Y to +Z.
        let rotated = q * Vec3::x();
        assert_relative_eq!(rotated, Vec3::z(), epsilon = 1e-6);
    }

    #[test]
    fn test_zero_euler_is_identity() {
        let q = utils::euler_degrees_to_quat(&Vec3::zeros());
        assert_relative_eq!(q.angle(), 0.0);
    }
}

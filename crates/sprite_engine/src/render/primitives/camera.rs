//! Orthographic camera for 2D scenes
//!
//! The camera looks down the negative Z axis. Its frustum is given in world
//! units, so with `left = 0`, `right = 800`, `bottom = 0`, `top = 600` a sprite
//! at `(400, 300)` lands in the centre of the screen.
//!
//! Any setter clears the `updated` flag. The batcher refreshes a stale camera
//! once at the start of a frame and rebuilds every MVP in that frame.
//!
//! Each refresh stamps the camera with a process-wide generation number, so a
//! camera refreshed outside the batcher is still recognised as new.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::math::{Mat4, Mat4Ext, Vec3};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Orthographic view volume, in world units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// Left clip plane
    pub left: f32,
    /// Right clip plane
    pub right: f32,
    /// Bottom clip plane
    pub bottom: f32,
    /// Top clip plane
    pub top: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
}

/// 2D orthographic camera with cached view and projection
#[derive(Debug, Clone, PartialEq)]
pub struct Camera2D {
    frustum: Frustum,
    position: Vec3,
    target: Vec3,
    up: Vec3,
    view: Mat4,
    projection: Mat4,
    updated: bool,
    generation: u64,
}

impl Camera2D {
    /// Camera covering `[x, width] x [y, height]`
    ///
    /// `width` and `height` are the right and top edges, not extents.
    pub fn new(x: f32, y: f32, width: f32, height: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            frustum: Frustum { left: x, right: width, bottom: y, top: height, near, far },
            position: Vec3::zeros(),
            target: Vec3::new(0.0, 0.0, -1.0),
            up: Vec3::y(),
            view: Mat4::identity(),
            projection: Mat4::identity(),
            updated: false,
            generation: 0,
        };
        camera.refresh();
        camera
    }

    /// Camera whose frustum matches a `width x height` viewport at the origin
    pub fn for_viewport(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height, -1.0, 1.0)
    }

    /// Recompute view and projection and mark the camera current
    pub fn refresh(&mut self) {
        self.view = Mat4::look_at(self.position, self.target, self.up);
        let Frustum { left, right, bottom, top, near, far } = self.frustum;
        self.projection = Mat4::orthographic(left, right, bottom, top, near, far);
        self.updated = true;
        self.generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
    }

    /// Pan the camera; the look direction is preserved
    pub fn set_position(&mut self, position: Vec3) {
        let offset = self.target - self.position;
        self.position = position;
        self.target = position + offset;
        self.updated = false;
    }

    /// Point the camera at `target`
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        self.target = target;
        self.up = up;
        self.updated = false;
    }

    /// Replace the frustum
    pub fn set_frustum(&mut self, frustum: Frustum) {
        self.frustum = frustum;
        self.updated = false;
    }

    /// Match the frustum to a new viewport size, keeping the lower-left corner
    pub fn resize(&mut self, width: f32, height: f32) {
        self.frustum.right = self.frustum.left + width;
        self.frustum.top = self.frustum.bottom + height;
        self.updated = false;
    }

    /// Whether view and projection reflect the current parameters
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    /// Stamp of the last refresh; differs for every refresh of every camera
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Camera position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Current frustum
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// View matrix from the last refresh
    pub fn view_matrix(&self) -> &Mat4 {
        &self.view
    }

    /// Projection matrix from the last refresh
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection
    }

    /// `projection * view` from the last refresh
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_camera_is_current() {
        let camera = Camera2D::for_viewport(800.0, 600.0);
        assert!(camera.is_updated());
    }

    #[test]
    fn test_viewport_centre_maps_to_clip_origin() {
        let camera = Camera2D::for_viewport(800.0, 600.0);
        let clip = camera.view_projection() * Vec4::new(400.0, 300.0, 0.0, 1.0);
        assert_relative_eq!(clip.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_setters_mark_stale() {
        let mut camera = Camera2D::for_viewport(800.0, 600.0);
        camera.set_position(Vec3::new(10.0, 0.0, 0.0));
        assert!(!camera.is_updated());

        camera.refresh();
        assert!(camera.is_updated());

        camera.resize(1024.0, 768.0);
        assert!(!camera.is_updated());
        assert_eq!(camera.frustum().right, 1024.0);
    }

    #[test]
    fn test_pan_shifts_world() {
        let mut camera = Camera2D::for_viewport(800.0, 600.0);
        camera.set_position(Vec3::new(100.0, 0.0, 0.0));
        camera.refresh();

        // World x = 500 is now where x = 400 used to be
        let clip = camera.view_projection() * Vec4::new(500.0, 300.0, 0.0, 1.0);
        assert_relative_eq!(clip.x, 0.0, epsilon = 1e-5);
    }
    #[test]
    fn test_every_refresh_gets_a_new_generation() {
        let mut camera = Camera2D::for_viewport(800.0, 600.0);
        let other = Camera2D::for_viewport(800.0, 600.0);
        assert_ne!(camera.generation(), other.generation());

        let before = camera.generation();
        camera.set_position(Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(camera.generation(), before);

        camera.refresh();
        assert_ne!(camera.generation(), before);
    }
}

//! Per-sprite render state
//!
//! A [`Drawable`] is the cached render side of one entity: the program and
//! texture it is batched under, its color, and the matrices derived from its
//! [`Transforms`]. The entity owns both; the batcher reaches them through the
//! [`Renderable`] trait while holding the entity's lock.
//!
//! ## Recompute
//!
//! During a draw each transform flag is consumed independently:
//!
//! - position changed: rebuild the translation matrix
//! - rotation changed: rebuild the orientation quaternion
//! - scale changed: rebuild the scale matrix
//!
//! If any of those fired, the record was flagged, or the camera moved, the
//! model matrix becomes `T * R * S` and the MVP becomes `VP * model`.

use bitflags::bitflags;

use crate::foundation::math::{utils, Mat4, Quat};
use crate::render::device::{ProgramHandle, TextureHandle};
use crate::scene::transform::Transforms;

bitflags! {
    /// What a recompute consumed
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DirtyFlags: u8 {
        /// Translation matrix rebuilt
        const POSITION = 1 << 0;
        /// Orientation rebuilt
        const ROTATION = 1 << 1;
        /// Scale matrix rebuilt
        const SCALE = 1 << 2;
        /// Model and MVP matrices rebuilt
        const MATRICES = 1 << 3;
    }
}

/// Cached render state of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct Drawable {
    program: ProgramHandle,
    texture: TextureHandle,
    color: [f32; 4],
    translation_matrix: Mat4,
    scale_matrix: Mat4,
    orientation: Quat,
    model_matrix: Mat4,
    mvp_matrix: Mat4,
    state_changed: bool,
    registered: bool,
}

impl Default for Drawable {
    fn default() -> Self {
        Self {
            program: ProgramHandle::NONE,
            texture: TextureHandle::NONE,
            color: [1.0, 1.0, 1.0, 1.0],
            translation_matrix: Mat4::identity(),
            scale_matrix: Mat4::identity(),
            orientation: Quat::identity(),
            model_matrix: Mat4::identity(),
            mvp_matrix: Mat4::identity(),
            state_changed: true,
            registered: false,
        }
    }
}

impl Drawable {
    /// Fresh record, white and flagged for recompute
    pub fn new() -> Self {
        Self::default()
    }

    /// Program this record is batched under
    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    /// Texture this record is batched under
    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    /// RGBA tint
    pub fn color(&self) -> [f32; 4] {
        self.color
    }

    /// Set the RGBA tint; uploaded with every draw, so matrices stay cached
    pub fn set_color(&mut self, color: [f32; 4]) {
        self.color = color;
    }

    /// Translation matrix from the last recompute
    pub fn translation_matrix(&self) -> &Mat4 {
        &self.translation_matrix
    }

    /// Scale matrix from the last recompute
    pub fn scale_matrix(&self) -> &Mat4 {
        &self.scale_matrix
    }

    /// Orientation from the last recompute
    pub fn orientation(&self) -> &Quat {
        &self.orientation
    }

    /// Model matrix from the last recompute
    pub fn model_matrix(&self) -> &Mat4 {
        &self.model_matrix
    }

    /// Model-view-projection matrix from the last recompute
    pub fn mvp_matrix(&self) -> &Mat4 {
        &self.mvp_matrix
    }

    /// Flag the record for a full matrix rebuild on the next draw
    pub fn mark_changed(&mut self) {
        self.state_changed = true;
    }

    /// Whether the record or any of `transforms` needs recomputing
    pub fn state_changed(&self, transforms: &Transforms) -> bool {
        self.state_changed || transforms.any_changed()
    }

    /// Whether a batcher currently holds this record
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub(crate) fn attach(&mut self, program: ProgramHandle, texture: TextureHandle) {
        self.program = program;
        self.texture = texture;
        self.registered = true;
        self.state_changed = true;
    }

    pub(crate) fn detach(&mut self) {
        self.registered = false;
    }

    /// Bring the cached matrices up to date
    ///
    /// `view_projection` is the camera's `P * V` for this frame and
    /// `camera_stale` says whether it differs from the one used last time.
    /// Every transform flag and the record flag are clear afterwards.
    pub fn refresh(&mut self, transforms: &mut Transforms, view_projection: &Mat4, camera_stale: bool) -> DirtyFlags {
        let mut dirty = DirtyFlags::empty();

        if let Some(position) = transforms.position.consume() {
            self.translation_matrix = Mat4::new_translation(&position);
            dirty |= DirtyFlags::POSITION;
        }
        if let Some(rotation) = transforms.rotation.consume() {
            self.orientation = utils::euler_degrees_to_quat(&rotation);
            dirty |= DirtyFlags::ROTATION;
        }
        if let Some(scale) = transforms.scale.consume() {
            self.scale_matrix = Mat4::new_nonuniform_scaling(&scale);
            dirty |= DirtyFlags::SCALE;
        }

        if !dirty.is_empty() || self.state_changed || camera_stale {
            self.model_matrix = self.translation_matrix * self.orientation.to_homogeneous() * self.scale_matrix;
            self.mvp_matrix = view_projection * self.model_matrix;
            dirty |= DirtyFlags::MATRICES;
        }

        self.state_changed = false;
        dirty
    }
}

/// Anything the batcher can draw
///
/// Implementors split themselves into their transforms and their cached
/// render state so both can be borrowed mutably at once.
pub trait Renderable: Send + 'static {
    /// Transforms and render record, borrowed together
    fn render_parts(&mut self) -> (&mut Transforms, &mut Drawable);

    /// Render record
    fn drawable(&self) -> &Drawable;
}

/// Minimal [`Renderable`]: transforms plus a record and nothing else
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawableObject {
    /// Position, rotation and scale
    pub transforms: Transforms,
    /// Render record
    pub drawable: Drawable,
}

impl DrawableObject {
    /// Object with the given transforms
    pub fn new(transforms: Transforms) -> Self {
        Self { transforms, drawable: Drawable::new() }
    }
}

impl Renderable for DrawableObject {
    fn render_parts(&mut self) -> (&mut Transforms, &mut Drawable) {
        (&mut self.transforms, &mut self.drawable)
    }

    fn drawable(&self) -> &Drawable {
        &self.drawable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Vec3, Vec4};
    use approx::assert_relative_eq;

    fn settled(object: &mut DrawableObject) {
        object.drawable.refresh(&mut object.transforms, &Mat4::identity(), false);
    }

    #[test]
    fn test_defaults() {
        let drawable = Drawable::new();
        assert_eq!(drawable.color(), [1.0, 1.0, 1.0, 1.0]);
        assert!(!drawable.program().is_valid());
        assert!(!drawable.is_registered());
        assert_eq!(*drawable.mvp_matrix(), Mat4::identity());
    }

    #[test]
    fn test_refresh_builds_trs_model() {
        let mut object = DrawableObject::new(Transforms::new(Vec3::new(10.0, 20.0, 0.0), Vec3::new(2.0, 3.0, 1.0)));
        object.transforms.rotation.set(Vec3::new(0.0, 0.0, 90.0));

        let dirty = object.drawable.refresh(&mut object.transforms, &Mat4::identity(), false);
        assert!(dirty.contains(DirtyFlags::POSITION | DirtyFlags::ROTATION | DirtyFlags::SCALE | DirtyFlags::MATRICES));

        // Unit x is scaled to 2, rotated onto +y, then translated
        let corner = object.drawable.model_matrix() * Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(corner.x, 10.0, epsilon = 1e-4);
        assert_relative_eq!(corner.y, 22.0, epsilon = 1e-4);
    }

    #[test]
    fn test_refresh_only_rebuilds_changed_parts() {
        let mut object = DrawableObject::default();
        settled(&mut object);
        let scale_before = *object.drawable.scale_matrix();

        object.transforms.position.set(Vec3::new(5.0, 0.0, 0.0));
        let dirty = object.drawable.refresh(&mut object.transforms, &Mat4::identity(), false);

        assert_eq!(dirty, DirtyFlags::POSITION | DirtyFlags::MATRICES);
        assert_eq!(*object.drawable.scale_matrix(), scale_before);
        assert_relative_eq!(object.drawable.model_matrix()[(0, 3)], 5.0);
    }

    #[test]
    fn test_refresh_is_noop_when_clean() {
        let mut object = DrawableObject::new(Transforms::new(Vec3::new(1.0, 2.0, 0.0), Vec3::new(1.0, 1.0, 1.0)));
        settled(&mut object);
        let mvp = *object.drawable.mvp_matrix();

        let other_vp = Mat4::new_scaling(4.0);
        let dirty = object.drawable.refresh(&mut object.transforms, &other_vp, false);

        assert!(dirty.is_empty());
        assert_eq!(*object.drawable.mvp_matrix(), mvp);
    }

    #[test]
    fn test_stale_camera_rebuilds_mvp() {
        let mut object = DrawableObject::default();
        settled(&mut object);

        let view_projection = Mat4::new_scaling(2.0);
        let dirty = object.drawable.refresh(&mut object.transforms, &view_projection, true);

        assert_eq!(dirty, DirtyFlags::MATRICES);
        assert_eq!(*object.drawable.mvp_matrix(), view_projection * object.drawable.model_matrix());
    }

    #[test]
    fn test_state_changed_follows_transform_flags() {
        let mut object = DrawableObject::default();
        settled(&mut object);
        assert!(!object.drawable.state_changed(&object.transforms));

        object.transforms.scale.update(|s| s.x = 3.0);
        assert!(object.drawable.state_changed(&object.transforms));

        settled(&mut object);
        assert!(!object.drawable.state_changed(&object.transforms));
    }

    #[test]
    fn test_recolor_keeps_matrices() {
        let mut object = DrawableObject::default();
        settled(&mut object);

        object.drawable.set_color([1.0, 0.0, 0.0, 1.0]);
        assert!(!object.drawable.state_changed(&object.transforms));

        let dirty = object.drawable.refresh(&mut object.transforms, &Mat4::identity(), false);
        assert!(dirty.is_empty());
        assert_eq!(object.drawable.color(), [1.0, 0.0, 0.0, 1.0]);
    }
}

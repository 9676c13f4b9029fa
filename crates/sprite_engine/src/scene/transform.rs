//! Change-tracked transform values
//!
//! A sprite's position, rotation and scale each live in their own
//! [`TransformComponent`]. Writing a component raises its `changed` flag; the
//! batcher consumes the flag during the next draw and recomputes only the
//! matrix that depends on it.

use crate::foundation::math::Vec3;

/// A 3-component value with a dirty flag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformComponent {
    value: Vec3,
    changed: bool,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self::new(Vec3::zeros())
    }
}

impl TransformComponent {
    /// Create a component; new values start out changed so the first draw picks them up
    pub fn new(value: Vec3) -> Self {
        Self { value, changed: true }
    }

    /// Current value
    pub fn value(&self) -> Vec3 {
        self.value
    }

    /// Replace the value and mark it changed
    pub fn set(&mut self, value: Vec3) {
        self.value = value;
        self.changed = true;
    }

    /// Modify the value in place and mark it changed
    pub fn update(&mut self, f: impl FnOnce(&mut Vec3)) {
        f(&mut self.value);
        self.changed = true;
    }

    /// Whether the value changed since it was last consumed
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Force a recompute on the next draw
    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    /// Take the changed flag, returning the value if it was set
    pub(crate) fn consume(&mut self) -> Option<Vec3> {
        std::mem::take(&mut self.changed).then_some(self.value)
    }
}

/// Position, rotation (Euler degrees) and scale of one entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transforms {
    /// World position
    pub position: TransformComponent,
    /// Rotation as Euler angles in degrees, applied X then Y then Z
    pub rotation: TransformComponent,
    /// Per-axis scale
    pub scale: TransformComponent,
}

impl Default for Transforms {
    fn default() -> Self {
        Self {
            position: TransformComponent::new(Vec3::zeros()),
            rotation: TransformComponent::new(Vec3::zeros()),
            scale: TransformComponent::new(Vec3::new(1.0, 1.0, 1.0)),
        }
    }
}

impl Transforms {
    /// Transforms with the given position and scale and no rotation
    pub fn new(position: Vec3, scale: Vec3) -> Self {
        Self {
            position: TransformComponent::new(position),
            scale: TransformComponent::new(scale),
            ..Default::default()
        }
    }

    /// Whether any of the three components is dirty
    pub fn any_changed(&self) -> bool {
        self.position.is_changed() || self.rotation.is_changed() || self.scale.is_changed()
    }

    /// Mark all three components dirty
    pub fn mark_all_changed(&mut self) {
        self.position.mark_changed();
        self.rotation.mark_changed();
        self.scale.mark_changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_component_is_changed() {
        let component = TransformComponent::new(Vec3::new(1.0, 2.0, 3.0));
        assert!(component.is_changed());
    }

    #[test]
    fn test_consume_clears_flag_once() {
        let mut component = TransformComponent::new(Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(component.consume(), Some(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(component.consume(), None);
        assert!(!component.is_changed());
    }

    #[test]
    fn test_update_marks_changed() {
        let mut component = TransformComponent::new(Vec3::zeros());
        component.consume();

        component.update(|v| v.x += 5.0);
        assert!(component.is_changed());
        assert_eq!(component.value().x, 5.0);
    }

    #[test]
    fn test_any_changed_tracks_each_component() {
        let mut transforms = Transforms::default();
        transforms.position.consume();
        transforms.rotation.consume();
        transforms.scale.consume();
        assert!(!transforms.any_changed());

        transforms.rotation.set(Vec3::new(0.0, 0.0, 90.0));
        assert!(transforms.any_changed());
    }
}

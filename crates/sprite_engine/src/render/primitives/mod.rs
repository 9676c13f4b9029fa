//! Rendering primitives: the 2D camera and the sprite quad

pub mod camera;
pub mod quad;

pub use camera::{Camera2D, Frustum};

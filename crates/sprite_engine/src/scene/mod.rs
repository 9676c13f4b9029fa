//! Scene layer: change-tracked transforms and the bouncing sprites built on them

pub mod sprite;
pub mod sprite_manager;
pub mod transform;

pub use sprite::{Sprite, SpriteBody};
pub use sprite_manager::{SpriteKey, SpriteManager};
pub use transform::{TransformComponent, Transforms};

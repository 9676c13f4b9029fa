//! A single sprite entity
//!
//! The entity's mutable state lives in a [`SpriteBody`] behind one mutex. The
//! simulation thread moves bodies, the batcher reads them while drawing, and
//! neither ever holds another sprite's lock at the same time.

use std::sync::{Arc, Mutex, PoisonError};

use crate::foundation::math::Vec3;
use crate::render::device::{GraphicsDevice, ShaderProgramInfo, TextureHandle};
use crate::render::drawable::{Drawable, Renderable};
use crate::render::systems::batching::{BatchResult, DrawRequest, DrawableHandle, Removal, SpriteBatcher};
use crate::scene::transform::Transforms;

/// Default on-screen half-extent of a sprite
pub const DEFAULT_SPRITE_SCALE: f32 = 100.0;

/// Mutable state of a sprite
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteBody {
    /// Position, rotation and scale
    pub transforms: Transforms,
    /// Render record
    pub drawable: Drawable,
    /// Per-tick displacement
    pub velocity: Vec3,
}

impl Default for SpriteBody {
    fn default() -> Self {
        Self {
            transforms: Transforms::new(
                Vec3::zeros(),
                Vec3::new(DEFAULT_SPRITE_SCALE, DEFAULT_SPRITE_SCALE, 0.0),
            ),
            drawable: Drawable::new(),
            velocity: Vec3::zeros(),
        }
    }
}

impl SpriteBody {
    /// Body at `position` with a square half-extent of `size`
    pub fn new(position: Vec3, size: f32, velocity: Vec3) -> Self {
        Self {
            transforms: Transforms::new(position, Vec3::new(size, size, 0.0)),
            drawable: Drawable::new(),
            velocity,
        }
    }

    /// Current position
    pub fn position(&self) -> Vec3 {
        self.transforms.position.value()
    }

    /// Current half-extent
    pub fn size(&self) -> Vec3 {
        self.transforms.scale.value()
    }

    /// Advance one tick inside a `width x height` world
    ///
    /// Each axis moves by its velocity if the sprite stays at least `size`
    /// away from both walls; otherwise that axis' velocity is reflected and
    /// the sprite holds still on it for this tick. Returns whether the
    /// position changed.
    pub fn step(&mut self, width: f32, height: f32) -> bool {
        let mut position = self.position();
        let size = self.size();

        let moved_x = bounce_axis(&mut position.x, &mut self.velocity.x, size.x, width);
        let moved_y = bounce_axis(&mut position.y, &mut self.velocity.y, size.y, height);

        if moved_x || moved_y {
            self.transforms.position.set(position);
        }
        moved_x || moved_y
    }
}

fn bounce_axis(position: &mut f32, velocity: &mut f32, size: f32, extent: f32) -> bool {
    if *velocity == 0.0 {
        return false;
    }

    let next = *position + *velocity;
    let inside = if *velocity > 0.0 { next < extent - size } else { next > size };
    if inside {
        *position = next;
    } else {
        *velocity = -*velocity;
    }
    inside
}

impl Renderable for SpriteBody {
    fn render_parts(&mut self) -> (&mut Transforms, &mut Drawable) {
        (&mut self.transforms, &mut self.drawable)
    }

    fn drawable(&self) -> &Drawable {
        &self.drawable
    }
}

/// A named sprite bound to one program and texture
#[derive(Debug)]
pub struct Sprite {
    name: String,
    program: ShaderProgramInfo,
    texture: TextureHandle,
    body: DrawableHandle<SpriteBody>,
    visible: bool,
}

impl Sprite {
    /// Hidden sprite with the given body
    pub fn new(name: impl Into<String>, program: ShaderProgramInfo, texture: TextureHandle, body: SpriteBody) -> Self {
        Self {
            name: name.into(),
            program,
            texture,
            body: Arc::new(Mutex::new(body)),
            visible: false,
        }
    }

    /// Sprite name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Program the sprite is drawn with
    pub fn program(&self) -> ShaderProgramInfo {
        self.program
    }

    /// Texture the sprite is drawn with
    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    /// Shared body
    pub fn body(&self) -> &DrawableHandle<SpriteBody> {
        &self.body
    }

    /// Whether the sprite is registered for drawing
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Copy of the current position
    pub fn position(&self) -> Vec3 {
        self.lock_body().position()
    }

    /// Run `f` with the body locked
    pub fn with_body<R>(&self, f: impl FnOnce(&mut SpriteBody) -> R) -> R {
        f(&mut *self.lock_body())
    }

    fn lock_body(&self) -> std::sync::MutexGuard<'_, SpriteBody> {
        self.body.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the sprite with the batcher; does nothing if already visible
    ///
    /// # Errors
    /// Whatever [`SpriteBatcher::register`] reports.
    pub fn show<D: GraphicsDevice + ?Sized>(&mut self, batcher: &SpriteBatcher<SpriteBody>, device: &mut D) -> BatchResult<()> {
        if self.visible {
            return Ok(());
        }

        self.lock_body().transforms.mark_all_changed();
        batcher.register(device, &DrawRequest::new(&self.body, self.program, self.texture))?;
        self.visible = true;
        log::debug!("Showing {}", self.name);
        Ok(())
    }

    /// Remove the sprite from the batcher
    ///
    /// A hidden sprite reports [`Removal::NotFound`].
    ///
    /// # Errors
    /// Whatever [`SpriteBatcher::unregister`] reports.
    pub fn hide<D: GraphicsDevice + ?Sized>(&mut self, batcher: &SpriteBatcher<SpriteBody>, device: &mut D) -> BatchResult<Removal> {
        if !self.visible {
            return Ok(Removal::NotFound);
        }

        let removal = batcher.unregister(device, &self.body, self.program.handle, self.texture)?;
        self.visible = false;
        log::debug!("Hiding {}", self.name);
        Ok(removal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::{ProgramLayout, RecordingDevice};
    use crate::render::systems::batching::BatchState;

    #[test]
    fn test_default_body() {
        let body = SpriteBody::default();
        assert_eq!(body.size(), Vec3::new(100.0, 100.0, 0.0));
        assert_eq!(body.drawable.color(), [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_step_moves_and_flags_position() {
        let mut body = SpriteBody::new(Vec3::new(50.0, 50.0, 0.0), 10.0, Vec3::new(1.0, -1.0, 0.0));
        body.transforms.position.consume();

        assert!(body.step(200.0, 200.0));
        assert_eq!(body.position(), Vec3::new(51.0, 49.0, 0.0));
        assert!(body.transforms.position.is_changed());
    }

    #[test]
    fn test_step_reflects_at_walls() {
        // Right wall: 189 + 1 is not < 200 - 10
        let mut body = SpriteBody::new(Vec3::new(189.0, 100.0, 0.0), 10.0, Vec3::new(1.0, 0.0, 0.0));
        assert!(!body.step(200.0, 200.0));
        assert_eq!(body.velocity.x, -1.0);
        assert_eq!(body.position().x, 189.0);

        // Bottom wall: 11 - 1 is not > 10
        let mut body = SpriteBody::new(Vec3::new(100.0, 11.0, 0.0), 10.0, Vec3::new(0.0, -1.0, 0.0));
        body.step(200.0, 200.0);
        assert_eq!(body.velocity.y, 1.0);
        assert_eq!(body.position().y, 11.0);
    }

    #[test]
    fn test_bounce_stays_inside_world() {
        let mut body = SpriteBody::new(Vec3::new(20.0, 30.0, 0.0), 10.0, Vec3::new(1.0, 1.0, 0.0));
        for _ in 0..1000 {
            body.step(100.0, 80.0);
            let p = body.position();
            assert!(p.x > 10.0 && p.x < 90.0);
            assert!(p.y > 10.0 && p.y < 70.0);
        }
    }

    #[test]
    fn test_show_and_hide() {
        let mut device = RecordingDevice::new();
        let batcher = SpriteBatcher::<SpriteBody>::new();
        let program = ShaderProgramInfo::new(device.create_program(), ProgramLayout::new(0, 1));
        let texture = device.create_texture();
        let mut sprite = Sprite::new("sprite_0", program, texture, SpriteBody::default());

        sprite.show(&batcher, &mut device).unwrap();
        sprite.show(&batcher, &mut device).unwrap();
        assert!(sprite.is_visible());
        assert_eq!(batcher.bucket_len(program.handle, texture), 1);

        assert_eq!(sprite.hide(&batcher, &mut device).unwrap(), Removal::BatchUnloaded);
        assert_eq!(sprite.hide(&batcher, &mut device).unwrap(), Removal::NotFound);
        assert_eq!(batcher.batch_state(program.handle), BatchState::Unloaded);
    }

    #[test]
    fn test_show_again_after_hide_recomputes() {
        let mut device = RecordingDevice::new();
        let batcher = SpriteBatcher::<SpriteBody>::new();
        let program = ShaderProgramInfo::new(device.create_program(), ProgramLayout::new(0, 1));
        let mut sprite = Sprite::new("s", program, TextureHandle::NONE, SpriteBody::default());

        sprite.show(&batcher, &mut device).unwrap();
        let mut camera = crate::render::primitives::Camera2D::for_viewport(800.0, 600.0);
        batcher.draw(&mut device, &mut camera).unwrap();
        sprite.hide(&batcher, &mut device).unwrap();

        sprite.show(&batcher, &mut device).unwrap();
        assert!(sprite.with_body(|body| body.transforms.any_changed()));
    }
}

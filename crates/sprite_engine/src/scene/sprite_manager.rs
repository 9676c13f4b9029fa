//! Owner of all sprites in the bouncing-sprite world
//!
//! ## Locking
//!
//! The manager keeps its sprites in a slot map behind an `RwLock`. Lock order
//! is always manager, then batcher, then sprite body:
//!
//! - spawning and hiding hold the manager's write lock while calling into the batcher
//! - [`SpriteManager::update`] holds the read lock and locks bodies one at a time
//! - [`SpriteBatcher::draw`] takes only the batcher lock and then bodies

use std::sync::{Mutex, PoisonError, RwLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slotmap::{new_key_type, SlotMap};

use crate::core::config::WorldConfig;
use crate::foundation::math::Vec3;
use crate::render::device::{GraphicsDevice, ShaderProgramInfo, TextureHandle};
use crate::render::systems::batching::{BatchError, BatchResult, SpriteBatcher};
use crate::scene::sprite::{Sprite, SpriteBody};

new_key_type! {
    /// Stable key of a sprite owned by a [`SpriteManager`]
    pub struct SpriteKey;
}

#[derive(Debug)]
struct Spawner {
    rng: StdRng,
    next_id: u64,
}

/// Spawns, moves and retires sprites
#[derive(Debug)]
pub struct SpriteManager {
    world: WorldConfig,
    sprites: RwLock<SlotMap<SpriteKey, Sprite>>,
    spawner: Mutex<Spawner>,
}

impl SpriteManager {
    /// Manager for a world; a configured seed makes spawning reproducible
    pub fn new(world: WorldConfig) -> Self {
        let rng = match world.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            world,
            sprites: RwLock::new(SlotMap::with_key()),
            spawner: Mutex::new(Spawner { rng, next_id: 0 }),
        }
    }

    /// World the sprites live in
    pub fn world(&self) -> &WorldConfig {
        &self.world
    }

    /// Number of sprites
    pub fn len(&self) -> usize {
        self.sprites.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether there are no sprites
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether another sprite fits under the configured limit
    pub fn has_capacity(&self) -> bool {
        self.len() < self.world.max_sprites as usize
    }

    /// Spawn a sprite with random size, position, velocity and tint, and show it
    ///
    /// Returns `Ok(None)` without creating anything once `max_sprites` is
    /// reached.
    ///
    /// # Errors
    /// Propagates registration failures; the sprite is discarded in that case.
    pub fn spawn<D: GraphicsDevice + ?Sized>(
        &self,
        batcher: &SpriteBatcher<SpriteBody>,
        device: &mut D,
        program: ShaderProgramInfo,
        texture: TextureHandle,
    ) -> BatchResult<Option<SpriteKey>> {
        let mut sprites = self.sprites.write().map_err(|_| BatchError::LockPoisoned("sprite manager"))?;
        if sprites.len() >= self.world.max_sprites as usize {
            log::info!("Sprite limit of {} reached", self.world.max_sprites);
            return Ok(None);
        }

        let (name, body) = self.random_body();
        let mut sprite = Sprite::new(name, program, texture, body);
        sprite.show(batcher, device)?;

        log::debug!("Spawned {} at {:?}", sprite.name(), sprite.position());
        Ok(Some(sprites.insert(sprite)))
    }

    fn random_body(&self) -> (String, SpriteBody) {
        let mut spawner = self.spawner.lock().unwrap_or_else(PoisonError::into_inner);
        let Spawner { rng, next_id } = &mut *spawner;

        let min_size = self.world.sprite_min_size;
        let size = rng.gen_range(min_size..=self.world.sprite_max_size().max(min_size)) as f32;

        let width = self.world.width as f32;
        let height = self.world.height as f32;
        let x = rng.gen_range(size..=(width - size).max(size));
        let y = rng.gen_range(size..=(height - size).max(size));

        let mut axis = || if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let velocity = Vec3::new(axis(), axis(), 0.0);

        let mut body = SpriteBody::new(Vec3::new(x, y, 0.0), size, velocity);
        body.drawable.set_color([
            rng.gen_range(0.25..=1.0),
            rng.gen_range(0.25..=1.0),
            rng.gen_range(0.25..=1.0),
            1.0,
        ]);

        let name = format!("sprite_{next_id}");
        *next_id += 1;
        (name, body)
    }

    /// Hide and drop one sprite; returns whether it existed
    ///
    /// # Errors
    /// Propagates unregistration failures.
    pub fn despawn<D: GraphicsDevice + ?Sized>(
        &self,
        batcher: &SpriteBatcher<SpriteBody>,
        device: &mut D,
        key: SpriteKey,
    ) -> BatchResult<bool> {
        let mut sprites = self.sprites.write().map_err(|_| BatchError::LockPoisoned("sprite manager"))?;
        let Some(sprite) = sprites.get_mut(key) else {
            return Ok(false);
        };

        // A sprite that fails to hide stays owned so it can be retried
        sprite.hide(batcher, device)?;
        sprites.remove(key);
        Ok(true)
    }

    /// Advance every visible sprite by one tick; returns how many moved
    pub fn update(&self) -> usize {
        let width = self.world.width as f32;
        let height = self.world.height as f32;

        let sprites = self.sprites.read().unwrap_or_else(PoisonError::into_inner);
        sprites
            .values()
            .filter(|sprite| sprite.is_visible())
            .filter(|sprite| sprite.with_body(|body| body.step(width, height)))
            .count()
    }

    /// Hide every sprite, keeping them owned by the manager
    ///
    /// # Errors
    /// Propagates the first unregistration failure.
    pub fn stop<D: GraphicsDevice + ?Sized>(&self, batcher: &SpriteBatcher<SpriteBody>, device: &mut D) -> BatchResult<()> {
        let mut sprites = self.sprites.write().map_err(|_| BatchError::LockPoisoned("sprite manager"))?;
        for sprite in sprites.values_mut() {
            sprite.hide(batcher, device)?;
        }
        log::info!("Stopped {} sprites", sprites.len());
        Ok(())
    }

    /// Position of one sprite
    pub fn position(&self, key: SpriteKey) -> Option<Vec3> {
        self.sprites
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(Sprite::position)
    }

    /// Whether one sprite is currently shown
    pub fn is_visible(&self, key: SpriteKey) -> bool {
        self.sprites
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(Sprite::is_visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use crate::render::device::{
        BufferHandle, BufferTarget, DeviceResult, ProgramHandle, ProgramLayout, RecordingDevice, VertexArrayHandle,
    };
    use crate::render::primitives::Camera2D;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Forwards to a recording device but panics on the first draw call
    struct PanicOnDraw<'a>(&'a mut RecordingDevice);

    impl GraphicsDevice for PanicOnDraw<'_> {
        fn create_buffer(&mut self) -> DeviceResult<BufferHandle> {
            self.0.create_buffer()
        }
        fn delete_buffer(&mut self, buffer: BufferHandle) {
            self.0.delete_buffer(buffer);
        }
        fn create_vertex_array(&mut self) -> DeviceResult<VertexArrayHandle> {
            self.0.create_vertex_array()
        }
        fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
            self.0.delete_vertex_array(vertex_array);
        }
        fn upload_buffer(&mut self, buffer: BufferHandle, target: BufferTarget, data: &[u8]) {
            self.0.upload_buffer(buffer, target, data);
        }
        fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
            self.0.bind_vertex_array(vertex_array);
        }
        fn enable_vertex_attribute(&mut self, location: u32, buffer: BufferHandle, components: u32) {
            self.0.enable_vertex_attribute(location, buffer, components);
        }
        fn bind_index_buffer(&mut self, buffer: BufferHandle) {
            self.0.bind_index_buffer(buffer);
        }
        fn use_program(&mut self, program: Option<ProgramHandle>) {
            self.0.use_program(program);
        }
        fn bind_texture(&mut self, texture: TextureHandle) {
            self.0.bind_texture(texture);
        }
        fn set_blending(&mut self, enabled: bool) {
            self.0.set_blending(enabled);
        }
        fn set_vertex_color(&mut self, location: u32, color: [f32; 4]) {
            self.0.set_vertex_color(location, color);
        }
        fn set_uniform_matrix(&mut self, location: u32, matrix: &Mat4) {
            self.0.set_uniform_matrix(location, matrix);
        }
        fn draw_indexed(&mut self, _index_count: u32) {
            panic!("device lost");
        }
    }

    fn setup(max_sprites: u32) -> (SpriteManager, SpriteBatcher<SpriteBody>, RecordingDevice, ShaderProgramInfo) {
        let world = WorldConfig::new(800, 600).with_max_sprites(max_sprites).with_seed(7);
        let mut device = RecordingDevice::new();
        let program = ShaderProgramInfo::new(device.create_program(), ProgramLayout::new(0, 1).with_color(2));
        (SpriteManager::new(world), SpriteBatcher::new(), device, program)
    }

    #[test]
    fn test_spawn_respects_limit() {
        let (manager, batcher, mut device, program) = setup(3);
        for _ in 0..3 {
            assert!(manager.spawn(&batcher, &mut device, program, TextureHandle::NONE).unwrap().is_some());
        }

        assert!(manager.spawn(&batcher, &mut device, program, TextureHandle::NONE).unwrap().is_none());
        assert_eq!(manager.len(), 3);
        assert!(!manager.has_capacity());
        assert_eq!(batcher.drawable_count(), 3);
    }

    #[test]
    fn test_spawned_sprites_start_inside_world() {
        let (manager, batcher, mut device, program) = setup(50);
        let max_size = manager.world().sprite_max_size() as f32;

        let keys: Vec<_> = (0..50)
            .filter_map(|_| manager.spawn(&batcher, &mut device, program, TextureHandle::NONE).unwrap())
            .collect();

        for key in keys {
            let p = manager.position(key).unwrap();
            assert!(p.x >= 1.0 && p.x <= 800.0 - 1.0);
            assert!(p.y >= 1.0 && p.y <= 600.0 - 1.0);
            assert!(manager.is_visible(key));
        }
        assert!(max_size >= 1.0);
    }

    #[test]
    fn test_same_seed_same_world() {
        let (a, batcher_a, mut device_a, program_a) = setup(5);
        let (b, batcher_b, mut device_b, program_b) = setup(5);

        for _ in 0..5 {
            let ka = a.spawn(&batcher_a, &mut device_a, program_a, TextureHandle::NONE).unwrap().unwrap();
            let kb = b.spawn(&batcher_b, &mut device_b, program_b, TextureHandle::NONE).unwrap().unwrap();
            assert_eq!(a.position(ka), b.position(kb));
        }
    }

    #[test]
    fn test_update_moves_visible_sprites() {
        let (manager, batcher, mut device, program) = setup(4);
        for _ in 0..4 {
            manager.spawn(&batcher, &mut device, program, TextureHandle::NONE).unwrap();
        }

        // Every sprite moves on at least one of any two consecutive ticks
        let moved = manager.update() + manager.update();
        assert!(moved >= 4);
    }

    #[test]
    fn test_stop_hides_everything_and_unloads() {
        let (manager, batcher, mut device, program) = setup(4);
        let key = manager.spawn(&batcher, &mut device, program, TextureHandle::NONE).unwrap().unwrap();
        manager.spawn(&batcher, &mut device, program, TextureHandle::NONE).unwrap();

        manager.stop(&batcher, &mut device).unwrap();

        assert_eq!(manager.len(), 2);
        assert!(!manager.is_visible(key));
        assert_eq!(batcher.program_count(), 0);
        assert_eq!(manager.update(), 0);
        assert_eq!(device.live_buffer_count(), 0);
    }

    #[test]
    fn test_despawn() {
        let (manager, batcher, mut device, program) = setup(4);
        let key = manager.spawn(&batcher, &mut device, program, TextureHandle::NONE).unwrap().unwrap();

        assert!(manager.despawn(&batcher, &mut device, key).unwrap());
        assert!(!manager.despawn(&batcher, &mut device, key).unwrap());
        assert!(manager.is_empty());
        assert_eq!(batcher.drawable_count(), 0);
    }
    #[test]
    fn test_failed_despawn_keeps_sprite() {
        let (manager, batcher, mut device, program) = setup(4);
        let key = manager.spawn(&batcher, &mut device, program, TextureHandle::NONE).unwrap().unwrap();

        // A render thread dying mid-frame poisons the batcher
        let mut camera = Camera2D::for_viewport(800.0, 600.0);
        let mut failing = PanicOnDraw(&mut device);
        let panicked = std::thread::scope(|scope| {
            scope
                .spawn(|| batcher.draw(&mut failing, &mut camera))
                .join()
                .is_err()
        });
        assert!(panicked);

        let err = manager.despawn(&batcher, &mut device, key).unwrap_err();
        assert!(matches!(err, BatchError::LockPoisoned(_)));
        assert_eq!(manager.len(), 1);
        assert!(manager.is_visible(key));
    }
    #[test]
    fn test_draw_interleaves_with_simulation_and_spawning() {
        let world = WorldConfig::new(800, 600).with_max_sprites(64).with_seed(11);
        let manager = SpriteManager::new(world);
        let batcher = SpriteBatcher::<SpriteBody>::new();
        let device = Mutex::new(RecordingDevice::new());
        let (program, texture) = {
            let mut device = device.lock().unwrap();
            let layout = ProgramLayout::new(0, 1).with_tex_coords(2).with_color(3);
            (ShaderProgramInfo::new(device.create_program(), layout), device.create_texture())
        };
        let running = AtomicBool::new(true);

        let kept = std::thread::scope(|scope| {
            let renderer = scope.spawn(|| {
                let mut camera = Camera2D::for_viewport(800.0, 600.0);
                while running.load(Ordering::Acquire) {
                    let mut device = device.lock().unwrap();
                    batcher.draw(&mut *device, &mut camera).unwrap();
                    drop(device);
                    std::thread::yield_now();
                }
            });
            let simulation = scope.spawn(|| {
                while running.load(Ordering::Acquire) {
                    manager.update();
                    std::thread::yield_now();
                }
            });

            let mut kept = Vec::new();
            for i in 0..48 {
                let mut device = device.lock().unwrap();
                let key = manager.spawn(&batcher, &mut *device, program, texture).unwrap().unwrap();
                if i % 3 == 2 {
                    assert!(manager.despawn(&batcher, &mut *device, key).unwrap());
                } else {
                    kept.push(key);
                }
                drop(device);
                std::thread::yield_now();
            }

            running.store(false, Ordering::Release);
            renderer.join().unwrap();
            simulation.join().unwrap();
            kept
        });

        let mut device = device.into_inner().unwrap();
        let mut camera = Camera2D::for_viewport(800.0, 600.0);
        let stats = batcher.draw(&mut device, &mut camera).unwrap();

        assert_eq!(manager.len(), kept.len());
        assert_eq!(batcher.drawable_count(), kept.len());
        assert_eq!(stats.draw_calls as usize, kept.len());
        assert_eq!(batcher.load_count(program.handle), 1);

        let sprites = manager.sprites.read().unwrap();
        for sprite in sprites.values() {
            assert!(sprite.is_visible());
            sprite.with_body(|body| {
                assert!(!body.transforms.any_changed());
                assert!(body.drawable.is_registered());
                assert!(!body.drawable.state_changed(&body.transforms));
            });
        }
    }
}

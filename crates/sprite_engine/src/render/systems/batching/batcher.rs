//! The sprite batcher: registration and per-frame traversal

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::batch::{BatchBuffers, BatchDescriptor, BatchState};
use super::stats::FrameStats;
use super::{BatchError, BatchResult};
use crate::render::device::{GraphicsDevice, ProgramHandle, ShaderProgramInfo, TextureHandle};
use crate::render::drawable::{DirtyFlags, DrawableObject, Renderable};
use crate::render::primitives::{quad, Camera2D};

/// Shared ownership of a drawable entity; the mutex is the entity's lock
pub type DrawableHandle<B> = Arc<Mutex<B>>;

/// Everything needed to place a drawable in a batch
#[derive(Debug)]
pub struct DrawRequest<'a, B> {
    /// The entity to draw
    pub drawable: &'a DrawableHandle<B>,
    /// Program to draw it with
    pub program: ShaderProgramInfo,
    /// Texture to sample, or [`TextureHandle::NONE`]
    pub texture: TextureHandle,
}

impl<'a, B> DrawRequest<'a, B> {
    /// Bundle a registration request
    pub fn new(drawable: &'a DrawableHandle<B>, program: ShaderProgramInfo, texture: TextureHandle) -> Self {
        Self { drawable, program, texture }
    }
}

/// What [`SpriteBatcher::unregister`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Removed; its bucket still holds other drawables
    Removed,
    /// Removed and the texture bucket emptied, other buckets remain
    BucketReleased,
    /// Removed and the program had nothing left; its GPU resources were released
    BatchUnloaded,
    /// The drawable was not registered under that program and texture
    NotFound,
}

#[derive(Debug, Default, Clone, Copy)]
struct LoadHistory {
    loads: u32,
    unloads: u32,
}

#[derive(Debug)]
struct BatcherState<B> {
    batches: BTreeMap<ProgramHandle, BatchDescriptor<B>>,
    history: BTreeMap<ProgramHandle, LoadHistory>,
    /// Camera generation the cached MVPs were built from
    camera_generation: Option<u64>,
}

/// Groups drawables by shader program then texture and draws them
///
/// The batcher never owns a drawable. It keeps weak references, so an entity
/// that is dropped without being unregistered is skipped at draw time and
/// can be cleaned out with [`SpriteBatcher::prune_orphans`].
///
/// `register`, `unregister` and `draw` may be called from any thread, but the
/// device passed in must belong to the render thread.
#[derive(Debug)]
pub struct SpriteBatcher<B: Renderable = DrawableObject> {
    state: Mutex<BatcherState<B>>,
    blending: bool,
}

impl<B: Renderable> Default for SpriteBatcher<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Renderable> SpriteBatcher<B> {
    /// Empty batcher with blending enabled
    pub fn new() -> Self {
        Self::with_blending(true)
    }

    /// Empty batcher; `blending` toggles alpha blending around each draw
    pub fn with_blending(blending: bool) -> Self {
        Self {
            state: Mutex::new(BatcherState {
                batches: BTreeMap::new(),
                history: BTreeMap::new(),
                camera_generation: None,
            }),
            blending,
        }
    }

    fn lock_state(&self) -> BatchResult<MutexGuard<'_, BatcherState<B>>> {
        self.state.lock().map_err(|_| BatchError::LockPoisoned("sprite batcher"))
    }

    fn read_state(&self) -> MutexGuard<'_, BatcherState<B>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a drawable under its program and texture
    ///
    /// The first drawable registered for a program creates that program's
    /// batch and loads its GPU resources. Later registrations reuse them, and
    /// the layout from the first registration stays in effect.
    ///
    /// # Errors
    /// - [`BatchError::InvalidProgram`] for the zero program handle
    /// - [`BatchError::AlreadyRegistered`] if the drawable is already batched
    /// - [`BatchError::ResourceCreation`] if GPU resources could not be
    ///   created; nothing is left allocated and the drawable is not added
    pub fn register<D: GraphicsDevice + ?Sized>(&self, device: &mut D, request: &DrawRequest<'_, B>) -> BatchResult<()> {
        let program = request.program.handle;
        if !program.is_valid() {
            return Err(BatchError::InvalidProgram);
        }

        let mut state = self.lock_state()?;
        let mut entity = request.drawable.lock().map_err(|_| BatchError::LockPoisoned("drawable"))?;
        {
            let drawable = entity.drawable();
            if drawable.is_registered() {
                return Err(BatchError::AlreadyRegistered {
                    program: drawable.program(),
                    texture: drawable.texture(),
                });
            }
        }

        let BatcherState { batches, history, .. } = &mut *state;
        let batch = batches
            .entry(program)
            .or_insert_with(|| BatchDescriptor::new(request.program.layout));

        if batch.state() == BatchState::Unloaded {
            if let Err(source) = batch.load(device) {
                log::error!("Failed to load batch for {program:?}: {source}");
                if batch.is_empty() {
                    batches.remove(&program);
                }
                return Err(BatchError::ResourceCreation { program, source });
            }
            history.entry(program).or_default().loads += 1;
            log::debug!("Loaded batch for {program:?}");
        }

        batch.insert(request.texture, Arc::downgrade(request.drawable));
        let (_, drawable) = entity.render_parts();
        drawable.attach(program, request.texture);

        log::trace!("Registered drawable under {program:?} / {:?}", request.texture);
        Ok(())
    }

    /// Remove a drawable from the bucket it was registered in
    ///
    /// Emptied buckets are dropped; an emptied program has its GPU resources
    /// released and its batch dropped. Removing something that is not there
    /// changes nothing and reports [`Removal::NotFound`].
    ///
    /// # Errors
    /// [`BatchError::InvalidProgram`] for the zero program handle.
    pub fn unregister<D: GraphicsDevice + ?Sized>(
        &self,
        device: &mut D,
        drawable: &DrawableHandle<B>,
        program: ProgramHandle,
        texture: TextureHandle,
    ) -> BatchResult<Removal> {
        if !program.is_valid() {
            return Err(BatchError::InvalidProgram);
        }

        let mut state = self.lock_state()?;
        let BatcherState { batches, history, .. } = &mut *state;

        let Some(bucket_emptied) = batches
            .get_mut(&program)
            .and_then(|batch| batch.remove(texture, Arc::as_ptr(drawable)))
        else {
            log::debug!("Unregister found no drawable under {program:?} / {texture:?}");
            return Ok(Removal::NotFound);
        };

        drawable
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .render_parts()
            .1
            .detach();

        if !bucket_emptied {
            return Ok(Removal::Removed);
        }
        if batches.get(&program).is_some_and(|batch| !batch.is_empty()) {
            return Ok(Removal::BucketReleased);
        }

        if let Some(mut batch) = batches.remove(&program) {
            batch.unload(device);
        }
        history.entry(program).or_default().unloads += 1;
        log::debug!("Unloaded batch for {program:?}");
        Ok(Removal::BatchUnloaded)
    }

    /// Draw every registered drawable
    ///
    /// Programs are visited in ascending handle order and, within each,
    /// textures in ascending handle order. A stale camera is refreshed once
    /// before the first program. Whenever the camera differs from the one the
    /// last frame used, including a refresh done by the caller, every
    /// drawable's MVP is rebuilt; otherwise only drawables with changed
    /// transforms are recomputed.
    ///
    /// # Errors
    /// [`BatchError::LockPoisoned`] if the batcher's lock is poisoned.
    pub fn draw<D: GraphicsDevice + ?Sized>(&self, device: &mut D, camera: &mut Camera2D) -> BatchResult<FrameStats> {
        let mut state = self.lock_state()?;
        let mut stats = FrameStats::default();

        if state.batches.is_empty() {
            return Ok(stats);
        }

        if !camera.is_updated() {
            camera.refresh();
            stats.camera_refreshed = true;
        }
        let camera_stale = state.camera_generation != Some(camera.generation());
        state.camera_generation = Some(camera.generation());
        let view_projection = camera.view_projection();

        if self.blending {
            device.set_blending(true);
        }

        for (&program, batch) in &state.batches {
            let Some(BatchBuffers { vertex_array, .. }) = batch.buffers() else {
                log::warn!("Skipping unloaded batch for {program:?}");
                continue;
            };
            let layout = *batch.layout();

            device.use_program(Some(program));
            device.bind_vertex_array(Some(vertex_array));
            stats.programs_bound += 1;

            for (texture, bucket) in batch.buckets() {
                if texture.is_valid() {
                    device.bind_texture(texture);
                    stats.textures_bound += 1;
                }

                for entry in bucket {
                    let Some(entity) = entry.upgrade() else {
                        stats.orphaned += 1;
                        continue;
                    };
                    let mut entity = entity.lock().unwrap_or_else(PoisonError::into_inner);
                    let (transforms, drawable) = entity.render_parts();

                    if drawable
                        .refresh(transforms, &view_projection, camera_stale)
                        .contains(DirtyFlags::MATRICES)
                    {
                        stats.matrices_recomputed += 1;
                    }

                    if let Some(location) = layout.color {
                        device.set_vertex_color(location, drawable.color());
                    }
                    device.set_uniform_matrix(layout.mvp_uniform, drawable.mvp_matrix());
                    device.draw_indexed(quad::QUAD_INDEX_COUNT);
                    stats.draw_calls += 1;
                }

                if texture.is_valid() {
                    device.bind_texture(TextureHandle::NONE);
                }
            }

            device.bind_vertex_array(None);
            device.use_program(None);
        }

        if self.blending {
            device.set_blending(false);
        }

        if stats.orphaned > 0 {
            log::debug!("Skipped {} dropped drawables", stats.orphaned);
        }
        Ok(stats)
    }

    /// Drop references to entities that no longer exist
    ///
    /// Cascades like [`SpriteBatcher::unregister`]: empty buckets are removed
    /// and empty programs are unloaded. Returns how many entries were removed.
    ///
    /// # Errors
    /// [`BatchError::LockPoisoned`] if the batcher's lock is poisoned.
    pub fn prune_orphans<D: GraphicsDevice + ?Sized>(&self, device: &mut D) -> BatchResult<usize> {
        let mut state = self.lock_state()?;
        let BatcherState { batches, history, .. } = &mut *state;

        let mut removed = 0;
        batches.retain(|&program, batch| {
            removed += batch.retain_live();
            if batch.is_empty() {
                batch.unload(device);
                history.entry(program).or_default().unloads += 1;
                log::debug!("Unloaded orphaned batch for {program:?}");
                false
            } else {
                true
            }
        });

        if removed > 0 {
            log::info!("Pruned {removed} orphaned drawables");
        }
        Ok(removed)
    }

    /// Release every batch and forget every drawable
    ///
    /// # Errors
    /// [`BatchError::LockPoisoned`] if the batcher's lock is poisoned.
    pub fn shutdown<D: GraphicsDevice + ?Sized>(&self, device: &mut D) -> BatchResult<()> {
        let mut state = self.lock_state()?;
        let BatcherState { batches, history, .. } = &mut *state;

        for (program, mut batch) in std::mem::take(batches) {
            for entry in batch.drain() {
                if let Some(entity) = entry.upgrade() {
                    entity
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .render_parts()
                        .1
                        .detach();
                }
            }
            if batch.state() == BatchState::Loaded {
                batch.unload(device);
                history.entry(program).or_default().unloads += 1;
            }
        }

        log::info!("Sprite batcher shut down");
        Ok(())
    }

    /// Whether blending is toggled around each draw
    pub fn blending(&self) -> bool {
        self.blending
    }

    /// Number of programs with a live batch
    pub fn program_count(&self) -> usize {
        self.read_state().batches.len()
    }

    /// State of a program's batch; programs without one are unloaded
    pub fn batch_state(&self, program: ProgramHandle) -> BatchState {
        self.read_state()
            .batches
            .get(&program)
            .map_or(BatchState::Unloaded, BatchDescriptor::state)
    }

    /// GPU resources of a program's batch
    pub fn batch_buffers(&self, program: ProgramHandle) -> Option<BatchBuffers> {
        self.read_state().batches.get(&program).and_then(BatchDescriptor::buffers)
    }

    /// Textures with a bucket under `program`, in draw order
    pub fn texture_buckets(&self, program: ProgramHandle) -> Vec<TextureHandle> {
        self.read_state()
            .batches
            .get(&program)
            .map(|batch| batch.textures().collect())
            .unwrap_or_default()
    }

    /// Number of entries in one bucket
    pub fn bucket_len(&self, program: ProgramHandle, texture: TextureHandle) -> usize {
        self.read_state()
            .batches
            .get(&program)
            .and_then(|batch| batch.bucket(texture))
            .map_or(0, <[_]>::len)
    }

    /// Whether `drawable` is registered under exactly this program and texture
    pub fn contains(&self, drawable: &DrawableHandle<B>, program: ProgramHandle, texture: TextureHandle) -> bool {
        let target = Arc::as_ptr(drawable);
        self.read_state()
            .batches
            .get(&program)
            .and_then(|batch| batch.bucket(texture))
            .is_some_and(|bucket| bucket.iter().any(|entry| std::ptr::eq(entry.as_ptr(), target)))
    }

    /// Total entries across all batches, including orphans not yet pruned
    pub fn drawable_count(&self) -> usize {
        self.read_state().batches.values().map(BatchDescriptor::drawable_count).sum()
    }

    /// How many times `program`'s batch has been loaded
    pub fn load_count(&self, program: ProgramHandle) -> u32 {
        self.read_state().history.get(&program).map_or(0, |history| history.loads)
    }

    /// How many times `program`'s batch has been unloaded
    pub fn unload_count(&self, program: ProgramHandle) -> u32 {
        self.read_state().history.get(&program).map_or(0, |history| history.unloads)
    }
}

//! Per-program batch state

use std::collections::BTreeMap;
use std::sync::{Mutex, Weak};

use crate::render::device::{
    BufferHandle, BufferTarget, DeviceError, DeviceResult, GraphicsDevice, ProgramLayout,
    TextureHandle, VertexArrayHandle,
};
use crate::render::primitives::quad;

/// Whether a batch currently owns GPU resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// No buffers or vertex array allocated
    Unloaded,
    /// Quad uploaded and vertex array configured
    Loaded,
}

/// GPU resources owned by a loaded batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchBuffers {
    /// Quad corner positions
    pub positions: BufferHandle,
    /// Quad indices
    pub indices: BufferHandle,
    /// Quad texture coordinates (allocated even when the program ignores them)
    pub tex_coords: BufferHandle,
    /// Attribute binding state
    pub vertex_array: VertexArrayHandle,
}

/// One shader program's share of the scene
///
/// Holds the program's attribute layout, its GPU resources while loaded, and
/// the drawables registered under it grouped by texture. Buckets are visited
/// in texture handle order.
#[derive(Debug)]
pub struct BatchDescriptor<B> {
    layout: ProgramLayout,
    buffers: Option<BatchBuffers>,
    textures: BTreeMap<TextureHandle, Vec<Weak<Mutex<B>>>>,
}

impl<B> BatchDescriptor<B> {
    /// Empty, unloaded batch for a program
    pub fn new(layout: ProgramLayout) -> Self {
        Self {
            layout,
            buffers: None,
            textures: BTreeMap::new(),
        }
    }

    /// Program attribute layout
    pub fn layout(&self) -> &ProgramLayout {
        &self.layout
    }

    /// Current state
    pub fn state(&self) -> BatchState {
        if self.buffers.is_some() {
            BatchState::Loaded
        } else {
            BatchState::Unloaded
        }
    }

    /// GPU resources while loaded
    pub fn buffers(&self) -> Option<BatchBuffers> {
        self.buffers
    }

    /// Whether no drawables remain
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Total drawables across all buckets
    pub fn drawable_count(&self) -> usize {
        self.textures.values().map(Vec::len).sum()
    }

    /// Textures with a live bucket, in traversal order
    pub fn textures(&self) -> impl Iterator<Item = TextureHandle> + '_ {
        self.textures.keys().copied()
    }

    /// Drawables registered under `texture`
    pub fn bucket(&self, texture: TextureHandle) -> Option<&[Weak<Mutex<B>>]> {
        self.textures.get(&texture).map(Vec::as_slice)
    }

    pub(crate) fn buckets(&self) -> impl Iterator<Item = (TextureHandle, &[Weak<Mutex<B>>])> {
        self.textures.iter().map(|(texture, bucket)| (*texture, bucket.as_slice()))
    }

    pub(crate) fn insert(&mut self, texture: TextureHandle, drawable: Weak<Mutex<B>>) {
        self.textures.entry(texture).or_default().push(drawable);
    }

    /// Swap-remove the entry pointing at `target`; returns `None` if absent,
    /// otherwise whether the bucket emptied and was dropped
    pub(crate) fn remove(&mut self, texture: TextureHandle, target: *const Mutex<B>) -> Option<bool> {
        let bucket = self.textures.get_mut(&texture)?;
        let index = bucket.iter().position(|entry| std::ptr::eq(entry.as_ptr(), target))?;
        bucket.swap_remove(index);

        if bucket.is_empty() {
            self.textures.remove(&texture);
            Some(true)
        } else {
            Some(false)
        }
    }

    /// Drop entries whose drawable no longer exists, and any bucket that empties
    pub(crate) fn retain_live(&mut self) -> usize {
        let mut removed = 0;
        self.textures.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|entry| entry.strong_count() > 0);
            removed += before - bucket.len();
            !bucket.is_empty()
        });
        removed
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Weak<Mutex<B>>> + '_ {
        std::mem::take(&mut self.textures).into_values().flatten()
    }

    /// Allocate buffers and a vertex array, upload the quad and wire attributes
    ///
    /// All-or-nothing: if any allocation fails, whatever was allocated is
    /// released and the batch stays unloaded.
    pub fn load<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) -> DeviceResult<()> {
        if self.buffers.is_some() {
            return Ok(());
        }

        let mut created: Vec<BufferHandle> = Vec::with_capacity(3);
        for _ in 0..3 {
            match create_checked(device.create_buffer(), "buffer", BufferHandle::is_valid) {
                Ok(buffer) => created.push(buffer),
                Err(error) => {
                    created.into_iter().for_each(|buffer| device.delete_buffer(buffer));
                    return Err(error);
                }
            }
        }
        let (positions, indices, tex_coords) = (created[0], created[1], created[2]);

        let vertex_array = match create_checked(device.create_vertex_array(), "vertex array", VertexArrayHandle::is_valid) {
            Ok(vertex_array) => vertex_array,
            Err(error) => {
                created.into_iter().for_each(|buffer| device.delete_buffer(buffer));
                return Err(error);
            }
        };

        device.upload_buffer(positions, BufferTarget::Vertex, quad::position_bytes());
        device.upload_buffer(indices, BufferTarget::Index, quad::index_bytes());
        if self.layout.has_tex_coords() {
            device.upload_buffer(tex_coords, BufferTarget::Vertex, quad::tex_coord_bytes());
        }

        device.bind_vertex_array(Some(vertex_array));
        if let Some(location) = self.layout.tex_coords {
            device.enable_vertex_attribute(location, tex_coords, quad::TEX_COORD_COMPONENTS);
        }
        device.enable_vertex_attribute(self.layout.position, positions, quad::POSITION_COMPONENTS);
        device.bind_index_buffer(indices);
        device.bind_vertex_array(None);

        self.buffers = Some(BatchBuffers { positions, indices, tex_coords, vertex_array });
        Ok(())
    }

    /// Release GPU resources; a no-op when already unloaded
    pub fn unload<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        if let Some(buffers) = self.buffers.take() {
            device.delete_vertex_array(buffers.vertex_array);
            device.delete_buffer(buffers.positions);
            device.delete_buffer(buffers.indices);
            device.delete_buffer(buffers.tex_coords);
        }
    }
}

fn create_checked<H: Copy>(
    result: DeviceResult<H>,
    resource: &'static str,
    is_valid: fn(H) -> bool,
) -> DeviceResult<H> {
    let handle = result?;
    if is_valid(handle) {
        Ok(handle)
    } else {
        Err(DeviceError::InvalidHandle(resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::{DeviceCommand, RecordingDevice};

    type Batch = BatchDescriptor<()>;

    fn textured_layout() -> ProgramLayout {
        ProgramLayout::new(0, 5).with_tex_coords(1)
    }

    #[test]
    fn test_load_uploads_quad_and_wires_attributes() {
        let mut device = RecordingDevice::new();
        let mut batch = Batch::new(textured_layout());

        batch.load(&mut device).unwrap();
        let buffers = batch.buffers().unwrap();

        assert_eq!(batch.state(), BatchState::Loaded);
        assert_eq!(device.live_buffer_count(), 3);
        assert_eq!(device.live_vertex_array_count(), 1);

        let commands = device.commands();
        assert!(commands.contains(&DeviceCommand::UploadBuffer {
            buffer: buffers.tex_coords,
            target: BufferTarget::Vertex,
            bytes: 32,
        }));
        assert!(commands.contains(&DeviceCommand::EnableVertexAttribute {
            location: 0,
            buffer: buffers.positions,
            components: 4,
        }));
        assert!(commands.contains(&DeviceCommand::BindIndexBuffer(buffers.indices)));
        assert_eq!(commands.last(), Some(&DeviceCommand::BindVertexArray(None)));
    }

    #[test]
    fn test_untextured_program_skips_tex_coords() {
        let mut device = RecordingDevice::new();
        let mut batch = Batch::new(ProgramLayout::new(0, 5));
        batch.load(&mut device).unwrap();

        let uploads = device
            .commands()
            .iter()
            .filter(|command| matches!(command, DeviceCommand::UploadBuffer { .. }))
            .count();
        assert_eq!(uploads, 2);
    }

    #[test]
    fn test_failed_buffer_rolls_back() {
        let mut device = RecordingDevice::new();
        device.fail_buffer_creation_after(2);
        let mut batch = Batch::new(textured_layout());

        assert_eq!(batch.load(&mut device), Err(DeviceError::OutOfMemory("buffer")));
        assert_eq!(batch.state(), BatchState::Unloaded);
        assert_eq!(device.live_buffer_count(), 0);
    }

    #[test]
    fn test_failed_vertex_array_rolls_back() {
        let mut device = RecordingDevice::new();
        device.fail_next_vertex_array();
        let mut batch = Batch::new(textured_layout());

        assert!(batch.load(&mut device).is_err());
        assert_eq!(device.live_buffer_count(), 0);
        assert_eq!(device.live_vertex_array_count(), 0);
    }

    #[test]
    fn test_unload_releases_everything() {
        let mut device = RecordingDevice::new();
        let mut batch = Batch::new(textured_layout());
        batch.load(&mut device).unwrap();

        batch.unload(&mut device);
        assert_eq!(batch.state(), BatchState::Unloaded);
        assert_eq!(device.live_buffer_count(), 0);
        assert_eq!(device.live_vertex_array_count(), 0);

        // Second unload is harmless
        batch.unload(&mut device);
        assert_eq!(device.counters().buffers_deleted, 3);
    }

    #[test]
    fn test_remove_swaps_and_drops_empty_bucket() {
        let a = std::sync::Arc::new(Mutex::new(()));
        let b = std::sync::Arc::new(Mutex::new(()));
        let texture = TextureHandle(7);
        let mut batch = Batch::new(textured_layout());
        batch.insert(texture, std::sync::Arc::downgrade(&a));
        batch.insert(texture, std::sync::Arc::downgrade(&b));

        assert_eq!(batch.remove(texture, std::sync::Arc::as_ptr(&a)), Some(false));
        assert_eq!(batch.bucket(texture).map(<[_]>::len), Some(1));
        assert_eq!(batch.remove(texture, std::sync::Arc::as_ptr(&a)), None);
        assert_eq!(batch.remove(texture, std::sync::Arc::as_ptr(&b)), Some(true));
        assert!(batch.is_empty());
    }
}

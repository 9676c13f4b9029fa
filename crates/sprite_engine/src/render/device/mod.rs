//! Graphics device abstraction
//!
//! The batcher never talks to a graphics API directly. Everything it needs
//! from the GPU goes through [`GraphicsDevice`], so a backend can be swapped
//! for a headless [`RecordingDevice`] in tests and tools.
//!
//! All device calls are render-thread only. The trait does not enforce this;
//! whoever owns the device is responsible for keeping it on one thread.

pub mod program;
pub mod recording;

pub use program::{ProgramLayout, ShaderProgramInfo};
pub use recording::{DeviceCommand, DeviceCounters, RecordingDevice};

use crate::foundation::math::Mat4;

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors reported by a graphics device
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// The device handed back a zero ("none") handle for a new resource
    #[error("device returned an invalid {0} handle")]
    InvalidHandle(&'static str),

    /// The device could not allocate the resource
    #[error("out of device memory while creating {0}")]
    OutOfMemory(&'static str),

    /// A program lacks a required attribute or uniform
    #[error("Invalid {name} location: {location}")]
    InvalidAttribute {
        /// What the location is for
        name: &'static str,
        /// The raw location reported by the API
        location: i32,
    },

    /// Backend-specific failure
    #[error("Backend error: {0}")]
    Backend(String),
}

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            /// The "no resource" sentinel
            pub const NONE: Self = Self(0);

            /// Whether this handle names a real resource
            pub const fn is_valid(self) -> bool {
                self.0 != 0
            }

            /// Raw API identifier
            pub const fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

gpu_handle!(
    /// Linked shader program
    ProgramHandle
);
gpu_handle!(
    /// Uploaded 2D texture; [`TextureHandle::NONE`] draws untextured
    TextureHandle
);
gpu_handle!(
    /// GPU buffer object
    BufferHandle
);
gpu_handle!(
    /// Vertex array (attribute binding state)
    VertexArrayHandle
);

/// Binding point for buffer uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTarget {
    /// Per-vertex attribute data
    Vertex,
    /// Element indices
    Index,
}

/// Render-thread GPU interface used by the sprite batcher
///
/// The method set mirrors the handful of fixed-function calls a quad batcher
/// needs: buffer and vertex-array lifetime, attribute wiring, program and
/// texture binding, per-draw uniforms, and indexed draws.
pub trait GraphicsDevice {
    /// Allocate a buffer object
    fn create_buffer(&mut self) -> DeviceResult<BufferHandle>;

    /// Release a buffer object
    fn delete_buffer(&mut self, buffer: BufferHandle);

    /// Allocate a vertex array
    fn create_vertex_array(&mut self) -> DeviceResult<VertexArrayHandle>;

    /// Release a vertex array
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    /// Fill a buffer with static data
    fn upload_buffer(&mut self, buffer: BufferHandle, target: BufferTarget, data: &[u8]);

    /// Bind a vertex array, or unbind with `None`
    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>);

    /// Point an attribute location at a float buffer with `components` floats per vertex
    ///
    /// Recorded into the currently bound vertex array.
    fn enable_vertex_attribute(&mut self, location: u32, buffer: BufferHandle, components: u32);

    /// Attach an index buffer to the currently bound vertex array
    fn bind_index_buffer(&mut self, buffer: BufferHandle);

    /// Make a program current, or clear it with `None`
    fn use_program(&mut self, program: Option<ProgramHandle>);

    /// Bind a 2D texture to unit 0; [`TextureHandle::NONE`] unbinds
    fn bind_texture(&mut self, texture: TextureHandle);

    /// Toggle alpha blending
    fn set_blending(&mut self, enabled: bool);

    /// Set a constant vertex attribute (used for per-sprite color)
    fn set_vertex_color(&mut self, location: u32, color: [f32; 4]);

    /// Upload a 4x4 matrix uniform (column-major)
    fn set_uniform_matrix(&mut self, location: u32, matrix: &Mat4);

    /// Draw `index_count` indices as triangles from the bound vertex array
    fn draw_indexed(&mut self, index_count: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_sentinels() {
        assert!(!ProgramHandle::NONE.is_valid());
        assert!(!TextureHandle::default().is_valid());
        assert!(BufferHandle(3).is_valid());
        assert_eq!(VertexArrayHandle(9).raw(), 9);
    }

    #[test]
    fn test_handles_order_by_raw_id() {
        let mut textures = vec![TextureHandle(5), TextureHandle::NONE, TextureHandle(2)];
        textures.sort();
        assert_eq!(textures, vec![TextureHandle::NONE, TextureHandle(2), TextureHandle(5)]);
    }
}

//! # Rendering
//!
//! Everything between a sprite's transforms and the GPU.
//!
//! ## Organization
//!
//! - **device**: The [`GraphicsDevice`] seam, GPU handles and a headless device
//! - **drawable**: Per-entity cached render state and the [`Renderable`] trait
//! - **primitives**: The 2D camera and the shared unit quad
//! - **systems**: The program/texture [`SpriteBatcher`]

pub mod device;
pub mod drawable;
pub mod primitives;
pub mod systems;

pub use device::{
    BufferHandle, DeviceError, DeviceResult, GraphicsDevice, ProgramHandle, ProgramLayout,
    RecordingDevice, ShaderProgramInfo, TextureHandle, VertexArrayHandle,
};
pub use drawable::{DirtyFlags, Drawable, DrawableObject, Renderable};
pub use primitives::{Camera2D, Frustum};
pub use systems::batching::{
    BatchError, BatchResult, BatchState, DrawRequest, DrawableHandle, FrameStats, Removal,
    SpriteBatcher,
};

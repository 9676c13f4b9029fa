//! # Sprite Batching
//!
//! Groups drawables first by shader program and then by texture so a frame
//! binds each program once and each texture once per program.
//!
//! ## Architecture
//!
//! - **SpriteBatcher**: Thread-safe registry plus the per-frame traversal
//! - **BatchDescriptor**: One program's GPU resources and texture buckets
//! - **FrameStats**: What a single draw did
//!
//! ## Lifecycle
//!
//! A program's descriptor is created and its GPU resources loaded when the
//! first drawable is registered under it. When the last drawable leaves, the
//! resources are released and the descriptor is dropped. A texture bucket
//! lives exactly as long as it holds at least one drawable.
//!
//! ## Locking
//!
//! The batcher has a single internal lock. Drawables are shared as
//! `Arc<Mutex<_>>` and the batcher only ever takes a drawable's lock while
//! already holding its own, never the other way round. Callers must not hold
//! a drawable's lock while calling into the batcher.

pub mod batch;
pub mod batcher;
pub mod stats;


pub use batch::{BatchBuffers, BatchDescriptor, BatchState};
pub use batcher::{DrawRequest, DrawableHandle, Removal, SpriteBatcher};
pub use stats::FrameStats;

use crate::render::device::{DeviceError, ProgramHandle, TextureHandle};

/// Result type for batching operations
pub type BatchResult<T> = Result<T, BatchError>;

/// Errors that can occur while registering, unregistering or drawing
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// GPU resources for a new batch could not be created
    #[error("Failed to create GPU resources for {program:?}: {source}")]
    ResourceCreation {
        /// Program whose batch failed to load
        program: ProgramHandle,
        /// Device failure
        #[source]
        source: DeviceError,
    },

    /// The zero program handle was passed
    #[error("Invalid shader program handle")]
    InvalidProgram,

    /// The drawable is already held by a batcher
    #[error("Drawable already registered under {program:?} / {texture:?}")]
    AlreadyRegistered {
        /// Program it is registered under
        program: ProgramHandle,
        /// Texture it is registered under
        texture: TextureHandle,
    },

    /// A lock was poisoned by a panicking thread
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

//! Render systems

pub mod batching;

pub use batching::{BatchError, BatchResult, FrameStats, Removal, SpriteBatcher};

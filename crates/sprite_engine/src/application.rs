//! Application trait and lifecycle management

use crate::config::ConfigError;
use crate::engine::{Engine, EngineError};
use crate::render::device::{DeviceError, GraphicsDevice};
use crate::render::systems::batching::BatchError;
use thiserror::Error;

/// Application lifecycle trait
///
/// Implement this trait to drive the engine. Every phase receives the engine
/// context explicitly; there is no global state.
pub trait Application<D: GraphicsDevice> {
    /// Initialize the application
    ///
    /// Called once before the first frame. Set up programs, textures and
    /// initial sprites here.
    fn initialize(&mut self, engine: &mut Engine<D>) -> Result<(), AppError>;

    /// Update the application
    ///
    /// # Arguments
    /// * `engine` - Mutable reference to the engine
    /// * `delta_time` - Time since last frame in seconds
    fn update(&mut self, engine: &mut Engine<D>, delta_time: f32) -> Result<(), AppError>;

    /// Render the application
    ///
    /// Called after update. The default draws every registered sprite.
    fn render(&mut self, engine: &mut Engine<D>) -> Result<(), AppError> {
        engine.render().map(|_| ())
    }

    /// Handle an application event
    fn handle_event(&mut self, engine: &mut Engine<D>, event: AppEvent) -> Result<(), AppError> {
        engine.handle_event(event);
        Ok(())
    }

    /// Cleanup the application
    ///
    /// Called once after the last frame, before the engine releases its
    /// batches. Hide or drop sprites here.
    fn cleanup(&mut self, engine: &mut Engine<D>);
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine error propagated to application level
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Batching failure
    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    /// Graphics device failure, such as an unusable program layout
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Custom application error
    #[error("Application error: {0}")]
    Custom(String),
}

/// Application events
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppEvent {
    /// The viewport changed size
    Resized {
        /// New width in world units
        width: f32,
        /// New height in world units
        height: f32,
    },

    /// Shutdown requested
    CloseRequested,
}

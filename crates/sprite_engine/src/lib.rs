//! # Sprite Engine
//!
//! A 2D sprite batching engine. Sprites are grouped by shader program and then
//! by texture so each frame binds every program once and every texture once
//! per program, with per-sprite matrices recomputed only when something moved.
//!
//! ## Features
//!
//! - **Program/Texture Batching**: Lazy per-program GPU resources, texture buckets
//! - **Lazy Matrix Updates**: Change-tracked transforms and a cached camera
//! - **Thread-Safe Registration**: Sprites move on one thread while another draws
//! - **Backend Agnostic**: All GPU work goes through [`render::GraphicsDevice`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sprite_engine::prelude::*;
//!
//! struct MyApp;
//!
//! impl Application<RecordingDevice> for MyApp {
//!     fn initialize(&mut self, engine: &mut Engine<RecordingDevice>) -> Result<(), AppError> {
//!         // Create programs, textures and sprites
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, engine: &mut Engine<RecordingDevice>, delta_time: f32) -> Result<(), AppError> {
//!         // Move things
//!         Ok(())
//!     }
//!
//!     fn cleanup(&mut self, engine: &mut Engine<RecordingDevice>) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApplicationConfig::default();
//!     let mut app = MyApp;
//!     Engine::run(config, RecordingDevice::new(), &mut app)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;
pub mod scene;

mod application;
mod engine;

pub use application::{AppError, AppEvent, Application};
pub use engine::{Engine, EngineError, RunSummary};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        AppError, AppEvent, Application, Engine, EngineError, RunSummary,
        core::config::{ApplicationConfig, Config, EngineConfig, WorldConfig},
        foundation::{
            math::{Mat4, Vec3},
            time::{Ticker, Timer},
        },
        render::{
            BatchError, Camera2D, DrawRequest, Drawable, DrawableHandle, FrameStats,
            GraphicsDevice, ProgramHandle, ProgramLayout, RecordingDevice, Removal, Renderable,
            ShaderProgramInfo, SpriteBatcher, TextureHandle,
        },
        scene::{Sprite, SpriteBody, SpriteKey, SpriteManager, TransformComponent, Transforms},
    };
}

//! # Unified Configuration System
//!
//! Configuration for the engine loop and for the simulated sprite world,
//! bundled into one [`ApplicationConfig`] that can be read from a single TOML
//! or RON file.
//!
//! ## Configuration Categories
//!
//! - **Engine Config**: Logging, frame limit, blending
//! - **World Config**: World bounds, sprite population and sizing, RNG seed,
//!   simulation tick rate

use serde::{Serialize, Deserialize};
use std::time::Duration;

pub use crate::config::{Config, ConfigError};

/// # Engine Configuration
///
/// Core engine behavior configuration including logging and frame pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Log filter used when `RUST_LOG` is not set
    pub log_level: String,
    /// Stop after this many frames; `None` runs until the application quits
    pub frame_limit: Option<u64>,
    /// Enable alpha blending around the batch traversal
    pub enable_blending: bool,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            frame_limit: None,
            enable_blending: true,
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Limit the number of frames the runner will produce
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Enable or disable blending
    pub fn with_blending(mut self, enabled: bool) -> Self {
        self.enable_blending = enabled;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # World Configuration
///
/// Bounds and population of the bouncing-sprite world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World width in world units (pixels for the default camera)
    pub width: u32,
    /// World height in world units
    pub height: u32,
    /// Upper bound on live sprites
    pub max_sprites: u32,
    /// Smallest sprite edge length
    pub sprite_min_size: u32,
    /// Seed for sprite placement; `None` seeds from entropy
    pub seed: Option<u64>,
    /// Simulation step interval in milliseconds
    pub tick_interval_ms: u64,
}

impl WorldConfig {
    /// Create a world configuration with the given bounds
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Set the sprite limit
    pub fn with_max_sprites(mut self, max_sprites: u32) -> Self {
        self.max_sprites = max_sprites;
        self
    }

    /// Use a fixed RNG seed for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Largest sprite edge length, derived from the world width so that all
    /// sprites can fit side by side
    pub fn sprite_max_size(&self) -> u32 {
        if self.max_sprites == 0 {
            return self.sprite_min_size;
        }
        (self.width / self.max_sprites).max(self.sprite_min_size)
    }

    /// Simulation step interval
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Validate the world settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid("world dimensions must be non-zero".to_string()));
        }
        if self.sprite_min_size == 0 {
            return Err(ConfigError::Invalid("sprite_min_size must be at least 1".to_string()));
        }
        // A sprite must fit inside the world with room to move on both axes
        let largest = self.sprite_max_size();
        if largest.saturating_mul(2) >= self.width.min(self.height) {
            return Err(ConfigError::Invalid(format!(
                "sprites up to {} units do not fit a {}x{} world",
                largest, self.width, self.height
            )));
        }
        Ok(())
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            max_sprites: 100,
            sprite_min_size: 1,
            seed: None,
            tick_interval_ms: 16,
        }
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration that encompasses all engine subsystems.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Engine core configuration
    pub engine: EngineConfig,
    /// Simulated world configuration
    pub world: WorldConfig,
}

impl Config for ApplicationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.world.validate()
    }
}

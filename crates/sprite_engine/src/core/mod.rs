//! # Core Engine Module
//!
//! Shared configuration types used by the engine runner and the sprite layer.
//!
//! ## Organization
//!
//! - **Config**: Engine behaviour and simulated world settings
//! - **Foundation**: Low-level utilities (math, time, logging)

pub mod config;

// Re-export foundation modules for convenience
pub use crate::foundation;

// Re-export commonly used config types
pub use config::{
    ApplicationConfig,
    EngineConfig,
    WorldConfig,
    Config,
    ConfigError,
};

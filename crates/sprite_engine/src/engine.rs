//! Core engine implementation
//!
//! [`Engine`] is the application context: it owns the graphics device, the
//! sprite batcher, the camera and frame timing, and is handed to every
//! [`Application`] phase.

use std::sync::Arc;

use crate::application::{AppError, AppEvent, Application};
use crate::config::Config;
use crate::core::config::ApplicationConfig;
use crate::foundation::time::Timer;
use crate::render::device::GraphicsDevice;
use crate::render::primitives::Camera2D;
use crate::render::systems::batching::{BatchError, FrameStats, SpriteBatcher};
use crate::scene::sprite::SpriteBody;
use thiserror::Error;

/// What a completed run did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    /// Frames rendered
    pub frames: u64,
    /// Wall-clock seconds spent in the frame loop
    pub elapsed_secs: f32,
    /// Average frames per second
    pub average_fps: f32,
    /// Batching counters summed over every frame
    pub totals: FrameStats,
}

/// Main engine struct
///
/// Generic over the graphics device so the same loop runs on a GPU backend
/// or on a [`RecordingDevice`](crate::render::device::RecordingDevice).
pub struct Engine<D: GraphicsDevice> {
    device: D,
    batcher: Arc<SpriteBatcher<SpriteBody>>,
    camera: Camera2D,
    timer: Timer,
    config: ApplicationConfig,
    running: bool,
    last_frame: FrameStats,
    totals: FrameStats,
}

impl<D: GraphicsDevice> Engine<D> {
    /// Create a new engine instance
    ///
    /// # Errors
    /// [`EngineError::InitializationFailed`] if the configuration is invalid.
    pub fn new(config: ApplicationConfig, device: D) -> Result<Self, EngineError> {
        log::info!("Initializing engine...");
        config
            .validate()
            .map_err(|e| EngineError::InitializationFailed(format!("Configuration: {e}")))?;

        let camera = Camera2D::for_viewport(config.world.width as f32, config.world.height as f32);
        let batcher = Arc::new(SpriteBatcher::with_blending(config.engine.enable_blending));

        Ok(Self {
            device,
            batcher,
            camera,
            timer: Timer::new(),
            config,
            running: true,
            last_frame: FrameStats::default(),
            totals: FrameStats::default(),
        })
    }

    /// Run the engine main loop with the given application
    ///
    /// Runs until the application calls [`Engine::quit`] or the configured
    /// frame limit is reached, then cleans up and releases every batch.
    ///
    /// # Errors
    /// Initialization failures and any error returned by an application phase.
    pub fn run<A: Application<D>>(config: ApplicationConfig, device: D, app: &mut A) -> Result<RunSummary, EngineError> {
        let mut engine = Self::new(config, device)?;

        app.initialize(&mut engine)
            .map_err(|e| EngineError::ApplicationError(format!("App initialization: {e}")))?;

        log::info!("Starting main loop...");
        let result = engine.main_loop(app);

        app.cleanup(&mut engine);
        engine.shutdown()?;
        result?;

        let summary = engine.summary();
        log::info!("Engine shutdown complete after {} frames", summary.frames);
        Ok(summary)
    }

    fn main_loop<A: Application<D>>(&mut self, app: &mut A) -> Result<(), EngineError> {
        while self.running {
            if self.config.engine.frame_limit.is_some_and(|limit| self.timer.frame_count() >= limit) {
                log::debug!("Frame limit reached");
                break;
            }

            self.timer.update();
            let delta_time = self.timer.delta_time();

            app.update(self, delta_time)
                .map_err(|e| EngineError::ApplicationError(format!("App update: {e}")))?;
            app.render(self)
                .map_err(|e| EngineError::ApplicationError(format!("App render: {e}")))?;
        }
        Ok(())
    }

    /// Draw every registered sprite
    ///
    /// # Errors
    /// Propagates batching failures.
    pub fn render(&mut self) -> Result<FrameStats, AppError> {
        let stats = self.batcher.draw(&mut self.device, &mut self.camera)?;
        log::trace!(
            "Frame {}: {} draws across {} programs",
            self.timer.frame_count(),
            stats.draw_calls,
            stats.programs_bound
        );
        self.last_frame = stats;
        self.totals.accumulate(&stats);
        Ok(stats)
    }

    /// Handle an application event
    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Resized { width, height } => {
                log::debug!("Viewport resized to {width}x{height}");
                self.camera.resize(width, height);
            }
            AppEvent::CloseRequested => self.quit(),
        }
    }

    /// Release every batch still registered
    ///
    /// # Errors
    /// [`EngineError::RenderError`] if the batcher's lock is poisoned.
    pub fn shutdown(&mut self) -> Result<(), EngineError> {
        self.batcher.shutdown(&mut self.device)?;
        Ok(())
    }

    /// Stop after the current frame
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Whether the main loop keeps going
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Graphics device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Graphics device, mutably
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Shared sprite batcher
    pub fn batcher(&self) -> &Arc<SpriteBatcher<SpriteBody>> {
        &self.batcher
    }

    /// Batcher and device together, for registering sprites
    pub fn batcher_and_device(&mut self) -> (&SpriteBatcher<SpriteBody>, &mut D) {
        (&self.batcher, &mut self.device)
    }

    /// Camera
    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    /// Camera, mutably
    pub fn camera_mut(&mut self) -> &mut Camera2D {
        &mut self.camera
    }

    /// Active configuration
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    /// Frames started so far
    pub fn frame_count(&self) -> u64 {
        self.timer.frame_count()
    }

    /// Stats of the most recent draw
    pub fn last_frame_stats(&self) -> FrameStats {
        self.last_frame
    }

    /// Summary of the run so far
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            frames: self.timer.frame_count(),
            elapsed_secs: self.timer.total_time(),
            average_fps: self.timer.average_fps(),
            totals: self.totals,
        }
    }

    /// Consume the engine, returning the device
    pub fn into_device(self) -> D {
        self.device
    }
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Engine initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Rendering or batching failure
    #[error("Render error: {0}")]
    RenderError(#[from] BatchError),

    /// Application error
    #[error("Application error: {0}")]
    ApplicationError(String),
}

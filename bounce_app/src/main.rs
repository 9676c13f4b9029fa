//! Bouncing sprites demo
//!
//! Spawns sprites under two shader programs and two textures, moves them on a
//! simulation thread, and draws them through the sprite batcher on the main
//! thread. Rendering goes to a headless recording device, so the demo reports
//! what it would have sent to the GPU instead of opening a window.
//!
//! Usage: `bounce_demo [config.toml|config.ron]`

mod simulation;

use std::sync::Arc;
use std::time::Duration;

use sprite_engine::foundation::logging;
use sprite_engine::prelude::*;
use thiserror::Error;

use simulation::Simulation;

/// Frames rendered when the configuration sets no limit
const DEFAULT_FRAME_LIMIT: u64 = 600;

/// Log a stats line every this many frames
const STATS_INTERVAL: u64 = 120;

#[derive(Error, Debug)]
enum DemoError {
    #[error(transparent)]
    Config(#[from] sprite_engine::core::ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

struct BounceApp {
    manager: Arc<SpriteManager>,
    simulation: Option<Simulation>,
    programs: Vec<ShaderProgramInfo>,
    textures: Vec<TextureHandle>,
    frame_ticker: Ticker,
    spawned: usize,
}

impl BounceApp {
    fn new(world: WorldConfig) -> Self {
        Self {
            manager: Arc::new(SpriteManager::new(world)),
            simulation: None,
            programs: Vec::new(),
            textures: Vec::new(),
            frame_ticker: Ticker::new(Duration::from_millis(16)),
            spawned: 0,
        }
    }

    /// Program/texture pair for the next sprite, cycling through every combination
    fn next_material(&self) -> (ShaderProgramInfo, TextureHandle) {
        let program = self.programs[self.spawned % self.programs.len()];
        let texture = if program.layout.has_tex_coords() {
            self.textures[(self.spawned / self.programs.len()) % self.textures.len()]
        } else {
            TextureHandle::NONE
        };
        (program, texture)
    }
}

impl Application<RecordingDevice> for BounceApp {
    fn initialize(&mut self, engine: &mut Engine<RecordingDevice>) -> Result<(), AppError> {
        log::info!("Initializing bounce demo...");
        let device = engine.device_mut();
        device.set_command_log(false);

        // Textured program: position, texcoords, color, MVP
        let textured = ProgramLayout::from_raw(0, 1, 2, 0)?;
        // Flat program has no texture coordinates
        let flat = ProgramLayout::from_raw(0, -1, 1, 0)?;
        self.programs = vec![
            ShaderProgramInfo::new(device.create_program(), textured),
            ShaderProgramInfo::new(device.create_program(), flat),
        ];
        self.textures = vec![device.create_texture(), device.create_texture()];

        let simulation = Simulation::spawn(Arc::clone(&self.manager))
            .map_err(|e| AppError::Custom(format!("Failed to start simulation: {e}")))?;
        self.simulation = Some(simulation);
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine<RecordingDevice>, _delta_time: f32) -> Result<(), AppError> {
        if self.manager.has_capacity() {
            let (program, texture) = self.next_material();
            let (batcher, device) = engine.batcher_and_device();
            if self.manager.spawn(batcher, device, program, texture)?.is_some() {
                self.spawned += 1;
            }
        }

        let frame = engine.frame_count();
        if frame % STATS_INTERVAL == 0 {
            let stats = engine.last_frame_stats();
            log::info!(
                "Frame {frame}: {} sprites, {} draws, {} programs, {} textures, {:.1} draws/program",
                self.manager.len(),
                stats.draw_calls,
                stats.programs_bound,
                stats.textures_bound,
                stats.avg_draws_per_program()
            );
        }
        Ok(())
    }

    fn render(&mut self, engine: &mut Engine<RecordingDevice>) -> Result<(), AppError> {
        let stats = engine.render()?;
        log::debug!("{stats:?}");
        self.frame_ticker.wait();
        Ok(())
    }

    fn cleanup(&mut self, engine: &mut Engine<RecordingDevice>) {
        if let Some(mut simulation) = self.simulation.take() {
            let ticks = simulation.stop();
            log::info!("Simulation stopped after {ticks} ticks");
        }

        let (batcher, device) = engine.batcher_and_device();
        if let Err(e) = self.manager.stop(batcher, device) {
            log::error!("Failed to hide sprites: {e}");
        }

        let counters = engine.device().counters();
        log::info!(
            "Device totals: {} draws, {} program binds, {} texture binds, {} live buffers",
            counters.draw_calls,
            counters.program_binds,
            counters.texture_binds,
            engine.device().live_buffer_count()
        );
    }
}

fn load_config() -> Result<ApplicationConfig, DemoError> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => ApplicationConfig::load_from_file(&path)?,
        None => ApplicationConfig::default(),
    };
    if config.engine.frame_limit.is_none() {
        config.engine.frame_limit = Some(DEFAULT_FRAME_LIMIT);
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    logging::init_with_level(&config.engine.log_level);

    log::info!(
        "Starting bounce demo: {}x{} world, up to {} sprites",
        config.world.width,
        config.world.height,
        config.world.max_sprites
    );

    let mut app = BounceApp::new(config.world.clone());
    let summary = Engine::run(config, RecordingDevice::new(), &mut app).map_err(DemoError::from)?;

    log::info!(
        "Rendered {} frames in {:.2}s ({:.1} fps), {} draw calls, {} orphans skipped",
        summary.frames,
        summary.elapsed_secs,
        summary.average_fps,
        summary.totals.draw_calls,
        summary.totals.orphaned
    );
    Ok(())
}

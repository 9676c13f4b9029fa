//! Background simulation thread
//!
//! Moves every sprite one step per tick while the render loop draws. The
//! thread only ever takes the sprite manager's read lock and one sprite lock
//! at a time, so it never contends with the batcher for longer than a single
//! sprite update.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use sprite_engine::foundation::time::Ticker;
use sprite_engine::scene::SpriteManager;

/// Handle to a running simulation thread
pub struct Simulation {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl Simulation {
    /// Start ticking `manager` on a new thread
    pub fn spawn(manager: Arc<SpriteManager>) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let interval = manager.world().tick_interval();

        let handle = std::thread::Builder::new().name("simulation".into()).spawn({
            let stop = Arc::clone(&stop);
            move || {
                let mut ticker = Ticker::new(interval);
                let mut ticks = 0u64;
                while !stop.load(Ordering::Acquire) {
                    let moved = manager.update();
                    log::trace!("Tick {ticks}: {moved} sprites moved");
                    ticks += 1;
                    ticker.wait();
                }
                ticks
            }
        })?;

        log::info!("Simulation running every {:?}", interval);
        Ok(Self { stop, handle: Some(handle) })
    }

    /// Signal the thread to stop and wait for it; returns the ticks it ran
    pub fn stop(&mut self) -> u64 {
        self.stop.store(true, Ordering::Release);
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(ticks)) => ticks,
            Some(Err(_)) => {
                log::error!("Simulation thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

//! Per-frame batching statistics

/// Counters for one [`SpriteBatcher::draw`](super::SpriteBatcher::draw) call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Programs made current
    pub programs_bound: u32,
    /// Real textures bound (untextured buckets do not count)
    pub textures_bound: u32,
    /// Quads drawn
    pub draw_calls: u32,
    /// Drawables whose model/MVP matrices were rebuilt
    pub matrices_recomputed: u32,
    /// Whether the camera was refreshed this frame
    pub camera_refreshed: bool,
    /// Dropped drawables skipped during traversal
    pub orphaned: u32,
}

impl FrameStats {
    /// Average quads drawn per bound program
    pub fn avg_draws_per_program(&self) -> f32 {
        if self.programs_bound == 0 {
            0.0
        } else {
            self.draw_calls as f32 / self.programs_bound as f32
        }
    }

    /// Fold another frame's counts into this one
    pub fn accumulate(&mut self, other: &FrameStats) {
        self.programs_bound += other.programs_bound;
        self.textures_bound += other.textures_bound;
        self.draw_calls += other.draw_calls;
        self.matrices_recomputed += other.matrices_recomputed;
        self.camera_refreshed |= other.camera_refreshed;
        self.orphaned += other.orphaned;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avg_draws_per_program() {
        let stats = FrameStats { programs_bound: 2, draw_calls: 7, ..Default::default() };
        assert_eq!(stats.avg_draws_per_program(), 3.5);
        assert_eq!(FrameStats::default().avg_draws_per_program(), 0.0);
    }

    #[test]
    fn test_accumulate() {
        let mut total = FrameStats::default();
        total.accumulate(&FrameStats { draw_calls: 3, camera_refreshed: true, ..Default::default() });
        total.accumulate(&FrameStats { draw_calls: 2, orphaned: 1, ..Default::default() });

        assert_eq!(total.draw_calls, 5);
        assert_eq!(total.orphaned, 1);
        assert!(total.camera_refreshed);
    }
}

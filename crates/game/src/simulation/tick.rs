/// Longest frame gap simulated in one go; anything beyond is dropped.
const MAX_FRAME_MS: f64 = 250.0;

/// Turns rendered frame time into whole physics ticks.
///
/// Whatever does not add up to a full tick stays in the accumulator, so the
/// physics state always describes a moment [`FixedTimestep::lag_ms`] before
/// the last frame.
#[derive(Debug)]
pub struct FixedTimestep {
    tick_ms: f64,
    accumulator_ms: f64,
}

impl FixedTimestep {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            tick_ms: 1000.0 / frame_rate as f64,
            accumulator_ms: 0.0,
        }
    }

    /// Adds one frame's elapsed time and returns how many ticks are due.
    pub fn advance(&mut self, elapsed_ms: u64) -> u32 {
        self.accumulator_ms += (elapsed_ms as f64).min(MAX_FRAME_MS);
        let mut ticks = 0;
        while self.accumulator_ms >= self.tick_ms {
            self.accumulator_ms -= self.tick_ms;
            ticks += 1;
        }
        ticks
    }

    /// Fraction of a tick still owed to the physics state.
    pub fn alpha(&self) -> f32 {
        (self.accumulator_ms / self.tick_ms) as f32
    }

    pub fn lag_ms(&self) -> u64 {
        self.accumulator_ms.round() as u64
    }
}

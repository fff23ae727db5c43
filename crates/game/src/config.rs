use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 7878;
pub const DEFAULT_FRAME_RATE: u32 = 60;
pub const DEFAULT_WATCHDOG_MS: u64 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    #[error("{name} must be in (0, 1], got {value}")]
    InvalidRatio { name: &'static str, value: f32 },
    #[error("arena {width}x{height} cannot fit paddles and ball")]
    ArenaTooSmall { width: f32, height: f32 },
    #[error("clock sample window must hold at least one sample")]
    EmptyClockWindow,
}

/// Geometry and physics constants shared by both peers. Both sides must run
/// with identical values or dead reckoning diverges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub width: f32,
    pub height: f32,
    pub paddle_height: f32,
    pub paddle_width: f32,
    pub paddle_inset: f32,
    pub ball_radius: f32,
    pub paddle_step: f32,
    /// Pixels per physics tick.
    pub max_ball_speed: f32,
    pub speed_up: f32,
    pub english: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            paddle_height: 100.0,
            paddle_width: 12.0,
            paddle_inset: 30.0,
            ball_radius: 8.0,
            paddle_step: 12.0,
            max_ball_speed: 20.0,
            speed_up: 1.05,
            english: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub arena: ArenaConfig,
    pub frame_rate: u32,

    pub handshake_retry_ms: u64,
    pub watchdog_timeout_ms: u64,

    pub ping_interval_ms: u64,
    pub clock_window: usize,
    pub clock_fallback_ms: u64,

    pub state_interval_ms: u64,
    pub paddle_interval_ms: u64,

    pub paddle_smoothing: f32,
    pub paddle_snap_distance: f32,
    pub body_snap_distance: f32,
    pub body_correction_rate: f32,

    pub collision_tolerance_ms: u64,
    pub collision_extended_tolerance_ms: u64,
    pub collision_expiry_ms: u64,
    pub sweep_interval_ms: u64,

    pub ordering_mismatch_threshold: u32,
    pub ordering_window_ms: u64,

    pub serve_delay_ms: u64,
    pub miss_grace_ms: u64,
    pub lives: u8,
    pub serve_velocity: [f32; 2],

    /// Wrap every outbound payload in base64 and expect the same inbound.
    pub text_safe: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            arena: ArenaConfig::default(),
            frame_rate: DEFAULT_FRAME_RATE,
            handshake_retry_ms: 500,
            watchdog_timeout_ms: DEFAULT_WATCHDOG_MS,
            ping_interval_ms: 1_000,
            clock_window: 5,
            clock_fallback_ms: 3_000,
            state_interval_ms: 50,
            paddle_interval_ms: 33,
            paddle_smoothing: 0.25,
            paddle_snap_distance: 200.0,
            body_snap_distance: 40.0,
            body_correction_rate: 0.15,
            collision_tolerance_ms: 50,
            collision_extended_tolerance_ms: 300,
            collision_expiry_ms: 500,
            sweep_interval_ms: 100,
            ordering_mismatch_threshold: 2,
            ordering_window_ms: 1_000,
            serve_delay_ms: 1_000,
            miss_grace_ms: 400,
            lives: 5,
            serve_velocity: [7.0, 1.4],
            text_safe: false,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("frame_rate", self.frame_rate as u64),
            ("handshake_retry_ms", self.handshake_retry_ms),
            ("watchdog_timeout_ms", self.watchdog_timeout_ms),
            ("ping_interval_ms", self.ping_interval_ms),
            ("state_interval_ms", self.state_interval_ms),
            ("paddle_interval_ms", self.paddle_interval_ms),
            ("collision_expiry_ms", self.collision_expiry_ms),
            ("sweep_interval_ms", self.sweep_interval_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(ConfigError::ZeroInterval(name));
            }
        }

        let ratios = [
            ("paddle_smoothing", self.paddle_smoothing),
            ("body_correction_rate", self.body_correction_rate),
        ];
        for (name, value) in ratios {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::InvalidRatio { name, value });
            }
        }

        if self.clock_window == 0 {
            return Err(ConfigError::EmptyClockWindow);
        }

        let arena = &self.arena;
        let min_width = 2.0 * (arena.paddle_inset + arena.paddle_width) + 4.0 * arena.ball_radius;
        if arena.width < min_width || arena.height < arena.paddle_height {
            return Err(ConfigError::ArenaTooSmall {
                width: arena.width,
                height: arena.height,
            });
        }

        Ok(())
    }

    pub fn tick_ms(&self) -> f32 {
        1000.0 / self.frame_rate as f32
    }
}

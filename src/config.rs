use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::game::constants::{bot, capture, combat, hole, round, spawn, tick, world};
use crate::game::mode::GameMode;

/// Rejected round configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be positive (got {value})")]
    NotPositive { field: &'static str, value: f32 },
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: f32 },
    #[error("absorb_fraction must be within [0, 1] (got {0})")]
    AbsorbFractionOutOfRange(f32),
    #[error("tick_rate must be at least 1")]
    ZeroTickRate,
    #[error("spawn_attempts must be at least 1")]
    ZeroSpawnAttempts,
    #[error("start_radius {start} exceeds max_radius {max}")]
    StartAboveMaxRadius { start: f32, max: f32 },
    #[error("bot_count {count} exceeds the maximum of {max}")]
    TooManyBots { count: usize, max: usize },
}

/// Bot controller tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotTuning {
    pub vision_radius: f32,
    pub threat_radius: f32,
    pub flee_margin: f32,
    /// Max random steering rotation per tick (radians)
    pub perturbation: f32,
    pub avoid_buffer: f32,
    pub wander_turn: f32,
}

impl Default for BotTuning {
    fn default() -> Self {
        Self {
            vision_radius: bot::VISION_RADIUS,
            threat_radius: bot::THREAT_RADIUS,
            flee_margin: bot::FLEE_MARGIN,
            perturbation: bot::PERTURBATION,
            avoid_buffer: bot::AVOID_BUFFER,
            wander_turn: bot::WANDER_TURN,
        }
    }
}

/// Immutable configuration of one round
///
/// Built once, validated, then shared by reference with every system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub mode: GameMode,
    /// Bots spawned alongside the player (ignored in Solo)
    pub bot_count: usize,
    /// Seed for every random draw in the round
    pub seed: u64,
    pub tick_rate: u32,

    // Capture
    pub k_fit: f32,
    pub k_capture: f32,
    pub k_value: f32,
    pub growth_multiplier: f32,
    pub fall_duration: f32,
    /// Invincible holes may still capture objects
    pub invincible_can_capture: bool,

    // Combat
    pub elimination_margin: f32,
    pub elimination_bonus: f32,
    pub absorb_fraction: f32,
    pub respawn_delay: f32,
    pub respawn_invincibility: f32,
    pub battle_extra_lives: u32,

    // Round
    /// Classic and Solo only; Battle has no timer
    pub time_limit: f32,
    pub countdown: f32,

    // Holes and movement
    pub start_radius: f32,
    /// Growth is clamped so the radius never exceeds this
    pub max_radius: f32,
    pub move_speed: f32,
    pub dash_cooldown: f32,
    pub dash_duration: f32,
    pub dash_speed_multiplier: f32,

    // World
    pub world_width: f32,
    pub world_height: f32,
    pub cell_size: f32,
    pub spawn_clearance: f32,
    pub spawn_attempts: u32,

    pub bots: BotTuning,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            mode: GameMode::Classic,
            bot_count: round::BOT_COUNT,
            seed: 0x5EED,
            tick_rate: tick::TICK_RATE,
            k_fit: capture::K_FIT,
            k_capture: capture::K_CAPTURE,
            k_value: capture::K_VALUE,
            growth_multiplier: capture::GROWTH_MULTIPLIER,
            fall_duration: capture::FALL_DURATION,
            invincible_can_capture: true,
            elimination_margin: combat::ELIMINATION_MARGIN,
            elimination_bonus: combat::ELIMINATION_BONUS,
            absorb_fraction: combat::ABSORB_FRACTION,
            respawn_delay: combat::RESPAWN_DELAY,
            respawn_invincibility: combat::RESPAWN_INVINCIBILITY,
            battle_extra_lives: combat::BATTLE_EXTRA_LIVES,
            time_limit: round::TIME_LIMIT,
            countdown: round::COUNTDOWN,
            start_radius: hole::START_RADIUS,
            max_radius: hole::MAX_RADIUS,
            move_speed: hole::MOVE_SPEED,
            dash_cooldown: hole::DASH_COOLDOWN,
            dash_duration: hole::DASH_DURATION,
            dash_speed_multiplier: hole::DASH_SPEED_MULTIPLIER,
            world_width: world::WIDTH,
            world_height: world::HEIGHT,
            cell_size: world::CELL_SIZE,
            spawn_clearance: spawn::CLEARANCE,
            spawn_attempts: spawn::MAX_ATTEMPTS,
            bots: BotTuning::default(),
        }
    }
}

impl SimConfig {
    /// Load config from `HOLE_*` environment variables or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        env_override("HOLE_MODE", &mut config.mode);
        env_override("HOLE_BOT_COUNT", &mut config.bot_count);
        env_override("HOLE_SEED", &mut config.seed);
        env_override("HOLE_TICK_RATE", &mut config.tick_rate);
        env_override("HOLE_K_FIT", &mut config.k_fit);
        env_override("HOLE_K_CAPTURE", &mut config.k_capture);
        env_override("HOLE_K_VALUE", &mut config.k_value);
        env_override("HOLE_GROWTH_MULTIPLIER", &mut config.growth_multiplier);
        env_override("HOLE_ELIMINATION_MARGIN", &mut config.elimination_margin);
        env_override("HOLE_ABSORB_FRACTION", &mut config.absorb_fraction);
        env_override("HOLE_TIME_LIMIT", &mut config.time_limit);
        env_override("HOLE_COUNTDOWN", &mut config.countdown);
        env_override("HOLE_RESPAWN_DELAY", &mut config.respawn_delay);
        env_override("HOLE_RESPAWN_INVINCIBILITY", &mut config.respawn_invincibility);
        env_override("HOLE_BATTLE_EXTRA_LIVES", &mut config.battle_extra_lives);
        env_override("HOLE_WORLD_WIDTH", &mut config.world_width);
        env_override("HOLE_WORLD_HEIGHT", &mut config.world_height);
        env_override("HOLE_MAX_RADIUS", &mut config.max_radius);

        // Cells follow the largest capture zone unless set explicitly
        config.cell_size = config.max_radius * config.k_capture;
        env_override("HOLE_CELL_SIZE", &mut config.cell_size);

        config
    }

    /// Validate configuration before a round may start
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("k_fit", self.k_fit),
            ("k_capture", self.k_capture),
            ("k_value", self.k_value),
            ("growth_multiplier", self.growth_multiplier),
            ("fall_duration", self.fall_duration),
            ("start_radius", self.start_radius),
            ("max_radius", self.max_radius),
            ("move_speed", self.move_speed),
            ("world_width", self.world_width),
            ("world_height", self.world_height),
            ("cell_size", self.cell_size),
        ];
        for (field, value) in positive {
            // Written as !(v > 0) so NaN is rejected too
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::NotPositive { field, value });
            }
        }

        let non_negative = [
            ("elimination_margin", self.elimination_margin),
            ("elimination_bonus", self.elimination_bonus),
            ("time_limit", self.time_limit),
            ("countdown", self.countdown),
            ("respawn_delay", self.respawn_delay),
            ("respawn_invincibility", self.respawn_invincibility),
            ("dash_cooldown", self.dash_cooldown),
            ("dash_duration", self.dash_duration),
            ("dash_speed_multiplier", self.dash_speed_multiplier),
            ("spawn_clearance", self.spawn_clearance),
            ("bots.vision_radius", self.bots.vision_radius),
            ("bots.threat_radius", self.bots.threat_radius),
            ("bots.flee_margin", self.bots.flee_margin),
            ("bots.perturbation", self.bots.perturbation),
            ("bots.avoid_buffer", self.bots.avoid_buffer),
            ("bots.wander_turn", self.bots.wander_turn),
        ];
        for (field, value) in non_negative {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(ConfigError::Negative { field, value });
            }
        }

        if self.start_radius > self.max_radius {
            return Err(ConfigError::StartAboveMaxRadius {
                start: self.start_radius,
                max: self.max_radius,
            });
        }
        if !(0.0..=1.0).contains(&self.absorb_fraction) {
            return Err(ConfigError::AbsorbFractionOutOfRange(self.absorb_fraction));
        }
        if self.tick_rate == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if self.spawn_attempts == 0 {
            return Err(ConfigError::ZeroSpawnAttempts);
        }
        if self.bot_count > round::MAX_BOTS {
            return Err(ConfigError::TooManyBots {
                count: self.bot_count,
                max: round::MAX_BOTS,
            });
        }
        Ok(())
    }

    /// Fixed delta time per tick in seconds
    #[inline]
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    /// Round timer, if the mode has one
    pub fn round_time_limit(&self) -> Option<f32> {
        match self.mode {
            GameMode::Classic | GameMode::Solo => Some(self.time_limit),
            GameMode::Battle => None,
        }
    }
}

/// Settings for the headless runner binary
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Pace ticks against the wall clock instead of running flat out
    pub realtime: bool,
    /// JSON file with the initial object list; a scattered fixture is used when unset
    pub objects_path: Option<String>,
    /// Object count for the scattered fixture
    pub fixture_objects: usize,
    /// Port for the Prometheus endpoint; disabled when unset
    pub metrics_port: Option<u16>,
    /// Seconds of simulated time between status log lines
    pub status_interval: f32,
    /// Write the final snapshot as JSON here
    pub snapshot_out: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            realtime: false,
            objects_path: None,
            fixture_objects: 1500,
            metrics_port: None,
            status_interval: 10.0,
            snapshot_out: None,
        }
    }
}

impl RunnerConfig {
    /// Load runner settings from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        env_override("RUNNER_REALTIME", &mut config.realtime);
        env_override("RUNNER_FIXTURE_OBJECTS", &mut config.fixture_objects);
        env_override("RUNNER_STATUS_INTERVAL", &mut config.status_interval);

        if let Ok(path) = std::env::var("OBJECTS_PATH") {
            config.objects_path = Some(path);
        }
        if let Ok(path) = std::env::var("SNAPSHOT_OUT") {
            config.snapshot_out = Some(path);
        }
        if let Ok(port) = std::env::var("METRICS_PORT") {
            match port.parse::<u16>() {
                Ok(parsed) if parsed > 0 => config.metrics_port = Some(parsed),
                _ => tracing::warn!("Invalid METRICS_PORT '{}', metrics endpoint disabled", port),
            }
        }
        if !(config.status_interval > 0.0) {
            tracing::warn!("RUNNER_STATUS_INTERVAL must be > 0, using default");
            config.status_interval = Self::default().status_interval;
        }

        config
    }
}

/// Overwrite `target` with the parsed env var, keeping the default on parse failure
fn env_override<T: FromStr>(name: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(name) {
        match raw.trim().parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!("Invalid {} '{}', using default", name, raw),
        }
    }
}

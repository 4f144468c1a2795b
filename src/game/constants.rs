//! Default tunables, grouped by the system that reads them.
//!
//! These are only defaults: every value a round uses is copied into
//! `SimConfig` at round start and read from there.

use std::f32::consts::PI;

/// Tick timing
pub mod tick {
    /// Simulation tick rate in Hz
    pub const TICK_RATE: u32 = 60;
    /// Delta time per tick in seconds
    pub const DT: f32 = 1.0 / TICK_RATE as f32;
}

/// Capture engine defaults
pub mod capture {
    /// Object fits when `S <= R * K_FIT`
    pub const K_FIT: f32 = 0.92;
    /// Capture zone is `R * K_CAPTURE` around the hole center
    pub const K_CAPTURE: f32 = 1.05;
    /// Object value is `K_VALUE * S^2` (area units)
    pub const K_VALUE: f32 = 0.1;
    pub const GROWTH_MULTIPLIER: f32 = 1.0;
    /// Seconds an object spends Falling before it is Consumed
    pub const FALL_DURATION: f32 = 0.4;
}

/// Hole-vs-hole combat defaults
pub mod combat {
    /// Attacker needs `R_A > R_B * (1 + ELIMINATION_MARGIN)`
    pub const ELIMINATION_MARGIN: f32 = 0.20;
    /// Score awarded per elimination
    pub const ELIMINATION_BONUS: f32 = 50.0;
    /// Fraction of the defender's area absorbed by the attacker
    pub const ABSORB_FRACTION: f32 = 0.5;
    pub const RESPAWN_DELAY: f32 = 3.0;
    pub const RESPAWN_INVINCIBILITY: f32 = 1.0;
    /// Extra lives per hole in Battle mode
    pub const BATTLE_EXTRA_LIVES: u32 = 0;
}

/// Hole body and movement
pub mod hole {
    pub const START_RADIUS: f32 = 25.0;
    /// Growth stops here
    pub const MAX_RADIUS: f32 = 200.0;
    /// Base movement speed in units/second
    pub const MOVE_SPEED: f32 = 200.0;
    /// Radius at which the size slowdown reaches 1.0 of its scale
    pub const SPEED_REFERENCE_RADIUS: f32 = 50.0;
    /// Cap on `R / SPEED_REFERENCE_RADIUS` in the slowdown term
    pub const SPEED_PENALTY_CAP: f32 = 1.5;
    pub const SPEED_PENALTY_SCALE: f32 = 0.3;
    pub const DASH_COOLDOWN: f32 = 3.0;
    pub const DASH_DURATION: f32 = 0.3;
    pub const DASH_SPEED_MULTIPLIER: f32 = 2.5;
}

/// Round and mode defaults
pub mod round {
    /// Classic / Solo round length in seconds
    pub const TIME_LIMIT: f32 = 120.0;
    pub const COUNTDOWN: f32 = 3.0;
    pub const BOT_COUNT: usize = 7;
    pub const MAX_BOTS: usize = 64;
}

/// World layout
pub mod world {
    pub const WIDTH: f32 = 2000.0;
    pub const HEIGHT: f32 = 2000.0;
    /// Spatial index cell size: the capture zone radius of a hole at
    /// maximum size, so zone queries stay within a 3x3 block of cells
    pub const CELL_SIZE: f32 = super::hole::MAX_RADIUS * super::capture::K_CAPTURE;
}

/// Spawn placement
pub mod spawn {
    /// Minimum distance from any Alive hole for a spawn point to be accepted
    pub const CLEARANCE: f32 = 150.0;
    /// Candidate points tried before falling back to the best seen
    pub const MAX_ATTEMPTS: u32 = 30;
}

/// Bot controller tuning
pub mod bot {
    /// Rivals further than this are invisible to a bot
    pub const VISION_RADIUS: f32 = 300.0;
    /// Larger rivals inside this radius trigger fleeing
    pub const THREAT_RADIUS: f32 = 200.0;
    /// Rival counts as a threat when `R_rival > R_self * (1 + FLEE_MARGIN)`
    pub const FLEE_MARGIN: f32 = 0.30;
    /// Max per-tick random rotation applied to the steering direction (radians)
    pub const PERTURBATION: f32 = 0.15;
    /// Surface distance at which walls and blockers start pushing a bot away
    pub const AVOID_BUFFER: f32 = 40.0;
    /// Max wander heading change per tick (radians)
    pub const WANDER_TURN: f32 = 0.2;
    /// Farming search radius is `max(R * FARM_RADIUS_FACTOR, FARM_RADIUS_MIN)`
    pub const FARM_RADIUS_FACTOR: f32 = 4.0;
    pub const FARM_RADIUS_MIN: f32 = 150.0;
    /// Neighborhood radius around the farming anchor is `max(R * CLUSTER_RADIUS_FACTOR, CLUSTER_RADIUS_MIN)`
    pub const CLUSTER_RADIUS_FACTOR: f32 = 2.0;
    pub const CLUSTER_RADIUS_MIN: f32 = 60.0;

    pub const NAMES: [&str; 16] = [
        "Shadow", "Nova", "Blaze", "Vortex", "Echo", "Titan", "Pixel", "Comet",
        "Rogue", "Zephyr", "Ember", "Frost", "Onyx", "Raven", "Spark", "Drift",
    ];
}

/// Radius of a hole with the given area
#[inline]
pub fn area_to_radius(area: f32) -> f32 {
    (area / PI).sqrt()
}

/// Area of a circle with the given radius
#[inline]
pub fn radius_to_area(radius: f32) -> f32 {
    PI * radius * radius
}

/// Movement speed after the size slowdown: larger holes are slower
#[inline]
pub fn speed_for_radius(base_speed: f32, radius: f32) -> f32 {
    let penalty = (radius / hole::SPEED_REFERENCE_RADIUS).min(hole::SPEED_PENALTY_CAP);
    base_speed / (1.0 + penalty * hole::SPEED_PENALTY_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_radius_roundtrip() {
        for r in [1.0_f32, 9.0, 25.0, 123.4, 800.0] {
            let back = area_to_radius(radius_to_area(r));
            assert!((back - r).abs() < r * 1e-6, "radius {} came back as {}", r, back);
        }
    }

    #[test]
    fn test_start_area() {
        let area = radius_to_area(hole::START_RADIUS);
        assert!((area - PI * 625.0).abs() < 1e-3);
    }

    #[test]
    fn test_tick_rate() {
        assert_eq!(tick::TICK_RATE, 60);
        assert!((tick::DT - 1.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_inside_capture_zone() {
        // Anything that fits must be able to get close enough to be captured
        assert!(capture::K_FIT < capture::K_CAPTURE);
    }

    #[test]
    fn test_cell_covers_largest_capture_zone() {
        assert!(hole::START_RADIUS < hole::MAX_RADIUS);
        assert!((world::CELL_SIZE - 210.0).abs() < 1e-3);
        assert!(world::CELL_SIZE >= hole::MAX_RADIUS * capture::K_CAPTURE);
    }

    #[test]
    fn test_threat_inside_vision() {
        assert!(bot::THREAT_RADIUS <= bot::VISION_RADIUS);
    }

    #[test]
    fn test_speed_at_zero_radius_is_base() {
        assert!((speed_for_radius(200.0, 0.0) - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_speed_monotonically_decreasing() {
        let mut prev = f32::MAX;
        for r in (0..200).map(|i| i as f32) {
            let s = speed_for_radius(hole::MOVE_SPEED, r);
            assert!(s <= prev, "speed increased at radius {}: {} > {}", r, s, prev);
            prev = s;
        }
    }

    #[test]
    fn test_speed_penalty_capped() {
        // Penalty saturates at 1.5 * 0.3 = 0.45
        let floor = hole::MOVE_SPEED / 1.45;
        assert!((speed_for_radius(hole::MOVE_SPEED, 75.0) - floor).abs() < 1e-3);
        assert!((speed_for_radius(hole::MOVE_SPEED, 5000.0) - floor).abs() < 1e-3);
    }
}

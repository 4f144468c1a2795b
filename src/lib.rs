//! Hole Royale simulation core
//!
//! Fixed-tick simulation of a "hole" royale round: holes grow by
//! swallowing city objects and eliminate smaller rival holes.
//!
//! # Features
//!
//! - `parallel_ai` - Evaluate bots on the rayon thread pool (enabled by default)

pub mod config;
pub mod util;
pub mod game;
pub mod metrics;

pub use config::{ConfigError, SimConfig};
pub use game::game_loop::{GameLoop, SimError};
pub use game::mode::GameMode;

//! Mode Controller
//!
//! Owns the round clock and decides when and how a round ends. A round
//! goes `Countdown -> Playing -> RoundEnd` exactly once; a new round needs
//! a new controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::config::SimConfig;
use crate::game::match_result::{Leaderboard, RoundEndReason};
use crate::game::state::{EntityStore, HoleId};

/// Ratio of captured to total value that counts as "everything consumed"
const FULLY_CONSUMED: f64 = 1.0 - 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameMode {
    /// Timed round, respawns on
    Classic,
    /// Last hole standing
    Battle,
    /// Single hole against the city
    Solo,
}

impl GameMode {
    pub fn has_bots(self) -> bool {
        !matches!(self, GameMode::Solo)
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GameMode::Classic => "classic",
            GameMode::Battle => "battle",
            GameMode::Solo => "solo",
        };
        f.write_str(name)
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(GameMode::Classic),
            "battle" => Ok(GameMode::Battle),
            "solo" => Ok(GameMode::Solo),
            other => Err(format!("unknown game mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    Countdown,
    Playing,
    RoundEnd,
}

/// How a round finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundEnd {
    pub winner: Option<HoleId>,
    pub reason: RoundEndReason,
}

/// Everything the Mode Controller tracks about the current round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundState {
    pub mode: GameMode,
    pub phase: RoundPhase,
    pub countdown_remaining: f32,
    pub elapsed_time: f32,
    /// None for Battle
    pub time_limit: Option<f32>,
    pub leaderboard: Leaderboard,
    /// 0..=100
    pub percent_city_consumed: f32,
    pub alive_count: usize,
    pub captured_value: f64,
    pub total_value: f64,
    pub winner: Option<HoleId>,
    pub end_reason: Option<RoundEndReason>,
}

impl RoundState {
    pub fn new(mode: GameMode, countdown: f32, time_limit: Option<f32>, total_value: f64) -> Self {
        let phase = if countdown > 0.0 {
            RoundPhase::Countdown
        } else {
            RoundPhase::Playing
        };
        Self {
            mode,
            phase,
            countdown_remaining: countdown.max(0.0),
            elapsed_time: 0.0,
            time_limit,
            leaderboard: Leaderboard::default(),
            percent_city_consumed: 0.0,
            alive_count: 0,
            captured_value: 0.0,
            total_value,
            winner: None,
            end_reason: None,
        }
    }

    pub fn remaining_time(&self) -> Option<f32> {
        self.time_limit.map(|limit| (limit - self.elapsed_time).max(0.0))
    }

    fn timer_expired(&self) -> bool {
        self.time_limit.is_some_and(|limit| self.elapsed_time >= limit)
    }
}

/// Round state machine for one round
#[derive(Debug, Clone)]
pub struct ModeController {
    state: RoundState,
    player_id: HoleId,
}

impl ModeController {
    pub fn new(config: &SimConfig, total_value: f64, player_id: HoleId) -> Self {
        Self {
            state: RoundState::new(config.mode, config.countdown, config.round_time_limit(), total_value),
            player_id,
        }
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn phase(&self) -> RoundPhase {
        self.state.phase
    }

    pub fn is_playing(&self) -> bool {
        self.state.phase == RoundPhase::Playing
    }

    pub fn is_over(&self) -> bool {
        self.state.phase == RoundPhase::RoundEnd
    }

    /// Advance the round clock; returns true while gameplay should run
    pub fn advance_clock(&mut self, dt: f32) -> bool {
        match self.state.phase {
            RoundPhase::Countdown => {
                self.state.countdown_remaining -= dt;
                if self.state.countdown_remaining <= 0.0 {
                    self.state.countdown_remaining = 0.0;
                    self.state.phase = RoundPhase::Playing;
                    info!("{} round started", self.state.mode);
                }
                // The tick that ends the countdown is still frozen
                false
            }
            RoundPhase::Playing => {
                self.state.elapsed_time += dt;
                true
            }
            RoundPhase::RoundEnd => false,
        }
    }

    /// Count value of an object that started falling toward percent consumed
    pub fn record_captured(&mut self, value: f32) {
        self.state.captured_value += value as f64;
        if self.state.total_value > 0.0 {
            let ratio = (self.state.captured_value / self.state.total_value).min(1.0);
            self.state.percent_city_consumed = (ratio * 100.0) as f32;
        }
    }

    /// Re-rank the leaderboard and recount holes still in the round
    pub fn refresh(&mut self, store: &EntityStore) {
        self.state.leaderboard = Leaderboard::rank_alive(store, &self.state.leaderboard);
        self.state.alive_count = match self.state.mode {
            GameMode::Battle => store.in_round_count(),
            GameMode::Classic | GameMode::Solo => store.alive_count(),
        };
    }

    /// Refresh the leaderboard and check the mode's end condition
    ///
    /// Returns the outcome on the tick the round ends, `None` otherwise.
    pub fn evaluate(&mut self, store: &EntityStore) -> Option<RoundEnd> {
        if self.state.phase != RoundPhase::Playing {
            return None;
        }
        self.refresh(store);

        let end = match self.state.mode {
            GameMode::Classic => self.state.timer_expired().then(|| RoundEnd {
                winner: self.state.leaderboard.leader().map(|e| e.hole_id),
                reason: RoundEndReason::TimeLimit,
            }),
            GameMode::Battle => match self.state.alive_count {
                0 => Some(RoundEnd {
                    winner: None,
                    reason: RoundEndReason::NoSurvivors,
                }),
                1 => Some(RoundEnd {
                    winner: store.holes().iter().find(|h| h.in_round()).map(|h| h.id),
                    reason: RoundEndReason::LastHoleStanding,
                }),
                _ => None,
            },
            GameMode::Solo => {
                if self.city_consumed(store) {
                    Some(RoundEnd {
                        winner: Some(self.player_id),
                        reason: RoundEndReason::AllConsumed,
                    })
                } else {
                    self.state.timer_expired().then_some(RoundEnd {
                        winner: None,
                        reason: RoundEndReason::TimeLimit,
                    })
                }
            }
        };

        if let Some(end) = end {
            self.state.phase = RoundPhase::RoundEnd;
            self.state.winner = end.winner;
            self.state.end_reason = Some(end.reason);
        }
        end
    }

    fn city_consumed(&self, store: &EntityStore) -> bool {
        if store.object_count() == 0 {
            return false;
        }
        let by_value = self.state.total_value > 0.0
            && self.state.captured_value >= self.state.total_value * FULLY_CONSUMED;
        by_value || store.objects().iter().all(|o| !o.is_idle())
    }
}

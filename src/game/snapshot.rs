//! Read-only view of the simulation published after each tick
//!
//! Renderers, UI and audio consume this; they never touch the store.

use serde::{Deserialize, Serialize};

use crate::game::events::SimEvent;
use crate::game::match_result::LeaderboardEntry;
use crate::game::mode::{GameMode, RoundPhase, RoundState};
use crate::game::state::{CaptureState, EntityStore, Hole, HoleId, LifeState, ObjectId, WorldObject};
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleView {
    pub id: HoleId,
    pub name: String,
    pub position: Vec2,
    pub radius: f32,
    /// Opaque to the simulation
    pub skin_key: u32,
    pub life: LifeState,
    pub is_bot: bool,
    pub invincible: bool,
    /// Seconds of respawn protection left
    pub invincibility_remaining: f32,
    pub dashing: bool,
    pub score: f32,
}

impl From<&Hole> for HoleView {
    fn from(hole: &Hole) -> Self {
        Self {
            id: hole.id,
            name: hole.name.clone(),
            position: hole.position,
            radius: hole.radius(),
            skin_key: hole.skin_key,
            life: hole.life,
            is_bot: hole.is_bot,
            invincible: hole.is_invincible(),
            invincibility_remaining: hole.invincibility_remaining,
            dashing: hole.is_dashing(),
            score: hole.score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectView {
    pub id: ObjectId,
    pub position: Vec2,
    pub size: f32,
    pub capture: CaptureState,
}

impl From<&WorldObject> for ObjectView {
    fn from(object: &WorldObject) -> Self {
        Self {
            id: object.id,
            position: object.position,
            size: object.size,
            capture: object.capture,
        }
    }
}

/// Complete per-tick snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub tick: u64,
    pub mode: GameMode,
    pub phase: RoundPhase,
    pub elapsed_time: f32,
    pub remaining_time: Option<f32>,
    pub countdown_remaining: f32,
    /// Ordered by id
    pub holes: Vec<HoleView>,
    /// Ordered by id; consumed objects included
    pub objects: Vec<ObjectView>,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub percent_city_consumed: f32,
    pub alive_count: usize,
    pub winner: Option<HoleId>,
    /// Events of the tick this snapshot was taken after
    pub events: Vec<SimEvent>,
}

impl SimSnapshot {
    pub fn capture(tick: u64, store: &EntityStore, round: &RoundState, events: &[SimEvent]) -> Self {
        Self {
            tick,
            mode: round.mode,
            phase: round.phase,
            elapsed_time: round.elapsed_time,
            remaining_time: round.remaining_time(),
            countdown_remaining: round.countdown_remaining,
            holes: store.holes().iter().map(HoleView::from).collect(),
            objects: store.objects().iter().map(ObjectView::from).collect(),
            leaderboard: round.leaderboard.entries().to_vec(),
            percent_city_consumed: round.percent_city_consumed,
            alive_count: round.alive_count,
            winner: round.winner,
            events: events.to_vec(),
        }
    }

    pub fn hole(&self, id: HoleId) -> Option<&HoleView> {
        self.holes.get(id.index()).filter(|h| h.id == id)
    }

    pub fn object(&self, id: ObjectId) -> Option<&ObjectView> {
        self.objects.get(id.index()).filter(|o| o.id == id)
    }

    /// Objects still waiting to be captured
    pub fn remaining_objects(&self) -> usize {
        self.objects
            .iter()
            .filter(|o| o.capture == CaptureState::Idle)
            .count()
    }
}

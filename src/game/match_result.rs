//! Leaderboard and round result
//!
//! Ranks holes during the round and computes the final result once the
//! Mode Controller ends it.

use serde::{Deserialize, Serialize};

use crate::game::mode::RoundState;
use crate::game::state::{EntityStore, HoleId, LifeState};

/// One row of the live leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub hole_id: HoleId,
    pub name: String,
    pub radius: f32,
    pub area: f32,
    pub score: f32,
    /// +1 moved up, -1 moved down, 0 unchanged (or new) since last ranking
    pub rank_change: i32,
}

/// Alive holes ordered by area, largest first, ties to the lowest id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    /// Rank every alive hole, comparing positions against `previous`
    pub fn rank_alive(store: &EntityStore, previous: &Leaderboard) -> Self {
        let mut alive: Vec<_> = store.alive_holes().collect();
        alive.sort_by(|a, b| b.area().total_cmp(&a.area()).then_with(|| a.id.cmp(&b.id)));

        let entries = alive
            .into_iter()
            .enumerate()
            .map(|(i, hole)| {
                let rank = (i + 1) as u32;
                let rank_change = match previous.rank_of(hole.id) {
                    Some(old) if old > rank => 1,
                    Some(old) if old < rank => -1,
                    _ => 0,
                };
                LeaderboardEntry {
                    rank,
                    hole_id: hole.id,
                    name: hole.name.clone(),
                    radius: hole.radius(),
                    area: hole.area(),
                    score: hole.score,
                    rank_change,
                }
            })
            .collect();

        Self { entries }
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    /// Largest alive hole, if any
    pub fn leader(&self) -> Option<&LeaderboardEntry> {
        self.entries.first()
    }

    pub fn rank_of(&self, hole_id: HoleId) -> Option<u32> {
        self.entries.iter().find(|e| e.hole_id == hole_id).map(|e| e.rank)
    }

    pub fn top(&self, n: usize) -> &[LeaderboardEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reason why the round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundEndReason {
    /// Classic or Solo timer expired
    TimeLimit,
    /// Battle: one hole left in the round
    LastHoleStanding,
    /// Solo: every object captured
    AllConsumed,
    /// Battle: the last holes went out together (draw)
    NoSurvivors,
}

/// Final standing of one hole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleRanking {
    pub hole_id: HoleId,
    pub name: String,
    pub rank: u32,
    pub final_area: f32,
    pub score: f32,
    pub objects_captured: u32,
    pub eliminations: u32,
    pub deaths: u32,
    pub survived: bool,
    pub is_bot: bool,
}

/// Round result information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub winner_id: Option<HoleId>,
    pub winner_name: Option<String>,
    pub rankings: Vec<HoleRanking>,
    pub duration: f32,
    pub total_eliminations: u32,
    pub percent_city_consumed: f32,
    pub end_reason: Option<RoundEndReason>,
}

/// Determine the round result from the final state
///
/// The winner is whatever the Mode Controller declared; rankings put the
/// winner first, then survivors by area, then everyone else by score.
pub fn determine_result(store: &EntityStore, round: &RoundState) -> RoundResult {
    let mut rankings: Vec<HoleRanking> = store
        .holes()
        .iter()
        .map(|h| HoleRanking {
            hole_id: h.id,
            name: h.name.clone(),
            rank: 0,
            final_area: h.area(),
            score: h.score,
            objects_captured: h.objects_captured,
            eliminations: h.eliminations,
            deaths: h.deaths,
            survived: h.life != LifeState::Eliminated,
            is_bot: h.is_bot,
        })
        .collect();

    let winner = round.winner;
    rankings.sort_by(|a, b| {
        (Some(b.hole_id) == winner)
            .cmp(&(Some(a.hole_id) == winner))
            .then_with(|| b.survived.cmp(&a.survived))
            .then_with(|| b.final_area.total_cmp(&a.final_area))
            .then_with(|| b.score.total_cmp(&a.score))
            .then_with(|| a.hole_id.cmp(&b.hole_id))
    });

    for (i, ranking) in rankings.iter_mut().enumerate() {
        ranking.rank = (i + 1) as u32;
    }

    let total_eliminations = rankings.iter().map(|r| r.eliminations).sum();
    let winner_name = winner.and_then(|id| store.hole(id)).map(|h| h.name.clone());

    RoundResult {
        winner_id: winner,
        winner_name,
        rankings,
        duration: round.elapsed_time,
        total_eliminations,
        percent_city_consumed: round.percent_city_consumed,
        end_reason: round.end_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::vec2::Vec2;

    fn store_with(radii: &[f32]) -> EntityStore {
        let mut store = EntityStore::new();
        for (i, r) in radii.iter().enumerate() {
            store.add_hole(format!("H{}", i), i > 0, Vec2::new(100.0 * i as f32, 0.0), *r);
        }
        store
    }

    #[test]
    fn test_leaderboard_orders_by_area() {
        let store = store_with(&[10.0, 30.0, 20.0]);
        let board = Leaderboard::rank_alive(&store, &Leaderboard::default());

        let ids: Vec<u32> = board.entries().iter().map(|e| e.hole_id.0).collect();
        assert_eq!(ids, vec![1, 2, 0]);
        assert_eq!(board.leader().map(|e| e.rank), Some(1));
        assert_eq!(board.rank_of(HoleId(0)), Some(3));
    }

    #[test]
    fn test_leaderboard_tie_goes_to_lowest_id() {
        let store = store_with(&[20.0, 20.0, 20.0]);
        let board = Leaderboard::rank_alive(&store, &Leaderboard::default());
        let ids: Vec<u32> = board.entries().iter().map(|e| e.hole_id.0).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_leaderboard_skips_dead_holes() {
        let mut store = store_with(&[10.0, 30.0]);
        if let Some(h) = store.hole_mut(HoleId(1)) {
            h.life = LifeState::RespawnPending { timer: 1.0 };
        }
        let board = Leaderboard::rank_alive(&store, &Leaderboard::default());
        assert_eq!(board.len(), 1);
        assert_eq!(board.rank_of(HoleId(1)), None);
    }

    #[test]
    fn test_rank_change_indicator() {
        let mut store = store_with(&[10.0, 20.0]);
        let first = Leaderboard::rank_alive(&store, &Leaderboard::default());
        assert!(first.entries().iter().all(|e| e.rank_change == 0));

        if let Some(h) = store.hole_mut(HoleId(0)) {
            h.grow(10_000.0, 200.0);
        }
        let second = Leaderboard::rank_alive(&store, &first);
        let change = |id| second.entries().iter().find(|e| e.hole_id == HoleId(id)).map(|e| e.rank_change);
        assert_eq!(change(0), Some(1));
        assert_eq!(change(1), Some(-1));
    }

    #[test]
    fn test_top_clamps_to_len() {
        let store = store_with(&[10.0, 20.0]);
        let board = Leaderboard::rank_alive(&store, &Leaderboard::default());
        assert_eq!(board.top(1).len(), 1);
        assert_eq!(board.top(10).len(), 2);
    }

    #[test]
    fn test_determine_result_winner_first() {
        let mut store = store_with(&[10.0, 30.0, 20.0]);
        if let Some(h) = store.hole_mut(HoleId(1)) {
            h.eliminations = 2;
        }
        if let Some(h) = store.hole_mut(HoleId(2)) {
            h.life = LifeState::Eliminated;
        }

        let round = RoundState {
            winner: Some(HoleId(0)),
            elapsed_time: 42.0,
            end_reason: Some(RoundEndReason::LastHoleStanding),
            ..RoundState::new(crate::game::mode::GameMode::Battle, 0.0, None, 0.0)
        };
        let result = determine_result(&store, &round);

        assert_eq!(result.winner_id, Some(HoleId(0)));
        assert_eq!(result.winner_name.as_deref(), Some("H0"));
        let order: Vec<u32> = result.rankings.iter().map(|r| r.hole_id.0).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert!(!result.rankings[2].survived);
        assert_eq!(result.total_eliminations, 2);
        assert_eq!(result.duration, 42.0);
        assert_eq!(result.end_reason, Some(RoundEndReason::LastHoleStanding));
    }

    #[test]
    fn test_determine_result_without_winner() {
        let store = store_with(&[10.0, 30.0]);
        let round = RoundState::new(crate::game::mode::GameMode::Solo, 0.0, Some(120.0), 0.0);
        let result = determine_result(&store, &round);
        assert_eq!(result.winner_id, None);
        assert_eq!(result.winner_name, None);
        assert_eq!(result.rankings[0].hole_id, HoleId(1));
    }
}

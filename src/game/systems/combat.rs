//! Combat resolver and respawn lifecycle
//!
//! A hole eliminates a rival whose center lies inside its capture zone
//! when it is larger by the elimination margin. All pairs are evaluated
//! against start-of-pass radii, then applied largest attacker first.

use bitvec::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::config::SimConfig;
use crate::game::events::{EventQueue, SimEvent};
use crate::game::mode::GameMode;
use crate::game::spatial::{EntityRef, SpatialIndex};
use crate::game::state::{EntityStore, HoleId, LifeState};
use crate::game::systems::capture;
use crate::util::vec2::Vec2;

/// Attacker/defender pair that satisfied the elimination rule this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Engagement {
    pub attacker: HoleId,
    pub defender: HoleId,
    attacker_radius: f32,
    distance: f32,
}

/// Does a hole of radius `attacker` beat one of radius `defender`?
#[inline]
pub fn outsizes(attacker: f32, defender: f32, margin: f32) -> bool {
    attacker > defender * (1.0 + margin)
}

/// Find every qualifying pair, with mutual pairs already settled
pub fn find_engagements(store: &EntityStore, index: &SpatialIndex, config: &SimConfig) -> Vec<Engagement> {
    let mut engagements = Vec::new();

    for attacker in store.alive_holes() {
        let radius = attacker.radius();
        let zone = radius * config.k_capture;
        for entry in &index.query_holes(attacker.position, zone) {
            let EntityRef::Hole(defender_id) = entry.id else {
                continue;
            };
            if defender_id == attacker.id {
                continue;
            }
            let Some(defender) = store.hole(defender_id) else {
                continue;
            };
            if !defender.is_alive() || defender.is_invincible() {
                continue;
            }
            if outsizes(radius, defender.radius(), config.elimination_margin) {
                engagements.push(Engagement {
                    attacker: attacker.id,
                    defender: defender_id,
                    attacker_radius: radius,
                    distance: attacker.position.distance_to(defender.position),
                });
            }
        }
    }

    settle_mutual(&mut engagements, store);
    engagements
}

/// When A and B could both eliminate each other, keep only the larger
/// hole's engagement; drop both on an exact radius tie.
fn settle_mutual(engagements: &mut Vec<Engagement>, store: &EntityStore) {
    let radius_of = |id: HoleId| store.hole(id).map(|h| h.radius()).unwrap_or(0.0);
    let pairs: Vec<(HoleId, HoleId)> = engagements.iter().map(|e| (e.attacker, e.defender)).collect();

    engagements.retain(|e| {
        let reciprocal = pairs.contains(&(e.defender, e.attacker));
        if !reciprocal {
            return true;
        }
        radius_of(e.attacker) > radius_of(e.defender)
    });
}

/// Apply eliminations for this tick; returns the eliminated holes
pub fn resolve(
    store: &mut EntityStore,
    index: &mut SpatialIndex,
    config: &SimConfig,
    events: &mut EventQueue,
) -> Vec<HoleId> {
    let mut engagements = find_engagements(store, index, config);
    if engagements.is_empty() {
        return Vec::new();
    }

    engagements.sort_by(|a, b| {
        b.attacker_radius
            .total_cmp(&a.attacker_radius)
            .then_with(|| a.attacker.cmp(&b.attacker))
            .then_with(|| a.distance.total_cmp(&b.distance))
            .then_with(|| a.defender.cmp(&b.defender))
    });

    let mut out: BitVec = bitvec![0; store.hole_count()];
    let mut eliminated = Vec::new();

    for engagement in engagements {
        let (a, d) = (engagement.attacker.index(), engagement.defender.index());
        if out[a] || out[d] {
            continue;
        }
        out.set(d, true);
        eliminate(store, index, config, engagement.attacker, engagement.defender);
        events.push(SimEvent::HoleEliminated {
            attacker_id: engagement.attacker,
            defender_id: engagement.defender,
        });
        eliminated.push(engagement.defender);
    }

    eliminated
}

fn eliminate(
    store: &mut EntityStore,
    index: &mut SpatialIndex,
    config: &SimConfig,
    attacker_id: HoleId,
    defender_id: HoleId,
) {
    let Some(defender) = store.hole_mut(defender_id) else {
        return;
    };
    let defender_area = defender.area();
    defender.deaths += 1;
    defender.velocity = Vec2::ZERO;
    defender.dash_active_remaining = 0.0;
    defender.life = match config.mode {
        GameMode::Classic => LifeState::RespawnPending {
            timer: config.respawn_delay,
        },
        GameMode::Battle if defender.lives_remaining > 0 => {
            defender.lives_remaining -= 1;
            LifeState::RespawnPending {
                timer: config.respawn_delay,
            }
        }
        GameMode::Battle | GameMode::Solo => LifeState::Eliminated,
    };
    defender.reset_size(config.start_radius);
    index.remove(EntityRef::Hole(defender_id));

    capture::release_falling_into(store, index, defender_id);

    if let Some(attacker) = store.hole_mut(attacker_id) {
        attacker.score += config.elimination_bonus;
        attacker.eliminations += 1;
        if config.absorb_fraction > 0.0 {
            attacker.grow(defender_area * config.absorb_fraction, config.max_radius);
        }
        debug!(
            "{} eliminated {} (radius now {:.2})",
            attacker_id,
            defender_id,
            attacker.radius()
        );
    }
}

/// Count down respawn timers and bring holes back when they expire
pub fn tick_respawns(
    store: &mut EntityStore,
    index: &mut SpatialIndex,
    config: &SimConfig,
    rng: &mut ChaCha8Rng,
    events: &mut EventQueue,
) {
    let dt = config.dt();
    for i in 0..store.hole_count() {
        let id = HoleId(i as u32);
        let ready = match store.hole_mut(id) {
            Some(hole) => match hole.life {
                LifeState::RespawnPending { timer } => {
                    let timer = timer - dt;
                    hole.life = LifeState::RespawnPending { timer };
                    timer <= 0.0
                }
                _ => false,
            },
            None => false,
        };
        if !ready {
            continue;
        }

        let position = pick_spawn_point(index, config, rng);
        if let Some(hole) = store.hole_mut(id) {
            hole.life = LifeState::Alive;
            hole.position = position;
            hole.velocity = Vec2::ZERO;
            hole.reset_size(config.start_radius);
            hole.invincibility_remaining = config.respawn_invincibility;
            hole.dash_active_remaining = 0.0;
            hole.dash_cooldown_remaining = 0.0;
            index.insert(EntityRef::Hole(id), position, hole.radius());
            debug!("{} respawned at ({:.0}, {:.0})", id, position.x, position.y);
        }
        events.push(SimEvent::HoleRespawned { id });
    }
}

/// Pick a spawn point away from every Alive hole
///
/// A candidate is accepted when it lies at least `spawn_clearance` beyond
/// the capture zone of every registered hole, however large that hole is.
/// If every attempt is rejected the candidate with the most room wins.
pub fn pick_spawn_point(index: &SpatialIndex, config: &SimConfig, rng: &mut ChaCha8Rng) -> Vec2 {
    let margin = config
        .start_radius
        .min(config.world_width * 0.5)
        .min(config.world_height * 0.5);
    let zone_factor = config.k_capture.max(1.0);
    // Index radii are bodies; zones reach further by at most this much
    let zone_slack = config.max_radius * (zone_factor - 1.0);

    let mut best = Vec2::new(config.world_width * 0.5, config.world_height * 0.5);
    let mut best_clearance = f32::MIN;

    for _ in 0..config.spawn_attempts {
        let candidate = Vec2::new(
            sample_axis(rng, margin, config.world_width - margin),
            sample_axis(rng, margin, config.world_height - margin),
        );

        let mut nearest = f32::MAX;
        index.for_each_overlapping(candidate, config.spawn_clearance + zone_slack, |entry| {
            if let EntityRef::Hole(_) = entry.id {
                let gap = entry.position.distance_to(candidate) - entry.radius * zone_factor;
                nearest = nearest.min(gap);
            }
        });

        if nearest >= config.spawn_clearance {
            return candidate;
        }
        if nearest > best_clearance {
            best_clearance = nearest;
            best = candidate;
        }
    }

    best
}

fn sample_axis(rng: &mut ChaCha8Rng, min: f32, max: f32) -> f32 {
    if max > min {
        rng.gen_range(min..max)
    } else {
        min
    }
}

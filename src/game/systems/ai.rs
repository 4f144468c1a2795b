//! Bot controller
//!
//! Each bot picks a behavior tier every tick and produces the same
//! `PlayerInput` a human would. Evaluation only reads the state committed
//! by the previous tick, so bots can be evaluated in parallel; the outputs
//! are applied afterwards in hole-id order.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
#[cfg(feature = "parallel_ai")]
use rayon::prelude::*;
use smallvec::SmallVec;
use std::f32::consts::TAU;

use crate::config::SimConfig;
use crate::game::constants::bot::{CLUSTER_RADIUS_FACTOR, CLUSTER_RADIUS_MIN, FARM_RADIUS_FACTOR, FARM_RADIUS_MIN};
use crate::game::input_buffer::PlayerInput;
use crate::game::spatial::{EntityRef, SpatialIndex};
use crate::game::state::{EntityStore, Hole, HoleId, ObjectId};
use crate::game::systems::combat::outsizes;
use crate::util::vec2::Vec2;

/// Behavior tier chosen for the current tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotBehavior {
    /// A larger rival is close: run
    Threatened,
    /// Biggest hole around: chase the nearest smaller rival
    Hunting,
    /// Steer into the densest patch of swallowable objects
    Farming,
    /// Nothing in range: drift
    Wandering,
}

/// Read-only view of the committed world state handed to every bot
#[derive(Clone, Copy)]
pub struct WorldView<'a> {
    pub store: &'a EntityStore,
    pub index: &'a SpatialIndex,
    pub config: &'a SimConfig,
    /// Median size of the initial object list
    pub median_object_size: f32,
}

/// Derive a bot's RNG seed from the round seed and its id
pub fn bot_seed(round_seed: u64, hole_id: HoleId) -> u64 {
    // splitmix64 finalizer
    let mut z = round_seed ^ (hole_id.0 as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Per-bot decision state
#[derive(Debug, Clone)]
pub struct BotBrain {
    pub hole_id: HoleId,
    pub seed: u64,
    pub behavior: BotBehavior,
    /// Point the bot steered toward (or away from) last tick
    pub target: Option<Vec2>,
    wander_angle: f32,
    rng: ChaCha8Rng,
}

impl BotBrain {
    pub fn new(hole_id: HoleId, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let wander_angle = rng.gen_range(0.0..TAU);
        Self {
            hole_id,
            seed,
            behavior: BotBehavior::Wandering,
            target: None,
            wander_angle,
            rng,
        }
    }

    /// Choose a tier and produce this tick's input
    pub fn decide(&mut self, view: &WorldView) -> PlayerInput {
        let Some(bot) = view.store.hole(self.hole_id).filter(|h| h.is_alive()) else {
            self.behavior = BotBehavior::Wandering;
            self.target = None;
            return PlayerInput::default();
        };
        let config = view.config;
        let radius = bot.radius();
        let survey = survey_rivals(bot, view);
        let avoid = avoidance(bot, view);

        let (direction, dash) = if let Some(threat) = survey.threat {
            self.behavior = BotBehavior::Threatened;
            self.target = Some(threat.position);
            let away = (bot.position - threat.position).normalize();
            let dash = threat.distance < config.bots.threat_radius * 0.5;
            (away + avoid, dash)
        } else if let Some(prey) = survey
            .prey
            .filter(|_| outsizes(radius, survey.largest_rival, config.elimination_margin))
            .filter(|_| radius * config.k_fit >= view.median_object_size)
        {
            self.behavior = BotBehavior::Hunting;
            self.target = Some(prey.position);
            let chase = (prey.position - bot.position).normalize();
            (chase + avoid * 0.5, prey.distance < radius * 2.0)
        } else if let Some(spot) = farm_target(bot, view) {
            self.behavior = BotBehavior::Farming;
            self.target = Some(spot);
            ((spot - bot.position).normalize() + avoid, false)
        } else {
            self.behavior = BotBehavior::Wandering;
            self.target = None;
            let turn = config.bots.wander_turn;
            self.wander_angle += self.rng.gen_range(-turn..=turn);
            (Vec2::from_angle(self.wander_angle) + avoid, false)
        };

        let mut direction = direction.normalize();
        if self.behavior == BotBehavior::Wandering && !direction.is_zero() {
            // Walls bend the heading for good instead of pushing every tick
            self.wander_angle = direction.angle();
        }

        let jitter = config.bots.perturbation;
        direction = direction.rotate(self.rng.gen_range(-jitter..=jitter));

        PlayerInput {
            direction,
            dash: dash && bot.can_dash(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sighting {
    distance: f32,
    position: Vec2,
    id: HoleId,
}

#[derive(Debug, Default)]
struct Survey {
    /// Nearest larger rival inside the threat radius
    threat: Option<Sighting>,
    /// Nearest rival this bot could eliminate
    prey: Option<Sighting>,
    largest_rival: f32,
}

fn nearer(current: Option<Sighting>, candidate: Sighting) -> Option<Sighting> {
    match current {
        Some(c) if (c.distance, c.id) <= (candidate.distance, candidate.id) => Some(c),
        _ => Some(candidate),
    }
}

fn survey_rivals(bot: &Hole, view: &WorldView) -> Survey {
    let config = view.config;
    let radius = bot.radius();
    let mut survey = Survey::default();

    for entry in &view.index.query_holes(bot.position, config.bots.vision_radius) {
        let EntityRef::Hole(id) = entry.id else {
            continue;
        };
        if id == bot.id {
            continue;
        }
        let Some(rival) = view.store.hole(id).filter(|h| h.is_alive()) else {
            continue;
        };
        let rival_radius = rival.radius();
        let sighting = Sighting {
            distance: bot.position.distance_to(rival.position),
            position: rival.position,
            id,
        };
        survey.largest_rival = survey.largest_rival.max(rival_radius);

        if sighting.distance <= config.bots.threat_radius
            && rival_radius > radius * (1.0 + config.bots.flee_margin)
        {
            survey.threat = nearer(survey.threat, sighting);
        }
        if !rival.is_invincible() && outsizes(radius, rival_radius, config.elimination_margin) {
            survey.prey = nearer(survey.prey, sighting);
        }
    }
    survey
}

/// Push away from world edges and the nearest blocker inside the buffer
fn avoidance(bot: &Hole, view: &WorldView) -> Vec2 {
    let config = view.config;
    let buffer = config.bots.avoid_buffer;
    if buffer <= 0.0 {
        return Vec2::ZERO;
    }
    let radius = bot.radius();
    let p = bot.position;
    let mut push = Vec2::ZERO;

    let edge = |gap: f32| if gap < buffer { 1.0 - gap.max(0.0) / buffer } else { 0.0 };
    push.x += edge(p.x - radius);
    push.x -= edge(config.world_width - radius - p.x);
    push.y += edge(p.y - radius);
    push.y -= edge(config.world_height - radius - p.y);

    let mut nearest: Option<(f32, ObjectId, Vec2)> = None;
    view.index
        .for_each_overlapping(p, radius + buffer, |entry| {
            let EntityRef::Object(id) = entry.id else {
                return;
            };
            let Some(object) = view.store.object(id) else {
                return;
            };
            if !object.blocks(radius, config.k_fit) {
                return;
            }
            let gap = p.distance_to(object.position) - radius - object.size;
            if gap >= buffer {
                return;
            }
            let closer = nearest.map_or(true, |(g, nid, _)| (gap, id) < (g, nid));
            if closer {
                nearest = Some((gap, id, object.position));
            }
        });

    if let Some((gap, _, blocker)) = nearest {
        // Surface normal of a round blocker points away from its center
        let normal = (p - blocker).normalize();
        push += normal * edge(gap);
    }
    push
}

/// Value-weighted centroid of the best neighborhood of swallowable objects
fn farm_target(bot: &Hole, view: &WorldView) -> Option<Vec2> {
    let config = view.config;
    let radius = bot.radius();
    let search = (radius * FARM_RADIUS_FACTOR).max(FARM_RADIUS_MIN);

    let mut candidates: SmallVec<[(ObjectId, Vec2, f32); 32]> = SmallVec::new();
    view.index.for_each_within(bot.position, search, |entry| {
        if let EntityRef::Object(id) = entry.id {
            if let Some(object) = view.store.object(id) {
                if object.is_idle() && object.fits(radius, config.k_fit) {
                    candidates.push((id, object.position, object.value));
                }
            }
        }
    });
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_unstable_by_key(|c| c.0);

    // Anchor on the object with the best value per distance, ties to lowest id
    let anchor = candidates
        .iter()
        .map(|&(id, pos, value)| (id, pos, value / (1.0 + bot.position.distance_to(pos))))
        .max_by(|a, b| a.2.total_cmp(&b.2).then_with(|| b.0.cmp(&a.0)))
        .map(|(_, pos, _)| pos)?;

    let cluster = (radius * CLUSTER_RADIUS_FACTOR).max(CLUSTER_RADIUS_MIN);
    Some(weighted_centroid(
        candidates
            .iter()
            .filter(|c| c.1.distance_to(anchor) <= cluster)
            .map(|c| (c.1, c.2)),
    )
    .unwrap_or(anchor))
}

fn weighted_centroid(points: impl Iterator<Item = (Vec2, f32)>) -> Option<Vec2> {
    let mut sum = Vec2::ZERO;
    let mut weight = 0.0;
    for (position, value) in points {
        sum += position * value;
        weight += value;
    }
    (weight > 0.0).then(|| sum / weight)
}

/// Owns every bot brain, ordered by hole id
#[derive(Debug, Default)]
pub struct BotController {
    brains: Vec<BotBrain>,
}

impl BotController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hole_id: HoleId, round_seed: u64) {
        debug_assert!(
            self.brains.last().map_or(true, |b| b.hole_id < hole_id),
            "bots must be registered in id order"
        );
        self.brains.push(BotBrain::new(hole_id, bot_seed(round_seed, hole_id)));
    }

    pub fn brain(&self, hole_id: HoleId) -> Option<&BotBrain> {
        self.brains
            .binary_search_by_key(&hole_id, |b| b.hole_id)
            .ok()
            .map(|i| &self.brains[i])
    }

    pub fn len(&self) -> usize {
        self.brains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brains.is_empty()
    }

    /// Evaluate every bot against the committed state
    ///
    /// Brains only touch their own RNG and memory, so the parallel and
    /// sequential paths produce identical results; output is in id order.
    pub fn update(&mut self, view: &WorldView) -> Vec<(HoleId, PlayerInput)> {
        #[cfg(feature = "parallel_ai")]
        {
            self.brains
                .par_iter_mut()
                .map(|brain| (brain.hole_id, brain.decide(view)))
                .collect()
        }
        #[cfg(not(feature = "parallel_ai"))]
        {
            self.brains
                .iter_mut()
                .map(|brain| (brain.hole_id, brain.decide(view)))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::ObjectSpec;

    struct Fixture {
        store: EntityStore,
        index: SpatialIndex,
        config: SimConfig,
        median: f32,
    }

    impl Fixture {
        fn new() -> Self {
            let config = SimConfig {
                bots: crate::config::BotTuning {
                    perturbation: 0.0,
                    ..Default::default()
                },
                ..Default::default()
            };
            Self {
                store: EntityStore::new(),
                index: SpatialIndex::new(config.cell_size),
                config,
                median: 5.0,
            }
        }

        fn hole(&mut self, x: f32, y: f32, radius: f32) -> HoleId {
            let id = self.store.add_hole("B".to_string(), true, Vec2::new(x, y), radius);
            self.index.insert(EntityRef::Hole(id), Vec2::new(x, y), radius);
            id
        }

        fn object(&mut self, x: f32, y: f32, size: f32) -> ObjectId {
            let spec = ObjectSpec {
                position: Vec2::new(x, y),
                size,
                blocking: true,
            };
            let id = self.store.add_object(&spec, self.config.k_value);
            self.index.insert(EntityRef::Object(id), spec.position, size);
            id
        }

        fn view(&self) -> WorldView<'_> {
            WorldView {
                store: &self.store,
                index: &self.index,
                config: &self.config,
                median_object_size: self.median,
            }
        }
    }

    #[test]
    fn test_bot_seed_stable_and_distinct() {
        assert_eq!(bot_seed(42, HoleId(3)), bot_seed(42, HoleId(3)));
        assert_ne!(bot_seed(42, HoleId(3)), bot_seed(42, HoleId(4)));
        assert_ne!(bot_seed(42, HoleId(3)), bot_seed(43, HoleId(3)));
    }

    #[test]
    fn test_flees_from_larger_rival() {
        let mut f = Fixture::new();
        let bot = f.hole(1000.0, 1000.0, 20.0);
        f.hole(1100.0, 1000.0, 40.0);

        let mut brain = BotBrain::new(bot, 1);
        let input = brain.decide(&f.view());

        assert_eq!(brain.behavior, BotBehavior::Threatened);
        assert!(input.direction.x < -0.99, "direction {:?}", input.direction);
    }

    #[test]
    fn test_threat_beyond_threat_radius_ignored() {
        let mut f = Fixture::new();
        let bot = f.hole(1000.0, 1000.0, 20.0);
        f.hole(1250.0, 1000.0, 40.0); // visible, but outside 200

        let mut brain = BotBrain::new(bot, 1);
        brain.decide(&f.view());
        assert_ne!(brain.behavior, BotBehavior::Threatened);
    }

    #[test]
    fn test_hunts_smaller_rival_when_largest() {
        let mut f = Fixture::new();
        let bot = f.hole(1000.0, 1000.0, 40.0);
        f.hole(1000.0, 1150.0, 20.0);

        let mut brain = BotBrain::new(bot, 1);
        let input = brain.decide(&f.view());

        assert_eq!(brain.behavior, BotBehavior::Hunting);
        assert!(input.direction.y > 0.99, "direction {:?}", input.direction);
    }

    #[test]
    fn test_no_hunting_while_too_small_for_median_object() {
        let mut f = Fixture::new();
        f.median = 100.0;
        let bot = f.hole(1000.0, 1000.0, 40.0);
        f.hole(1000.0, 1150.0, 20.0);

        let mut brain = BotBrain::new(bot, 1);
        brain.decide(&f.view());
        assert_ne!(brain.behavior, BotBehavior::Hunting);
    }

    #[test]
    fn test_no_hunting_with_comparable_rival_in_view() {
        let mut f = Fixture::new();
        let bot = f.hole(1000.0, 1000.0, 40.0);
        f.hole(1000.0, 1150.0, 20.0);
        f.hole(1250.0, 1000.0, 38.0);

        let mut brain = BotBrain::new(bot, 1);
        brain.decide(&f.view());
        assert_ne!(brain.behavior, BotBehavior::Hunting);
    }

    #[test]
    fn test_farms_toward_swallowable_objects() {
        let mut f = Fixture::new();
        let bot = f.hole(1000.0, 1000.0, 25.0);
        f.object(900.0, 1000.0, 5.0);
        f.object(900.0, 1010.0, 5.0);
        f.object(900.0, 990.0, 5.0);

        let mut brain = BotBrain::new(bot, 1);
        let input = brain.decide(&f.view());

        assert_eq!(brain.behavior, BotBehavior::Farming);
        assert!(input.direction.x < -0.99, "direction {:?}", input.direction);
        let target = brain.target.unwrap_or(Vec2::ZERO);
        assert!(target.approx_eq(Vec2::new(900.0, 1000.0), 1e-3), "target {:?}", target);
    }

    #[test]
    fn test_farming_ignores_objects_too_big_to_swallow() {
        let mut f = Fixture::new();
        let bot = f.hole(1000.0, 1000.0, 25.0);
        f.object(900.0, 1000.0, 50.0);

        let mut brain = BotBrain::new(bot, 1);
        brain.decide(&f.view());
        assert_eq!(brain.behavior, BotBehavior::Wandering);
    }

    #[test]
    fn test_farming_prefers_valuable_cluster() {
        let mut f = Fixture::new();
        let bot = f.hole(1000.0, 1000.0, 25.0);
        // Lone small object to the right, a denser richer patch to the left
        f.object(1060.0, 1000.0, 3.0);
        for dy in [-10.0, 0.0, 10.0] {
            f.object(900.0, 1000.0 + dy, 20.0);
        }

        let mut brain = BotBrain::new(bot, 1);
        let input = brain.decide(&f.view());
        assert!(input.direction.x < 0.0, "direction {:?}", input.direction);
    }

    #[test]
    fn test_wanders_with_nothing_around() {
        let f = {
            let mut f = Fixture::new();
            f.hole(1000.0, 1000.0, 25.0);
            f
        };
        let mut brain = BotBrain::new(HoleId(0), 9);
        let input = brain.decide(&f.view());

        assert_eq!(brain.behavior, BotBehavior::Wandering);
        assert!((input.direction.length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_wall_bends_wander_heading() {
        let mut f = Fixture::new();
        let bot = f.hole(26.0, 1000.0, 25.0);
        let mut brain = BotBrain::new(bot, 3);
        brain.wander_angle = std::f32::consts::PI; // straight into the left wall

        let input = brain.decide(&f.view());
        assert!(input.direction.x > -0.9, "still heading into wall: {:?}", input.direction);
    }

    #[test]
    fn test_avoids_blocker_wider_than_a_cell() {
        let mut f = Fixture::new();
        let bot = f.hole(1000.0, 1000.0, 25.0);
        // Edge 10 units to the right of the bot
        f.object(1335.0, 1000.0, 300.0);
        assert_eq!(f.index.stats().oversized, 1);

        let push = f.store.hole(bot).map(|h| avoidance(h, &f.view())).unwrap_or_default();
        assert!(push.x < -0.5, "push {:?}", push);
        assert!(push.y.abs() < 1e-4);
    }

    #[test]
    fn test_perturbation_is_bounded() {
        let mut f = Fixture::new();
        f.config.bots.perturbation = 0.15;
        let bot = f.hole(1000.0, 1000.0, 20.0);
        f.hole(1100.0, 1000.0, 40.0);

        let mut brain = BotBrain::new(bot, 11);
        for _ in 0..200 {
            let input = brain.decide(&f.view());
            let deviation = input.direction.angle().abs() - std::f32::consts::PI;
            assert!(deviation.abs() <= 0.15 + 1e-4, "deviation {}", deviation);
        }
    }

    #[test]
    fn test_dead_bot_stands_still() {
        let mut f = Fixture::new();
        let bot = f.hole(1000.0, 1000.0, 20.0);
        if let Some(h) = f.store.hole_mut(bot) {
            h.life = crate::game::state::LifeState::Eliminated;
        }
        let mut brain = BotBrain::new(bot, 1);
        assert_eq!(brain.decide(&f.view()), PlayerInput::default());
    }

    #[test]
    fn test_weighted_centroid() {
        let c = weighted_centroid(
            [(Vec2::new(0.0, 0.0), 1.0), (Vec2::new(10.0, 0.0), 3.0)].into_iter(),
        );
        assert_eq!(c, Some(Vec2::new(7.5, 0.0)));
        assert_eq!(weighted_centroid(std::iter::empty()), None);
    }

    #[test]
    fn test_controller_same_seed_same_decisions() {
        let mut f = Fixture::new();
        f.config.bots.perturbation = 0.15;
        for i in 0..8 {
            f.hole(200.0 + i as f32 * 180.0, 1000.0, 20.0 + i as f32 * 3.0);
        }
        for i in 0..40 {
            f.object(150.0 + i as f32 * 40.0, 1050.0, 4.0);
        }

        let run = |f: &Fixture| {
            let mut controller = BotController::new();
            for i in 0..8 {
                controller.register(HoleId(i), 1234);
            }
            (0..20).map(|_| controller.update(&f.view())).collect::<Vec<_>>()
        };
        assert_eq!(run(&f), run(&f));
    }

    #[test]
    fn test_controller_output_in_id_order() {
        let mut f = Fixture::new();
        for i in 0..5 {
            f.hole(300.0 + i as f32 * 300.0, 500.0, 20.0);
        }
        let mut controller = BotController::new();
        for i in 0..5 {
            controller.register(HoleId(i), 1);
        }
        let ids: Vec<HoleId> = controller.update(&f.view()).into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, (0..5).map(HoleId).collect::<Vec<_>>());
        assert_eq!(controller.brain(HoleId(3)).map(|b| b.hole_id), Some(HoleId(3)));
    }
}

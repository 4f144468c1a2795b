//! Shared hole movement: direction -> velocity -> position
//!
//! Player and bot holes go through exactly the same code; they only
//! differ in where the `PlayerInput` comes from.

use smallvec::SmallVec;

use crate::config::SimConfig;
use crate::game::constants::speed_for_radius;
use crate::game::input_buffer::PlayerInput;
use crate::game::spatial::{EntityRef, SpatialIndex};
use crate::game::state::{Hole, ObjectId, WorldObject};
use crate::util::vec2::Vec2;

/// Below this center distance a blocker pushes along +x
const PUSH_OUT_EPSILON: f32 = 1e-4;

/// Count down dash and invincibility timers; runs once per tick before movement
pub fn tick_timers(hole: &mut Hole, dt: f32) {
    hole.dash_cooldown_remaining = (hole.dash_cooldown_remaining - dt).max(0.0);
    hole.dash_active_remaining = (hole.dash_active_remaining - dt).max(0.0);
    hole.invincibility_remaining = (hole.invincibility_remaining - dt).max(0.0);
}

/// Turn an input into velocity, starting a dash when allowed
pub fn apply_input(hole: &mut Hole, input: &PlayerInput, config: &SimConfig) {
    let direction = input.direction.to_direction();

    // A dash needs a direction to dash in
    if input.dash && hole.can_dash() && !direction.is_zero() {
        hole.dash_active_remaining = config.dash_duration;
        hole.dash_cooldown_remaining = config.dash_cooldown;
    }

    let mut speed = speed_for_radius(config.move_speed, hole.radius());
    if hole.is_dashing() {
        speed *= config.dash_speed_multiplier;
    }
    hole.velocity = direction * speed;
}

/// Advance position and keep the whole hole inside the world
pub fn integrate(hole: &mut Hole, dt: f32, config: &SimConfig) {
    hole.position += hole.velocity * dt;
    clamp_to_world(hole, config);
}

pub fn clamp_to_world(hole: &mut Hole, config: &SimConfig) {
    let r = hole.radius();
    hole.position = hole.position.clamp_to_rect(
        Vec2::new(r, r),
        Vec2::new(config.world_width - r, config.world_height - r),
    );
}

/// Push the hole out of every blocker it overlaps
///
/// Blockers are idle, blocking objects the hole does not fit; afterwards
/// the hole's edge touches but does not overlap theirs. Velocity into a
/// blocker is removed so the hole slides along it.
pub fn resolve_blockers(
    hole: &mut Hole,
    objects: &[WorldObject],
    index: &SpatialIndex,
    config: &SimConfig,
) {
    let radius = hole.radius();
    let mut nearby: SmallVec<[ObjectId; 16]> = SmallVec::new();
    index.for_each_overlapping(hole.position, radius, |entry| {
        if let EntityRef::Object(id) = entry.id {
            nearby.push(id);
        }
    });
    nearby.sort_unstable();

    for id in nearby {
        let Some(object) = objects.get(id.index()) else {
            continue;
        };
        if !object.blocks(radius, config.k_fit) {
            continue;
        }
        let min_distance = radius + object.size;
        let offset = hole.position - object.position;
        let distance = offset.length();
        if distance >= min_distance {
            continue;
        }
        let normal = if distance > PUSH_OUT_EPSILON {
            offset / distance
        } else {
            Vec2::RIGHT
        };
        hole.position = object.position + normal * min_distance;

        let into = hole.velocity.dot(normal);
        if into < 0.0 {
            hole.velocity -= normal * into;
        }
    }
}

/// Full per-tick movement for one alive hole
pub fn move_hole(
    hole: &mut Hole,
    input: &PlayerInput,
    objects: &[WorldObject],
    index: &SpatialIndex,
    config: &SimConfig,
) {
    let dt = config.dt();
    apply_input(hole, input, config);
    integrate(hole, dt, config);
    resolve_blockers(hole, objects, index, config);
    clamp_to_world(hole, config);
}

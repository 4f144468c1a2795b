//! Entity store: holes and world objects
//!
//! Holes and objects live in id-indexed vectors. Ids are assigned in
//! creation order and never reused within a round; nothing is removed
//! before round end, consumed objects simply stay `Consumed`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::game::constants::{area_to_radius, radius_to_area};
use crate::util::vec2::Vec2;

/// Stable hole identifier (index into the store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HoleId(pub u32);

/// Stable world object identifier (index into the store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl HoleId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ObjectId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for HoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hole#{}", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// Report use of an unknown id. Panics in debug builds, logs in release.
#[track_caller]
pub(crate) fn unknown_entity(kind: &str, id: impl fmt::Display) {
    debug_assert!(false, "{} {} does not exist", kind, id);
    tracing::warn!("ignoring operation on unknown {} {}", kind, id);
}

/// Hole lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LifeState {
    Alive,
    /// Out of the round for good
    Eliminated,
    /// Waiting to reappear; `timer` counts down to zero
    RespawnPending { timer: f32 },
}

/// A player- or bot-controlled hole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hole {
    // Hot fields, touched every tick
    pub position: Vec2,
    pub velocity: Vec2,
    /// Authoritative size; radius is always derived from it
    area: f32,
    pub life: LifeState,
    pub invincibility_remaining: f32,
    pub dash_cooldown_remaining: f32,
    pub dash_active_remaining: f32,

    // Scoring
    /// Swallowed value plus elimination bonuses
    pub score: f32,
    pub objects_captured: u32,
    pub eliminations: u32,
    pub deaths: u32,
    /// Extra lives left (Battle)
    pub lives_remaining: u32,

    // Identity
    pub id: HoleId,
    pub name: String,
    pub is_bot: bool,
    /// Opaque cosmetic key, passed through to renderers
    pub skin_key: u32,
}

impl Hole {
    pub fn new(id: HoleId, name: String, is_bot: bool, position: Vec2, start_radius: f32) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            area: radius_to_area(start_radius),
            life: LifeState::Alive,
            invincibility_remaining: 0.0,
            dash_cooldown_remaining: 0.0,
            dash_active_remaining: 0.0,
            score: 0.0,
            objects_captured: 0,
            eliminations: 0,
            deaths: 0,
            lives_remaining: 0,
            id,
            name,
            is_bot,
            skin_key: id.0,
        }
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.area
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        area_to_radius(self.area)
    }

    /// Add area, never past `max_radius`; the only way a hole gets bigger
    pub fn grow(&mut self, amount: f32, max_radius: f32) {
        debug_assert!(amount >= 0.0, "growth must not shrink a hole (got {})", amount);
        let cap = radius_to_area(max_radius).max(self.area);
        self.area = (self.area + amount.max(0.0)).min(cap);
    }

    /// Reset size to a fixed radius (elimination / respawn)
    pub fn reset_size(&mut self, radius: f32) {
        self.area = radius_to_area(radius);
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.life == LifeState::Alive
    }

    #[inline]
    pub fn is_invincible(&self) -> bool {
        self.invincibility_remaining > 0.0
    }

    #[inline]
    pub fn is_dashing(&self) -> bool {
        self.dash_active_remaining > 0.0
    }

    #[inline]
    pub fn can_dash(&self) -> bool {
        self.dash_cooldown_remaining <= 0.0 && !self.is_dashing()
    }

    /// Still in the round: alive or waiting to respawn
    pub fn in_round(&self) -> bool {
        !matches!(self.life, LifeState::Eliminated)
    }
}

/// Per-object capture state machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CaptureState {
    Idle,
    /// Animating into `target`; `origin` is where the fall started
    Falling {
        progress: f32,
        target: HoleId,
        origin: Vec2,
    },
    Consumed,
}

/// Description of an object as delivered by world generation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub position: Vec2,
    /// Equivalent radius
    pub size: f32,
    /// Obstructs holes it does not fit into
    #[serde(default = "default_blocking")]
    pub blocking: bool,
}

fn default_blocking() -> bool {
    true
}

/// A city prop or building
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldObject {
    pub id: ObjectId,
    pub position: Vec2,
    pub size: f32,
    /// Area granted on capture, `k_value * size^2`
    pub value: f32,
    pub blocking: bool,
    pub capture: CaptureState,
}

impl WorldObject {
    pub fn new(id: ObjectId, spec: &ObjectSpec, k_value: f32) -> Self {
        Self {
            id,
            position: spec.position,
            size: spec.size,
            value: k_value * spec.size * spec.size,
            blocking: spec.blocking,
            capture: CaptureState::Idle,
        }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.capture == CaptureState::Idle
    }

    #[inline]
    pub fn is_consumed(&self) -> bool {
        self.capture == CaptureState::Consumed
    }

    /// Small enough to be swallowed by a hole of this radius
    #[inline]
    pub fn fits(&self, hole_radius: f32, k_fit: f32) -> bool {
        self.size <= hole_radius * k_fit
    }

    /// Obstructs a hole of this radius
    #[inline]
    pub fn blocks(&self, hole_radius: f32, k_fit: f32) -> bool {
        self.blocking && self.is_idle() && !self.fits(hole_radius, k_fit)
    }
}

/// Owner of every hole and object in a round
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    holes: Vec<Hole>,
    objects: Vec<WorldObject>,
    /// Sum of initial object values (f64 so 100% is reachable exactly)
    total_object_value: f64,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_hole(&mut self, name: String, is_bot: bool, position: Vec2, start_radius: f32) -> HoleId {
        let id = HoleId(self.holes.len() as u32);
        self.holes.push(Hole::new(id, name, is_bot, position, start_radius));
        id
    }

    pub fn add_object(&mut self, spec: &ObjectSpec, k_value: f32) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        let object = WorldObject::new(id, spec, k_value);
        self.total_object_value += object.value as f64;
        self.objects.push(object);
        id
    }

    pub fn hole(&self, id: HoleId) -> Option<&Hole> {
        self.holes.get(id.index())
    }

    pub fn hole_mut(&mut self, id: HoleId) -> Option<&mut Hole> {
        self.holes.get_mut(id.index())
    }

    pub fn object(&self, id: ObjectId) -> Option<&WorldObject> {
        self.objects.get(id.index())
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut WorldObject> {
        self.objects.get_mut(id.index())
    }

    /// Holes in id order
    pub fn holes(&self) -> &[Hole] {
        &self.holes
    }

    pub fn holes_mut(&mut self) -> &mut [Hole] {
        &mut self.holes
    }

    /// Objects in id order
    pub fn objects(&self) -> &[WorldObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [WorldObject] {
        &mut self.objects
    }

    /// Mutable holes alongside read-only objects
    pub fn split_mut(&mut self) -> (&mut [Hole], &[WorldObject]) {
        (&mut self.holes, &self.objects)
    }

    pub fn alive_holes(&self) -> impl Iterator<Item = &Hole> {
        self.holes.iter().filter(|h| h.is_alive())
    }

    pub fn alive_count(&self) -> usize {
        self.alive_holes().count()
    }

    /// Holes not permanently eliminated
    pub fn in_round_count(&self) -> usize {
        self.holes.iter().filter(|h| h.in_round()).count()
    }

    pub fn hole_count(&self) -> usize {
        self.holes.len()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn total_object_value(&self) -> f64 {
        self.total_object_value
    }
}

//! Fixed-step round driver
//!
//! Runs the per-tick pipeline in a fixed order:
//! clock -> timers -> respawns -> inputs and bots -> movement -> index refresh ->
//! capture -> combat -> mode evaluation. Nothing suspends mid-tick and
//! consumers only ever see the state between two ticks.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, SimConfig};
use crate::game::constants::bot::NAMES;
use crate::game::events::{EventQueue, SimEvent};
use crate::game::input_buffer::{merge_inputs, InputBuffer, InputBufferError, InputSender, PlayerInput};
use crate::game::match_result::{determine_result, RoundResult};
use crate::game::mode::{GameMode, ModeController, RoundState};
use crate::game::snapshot::SimSnapshot;
use crate::game::spatial::{EntityRef, SpatialIndex};
use crate::game::state::{EntityStore, HoleId, ObjectSpec};
use crate::game::systems::ai::{BotController, WorldView};
use crate::game::systems::{capture, combat, movement};
use crate::game::world;

pub const PLAYER_NAME: &str = "Player";

/// Why a round could not be built
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("object {index} has a non-finite position")]
    NonFinitePosition { index: usize },
    #[error("object {index} has invalid size {size}")]
    InvalidObjectSize { index: usize, size: f32 },
    #[error("object {index} has size {size}, larger than the world ({limit})")]
    ObjectTooLarge { index: usize, size: f32, limit: f32 },
}

/// One round of the simulation
pub struct GameLoop {
    config: SimConfig,
    store: EntityStore,
    index: SpatialIndex,
    mode: ModeController,
    bots: BotController,
    inputs: InputBuffer,
    player_id: HoleId,
    /// Held until the next input replaces it
    player_input: PlayerInput,
    events: EventQueue,
    /// Spawn placement
    round_rng: ChaCha8Rng,
    tick: u64,
    median_object_size: f32,
}

impl GameLoop {
    /// Build a round from a validated config and the initial object list
    pub fn new(config: SimConfig, objects: &[ObjectSpec]) -> Result<Self, SimError> {
        config.validate()?;
        world::validate_objects(objects, &config)?;

        let mut store = EntityStore::new();
        let mut index = SpatialIndex::new(config.cell_size);
        for spec in objects {
            let id = store.add_object(spec, config.k_value);
            index.insert(EntityRef::Object(id), spec.position, spec.size);
        }

        let mut round_rng = ChaCha8Rng::seed_from_u64(config.seed);
        let player_id = spawn_hole(&mut store, &mut index, &config, &mut round_rng, PLAYER_NAME.to_string(), false);

        let bot_count = if config.mode.has_bots() {
            config.bot_count
        } else {
            if config.bot_count > 0 {
                warn!("{} mode has no rivals, ignoring bot_count={}", config.mode, config.bot_count);
            }
            0
        };

        let mut bots = BotController::new();
        for i in 0..bot_count {
            let id = spawn_hole(&mut store, &mut index, &config, &mut round_rng, bot_name(i), true);
            bots.register(id, config.seed);
        }

        let mut mode = ModeController::new(&config, store.total_object_value(), player_id);
        mode.refresh(&store);

        info!(
            "Round ready: mode={}, holes={}, objects={}, seed={:#x}",
            config.mode,
            store.hole_count(),
            store.object_count(),
            config.seed
        );

        Ok(Self {
            median_object_size: world::median_size(objects),
            config,
            store,
            index,
            mode,
            bots,
            inputs: InputBuffer::default(),
            player_id,
            player_input: PlayerInput::default(),
            events: EventQueue::new(),
            round_rng,
            tick: 0,
        })
    }

    /// Advance the round by one fixed step and return this tick's events
    pub fn tick(&mut self) -> &[SimEvent] {
        self.events.clear();
        if self.mode.is_over() {
            return self.events.as_slice();
        }
        self.tick += 1;

        self.collect_player_input();
        if !self.mode.advance_clock(self.config.dt()) {
            // Countdown: everything stays frozen
            self.mode.refresh(&self.store);
            return self.events.as_slice();
        }

        // Before respawns, so a hole that reappears this tick keeps its
        // full invincibility in this tick's snapshot
        let dt = self.config.dt();
        for hole in self.store.split_mut().0.iter_mut().filter(|h| h.is_alive()) {
            movement::tick_timers(hole, dt);
        }

        combat::tick_respawns(
            &mut self.store,
            &mut self.index,
            &self.config,
            &mut self.round_rng,
            &mut self.events,
        );

        let bot_inputs = self.bots.update(&WorldView {
            store: &self.store,
            index: &self.index,
            config: &self.config,
            median_object_size: self.median_object_size,
        });
        self.move_holes(&bot_inputs);

        capture::advance_falling(&mut self.store, &mut self.index, &self.config);
        if capture::run(&mut self.store, &self.index, &self.config, &mut self.events) > 0.0 {
            for event in self.events.as_slice() {
                if let SimEvent::ObjectCaptured { value, .. } = *event {
                    self.mode.record_captured(value);
                }
            }
        }

        combat::resolve(&mut self.store, &mut self.index, &self.config, &mut self.events);

        if let Some(end) = self.mode.evaluate(&self.store) {
            self.events.push(SimEvent::RoundEnded { winner_id: end.winner });
            let winner = end
                .winner
                .and_then(|id| self.store.hole(id))
                .map_or_else(|| "nobody".to_string(), |h| format!("{} ({})", h.name, h.id));
            info!(
                "{} round ended after {:.1}s: {:?}, winner {}",
                self.config.mode,
                self.mode.state().elapsed_time,
                end.reason,
                winner
            );
        }

        self.events.as_slice()
    }

    fn collect_player_input(&mut self) {
        let mut mine = Vec::new();
        for message in self.inputs.drain() {
            if message.hole_id == self.player_id {
                mine.push(message.input);
            } else {
                debug!("dropping input addressed to {}", message.hole_id);
            }
        }
        self.player_input = merge_inputs(self.player_input, mine);
    }

    fn move_holes(&mut self, bot_inputs: &[(HoleId, PlayerInput)]) {
        let player_id = self.player_id;
        let player_input = self.player_input;
        let config = &self.config;
        let index = &self.index;
        let (holes, objects) = self.store.split_mut();

        for hole in holes.iter_mut().filter(|h| h.is_alive()) {
            let input = if hole.id == player_id {
                player_input
            } else {
                bot_inputs
                    .binary_search_by_key(&hole.id, |(id, _)| *id)
                    .map(|i| bot_inputs[i].1)
                    .unwrap_or_default()
            };
            movement::move_hole(hole, &input, objects, index, config);
        }

        for hole in self.store.alive_holes() {
            self.index.move_to(EntityRef::Hole(hole.id), hole.position, hole.radius());
        }
    }

    /// Read-only view of the state after the last tick
    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot::capture(self.tick, &self.store, self.mode.state(), self.events.as_slice())
    }

    /// Final result once the round has ended
    pub fn result(&self) -> Option<RoundResult> {
        self.mode
            .is_over()
            .then(|| determine_result(&self.store, self.mode.state()))
    }

    /// Replace the player's held input directly
    pub fn set_player_input(&mut self, input: PlayerInput) {
        self.player_input = input;
    }

    /// Queue player input for the next tick
    pub fn submit_input(&self, input: PlayerInput) -> Result<(), InputBufferError> {
        self.inputs.try_submit(self.player_id, input)
    }

    /// Handle for submitting input from another thread
    pub fn input_sender(&self) -> InputSender {
        self.inputs.sender()
    }

    /// Seed of a bot's private RNG
    pub fn bot_seed(&self, hole_id: HoleId) -> Option<u64> {
        self.bots.brain(hole_id).map(|b| b.seed)
    }

    pub fn events(&self) -> &[SimEvent] {
        self.events.as_slice()
    }

    pub fn player_id(&self) -> HoleId {
        self.player_id
    }

    pub fn player_input(&self) -> PlayerInput {
        self.player_input
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn round(&self) -> &RoundState {
        self.mode.state()
    }

    pub fn bots(&self) -> &BotController {
        &self.bots
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn mode(&self) -> GameMode {
        self.config.mode
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn is_over(&self) -> bool {
        self.mode.is_over()
    }
}

fn bot_name(i: usize) -> String {
    let base = NAMES[i % NAMES.len()];
    match i / NAMES.len() {
        0 => base.to_string(),
        lap => format!("{} {}", base, lap + 1),
    }
}

fn spawn_hole(
    store: &mut EntityStore,
    index: &mut SpatialIndex,
    config: &SimConfig,
    rng: &mut ChaCha8Rng,
    name: String,
    is_bot: bool,
) -> HoleId {
    let position = combat::pick_spawn_point(index, config, rng);
    let id = store.add_hole(name, is_bot, position, config.start_radius);
    if let Some(hole) = store.hole_mut(id) {
        if config.mode == GameMode::Battle {
            hole.lives_remaining = config.battle_extra_lives;
        }
        index.insert(EntityRef::Hole(id), position, hole.radius());
    }
    id
}

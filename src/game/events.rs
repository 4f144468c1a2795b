//! Discrete simulation events
//!
//! Emitted during a tick and handed to renderers/UI once; the queue is
//! cleared at the start of the next tick.

use serde::{Deserialize, Serialize};

use crate::game::state::{HoleId, ObjectId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// An object started falling into a hole; `value` is the area granted
    ObjectCaptured {
        hole_id: HoleId,
        object_id: ObjectId,
        value: f32,
    },
    HoleEliminated {
        attacker_id: HoleId,
        defender_id: HoleId,
    },
    HoleRespawned { id: HoleId },
    /// `winner_id` is `None` for a draw or a Solo round that ran out of time
    RoundEnded { winner_id: Option<HoleId> },
}

/// Events produced by the current tick
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<SimEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Drop whatever the previous tick produced
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Take ownership of the pending events, leaving the queue empty
    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn as_slice(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

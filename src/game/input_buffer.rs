//! Lock-free input buffer between the host and the simulation tick
//!
//! Uses crossbeam-channel so an input thread (or UI callback) can submit
//! without blocking; the tick drains everything pending at its start.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::game::state::HoleId;
use crate::util::vec2::Vec2;

/// Player controls for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Desired movement direction; normalized by the movement system
    pub direction: Vec2,
    /// Request a dash (ignored while on cooldown)
    pub dash: bool,
}

impl PlayerInput {
    pub fn steer(direction: Vec2) -> Self {
        Self {
            direction,
            dash: false,
        }
    }
}

/// Input addressed to a hole
#[derive(Debug, Clone, Copy)]
pub struct InputMessage {
    pub hole_id: HoleId,
    pub input: PlayerInput,
}

/// Input buffer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InputBufferError {
    /// Buffer is full (backpressure)
    #[error("input buffer is full")]
    Full,
    /// Simulation was dropped
    #[error("input buffer disconnected")]
    Disconnected,
}

/// Bounded MPSC buffer drained once per tick
pub struct InputBuffer {
    sender: Sender<InputMessage>,
    receiver: Receiver<InputMessage>,
    capacity: usize,
}

impl InputBuffer {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Clonable sender handle for input sources
    pub fn sender(&self) -> InputSender {
        InputSender {
            sender: self.sender.clone(),
        }
    }

    #[inline]
    pub fn try_submit(&self, hole_id: HoleId, input: PlayerInput) -> Result<(), InputBufferError> {
        send(&self.sender, InputMessage { hole_id, input })
    }

    /// Drain all pending inputs for this tick
    pub fn drain(&self) -> Vec<InputMessage> {
        self.receiver.try_iter().collect()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        // A few seconds of 60 Hz input from a single local player
        Self::new(256)
    }
}

/// Clonable sender handle
#[derive(Clone)]
pub struct InputSender {
    sender: Sender<InputMessage>,
}

impl InputSender {
    #[inline]
    pub fn try_send(&self, hole_id: HoleId, input: PlayerInput) -> Result<(), InputBufferError> {
        send(&self.sender, InputMessage { hole_id, input })
    }
}

fn send(sender: &Sender<InputMessage>, message: InputMessage) -> Result<(), InputBufferError> {
    sender.try_send(message).map_err(|e| match e {
        TrySendError::Full(_) => InputBufferError::Full,
        TrySendError::Disconnected(_) => InputBufferError::Disconnected,
    })
}

/// Collapse a tick's worth of inputs: the last direction wins, dash
/// requests are latched so a short tap is never lost.
pub fn merge_inputs(current: PlayerInput, messages: impl IntoIterator<Item = PlayerInput>) -> PlayerInput {
    let mut merged = PlayerInput {
        direction: current.direction,
        dash: false,
    };
    for input in messages {
        merged.direction = input.direction;
        merged.dash |= input.dash;
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(x: f32, dash: bool) -> PlayerInput {
        PlayerInput {
            direction: Vec2::new(x, 0.0),
            dash,
        }
    }

    #[test]
    fn test_submit_and_drain() {
        let buffer = InputBuffer::new(10);
        assert!(buffer.try_submit(HoleId(0), input(1.0, false)).is_ok());
        assert!(buffer.try_submit(HoleId(0), input(2.0, false)).is_ok());
        assert_eq!(buffer.pending_count(), 2);

        let inputs = buffer.drain();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[1].input.direction.x, 2.0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_backpressure() {
        let buffer = InputBuffer::new(2);
        assert!(buffer.try_submit(HoleId(0), input(1.0, false)).is_ok());
        assert!(buffer.try_submit(HoleId(0), input(2.0, false)).is_ok());
        assert_eq!(
            buffer.try_submit(HoleId(0), input(3.0, false)),
            Err(InputBufferError::Full)
        );

        buffer.drain();
        assert!(buffer.try_submit(HoleId(0), input(3.0, false)).is_ok());
    }

    #[test]
    fn test_sender_from_other_thread() {
        let buffer = InputBuffer::new(10);
        let sender = buffer.sender();
        std::thread::spawn(move || {
            sender.try_send(HoleId(0), input(1.0, true)).unwrap();
        })
        .join()
        .unwrap();

        let inputs = buffer.drain();
        assert_eq!(inputs.len(), 1);
        assert!(inputs[0].input.dash);
    }

    #[test]
    fn test_disconnected_sender() {
        let buffer = InputBuffer::new(4);
        let sender = buffer.sender();
        drop(buffer);
        assert_eq!(
            sender.try_send(HoleId(0), PlayerInput::default()),
            Err(InputBufferError::Disconnected)
        );
    }

    #[test]
    fn test_merge_last_direction_wins_dash_latched() {
        let merged = merge_inputs(
            PlayerInput::default(),
            [input(1.0, true), input(-1.0, false)],
        );
        assert_eq!(merged.direction, Vec2::new(-1.0, 0.0));
        assert!(merged.dash);
    }

    #[test]
    fn test_merge_without_messages_keeps_direction_drops_dash() {
        let merged = merge_inputs(input(0.5, true), std::iter::empty());
        assert_eq!(merged.direction, Vec2::new(0.5, 0.0));
        assert!(!merged.dash);
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(InputBuffer::default().capacity(), 256);
    }
}

use std::collections::VecDeque;

use crate::net::sequence_greater_than;

const MAX_PENDING_INPUTS: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputCommand {
    /// Relative move, e.g. one press of up/down.
    Step(f32),
    /// Absolute target, e.g. a drag.
    MoveTo(f32),
}

impl InputCommand {
    fn apply(self, position: f32, min: f32, max: f32) -> f32 {
        let target = match self {
            Self::Step(delta) => position + delta,
            Self::MoveTo(y) => y,
        };
        if !target.is_finite() {
            return position;
        }
        target.clamp(min, max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputRecord {
    pub sequence: u16,
    pub position: f32,
    pub timestamp_ms: u64,
    command: InputCommand,
}

/// Applies local paddle input immediately and keeps every change until the
/// remote peer acknowledges it.
#[derive(Debug)]
pub struct InputPredictor {
    pending: VecDeque<InputRecord>,
    position: f32,
    acked_position: f32,
    next_sequence: u16,
    last_acked: Option<u16>,
    min: f32,
    max: f32,
    dirty: bool,
    last_sent_ms: Option<u64>,
}

impl InputPredictor {
    pub fn new(start: f32, min: f32, max: f32) -> Self {
        Self {
            pending: VecDeque::with_capacity(MAX_PENDING_INPUTS),
            position: start,
            acked_position: start,
            next_sequence: 1,
            last_acked: None,
            min,
            max,
            dirty: false,
            last_sent_ms: None,
        }
    }

    /// Returns the new sequence, or `None` if the paddle did not move.
    pub fn apply(&mut self, command: InputCommand, now_ms: u64) -> Option<u16> {
        let position = command.apply(self.position, self.min, self.max);
        if position == self.position {
            return None;
        }

        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.position = position;
        self.dirty = true;

        self.pending.push_back(InputRecord {
            sequence,
            position,
            timestamp_ms: now_ms,
            command,
        });
        while self.pending.len() > MAX_PENDING_INPUTS {
            if let Some(dropped) = self.pending.pop_front() {
                self.acked_position = dropped.position;
            }
        }

        Some(sequence)
    }

    /// Discards every record up to and including `ack`, then rebuilds the
    /// predicted position by replaying what remains.
    pub fn reconcile(&mut self, ack: u16) -> f32 {
        if self
            .last_acked
            .is_some_and(|last| !sequence_greater_than(ack, last))
        {
            return self.position;
        }
        if !self.pending.iter().any(|r| r.sequence == ack) && !self.pending.is_empty() {
            // An ack beyond anything we sent is bogus.
            let newest = self.pending.back().map(|r| r.sequence).unwrap_or(ack);
            if sequence_greater_than(ack, newest) {
                return self.position;
            }
        }
        self.last_acked = Some(ack);

        while let Some(front) = self.pending.front() {
            if sequence_greater_than(front.sequence, ack) {
                break;
            }
            self.acked_position = front.position;
            self.pending.pop_front();
        }

        self.position = self.replay_from(self.acked_position);
        self.position
    }

    /// Position reached by re-applying every unacknowledged input to `base`.
    pub fn replay_from(&self, base: f32) -> f32 {
        self.pending
            .iter()
            .fold(base, |position, record| record.command.apply(position, self.min, self.max))
    }

    /// Throttled outbound update: the latest position and sequence, at most
    /// once per `interval_ms`, and only when something changed.
    pub fn take_update(&mut self, now_ms: u64, interval_ms: u64) -> Option<(f32, u16)> {
        if !self.dirty {
            return None;
        }
        if self
            .last_sent_ms
            .is_some_and(|sent| now_ms.saturating_sub(sent) < interval_ms)
        {
            return None;
        }
        self.dirty = false;
        self.last_sent_ms = Some(now_ms);
        Some((self.position, self.latest_sequence()))
    }

    /// The latest position went out some other way, e.g. in a full state.
    pub fn mark_sent(&mut self, now_ms: u64) {
        self.dirty = false;
        self.last_sent_ms = Some(now_ms);
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    pub fn latest_sequence(&self) -> u16 {
        self.next_sequence.wrapping_sub(1)
    }

    pub fn last_acked(&self) -> Option<u16> {
        self.last_acked
    }

    pub fn pending(&self) -> impl Iterator<Item = &InputRecord> {
        self.pending.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn reset(&mut self, start: f32) {
        self.pending.clear();
        self.position = start;
        self.acked_position = start;
        self.last_acked = None;
        self.dirty = true;
        self.last_sent_ms = None;
    }
}

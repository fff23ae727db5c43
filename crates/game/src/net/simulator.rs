use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bytes::Bytes;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::stats::PacketLossSimulation;
use super::transport::Transport;

#[derive(Debug)]
struct DelayedPayload {
    release_ms: u64,
    order: u64,
    payload: Bytes,
}

impl PartialEq for DelayedPayload {
    fn eq(&self, other: &Self) -> bool {
        self.release_ms == other.release_ms && self.order == other.order
    }
}

impl Eq for DelayedPayload {}

impl PartialOrd for DelayedPayload {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedPayload {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .release_ms
            .cmp(&self.release_ms)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// One direction of a lossy, delaying link. Payloads are released once
/// their delivery time has passed, so jitter reorders them naturally.
#[derive(Debug)]
pub struct LinkSimulator {
    config: PacketLossSimulation,
    queue: BinaryHeap<DelayedPayload>,
    rng: StdRng,
    now_ms: u64,
    next_order: u64,
    severed: bool,
    dropped: u64,
}

impl LinkSimulator {
    pub fn new(config: PacketLossSimulation, seed: u64) -> Self {
        Self {
            config,
            queue: BinaryHeap::new(),
            rng: StdRng::seed_from_u64(seed),
            now_ms: 0,
            next_order: 0,
            severed: false,
            dropped: 0,
        }
    }

    pub fn perfect() -> Self {
        Self::new(PacketLossSimulation::default(), 0)
    }

    pub fn set_config(&mut self, config: PacketLossSimulation) {
        self.config = config;
    }

    pub fn set_time(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
    }

    /// A severed link silently swallows everything, including in-flight data.
    pub fn set_severed(&mut self, severed: bool) {
        self.severed = severed;
        if severed {
            self.dropped += self.queue.len() as u64;
            self.queue.clear();
        }
    }

    pub fn push(&mut self, payload: Bytes) {
        if self.severed || self.config.should_drop(&mut self.rng) {
            self.dropped += 1;
            return;
        }

        let delay = self.config.delay_ms(&mut self.rng) as u64;
        self.queue.push(DelayedPayload {
            release_ms: self.now_ms + delay,
            order: self.next_order,
            payload,
        });
        self.next_order += 1;
    }

    pub fn take_ready(&mut self, now_ms: u64) -> Vec<Bytes> {
        self.now_ms = now_ms;
        let mut ready = Vec::new();
        while self
            .queue
            .peek()
            .is_some_and(|delayed| delayed.release_ms <= now_ms)
        {
            if let Some(delayed) = self.queue.pop() {
                ready.push(delayed.payload);
            }
        }
        ready
    }

    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Transport for LinkSimulator {
    fn send(&mut self, payload: Bytes) {
        self.push(payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_after_latency() {
        let mut link = LinkSimulator::new(PacketLossSimulation::latency(100, 100), 1);
        link.set_time(0);
        link.push(Bytes::from_static(b"a"));

        assert!(link.take_ready(99).is_empty());
        assert_eq!(link.take_ready(100), vec![Bytes::from_static(b"a")]);
        assert_eq!(link.in_flight(), 0);
    }

    #[test]
    fn same_release_time_keeps_send_order() {
        let mut link = LinkSimulator::perfect();
        link.push(Bytes::from_static(b"1"));
        link.push(Bytes::from_static(b"2"));
        link.push(Bytes::from_static(b"3"));

        let ready = link.take_ready(0);
        assert_eq!(ready.len(), 3);
        assert_eq!(ready[0], Bytes::from_static(b"1"));
        assert_eq!(ready[2], Bytes::from_static(b"3"));
    }

    #[test]
    fn severed_link_drops_in_flight() {
        let mut link = LinkSimulator::new(PacketLossSimulation::latency(50, 50), 1);
        link.push(Bytes::from_static(b"x"));
        link.set_severed(true);
        link.push(Bytes::from_static(b"y"));

        assert!(link.take_ready(1_000).is_empty());
        assert_eq!(link.dropped(), 2);
    }
}

#![allow(dead_code)]

use rally::{LinkSimulator, PacketLossSimulation, PeerIdentity, Session, SyncConfig};

pub const FRAME_MS: u64 = 16;

/// Two sessions wired together through simulated links, driven in lockstep.
/// Peer A draws 42, peer B draws 17, so A wins the tie-break.
pub struct Pair {
    pub a: Session,
    pub b: Session,
    pub a_to_b: LinkSimulator,
    pub b_to_a: LinkSimulator,
    pub now: u64,
    /// B's clock runs this far ahead of A's.
    pub b_skew: u64,
}

impl Pair {
    pub fn new(config: SyncConfig, link: PacketLossSimulation, b_skew: u64) -> Self {
        Self::with_identities(
            config,
            link,
            b_skew,
            PeerIdentity::new(42, 1),
            PeerIdentity::new(17, 2),
        )
    }

    pub fn with_identities(
        config: SyncConfig,
        link: PacketLossSimulation,
        b_skew: u64,
        a: PeerIdentity,
        b: PeerIdentity,
    ) -> Self {
        Self {
            a: Session::new(config.clone(), a, 0).expect("valid config"),
            b: Session::new(config, b, b_skew).expect("valid config"),
            a_to_b: LinkSimulator::new(link.clone(), 7),
            b_to_a: LinkSimulator::new(link, 11),
            now: 0,
            b_skew,
        }
    }

    pub fn latency(config: SyncConfig, latency_ms: u32) -> Self {
        Self::new(
            config,
            PacketLossSimulation::latency(latency_ms, latency_ms),
            0,
        )
    }

    pub fn b_now(&self) -> u64 {
        self.now + self.b_skew
    }

    pub fn step(&mut self) {
        self.now += FRAME_MS;
        let now = self.now;
        let b_now = self.b_now();

        for payload in self.a_to_b.take_ready(now) {
            self.b.receive(&payload, b_now);
        }
        for payload in self.b_to_a.take_ready(now) {
            self.a.receive(&payload, now);
        }

        self.a.tick(now);
        self.b.tick(b_now);

        self.a_to_b.set_time(now);
        self.b_to_a.set_time(now);
        self.a.flush(&mut self.a_to_b);
        self.b.flush(&mut self.b_to_a);
    }

    pub fn run_for(&mut self, duration_ms: u64) {
        let until = self.now + duration_ms;
        while self.now < until {
            self.step();
        }
    }

    /// Steps until `done` holds or `limit_ms` (on A's clock) is reached.
    pub fn run_until(&mut self, limit_ms: u64, mut done: impl FnMut(&Pair) -> bool) -> bool {
        while self.now < limit_ms {
            self.step();
            if done(self) {
                return true;
            }
        }
        false
    }

    pub fn sever(&mut self, severed: bool) {
        self.a_to_b.set_severed(severed);
        self.b_to_a.set_severed(severed);
    }
}

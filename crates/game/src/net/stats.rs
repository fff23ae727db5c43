use rand::Rng;

#[derive(Debug, Clone, Default)]
pub struct PacketLossSimulation {
    pub enabled: bool,
    pub loss_percent: f32,
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub jitter_ms: u32,
}

impl PacketLossSimulation {
    pub fn latency(min_latency_ms: u32, max_latency_ms: u32) -> Self {
        Self {
            enabled: true,
            loss_percent: 0.0,
            min_latency_ms,
            max_latency_ms,
            jitter_ms: 0,
        }
    }

    pub fn should_drop<R: Rng>(&self, rng: &mut R) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        rng.gen_range(0.0..100.0) < self.loss_percent
    }

    pub fn delay_ms<R: Rng>(&self, rng: &mut R) -> u32 {
        if !self.enabled || self.max_latency_ms == 0 {
            return 0;
        }
        let base = self.min_latency_ms;
        let range = self.max_latency_ms.saturating_sub(self.min_latency_ms);
        let spread = if range > 0 { rng.gen_range(0..=range) } else { 0 };
        let jitter = if self.jitter_ms > 0 {
            rng.gen_range(0..=self.jitter_ms)
        } else {
            0
        };
        base + spread + jitter
    }
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub malformed: u64,
    pub stale: u64,
    pub duplicates: u64,
    pub body_snaps: u64,
    pub dual_ownership: u64,
    pub authority_transfers: u64,
    /// Remote collision reports that matched a local one.
    pub collisions_confirmed: u64,
    pub collisions_accepted_late: u64,
    pub collisions_ignored: u64,
    pub rtt_ms: f32,
    pub clock_offset_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn disabled_simulation_is_transparent() {
        let mut rng = StdRng::seed_from_u64(1);
        let sim = PacketLossSimulation::default();
        assert!(!sim.should_drop(&mut rng));
        assert_eq!(sim.delay_ms(&mut rng), 0);
    }

    #[test]
    fn delay_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let sim = PacketLossSimulation {
            jitter_ms: 10,
            ..PacketLossSimulation::latency(50, 80)
        };
        for _ in 0..200 {
            let delay = sim.delay_ms(&mut rng);
            assert!((50..=90).contains(&delay));
        }
    }

    #[test]
    fn full_loss_drops_everything() {
        let mut rng = StdRng::seed_from_u64(3);
        let sim = PacketLossSimulation {
            enabled: true,
            loss_percent: 100.0,
            ..Default::default()
        };
        assert!((0..50).all(|_| sim.should_drop(&mut rng)));
    }
}

use std::collections::VecDeque;

use super::protocol::Message;

/// Pongs older than this are from an abandoned exchange.
const MAX_RTT_MS: u32 = 5_000;

/// Truncates a local millisecond clock to its wire form.
#[inline]
pub fn wire_time(now_ms: u64) -> u32 {
    now_ms as u32
}

/// Estimates `remote_clock - local_clock` from ping/pong round trips.
///
/// The offset is the plain mean of the retained samples; once the window is
/// full the oldest sample is dropped before a new one counts.
#[derive(Debug)]
pub struct ClockSync {
    samples: VecDeque<f64>,
    window: usize,
    fallback_ms: u64,
    rtt_ms: Option<u32>,
    outstanding: Option<u32>,
    started_ms: u64,
    last_completed_ms: Option<u64>,
}

impl ClockSync {
    pub fn new(window: usize, fallback_ms: u64, now_ms: u64) -> Self {
        Self {
            samples: VecDeque::with_capacity(window),
            window,
            fallback_ms,
            rtt_ms: None,
            outstanding: None,
            started_ms: now_ms,
            last_completed_ms: None,
        }
    }

    /// Only the designated side pings, unless no exchange has completed
    /// within the fallback period, in which case anyone may. Until the first
    /// sample arrives both sides ping.
    pub fn should_initiate(&self, designated: bool, now_ms: u64) -> bool {
        if designated || !self.is_synchronized() {
            return true;
        }
        let since = self.last_completed_ms.unwrap_or(self.started_ms);
        now_ms.saturating_sub(since) >= self.fallback_ms
    }

    pub fn make_ping(&mut self, now_ms: u64) -> Message {
        let origin_ms = wire_time(now_ms);
        self.outstanding = Some(origin_ms);
        Message::Ping { origin_ms }
    }

    pub fn make_pong(origin_ms: u32, now_ms: u64) -> Message {
        Message::Pong {
            origin_ms,
            reply_ms: wire_time(now_ms),
        }
    }

    /// Folds a completed round trip into the estimate, returning the new
    /// offset. Unsolicited or ancient pongs are ignored.
    pub fn on_pong(&mut self, origin_ms: u32, reply_ms: u32, now_ms: u64) -> Option<f64> {
        if self.outstanding != Some(origin_ms) {
            return None;
        }
        self.outstanding = None;

        let rtt = wire_time(now_ms).wrapping_sub(origin_ms);
        if rtt > MAX_RTT_MS {
            return None;
        }

        let estimated_remote = reply_ms as f64 + rtt as f64 / 2.0;
        let offset = wrap_signed(estimated_remote - wire_time(now_ms) as f64);

        self.samples.push_back(offset);
        while self.samples.len() > self.window {
            self.samples.pop_front();
        }

        self.rtt_ms = Some(rtt);
        self.last_completed_ms = Some(now_ms);

        let average = self.offset_ms();
        log::debug!("clock offset {:.1} ms (rtt {} ms)", average, rtt);
        Some(average)
    }

    pub fn offset_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn rtt_ms(&self) -> Option<u32> {
        self.rtt_ms
    }

    pub fn is_synchronized(&self) -> bool {
        !self.samples.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// How long ago, on the local clock, a remote timestamp happened.
    /// Negative values mean the remote stamp lies in our future.
    pub fn age_of_remote(&self, remote_ms: u32, now_ms: u64) -> i64 {
        let local_equivalent = remote_ms as f64 - self.offset_ms();
        wrap_signed(wire_time(now_ms) as f64 - local_equivalent).round() as i64
    }

    /// Local clock value corresponding to a remote timestamp.
    pub fn remote_to_local(&self, remote_ms: u32, now_ms: u64) -> u64 {
        let age = self.age_of_remote(remote_ms, now_ms);
        if age >= 0 {
            now_ms.saturating_sub(age as u64)
        } else {
            now_ms + age.unsigned_abs()
        }
    }

    pub fn reset(&mut self, now_ms: u64) {
        self.samples.clear();
        self.rtt_ms = None;
        self.outstanding = None;
        self.started_ms = now_ms;
        self.last_completed_ms = None;
    }
}

/// Maps a difference of two wrapped u32 clocks back into a signed range.
fn wrap_signed(delta: f64) -> f64 {
    const SPAN: f64 = u32::MAX as f64 + 1.0;
    let mut delta = delta % SPAN;
    if delta > SPAN / 2.0 {
        delta -= SPAN;
    } else if delta < -SPAN / 2.0 {
        delta += SPAN;
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs one exchange where the remote clock leads by `offset` and each
    /// leg takes `leg_a`/`leg_b` ms.
    fn exchange(sync: &mut ClockSync, local_now: u64, offset: i64, leg_a: u64, leg_b: u64) {
        let Message::Ping { origin_ms } = sync.make_ping(local_now) else {
            panic!("expected ping");
        };
        let remote_reply = (local_now + leg_a) as i64 + offset;
        let Message::Pong {
            origin_ms,
            reply_ms,
        } = ClockSync::make_pong(origin_ms, remote_reply as u64)
        else {
            panic!("expected pong");
        };
        sync.on_pong(origin_ms, reply_ms, local_now + leg_a + leg_b);
    }

    #[test]
    fn test_symmetric_latency_recovers_offset() {
        let mut sync = ClockSync::new(5, 3000, 0);
        exchange(&mut sync, 1_000, 250, 40, 40);
        assert!((sync.offset_ms() - 250.0).abs() < 0.5);
        assert_eq!(sync.rtt_ms(), Some(80));
    }

    #[test]
    fn test_converges_within_jitter() {
        let mut sync = ClockSync::new(5, 3000, 0);
        let legs = [(30, 34), (36, 30), (33, 33), (29, 37), (35, 31)];
        let mut now = 10_000;
        for (a, b) in legs {
            exchange(&mut sync, now, -1_200, a, b);
            now += 1_000;
        }
        assert_eq!(sync.sample_count(), 5);
        // Asymmetry per exchange is at most 4 ms, so error is at most half.
        assert!((sync.offset_ms() - -1_200.0).abs() <= 4.0);
    }

    #[test]
    fn test_window_drops_oldest_sample() {
        let mut sync = ClockSync::new(5, 3000, 0);
        exchange(&mut sync, 0, 10_000, 10, 10);
        for i in 1..=5 {
            exchange(&mut sync, i * 1000, 100, 10, 10);
        }
        assert_eq!(sync.sample_count(), 5);
        assert!((sync.offset_ms() - 100.0).abs() < 0.5);
    }

    #[test]
    fn test_unsolicited_pong_ignored() {
        let mut sync = ClockSync::new(5, 3000, 0);
        assert!(sync.on_pong(123, 456, 1_000).is_none());
        assert!(!sync.is_synchronized());
    }

    #[test]
    fn test_initiator_policy_with_fallback() {
        let mut sync = ClockSync::new(5, 3000, 0);
        assert!(sync.should_initiate(true, 100));
        assert!(sync.should_initiate(false, 100));

        exchange(&mut sync, 1_000, 0, 10, 10);
        assert!(sync.should_initiate(true, 1_500));
        assert!(!sync.should_initiate(false, 1_500));
        assert!(!sync.should_initiate(false, 4_000));
        assert!(sync.should_initiate(false, 4_020));
    }

    #[test]
    fn test_remote_timestamp_conversion() {
        let mut sync = ClockSync::new(5, 3000, 0);
        exchange(&mut sync, 5_000, 2_000, 20, 20);

        // Remote stamped 7_000 which is local 5_000.
        assert_eq!(sync.remote_to_local(7_000, 5_100), 5_000);
        assert_eq!(sync.age_of_remote(7_000, 5_100), 100);
    }

    #[test]
    fn test_negative_offset_across_wrap() {
        let mut sync = ClockSync::new(5, 3000, 0);
        exchange(&mut sync, 100, -500, 10, 10);
        assert!((sync.offset_ms() - -500.0).abs() < 0.5);
    }
}

use super::protocol::sequence_greater_than;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    /// Older than the last seen frame but within the reorder allowance.
    AcceptedOutOfOrder,
    Duplicate,
    Stale,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted | Self::AcceptedOutOfOrder)
    }
}

/// Filters state packets by their frame counter. Strictly newer frames are
/// always taken; a few consecutive older ones are tolerated as jitter.
#[derive(Debug)]
pub struct OrderingGuard {
    last_seen: Option<u16>,
    mismatches: u32,
    last_mismatch_ms: u64,
    threshold: u32,
    window_ms: u64,
}

impl OrderingGuard {
    pub fn new(threshold: u32, window_ms: u64) -> Self {
        Self {
            last_seen: None,
            mismatches: 0,
            last_mismatch_ms: 0,
            threshold,
            window_ms,
        }
    }

    pub fn check(&mut self, frame: u16, now_ms: u64) -> Verdict {
        let Some(last) = self.last_seen else {
            self.last_seen = Some(frame);
            return Verdict::Accepted;
        };

        if sequence_greater_than(frame, last) {
            self.last_seen = Some(frame);
            self.mismatches = 0;
            return Verdict::Accepted;
        }

        if frame == last {
            return Verdict::Duplicate;
        }

        if now_ms.saturating_sub(self.last_mismatch_ms) > self.window_ms {
            self.mismatches = 0;
        }
        self.mismatches += 1;
        self.last_mismatch_ms = now_ms;

        if self.mismatches <= self.threshold {
            Verdict::AcceptedOutOfOrder
        } else {
            Verdict::Stale
        }
    }

    pub fn last_seen(&self) -> Option<u16> {
        self.last_seen
    }

    pub fn reset(&mut self) {
        self.last_seen = None;
        self.mismatches = 0;
        self.last_mismatch_ms = 0;
    }
}

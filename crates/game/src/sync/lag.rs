use std::collections::VecDeque;

use crate::net::BodyState;

const MAX_RECORDS: usize = 64;

/// A paddle collision as this peer saw it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionRecord {
    pub frame: u32,
    pub timestamp_ms: u64,
    pub input_seq: u16,
    pub body: BodyState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchOutcome {
    /// Both peers saw the collision at about the same time.
    Confirmed(CollisionRecord),
    /// No local counterpart, but the report is recent enough to trust.
    AcceptedLate,
    Ignored,
}

impl MatchOutcome {
    pub fn adopts_remote(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// Short-lived buffer of local collisions matched against remote reports.
#[derive(Debug)]
pub struct EventMatcher {
    records: VecDeque<CollisionRecord>,
    tolerance_ms: u64,
    extended_tolerance_ms: u64,
    expiry_ms: u64,
    confirmed: u64,
    accepted_late: u64,
    ignored: u64,
}

impl EventMatcher {
    pub fn new(tolerance_ms: u64, extended_tolerance_ms: u64, expiry_ms: u64) -> Self {
        Self {
            records: VecDeque::with_capacity(MAX_RECORDS),
            tolerance_ms,
            extended_tolerance_ms,
            expiry_ms,
            confirmed: 0,
            accepted_late: 0,
            ignored: 0,
        }
    }

    pub fn record(&mut self, record: CollisionRecord) {
        if self.records.len() >= MAX_RECORDS {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// `remote_ms` is the remote event time already converted to the local
    /// clock. A matched record is consumed; expired records never match,
    /// even if the sweep has not removed them yet.
    pub fn on_remote(&mut self, remote_ms: u64, now_ms: u64) -> MatchOutcome {
        self.purge_expired(now_ms);
        let closest = self
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| (index, record.timestamp_ms.abs_diff(remote_ms)))
            .filter(|(_, diff)| *diff <= self.tolerance_ms)
            .min_by_key(|(_, diff)| *diff);

        if let Some(record) = closest.and_then(|(index, _)| self.records.remove(index)) {
            self.confirmed += 1;
            return MatchOutcome::Confirmed(record);
        }

        if now_ms.abs_diff(remote_ms) <= self.extended_tolerance_ms {
            self.accepted_late += 1;
            MatchOutcome::AcceptedLate
        } else {
            self.ignored += 1;
            MatchOutcome::Ignored
        }
    }

    /// Drops every record older than the expiry window.
    pub fn purge_expired(&mut self, now_ms: u64) -> usize {
        let before = self.records.len();
        let expiry = self.expiry_ms;
        self.records
            .retain(|record| now_ms.saturating_sub(record.timestamp_ms) <= expiry);
        before - self.records.len()
    }

    /// Time of the newest unmatched local collision.
    pub fn latest_timestamp(&self) -> Option<u64> {
        self.records.iter().map(|record| record.timestamp_ms).max()
    }

    pub fn tolerance_ms(&self) -> u64 {
        self.tolerance_ms
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn counts(&self) -> (u64, u64, u64) {
        (self.confirmed, self.accepted_late, self.ignored)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimerKind {
    HandshakeRetry,
    Ping,
    Watchdog,
    Sweep,
    Serve,
    MissGrace,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    due_ms: u64,
    /// `None` for one-shot timers.
    period_ms: Option<u64>,
}

/// Every deadline a session runs, kept in one place so a reset or shutdown
/// can cancel all of them at once.
#[derive(Debug, Default)]
pub struct Timers {
    timers: BTreeMap<TimerKind, Timer>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Periodic timer whose first expiry is one period from now.
    pub fn start_interval(&mut self, kind: TimerKind, period_ms: u64, now_ms: u64) {
        self.timers.insert(
            kind,
            Timer {
                due_ms: now_ms + period_ms,
                period_ms: Some(period_ms),
            },
        );
    }

    pub fn start_once(&mut self, kind: TimerKind, delay_ms: u64, now_ms: u64) {
        self.timers.insert(
            kind,
            Timer {
                due_ms: now_ms + delay_ms,
                period_ms: None,
            },
        );
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.timers.remove(&kind);
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
    }

    pub fn is_active(&self, kind: TimerKind) -> bool {
        self.timers.contains_key(&kind)
    }

    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    /// Returns every timer that expired by `now_ms`. Periodic timers are
    /// rescheduled from now (missed periods are not replayed), one-shots
    /// are removed.
    pub fn poll(&mut self, now_ms: u64) -> Vec<TimerKind> {
        let mut fired = Vec::new();
        self.timers.retain(|kind, timer| {
            if timer.due_ms > now_ms {
                return true;
            }
            fired.push(*kind);
            match timer.period_ms {
                Some(period) => {
                    timer.due_ms = now_ms + period;
                    true
                }
                None => false,
            }
        });
        fired
    }
}

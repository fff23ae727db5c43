use glam::Vec2;

use crate::net::BodyState;
use crate::physics::{Arena, sanitize_body};

const CORRECTION_EPSILON: f32 = 0.001;

/// Eases the rendered remote paddle toward the last received position.
#[derive(Debug, Clone)]
pub struct PaddleSmoother {
    target: f32,
    rendered: f32,
    rate: f32,
    snap_distance: f32,
}

impl PaddleSmoother {
    pub fn new(start: f32, rate: f32, snap_distance: f32) -> Self {
        Self {
            target: start,
            rendered: start,
            rate,
            snap_distance,
        }
    }

    pub fn set_target(&mut self, target: f32) {
        if target.is_finite() {
            self.target = target;
        }
    }

    /// One frame of exponential smoothing. Large jumps snap.
    pub fn update(&mut self) -> f32 {
        let remaining = self.target - self.rendered;
        if remaining.abs() > self.snap_distance {
            self.rendered = self.target;
        } else {
            self.rendered += remaining * self.rate;
        }
        self.rendered
    }

    pub fn snap(&mut self, position: f32) {
        self.target = position;
        self.rendered = position;
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn rendered(&self) -> f32 {
        self.rendered
    }
}

/// Last authoritative ball state received from the owner, stamped with
/// the local time it describes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkSnapshot {
    pub body: BodyState,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    Snapped { distance: f32 },
    Smoothed { delta: Vec2 },
}

/// Dead-reckons the remote-owned ball and blends in network corrections.
#[derive(Debug, Clone)]
pub struct BodyReconciler {
    network: Option<NetworkSnapshot>,
    rendered: BodyState,
    correction: Vec2,
    rate: f32,
    snap_distance: f32,
    tick_ms: f32,
    snaps: u64,
}

impl BodyReconciler {
    pub fn new(start: BodyState, rate: f32, snap_distance: f32, tick_ms: f32) -> Self {
        Self {
            network: None,
            rendered: start,
            correction: Vec2::ZERO,
            rate,
            snap_distance,
            tick_ms,
            snaps: 0,
        }
    }

    /// Fast-forwards `body` from `timestamp_ms` to `now_ms` and steers the
    /// rendered ball toward the prediction.
    pub fn on_update(
        &mut self,
        arena: &Arena,
        mut body: BodyState,
        timestamp_ms: u64,
        now_ms: u64,
    ) -> Correction {
        if sanitize_body(&mut body, arena.center()) {
            self.adopt(body, now_ms);
            return Correction::Snapped { distance: 0.0 };
        }

        self.network = Some(NetworkSnapshot { body, timestamp_ms });

        let mut predicted = body;
        let elapsed = now_ms.saturating_sub(timestamp_ms) as f32;
        arena.advance(&mut predicted, elapsed / self.tick_ms);

        let delta = predicted.position - self.rendered.position;
        let distance = delta.length();
        self.rendered.velocity = predicted.velocity;

        if distance > self.snap_distance || !distance.is_finite() {
            self.rendered = predicted;
            self.correction = Vec2::ZERO;
            self.snaps += 1;
            log::debug!("remote body snapped {:.1} px", distance);
            Correction::Snapped { distance }
        } else {
            self.correction = delta;
            Correction::Smoothed { delta }
        }
    }

    /// Takes `body` as the rendered state outright.
    pub fn adopt(&mut self, body: BodyState, now_ms: u64) {
        self.rendered = body;
        self.correction = Vec2::ZERO;
        self.network = Some(NetworkSnapshot {
            body,
            timestamp_ms: now_ms,
        });
    }

    /// One physics tick of extrapolation plus a slice of the pending
    /// correction. Returns true on a wall bounce.
    pub fn step(&mut self, arena: &Arena) -> bool {
        let bounced = arena.step(&mut self.rendered);

        if self.correction.length_squared() > CORRECTION_EPSILON * CORRECTION_EPSILON {
            let applied = self.correction * self.rate;
            self.rendered.position += applied;
            self.correction -= applied;
        } else {
            self.rendered.position += self.correction;
            self.correction = Vec2::ZERO;
        }

        sanitize_body(&mut self.rendered, arena.center());
        bounced
    }

    /// Lets local physics (e.g. a predicted paddle hit) rewrite the
    /// rendered state.
    pub fn rendered_mut(&mut self) -> &mut BodyState {
        &mut self.rendered
    }

    pub fn rendered(&self) -> BodyState {
        self.rendered
    }

    pub fn network(&self) -> Option<NetworkSnapshot> {
        self.network
    }

    pub fn correction(&self) -> Vec2 {
        self.correction
    }

    pub fn snaps(&self) -> u64 {
        self.snaps
    }

    pub fn reset(&mut self, body: BodyState) {
        self.network = None;
        self.rendered = body;
        self.correction = Vec2::ZERO;
    }
}

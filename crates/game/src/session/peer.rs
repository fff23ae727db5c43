use std::collections::VecDeque;

use bytes::Bytes;
use glam::Vec2;

use crate::config::{ConfigError, SyncConfig};
use crate::net::{
    BodyEvent, BodyEventKind, BodyState, ClockSync, DecodeError, DisconnectReason, Handshake,
    Message, NetworkStats, OrderingGuard, PeerIdentity, StatePacket, Transport, Verdict,
    decode_text, encode_text, sequence_greater_than, wire_time,
};
use crate::physics::{Arena, Side, sanitize_body};
use crate::simulation::{FixedTimestep, TimerKind, Timers};
use crate::sync::{
    AuthorityController, AuthorityRole, BodyReconciler, CollisionRecord, Correction,
    EventMatcher, InputCommand, InputPredictor, PaddleSmoother,
};

use super::events::SessionEvent;
use super::input::LocalInput;
use super::snapshot::{EndReason, MatchPhase, MatchSummary, RenderSnapshot};

const WATCHDOG_CHECK_MS: u64 = 250;
/// Ball claims from the previous owner can still be in flight this long
/// after a handoff.
const HANDOFF_SETTLE_MS: u64 = 500;

/// One peer of a match.
///
/// The session never reads a clock or touches a socket: the host feeds it
/// inbound payloads with [`Session::receive`], calls [`Session::tick`] once
/// per rendered frame and drains outbound payloads with [`Session::flush`].
/// Inbound messages are queued on arrival and only applied inside `tick`,
/// after local input, physics and transmission for that frame.
#[derive(Debug)]
pub struct Session {
    config: SyncConfig,
    arena: Arena,
    phase: MatchPhase,
    handshake: Handshake,
    clock: ClockSync,
    authority: AuthorityController,
    predictor: InputPredictor,
    remote_paddle: PaddleSmoother,
    reconciler: BodyReconciler,
    ball: BodyState,
    matcher: EventMatcher,
    guard: OrderingGuard,
    timers: Timers,
    timestep: FixedTimestep,

    inbox: VecDeque<Message>,
    inputs: VecDeque<LocalInput>,
    outbox: VecDeque<Message>,
    body_events: Vec<BodyEventKind>,
    events: VecDeque<SessionEvent>,
    stats: NetworkStats,

    frame: u32,
    last_tick_ms: u64,
    last_state_ms: Option<u64>,
    force_state: bool,
    remote_input_seq: Option<u16>,
    local_wins: bool,
    local_side: Side,
    local_lives: u8,
    remote_lives: u8,
    remote_serving: bool,
    past_goal_since: Option<u64>,
    acquired_at_ms: Option<u64>,
    epoch: u8,
    summary: Option<MatchSummary>,
}

impl Session {
    pub fn new(
        config: SyncConfig,
        identity: PeerIdentity,
        now_ms: u64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let arena = Arena::new(config.arena.clone());
        let center = arena.paddle_center_y();
        let half = config.arena.paddle_height / 2.0;
        let rest = BodyState::new(arena.center(), Vec2::ZERO);

        let handshake = Handshake::new(identity, config.watchdog_timeout_ms, now_ms);
        let mut timers = Timers::new();
        timers.start_interval(TimerKind::HandshakeRetry, config.handshake_retry_ms, now_ms);

        let mut outbox = VecDeque::new();
        outbox.push_back(handshake.connect_message());

        log::debug!(
            "session {} created (random {})",
            identity.peer_id,
            identity.random
        );

        Ok(Self {
            clock: ClockSync::new(config.clock_window, config.clock_fallback_ms, now_ms),
            authority: AuthorityController::new(),
            predictor: InputPredictor::new(center, half, config.arena.height - half),
            remote_paddle: PaddleSmoother::new(
                center,
                config.paddle_smoothing,
                config.paddle_snap_distance,
            ),
            reconciler: BodyReconciler::new(
                rest,
                config.body_correction_rate,
                config.body_snap_distance,
                config.tick_ms(),
            ),
            ball: rest,
            matcher: EventMatcher::new(
                config.collision_tolerance_ms,
                config.collision_extended_tolerance_ms,
                config.collision_expiry_ms,
            ),
            guard: OrderingGuard::new(
                config.ordering_mismatch_threshold,
                config.ordering_window_ms,
            ),
            timestep: FixedTimestep::new(config.frame_rate),
            timers,
            handshake,
            arena,
            phase: MatchPhase::Handshaking,
            inbox: VecDeque::new(),
            inputs: VecDeque::new(),
            outbox,
            body_events: Vec::new(),
            events: VecDeque::new(),
            stats: NetworkStats::default(),
            frame: 0,
            last_tick_ms: now_ms,
            last_state_ms: None,
            force_state: false,
            remote_input_seq: None,
            local_wins: false,
            local_side: Side::Left,
            local_lives: config.lives,
            remote_lives: config.lives,
            remote_serving: false,
            past_goal_since: None,
            acquired_at_ms: None,
            epoch: 0,
            summary: None,
            config,
        })
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn role(&self) -> AuthorityRole {
        self.authority.role()
    }

    pub fn local_side(&self) -> Side {
        self.local_side
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn summary(&self) -> Option<MatchSummary> {
        self.summary
    }

    pub fn clock(&self) -> &ClockSync {
        &self.clock
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// The ball as this peer simulates or extrapolates it.
    pub fn ball(&self) -> Option<BodyState> {
        match self.authority.role() {
            AuthorityRole::Serving | AuthorityRole::Simulating => Some(self.ball),
            AuthorityRole::Interpolating => Some(self.reconciler.rendered()),
            AuthorityRole::Idle => None,
        }
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = SessionEvent> + '_ {
        self.events.drain(..)
    }

    /// Queues one inbound datagram. Undecodable payloads are counted and
    /// dropped here; everything else waits for the next tick.
    pub fn receive(&mut self, payload: &[u8], now_ms: u64) {
        if self.phase == MatchPhase::Disconnected {
            return;
        }

        let message = match self.decode(payload) {
            Ok(message) => message,
            Err(e) => {
                self.stats.malformed += 1;
                log::trace!("dropping malformed payload ({} bytes): {}", payload.len(), e);
                return;
            }
        };

        self.stats.packets_received += 1;
        self.stats.bytes_received += payload.len() as u64;
        self.handshake.touch(now_ms);
        self.inbox.push_back(message);
    }

    pub fn input(&mut self, input: LocalInput) {
        self.inputs.push_back(input);
    }

    /// Advances the session by one rendered frame.
    pub fn tick(&mut self, now_ms: u64) -> RenderSnapshot {
        if self.phase == MatchPhase::Disconnected {
            return self.render();
        }

        let elapsed = now_ms.saturating_sub(self.last_tick_ms);
        self.last_tick_ms = now_ms;

        self.run_timers(now_ms);
        if self.phase == MatchPhase::Disconnected {
            return self.render();
        }

        self.apply_inputs(now_ms);

        let ticks = self.timestep.advance(elapsed);
        if self.phase == MatchPhase::Playing {
            let physics_now = self.physics_now(now_ms);
            for _ in 0..ticks {
                if self.phase != MatchPhase::Playing {
                    break;
                }
                self.physics_tick(physics_now);
            }
        }

        self.transmit(now_ms);
        self.drain_inbox(now_ms);
        self.remote_paddle.update();

        self.frame = self.frame.wrapping_add(1);
        self.stats.authority_transfers = self.authority.transfers();
        (
            self.stats.collisions_confirmed,
            self.stats.collisions_accepted_late,
            self.stats.collisions_ignored,
        ) = self.matcher.counts();
        self.render()
    }

    /// Hands every queued outbound message to `transport`.
    pub fn flush(&mut self, transport: &mut impl Transport) {
        while let Some(message) = self.outbox.pop_front() {
            let mut payload = message.encode();
            if self.config.text_safe {
                payload = Bytes::from(encode_text(&payload));
            }
            self.stats.packets_sent += 1;
            self.stats.bytes_sent += payload.len() as u64;
            log::trace!("-> {:?} ({} bytes)", message.tag(), payload.len());
            transport.send(payload);
        }
    }

    pub fn pending_outbound(&self) -> usize {
        self.outbox.len()
    }

    /// Announces departure and stops every timer. The goodbye still needs a
    /// final [`Session::flush`].
    pub fn shutdown(&mut self) {
        if self.phase == MatchPhase::Disconnected {
            return;
        }
        let reason = if self.phase == MatchPhase::Finished {
            DisconnectReason::MatchOver
        } else {
            DisconnectReason::Quit
        };
        self.outbox.push_back(Message::Disconnect { reason });
        self.end_session(EndReason::LocalQuit);
    }

    pub fn render(&self) -> RenderSnapshot {
        RenderSnapshot {
            phase: self.phase,
            local_side: self.local_side,
            local_paddle: self.predictor.position(),
            remote_paddle: self.remote_paddle.rendered(),
            ball: self.ball(),
            role: self.authority.role(),
            local_lives: self.local_lives,
            remote_lives: self.remote_lives,
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<Message, DecodeError> {
        if self.config.text_safe {
            let raw = decode_text(payload)?;
            Message::decode(&raw)
        } else {
            Message::decode(payload)
        }
    }

    /// Time the local physics state describes: the frame time minus
    /// whatever is still sitting in the accumulator.
    fn physics_now(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestep.lag_ms())
    }

    /// Owned ball extrapolated to the frame time, for outbound packets.
    fn outbound_body(&self) -> BodyState {
        let mut body = self.ball;
        self.arena.advance(&mut body, self.timestep.alpha());
        body
    }

    fn fast_forward(&self, mut body: BodyState, from_ms: u64, to_ms: u64) -> BodyState {
        sanitize_body(&mut body, self.arena.center());
        let ticks = to_ms.saturating_sub(from_ms) as f32 / self.config.tick_ms();
        self.arena.advance(&mut body, ticks);
        body
    }

    fn run_timers(&mut self, now_ms: u64) {
        for kind in self.timers.poll(now_ms) {
            match kind {
                TimerKind::HandshakeRetry => {
                    if self.handshake.needs_retransmit() {
                        log::trace!("retransmitting connect");
                        self.outbox.push_back(self.handshake.connect_message());
                    } else {
                        self.timers.cancel(TimerKind::HandshakeRetry);
                    }
                }
                TimerKind::Ping => self.maybe_ping(now_ms),
                TimerKind::Watchdog => {
                    if self.handshake.is_timed_out(now_ms) {
                        log::warn!(
                            "no traffic from peer for {} ms, disconnecting",
                            self.handshake.silence_ms(now_ms)
                        );
                        self.outbox.push_back(Message::Disconnect {
                            reason: DisconnectReason::Timeout,
                        });
                        self.end_session(EndReason::Timeout);
                        return;
                    }
                }
                TimerKind::Sweep => {
                    let purged = self.matcher.purge_expired(now_ms);
                    if purged > 0 {
                        log::trace!("purged {} expired collision records", purged);
                    }
                }
                TimerKind::Serve => self.launch(),
                TimerKind::MissGrace => {
                    if self.past_goal_since.is_some()
                        && self.authority.role() == AuthorityRole::Interpolating
                    {
                        log::debug!("no miss report from owner, conceding");
                        self.concede_point(now_ms);
                    }
                }
            }
        }
    }

    /// The peer that does not own the ball reads the owner's timestamps,
    /// so it is the one that keeps the clock estimate fresh.
    fn maybe_ping(&mut self, now_ms: u64) {
        if self.clock.should_initiate(!self.authority.is_owner(), now_ms) {
            let ping = self.clock.make_ping(now_ms);
            self.outbox.push_back(ping);
        }
    }

    fn apply_inputs(&mut self, now_ms: u64) {
        let step = self.config.arena.paddle_step;
        while let Some(input) = self.inputs.pop_front() {
            match input {
                LocalInput::Up => {
                    self.predictor.apply(InputCommand::Step(-step), now_ms);
                }
                LocalInput::Down => {
                    self.predictor.apply(InputCommand::Step(step), now_ms);
                }
                LocalInput::MoveTo(y) => {
                    self.predictor.apply(InputCommand::MoveTo(y), now_ms);
                }
                LocalInput::Launch => {
                    if self.phase == MatchPhase::Playing {
                        self.launch();
                    }
                }
                LocalInput::Restart => {
                    if matches!(self.phase, MatchPhase::Playing | MatchPhase::Finished) {
                        self.epoch = self.epoch.wrapping_add(1);
                        self.outbox.push_back(Message::Restart { epoch: self.epoch });
                        self.restart_match(now_ms);
                    }
                }
            }
        }
    }

    fn physics_tick(&mut self, now_ms: u64) {
        match self.authority.role() {
            AuthorityRole::Idle => {}
            AuthorityRole::Serving => {
                let position = self
                    .arena
                    .serve_position(self.local_side, self.predictor.position());
                self.ball = BodyState::new(position, Vec2::ZERO);
            }
            AuthorityRole::Simulating => self.simulate_owned(now_ms),
            AuthorityRole::Interpolating => self.extrapolate_remote(now_ms),
        }
    }

    fn simulate_owned(&mut self, now_ms: u64) {
        let previous = self.ball.position;
        if self.arena.step(&mut self.ball) {
            self.body_events.push(BodyEventKind::Bounce);
        }

        if !self.authority.is_releasing() {
            let remote_side = self.local_side.opposite();
            let paddle = self.remote_paddle.rendered();
            if self
                .arena
                .collide_paddle(previous, &mut self.ball, remote_side, paddle)
                .is_some()
            {
                self.authority.on_paddle_collision();
                self.record_collision(self.ball, now_ms);
                self.body_events.push(BodyEventKind::Collision);
            } else if self.arena.is_past_goal(&self.ball, remote_side) {
                self.win_point();
                return;
            }
        }

        sanitize_body(&mut self.ball, self.arena.center());
    }

    fn extrapolate_remote(&mut self, now_ms: u64) {
        if self.remote_serving {
            let side = self.local_side.opposite();
            let position = self
                .arena
                .serve_position(side, self.remote_paddle.rendered());
            self.reconciler.reset(BodyState::new(position, Vec2::ZERO));
            return;
        }

        let previous = self.reconciler.rendered().position;
        self.reconciler.step(&self.arena);

        let side = self.local_side;
        let paddle = self.predictor.position();
        let hit = self
            .arena
            .collide_paddle(previous, self.reconciler.rendered_mut(), side, paddle);

        if hit.is_some() {
            self.record_collision(self.reconciler.rendered(), now_ms);
        } else if self.past_goal_since.is_none()
            && self.arena.is_past_goal(&self.reconciler.rendered(), side)
        {
            self.past_goal_since = Some(now_ms);
            self.timers
                .start_once(TimerKind::MissGrace, self.config.miss_grace_ms, now_ms);
        }
    }

    fn record_collision(&mut self, body: BodyState, now_ms: u64) {
        self.matcher.record(CollisionRecord {
            frame: self.frame,
            timestamp_ms: now_ms,
            input_seq: self.predictor.latest_sequence(),
            body,
        });
    }

    fn transmit(&mut self, now_ms: u64) {
        if !matches!(self.phase, MatchPhase::Playing | MatchPhase::Finished) {
            return;
        }

        let mut kinds = std::mem::take(&mut self.body_events);
        if kinds.contains(&BodyEventKind::Collision) {
            kinds.retain(|kind| *kind != BodyEventKind::Bounce);
        }
        kinds.dedup();
        for kind in kinds {
            let event = BodyEvent {
                kind,
                timestamp_ms: wire_time(now_ms),
                body: self.outbound_body(),
            };
            self.outbox.push_back(Message::BodyEvent(event));
            self.authority.note_body_queued();
            self.force_state = true;
        }

        let state_due = self.force_state
            || self
                .last_state_ms
                .is_none_or(|sent| now_ms.saturating_sub(sent) >= self.config.state_interval_ms);

        if state_due {
            let body = self.authority.is_simulating().then(|| self.outbound_body());
            if body.is_some() {
                self.authority.note_body_queued();
            }
            self.outbox.push_back(Message::State(StatePacket {
                frame: self.frame as u16,
                paddle: self.predictor.position(),
                input_seq: self.predictor.latest_sequence(),
                last_ack: self.remote_input_seq.unwrap_or(0),
                body,
            }));
            // The state carries the paddle too.
            self.predictor.mark_sent(now_ms);
            self.last_state_ms = Some(now_ms);
            self.force_state = false;
        } else if let Some((position, input_seq)) = self
            .predictor
            .take_update(now_ms, self.config.paddle_interval_ms)
        {
            self.outbox.push_back(Message::Paddle {
                position,
                input_seq,
            });
        }

        if self.authority.try_release() {
            let physics_now = self.physics_now(now_ms);
            self.reconciler.adopt(self.ball, physics_now);
            self.remote_serving = false;
            self.events.push_back(SessionEvent::AuthorityChanged {
                role: self.authority.role(),
            });
        }
    }

    fn drain_inbox(&mut self, now_ms: u64) {
        while let Some(message) = self.inbox.pop_front() {
            if self.phase == MatchPhase::Disconnected {
                self.inbox.clear();
                return;
            }
            self.handle_message(message, now_ms);
        }
    }

    fn handle_message(&mut self, message: Message, now_ms: u64) {
        match message {
            Message::Connect { random, peer_id } => {
                self.on_connect(PeerIdentity::new(random, peer_id), false, now_ms)
            }
            Message::ConnectReply { random, peer_id } => {
                self.on_connect(PeerIdentity::new(random, peer_id), true, now_ms)
            }
            Message::Ping { origin_ms } => {
                self.outbox
                    .push_back(ClockSync::make_pong(origin_ms, now_ms));
            }
            other if !self.handshake.is_connected() => {
                log::trace!("ignoring {:?} before handshake", other.tag());
            }
            Message::Pong {
                origin_ms,
                reply_ms,
            } => {
                if let Some(offset) = self.clock.on_pong(origin_ms, reply_ms, now_ms) {
                    self.stats.clock_offset_ms = offset;
                    self.stats.rtt_ms = self.clock.rtt_ms().unwrap_or(0) as f32;
                }
            }
            Message::State(packet) => self.on_state(packet, now_ms),
            Message::Paddle {
                position,
                input_seq,
            } => {
                if self.accept_remote_input(input_seq) {
                    self.remote_paddle
                        .set_target(self.arena.clamp_paddle(position));
                }
            }
            Message::BodyEvent(event) => self.on_body_event(event, now_ms),
            Message::Miss { frame } => {
                if matches!(
                    self.authority.role(),
                    AuthorityRole::Interpolating | AuthorityRole::Idle
                ) && self.phase == MatchPhase::Playing
                {
                    log::debug!("peer reports a miss at frame {}", frame);
                    self.concede_point(now_ms);
                }
            }
            Message::Lives { lives } => self.on_remote_lives(lives),
            Message::Restart { epoch } => {
                if epoch != self.epoch {
                    log::info!("peer restarted the match (epoch {})", epoch);
                    self.epoch = epoch;
                    self.restart_match(now_ms);
                }
            }
            Message::Disconnect { reason } => {
                log::info!("peer disconnected: {}", reason.as_str());
                self.end_session(EndReason::RemoteQuit);
            }
        }
    }

    fn on_connect(&mut self, remote: PeerIdentity, is_reply: bool, now_ms: u64) {
        let outcome = self.handshake.on_connect(remote, is_reply);
        if let Some(reply) = outcome.reply {
            self.outbox.push_back(reply);
        }
        if outcome.newly_connected {
            self.start_match(remote, now_ms);
        }
    }

    fn start_match(&mut self, remote: PeerIdentity, now_ms: u64) {
        self.local_wins = self.handshake.local_wins().unwrap_or(false);
        self.local_side = if self.local_wins {
            Side::Right
        } else {
            Side::Left
        };

        self.timers.cancel(TimerKind::HandshakeRetry);
        self.timers
            .start_interval(TimerKind::Ping, self.config.ping_interval_ms, now_ms);
        self.timers
            .start_interval(TimerKind::Watchdog, WATCHDOG_CHECK_MS, now_ms);
        self.timers
            .start_interval(TimerKind::Sweep, self.config.sweep_interval_ms, now_ms);
        self.handshake.touch(now_ms);
        self.maybe_ping(now_ms);

        self.phase = MatchPhase::Playing;
        log::info!(
            "match started against peer {}: playing {:?}, {}",
            remote.peer_id,
            self.local_side,
            if self.local_wins { "serving first" } else { "receiving" }
        );
        self.events.push_back(SessionEvent::Connected {
            remote_peer_id: remote.peer_id,
            local_side: self.local_side,
        });

        self.start_rally(now_ms);
    }

    fn start_rally(&mut self, now_ms: u64) {
        if self.local_wins {
            self.begin_serve(now_ms);
        } else {
            self.authority.yield_to_remote();
            self.remote_serving = true;
        }
    }

    fn begin_serve(&mut self, now_ms: u64) {
        self.authority.begin_serve();
        self.remote_serving = false;
        self.past_goal_since = None;
        self.timers.cancel(TimerKind::MissGrace);

        let position = self
            .arena
            .serve_position(self.local_side, self.predictor.position());
        self.ball = BodyState::new(position, Vec2::ZERO);
        self.timers
            .start_once(TimerKind::Serve, self.config.serve_delay_ms, now_ms);
    }

    fn launch(&mut self) {
        if !self.authority.launch() {
            return;
        }
        self.timers.cancel(TimerKind::Serve);

        let position = self
            .arena
            .serve_position(self.local_side, self.predictor.position());
        let velocity = self
            .arena
            .serve_velocity(self.local_side, self.config.serve_velocity);
        self.ball = BodyState::new(position, velocity);
        self.body_events.push(BodyEventKind::Launch);
        log::debug!("ball launched at {:?}", velocity);
    }

    fn win_point(&mut self) {
        log::info!("peer missed the ball");
        self.outbox.push_back(Message::Miss {
            frame: self.frame as u16,
        });
        self.authority.relinquish();
        self.body_events.clear();
        self.events.push_back(SessionEvent::PointWon);
    }

    fn concede_point(&mut self, now_ms: u64) {
        self.timers.cancel(TimerKind::MissGrace);
        self.past_goal_since = None;
        self.local_lives = self.local_lives.saturating_sub(1);
        self.outbox.push_back(Message::Lives {
            lives: self.local_lives,
        });
        log::info!("missed the ball, {} lives left", self.local_lives);
        self.events.push_back(SessionEvent::PointLost {
            lives_left: self.local_lives,
        });

        if self.local_lives == 0 {
            self.finish();
        } else {
            self.begin_serve(now_ms);
        }
    }

    fn on_remote_lives(&mut self, lives: u8) {
        self.remote_lives = lives;
        if self.phase != MatchPhase::Playing {
            return;
        }
        if lives == 0 {
            self.finish();
            return;
        }
        // The peer conceded and serves next.
        if self.authority.role() != AuthorityRole::Serving {
            self.authority.yield_to_remote();
            self.remote_serving = true;
            self.past_goal_since = None;
            self.timers.cancel(TimerKind::MissGrace);
        }
    }

    fn finish(&mut self) {
        self.phase = MatchPhase::Finished;
        self.authority.relinquish();
        self.timers.cancel(TimerKind::Serve);
        self.timers.cancel(TimerKind::MissGrace);

        let summary = self.make_summary(EndReason::LivesExhausted);
        log::info!(
            "match over: {} ({} - {})",
            if summary.local_won() == Some(true) { "won" } else { "lost" },
            summary.local_lives,
            summary.remote_lives
        );
        self.summary = Some(summary);
        self.events.push_back(SessionEvent::MatchOver(summary));
    }

    fn restart_match(&mut self, now_ms: u64) {
        let center = self.arena.paddle_center_y();
        self.local_lives = self.config.lives;
        self.remote_lives = self.config.lives;
        self.summary = None;
        self.guard.reset();
        self.matcher.clear();
        self.predictor.reset(center);
        self.remote_paddle.snap(center);
        self.remote_input_seq = None;
        self.authority.reset();
        self.body_events.clear();
        self.past_goal_since = None;
        self.acquired_at_ms = None;
        self.timers.cancel(TimerKind::Serve);
        self.timers.cancel(TimerKind::MissGrace);
        self.phase = MatchPhase::Playing;
        self.events
            .push_back(SessionEvent::Restarted { epoch: self.epoch });
        self.start_rally(now_ms);
    }

    fn end_session(&mut self, reason: EndReason) {
        if self.phase == MatchPhase::Disconnected {
            return;
        }
        if self.summary.is_none() {
            self.summary = Some(self.make_summary(reason));
        }
        self.phase = MatchPhase::Disconnected;
        self.handshake.disconnect();
        self.authority.reset();
        self.timers.cancel_all();
        self.inbox.clear();
        self.events.push_back(SessionEvent::Disconnected { reason });
        log::info!("session ended: {}", reason.as_str());
    }

    fn make_summary(&self, reason: EndReason) -> MatchSummary {
        MatchSummary {
            reason,
            local_lives: self.local_lives,
            remote_lives: self.remote_lives,
            frames: self.frame,
            authority_transfers: self.authority.transfers(),
        }
    }

    /// Tracks the newest remote input sequence. Returns false for input
    /// older than what we already applied.
    fn accept_remote_input(&mut self, input_seq: u16) -> bool {
        match self.remote_input_seq {
            Some(last) if sequence_greater_than(last, input_seq) => false,
            _ => {
                self.remote_input_seq = Some(input_seq);
                true
            }
        }
    }

    fn on_state(&mut self, packet: StatePacket, now_ms: u64) {
        match self.guard.check(packet.frame, now_ms) {
            Verdict::Duplicate => {
                self.stats.duplicates += 1;
                return;
            }
            Verdict::Stale => {
                self.stats.stale += 1;
                log::trace!("dropping stale state for frame {}", packet.frame);
                return;
            }
            Verdict::AcceptedOutOfOrder => {
                // Late but tolerated: only the monotonic parts apply.
                self.predictor.reconcile(packet.last_ack);
                self.accept_remote_input(packet.input_seq);
                return;
            }
            Verdict::Accepted => {}
        }

        self.predictor.reconcile(packet.last_ack);
        if self.accept_remote_input(packet.input_seq) {
            self.remote_paddle
                .set_target(self.arena.clamp_paddle(packet.paddle));
        }

        if let Some(body) = packet.body {
            let latency = self.clock.rtt_ms().unwrap_or(0) as u64 / 2;
            let sent_ms = now_ms.saturating_sub(latency);
            self.on_remote_body(body, sent_ms, now_ms);
        }
    }

    fn on_remote_body(&mut self, body: BodyState, sent_ms: u64, now_ms: u64) {
        let physics_now = self.physics_now(now_ms);

        match self.authority.role() {
            AuthorityRole::Serving | AuthorityRole::Simulating => {
                if self.authority.is_releasing() || self.settling_handoff(now_ms) {
                    return;
                }
                self.stats.dual_ownership += 1;
                if self.local_wins {
                    log::warn!("both peers claim the ball, keeping it");
                    return;
                }
                log::warn!("both peers claim the ball, yielding");
                self.authority.yield_to_remote();
                self.reconciler.adopt(self.ball, physics_now);
                self.events.push_back(SessionEvent::AuthorityChanged {
                    role: self.authority.role(),
                });
            }
            AuthorityRole::Idle => self.authority.yield_to_remote(),
            AuthorityRole::Interpolating => {}
        }

        // Sent before the owner could know about a paddle hit we predicted.
        let horizon = self.matcher.tolerance_ms();
        if self
            .matcher
            .latest_timestamp()
            .is_some_and(|hit_ms| sent_ms <= hit_ms + horizon)
        {
            log::trace!("body update predates a predicted paddle hit, skipped");
            return;
        }

        self.remote_serving = false;
        let correction = self
            .reconciler
            .on_update(&self.arena, body, sent_ms, physics_now);
        if let Correction::Snapped { .. } = correction {
            self.stats.body_snaps += 1;
        }
    }

    fn settling_handoff(&self, now_ms: u64) -> bool {
        self.acquired_at_ms
            .is_some_and(|at| now_ms.saturating_sub(at) < HANDOFF_SETTLE_MS)
    }

    fn on_body_event(&mut self, event: BodyEvent, now_ms: u64) {
        let event_ms = self.clock.remote_to_local(event.timestamp_ms, now_ms);
        let physics_now = self.physics_now(now_ms);

        match event.kind {
            BodyEventKind::Launch => {
                if self.authority.is_owner() {
                    self.stats.dual_ownership += 1;
                    log::warn!("peer launched while we own the ball");
                    if self.local_wins {
                        return;
                    }
                }
                self.authority.yield_to_remote();
                self.remote_serving = false;
                self.past_goal_since = None;
                self.timers.cancel(TimerKind::MissGrace);
                self.timers.cancel(TimerKind::Serve);
                let body = self.fast_forward(event.body, event_ms, physics_now);
                self.reconciler.adopt(body, physics_now);
            }
            BodyEventKind::Bounce => {
                if self.authority.role() == AuthorityRole::Interpolating {
                    self.on_remote_body(event.body, event_ms, now_ms);
                }
            }
            BodyEventKind::Collision => self.on_remote_collision(event, event_ms, now_ms),
        }
    }

    /// The owner saw the ball hit our paddle and hands it to us.
    fn on_remote_collision(&mut self, event: BodyEvent, event_ms: u64, now_ms: u64) {
        match self.authority.role() {
            AuthorityRole::Serving => {
                log::debug!("collision report after conceding, ignored");
                return;
            }
            AuthorityRole::Simulating => return,
            AuthorityRole::Idle | AuthorityRole::Interpolating => {}
        }

        let physics_now = self.physics_now(now_ms);
        let outcome = self.matcher.on_remote(event_ms, now_ms);
        let body = if outcome.adopts_remote() {
            self.fast_forward(event.body, event_ms, physics_now)
        } else {
            log::debug!("collision report too old, keeping local trajectory");
            self.reconciler.rendered()
        };
        log::trace!("collision report: {:?}", outcome);

        self.authority.acquire();
        self.ball = body;
        self.acquired_at_ms = Some(now_ms);
        self.remote_serving = false;
        self.past_goal_since = None;
        self.timers.cancel(TimerKind::MissGrace);
        self.force_state = true;
        self.events.push_back(SessionEvent::AuthorityChanged {
            role: self.authority.role(),
        });
    }
}

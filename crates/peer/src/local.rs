use std::time::Duration;

use anyhow::Result;
use tokio::time::{MissedTickBehavior, interval};

use rally::{LinkSimulator, MatchPhase, PeerIdentity, Session};

use crate::autopilot::Autopilot;
use crate::config::PeerConfig;
use crate::events;
use crate::runner::shutdown_signal;
use crate::transport::now_ms;

const DEFAULT_LOCAL_SECS: u64 = 60;

struct LocalPeer {
    label: &'static str,
    session: Session,
    /// Link carrying this peer's datagrams to the other one.
    outbound: LinkSimulator,
}

/// Two autopiloted sessions in one process, joined by simulated links.
pub async fn run(config: PeerConfig) -> Result<()> {
    let start = now_ms();
    let link = config.link.clone().unwrap_or_default();
    log::info!(
        "local match: {}-{} ms latency, {}% loss, {} ms jitter",
        link.min_latency_ms,
        link.max_latency_ms,
        link.loss_percent,
        link.jitter_ms
    );

    let mut peers = [
        LocalPeer {
            label: "left",
            session: Session::new(
                config.sync.clone(),
                PeerIdentity::generate(config.peer_id),
                start,
            )?,
            outbound: LinkSimulator::new(link.clone(), start),
        },
        LocalPeer {
            label: "right",
            session: Session::new(
                config.sync.clone(),
                PeerIdentity::generate(config.peer_id.wrapping_add(1)),
                start,
            )?,
            outbound: LinkSimulator::new(link, start.wrapping_add(1)),
        },
    ];

    let arena = &config.sync.arena;
    let pilot = Autopilot::new(arena.paddle_step, arena.height / 2.0);
    let deadline = start + config.duration_secs.unwrap_or(DEFAULT_LOCAL_SECS) * 1_000;

    let mut frames = interval(Duration::from_secs_f32(
        1.0 / config.sync.frame_rate as f32,
    ));
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("interrupted");
                break;
            }
            _ = frames.tick() => {}
        }

        let now = now_ms();
        step(&mut peers, &pilot, now);

        let finished = peers.iter().all(|peer| {
            matches!(
                peer.session.phase(),
                MatchPhase::Finished | MatchPhase::Disconnected
            )
        });
        if finished {
            break;
        }
        if now >= deadline {
            log::info!("time limit reached");
            break;
        }
    }

    for peer in peers.iter_mut() {
        peer.session.shutdown();
        for event in peer.session.drain_events() {
            events::log_event(peer.label, &event);
        }
        let stats = peer.session.stats();
        log::info!(
            "[{}] {} sent, {} received, {} link drops, offset {:.1} ms",
            peer.label,
            stats.packets_sent,
            stats.packets_received,
            peer.outbound.dropped(),
            stats.clock_offset_ms
        );
        log::info!(
            "[{}] {} snaps, {} transfers, {} dual claims, {} confirmed hits",
            peer.label,
            stats.body_snaps,
            stats.authority_transfers,
            stats.dual_ownership,
            stats.collisions_confirmed
        );
    }

    Ok(())
}

fn step(peers: &mut [LocalPeer; 2], pilot: &Autopilot, now: u64) {
    let [left, right] = peers;
    for payload in left.outbound.take_ready(now) {
        right.session.receive(&payload, now);
    }
    for payload in right.outbound.take_ready(now) {
        left.session.receive(&payload, now);
    }

    for peer in [left, right] {
        if let Some(input) = pilot.steer(&peer.session.render()) {
            peer.session.input(input);
        }
        peer.session.tick(now);
        peer.outbound.set_time(now);
        peer.session.flush(&mut peer.outbound);
        for event in peer.session.drain_events() {
            events::log_event(peer.label, &event);
        }
    }
}

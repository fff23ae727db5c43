use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};

use rally::{MatchPhase, PeerIdentity, Session};

use crate::autopilot::Autopilot;
use crate::config::PeerConfig;
use crate::events;
use crate::transport::{ChannelTransport, now_ms};

const MAX_DATAGRAM: usize = 512;

pub async fn run(config: PeerConfig) -> Result<()> {
    let peer_addr = config
        .peer_addr
        .clone()
        .context("--peer is required unless --local is given")?;

    let socket = UdpSocket::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    socket
        .connect(&peer_addr)
        .await
        .with_context(|| format!("resolving peer {}", peer_addr))?;
    let socket = Arc::new(socket);
    log::info!("listening on {}, peer {}", socket.local_addr()?, peer_addr);

    let identity = PeerIdentity::generate(config.peer_id);
    let mut session = Session::new(config.sync.clone(), identity, now_ms())?;

    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let mut transport = ChannelTransport::new(outbound_tx, config.link.clone());

    let mut tasks = JoinSet::new();
    tasks.spawn(receive_loop(Arc::clone(&socket), inbound_tx));
    tasks.spawn(send_loop(Arc::clone(&socket), outbound_rx));

    let arena = &config.sync.arena;
    let pilot = Autopilot::new(arena.paddle_step, arena.height / 2.0);
    let deadline = config.duration_secs.map(|secs| now_ms() + secs * 1_000);

    let frame_time = Duration::from_secs_f32(1.0 / config.sync.frame_rate as f32);
    let mut frames = interval(frame_time);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("interrupted, leaving match");
                break;
            }
            _ = frames.tick() => {}
        }

        let now = now_ms();
        while let Ok(payload) = inbound_rx.try_recv() {
            session.receive(&payload, now);
        }

        if config.autoplay {
            if let Some(input) = pilot.steer(&session.render()) {
                session.input(input);
            }
        }

        let snapshot = session.tick(now);
        session.flush(&mut transport);
        transport.pump(now);

        for event in session.drain_events() {
            events::log_event("peer", &event);
        }

        if snapshot.phase == MatchPhase::Disconnected {
            break;
        }
        if deadline.is_some_and(|at| now >= at) {
            log::info!("time limit reached");
            break;
        }
    }

    // Say goodbye straight from here; the send task is about to go away.
    session.shutdown();
    let mut goodbye: Vec<Bytes> = Vec::new();
    session.flush(&mut goodbye);
    for payload in goodbye {
        if let Err(e) = socket.send(&payload).await {
            log::debug!("goodbye not sent: {}", e);
        }
    }
    for event in session.drain_events() {
        events::log_event("peer", &event);
    }

    tasks.abort_all();
    while tasks.join_next().await.is_some() {}

    let stats = session.stats();
    log::info!(
        "sent {} packets ({} bytes), received {} ({} bytes), {} malformed",
        stats.packets_sent,
        stats.bytes_sent,
        stats.packets_received,
        stats.bytes_received,
        stats.malformed
    );
    log::info!(
        "{} simulated drops, {} undelivered",
        transport.dropped(),
        transport.undelivered()
    );
    log::info!(
        "collision reports: {} confirmed, {} accepted late, {} ignored",
        stats.collisions_confirmed,
        stats.collisions_accepted_late,
        stats.collisions_ignored
    );
    if let Some(summary) = session.summary() {
        log::info!(
            "final: {} ({} - {}), {} authority transfers",
            summary.reason.as_str(),
            summary.local_lives,
            summary.remote_lives,
            summary.authority_transfers
        );
    }

    Ok(())
}

async fn receive_loop(socket: Arc<UdpSocket>, tx: UnboundedSender<Bytes>) {
    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        match socket.recv(&mut buf).await {
            Ok(len) => {
                if tx.send(Bytes::copy_from_slice(&buf[..len])).is_err() {
                    break;
                }
            }
            // The peer may simply not be up yet.
            Err(e) => {
                log::debug!("recv failed: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

async fn send_loop(socket: Arc<UdpSocket>, mut rx: UnboundedReceiver<Bytes>) {
    while let Some(payload) = rx.recv().await {
        if let Err(e) = socket.send(&payload).await {
            log::debug!("send failed: {}", e);
        }
    }
}

pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("cannot listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

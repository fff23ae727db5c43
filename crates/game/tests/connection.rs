mod common;

use bytes::Bytes;

use common::{FRAME_MS, Pair};
use rally::{
    AuthorityRole, EndReason, MatchPhase, Message, PacketLossSimulation, PeerIdentity,
    SessionEvent, Side, SyncConfig,
};

fn playing(pair: &Pair) -> bool {
    pair.a.phase() == MatchPhase::Playing && pair.b.phase() == MatchPhase::Playing
}

#[test]
fn test_higher_random_owns_first_serve() {
    let mut pair = Pair::latency(SyncConfig::default(), 50);
    assert!(pair.run_until(2_000, playing));

    assert_eq!(pair.a.local_side(), Side::Right);
    assert_eq!(pair.a.role(), AuthorityRole::Serving);
    assert_eq!(pair.b.local_side(), Side::Left);
    assert_eq!(pair.b.role(), AuthorityRole::Interpolating);

    let events: Vec<SessionEvent> = pair.a.drain_events().collect();
    assert!(events.contains(&SessionEvent::Connected {
        remote_peer_id: 2,
        local_side: Side::Right,
    }));
}

#[test]
fn test_equal_random_falls_back_to_peer_id() {
    let mut pair = Pair::with_identities(
        SyncConfig::default(),
        PacketLossSimulation::default(),
        0,
        PeerIdentity::new(5, 1),
        PeerIdentity::new(5, 9),
    );
    assert!(pair.run_until(1_000, playing));

    assert_eq!(pair.b.role(), AuthorityRole::Serving);
    assert_eq!(pair.a.role(), AuthorityRole::Interpolating);
}

#[test]
fn test_handshake_survives_packet_loss() {
    let link = PacketLossSimulation {
        enabled: true,
        loss_percent: 50.0,
        min_latency_ms: 20,
        max_latency_ms: 60,
        jitter_ms: 10,
    };
    let mut pair = Pair::new(SyncConfig::default(), link, 0);
    assert!(pair.run_until(15_000, playing));
}

#[test]
fn test_outage_disconnects_both_peers() {
    let mut pair = Pair::latency(SyncConfig::default(), 30);
    assert!(pair.run_until(2_000, playing));
    pair.run_for(500);

    pair.sever(true);
    pair.run_for(11_000);

    for session in [&pair.a, &pair.b] {
        assert_eq!(session.phase(), MatchPhase::Disconnected);
        assert_eq!(session.timers().active_count(), 0);
        assert_eq!(
            session.summary().map(|s| s.reason),
            Some(EndReason::Timeout)
        );
    }

    let frame = pair.a.frame();
    pair.run_for(10 * FRAME_MS);
    assert_eq!(pair.a.frame(), frame);
}

#[test]
fn test_short_outage_is_survived() {
    let mut pair = Pair::latency(SyncConfig::default(), 30);
    assert!(pair.run_until(2_000, playing));

    pair.sever(true);
    pair.run_for(4_000);
    pair.sever(false);
    pair.run_for(1_000);

    assert!(playing(&pair));
}

#[test]
fn test_graceful_disconnect_reaches_peer() {
    let mut pair = Pair::latency(SyncConfig::default(), 30);
    assert!(pair.run_until(2_000, playing));

    pair.a.shutdown();
    assert!(pair.run_until(pair.now + 500, |p| p.b.phase() == MatchPhase::Disconnected));
    assert_eq!(
        pair.b.summary().map(|s| s.reason),
        Some(EndReason::RemoteQuit)
    );
    assert_eq!(pair.b.timers().active_count(), 0);
}

#[test]
fn test_garbage_between_valid_traffic_is_dropped() {
    let mut pair = Pair::latency(SyncConfig::default(), 30);
    assert!(pair.run_until(2_000, playing));

    let b_now = pair.b_now();
    pair.b.receive(&[0xAB, 0xCD], b_now);
    pair.b.receive(&Message::Lives { lives: 3 }.encode()[..1], b_now);
    pair.a.receive(&Bytes::from_static(b"\x07\x00"), pair.now);
    pair.run_for(500);

    assert_eq!(pair.b.stats().malformed, 2);
    assert_eq!(pair.a.stats().malformed, 1);
    assert!(playing(&pair));
}

mod common;

use glam::Vec2;

use common::Pair;
use rally::{AuthorityRole, LocalInput, MatchPhase, PacketLossSimulation, SyncConfig};

fn skewed_pair(latency_ms: u32) -> Pair {
    Pair::new(
        SyncConfig::default(),
        PacketLossSimulation::latency(latency_ms, latency_ms),
        5_000,
    )
}

/// Runs to the first launch, waits for it to cross the link, then checks
/// that B's view of the ball stays with A's for 30 frames.
fn assert_serve_converges(pair: &mut Pair, settle_ms: u64) {
    assert!(pair.run_until(5_000, |p| p.a.role() == AuthorityRole::Simulating));
    let launched_at = pair.now;

    let a_ball = pair.a.ball().expect("owner has a ball");
    assert_eq!(a_ball.velocity, Vec2::new(-7.0, 1.4));
    assert!(pair.a.clock().is_synchronized());
    assert!(pair.b.clock().is_synchronized());

    pair.run_for(settle_ms);
    assert_eq!(pair.b.role(), AuthorityRole::Interpolating);

    for _ in 0..30 {
        pair.step();
        let a = pair.a.ball().expect("owner ball");
        let b = pair.b.ball().expect("remote ball");
        let error = a.position.distance(b.position);
        assert!(
            error < 5.0,
            "remote view {:.2} px off at {} ms after launch",
            error,
            pair.now - launched_at
        );
    }
}

/// Moves B's paddle onto the ball it currently sees.
fn track_ball(pair: &mut Pair) {
    if let Some(ball) = pair.b.ball() {
        pair.b.input(LocalInput::MoveTo(ball.position.y));
    }
}

#[test]
fn test_clock_offset_converges() {
    let mut pair = skewed_pair(100);
    pair.run_for(6_000);

    assert!(pair.a.clock().is_synchronized());
    assert!(pair.b.clock().is_synchronized());
    assert!((pair.a.stats().clock_offset_ms - 5_000.0).abs() < 20.0);
    assert!((pair.b.stats().clock_offset_ms + 5_000.0).abs() < 20.0);
}

#[test]
fn test_served_ball_converges_under_latency() {
    let mut pair = skewed_pair(200);
    // The launch is one link delay away from B.
    assert_serve_converges(&mut pair, 240);
}

#[test]
fn test_served_ball_converges_on_short_link() {
    let mut pair = Pair::latency(SyncConfig::default(), 50);
    assert_serve_converges(&mut pair, 240);
}

#[test]
fn test_paddle_hit_hands_ball_to_hitter() {
    let mut pair = skewed_pair(100);
    let mut handed_over = false;
    while pair.now < 10_000 {
        track_ball(&mut pair);
        pair.step();
        if pair.b.role() == AuthorityRole::Simulating {
            handed_over = true;
            break;
        }
    }
    assert!(handed_over);
    assert_eq!(pair.a.role(), AuthorityRole::Interpolating);

    let a = pair.a.ball().expect("A extrapolates the ball");
    let b = pair.b.ball().expect("B owns the ball");
    assert!(b.velocity.x > 0.0);
    assert!(
        (b.velocity - a.quantized().velocity).length() < 1e-3,
        "B took {:?}, A reported {:?}",
        b.velocity,
        a.velocity
    );
    assert_eq!(pair.a.stats().authority_transfers, 1);
    assert_eq!(pair.b.stats().authority_transfers, 1);
    assert_eq!(pair.a.stats().dual_ownership, 0);
    assert_eq!(pair.b.stats().dual_ownership, 0);

    // B predicted the hit itself, so the report adopted remote data.
    let stats = pair.b.stats();
    assert_eq!(stats.collisions_confirmed + stats.collisions_accepted_late, 1);
    assert_eq!(stats.collisions_ignored, 0);
}

#[test]
fn test_missed_ball_costs_a_life() {
    let mut pair = skewed_pair(100);
    assert!(pair.run_until(10_000, |p| p.a.render().remote_lives == 4));

    assert_eq!(pair.b.render().local_lives, 4);
    assert_eq!(pair.a.render().local_lives, 5);
    assert!(pair.b.role() == AuthorityRole::Serving || pair.b.role() == AuthorityRole::Simulating);
    assert_eq!(pair.a.phase(), MatchPhase::Playing);
}

use log::Level;

use rally::{SessionEvent, Side};

fn side_name(side: Side) -> &'static str {
    match side {
        Side::Left => "left",
        Side::Right => "right",
    }
}

/// Log level and line for one session event.
pub fn describe(event: &SessionEvent) -> (Level, String) {
    match event {
        SessionEvent::Connected {
            remote_peer_id,
            local_side,
        } => (
            Level::Info,
            format!(
                "connected to peer {}, playing on the {}",
                remote_peer_id,
                side_name(*local_side)
            ),
        ),
        SessionEvent::AuthorityChanged { role } => {
            (Level::Debug, format!("ball authority now {:?}", role))
        }
        SessionEvent::PointWon => (Level::Info, "point won".to_string()),
        SessionEvent::PointLost { lives_left } => {
            (Level::Info, format!("point lost, {} lives left", lives_left))
        }
        SessionEvent::Restarted { epoch } => {
            (Level::Info, format!("match restarted (epoch {})", epoch))
        }
        SessionEvent::MatchOver(summary) => {
            let outcome = match summary.local_won() {
                Some(true) => "won",
                Some(false) => "lost",
                None => "ended",
            };
            (
                Level::Info,
                format!(
                    "match {} {} - {} after {} frames",
                    outcome, summary.local_lives, summary.remote_lives, summary.frames
                ),
            )
        }
        SessionEvent::Disconnected { reason } => {
            (Level::Warn, format!("disconnected: {}", reason.as_str()))
        }
    }
}

pub fn log_event(label: &str, event: &SessionEvent) {
    let (level, line) = describe(event);
    log::log!(level, "[{}] {}", label, line);
}

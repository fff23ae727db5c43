use crate::physics::Side;
use crate::sync::AuthorityRole;

use super::snapshot::{EndReason, MatchSummary};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected {
        remote_peer_id: u32,
        local_side: Side,
    },
    AuthorityChanged {
        role: AuthorityRole,
    },
    PointWon,
    PointLost {
        lives_left: u8,
    },
    Restarted {
        epoch: u8,
    },
    MatchOver(MatchSummary),
    Disconnected {
        reason: EndReason,
    },
}

use crate::net::BodyState;
use crate::physics::Side;
use crate::sync::AuthorityRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Handshaking,
    Playing,
    Finished,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    LivesExhausted,
    LocalQuit,
    RemoteQuit,
    Timeout,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::LivesExhausted => "match over",
            EndReason::LocalQuit => "quit",
            EndReason::RemoteQuit => "peer quit",
            EndReason::Timeout => "timed out",
        }
    }
}

/// Final state of a match, handed to whatever archives results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchSummary {
    pub reason: EndReason,
    pub local_lives: u8,
    pub remote_lives: u8,
    pub frames: u32,
    pub authority_transfers: u64,
}

impl MatchSummary {
    /// `None` when the match ended without a winner.
    pub fn local_won(&self) -> Option<bool> {
        match self.reason {
            EndReason::LivesExhausted => Some(self.remote_lives == 0),
            _ => None,
        }
    }
}

/// Everything the presentation layer needs for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSnapshot {
    pub phase: MatchPhase,
    pub local_side: Side,
    pub local_paddle: f32,
    pub remote_paddle: f32,
    pub ball: Option<BodyState>,
    pub role: AuthorityRole,
    pub local_lives: u8,
    pub remote_lives: u8,
}

use std::cmp::Ordering;

use super::protocol::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// The values a peer advertises in its connect message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerIdentity {
    pub random: u32,
    pub peer_id: u32,
}

impl PeerIdentity {
    pub fn new(random: u32, peer_id: u32) -> Self {
        Self { random, peer_id }
    }

    pub fn generate(peer_id: u32) -> Self {
        Self {
            random: rand::random(),
            peer_id,
        }
    }

    /// Larger random value wins; equal values fall back to the stable id.
    pub fn outranks(&self, other: &PeerIdentity) -> bool {
        match self.random.cmp(&other.random) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.peer_id > other.peer_id,
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct HandshakeOutcome {
    pub reply: Option<Message>,
    pub newly_connected: bool,
}

/// Symmetric connect exchange plus the liveness watchdog.
#[derive(Debug)]
pub struct Handshake {
    local: PeerIdentity,
    remote: Option<PeerIdentity>,
    state: ConnectionState,
    last_receive_ms: u64,
    timeout_ms: u64,
}

impl Handshake {
    pub fn new(local: PeerIdentity, timeout_ms: u64, now_ms: u64) -> Self {
        Self {
            local,
            remote: None,
            state: ConnectionState::Connecting,
            last_receive_ms: now_ms,
            timeout_ms,
        }
    }

    pub fn local(&self) -> PeerIdentity {
        self.local
    }

    pub fn remote(&self) -> Option<PeerIdentity> {
        self.remote
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn needs_retransmit(&self) -> bool {
        self.state == ConnectionState::Connecting
    }

    pub fn connect_message(&self) -> Message {
        Message::Connect {
            random: self.local.random,
            peer_id: self.local.peer_id,
        }
    }

    /// Every plain connect is answered, whatever our own state. Replies are
    /// never answered, which keeps the exchange from echoing forever.
    pub fn on_connect(&mut self, remote: PeerIdentity, is_reply: bool) -> HandshakeOutcome {
        let mut outcome = HandshakeOutcome::default();

        if self.state == ConnectionState::Disconnected {
            return outcome;
        }

        if !is_reply {
            outcome.reply = Some(Message::ConnectReply {
                random: self.local.random,
                peer_id: self.local.peer_id,
            });
        }

        if let Some(known) = self.remote.filter(|known| *known != remote) {
            log::warn!(
                "peer re-announced with different identity ({} -> {})",
                known.peer_id,
                remote.peer_id
            );
        }

        self.remote = Some(remote);
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Connected;
            outcome.newly_connected = true;
            log::info!(
                "connected to peer {} (local {} / remote {})",
                remote.peer_id,
                self.local.random,
                remote.random
            );
        }

        outcome
    }

    /// `Some(true)` once connected and this side won the tie-break.
    pub fn local_wins(&self) -> Option<bool> {
        self.remote.map(|remote| self.local.outranks(&remote))
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.last_receive_ms = now_ms;
    }

    pub fn silence_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_receive_ms)
    }

    pub fn is_timed_out(&self, now_ms: u64) -> bool {
        self.silence_ms(now_ms) > self.timeout_ms
    }

    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tie_break() {
        let a = PeerIdentity::new(42, 1);
        let b = PeerIdentity::new(17, 2);
        assert!(a.outranks(&b));
        assert!(!b.outranks(&a));

        let c = PeerIdentity::new(42, 9);
        assert!(c.outranks(&a));
        assert!(!a.outranks(&c));
    }

    #[test]
    fn test_connect_always_answered() {
        let mut handshake = Handshake::new(PeerIdentity::new(42, 1), 10_000, 0);
        let remote = PeerIdentity::new(17, 2);

        let first = handshake.on_connect(remote, false);
        assert!(first.newly_connected);
        assert_eq!(
            first.reply,
            Some(Message::ConnectReply {
                random: 42,
                peer_id: 1
            })
        );

        let again = handshake.on_connect(remote, false);
        assert!(!again.newly_connected);
        assert!(again.reply.is_some());
    }

    #[test]
    fn test_reply_is_not_answered() {
        let mut handshake = Handshake::new(PeerIdentity::new(1, 1), 10_000, 0);
        let outcome = handshake.on_connect(PeerIdentity::new(2, 2), true);
        assert!(outcome.newly_connected);
        assert!(outcome.reply.is_none());
        assert!(!handshake.needs_retransmit());
        assert_eq!(handshake.local_wins(), Some(false));
    }

    #[test]
    fn test_watchdog() {
        let mut handshake = Handshake::new(PeerIdentity::new(1, 1), 10_000, 0);
        handshake.touch(1_000);
        assert!(!handshake.is_timed_out(11_000));
        assert!(handshake.is_timed_out(11_001));
    }

    #[test]
    fn test_disconnected_ignores_connects() {
        let mut handshake = Handshake::new(PeerIdentity::new(1, 1), 10_000, 0);
        handshake.disconnect();
        let outcome = handshake.on_connect(PeerIdentity::new(2, 2), false);
        assert_eq!(outcome, HandshakeOutcome::default());
        assert_eq!(handshake.state(), ConnectionState::Disconnected);
    }
}

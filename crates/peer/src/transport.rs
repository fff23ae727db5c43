use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedSender;

use rally::{LinkSimulator, PacketLossSimulation, Transport};

/// Wall-clock milliseconds. Both peers read the same epoch, so clock sync
/// only has to absorb host drift.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Outbound datagrams handed to the socket task, optionally through a
/// simulated lossy link first.
pub struct ChannelTransport {
    tx: UnboundedSender<Bytes>,
    link: Option<LinkSimulator>,
    undelivered: u64,
}

impl ChannelTransport {
    pub fn new(tx: UnboundedSender<Bytes>, simulation: Option<PacketLossSimulation>) -> Self {
        let link = simulation
            .filter(|sim| sim.enabled)
            .map(|sim| LinkSimulator::new(sim, rand_seed()));
        Self {
            tx,
            link,
            undelivered: 0,
        }
    }

    /// Releases simulated datagrams whose delay has passed.
    pub fn pump(&mut self, now_ms: u64) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        link.set_time(now_ms);
        for payload in link.take_ready(now_ms) {
            forward(&self.tx, payload, &mut self.undelivered);
        }
    }

    pub fn dropped(&self) -> u64 {
        self.link.as_ref().map_or(0, |link| link.dropped())
    }

    /// Datagrams that found the socket task already gone.
    pub fn undelivered(&self) -> u64 {
        self.undelivered
    }
}

fn forward(tx: &UnboundedSender<Bytes>, payload: Bytes, undelivered: &mut u64) {
    if tx.send(payload).is_err() {
        *undelivered += 1;
        log::debug!("socket task gone, datagram dropped");
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, payload: Bytes) {
        match self.link.as_mut() {
            Some(link) => link.push(payload),
            None => forward(&self.tx, payload, &mut self.undelivered),
        }
    }
}

fn rand_seed() -> u64 {
    now_ms() ^ u64::from(std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn direct_send_without_simulation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = ChannelTransport::new(tx, None);
        transport.send(Bytes::from_static(b"hi"));
        assert_eq!(rx.try_recv().ok(), Some(Bytes::from_static(b"hi")));
    }

    #[test]
    fn simulated_delay_holds_datagrams() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport =
            ChannelTransport::new(tx, Some(PacketLossSimulation::latency(100, 100)));
        transport.pump(1_000);
        transport.send(Bytes::from_static(b"late"));

        transport.pump(1_050);
        assert!(rx.try_recv().is_err());
        transport.pump(1_100);
        assert_eq!(rx.try_recv().ok(), Some(Bytes::from_static(b"late")));
    }

    #[test]
    fn closed_channel_counted_on_both_paths() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut direct = ChannelTransport::new(tx.clone(), None);
        direct.send(Bytes::from_static(b"a"));
        assert_eq!(direct.undelivered(), 1);

        let mut delayed = ChannelTransport::new(tx, Some(PacketLossSimulation::latency(10, 10)));
        delayed.pump(0);
        delayed.send(Bytes::from_static(b"b"));
        delayed.pump(10);
        assert_eq!(delayed.undelivered(), 1);
    }
}

mod clock;
mod connection;
mod ordering;
mod protocol;
mod simulator;
mod stats;
mod transport;

pub use clock::{ClockSync, wire_time};
pub use connection::{ConnectionState, Handshake, HandshakeOutcome, PeerIdentity};
pub use ordering::{OrderingGuard, Verdict};
pub use protocol::{
    BodyEvent, BodyEventKind, BodyState, DecodeError, DisconnectReason, MAX_WIRE_VELOCITY,
    Message, MessageTag, POSITION_SCALE, StatePacket, VELOCITY_SCALE, decode_text, encode_text,
    sequence_greater_than,
};
pub use simulator::LinkSimulator;
pub use stats::{NetworkStats, PacketLossSimulation};
pub use transport::Transport;

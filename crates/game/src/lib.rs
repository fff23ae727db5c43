pub mod config;
pub mod net;
pub mod physics;
pub mod session;
pub mod simulation;
pub mod sync;

pub use config::{
    ArenaConfig, ConfigError, DEFAULT_FRAME_RATE, DEFAULT_PORT, DEFAULT_WATCHDOG_MS, SyncConfig,
};
pub use net::{
    BodyEvent, BodyEventKind, BodyState, ClockSync, ConnectionState, DecodeError,
    DisconnectReason, Handshake, LinkSimulator, Message, MessageTag, NetworkStats,
    PacketLossSimulation, PeerIdentity, StatePacket, Transport,
};
pub use physics::{Arena, Side};
pub use session::{
    EndReason, LocalInput, MatchPhase, MatchSummary, RenderSnapshot, Session, SessionEvent,
};
pub use simulation::{FixedTimestep, TimerKind, Timers};
pub use sync::{AuthorityController, AuthorityRole};

mod tick;
mod timers;

pub use tick::FixedTimestep;
pub use timers::{TimerKind, Timers};

mod events;
mod input;
mod peer;
mod snapshot;

pub use events::SessionEvent;
pub use input::LocalInput;
pub use peer::Session;
pub use snapshot::{EndReason, MatchPhase, MatchSummary, RenderSnapshot};

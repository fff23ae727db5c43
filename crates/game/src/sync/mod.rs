mod authority;
mod interpolation;
mod lag;
mod prediction;

pub use authority::{AuthorityController, AuthorityRole};
pub use interpolation::{BodyReconciler, Correction, NetworkSnapshot, PaddleSmoother};
pub use lag::{CollisionRecord, EventMatcher, MatchOutcome};
pub use prediction::{InputCommand, InputPredictor, InputRecord};

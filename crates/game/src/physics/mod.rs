mod arena;
mod body;

pub use arena::{Arena, PaddleHit, Side};
pub use body::{integrate, sanitize_body};

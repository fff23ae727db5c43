/// Discrete events from the local input boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocalInput {
    Up,
    Down,
    /// Absolute paddle position, e.g. from a drag.
    MoveTo(f32),
    /// Launch the ball early while serving.
    Launch,
    Restart,
}

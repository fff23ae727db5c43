use rally::{LocalInput, RenderSnapshot, Side};

/// Steers a paddle toward the ball when it is heading our way, and back to
/// the middle otherwise.
#[derive(Debug, Clone)]
pub struct Autopilot {
    max_step: f32,
    center: f32,
}

impl Autopilot {
    pub fn new(max_step: f32, center: f32) -> Self {
        Self { max_step, center }
    }

    pub fn steer(&self, snapshot: &RenderSnapshot) -> Option<LocalInput> {
        let incoming = snapshot.ball.filter(|ball| {
            let toward_left = ball.velocity.x < 0.0;
            toward_left == (snapshot.local_side == Side::Left)
        });
        let target = incoming.map_or(self.center, |ball| ball.position.y);

        let delta = target - snapshot.local_paddle;
        if delta.abs() < 1.0 {
            return None;
        }
        let step = delta.clamp(-self.max_step, self.max_step);
        Some(LocalInput::MoveTo(snapshot.local_paddle + step))
    }
}

use glam::Vec2;

use crate::config::ArenaConfig;
use crate::net::BodyState;

use super::body::integrate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Horizontal sign pointing away from this side's paddle.
    pub fn outward(self) -> f32 {
        match self {
            Self::Left => 1.0,
            Self::Right => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaddleHit {
    pub side: Side,
    /// Where on the paddle the ball struck, -1 (top) to 1 (bottom).
    pub offset: f32,
}

/// The deterministic rules of the playfield.
#[derive(Debug, Clone)]
pub struct Arena {
    config: ArenaConfig,
}

impl Arena {
    pub fn new(config: ArenaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.config.width / 2.0, self.config.height / 2.0)
    }

    pub fn paddle_center_y(&self) -> f32 {
        self.config.height / 2.0
    }

    pub fn clamp_paddle(&self, y: f32) -> f32 {
        let half = self.config.paddle_height / 2.0;
        if !y.is_finite() {
            return self.paddle_center_y();
        }
        y.clamp(half, self.config.height - half)
    }

    pub fn paddle_x(&self, side: Side) -> f32 {
        match side {
            Side::Left => self.config.paddle_inset,
            Side::Right => self.config.width - self.config.paddle_inset,
        }
    }

    /// The x coordinate of the paddle surface facing the arena.
    pub fn paddle_face(&self, side: Side) -> f32 {
        self.paddle_x(side) + side.outward() * self.config.paddle_width / 2.0
    }

    /// One physics tick for the ball. Returns true on a wall bounce.
    pub fn step(&self, body: &mut BodyState) -> bool {
        integrate(body, 1.0, self.config.height, self.config.ball_radius)
    }

    /// Dead reckoning across `ticks` (may be fractional), using the same
    /// per-tick integration as [`Arena::step`].
    pub fn advance(&self, body: &mut BodyState, ticks: f32) -> u32 {
        if ticks <= 0.0 || !ticks.is_finite() {
            return 0;
        }
        let whole = ticks.floor() as u32;
        let fraction = ticks - whole as f32;
        let mut bounces = 0;
        for _ in 0..whole {
            if self.step(body) {
                bounces += 1;
            }
        }
        if fraction > 0.0
            && integrate(body, fraction, self.config.height, self.config.ball_radius)
        {
            bounces += 1;
        }
        bounces
    }

    /// Tests whether the ball moving from `previous` to `body.position`
    /// crossed the paddle on `side`; reflects it if so.
    pub fn collide_paddle(
        &self,
        previous: Vec2,
        body: &mut BodyState,
        side: Side,
        paddle_y: f32,
    ) -> Option<PaddleHit> {
        let radius = self.config.ball_radius;
        let face = self.paddle_face(side);
        let outward = side.outward();

        // Must be travelling toward the paddle.
        if body.velocity.x * outward >= 0.0 {
            return None;
        }

        let leading_prev = previous.x - outward * radius;
        let leading_now = body.position.x - outward * radius;
        let was_in_front = (leading_prev - face) * outward >= 0.0;
        let is_behind = (leading_now - face) * outward < 0.0;
        if !was_in_front || !is_behind {
            return None;
        }

        let half = self.config.paddle_height / 2.0;
        let dy = body.position.y - paddle_y;
        if dy.abs() > half + radius {
            return None;
        }

        let penetration = face - leading_now;
        body.position.x += 2.0 * penetration;
        body.velocity.x = -body.velocity.x * self.config.speed_up;

        let offset = (dy / half).clamp(-1.0, 1.0);
        body.velocity.y += offset * self.config.english;

        let speed = body.velocity.length();
        if speed > self.config.max_ball_speed {
            body.velocity *= self.config.max_ball_speed / speed;
        }

        Some(PaddleHit { side, offset })
    }

    /// True once the ball has fully left the field behind `side`'s paddle.
    pub fn is_past_goal(&self, body: &BodyState, side: Side) -> bool {
        let radius = self.config.ball_radius;
        match side {
            Side::Left => body.position.x + radius < 0.0,
            Side::Right => body.position.x - radius > self.config.width,
        }
    }

    /// Ball resting against the serving paddle.
    pub fn serve_position(&self, side: Side, paddle_y: f32) -> Vec2 {
        let x = self.paddle_face(side) + side.outward() * (self.config.ball_radius + 1.0);
        Vec2::new(x, paddle_y)
    }

    pub fn serve_velocity(&self, side: Side, serve: [f32; 2]) -> Vec2 {
        Vec2::new(serve[0].abs() * side.outward(), serve[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> Arena {
        Arena::new(ArenaConfig::default())
    }

    #[test]
    fn test_serve_from_right_moves_left() {
        let arena = arena();
        let velocity = arena.serve_velocity(Side::Right, [7.0, 1.4]);
        assert_eq!(velocity, Vec2::new(-7.0, 1.4));
        assert!(arena.serve_position(Side::Right, 300.0).x < arena.paddle_face(Side::Right));
    }

    #[test]
    fn test_paddle_hit_reflects() {
        let arena = arena();
        let face = arena.paddle_face(Side::Left);
        let previous = Vec2::new(face + 10.0, 300.0);
        let mut body = BodyState::new(previous, Vec2::new(-7.0, 0.0));
        body.position += body.velocity;

        let hit = arena
            .collide_paddle(previous, &mut body, Side::Left, 300.0)
            .expect("should hit");
        assert_eq!(hit.side, Side::Left);
        assert!(body.velocity.x > 7.0);
        assert!(body.position.x - 8.0 >= face);
    }

    #[test]
    fn test_paddle_miss_when_offset() {
        let arena = arena();
        let face = arena.paddle_face(Side::Left);
        let previous = Vec2::new(face + 10.0, 100.0);
        let mut body = BodyState::new(previous, Vec2::new(-7.0, 0.0));
        body.position += body.velocity;

        assert!(arena.collide_paddle(previous, &mut body, Side::Left, 400.0).is_none());
        assert!(body.velocity.x < 0.0);
    }

    #[test]
    fn test_no_hit_when_moving_away() {
        let arena = arena();
        let face = arena.paddle_face(Side::Right);
        let previous = Vec2::new(face - 20.0, 300.0);
        let mut body = BodyState::new(previous, Vec2::new(-5.0, 0.0));
        body.position += body.velocity;
        assert!(arena.collide_paddle(previous, &mut body, Side::Right, 300.0).is_none());
    }

    #[test]
    fn test_speed_is_capped() {
        let arena = arena();
        let face = arena.paddle_face(Side::Right);
        let previous = Vec2::new(face - 15.0, 300.0);
        let mut body = BodyState::new(previous, Vec2::new(19.9, 0.0));
        body.position += body.velocity;
        arena
            .collide_paddle(previous, &mut body, Side::Right, 340.0)
            .expect("should hit");
        assert!(body.velocity.length() <= 20.0 + 1e-3);
        assert!(body.velocity.x < 0.0);
    }

    #[test]
    fn test_advance_matches_stepping() {
        let arena = arena();
        let start = BodyState::new(Vec2::new(400.0, 20.0), Vec2::new(-7.0, -6.0));

        let mut stepped = start;
        for _ in 0..12 {
            arena.step(&mut stepped);
        }
        let mut advanced = start;
        let bounces = arena.advance(&mut advanced, 12.0);

        assert_eq!(stepped, advanced);
        assert_eq!(bounces, 1);
    }

    #[test]
    fn test_goal_detection() {
        let arena = arena();
        let body = BodyState::new(Vec2::new(-9.0, 300.0), Vec2::new(-7.0, 0.0));
        assert!(arena.is_past_goal(&body, Side::Left));
        assert!(!arena.is_past_goal(&body, Side::Right));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityRole {
    /// Nobody has served yet, or the point is over.
    Idle,
    /// We own the ball and it rides on our paddle until launched.
    Serving,
    /// We own the ball and run its physics.
    Simulating,
    /// The remote peer owns the ball; we extrapolate it.
    Interpolating,
}

/// Tracks whether this peer currently owns the ball.
///
/// A paddle collision does not hand over ownership on the spot: the owner
/// keeps simulating until a packet carrying the post-collision velocity has
/// been queued, and only then releases.
#[derive(Debug)]
pub struct AuthorityController {
    role: AuthorityRole,
    pending_release: bool,
    release_announced: bool,
    transfers: u64,
}

impl Default for AuthorityController {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthorityController {
    pub fn new() -> Self {
        Self {
            role: AuthorityRole::Idle,
            pending_release: false,
            release_announced: false,
            transfers: 0,
        }
    }

    pub fn role(&self) -> AuthorityRole {
        self.role
    }

    pub fn is_owner(&self) -> bool {
        matches!(self.role, AuthorityRole::Serving | AuthorityRole::Simulating)
    }

    pub fn is_simulating(&self) -> bool {
        self.role == AuthorityRole::Simulating
    }

    pub fn is_releasing(&self) -> bool {
        self.pending_release
    }

    pub fn transfers(&self) -> u64 {
        self.transfers
    }

    pub fn begin_serve(&mut self) {
        if self.role != AuthorityRole::Serving {
            log::debug!("authority: {:?} -> Serving", self.role);
        }
        self.role = AuthorityRole::Serving;
        self.clear_release();
    }

    pub fn launch(&mut self) -> bool {
        if self.role != AuthorityRole::Serving {
            return false;
        }
        self.role = AuthorityRole::Simulating;
        true
    }

    /// The owner's ball struck the remote paddle.
    pub fn on_paddle_collision(&mut self) {
        if self.role == AuthorityRole::Simulating {
            self.pending_release = true;
            self.release_announced = false;
        }
    }

    /// Called whenever a packet carrying the ball's velocity is queued.
    pub fn note_body_queued(&mut self) {
        if self.pending_release {
            self.release_announced = true;
        }
    }

    /// Completes a deferred release once its velocity packet went out.
    pub fn try_release(&mut self) -> bool {
        if !(self.pending_release && self.release_announced) {
            return false;
        }
        self.clear_release();
        self.role = AuthorityRole::Interpolating;
        self.transfers += 1;
        log::debug!("authority released to remote");
        true
    }

    /// Takes ownership after the remote handed the ball over.
    pub fn acquire(&mut self) {
        if self.role != AuthorityRole::Simulating {
            log::debug!("authority: {:?} -> Simulating", self.role);
            self.transfers += 1;
        }
        self.role = AuthorityRole::Simulating;
        self.clear_release();
    }

    /// The remote keeps the ball; used when both sides claim it.
    pub fn yield_to_remote(&mut self) {
        self.role = AuthorityRole::Interpolating;
        self.clear_release();
    }

    /// Point over: drop ownership without a velocity handoff.
    pub fn relinquish(&mut self) {
        self.role = AuthorityRole::Idle;
        self.clear_release();
    }

    pub fn reset(&mut self) {
        self.role = AuthorityRole::Idle;
        self.clear_release();
    }

    fn clear_release(&mut self) {
        self.pending_release = false;
        self.release_announced = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_launch_flow() {
        let mut authority = AuthorityController::new();
        assert!(!authority.launch());

        authority.begin_serve();
        assert!(authority.is_owner());
        assert!(authority.launch());
        assert_eq!(authority.role(), AuthorityRole::Simulating);
    }

    #[test]
    fn test_release_requires_queued_velocity() {
        let mut authority = AuthorityController::new();
        authority.begin_serve();
        authority.launch();

        authority.on_paddle_collision();
        assert!(authority.is_releasing());
        assert!(!authority.try_release());
        assert!(authority.is_owner());

        authority.note_body_queued();
        assert!(authority.try_release());
        assert_eq!(authority.role(), AuthorityRole::Interpolating);
        assert_eq!(authority.transfers(), 1);
    }

    #[test]
    fn test_body_queued_before_collision_does_not_count() {
        let mut authority = AuthorityController::new();
        authority.begin_serve();
        authority.launch();

        authority.note_body_queued();
        authority.on_paddle_collision();
        assert!(!authority.try_release());
    }

    #[test]
    fn test_non_owner_collision_ignored() {
        let mut authority = AuthorityController::new();
        authority.yield_to_remote();
        authority.on_paddle_collision();
        authority.note_body_queued();
        assert!(!authority.try_release());

        authority.acquire();
        assert!(authority.is_simulating());
    }
}

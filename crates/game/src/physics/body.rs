use glam::Vec2;

use crate::net::BodyState;

/// Moves the body by `fraction` of a tick, reflecting off the top and bottom
/// walls. Both peers run this exact function so wall bounces never need to
/// be negotiated. Returns whether a wall was hit.
pub fn integrate(body: &mut BodyState, fraction: f32, height: f32, radius: f32) -> bool {
    body.position += body.velocity * fraction;

    let top = radius;
    let bottom = height - radius;
    let mut bounced = false;

    if body.position.y < top {
        body.position.y = 2.0 * top - body.position.y;
        body.velocity.y = -body.velocity.y;
        bounced = true;
    } else if body.position.y > bottom {
        body.position.y = 2.0 * bottom - body.position.y;
        body.velocity.y = -body.velocity.y;
        bounced = true;
    }

    // Only possible with a speed larger than the arena; keep it inside.
    body.position.y = body.position.y.clamp(top, bottom.max(top));
    bounced
}

/// Replaces non-finite components with a resting body at `center`.
/// Returns true when a reset happened.
pub fn sanitize_body(body: &mut BodyState, center: Vec2) -> bool {
    if body.position.is_finite() && body.velocity.is_finite() {
        return false;
    }
    log::warn!("non-finite body state {:?}, resetting", body);
    body.position = center;
    body.velocity = Vec2::ZERO;
    true
}

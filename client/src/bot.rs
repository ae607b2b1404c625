//! Decision making for the headless bot: where to walk and what to shoot.

use rand::Rng;
use shared::{Snapshot, Vec2};

/// Random-walk driver. Picks a new heading every so often and aims at the
/// closest living entity it can see.
pub struct Bot<R: Rng> {
    rng: R,
    speed: f32,
    /// Seconds between heading changes.
    retarget_interval: f32,
    until_retarget: f32,
    heading: Vec2,
}

impl<R: Rng> Bot<R> {
    pub fn new(rng: R, speed: f32, retarget_interval: f32) -> Self {
        Self {
            rng,
            speed,
            retarget_interval,
            until_retarget: 0.0,
            heading: Vec2::ZERO,
        }
    }

    /// Velocity intent for the next `dt` seconds.
    pub fn wander(&mut self, dt: f32) -> Vec2 {
        self.until_retarget -= dt;
        if self.until_retarget <= 0.0 {
            self.until_retarget = self.retarget_interval;
            let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
            // Occasionally stand still.
            self.heading = if self.rng.gen_bool(0.2) {
                Vec2::ZERO
            } else {
                Vec2::new(angle.cos(), angle.sin())
            };
        }
        self.heading * self.speed
    }
}

/// Centre of the sprite box of the nearest other entity with health left.
pub fn nearest_target(snapshot: &Snapshot, self_id: u32) -> Option<Vec2> {
    let me = snapshot.entities.iter().find(|e| e.id == self_id)?;
    let origin = me.position;

    snapshot
        .entities
        .iter()
        .filter(|e| e.id != self_id)
        .filter(|e| e.health.is_some_and(|h| h.current > 0.0))
        .map(|e| {
            let centre = e.position + e.size * 0.5;
            (centre, (centre - origin).length())
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(centre, _)| centre)
}

//! Per-tick game logic, run in ascending priority order against the world.
//!
//! Each system sees the world exactly as the previous system left it in the
//! same tick. Systems are a closed set registered once at startup.

mod collision;
mod movement;
mod projectile;
mod shooting;

pub use collision::CollisionSystem;
pub use movement::MovementSystem;
pub use projectile::ProjectileSystem;
pub use shooting::ShootingSystem;

use crate::config::Tuning;
use crate::ecs::{World, WorldError};
use crate::session::SessionManager;
use shared::Rect;

/// Collaborators a system may need besides the world.
pub struct TickContext<'a> {
    pub sessions: &'a mut SessionManager,
    pub walls: &'a [Rect],
    pub tuning: &'a Tuning,
}

pub trait System: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower runs first.
    fn priority(&self) -> i32;

    fn update(
        &mut self,
        dt: f32,
        world: &mut World,
        ctx: &mut TickContext<'_>,
    ) -> Result<(), WorldError>;
}

#[derive(Default)]
pub struct SystemPipeline {
    systems: Vec<Box<dyn System>>,
}

impl SystemPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shooting, collision, projectile lifecycle, movement.
    pub fn with_default_systems() -> Self {
        let mut pipeline = Self::new();
        pipeline.register(Box::new(ShootingSystem));
        pipeline.register(Box::new(CollisionSystem));
        pipeline.register(Box::new(ProjectileSystem));
        pipeline.register(Box::new(MovementSystem));
        pipeline
    }

    /// Adds a system. Systems with equal priority keep registration order.
    pub fn register(&mut self, system: Box<dyn System>) {
        self.systems.push(system);
        self.systems.sort_by_key(|s| s.priority());
    }

    pub fn run(
        &mut self,
        dt: f32,
        world: &mut World,
        ctx: &mut TickContext<'_>,
    ) -> Result<(), WorldError> {
        for system in &mut self.systems {
            system.update(dt, world, ctx)?;
        }
        Ok(())
    }

    /// Registered system names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

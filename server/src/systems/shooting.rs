use super::{System, TickContext};
use crate::components::{Health, Lifetime, Position, Projectile, Sprite, Velocity};
use crate::config::Tuning;
use crate::ecs::{Entity, World, WorldError};
use log::{debug, warn};
use shared::Vec2;

/// Direction used when the target is exactly on the shooter.
pub const DEFAULT_SHOT_DIRECTION: Vec2 = Vec2::new(0.0, 1.0);

/// Turns queued SHOOT requests into projectile entities.
pub struct ShootingSystem;

impl ShootingSystem {
    pub fn spawn_projectile(
        world: &mut World,
        tuning: &Tuning,
        owner: Entity,
        position: Vec2,
        direction: Vec2,
    ) -> Result<Entity, WorldError> {
        let projectile = world.create()?;
        world.add_component(projectile, Position(position));
        world.add_component(projectile, Velocity(direction * tuning.projectile_speed));
        world.add_component(
            projectile,
            Sprite::new(tuning.projectile_size, tuning.projectile_color),
        );
        world.add_component(
            projectile,
            Projectile {
                owner,
                damage: tuning.projectile_damage,
                speed: tuning.projectile_speed,
                direction,
            },
        );
        world.add_component(projectile, Lifetime::new(tuning.projectile_lifetime));
        Ok(projectile)
    }
}

impl System for ShootingSystem {
    fn name(&self) -> &'static str {
        "shooting"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn update(
        &mut self,
        _dt: f32,
        world: &mut World,
        ctx: &mut TickContext<'_>,
    ) -> Result<(), WorldError> {
        for (addr, event) in ctx.sessions.drain_shoot_events() {
            let Some(shooter) = ctx.sessions.entity_of(addr) else {
                debug!("Dropping shot from {}: no player spawned yet", addr);
                continue;
            };
            if shooter.id != event.player_id {
                warn!(
                    "Shot from {} claims player {} but session owns {}",
                    addr, event.player_id, shooter
                );
                continue;
            }
            if world.get::<Health>(shooter).is_some_and(Health::is_dead) {
                continue;
            }
            let Some(origin) = world.get::<Position>(shooter).map(|p| p.0) else {
                continue;
            };

            let direction = (event.target - origin)
                .normalized()
                .unwrap_or(DEFAULT_SHOT_DIRECTION);
            let spawn_at = origin + direction * ctx.tuning.projectile_spawn_offset;
            let projectile =
                Self::spawn_projectile(world, ctx.tuning, shooter, spawn_at, direction)?;
            debug!("Player {} fired projectile {}", shooter, projectile);
        }
        Ok(())
    }
}

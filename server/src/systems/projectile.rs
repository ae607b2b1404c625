use super::{System, TickContext};
use crate::collision::feet_collider;
use crate::components::{Health, KillCounter, Lifetime, Position, Projectile, Sprite};
use crate::ecs::{ComponentSet, Entity, World, WorldError};
use log::{debug, info};
use shared::Rect;

/// Ages projectiles and resolves their hits.
///
/// A projectile is destroyed the tick it expires, touches a wall, or hits a
/// living player other than its owner. Only the first player found is hit.
pub struct ProjectileSystem;

impl ProjectileSystem {
    /// Returns true when the projectile should be destroyed this tick.
    fn step(world: &mut World, projectile: Entity, dt: f32, walls: &[Rect]) -> bool {
        let (Some(position), Some(sprite), Some(data)) = (
            world.get::<Position>(projectile).map(|p| p.0),
            world.get::<Sprite>(projectile).copied(),
            world.get::<Projectile>(projectile).copied(),
        ) else {
            return true;
        };
        let Some(lifetime) = world.get_mut::<Lifetime>(projectile) else {
            return true;
        };

        lifetime.current += dt;
        if lifetime.is_expired() {
            return true;
        }

        let body = Rect::from_position_size(position, sprite.size);
        if walls.iter().any(|wall| body.intersects(wall)) {
            return true;
        }

        let players =
            world.query(ComponentSet::POSITION | ComponentSet::SPRITE | ComponentSet::HEALTH);
        for player in players {
            if player == data.owner {
                continue;
            }
            let (Some(player_pos), Some(player_sprite)) = (
                world.get::<Position>(player).map(|p| p.0),
                world.get::<Sprite>(player).map(|s| s.size),
            ) else {
                continue;
            };
            if !body.intersects(&feet_collider(player_pos, player_sprite)) {
                continue;
            }
            let Some(health) = world.get_mut::<Health>(player) else {
                continue;
            };
            if health.is_dead() {
                continue;
            }

            let survived = health.take_damage(data.damage);
            debug!(
                "Player {} hit by {}, health {}/{}",
                player, data.owner, health.current, health.max
            );
            if !survived {
                Self::credit_kill(world, data.owner, player);
            }
            return true;
        }

        false
    }

    fn credit_kill(world: &mut World, killer: Entity, victim: Entity) {
        if !world.is_alive(killer) {
            info!("Player {} died; shooter {} is gone", victim, killer);
            return;
        }
        let total = match world.get_mut::<KillCounter>(killer) {
            Some(counter) => {
                counter.add_kill();
                counter.count
            }
            None => {
                let mut counter = KillCounter::default();
                counter.add_kill();
                world.add_component(killer, counter);
                counter.count
            }
        };
        info!("Player {} killed {} ({} kills)", killer, victim, total);
    }
}

impl System for ProjectileSystem {
    fn name(&self) -> &'static str {
        "projectile"
    }

    fn priority(&self) -> i32 {
        75
    }

    fn update(
        &mut self,
        dt: f32,
        world: &mut World,
        ctx: &mut TickContext<'_>,
    ) -> Result<(), WorldError> {
        let doomed: Vec<Entity> = world
            .query(ComponentSet::PROJECTILE)
            .into_iter()
            .filter(|&projectile| Self::step(world, projectile, dt, ctx.walls))
            .collect();
        for projectile in doomed {
            world.destroy(projectile);
        }
        Ok(())
    }
}

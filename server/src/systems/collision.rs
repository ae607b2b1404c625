use super::{System, TickContext};
use crate::collision::resolve_against_walls;
use crate::components::{Position, Sprite, Velocity};
use crate::ecs::{ComponentSet, World, WorldError};

/// Keeps player movement out of walls.
///
/// Projects each player's next position, pushes the feet box out of any wall
/// it would enter, and rewrites the velocity so the movement step lands on
/// the corrected position. Whatever the client asked for, the authoritative
/// position stays wall-consistent.
pub struct CollisionSystem;

impl System for CollisionSystem {
    fn name(&self) -> &'static str {
        "collision"
    }

    fn priority(&self) -> i32 {
        50
    }

    fn update(
        &mut self,
        dt: f32,
        world: &mut World,
        ctx: &mut TickContext<'_>,
    ) -> Result<(), WorldError> {
        if dt <= 0.0 || ctx.walls.is_empty() {
            return Ok(());
        }

        let players = world.query(
            ComponentSet::POSITION
                | ComponentSet::VELOCITY
                | ComponentSet::SPRITE
                | ComponentSet::HEALTH,
        );
        for entity in players {
            let (Some(position), Some(velocity), Some(sprite)) = (
                world.get::<Position>(entity).map(|p| p.0),
                world.get::<Velocity>(entity).map(|v| v.0),
                world.get::<Sprite>(entity).copied(),
            ) else {
                continue;
            };

            let candidate = position + velocity * dt;
            let resolved = resolve_against_walls(candidate, sprite.size, ctx.walls);
            if resolved != candidate {
                if let Some(v) = world.get_mut::<Velocity>(entity) {
                    v.0 = (resolved - position) * (1.0 / dt);
                }
            }
        }
        Ok(())
    }
}

use super::{System, TickContext};
use crate::components::{Position, Velocity};
use crate::ecs::{ComponentSet, World, WorldError};

/// Integrates velocity into position.
pub struct MovementSystem;

impl System for MovementSystem {
    fn name(&self) -> &'static str {
        "movement"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn update(
        &mut self,
        dt: f32,
        world: &mut World,
        _ctx: &mut TickContext<'_>,
    ) -> Result<(), WorldError> {
        for entity in world.query(ComponentSet::POSITION | ComponentSet::VELOCITY) {
            let Some(velocity) = world.get::<Velocity>(entity).map(|v| v.0) else {
                continue;
            };
            if let Some(position) = world.get_mut::<Position>(entity) {
                position.0 += velocity * dt;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::test_support::Fixture;
    use assert_approx_eq::assert_approx_eq;
    use shared::Vec2;

    #[test]
    fn test_one_tick_at_thirty_hz() {
        let mut fixture = Fixture::new(Vec::new());
        let e = fixture.world.create().unwrap();
        fixture.world.add_component(e, Position(Vec2::ZERO));
        fixture.world.add_component(e, Velocity(Vec2::new(30.0, 0.0)));

        fixture.run(&mut MovementSystem, 1.0 / 30.0);

        let pos = fixture.world.get::<Position>(e).unwrap().0;
        assert_approx_eq!(pos.x, 1.0, 1e-5);
        assert_eq!(pos.y, 0.0);
    }

    #[test]
    fn test_entities_without_velocity_stay_put() {
        let mut fixture = Fixture::new(Vec::new());
        let e = fixture.world.create().unwrap();
        fixture.world.add_component(e, Position(Vec2::new(5.0, 5.0)));

        fixture.run(&mut MovementSystem, 1.0);

        assert_eq!(fixture.world.get::<Position>(e).unwrap().0, Vec2::new(5.0, 5.0));
    }
}

//! AABB tests against the static wall list, minimum-translation resolution
//! and the safe-spawn search.
//!
//! Positions are top-left corners. Players collide with walls using only the
//! lower half of their sprite box (the "feet"), so the head may overlap
//! scenery that is visually behind it.

use log::warn;
use rand::Rng;
use shared::{Rect, Vec2};

/// Random samples tried before falling back to fixed spawn points.
pub const SPAWN_ATTEMPTS: usize = 100;

/// Tried in order when random sampling finds nothing open.
pub const FALLBACK_SPAWNS: [Vec2; 8] = [
    Vec2::new(100.0, 100.0),
    Vec2::new(150.0, 100.0),
    Vec2::new(200.0, 100.0),
    Vec2::new(100.0, 150.0),
    Vec2::new(150.0, 150.0),
    Vec2::new(200.0, 150.0),
    Vec2::new(250.0, 100.0),
    Vec2::new(300.0, 100.0),
];

/// Used when every fallback is blocked. Spawning proceeds regardless.
pub const LAST_RESORT_SPAWN: Vec2 = Vec2::new(150.0, 100.0);

/// Lower half of the sprite box at `position`.
pub fn feet_collider(position: Vec2, size: Vec2) -> Rect {
    let half = size.y / 2.0;
    Rect::new(position.x, position.y + half, size.x, half)
}

/// True if the feet box at `position` overlaps any wall. Touching edges do
/// not count.
pub fn would_collide_at(position: Vec2, size: Vec2, walls: &[Rect]) -> bool {
    let feet = feet_collider(position, size);
    walls.iter().any(|wall| feet.intersects(wall))
}

/// Minimum translation that pushes `body` out of `wall` along one axis, or
/// zero if they do not overlap.
///
/// The axis with the smaller overlap wins; ties go to the vertical axis.
pub fn resolve_overlap(body: &Rect, wall: &Rect) -> Vec2 {
    let Some(overlap) = body.intersection(wall) else {
        return Vec2::ZERO;
    };

    if overlap.width < overlap.height {
        if body.left < overlap.left {
            Vec2::new(-overlap.width, 0.0)
        } else {
            Vec2::new(overlap.width, 0.0)
        }
    } else if body.top < overlap.top {
        Vec2::new(0.0, -overlap.height)
    } else {
        Vec2::new(0.0, overlap.height)
    }
}

/// Moves a sprite at `position` out of every wall its feet overlap, one wall
/// at a time in list order. Returns the corrected top-left position.
pub fn resolve_against_walls(position: Vec2, size: Vec2, walls: &[Rect]) -> Vec2 {
    let mut resolved = position;
    for wall in walls {
        let push = resolve_overlap(&feet_collider(resolved, size), wall);
        resolved += push;
    }
    resolved
}

/// Finds a top-left position inside `bounds` whose feet box is clear of
/// every wall.
///
/// Never fails: random sampling degrades to [`FALLBACK_SPAWNS`] and then to
/// [`LAST_RESORT_SPAWN`].
pub fn find_safe_spawn_position<R: Rng + ?Sized>(
    walls: &[Rect],
    bounds: &Rect,
    size: Vec2,
    rng: &mut R,
) -> Vec2 {
    if bounds.width > 0.0 && bounds.height > 0.0 {
        for _ in 0..SPAWN_ATTEMPTS {
            let candidate = Vec2::new(
                rng.gen_range(bounds.left..bounds.right()),
                rng.gen_range(bounds.top..bounds.bottom()),
            );
            if !would_collide_at(candidate, size, walls) {
                return candidate;
            }
        }
    }

    if let Some(fallback) = FALLBACK_SPAWNS
        .iter()
        .copied()
        .find(|point| !would_collide_at(*point, size, walls))
    {
        return fallback;
    }

    warn!(
        "No open spawn point found, using {:?} anyway",
        LAST_RESORT_SPAWN
    );
    LAST_RESORT_SPAWN
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_feet_collider_is_lower_half() {
        let feet = feet_collider(Vec2::new(10.0, 20.0), Vec2::new(3.0, 5.0));
        assert_eq!(feet.left, 10.0);
        assert_approx_eq!(feet.top, 22.5);
        assert_eq!(feet.width, 3.0);
        assert_approx_eq!(feet.height, 2.5);
    }

    #[test]
    fn test_head_overlap_is_ignored() {
        let wall = Rect::new(0.0, 0.0, 10.0, 10.0);
        // Top half overlaps the wall, feet start exactly at its bottom edge.
        assert!(!would_collide_at(Vec2::new(2.0, 5.0), Vec2::new(2.0, 10.0), &[wall]));
        assert!(would_collide_at(Vec2::new(2.0, 4.0), Vec2::new(2.0, 10.0), &[wall]));
    }

    #[test]
    fn test_touching_edges_do_not_collide() {
        let wall = Rect::new(10.0, 0.0, 5.0, 100.0);
        assert!(!would_collide_at(Vec2::new(7.0, 0.0), Vec2::new(3.0, 5.0), &[wall]));
    }

    #[test]
    fn test_resolve_overlap_pushes_along_smaller_axis() {
        let body = Rect::new(10.0, 10.0, 4.0, 4.0);
        let wall = Rect::new(12.0, 10.0, 4.0, 4.0);

        let push = resolve_overlap(&body, &wall);
        assert_approx_eq!(push.x, -2.0);
        assert_eq!(push.y, 0.0);
    }

    #[test]
    fn test_resolve_overlap_vertical_and_positive() {
        let wall = Rect::new(0.0, 0.0, 10.0, 10.0);

        let from_below = Rect::new(2.0, 9.0, 4.0, 4.0);
        let push = resolve_overlap(&from_below, &wall);
        assert_eq!(push.x, 0.0);
        assert_approx_eq!(push.y, 1.0);

        let from_right = Rect::new(9.0, 2.0, 4.0, 4.0);
        let push = resolve_overlap(&from_right, &wall);
        assert_approx_eq!(push.x, 1.0);
        assert_eq!(push.y, 0.0);
    }

    #[test]
    fn test_resolve_overlap_none() {
        let push = resolve_overlap(&Rect::new(0.0, 0.0, 1.0, 1.0), &Rect::new(5.0, 5.0, 1.0, 1.0));
        assert_eq!(push, Vec2::ZERO);
    }

    #[test]
    fn test_resolve_against_walls_clears_overlap() {
        let walls = [Rect::new(20.0, 0.0, 10.0, 100.0)];
        let size = Vec2::new(4.0, 8.0);
        let resolved = resolve_against_walls(Vec2::new(18.0, 50.0), size, &walls);
        assert_approx_eq!(resolved.x, 16.0);
        assert_approx_eq!(resolved.y, 50.0);
        assert!(!would_collide_at(resolved, size, &walls));
    }

    #[test]
    fn test_safe_spawn_avoids_walls() {
        let mut rng = StdRng::seed_from_u64(7);
        let bounds = Rect::new(50.0, 50.0, 412.0, 156.0);
        // Left half of the spawn area is solid.
        let walls = [Rect::new(0.0, 0.0, 256.0, 256.0)];
        let size = Vec2::new(3.0, 5.0);

        for _ in 0..50 {
            let spawn = find_safe_spawn_position(&walls, &bounds, size, &mut rng);
            assert!(!would_collide_at(spawn, size, &walls));
        }
    }

    #[test]
    fn test_safe_spawn_falls_back_in_order() {
        let mut rng = StdRng::seed_from_u64(1);
        let size = Vec2::new(3.0, 5.0);
        // Whole spawn area blocked, first fallback blocked, second open.
        let walls = [
            Rect::new(50.0, 50.0, 412.0, 156.0),
            Rect::new(90.0, 90.0, 20.0, 20.0),
        ];
        let bounds = Rect::new(50.0, 50.0, 412.0, 156.0);
        let outside = Rect::new(0.0, 0.0, 0.0, 0.0);

        let spawn = find_safe_spawn_position(&walls[1..], &outside, size, &mut rng);
        assert_eq!(spawn, FALLBACK_SPAWNS[1]);

        let everything = [Rect::new(0.0, 0.0, 1000.0, 1000.0)];
        let spawn = find_safe_spawn_position(&everything, &bounds, size, &mut rng);
        assert_eq!(spawn, LAST_RESORT_SPAWN);
    }
}

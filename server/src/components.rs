//! Component payloads stored in the [`World`](crate::ecs::World).

use crate::ecs::Entity;
use shared::{Rgba, Vec2};

/// Top-left corner of the entity's sprite box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position(pub Vec2);

/// Units per second.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity(pub Vec2);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    pub size: Vec2,
    pub color: Rgba,
}

impl Sprite {
    pub fn new(size: Vec2, color: Rgba) -> Self {
        Self { size, color }
    }
}

/// Hit points. Keeps `0 <= current <= max` across every mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        let max = max.max(0.0);
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    pub fn is_dead(&self) -> bool {
        !self.is_alive()
    }

    /// Applies damage and reports whether the entity survived.
    pub fn take_damage(&mut self, amount: f32) -> bool {
        self.current = (self.current - amount.max(0.0)).clamp(0.0, self.max);
        self.is_alive()
    }

    /// Restores health up to `max`. Dead entities stay dead.
    pub fn heal(&mut self, amount: f32) {
        if self.is_dead() {
            return;
        }
        self.current = (self.current + amount.max(0.0)).min(self.max);
    }

    pub fn restore(&mut self) {
        self.current = self.max;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projectile {
    pub owner: Entity,
    pub damage: f32,
    pub speed: f32,
    /// Unit length.
    pub direction: Vec2,
}

/// Seconds alive versus the cap after which the entity expires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lifetime {
    pub max: f32,
    pub current: f32,
}

impl Lifetime {
    pub fn new(max: f32) -> Self {
        Self { max, current: 0.0 }
    }

    pub fn is_expired(&self) -> bool {
        self.current >= self.max
    }
}

/// Kills credited to a player. Never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KillCounter {
    pub count: i32,
}

impl KillCounter {
    pub fn add_kill(&mut self) {
        self.count = self.count.saturating_add(1);
    }
}

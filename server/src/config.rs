//! Server settings and gameplay tuning.

use clap::ValueEnum;
use shared::{Rect, Rgba, Vec2, DEFAULT_PORT};
use std::path::PathBuf;
use std::time::Duration;

use crate::ecs::DEFAULT_ENTITY_LIMIT;

/// What happens to a session whose player reaches zero health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DeathPolicy {
    /// Reset the player at a fresh spawn point with full health.
    #[default]
    Respawn,
    /// Send DISCONNECT, drop the session and destroy the player.
    Disconnect,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Snapshots broadcast per second.
    pub snapshot_rate: u32,
    pub max_players: usize,
    pub timeout: Duration,
    /// Upper bound on the wall-clock delta fed into the accumulator per loop
    /// iteration, in seconds.
    pub max_frame_time: f32,
    pub death_policy: DeathPolicy,
    pub max_player_speed: f32,
    pub entity_limit: u32,
    pub walls_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            tick_rate: 30,
            snapshot_rate: 20,
            max_players: 16,
            timeout: Duration::from_secs(5),
            max_frame_time: 0.1,
            death_policy: DeathPolicy::Respawn,
            max_player_speed: 150.0,
            entity_limit: DEFAULT_ENTITY_LIMIT,
            walls_file: None,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Seconds per simulation tick.
    pub fn fixed_timestep(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    /// Seconds between snapshot broadcasts.
    pub fn snapshot_interval(&self) -> f32 {
        1.0 / self.snapshot_rate.max(1) as f32
    }
}

/// Gameplay constants shared by the systems and the spawn logic.
#[derive(Debug, Clone)]
pub struct Tuning {
    pub player_size: Vec2,
    pub player_color: Rgba,
    pub player_health: f32,
    pub projectile_size: Vec2,
    pub projectile_color: Rgba,
    pub projectile_speed: f32,
    pub projectile_damage: f32,
    /// Seconds before an unhit projectile expires.
    pub projectile_lifetime: f32,
    /// Distance from the shooter at which a projectile appears.
    pub projectile_spawn_offset: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            player_size: Vec2::new(3.0, 5.0),
            player_color: Rgba::GREEN,
            player_health: 10.0,
            projectile_size: Vec2::new(2.0, 2.0),
            projectile_color: Rgba::YELLOW,
            projectile_speed: 300.0,
            projectile_damage: 10.0,
            projectile_lifetime: 2.0,
            projectile_spawn_offset: 6.0,
        }
    }
}

/// Region random spawn points are drawn from.
pub const DEFAULT_SPAWN_BOUNDS: Rect = Rect::new(50.0, 50.0, 412.0, 156.0);

//! Static level geometry: the wall rectangles players and projectiles collide
//! with, plus the area random spawns are drawn from.

use crate::config::DEFAULT_SPAWN_BOUNDS;
use serde::Deserialize;
use shared::Rect;
use std::path::Path;
use thiserror::Error;

/// Width and height of the built-in map.
pub const DEFAULT_ARENA_SIZE: (f32, f32) = (512.0, 256.0);
const BORDER: f32 = 16.0;

#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("failed to read walls file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid walls file: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-disk layouts accepted for a walls file.
#[derive(Deserialize)]
#[serde(untagged)]
enum ArenaFile {
    Walls(Vec<Rect>),
    Level {
        walls: Vec<Rect>,
        #[serde(default)]
        spawn_bounds: Option<Rect>,
    },
}

#[derive(Debug, Clone)]
pub struct Arena {
    pub walls: Vec<Rect>,
    pub spawn_bounds: Rect,
}

impl Arena {
    pub fn new(walls: Vec<Rect>, spawn_bounds: Rect) -> Self {
        Self {
            walls,
            spawn_bounds,
        }
    }

    /// Loads walls exported by the level tooling: either a JSON array of
    /// `{"left", "top", "width", "height"}` objects, or an object with a
    /// `walls` array and an optional `spawn_bounds` rectangle.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ArenaError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ArenaError> {
        Ok(match serde_json::from_str(json)? {
            ArenaFile::Walls(walls) => Self::new(walls, DEFAULT_SPAWN_BOUNDS),
            ArenaFile::Level {
                walls,
                spawn_bounds,
            } => Self::new(walls, spawn_bounds.unwrap_or(DEFAULT_SPAWN_BOUNDS)),
        })
    }

    /// Bordered 512x256 room with a handful of pillars.
    pub fn default_arena() -> Self {
        let (width, height) = DEFAULT_ARENA_SIZE;
        let walls = vec![
            Rect::new(0.0, 0.0, width, BORDER),
            Rect::new(0.0, height - BORDER, width, BORDER),
            Rect::new(0.0, 0.0, BORDER, height),
            Rect::new(width - BORDER, 0.0, BORDER, height),
            Rect::new(120.0, 70.0, 16.0, 32.0),
            Rect::new(376.0, 70.0, 16.0, 32.0),
            Rect::new(120.0, 160.0, 16.0, 32.0),
            Rect::new(376.0, 160.0, 16.0, 32.0),
            Rect::new(232.0, 116.0, 48.0, 24.0),
        ];
        Self::new(walls, DEFAULT_SPAWN_BOUNDS)
    }

    /// Arena with no walls at all.
    pub fn empty() -> Self {
        Self::new(Vec::new(), DEFAULT_SPAWN_BOUNDS)
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::default_arena()
    }
}

//! Game configuration loaded from YAML.
//!
//! ```yaml
//! window:
//!   title: tilebrawl
//!   width: 1180
//!   height: 700
//! movement:
//!   speed: 2.0
//!   run_multiplier: 2.0
//! map:
//!   scale: 3.0
//!   active: island
//!   tilemaps:
//!     - { name: island, source: assets/maps/island.json }
//!   tilesets:
//!     - { name: Grass, source: assets/tilesets/grass.png, tile_width: 16, tile_height: 16 }
//!   draw_layers: [Ground, Decor]
//! player:
//!   position: [100, 100]
//!   size: [50, 50]
//!   frame_size: [32, 32]
//!   sheets:
//!     idle_down: { source: ./assets/entities/idle/idle_down-Sheet.png, frames: 4 }
//! spawns:
//!   - { kind: enemy, position: [200, 200], size: [50, 50], image: ./assets/enemies/goblin.png }
//! ```
//!
//! Every section is optional; missing values fall back to the defaults below.

use macroquad::file::load_string;
use macroquad::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;

use crate::helpers::asset_path;
use crate::intent::MovementConfig;

pub const DEFAULT_CONFIG_PATH: &str = "assets/config/game.yaml";

#[derive(Debug)]
pub enum ConfigError {
    File(String),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(err) => write!(f, "file error: {err}"),
            Self::Yaml(err) => write!(f, "yaml error: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub window: WindowConfig,
    pub movement: MovementConfig,
    pub map: MapConfig,
    pub player: PlayerConfig,
    pub spawns: Vec<SpawnConfig>,
}

impl GameConfig {
    pub fn from_yaml(data: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(data)?)
    }

    pub async fn load(path: &str) -> Result<Self, ConfigError> {
        let data = load_string(&asset_path(path))
            .await
            .map_err(|err| ConfigError::File(err.to_string()))?;
        Self::from_yaml(&data)
    }

    /// Synchronous read for window setup, before the async runtime exists.
    pub fn load_blocking(path: &str) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(asset_path(path))
            .map_err(|err| ConfigError::File(err.to_string()))?;
        Self::from_yaml(&data)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: i32,
    pub height: i32,
    pub background: [u8; 4],
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "tilebrawl".to_owned(),
            width: 1180,
            height: 700,
            background: [18, 18, 24, 255],
        }
    }
}

impl WindowConfig {
    pub fn background_color(&self) -> Color {
        rgba(self.background)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub scale: f32,
    pub active: Option<String>,
    pub tilemaps: Vec<TilemapSource>,
    pub tilesets: Vec<TilesetSource>,
    pub draw_layers: Vec<String>,
    pub offset: [f32; 2],
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            scale: 3.0,
            active: None,
            tilemaps: Vec::new(),
            tilesets: Vec::new(),
            draw_layers: Vec::new(),
            offset: [0.0, 0.0],
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TilemapSource {
    pub name: String,
    pub source: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TilesetSource {
    pub name: String,
    pub source: String,
    pub tile_width: f32,
    pub tile_height: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SheetConfig {
    pub source: String,
    #[serde(default = "default_frames")]
    pub frames: u32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub position: [f32; 2],
    pub size: [f32; 2],
    /// Sheet cell size; defaults to `size`.
    pub frame_size: Option<[f32; 2]>,
    /// Keyed by animation set, e.g. `walk_left`.
    pub sheets: HashMap<String, SheetConfig>,
    pub color: [u8; 4],
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            position: [100.0, 100.0],
            size: [50.0, 50.0],
            frame_size: None,
            sheets: HashMap::new(),
            color: [80, 160, 255, 255],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnKind {
    Enemy,
    Sprite,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SpawnConfig {
    pub kind: SpawnKind,
    pub position: [f32; 2],
    #[serde(default = "default_size")]
    pub size: [f32; 2],
    #[serde(default)]
    pub velocity: [f32; 2],
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_frames")]
    pub frames: u32,
    #[serde(default)]
    pub frame_size: Option<[f32; 2]>,
    #[serde(default)]
    pub color: Option<[u8; 4]>,
}

pub fn rgba(c: [u8; 4]) -> Color {
    Color::from_rgba(c[0], c[1], c[2], c[3])
}

fn default_frames() -> u32 {
    1
}

fn default_size() -> [f32; 2] {
    [50.0, 50.0]
}

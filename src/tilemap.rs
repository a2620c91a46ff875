use macroquad::file::load_string;
use macroquad::prelude::*;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::assets::{AssetStore, ImageId};
use crate::entity::Entity;
use crate::helpers::asset_path;
use crate::surface::Surface;

pub const COLLISION_LAYER: &str = "Collision";
const TILE_LAYER_TYPE: &str = "tilelayer";

#[derive(Debug)]
pub enum TilemapLoadError {
    File(String),
    Json(serde_json::Error),
}

impl std::fmt::Display for TilemapLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(err) => write!(f, "file error: {err}"),
            Self::Json(err) => write!(f, "json error: {err}"),
        }
    }
}

impl std::error::Error for TilemapLoadError {}

impl From<serde_json::Error> for TilemapLoadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayerKind {
    Tiles,
    Other(String),
}

#[derive(Clone, Debug)]
pub struct TileLayer {
    pub name: String,
    pub kind: LayerKind,
    pub width: usize,
    pub height: usize,
    /// Row-major global tile ids, 0 = empty.
    pub data: Vec<u32>,
}

impl TileLayer {
    /// Out-of-range cells read as `None`, never as an error.
    pub fn tile_at(&self, x: i64, y: i64) -> Option<u32> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        self.data.get(y as usize * self.width + x as usize).copied()
    }
}

#[derive(Clone, Debug)]
pub struct TilesetRef {
    pub first_gid: u32,
    /// Registered tileset name the reference resolves to.
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct Tilemap {
    pub tile_width: f32,
    pub tile_height: f32,
    pub layers: Vec<TileLayer>,
    pub tilesets: Vec<TilesetRef>,
}

impl Tilemap {
    pub fn from_json(data: &str) -> Result<Self, TilemapLoadError> {
        let raw: TilemapFile = serde_json::from_str(data)?;
        let layers = raw
            .layers
            .into_iter()
            .map(|layer| TileLayer {
                kind: if layer.kind == TILE_LAYER_TYPE {
                    LayerKind::Tiles
                } else {
                    LayerKind::Other(layer.kind)
                },
                name: layer.name,
                width: layer.width,
                height: layer.height,
                data: layer.data,
            })
            .collect();
        let tilesets = raw
            .tilesets
            .into_iter()
            .map(|ts| TilesetRef {
                first_gid: ts.firstgid,
                name: tileset_name(&ts.source),
            })
            .collect();

        Ok(Self {
            tile_width: raw.tilewidth as f32,
            tile_height: raw.tileheight as f32,
            layers,
            tilesets,
        })
    }

    pub fn layer(&self, name: &str) -> Option<&TileLayer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    /// Only layers of the tile type; other layer kinds have no grid.
    pub fn tile_layer(&self, name: &str) -> Option<&TileLayer> {
        self.layer(name).filter(|layer| layer.kind == LayerKind::Tiles)
    }

    /// The reference with the highest first id not above `tile_id`.
    pub fn owning_ref(&self, tile_id: u32) -> Option<&TilesetRef> {
        self.tilesets
            .iter()
            .filter(|ts| ts.first_gid <= tile_id)
            .max_by_key(|ts| ts.first_gid)
    }
}

fn tileset_name(source: &str) -> String {
    source.strip_suffix(".tsx").unwrap_or(source).to_string()
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tileset {
    pub image: ImageId,
    pub tile_width: f32,
    pub tile_height: f32,
}

impl Tileset {
    /// Source rectangle of `local_id` inside an image `image_width` wide.
    pub fn source_rect(&self, local_id: u32, image_width: f32) -> Option<Rect> {
        if self.tile_width <= 0.0 {
            return None;
        }
        let per_row = (image_width / self.tile_width).floor() as u32;
        if per_row == 0 {
            return None;
        }
        Some(Rect::new(
            (local_id % per_row) as f32 * self.tile_width,
            (local_id / per_row) as f32 * self.tile_height,
            self.tile_width,
            self.tile_height,
        ))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedTile {
    pub tileset: Tileset,
    pub local_id: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileHit {
    pub layer: &'static str,
    pub tile_id: u32,
}

pub struct TilemapStore {
    tilemaps: HashMap<String, Tilemap>,
    tilesets: HashMap<String, Tileset>,
    active_map: Option<String>,
    scale: f32,
    offset: Vec2,
    warned: RefCell<HashSet<String>>,
}

impl TilemapStore {
    pub fn new(scale: f32) -> Self {
        Self {
            tilemaps: HashMap::new(),
            tilesets: HashMap::new(),
            active_map: None,
            scale,
            offset: Vec2::ZERO,
            warned: RefCell::new(HashSet::new()),
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Screen position of the map's top-left cell. Collision queries use the
    /// same origin the layers are drawn at.
    pub fn set_offset(&mut self, offset: Vec2) {
        self.offset = offset;
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Parses and stores a map. A second load under the same name replaces
    /// the first.
    pub fn load_tilemap(&mut self, name: &str, data: &str) -> Result<(), TilemapLoadError> {
        let map = Tilemap::from_json(data)?;
        if self.tilemaps.insert(name.to_string(), map).is_some() {
            log::debug!("tilemap '{name}' replaced");
        }
        Ok(())
    }

    pub async fn load_tilemap_file(
        &mut self,
        name: &str,
        path: &str,
    ) -> Result<(), TilemapLoadError> {
        let data = load_string(&asset_path(path))
            .await
            .map_err(|err| TilemapLoadError::File(err.to_string()))?;
        self.load_tilemap(name, &data)
    }

    /// Registers a tileset whose image is still loading. Cells using it are
    /// skipped until `assets` reports the image ready.
    pub fn load_tileset(
        &mut self,
        assets: &mut AssetStore,
        name: &str,
        source: &str,
        tile_width: f32,
        tile_height: f32,
    ) -> ImageId {
        let image = assets.register(source);
        self.tilesets.insert(
            name.to_string(),
            Tileset {
                image,
                tile_width,
                tile_height,
            },
        );
        image
    }

    #[cfg(test)]
    pub fn tilemap(&self, name: &str) -> Option<&Tilemap> {
        self.tilemaps.get(name)
    }

    #[cfg(test)]
    pub fn tileset(&self, name: &str) -> Option<&Tileset> {
        self.tilesets.get(name)
    }

    pub fn set_active_map(&mut self, name: &str) {
        self.active_map = Some(name.to_string());
    }

    pub fn active_map(&self) -> Option<&Tilemap> {
        self.active_map.as_deref().and_then(|name| self.tilemaps.get(name))
    }

    pub fn log_tilesets(&self, assets: &AssetStore) {
        let mut names: Vec<_> = self.tilesets.keys().collect();
        names.sort();
        log::info!("loaded tilesets: {names:?}");
        for name in names {
            let ts = &self.tilesets[name];
            log::info!(
                "{name}: {} {:?}, tile {}x{}",
                assets.source(ts.image).unwrap_or("?"),
                assets.state(ts.image),
                ts.tile_width,
                ts.tile_height
            );
        }
    }

    pub fn resolve_tile(&self, map: &Tilemap, tile_id: u32) -> Option<ResolvedTile> {
        let owner = map.owning_ref(tile_id)?;
        let Some(tileset) = self.tilesets.get(&owner.name) else {
            if self.warned.borrow_mut().insert(owner.name.clone()) {
                log::warn!("missing tileset: {} for tile {tile_id}", owner.name);
            }
            return None;
        };
        Some(ResolvedTile {
            tileset: *tileset,
            local_id: tile_id - owner.first_gid,
        })
    }

    pub fn draw_tilemap_layer(
        &self,
        surface: &mut dyn Surface,
        assets: &AssetStore,
        map_name: &str,
        layer_name: &str,
        offset: Vec2,
        scale: f32,
    ) {
        let Some(map) = self.tilemaps.get(map_name) else {
            return;
        };
        let Some(layer) = map.tile_layer(layer_name) else {
            return;
        };
        if layer.width == 0 {
            return;
        }

        let tile_w = map.tile_width * scale;
        let tile_h = map.tile_height * scale;

        for (i, &tile_id) in layer.data.iter().enumerate() {
            if tile_id == 0 {
                continue;
            }
            let Some(resolved) = self.resolve_tile(map, tile_id) else {
                continue;
            };
            let Some(image_size) = assets.size(resolved.tileset.image) else {
                continue;
            };
            let Some(source) = resolved.tileset.source_rect(resolved.local_id, image_size.x) else {
                continue;
            };
            let dest = Rect::new(
                (i % layer.width) as f32 * tile_w + offset.x,
                (i / layer.width) as f32 * tile_h + offset.y,
                tile_w,
                tile_h,
            );
            surface.draw_image_region(resolved.tileset.image, source, dest);
        }
    }

    /// Tests the four corners of `bounds` against the active map's collision
    /// layer, in screen space shifted by the map offset. Corners outside the
    /// grid never collide.
    pub fn check_tilemap_collision(&self, bounds: Rect) -> Option<TileHit> {
        let map = self.active_map()?;
        let layer = map.tile_layer(COLLISION_LAYER)?;

        let tile_w = map.tile_width * self.scale;
        let tile_h = map.tile_height * self.scale;
        if tile_w <= 0.0 || tile_h <= 0.0 {
            return None;
        }

        let corners = [
            vec2(bounds.x, bounds.y),
            vec2(bounds.x + bounds.w, bounds.y),
            vec2(bounds.x, bounds.y + bounds.h),
            vec2(bounds.x + bounds.w, bounds.y + bounds.h),
        ];
        corners.iter().find_map(|&corner| {
            let corner = corner - self.offset;
            let x = (corner.x / tile_w).floor() as i64;
            let y = (corner.y / tile_h).floor() as i64;
            match layer.tile_at(x, y) {
                Some(tile_id) if tile_id != 0 => Some(TileHit {
                    layer: COLLISION_LAYER,
                    tile_id,
                }),
                _ => None,
            }
        })
    }

    /// Whether `entity` could stand at `(x, y)`. Does not touch the entity.
    pub fn can_move_to(&self, entity: &Entity, x: f32, y: f32) -> bool {
        let size = entity.size();
        match self.check_tilemap_collision(Rect::new(x, y, size.x, size.y)) {
            Some(hit) => {
                log::trace!("move to ({x}, {y}) blocked by {} tile {}", hit.layer, hit.tile_id);
                false
            }
            None => true,
        }
    }
}

#[derive(Deserialize)]
struct TilemapFile {
    tilewidth: u32,
    tileheight: u32,
    #[serde(default)]
    layers: Vec<LayerFile>,
    #[serde(default)]
    tilesets: Vec<TilesetRefFile>,
}

#[derive(Deserialize)]
struct LayerFile {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    width: usize,
    #[serde(default)]
    height: usize,
    #[serde(default)]
    data: Vec<u32>,
}

#[derive(Deserialize)]
struct TilesetRefFile {
    firstgid: u32,
    source: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityId, EntityKind, Visual};
    use crate::surface::testing::RecordingSurface;

    const MAP: &str = r#"{
        "tilewidth": 16,
        "tileheight": 16,
        "layers": [
            { "name": "Ground", "type": "tilelayer", "width": 4, "height": 1,
              "data": [0, 0, 5, 0] },
            { "name": "Collision", "type": "tilelayer", "width": 4, "height": 3,
              "data": [0, 0, 0, 0,
                       0, 0, 0, 0,
                       0, 0, 0, 7] },
            { "name": "Spawns", "type": "objectgroup" }
        ],
        "tilesets": [
            { "firstgid": 11, "source": "Props.tsx" },
            { "firstgid": 1, "source": "Grass.tsx" }
        ]
    }"#;

    fn store() -> (TilemapStore, AssetStore) {
        let mut assets = AssetStore::new();
        let mut store = TilemapStore::new(1.0);
        store.load_tilemap("island", MAP).unwrap();
        store.set_active_map("island");
        store.load_tileset(&mut assets, "Grass", "assets/grass.png", 16.0, 16.0);
        (store, assets)
    }

    fn entity(w: f32, h: f32) -> Entity {
        Entity::new(EntityId(1), EntityKind::Player, Vec2::ZERO, vec2(w, h), Visual::None)
    }

    #[test]
    fn parses_layers_and_strips_tileset_suffix() {
        let (store, _) = store();
        let map = store.tilemap("island").unwrap();
        assert_eq!(map.layers.len(), 3);
        assert_eq!(map.layer("Spawns").unwrap().kind, LayerKind::Other("objectgroup".into()));
        assert!(map.tile_layer("Spawns").is_none());
        assert_eq!(map.tilesets[1].name, "Grass");
    }

    #[test]
    fn tile_resolves_to_local_id_in_owning_tileset() {
        let (store, _) = store();
        let map = store.tilemap("island").unwrap();
        let resolved = store.resolve_tile(map, 5).unwrap();
        assert_eq!(resolved.local_id, 4);
        assert_eq!(
            resolved.tileset.source_rect(resolved.local_id, 64.0),
            Some(Rect::new(0.0, 16.0, 16.0, 16.0))
        );
        // 12 belongs to Props, which was never registered
        assert!(store.resolve_tile(map, 12).is_none());
    }

    #[test]
    fn draw_skips_unready_tilesets() {
        let (store, mut assets) = store();
        let mut surface = RecordingSurface::default();
        store.draw_tilemap_layer(&mut surface, &assets, "island", "Ground", vec2(10.0, 20.0), 3.0);
        assert!(surface.ops.is_empty());

        let image = store.tileset("Grass").unwrap().image;
        assets.mark_ready(image, 64.0, 64.0);
        store.draw_tilemap_layer(&mut surface, &assets, "island", "Ground", vec2(10.0, 20.0), 3.0);
        assert_eq!(
            surface.images(),
            vec![(
                image,
                Rect::new(0.0, 16.0, 16.0, 16.0),
                Rect::new(2.0 * 48.0 + 10.0, 20.0, 48.0, 48.0)
            )]
        );
    }

    #[test]
    fn draw_ignores_failed_images_and_unknown_layers() {
        let (store, mut assets) = store();
        let image = store.tileset("Grass").unwrap().image;
        assets.mark_failed(image, "404");
        let mut surface = RecordingSurface::default();
        store.draw_tilemap_layer(&mut surface, &assets, "island", "Ground", Vec2::ZERO, 1.0);
        store.draw_tilemap_layer(&mut surface, &assets, "island", "Missing", Vec2::ZERO, 1.0);
        store.draw_tilemap_layer(&mut surface, &assets, "nowhere", "Ground", Vec2::ZERO, 1.0);
        assert!(surface.ops.is_empty());
    }

    #[test]
    fn reload_replaces_map() {
        let (mut store, _) = store();
        let small = r#"{ "tilewidth": 8, "tileheight": 8, "layers": [], "tilesets": [] }"#;
        store.load_tilemap("island", small).unwrap();
        assert_eq!(store.tilemap("island").unwrap().tile_width, 8.0);
        assert!(store.load_tilemap("broken", "{").is_err());
        assert!(store.tilemap("broken").is_none());
    }

    #[test]
    fn corner_on_collision_tile_is_reported() {
        let (store, _) = store();
        // bottom-right corner lands on (3, 2)
        let hit = store.check_tilemap_collision(Rect::new(40.0, 30.0, 10.0, 10.0));
        assert_eq!(
            hit,
            Some(TileHit {
                layer: COLLISION_LAYER,
                tile_id: 7
            })
        );
        assert!(store.check_tilemap_collision(Rect::new(0.0, 0.0, 10.0, 10.0)).is_none());
    }

    #[test]
    fn out_of_grid_corners_never_collide() {
        let (store, _) = store();
        assert!(store.check_tilemap_collision(Rect::new(-100.0, -100.0, 10.0, 10.0)).is_none());
        assert!(store.check_tilemap_collision(Rect::new(500.0, 500.0, 10.0, 10.0)).is_none());
    }

    #[test]
    fn collision_uses_map_scale() {
        let (mut store, _) = store();
        store.scale = 3.0;
        assert!(store.check_tilemap_collision(Rect::new(40.0, 30.0, 10.0, 10.0)).is_none());
        assert!(store.check_tilemap_collision(Rect::new(150.0, 100.0, 10.0, 10.0)).is_some());
    }

    #[test]
    fn can_move_to_is_pure() {
        let (store, _) = store();
        let e = entity(10.0, 10.0);
        let before = e.pos;
        for _ in 0..3 {
            assert!(!store.can_move_to(&e, 40.0, 30.0));
            assert!(store.can_move_to(&e, 0.0, 0.0));
        }
        assert_eq!(e.pos, before);
    }

    #[test]
    fn collision_follows_drawn_offset() {
        let map = r#"{
            "tilewidth": 16, "tileheight": 16,
            "layers": [
                { "name": "Collision", "type": "tilelayer", "width": 2, "height": 1,
                  "data": [1, 0] }
            ],
            "tilesets": [{ "firstgid": 1, "source": "Grass.tsx" }]
        }"#;
        let mut assets = AssetStore::new();
        let mut store = TilemapStore::new(1.0);
        store.load_tilemap("ledge", map).unwrap();
        store.set_active_map("ledge");
        store.set_offset(vec2(100.0, 0.0));
        let image = store.load_tileset(&mut assets, "Grass", "assets/grass.png", 16.0, 16.0);
        assets.mark_ready(image, 16.0, 16.0);

        let mut surface = RecordingSurface::default();
        store.draw_tilemap_layer(&mut surface, &assets, "ledge", "Collision", store.offset(), 1.0);
        assert_eq!(
            surface.images(),
            vec![(image, Rect::new(0.0, 0.0, 16.0, 16.0), Rect::new(100.0, 0.0, 16.0, 16.0))]
        );

        let hit = store.check_tilemap_collision(Rect::new(104.0, 4.0, 4.0, 4.0));
        assert_eq!(
            hit,
            Some(TileHit {
                layer: COLLISION_LAYER,
                tile_id: 1
            })
        );
        assert_eq!(store.check_tilemap_collision(Rect::new(4.0, 4.0, 4.0, 4.0)), None);

        let player = entity(4.0, 4.0);
        assert!(!store.can_move_to(&player, 104.0, 4.0));
        assert!(store.can_move_to(&player, 4.0, 4.0));
    }

    #[test]
    fn no_active_map_means_no_collision() {
        let store = TilemapStore::new(1.0);
        assert!(store.can_move_to(&entity(10.0, 10.0), 0.0, 0.0));
    }
}

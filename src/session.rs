use macroquad::prelude::*;
use std::collections::HashMap;
use std::task::Context;

use crate::assets::{AssetStore, ImageId, PendingLoads, TextureCache};
use crate::config::{GameConfig, PlayerConfig, SpawnConfig, SpawnKind, TilemapSource, rgba};
use crate::entity::{Animation, Entity, EntityId, EntityKind, Visual};
use crate::helpers::is_loadable_locator;
use crate::intent::{
    AnimationSet, Facing, InputState, MovementConfig, animation_set, resolve_intent,
};
use crate::manager::SpriteManager;
use crate::surface::Surface;
use crate::tilemap::TilemapStore;

/// Signals for the menu layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameEvent {
    Started,
    Restarted,
    Ended { won: bool, final_health: i32 },
}

#[derive(Clone, Copy, Debug)]
struct Sheet {
    image: ImageId,
    frames: u32,
}

/// Sprite sheets of the player, keyed by animation set. Swapping sheets is a
/// lookup on the set chosen from the movement intent.
struct PlayerSheets {
    sheets: HashMap<AnimationSet, Sheet>,
    frame_size: Vec2,
    facing: Facing,
    current: Option<AnimationSet>,
}

impl PlayerSheets {
    fn new(config: &PlayerConfig, assets: &mut AssetStore) -> Self {
        let mut sheets = HashMap::new();
        for set in AnimationSet::ALL {
            if let Some(sheet) = config.sheets.get(&set.key()) {
                sheets.insert(
                    set,
                    Sheet {
                        image: assets.register(&sheet.source),
                        frames: sheet.frames,
                    },
                );
            }
        }
        let size = config.frame_size.unwrap_or(config.size);
        Self {
            sheets,
            frame_size: vec2(size[0], size[1]),
            facing: Facing::Down,
            current: None,
        }
    }

    fn apply(&mut self, entity: &mut Entity, set: AnimationSet) {
        self.facing = set.facing;
        if self.current == Some(set) {
            return;
        }
        let Some(sheet) = self.sheets.get(&set) else {
            return;
        };
        entity.visual = Visual::Image(sheet.image);
        entity.animation = Animation::new(self.frame_size).with_frames(sheet.frames, 1);
        self.current = Some(set);
    }
}

/// Everything one play-through owns. A restart builds a new session, so
/// nothing started by an old one can reach the new one.
pub struct GameSession {
    manager: SpriteManager,
    tiles: TilemapStore,
    assets: AssetStore,
    loads: PendingLoads,
    textures: TextureCache,
    player: EntityId,
    player_sheets: PlayerSheets,
    next_id: u32,
    movement: MovementConfig,
    map_name: Option<String>,
    draw_layers: Vec<String>,
    tileset_images: Vec<ImageId>,
    tilesets_reported: bool,
    hostiles_spawned: bool,
    outcome: Option<GameEvent>,
}

impl GameSession {
    /// Builds the session and queues its image loads. Tilemap documents are
    /// fetched by [`GameSession::start`].
    pub fn new(config: &GameConfig) -> Self {
        let mut assets = AssetStore::new();
        let mut tiles = TilemapStore::new(config.map.scale);

        let tileset_images = config
            .map
            .tilesets
            .iter()
            .map(|ts| {
                tiles.load_tileset(&mut assets, &ts.name, &ts.source, ts.tile_width, ts.tile_height)
            })
            .collect();

        let map_name = config
            .map
            .active
            .clone()
            .or_else(|| config.map.tilemaps.first().map(|m| m.name.clone()));
        if let Some(name) = &map_name {
            tiles.set_active_map(name);
        }
        tiles.set_offset(vec2(config.map.offset[0], config.map.offset[1]));

        let player_sheets = PlayerSheets::new(&config.player, &mut assets);
        let mut session = Self {
            manager: SpriteManager::new(),
            tiles,
            assets,
            loads: PendingLoads::default(),
            textures: TextureCache::default(),
            player: EntityId(0),
            player_sheets,
            next_id: 0,
            movement: config.movement,
            map_name,
            draw_layers: config.map.draw_layers.clone(),
            tileset_images,
            tilesets_reported: false,
            hostiles_spawned: false,
            outcome: None,
        };

        session.spawn_player(&config.player);
        for spawn in &config.spawns {
            session.spawn(spawn);
        }
        session.loads.start_all(&session.assets);
        session
    }

    pub async fn start(config: &GameConfig) -> Self {
        let mut session = Self::new(config);
        session.load_tilemaps(&config.map.tilemaps).await;
        session
    }

    /// A map that fails to load is logged and left out; the session still
    /// runs without it.
    async fn load_tilemaps(&mut self, sources: &[TilemapSource]) {
        for source in sources {
            if let Err(err) = self.tiles.load_tilemap_file(&source.name, &source.source).await {
                log::error!("tilemap '{}' load failed: {err}", source.name);
            }
        }
    }

    fn next_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    fn spawn_player(&mut self, config: &PlayerConfig) {
        let id = self.next_entity_id();
        let pos = vec2(config.position[0], config.position[1]);
        let size = vec2(config.size[0], config.size[1]);
        let visual = Visual::Color(rgba(config.color));
        let mut player = Entity::new(id, EntityKind::Player, pos, size, visual);
        let idle = animation_set(Vec2::ZERO, self.player_sheets.facing);
        self.player_sheets.apply(&mut player, idle);
        self.player = id;
        self.manager.add(player);
    }

    pub fn spawn(&mut self, config: &SpawnConfig) -> EntityId {
        let id = self.next_entity_id();
        let kind = match config.kind {
            SpawnKind::Enemy => EntityKind::Enemy,
            SpawnKind::Sprite => EntityKind::Sprite,
        };
        let visual = match (&config.image, config.color) {
            (Some(image), _) if is_loadable_locator(image) => {
                Visual::Image(self.assets.register(image))
            }
            (_, Some(color)) => Visual::Color(rgba(color)),
            _ if kind == EntityKind::Sprite => Visual::Color(RED),
            _ => Visual::None,
        };
        let size = vec2(config.size[0], config.size[1]);
        let frame = config.frame_size.map(|f| vec2(f[0], f[1])).unwrap_or(size);
        let pos = vec2(config.position[0], config.position[1]);
        let mut entity = Entity::new(id, kind, pos, size, visual);
        entity.vel = vec2(config.velocity[0], config.velocity[1]);
        entity.animation = Animation::new(frame).with_frames(config.frames, 1);

        self.hostiles_spawned |= entity.is_hostile();
        self.manager.add(entity);
        self.loads.start_all(&self.assets);
        id
    }

    pub fn player_id(&self) -> EntityId {
        self.player
    }

    pub fn manager(&self) -> &SpriteManager {
        &self.manager
    }

    #[cfg(test)]
    pub fn manager_mut(&mut self) -> &mut SpriteManager {
        &mut self.manager
    }

    #[cfg(test)]
    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    /// Advances this session's image loads. Tiles and sprites whose images
    /// are not ready are simply not drawn meanwhile.
    pub fn poll_loads(&mut self, cx: &mut Context<'_>) {
        if !self.loads.is_empty() {
            self.loads.poll(cx, &mut self.assets, &mut self.textures);
        }
        if !self.tilesets_reported && self.assets.all_settled(&self.tileset_images) {
            self.tilesets_reported = true;
            self.tiles.log_tilesets(&self.assets);
        }
    }

    /// One simulation step. Returns `Ended` on the tick the game is decided;
    /// an ended session ignores further ticks.
    pub fn tick(&mut self, input: &InputState, playfield: Vec2) -> Option<GameEvent> {
        if self.outcome.is_some() {
            return None;
        }

        let Some(player) = self.manager.get(self.player) else {
            return self.end(false, 0);
        };
        let others = self.manager.iter();
        let intent = resolve_intent(input, player, others, &self.tiles, &self.movement);
        let set = animation_set(intent.velocity, self.player_sheets.facing);
        if let Some(player) = self.manager.get_mut(self.player) {
            player.vel = intent.velocity;
            if intent.jump {
                player.start_jump();
            }
            self.player_sheets.apply(player, set);
        }

        let defeated = self.manager.update(playfield);
        if let Some(player) = defeated.iter().find(|e| e.id() == self.player) {
            return self.end(false, player.health());
        }

        if self.hostiles_spawned && !self.manager.iter().any(Entity::is_hostile) {
            let health = self.manager.get(self.player).map_or(0, Entity::health);
            return self.end(true, health);
        }
        None
    }

    fn end(&mut self, won: bool, final_health: i32) -> Option<GameEvent> {
        let event = GameEvent::Ended { won, final_health };
        log::info!("game over: won={won}, final health {final_health}");
        self.outcome = Some(event);
        Some(event)
    }

    pub fn render(&self, surface: &mut dyn Surface) {
        surface.clear();
        if let Some(map) = &self.map_name {
            for layer in &self.draw_layers {
                self.tiles.draw_tilemap_layer(
                    surface,
                    &self.assets,
                    map,
                    layer,
                    self.tiles.offset(),
                    self.tiles.scale(),
                );
            }
        }
        self.manager.render(surface, &self.assets);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Menu,
    Playing,
    Over { won: bool, final_health: i32 },
}

/// Start / restart / end bookkeeping around the current session.
pub struct Lifecycle {
    phase: Phase,
    session: Option<GameSession>,
    sessions_started: u32,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: Phase::Menu,
            session: None,
            sessions_started: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut GameSession> {
        self.session.as_mut()
    }

    /// Replaces any previous session with `session`.
    pub fn start(&mut self, session: GameSession) -> GameEvent {
        let event = if self.sessions_started == 0 {
            GameEvent::Started
        } else {
            GameEvent::Restarted
        };
        self.sessions_started += 1;
        self.session = Some(session);
        self.phase = Phase::Playing;
        log::info!("{event:?}");
        event
    }

    pub fn tick(&mut self, input: &InputState, playfield: Vec2) -> Option<GameEvent> {
        let session = self.session.as_mut()?;
        let event = session.tick(input, playfield)?;
        if let GameEvent::Ended { won, final_health } = event {
            self.phase = Phase::Over { won, final_health };
            self.session = None;
        }
        Some(event)
    }

    pub fn to_menu(&mut self) {
        self.session = None;
        self.phase = Phase::Menu;
    }
}

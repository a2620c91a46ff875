use macroquad::prelude::*;
use serde::Deserialize;
use std::collections::HashSet;

use crate::entity::Entity;
use crate::tilemap::TilemapStore;

pub const LEFT_KEYS: [KeyCode; 2] = [KeyCode::A, KeyCode::Left];
pub const RIGHT_KEYS: [KeyCode; 2] = [KeyCode::D, KeyCode::Right];
pub const UP_KEYS: [KeyCode; 2] = [KeyCode::W, KeyCode::Up];
pub const DOWN_KEYS: [KeyCode; 2] = [KeyCode::S, KeyCode::Down];
pub const RUN_KEYS: [KeyCode; 2] = [KeyCode::LeftShift, KeyCode::RightShift];
pub const JUMP_KEYS: [KeyCode; 1] = [KeyCode::Space];

/// Held-key snapshot consumed read-only by one tick.
#[derive(Clone, Debug, Default)]
pub struct InputState {
    held: HashSet<KeyCode>,
}

impl InputState {
    /// Reads every bound key from the window's keyboard state.
    pub fn sample() -> Self {
        let mut input = Self::default();
        let bound = LEFT_KEYS
            .iter()
            .chain(&RIGHT_KEYS)
            .chain(&UP_KEYS)
            .chain(&DOWN_KEYS)
            .chain(&RUN_KEYS)
            .chain(&JUMP_KEYS);
        for &key in bound {
            if is_key_down(key) {
                input.press(key);
            }
        }
        input
    }

    pub fn press(&mut self, key: KeyCode) {
        self.held.insert(key);
    }

    #[cfg(test)]
    pub fn release(&mut self, key: KeyCode) {
        self.held.remove(&key);
    }

    pub fn any_held(&self, keys: &[KeyCode]) -> bool {
        keys.iter().any(|key| self.held.contains(key))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct MovementConfig {
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default = "default_run_multiplier")]
    pub run_multiplier: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            run_multiplier: default_run_multiplier(),
        }
    }
}

fn default_speed() -> f32 {
    2.0
}

fn default_run_multiplier() -> f32 {
    2.0
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intent {
    pub velocity: Vec2,
    pub jump: bool,
}

/// Velocity the held keys ask for. Right wins over left, down over up.
pub fn intended_velocity(input: &InputState, movement: &MovementConfig) -> Vec2 {
    let speed = if input.any_held(&RUN_KEYS) {
        movement.speed * movement.run_multiplier
    } else {
        movement.speed
    };

    let mut velocity = Vec2::ZERO;
    if input.any_held(&LEFT_KEYS) {
        velocity.x = -speed;
    }
    if input.any_held(&RIGHT_KEYS) {
        velocity.x = speed;
    }
    if input.any_held(&UP_KEYS) {
        velocity.y = -speed;
    }
    if input.any_held(&DOWN_KEYS) {
        velocity.y = speed;
    }
    velocity
}

fn moves_toward(velocity: f32, delta: f32) -> bool {
    (velocity > 0.0 && delta <= 0.0) || (velocity < 0.0 && delta >= 0.0)
}

/// Per-axis vetoes against every entity `entity` currently overlaps: an axis
/// is blocked if moving along it would press further into one of them.
pub fn overlap_veto<'a>(
    entity: &Entity,
    others: impl IntoIterator<Item = &'a Entity>,
    velocity: Vec2,
) -> BVec2 {
    let mut blocked = BVec2::FALSE;
    if !entity.colliding {
        return blocked;
    }
    for other in others {
        if other.id() == entity.id() || !entity.check_collision(other) {
            continue;
        }
        let delta = entity.pos - other.pos;
        blocked.x |= moves_toward(velocity.x, delta.x);
        blocked.y |= moves_toward(velocity.y, delta.y);
    }
    blocked
}

/// Per-axis vetoes from the collision layer, each axis tried on its own.
pub fn tile_veto(tiles: &TilemapStore, entity: &Entity, velocity: Vec2) -> BVec2 {
    let pos = entity.pos;
    BVec2::new(
        velocity.x != 0.0 && !tiles.can_move_to(entity, pos.x + velocity.x, pos.y),
        velocity.y != 0.0 && !tiles.can_move_to(entity, pos.x, pos.y + velocity.y),
    )
}

/// An axis moves only if neither the entity-overlap check nor the tile check
/// vetoes it.
pub fn resolve_intent<'a>(
    input: &InputState,
    entity: &Entity,
    others: impl IntoIterator<Item = &'a Entity>,
    tiles: &TilemapStore,
    movement: &MovementConfig,
) -> Intent {
    let wanted = intended_velocity(input, movement);
    let blocked = overlap_veto(entity, others, wanted) | tile_veto(tiles, entity, wanted);
    let velocity = vec2(
        if blocked.x { 0.0 } else { wanted.x },
        if blocked.y { 0.0 } else { wanted.y },
    );
    Intent {
        velocity,
        jump: input.any_held(&JUMP_KEYS) && !entity.jump.jumping,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Motion {
    Idle,
    Walk,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnimationSet {
    pub motion: Motion,
    pub facing: Facing,
}

impl AnimationSet {
    pub const ALL: [AnimationSet; 8] = [
        AnimationSet::new(Motion::Idle, Facing::Up),
        AnimationSet::new(Motion::Idle, Facing::Down),
        AnimationSet::new(Motion::Idle, Facing::Left),
        AnimationSet::new(Motion::Idle, Facing::Right),
        AnimationSet::new(Motion::Walk, Facing::Up),
        AnimationSet::new(Motion::Walk, Facing::Down),
        AnimationSet::new(Motion::Walk, Facing::Left),
        AnimationSet::new(Motion::Walk, Facing::Right),
    ];

    pub const fn new(motion: Motion, facing: Facing) -> Self {
        Self { motion, facing }
    }

    /// Config key, e.g. `walk_left`.
    pub fn key(&self) -> String {
        let motion = match self.motion {
            Motion::Idle => "idle",
            Motion::Walk => "walk",
        };
        let facing = match self.facing {
            Facing::Up => "up",
            Facing::Down => "down",
            Facing::Left => "left",
            Facing::Right => "right",
        };
        format!("{motion}_{facing}")
    }
}

/// Sheet to show for a movement intent. Standing still keeps the last facing;
/// horizontal movement wins on diagonals.
pub fn animation_set(velocity: Vec2, facing: Facing) -> AnimationSet {
    if velocity == Vec2::ZERO {
        return AnimationSet::new(Motion::Idle, facing);
    }
    let facing = if velocity.x.abs() >= velocity.y.abs() {
        if velocity.x < 0.0 {
            Facing::Left
        } else {
            Facing::Right
        }
    } else if velocity.y < 0.0 {
        Facing::Up
    } else {
        Facing::Down
    };
    AnimationSet::new(Motion::Walk, facing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityId, EntityKind, Visual};

    const MAP: &str = r#"{
        "tilewidth": 10, "tileheight": 10,
        "layers": [
            { "name": "Collision", "type": "tilelayer", "width": 4, "height": 4,
              "data": [0, 0, 1, 0,
                       0, 0, 1, 0,
                       0, 0, 0, 0,
                       0, 0, 0, 0] }
        ],
        "tilesets": []
    }"#;

    const NOBODY: [&Entity; 0] = [];

    fn held(keys: &[KeyCode]) -> InputState {
        let mut input = InputState::default();
        for &key in keys {
            input.press(key);
        }
        input
    }

    fn entity(id: u32, kind: EntityKind, x: f32, y: f32) -> Entity {
        Entity::new(EntityId(id), kind, vec2(x, y), vec2(5.0, 5.0), Visual::None)
    }

    fn tiles() -> TilemapStore {
        let mut tiles = TilemapStore::new(1.0);
        tiles.load_tilemap("arena", MAP).unwrap();
        tiles.set_active_map("arena");
        tiles
    }

    #[test]
    fn run_modifier_doubles_speed() {
        let movement = MovementConfig::default();
        assert_eq!(intended_velocity(&held(&[KeyCode::A]), &movement), vec2(-2.0, 0.0));
        assert_eq!(
            intended_velocity(&held(&[KeyCode::Down, KeyCode::LeftShift]), &movement),
            vec2(0.0, 4.0)
        );
        assert_eq!(
            intended_velocity(&held(&[KeyCode::Left, KeyCode::D]), &movement),
            vec2(2.0, 0.0)
        );
    }

    #[test]
    fn released_keys_stop_counting() {
        let mut input = held(&[KeyCode::W]);
        input.release(KeyCode::W);
        assert_eq!(intended_velocity(&input, &MovementConfig::default()), Vec2::ZERO);
    }

    #[test]
    fn overlap_blocks_pressing_into_contact() {
        let mut player = entity(1, EntityKind::Player, 10.0, 10.0);
        player.colliding = true;
        let enemy = entity(2, EntityKind::Enemy, 13.0, 12.0);

        let blocked = overlap_veto(&player, [&enemy], vec2(2.0, -2.0));
        assert!(blocked.x);
        assert!(!blocked.y);

        let blocked = overlap_veto(&player, [&enemy], vec2(-2.0, 2.0));
        assert!(!blocked.x);
        assert!(blocked.y);

        player.colliding = false;
        assert_eq!(overlap_veto(&player, [&enemy], vec2(2.0, 2.0)), BVec2::FALSE);
    }

    #[test]
    fn collision_tile_keeps_axis_still() {
        let tiles = tiles();
        let player = entity(1, EntityKind::Player, 14.0, 4.0);
        let input = held(&[KeyCode::D, KeyCode::S]);
        let intent = resolve_intent(&input, &player, NOBODY, &tiles, &MovementConfig::default());
        // right edge would reach column 2, which is solid; down is clear
        assert_eq!(intent.velocity, vec2(0.0, 2.0));
    }

    #[test]
    fn either_veto_blocks_an_axis() {
        let tiles = tiles();
        let mut player = entity(1, EntityKind::Player, 5.0, 25.0);
        player.colliding = true;
        let blocker = entity(2, EntityKind::Enemy, 7.0, 28.0);
        let input = held(&[KeyCode::S, KeyCode::A]);
        let movement = MovementConfig::default();
        let intent = resolve_intent(&input, &player, [&blocker], &tiles, &movement);
        assert_eq!(intent.velocity, vec2(-2.0, 0.0));
    }

    #[test]
    fn jump_only_when_grounded() {
        let tiles = tiles();
        let mut player = entity(1, EntityKind::Player, 0.0, 30.0);
        let input = held(&[KeyCode::Space]);
        let movement = MovementConfig::default();
        assert!(resolve_intent(&input, &player, NOBODY, &tiles, &movement).jump);
        player.start_jump();
        assert!(!resolve_intent(&input, &player, NOBODY, &tiles, &movement).jump);
    }

    #[test]
    fn animation_set_follows_intent() {
        let set = animation_set(vec2(-2.0, 2.0), Facing::Down);
        assert_eq!(set, AnimationSet::new(Motion::Walk, Facing::Left));
        let set = animation_set(vec2(0.0, -4.0), Facing::Left);
        assert_eq!(set, AnimationSet::new(Motion::Walk, Facing::Up));
        let set = animation_set(Vec2::ZERO, Facing::Up);
        assert_eq!(set, AnimationSet::new(Motion::Idle, Facing::Up));
        assert_eq!(set.key(), "idle_up");
    }
}

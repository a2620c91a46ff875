use macroquad::prelude::*;

use crate::assets::AssetStore;
use crate::entity::{Entity, EntityId};
use crate::helpers::clamp_box_to_rect;
use crate::surface::Surface;

pub const CONTACT_DAMAGE: i32 = 10;

/// Owns the live entities of one session, in insertion order.
#[derive(Default)]
pub struct SpriteManager {
    sprites: Vec<Entity>,
}

impl SpriteManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entity: Entity) {
        self.sprites.push(entity);
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let index = self.sprites.iter().position(|e| e.id() == id)?;
        let removed = self.sprites.remove(index);
        log::debug!("{:?} {:?} removed from game", removed.kind(), id);
        Some(removed)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.sprites.iter().find(|e| e.id() == id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.sprites.iter_mut().find(|e| e.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.sprites.iter()
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    /// Runs one simulation step and returns the entities defeated during it.
    pub fn update(&mut self, playfield: Vec2) -> Vec<Entity> {
        for sprite in self.sprites.iter_mut() {
            sprite.colliding = false;
        }
        for sprite in self.sprites.iter_mut() {
            sprite.update();
        }

        let defeated = self.check_collisions();
        let mut removed = Vec::new();
        if defeated.iter().any(|d| *d) {
            let mut i = 0usize;
            self.sprites.retain(|sprite| {
                let keep = !defeated[i];
                i += 1;
                if !keep {
                    removed.push(sprite.clone());
                }
                keep
            });
            for sprite in &removed {
                log::info!("{:?} {:?} defeated", sprite.kind(), sprite.id());
            }
        }

        let bounds = Rect::new(0.0, 0.0, playfield.x, playfield.y);
        for sprite in self.sprites.iter_mut() {
            sprite.pos = clamp_box_to_rect(sprite.pos, sprite.size(), bounds);
        }

        removed
    }

    /// Pairwise pass over i < j. An entity defeated mid-pass is skipped by
    /// every later pair and removed by the caller once the pass is over.
    fn check_collisions(&mut self) -> Vec<bool> {
        let mut defeated = vec![false; self.sprites.len()];
        for i in 0..self.sprites.len() {
            for j in (i + 1)..self.sprites.len() {
                if defeated[i] {
                    break;
                }
                if defeated[j] {
                    continue;
                }
                let (head, tail) = self.sprites.split_at_mut(j);
                let a = &mut head[i];
                let b = &mut tail[0];
                if !a.check_collision(b) {
                    continue;
                }
                match handle_collision(a, b) {
                    Some(Victim::First) => defeated[i] = true,
                    Some(Victim::Second) => defeated[j] = true,
                    None => {}
                }
            }
        }
        defeated
    }

    pub fn render(&self, surface: &mut dyn Surface, assets: &AssetStore) {
        for sprite in &self.sprites {
            sprite.render(surface, assets);
        }
    }
}

enum Victim {
    First,
    Second,
}

/// Marks both colliding, applies contact damage across a hostile/non-hostile
/// pair, then steps both back by their own velocity. The step back is a
/// coarse undo of this tick's move, not penetration resolution.
fn handle_collision(a: &mut Entity, b: &mut Entity) -> Option<Victim> {
    a.colliding = true;
    b.colliding = true;

    let victim = match (a.is_hostile(), b.is_hostile()) {
        (true, false) => b.take_damage(CONTACT_DAMAGE).then_some(Victim::Second),
        (false, true) => a.take_damage(CONTACT_DAMAGE).then_some(Victim::First),
        _ => None,
    };

    a.pos -= a.vel;
    b.pos -= b.vel;

    victim
}

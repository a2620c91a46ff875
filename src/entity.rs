use macroquad::prelude::*;

use crate::assets::{AssetStore, ImageId};
use crate::helpers::rects_overlap;
use crate::surface::Surface;

pub const STARTING_HEALTH: i32 = 100;
pub const GRAVITY: f32 = 0.3;
pub const JUMP_SPEED: f32 = -7.0;
pub const FRAMES_PER_ADVANCE: u32 = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Player,
    Enemy,
    /// Plain colored box.
    Sprite,
}

impl EntityKind {
    pub fn is_hostile(self) -> bool {
        matches!(self, Self::Enemy)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Visual {
    Image(ImageId),
    Color(Color),
    None,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Animation {
    pub h_frame: u32,
    pub v_frame: u32,
    counter: u32,
    pub frames_per_advance: u32,
    pub h_frame_max: u32,
    pub v_frame_max: u32,
    pub frame_size: Vec2,
}

impl Animation {
    pub fn new(frame_size: Vec2) -> Self {
        Self {
            h_frame: 0,
            v_frame: 0,
            counter: 0,
            frames_per_advance: FRAMES_PER_ADVANCE,
            h_frame_max: 1,
            v_frame_max: 1,
            frame_size,
        }
    }

    pub fn with_frames(mut self, h_frame_max: u32, v_frame_max: u32) -> Self {
        self.h_frame_max = h_frame_max.max(1);
        self.v_frame_max = v_frame_max.max(1);
        self.h_frame %= self.h_frame_max;
        self.v_frame %= self.v_frame_max;
        self
    }

    fn advance(&mut self) {
        self.counter += 1;
        if self.counter >= self.frames_per_advance {
            self.counter = 0;
            self.h_frame += 1;
            if self.h_frame >= self.h_frame_max {
                self.h_frame = 0;
            }
        }
    }

    pub fn source_rect(&self) -> Rect {
        Rect::new(
            self.h_frame as f32 * self.frame_size.x,
            self.v_frame as f32 * self.frame_size.y,
            self.frame_size.x,
            self.frame_size.y,
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Jump {
    pub gravity_speed: f32,
    pub ground_y: f32,
    pub jumping: bool,
}

#[derive(Clone, Debug)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    pub pos: Vec2,
    size: Vec2,
    pub vel: Vec2,
    health: i32,
    pub colliding: bool,
    pub animation: Animation,
    pub jump: Jump,
    pub visual: Visual,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityKind, pos: Vec2, size: Vec2, visual: Visual) -> Self {
        Self {
            id,
            kind,
            pos,
            size,
            vel: Vec2::ZERO,
            health: STARTING_HEALTH,
            colliding: false,
            animation: Animation::new(size),
            jump: Jump {
                ground_y: pos.y,
                ..Default::default()
            },
            visual,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn is_hostile(&self) -> bool {
        self.kind.is_hostile()
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn is_defeated(&self) -> bool {
        self.health <= 0
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.pos.x, self.pos.y, self.size.x, self.size.y)
    }

    /// Animation, then gravity, then velocity.
    pub fn update(&mut self) {
        self.animation.advance();
        self.apply_gravity();
        self.pos += self.vel;
    }

    fn apply_gravity(&mut self) {
        if !self.jump.jumping {
            return;
        }
        self.jump.gravity_speed += GRAVITY;
        self.pos.y += self.jump.gravity_speed;
        if self.pos.y >= self.jump.ground_y {
            self.pos.y = self.jump.ground_y;
            self.jump.gravity_speed = 0.0;
            self.jump.jumping = false;
        }
    }

    /// Returns false if a jump is already in progress.
    pub fn start_jump(&mut self) -> bool {
        if self.jump.jumping {
            return false;
        }
        self.jump = Jump {
            gravity_speed: JUMP_SPEED,
            ground_y: self.pos.y,
            jumping: true,
        };
        true
    }

    /// Health never drops below zero. Returns whether the entity is now dead.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        self.health = (self.health - amount).max(0);
        self.is_defeated()
    }

    pub fn check_collision(&self, other: &Entity) -> bool {
        rects_overlap(self.bounds(), other.bounds())
    }

    pub fn render(&self, surface: &mut dyn Surface, assets: &AssetStore) {
        match self.visual {
            Visual::Image(image) => {
                if assets.is_ready(image) {
                    surface.draw_image_region(image, self.animation.source_rect(), self.bounds());
                }
            }
            Visual::Color(color) => surface.fill_rect(self.bounds(), color),
            Visual::None => {}
        }
    }
}

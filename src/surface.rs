use macroquad::prelude::*;

use crate::assets::{ImageId, TextureCache};

/// The drawing operations the simulation needs from a backend.
pub trait Surface {
    fn clear(&mut self);
    /// Draws `source` from `image`, scaled into `dest`.
    fn draw_image_region(&mut self, image: ImageId, source: Rect, dest: Rect);
    fn fill_rect(&mut self, dest: Rect, color: Color);
}

pub struct MacroquadSurface<'a> {
    textures: &'a TextureCache,
    background: Color,
}

impl<'a> MacroquadSurface<'a> {
    pub fn new(textures: &'a TextureCache, background: Color) -> Self {
        Self {
            textures,
            background,
        }
    }
}

impl Surface for MacroquadSurface<'_> {
    fn clear(&mut self) {
        clear_background(self.background);
    }

    fn draw_image_region(&mut self, image: ImageId, source: Rect, dest: Rect) {
        let Some(texture) = self.textures.get(image) else {
            return;
        };
        draw_texture_ex(
            texture,
            dest.x,
            dest.y,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(dest.w, dest.h)),
                source: Some(source),
                ..Default::default()
            },
        );
    }

    fn fill_rect(&mut self, dest: Rect, color: Color) {
        draw_rectangle(dest.x, dest.y, dest.w, dest.h, color);
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    pub enum DrawOp {
        Clear,
        Image { image: ImageId, source: Rect, dest: Rect },
        Fill { dest: Rect, color: Color },
    }

    /// Records every call so tests can assert on what was drawn.
    #[derive(Default)]
    pub struct RecordingSurface {
        pub ops: Vec<DrawOp>,
    }

    impl RecordingSurface {
        pub fn images(&self) -> Vec<(ImageId, Rect, Rect)> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    DrawOp::Image { image, source, dest } => Some((*image, *source, *dest)),
                    _ => None,
                })
                .collect()
        }
    }

    impl Surface for RecordingSurface {
        fn clear(&mut self) {
            self.ops.push(DrawOp::Clear);
        }

        fn draw_image_region(&mut self, image: ImageId, source: Rect, dest: Rect) {
            self.ops.push(DrawOp::Image {
                image,
                source,
                dest,
            });
        }

        fn fill_rect(&mut self, dest: Rect, color: Color) {
            self.ops.push(DrawOp::Fill { dest, color });
        }
    }
}

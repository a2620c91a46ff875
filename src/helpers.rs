use macroquad::prelude::*;

/// Resolves an asset locator. Absolute URLs pass through, local paths are
/// taken relative to the working directory.
pub fn asset_path(path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    path.strip_prefix("./").unwrap_or(path).to_string()
}

/// Whether a locator names something the asset loader can fetch.
pub fn is_loadable_locator(path: &str) -> bool {
    path.starts_with("./")
        || path.starts_with("http")
        || path.ends_with(".png")
        || path.ends_with(".jpg")
}

/// Strict AABB overlap: touching edges do not count.
pub fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.x < b.x + b.w && a.x + a.w > b.x && a.y < b.y + b.h && a.y + a.h > b.y
}

/// Moves `pos` so a box of `size` lies inside `bounds`, touching only the
/// offending coordinate.
pub fn clamp_box_to_rect(pos: Vec2, size: Vec2, bounds: Rect) -> Vec2 {
    let mut out = pos;
    if out.x < bounds.x {
        out.x = bounds.x;
    }
    if out.x + size.x > bounds.x + bounds.w {
        out.x = bounds.x + bounds.w - size.x;
    }
    if out.y < bounds.y {
        out.y = bounds.y;
    }
    if out.y + size.y > bounds.y + bounds.h {
        out.y = bounds.y + bounds.h - size.y;
    }
    out
}

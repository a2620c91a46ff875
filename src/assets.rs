use macroquad::prelude::*;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::helpers::asset_path;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageId(usize);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AssetState {
    Pending,
    Ready { width: f32, height: f32 },
    /// Permanently unavailable for this session; never retried.
    Failed,
}

struct ImageSlot {
    source: String,
    state: AssetState,
}

/// Readiness of every image a session has asked for.
#[derive(Default)]
pub struct AssetStore {
    images: Vec<ImageSlot>,
    by_source: HashMap<String, ImageId>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` as pending. Registering the same source twice
    /// returns the existing handle.
    pub fn register(&mut self, source: &str) -> ImageId {
        if let Some(id) = self.by_source.get(source) {
            return *id;
        }
        let id = ImageId(self.images.len());
        self.images.push(ImageSlot {
            source: source.to_string(),
            state: AssetState::Pending,
        });
        self.by_source.insert(source.to_string(), id);
        id
    }

    pub fn mark_ready(&mut self, id: ImageId, width: f32, height: f32) {
        if let Some(slot) = self.images.get_mut(id.0) {
            log::info!("image loaded: {}", slot.source);
            slot.state = AssetState::Ready { width, height };
        }
    }

    pub fn mark_failed(&mut self, id: ImageId, reason: &str) {
        if let Some(slot) = self.images.get_mut(id.0) {
            log::error!("failed to load image {}: {reason}", slot.source);
            slot.state = AssetState::Failed;
        }
    }

    pub fn state(&self, id: ImageId) -> AssetState {
        self.images
            .get(id.0)
            .map(|slot| slot.state)
            .unwrap_or(AssetState::Failed)
    }

    pub fn is_ready(&self, id: ImageId) -> bool {
        matches!(self.state(id), AssetState::Ready { .. })
    }

    pub fn size(&self, id: ImageId) -> Option<Vec2> {
        match self.state(id) {
            AssetState::Ready { width, height } => Some(vec2(width, height)),
            _ => None,
        }
    }

    pub fn source(&self, id: ImageId) -> Option<&str> {
        self.images.get(id.0).map(|slot| slot.source.as_str())
    }

    /// True once none of `ids` is still pending, whatever the outcome.
    pub fn all_settled(&self, ids: &[ImageId]) -> bool {
        ids.iter()
            .all(|id| self.state(*id) != AssetState::Pending)
    }

    pub fn pending(&self) -> impl Iterator<Item = (ImageId, &str)> {
        self.images
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state == AssetState::Pending)
            .map(|(i, slot)| (ImageId(i), slot.source.as_str()))
    }
}

#[derive(Default)]
pub struct TextureCache {
    textures: HashMap<ImageId, Texture2D>,
}

impl TextureCache {
    pub fn get(&self, id: ImageId) -> Option<&Texture2D> {
        self.textures.get(&id)
    }

    fn insert(&mut self, id: ImageId, texture: Texture2D) {
        self.textures.insert(id, texture);
    }
}

type TextureFuture = Pin<Box<dyn Future<Output = Result<Texture2D, macroquad::Error>>>>;

/// In-flight texture loads for one session. Dropping it abandons every load,
/// so results can only ever land in the store that started them.
#[derive(Default)]
pub struct PendingLoads {
    loads: Vec<(ImageId, TextureFuture)>,
}

impl PendingLoads {
    /// Starts a load for every image in `store` that is still pending.
    pub fn start_all(&mut self, store: &AssetStore) {
        for (id, source) in store.pending() {
            if self.loads.iter().any(|(pending, _)| *pending == id) {
                continue;
            }
            let path = asset_path(source);
            self.loads
                .push((id, Box::pin(async move { load_texture(&path).await })));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }

    /// Polls each load once and applies finished ones. Never blocks.
    pub fn poll(&mut self, cx: &mut Context<'_>, store: &mut AssetStore, cache: &mut TextureCache) {
        let mut i = 0usize;
        while i < self.loads.len() {
            match self.loads[i].1.as_mut().poll(cx) {
                Poll::Pending => i += 1,
                Poll::Ready(result) => {
                    let (id, _) = self.loads.swap_remove(i);
                    match result {
                        Ok(texture) => {
                            texture.set_filter(FilterMode::Nearest);
                            store.mark_ready(id, texture.width(), texture.height());
                            cache.insert(id, texture);
                        }
                        Err(err) => store.mark_failed(id, &err.to_string()),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent_per_source() {
        let mut store = AssetStore::new();
        let a = store.register("assets/a.png");
        let b = store.register("assets/b.png");
        assert_ne!(a, b);
        assert_eq!(store.register("assets/a.png"), a);
        assert_eq!(store.pending().count(), 2);
    }

    #[test]
    fn failures_settle_independently() {
        let mut store = AssetStore::new();
        let a = store.register("assets/a.png");
        let b = store.register("assets/b.png");
        assert!(!store.all_settled(&[a, b]));

        store.mark_failed(a, "not found");
        assert_eq!(store.state(a), AssetState::Failed);
        assert!(!store.all_settled(&[a, b]));

        store.mark_ready(b, 64.0, 32.0);
        assert!(store.all_settled(&[a, b]));
        assert_eq!(store.size(b), Some(vec2(64.0, 32.0)));
        assert_eq!(store.size(a), None);
    }
}

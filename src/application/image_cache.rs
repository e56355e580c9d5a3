//! デコード済み画像のキャッシュ
//!
//! デコード後のバイト数の合計で上限を設け、最も長く参照されていないものから破棄する。
//! 一覧と詳細の描画から並行して参照されるため、管理情報はひとつのミューテックスで守る。

use crate::domain::painting::entities::PictureId;
use image::RgbaImage;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

/// デコード済みの画像
///
/// クローンしてもピクセルはコピーされない
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pixels: Arc<RgbaImage>,
}

impl DecodedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// デコード後のバイト数
    pub fn byte_size(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

/// 同じ画像から作られる表示用の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageVariant {
    /// メイン画像を一覧用に縮小したもの
    Scaled { size: u32 },
    /// サービスが返すサムネイル
    ServiceThumbnail,
    /// フル解像度
    Full,
}

/// キャッシュのキー
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey {
    pub picture: PictureId,
    pub variant: ImageVariant,
}

impl ImageKey {
    pub fn new(picture: PictureId, variant: ImageVariant) -> Self {
        Self { picture, variant }
    }
}

struct CacheEntry {
    image: DecodedImage,
    last_access: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<ImageKey, CacheEntry>,
    /// 最終アクセス順。値はキー
    recency: BTreeMap<u64, ImageKey>,
    clock: u64,
    used_bytes: usize,
    hits: u64,
    misses: u64,
}

impl CacheState {
    fn touch(&mut self, key: &ImageKey) -> Option<DecodedImage> {
        self.clock += 1;
        let tick = self.clock;
        let entry = self.entries.get_mut(key)?;
        self.recency.remove(&entry.last_access);
        entry.last_access = tick;
        self.recency.insert(tick, key.clone());
        Some(entry.image.clone())
    }

    fn remove(&mut self, key: &ImageKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.last_access);
        self.used_bytes -= entry.image.byte_size();
        Some(entry)
    }

    fn evict_least_recent(&mut self) -> Option<ImageKey> {
        let (_, key) = self.recency.pop_first()?;
        if let Some(entry) = self.entries.remove(&key) {
            self.used_bytes -= entry.image.byte_size();
        }
        Some(key)
    }
}

/// キャッシュの統計情報
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub used_bytes: usize,
    pub budget_bytes: usize,
    pub hits: u64,
    pub misses: u64,
}

/// デコード済み画像の LRU キャッシュ
pub struct DecodedImageCache {
    budget_bytes: usize,
    state: Mutex<CacheState>,
}

impl DecodedImageCache {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            budget_bytes,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 画像を取得し、最終アクセスを更新する
    pub fn get(&self, key: &ImageKey) -> Option<DecodedImage> {
        let mut state = self.state();
        let found = state.touch(key);
        if found.is_some() {
            state.hits += 1;
        } else {
            state.misses += 1;
        }
        found
    }

    /// 画像を追加する。上限を超える場合は古いものから破棄する
    ///
    /// 単体で上限を超える画像はキャッシュしない
    pub fn insert(&self, key: ImageKey, image: DecodedImage) {
        let size = image.byte_size();
        if size > self.budget_bytes {
            debug!(picture_id = %key.picture, size, budget = self.budget_bytes, "画像が大きすぎるためキャッシュしません");
            return;
        }

        let mut state = self.state();
        state.remove(&key);
        while state.used_bytes + size > self.budget_bytes {
            match state.evict_least_recent() {
                Some(evicted) => trace!(picture_id = %evicted.picture, "キャッシュから破棄"),
                None => break,
            }
        }

        state.clock += 1;
        let tick = state.clock;
        state.recency.insert(tick, key.clone());
        state.used_bytes += size;
        state.entries.insert(
            key,
            CacheEntry {
                image,
                last_access: tick,
            },
        );
    }

    /// 画像のすべての種類を削除
    pub fn invalidate_picture(&self, picture: &PictureId) {
        let mut state = self.state();
        let keys: Vec<ImageKey> = state
            .entries
            .keys()
            .filter(|k| &k.picture == picture)
            .cloned()
            .collect();
        for key in keys {
            state.remove(&key);
        }
    }

    pub fn contains(&self, key: &ImageKey) -> bool {
        self.state().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state();
        CacheStats {
            entries: state.entries.len(),
            used_bytes: state.used_bytes,
            budget_bytes: self.budget_bytes,
            hits: state.hits,
            misses: state.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 4x4 RGBA = 64 bytes
    fn image() -> DecodedImage {
        DecodedImage::new(RgbaImage::new(4, 4))
    }

    fn key() -> ImageKey {
        ImageKey::new(PictureId::generate(), ImageVariant::Full)
    }

    #[test]
    fn test_evicts_least_recently_accessed() {
        let cache = DecodedImageCache::new(64 * 3);
        let (a, b, c) = (key(), key(), key());
        cache.insert(a.clone(), image());
        cache.insert(b.clone(), image());
        cache.insert(c.clone(), image());

        // a を最後に参照したので、最も古いのは b
        assert!(cache.get(&a).is_some());

        let d = key();
        cache.insert(d.clone(), image());

        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
        assert!(cache.contains(&d));
        assert_eq!(cache.stats().used_bytes, 64 * 3);
    }

    #[test]
    fn test_reinsert_replaces_entry() {
        let cache = DecodedImageCache::new(1024);
        let a = key();
        cache.insert(a.clone(), image());
        cache.insert(a.clone(), DecodedImage::new(RgbaImage::new(2, 2)));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().used_bytes, 16);
    }

    #[test]
    fn test_oversized_image_is_not_cached() {
        let cache = DecodedImageCache::new(32);
        let a = key();
        cache.insert(a.clone(), image());
        assert!(!cache.contains(&a));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let cache = DecodedImageCache::new(1024);
        let a = key();
        assert!(cache.get(&a).is_none());
        cache.insert(a.clone(), image());
        assert!(cache.get(&a).is_some());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_invalidate_picture_removes_all_variants() {
        let cache = DecodedImageCache::new(1024);
        let picture = PictureId::generate();
        cache.insert(ImageKey::new(picture.clone(), ImageVariant::Full), image());
        cache.insert(
            ImageKey::new(picture.clone(), ImageVariant::Scaled { size: 4 }),
            image(),
        );
        cache.insert(key(), image());

        cache.invalidate_picture(&picture);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().used_bytes, 64);
    }
}

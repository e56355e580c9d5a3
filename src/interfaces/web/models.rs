use crate::application::image_cache::CacheStats;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    pub version: String,
    pub build_timestamp: String,
    pub os: String,
    pub arch: String,
    pub environment: String,
    pub painting_count: usize,
    pub image_cache: ImageCacheInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageCacheInfo {
    pub entries: usize,
    pub used_bytes: usize,
    pub budget_bytes: usize,
    pub hits: u64,
    pub misses: u64,
}

impl From<CacheStats> for ImageCacheInfo {
    fn from(stats: CacheStats) -> Self {
        Self {
            entries: stats.entries,
            used_bytes: stats.used_bytes,
            budget_bytes: stats.budget_bytes,
            hits: stats.hits,
            misses: stats.misses,
        }
    }
}

//! アプリケーション層
//!
//! コントローラー、ビューモデル、画像キャッシュなど、
//! サービスの結果を表示用の状態に変換するロジックを含む層

pub mod controllers;
pub mod image_cache;
pub mod record_locks;
pub mod thumbnails;
pub mod view;
pub mod view_models;

#[cfg(test)]
pub(crate) mod test_support;

pub use image_cache::{DecodedImage, DecodedImageCache, ImageKey, ImageVariant};
pub use record_locks::RecordLocks;
pub use thumbnails::ImageLoader;
pub use view::{ErrorReport, Notification, View};

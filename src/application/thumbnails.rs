//! 画像の取得・デコード・縮小
//!
//! デコードと縮小は CPU を使うため `spawn_blocking` で実行する。
//! 1枚の画像のデコードに失敗してもプレースホルダーで置き換え、ユーザーには通知しない。

use crate::application::image_cache::{DecodedImage, DecodedImageCache, ImageKey, ImageVariant};
use crate::domain::painting::entities::PictureRef;
use crate::domain::painting::errors::PictureError;
use crate::domain::painting::repositories::PaintingService;
use base64::{Engine as _, engine::general_purpose};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

const PLACEHOLDER_COLOR: Rgba<u8> = Rgba([0xBD, 0xBD, 0xBD, 0xFF]);

/// バイト列をデコードする。`size` を指定した場合はその大きさに縮小する
pub fn decode_scaled(bytes: &[u8], size: Option<u32>) -> Result<DecodedImage, PictureError> {
    let image = image::load_from_memory(bytes).map_err(|e| PictureError::Decode {
        message: e.to_string(),
    })?;
    let image = match size {
        Some(size) => image.resize_exact(size, size, FilterType::Triangle),
        None => image,
    };
    Ok(DecodedImage::new(image.to_rgba8()))
}

/// 縦横比を保ったまま `max_edge` に収まるように縮小してデコードする
pub fn decode_fitted(bytes: &[u8], max_edge: u32) -> Result<DecodedImage, PictureError> {
    let image = image::load_from_memory(bytes).map_err(|e| PictureError::Decode {
        message: e.to_string(),
    })?;
    let image = if image.width() > max_edge || image.height() > max_edge {
        image.resize(max_edge, max_edge, FilterType::Triangle)
    } else {
        image
    };
    Ok(DecodedImage::new(image.to_rgba8()))
}

/// デコードに失敗した画像の代わりに表示する画像
pub fn placeholder(size: u32) -> DecodedImage {
    let size = size.max(1);
    DecodedImage::new(RgbaImage::from_pixel(size, size, PLACEHOLDER_COLOR))
}

/// JPEG にエンコードし、データURLとして返す
pub fn to_jpeg_data_url(image: &DecodedImage) -> Result<String, PictureError> {
    let rgb = DynamicImage::ImageRgba8(image.pixels().clone()).to_rgb8();
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .map_err(|e| PictureError::Encode {
            message: e.to_string(),
        })?;
    Ok(format!(
        "data:image/jpeg;base64,{}",
        general_purpose::STANDARD.encode(&buffer)
    ))
}

/// 複数の画像をまとめてデータURLに変換する。失敗した画像はプレースホルダーになる
pub async fn encode_data_urls(images: Vec<DecodedImage>, placeholder_size: u32) -> Vec<String> {
    let encoded = tokio::task::spawn_blocking(move || {
        images
            .iter()
            .map(|image| {
                to_jpeg_data_url(image).or_else(|e| {
                    warn!("画像のエンコードに失敗しました: {}", e);
                    to_jpeg_data_url(&placeholder(placeholder_size))
                })
            })
            .collect::<Result<Vec<_>, _>>()
    })
    .await;

    match encoded {
        Ok(Ok(urls)) => urls,
        Ok(Err(e)) => {
            warn!("プレースホルダーのエンコードにも失敗しました: {}", e);
            Vec::new()
        }
        Err(e) => {
            warn!("エンコードタスクが失敗しました: {}", e);
            Vec::new()
        }
    }
}

/// サービスから画像を取得し、キャッシュを通してデコードする
pub struct ImageLoader {
    service: Arc<dyn PaintingService>,
    cache: Arc<DecodedImageCache>,
    thumbnail_size: u32,
}

impl ImageLoader {
    pub fn new(
        service: Arc<dyn PaintingService>,
        cache: Arc<DecodedImageCache>,
        thumbnail_size: u32,
    ) -> Self {
        Self {
            service,
            cache,
            thumbnail_size,
        }
    }

    pub fn thumbnail_size(&self) -> u32 {
        self.thumbnail_size
    }

    pub fn cache(&self) -> &Arc<DecodedImageCache> {
        &self.cache
    }

    /// 一覧用のサムネイル。メイン画像を固定サイズに縮小する
    pub async fn scaled_thumbnail(&self, picture: &PictureRef) -> DecodedImage {
        let variant = ImageVariant::Scaled {
            size: self.thumbnail_size,
        };
        self.load(picture, variant).await
    }

    /// フル解像度の画像
    pub async fn full(&self, picture: &PictureRef) -> DecodedImage {
        self.load(picture, ImageVariant::Full).await
    }

    /// 複数の画像を並行して読み込む
    ///
    /// 完了順は問わないが、結果は `pictures` と同じ順に並べ、すべて揃ってから返す
    pub async fn load_all(
        self: &Arc<Self>,
        pictures: Vec<PictureRef>,
        variant: ImageVariant,
    ) -> Vec<DecodedImage> {
        let count = pictures.len();
        let mut tasks = JoinSet::new();
        for (index, picture) in pictures.into_iter().enumerate() {
            let loader = Arc::clone(self);
            tasks.spawn(async move { (index, loader.load(&picture, variant).await) });
        }

        let mut images: Vec<Option<DecodedImage>> = vec![None; count];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, image)) => images[index] = Some(image),
                Err(e) => warn!("画像の読み込みタスクが失敗しました: {}", e),
            }
        }

        images
            .into_iter()
            .map(|image| image.unwrap_or_else(|| placeholder(self.thumbnail_size)))
            .collect()
    }

    /// キャッシュを確認し、なければ取得・デコードする。失敗時はプレースホルダー
    pub async fn load(&self, picture: &PictureRef, variant: ImageVariant) -> DecodedImage {
        match self.try_load(picture, variant).await {
            Ok(image) => image,
            Err(e) => {
                debug!(picture_id = %picture.id, error = %e, "画像を読み込めないためプレースホルダーを使用");
                placeholder(self.thumbnail_size)
            }
        }
    }

    /// キャッシュを確認し、なければ取得・デコードする
    pub async fn try_load(
        &self,
        picture: &PictureRef,
        variant: ImageVariant,
    ) -> Result<DecodedImage, PictureError> {
        let key = ImageKey::new(picture.id.clone(), variant);
        if let Some(image) = self.cache.get(&key) {
            return Ok(image);
        }

        let fetched = match variant {
            ImageVariant::ServiceThumbnail => self.service.picture_thumbnail_stream(picture).await,
            ImageVariant::Scaled { .. } | ImageVariant::Full => {
                self.service.picture_stream(picture).await
            }
        };
        let bytes = fetched.map_err(|e| PictureError::Unavailable {
            message: e.to_string(),
        })?;

        let size = match variant {
            ImageVariant::Scaled { size } => Some(size),
            _ => None,
        };
        let image = tokio::task::spawn_blocking(move || decode_scaled(&bytes, size))
            .await
            .map_err(|e| PictureError::Decode {
                message: e.to_string(),
            })??;

        self.cache.insert(key, image.clone());
        Ok(image)
    }
}

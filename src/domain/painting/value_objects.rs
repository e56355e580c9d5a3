//! 絵画集約の値オブジェクト
//!
//! 画像データ、画像形式、タイトルやタグの正規化を定義

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// 画像形式を表す値オブジェクト
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Webp,
    Unknown,
}

impl MediaType {
    /// 先頭バイトから画像形式を推定
    pub fn sniff(bytes: &[u8]) -> Self {
        match image::guess_format(bytes) {
            Ok(image::ImageFormat::Jpeg) => Self::Jpeg,
            Ok(image::ImageFormat::Png) => Self::Png,
            Ok(image::ImageFormat::Gif) => Self::Gif,
            Ok(image::ImageFormat::Bmp) => Self::Bmp,
            Ok(image::ImageFormat::WebP) => Self::Webp,
            _ => Self::Unknown,
        }
    }

    /// 拡張子から画像形式を推定
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "gif" => Self::Gif,
            "bmp" => Self::Bmp,
            "webp" => Self::Webp,
            _ => Self::Unknown,
        }
    }

    /// MIMEタイプとして取得
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Webp => "image/webp",
            Self::Unknown => "application/octet-stream",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// サービスへ渡す画像のバイト列
///
/// クローンしてもバイト列はコピーされない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureData {
    bytes: Arc<[u8]>,
}

impl PictureData {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 内容から推定した画像形式
    pub fn media_type(&self) -> MediaType {
        MediaType::sniff(&self.bytes)
    }

    /// 内容の MD5 チェックサム(16進数)
    pub fn checksum(&self) -> String {
        format!("{:x}", md5::compute(&self.bytes))
    }
}

impl From<Vec<u8>> for PictureData {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// ユーザーが選択した画像
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedPicture {
    /// ファイル名またはパス
    pub source: Option<String>,
    pub data: PictureData,
}

impl PickedPicture {
    pub fn new(source: Option<String>, data: PictureData) -> Self {
        Self { source, data }
    }
}

/// タイトルを正規化する。空白のみの場合は `None`
pub fn normalize_title(title: &str) -> Option<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// タグを正規化する。空白のみの場合は `None`
pub fn normalize_tag(tag: &str) -> Option<String> {
    let collapsed = tag.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

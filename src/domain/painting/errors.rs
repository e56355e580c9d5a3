use crate::domain::painting::entities::{PaintingId, PictureId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 絵画サービス・クエリサービスのエラー
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceError {
    #[error("Painting not found: {id}")]
    NotFound { id: PaintingId },
    #[error("Picture not found: {id}")]
    PictureNotFound { id: PictureId },
    #[error("Painting {id} was modified concurrently")]
    ConcurrentModification { id: PaintingId },
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
    #[error("Storage connection error: {message}")]
    Connection { message: String },
    #[error("Storage error: {message}")]
    Storage { message: String },
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ServiceError {
    /// エラーが一時的なものかチェック
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConcurrentModification { .. } | Self::Internal { .. }
        )
    }

    /// エラーがクライアント側の問題かチェック
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::PictureNotFound { .. } | Self::InvalidInput { .. }
        )
    }
}

/// 画像の読み込み・デコードのエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PictureError {
    #[error("Image not readable: {path} ({reason})")]
    NotReadable { path: String, reason: String },
    #[error("Image file is empty: {path}")]
    Empty { path: String },
    #[error("Failed to decode image: {message}")]
    Decode { message: String },
    #[error("Failed to encode image: {message}")]
    Encode { message: String },
    #[error("Picture source unavailable: {message}")]
    Unavailable { message: String },
    /// 新しい画像選択が始まったため、この選択は打ち切られた
    #[error("Picture selection was replaced by a newer one")]
    Superseded,
}

/// 入力フォームの項目
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DraftField {
    Title,
    MainImage,
    Tag,
}

/// サービス呼び出し前にローカルで検出される入力エラー
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Title missing or invalid")]
    TitleMissing,
    #[error("Image missing")]
    ImageMissing,
    #[error("Image is not readable")]
    ImageNotReadable,
    #[error("Tag missing or invalid")]
    TagMissing,
}

impl ValidationError {
    /// エラーが関係する入力項目
    pub fn field(&self) -> DraftField {
        match self {
            Self::TitleMissing => DraftField::Title,
            Self::ImageMissing | Self::ImageNotReadable => DraftField::MainImage,
            Self::TagMissing => DraftField::Tag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_classification() {
        let not_found = ServiceError::NotFound {
            id: PaintingId::generate(),
        };
        assert!(not_found.is_client_error());
        assert!(!not_found.is_transient());

        let connection = ServiceError::Connection {
            message: "drive offline".to_string(),
        };
        assert!(!connection.is_client_error());
        assert!(connection.is_transient());
    }

    #[test]
    fn test_validation_error_field() {
        assert_eq!(ValidationError::TitleMissing.field(), DraftField::Title);
        assert_eq!(ValidationError::ImageNotReadable.field(), DraftField::MainImage);
        assert_eq!(ValidationError::TitleMissing.to_string(), "Title missing or invalid");
    }
}

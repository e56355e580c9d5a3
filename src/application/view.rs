//! 描画側とのインターフェース
//!
//! ネイティブのウィジェットでも Web ビューでも、このトレイトを実装すれば描画側になれる。
//! メソッドは描画スレッドへの通知として扱い、ブロックしてはならない。

use crate::application::image_cache::DecodedImage;
use crate::application::view_models::{ListSnapshot, SelectionState};
use crate::domain::painting::entities::Painting;
use crate::domain::painting::errors::ValidationError;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// ユーザーに表示するエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub message: String,
    /// 原因の詳細
    pub detail: Option<String>,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    /// 原因のエラーチェーンを詳細として含める
    pub fn with_cause(message: impl Into<String>, cause: &(dyn Error + 'static)) -> Self {
        let mut detail = cause.to_string();
        let mut source = cause.source();
        while let Some(err) = source {
            detail.push_str(": ");
            detail.push_str(&err.to_string());
            source = err.source();
        }
        Self {
            message: message.into(),
            detail: Some(detail),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({})", self.message, detail),
            None => f.write_str(&self.message),
        }
    }
}

/// 一時的な通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// すべて削除できた
    Deleted { count: usize },
    /// 一部の削除に失敗した
    PartiallyDeleted { deleted: usize, failed: usize },
    /// 絵画を保存した
    Saved { title: String },
}

impl Notification {
    pub fn text(&self) -> String {
        match self {
            Self::Deleted { count: 1 } => "Painting deleted".to_string(),
            Self::Deleted { count } => format!("{count} paintings deleted"),
            Self::PartiallyDeleted { deleted, failed } => {
                format!("{deleted} paintings deleted, {failed} could not be deleted")
            }
            Self::Saved { title } => format!("Saved \"{title}\""),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::PartiallyDeleted { .. })
    }
}

/// 描画側
pub trait View: Send + Sync {
    /// 一覧が置き換わった
    fn list_changed(&self, _snapshot: &Arc<ListSnapshot>) {}

    /// 読み込み中の表示を切り替える
    fn set_refreshing(&self, _refreshing: bool) {}

    /// 選択状態が変わった
    fn selection_changed(&self, _selection: &SelectionState) {}

    /// 詳細画面の絵画が置き換わった
    fn detail_changed(&self, _painting: &Arc<Painting>) {}

    /// 入力中の絵画の画像が選択された
    fn draft_picture_changed(&self, _preview: &DecodedImage) {}

    /// 新しい絵画を保存し、入力画面を閉じる
    fn add_painting_dismissed(&self, _painting: &Painting) {}

    /// 入力項目のエラー
    fn show_field_error(&self, error: &ValidationError);

    /// サービス呼び出しなどのエラー
    fn show_error(&self, report: &ErrorReport);

    /// 一時的な通知
    fn show_notification(&self, notification: &Notification);
}

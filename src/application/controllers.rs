//! 画面ごとのコントローラー
//!
//! サービスの呼び出しはすべて非同期で行い、結果は `View` を通して描画側へ通知する。

pub mod add_painting_controller;
pub mod detail_controller;
pub mod overview_controller;
pub mod selection_controller;

pub use add_painting_controller::AddPaintingController;
pub use detail_controller::DetailController;
pub use overview_controller::{LiveUpdates, OverviewController, ReloadOutcome};
pub use selection_controller::{BulkDeleteReport, SelectionController};

use crate::application::view::{ErrorReport, View};
use crate::domain::painting::errors::{PictureError, ServiceError, ValidationError};
use crate::domain::painting::repositories::PictureProvider;
use crate::domain::painting::value_objects::PickedPicture;
use thiserror::Error;
use tracing::{debug, warn};

/// 画像を取得できなかったときの表示
pub const PICTURE_UNAVAILABLE: &str = "Couldn't get image";

/// コントローラー操作のエラー
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Picture(#[from] PictureError),
}

impl ControllerError {
    /// 入力内容の問題か
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// 画像を選択させる。取得できなかった場合は描画側へ通知する
///
/// 新しい選択に置き換えられた場合は、新しい選択の側で結果を扱うため何も通知しない
pub(crate) async fn pick_picture(
    provider: &dyn PictureProvider,
    view: &dyn View,
) -> Result<Option<PickedPicture>, PictureError> {
    match provider.pick().await {
        Ok(Some(picture)) => {
            debug!(source = ?picture.source, bytes = picture.data.len(), "画像を取得");
            Ok(Some(picture))
        }
        Ok(None) => {
            debug!("画像の選択がキャンセルされました");
            view.show_error(&ErrorReport::new(PICTURE_UNAVAILABLE));
            Ok(None)
        }
        Err(PictureError::Superseded) => {
            debug!("画像の選択が新しい選択に置き換えられました");
            Ok(None)
        }
        Err(e) => {
            warn!("画像の取得に失敗しました: {}", e);
            view.show_error(&ErrorReport::with_cause(PICTURE_UNAVAILABLE, &e));
            Err(e)
        }
    }
}

use crate::application::image_cache::DecodedImage;
use crate::application::view::{ErrorReport, Notification, View};
use crate::application::view_models::{ListSnapshot, SelectionState};
use crate::domain::painting::entities::Painting;
use crate::domain::painting::errors::ValidationError;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 画面を持たない描画側。通知をログに出力するだけ
///
/// CLI からの一括取り込みなど、画面のない実行で使う
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingView;

impl View for TracingView {
    fn list_changed(&self, snapshot: &Arc<ListSnapshot>) {
        debug!(generation = snapshot.generation, count = snapshot.len(), "一覧が更新されました");
    }

    fn set_refreshing(&self, refreshing: bool) {
        debug!(refreshing, "読み込み中");
    }

    fn selection_changed(&self, selection: &SelectionState) {
        debug!("{}", selection.title());
    }

    fn detail_changed(&self, painting: &Arc<Painting>) {
        debug!(painting_id = %painting.id, version = painting.version, "詳細が更新されました");
    }

    fn draft_picture_changed(&self, preview: &DecodedImage) {
        debug!(width = preview.width(), height = preview.height(), "画像を選択しました");
    }

    fn add_painting_dismissed(&self, painting: &Painting) {
        debug!(painting_id = %painting.id, "入力画面を閉じました");
    }

    fn show_field_error(&self, error: &ValidationError) {
        info!(field = ?error.field(), "{}", error);
    }

    fn show_error(&self, report: &ErrorReport) {
        warn!("{}", report);
    }

    fn show_notification(&self, notification: &Notification) {
        if notification.is_failure() {
            warn!("{}", notification.text());
        } else {
            info!("{}", notification.text());
        }
    }
}

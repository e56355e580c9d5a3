//! 新しい絵画の入力画面のコントローラー
//!
//! 完了した絵画は、画面を開いた側が渡した完了チャネルへ送る。

use crate::application::controllers::{ControllerError, pick_picture};
use crate::application::image_cache::DecodedImage;
use crate::application::thumbnails::decode_fitted;
use crate::application::view::{ErrorReport, Notification, View};
use crate::application::view_models::AddPaintingDraft;
use crate::domain::painting::entities::Painting;
use crate::domain::painting::errors::{PictureError, ValidationError};
use crate::domain::painting::repositories::{PaintingService, PictureProvider};
use crate::domain::painting::value_objects::PickedPicture;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// 入力画面のプレビューの最大辺
const PREVIEW_EDGE: u32 = 512;

pub struct AddPaintingController {
    service: Arc<dyn PaintingService>,
    provider: Arc<dyn PictureProvider>,
    view: Arc<dyn View>,
    draft: tokio::sync::Mutex<AddPaintingDraft>,
    completion: Mutex<Option<oneshot::Sender<Painting>>>,
}

impl AddPaintingController {
    pub fn new(
        service: Arc<dyn PaintingService>,
        provider: Arc<dyn PictureProvider>,
        view: Arc<dyn View>,
    ) -> Self {
        Self {
            service,
            provider,
            view,
            draft: tokio::sync::Mutex::new(AddPaintingDraft::default()),
            completion: Mutex::new(None),
        }
    }

    /// 保存した絵画を受け取るチャネルを渡す
    pub fn with_completion(self, completion: oneshot::Sender<Painting>) -> Self {
        *self
            .completion
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(completion);
        self
    }

    pub async fn draft(&self) -> AddPaintingDraft {
        self.draft.lock().await.clone()
    }

    pub async fn set_title(&self, title: &str) {
        self.draft.lock().await.title = Some(title.to_string());
    }

    /// 画像を選択させる。選択された場合は `true`
    pub async fn pick_image(&self) -> Result<bool, ControllerError> {
        match pick_picture(self.provider.as_ref(), self.view.as_ref()).await? {
            Some(picture) => {
                self.set_image(picture).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 画像を設定し、プレビューを返す
    ///
    /// 画像として読めないデータは設定しない
    pub async fn set_image(&self, picture: PickedPicture) -> Result<DecodedImage, ControllerError> {
        let bytes = picture.data.clone();
        let decoded = tokio::task::spawn_blocking(move || decode_fitted(bytes.bytes(), PREVIEW_EDGE))
            .await
            .map_err(|e| PictureError::Decode {
                message: e.to_string(),
            })?;

        let preview = match decoded {
            Ok(preview) => preview,
            Err(e) => {
                debug!(source = ?picture.source, "画像として読めません: {}", e);
                self.view.show_field_error(&ValidationError::ImageNotReadable);
                return Err(ValidationError::ImageNotReadable.into());
            }
        };

        self.draft.lock().await.image = Some(picture);
        self.view.draft_picture_changed(&preview);
        Ok(preview)
    }

    /// 入力内容を検証して保存する
    ///
    /// 検証に失敗した場合はサービスを呼ばない。保存に失敗した場合は入力内容を残す。
    pub async fn submit(&self) -> Result<Painting, ControllerError> {
        let mut draft = self.draft.lock().await;
        let valid = match draft.validate() {
            Ok(valid) => valid,
            Err(e) => {
                debug!(field = ?e.field(), "入力内容に誤りがあります: {}", e);
                self.view.show_field_error(&e);
                return Err(e.into());
            }
        };

        info!(title = %valid.title, bytes = valid.image.len(), "新しい絵画を保存します");
        let painting = match self.service.compose_new(&valid.title, valid.image).await {
            Ok(painting) => painting,
            Err(e) => {
                warn!("絵画を保存できませんでした: {}", e);
                self.view
                    .show_error(&ErrorReport::with_cause("Could not save painting", &e));
                return Err(e.into());
            }
        };
        *draft = AddPaintingDraft::default();
        drop(draft);

        self.view.add_painting_dismissed(&painting);
        self.view.show_notification(&Notification::Saved {
            title: painting.title.clone(),
        });
        let completion = self
            .completion
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(completion) = completion {
            if completion.send(painting.clone()).is_err() {
                debug!("入力画面を開いた側は既に結果を待っていません");
            }
        }
        Ok(painting)
    }

    /// 入力を破棄して画面を閉じる。完了チャネルは結果を受け取らずに閉じる
    pub async fn cancel(&self) {
        *self.draft.lock().await = AddPaintingDraft::default();
        self.completion
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        debug!("新しい絵画の入力を破棄しました");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{
        RecordingView, ScriptedPaintingService, ViewEvent, sample_png,
    };
    use crate::domain::painting::value_objects::PictureData;
    use crate::infrastructure::InMemoryPaintingService;
    use async_trait::async_trait;
    use std::sync::atomic::Ordering;

    struct QueuedPictures(Mutex<Vec<PickedPicture>>);

    #[async_trait]
    impl PictureProvider for QueuedPictures {
        async fn pick(&self) -> Result<Option<PickedPicture>, PictureError> {
            Ok(self.0.lock().unwrap().pop())
        }
    }

    fn picked(bytes: Vec<u8>) -> PickedPicture {
        PickedPicture::new(Some("easel.png".to_string()), PictureData::from(bytes))
    }

    fn setup(
        pictures: Vec<PickedPicture>,
    ) -> (Arc<ScriptedPaintingService>, Arc<RecordingView>, AddPaintingController) {
        let service = ScriptedPaintingService::new(Arc::new(InMemoryPaintingService::new(16)));
        let view = RecordingView::new();
        let controller = AddPaintingController::new(
            service.clone(),
            Arc::new(QueuedPictures(Mutex::new(pictures))),
            view.clone(),
        );
        (service, view, controller)
    }

    #[tokio::test]
    async fn test_empty_title_is_rejected_before_any_call() {
        let (service, view, controller) = setup(Vec::new());
        controller.set_title("   ").await;
        controller
            .set_image(picked(sample_png(8, 8, [9, 9, 9])))
            .await
            .unwrap();

        let result = controller.submit().await;
        assert!(matches!(result, Err(ControllerError::Validation(ValidationError::TitleMissing))));
        assert_eq!(service.call_count(), 0);
        assert_eq!(view.field_errors(), vec![ValidationError::TitleMissing]);
    }

    #[tokio::test]
    async fn test_missing_image_is_rejected() {
        let (service, view, controller) = setup(Vec::new());
        controller.set_title("Cliffs").await;

        let result = controller.submit().await;
        assert!(result.unwrap_err().is_validation());
        assert_eq!(service.call_count(), 0);
        assert_eq!(view.field_errors(), vec![ValidationError::ImageMissing]);
    }

    #[tokio::test]
    async fn test_submit_completes_and_dismisses() {
        let (service, view, controller) = setup(vec![picked(sample_png(1024, 256, [200, 10, 10]))]);
        let (tx, rx) = oneshot::channel();
        let controller = controller.with_completion(tx);

        controller.set_title(" Red barn ").await;
        assert!(controller.pick_image().await.unwrap());
        let painting = controller.submit().await.unwrap();

        assert_eq!(painting.title, "Red barn");
        assert_eq!(rx.await.unwrap().id, painting.id);
        assert_eq!(service.call_count(), 1);
        assert!(controller.draft().await.is_empty());

        let events = view.events();
        assert!(events.contains(&ViewEvent::DraftPicture { width: 512 }));
        assert!(events.contains(&ViewEvent::Dismissed(painting.id.clone())));
        assert_eq!(
            view.notifications(),
            vec![Notification::Saved {
                title: "Red barn".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_failed_save_keeps_draft() {
        let (service, view, controller) = setup(Vec::new());
        service.fail_compose.store(true, Ordering::SeqCst);
        controller.set_title("Fog").await;
        controller
            .set_image(picked(sample_png(8, 8, [128, 128, 128])))
            .await
            .unwrap();

        let result = controller.submit().await;
        assert!(matches!(result, Err(ControllerError::Service(_))));

        let errors = view.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Could not save painting");
        assert!(errors[0].detail.as_deref().unwrap().contains("upload interrupted"));

        let draft = controller.draft().await;
        assert_eq!(draft.title.as_deref(), Some("Fog"));
        assert!(draft.image.is_some());
        assert!(!view.events().iter().any(|e| matches!(e, ViewEvent::Dismissed(_))));
    }

    #[tokio::test]
    async fn test_cancelled_pick_reports_error() {
        let (_, view, controller) = setup(Vec::new());
        assert!(!controller.pick_image().await.unwrap());
        assert_eq!(view.errors()[0].message, "Couldn't get image");
        assert!(controller.draft().await.image.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_image_is_not_kept() {
        let (_, view, controller) = setup(Vec::new());
        let result = controller.set_image(picked(b"garbage".to_vec())).await;
        assert!(result.is_err());
        assert_eq!(view.field_errors(), vec![ValidationError::ImageNotReadable]);
        assert!(controller.draft().await.image.is_none());
    }

    #[tokio::test]
    async fn test_cancel_closes_completion() {
        let (_, _, controller) = setup(Vec::new());
        let (tx, rx) = oneshot::channel();
        let controller = controller.with_completion(tx);
        controller.set_title("Draft").await;

        controller.cancel().await;
        assert!(rx.await.is_err());
        assert!(controller.draft().await.is_empty());
    }
}

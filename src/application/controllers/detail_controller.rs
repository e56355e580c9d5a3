//! 絵画詳細のコントローラー
//!
//! 保持している絵画は常にサービスが返した最新のスナップショット。
//! 表示用の画像はスナップショットが置き換わった後、最初に参照されたときに作り直す。

use crate::application::controllers::{ControllerError, pick_picture};
use crate::application::image_cache::ImageVariant;
use crate::application::record_locks::RecordLocks;
use crate::application::thumbnails::ImageLoader;
use crate::application::view::{ErrorReport, View};
use crate::application::view_models::{DerivedImage, DetailFields};
use crate::domain::painting::entities::{Painting, PaintingId, PictureRef};
use crate::domain::painting::errors::{ServiceError, ValidationError};
use crate::domain::painting::repositories::{PaintingService, PictureProvider};
use crate::domain::painting::value_objects::{PictureData, normalize_tag};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

pub struct DetailController {
    id: PaintingId,
    service: Arc<dyn PaintingService>,
    images: Arc<ImageLoader>,
    locks: Arc<RecordLocks>,
    view: Arc<dyn View>,
    current: RwLock<Arc<Painting>>,
    derived: tokio::sync::Mutex<Option<DetailFields>>,
}

impl DetailController {
    /// サービスから絵画を取得して詳細画面を開く
    pub async fn open(
        id: PaintingId,
        service: Arc<dyn PaintingService>,
        images: Arc<ImageLoader>,
        locks: Arc<RecordLocks>,
        view: Arc<dyn View>,
    ) -> Result<Self, ServiceError> {
        let painting = match service.get(&id).await {
            Ok(painting) => painting,
            Err(e) => {
                warn!(painting_id = %id, "絵画を開けません: {}", e);
                view.show_error(&ErrorReport::with_cause("Could not open painting", &e));
                return Err(e);
            }
        };
        debug!(painting_id = %id, title = %painting.title, "詳細画面を開きます");
        Ok(Self::with_snapshot(painting, service, images, locks, view))
    }

    /// 取得済みの絵画で詳細画面を開く
    pub fn with_snapshot(
        painting: Painting,
        service: Arc<dyn PaintingService>,
        images: Arc<ImageLoader>,
        locks: Arc<RecordLocks>,
        view: Arc<dyn View>,
    ) -> Self {
        Self {
            id: painting.id.clone(),
            service,
            images,
            locks,
            view,
            current: RwLock::new(Arc::new(painting)),
            derived: tokio::sync::Mutex::new(None),
        }
    }

    pub fn id(&self) -> &PaintingId {
        &self.id
    }

    /// 現在のスナップショット
    pub fn painting(&self) -> Arc<Painting> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub async fn add_wip(&self, picture: PictureData) -> Result<Arc<Painting>, ControllerError> {
        self.mutate("add work in progress", move |service, painting| {
            let picture = picture.clone();
            async move { service.add_wip(&painting, vec![picture]).await }
        })
        .await
    }

    pub async fn add_reference(&self, picture: PictureData) -> Result<Arc<Painting>, ControllerError> {
        self.mutate("add reference", move |service, painting| {
            let picture = picture.clone();
            async move { service.add_references(&painting, vec![picture]).await }
        })
        .await
    }

    /// タグを追加する。空のタグはサービスを呼ばずにエラーにする
    pub async fn add_tag(&self, tag: &str) -> Result<Arc<Painting>, ControllerError> {
        let Some(tag) = normalize_tag(tag) else {
            self.view.show_field_error(&ValidationError::TagMissing);
            return Err(ValidationError::TagMissing.into());
        };
        self.mutate("add tag", move |service, painting| {
            let tags = BTreeSet::from([tag.clone()]);
            async move { service.add_tags(&painting, tags).await }
        })
        .await
    }

    /// 完成日を設定する
    pub async fn finish(&self, date: NaiveDate) -> Result<Arc<Painting>, ControllerError> {
        self.mutate("finish painting", move |service, painting| async move {
            service.change(&painting.finished_on(date)).await
        })
        .await
    }

    /// 画像を選択させて WIP に追加する。キャンセルされた場合は `None`
    pub async fn pick_and_add_wip(
        &self,
        provider: &dyn PictureProvider,
    ) -> Result<Option<Arc<Painting>>, ControllerError> {
        match pick_picture(provider, self.view.as_ref()).await? {
            Some(picture) => self.add_wip(picture.data).await.map(Some),
            None => Ok(None),
        }
    }

    /// 画像を選択させて参考画像に追加する。キャンセルされた場合は `None`
    pub async fn pick_and_add_reference(
        &self,
        provider: &dyn PictureProvider,
    ) -> Result<Option<Arc<Painting>>, ControllerError> {
        match pick_picture(provider, self.view.as_ref()).await? {
            Some(picture) => self.add_reference(picture.data).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn main_image(&self) -> DerivedImage {
        self.fields().await.main_image
    }

    /// WIP 画像。新しい順
    pub async fn wips(&self) -> Vec<DerivedImage> {
        self.fields().await.wips
    }

    pub async fn refs(&self) -> Vec<DerivedImage> {
        self.fields().await.refs
    }

    /// 現在のスナップショットから作った表示用の画像
    pub async fn fields(&self) -> DetailFields {
        let mut memo = self.derived.lock().await;
        let painting = self.painting();
        if let Some(fields) = memo.as_ref() {
            if fields.is_for(&painting) {
                return fields.clone();
            }
        }

        debug!(painting_id = %self.id, version = painting.version, "表示用の画像を作成");
        let fields = self.derive(painting).await;
        *memo = Some(fields.clone());
        fields
    }

    async fn derive(&self, painting: Arc<Painting>) -> DetailFields {
        let main = async {
            DerivedImage {
                source: painting.main_picture.id.clone(),
                image: self.images.full(&painting.main_picture).await,
            }
        };
        let wips = self.thumbnails(painting.wips_most_recent_first().cloned().collect());
        let refs = self.thumbnails(painting.references.clone());
        let (main_image, wips, refs) = tokio::join!(main, wips, refs);

        DetailFields {
            painting,
            main_image,
            wips,
            refs,
        }
    }

    async fn thumbnails(&self, pictures: Vec<PictureRef>) -> Vec<DerivedImage> {
        let sources: Vec<_> = pictures.iter().map(|p| p.id.clone()).collect();
        let images = self
            .images
            .load_all(pictures, ImageVariant::ServiceThumbnail)
            .await;
        sources
            .into_iter()
            .zip(images)
            .map(|(source, image)| DerivedImage { source, image })
            .collect()
    }

    /// 絵画ごとのロックを取り、最新のスナップショットに対して変更を行う
    ///
    /// 保持しているスナップショットが古かった場合は取得し直して一度だけやり直す
    async fn mutate<F, Fut>(&self, action: &str, op: F) -> Result<Arc<Painting>, ControllerError>
    where
        F: Fn(Arc<dyn PaintingService>, Arc<Painting>) -> Fut,
        Fut: Future<Output = Result<Painting, ServiceError>>,
    {
        let _guard = self.locks.lock(&self.id).await;

        let result = match op(self.service.clone(), self.painting()).await {
            Err(ServiceError::ConcurrentModification { .. }) => {
                debug!(painting_id = %self.id, "他で更新されていたため取得し直します");
                match self.service.get(&self.id).await {
                    Ok(latest) => {
                        let latest = self.replace(latest);
                        op(self.service.clone(), latest).await
                    }
                    Err(e) => Err(e),
                }
            }
            other => other,
        };

        match result {
            Ok(updated) => {
                let updated = self.replace(updated);
                info!(painting_id = %self.id, version = updated.version, "{}", action);
                Ok(updated)
            }
            Err(e) => {
                warn!(painting_id = %self.id, "{}に失敗しました: {}", action, e);
                self.view
                    .show_error(&ErrorReport::with_cause(format!("Could not {action}"), &e));
                Err(e.into())
            }
        }
    }

    fn replace(&self, painting: Painting) -> Arc<Painting> {
        let painting = Arc::new(painting);
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = painting.clone();
        self.view.detail_changed(&painting);
        painting
    }
}

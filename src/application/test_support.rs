//! テスト用の描画側とサービスのラッパー

use crate::application::image_cache::DecodedImage;
use crate::application::view::{ErrorReport, Notification, View};
use crate::application::view_models::{ListSnapshot, SelectionState};
use crate::domain::painting::entities::{Painting, PaintingId, PictureRef};
use crate::domain::painting::errors::{ServiceError, ValidationError};
use crate::domain::painting::repositories::{
    ChangeNotification, PaintingQuery, PaintingService, QueryRow,
};
use crate::domain::painting::value_objects::PictureData;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::{BTreeSet, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, oneshot};

/// 単色の PNG を作成
pub fn sample_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb(rgb));
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .expect("PNG エンコード");
    buffer
}

/// 描画側に届いたイベント
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    ListChanged { generation: u64, ids: Vec<PaintingId> },
    Refreshing(bool),
    SelectionChanged { count: usize },
    DetailChanged { version: u32 },
    DraftPicture { width: u32 },
    Dismissed(PaintingId),
    FieldError(ValidationError),
    Error(ErrorReport),
    Notification(Notification),
}

/// イベントを記録する描画側
#[derive(Default)]
pub struct RecordingView {
    events: Mutex<Vec<ViewEvent>>,
}

impl RecordingView {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, event: ViewEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn field_errors(&self) -> Vec<ValidationError> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::FieldError(error) => Some(error),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<ErrorReport> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Error(report) => Some(report),
                _ => None,
            })
            .collect()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Notification(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn refreshing_events(&self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ViewEvent::Refreshing(r) => Some(r),
                _ => None,
            })
            .collect()
    }
}

impl View for RecordingView {
    fn list_changed(&self, snapshot: &Arc<ListSnapshot>) {
        self.push(ViewEvent::ListChanged {
            generation: snapshot.generation,
            ids: snapshot.ids(),
        });
    }

    fn set_refreshing(&self, refreshing: bool) {
        self.push(ViewEvent::Refreshing(refreshing));
    }

    fn selection_changed(&self, selection: &SelectionState) {
        self.push(ViewEvent::SelectionChanged {
            count: selection.count(),
        });
    }

    fn detail_changed(&self, painting: &Arc<Painting>) {
        self.push(ViewEvent::DetailChanged {
            version: painting.version,
        });
    }

    fn draft_picture_changed(&self, preview: &DecodedImage) {
        self.push(ViewEvent::DraftPicture {
            width: preview.width(),
        });
    }

    fn add_painting_dismissed(&self, painting: &Painting) {
        self.push(ViewEvent::Dismissed(painting.id.clone()));
    }

    fn show_field_error(&self, error: &ValidationError) {
        self.push(ViewEvent::FieldError(*error));
    }

    fn show_error(&self, report: &ErrorReport) {
        self.push(ViewEvent::Error(report.clone()));
    }

    fn show_notification(&self, notification: &Notification) {
        self.push(ViewEvent::Notification(notification.clone()));
    }
}

/// 呼び出し回数を数え、指定した操作を失敗させるサービス
pub struct ScriptedPaintingService {
    inner: Arc<dyn PaintingService>,
    pub calls: AtomicUsize,
    pub fail_compose: AtomicBool,
    fail_deletes: Mutex<HashSet<PaintingId>>,
}

impl ScriptedPaintingService {
    pub fn new(inner: Arc<dyn PaintingService>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
            fail_compose: AtomicBool::new(false),
            fail_deletes: Mutex::new(HashSet::new()),
        })
    }

    pub fn fail_delete_of(&self, id: PaintingId) {
        self.fail_deletes.lock().unwrap().insert(id);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaintingService for ScriptedPaintingService {
    async fn get(&self, id: &PaintingId) -> Result<Painting, ServiceError> {
        self.record();
        self.inner.get(id).await
    }

    async fn compose_new(&self, title: &str, main_picture: PictureData) -> Result<Painting, ServiceError> {
        self.record();
        if self.fail_compose.load(Ordering::SeqCst) {
            return Err(ServiceError::Connection {
                message: "upload interrupted".to_string(),
            });
        }
        self.inner.compose_new(title, main_picture).await
    }

    async fn add_wip(&self, painting: &Painting, pictures: Vec<PictureData>) -> Result<Painting, ServiceError> {
        self.record();
        self.inner.add_wip(painting, pictures).await
    }

    async fn add_references(
        &self,
        painting: &Painting,
        pictures: Vec<PictureData>,
    ) -> Result<Painting, ServiceError> {
        self.record();
        self.inner.add_references(painting, pictures).await
    }

    async fn add_tags(&self, painting: &Painting, tags: BTreeSet<String>) -> Result<Painting, ServiceError> {
        self.record();
        self.inner.add_tags(painting, tags).await
    }

    async fn change(&self, painting: &Painting) -> Result<Painting, ServiceError> {
        self.record();
        self.inner.change(painting).await
    }

    async fn delete(&self, id: &PaintingId) -> Result<(), ServiceError> {
        self.record();
        if self.fail_deletes.lock().unwrap().contains(id) {
            return Err(ServiceError::Storage {
                message: "remote storage rejected the delete".to_string(),
            });
        }
        self.inner.delete(id).await
    }

    async fn picture_stream(&self, picture: &PictureRef) -> Result<Vec<u8>, ServiceError> {
        self.inner.picture_stream(picture).await
    }

    async fn picture_thumbnail_stream(&self, picture: &PictureRef) -> Result<Vec<u8>, ServiceError> {
        self.inner.picture_thumbnail_stream(picture).await
    }
}

/// 最初の実行だけ、結果を取得した後にゲートが開くまで待つクエリ
///
/// `failing` で作った場合、ゲートが開いた後その実行は接続エラーになる
pub struct GatedQuery {
    inner: Arc<dyn PaintingQuery>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    fail_gated_run: bool,
}

impl GatedQuery {
    pub fn new(inner: Arc<dyn PaintingQuery>) -> (Arc<Self>, oneshot::Sender<()>) {
        Self::build(inner, false)
    }

    pub fn failing(inner: Arc<dyn PaintingQuery>) -> (Arc<Self>, oneshot::Sender<()>) {
        Self::build(inner, true)
    }

    fn build(inner: Arc<dyn PaintingQuery>, fail_gated_run: bool) -> (Arc<Self>, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        let query = Arc::new(Self {
            inner,
            gate: Mutex::new(Some(rx)),
            fail_gated_run,
        });
        (query, tx)
    }
}

#[async_trait]
impl PaintingQuery for GatedQuery {
    async fn run(&self) -> Result<Vec<QueryRow>, ServiceError> {
        let rows = self.inner.run().await?;
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
            if self.fail_gated_run {
                return Err(ServiceError::Connection {
                    message: "connection reset".to_string(),
                });
            }
        }
        Ok(rows)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.inner.subscribe()
    }
}

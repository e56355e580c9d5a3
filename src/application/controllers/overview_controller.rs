//! 絵画一覧のコントローラー
//!
//! 再読み込みは世代番号で管理し、最後に開始した再読み込みの結果だけを一覧に反映する。
//! 古い再読み込みが後から完了しても、その結果は捨てる。

use crate::application::image_cache::ImageVariant;
use crate::application::thumbnails::ImageLoader;
use crate::application::view::{ErrorReport, View};
use crate::application::view_models::{ListSnapshot, PaintingSummary};
use crate::domain::painting::entities::PaintingId;
use crate::domain::painting::errors::ServiceError;
use crate::domain::painting::repositories::{PaintingQuery, PaintingService};
use crate::measure_time;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// 再読み込みの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// 一覧に反映した
    Applied { generation: u64, count: usize },
    /// より新しい再読み込みが開始されていたため捨てた
    Superseded { generation: u64 },
}

impl ReloadOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// 絵画一覧のコントローラー
pub struct OverviewController {
    service: Arc<dyn PaintingService>,
    query: Arc<dyn PaintingQuery>,
    images: Arc<ImageLoader>,
    view: Arc<dyn View>,
    model: watch::Sender<Arc<ListSnapshot>>,
    /// 最後に開始した再読み込みの世代
    latest_generation: AtomicU64,
    /// 実行中の再読み込みの数
    in_flight: Mutex<usize>,
}

impl OverviewController {
    pub fn new(
        service: Arc<dyn PaintingService>,
        query: Arc<dyn PaintingQuery>,
        images: Arc<ImageLoader>,
        view: Arc<dyn View>,
    ) -> Self {
        let (model, _) = watch::channel(Arc::new(ListSnapshot::default()));
        Self {
            service,
            query,
            images,
            view,
            model,
            latest_generation: AtomicU64::new(0),
            in_flight: Mutex::new(0),
        }
    }

    /// 現在の一覧
    pub fn snapshot(&self) -> Arc<ListSnapshot> {
        self.model.borrow().clone()
    }

    /// 一覧の置き換えを購読
    pub fn subscribe(&self) -> watch::Receiver<Arc<ListSnapshot>> {
        self.model.subscribe()
    }

    /// 指定した位置の絵画ID
    pub fn painting_at(&self, position: usize) -> Option<PaintingId> {
        self.snapshot().get(position).map(|item| item.id.clone())
    }

    /// クエリを実行して一覧を作り直す
    ///
    /// 読み込み中の表示は、完了・失敗・破棄のいずれでも必ず解除する
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<ReloadOutcome, ServiceError> {
        let generation = self.latest_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _refreshing = RefreshingGuard::begin(self);
        debug!(generation, "一覧の再読み込みを開始");

        let collected = measure_time!("reload_paintings", { self.collect().await });
        let items = match collected {
            Ok(items) => items,
            Err(e) => {
                if generation != self.latest_generation.load(Ordering::SeqCst) {
                    debug!(generation, "より新しい再読み込みがあるため失敗を破棄: {}", e);
                    return Ok(ReloadOutcome::Superseded { generation });
                }
                warn!(generation, "一覧の読み込みに失敗しました: {}", e);
                self.view
                    .show_error(&ErrorReport::with_cause("Could not load paintings", &e));
                return Err(e);
            }
        };

        let count = items.len();
        let snapshot = Arc::new(ListSnapshot::new(generation, items));
        let applied = self.model.send_if_modified(|current| {
            let is_latest = generation == self.latest_generation.load(Ordering::SeqCst);
            if !is_latest || generation <= current.generation {
                return false;
            }
            *current = snapshot.clone();
            self.view.list_changed(&snapshot);
            true
        });

        if applied {
            info!(generation, count, "一覧を更新しました");
            Ok(ReloadOutcome::Applied { generation, count })
        } else {
            debug!(generation, "より新しい再読み込みがあるため結果を破棄");
            Ok(ReloadOutcome::Superseded { generation })
        }
    }

    /// クエリの変更通知を受けるたびに再読み込みする
    ///
    /// 返したハンドルを破棄すると購読を停止する
    pub fn start_live_updates(self: &Arc<Self>) -> LiveUpdates {
        let mut changes = self.query.subscribe();
        let controller = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        debug!(painting_id = %change.id, kind = ?change.kind, "変更通知を受信");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "変更通知が溢れたため再読み込みにまとめます");
                    }
                    Err(RecvError::Closed) => break,
                }
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                tokio::spawn(async move {
                    let _ = controller.reload().await;
                });
            }
            debug!("変更通知の購読を終了");
        });
        LiveUpdates { handle }
    }

    async fn collect(&self) -> Result<Vec<PaintingSummary>, ServiceError> {
        let rows = self.query.run().await?;
        let paintings = self.service.get_from_query_result(&rows).await?;

        let variant = ImageVariant::Scaled {
            size: self.images.thumbnail_size(),
        };
        let pictures = paintings.iter().map(|p| p.main_picture.clone()).collect();
        let thumbnails = self.images.load_all(pictures, variant).await;

        Ok(paintings
            .into_iter()
            .zip(thumbnails)
            .map(|(painting, thumbnail)| PaintingSummary {
                thumbnail_source_id: painting.main_picture.id.clone(),
                id: painting.id,
                title: painting.title,
                thumbnail,
            })
            .collect())
    }
}

/// 変更通知の購読
pub struct LiveUpdates {
    handle: JoinHandle<()>,
}

impl LiveUpdates {
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for LiveUpdates {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// 実行中の再読み込みがある間だけ読み込み中を表示する
struct RefreshingGuard<'a> {
    controller: &'a OverviewController,
}

impl<'a> RefreshingGuard<'a> {
    fn begin(controller: &'a OverviewController) -> Self {
        let mut in_flight = controller
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *in_flight += 1;
        if *in_flight == 1 {
            controller.view.set_refreshing(true);
        }
        Self { controller }
    }
}

impl Drop for RefreshingGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .controller
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 {
            self.controller.view.set_refreshing(false);
        }
    }
}

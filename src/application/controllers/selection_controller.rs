//! 一覧の複数選択と一括削除

use crate::application::controllers::overview_controller::OverviewController;
use crate::application::record_locks::RecordLocks;
use crate::application::view::{Notification, View};
use crate::application::view_models::SelectionState;
use crate::domain::painting::entities::PaintingId;
use crate::domain::painting::errors::ServiceError;
use crate::domain::painting::repositories::PaintingService;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// 一括削除の結果
#[derive(Debug, Default)]
pub struct BulkDeleteReport {
    pub deleted: Vec<PaintingId>,
    pub failed: HashMap<PaintingId, ServiceError>,
    /// 結果を受け取れなかったタスクの数
    pub lost: usize,
}

impl BulkDeleteReport {
    pub fn failure_count(&self) -> usize {
        self.failed.len() + self.lost
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    pub fn total(&self) -> usize {
        self.deleted.len() + self.failure_count()
    }

    /// 一括削除全体でひとつの通知
    pub fn notification(&self) -> Notification {
        if self.has_failures() {
            Notification::PartiallyDeleted {
                deleted: self.deleted.len(),
                failed: self.failure_count(),
            }
        } else {
            Notification::Deleted {
                count: self.deleted.len(),
            }
        }
    }
}

/// 選択モードのコントローラー
pub struct SelectionController {
    service: Arc<dyn PaintingService>,
    overview: Arc<OverviewController>,
    locks: Arc<RecordLocks>,
    view: Arc<dyn View>,
    selection: Mutex<SelectionState>,
}

impl SelectionController {
    pub fn new(
        service: Arc<dyn PaintingService>,
        overview: Arc<OverviewController>,
        locks: Arc<RecordLocks>,
        view: Arc<dyn View>,
    ) -> Self {
        Self {
            service,
            overview,
            locks,
            view,
            selection: Mutex::new(SelectionState::default()),
        }
    }

    fn selection(&self) -> MutexGuard<'_, SelectionState> {
        self.selection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> SelectionState {
        self.selection().clone()
    }

    pub fn is_active(&self) -> bool {
        self.selection().is_active()
    }

    /// 位置の選択を切り替える。一覧にない位置は無視する
    ///
    /// 選択は絵画IDと組で持ち、一覧が再読み込みされていれば先に新しい位置へ付け替える
    pub fn toggle(&self, position: usize) -> SelectionState {
        let snapshot = self.overview.snapshot();
        let Some(item) = snapshot.get(position) else {
            debug!(position, "一覧にない位置は選択できません");
            return self.state();
        };

        let state = {
            let mut selection = self.selection();
            if selection.remap(&snapshot) {
                debug!("一覧の再読み込みに合わせて選択を付け替えました");
            }
            selection.toggle(position, item.id.clone());
            selection.clone()
        };
        if !state.is_active() {
            debug!("最後の選択を解除したため選択モードを終了");
        }
        self.view.selection_changed(&state);
        state
    }

    /// 選択モードを終了する。選択がなければ何もしない
    pub fn exit_selection_mode(&self) -> bool {
        let state = {
            let mut selection = self.selection();
            if !selection.is_active() {
                return false;
            }
            selection.clear();
            selection.clone()
        };
        self.view.selection_changed(&state);
        true
    }

    /// 選択中の絵画をすべて削除する
    ///
    /// 削除は並行して行い、すべて終わってから通知をひとつだけ表示する。
    /// その後、選択を解除して一覧を再読み込みする。
    pub async fn delete_selected(&self) -> BulkDeleteReport {
        let ids = self.selection().ids();
        if ids.is_empty() {
            return BulkDeleteReport::default();
        }
        info!("{}件の絵画を削除します", ids.len());

        let mut tasks = JoinSet::new();
        for id in ids {
            let service = self.service.clone();
            let locks = self.locks.clone();
            tasks.spawn(async move {
                let _guard = locks.lock(&id).await;
                let result = service.delete(&id).await;
                (id, result)
            });
        }

        let mut report = BulkDeleteReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(()))) => report.deleted.push(id),
                Ok((id, Err(e))) => {
                    warn!(painting_id = %id, "削除に失敗しました: {}", e);
                    report.failed.insert(id, e);
                }
                Err(e) => {
                    warn!("削除タスクが失敗しました: {}", e);
                    report.lost += 1;
                }
            }
        }

        if report.total() > 0 {
            self.view.show_notification(&report.notification());
        }
        self.exit_selection_mode();

        if let Err(e) = self.overview.reload().await {
            debug!("削除後の再読み込みに失敗しました: {}", e);
        }
        report
    }
}

//! Web ビュー1つ分のアプリケーション
//!
//! 一覧と詳細のドキュメントを切り替え、ブリッジ呼び出しを各コントローラーへ渡す。

use super::BridgeError;
use super::dispatcher::{Bridge, BridgeCall, BridgeTarget};
use super::documents::{DETAIL_DOCUMENT, DetailHolder, OVERVIEW_DOCUMENT, OverviewModel, SelectionModel};
use super::picture_picker::ScriptPictureProvider;
use super::script::ScriptCall;
use super::web_view::{WebViewPush, WebViewRenderer, WebViewService};
use crate::AppConfig;
use crate::application::controllers::{
    AddPaintingController, ControllerError, DetailController, LiveUpdates, OverviewController,
    SelectionController,
};
use crate::application::image_cache::DecodedImageCache;
use crate::application::record_locks::RecordLocks;
use crate::application::thumbnails::ImageLoader;
use crate::domain::painting::entities::PaintingId;
use crate::domain::painting::repositories::{PaintingQuery, PaintingService, QueryService};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// すべての Web ビューで共有するサービス
pub struct WebAppServices {
    pub paintings: Arc<dyn PaintingService>,
    pub query: Arc<dyn PaintingQuery>,
    pub cache: Arc<DecodedImageCache>,
    pub locks: Arc<RecordLocks>,
    pub config: AppConfig,
}

impl WebAppServices {
    pub fn new(paintings: Arc<dyn PaintingService>, queries: &dyn QueryService, config: AppConfig) -> Self {
        Self {
            paintings,
            query: queries.all_paintings_query(),
            cache: Arc::new(DecodedImageCache::new(config.image_cache_bytes)),
            locks: Arc::new(RecordLocks::new()),
            config,
        }
    }
}

pub struct WebApp {
    services: Arc<WebAppServices>,
    bridge: Bridge,
    web_view: Arc<dyn WebViewService>,
    renderer: Arc<WebViewRenderer>,
    picker: Arc<ScriptPictureProvider>,
    images: Arc<ImageLoader>,
    overview: Arc<OverviewController>,
    selection: Arc<SelectionController>,
    live: Mutex<Option<LiveUpdates>>,
    dialog: Mutex<Option<Arc<AddPaintingController>>>,
}

impl WebApp {
    pub fn new(services: Arc<WebAppServices>, web_view: Arc<dyn WebViewService>) -> Arc<Self> {
        let config = &services.config;
        let renderer = Arc::new(WebViewRenderer::new(web_view.clone(), config.thumbnail_size));
        let images = Arc::new(ImageLoader::new(
            services.paintings.clone(),
            services.cache.clone(),
            config.thumbnail_size,
        ));
        let overview = Arc::new(OverviewController::new(
            services.paintings.clone(),
            services.query.clone(),
            images.clone(),
            renderer.clone(),
        ));
        let selection = Arc::new(SelectionController::new(
            services.paintings.clone(),
            overview.clone(),
            services.locks.clone(),
            renderer.clone(),
        ));
        let picker = Arc::new(ScriptPictureProvider::new(
            web_view.clone(),
            Duration::from_secs(config.pick_timeout_secs),
        ));

        Arc::new(Self {
            bridge: Bridge::new(config.bridge_entry.clone()),
            services,
            web_view,
            renderer,
            picker,
            images,
            overview,
            selection,
            live: Mutex::new(None),
            dialog: Mutex::new(None),
        })
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    fn thumbnail_size(&self) -> u32 {
        self.services.config.thumbnail_size
    }

    fn dialog_slot(&self) -> MutexGuard<'_, Option<Arc<AddPaintingController>>> {
        self.dialog.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// ドキュメントからの呼び出しを処理し、呼び出しIDがあれば応答を送る
    pub async fn handle(self: &Arc<Self>, call: &BridgeCall) -> Result<Value, BridgeError> {
        let result = if call.entry == self.bridge.entry() && call.method == "pictureSelected" {
            // 画像選択の結果はドキュメントの切り替えや実行中の呼び出しと無関係に受け取る
            let name = call.opt_str_arg(0)?;
            let data = call.opt_str_arg(1)?;
            self.picker.deliver(name, data.as_deref()).map(|_| Value::Null)
        } else {
            self.bridge.dispatch(call).await
        };

        match &result {
            Err(e) if e.is_client_error() => warn!(method = %call.method, "不正なブリッジ呼び出し: {}", e),
            Err(e) => debug!(method = %call.method, "ブリッジ呼び出しが失敗しました: {}", e),
            Ok(_) => {}
        }

        if let Some(call_id) = call.call_id {
            let reply = match &result {
                Ok(value) => WebViewPush::Reply {
                    call_id,
                    result: Some(value.clone()),
                    error: None,
                },
                Err(e) => WebViewPush::Reply {
                    call_id,
                    result: None,
                    error: Some(e.to_string()),
                },
            };
            self.web_view.push(reply)?;
        }
        result
    }

    /// 一覧を再読み込みして一覧ドキュメントを読み込む
    pub async fn show_overview(self: &Arc<Self>) -> Result<u64, BridgeError> {
        {
            let mut live = self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if live.is_none() {
                *live = Some(self.overview.start_live_updates());
            }
        }
        // 失敗は描画側に通知済み。前回の一覧で表示する
        let _ = self.overview.reload().await;

        let model = OverviewModel::encode(
            &self.overview.snapshot(),
            &self.selection.state(),
            self.thumbnail_size(),
        )
        .await;
        let instance = self.bridge.install(Arc::new(OverviewDocument {
            app: Arc::downgrade(self),
        }));
        self.web_view
            .load_document(OVERVIEW_DOCUMENT, instance, serde_json::to_value(model)?)?;
        info!(instance, "一覧を表示しました");
        Ok(instance)
    }

    /// 絵画を取得して詳細ドキュメントを読み込む
    pub async fn show_detail(self: &Arc<Self>, id: PaintingId) -> Result<u64, BridgeError> {
        let controller = DetailController::open(
            id,
            self.services.paintings.clone(),
            self.images.clone(),
            self.services.locks.clone(),
            self.renderer.clone(),
        )
        .await
        .map_err(ControllerError::from)?;
        let controller = Arc::new(controller);

        let holder = DetailHolder::encode(&controller.fields().await, self.thumbnail_size()).await;
        let instance = self.bridge.install(Arc::new(DetailDocument {
            app: Arc::downgrade(self),
            controller,
        }));
        self.web_view
            .load_document(DETAIL_DOCUMENT, instance, serde_json::to_value(&holder)?)?;
        info!(instance, painting_id = %holder.id, "詳細を表示しました");
        Ok(instance)
    }

    /// 詳細ドキュメントの内容を最新のスナップショットで置き換える
    async fn push_holder(&self, controller: &DetailController) -> Result<Value, BridgeError> {
        let holder = DetailHolder::encode(&controller.fields().await, self.thumbnail_size()).await;
        let value = serde_json::to_value(&holder)?;
        self.web_view
            .execute_script(&ScriptCall::new("updateHolder").arg(&value)?)?;
        Ok(value)
    }

    /// 入力画面を開く。保存されたら新しい絵画の詳細を表示する
    fn open_add_dialog(self: &Arc<Self>) -> Result<(), BridgeError> {
        let (tx, rx) = oneshot::channel();
        let dialog = Arc::new(
            AddPaintingController::new(
                self.services.paintings.clone(),
                self.picker.clone(),
                self.renderer.clone(),
            )
            .with_completion(tx),
        );
        *self.dialog_slot() = Some(dialog.clone());

        let app = Arc::downgrade(self);
        let opened = Arc::downgrade(&dialog);
        tokio::spawn(async move {
            let Ok(painting) = rx.await else {
                debug!("入力画面は保存されずに閉じられました");
                return;
            };
            let Some(app) = app.upgrade() else {
                return;
            };
            {
                let mut slot = app.dialog_slot();
                let is_same = slot
                    .as_ref()
                    .is_some_and(|current| Weak::ptr_eq(&Arc::downgrade(current), &opened));
                if is_same {
                    slot.take();
                }
            }
            if let Err(e) = app.show_detail(painting.id).await {
                warn!("保存した絵画を表示できません: {}", e);
            }
        });

        self.web_view
            .execute_script(&ScriptCall::new("openAddDialog"))
    }

    fn open_dialog(&self, call: &BridgeCall) -> Result<Arc<AddPaintingController>, BridgeError> {
        self.dialog_slot()
            .clone()
            .ok_or_else(|| call.invalid(0, "add painting dialog is not open".to_string()))
    }

    fn painting_id_arg(&self, call: &BridgeCall) -> Result<PaintingId, BridgeError> {
        match call.args.first() {
            Some(Value::Number(_)) => {
                let position = call.usize_arg(0)?;
                self.overview
                    .painting_at(position)
                    .ok_or_else(|| call.invalid(0, format!("no painting at position {position}")))
            }
            _ => {
                let id = call.str_arg(0)?;
                PaintingId::parse(&id).map_err(|reason| call.invalid(0, reason))
            }
        }
    }
}

fn upgrade(app: &Weak<WebApp>) -> Result<Arc<WebApp>, BridgeError> {
    app.upgrade().ok_or(BridgeError::Disconnected)
}

/// 一覧ドキュメントの呼び出し先
struct OverviewDocument {
    app: Weak<WebApp>,
}

#[async_trait]
impl BridgeTarget for OverviewDocument {
    fn document(&self) -> &'static str {
        OVERVIEW_DOCUMENT
    }

    async fn invoke(&self, call: &BridgeCall) -> Result<Value, BridgeError> {
        let app = upgrade(&self.app)?;
        match call.method.as_str() {
            "refresh" => {
                let outcome = app.overview.reload().await;
                app.web_view
                    .execute_script(&ScriptCall::new("refreshPreviews"))?;
                let outcome = outcome.map_err(ControllerError::from)?;
                Ok(json!({ "applied": outcome.is_applied() }))
            }
            "openPainting" => {
                let id = app.painting_id_arg(call)?;
                let instance = app.show_detail(id).await?;
                Ok(json!({ "instance": instance }))
            }
            "toggleSelection" => {
                let state = app.selection.toggle(call.usize_arg(0)?);
                Ok(serde_json::to_value(SelectionModel::from(&state))?)
            }
            "exitSelection" => Ok(json!(app.selection.exit_selection_mode())),
            "deleteSelected" => {
                let report = app.selection.delete_selected().await;
                Ok(json!({
                    "deleted": report.deleted.len(),
                    "failed": report.failure_count(),
                }))
            }
            "openAddPainting" => {
                app.open_add_dialog()?;
                Ok(Value::Null)
            }
            "selectImage" => {
                // 選択結果は別の呼び出しで届くため、待たずに戻る
                let dialog = app.open_dialog(call)?;
                tokio::spawn(async move {
                    if let Err(e) = dialog.pick_image().await {
                        debug!("画像を設定できませんでした: {}", e);
                    }
                });
                Ok(Value::Null)
            }
            "addPainting" => {
                let dialog = app.open_dialog(call)?;
                dialog.set_title(&call.str_arg(0)?).await;
                let painting = dialog.submit().await?;
                Ok(json!({ "id": painting.id.as_str() }))
            }
            "cancelAddPainting" => {
                let dialog = app.dialog_slot().take();
                if let Some(dialog) = dialog {
                    dialog.cancel().await;
                }
                Ok(Value::Null)
            }
            _ => Err(call.unknown_method(OVERVIEW_DOCUMENT)),
        }
    }
}

/// 詳細ドキュメントの呼び出し先
struct DetailDocument {
    app: Weak<WebApp>,
    controller: Arc<DetailController>,
}

impl DetailDocument {
    /// 画像を選択させて追加する。選択結果は別の呼び出しで届くため、待たずに戻る
    fn spawn_pick(&self, app: Arc<WebApp>, reference: bool) {
        let controller = self.controller.clone();
        tokio::spawn(async move {
            let picker = app.picker.clone();
            let added = if reference {
                controller.pick_and_add_reference(picker.as_ref()).await
            } else {
                controller.pick_and_add_wip(picker.as_ref()).await
            };
            match added {
                Ok(Some(_)) => {
                    if let Err(e) = app.push_holder(&controller).await {
                        warn!("詳細を更新できません: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => debug!("画像を追加できませんでした: {}", e),
            }
        });
    }
}

#[async_trait]
impl BridgeTarget for DetailDocument {
    fn document(&self) -> &'static str {
        DETAIL_DOCUMENT
    }

    async fn invoke(&self, call: &BridgeCall) -> Result<Value, BridgeError> {
        let app = upgrade(&self.app)?;
        match call.method.as_str() {
            "holder" => {
                let holder = DetailHolder::encode(&self.controller.fields().await, app.thumbnail_size()).await;
                Ok(serde_json::to_value(holder)?)
            }
            "addWip" => {
                self.spawn_pick(app, false);
                Ok(Value::Null)
            }
            "addRef" => {
                self.spawn_pick(app, true);
                Ok(Value::Null)
            }
            "addTag" => {
                self.controller.add_tag(&call.str_arg(0)?).await?;
                app.push_holder(&self.controller).await
            }
            "finish" => {
                let date = match call.opt_str_arg(0)? {
                    Some(date) => NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                        .map_err(|e| call.invalid(0, e.to_string()))?,
                    None => chrono::Local::now().date_naive(),
                };
                self.controller.finish(date).await?;
                app.push_holder(&self.controller).await
            }
            "back" => {
                let instance = app.show_overview().await?;
                Ok(json!({ "instance": instance }))
            }
            _ => Err(call.unknown_method(DETAIL_DOCUMENT)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::sample_png;
    use crate::domain::painting::value_objects::PictureData;
    use crate::infrastructure::InMemoryPaintingService;
    use crate::interfaces::bridge::web_view::tests::RecordingWebView;
    use base64::{Engine as _, engine::general_purpose};

    async fn setup() -> (Arc<InMemoryPaintingService>, Arc<RecordingWebView>, Arc<WebApp>) {
        let service = Arc::new(InMemoryPaintingService::new(16));
        let services = Arc::new(WebAppServices::new(
            service.clone(),
            service.as_ref(),
            AppConfig::test(),
        ));
        let web_view = RecordingWebView::new();
        let app = WebApp::new(services, web_view.clone());
        (service, web_view, app)
    }

    fn call(method: &str, args: Vec<Value>) -> BridgeCall {
        BridgeCall::new("controller", method, args)
    }

    fn loads(web_view: &RecordingWebView) -> Vec<(String, Value)> {
        web_view
            .pushes()
            .into_iter()
            .filter_map(|push| match push {
                WebViewPush::Load { document, model, .. } => Some((document, model)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_overview_document_lists_paintings() {
        let (service, web_view, app) = setup().await;
        service
            .compose_new("Meadow", PictureData::from(sample_png(8, 8, [0, 160, 0])))
            .await
            .unwrap();

        app.show_overview().await.unwrap();

        let loads = loads(&web_view);
        assert_eq!(loads.len(), 1);
        let (document, model) = &loads[0];
        assert_eq!(document, OVERVIEW_DOCUMENT);
        assert_eq!(model["paintings"][0]["title"], json!("Meadow"));
        assert_eq!(model["selection"]["count"], json!(0));
    }

    #[tokio::test]
    async fn test_detail_round_trip() {
        let (service, web_view, app) = setup().await;
        let painting = service
            .compose_new("Ridge", PictureData::from(sample_png(8, 8, [100, 100, 100])))
            .await
            .unwrap();
        app.show_overview().await.unwrap();

        app.handle(&call("openPainting", vec![json!(0)])).await.unwrap();
        let (document, holder) = loads(&web_view).pop().unwrap();
        assert_eq!(document, DETAIL_DOCUMENT);
        assert_eq!(holder["id"], json!(painting.id.as_str()));

        let holder = app.handle(&call("addTag", vec![json!("graphite")])).await.unwrap();
        assert_eq!(holder["tags"], json!(["graphite"]));
        web_view.wait_for_script("updateHolder").await;

        let holder = app
            .handle(&call("finish", vec![json!("2024-06-01")]))
            .await
            .unwrap();
        assert_eq!(holder["finishingDate"], json!("2024-06-01"));

        app.handle(&call("back", vec![])).await.unwrap();
        assert_eq!(loads(&web_view).pop().unwrap().0, OVERVIEW_DOCUMENT);
    }

    #[tokio::test]
    async fn test_add_painting_flow_opens_detail() {
        let (service, web_view, app) = setup().await;
        app.show_overview().await.unwrap();

        app.handle(&call("openAddPainting", vec![])).await.unwrap();
        app.handle(&call("selectImage", vec![])).await.unwrap();
        web_view.wait_for_script("openPicturePicker").await;

        let data = general_purpose::STANDARD.encode(sample_png(8, 8, [250, 200, 0]));
        app.handle(&call("pictureSelected", vec![json!("sun.png"), json!(data)]))
            .await
            .unwrap();
        web_view.wait_for_script("addDialogSetPicture").await;

        let saved = app
            .handle(&call("addPainting", vec![json!("Sunflowers")]))
            .await
            .unwrap();
        let id = PaintingId::parse(saved["id"].as_str().unwrap()).unwrap();
        assert_eq!(service.get(&id).await.unwrap().title, "Sunflowers");

        tokio::time::timeout(Duration::from_secs(2), async {
            while app.bridge().current().map(|(_, document)| document) != Some(DETAIL_DOCUMENT) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("保存した絵画の詳細が表示される");
        web_view.wait_for_script("closeAddDialog").await;
    }

    #[tokio::test]
    async fn test_add_painting_without_title_keeps_dialog() {
        let (service, web_view, app) = setup().await;
        app.show_overview().await.unwrap();
        app.handle(&call("openAddPainting", vec![])).await.unwrap();

        let result = app.handle(&call("addPainting", vec![json!("  ")])).await;
        assert!(matches!(
            result,
            Err(BridgeError::Controller(ControllerError::Validation(_)))
        ));
        assert!(service.is_empty().await);
        web_view.wait_for_script("showFieldError").await;
        assert_eq!(app.bridge().current().unwrap().1, OVERVIEW_DOCUMENT);
    }

    #[tokio::test]
    async fn test_errors_are_replied() {
        let (_, web_view, app) = setup().await;
        app.show_overview().await.unwrap();

        let mut unknown = call("fly", vec![]);
        unknown.call_id = Some(9);
        assert!(app.handle(&unknown).await.is_err());

        let reply = web_view
            .pushes()
            .into_iter()
            .find_map(|push| match push {
                WebViewPush::Reply { call_id, error, .. } => Some((call_id, error)),
                _ => None,
            })
            .unwrap();
        assert_eq!(reply.0, 9);
        assert!(reply.1.unwrap().contains("fly"));
    }
}

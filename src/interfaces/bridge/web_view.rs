//! Web ビューへの送信と、`View` の Web ビュー向け実装

use super::BridgeError;
use super::documents::{PaintingPreview, SelectionModel};
use super::script::ScriptCall;
use crate::application::image_cache::DecodedImage;
use crate::application::thumbnails::encode_data_urls;
use crate::application::view::{ErrorReport, Notification, View};
use crate::application::view_models::{ListSnapshot, SelectionState};
use crate::domain::painting::entities::Painting;
use crate::domain::painting::errors::ValidationError;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Web ビューへ送るメッセージ
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WebViewPush {
    /// ドキュメントをビューモデルごと読み込み直す
    #[serde(rename_all = "camelCase")]
    Load {
        document: String,
        instance: u64,
        model: Value,
    },
    /// ドキュメント側の関数を呼び出す
    Script { code: String },
    /// 呼び出しへの応答
    #[serde(rename_all = "camelCase")]
    Reply {
        call_id: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Web ビュー
///
/// 送信はブロックせず、順番どおりに届ける
pub trait WebViewService: Send + Sync {
    fn push(&self, message: WebViewPush) -> Result<(), BridgeError>;

    fn load_document(&self, document: &str, instance: u64, model: Value) -> Result<(), BridgeError> {
        self.push(WebViewPush::Load {
            document: document.to_string(),
            instance,
            model,
        })
    }

    fn execute_script(&self, script: &ScriptCall) -> Result<(), BridgeError> {
        let code = script.render()?;
        self.push(WebViewPush::Script { code })
    }
}

/// チャネルに送る Web ビュー。受信側が WebSocket に書き出す
#[derive(Debug, Clone)]
pub struct ChannelWebView {
    tx: mpsc::UnboundedSender<WebViewPush>,
}

impl ChannelWebView {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<WebViewPush>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl WebViewService for ChannelWebView {
    fn push(&self, message: WebViewPush) -> Result<(), BridgeError> {
        self.tx.send(message).map_err(|_| BridgeError::Disconnected)
    }
}

/// 描画側の通知を Web ビューのスクリプト呼び出しに変換する
pub struct WebViewRenderer {
    web_view: Arc<dyn WebViewService>,
    thumbnail_size: u32,
    /// 最後に送った一覧の世代
    pushed_generation: Arc<Mutex<u64>>,
}

impl WebViewRenderer {
    pub fn new(web_view: Arc<dyn WebViewService>, thumbnail_size: u32) -> Self {
        Self {
            web_view,
            thumbnail_size,
            pushed_generation: Arc::new(Mutex::new(0)),
        }
    }

    fn run(&self, script: Result<ScriptCall, BridgeError>) {
        let result = script.and_then(|script| self.web_view.execute_script(&script));
        if let Err(e) = result {
            warn!("Web ビューへ送信できません: {}", e);
        }
    }
}

impl View for WebViewRenderer {
    fn list_changed(&self, snapshot: &Arc<ListSnapshot>) {
        let snapshot = snapshot.clone();
        let web_view = self.web_view.clone();
        let pushed = self.pushed_generation.clone();
        let size = self.thumbnail_size;

        // エンコードの完了順は世代順とは限らないので、古い世代は送らない
        tokio::spawn(async move {
            let thumbnails = snapshot.items.iter().map(|item| item.thumbnail.clone()).collect();
            let urls = encode_data_urls(thumbnails, size).await;
            let previews: Vec<PaintingPreview> = snapshot
                .items
                .iter()
                .zip(urls)
                .map(|(item, thumbnail)| PaintingPreview::new(item, thumbnail))
                .collect();

            let mut last = pushed.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if snapshot.generation <= *last {
                debug!(generation = snapshot.generation, "古い一覧のため送信しません");
                return;
            }
            *last = snapshot.generation;
            let result = ScriptCall::new("updatePaintings")
                .arg(&previews)
                .and_then(|script| web_view.execute_script(&script));
            if let Err(e) = result {
                warn!("一覧を送信できません: {}", e);
            }
        });
    }

    fn set_refreshing(&self, refreshing: bool) {
        self.run(ScriptCall::new("setRefreshing").arg(refreshing));
    }

    fn selection_changed(&self, selection: &SelectionState) {
        self.run(ScriptCall::new("setSelection").arg(SelectionModel::from(selection)));
    }

    fn detail_changed(&self, painting: &Arc<Painting>) {
        debug!(painting_id = %painting.id, version = painting.version, "詳細の更新は詳細ドキュメントが送信します");
    }

    fn draft_picture_changed(&self, preview: &DecodedImage) {
        let preview = preview.clone();
        let web_view = self.web_view.clone();
        let size = self.thumbnail_size;
        tokio::spawn(async move {
            let url = encode_data_urls(vec![preview], size).await.pop();
            let result = ScriptCall::new("addDialogSetPicture")
                .arg(url)
                .and_then(|script| web_view.execute_script(&script));
            if let Err(e) = result {
                warn!("画像のプレビューを送信できません: {}", e);
            }
        });
    }

    fn add_painting_dismissed(&self, painting: &Painting) {
        self.run(ScriptCall::new("closeAddDialog").arg(painting.id.as_str()));
    }

    fn show_field_error(&self, error: &ValidationError) {
        self.run(
            ScriptCall::new("showFieldError")
                .arg(error.field())
                .and_then(|script| script.arg(error.to_string())),
        );
    }

    fn show_error(&self, report: &ErrorReport) {
        self.run(
            ScriptCall::new("showError")
                .arg(&report.message)
                .and_then(|script| script.arg(&report.detail)),
        );
    }

    fn show_notification(&self, notification: &Notification) {
        self.run(ScriptCall::new("showNotification").arg(json!({
            "text": notification.text(),
            "failure": notification.is_failure(),
        })));
    }
}

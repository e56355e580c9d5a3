//! WebSocket 1接続分の Web ビュー
//!
//! 送信は `WebViewPush` の JSON、受信は `BridgeCall` の JSON。

use crate::interfaces::bridge::{BridgeCall, ChannelWebView, WebApp, WebAppServices};
use axum::extract::ws::{Message, WebSocket};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 受け取ったメッセージを順番に処理するタスクを起動する
///
/// 画像選択のように結果を待つ呼び出しは内部で別タスクになるため、後続の呼び出しを止めない
pub fn spawn_call_worker(app: Arc<WebApp>) -> (mpsc::UnboundedSender<String>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let worker = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            match BridgeCall::parse(&text) {
                Ok(call) => {
                    // 失敗は応答と描画側で伝える
                    let _ = app.handle(&call).await;
                }
                Err(e) => warn!("ブリッジのメッセージを解釈できません: {}", e),
            }
        }
    });
    (tx, worker)
}

/// Web ビューの接続を処理する
pub async fn run_session(mut socket: WebSocket, services: Arc<WebAppServices>) {
    let session = Uuid::new_v4();
    info!(%session, "Web ビューが接続しました");

    let (web_view, mut outbound) = ChannelWebView::new();
    let app = WebApp::new(services, Arc::new(web_view));
    let (calls, worker) = spawn_call_worker(app.clone());

    {
        let app = app.clone();
        tokio::spawn(async move {
            if let Err(e) = app.show_overview().await {
                warn!("一覧を表示できません: {}", e);
            }
        });
    }

    loop {
        tokio::select! {
            push = outbound.recv() => {
                let Some(push) = push else { break };
                let text = match serde_json::to_string(&push) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("送信内容をシリアライズできません: {}", e);
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if calls.send(text.as_str().to_string()).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(%session, "Web ビューが切断しました");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(%session, "WebSocket の受信に失敗しました: {}", e);
                        break;
                    }
                }
            }
        }
    }

    drop(calls);
    worker.abort();
    info!(%session, "セッションを終了しました");
}

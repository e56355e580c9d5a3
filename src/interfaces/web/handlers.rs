use super::error_response::ErrorResponse;
use super::models::AppInfo;
use super::session::run_session;
use crate::interfaces::bridge::WebAppServices;
use axum::{
    Json,
    extract::{State, ws::WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;

/// アプリケーションの情報
pub async fn get_app_info(
    State(services): State<Arc<WebAppServices>>,
) -> Result<Json<AppInfo>, ErrorResponse> {
    let rows = services.query.run().await?;

    Ok(Json(AppInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        environment: services.config.environment.clone(),
        painting_count: rows.len(),
        image_cache: services.cache.stats().into(),
    }))
}

/// Web ビューのブリッジ接続
pub async fn bridge_socket(
    ws: WebSocketUpgrade,
    State(services): State<Arc<WebAppServices>>,
) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, services))
}

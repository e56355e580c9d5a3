use super::{bridge_socket, embedded_assets::WebAssets, error_response::ErrorResponse, get_app_info};
use crate::interfaces::bridge::WebAppServices;
use axum::{
    Router,
    body::Body,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// ルーターを組み立てる
pub fn create_router(services: Arc<WebAppServices>) -> Router {
    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/info", get(get_app_info))
        .route("/ws/bridge", get(bridge_socket))
        .with_state(services)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .fallback(static_handler)
}

pub async fn create_server(host: String, port: u16, services: Arc<WebAppServices>) -> anyhow::Result<()> {
    info!("Starting paiman web server...");

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let app = create_router(services);
    let listener = TcpListener::bind(&addr).await?;

    println!("🌐 Web server started successfully!");
    println!("   URL: http://{addr}");
    println!("   Press Ctrl+C to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down web server");
        })
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

fn asset_response(path: &str) -> Option<Response> {
    let content = WebAssets::get(path)?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Some(
        (
            [(header::CONTENT_TYPE, mime.as_ref().to_string())],
            Body::from(content.data.into_owned()),
        )
            .into_response(),
    )
}

/// 埋め込まれた静的ファイルを提供するハンドラ
async fn static_handler(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };

    if let Some(response) = asset_response(path) {
        return response;
    }
    if path.starts_with("api/") || path.starts_with("ws/") {
        return ErrorResponse::new(StatusCode::NOT_FOUND, format!("No route for /{path}")).into_response();
    }
    // Web ビューは1ページなので、それ以外は index.html を返す
    asset_response("index.html").unwrap_or_else(|| {
        ErrorResponse::new(StatusCode::NOT_FOUND, "index.html is not embedded").into_response()
    })
}

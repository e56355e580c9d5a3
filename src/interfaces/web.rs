//! Web インターフェース
//!
//! 埋め込みの Web ビューを配信し、WebSocket 上でブリッジを提供します。
//! 接続ごとに独立した `WebApp` を持ち、絵画のデータは全接続で共有します。

mod embedded_assets;
mod error_response;
mod handlers;
mod models;
mod session;

pub mod server;

pub(crate) use handlers::{bridge_socket, get_app_info};
pub use session::run_session;

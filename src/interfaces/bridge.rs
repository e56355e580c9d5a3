//! Web ビューとのブリッジ
//!
//! ドキュメントは固定のエントリ名にメソッド名と JSON の引数を渡してコントローラーを呼び出す。
//! コントローラーからはドキュメントの再読み込みか、ドキュメント側の関数呼び出しで応答する。

pub mod dispatcher;
pub mod documents;
pub mod picture_picker;
pub mod script;
pub mod web_app;
pub mod web_view;

pub use dispatcher::{Bridge, BridgeCall, BridgeTarget};
pub use picture_picker::ScriptPictureProvider;
pub use script::ScriptCall;
pub use web_app::{WebApp, WebAppServices};
pub use web_view::{ChannelWebView, WebViewPush, WebViewRenderer, WebViewService};

use crate::application::controllers::ControllerError;
use thiserror::Error;

/// ブリッジのエラー
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Malformed bridge message: {0}")]
    Malformed(String),

    #[error("Unknown bridge entry: {0}")]
    UnknownEntry(String),

    #[error("Unknown method {method} for document {document}")]
    UnknownMethod { document: String, method: String },

    #[error("Invalid argument #{index} for {method}: {reason}")]
    InvalidArgument {
        method: String,
        index: usize,
        reason: String,
    },

    #[error("Call for document instance {got} but {current} is loaded")]
    StaleDocument { current: u64, got: u64 },

    #[error("No document is loaded")]
    NoDocument,

    #[error("Invalid script function name: {0}")]
    InvalidFunction(String),

    #[error("Web view disconnected")]
    Disconnected,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Controller(#[from] ControllerError),
}

impl BridgeError {
    /// ドキュメント側の誤った呼び出しか
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Malformed(_)
                | Self::UnknownEntry(_)
                | Self::UnknownMethod { .. }
                | Self::InvalidArgument { .. }
                | Self::StaleDocument { .. }
        )
    }
}

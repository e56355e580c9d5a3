//! ドキュメント側のファイル選択を使った画像選択

use super::BridgeError;
use super::script::ScriptCall;
use super::web_view::WebViewService;
use crate::domain::painting::errors::PictureError;
use crate::domain::painting::repositories::PictureProvider;
use crate::domain::painting::value_objects::{PickedPicture, PictureData};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// `openPicturePicker()` を呼び出し、`pictureSelected` の呼び出しを待つ
///
/// 同時に待てる選択はひとつだけ。新しい選択を始めると前の選択は `PictureError::Superseded` で終わる
pub struct ScriptPictureProvider {
    web_view: Arc<dyn WebViewService>,
    pending: Mutex<Option<oneshot::Sender<Option<PickedPicture>>>>,
    timeout: Duration,
}

impl ScriptPictureProvider {
    pub fn new(web_view: Arc<dyn WebViewService>, timeout: Duration) -> Self {
        Self {
            web_view,
            pending: Mutex::new(None),
            timeout,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    /// ドキュメントから選択結果を受け取る
    ///
    /// `data` は base64 またはデータURL。`None` はキャンセル
    pub fn deliver(&self, name: Option<String>, data: Option<&str>) -> Result<(), BridgeError> {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(pending) = pending else {
            debug!("待っている画像選択がないため結果を捨てます");
            return Ok(());
        };

        let picture = match data {
            Some(data) => {
                let encoded = data.split_once(";base64,").map_or(data, |(_, body)| body);
                let bytes = general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| BridgeError::Malformed(format!("picture data: {e}")))?;
                Some(PickedPicture::new(name, PictureData::from(bytes)))
            }
            None => None,
        };
        let _ = pending.send(picture);
        Ok(())
    }
}

#[async_trait]
impl PictureProvider for ScriptPictureProvider {
    async fn pick(&self) -> Result<Option<PickedPicture>, PictureError> {
        let (tx, rx) = oneshot::channel();
        *self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(tx);

        self.web_view
            .execute_script(&ScriptCall::new("openPicturePicker"))
            .map_err(|e| PictureError::Unavailable {
                message: e.to_string(),
            })?;

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(picture)) => Ok(picture),
            Ok(Err(_)) => {
                debug!("新しい画像選択に置き換えられました");
                Err(PictureError::Superseded)
            }
            Err(_) => {
                warn!("画像の選択がタイムアウトしました");
                let mut pending = self
                    .pending
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                // 受信側を破棄済みなら、この選択の送信側
                if pending.as_ref().is_some_and(|tx| tx.is_closed()) {
                    pending.take();
                }
                Err(PictureError::Unavailable {
                    message: "picture picker timed out".to_string(),
                })
            }
        }
    }
}

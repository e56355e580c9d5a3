//! ブリッジ呼び出しの振り分け
//!
//! 読み込まれているドキュメントはひとつだけ。ドキュメントを読み込むたびにインスタンス番号を進め、
//! 同じインスタンスへの呼び出しは順番に実行する。

use super::BridgeError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// ドキュメントからの呼び出し
///
/// `{"entry": "controller", "method": "openPainting", "args": ["..."]}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeCall {
    pub entry: String,
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
    /// 応答を待つ場合の呼び出しID
    #[serde(default)]
    pub call_id: Option<u64>,
    /// 呼び出し元のドキュメントのインスタンス番号
    #[serde(default)]
    pub document: Option<u64>,
}

impl BridgeCall {
    pub fn new(entry: impl Into<String>, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            entry: entry.into(),
            method: method.into(),
            args,
            call_id: None,
            document: None,
        }
    }

    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(text).map_err(|e| BridgeError::Malformed(e.to_string()))
    }

    /// 文字列の引数。数値などは文字列に変換する
    pub fn str_arg(&self, index: usize) -> Result<String, BridgeError> {
        match self.args.get(index) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(other) => Err(self.invalid(index, format!("expected a string, got {other}"))),
            None => Err(self.invalid(index, "missing".to_string())),
        }
    }

    /// 省略可能な文字列の引数。`null` と空文字列は `None`
    pub fn opt_str_arg(&self, index: usize) -> Result<Option<String>, BridgeError> {
        match self.args.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(_) => self.str_arg(index).map(Some),
        }
    }

    pub fn usize_arg(&self, index: usize) -> Result<usize, BridgeError> {
        let value = self.args.get(index);
        value
            .and_then(Value::as_u64)
            .or_else(|| value.and_then(Value::as_str).and_then(|s| s.trim().parse().ok()))
            .map(|n| n as usize)
            .ok_or_else(|| self.invalid(index, "expected a non-negative integer".to_string()))
    }

    pub fn invalid(&self, index: usize, reason: String) -> BridgeError {
        BridgeError::InvalidArgument {
            method: self.method.clone(),
            index,
            reason,
        }
    }

    pub fn unknown_method(&self, document: &str) -> BridgeError {
        BridgeError::UnknownMethod {
            document: document.to_string(),
            method: self.method.clone(),
        }
    }
}

/// 読み込まれたドキュメントに対応する呼び出し先
#[async_trait]
pub trait BridgeTarget: Send + Sync {
    /// ドキュメント名
    fn document(&self) -> &'static str;

    /// メソッドを実行し、呼び出し元への応答を返す
    async fn invoke(&self, call: &BridgeCall) -> Result<Value, BridgeError>;
}

struct LoadedDocument {
    instance: u64,
    target: Arc<dyn BridgeTarget>,
    gate: Arc<Mutex<()>>,
}

/// エントリ名で受け付け、読み込まれているドキュメントへ振り分ける
pub struct Bridge {
    entry: String,
    loaded: RwLock<Option<LoadedDocument>>,
    instances: AtomicU64,
}

impl Bridge {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            loaded: RwLock::new(None),
            instances: AtomicU64::new(0),
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// 新しいドキュメントの呼び出し先を登録し、インスタンス番号を返す
    pub fn install(&self, target: Arc<dyn BridgeTarget>) -> u64 {
        let instance = self.instances.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(instance, document = target.document(), "ドキュメントを登録");
        *self
            .loaded
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(LoadedDocument {
            instance,
            target,
            gate: Arc::new(Mutex::new(())),
        });
        instance
    }

    /// 読み込まれているドキュメントのインスタンス番号と名前
    pub fn current(&self) -> Option<(u64, &'static str)> {
        self.loaded
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|loaded| (loaded.instance, loaded.target.document()))
    }

    /// 呼び出しを実行する
    #[instrument(skip_all, fields(method = %call.method))]
    pub async fn dispatch(&self, call: &BridgeCall) -> Result<Value, BridgeError> {
        if call.entry != self.entry {
            return Err(BridgeError::UnknownEntry(call.entry.clone()));
        }

        let (instance, target, gate) = {
            let loaded = self
                .loaded
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let loaded = loaded.as_ref().ok_or(BridgeError::NoDocument)?;
            (loaded.instance, loaded.target.clone(), loaded.gate.clone())
        };
        if let Some(got) = call.document
            && got != instance
        {
            return Err(BridgeError::StaleDocument {
                current: instance,
                got,
            });
        }

        let _serialized = gate.lock().await;
        debug!(instance, document = target.document(), "ブリッジ呼び出しを実行");
        target.invoke(call).await
    }
}

//! # paiman
//!
//! 絵画カタログアプリケーションのコア。
//! タイトル、メイン写真、制作途中(WIP)の写真、参考写真、タグを持つ絵画を記録し、
//! 一覧表示・詳細表示・編集を行うためのコントローラー層を提供します。
//!
//! このクレートは Domain-Driven Design (DDD) 原則に基づいて設計されており、
//! 以下の層に分かれています：
//!
//! - **Domain Layer**: 絵画レコードとサービスのポート(トレイト)
//! - **Application Layer**: コントローラー、ビューモデル、画像キャッシュ
//! - **Infrastructure Layer**: インメモリのサービス実装、画像ファイル読み込み
//! - **Interface Layer**: Web ビュー向けブリッジと HTTP/WebSocket サーバー

pub mod application;
pub mod debug;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;

// 公開API
pub use domain::*;

// エラー型の定義
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// アプリケーション全体の設定
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub debug: bool,
    /// 一覧に表示するサムネイルの一辺(ピクセル)
    pub thumbnail_size: u32,
    /// デコード済み画像キャッシュの上限(バイト)
    pub image_cache_bytes: usize,
    /// ドキュメント側から呼び出すブリッジのエントリ名
    pub bridge_entry: String,
    /// 画像選択を待つ最大時間(秒)
    pub pick_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            debug: true,
            thumbnail_size: 100,
            image_cache_bytes: 32 * 1024 * 1024,
            bridge_entry: "controller".to_string(),
            pick_timeout_secs: 300,
        }
    }
}

impl AppConfig {
    /// 本番環境用の設定
    pub fn production() -> Self {
        Self {
            environment: "production".to_string(),
            debug: false,
            ..Self::default()
        }
    }

    /// テスト環境用の設定
    pub fn test() -> Self {
        Self {
            environment: "test".to_string(),
            debug: true,
            thumbnail_size: 16,
            image_cache_bytes: 64 * 1024,
            pick_timeout_secs: 5,
            ..Self::default()
        }
    }

    /// キャッシュ上限をキロバイトで指定
    pub fn with_cache_kb(mut self, kb: usize) -> Self {
        self.image_cache_bytes = kb * 1024;
        self
    }
}

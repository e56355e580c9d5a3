//! デバッグとログ機能
//!
//! ログの初期化と、処理時間の計測を提供

use std::fs;
use tracing::{Level, debug, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

/// デバッグ設定
#[derive(Debug, Clone)]
pub struct DebugConfig {
    /// ログレベル
    pub log_level: Level,
    /// ファイルログを有効にするか
    pub enable_file_logging: bool,
    /// ログファイルのディレクトリ
    pub log_directory: String,
    /// JSONフォーマットを使用するか
    pub use_json_format: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            enable_file_logging: false,
            log_directory: "logs".to_string(),
            use_json_format: false,
        }
    }
}

impl DebugConfig {
    /// 開発環境用の設定
    pub fn development() -> Self {
        Self {
            log_level: Level::DEBUG,
            ..Self::default()
        }
    }

    /// 本番環境用の設定
    pub fn production() -> Self {
        Self {
            log_level: Level::INFO,
            enable_file_logging: true,
            log_directory: "logs".to_string(),
            use_json_format: true,
        }
    }

    /// テスト環境用の設定
    pub fn test() -> Self {
        Self {
            log_level: Level::WARN,
            ..Self::default()
        }
    }

    /// アプリケーション設定に対応するログ設定
    pub fn for_app(config: &crate::AppConfig) -> Self {
        match config.environment.as_str() {
            "production" => Self::production(),
            "test" => Self::test(),
            _ if config.debug => Self::development(),
            _ => Self::default(),
        }
    }
}

/// ログシステムを初期化
///
/// `RUST_LOG` が設定されていればそちらを優先する
pub fn init_logging(config: &DebugConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("paiman={},tower_http=info", config.log_level))?,
    };

    if config.enable_file_logging {
        fs::create_dir_all(&config.log_directory)?;
        let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.log_directory, "paiman.log");
        let builder = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(file_appender);
        if config.use_json_format {
            builder.json().try_init()?;
        } else {
            builder.with_ansi(false).try_init()?;
        }
    } else if config.use_json_format {
        tracing_subscriber::fmt().with_env_filter(env_filter).json().try_init()?;
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_names(true)
            .try_init()?;
    }

    info!("ログシステムが初期化されました");
    debug!("デバッグ設定: {:?}", config);

    Ok(())
}

/// 処理時間を計測して debug レベルで記録する
#[macro_export]
macro_rules! measure_time {
    ($name:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        tracing::debug!(
            operation = $name,
            duration_ms = start.elapsed().as_millis() as u64,
            "操作完了"
        );
        result
    }};
}

/// デバッグ用のヘルパー関数
pub mod debug_helpers {
    use tracing::{error, info};

    /// システム情報をログに出力
    pub fn log_system_info() {
        info!("=== システム情報 ===");
        info!("OS: {}", std::env::consts::OS);
        info!("アーキテクチャ: {}", std::env::consts::ARCH);
        info!("プロジェクトバージョン: {}", env!("CARGO_PKG_VERSION"));
    }

    /// エラーとその原因をすべてログに出力
    pub fn log_error_details(error: &dyn std::error::Error, context: &str) {
        error!(context = context, error = %error, "エラーが発生しました");

        let mut source = error.source();
        let mut level = 1;
        while let Some(err) = source {
            error!(context = context, level = level, source_error = %err, "エラーの原因");
            source = err.source();
            level += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_measure_time_returns_block_value() {
        let result = measure_time!("test_operation", {
            std::thread::sleep(std::time::Duration::from_millis(5));
            42
        });
        assert_eq!(result, 42);
        assert!(logs_contain("test_operation"));
    }

    #[test]
    fn test_config_for_environment() {
        assert!(DebugConfig::for_app(&crate::AppConfig::production()).use_json_format);
        assert_eq!(DebugConfig::for_app(&crate::AppConfig::test()).log_level, Level::WARN);
        assert_eq!(DebugConfig::for_app(&crate::AppConfig::default()).log_level, Level::DEBUG);
    }

    #[test]
    #[traced_test]
    fn test_error_chain_is_logged() {
        let inner = std::io::Error::other("disk unplugged");
        debug_helpers::log_error_details(&inner, "import");
        assert!(logs_contain("disk unplugged"));
    }
}

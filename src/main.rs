mod cli;

use crate::cli::{Cli, Commands};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use paiman::AppConfig;
use paiman::debug::{DebugConfig, debug_helpers, init_logging};
use paiman::infrastructure::{InMemoryPaintingService, TracingView, import_pictures};
use paiman::interfaces::bridge::WebAppServices;
use paiman::interfaces::web::server::create_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            port,
            host,
            import,
            cache_kb,
            production,
        } => {
            let mut config = if production {
                AppConfig::production()
            } else {
                AppConfig::default()
            };
            if let Some(kb) = cache_kb {
                config = config.with_cache_kb(kb);
            }

            let mut debug_config = DebugConfig::for_app(&config);
            if cli.verbose {
                debug_config.log_level = tracing::Level::DEBUG;
            }
            if let Err(e) = init_logging(&debug_config) {
                eprintln!("Failed to initialize logging: {}", e);
            }

            let service = Arc::new(InMemoryPaintingService::new(config.thumbnail_size));
            if let Some(pattern) = import {
                match import_pictures(&pattern, service.clone(), Arc::new(TracingView)).await {
                    Ok(report) => {
                        println!(
                            "📥 Imported {} painting(s), skipped {}",
                            report.imported.len(),
                            report.skipped.len()
                        );
                    }
                    Err(e) => {
                        debug_helpers::log_error_details(&e, "import");
                        eprintln!("❌ Import failed: {}", e);
                        std::process::exit(1);
                    }
                }
            }

            info!("Starting application...");
            let services = Arc::new(WebAppServices::new(service.clone(), service.as_ref(), config));
            if let Err(e) = create_server(host, port, services).await {
                error!("Application failed: {}", e);
                eprintln!("❌ Application failed: {}", e);
                std::process::exit(1);
            }
            info!("Application terminated normally");
        }
        Commands::Info => {
            if let Err(e) = init_logging(&DebugConfig::default()) {
                eprintln!("Failed to initialize logging: {}", e);
            }
            println!("paiman {}", env!("CARGO_PKG_VERSION"));
            println!("   Built: {}", env!("BUILD_TIMESTAMP"));
            println!("   OS:    {} ({})", std::env::consts::OS, std::env::consts::ARCH);
            debug_helpers::log_system_info();
        }
    }

    Ok(())
}

//! Process entry point: parses configuration, wires up the pipeline,
//! and either runs the automation loop or a minimal interactive menu.
//!
//! Grounded on the teacher's `src/app/runtime.rs` orchestration shape
//! (parse -> init -> run -> signal-driven shutdown) and `src/main.rs`'s
//! `clap::Parser` + `tracing_subscriber::EnvFilter` setup.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use clap::Parser;
use pipeline_core::automation::AutomationLoop;
use pipeline_core::config::Settings;
use pipeline_core::download::DownloadEngine;
use pipeline_core::fetch::PageFetcher;
use pipeline_core::session::SessionManager;
use pipeline_core::solver::SolverConfig;
use pipeline_core::store::Store;
use pipeline_core::upload::{DeliveryConfig, Uploader};
use pipeline_core::{Database, Orchestrator};

const POST_PATH_MARKER: &str = "/post";

#[tokio::main]
async fn main() {
    let settings = Settings::parse();

    let _log_guard = match pipeline_core::logging::init(&settings.download_dir, settings.verbose, settings.quiet) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(settings).await {
        tracing::error!(error = %e, "fatal startup error");
        std::process::exit(1);
    }
    std::process::exit(0);
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    if settings.delivery_partially_configured() {
        tracing::warn!("delivery is only partially configured; proceeding with delivery disabled");
    }

    std::fs::create_dir_all(&settings.download_dir)?;

    let db = Database::new(&settings.connection_string).await?;
    let store = Arc::new(Store::new(db.pool().clone()));

    let sessions = SessionManager::new(SolverConfig::new(settings.solver_url.clone()), settings.session_ttl_minutes);
    let fetcher = Arc::new(PageFetcher::new(sessions.clone()));

    let download_engine = Arc::new(DownloadEngine::new(settings.download_dir.clone())?);

    let uploader = if settings.delivery_enabled() {
        Some(Arc::new(Uploader::new(DeliveryConfig {
            token: settings.delivery_token.clone().expect("checked by delivery_enabled"),
            chat_id: settings.delivery_chat_id.clone().expect("checked by delivery_enabled"),
            base_url: settings.delivery_base_url.clone().expect("checked by delivery_enabled"),
        })))
    } else {
        tracing::info!("delivery endpoint not configured; uploads disabled");
        None
    };

    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        fetcher.clone(),
        download_engine,
        uploader,
        settings.concurrency_downloads,
        settings.concurrency_uploads,
        settings.download_dir.clone(),
    ));

    let cancelled = orchestrator.cancellation_handle();
    let handles = orchestrator.start(settings.concurrency_downloads, settings.concurrency_uploads);

    let shutdown_signal = {
        let cancelled = cancelled.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            cancelled.store(true, Ordering::SeqCst);
        })
    };

    if settings.automated {
        let automation = AutomationLoop::new(
            store.clone(),
            fetcher.clone(),
            orchestrator.clone(),
            POST_PATH_MARKER.to_string(),
            cancelled.clone(),
        );
        automation.run().await;
    } else {
        tracing::info!("interactive menu mode is not implemented in this build; use --automated");
        while !cancelled.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    }

    orchestrator.stop(handles).await;
    shutdown_signal.abort();
    sessions.shutdown().await;
    db.close().await;

    Ok(())
}

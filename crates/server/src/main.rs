use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use autotube_core::config::LoggingConfig;
use autotube_core::{
    create_classifier, load_config, validate_config, ErrorReporter, HttpScriptService,
    HttpUploader, HttpVideoRenderer, Pipeline, PipelineServices, SqliteStore, TracingReporter,
};
use autotube_server::api::create_router;
use autotube_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Logging is not initialized yet when the config fails to load.
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run() -> Result<()> {
    let config_path = std::env::var("AUTOTUBE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    init_logging(&config.logging);
    info!(version = VERSION, path = ?config_path, "Configuration loaded");

    validate_config(&config).context("Configuration validation failed")?;
    info!("Database path: {:?}", config.database.path);

    let store = Arc::new(
        SqliteStore::new(&config.database.path).context("Failed to open the work store")?,
    );
    info!("Work store initialized");

    let classifier =
        create_classifier(&config.classifier).context("Failed to create classifier")?;
    info!(
        classifier = classifier.name(),
        model = %config.classifier.model,
        "Classifier initialized"
    );

    let reporter: Arc<dyn ErrorReporter> = Arc::new(TracingReporter::new(&config.error_tracking));
    if config.error_tracking.dsn.is_none() {
        info!("No error tracking DSN configured, errors are only logged");
    }

    let services = PipelineServices {
        store,
        classifier,
        scripts: Arc::new(HttpScriptService::new(&config.script_service)),
        renderer: Arc::new(HttpVideoRenderer::new(&config.render_service)),
        uploader: Arc::new(HttpUploader::new(&config.upload_service)),
        reporter,
    };

    let pipeline = Arc::new(
        Pipeline::new(
            services,
            config.pipeline.clone(),
            config.schedule.clone(),
            config.render_service.video_task_dir.clone(),
        )
        .context("Failed to build pipeline")?,
    );
    pipeline.start().await;

    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&pipeline)));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting status server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    pipeline.stop().await;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

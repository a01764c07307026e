use std::path::PathBuf;
use std::sync::Arc;

use exporter::server::{create_router, AppState};
use exporter::{logging, MetricRegistry, SchedulerBuilder, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional settings file as the only argument
    let settings_path = std::env::args_os().nth(1).map(PathBuf::from);
    let settings = Settings::load(settings_path.as_deref())?;
    logging::init(&settings)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting command exporter"
    );
    tracing::info!(level = %settings.log_level, "Using log level");

    let registry = Arc::new(MetricRegistry::with_process_metrics());
    let scheduler = SchedulerBuilder::with_settings(&settings, Arc::clone(&registry)).build();

    let addr = format!("{}:{}", settings.listen_addr, settings.metrics_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Server listening");

    let handle = scheduler.start();

    let app = create_router(AppState { registry });
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Shutting down...");
        })
        .await?;

    handle.shutdown().await;
    Ok(())
}

use anyhow::Result;
use reporting_service::{
    config::AppConfig,
    metrics_server,
    observability,
    sinks::HtmlFilePresenter,
    sources,
    ReportSession,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let store = sources::from_config(&cfg.store);
    let presenter = Arc::new(HtmlFilePresenter::new(&cfg.report.preview_path));

    let session = ReportSession::start(store, presenter, cfg.session_options()).await?;
    match session.station_options().await {
        Ok(stations) => tracing::info!(count = stations.len(), ?stations, "stations available"),
        Err(e) => tracing::warn!(error = %e, "failed to list stations"),
    }

    session.start_auto_refresh();
    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down");
    session.stop_auto_refresh().await;

    Ok(())
}

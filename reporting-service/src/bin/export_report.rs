use anyhow::{bail, Context, Result};
use reporting_service::{
    config::AppConfig,
    observability,
    pipeline::{Presenter, ReportError, ReportFrame},
    sinks::ReportView,
    sources,
    ReportSession,
};
use std::{env, sync::Arc};
use time::{macros::format_description, Date};

/// Headless runs have no screen; frames are only logged.
struct LogPresenter;

#[async_trait::async_trait]
impl Presenter for LogPresenter {
    async fn present(&self, frame: &ReportFrame) -> Result<(), ReportError> {
        tracing::info!(
            view = %frame.view,
            rows = frame.table.rows.len(),
            entries = frame.stats.entry_count,
            "report loaded"
        );
        Ok(())
    }

    async fn present_error(&self, message: &str) -> Result<(), ReportError> {
        tracing::error!(error = message, "report failed");
        Ok(())
    }
}

fn parse_date(raw: &str) -> Result<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .with_context(|| format!("invalid date '{raw}', expected YYYY-MM-DD"))
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() == 3 {
        bail!("usage: export_report <monthly|daily> [<from YYYY-MM-DD> <to YYYY-MM-DD>] [station]");
    }
    let view: ReportView = args[1].parse().map_err(anyhow::Error::msg)?;

    // REPORTING_CONFIG selects the store, output directory and default range.
    let cfg = AppConfig::load()?;
    let store = sources::from_config(&cfg.store);
    let session = ReportSession::start(store, Arc::new(LogPresenter), cfg.session_options()).await?;

    if args.len() >= 4 {
        session.set_range(parse_date(&args[2])?, parse_date(&args[3])?).await?;
    }
    if let Some(station) = args.get(4) {
        session.set_station(Some(station.clone())).await?;
    }

    let path = session.export(view).await?;
    println!("{}", path.display());

    Ok(())
}

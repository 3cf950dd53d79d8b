use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
    },
    time::{Duration, Instant},
};

use loading_client::domain::Entry;
use time::{Date, OffsetDateTime};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{
    pipeline::{fetch_entries, DocumentStore, Presenter, ReportError, ReportFrame},
    sinks::{build_table, ReportTable, ReportView, XlsxExporter},
    transform::{self, filter_entries, summarize, DateRange, DefaultRange, ReportFilter, ReportStats},
};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub refresh_interval: Duration,
    pub ready_timeout: Duration,
    pub default_range: DefaultRange,
    pub output_dir: PathBuf,
    /// Pins "today" for the default range; the current UTC date otherwise.
    pub today: Option<Date>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            ready_timeout: Duration::from_secs(10),
            default_range: DefaultRange::default(),
            output_dir: PathBuf::from("exports"),
            today: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed(ReportStats),
    /// Another refresh was in flight; it will run once more with the current filter.
    Coalesced,
}

struct SessionState {
    /// Requested criteria; applied by the next successful refresh.
    filter: ReportFilter,
    /// Criteria that produced `entries`.
    loaded: ReportFilter,
    view: ReportView,
    entries: Arc<Vec<Entry>>,
    stats: ReportStats,
}

impl SessionState {
    fn frame(&self) -> ReportFrame {
        ReportFrame {
            view: self.view,
            filter: self.loaded.clone(),
            stats: self.stats,
            table: build_table(self.view, &self.entries),
        }
    }
}

struct Inner {
    store: Arc<dyn DocumentStore>,
    presenter: Arc<dyn Presenter>,
    exporter: XlsxExporter,
    state: RwLock<SessionState>,
    in_flight: AtomicBool,
    rerun: AtomicBool,
}

// Clears the in-flight flag even when the refresh future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct AutoRefresh {
    cancel: DropGuard,
    handle: JoinHandle<()>,
}

/// One report screen: the active filter and view, the last filtered entries,
/// and the store/presenter/exporter they flow through.
pub struct ReportSession {
    inner: Arc<Inner>,
    refresh_interval: Duration,
    auto: Mutex<Option<AutoRefresh>>,
}

impl ReportSession {
    /// Wait for the store, apply the default range and draw the first frame.
    ///
    /// A store that is not ready within `ready_timeout` ends the session
    /// with [`ReportError::StoreUnavailable`]. A failing first refresh does
    /// not: its error is already on screen and the next refresh may recover.
    pub async fn start(
        store: Arc<dyn DocumentStore>,
        presenter: Arc<dyn Presenter>,
        options: SessionOptions,
    ) -> Result<Self, ReportError> {
        match tokio::time::timeout(options.ready_timeout, store.ready()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(unavailable(presenter.as_ref(), e).await),
            Err(_) => {
                let e = ReportError::StoreUnavailable(format!(
                    "store not ready after {}ms",
                    options.ready_timeout.as_millis()
                ));
                return Err(unavailable(presenter.as_ref(), e).await);
            }
        }

        let today = options
            .today
            .unwrap_or_else(|| OffsetDateTime::now_utc().date());
        let range = options.default_range.resolve(today);
        tracing::info!(range = %range, "report session started");

        let session = Self {
            inner: Arc::new(Inner {
                store,
                presenter,
                exporter: XlsxExporter::new(options.output_dir),
                state: RwLock::new(SessionState {
                    filter: ReportFilter::new(range, None),
                    loaded: ReportFilter::new(range, None),
                    view: ReportView::default(),
                    entries: Arc::new(Vec::new()),
                    stats: ReportStats::default(),
                }),
                in_flight: AtomicBool::new(false),
                rerun: AtomicBool::new(false),
            }),
            refresh_interval: options.refresh_interval,
            auto: Mutex::new(None),
        };

        if let Err(e) = session.refresh().await {
            tracing::warn!(error = %e, "initial refresh failed");
        }
        Ok(session)
    }

    /// Fetch, filter, aggregate and present with the current filter.
    pub async fn refresh(&self) -> Result<RefreshOutcome, ReportError> {
        self.inner.refresh().await
    }

    /// Validate and apply a new date range, then refresh. An inverted range
    /// is rejected before anything is fetched.
    pub async fn set_range(&self, from: Date, to: Date) -> Result<RefreshOutcome, ReportError> {
        let range = DateRange::new(from, to).map_err(|e| {
            tracing::warn!(error = %e, "date range rejected");
            e
        })?;
        self.inner.update_filter(|f| f.with_range(range));
        self.refresh().await
    }

    /// `None` or a blank name selects all stations.
    pub async fn set_station(&self, station: Option<String>) -> Result<RefreshOutcome, ReportError> {
        self.inner.update_filter(|f| f.with_station(station));
        self.refresh().await
    }

    /// Redraw the cached entries in another layout. Nothing is fetched.
    pub async fn switch_view(&self, view: ReportView) -> Result<(), ReportError> {
        let frame = {
            let mut state = self.inner.write_state();
            state.view = view;
            state.frame()
        };
        self.inner.presenter.present(&frame).await
    }

    /// Write the cached entries as a workbook laid out for `view`. The file
    /// is named after the range those entries were loaded for.
    pub async fn export(&self, view: ReportView) -> Result<PathBuf, ReportError> {
        let (table, range) = {
            let state = self.inner.read_state();
            (build_table(view, &state.entries), state.loaded.range)
        };
        match self.inner.exporter.export(&table, &range).await {
            Err(ReportError::NothingToExport) => {
                tracing::warn!(view = %view, range = %range, "no data to export");
                Err(ReportError::NothingToExport)
            }
            other => other,
        }
    }

    /// Distinct stations across the whole store, sorted.
    pub async fn station_options(&self) -> Result<Vec<String>, ReportError> {
        let entries = fetch_entries(self.inner.store.as_ref()).await?;
        Ok(transform::station_options(&entries))
    }

    /// The grid `view` would show for the cached entries.
    pub fn table(&self, view: ReportView) -> ReportTable {
        build_table(view, &self.inner.read_state().entries)
    }

    /// The requested filter. It may be ahead of [`Self::loaded_filter`]
    /// when the last refresh failed.
    pub fn filter(&self) -> ReportFilter {
        self.inner.read_state().filter.clone()
    }

    /// The filter the cached entries were selected with.
    pub fn loaded_filter(&self) -> ReportFilter {
        self.inner.read_state().loaded.clone()
    }

    pub fn view(&self) -> ReportView {
        self.inner.read_state().view
    }

    pub fn stats(&self) -> ReportStats {
        self.inner.read_state().stats
    }

    pub fn entries(&self) -> Arc<Vec<Entry>> {
        self.inner.read_state().entries.clone()
    }

    /// Refresh every `refresh_interval` until stopped or the session is dropped.
    /// The first tick is one full period after the call. Calling this again
    /// replaces the running loop.
    pub fn start_auto_refresh(&self) {
        let mut auto = self.auto.lock().unwrap_or_else(PoisonError::into_inner);
        // Dropping the previous loop's guard cancels it.
        auto.take();

        let token = CancellationToken::new();
        let handle = tokio::spawn(auto_refresh_loop(
            Arc::downgrade(&self.inner),
            self.refresh_interval,
            token.clone(),
        ));
        *auto = Some(AutoRefresh {
            cancel: token.drop_guard(),
            handle,
        });
        tracing::info!(interval_secs = self.refresh_interval.as_secs(), "auto refresh started");
    }

    /// Stop the loop and wait for it to exit. A refresh already running is
    /// allowed to finish.
    pub async fn stop_auto_refresh(&self) {
        let auto = self.auto.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(AutoRefresh { cancel, handle }) = auto {
            drop(cancel);
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "auto refresh task ended abnormally");
            }
        }
    }

    pub fn is_auto_refreshing(&self) -> bool {
        self.auto
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

async fn unavailable(presenter: &dyn Presenter, e: ReportError) -> ReportError {
    tracing::error!(error = %e, "store unavailable");
    if let Err(pe) = presenter.present_error(&e.to_string()).await {
        tracing::warn!(error = %pe, "failed to present error");
    }
    e
}

async fn auto_refresh_loop(inner: Weak<Inner>, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else { break };
                if let Err(e) = inner.refresh().await {
                    tracing::warn!(error = %e, "scheduled refresh failed");
                }
            }
        }
    }
    tracing::debug!("auto refresh stopped");
}

impl Inner {
    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_filter(&self, f: impl FnOnce(ReportFilter) -> ReportFilter) {
        let mut state = self.write_state();
        let filter = f(state.filter.clone());
        state.filter = filter;
    }

    async fn refresh(&self) -> Result<RefreshOutcome, ReportError> {
        self.rerun.store(true, Ordering::SeqCst);
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::debug!("refresh already running, coalesced");
            return Ok(RefreshOutcome::Coalesced);
        }

        loop {
            self.rerun.store(false, Ordering::SeqCst);
            let result = {
                let _in_flight = InFlight(&self.in_flight);
                self.run_cycle().await
            };

            // A request that arrived mid-cycle gets one more pass, unless a
            // new caller already picked it up.
            if !self.rerun.load(Ordering::SeqCst) || self.in_flight.swap(true, Ordering::SeqCst) {
                return result.map(RefreshOutcome::Completed);
            }
        }
    }

    async fn run_cycle(&self) -> Result<ReportStats, ReportError> {
        let started = Instant::now();
        metrics::counter!("report_refresh_total").increment(1);

        let entries = match fetch_entries(self.store.as_ref()).await {
            Ok(entries) => entries,
            Err(e) => {
                metrics::counter!("report_refresh_failures_total").increment(1);
                tracing::error!(error = %e, "refresh failed");
                if let Err(pe) = self.presenter.present_error(&e.to_string()).await {
                    tracing::warn!(error = %pe, "failed to present error");
                }
                return Err(e);
            }
        };

        // The filter is read after the fetch so a rerun sees the newest selection.
        let frame = {
            let mut state = self.write_state();
            let filtered = filter_entries(&entries, &state.filter);
            state.stats = summarize(&filtered);
            state.entries = Arc::new(filtered);
            state.loaded = state.filter.clone();
            state.frame()
        };

        if let Err(e) = self.presenter.present(&frame).await {
            metrics::counter!("report_refresh_failures_total").increment(1);
            return Err(e);
        }

        metrics::histogram!("report_refresh_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(
            entries = frame.stats.entry_count,
            stations = frame.stats.station_count,
            feeders = frame.stats.feeder_count,
            range = %frame.filter.range,
            station = frame.filter.station().unwrap_or("all"),
            "report refreshed"
        );
        Ok(frame.stats)
    }
}

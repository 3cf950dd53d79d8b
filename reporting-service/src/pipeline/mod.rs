use std::pin::Pin;

use futures::{Stream, StreamExt};
use loading_client::{
    db::{EntryDocument, StoredDocument},
    domain::Entry,
};

use crate::{
    sinks::{ReportTable, ReportView},
    transform::{ReportFilter, ReportStats},
};

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("database not available: {0}")]
    StoreUnavailable(String),
    #[error("from date {from} cannot be after to date {to}")]
    InvalidRange { from: String, to: String },
    #[error("error loading data: {0}")]
    Store(String),
    #[error("no data to export")]
    NothingToExport,
    #[error("export error: {0}")]
    Export(String),
    #[error("presenter error: {0}")]
    Present(String),
}

pub type DocumentStream = Pin<Box<dyn Stream<Item = Result<StoredDocument, ReportError>> + Send>>;

/// Read side of the document database holding daily entries.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Resolves once the store can serve reads. Awaited once per session.
    async fn ready(&self) -> Result<(), ReportError>;

    /// Every stored entry document. An `Err` item aborts the read.
    async fn documents(&self) -> DocumentStream;
}

/// Everything a view needs to draw one refresh cycle.
#[derive(Debug, Clone)]
pub struct ReportFrame {
    pub view: ReportView,
    pub filter: ReportFilter,
    pub stats: ReportStats,
    pub table: ReportTable,
}

/// The UI surface the report is drawn into.
#[async_trait::async_trait]
pub trait Presenter: Send + Sync {
    async fn present(&self, frame: &ReportFrame) -> Result<(), ReportError>;

    /// Replace the table with an error banner.
    async fn present_error(&self, message: &str) -> Result<(), ReportError>;
}

/// Read every document and normalize it into entries.
///
/// Documents without a usable date or with an unexpected shape are skipped
/// and only logged. A store error fails the whole fetch.
pub async fn fetch_entries<S>(store: &S) -> Result<Vec<Entry>, ReportError>
where
    S: DocumentStore + ?Sized,
{
    let mut documents = store.documents().await;
    let mut entries = Vec::new();
    let mut skipped: u64 = 0;

    while let Some(item) = documents.next().await {
        let doc = item?;
        match EntryDocument::parse(&doc) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                skipped += 1;
                tracing::warn!(error = %e, "skipping entry document");
            }
        }
    }

    if skipped > 0 {
        metrics::counter!("report_documents_skipped_total").increment(skipped);
    }
    tracing::debug!(fetched = entries.len(), skipped, "entry documents fetched");

    Ok(entries)
}

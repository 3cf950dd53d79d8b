use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, PoisonError, RwLock,
    },
    time::Duration,
};

use futures::stream;
use loading_client::db::StoredDocument;
use tokio::sync::watch;

use crate::pipeline::{DocumentStore, DocumentStream, ReportError};

/// In-process document store, for embedding and tests.
///
/// Readiness is a watch flag: stores built with [`MemoryStore::pending`]
/// only become ready once their [`ReadyHandle`] is marked.
pub struct MemoryStore {
    documents: RwLock<Vec<StoredDocument>>,
    failure: RwLock<Option<String>>,
    read_delay: RwLock<Option<Duration>>,
    reads: AtomicUsize,
    ready: Arc<watch::Sender<bool>>,
}

/// Marks a pending [`MemoryStore`] as ready.
#[derive(Clone)]
pub struct ReadyHandle {
    ready: Arc<watch::Sender<bool>>,
}

impl ReadyHandle {
    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }
}

impl MemoryStore {
    pub fn new(documents: Vec<StoredDocument>) -> Self {
        let (tx, _rx) = watch::channel(true);
        Self::with_ready(documents, Arc::new(tx))
    }

    pub fn pending(documents: Vec<StoredDocument>) -> (Self, ReadyHandle) {
        let (tx, _rx) = watch::channel(false);
        let ready = Arc::new(tx);
        let handle = ReadyHandle { ready: ready.clone() };
        (Self::with_ready(documents, ready), handle)
    }

    fn with_ready(documents: Vec<StoredDocument>, ready: Arc<watch::Sender<bool>>) -> Self {
        Self {
            documents: RwLock::new(documents),
            failure: RwLock::new(None),
            read_delay: RwLock::new(None),
            reads: AtomicUsize::new(0),
            ready,
        }
    }

    /// Swap the stored documents; later reads see the new set.
    pub fn replace(&self, documents: Vec<StoredDocument>) {
        *self.documents.write().unwrap_or_else(PoisonError::into_inner) = documents;
    }

    /// Make every later read fail with `message` until [`Self::recover`].
    pub fn fail_reads(&self, message: &str) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = Some(message.to_string());
    }

    pub fn recover(&self) {
        *self.failure.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Hold each read for `delay` before returning documents.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        *self.read_delay.write().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Number of reads served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn ready(&self) -> Result<(), ReportError> {
        let mut rx = self.ready.subscribe();
        rx.wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| ReportError::StoreUnavailable("readiness signal closed".to_string()))
    }

    async fn documents(&self) -> DocumentStream {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let delay = *self.read_delay.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failure.read().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(message) = failure {
            return Box::pin(stream::once(async move { Err(ReportError::Store(message)) })) as DocumentStream;
        }

        let docs = self.documents.read().unwrap_or_else(PoisonError::into_inner).clone();
        Box::pin(stream::iter(docs.into_iter().map(Ok))) as DocumentStream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn pending_store_waits_for_handle() {
        let (store, handle) = MemoryStore::pending(Vec::new());
        let waiting = tokio::time::timeout(Duration::from_millis(20), store.ready()).await;
        assert!(waiting.is_err());

        handle.mark_ready();
        store.ready().await.expect("ready after mark");
    }

    #[tokio::test]
    async fn replace_and_fail_reads() {
        let store = MemoryStore::new(Vec::new());
        store.replace(vec![StoredDocument {
            id: "a".to_string(),
            data: json!({ "date": "2024-01-05" }),
        }]);
        let docs: Vec<StoredDocument> = store.documents().await.try_collect().await.expect("read");
        assert_eq!(docs.len(), 1);

        store.fail_reads("offline");
        let res: Result<Vec<StoredDocument>, _> = store.documents().await.try_collect().await;
        assert!(matches!(res, Err(ReportError::Store(m)) if m == "offline"));

        store.recover();
        assert!(store.documents().await.try_collect::<Vec<_>>().await.is_ok());
        assert_eq!(store.read_count(), 3);
    }
}

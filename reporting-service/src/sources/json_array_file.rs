use std::path::PathBuf;

use futures::stream;
use loading_client::db::StoredDocument;

use super::FileDocument;
use crate::pipeline::{DocumentStore, DocumentStream, ReportError};

/// A collection snapshot saved as one JSON array of documents.
pub struct JsonArrayFileStore {
    path: PathBuf,
}

impl JsonArrayFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<Vec<StoredDocument>, ReportError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ReportError::Store(format!("failed to read entries file: {e}")))?;
        let parsed: Vec<FileDocument> = serde_json::from_str(&contents)
            .map_err(|e| ReportError::Store(format!("invalid entries json: {e}")))?;
        Ok(parsed.into_iter().map(StoredDocument::from).collect())
    }
}

#[async_trait::async_trait]
impl DocumentStore for JsonArrayFileStore {
    async fn ready(&self) -> Result<(), ReportError> {
        tokio::fs::metadata(&self.path)
            .await
            .map(|_| ())
            .map_err(|e| ReportError::StoreUnavailable(format!("{}: {e}", self.path.display())))
    }

    async fn documents(&self) -> DocumentStream {
        // The whole file is parsed up front so a corrupt snapshot yields no documents.
        match self.load().await {
            Ok(docs) => Box::pin(stream::iter(docs.into_iter().map(Ok))) as DocumentStream,
            Err(e) => Box::pin(stream::once(async move { Err(e) })) as DocumentStream,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn reads_array_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("entries.json");
        std::fs::write(
            &path,
            r#"[{"id":"a","date":"2024-01-05"},{"id":"b","date":{"seconds":1704412800}}]"#,
        )
        .expect("write");

        let store = JsonArrayFileStore::new(&path);
        let docs: Vec<StoredDocument> = store.documents().await.try_collect().await.expect("read");
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_a_store_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("entries.json");
        std::fs::write(&path, r#"[{"id":"a"#).expect("write");

        let store = JsonArrayFileStore::new(&path);
        let res: Result<Vec<StoredDocument>, _> = store.documents().await.try_collect().await;
        assert!(matches!(res, Err(ReportError::Store(_))));
    }
}

use std::path::PathBuf;

use async_stream::try_stream;
use loading_client::db::StoredDocument;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};

use super::FileDocument;
use crate::pipeline::{DocumentStore, DocumentStream, ReportError};

/// Entry documents exported one JSON object per line.
///
/// Each line carries the document id next to its fields:
/// `{"id": "abc", "date": "2024-01-05", "pssStation": "BISRA", "feeders": {...}}`.
/// Blank lines are ignored; a line that is not a JSON object fails the read.
pub struct NdjsonFileStore {
    path: PathBuf,
}

impl NdjsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl DocumentStore for NdjsonFileStore {
    async fn ready(&self) -> Result<(), ReportError> {
        tokio::fs::metadata(&self.path)
            .await
            .map(|_| ())
            .map_err(|e| ReportError::StoreUnavailable(format!("{}: {e}", self.path.display())))
    }

    async fn documents(&self) -> DocumentStream {
        let path = self.path.clone();
        let s = try_stream! {
            let file = File::open(&path).await.map_err(|e| {
                ReportError::Store(format!("failed to open entries file: {e}"))
            })?;
            let reader = BufReader::new(file);
            let mut lines = reader.lines();
            let mut line_no: usize = 0;

            while let Some(line) = lines.next_line().await.map_err(|e| {
                ReportError::Store(format!("failed to read entries line: {e}"))
            })? {
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }
                let parsed: FileDocument = serde_json::from_str(&line).map_err(|e| {
                    ReportError::Store(format!("invalid entries json at line {line_no}: {e}"))
                })?;
                yield StoredDocument::from(parsed);
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::io::Write;

    #[tokio::test]
    async fn reads_one_document_per_line() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, r#"{{"id":"a","date":"2024-01-05","pssStation":"BISRA"}}"#).expect("write");
        writeln!(file).expect("write");
        writeln!(file, r#"{{"id":"b","date":"2024-01-06"}}"#).expect("write");

        let store = NdjsonFileStore::new(file.path());
        store.ready().await.expect("ready");

        let docs: Vec<StoredDocument> = store.documents().await.try_collect().await.expect("read");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "a");
        assert_eq!(docs[0].data["pssStation"], "BISRA");
        assert!(docs[0].data.get("id").is_none());
    }

    #[tokio::test]
    async fn bad_line_fails_the_read() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, r#"{{"id":"a","date":"2024-01-05"}}"#).expect("write");
        writeln!(file, "not json").expect("write");

        let store = NdjsonFileStore::new(file.path());
        let res: Result<Vec<StoredDocument>, _> = store.documents().await.try_collect().await;
        assert!(matches!(res, Err(ReportError::Store(msg)) if msg.contains("line 2")));
    }

    #[tokio::test]
    async fn missing_file_is_not_ready() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = NdjsonFileStore::new(dir.path().join("absent.ndjson"));
        assert!(matches!(store.ready().await, Err(ReportError::StoreUnavailable(_))));
    }
}

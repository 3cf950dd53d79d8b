pub mod json_array_file;
pub mod memory;
pub mod ndjson_file;

pub use json_array_file::JsonArrayFileStore;
pub use memory::{MemoryStore, ReadyHandle};
pub use ndjson_file::NdjsonFileStore;

use std::sync::Arc;

use loading_client::db::StoredDocument;
use serde_json::{Map, Value};

use crate::{
    config::{StoreConfig, StoreKind},
    pipeline::DocumentStore,
};

/// The file-backed store selected by `cfg`.
pub fn from_config(cfg: &StoreConfig) -> Arc<dyn DocumentStore> {
    match cfg.kind {
        StoreKind::NdjsonFile => Arc::new(NdjsonFileStore::new(&cfg.path)),
        StoreKind::JsonArrayFile => Arc::new(JsonArrayFileStore::new(&cfg.path)),
    }
}

/// On-disk form of one entry document: the store id next to the fields.
#[derive(serde::Deserialize)]
struct FileDocument {
    id: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl From<FileDocument> for StoredDocument {
    fn from(d: FileDocument) -> Self {
        StoredDocument {
            id: d.id,
            data: Value::Object(d.fields),
        }
    }
}

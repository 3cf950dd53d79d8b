pub mod entry_documents;

pub use entry_documents::{DocumentError, EntryDocument, RawDate, StoreTimestamp, StoredDocument};

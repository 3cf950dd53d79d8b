pub mod config;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod session;
pub mod sinks;
pub mod sources;
pub mod transform;

pub use pipeline::{DocumentStore, Presenter, ReportError, ReportFrame};
pub use session::{RefreshOutcome, ReportSession, SessionOptions};

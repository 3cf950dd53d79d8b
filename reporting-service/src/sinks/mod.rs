pub mod html;
pub mod layout;
pub mod xlsx;

pub use html::HtmlFilePresenter;
pub use layout::{build_table, ReportTable, ReportView, PLACEHOLDER};
pub use xlsx::XlsxExporter;

use std::path::PathBuf;

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::{
    pipeline::ReportError,
    sinks::{ReportTable, ReportView},
    transform::DateRange,
};

/// `Monthly_Loading_Details_2024-01-01_to_2024-01-31.xlsx` and friends.
pub fn export_file_name(view: ReportView, range: &DateRange) -> String {
    format!(
        "{}_{}_to_{}.xlsx",
        view.file_stem(),
        range.from_key(),
        range.to_key()
    )
}

fn build_worksheet(table: &ReportTable) -> Result<Worksheet, XlsxError> {
    let mut worksheet = Worksheet::new();
    worksheet.set_name(table.view.title())?;
    write_table(&mut worksheet, table)?;
    Ok(worksheet)
}

/// Write the header and body of `table`; returns the number of rows written.
fn write_table(worksheet: &mut Worksheet, table: &ReportTable) -> Result<u32, XlsxError> {
    let header = Format::new().set_bold();
    for (col, title) in table.headers().iter().enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(0, col, *title, &header)?;
    }
    for (col, width) in table.view.column_widths().iter().enumerate() {
        worksheet.set_column_width(col as u16, *width)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    let mut written: u32 = 1;
    for row in &table.rows {
        for (col, value) in row.iter().enumerate() {
            worksheet.write_string(written, col as u16, value)?;
        }
        written += 1;
    }

    Ok(written)
}

/// Serialize `table` as a single-sheet workbook.
pub fn workbook_bytes(table: &ReportTable) -> Result<Vec<u8>, ReportError> {
    let worksheet =
        build_worksheet(table).map_err(|e| ReportError::Export(format!("failed to build worksheet: {e}")))?;

    let mut workbook = Workbook::new();
    workbook.push_worksheet(worksheet);
    workbook
        .save_to_buffer()
        .map_err(|e| ReportError::Export(format!("failed to serialize workbook: {e}")))
}

/// Writes report workbooks into an output directory.
pub struct XlsxExporter {
    output_dir: PathBuf,
}

impl XlsxExporter {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write `table` and return the path of the new file.
    ///
    /// Callers check for an empty report first; an empty table is refused
    /// here as well so no blank workbook is ever produced.
    pub async fn export(&self, table: &ReportTable, range: &DateRange) -> Result<PathBuf, ReportError> {
        if table.is_empty() {
            return Err(ReportError::NothingToExport);
        }

        let bytes = workbook_bytes(table)?;
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| ReportError::Export(format!("failed to create output dir: {e}")))?;

        let path = self.output_dir.join(export_file_name(table.view, range));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ReportError::Export(format!("failed to write {}: {e}", path.display())))?;

        metrics::counter!("report_exports_total", "view" => table.view.to_string()).increment(1);
        tracing::info!(
            path = %path.display(),
            view = %table.view,
            rows = table.rows.len(),
            bytes = bytes.len(),
            "report exported"
        );

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn range() -> DateRange {
        DateRange::new(date!(2024 - 01 - 01), date!(2024 - 01 - 31)).expect("range")
    }

    #[test]
    fn file_names_encode_range() {
        assert_eq!(
            export_file_name(ReportView::Monthly, &range()),
            "Monthly_Loading_Details_2024-01-01_to_2024-01-31.xlsx"
        );
        assert_eq!(
            export_file_name(ReportView::Daily, &range()),
            "Daily_Loading_Summary_2024-01-01_to_2024-01-31.xlsx"
        );
    }

    #[test]
    fn workbook_is_a_zip_container() {
        let table = ReportTable {
            view: ReportView::Daily,
            rows: vec![vec![
                "BISRA".to_string(),
                "1".to_string(),
                "4".to_string(),
                "05/01/2024".to_string(),
                "05/01/2024".to_string(),
            ]],
        };
        let bytes = workbook_bytes(&table).expect("workbook");
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn worksheet_carries_title_header_and_every_row() {
        let table = ReportTable {
            view: ReportView::Monthly,
            rows: vec![vec!["-".to_string(); 18]; 3],
        };

        let worksheet = build_worksheet(&table).expect("worksheet");
        assert_eq!(worksheet.name(), "Monthly Loading Details");

        let mut fresh = Worksheet::new();
        let written = write_table(&mut fresh, &table).expect("write");
        assert_eq!(written as usize, table.rows.len() + 1);
    }

    #[tokio::test]
    async fn export_refuses_empty_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exporter = XlsxExporter::new(dir.path());
        let table = ReportTable {
            view: ReportView::Monthly,
            rows: Vec::new(),
        };

        let res = exporter.export(&table, &range()).await;
        assert!(matches!(res, Err(ReportError::NothingToExport)));
        assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
    }

    #[tokio::test]
    async fn export_writes_named_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exporter = XlsxExporter::new(dir.path().join("exports"));
        let table = ReportTable {
            view: ReportView::Daily,
            rows: vec![vec!["BISRA".to_string(); 5]],
        };

        let path = exporter.export(&table, &range()).await.expect("export");
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("Daily_Loading_Summary_2024-01-01_to_2024-01-31.xlsx")
        );
        assert!(std::fs::metadata(&path).expect("metadata").len() > 0);
    }
}

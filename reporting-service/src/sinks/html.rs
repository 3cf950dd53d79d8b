use std::path::PathBuf;

use crate::{
    pipeline::{Presenter, ReportError, ReportFrame},
    sinks::{ReportTable, ReportView},
    transform::{DateRange, ReportStats},
};

pub const EMPTY_MESSAGE: &str = "No data found for the selected date range";

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn render_table_head(view: ReportView) -> String {
    let mut s = String::from("<tr>");
    for h in view.headers() {
        s.push_str(&format!("<th>{}</th>", html_escape(h)));
    }
    s.push_str("</tr>");
    s
}

/// `<tbody>` content for `table`. An empty table gets a single placeholder
/// row spanning every column.
pub fn render_table_body(table: &ReportTable) -> String {
    let columns = table.headers().len();
    if table.is_empty() {
        return format!("<tr><td colspan=\"{columns}\" class=\"empty\">{EMPTY_MESSAGE}</td></tr>");
    }

    let mut s = String::new();
    for row in &table.rows {
        s.push_str("<tr>");
        for (i, value) in row.iter().enumerate() {
            if table.view.is_key_column(i) {
                s.push_str(&format!("<td class=\"key\">{}</td>", html_escape(value)));
            } else {
                s.push_str(&format!("<td>{}</td>", html_escape(value)));
            }
        }
        s.push_str("</tr>");
    }
    s
}

/// Error banner that takes the place of the table body.
pub fn render_error_row(message: &str, columns: usize) -> String {
    format!(
        "<tr><td colspan=\"{columns}\" class=\"error\">{}<br><button onclick=\"location.reload()\">Refresh Page</button></td></tr>",
        html_escape(message)
    )
}

pub fn render_stats(stats: &ReportStats, range: &DateRange) -> String {
    format!(
        "<div class=\"stats\">\
<span id=\"statsEntries\">{}</span>\
<span id=\"statsPSS\">{}</span>\
<span id=\"statsFeeders\">{}</span>\
<span id=\"statsDateRange\">{}</span>\
</div>",
        stats.entry_count,
        stats.station_count,
        stats.feeder_count,
        html_escape(&range.to_string())
    )
}

const STYLE: &str = "body{font-family:sans-serif;background:#0f172a;color:#e2e8f0}\
table{border-collapse:collapse}td,th{padding:10px 8px;white-space:nowrap;border-bottom:1px solid rgba(255,255,255,0.1)}\
td.key{font-weight:600;color:#60a5fa}td.empty{padding:2rem;text-align:center;color:#94a3b8}\
td.error{padding:2rem;text-align:center;color:#ef4444}.stats span{margin-right:2rem}";

fn page(title: &str, stats: &str, head: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title><style>{STYLE}</style></head>\
<body><h1>{title}</h1>{stats}<table><thead>{head}</thead><tbody>{body}</tbody></table></body></html>\n"
    )
}

/// A complete preview document for one refresh cycle.
pub fn render_page(frame: &ReportFrame) -> String {
    let mut title = frame.view.title().to_string();
    if let Some(station) = frame.filter.station() {
        title.push_str(" - ");
        title.push_str(station);
    }
    page(
        &html_escape(&title),
        &render_stats(&frame.stats, &frame.filter.range),
        &render_table_head(frame.view),
        &render_table_body(&frame.table),
    )
}

pub fn render_error_page(message: &str) -> String {
    let view = ReportView::Monthly;
    page(
        view.title(),
        "",
        &render_table_head(view),
        &render_error_row(message, view.headers().len()),
    )
}

/// Writes the preview page to a file on every refresh.
pub struct HtmlFilePresenter {
    path: PathBuf,
}

impl HtmlFilePresenter {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    async fn write(&self, contents: String) -> Result<(), ReportError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ReportError::Present(format!("failed to create preview dir: {e}")))?;
        }
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|e| ReportError::Present(format!("failed to write preview: {e}")))
    }
}

#[async_trait::async_trait]
impl Presenter for HtmlFilePresenter {
    async fn present(&self, frame: &ReportFrame) -> Result<(), ReportError> {
        self.write(render_page(frame)).await?;
        tracing::debug!(
            path = %self.path.display(),
            view = %frame.view,
            rows = frame.table.rows.len(),
            "preview written"
        );
        Ok(())
    }

    async fn present_error(&self, message: &str) -> Result<(), ReportError> {
        self.write(render_error_page(message)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::ReportFilter;
    use time::macros::date;

    fn table(view: ReportView, rows: Vec<Vec<&str>>) -> ReportTable {
        ReportTable {
            view,
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect())
                .collect(),
        }
    }

    #[test]
    fn empty_table_renders_one_placeholder_row() {
        let body = render_table_body(&table(ReportView::Monthly, vec![]));
        assert_eq!(body.matches("<tr>").count(), 1);
        assert!(body.contains("colspan=\"18\""));
        assert!(body.contains(EMPTY_MESSAGE));

        let daily = render_table_body(&table(ReportView::Daily, vec![]));
        assert!(daily.contains("colspan=\"5\""));
    }

    #[test]
    fn rows_are_escaped_and_key_columns_marked() {
        let body = render_table_body(&table(
            ReportView::Daily,
            vec![vec!["A<B>&C", "1", "2", "05/01/2024", "05/01/2024"]],
        ));
        assert!(body.contains("<td class=\"key\">A&lt;B&gt;&amp;C</td>"));
        assert_eq!(body.matches("<td").count(), 5);
    }

    #[test]
    fn error_row_has_reload_action() {
        let row = render_error_row("Error loading data: boom", 18);
        assert!(row.contains("Error loading data: boom"));
        assert!(row.contains("location.reload()"));
    }

    #[tokio::test]
    async fn file_presenter_writes_page() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out").join("report.html");
        let presenter = HtmlFilePresenter::new(&path);

        let range = DateRange::new(date!(2024 - 01 - 01), date!(2024 - 01 - 31)).expect("range");
        let frame = ReportFrame {
            view: ReportView::Daily,
            filter: ReportFilter::new(range, Some("BISRA".to_string())),
            stats: ReportStats {
                entry_count: 2,
                station_count: 1,
                feeder_count: 5,
            },
            table: table(
                ReportView::Daily,
                vec![vec!["BISRA", "2", "5", "05/01/2024", "06/01/2024"]],
            ),
        };
        presenter.present(&frame).await.expect("present");

        let html = std::fs::read_to_string(&path).expect("read preview");
        assert!(html.contains("Daily Loading Summary - BISRA"));
        assert!(html.contains("<span id=\"statsFeeders\">5</span>"));
        assert!(html.contains("2024-01-01 to 2024-01-31"));

        presenter.present_error("database offline").await.expect("present error");
        let html = std::fs::read_to_string(&path).expect("read preview");
        assert!(html.contains("database offline"));
    }
}

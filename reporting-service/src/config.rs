use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};

use crate::{session::SessionOptions, transform::DefaultRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    #[default]
    NdjsonFile,
    JsonArrayFile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub default_range: DefaultRange,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_preview_path")]
    pub preview_path: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            default_range: DefaultRange::default(),
            output_dir: default_output_dir(),
            preview_path: default_preview_path(),
        }
    }
}

fn default_refresh_interval_secs() -> u64 {
    30
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("exports")
}

fn default_preview_path() -> PathBuf {
    PathBuf::from("report.html")
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadinessConfig {
    #[serde(default = "default_ready_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_ready_timeout_ms(),
        }
    }
}

fn default_ready_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub readiness: ReadinessConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("REPORTING_CONFIG").unwrap_or_else(|_| "reporting-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        let cfg: AppConfig = toml::from_str(&contents)?;
        Ok(cfg)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            refresh_interval: Duration::from_secs(self.report.refresh_interval_secs.max(1)),
            ready_timeout: Duration::from_millis(self.readiness.timeout_ms),
            default_range: self.report.default_range,
            output_dir: self.report.output_dir.clone(),
            today: None,
        }
    }
}

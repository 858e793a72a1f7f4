use consumption_client::domain::YearRange;
use serde::Deserialize;
use std::fs;

use crate::pipeline::{DuplicatePolicy, ImportSettings, SheetFilter};
use crate::transform::{date::DateOrder, year::DEFAULT_SAMPLE_ROWS};

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind_addr: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_min_year() -> i32 {
    YearRange::default().min
}

fn default_max_year() -> i32 {
    YearRange::default().max
}

fn default_production_limit() -> f64 {
    ImportSettings::default().production_limit
}

fn default_year_sample_rows() -> usize {
    DEFAULT_SAMPLE_ROWS
}

fn default_summary_sheet_markers() -> Vec<String> {
    SheetFilter::default().skip_markers
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_min_year")]
    pub min_year: i32,
    #[serde(default = "default_max_year")]
    pub max_year: i32,
    #[serde(default = "default_production_limit")]
    pub production_limit: f64,
    #[serde(default = "default_year_sample_rows")]
    pub year_sample_rows: usize,
    #[serde(default)]
    pub date_order: DateOrder,
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// Sheet-name substrings marking summary or comparison sheets.
    #[serde(default = "default_summary_sheet_markers")]
    pub summary_sheet_markers: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            min_year: default_min_year(),
            max_year: default_max_year(),
            production_limit: default_production_limit(),
            year_sample_rows: default_year_sample_rows(),
            date_order: DateOrder::default(),
            duplicate_policy: DuplicatePolicy::default(),
            summary_sheet_markers: default_summary_sheet_markers(),
        }
    }
}

impl ImportConfig {
    pub fn settings(&self) -> anyhow::Result<ImportSettings> {
        if self.min_year > self.max_year {
            anyhow::bail!(
                "import.min_year ({}) is after import.max_year ({})",
                self.min_year,
                self.max_year
            );
        }

        Ok(ImportSettings {
            years: YearRange::new(self.min_year, self.max_year),
            production_limit: self.production_limit,
            year_sample_rows: self.year_sample_rows,
            date_order: self.date_order,
            duplicate_policy: self.duplicate_policy,
            sheet_filter: SheetFilter {
                skip_markers: self
                    .summary_sheet_markers
                    .iter()
                    .map(|m| m.to_lowercase())
                    .collect(),
                ..SheetFilter::default()
            },
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub store: StoreConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub import: ImportConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path =
            env::var("CONSUMPTION_CONFIG").unwrap_or_else(|_| "consumption-config.toml".to_string());
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config {path}: {e}"))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }
}

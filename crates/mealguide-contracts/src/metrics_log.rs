use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};

use crate::metrics::InferenceMetrics;

/// Fixed column order of the metrics log: five identifying columns, then
/// eight vision-metric columns, then eight clinical-metric columns.
pub const METRICS_COLUMNS: [&str; 21] = [
    "timestamp",
    "vlm_model",
    "med_model",
    "user_condition",
    "image_path",
    "vlm_total_duration",
    "vlm_load_duration",
    "vlm_prompt_eval_count",
    "vlm_prompt_eval_duration",
    "vlm_eval_count",
    "vlm_eval_duration",
    "vlm_tokens_per_second",
    "vlm_response_text",
    "med_total_duration",
    "med_load_duration",
    "med_prompt_eval_count",
    "med_prompt_eval_duration",
    "med_eval_count",
    "med_eval_duration",
    "med_tokens_per_second",
    "med_response_text",
];

/// One completed clinical-guidance request.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsLogRow {
    pub vlm_model: String,
    pub med_model: String,
    pub user_condition: String,
    pub image_path: String,
    pub vlm_metrics: InferenceMetrics,
    pub med_metrics: InferenceMetrics,
}

impl MetricsLogRow {
    fn record(&self, timestamp: &str) -> Vec<String> {
        let mut record = vec![
            timestamp.to_string(),
            self.vlm_model.clone(),
            self.med_model.clone(),
            self.user_condition.clone(),
            self.image_path.clone(),
        ];
        record.extend(metric_fields(&self.vlm_metrics));
        record.extend(metric_fields(&self.med_metrics));
        record
    }
}

fn metric_fields(metrics: &InferenceMetrics) -> Vec<String> {
    vec![
        optional_text(metrics.total_duration_ns),
        optional_text(metrics.load_duration_ns),
        optional_text(metrics.prompt_eval_count),
        optional_text(metrics.prompt_eval_duration_ns),
        optional_text(metrics.eval_count),
        optional_text(metrics.eval_duration_ns),
        optional_text(metrics.tokens_per_second),
        metrics.response_text.clone().unwrap_or_default(),
    ]
}

fn optional_text<T: ToString>(value: Option<T>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

/// Append-only CSV telemetry for completed guidance requests.
///
/// The header row is written the first time the file is created; after that
/// every call appends exactly one data row. Appends are serialized behind a
/// mutex, but cross-process writers are not coordinated.
#[derive(Debug, Clone)]
pub struct MetricsLogger {
    inner: Arc<MetricsLoggerInner>,
}

#[derive(Debug)]
struct MetricsLoggerInner {
    path: PathBuf,
    lock: Mutex<()>,
}

impl MetricsLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(MetricsLoggerInner {
                path: path.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn append(&self, row: &MetricsLogRow) -> anyhow::Result<()> {
        let record = row.record(&now_utc_iso());

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("metrics logger lock poisoned"))?;
        let needs_header = !self.inner.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(METRICS_COLUMNS)?;
        }
        writer.write_record(&record)?;
        writer.flush()?;
        Ok(())
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

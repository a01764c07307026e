//! Process settings and job config files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;
use crate::job::{merge_labels, JobSpec, DEFAULT_HELP, DEFAULT_INTERVAL, MAX_INTERVAL};
use crate::registry::LabelSet;
use crate::time_unit::TimeUnit;

/// Prefix of environment variables overriding settings (`EXPORTER__METRICS_PORT`).
pub const ENV_PREFIX: &str = "EXPORTER";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Log verbosity, named like the classic syslog-ish levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Critical,
    Error,
    Warning,
    Info,
    Debug,
    NotSet,
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CRITICAL" => Ok(LogLevel::Critical),
            "ERROR" => Ok(LogLevel::Error),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "INFO" => Ok(LogLevel::Info),
            "DEBUG" => Ok(LogLevel::Debug),
            "NOTSET" => Ok(LogLevel::NotSet),
            _ => Err(ConfigError::LogLevel(s.to_string())),
        }
    }
}

impl LogLevel {
    /// `tracing` filter directive for this level.
    pub fn directive(&self) -> &'static str {
        match self {
            LogLevel::Critical | LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::NotSet => "trace",
        }
    }
}

/// Settings of the exporter process.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub listen_addr: String,
    pub metrics_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub config_dir: PathBuf,
    pub tick_millis: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            metrics_port: 8000,
            log_level: "INFO".to_string(),
            log_format: LogFormat::Text,
            config_dir: PathBuf::from("configs"),
            tick_millis: 1000,
        }
    }
}

impl Settings {
    /// Load settings from an optional file, then `EXPORTER__*` environment variables.
    ///
    /// The file format is picked from its extension (toml, yaml, json, ...).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.log_level()?;
        Ok(settings)
    }

    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        self.log_level.parse()
    }

    /// Scheduler tick resolution, never below one millisecond.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }
}

#[derive(Debug, Deserialize)]
struct JobFile {
    #[serde(default)]
    global_labels: BTreeMap<String, Value>,
    scripts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct JobRecord {
    script: Option<String>,
    metric: Option<String>,
    #[serde(default)]
    params: Vec<Value>,
    interval: Option<Value>,
    #[serde(alias = "HELP")]
    help: Option<String>,
    #[serde(default)]
    labels: BTreeMap<String, Value>,
}

/// Load every `*.json` job file of `dir`, in file name order.
///
/// Unreadable files and invalid records are logged and skipped.
pub fn load_jobs_from_dir(dir: &Path) -> Vec<JobSpec> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!(dir = %dir.display(), error = %e, "Cannot read job config directory");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut jobs = Vec::new();
    for file in &files {
        match load_job_file(file) {
            Ok(loaded) => {
                tracing::info!(file = %file.display(), jobs = loaded.len(), "Loaded job config");
                jobs.extend(loaded);
            }
            Err(e) => tracing::error!(error = %e, "Skipping job config file"),
        }
    }
    jobs
}

/// Load one job file.
pub fn load_job_file(path: &Path) -> Result<Vec<JobSpec>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let source = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    parse_job_file(&source, &text).map_err(|reason| ConfigError::InvalidFile {
        path: path.to_path_buf(),
        reason,
    })
}

/// Parse the contents of a job file. `source` names the file in job names
/// and log lines.
///
/// A file-level problem is returned as the error reason; invalid records are
/// logged and left out of the result.
pub fn parse_job_file(source: &str, text: &str) -> Result<Vec<JobSpec>, String> {
    let file: JobFile = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let global_labels = stringify_labels(file.global_labels);

    let jobs = file
        .scripts
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            parse_job_record(source, index, record, &global_labels)
                .inspect_err(|e| tracing::error!(error = %e, "Skipping job"))
                .ok()
        })
        .collect();
    Ok(jobs)
}

/// Parse one entry of the `scripts` list.
pub fn parse_job_record(
    source: &str,
    index: usize,
    record: Value,
    global_labels: &LabelSet,
) -> Result<JobSpec, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidJob {
        file: source.to_string(),
        index,
        reason,
    };

    let record: JobRecord = serde_json::from_value(record).map_err(|e| invalid(e.to_string()))?;
    let script = record
        .script
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| invalid("missing required field 'script'".to_string()))?;
    let metric = record
        .metric
        .filter(|m| !m.is_empty())
        .ok_or_else(|| invalid("missing required field 'metric'".to_string()))?;
    let interval = match record.interval {
        None => DEFAULT_INTERVAL,
        Some(value) => parse_interval(&value).ok_or_else(|| {
            invalid(format!(
                "invalid interval {value}, expected a positive number of seconds up to {}",
                MAX_INTERVAL.as_secs()
            ))
        })?,
    };
    let labels = merge_labels(global_labels, &stringify_labels(record.labels));

    Ok(JobSpec::builder(script, metric.clone())
        .name(format!("{source}#{index}:{metric}"))
        .args(record.params.iter().map(value_to_string))
        .interval(interval)
        .help(record.help.unwrap_or_else(|| DEFAULT_HELP.to_string()))
        .labels(labels)
        .build())
}

fn parse_interval(value: &Value) -> Option<Duration> {
    let interval = match value {
        Value::Number(n) => n.as_u64().map(Duration::from_secs)?,
        Value::String(s) => TimeUnit::parse_interval(s)?,
        _ => return None,
    };
    (!interval.is_zero() && interval <= MAX_INTERVAL).then_some(interval)
}

fn stringify_labels(labels: BTreeMap<String, Value>) -> LabelSet {
    labels
        .into_iter()
        .map(|(name, value)| {
            let value = value_to_string(&value);
            (name, value)
        })
        .collect()
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

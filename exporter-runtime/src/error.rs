//! Error types for each layer of the runtime.

use std::path::PathBuf;

use thiserror::Error;

use crate::registry::MetricKind;

/// Errors raised while loading settings or job config files.
///
/// File-level and record-level errors are logged and skipped by the loader;
/// only settings errors abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Settings could not be loaded or deserialized.
    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// A job config file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A job config file is not valid JSON or lacks the `scripts` list.
    #[error("{path} is not a valid job config file: {reason}")]
    InvalidFile { path: PathBuf, reason: String },

    /// A job record misses a required field or carries an invalid one.
    #[error("job #{index} in {file}: {reason}")]
    InvalidJob {
        file: String,
        index: usize,
        reason: String,
    },

    /// Unknown log level name.
    #[error("invalid log level '{0}'")]
    LogLevel(String),
}

/// Errors returned by the metric registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A family with this name was already declared with other label names.
    #[error("metric '{name}' already declared with labels {existing:?}, rejected {requested:?}")]
    SchemaConflict {
        name: String,
        existing: Vec<String>,
        requested: Vec<String>,
    },

    /// A family with this name was already declared as another kind.
    #[error("metric '{name}' already declared as {existing}, rejected {requested}")]
    KindConflict {
        name: String,
        existing: MetricKind,
        requested: MetricKind,
    },

    /// A write carried a label key set different from the family's schema.
    #[error("labels {got:?} do not match schema {expected:?} of metric '{name}'")]
    LabelMismatch {
        name: String,
        expected: Vec<String>,
        got: Vec<String>,
    },

    /// Wrong operation for the family kind (e.g. `set` on a counter).
    #[error("metric '{name}' is a {kind}, operation not supported")]
    WrongKind { name: String, kind: MetricKind },

    /// Error from the underlying Prometheus registry (invalid names, collisions).
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Errors from a single job execution.
#[derive(Debug, Error)]
pub enum JobError {
    /// The command has no program to run.
    #[error("empty command")]
    EmptyCommand,

    /// The command could not be started.
    #[error("failed to start command: {0}")]
    Spawn(#[from] std::io::Error),

    /// The command exited unsuccessfully.
    #[error("command exited with {status}: {stderr}")]
    NonZeroExit { status: String, stderr: String },

    /// The command printed something that is neither a number nor a flat mapping.
    #[error("unsupported output: '{0}'")]
    UnsupportedOutput(String),
}

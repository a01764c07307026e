//! Exporter Runtime - Core runtime for the command exporter
//!
//! Schedules external commands on fixed intervals, classifies their output
//! and keeps the resulting gauges and error counters in a [`MetricRegistry`].

mod config;
mod error;
mod job;
mod output;
mod queue;
mod registry;
mod runner;
mod scheduler;
mod time_unit;

// Re-export public API
pub use config::{
    load_job_file, load_jobs_from_dir, parse_job_file, parse_job_record, LogFormat, LogLevel,
    Settings, ENV_PREFIX,
};
pub use error::{ConfigError, JobError, RegistryError};
pub use job::{
    merge_labels, reserve_component_label, JobSpec, JobSpecBuilder, COMPONENT_LABEL,
    DEFAULT_HELP, DEFAULT_INTERVAL, MAIN_COMPONENT, MAX_INTERVAL, MIN_INTERVAL, USER_COMPONENT_LABEL,
};
pub use output::{classify, ParsedValue};
pub use queue::{execution_queue, QueueReceiver, QueueSender};
pub use registry::{text_content_type, Family, LabelSet, MetricKind, MetricRegistry};
pub use runner::{ExecutionResult, JobRunner, RunReport};
pub use scheduler::{Scheduler, SchedulerBuilder, SchedulerHandle};
pub use time_unit::TimeUnit;

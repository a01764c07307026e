//! # Command Exporter
//!
//! Runs external commands on fixed intervals and exports what they print as
//! Prometheus metrics.
//!
//! ## Job configs
//!
//! Every `*.json` file in the config directory (default `configs/`) holds a
//! list of scripts:
//!
//! ```json
//! {
//!   "global_labels": {"env": "prod"},
//!   "scripts": [
//!     {"script": "/usr/local/bin/disk_usage", "params": ["/var"],
//!      "metric": "disk_usage_percent", "interval": 60,
//!      "HELP": "Disk usage per mount", "labels": {"team": "infra"}}
//!   ]
//! }
//! ```
//!
//! A command prints either one number, exported with `component="main"`, or
//! a flat mapping such as `{"sda": 41.5, "sdb": 12}`, exported as one series
//! per key. Failures and unsupported output increment
//! `<metric>_errors_total`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use exporter::{MetricRegistry, SchedulerBuilder, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load(None)?;
//!     let registry = Arc::new(MetricRegistry::with_process_metrics());
//!     let handle = SchedulerBuilder::with_settings(&settings, Arc::clone(&registry))
//!         .build()
//!         .start();
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Settings
//!
//! Read from an optional settings file, then from environment variables with
//! the `EXPORTER__` prefix:
//!
//! ```bash
//! export EXPORTER__METRICS_PORT=9100
//! export EXPORTER__LOG_LEVEL=DEBUG
//! ```

pub mod logging;
pub mod server;

// Re-export core types
pub use exporter_runtime::*;

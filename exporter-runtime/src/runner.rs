//! Runs one job's command and records the outcome.

use std::process::ExitStatus;
use std::sync::Arc;

use tokio::process::Command;

use crate::error::JobError;
use crate::job::{JobSpec, MAIN_COMPONENT};
use crate::output::{classify, ParsedValue};
use crate::registry::{Family, MetricKind, MetricRegistry};

/// Raw outcome of one command execution.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExitStatus,
    /// Standard output, trailing newlines trimmed.
    pub stdout: String,
    pub stderr: String,
}

/// What a single run wrote to the registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Gauge series written (one per accepted component).
    pub gauges_written: usize,
    /// Gauge writes dropped because of a schema or registration conflict.
    pub gauges_rejected: usize,
    /// Whether the error counter was incremented.
    pub failed: bool,
}

/// Executes a job and writes its observations.
///
/// Shared through `Arc` by every run of the job; holds no mutable state, so
/// overlapping runs are safe.
pub struct JobRunner {
    spec: JobSpec,
    registry: Arc<MetricRegistry>,
    errors: Option<Family>,
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("job", &self.spec.name)
            .field("command", &self.spec.command_line())
            .finish_non_exhaustive()
    }
}

impl JobRunner {
    /// Create a runner and declare the job's error counter.
    ///
    /// If the counter name is already taken with another schema the job still
    /// runs; its failures are then only logged.
    pub fn new(spec: JobSpec, registry: Arc<MetricRegistry>) -> Self {
        let errors = registry
            .declare_or_get(
                &spec.error_metric(),
                MetricKind::Counter,
                spec.label_names(),
                &spec.help,
            )
            .inspect_err(|e| {
                tracing::error!(
                    job = %spec.name,
                    error = %e,
                    "Cannot declare error counter, failures of this job will only be logged"
                )
            })
            .ok();

        Self {
            spec,
            registry,
            errors,
        }
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    /// Run the command once and record the result.
    pub async fn run(&self) -> RunReport {
        tracing::debug!(job = %self.spec.name, command = %self.spec.command_line(), "Executing job");
        match self.execute().await {
            Ok(result) => self.record(result),
            Err(e) => self.fail(&e),
        }
    }

    /// Spawn the command and wait for it; no timeout is applied.
    pub async fn execute(&self) -> Result<ExecutionResult, JobError> {
        let argv = self.spec.argv();
        let (program, args) = argv.split_first().ok_or(JobError::EmptyCommand)?;

        let output = Command::new(program)
            .args(args)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout)
            .trim_end_matches('\n')
            .to_string();
        let stderr = String::from_utf8_lossy(&output.stderr)
            .trim_end_matches('\n')
            .to_string();
        tracing::trace!(job = %self.spec.name, status = %output.status, stdout = %stdout, "Command finished");

        Ok(ExecutionResult {
            status: output.status,
            stdout,
            stderr,
        })
    }

    /// Record an execution result: count failures, set gauges on success.
    pub fn record(&self, result: ExecutionResult) -> RunReport {
        if !result.status.success() {
            return self.fail(&JobError::NonZeroExit {
                status: result.status.to_string(),
                stderr: result.stderr,
            });
        }

        match classify(&result.stdout) {
            ParsedValue::Scalar(value) => self.write_gauges([(MAIN_COMPONENT.to_string(), value)]),
            ParsedValue::ComponentMap(values) => self.write_gauges(values),
            ParsedValue::Unsupported => self.fail(&JobError::UnsupportedOutput(result.stdout)),
        }
    }

    fn write_gauges(&self, values: impl IntoIterator<Item = (String, f64)>) -> RunReport {
        let mut report = RunReport::default();

        for (component, value) in values {
            let labels = self.spec.labels_with_component(&component);
            let written = self
                .registry
                .declare_or_get(
                    &self.spec.metric,
                    MetricKind::Gauge,
                    labels.keys(),
                    &self.spec.help,
                )
                .and_then(|gauge| gauge.set(&labels, value));

            match written {
                Ok(()) => report.gauges_written += 1,
                Err(e) => {
                    report.gauges_rejected += 1;
                    tracing::error!(
                        job = %self.spec.name,
                        metric = %self.spec.metric,
                        labels = ?labels,
                        error = %e,
                        "Invalid combination of metric and labels, value dropped"
                    );
                }
            }
        }
        report
    }

    fn fail(&self, error: &JobError) -> RunReport {
        tracing::warn!(
            job = %self.spec.name,
            command = %self.spec.command_line(),
            error = %error,
            "Job run failed"
        );

        if let Some(errors) = &self.errors {
            let labels = self.spec.labels_with_component(MAIN_COMPONENT);
            if let Err(e) = errors.inc(&labels) {
                tracing::error!(job = %self.spec.name, error = %e, "Failed to count job error");
            }
        }

        RunReport {
            failed: true,
            ..RunReport::default()
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::registry::LabelSet;

    fn labels(pairs: &[(&str, &str)]) -> LabelSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn runner(command: &str, args: &[&str], registry: &Arc<MetricRegistry>) -> JobRunner {
        let spec = JobSpec::builder(command, "probe")
            .args(args.iter().copied())
            .label("job", "x")
            .build();
        JobRunner::new(spec, Arc::clone(registry))
    }

    #[tokio::test]
    async fn test_scalar_output_sets_main_gauge() {
        let registry = Arc::new(MetricRegistry::new());
        let report = runner("echo", &["12.5"], &registry).run().await;

        assert_eq!(report.gauges_written, 1);
        let gauge = registry.family("probe").unwrap();
        assert_eq!(
            gauge.value(&labels(&[("job", "x"), ("component", "main")])),
            Some(12.5)
        );
    }

    #[tokio::test]
    async fn test_mapping_output_sets_one_series_per_key() {
        let registry = Arc::new(MetricRegistry::new());
        let report = runner("echo", &[r#"{"a": 1, "b": 2.5}"#], &registry).run().await;

        assert_eq!(report.gauges_written, 2);
        let series = registry.family("probe").unwrap().series();
        assert_eq!(series.len(), 2);
        assert!(series.contains(&(labels(&[("job", "x"), ("component", "a")]), 1.0)));
        assert!(series.contains(&(labels(&[("job", "x"), ("component", "b")]), 2.5)));
    }

    #[tokio::test]
    async fn test_non_zero_exit_counts_error_without_gauge() {
        let registry = Arc::new(MetricRegistry::new());
        let report = runner("false", &[], &registry).run().await;

        assert!(report.failed);
        assert!(registry.family("probe").is_none());
        let errors = registry.family("probe_errors_total").unwrap();
        assert_eq!(errors.series().len(), 1);
        assert_eq!(
            errors.value(&labels(&[("job", "x"), ("component", "main")])),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn test_missing_command_counts_error() {
        let registry = Arc::new(MetricRegistry::new());
        let report = runner("/nonexistent/probe-command", &[], &registry).run().await;

        assert!(report.failed);
        let errors = registry.family("probe_errors_total").unwrap();
        assert_eq!(
            errors.value(&labels(&[("job", "x"), ("component", "main")])),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn test_unsupported_output_keeps_previous_gauge() {
        let registry = Arc::new(MetricRegistry::new());
        runner("echo", &["7"], &registry).run().await;
        let report = runner("echo", &["oops"], &registry).run().await;

        assert!(report.failed);
        let main = labels(&[("job", "x"), ("component", "main")]);
        assert_eq!(registry.family("probe").unwrap().value(&main), Some(7.0));
        assert_eq!(
            registry.family("probe_errors_total").unwrap().value(&main),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn test_schema_conflict_drops_gauge_writes() {
        let registry = Arc::new(MetricRegistry::new());
        registry
            .declare_or_get("probe", MetricKind::Gauge, ["host", "component"], "h")
            .unwrap();

        let report = runner("echo", &[r#"{"a": 1, "b": 2}"#], &registry).run().await;

        assert_eq!(report.gauges_written, 0);
        assert_eq!(report.gauges_rejected, 2);
        assert!(!report.failed);
        assert!(registry.family("probe").unwrap().series().is_empty());
    }
}

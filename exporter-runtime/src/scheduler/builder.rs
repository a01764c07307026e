use super::scheduler::{next_due_after, ScheduledJob, Scheduler};
use crate::config::{load_jobs_from_dir, Settings};
use crate::job::JobSpec;
use crate::registry::MetricRegistry;
use crate::runner::JobRunner;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Default tick resolution of the timing loop.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Builder for the scheduler
pub struct SchedulerBuilder {
    pub(crate) registry: Arc<MetricRegistry>,
    pub(crate) jobs: Vec<JobSpec>,
    pub(crate) tick: Duration,
}

impl SchedulerBuilder {
    /// Create a new scheduler builder without jobs, writing to `registry`
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self {
            registry,
            jobs: Vec::new(),
            tick: DEFAULT_TICK,
        }
    }

    /// Create with the jobs found in the settings' config directory and the
    /// settings' tick resolution
    pub fn with_settings(settings: &Settings, registry: Arc<MetricRegistry>) -> Self {
        info!(dir = %settings.config_dir.display(), "Loading job configs");
        Self {
            registry,
            jobs: load_jobs_from_dir(&settings.config_dir),
            tick: settings.tick(),
        }
    }

    /// Add one job after those already registered
    pub fn job(mut self, job: JobSpec) -> Self {
        self.jobs.push(job);
        self
    }

    /// Add several jobs, keeping their order
    pub fn jobs(mut self, jobs: impl IntoIterator<Item = JobSpec>) -> Self {
        self.jobs.extend(jobs);
        self
    }

    /// Set the tick resolution, never below one millisecond
    pub fn tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self
    }

    /// Build the scheduler (does not start it yet)
    ///
    /// This will:
    /// - Declare every job's error counter in the registry
    /// - Set each job's first due time to now + interval
    /// - Return a `Scheduler` ready to start
    pub fn build(self) -> Scheduler {
        if self.jobs.is_empty() {
            warn!("No valid jobs configured, serving only baseline metrics");
        }

        let now = Instant::now();
        let jobs: Vec<ScheduledJob> = self
            .jobs
            .into_iter()
            .map(|spec| {
                let next_due = next_due_after(now, spec.interval);
                ScheduledJob {
                    runner: Arc::new(JobRunner::new(spec, Arc::clone(&self.registry))),
                    next_due,
                }
            })
            .collect();

        info!(jobs = jobs.len(), tick = ?self.tick, "Building scheduler");

        Scheduler {
            jobs,
            tick: self.tick,
        }
    }
}

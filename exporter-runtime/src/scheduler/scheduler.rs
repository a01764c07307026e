use super::handle::SchedulerHandle;
use crate::job::MAX_INTERVAL;
use crate::queue::{execution_queue, QueueReceiver, QueueSender};
use crate::runner::JobRunner;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// A job with its next due time.
pub(crate) struct ScheduledJob {
    pub(crate) runner: Arc<JobRunner>,
    pub(crate) next_due: Instant,
}

/// Configured scheduler ready to start
/// Holds every job in declaration order with its next due time
pub struct Scheduler {
    pub(crate) jobs: Vec<ScheduledJob>,
    pub(crate) tick: Duration,
}

impl Scheduler {
    /// Number of scheduled jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Tick resolution of the timing loop.
    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Collect the jobs due at `now`, in declaration order, and move each of
    /// them to `now + interval`.
    ///
    /// A job that is late by several intervals is returned once; missed
    /// periods are not caught up.
    pub fn due_jobs(&mut self, now: Instant) -> Vec<Arc<JobRunner>> {
        self.jobs
            .iter_mut()
            .filter(|job| now >= job.next_due)
            .map(|job| {
                job.next_due = next_due_after(now, job.runner.spec().interval);
                Arc::clone(&job.runner)
            })
            .collect()
    }

    /// Push the jobs due at `now` into the execution queue.
    pub fn enqueue_due(&mut self, now: Instant, queue: &QueueSender) -> usize {
        let due = self.due_jobs(now);
        let count = due.len();
        for runner in due {
            tracing::trace!(job = %runner.spec().name, "Job due");
            if !queue.push(runner) {
                tracing::error!("Execution queue closed, job dropped");
            }
        }
        count
    }

    /// Start the timing loop on the current tokio runtime.
    /// Returns a SchedulerHandle that can be used to stop it
    pub fn start(self) -> SchedulerHandle {
        tracing::info!(
            jobs = self.jobs.len(),
            tick = ?self.tick,
            "Starting scheduler"
        );
        for job in &self.jobs {
            let spec = job.runner.spec();
            tracing::info!(
                job = %spec.name,
                metric = %spec.metric,
                interval = ?spec.interval,
                "Job scheduled"
            );
        }

        let loop_handle = tokio::spawn(self.run());
        SchedulerHandle { loop_handle }
    }

    async fn run(mut self) {
        let (sender, mut receiver) = execution_queue();
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Due times follow the tick deadline, not the wakeup time.
            let now = interval.tick().await;
            self.enqueue_due(now, &sender);
            Self::dispatch_all(&mut receiver);
        }
    }

    /// Drain the queue, spawning one independent task per job.
    fn dispatch_all(receiver: &mut QueueReceiver) {
        let jobs = receiver.drain();
        if jobs.is_empty() {
            tracing::trace!("No jobs in the queue right now");
            return;
        }

        for runner in jobs {
            tracing::debug!(job = %runner.spec().name, "Dispatching job");
            tokio::spawn(async move {
                runner.run().await;
            });
        }
    }
}

/// `now + interval`, capped at the longest supported interval.
pub(crate) fn next_due_after(now: Instant, interval: Duration) -> Instant {
    now.checked_add(interval).unwrap_or_else(|| now + MAX_INTERVAL)
}

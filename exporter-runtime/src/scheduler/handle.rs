/// Handle for a running scheduler
/// Used to stop the timing loop
pub struct SchedulerHandle {
    pub(crate) loop_handle: tokio::task::JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the timing loop.
    ///
    /// Job runs already dispatched are independent tasks and keep running
    /// until their command exits.
    pub async fn shutdown(self) {
        self.loop_handle.abort();
        match self.loop_handle.await {
            Err(e) if e.is_panic() => tracing::error!(error = %e, "Scheduler loop panicked"),
            _ => tracing::info!("Scheduler stopped"),
        }
    }

    /// Whether the timing loop has exited.
    pub fn is_finished(&self) -> bool {
        self.loop_handle.is_finished()
    }
}

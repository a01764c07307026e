mod handle;
mod builder;
mod scheduler;

pub use handle::SchedulerHandle;
pub use builder::SchedulerBuilder;
pub use scheduler::Scheduler;

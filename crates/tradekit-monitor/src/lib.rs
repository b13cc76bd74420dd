//! Monitoring scheduler and decision pipeline.

pub mod logging;
pub mod pipeline;
pub mod scheduler;

pub use logging::setup_logging;
pub use pipeline::{AccountContext, Pipeline, PipelineOutcome};
pub use scheduler::{Scheduler, SchedulerHandle};

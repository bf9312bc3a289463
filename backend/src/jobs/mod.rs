// Background Jobs
//
// Two independent periodic ticks drive the engine: run dispatch and SLA
// monitoring. Each tick is serialized against its own re-firing by a
// busy flag; an overlapping firing is dropped, never queued.

pub mod run_dispatch;
pub mod scheduler;

pub use run_dispatch::RunDispatchJob;
pub use scheduler::{PeriodicJob, TickScheduler};

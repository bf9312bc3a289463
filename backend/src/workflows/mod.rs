// Workflow Automation Engine
//
// Turns domain events into deferred, auditable workflow runs: triggers
// enqueue runs, the periodic dispatcher picks up due runs, and the
// executor walks each workflow's ordered actions through the registry.

pub mod actions;
pub mod engine;
pub mod executor;
pub mod triggers;

pub use actions::{ActionHandler, ActionOutcome, ActionRegistry};
pub use engine::{AutomationEngine, BatchOutcome, RUN_BATCH_SIZE};
pub use executor::{RunDisposition, RunExecutor};
pub use triggers::{Trigger, TriggerPayload};

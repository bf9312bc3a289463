// SLA Monitoring
//
// A periodic pass over every active SLA target: each target's breach
// check produces the currently breaching entity set, and the reconciler
// diffs that set against unresolved incidents, opening and resolving
// them to match.

pub mod checks;
pub mod monitor;
pub mod reconciler;

pub use checks::{BreachCheck, BreachCheckRegistry};
pub use monitor::{SlaCheckOutcome, SlaMonitorJob};
pub use reconciler::{IncidentReconciler, ReconcileOutcome};

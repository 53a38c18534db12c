//! Target graph execution infrastructure.
//!
//! - `planner` - Dependency closure and topological ordering
//! - `executor` - Sequential execution with requirement checks and activation gates
//!
//! Pipeline definitions (deploy, release, etc.) declare targets; this module
//! only knows about names, edges, requirements and predicates.

pub mod executor;
pub mod planner;

pub use executor::{execute, execute_resolving, RunReport, RunStatus, RunSummary, TargetResult, TargetStatus};
pub use planner::{ExecutionPlan, PlannedTarget, PlannedTargetStatus};

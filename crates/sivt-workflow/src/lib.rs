//! Reconciliation core for sivt: decides what is safe and necessary to
//! converge recorded state with the declared target, and drives the
//! external actuators to get there.

/// External actuator contracts (cluster lifecycle, packages, nodes, TMC)
pub mod actuator;
/// NSX ALB controller bring-up and cloud configuration
pub mod alb;
/// Deploy workflows for a single cluster
pub mod cluster;
/// Per-invocation context and actuator handles
pub mod context;
/// The generic ensure-deployed pass
pub mod ensure;
/// Versioned extension bundle directories
pub mod extensions;
/// Live cluster health report
pub mod health;
/// Version pre-validation against the support matrix
pub mod prevalidate;
/// Rolling node replacement
pub mod repave;
/// Task names and per-task reports
pub mod task;
/// Task dispatch and workload fan-out
pub mod tier;
/// Tool version checks
pub mod tools;
/// Cluster and extension upgrades
pub mod upgrade;

#[cfg(test)]
mod testutil;

pub use context::{Actuators, RunContext};
pub use ensure::{ensure, Deployable, Outcome};
pub use prevalidate::Decision;
pub use task::{failures, Task, TaskReport};

//! ModuleSet controller for the module lifecycle operator

#![deny(missing_docs)]

/// ModuleSet reconciliation
pub mod controller;
/// Controller construction and result logging
pub mod controller_runner;

pub use controller::{error_policy, reconcile, Context, KubeStatusWriter, StatusWriter};
pub use controller_runner::build_module_set_controller;

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "lifecycle-controller";

/// Condition type reporting whether every module resolved
pub const MODULES_RESOLVED_CONDITION: &str = "ModulesResolved";

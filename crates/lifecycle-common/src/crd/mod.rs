//! Custom Resource Definitions for the lifecycle operator
//!
//! `ModuleSet` is reconciled; `ModuleTemplate` and `ModuleReleaseMeta` form
//! the read-only catalog modules are resolved from.

mod module_release_meta;
mod module_set;
mod module_template;
mod types;

pub use module_release_meta::{
    ChannelVersionAssignment, MandatoryVersion, ModuleReleaseMeta, ModuleReleaseMetaSpec,
};
pub use module_set::{Module, ModuleSet, ModuleSetSpec, ModuleSetStatus};
pub use module_template::{module_template_name, DescriptorRef, ModuleTemplate, ModuleTemplateSpec};
pub use types::{set_condition, Condition, ConditionStatus, ModuleStatus, State, TrackingObject};

/// Serde default helper returning `true`
pub(crate) fn default_true() -> bool {
    true
}

//! Turning resolution outcomes into status

mod aggregate;
mod from_error;
mod generator;

pub use aggregate::determine_state;
pub use from_error::{
    policy_for, status_from_error, StatusPolicy, DEFAULT_STATUS_POLICY, STATUS_POLICIES,
};
pub use generator::{status_from_template, template_reference};

use lifecycle_common::crd::ModuleStatus;

use crate::resolver::ResolvedModule;

/// Next status record for a resolved module
///
/// Declared modules get a record from their template or their error.
///
/// A leftover without a manifest reference has nothing left to clean up
/// and its record is dropped. One still pointing at a manifest keeps its
/// previous record while it resolves; a failure is reported like any other.
pub fn next_module_status(
    resolved: &ResolvedModule,
    previous: Option<&ModuleStatus>,
) -> Option<ModuleStatus> {
    let ResolvedModule { intent, result } = resolved;

    if is_pruned(resolved, previous) {
        return None;
    }
    if let Some(error) = &result.error {
        return Some(status_from_error(
            intent,
            &result.desired_channel,
            error,
            previous,
        ));
    }
    if !intent.enabled {
        return previous.cloned();
    }
    result
        .template
        .as_ref()
        .map(|template| status_from_template(intent, result, template, previous))
}

/// Whether the module's record is removed from status
pub fn is_pruned(resolved: &ResolvedModule, previous: Option<&ModuleStatus>) -> bool {
    !resolved.intent.enabled && previous.map_or(true, |p| p.manifest.is_none())
}

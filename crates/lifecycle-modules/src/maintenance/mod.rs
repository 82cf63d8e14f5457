//! Maintenance window gating of module version changes
//!
//! [`WithMaintenanceWindow`] wraps any [`TemplateInfoLookup`]. When the
//! wrapped lookup picks a template whose installation needs a maintenance
//! window, the result is held back until a window is open.

mod window;

use std::sync::Arc;

use async_trait::async_trait;
use kube::ResourceExt;
use lifecycle_common::crd::{ModuleReleaseMeta, ModuleSet, ModuleTemplate};
use tracing::{info, warn};

#[cfg(test)]
use mockall::automock;

pub use window::{
    MaintenanceError, MaintenanceWindow, Pattern, ResolveOptions, ResolvedWindow, RuleMatch,
    RuntimeInfo, WindowPolicy, WindowResolver, WindowRule, WindowSpec, WindowTime,
    DEFAULT_MIN_WINDOW_MINUTES,
};

use crate::error::LookupError;
use crate::intent::ModuleIntent;
use crate::strategy::{ResolutionResult, TemplateInfoLookup};

/// Policy deciding when version changes may be applied
#[cfg_attr(test, automock)]
pub trait MaintenancePolicy: Send + Sync {
    /// Whether installing the template on the ModuleSet needs a window
    fn is_required(&self, template: &ModuleTemplate, module_set: &ModuleSet) -> bool;

    /// Whether a window is open for the ModuleSet now
    fn is_active(&self, module_set: &ModuleSet) -> Result<bool, MaintenanceError>;
}

/// Lookup decorator holding back changes outside maintenance windows
pub struct WithMaintenanceWindow<L> {
    inner: L,
    policy: Arc<dyn MaintenancePolicy>,
}

impl<L> WithMaintenanceWindow<L> {
    /// Wrap `inner`, consulting `policy` for every resolved template
    pub fn new(inner: L, policy: Arc<dyn MaintenancePolicy>) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<L: TemplateInfoLookup> TemplateInfoLookup for WithMaintenanceWindow<L> {
    fn is_responsible(
        &self,
        intent: &ModuleIntent,
        release_meta: Option<&ModuleReleaseMeta>,
    ) -> bool {
        self.inner.is_responsible(intent, release_meta)
    }

    async fn lookup(
        &self,
        intent: &ModuleIntent,
        module_set: &ModuleSet,
        release_meta: Option<&ModuleReleaseMeta>,
    ) -> ResolutionResult {
        let mut result = self.inner.lookup(intent, module_set, release_meta).await;
        if result.error.is_some() {
            return result;
        }
        let Some(template) = result.template.as_ref() else {
            return result;
        };
        if !self.policy.is_required(template, module_set) {
            return result;
        }

        match self.policy.is_active(module_set) {
            Ok(true) => result,
            Ok(false) => {
                info!(
                    module = %intent.name,
                    module_set = %module_set.name_any(),
                    "version change held until next maintenance window"
                );
                result.fail(LookupError::WaitingForNextMaintenanceWindow);
                result
            }
            Err(e) => {
                warn!(module = %intent.name, error = %e, "maintenance window check failed");
                result.fail(LookupError::MaintenanceWindowIndeterminate {
                    reason: e.to_string(),
                });
                result
            }
        }
    }
}

//! Resolution of every module of a ModuleSet
//!
//! For each intent: fetch release metadata, run the strategy aggregator
//! behind the maintenance decorator, then apply internal/beta gating and the
//! channel-skew check. Modules are independent; one failing never affects
//! the others.

use std::sync::Arc;

use kube::ResourceExt;
use lifecycle_common::crd::{ModuleReleaseMeta, ModuleSet};
use lifecycle_common::ModuleCatalog;
use tracing::{debug, instrument};

use crate::aggregator::StrategyAggregator;
use crate::error::LookupError;
use crate::intent::{extract_intents, ModuleIntent};
use crate::maintenance::{MaintenancePolicy, WithMaintenanceWindow};
use crate::strategy::{desired_channel, ResolutionResult, TemplateInfoLookup};
use crate::validate::{check_channel_skew, validate_template_mode};

/// An intent together with its resolution outcome
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    /// What was asked for
    pub intent: ModuleIntent,
    /// What was found
    pub result: ResolutionResult,
}

/// Resolves the modules of ModuleSets against a catalog
pub struct ModuleResolver {
    catalog: Arc<dyn ModuleCatalog>,
    lookup: WithMaintenanceWindow<StrategyAggregator>,
}

impl ModuleResolver {
    /// Resolver reading from `catalog`, gating version changes with `policy`
    pub fn new(catalog: Arc<dyn ModuleCatalog>, policy: Arc<dyn MaintenancePolicy>) -> Self {
        let lookup =
            WithMaintenanceWindow::new(StrategyAggregator::new(Arc::clone(&catalog)), policy);
        Self { catalog, lookup }
    }

    /// Resolve every declared and tracked module, in intent order
    #[instrument(skip(self, module_set), fields(module_set = %module_set.name_any()))]
    pub async fn resolve_all(&self, module_set: &ModuleSet) -> Vec<ResolvedModule> {
        let intents = extract_intents(&module_set.spec.modules, module_set.tracked_modules());
        let mut resolved = Vec::with_capacity(intents.len());
        for intent in intents {
            let result = self.resolve(&intent, module_set).await;
            resolved.push(ResolvedModule { intent, result });
        }
        resolved
    }

    /// Resolve one intent
    pub async fn resolve(&self, intent: &ModuleIntent, module_set: &ModuleSet) -> ResolutionResult {
        if let Some(err) = &intent.validation_error {
            return ResolutionResult::failed(
                intent.channel.clone().unwrap_or_default(),
                err.clone(),
            );
        }

        let release_meta = match self.release_meta(intent, module_set).await {
            Ok(meta) => meta,
            Err(err) => return ResolutionResult::failed(desired_channel(intent, module_set), err),
        };

        let mut result = self
            .lookup
            .lookup(intent, module_set, release_meta.as_ref())
            .await;
        validate_template_mode(&mut result, module_set, release_meta.as_ref());
        if let Some(tracked) = module_set.module_status(&intent.name) {
            check_channel_skew(&mut result, tracked);
        }

        match &result.error {
            Some(err) => debug!(module = %intent.name, error = %err, "module not resolved"),
            None => debug!(
                module = %intent.name,
                channel = %result.desired_channel,
                template = %result.template.as_ref().map(|t| t.name_any()).unwrap_or_default(),
                "module resolved"
            ),
        }
        result
    }

    async fn release_meta(
        &self,
        intent: &ModuleIntent,
        module_set: &ModuleSet,
    ) -> Result<Option<ModuleReleaseMeta>, LookupError> {
        self.catalog
            .get_release_meta(&module_set.catalog_namespace(), &intent.name)
            .await
            .map_err(|e| LookupError::catalog("failed to get module release meta", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupErrorKind;
    use crate::maintenance::MockMaintenancePolicy;
    use lifecycle_common::crd::{
        Module, ModuleSetSpec, ModuleSetStatus, ModuleStatus, ModuleTemplate, ModuleTemplateSpec,
        TrackingObject,
    };
    use lifecycle_common::CatalogSnapshot;

    fn never_required() -> Arc<dyn MaintenancePolicy> {
        let mut policy = MockMaintenancePolicy::new();
        policy.expect_is_required().returning(|_, _| false);
        Arc::new(policy)
    }

    fn template(name: &str, channel: &str, version: &str) -> ModuleTemplate {
        ModuleTemplate::new(
            name,
            ModuleTemplateSpec {
                module_name: Some(name.split('-').next().unwrap_or(name).to_string()),
                channel: Some(channel.to_string()),
                version: Some(version.to_string()),
                ..Default::default()
            },
        )
    }

    /// Story: one broken module does not prevent its siblings from resolving
    #[tokio::test]
    async fn story_failures_are_isolated_per_module() {
        let catalog = CatalogSnapshot::new()
            .with_template(template("keda-regular", "regular", "1.0.0"))
            .with_template(template("istio-regular", "regular", "1.4.0"));
        let resolver = ModuleResolver::new(Arc::new(catalog), never_required());
        let set = ModuleSet::new(
            "cluster-a",
            ModuleSetSpec {
                modules: vec![
                    Module::new("keda"),
                    Module::new("serverless").with_channel("none"),
                    Module::new("istio"),
                ],
                ..Default::default()
            },
        );

        let resolved = resolver.resolve_all(&set).await;

        assert_eq!(resolved.len(), 3);
        assert!(resolved[0].result.is_ok());
        assert_eq!(
            resolved[1].result.error.as_ref().map(|e| e.kind()),
            Some(LookupErrorKind::Configuration)
        );
        assert!(resolved[2].result.is_ok());
    }

    #[tokio::test]
    async fn test_leftover_without_template_reference_is_not_looked_up() {
        let resolver = ModuleResolver::new(Arc::new(CatalogSnapshot::new()), never_required());
        let mut set = ModuleSet::new("cluster-a", ModuleSetSpec::default());
        set.status = Some(ModuleSetStatus {
            modules: vec![ModuleStatus {
                name: "keda".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });

        let resolved = resolver.resolve_all(&set).await;

        assert_eq!(resolved.len(), 1);
        assert!(!resolved[0].intent.enabled);
        assert!(matches!(
            resolved[0].result.error,
            Some(LookupError::InvalidModuleInStatus { .. })
        ));
    }

    #[tokio::test]
    async fn test_skew_check_uses_tracked_record() {
        let catalog = CatalogSnapshot::new()
            .with_template(template("keda-regular", "regular", "1.0.0"));
        let resolver = ModuleResolver::new(Arc::new(catalog), never_required());
        let mut set = ModuleSet::new(
            "cluster-a",
            ModuleSetSpec {
                modules: vec![Module::new("keda")],
                ..Default::default()
            },
        );
        set.status = Some(ModuleSetStatus {
            modules: vec![ModuleStatus {
                name: "keda".to_string(),
                channel: "fast".to_string(),
                version: "2.0.0".to_string(),
                template: Some(TrackingObject::default()),
                ..Default::default()
            }],
            ..Default::default()
        });

        let resolved = resolver.resolve_all(&set).await;

        assert_eq!(
            resolved[0].result.error.as_ref().map(|e| e.kind()),
            Some(LookupErrorKind::UpdateNotAllowed)
        );
    }

    #[tokio::test]
    async fn test_maintenance_hold_applies_through_resolver() {
        let catalog = CatalogSnapshot::new()
            .with_template(template("keda-regular", "regular", "1.1.0"));
        let mut policy = MockMaintenancePolicy::new();
        policy.expect_is_required().returning(|_, _| true);
        policy.expect_is_active().returning(|_| Ok(false));
        let resolver = ModuleResolver::new(Arc::new(catalog), Arc::new(policy));
        let set = ModuleSet::new(
            "cluster-a",
            ModuleSetSpec {
                modules: vec![Module::new("keda")],
                ..Default::default()
            },
        );

        let result = resolver
            .resolve(&ModuleIntent::declared(&Module::new("keda")), &set)
            .await;

        assert_eq!(
            result.error.map(|e| e.kind()),
            Some(LookupErrorKind::MaintenanceHold)
        );
    }
}

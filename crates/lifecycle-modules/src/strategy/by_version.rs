//! Resolution by exact version when no release metadata exists

use lifecycle_common::crd::ModuleSet;
use lifecycle_common::{ModuleCatalog, NONE_CHANNEL};
use tracing::debug;

use super::{single_candidate, ResolutionResult};
use crate::error::{LookupError, Selector};
use crate::intent::ModuleIntent;

pub(super) async fn lookup(
    catalog: &dyn ModuleCatalog,
    intent: &ModuleIntent,
    module_set: &ModuleSet,
) -> ResolutionResult {
    let module = intent.name.as_str();

    let Some(version) = intent.version.as_deref() else {
        return ResolutionResult::failed(
            NONE_CHANNEL,
            LookupError::InvalidModuleInSpec {
                module: module.to_string(),
                reason: "version missing for a version-pinned module".to_string(),
            },
        );
    };

    let templates = match catalog
        .list_templates(&module_set.catalog_namespace())
        .await
    {
        Ok(templates) => templates,
        Err(e) => {
            return ResolutionResult::failed(
                NONE_CHANNEL,
                LookupError::catalog("failed to list module templates on lookup", e),
            )
        }
    };

    let candidates = templates
        .into_iter()
        .filter(|t| {
            t.matches_module(module) && t.channel() == NONE_CHANNEL && t.version() == Some(version)
        })
        .collect();

    match single_candidate(module, Selector::Version(version.to_string()), candidates) {
        Ok(template) => {
            debug!(module = %module, version = %version, "using pinned version");
            ResolutionResult::resolved(template, NONE_CHANNEL)
        }
        Err(err) => ResolutionResult::failed(NONE_CHANNEL, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupErrorKind;
    use kube::ResourceExt;
    use lifecycle_common::crd::{Module, ModuleSetSpec, ModuleTemplate, ModuleTemplateSpec};
    use lifecycle_common::CatalogSnapshot;

    fn template(name: &str, channel: &str, version: &str) -> ModuleTemplate {
        ModuleTemplate::new(
            name,
            ModuleTemplateSpec {
                module_name: Some("istio".to_string()),
                channel: Some(channel.to_string()),
                version: Some(version.to_string()),
                ..Default::default()
            },
        )
    }

    fn pinned(version: &str) -> ModuleIntent {
        ModuleIntent::declared(&Module::new("istio").with_version(version))
    }

    fn module_set() -> ModuleSet {
        ModuleSet::new("cluster-a", ModuleSetSpec::default())
    }

    #[tokio::test]
    async fn test_exact_version_with_none_channel_is_returned() {
        let catalog = CatalogSnapshot::new()
            .with_template(template("istio-1.4.0", "none", "1.4.0"))
            .with_template(template("istio-1.5.0", "none", "1.5.0"))
            .with_template(template("istio-regular", "regular", "1.4.0"));

        let result = lookup(&catalog, &pinned("1.4.0"), &module_set()).await;

        assert!(result.is_ok(), "{:?}", result.error);
        assert_eq!(result.desired_channel, NONE_CHANNEL);
        assert_eq!(result.template.map(|t| t.name_any()), Some("istio-1.4.0".to_string()));
    }

    #[tokio::test]
    async fn test_channel_templates_are_ignored() {
        let catalog =
            CatalogSnapshot::new().with_template(template("istio-regular", "regular", "1.4.0"));

        let result = lookup(&catalog, &pinned("1.4.0"), &module_set()).await;

        let err = result.error.expect("not found");
        assert_eq!(err.kind(), LookupErrorKind::NotFound);
        assert!(err.to_string().contains("in version 1.4.0"));
    }

    #[tokio::test]
    async fn test_two_templates_for_one_version_are_ambiguous() {
        let catalog = CatalogSnapshot::new()
            .with_template(template("istio-1.4.0", "none", "1.4.0"))
            .with_template(template("istio-1.4.0-copy", "none", "1.4.0"));

        let result = lookup(&catalog, &pinned("1.4.0"), &module_set()).await;

        assert_eq!(
            result.error.map(|e| e.kind()),
            Some(LookupErrorKind::Ambiguous)
        );
    }

    #[tokio::test]
    async fn test_mandatory_version_template_is_rejected() {
        let mut mandatory = template("istio-1.4.0", "none", "1.4.0");
        mandatory.spec.mandatory = true;
        let catalog = CatalogSnapshot::new().with_template(mandatory);

        let result = lookup(&catalog, &pinned("1.4.0"), &module_set()).await;

        let err = result.error.expect("mandatory misuse");
        assert_eq!(
            err.to_string(),
            "template marked as mandatory: for module istio in version 1.4.0"
        );
    }
}

//! ModuleTemplate CRD: one installable blueprint of one module version

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::module_set::label_enabled;
use crate::{BETA_LABEL, INTERNAL_LABEL, MODULE_NAME_LABEL, MODULE_VERSION_ANNOTATION};

/// ModuleTemplate describes one version of a module, addressed either by
/// channel or, with channel `none`, by its exact version.
///
/// Example:
/// ```yaml
/// apiVersion: lifecycle.dev/v1alpha1
/// kind: ModuleTemplate
/// metadata:
///   name: serverless-1.2.0
///   namespace: kcp-system
/// spec:
///   moduleName: serverless
///   version: 1.2.0
///   channel: regular
///   requiresDowntime: false
///   descriptor:
///     componentName: example.io/module/serverless
///     version: 1.2.0
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "lifecycle.dev",
    version = "v1alpha1",
    kind = "ModuleTemplate",
    namespaced,
    shortname = "mt",
    printcolumn = r#"{"name":"Module","type":"string","jsonPath":".spec.moduleName"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Channel","type":"string","jsonPath":".spec.channel"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ModuleTemplateSpec {
    /// Name of the module; legacy templates carry it in a label instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,

    /// Channel the template is published to, or `none` when addressed by version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Semantic version of the module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Installed on every cluster; only reachable through release metadata
    #[serde(default)]
    pub mandatory: bool,

    /// Version changes of this module need a maintenance window
    #[serde(default)]
    pub requires_downtime: bool,

    /// Reference into the component descriptor the module was built from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<DescriptorRef>,
}

/// Component descriptor coordinates of a template
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorRef {
    /// Fully qualified component name
    pub component_name: String,
    /// Component version
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl ModuleTemplate {
    /// Whether this template belongs to the named module
    ///
    /// The explicit `spec.moduleName` wins; otherwise the legacy module-name
    /// label is consulted.
    pub fn matches_module(&self, name: &str) -> bool {
        match self.spec.module_name.as_deref().filter(|n| !n.is_empty()) {
            Some(module_name) => module_name == name,
            None => self
                .labels()
                .get(MODULE_NAME_LABEL)
                .is_some_and(|label| label == name),
        }
    }

    /// Published channel, empty when the template declares none
    pub fn channel(&self) -> &str {
        self.spec.channel.as_deref().unwrap_or_default()
    }

    /// Declared version, falling back to the legacy version annotation
    pub fn version(&self) -> Option<&str> {
        self.spec
            .version
            .as_deref()
            .filter(|v| !v.is_empty())
            .or_else(|| {
                self.annotations()
                    .get(MODULE_VERSION_ANNOTATION)
                    .map(String::as_str)
            })
    }

    /// Whether the template is restricted to internal ModuleSets
    pub fn is_internal(&self) -> bool {
        label_enabled(self.labels(), INTERNAL_LABEL)
    }

    /// Whether the template is restricted to beta ModuleSets
    pub fn is_beta(&self) -> bool {
        label_enabled(self.labels(), BETA_LABEL)
    }

    /// Component name from the descriptor reference, if any
    pub fn component_name(&self) -> Option<&str> {
        self.spec
            .descriptor
            .as_ref()
            .map(|d| d.component_name.as_str())
            .filter(|n| !n.is_empty())
    }
}

/// Object name a module version is published under
pub fn module_template_name(module: &str, version: &str) -> String {
    format!("{module}-{version}")
}

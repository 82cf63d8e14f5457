//! ModuleSet CRD: the modules a managed cluster wants installed
//!
//! A ModuleSet declares modules by channel or by pinned version. The
//! operator resolves each entry to one ModuleTemplate and rolls the
//! per-module outcomes into one lifecycle state.

use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, ModuleStatus, State};
use crate::{BETA_LABEL, ENABLE_LABEL_VALUE, INTERNAL_LABEL};

/// ModuleSet lists the modules one managed cluster should run.
///
/// Example:
/// ```yaml
/// apiVersion: lifecycle.dev/v1alpha1
/// kind: ModuleSet
/// metadata:
///   name: cluster-a
///   namespace: kcp-system
///   labels:
///     lifecycle.dev/region: europe-west1
/// spec:
///   channel: regular
///   modules:
///     - name: serverless
///     - name: keda
///       channel: fast
///     - name: istio
///       version: 1.4.0
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "lifecycle.dev",
    version = "v1alpha1",
    kind = "ModuleSet",
    namespaced,
    shortname = "ms",
    status = "ModuleSetStatus",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Channel","type":"string","jsonPath":".status.activeChannel"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSetSpec {
    /// Channel applied to every module that does not name its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Apply version changes immediately instead of waiting for a maintenance window
    #[serde(default)]
    pub skip_maintenance_windows: bool,

    /// Modules to install
    #[serde(default)]
    pub modules: Vec<Module>,
}

/// One declared module
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    /// Module name, matched against ModuleTemplate `spec.moduleName`
    pub name: String,

    /// Channel to follow; mutually exclusive with `version`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Exact version to pin; mutually exclusive with `channel`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Whether the operator manages the module's lifecycle
    #[serde(default = "super::default_true")]
    pub managed: bool,
}

impl Module {
    /// A managed module following the default channel
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channel: None,
            version: None,
            managed: true,
        }
    }

    /// Follow the given channel
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Pin the given version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// ModuleSet status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSetStatus {
    /// Aggregated lifecycle state
    #[serde(default)]
    pub state: State,

    /// Kubernetes-style conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// One record per module currently tracked
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<ModuleStatus>,

    /// Channel in effect for modules without their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_channel: Option<String>,

    /// Generation of the spec last reconciled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl ModuleSet {
    /// Whether the resource is allowed internal modules
    pub fn is_internal(&self) -> bool {
        label_enabled(self.labels(), INTERNAL_LABEL)
    }

    /// Whether the resource is allowed beta modules
    pub fn is_beta(&self) -> bool {
        label_enabled(self.labels(), BETA_LABEL)
    }

    /// Global channel, if one is set and non-empty
    pub fn channel(&self) -> Option<&str> {
        self.spec.channel.as_deref().filter(|c| !c.is_empty())
    }

    /// Tracked status record for the named module
    pub fn module_status(&self, name: &str) -> Option<&ModuleStatus> {
        self.status
            .as_ref()
            .and_then(|s| s.modules.iter().find(|m| m.name == name))
    }

    /// All tracked status records
    pub fn tracked_modules(&self) -> &[ModuleStatus] {
        self.status
            .as_ref()
            .map(|s| s.modules.as_slice())
            .unwrap_or_default()
    }

    /// Namespace the module catalog is read from
    ///
    /// Templates and release metadata live next to the ModuleSet.
    pub fn catalog_namespace(&self) -> String {
        self.namespace().unwrap_or_else(|| "default".to_string())
    }
}

pub(crate) fn label_enabled(labels: &BTreeMap<String, String>, key: &str) -> bool {
    labels
        .get(key)
        .is_some_and(|v| v.eq_ignore_ascii_case(ENABLE_LABEL_VALUE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> ModuleSet {
        serde_yaml::from_str(yaml).expect("parse ModuleSet")
    }

    /// Story: a cluster owner lists modules by channel and by version
    #[test]
    fn story_modules_declared_by_channel_and_version() {
        let set = parse(
            r#"
apiVersion: lifecycle.dev/v1alpha1
kind: ModuleSet
metadata:
  name: cluster-a
  namespace: kcp-system
spec:
  channel: fast
  modules:
    - name: serverless
    - name: keda
      channel: regular
    - name: istio
      version: 1.4.0
      managed: false
"#,
        );
        assert_eq!(set.channel(), Some("fast"));
        assert!(!set.spec.skip_maintenance_windows);
        assert_eq!(set.spec.modules.len(), 3);
        assert_eq!(set.spec.modules[0], Module::new("serverless"));
        assert_eq!(
            set.spec.modules[1],
            Module::new("keda").with_channel("regular")
        );
        assert_eq!(set.spec.modules[2].version.as_deref(), Some("1.4.0"));
        assert!(!set.spec.modules[2].managed);
        assert_eq!(set.catalog_namespace(), "kcp-system");
    }

    #[test]
    fn test_empty_channel_is_treated_as_unset() {
        let mut set = ModuleSet::new("a", ModuleSetSpec::default());
        set.spec.channel = Some(String::new());
        assert_eq!(set.channel(), None);
    }

    #[test]
    fn test_internal_and_beta_labels() {
        let mut set = ModuleSet::new("a", ModuleSetSpec::default());
        assert!(!set.is_internal());
        assert!(!set.is_beta());

        set.labels_mut()
            .insert(INTERNAL_LABEL.to_string(), "true".to_string());
        set.labels_mut()
            .insert(BETA_LABEL.to_string(), "false".to_string());
        assert!(set.is_internal());
        assert!(!set.is_beta());
    }

    #[test]
    fn test_module_status_lookup() {
        let mut set = ModuleSet::new("a", ModuleSetSpec::default());
        assert!(set.module_status("serverless").is_none());
        assert!(set.tracked_modules().is_empty());

        set.status = Some(ModuleSetStatus {
            modules: vec![ModuleStatus {
                name: "serverless".to_string(),
                version: "1.0.0".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        assert_eq!(
            set.module_status("serverless").map(|m| m.version.as_str()),
            Some("1.0.0")
        );
        assert_eq!(set.tracked_modules().len(), 1);
    }
}

//! ModuleReleaseMeta CRD: per-module channel to version assignments

use std::collections::HashSet;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// ModuleReleaseMeta publishes which version of a module each channel
/// currently serves. When present it is authoritative for the module.
///
/// Example:
/// ```yaml
/// apiVersion: lifecycle.dev/v1alpha1
/// kind: ModuleReleaseMeta
/// metadata:
///   name: serverless
///   namespace: kcp-system
/// spec:
///   moduleName: serverless
///   componentName: example.io/module/serverless
///   channels:
///     - channel: regular
///       version: 1.2.0
///     - channel: fast
///       version: 1.3.0
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "lifecycle.dev",
    version = "v1alpha1",
    kind = "ModuleReleaseMeta",
    namespaced,
    shortname = "mrm",
    printcolumn = r#"{"name":"Module","type":"string","jsonPath":".spec.moduleName"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ModuleReleaseMetaSpec {
    /// Name of the module
    pub module_name: String,

    /// Component the module's templates are built from
    #[serde(default)]
    pub component_name: String,

    /// Channel assignments; each channel appears at most once
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<ChannelVersionAssignment>,

    /// Present when the module is installed on every cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandatory: Option<MandatoryVersion>,

    /// Restricted to beta ModuleSets
    #[serde(default)]
    pub beta: bool,

    /// Restricted to internal ModuleSets
    #[serde(default)]
    pub internal: bool,
}

/// One channel and the version it serves
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ChannelVersionAssignment {
    /// Channel name
    pub channel: String,
    /// Module version served on the channel
    pub version: String,
}

/// Version pointer for a mandatory module
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct MandatoryVersion {
    /// Module version every cluster runs
    pub version: String,
}

impl ModuleReleaseMeta {
    /// Version assigned to the channel, if any
    pub fn channel_version(&self, channel: &str) -> Option<&str> {
        self.spec
            .channels
            .iter()
            .find(|a| a.channel == channel)
            .map(|a| a.version.as_str())
    }

    /// Mandatory version, if the module is mandatory
    pub fn mandatory_version(&self) -> Option<&str> {
        self.spec.mandatory.as_ref().map(|m| m.version.as_str())
    }

    /// Check that every channel is assigned at most once
    pub fn validate(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        for assignment in &self.spec.channels {
            if !seen.insert(assignment.channel.as_str()) {
                return Err(Error::validation_for_field(
                    self.spec.module_name.clone(),
                    "spec.channels",
                    format!(
                        "channel {} is assigned more than once",
                        assignment.channel
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(channels: &[(&str, &str)]) -> ModuleReleaseMeta {
        ModuleReleaseMeta::new(
            "serverless",
            ModuleReleaseMetaSpec {
                module_name: "serverless".to_string(),
                component_name: "example.io/module/serverless".to_string(),
                channels: channels
                    .iter()
                    .map(|(c, v)| ChannelVersionAssignment {
                        channel: c.to_string(),
                        version: v.to_string(),
                    })
                    .collect(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_channel_version_lookup() {
        let m = meta(&[("regular", "1.2.0"), ("fast", "1.3.0")]);
        assert_eq!(m.channel_version("fast"), Some("1.3.0"));
        assert_eq!(m.channel_version("experimental"), None);
        assert!(m.validate().is_ok());
    }

    #[test]
    fn test_duplicate_channel_is_invalid() {
        let m = meta(&[("regular", "1.2.0"), ("regular", "1.3.0")]);
        let err = m.validate().unwrap_err();
        assert!(err.to_string().contains("regular"));
        match err {
            Error::Validation { resource, .. } => assert_eq!(resource, "serverless"),
            _ => panic!("Expected Validation variant"),
        }
    }

    #[test]
    fn test_mandatory_version_from_yaml() {
        let m: ModuleReleaseMeta = serde_yaml::from_str(
            r#"
apiVersion: lifecycle.dev/v1alpha1
kind: ModuleReleaseMeta
metadata:
  name: istio
spec:
  moduleName: istio
  componentName: example.io/module/istio
  mandatory:
    version: 1.4.0
  internal: true
"#,
        )
        .expect("parse ModuleReleaseMeta");
        assert_eq!(m.mandatory_version(), Some("1.4.0"));
        assert!(m.spec.channels.is_empty());
        assert!(m.spec.internal);
        assert!(!m.spec.beta);
    }
}

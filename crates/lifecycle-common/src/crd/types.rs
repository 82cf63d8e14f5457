//! Shared status types used across the lifecycle CRDs

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a ModuleSet or of one module within it
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum State {
    /// Everything requested is installed and healthy
    Ready,
    /// Work is in progress (install, upgrade, or waiting on a hold)
    #[default]
    Processing,
    /// Operating, but something needs attention
    Warning,
    /// Resolution or installation failed
    Error,
    /// The owning resource is being removed
    Deleting,
    /// The module is declared but not managed by the operator
    Unmanaged,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::Processing => write!(f, "Processing"),
            Self::Warning => write!(f, "Warning"),
            Self::Error => write!(f, "Error"),
            Self::Deleting => write!(f, "Deleting"),
            Self::Unmanaged => write!(f, "Unmanaged"),
        }
    }
}

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., ModulesResolved)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// Whether the condition currently holds
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Insert or replace the condition with the same type
///
/// The previous transition time is kept when the status did not change.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time;
            }
            *existing = condition;
        }
        None => conditions.push(condition),
    }
}

/// Reference to an object the operator tracks for a module
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackingObject {
    /// API version of the referenced object
    pub api_version: String,
    /// Kind of the referenced object
    pub kind: String,
    /// Name of the referenced object
    pub name: String,
    /// Namespace of the referenced object
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Generation observed when the reference was recorded
    #[serde(default)]
    pub generation: i64,
}

/// Per-module status record kept in the ModuleSet status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleStatus {
    /// Module name
    pub name: String,

    /// Fully qualified domain name of the module's component
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fqdn: String,

    /// Channel the module was resolved from, or "none" when pinned by version
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub channel: String,

    /// Installed or targeted module version
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Human-readable message about the last resolution
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Lifecycle state of this module
    #[serde(default)]
    pub state: State,

    /// The rendered manifest object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<TrackingObject>,

    /// The module's default custom resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<TrackingObject>,

    /// The ModuleTemplate the module was resolved from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TrackingObject>,

    /// Whether a version change is held until the next maintenance window
    #[serde(default)]
    pub maintenance: bool,
}

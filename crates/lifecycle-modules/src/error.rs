//! Per-module resolution errors
//!
//! A [`LookupError`] never aborts a reconcile: it is attached to the module's
//! resolution result and turned into a status record. [`LookupErrorKind`]
//! is the coarse classification the status table keys on.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// How a template was searched for, used in not-found and mandatory messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Looked up by channel
    Channel(String),
    /// Looked up by exact version
    Version(String),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Channel(c) => write!(f, "channel {c}"),
            Selector::Version(v) => write!(f, "version {v}"),
        }
    }
}

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupErrorKind {
    /// Declared or tracked module entry is malformed
    Configuration,
    /// No template matched
    NotFound,
    /// More than one template matched
    Ambiguous,
    /// A mandatory template was reached outside release metadata
    MandatoryMisuse,
    /// Internal or beta gating refused the template
    NotAllowed,
    /// Channel skew would downgrade the module
    UpdateNotAllowed,
    /// Version change deferred to the next maintenance window
    MaintenanceHold,
    /// Whether a maintenance window is active could not be determined
    MaintenanceIndeterminate,
    /// No lookup strategy claimed the module
    NoStrategy,
    /// Catalog read failed
    Transport,
}

impl LookupErrorKind {
    /// Whether the module keeps working and only a pending change waits
    pub fn is_deferral(self) -> bool {
        matches!(self, Self::MaintenanceHold | Self::UpdateNotAllowed)
    }
}

/// Error resolving one module
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    /// Declared module entry is invalid
    #[error("invalid configuration in spec.modules for module {module}: {reason}")]
    InvalidModuleInSpec {
        /// Module name
        module: String,
        /// What is wrong with the entry
        reason: String,
    },

    /// Tracked module entry is invalid
    #[error("invalid module entry in status for module {module}: {reason}")]
    InvalidModuleInStatus {
        /// Module name
        module: String,
        /// What is wrong with the entry
        reason: String,
    },

    /// Release metadata of the module is unusable
    #[error("invalid module release meta for module {module}: {reason}")]
    InvalidReleaseMeta {
        /// Module name
        module: String,
        /// What is wrong with the metadata
        reason: String,
    },

    /// Zero candidates matched
    #[error("no templates were found: for module {module} in {selector}")]
    NoTemplatesFound {
        /// Module name
        module: String,
        /// Channel or version searched for
        selector: Selector,
    },

    /// A template addressed by name does not exist
    #[error("failed to get module template: {name} not found")]
    TemplateNotFound {
        /// Object name looked up
        name: String,
    },

    /// Several candidates matched
    #[error(
        "no unique template could be identified: more than one module template found for module: {module}, candidates: [{}]",
        .candidates.join(" ")
    )]
    TemplateNotIdentified {
        /// Module name
        module: String,
        /// Names of every matching template
        candidates: Vec<String>,
    },

    /// The only candidate is mandatory
    #[error("template marked as mandatory: for module {module} in {selector}")]
    TemplateMarkedAsMandatory {
        /// Module name
        module: String,
        /// Channel or version searched for
        selector: Selector,
    },

    /// The candidate declares no channel
    #[error("specifying no default channel is not allowed: no channel found on template for module: {module}")]
    TemplateWithoutChannel {
        /// Module name
        module: String,
    },

    /// Release metadata has no channel table
    #[error("no channels found in module release meta for module {module}")]
    ChannelsMissing {
        /// Module name
        module: String,
    },

    /// Release metadata does not assign the desired channel
    #[error("no version assigned to channel {channel} in module release meta for module {module}")]
    ChannelNotAssigned {
        /// Module name
        module: String,
        /// Desired channel
        channel: String,
    },

    /// Release metadata carries no component name
    #[error("module release meta for module {module} has an empty component name")]
    InvalidComponentName {
        /// Module name
        module: String,
    },

    /// A version string is not semver
    #[error("invalid version {value:?}: {reason}")]
    InvalidVersion {
        /// The offending input
        value: String,
        /// Parser message
        reason: String,
    },

    /// Internal or beta gating refused the template
    #[error("module template not allowed: {reason}")]
    TemplateNotAllowed {
        /// Which gate refused
        reason: String,
    },

    /// Channel skew would move the module backwards
    #[error("module template update not allowed: {reason}")]
    TemplateUpdateNotAllowed {
        /// Why the update was refused
        reason: String,
    },

    /// Version change deferred to the next maintenance window
    #[error("waiting for next maintenance window to update module version")]
    WaitingForNextMaintenanceWindow,

    /// Maintenance policy could not answer
    #[error("failed to determine if maintenance window is active: {reason}")]
    MaintenanceWindowIndeterminate {
        /// Policy failure
        reason: String,
    },

    /// No strategy claimed the module
    #[error("no lookup strategy is responsible for module {module}")]
    NoResponsibleStrategy {
        /// Module name
        module: String,
    },

    /// Catalog read failed
    #[error("{context}: {source}")]
    Catalog {
        /// What was being read
        context: String,
        /// Underlying error
        source: Arc<lifecycle_common::Error>,
    },
}

impl LookupError {
    /// Wrap a catalog failure with what was being read
    pub fn catalog(context: impl Into<String>, source: lifecycle_common::Error) -> Self {
        Self::Catalog {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// Classification used by the status table
    pub fn kind(&self) -> LookupErrorKind {
        match self {
            Self::InvalidModuleInSpec { .. }
            | Self::InvalidModuleInStatus { .. }
            | Self::InvalidReleaseMeta { .. }
            | Self::TemplateWithoutChannel { .. }
            | Self::ChannelsMissing { .. }
            | Self::InvalidComponentName { .. }
            | Self::InvalidVersion { .. } => LookupErrorKind::Configuration,
            Self::NoTemplatesFound { .. }
            | Self::TemplateNotFound { .. }
            | Self::ChannelNotAssigned { .. } => LookupErrorKind::NotFound,
            Self::TemplateNotIdentified { .. } => LookupErrorKind::Ambiguous,
            Self::TemplateMarkedAsMandatory { .. } => LookupErrorKind::MandatoryMisuse,
            Self::TemplateNotAllowed { .. } => LookupErrorKind::NotAllowed,
            Self::TemplateUpdateNotAllowed { .. } => LookupErrorKind::UpdateNotAllowed,
            Self::WaitingForNextMaintenanceWindow => LookupErrorKind::MaintenanceHold,
            Self::MaintenanceWindowIndeterminate { .. } => {
                LookupErrorKind::MaintenanceIndeterminate
            }
            Self::NoResponsibleStrategy { .. } => LookupErrorKind::NoStrategy,
            Self::Catalog { .. } => LookupErrorKind::Transport,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_module_and_channel() {
        let err = LookupError::NoTemplatesFound {
            module: "serverless".to_string(),
            selector: Selector::Channel("fast".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "no templates were found: for module serverless in channel fast"
        );
        assert_eq!(err.kind(), LookupErrorKind::NotFound);
    }

    #[test]
    fn test_not_found_names_version() {
        let err = LookupError::NoTemplatesFound {
            module: "istio".to_string(),
            selector: Selector::Version("1.4.0".to_string()),
        };
        assert!(err.to_string().ends_with("for module istio in version 1.4.0"));
    }

    /// Story: an operator reading the status sees every duplicate template
    /// so they know which one to delete.
    #[test]
    fn story_ambiguity_lists_every_candidate() {
        let err = LookupError::TemplateNotIdentified {
            module: "keda".to_string(),
            candidates: vec!["keda-a".to_string(), "keda-b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "no unique template could be identified: more than one module template found for module: keda, candidates: [keda-a keda-b]"
        );
        assert_eq!(err.kind(), LookupErrorKind::Ambiguous);
    }

    #[test]
    fn test_catalog_error_keeps_context_and_source() {
        let err = LookupError::catalog(
            "failed to list module templates on lookup",
            lifecycle_common::Error::internal("connection reset"),
        );
        assert!(err
            .to_string()
            .starts_with("failed to list module templates on lookup: "));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.kind(), LookupErrorKind::Transport);
        // Clone shares the source
        let cloned = err.clone();
        assert_eq!(cloned.to_string(), err.to_string());
    }

    #[test]
    fn test_maintenance_kinds() {
        assert_eq!(
            LookupError::WaitingForNextMaintenanceWindow.kind(),
            LookupErrorKind::MaintenanceHold
        );
        let err = LookupError::MaintenanceWindowIndeterminate {
            reason: "no maintenance window policy configured".to_string(),
        };
        assert_eq!(err.kind(), LookupErrorKind::MaintenanceIndeterminate);
        assert!(err.to_string().contains("no maintenance window policy configured"));
    }

    #[test]
    fn test_only_holds_and_refused_updates_are_deferrals() {
        assert!(LookupErrorKind::MaintenanceHold.is_deferral());
        assert!(LookupErrorKind::UpdateNotAllowed.is_deferral());
        assert!(!LookupErrorKind::MaintenanceIndeterminate.is_deferral());
        assert!(!LookupErrorKind::NotFound.is_deferral());
        assert!(!LookupErrorKind::Configuration.is_deferral());
    }
}

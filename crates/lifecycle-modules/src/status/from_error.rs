//! Module status records for failed resolutions
//!
//! How a failure is reported depends on its kind: some failures replace the
//! record, others keep the last good record and only annotate it.

use lifecycle_common::crd::{ModuleStatus, State};

use crate::error::{LookupError, LookupErrorKind};
use crate::intent::ModuleIntent;

/// How one error kind is written to status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPolicy {
    /// Keep the previous record and only annotate it
    pub preserve: bool,
    /// State forced onto a preserved record; `None` keeps its state
    pub state: Option<State>,
    /// State of a record built from scratch
    pub fresh_state: State,
    /// Value of the maintenance flag
    pub maintenance: bool,
}

/// Policy for kinds not listed in [`STATUS_POLICIES`]
pub const DEFAULT_STATUS_POLICY: StatusPolicy = StatusPolicy {
    preserve: true,
    state: Some(State::Error),
    fresh_state: State::Error,
    maintenance: false,
};

/// Status policy per error kind
pub const STATUS_POLICIES: &[(LookupErrorKind, StatusPolicy)] = &[
    (
        LookupErrorKind::MaintenanceHold,
        StatusPolicy {
            preserve: true,
            state: None,
            fresh_state: State::Processing,
            maintenance: true,
        },
    ),
    (
        LookupErrorKind::MaintenanceIndeterminate,
        StatusPolicy {
            preserve: true,
            state: Some(State::Error),
            fresh_state: State::Error,
            maintenance: false,
        },
    ),
    (
        LookupErrorKind::UpdateNotAllowed,
        StatusPolicy {
            preserve: true,
            state: Some(State::Warning),
            fresh_state: State::Warning,
            maintenance: false,
        },
    ),
    (
        LookupErrorKind::NotFound,
        StatusPolicy {
            preserve: false,
            state: Some(State::Error),
            fresh_state: State::Error,
            maintenance: false,
        },
    ),
];

/// Look up the policy for an error kind
pub fn policy_for(kind: LookupErrorKind) -> StatusPolicy {
    STATUS_POLICIES
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, policy)| *policy)
        .unwrap_or(DEFAULT_STATUS_POLICY)
}

/// Status record for a module whose resolution failed
pub fn status_from_error(
    intent: &ModuleIntent,
    desired_channel: &str,
    error: &LookupError,
    previous: Option<&ModuleStatus>,
) -> ModuleStatus {
    let policy = policy_for(error.kind());
    let message = error.to_string();

    match previous {
        Some(prev) if policy.preserve => {
            let mut status = prev.clone();
            status.message = message;
            if let Some(state) = policy.state {
                status.state = state;
            }
            status.maintenance = policy.maintenance;
            status
        }
        _ => ModuleStatus {
            name: intent.name.clone(),
            fqdn: previous
                .map(|p| p.fqdn.clone())
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| intent.name.clone()),
            channel: desired_channel.to_string(),
            message,
            state: policy.fresh_state,
            maintenance: policy.maintenance,
            ..Default::default()
        },
    }
}

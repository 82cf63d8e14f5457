//! Module intents: what the ModuleSet asks for, one entry per module name
//!
//! Intents are rebuilt on every pass from the declared modules and the
//! modules still tracked in status. A tracked module no longer declared is a
//! leftover: it is disabled but still resolved so its record can be kept.

use std::collections::HashSet;

use lifecycle_common::crd::{Module, ModuleStatus};
use lifecycle_common::NONE_CHANNEL;

use crate::error::LookupError;

/// Normalized request for one module
#[derive(Debug, Clone)]
pub struct ModuleIntent {
    /// Module name
    pub name: String,
    /// Requested channel, `None` when unset or empty
    pub channel: Option<String>,
    /// Requested version, `None` when unset or empty
    pub version: Option<String>,
    /// Declared in spec (false for tracked-only leftovers)
    pub enabled: bool,
    /// Whether the operator manages the module
    pub managed: bool,
    /// Configuration problem found while extracting; resolution is skipped
    pub validation_error: Option<LookupError>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

impl ModuleIntent {
    /// Intent for a declared module
    pub fn declared(module: &Module) -> Self {
        let channel = non_empty(module.channel.as_deref());
        let version = non_empty(module.version.as_deref());

        let validation_error = if channel.as_deref() == Some(NONE_CHANNEL) {
            Some(LookupError::InvalidModuleInSpec {
                module: module.name.clone(),
                reason: format!("channel \"{NONE_CHANNEL}\" is not allowed"),
            })
        } else if channel.is_some() && version.is_some() {
            Some(LookupError::InvalidModuleInSpec {
                module: module.name.clone(),
                reason: "version and channel are mutually exclusive options".to_string(),
            })
        } else {
            None
        };

        Self {
            name: module.name.clone(),
            channel,
            version,
            enabled: true,
            managed: module.managed,
            validation_error,
        }
    }

    /// Intent for a module only found in status
    pub fn leftover(status: &ModuleStatus) -> Self {
        let validation_error = status.template.is_none().then(|| {
            LookupError::InvalidModuleInStatus {
                module: status.name.clone(),
                reason: "template reference missing".to_string(),
            }
        });

        Self {
            name: status.name.clone(),
            channel: non_empty(Some(status.channel.as_str())),
            version: non_empty(Some(status.version.as_str())),
            enabled: false,
            managed: true,
            validation_error,
        }
    }

    /// Whether the module is addressed by exact version rather than channel
    ///
    /// True for a declared module with a version and no channel, and for a
    /// leftover recorded with the `none` channel and a version.
    pub fn is_installed_by_version(&self) -> bool {
        let configured_with_version =
            self.enabled && self.version.is_some() && self.channel.is_none();
        let installed_with_version = !self.enabled
            && self.channel.as_deref() == Some(NONE_CHANNEL)
            && self.version.is_some();
        configured_with_version || installed_with_version
    }
}

/// Build one intent per distinct module name
///
/// Declared modules come first in declaration order; the first declaration
/// of a name wins. Tracked modules not declared follow in status order.
pub fn extract_intents(declared: &[Module], tracked: &[ModuleStatus]) -> Vec<ModuleIntent> {
    let mut seen = HashSet::new();
    let mut intents = Vec::with_capacity(declared.len() + tracked.len());

    for module in declared {
        if seen.insert(module.name.as_str()) {
            intents.push(ModuleIntent::declared(module));
        }
    }
    for status in tracked {
        if seen.insert(status.name.as_str()) {
            intents.push(ModuleIntent::leftover(status));
        }
    }

    intents
}

//! Template lookup strategies
//!
//! A module is resolved by exactly one of three strategies, tried in a fixed
//! order:
//!
//! 1. [`LookupStrategy::ByModuleReleaseMeta`] when release metadata exists
//! 2. [`LookupStrategy::ByChannel`] when the module follows a channel
//! 3. [`LookupStrategy::ByVersion`] when the module is pinned by version
//!
//! [`TemplateInfoLookup`] is the seam the maintenance decorator wraps.

mod by_channel;
mod by_release_meta;
mod by_version;

use async_trait::async_trait;
use kube::ResourceExt;
use lifecycle_common::crd::{ModuleReleaseMeta, ModuleSet, ModuleTemplate};
use lifecycle_common::{ModuleCatalog, DEFAULT_CHANNEL};

use crate::error::{LookupError, Selector};
use crate::intent::ModuleIntent;

/// Component a resolved template was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentIdentity {
    /// Fully qualified component name
    pub name: String,
    /// Component version
    pub version: String,
}

/// Outcome of resolving one module
///
/// When `error` is set, `template` and `component` are always `None`.
#[derive(Debug, Clone, Default)]
pub struct ResolutionResult {
    /// The chosen template
    pub template: Option<ModuleTemplate>,
    /// Channel the module was resolved against, `none` for version pins
    pub desired_channel: String,
    /// Component identity, set by the release metadata path
    pub component: Option<ComponentIdentity>,
    /// Why resolution failed
    pub error: Option<LookupError>,
}

impl ResolutionResult {
    /// A successful resolution
    pub fn resolved(template: ModuleTemplate, desired_channel: impl Into<String>) -> Self {
        Self {
            template: Some(template),
            desired_channel: desired_channel.into(),
            component: None,
            error: None,
        }
    }

    /// A failed resolution
    pub fn failed(desired_channel: impl Into<String>, error: LookupError) -> Self {
        Self {
            template: None,
            desired_channel: desired_channel.into(),
            component: None,
            error: Some(error),
        }
    }

    /// Attach the component identity
    pub fn with_component(mut self, component: ComponentIdentity) -> Self {
        self.component = Some(component);
        self
    }

    /// Mark the result failed, discarding template and component
    pub fn fail(&mut self, error: LookupError) {
        self.template = None;
        self.component = None;
        self.error = Some(error);
    }

    /// Whether a template was chosen
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.template.is_some()
    }
}

/// Something that can resolve a module intent to a template
#[async_trait]
pub trait TemplateInfoLookup: Send + Sync {
    /// Whether this lookup handles the intent
    fn is_responsible(&self, intent: &ModuleIntent, release_meta: Option<&ModuleReleaseMeta>)
        -> bool;

    /// Resolve the intent
    async fn lookup(
        &self,
        intent: &ModuleIntent,
        module_set: &ModuleSet,
        release_meta: Option<&ModuleReleaseMeta>,
    ) -> ResolutionResult;
}

/// The closed set of lookup strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    /// Resolve through the module's release metadata
    ByModuleReleaseMeta,
    /// Resolve by listing templates published to the desired channel
    ByChannel,
    /// Resolve by listing templates published with the exact version
    ByVersion,
}

impl LookupStrategy {
    /// Evaluation order
    pub const ORDERED: [LookupStrategy; 3] = [
        LookupStrategy::ByModuleReleaseMeta,
        LookupStrategy::ByChannel,
        LookupStrategy::ByVersion,
    ];

    /// Whether this strategy handles the intent
    pub fn is_responsible(
        self,
        intent: &ModuleIntent,
        release_meta: Option<&ModuleReleaseMeta>,
    ) -> bool {
        match self {
            Self::ByModuleReleaseMeta => release_meta.is_some(),
            Self::ByChannel => release_meta.is_none() && !intent.is_installed_by_version(),
            Self::ByVersion => release_meta.is_none() && intent.is_installed_by_version(),
        }
    }

    /// Resolve the intent with this strategy
    pub async fn lookup(
        self,
        catalog: &dyn ModuleCatalog,
        intent: &ModuleIntent,
        module_set: &ModuleSet,
        release_meta: Option<&ModuleReleaseMeta>,
    ) -> ResolutionResult {
        match (self, release_meta) {
            (Self::ByModuleReleaseMeta, Some(meta)) => {
                by_release_meta::lookup(catalog, intent, module_set, meta).await
            }
            (Self::ByModuleReleaseMeta, None) => ResolutionResult::failed(
                desired_channel(intent, module_set),
                LookupError::NoResponsibleStrategy {
                    module: intent.name.clone(),
                },
            ),
            (Self::ByChannel, _) => by_channel::lookup(catalog, intent, module_set).await,
            (Self::ByVersion, _) => by_version::lookup(catalog, intent, module_set).await,
        }
    }
}

/// Channel a module resolves against
///
/// The module's own channel, else the ModuleSet's, else `regular`.
pub fn desired_channel(intent: &ModuleIntent, module_set: &ModuleSet) -> String {
    intent
        .channel
        .as_deref()
        .or_else(|| module_set.channel())
        .unwrap_or(DEFAULT_CHANNEL)
        .to_string()
}

/// Reduce filtered candidates to the single template
///
/// Zero is not-found, several is ambiguous, and a mandatory survivor is
/// rejected: mandatory templates are only reachable through release metadata.
pub(crate) fn single_candidate(
    module: &str,
    selector: Selector,
    mut candidates: Vec<ModuleTemplate>,
) -> Result<ModuleTemplate, LookupError> {
    if candidates.len() > 1 {
        return Err(LookupError::TemplateNotIdentified {
            module: module.to_string(),
            candidates: candidates.iter().map(|t| t.name_any()).collect(),
        });
    }
    let Some(template) = candidates.pop() else {
        return Err(LookupError::NoTemplatesFound {
            module: module.to_string(),
            selector,
        });
    };
    if template.spec.mandatory {
        return Err(LookupError::TemplateMarkedAsMandatory {
            module: module.to_string(),
            selector,
        });
    }
    Ok(template)
}

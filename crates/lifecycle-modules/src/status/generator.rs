//! Module status records for successful resolutions

use kube::{Resource, ResourceExt};
use lifecycle_common::crd::{ModuleStatus, ModuleTemplate, State, TrackingObject};

use crate::intent::ModuleIntent;
use crate::strategy::ResolutionResult;

/// Tracking reference to a template
pub fn template_reference(template: &ModuleTemplate) -> TrackingObject {
    TrackingObject {
        api_version: ModuleTemplate::api_version(&()).to_string(),
        kind: ModuleTemplate::kind(&()).to_string(),
        name: template.name_any(),
        namespace: template.namespace().unwrap_or_default(),
        generation: template.metadata.generation.unwrap_or_default(),
    }
}

/// Status record for a module resolved to `template`
///
/// Manifest and resource references of the previous record carry over. Its
/// state carries over too when the version did not change and the record
/// was not reporting a failure; otherwise the module is Processing.
pub fn status_from_template(
    intent: &ModuleIntent,
    result: &ResolutionResult,
    template: &ModuleTemplate,
    previous: Option<&ModuleStatus>,
) -> ModuleStatus {
    let version = template.version().unwrap_or_default().to_string();
    let fqdn = result
        .component
        .as_ref()
        .map(|c| c.name.clone())
        .or_else(|| template.component_name().map(str::to_string))
        .unwrap_or_else(|| intent.name.clone());

    let mut status = ModuleStatus {
        name: intent.name.clone(),
        fqdn,
        channel: result.desired_channel.clone(),
        version,
        ..Default::default()
    };

    if !intent.managed {
        status.state = State::Unmanaged;
        return status;
    }

    status.template = Some(template_reference(template));
    status.state = match previous {
        Some(prev)
            if prev.version == status.version
                && prev.message.is_empty()
                && prev.state != State::Unmanaged =>
        {
            prev.state
        }
        _ => State::Processing,
    };
    if let Some(prev) = previous {
        status.manifest = prev.manifest.clone();
        status.resource = prev.resource.clone();
    }
    status
}

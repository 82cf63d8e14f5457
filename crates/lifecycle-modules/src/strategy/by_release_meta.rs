//! Resolution through ModuleReleaseMeta
//!
//! The metadata names the version to install, either the mandatory version
//! or the version assigned to the desired channel. The template is then
//! fetched by its published name.

use lifecycle_common::crd::{module_template_name, ModuleReleaseMeta, ModuleSet};
use lifecycle_common::{ModuleCatalog, NONE_CHANNEL};
use tracing::debug;

use super::{desired_channel, ComponentIdentity, ResolutionResult};
use crate::error::LookupError;
use crate::intent::ModuleIntent;
use crate::validate::parse_version;

pub(super) async fn lookup(
    catalog: &dyn ModuleCatalog,
    intent: &ModuleIntent,
    module_set: &ModuleSet,
    meta: &ModuleReleaseMeta,
) -> ResolutionResult {
    let module = intent.name.as_str();

    let (channel, version) = match target_version(intent, module_set, meta) {
        Ok(target) => target,
        Err((channel, err)) => return ResolutionResult::failed(channel, err),
    };

    if meta.spec.component_name.is_empty() {
        return ResolutionResult::failed(
            channel,
            LookupError::InvalidComponentName {
                module: module.to_string(),
            },
        );
    }

    let name = module_template_name(module, &version);
    debug!(
        module = %module,
        channel = %channel,
        template = %name,
        "resolving via module release meta"
    );

    match catalog
        .get_template(&module_set.catalog_namespace(), &name)
        .await
    {
        Ok(Some(template)) => ResolutionResult::resolved(template, channel).with_component(
            ComponentIdentity {
                name: meta.spec.component_name.clone(),
                version,
            },
        ),
        Ok(None) => ResolutionResult::failed(channel, LookupError::TemplateNotFound { name }),
        Err(e) => ResolutionResult::failed(
            channel,
            LookupError::catalog("failed to get module template", e),
        ),
    }
}

/// Desired channel and the version the metadata assigns to it
fn target_version(
    intent: &ModuleIntent,
    module_set: &ModuleSet,
    meta: &ModuleReleaseMeta,
) -> Result<(String, String), (String, LookupError)> {
    let module = intent.name.clone();

    if let Some(mandatory) = meta.mandatory_version() {
        let channel = NONE_CHANNEL.to_string();
        return match parse_version(mandatory) {
            Ok(_) => Ok((channel, mandatory.to_string())),
            Err(e) => Err((
                channel,
                LookupError::InvalidReleaseMeta {
                    module,
                    reason: format!("mandatory version: {e}"),
                },
            )),
        };
    }

    let channel = desired_channel(intent, module_set);
    if let Err(e) = meta.validate() {
        return Err((
            channel,
            LookupError::InvalidReleaseMeta {
                module,
                reason: e.to_string(),
            },
        ));
    }
    if meta.spec.channels.is_empty() {
        return Err((channel, LookupError::ChannelsMissing { module }));
    }
    match meta.channel_version(&channel) {
        Some(version) => {
            let version = version.to_string();
            Ok((channel, version))
        }
        None => {
            let err = LookupError::ChannelNotAssigned {
                module,
                channel: channel.clone(),
            };
            Err((channel, err))
        }
    }
}

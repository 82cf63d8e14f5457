//! Resolution by channel when no release metadata exists

use lifecycle_common::crd::ModuleSet;
use lifecycle_common::ModuleCatalog;
use tracing::debug;

use super::{desired_channel, single_candidate, ResolutionResult};
use crate::error::{LookupError, Selector};
use crate::intent::ModuleIntent;

pub(super) async fn lookup(
    catalog: &dyn ModuleCatalog,
    intent: &ModuleIntent,
    module_set: &ModuleSet,
) -> ResolutionResult {
    let module = intent.name.as_str();
    let channel = desired_channel(intent, module_set);

    let templates = match catalog
        .list_templates(&module_set.catalog_namespace())
        .await
    {
        Ok(templates) => templates,
        Err(e) => {
            return ResolutionResult::failed(
                channel,
                LookupError::catalog("failed to list module templates on lookup", e),
            )
        }
    };

    let (unassigned, candidates): (Vec<_>, Vec<_>) = templates
        .into_iter()
        .filter(|t| t.matches_module(module))
        .filter(|t| t.channel().is_empty() || t.channel() == channel)
        .partition(|t| t.channel().is_empty());

    if candidates.is_empty() && !unassigned.is_empty() {
        return ResolutionResult::failed(
            channel,
            LookupError::TemplateWithoutChannel {
                module: module.to_string(),
            },
        );
    }

    let template = match single_candidate(module, Selector::Channel(channel.clone()), candidates) {
        Ok(template) => template,
        Err(err) => return ResolutionResult::failed(channel, err),
    };

    match module_set.channel() {
        Some(global) if global != channel => {
            debug!(
                module = %module,
                channel = %channel,
                instead_of = %global,
                "using module channel"
            )
        }
        _ => debug!(module = %module, channel = %channel, "using channel"),
    }

    ResolutionResult::resolved(template, channel)
}

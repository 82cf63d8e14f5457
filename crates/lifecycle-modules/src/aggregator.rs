//! Strategy aggregator: dispatch to the first responsible strategy

use std::sync::Arc;

use async_trait::async_trait;
use lifecycle_common::crd::{ModuleReleaseMeta, ModuleSet};
use lifecycle_common::ModuleCatalog;
use tracing::{debug, warn};

use crate::error::LookupError;
use crate::intent::ModuleIntent;
use crate::strategy::{desired_channel, LookupStrategy, ResolutionResult, TemplateInfoLookup};

/// Lookup trying [`LookupStrategy::ORDERED`] in turn
pub struct StrategyAggregator {
    catalog: Arc<dyn ModuleCatalog>,
}

impl StrategyAggregator {
    /// Aggregator reading from `catalog`
    pub fn new(catalog: Arc<dyn ModuleCatalog>) -> Self {
        Self { catalog }
    }

    fn select(
        intent: &ModuleIntent,
        release_meta: Option<&ModuleReleaseMeta>,
    ) -> Option<LookupStrategy> {
        LookupStrategy::ORDERED
            .into_iter()
            .find(|s| s.is_responsible(intent, release_meta))
    }
}

#[async_trait]
impl TemplateInfoLookup for StrategyAggregator {
    fn is_responsible(
        &self,
        intent: &ModuleIntent,
        release_meta: Option<&ModuleReleaseMeta>,
    ) -> bool {
        Self::select(intent, release_meta).is_some()
    }

    async fn lookup(
        &self,
        intent: &ModuleIntent,
        module_set: &ModuleSet,
        release_meta: Option<&ModuleReleaseMeta>,
    ) -> ResolutionResult {
        match Self::select(intent, release_meta) {
            Some(strategy) => {
                debug!(module = %intent.name, strategy = ?strategy, "selected lookup strategy");
                strategy
                    .lookup(self.catalog.as_ref(), intent, module_set, release_meta)
                    .await
            }
            None => {
                warn!(module = %intent.name, "no lookup strategy responsible");
                ResolutionResult::failed(
                    desired_channel(intent, module_set),
                    LookupError::NoResponsibleStrategy {
                        module: intent.name.clone(),
                    },
                )
            }
        }
    }
}

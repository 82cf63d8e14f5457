//! ModuleSet controller implementation
//!
//! Each reconcile resolves every module of the ModuleSet against the
//! catalog, turns the outcomes into status records and writes the whole
//! status back in one patch. Resolution never writes; all writes happen
//! through [`StatusWriter`] after resolution finished.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use lifecycle_common::crd::{
    set_condition, Condition, ConditionStatus, ModuleSet, ModuleSetStatus, ModuleStatus, State,
};
use lifecycle_common::{Error, KubeCatalog, ModuleCatalog, DEFAULT_CHANNEL};
use lifecycle_modules::{
    determine_state, is_pruned, next_module_status, MaintenancePolicy, ModuleResolver,
    ResolvedModule,
};

use crate::{FIELD_MANAGER, MODULES_RESOLVED_CONDITION};

/// Requeue interval when none is configured
pub const DEFAULT_REQUEUE: Duration = Duration::from_secs(30);

/// Writes ModuleSet status
///
/// Kept behind a trait so reconcile can be tested without an API server.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StatusWriter: Send + Sync {
    /// Replace the status of the named ModuleSet
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ModuleSetStatus,
    ) -> Result<(), Error>;
}

/// Status writer backed by the Kubernetes API
pub struct KubeStatusWriter {
    client: Client,
}

impl KubeStatusWriter {
    /// Create a new KubeStatusWriter wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusWriter for KubeStatusWriter {
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ModuleSetStatus,
    ) -> Result<(), Error> {
        let api: Api<ModuleSet> = Api::namespaced(self.client.clone(), namespace);

        let status_patch = serde_json::json!({
            "status": status
        });

        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await?;

        Ok(())
    }
}

/// Controller context shared across reconciles
pub struct Context {
    /// Resolves modules against the catalog
    pub resolver: ModuleResolver,
    /// Writes the computed status
    pub status_writer: Arc<dyn StatusWriter>,
    /// Interval between periodic reconciles
    pub requeue: Duration,
}

impl Context {
    /// Create a context reading the catalog and writing status through `client`
    pub fn new(client: Client, policy: Arc<dyn MaintenancePolicy>, requeue: Duration) -> Self {
        let catalog: Arc<dyn ModuleCatalog> = Arc::new(KubeCatalog::new(client.clone()));
        Self {
            resolver: ModuleResolver::new(catalog, policy),
            status_writer: Arc::new(KubeStatusWriter::new(client)),
            requeue,
        }
    }

    /// Create a context from explicit collaborators
    ///
    /// Used by tests that have no Kubernetes client.
    pub fn for_testing(
        catalog: Arc<dyn ModuleCatalog>,
        policy: Arc<dyn MaintenancePolicy>,
        status_writer: Arc<dyn StatusWriter>,
    ) -> Self {
        Self {
            resolver: ModuleResolver::new(catalog, policy),
            status_writer,
            requeue: DEFAULT_REQUEUE,
        }
    }
}

/// Reconcile a ModuleSet
///
/// Resolves every declared and tracked module, builds the next status
/// (per-module records, the `ModulesResolved` condition, aggregated state,
/// active channel, observed generation) and patches it. Per-module failures
/// are reported in status and never fail the reconcile; only a failed status
/// write does.
#[instrument(skip(module_set, ctx), fields(module_set = %module_set.name_any()))]
pub async fn reconcile(module_set: Arc<ModuleSet>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = module_set.name_any();
    let namespace = module_set.catalog_namespace();

    if module_set.metadata.deletion_timestamp.is_some() {
        let mut status = module_set.status.clone().unwrap_or_default();
        if status.state != State::Deleting {
            info!("module set is being deleted");
            status.state = State::Deleting;
            ctx.status_writer
                .patch_status(&namespace, &name, &status)
                .await?;
        }
        return Ok(Action::await_change());
    }

    debug!("reconciling module set");
    let resolved = ctx.resolver.resolve_all(&module_set).await;
    let status = next_status(&module_set, &resolved);

    ctx.status_writer
        .patch_status(&namespace, &name, &status)
        .await?;

    match status.state {
        State::Error => warn!(state = %status.state, "module set has failing modules"),
        _ => info!(state = %status.state, modules = status.modules.len(), "updated status"),
    }

    Ok(Action::requeue(ctx.requeue))
}

/// Compute the next status of a ModuleSet from its resolved modules
///
/// Records of removed modules with nothing installed are dropped. Only
/// failures that leave a module unusable turn `ModulesResolved` false.
pub fn next_status(module_set: &ModuleSet, resolved: &[ResolvedModule]) -> ModuleSetStatus {
    let mut status = module_set.status.clone().unwrap_or_default();

    let kept: Vec<&ResolvedModule> = resolved
        .iter()
        .filter(|r| {
            let pruned = is_pruned(r, module_set.module_status(&r.intent.name));
            if pruned {
                debug!(module = %r.intent.name, "dropping status of removed module");
            }
            !pruned
        })
        .collect();

    let modules: Vec<ModuleStatus> = kept
        .iter()
        .filter_map(|r| next_module_status(r, module_set.module_status(&r.intent.name)))
        .collect();

    // held and refused changes leave the installed module usable
    let failed: Vec<&str> = kept
        .iter()
        .filter(|r| r.result.error.as_ref().is_some_and(|e| !e.kind().is_deferral()))
        .map(|r| r.intent.name.as_str())
        .collect();
    let condition = if failed.is_empty() {
        Condition::new(
            MODULES_RESOLVED_CONDITION,
            ConditionStatus::True,
            "Resolved",
            "all modules resolved",
        )
    } else {
        Condition::new(
            MODULES_RESOLVED_CONDITION,
            ConditionStatus::False,
            "ResolutionFailed",
            format!("modules not resolved: {}", failed.join(", ")),
        )
    };
    set_condition(&mut status.conditions, condition);

    status.state = determine_state(&modules, &status.conditions);
    status.modules = modules;
    status.active_channel = Some(module_set.channel().unwrap_or(DEFAULT_CHANNEL).to_string());
    status.observed_generation = module_set.metadata.generation;
    status
}

/// Error policy for the controller
///
/// Logs the failure and requeues after 5 seconds.
pub fn error_policy(module_set: Arc<ModuleSet>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        module_set = %module_set.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    Action::requeue(Duration::from_secs(5))
}

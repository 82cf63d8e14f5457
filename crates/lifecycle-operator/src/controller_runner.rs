//! Controller runner - builds the ModuleSet controller future
//!
//! The caller decides when to drive the returned future, which keeps
//! controller construction separate from process startup.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use lifecycle_common::crd::ModuleSet;

use crate::controller::{error_policy, reconcile, Context};

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Build the ModuleSet controller future
///
/// Watches ModuleSets in every namespace and stops on SIGINT/SIGTERM.
pub fn build_module_set_controller(
    client: Client,
    ctx: Arc<Context>,
) -> impl Future<Output = ()> + Send {
    let module_sets: Api<ModuleSet> = Api::all(client);

    tracing::info!("- ModuleSet controller");

    Controller::new(
        module_sets,
        WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
    )
    .shutdown_on_signal()
    .run(reconcile, error_policy, ctx)
    .for_each(log_reconcile_result("ModuleSet"))
}

/// Creates a closure for logging reconciliation results.
fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}

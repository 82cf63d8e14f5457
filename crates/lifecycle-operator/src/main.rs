//! Lifecycle Operator - resolves module templates and reports module lifecycle state

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use kube::{Api, Client, CustomResourceExt};

use lifecycle_common::crd::{ModuleReleaseMeta, ModuleSet, ModuleTemplate};
use lifecycle_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use lifecycle_modules::maintenance::DEFAULT_MIN_WINDOW_MINUTES;
use lifecycle_modules::{MaintenancePolicy, MaintenanceWindow, WindowPolicy};
use lifecycle_operator::{build_module_set_controller, Context, FIELD_MANAGER};

/// Lifecycle - Kubernetes operator resolving module templates for ModuleSets
#[derive(Parser, Debug)]
#[command(name = "lifecycle", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches ModuleSets, resolves each declared module to one
    /// ModuleTemplate and writes per-module and aggregated status.
    Controller(ControllerArgs),
}

#[derive(clap::Args, Debug, Clone)]
struct ControllerArgs {
    /// Seconds between periodic reconciles of a ModuleSet
    #[arg(long, env = "LIFECYCLE_REQUEUE_SECS", default_value_t = 30)]
    requeue_secs: u64,

    /// JSON maintenance window policy; version changes needing downtime are
    /// held back while no window can be determined
    #[arg(long, env = "LIFECYCLE_MAINTENANCE_POLICY")]
    maintenance_policy: Option<PathBuf>,

    /// Minutes an open maintenance window must still last for changes to start
    #[arg(
        long,
        env = "LIFECYCLE_MAINTENANCE_MIN_WINDOW_MINUTES",
        default_value_t = DEFAULT_MIN_WINDOW_MINUTES
    )]
    maintenance_min_window_minutes: i64,

    /// Log output format (json or pretty)
    #[arg(long, env = "LIFECYCLE_LOG_FORMAT", default_value = "json")]
    log_format: LogFormat,
}

impl Default for ControllerArgs {
    fn default() -> Self {
        Self {
            requeue_secs: 30,
            maintenance_policy: None,
            maintenance_min_window_minutes: DEFAULT_MIN_WINDOW_MINUTES,
            log_format: LogFormat::default(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        print!("{}", crd_manifests()?);
        return Ok(());
    }

    let args = match cli.command {
        Some(Commands::Controller(args)) => args,
        None => ControllerArgs::default(),
    };

    init_telemetry(TelemetryConfig {
        service_name: "lifecycle-operator".to_string(),
        log_format: args.log_format,
        ..Default::default()
    })?;

    run_controller(args).await
}

/// All CRDs as one multi-document YAML stream
fn crd_manifests() -> anyhow::Result<String> {
    let crds = [
        ModuleSet::crd(),
        ModuleTemplate::crd(),
        ModuleReleaseMeta::crd(),
    ];
    let mut out = String::new();
    for crd in &crds {
        let yaml = serde_yaml::to_string(crd)
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        out.push_str("---\n");
        out.push_str(&yaml);
    }
    Ok(out)
}

/// Ensure all lifecycle CRDs are installed
///
/// The operator installs its own CRDs on startup using server-side apply.
/// This ensures the CRD versions always match the operator version.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    for (name, crd) in [
        (ModuleSet::crd_name(), ModuleSet::crd()),
        (ModuleTemplate::crd_name(), ModuleTemplate::crd()),
        (ModuleReleaseMeta::crd_name(), ModuleReleaseMeta::crd()),
    ] {
        tracing::info!(crd = name, "Installing CRD...");
        crds.patch(name, &params, &Patch::Apply(&crd))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to install {} CRD: {}", name, e))?;
    }

    tracing::info!("All lifecycle CRDs installed/updated");
    Ok(())
}

/// Maintenance policy from the optional policy file
fn load_maintenance_policy(
    path: Option<&PathBuf>,
    min_window_minutes: i64,
) -> anyhow::Result<Arc<dyn MaintenancePolicy>> {
    match path {
        Some(path) => {
            let policy = WindowPolicy::from_file(path)?;
            tracing::info!(
                path = %path.display(),
                rules = policy.rules.len(),
                min_window_minutes,
                "Loaded maintenance window policy"
            );
            let window = MaintenanceWindow::new(Arc::new(policy))
                .with_min_duration(chrono::Duration::minutes(min_window_minutes));
            Ok(Arc::new(window))
        }
        None => {
            tracing::warn!(
                "No maintenance window policy configured, changes requiring downtime will be held"
            );
            Ok(Arc::new(MaintenanceWindow::unconfigured()))
        }
    }
}

async fn run_controller(args: ControllerArgs) -> anyhow::Result<()> {
    tracing::info!("Lifecycle controller starting...");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crds_installed(&client).await?;

    let policy = load_maintenance_policy(
        args.maintenance_policy.as_ref(),
        args.maintenance_min_window_minutes,
    )?;
    let ctx = Arc::new(Context::new(
        client.clone(),
        policy,
        Duration::from_secs(args.requeue_secs),
    ));

    tracing::info!("Starting controllers:");
    build_module_set_controller(client, ctx).await;

    tracing::info!("Lifecycle controller shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crd_manifests_contain_every_kind() {
        let yaml = crd_manifests().expect("crds serialize");
        assert_eq!(yaml.matches("---\n").count(), 3);
        assert!(yaml.contains("kind: ModuleSet"));
        assert!(yaml.contains("kind: ModuleTemplate"));
        assert!(yaml.contains("kind: ModuleReleaseMeta"));
    }

    #[test]
    fn test_controller_args_defaults() {
        let cli = Cli::parse_from(["lifecycle", "controller"]);
        let Some(Commands::Controller(args)) = cli.command else {
            panic!("expected controller subcommand");
        };
        assert_eq!(args.requeue_secs, 30);
        assert!(args.maintenance_policy.is_none());
        assert_eq!(args.maintenance_min_window_minutes, 60);
        assert_eq!(args.log_format, LogFormat::Json);
    }

    #[test]
    fn test_controller_args_parse_flags() {
        let cli = Cli::parse_from([
            "lifecycle",
            "controller",
            "--requeue-secs",
            "60",
            "--maintenance-policy",
            "/etc/lifecycle/windows.json",
            "--maintenance-min-window-minutes",
            "15",
            "--log-format",
            "pretty",
        ]);
        let Some(Commands::Controller(args)) = cli.command else {
            panic!("expected controller subcommand");
        };
        assert_eq!(args.requeue_secs, 60);
        assert_eq!(
            args.maintenance_policy,
            Some(PathBuf::from("/etc/lifecycle/windows.json"))
        );
        assert_eq!(args.maintenance_min_window_minutes, 15);
        assert_eq!(args.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_crd_flag_without_subcommand() {
        let cli = Cli::parse_from(["lifecycle", "--crd"]);
        assert!(cli.crd);
        assert!(cli.command.is_none());
    }
}

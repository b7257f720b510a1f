//! kube-janitor - clean up Kubernetes resources after a TTL or expiry date

mod shutdown;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use miette::{miette, IntoDiagnostic, Result};
use tracing::{error, info};

use janitor_core::load_rules_from_file;
use janitor_kube::{resolve_hook, ClusterEffects, Janitor, JanitorConfig};

#[derive(Parser, Debug)]
#[command(name = "kube-janitor")]
#[command(version)]
#[command(about = "Clean up (delete) Kubernetes resources after a configured TTL or expiry date", long_about = None)]
struct Args {
    /// Dry run mode: do not change anything, just print what would be done
    #[arg(long, env = "DRY_RUN")]
    dry_run: bool,

    /// Debug mode: print more information
    #[arg(long, short = 'd', env = "DEBUG")]
    debug: bool,

    /// Run the clean-up loop only once and exit
    #[arg(long, env = "ONCE")]
    once: bool,

    /// Loop interval in seconds
    #[arg(long, default_value_t = 30, env = "INTERVAL")]
    interval: u64,

    /// Seconds to pause after each delete
    #[arg(long, default_value_t = 0, env = "WAIT_AFTER_DELETE")]
    wait_after_delete: u64,

    /// Send a DeleteNotification event this many seconds before a resource expires
    #[arg(long, env = "DELETE_NOTIFICATION")]
    delete_notification: Option<i64>,

    /// Resources to consider for clean up: comma-separated endpoint names, or "all"
    #[arg(long, default_value = "all", env = "INCLUDE_RESOURCES")]
    include_resources: String,

    /// Resources to exclude from clean up
    #[arg(long, default_value = "events,controllerrevisions", env = "EXCLUDE_RESOURCES")]
    exclude_resources: String,

    /// Namespaces to include for clean up: comma-separated names, or "all"
    #[arg(long, default_value = "all", env = "INCLUDE_NAMESPACES")]
    include_namespaces: String,

    /// Namespaces to exclude from clean up
    #[arg(long, default_value = "kube-system", env = "EXCLUDE_NAMESPACES")]
    exclude_namespaces: String,

    /// Load TTL rules from the given YAML file
    #[arg(long, env = "RULES_FILE")]
    rules_file: Option<PathBuf>,

    /// Annotation overriding the creation timestamp when computing a resource's age
    #[arg(long, env = "DEPLOYMENT_TIME_ANNOTATION")]
    deployment_time_annotation: Option<String>,

    /// Name of a registered resource context hook (e.g. "random-dice")
    #[arg(long, env = "RESOURCE_CONTEXT_HOOK")]
    resource_context_hook: Option<String>,
}

fn comma_set(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if args.debug { "debug" } else { "info" })
    });
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!(
        "Janitor v{} started with {args:?}",
        env!("CARGO_PKG_VERSION")
    );
    if args.dry_run {
        info!("**DRY-RUN**: no deletions will be performed!");
    }

    let rules = match &args.rules_file {
        Some(path) => {
            let rules = load_rules_from_file(path).into_diagnostic()?;
            info!("Loaded {} rules from file {}", rules.len(), path.display());
            rules
        }
        None => Vec::new(),
    };

    let hook = args
        .resource_context_hook
        .as_deref()
        .map(|name| {
            resolve_hook(name).ok_or_else(|| miette!("unknown resource context hook \"{name}\""))
        })
        .transpose()?;

    let config = JanitorConfig {
        include_resources: comma_set(&args.include_resources),
        exclude_resources: comma_set(&args.exclude_resources),
        include_namespaces: comma_set(&args.include_namespaces),
        exclude_namespaces: comma_set(&args.exclude_namespaces),
        delete_notification: args.delete_notification.filter(|seconds| *seconds > 0),
        deployment_time_annotation: args.deployment_time_annotation.clone(),
        resource_context_hook: hook,
        dry_run: args.dry_run,
    };

    let client = kube::Client::try_default().await.into_diagnostic()?;
    let effects = ClusterEffects::new(client.clone(), args.dry_run, args.wait_after_delete);
    let janitor = Janitor::new(client, config, rules, Box::new(effects));

    let shutdown = shutdown::Shutdown::install();
    loop {
        if let Err(e) = janitor.clean_up().await {
            error!("Failed to clean up: {e}");
        }
        if args.once || shutdown.shutdown_now() {
            break;
        }
        if shutdown.sleep(Duration::from_secs(args.interval)).await {
            break;
        }
    }
    Ok(())
}

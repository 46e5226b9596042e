//! flops-vm: converge one flops.ru VM to a declared spec.
//!
//! Prints the pass result as JSON on stdout; logs go to stderr.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flops_vm::config::{CreateDefaults, Credentials, ReconcileSettings, DEFAULT_API_URL};
use flops_vm::{DesiredSpec, DesiredState, FlopsClient, ReconcileResult, Reconciler, TokioClock, VmReconciler};

/// Reconcile a flops.ru VM
#[derive(Parser, Debug)]
#[command(name = "flops-vm", version, about)]
struct Args {
    /// VM name (identity key on the provider)
    #[arg(long)]
    name: String,

    /// present or absent
    #[arg(long, default_value = "present")]
    state: DesiredState,

    /// Memory in GB (max 16)
    #[arg(long, default_value = "0.5")]
    memory: f64,

    /// Disk size in GB (max 512)
    #[arg(long, default_value = "8")]
    disk: u32,

    /// CPU cores (max 12)
    #[arg(long, default_value = "1")]
    cpu: u32,

    /// Number of public IPs (max 2)
    #[arg(long, default_value = "0")]
    ip_count: u32,

    /// API key
    #[arg(long, env = "FLOPS_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Client id
    #[arg(long, env = "FLOPS_CLIENT_ID")]
    client_id: String,

    /// Tenant (project) id
    #[arg(long, env = "FLOPS_TENANT_ID")]
    tenant_id: String,

    /// Public key names to install on new VMs (comma separated)
    #[arg(long = "public-key", env = "FLOPS_PUBLIC_KEY_NAMES", value_delimiter = ',')]
    public_keys: Vec<String>,

    /// API base URL
    #[arg(long, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Distribution used for new VMs
    #[arg(long, default_value_t = CreateDefaults::default().distribution_id)]
    distribution_id: u64,

    /// Tariff used for new VMs
    #[arg(long, default_value_t = CreateDefaults::default().tariff_id)]
    tariff_id: u64,

    /// Seconds between polls of a pending operation
    #[arg(long, default_value = "5")]
    poll_interval: u64,

    /// Seconds to wait after a memory shrink
    #[arg(long, default_value = "5")]
    settle_pause: u64,

    /// Give up on the whole pass after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Report what would change without changing anything
    #[arg(long)]
    check: bool,
}

impl Args {
    fn desired_spec(&self) -> DesiredSpec {
        DesiredSpec {
            name: self.name.clone(),
            state: self.state,
            memory_gb: self.memory,
            disk_gb: self.disk,
            cpu_cores: self.cpu,
            public_ip_count: self.ip_count,
        }
    }

    fn credentials(&self) -> Credentials {
        Credentials {
            api_key: self.api_key.clone(),
            client_id: self.client_id.clone(),
            tenant_id: self.tenant_id.clone(),
        }
    }

    fn settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            poll_interval: Duration::from_secs(self.poll_interval),
            settle_pause: Duration::from_secs(self.settle_pause),
            public_key_names: self.public_keys.clone(),
            create: CreateDefaults {
                distribution_id: self.distribution_id,
                tariff_id: self.tariff_id,
            },
            check_mode: self.check,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flops_vm=info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match run(&args).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            if result.failed {
                return Ok(ExitCode::from(2));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("Reconciliation of {} failed: {:#}", args.name, e);
            println!("{}", json!({ "failed": true, "msg": format!("{:#}", e) }));
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(args: &Args) -> Result<ReconcileResult> {
    let spec = args.desired_spec();
    spec.validate().context("invalid VM spec")?;

    let credentials = args.credentials();
    info!("Using {} as {:?}", args.api_url, credentials);

    let reconciler = VmReconciler::new(
        FlopsClient::new(args.api_url.clone(), credentials),
        TokioClock,
        args.settings(),
    );

    let pass = reconciler.reconcile(&spec);
    let result = match args.timeout {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), pass)
            .await
            .map_err(|_| anyhow!("gave up after {}s; any provider operation keeps running", secs))?,
        None => pass.await,
    };

    Ok(result?)
}

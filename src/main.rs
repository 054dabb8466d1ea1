use clap::{Args, Parser};
use kube::CustomResourceExt;
use std::path::PathBuf;
use std::time::Duration;

mod controller;
mod crd;
mod operator;

use controller::ReconcileConfig;
use crd::NodeFeatureDiscovery;
use operator::Engine;

#[derive(Parser)]
#[command(name = "nfd-operator")]
#[command(bin_name = "nfd-operator")]
enum NfdOperatorCli {
    Run(RunArgs),
    Validate(StageArgs),
    Crd,
}

#[derive(Args)]
#[command(author, version, about, long_about = None)]
struct StageArgs {
    /// Directory holding one sub-directory of manifests per stage
    #[arg(short, long, default_value = "/opt/nfd")]
    assets_dir: PathBuf,
    /// Stage directories under the assets directory, applied in this order
    #[arg(short, long, value_delimiter = ',', default_value = "master,worker")]
    stages: Vec<String>,
}

impl StageArgs {
    fn stage_dirs(&self) -> Vec<PathBuf> {
        self.stages.iter().map(|s| self.assets_dir.join(s)).collect()
    }
}

#[derive(Args)]
#[command(author, version, about, long_about = None)]
pub struct RunArgs {
    #[command(flatten)]
    stages: StageArgs,
    #[arg(short, long, default_value_t = 2)]
    concurrency: u16,
    #[arg(long, default_value_t = 10)]
    not_ready_requeue_secs: u64,
    #[arg(long, default_value_t = 60)]
    error_requeue_secs: u64,
    #[arg(long, default_value_t = 120)]
    reconcile_timeout_secs: u64,
}

/// Builds every stage without touching the cluster and reports what it found.
async fn validate(args: StageArgs) -> Result<(), controller::Error> {
    let engine = Engine::new(args.stage_dirs());
    for stage in engine.stages().await?.iter() {
        let kinds: Vec<&str> = stage.controls.iter().map(|c| c.kind.as_str()).collect();
        println!("{}: {}", stage.name, kinds.join(", "));
        if !stage.skipped.is_empty() {
            println!("  skipped: {}", stage.skipped.join(", "));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    match NfdOperatorCli::parse() {
        NfdOperatorCli::Run(args) => {
            let config = ReconcileConfig {
                not_ready_requeue: Duration::from_secs(args.not_ready_requeue_secs),
                error_requeue: Duration::from_secs(args.error_requeue_secs),
                reconcile_timeout: Duration::from_secs(args.reconcile_timeout_secs),
            };
            controller::run(args.stages.stage_dirs(), config, args.concurrency).await?
        }
        NfdOperatorCli::Validate(args) => validate(args).await?,
        NfdOperatorCli::Crd => print!("{}", serde_yaml::to_string(&NodeFeatureDiscovery::crd())?),
    };

    Ok(())
}

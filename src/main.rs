use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use disruptwatch::duration::parse_duration;
use disruptwatch::{
    command_disruption, run, wait_disruption, DisruptionTest, ServiceAvailabilityTest, Settings,
    TestError, UpgradeContext,
};

#[derive(Parser, Debug)]
#[command(name = "disruptwatch")]
#[command(about = "Measure service disruption during a cluster upgrade and report it as JUnit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the target while a disruption runs, then write a JUnit report
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for JUnit and summary files
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Probe this URL instead of resolving a Service
    #[arg(long)]
    url: Option<String>,

    /// Tolerated disruption as a fraction of the sampling window (e.g. 0.02)
    #[arg(long)]
    tolerance: Option<f64>,

    /// Wait this long instead of running an upgrade command (e.g. "10m")
    #[arg(long, conflicts_with = "upgrade_command")]
    upgrade_duration: Option<String>,

    /// Version being upgraded to, for the record
    #[arg(long)]
    to_version: Option<String>,

    /// JUnit suite name
    #[arg(long, default_value = "Cluster upgrade")]
    description: String,

    /// JUnit package and report file name
    #[arg(long, default_value = "upgrade")]
    test_name: String,

    /// Upgrade command to run, after `--`
    #[arg(last = true)]
    upgrade_command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run_suite(args).await,
    }
}

async fn run_suite(args: RunArgs) -> Result<()> {
    let mut settings = Settings::load(args.config.as_deref())?;

    // Flags override every other source
    if let Some(dir) = args.report_dir {
        settings.report_dir = Some(dir);
    }
    if let Some(url) = args.url {
        settings.target.url = Some(url);
    }
    if let Some(tolerance) = args.tolerance {
        settings.tolerance = tolerance;
    }
    if !args.upgrade_command.is_empty() {
        settings.upgrade.command = Some(args.upgrade_command);
    }
    if let Some(duration) = args.upgrade_duration {
        settings.upgrade.command = None;
        settings.upgrade.duration = Some(parse_duration(&duration)?);
    }
    settings.validate()?;

    let upgrade = settings.upgrade.clone();
    if upgrade.command.is_none() && upgrade.duration.is_none() {
        bail!("nothing to disrupt: pass an upgrade command after `--` or --upgrade-duration");
    }
    let disruption = async move {
        match (upgrade.command, upgrade.duration) {
            (Some(command), _) => command_disruption(&command).await,
            (None, Some(duration)) => wait_disruption(duration).await,
            (None, None) => Err(TestError::failed("no disruption configured")),
        }
    };

    let context = UpgradeContext {
        to_version: args.to_version,
        ..Default::default()
    };
    let invariants: Vec<Box<dyn DisruptionTest>> =
        vec![Box::new(ServiceAvailabilityTest::new(settings.clone()))];

    let suite = run(
        &settings,
        &args.description,
        &args.test_name,
        &context,
        invariants,
        disruption,
    )
    .await;

    let failed = suite.hard_failures();
    if failed.is_empty() {
        info!(
            "{} tests, {} skipped, no failures",
            suite.tests, suite.skipped
        );
        return Ok(());
    }

    for name in &failed {
        error!("failed: {}", name);
    }
    bail!("{} of {} tests failed", failed.len(), suite.tests)
}

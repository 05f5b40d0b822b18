//! Scenario runner entry point
//!
//! Runs YAML scenarios against a live appliance through Playwright, or
//! against the in-memory simulator with `--simulate`.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use appliance_e2e::config::HarnessConfig;
use appliance_e2e::playwright::{PlaywrightBrowser, RouteNavigator};
use appliance_e2e::rest::RestClient;
use appliance_e2e::runner::ScenarioRunner;
use appliance_e2e::shell::SshShell;
use appliance_e2e::sim::{SimConfig, SimulatedAppliance};
use appliance_e2e::spec::Scenario;
use appliance_e2e::Appliance;

#[derive(Parser, Debug)]
#[command(name = "appliance-e2e")]
#[command(about = "Scenario runner for appliance server settings")]
struct Args {
    /// Harness configuration file
    #[arg(short, long, default_value = "appliance-e2e.yaml", env = "APPLIANCE_E2E_CONFIG")]
    config: PathBuf,

    /// Scenario directory, overrides the configuration
    #[arg(short, long)]
    specs: Option<PathBuf>,

    /// Run only scenarios matching this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only a specific scenario by name
    #[arg(short, long)]
    name: Option<String>,

    /// Drive the in-memory simulator instead of a live appliance
    #[arg(long)]
    simulate: bool,

    /// Output directory for results, overrides the configuration
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(args)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(args: Args) -> anyhow::Result<bool> {
    let config = HarnessConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let specs_dir = args.specs.unwrap_or_else(|| config.specs_dir.clone());
    let output_dir = args.output.unwrap_or_else(|| config.output_dir.clone());

    let scenarios = Scenario::load_all(&specs_dir)
        .with_context(|| format!("loading scenarios from {}", specs_dir.display()))?;
    let scenarios: Vec<Scenario> = match &args.tag {
        Some(tag) => Scenario::filter_by_tag(&scenarios, tag)
            .into_iter()
            .cloned()
            .collect(),
        None => scenarios,
    };
    let scenarios: Vec<Scenario> = scenarios
        .into_iter()
        .filter(|s| args.name.as_ref().map_or(true, |name| &s.name == name))
        .collect();
    if let Some(name) = &args.name {
        anyhow::ensure!(!scenarios.is_empty(), "Scenario not found: {}", name);
    }

    let (appliance, browser) = if args.simulate {
        info!("Driving the simulated appliance");
        let sim = SimulatedAppliance::new(SimConfig {
            version: config.appliance.version.clone(),
            product_name: config.appliance.product_name.clone(),
            server: config.appliance.server.clone(),
            console: config.console.clone(),
            ..Default::default()
        });
        (sim.appliance(), None)
    } else {
        let (appliance, browser) = live_appliance(&config).await?;
        (appliance, Some(browser))
    };

    let runner = ScenarioRunner::new(appliance, config.auth_providers.clone(), output_dir);
    let results = runner.run_scenarios(&scenarios).await;
    runner.write_results(&results)?;

    if let Some(browser) = browser {
        browser.close().await?;
    }
    Ok(results.success())
}

/// Appliance driven through Playwright, the REST API and ssh
async fn live_appliance(
    config: &HarnessConfig,
) -> anyhow::Result<(Appliance, Arc<PlaywrightBrowser>)> {
    let browser = Arc::new(
        PlaywrightBrowser::launch(&config.playwright)
            .await
            .context("launching Playwright")?,
    );
    let navigator = RouteNavigator::new(
        browser.clone(),
        config.routes.clone(),
        config.appliance.base_url.clone(),
        config.appliance.server.sid,
        &config.playwright,
    );
    let rest = Arc::new(RestClient::new(&config.appliance)?);
    let shell = SshShell::new(&config.appliance)?;

    let appliance = Appliance {
        version: config.appliance.version.clone(),
        product_name: config.appliance.product_name.clone(),
        server: config.appliance.server.clone(),
        console: config.console.clone(),
        browser: browser.clone(),
        navigator: Arc::new(navigator),
        roles: rest.clone(),
        shell: Arc::new(shell),
        inventory: rest,
    };
    Ok((appliance, browser))
}

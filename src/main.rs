//! Packageless CLI
//!
//! Command-line interface for the packageless package manager

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use packageless::alias::{AliasManager, DisabledAliases, ShellAliasManager};
use packageless::cli::{Cli, CliContext, CommandDriver};
use packageless::engine::DockerCli;
use packageless::package::{HttpFetcher, LocalManifestStore};
use packageless::{Config, Orchestrator};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = e.print();
                process::exit(0);
            }
            _ => {
                let message = e.to_string();
                let message = message.trim().trim_start_matches("error:").trim_start();
                CliContext::new(false, false).error(message);
                process::exit(1);
            }
        },
    };
    init_tracing(cli.verbose);

    let context = CliContext::new(cli.verbose, cli.quiet);

    if let Err(e) = run(&cli, &context) {
        context.error(&format!("{:#}", e));
        process::exit(1);
    }
}

fn run(cli: &Cli, context: &CliContext) -> anyhow::Result<()> {
    let config = Config::locate(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let engine = DockerCli::new();
    let fetcher = HttpFetcher::new().context("failed to set up manifest fetcher")?;
    let store = LocalManifestStore::new(
        config.manifest_dir(),
        config.repository_host.clone(),
        Box::new(fetcher),
    );

    let aliases: Box<dyn AliasManager> = if config.alias {
        let executable = std::env::current_exe().context("failed to locate packageless executable")?;
        Box::new(ShellAliasManager::detect(executable))
    } else {
        Box::new(DisabledAliases)
    };

    let orchestrator = Orchestrator::new(&config, &engine, &store, aliases.as_ref(), context.clone());
    CommandDriver::new(context.clone(), orchestrator).execute(&cli.command)?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("PACKAGELESS_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

//! Command-line interface for packageless
//!
//! This module provides the CLI commands and argument parsing, the console
//! output context, and the driver that dispatches each verb to the lifecycle.

use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::CONFIG_ENV_VAR;
use crate::error::{EngineError, EngineOperation, PimError, PimResult};
use crate::lifecycle::Orchestrator;
use crate::VERSION;

/// Packageless package manager
#[derive(Parser)]
#[command(name = "packageless")]
#[command(about = "Install and run tools packaged as container images")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (default: config.hcl next to the executable)
    #[arg(long, global = true, env = CONFIG_ENV_VAR)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Install packages
    Install {
        /// Packages as `name` or `name:version`
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Uninstall packages
    Uninstall {
        /// Packages as `name` or `name:version`
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Upgrade packages (default: everything installed)
    Upgrade {
        /// Packages as `name` or `name:version`
        packages: Vec<String>,
    },

    /// Refresh cached pim configurations (default: all of them)
    Update {
        /// Package names
        packages: Vec<String>,
    },

    /// Run an installed package
    Run {
        /// Package as `name` or `name:version`
        package: String,

        /// Arguments passed to the package's container
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Print the packageless version
    Version,
}

/// CLI execution context
#[derive(Clone)]
pub struct CliContext {
    pub verbose: bool,
    pub quiet: bool,
    pub start_time: Instant,
}

impl CliContext {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            start_time: Instant::now(),
        }
    }

    /// Context that prints nothing but errors
    pub fn quiet() -> Self {
        Self::new(false, true)
    }

    /// Print info message if not quiet
    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{}", message);
        }
    }

    /// Print verbose message if verbose mode enabled
    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("{} {}", "verbose:".dimmed(), message.dimmed());
        }
    }

    /// Print warning message
    pub fn warn(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", "warning:".yellow().bold(), message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        println!("{} {}", "error:".red().bold(), message);
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", "success:".green().bold(), message);
        }
    }

    /// Spinner for a step of unknown length
    pub fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if self.quiet || !self.verbose {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }

    /// Get elapsed time since CLI started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Dispatches parsed commands to the lifecycle
pub struct CommandDriver<'a> {
    context: CliContext,
    orchestrator: Orchestrator<'a>,
}

impl<'a> CommandDriver<'a> {
    pub fn new(context: CliContext, orchestrator: Orchestrator<'a>) -> Self {
        Self { context, orchestrator }
    }

    /// Execute one command. Batches stop at the first failing package.
    pub fn execute(&self, command: &Commands) -> PimResult<()> {
        match command {
            Commands::Install { packages } => {
                for package in packages {
                    self.orchestrator.install(package)?;
                }
            }

            Commands::Uninstall { packages } => {
                for package in packages {
                    self.orchestrator.uninstall(package)?;
                }
            }

            Commands::Upgrade { packages } => {
                if packages.is_empty() {
                    self.context.info("No package specified, upgrading all installed packages");
                    self.orchestrator.upgrade_all()?;
                } else {
                    for package in packages {
                        self.orchestrator.upgrade(package)?;
                    }
                }
            }

            Commands::Update { packages } => {
                if packages.is_empty() {
                    self.context.info("No pim specified, updating all currently installed pim configurations");
                    self.orchestrator.update_all()?;
                } else {
                    for package in packages {
                        self.orchestrator.update(package)?;
                    }
                }
            }

            Commands::Run { package, args } => {
                let exit = self.orchestrator.run(package, args)?;
                if !exit.success() {
                    let status = exit
                        .code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "a signal".to_string());
                    return Err(PimError::Engine(EngineError::new(
                        EngineOperation::RunContainer,
                        format!("{} exited with {}", package, status),
                    )));
                }
            }

            Commands::Version => {
                println!("{}", version_line());
            }
        }

        self.context.verbose(&format!("Finished in {:.2}s", self.context.elapsed().as_secs_f64()));
        Ok(())
    }
}

/// Text printed by the `version` command
pub fn version_line() -> String {
    format!("Packageless Version: v{}", VERSION)
}

//! Main entry point for the contract deployer.
//!
//! Deploys the artifacts declared in a TOML configuration to a named network,
//! in dependency order, linking libraries and passing deployed addresses into
//! dependents' constructors.
//!
//! ```bash
//! deployer plan
//! deployer networks
//! deployer deploy development --output deployments.json
//! ```
//!
//! Exit codes: `0` when every artifact is deployed, `1` when a deployment
//! halted part-way, `2` for configuration or plan errors.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use deployer_core::ExecutionError;
use output::Display;
use std::path::PathBuf;
use std::process::ExitCode;

/// Command-line arguments for the deployer.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "deployer.toml", env = "DEPLOYER_CONFIG", global = true)]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info", global = true)]
	log_level: String,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Print the deployment order without contacting any network
	Plan,
	/// Deploy every artifact to a network
	Deploy {
		/// Network name; the configured default when omitted
		network: Option<String>,

		/// Write the deployment report as JSON to this file
		#[arg(short, long)]
		output: Option<PathBuf>,
	},
	/// List the configured networks
	Networks,
}

/// Exit code for a deployment that halted part-way.
const EXIT_HALTED: u8 = 1;
/// Exit code for configuration and plan errors.
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt().with_env_filter(env_filter).with_target(true).init();

	match run(args).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			let code = exit_code(&err);
			if code == EXIT_CONFIG {
				Display::error(&format!("{err:#}"));
			}
			ExitCode::from(code)
		},
	}
}

async fn run(args: Args) -> anyhow::Result<()> {
	let config = commands::load_config(&args.config).await?;

	match args.command {
		Commands::Plan => commands::plan(&config),
		Commands::Deploy { network, output } => {
			commands::deploy(&config, network.as_deref(), output).await
		},
		Commands::Networks => commands::networks(&config),
	}
}

/// Halted deployments already reported their failing artifact; everything
/// else is a setup problem.
fn exit_code(err: &anyhow::Error) -> u8 {
	if err.downcast_ref::<ExecutionError>().is_some() {
		EXIT_HALTED
	} else {
		EXIT_CONFIG
	}
}

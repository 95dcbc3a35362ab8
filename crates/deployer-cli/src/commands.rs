//! Subcommand implementations.

use crate::output::{DeploymentOutput, Display};
use anyhow::{anyhow, Context};
use deployer_config::Config;
use deployer_core::{
	build_plan, select_network, DeploymentEngine, DeploymentPlan, ExecutionError,
	FileArtifactSource,
};
use deployer_delivery::implementations::evm::alloy::AlloyDelivery;
use deployer_delivery::DeliveryInterface;
use deployer_types::{Connection, DeploymentRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Loads and validates the configuration file.
pub async fn load_config(path: &Path) -> anyhow::Result<Config> {
	let config = Config::from_file(path)
		.await
		.with_context(|| format!("Failed to load configuration from {}", path.display()))?;
	tracing::info!(
		networks = config.networks.len(),
		artifacts = config.artifacts.deploy.len(),
		"Loaded configuration"
	);
	Ok(config)
}

/// Prints the deployment order without touching any network.
pub fn plan(config: &Config) -> anyhow::Result<()> {
	let plan = build_plan(&config.artifacts.deploy)?;

	Display::header("Deployment plan");
	print_plan(&plan);
	Display::info(&format!(
		"{} artifacts from {}",
		plan.len(),
		config.artifacts.directory.display()
	));
	Ok(())
}

fn print_plan(plan: &DeploymentPlan) {
	for step in plan.steps() {
		let artifact = &step.artifact;
		let mut detail = vec![artifact.kind.to_string()];
		if !artifact.libraries.is_empty() {
			detail.push(format!("links {}", artifact.libraries.join(", ")));
		}
		let references: Vec<_> = artifact.referenced_artifacts().collect();
		if !references.is_empty() {
			detail.push(format!("uses {}", references.join(", ")));
		}
		println!("  {}. {} ({})", step.index + 1, artifact.name, detail.join("; "));
	}
}

/// Lists the configured networks.
pub fn networks(config: &Config) -> anyhow::Result<()> {
	Display::header("Networks");
	for (name, network) in &config.networks {
		let marker = if config.default_network() == Some(name.as_str()) {
			" (default)"
		} else {
			""
		};
		Display::section(&format!("{name}{marker}"));
		match network.connection()? {
			Connection::Direct { url, from } => {
				Display::kv("url", &url);
				Display::kv(
					"from",
					&from.map_or_else(|| "first node account".to_string(), |a| a.to_string()),
				);
			},
			Connection::Signing { url, .. } => {
				Display::kv("url", url);
				Display::kv("signer", "private key");
			},
		}
		Display::kv("network id", &network.network_id.to_string());
		if let Some(gas) = network.gas {
			Display::kv("gas", &gas.to_string());
		}
		if let Some(gas_price) = network.gas_price {
			Display::kv("gas price", &gas_price.to_string());
		}
		Display::kv("confirmations", &network.confirmations.to_string());
	}
	Ok(())
}

/// Deploys every artifact to the named network.
///
/// Records confirmed before a failure are still printed and written to the
/// output file, so the addresses of a halted run are never lost.
pub async fn deploy(
	config: &Config,
	network_name: Option<&str>,
	output: Option<PathBuf>,
) -> anyhow::Result<()> {
	let network_name = network_name
		.or_else(|| config.default_network())
		.ok_or_else(|| anyhow!("No network given and no default_network configured"))?;
	let network = select_network(network_name, &config.networks)?;
	let plan = build_plan(&config.artifacts.deploy)?;
	tracing::debug!(order = ?plan.names().collect::<Vec<_>>(), "Built deployment plan");
	let output = output.or_else(|| config.deployment.output.clone());

	let delivery = Arc::new(AlloyDelivery::new(&network)?);
	let chain_id = delivery
		.chain_id()
		.await
		.with_context(|| format!("Failed to reach network '{network_name}'"))?;

	Display::header(&format!("Deploying to {network_name}"));
	Display::kv("rpc", &network.rpc_url()?);
	Display::kv("chain id", &chain_id.to_string());
	print_plan(&plan);

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			tracing::warn!("Interrupt received, cancelling the pending step");
			let _ = shutdown_tx.send(true);
		}
	});

	let engine = DeploymentEngine::new(
		delivery,
		Arc::new(FileArtifactSource::new(&config.artifacts.directory)),
	)
	.with_shutdown(shutdown_rx);

	match engine.execute(&plan, &network).await {
		Ok(records) => {
			Display::section("Deployed");
			Display::records(&records);
			write_output(output.as_deref(), network_name, chain_id, &records)?;
			Display::success(&format!(
				"{} artifacts deployed to {network_name}",
				records.len()
			));
			Ok(())
		},
		Err(err) => Err(halted(err, output.as_deref(), network_name, chain_id)),
	}
}

/// Reports a halted run and writes its partial records.
///
/// The execution error is returned even when the report cannot be written.
fn halted(
	err: ExecutionError,
	output: Option<&Path>,
	network: &str,
	chain_id: u64,
) -> anyhow::Error {
	report_failure(&err);
	if let Err(write_err) = write_output(output, network, chain_id, &err.completed) {
		Display::error(&format!("{write_err:#}"));
	}
	err.into()
}

fn report_failure(err: &ExecutionError) {
	if !err.completed.is_empty() {
		Display::section("Deployed before the failure");
		Display::records(&err.completed);
	}
	match err.failed_artifact() {
		Some(artifact) => Display::error(&format!("{artifact}: {}", err.kind)),
		None => Display::error(&err.kind.to_string()),
	}
	if err.failed_step.is_some() {
		Display::warning("Nothing is retried automatically; a rerun deploys every artifact again");
	}
}

fn write_output(
	path: Option<&Path>,
	network: &str,
	chain_id: u64,
	records: &[DeploymentRecord],
) -> anyhow::Result<()> {
	let Some(path) = path else {
		return Ok(());
	};
	DeploymentOutput::new(network, chain_id, records)
		.write(path)
		.with_context(|| format!("Failed to write {}", path.display()))?;
	Display::info(&format!("Wrote {}", path.display()));
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Address, B256};
	use chrono::Utc;
	use deployer_core::{DeployError, FailedStep};

	const CONFIG: &str = r#"
[networks.development]
host = "localhost"
port = 8545

[artifacts]
directory = "build"

[[artifacts.deploy]]
name = "ECRecovery"
kind = "library"

[[artifacts.deploy]]
name = "ChannelManager"
libraries = ["ECRecovery"]
"#;

	#[tokio::test]
	async fn test_load_config_resolves_directory() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("deployer.toml");
		std::fs::write(&path, CONFIG).unwrap();

		let config = load_config(&path).await.unwrap();
		assert_eq!(config.artifacts.directory, dir.path().join("build"));
		assert!(plan(&config).is_ok());
		assert!(networks(&config).is_ok());
	}

	#[tokio::test]
	async fn test_load_missing_config() {
		let err = load_config(Path::new("/nonexistent/deployer.toml"))
			.await
			.unwrap_err();
		assert!(err.to_string().contains("Failed to load configuration"));
	}

	#[tokio::test]
	async fn test_deploy_unknown_network() {
		let config: Config = CONFIG.parse().unwrap();
		let err = deploy(&config, Some("staging"), None).await.unwrap_err();
		assert!(err.to_string().contains("staging"));
		assert!(err.downcast_ref::<ExecutionError>().is_none());
	}

	#[tokio::test]
	async fn test_deploy_without_network() {
		let config: Config = CONFIG.parse().unwrap();
		let err = deploy(&config, None, None).await.unwrap_err();
		assert!(err.to_string().contains("default_network"));
	}

	fn halted_run() -> ExecutionError {
		ExecutionError {
			completed: vec![DeploymentRecord {
				artifact_name: "PapyrusToken".to_string(),
				address: Address::repeat_byte(0x11),
				transaction_hash: B256::repeat_byte(0x11),
				block_number: 7,
				confirmed_at: Utc::now(),
			}],
			failed_step: Some(FailedStep {
				index: 1,
				artifact: "ChannelManager".to_string(),
			}),
			kind: DeployError::TransactionTimeout {
				artifact: "ChannelManager".to_string(),
				reason: "no receipt".to_string(),
			},
		}
	}

	#[test]
	fn test_halted_run_writes_partial_records() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("deployments.json");

		let err = halted(halted_run(), Some(&path), "development", 1337);
		assert!(err.downcast_ref::<ExecutionError>().is_some());

		let written: serde_json::Value =
			serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
		assert_eq!(
			written["contracts"]["PapyrusToken"],
			"0x1111111111111111111111111111111111111111"
		);
	}

	#[test]
	fn test_halted_run_keeps_error_when_output_fails() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("missing").join("deployments.json");

		let err = halted(halted_run(), Some(&path), "development", 1337);
		let execution = err.downcast_ref::<ExecutionError>().unwrap();
		assert_eq!(execution.failed_artifact(), Some("ChannelManager"));
		assert!(!path.exists());
	}
}

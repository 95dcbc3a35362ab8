//! Configuration module for the contract deployment pipeline.
//!
//! A single TOML file declares the networks a deployment can target and the
//! ordered list of artifacts to deploy:
//!
//! ```toml
//! [deployment]
//! default_network = "development"
//!
//! [networks.development]
//! host = "localhost"
//! port = 8545
//! network_id = "*"
//!
//! [artifacts]
//! directory = "build/contracts"
//!
//! [[artifacts.deploy]]
//! name = "ECRecovery"
//! kind = "library"
//! ```
//!
//! `${VAR}` and `${VAR:-default}` are substituted from the environment before
//! parsing, so private keys never need to be written into the file.

use deployer_types::{Artifact, ArtifactKind, NetworksConfig};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only, the full error echoes the whole input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the deployer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Run-level settings.
	#[serde(default)]
	pub deployment: DeploymentSettings,
	/// Networks a deployment can target, keyed by name.
	pub networks: NetworksConfig,
	/// Build output location and the artifact graph.
	pub artifacts: ArtifactsConfig,
}

/// Run-level settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeploymentSettings {
	/// Network used when none is given on the command line.
	pub default_network: Option<String>,
	/// File the deployment records are written to after a run.
	pub output: Option<PathBuf>,
}

/// Build output location and the artifacts to deploy, in declaration order.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactsConfig {
	/// Directory holding compiled artifacts. Relative paths are resolved
	/// against the configuration file's directory.
	#[serde(default = "default_artifacts_directory")]
	pub directory: PathBuf,
	/// Artifacts in declaration order.
	#[serde(default)]
	pub deploy: Vec<Artifact>,
}

/// Returns the default artifacts directory, matching truffle's build layout.
fn default_artifacts_directory() -> PathBuf {
	PathBuf::from("build/contracts")
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {e}")))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)));
				},
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file.
	///
	/// Environment variables are loaded from a `.env` file in the current
	/// working directory first, if one exists. A relative artifacts directory
	/// is resolved against the configuration file's directory.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let _ = dotenvy::dotenv();

		let contents = tokio::fs::read_to_string(path).await?;
		let mut config: Config = contents.parse()?;

		if config.artifacts.directory.is_relative() {
			let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
			config.artifacts.directory = base_dir.join(&config.artifacts.directory);
		}

		tracing::debug!(
			path = %path.display(),
			networks = config.networks.len(),
			artifacts = config.artifacts.deploy.len(),
			"Loaded deployment configuration"
		);
		Ok(config)
	}

	/// Name of the network to use when the caller does not pick one.
	pub fn default_network(&self) -> Option<&str> {
		self.deployment.default_network.as_deref()
	}

	/// Validates the configuration.
	///
	/// - At least one network and one artifact are declared
	/// - Every network has exactly one way to connect, sane confirmation and
	///   timeout values
	/// - The default network, if set, exists
	/// - Artifact names are unique and non-empty
	/// - Linked libraries and constructor references name declared artifacts,
	///   and linked artifacts are libraries
	fn validate(&self) -> Result<(), ConfigError> {
		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"At least one network must be configured".into(),
			));
		}

		for (name, network) in &self.networks {
			network
				.connection()
				.map_err(|e| ConfigError::Validation(format!("Network '{name}': {e}")))?;

			if network.confirmations == 0 || network.confirmations > 100 {
				return Err(ConfigError::Validation(format!(
					"Network '{name}': confirmations must be between 1 and 100"
				)));
			}
			if network.receipt_timeout_seconds == 0 {
				return Err(ConfigError::Validation(format!(
					"Network '{name}': receipt_timeout_seconds must be greater than 0"
				)));
			}
		}

		if let Some(default) = self.default_network() {
			if !self.networks.contains_key(default) {
				return Err(ConfigError::Validation(format!(
					"Default network '{default}' is not configured"
				)));
			}
		}

		self.validate_artifacts()
	}

	fn validate_artifacts(&self) -> Result<(), ConfigError> {
		let artifacts = &self.artifacts.deploy;
		if artifacts.is_empty() {
			return Err(ConfigError::Validation(
				"At least one artifact must be declared".into(),
			));
		}

		let mut names = HashSet::new();
		for artifact in artifacts {
			if artifact.name.trim().is_empty() {
				return Err(ConfigError::Validation(
					"Artifact name cannot be empty".into(),
				));
			}
			if !names.insert(artifact.name.as_str()) {
				return Err(ConfigError::Validation(format!(
					"Artifact '{}' is declared more than once",
					artifact.name
				)));
			}
		}

		for artifact in artifacts {
			for library in &artifact.libraries {
				let target = artifacts.iter().find(|a| &a.name == library).ok_or_else(|| {
					ConfigError::Validation(format!(
						"Artifact '{}' links unknown library '{library}'",
						artifact.name
					))
				})?;
				if target.kind != ArtifactKind::Library {
					return Err(ConfigError::Validation(format!(
						"Artifact '{}' links '{library}', which is not a library",
						artifact.name
					)));
				}
			}

			for reference in artifact.referenced_artifacts() {
				if !names.contains(reference) {
					return Err(ConfigError::Validation(format!(
						"Artifact '{}' references unknown artifact '{reference}'",
						artifact.name
					)));
				}
			}
		}

		Ok(())
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

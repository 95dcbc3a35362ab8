//! Compiled artifact registry.
//!
//! Maps a build-output name to its creation bytecode and ABI. The bytecode is
//! kept as hex text because it may still contain library placeholders.

use alloy_json_abi::JsonAbi;
use async_trait::async_trait;
use deployer_types::without_0x_prefix;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading compiled artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
	#[error("Compiled artifact '{name}' not found in {directory}")]
	NotFound { name: String, directory: String },
	#[error("Failed to read {path}: {reason}")]
	Io { path: String, reason: String },
	#[error("Invalid artifact {path}: {reason}")]
	Parse { path: String, reason: String },
	/// Abstract contracts and interfaces compile to empty bytecode.
	#[error("Compiled artifact '{0}' has no creation bytecode")]
	EmptyBytecode(String),
}

/// Creation bytecode and ABI of one compiled contract or library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
	pub name: String,
	/// Hex creation bytecode without `0x`, possibly unlinked.
	pub bytecode: String,
	pub abi: JsonAbi,
}

impl CompiledArtifact {
	/// Creates an artifact, normalising the bytecode to unprefixed hex.
	pub fn new(
		name: impl Into<String>,
		bytecode: &str,
		abi: JsonAbi,
	) -> Result<Self, ArtifactError> {
		let name = name.into();
		let bytecode = without_0x_prefix(bytecode.trim());
		if bytecode.is_empty() {
			return Err(ArtifactError::EmptyBytecode(name));
		}
		Ok(Self {
			name,
			bytecode: bytecode.to_string(),
			abi,
		})
	}
}

/// Trait for looking up compiled artifacts by build-output name.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
	async fn load(&self, name: &str) -> Result<CompiledArtifact, ArtifactError>;
}

/// Artifacts held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactSource {
	artifacts: HashMap<String, CompiledArtifact>,
}

impl MemoryArtifactSource {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, artifact: CompiledArtifact) {
		self.artifacts.insert(artifact.name.clone(), artifact);
	}

	pub fn with(mut self, artifact: CompiledArtifact) -> Self {
		self.insert(artifact);
		self
	}
}

#[async_trait]
impl ArtifactSource for MemoryArtifactSource {
	async fn load(&self, name: &str) -> Result<CompiledArtifact, ArtifactError> {
		self.artifacts
			.get(name)
			.cloned()
			.ok_or_else(|| ArtifactError::NotFound {
				name: name.to_string(),
				directory: "memory".to_string(),
			})
	}
}

/// Artifacts read from a build output directory.
///
/// Looks for, in order:
/// - `<name>.json` with a `bytecode` string (truffle) or `bytecode.object`
///   (foundry, solc standard JSON)
/// - `<name>.sol/<name>.json` (foundry `out/` layout)
/// - `<name>.bin` with an optional `<name>.abi` (`solc --bin --abi`)
#[derive(Debug, Clone)]
pub struct FileArtifactSource {
	directory: PathBuf,
}

impl FileArtifactSource {
	pub fn new(directory: impl Into<PathBuf>) -> Self {
		Self {
			directory: directory.into(),
		}
	}

	fn json_candidates(&self, name: &str) -> [PathBuf; 2] {
		[
			self.directory.join(format!("{name}.json")),
			self.directory
				.join(format!("{name}.sol"))
				.join(format!("{name}.json")),
		]
	}

	async fn load_json(&self, name: &str, path: &Path) -> Result<CompiledArtifact, ArtifactError> {
		let content = read(path).await?;
		let json: Value = serde_json::from_str(&content).map_err(|e| parse_error(path, e))?;

		let bytecode = extract_bytecode(&json).ok_or_else(|| ArtifactError::Parse {
			path: path.display().to_string(),
			reason: "no bytecode found".to_string(),
		})?;
		let abi = match json.get("abi") {
			Some(abi) => serde_json::from_value(abi.clone()).map_err(|e| parse_error(path, e))?,
			None => JsonAbi::new(),
		};

		CompiledArtifact::new(name, bytecode, abi)
	}

	async fn load_bin(&self, name: &str, bin: &Path) -> Result<CompiledArtifact, ArtifactError> {
		let bytecode = read(bin).await?;
		let abi_path = self.directory.join(format!("{name}.abi"));
		let abi = if tokio::fs::try_exists(&abi_path).await.unwrap_or(false) {
			let content = read(&abi_path).await?;
			serde_json::from_str(&content).map_err(|e| parse_error(&abi_path, e))?
		} else {
			JsonAbi::new()
		};

		CompiledArtifact::new(name, &bytecode, abi)
	}
}

#[async_trait]
impl ArtifactSource for FileArtifactSource {
	async fn load(&self, name: &str) -> Result<CompiledArtifact, ArtifactError> {
		for path in self.json_candidates(name) {
			if tokio::fs::try_exists(&path).await.unwrap_or(false) {
				tracing::debug!(artifact = %name, path = %path.display(), "Loading compiled artifact");
				return self.load_json(name, &path).await;
			}
		}

		let bin = self.directory.join(format!("{name}.bin"));
		if tokio::fs::try_exists(&bin).await.unwrap_or(false) {
			tracing::debug!(artifact = %name, path = %bin.display(), "Loading compiled artifact");
			return self.load_bin(name, &bin).await;
		}

		Err(ArtifactError::NotFound {
			name: name.to_string(),
			directory: self.directory.display().to_string(),
		})
	}
}

/// Creation bytecode from truffle (`bytecode`), foundry (`bytecode.object`)
/// or solc standard JSON (`evm.bytecode.object`) output.
fn extract_bytecode(json: &Value) -> Option<&str> {
	match json.get("bytecode") {
		Some(Value::String(code)) => Some(code.as_str()),
		Some(object) => object.get("object").and_then(Value::as_str),
		None => json
			.get("evm")
			.and_then(|evm| evm.get("bytecode"))
			.and_then(|bytecode| bytecode.get("object"))
			.and_then(Value::as_str),
	}
}

async fn read(path: &Path) -> Result<String, ArtifactError> {
	tokio::fs::read_to_string(path)
		.await
		.map_err(|e| ArtifactError::Io {
			path: path.display().to_string(),
			reason: e.to_string(),
		})
}

fn parse_error(path: &Path, err: serde_json::Error) -> ArtifactError {
	ArtifactError::Parse {
		path: path.display().to_string(),
		reason: err.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	const TOKEN_ABI: &str = r#"[{"type":"constructor","inputs":[{"name":"_owners","type":"address[]"},{"name":"_balances","type":"uint256[]"}],"stateMutability":"nonpayable"}]"#;

	#[tokio::test]
	async fn test_truffle_artifact() {
		let dir = TempDir::new().unwrap();
		std::fs::write(
			dir.path().join("PapyrusToken.json"),
			format!(r#"{{"contractName":"PapyrusToken","abi":{TOKEN_ABI},"bytecode":"0x6080"}}"#),
		)
		.unwrap();

		let source = FileArtifactSource::new(dir.path());
		let artifact = source.load("PapyrusToken").await.unwrap();
		assert_eq!(artifact.bytecode, "6080");
		let constructor = artifact.abi.constructor.unwrap();
		assert_eq!(constructor.inputs.len(), 2);
	}

	#[tokio::test]
	async fn test_foundry_artifact() {
		let dir = TempDir::new().unwrap();
		let out = dir.path().join("ECRecovery.sol");
		std::fs::create_dir(&out).unwrap();
		std::fs::write(
			out.join("ECRecovery.json"),
			r#"{"abi":[],"bytecode":{"object":"0x6001","linkReferences":{}}}"#,
		)
		.unwrap();

		let source = FileArtifactSource::new(dir.path());
		let artifact = source.load("ECRecovery").await.unwrap();
		assert_eq!(artifact.bytecode, "6001");
		assert!(artifact.abi.constructor.is_none());
	}

	#[tokio::test]
	async fn test_solc_bin_and_abi() {
		let dir = TempDir::new().unwrap();
		std::fs::write(dir.path().join("EndpointRegistry.bin"), "6080604052\n").unwrap();
		std::fs::write(dir.path().join("EndpointRegistry.abi"), "[]").unwrap();

		let source = FileArtifactSource::new(dir.path());
		let artifact = source.load("EndpointRegistry").await.unwrap();
		assert_eq!(artifact.bytecode, "6080604052");
	}

	#[tokio::test]
	async fn test_missing_artifact() {
		let dir = TempDir::new().unwrap();
		let source = FileArtifactSource::new(dir.path());

		let err = source.load("ChannelManager").await.unwrap_err();
		assert!(matches!(err, ArtifactError::NotFound { name, .. } if name == "ChannelManager"));
	}

	#[tokio::test]
	async fn test_interface_has_no_bytecode() {
		let dir = TempDir::new().unwrap();
		std::fs::write(dir.path().join("IToken.json"), r#"{"abi":[],"bytecode":"0x"}"#).unwrap();

		let source = FileArtifactSource::new(dir.path());
		let err = source.load("IToken").await.unwrap_err();
		assert!(matches!(err, ArtifactError::EmptyBytecode(name) if name == "IToken"));
	}

	#[tokio::test]
	async fn test_memory_source() {
		let source = MemoryArtifactSource::new()
			.with(CompiledArtifact::new("ECRecovery", "0x6001", JsonAbi::new()).unwrap());

		assert_eq!(source.load("ECRecovery").await.unwrap().bytecode, "6001");
		assert!(source.load("PapyrusToken").await.is_err());
	}
}

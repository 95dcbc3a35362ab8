//! Artifact types for the deployment graph.
//!
//! An artifact is a named deployable unit, either a library that other
//! artifacts link against or a standalone contract. Artifacts declare the
//! edges of the deployment graph through the libraries they link and through
//! constructor arguments that refer to another artifact's deployed address.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an artifact is linked into other bytecode or deployed on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
	Library,
	#[default]
	Contract,
}

impl fmt::Display for ArtifactKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Library => write!(f, "library"),
			Self::Contract => write!(f, "contract"),
		}
	}
}

/// A single constructor argument.
///
/// Literal values are encoded as-is. The `Artifact` variant is a reference to
/// another artifact in the same graph and is replaced by that artifact's
/// deployed address once it has been confirmed.
///
/// In TOML each argument is a single-key inline table:
///
/// ```toml
/// args = [{ address_array = ["0xabe512f3fbd401fb6f26aa7acb856a1e514d9672"] }, { artifact = "Token" }]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructorArg {
	Address(Address),
	Uint(U256),
	String(String),
	Bool(bool),
	Bytes(Bytes),
	AddressArray(Vec<Address>),
	UintArray(Vec<U256>),
	/// Deployed address of the named artifact.
	Artifact(String),
}

/// Returned when a constructor argument references an artifact that has no
/// deployed address yet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("artifact '{0}' has no deployed address")]
pub struct UnresolvedArtifact(pub String);

impl ConstructorArg {
	/// Returns the referenced artifact name for `Artifact` arguments.
	pub fn artifact_reference(&self) -> Option<&str> {
		match self {
			Self::Artifact(name) => Some(name),
			_ => None,
		}
	}

	/// Converts the argument into an ABI value.
	///
	/// `resolve` maps an artifact name to its deployed address. References
	/// that `resolve` cannot answer are reported as [`UnresolvedArtifact`];
	/// no placeholder address is ever substituted.
	pub fn to_sol_value<F>(&self, resolve: F) -> Result<DynSolValue, UnresolvedArtifact>
	where
		F: Fn(&str) -> Option<Address>,
	{
		let value = match self {
			Self::Address(address) => DynSolValue::Address(*address),
			Self::Uint(value) => DynSolValue::Uint(*value, 256),
			Self::String(value) => DynSolValue::String(value.clone()),
			Self::Bool(value) => DynSolValue::Bool(*value),
			Self::Bytes(value) => DynSolValue::Bytes(value.to_vec()),
			Self::AddressArray(values) => {
				DynSolValue::Array(values.iter().copied().map(DynSolValue::Address).collect())
			},
			Self::UintArray(values) => DynSolValue::Array(
				values
					.iter()
					.map(|value| DynSolValue::Uint(*value, 256))
					.collect(),
			),
			Self::Artifact(name) => {
				let address = resolve(name).ok_or_else(|| UnresolvedArtifact(name.clone()))?;
				DynSolValue::Address(address)
			},
		};
		Ok(value)
	}
}

/// A node of the deployment graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
	/// Unique name of this deployment.
	pub name: String,
	#[serde(default)]
	pub kind: ArtifactKind,
	/// Build output to deploy, when it differs from `name`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub artifact: Option<String>,
	/// Label used for this library inside dependents' link placeholders.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub link_name: Option<String>,
	#[serde(default, rename = "args")]
	pub constructor_args: Vec<ConstructorArg>,
	/// Names of the library artifacts this artifact's bytecode links against.
	#[serde(default)]
	pub libraries: Vec<String>,
}

impl Artifact {
	fn new(name: impl Into<String>, kind: ArtifactKind) -> Self {
		Self {
			name: name.into(),
			kind,
			artifact: None,
			link_name: None,
			constructor_args: Vec::new(),
			libraries: Vec::new(),
		}
	}

	/// Creates a library artifact with no dependencies.
	pub fn library(name: impl Into<String>) -> Self {
		Self::new(name, ArtifactKind::Library)
	}

	/// Creates a contract artifact with no dependencies.
	pub fn contract(name: impl Into<String>) -> Self {
		Self::new(name, ArtifactKind::Contract)
	}

	/// Appends a constructor argument.
	pub fn with_arg(mut self, arg: ConstructorArg) -> Self {
		self.constructor_args.push(arg);
		self
	}

	/// Adds a library this artifact links against.
	pub fn linking(mut self, library: impl Into<String>) -> Self {
		self.libraries.push(library.into());
		self
	}

	/// Deploys the named build output instead of the one matching `name`.
	pub fn from_build(mut self, artifact: impl Into<String>) -> Self {
		self.artifact = Some(artifact.into());
		self
	}

	/// Overrides the placeholder label used when linking this library.
	pub fn with_link_name(mut self, link_name: impl Into<String>) -> Self {
		self.link_name = Some(link_name.into());
		self
	}

	/// Name of the build output holding this artifact's bytecode and ABI.
	pub fn build_name(&self) -> &str {
		self.artifact.as_deref().unwrap_or(&self.name)
	}

	/// Label dependents use for this library in their link placeholders.
	pub fn link_name(&self) -> &str {
		self.link_name.as_deref().unwrap_or(&self.name)
	}

	pub fn is_library(&self) -> bool {
		self.kind == ArtifactKind::Library
	}

	/// Artifact names referenced by constructor arguments, in argument order.
	pub fn referenced_artifacts(&self) -> impl Iterator<Item = &str> {
		self.constructor_args
			.iter()
			.filter_map(ConstructorArg::artifact_reference)
	}

	/// Every artifact that must be confirmed before this one is deployed.
	///
	/// Linked libraries come first, then constructor references; duplicates
	/// are dropped while keeping first-seen order.
	pub fn dependencies(&self) -> Vec<&str> {
		let mut dependencies: Vec<&str> = Vec::new();
		for name in self
			.libraries
			.iter()
			.map(String::as_str)
			.chain(self.referenced_artifacts())
		{
			if !dependencies.contains(&name) {
				dependencies.push(name);
			}
		}
		dependencies
	}
}

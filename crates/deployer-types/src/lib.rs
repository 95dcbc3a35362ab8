//! Common types for the contract deployment pipeline.
//!
//! This crate holds the data model shared by configuration loading,
//! transaction delivery and the deployment engine: the artifacts that make up
//! the deployment graph, the records produced for confirmed deployments, and
//! the network settings used to reach a chain.

/// Artifacts, their kinds and constructor arguments.
pub mod artifact;
/// Deployment receipts and records.
pub mod deployment;
/// Named network configuration.
pub mod networks;
/// Redacting wrapper for private keys.
pub mod secret_string;
/// Hex string helpers.
pub mod utils;

pub use artifact::{Artifact, ArtifactKind, ConstructorArg, UnresolvedArtifact};
pub use deployment::{DeploymentReceipt, DeploymentRecord};
pub use networks::{
	Connection, NetworkConfig, NetworkConfigError, NetworkIdMatcher, NetworksConfig,
	SigningProvider,
};
pub use secret_string::SecretString;
pub use utils::without_0x_prefix;

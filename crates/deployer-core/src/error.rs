//! Error kinds produced while planning and executing a deployment.

use crate::artifacts::ArtifactError;
use crate::linker::LinkError;
use deployer_delivery::DeliveryError;
use deployer_types::{DeploymentRecord, NetworkIdMatcher};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while planning or executing a deployment.
#[derive(Debug, Error)]
pub enum DeployError {
	/// The artifact graph contains a cycle; lists the artifacts left unordered.
	#[error("Cyclic dependency among: {}", .0.join(", "))]
	CyclicDependency(Vec<String>),
	#[error("Unknown network '{0}'")]
	UnknownNetwork(String),
	/// A constructor argument references an artifact with no deployment record.
	#[error("Artifact '{artifact}' references '{reference}', which has not been deployed")]
	UnresolvedReference { artifact: String, reference: String },
	/// A library placeholder could not be linked.
	#[error("Artifact '{artifact}' is missing a link to library '{library}'")]
	MissingLink { artifact: String, library: String },
	#[error("Deployment of '{artifact}' was rejected: {reason}")]
	TransactionRejected { artifact: String, reason: String },
	#[error("Deployment of '{artifact}' timed out: {reason}")]
	TransactionTimeout { artifact: String, reason: String },
	/// The wait was aborted; the transaction may still be mined.
	#[error("Deployment of '{artifact}' was cancelled; its outcome is unknown")]
	Cancelled { artifact: String },
	#[error("Connected chain id {actual} does not match network id {expected}")]
	NetworkMismatch {
		expected: NetworkIdMatcher,
		actual: u64,
	},
	#[error("Artifact '{0}' is declared more than once")]
	DuplicateArtifact(String),
	#[error("Artifact '{artifact}' depends on undeclared artifact '{dependency}'")]
	UnknownDependency { artifact: String, dependency: String },
	#[error("Artifact '{artifact}' links '{library}', which is not a library")]
	NotALibrary { artifact: String, library: String },
	#[error(transparent)]
	Artifact(#[from] ArtifactError),
	#[error(transparent)]
	Link(#[from] LinkError),
	#[error("Failed to encode constructor arguments for '{artifact}': {reason}")]
	Encoding { artifact: String, reason: String },
	#[error(transparent)]
	Delivery(#[from] DeliveryError),
}

/// Position of the plan step a run stopped at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedStep {
	pub index: usize,
	pub artifact: String,
}

/// A halted run.
///
/// Carries the records of every step confirmed strictly before the failure
/// and, when the failure belongs to a step, which one.
#[derive(Debug)]
pub struct ExecutionError {
	pub completed: Vec<DeploymentRecord>,
	pub failed_step: Option<FailedStep>,
	pub kind: DeployError,
}

impl ExecutionError {
	pub(crate) fn before_start(kind: DeployError) -> Self {
		Self {
			completed: Vec::new(),
			failed_step: None,
			kind,
		}
	}

	pub(crate) fn at_step(
		completed: Vec<DeploymentRecord>,
		index: usize,
		artifact: &str,
		kind: DeployError,
	) -> Self {
		Self {
			completed,
			failed_step: Some(FailedStep {
				index,
				artifact: artifact.to_string(),
			}),
			kind,
		}
	}

	/// Name of the artifact whose step failed, if any.
	pub fn failed_artifact(&self) -> Option<&str> {
		self.failed_step.as_ref().map(|step| step.artifact.as_str())
	}
}

impl fmt::Display for ExecutionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.failed_step {
			Some(step) => write!(
				f,
				"step {} ({}) failed: {}",
				step.index, step.artifact, self.kind
			),
			None => write!(f, "{}", self.kind),
		}
	}
}

impl std::error::Error for ExecutionError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		Some(&self.kind)
	}
}

//! Transaction delivery module for the contract deployment pipeline.
//!
//! This module handles the submission and monitoring of contract-creation
//! transactions. The orchestrator only ever talks to a [`DeliveryInterface`],
//! so the network can be swapped for a mock in tests.

use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use deployer_types::DeploymentReceipt;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

/// Errors that can occur during transaction delivery operations.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// Error that occurs during network communication or provider setup.
	#[error("Network error: {0}")]
	Network(String),
	/// The node refused the transaction.
	#[error("Transaction rejected: {0}")]
	Rejected(String),
	/// No confirmation arrived within the configured bound.
	#[error("Timed out: {0}")]
	Timeout(String),
}

/// Trait defining the interface for deployment delivery implementations.
///
/// One creation transaction is in flight at a time: the caller submits,
/// then awaits confirmation before submitting the next one.
#[async_trait]
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait DeliveryInterface: Send + Sync {
	/// Chain id reported by the connected node.
	async fn chain_id(&self) -> Result<u64, DeliveryError>;

	/// Sends a contract-creation transaction carrying `bytecode` (linked
	/// creation code followed by encoded constructor arguments).
	///
	/// Returns the transaction hash once the node has accepted it.
	async fn submit_deployment(&self, bytecode: Bytes) -> Result<B256, DeliveryError>;

	/// Suspends until the transaction is mined with the configured number of
	/// confirmations, or the configured timeout elapses.
	async fn wait_for_confirmation(&self, hash: B256) -> Result<DeploymentReceipt, DeliveryError>;
}

//! Deployment engine that executes a plan against one network.
//!
//! Steps run strictly one after another. For each step the engine resolves
//! constructor references from the records confirmed so far, links library
//! addresses into the bytecode, encodes the constructor arguments, submits
//! the creation transaction and waits for its confirmation before moving on.
//! The first failure stops the run.

use crate::artifacts::ArtifactSource;
use crate::error::{DeployError, ExecutionError};
use crate::linker::Linker;
use crate::plan::{DeploymentPlan, PlanStep};
use alloy_dyn_abi::{DynSolValue, JsonAbiExt};
use alloy_json_abi::JsonAbi;
use alloy_primitives::Bytes;
use chrono::Utc;
use deployer_delivery::{DeliveryError, DeliveryInterface};
use deployer_types::{DeploymentRecord, NetworkConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::instrument;

/// Executes deployment plans.
pub struct DeploymentEngine {
	/// Delivery for the selected network.
	delivery: Arc<dyn DeliveryInterface>,
	/// Source of compiled bytecode and ABIs.
	artifacts: Arc<dyn ArtifactSource>,
	/// Set to `true` to abort the run.
	shutdown: Option<watch::Receiver<bool>>,
}

impl DeploymentEngine {
	pub fn new(delivery: Arc<dyn DeliveryInterface>, artifacts: Arc<dyn ArtifactSource>) -> Self {
		Self {
			delivery,
			artifacts,
			shutdown: None,
		}
	}

	/// Aborts the run once `shutdown` turns `true`.
	///
	/// A step waiting for confirmation is reported as
	/// [`DeployError::Cancelled`]; its transaction may still be mined.
	pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
		self.shutdown = Some(shutdown);
		self
	}

	/// Executes `plan` against `network`.
	///
	/// The connected chain id is checked against the network's matcher before
	/// anything is sent.
	///
	/// # Returns
	///
	/// One record per step, in plan order.
	///
	/// # Errors
	///
	/// Returns an [`ExecutionError`] carrying the records of every step
	/// confirmed before the failure and the failing step, if any.
	pub async fn execute(
		&self,
		plan: &DeploymentPlan,
		network: &NetworkConfig,
	) -> Result<Vec<DeploymentRecord>, ExecutionError> {
		let chain_id = self
			.delivery
			.chain_id()
			.await
			.map_err(|e| ExecutionError::before_start(e.into()))?;
		if !network.network_id.matches(chain_id) {
			return Err(ExecutionError::before_start(DeployError::NetworkMismatch {
				expected: network.network_id,
				actual: chain_id,
			}));
		}

		tracing::info!(chain_id, steps = plan.len(), "Starting deployment");

		let link_names: HashMap<&str, &str> = plan
			.steps()
			.iter()
			.map(|step| (step.artifact.name.as_str(), step.artifact.link_name()))
			.collect();
		let mut shutdown = self.shutdown.clone();
		let mut records: Vec<DeploymentRecord> = Vec::with_capacity(plan.len());

		for step in plan.steps() {
			match self
				.deploy_step(step, &records, &link_names, &mut shutdown)
				.await
			{
				Ok(record) => {
					tracing::info!(
						artifact = %record.artifact_name,
						address = %record.address,
						block = record.block_number,
						"Deployment confirmed"
					);
					records.push(record);
				},
				Err(e) => {
					tracing::error!(
						artifact = %step.artifact.name,
						step = step.index,
						completed = records.len(),
						"Deployment halted: {}",
						e
					);
					return Err(ExecutionError::at_step(
						records,
						step.index,
						&step.artifact.name,
						e,
					));
				},
			}
		}

		tracing::info!(deployed = records.len(), "Deployment complete");
		Ok(records)
	}

	#[instrument(skip_all, fields(artifact = %step.artifact.name, step = step.index))]
	async fn deploy_step(
		&self,
		step: &PlanStep,
		records: &[DeploymentRecord],
		link_names: &HashMap<&str, &str>,
		shutdown: &mut Option<watch::Receiver<bool>>,
	) -> Result<DeploymentRecord, DeployError> {
		let artifact = &step.artifact;
		let name = artifact.name.as_str();

		if is_shutdown(shutdown) {
			return Err(DeployError::Cancelled {
				artifact: name.to_string(),
			});
		}

		let address_of = |target: &str| {
			records
				.iter()
				.find(|record| record.artifact_name == target)
				.map(|record| record.address)
		};

		let values = artifact
			.constructor_args
			.iter()
			.map(|arg| {
				arg.to_sol_value(address_of)
					.map_err(|e| DeployError::UnresolvedReference {
						artifact: name.to_string(),
						reference: e.0,
					})
			})
			.collect::<Result<Vec<_>, _>>()?;

		let compiled = self.artifacts.load(artifact.build_name()).await?;

		let mut linker = Linker::new(&compiled.bytecode);
		for library in &artifact.libraries {
			let address = address_of(library.as_str()).ok_or_else(|| DeployError::MissingLink {
				artifact: name.to_string(),
				library: library.clone(),
			})?;
			let link_name = link_names
				.get(library.as_str())
				.copied()
				.unwrap_or(library.as_str());
			let replaced = linker.link(link_name, address);
			tracing::debug!(library = %library, address = %address, replaced, "Linked library");
		}
		if let Some(library) = linker.unlinked_libraries().into_iter().next() {
			return Err(DeployError::MissingLink {
				artifact: name.to_string(),
				library,
			});
		}

		let mut code = linker.into_bytes()?.to_vec();
		code.extend(encode_constructor(name, &compiled.abi, &values)?);

		let tx_hash = self
			.delivery
			.submit_deployment(Bytes::from(code))
			.await
			.map_err(|e| delivery_error(name, e))?;
		tracing::info!(tx_hash = %tx_hash, "Submitted creation transaction");

		let receipt = tokio::select! {
			result = self.delivery.wait_for_confirmation(tx_hash) => {
				result.map_err(|e| delivery_error(name, e))?
			},
			_ = wait_for_shutdown(shutdown) => {
				tracing::warn!(tx_hash = %tx_hash, "Shutdown requested while awaiting confirmation");
				return Err(DeployError::Cancelled { artifact: name.to_string() });
			},
		};

		if !receipt.success {
			return Err(DeployError::TransactionRejected {
				artifact: name.to_string(),
				reason: format!(
					"transaction {} reverted in block {}",
					receipt.transaction_hash, receipt.block_number
				),
			});
		}

		DeploymentRecord::from_receipt(name, &receipt, Utc::now()).ok_or_else(|| {
			DeployError::TransactionRejected {
				artifact: name.to_string(),
				reason: format!(
					"receipt for {} carries no contract address",
					receipt.transaction_hash
				),
			}
		})
	}
}

/// ABI-encodes constructor arguments against the artifact's constructor.
fn encode_constructor(
	artifact: &str,
	abi: &JsonAbi,
	values: &[DynSolValue],
) -> Result<Vec<u8>, DeployError> {
	match &abi.constructor {
		Some(constructor) => {
			constructor
				.abi_encode_input(values)
				.map_err(|e| DeployError::Encoding {
					artifact: artifact.to_string(),
					reason: e.to_string(),
				})
		},
		None if values.is_empty() => Ok(Vec::new()),
		None => Err(DeployError::Encoding {
			artifact: artifact.to_string(),
			reason: format!(
				"{} constructor arguments given but the ABI declares no constructor",
				values.len()
			),
		}),
	}
}

fn delivery_error(artifact: &str, err: DeliveryError) -> DeployError {
	match err {
		DeliveryError::Rejected(reason) => DeployError::TransactionRejected {
			artifact: artifact.to_string(),
			reason,
		},
		DeliveryError::Timeout(reason) => DeployError::TransactionTimeout {
			artifact: artifact.to_string(),
			reason,
		},
		other => DeployError::Delivery(other),
	}
}

fn is_shutdown(shutdown: &Option<watch::Receiver<bool>>) -> bool {
	shutdown.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Resolves once shutdown is requested; never resolves without a signal.
async fn wait_for_shutdown(shutdown: &mut Option<watch::Receiver<bool>>) {
	if let Some(rx) = shutdown {
		let signalled = rx.wait_for(|stop| *stop).await.is_ok();
		if signalled {
			return;
		}
	}
	std::future::pending::<()>().await
}

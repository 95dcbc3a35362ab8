//! Alloy-backed delivery for EVM networks.
//!
//! Builds one provider for the selected network. Signing-provider networks
//! sign locally with an [`EthereumWallet`]; direct networks leave signing to
//! the node and send from one of its unlocked accounts.

use crate::{DeliveryError, DeliveryInterface};
use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes, B256};
use alloy_provider::{
	DynProvider, PendingTransactionConfig, PendingTransactionError, Provider, ProviderBuilder,
};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport::layers::RetryBackoffLayer;
use async_trait::async_trait;
use deployer_types::{Connection, DeploymentReceipt, NetworkConfig, NetworkIdMatcher};
use std::time::Duration;

/// How often pending transactions are polled.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Account the creation transactions are sent from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sender {
	/// Local wallet signing for this address.
	Wallet(Address),
	/// Unlocked node account; the node's first account when `None`.
	Unlocked(Option<Address>),
}

/// Alloy-based EVM delivery implementation for a single network.
pub struct AlloyDelivery {
	provider: DynProvider,
	sender: Sender,
	gas: Option<u64>,
	gas_price: Option<u64>,
	confirmations: u64,
	receipt_timeout: Duration,
}

impl AlloyDelivery {
	/// Creates a delivery for the given network.
	///
	/// # Errors
	///
	/// Returns [`DeliveryError::Network`] if the connection parameters are
	/// inconsistent, the RPC URL cannot be parsed, or the private key is
	/// invalid.
	pub fn new(network: &NetworkConfig) -> Result<Self, DeliveryError> {
		let connection = network
			.connection()
			.map_err(|e| DeliveryError::Network(format!("Invalid network configuration: {e}")))?;

		let rpc_url = match &connection {
			Connection::Direct { url, .. } => url.as_str(),
			Connection::Signing { url, .. } => *url,
		};
		let url = rpc_url
			.parse()
			.map_err(|e| DeliveryError::Network(format!("Invalid RPC URL {rpc_url}: {e}")))?;

		// Configure retry layer for handling network errors and rate limits
		let retry_layer = RetryBackoffLayer::new(
			5,    // max_retry: retry up to 5 times
			1000, // backoff: initial backoff in milliseconds
			10,   // cups: compute units per second
		);
		let client = RpcClient::builder().layer(retry_layer).http(url);

		let (provider, sender) = match connection {
			Connection::Signing { private_key, .. } => {
				let mut signer: PrivateKeySigner = private_key
					.expose_secret()
					.parse()
					.map_err(|e| DeliveryError::Network(format!("Invalid private key: {e}")))?;
				if let NetworkIdMatcher::Exact(chain_id) = network.network_id {
					signer = signer.with_chain_id(Some(chain_id));
				}
				let address = signer.address();
				let provider = ProviderBuilder::new()
					.wallet(EthereumWallet::from(signer))
					.connect_client(client)
					.erased();
				(provider, Sender::Wallet(address))
			},
			Connection::Direct { from, .. } => {
				let provider = ProviderBuilder::new().connect_client(client).erased();
				(provider, Sender::Unlocked(from))
			},
		};
		provider.client().set_poll_interval(POLL_INTERVAL);

		Ok(Self {
			provider,
			sender,
			gas: network.gas,
			gas_price: network.gas_price,
			confirmations: network.confirmations,
			receipt_timeout: network.receipt_timeout(),
		})
	}

	/// Resolves the sending account, asking the node for its accounts when
	/// none was configured.
	async fn sender_address(&self) -> Result<Address, DeliveryError> {
		match self.sender {
			Sender::Wallet(address) | Sender::Unlocked(Some(address)) => Ok(address),
			Sender::Unlocked(None) => {
				let accounts = self
					.provider
					.get_accounts()
					.await
					.map_err(|e| DeliveryError::Network(format!("Failed to list accounts: {e}")))?;
				accounts.first().copied().ok_or_else(|| {
					DeliveryError::Network("Node reports no unlocked accounts".to_string())
				})
			},
		}
	}

	/// Builds the creation request with the network's gas settings.
	fn creation_request(&self, bytecode: Bytes, from: Address) -> TransactionRequest {
		let mut request = TransactionRequest::default()
			.with_deploy_code(bytecode)
			.with_from(from);
		if let Some(gas) = self.gas {
			request = request.with_gas_limit(gas);
		}
		if let Some(gas_price) = self.gas_price {
			request = request.with_gas_price(u128::from(gas_price));
		}
		request
	}
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	async fn chain_id(&self) -> Result<u64, DeliveryError> {
		self.provider
			.get_chain_id()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get chain id: {e}")))
	}

	async fn submit_deployment(&self, bytecode: Bytes) -> Result<B256, DeliveryError> {
		let from = self.sender_address().await?;
		let request = self.creation_request(bytecode, from);

		tracing::debug!(
			from = %from,
			data_len = request.input.input().map(|d| d.len()).unwrap_or(0),
			gas_limit = ?request.gas,
			"Sending creation transaction"
		);

		let pending = self.provider.send_transaction(request).await.map_err(|e| {
			tracing::error!("Creation transaction submission failed: {}", e);
			if e.as_error_resp().is_some() {
				DeliveryError::Rejected(e.to_string())
			} else {
				DeliveryError::Network(format!("Failed to send transaction: {e}"))
			}
		})?;

		Ok(*pending.tx_hash())
	}

	async fn wait_for_confirmation(&self, hash: B256) -> Result<DeploymentReceipt, DeliveryError> {
		tracing::info!(
			tx_hash = %hash,
			"Waiting for {} confirmations (timeout: {}s)",
			self.confirmations,
			self.receipt_timeout.as_secs()
		);

		let config =
			PendingTransactionConfig::new(hash).with_required_confirmations(self.confirmations);
		let watch = async {
			let pending = self
				.provider
				.watch_pending_transaction(config)
				.await
				.map_err(|e| match e {
					PendingTransactionError::FailedToRegister => DeliveryError::Network(
						"Failed to register transaction watcher".to_string(),
					),
					other => DeliveryError::Network(format!("Transaction watch failed: {other}")),
				})?;
			pending
				.await
				.map_err(|e| DeliveryError::Network(format!("Failed to confirm transaction: {e}")))
		};

		let confirmed = tokio::time::timeout(self.receipt_timeout, watch)
			.await
			.map_err(|_| {
				DeliveryError::Timeout(format!(
					"no confirmation for {hash} after {}s",
					self.receipt_timeout.as_secs()
				))
			})??;

		let receipt = self
			.provider
			.get_transaction_receipt(confirmed)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get receipt: {e}")))?
			.ok_or_else(|| DeliveryError::Network(format!("Receipt for {confirmed} not found")))?;

		Ok(DeploymentReceipt {
			transaction_hash: receipt.transaction_hash,
			contract_address: receipt.contract_address,
			block_number: receipt.block_number.unwrap_or(0),
			success: receipt.status(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use deployer_types::SecretString;
	use std::str::FromStr;

	const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	#[tokio::test]
	async fn test_direct_network() {
		let mut network = NetworkConfig::direct("localhost", 8545);
		network.gas = Some(2_000_000);
		network.gas_price = Some(1);
		network.confirmations = 3;

		let delivery = AlloyDelivery::new(&network).unwrap();
		assert_eq!(delivery.sender, Sender::Unlocked(None));
		assert_eq!(delivery.confirmations, 3);
		assert_eq!(delivery.receipt_timeout, Duration::from_secs(120));

		let from = Address::repeat_byte(0x01);
		let request = delivery.creation_request(Bytes::from_static(&[0x60, 0x80]), from);
		assert_eq!(request.from, Some(from));
		assert_eq!(request.gas, Some(2_000_000));
		assert_eq!(request.gas_price, Some(1));
		assert!(request.to.is_some_and(|kind| kind.is_create()));
	}

	#[tokio::test]
	async fn test_configured_sender_skips_node_lookup() {
		let mut network = NetworkConfig::direct("localhost", 8545);
		network.from = Some(Address::repeat_byte(0x42));

		let delivery = AlloyDelivery::new(&network).unwrap();
		assert_eq!(
			delivery.sender_address().await.unwrap(),
			Address::repeat_byte(0x42)
		);
	}

	#[tokio::test]
	async fn test_signing_network_uses_wallet_address() {
		let network = NetworkConfig::signing("http://localhost:8545", SecretString::from(TEST_KEY))
			.with_network_id(NetworkIdMatcher::Exact(31337));

		let delivery = AlloyDelivery::new(&network).unwrap();
		let expected = Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap();
		assert_eq!(delivery.sender, Sender::Wallet(expected));
	}

	#[tokio::test]
	async fn test_invalid_private_key() {
		let network = NetworkConfig::signing("http://localhost:8545", SecretString::from("0x1234"));

		let result = AlloyDelivery::new(&network);
		assert!(matches!(result, Err(DeliveryError::Network(msg)) if msg.contains("Invalid private key")));
	}

	#[tokio::test]
	async fn test_ambiguous_network_rejected() {
		let mut network = NetworkConfig::direct("localhost", 8545);
		network.provider = NetworkConfig::signing("http://localhost:8545", SecretString::from(TEST_KEY)).provider;

		let result = AlloyDelivery::new(&network);
		assert!(matches!(result, Err(DeliveryError::Network(msg)) if msg.contains("mutually exclusive")));
	}

	#[tokio::test]
	async fn test_invalid_rpc_url() {
		let network = NetworkConfig::direct("not a host", 8545);

		let result = AlloyDelivery::new(&network);
		assert!(matches!(result, Err(DeliveryError::Network(msg)) if msg.contains("Invalid RPC URL")));
	}
}

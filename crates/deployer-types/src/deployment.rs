//! Deployment results.
//!
//! These types describe what the network reported back for each deployment
//! transaction and the records the pipeline keeps for confirmed artifacts.

use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Receipt of a contract-creation transaction.
///
/// Produced by the delivery layer once the transaction is mined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentReceipt {
	/// The hash of the creation transaction.
	pub transaction_hash: B256,
	/// Address of the created contract, absent if creation did not happen.
	pub contract_address: Option<Address>,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
}

/// A confirmed deployment of one artifact.
///
/// Created exactly once per artifact per run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
	pub artifact_name: String,
	pub address: Address,
	pub transaction_hash: B256,
	pub block_number: u64,
	pub confirmed_at: DateTime<Utc>,
}

impl DeploymentRecord {
	/// Builds a record from a confirmed receipt.
	///
	/// Returns `None` when the receipt carries no contract address.
	pub fn from_receipt(
		artifact_name: impl Into<String>,
		receipt: &DeploymentReceipt,
		confirmed_at: DateTime<Utc>,
	) -> Option<Self> {
		let address = receipt.contract_address?;
		Some(Self {
			artifact_name: artifact_name.into(),
			address,
			transaction_hash: receipt.transaction_hash,
			block_number: receipt.block_number,
			confirmed_at,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_record_requires_contract_address() {
		let receipt = DeploymentReceipt {
			transaction_hash: B256::repeat_byte(0xab),
			contract_address: None,
			block_number: 7,
			success: true,
		};
		assert!(DeploymentRecord::from_receipt("Token", &receipt, Utc::now()).is_none());

		let receipt = DeploymentReceipt {
			contract_address: Some(Address::repeat_byte(0x11)),
			..receipt
		};
		let record = DeploymentRecord::from_receipt("Token", &receipt, Utc::now()).unwrap();
		assert_eq!(record.artifact_name, "Token");
		assert_eq!(record.address, Address::repeat_byte(0x11));
		assert_eq!(record.block_number, 7);
	}

	#[test]
	fn test_record_serializes_hex_fields() {
		let record = DeploymentRecord {
			artifact_name: "ECRecovery".to_string(),
			address: Address::repeat_byte(0x22),
			transaction_hash: B256::repeat_byte(0x33),
			block_number: 1,
			confirmed_at: Utc::now(),
		};

		let json = serde_json::to_value(&record).unwrap();
		assert_eq!(json["artifact_name"], "ECRecovery");
		assert_eq!(
			json["address"],
			"0x2222222222222222222222222222222222222222"
		);
	}
}

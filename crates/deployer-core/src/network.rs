//! Network selection.

use crate::error::DeployError;
use deployer_types::{NetworkConfig, NetworksConfig};

/// Looks up a network by exact name.
///
/// # Errors
///
/// Returns [`DeployError::UnknownNetwork`] if no network has that name.
pub fn select_network(name: &str, networks: &NetworksConfig) -> Result<NetworkConfig, DeployError> {
	networks
		.get(name)
		.cloned()
		.ok_or_else(|| DeployError::UnknownNetwork(name.to_string()))
}
